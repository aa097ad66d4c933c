// Integration tests for `Connection` using wiremock and a scripted transport.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prtgly_api::{
    ApiEndpoint, Bucket, Connection, Credentials, Error, Format, HttpTransport, Query,
    RetryPolicy, Transport,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn devices_xml(start: u64, count: u64, total: u64) -> String {
    let mut body = format!("<devices totalcount=\"{total}\"><prtg-version>23.4</prtg-version>");
    for id in start..start + count {
        write!(
            body,
            "<item><objid>{id}</objid><parentid>1</parentid><name>device-{id}</name>\
             <tags>switch</tags><active>true</active><status>Up</status></item>"
        )
        .unwrap();
    }
    body.push_str("</devices>");
    body
}

async fn setup() -> (MockServer, Connection) {
    let server = MockServer::start().await;
    let endpoint =
        ApiEndpoint::parse(&server.uri(), Credentials::password("prtgadmin", "prtgadmin")).unwrap();
    let conn = Connection::with_transport(HttpTransport::from_client(reqwest::Client::new()), endpoint)
        .with_retry(RetryPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 0,
            ..RetryPolicy::default()
        });
    (server, conn)
}

enum Step {
    Body(String),
    Hang,
}

/// Replays canned responses in order and records every requested URL.
#[derive(Default)]
struct Scripted {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Url>>,
}

impl Scripted {
    fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for Scripted {
    fn send(&self, url: Url, _method: Method) -> impl Future<Output = Result<Bytes, Error>> + Send {
        self.requests.lock().unwrap().push(url);
        let step = self.steps.lock().unwrap().pop_front();
        async move {
            match step {
                Some(Step::Body(body)) => Ok(Bytes::from(body)),
                Some(Step::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Bytes::new())
                }
                None => Err(Error::Protocol("script exhausted".into())),
            }
        }
    }
}

fn scripted(steps: impl IntoIterator<Item = Step>) -> Connection<Scripted> {
    let endpoint =
        ApiEndpoint::parse("https://prtg.test", Credentials::password("prtgadmin", "pw")).unwrap();
    Connection::with_transport(Scripted::new(steps), endpoint).with_retry(RetryPolicy {
        timeout: Duration::from_secs(1),
        max_retries: 1,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(100),
    })
}

fn param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

// ── HTTP tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_devices_paginate_in_three_requests() {
    let (server, conn) = setup().await;

    for (start, count) in [(0, 500), (500, 500), (1000, 200)] {
        Mock::given(method("GET"))
            .and(path("/api/table.xml"))
            .and(query_param("username", "prtgadmin"))
            .and(query_param("content", "devices"))
            .and(query_param("start", start.to_string()))
            .and(query_param("count", count.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(devices_xml(start, count, 1200)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut query = Query::table(Bucket::Devices).page_size(500).build().unwrap();
    conn.execute(&mut query).await.unwrap();

    assert!(query.is_finished());
    assert_eq!(query.response().len(), 1200);
    assert_eq!(query.total(), Some(1200));
    assert_eq!(query.response()[0].id, 0);
    assert_eq!(query.response()[1199].id, 1199);
}

#[tokio::test]
async fn test_status_json() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/getstatus.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"NewMessages":"3","NewAlarms":"1","Version":"23.4.90","IsAdminUser":"true"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut query = Query::status().format(Format::Json).build().unwrap();
    conn.execute(&mut query).await.unwrap();

    assert!(query.is_finished());
    assert_eq!(query.response().len(), 1);
    let status = query.response()[0].as_status().unwrap();
    assert_eq!(status.new_messages, Some(3));
    assert_eq!(status.version.as_deref(), Some("23.4.90"));
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/table.xml"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("<prtg><error>Unauthorized</error></prtg>"),
        )
        .mount(&server)
        .await;

    let mut query = Query::table(Bucket::Sensors).build().unwrap();
    let err = conn.execute(&mut query).await.unwrap_err();

    assert!(
        matches!(err, Error::Authentication { ref message } if message == "Unauthorized"),
        "expected Authentication, got: {err:?}"
    );
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    let endpoint = ApiEndpoint::parse(&server.uri(), Credentials::password("u", "p")).unwrap();
    let conn = Connection::with_transport(HttpTransport::from_client(reqwest::Client::new()), endpoint)
        .with_retry(RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        });

    Mock::given(method("GET"))
        .and(path("/api/getobjectproperty.htm"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("<prtg><error>no such object</error></prtg>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut query = Query::get_object_property(99999, "name").build().unwrap();
    let err = conn.execute(&mut query).await.unwrap_err();

    match err {
        Error::Http { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("no such object"));
        }
        other => panic!("expected Http, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_set_property_acknowledged() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/setobjectproperty.htm"))
        .and(query_param("id", "2001"))
        .and(query_param("name", "tags"))
        .and(query_param("value", "core edge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>OK</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut query = Query::set_object_property(2001, "tags", "core edge")
        .build()
        .unwrap();
    conn.execute(&mut query).await.unwrap();

    assert!(query.is_finished());
    assert!(query.response().is_empty());
}

// ── Scripted transport tests ────────────────────────────────────────

#[tokio::test]
async fn test_cursor_sequence_for_1200_devices() {
    let conn = scripted([
        Step::Body(devices_xml(0, 500, 1200)),
        Step::Body(devices_xml(500, 500, 1200)),
        Step::Body(devices_xml(1000, 200, 1200)),
    ]);

    let mut query = Query::table(Bucket::Devices).page_size(500).build().unwrap();
    conn.execute(&mut query).await.unwrap();

    let cursors: Vec<(String, String)> = conn
        .transport()
        .requests()
        .iter()
        .map(|u| (param(u, "start").unwrap(), param(u, "count").unwrap()))
        .collect();
    assert_eq!(
        cursors,
        vec![
            ("0".to_owned(), "500".to_owned()),
            ("500".to_owned(), "500".to_owned()),
            ("1000".to_owned(), "200".to_owned()),
        ]
    );
    assert!(query.is_finished());
    assert_eq!(query.response().len(), 1200);
}

#[tokio::test]
async fn test_non_paginating_target_sends_once_without_cursor() {
    let conn = scripted([Step::Body("  0123456789  ".to_owned())]);

    let mut query = Query::pass_hash().build().unwrap();
    conn.execute(&mut query).await.unwrap();

    let requests = conn.transport().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path(), "/api/getpasshash.htm");
    assert!(param(&requests[0], "start").is_none());
    assert_eq!(query.response()[0].result(), Some("0123456789"));
}

#[tokio::test]
async fn test_empty_pages_while_more_reported_is_protocol_error() {
    let conn = scripted([
        Step::Body(devices_xml(0, 5, 10)),
        Step::Body(devices_xml(0, 0, 10)),
        Step::Body(devices_xml(0, 0, 10)),
        Step::Body(devices_xml(0, 0, 10)),
        Step::Body(devices_xml(0, 0, 10)),
    ]);

    let mut query = Query::table(Bucket::Devices).page_size(5).build().unwrap();
    let err = conn.execute(&mut query).await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)), "got: {err:?}");
    assert_eq!(conn.transport().requests().len(), 4);
    assert_eq!(query.response().len(), 5);
    assert!(!query.is_finished());
}

#[tokio::test]
async fn test_page_cap_is_protocol_error() {
    let open_ended = |id: u64| {
        Step::Body(format!(
            "<devices listend=\"0\"><item><objid>{id}</objid></item></devices>"
        ))
    };
    let conn = scripted((0..10).map(open_ended)).with_max_pages(3);

    let mut query = Query::table(Bucket::Devices).page_size(1).build().unwrap();
    let err = conn.execute(&mut query).await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)), "got: {err:?}");
    assert_eq!(conn.transport().requests().len(), 3);
    assert_eq!(query.response().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_exhaust_retries_and_keep_earlier_pages() {
    let conn = scripted([
        Step::Body(devices_xml(0, 500, 1200)),
        Step::Hang,
        Step::Hang,
    ]);

    let mut query = Query::table(Bucket::Devices).page_size(500).build().unwrap();
    let err = conn.execute(&mut query).await.unwrap_err();

    match err {
        Error::TransportTimeout { attempts, timeout } => {
            assert_eq!(attempts, 2);
            assert_eq!(timeout, Duration::from_secs(1));
        }
        other => panic!("expected TransportTimeout, got: {other:?}"),
    }
    assert_eq!(query.response().len(), 500);
    assert!(!query.is_finished());
    assert_eq!(conn.transport().requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_success_is_retried() {
    let conn = scripted([Step::Hang, Step::Body(devices_xml(0, 2, 2))]);

    let mut query = Query::table(Bucket::Devices).build().unwrap();
    conn.execute(&mut query).await.unwrap();

    assert!(query.is_finished());
    assert_eq!(query.response().len(), 2);
    assert_eq!(conn.transport().requests().len(), 2);
}

#[tokio::test]
async fn test_decode_error_carries_raw_body() {
    let conn = scripted([Step::Body("<devices><item>".to_owned())]);

    let mut query = Query::table(Bucket::Devices).build().unwrap();
    let err = conn.execute(&mut query).await.unwrap_err();

    match err {
        Error::Decode { body, .. } => assert_eq!(body, "<devices><item>"),
        other => panic!("expected Decode, got: {other:?}"),
    }
    assert_eq!(conn.transport().requests().len(), 1);
}
