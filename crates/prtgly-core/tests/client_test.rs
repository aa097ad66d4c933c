// Integration tests for `Client` over an in-memory transport and a
// temporary cache file.

use std::future::Future;
use std::sync::Mutex;

use bytes::Bytes;
use prtgly_api::{Error, Method, Transport};
use pretty_assertions::assert_eq;
use regex::Regex;
use url::Url;

use prtgly_core::{
    Attribute, Bucket, CacheFallback, Client, ClientConfig, CoreError, Credentials, Filter,
    UpdateMode,
};

// ── Helpers ─────────────────────────────────────────────────────────

const SENSORS: &str = r#"<sensors totalcount="3">
  <item><objid>2001</objid><parentid>40</parentid><name>Ping</name><tags>pingsensor core</tags><status>Up</status></item>
  <item><objid>2002</objid><parentid>40</parentid><name>HTTP</name><tags>http core</tags><status>Down</status></item>
  <item><objid>2003</objid><parentid>41</parentid><name>Ping</name><tags>pingsensor</tags><status>Up</status></item>
</sensors>"#;

const DEVICES: &str = r#"<devices totalcount="2">
  <item><objid>40</objid><parentid>1</parentid><name>core-sw-01</name><tags>switch</tags><host>10.0.0.1</host></item>
  <item><objid>41</objid><parentid>1</parentid><name>edge-01</name><tags>router</tags><host>10.0.0.2</host></item>
</devices>"#;

const STATUS: &str = "<status><NewAlarms>4</NewAlarms><Version>23.4.90</Version></status>";

/// Answers by URL path and `content` parameter; records each request.
#[derive(Default)]
struct FakeServer {
    requests: Mutex<Vec<Url>>,
    sensors: Mutex<String>,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            requests: Mutex::default(),
            sensors: Mutex::new(SENSORS.to_owned()),
        }
    }

    fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.path() == path)
            .count()
    }

    fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for FakeServer {
    fn send(&self, url: Url, _method: Method) -> impl Future<Output = Result<Bytes, Error>> + Send {
        let content = url
            .query_pairs()
            .find(|(k, _)| k == "content")
            .map(|(_, v)| v.into_owned());
        let body = match (url.path(), content.as_deref()) {
            ("/api/table.xml", Some("sensors")) => Ok(self.sensors.lock().unwrap().clone()),
            ("/api/table.xml", Some("devices")) => Ok(DEVICES.to_owned()),
            ("/api/getstatus.xml", _) => Ok(STATUS.to_owned()),
            ("/api/getpasshash.htm", _) => Ok("1234567890".to_owned()),
            ("/api/getobjectproperty.htm", _) => {
                Ok("<prtg><version>23.4</version><result>core-sw-01</result></prtg>".to_owned())
            }
            ("/api/setobjectproperty.htm", _) => Ok("<html>OK</html>".to_owned()),
            (path, _) => Err(Error::Http {
                status: 404,
                body: format!("no route for {path}"),
            }),
        };
        self.requests.lock().unwrap().push(url);
        async move { body.map(Bytes::from) }
    }
}

fn setup() -> (tempfile::TempDir, Client<FakeServer>) {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig::new(
        Url::parse("https://prtg.test").unwrap(),
        Credentials::password("prtgadmin", "prtgadmin"),
        dir.path().join("cache.db"),
    );
    (dir, Client::with_transport(config, FakeServer::new()))
}

fn ids(objects: &[prtgly_core::PrtgObject]) -> Vec<i64> {
    objects.iter().map(|o| o.id).collect()
}

// ── Cache behaviour ─────────────────────────────────────────────────

#[tokio::test]
async fn test_second_table_call_is_served_from_cache() {
    let (_dir, client) = setup();

    let first = client.table(Bucket::Sensors).await.unwrap();
    let second = client.table(Bucket::Sensors).await.unwrap();

    assert_eq!(ids(&first), vec![2001, 2002, 2003]);
    assert_eq!(first, second);
    assert_eq!(client.connection().transport().count("/api/table.xml"), 1);
}

#[tokio::test]
async fn test_filtered_query_bypasses_cache() {
    let (_dir, client) = setup();
    client.table(Bucket::Sensors).await.unwrap();

    let mut query = prtgly_core::Query::table(Bucket::Sensors)
        .filter("status", "5")
        .build()
        .unwrap();
    client.query(&mut query).await.unwrap();

    assert_eq!(client.connection().transport().count("/api/table.xml"), 2);
    let last = client.connection().transport().requests().pop().unwrap();
    assert!(last.query().unwrap().contains("filter_status=5"));
}

#[tokio::test]
async fn test_refresh_overwrites_bucket() {
    let (_dir, client) = setup();
    client.table(Bucket::Sensors).await.unwrap();

    *client.connection().transport().sensors.lock().unwrap() = r#"<sensors totalcount="1">
        <item><objid>2009</objid><parentid>41</parentid><name>SNMP</name></item>
    </sensors>"#
        .to_owned();

    let refreshed = client.refresh(Bucket::Sensors).await.unwrap();
    assert_eq!(ids(&refreshed), vec![2009]);

    let cached = client.cache().get_bucket(Bucket::Sensors).unwrap();
    assert_eq!(cached, refreshed);
    assert_eq!(ids(&client.table(Bucket::Sensors).await.unwrap()), vec![2009]);
    assert_eq!(client.connection().transport().count("/api/table.xml"), 2);
}

#[tokio::test]
async fn test_status_is_cached_in_status_bucket() {
    let (_dir, client) = setup();

    let status = client.status().await.unwrap();
    assert_eq!(status.as_status().unwrap().new_alarms, Some(4));

    client.status().await.unwrap();
    assert_eq!(client.connection().transport().count("/api/getstatus.xml"), 1);
    assert!(client.cache().is_populated(Bucket::Status).unwrap());
}

#[tokio::test]
async fn test_corrupt_cache_fails_by_default() {
    let (dir, client) = setup();
    std::fs::write(dir.path().join("cache.db"), b"definitely not sqlite, just a text file").unwrap();

    let err = client.table(Bucket::Devices).await.unwrap_err();
    assert!(matches!(err, CoreError::CacheUnavailable { .. }), "got: {err:?}");
    assert_eq!(client.connection().transport().count("/api/table.xml"), 0);
}

#[tokio::test]
async fn test_corrupt_cache_can_be_bypassed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    std::fs::write(&path, b"definitely not sqlite, just a text file").unwrap();

    let mut config = ClientConfig::new(
        Url::parse("https://prtg.test").unwrap(),
        Credentials::password("prtgadmin", "prtgadmin"),
        path,
    );
    config.cache_fallback = CacheFallback::Bypass;
    let client = Client::with_transport(config, FakeServer::new());

    let devices = client.table(Bucket::Devices).await.unwrap();
    assert_eq!(ids(&devices), vec![40, 41]);
}

#[tokio::test]
async fn test_object_by_id() {
    let (_dir, client) = setup();

    let device = client.object(Bucket::Devices, 41).await.unwrap();
    assert_eq!(device.name, "edge-01");

    let err = client.object(Bucket::Devices, 99).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { id: 99, .. }), "got: {err:?}");
    assert_eq!(client.connection().transport().count("/api/table.xml"), 1);
}

// ── Content views ───────────────────────────────────────────────────

#[tokio::test]
async fn test_content_resolves_shared_parent_once() {
    let (_dir, client) = setup();

    let filter = Filter::matches(Attribute::Name, Regex::new("Ping|HTTP").unwrap());
    let parents = client
        .content(Bucket::Sensors, Some(&filter), true)
        .await
        .unwrap();

    // 2001 and 2002 share device 40; 2003 lives on 41.
    assert_eq!(ids(&parents), vec![40, 41]);
    assert_eq!(parents[0].name, "core-sw-01");
}

#[tokio::test]
async fn test_content_two_sensors_same_parent_yield_one_device() {
    let (_dir, client) = setup();

    let core = Filter::has_tag("core");
    let tagged = client.content(Bucket::Sensors, Some(&core), false).await.unwrap();
    assert_eq!(ids(&tagged), vec![2001, 2002]);

    let parents = client.content(Bucket::Sensors, Some(&core), true).await.unwrap();
    assert_eq!(ids(&parents), vec![40]);
    assert_eq!(parents[0].as_device().unwrap().host.as_deref(), Some("10.0.0.1"));
}

#[tokio::test]
async fn test_content_filters_on_parent_id() {
    let (_dir, client) = setup();

    let on_41 = Filter::matches(Attribute::from_name("parentid"), Regex::new("^41$").unwrap());
    let matched = client.content(Bucket::Sensors, Some(&on_41), false).await.unwrap();
    assert_eq!(ids(&matched), vec![2003]);
}

#[tokio::test]
async fn test_content_without_filter_returns_bucket() {
    let (_dir, client) = setup();
    let all = client.content(Bucket::Devices, None, false).await.unwrap();
    assert_eq!(ids(&all), vec![40, 41]);
}

// ── Updates ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_appends_tags_and_persists() {
    let (_dir, client) = setup();
    let mut sensors = client.table(Bucket::Sensors).await.unwrap();

    client
        .update(&mut sensors[..1], &Attribute::Tags, "edge core", UpdateMode::Append)
        .unwrap();

    assert_eq!(sensors[0].tags, vec!["pingsensor", "core", "edge"]);
    let stored = client.cache().get(Bucket::Sensors, 2001).unwrap().unwrap();
    assert_eq!(stored.tags, vec!["pingsensor", "core", "edge"]);
    // Untouched objects keep their stored values and order.
    assert_eq!(
        ids(&client.cache().get_bucket(Bucket::Sensors).unwrap()),
        vec![2001, 2002, 2003]
    );
    // Local only.
    assert_eq!(client.connection().transport().count("/api/setobjectproperty.htm"), 0);
}

#[tokio::test]
async fn test_update_of_partial_result_keeps_bucket_a_miss() {
    let (_dir, client) = setup();
    let mut query = prtgly_core::Query::table(Bucket::Sensors)
        .filter("tags", "core")
        .build()
        .unwrap();
    client.query(&mut query).await.unwrap();
    let mut first: Vec<_> = query.into_response().into_iter().take(1).collect();

    client
        .update(&mut first, &Attribute::Name, "renamed", UpdateMode::Replace)
        .unwrap();
    assert!(!client.cache().is_populated(Bucket::Sensors).unwrap());

    let sensors = client.table(Bucket::Sensors).await.unwrap();
    assert_eq!(ids(&sensors), vec![2001, 2002, 2003]);
    assert_eq!(sensors[0].name, "renamed");
    assert_eq!(client.connection().transport().count("/api/table.xml"), 2);
}

#[tokio::test]
async fn test_update_replaces_name() {
    let (_dir, client) = setup();
    let mut devices = client.table(Bucket::Devices).await.unwrap();

    client
        .update(&mut devices, &Attribute::Name, "renamed", UpdateMode::Replace)
        .unwrap();

    for id in [40, 41] {
        assert_eq!(client.cache().get(Bucket::Devices, id).unwrap().unwrap().name, "renamed");
    }
}

#[tokio::test]
async fn test_append_on_scalar_attribute_is_validation_error() {
    let (_dir, client) = setup();
    let mut devices = client.table(Bucket::Devices).await.unwrap();

    let err = client
        .update(&mut devices, &Attribute::Name, "x", UpdateMode::Append)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(devices[0].name, "core-sw-01");
}

#[tokio::test]
async fn test_invalid_active_value_is_rejected() {
    let (_dir, client) = setup();
    let mut devices = client.table(Bucket::Devices).await.unwrap();

    let err = client
        .update(&mut devices, &Attribute::Active, "maybe", UpdateMode::Replace)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn test_push_attribute_sends_set_property() {
    let (_dir, client) = setup();
    let mut sensors = client.table(Bucket::Sensors).await.unwrap();
    client
        .update(&mut sensors[..1], &Attribute::Tags, "edge", UpdateMode::Append)
        .unwrap();

    client
        .push_attribute(&sensors[0], &Attribute::Tags)
        .await
        .unwrap();

    let sent = client.connection().transport().requests().pop().unwrap();
    assert_eq!(sent.path(), "/api/setobjectproperty.htm");
    let pairs: Vec<(String, String)> = sent.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("id".into(), "2001".into())));
    assert!(pairs.contains(&("name".into(), "tags".into())));
    assert!(pairs.contains(&("value".into(), "pingsensor core edge".into())));
}

// ── Scalar operations ───────────────────────────────────────────────

#[tokio::test]
async fn test_property_and_pass_hash() {
    let (_dir, client) = setup();

    assert_eq!(client.get_object_property(40, "name").await.unwrap(), "core-sw-01");
    assert_eq!(client.pass_hash().await.unwrap(), "1234567890");
    client.set_object_property(40, "name", "core-sw-02").await.unwrap();

    assert_eq!(client.connection().transport().count("/api/getobjectproperty.htm"), 1);
    assert_eq!(client.connection().transport().count("/api/setobjectproperty.htm"), 1);
}
