// ── Response decoding ──
//
// Turns a raw response body into domain objects plus the pagination
// signal the server embedded in it. XML is read with quick-xml's event
// reader into a small element tree; JSON goes through serde_json.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;

use crate::error::Error;
use crate::model::{Bucket, FieldMap, FieldValue, ObjectKind, PrtgObject};
use crate::query::{Format, PageSignal, ResponseShape};

/// One decoded response.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub objects: Vec<PrtgObject>,
    pub signal: PageSignal,
}

impl Page {
    fn complete(objects: Vec<PrtgObject>) -> Self {
        Self {
            objects,
            signal: PageSignal::complete(),
        }
    }
}

/// Decode `body` as `format`, expecting `shape`. Rows become objects of
/// the variant belonging to `bucket`, or generic objects without one.
pub fn decode(
    body: &[u8],
    format: Format,
    shape: ResponseShape,
    bucket: Option<Bucket>,
) -> Result<Page, Error> {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(e) => {
            return Err(Error::decode(
                format!("body is not UTF-8: {e}"),
                &String::from_utf8_lossy(body),
            ));
        }
    };

    if shape == ResponseShape::Acknowledge || text.trim().is_empty() {
        return Ok(Page::complete(Vec::new()));
    }

    let kind = bucket.map_or(ObjectKind::Object, Bucket::kind);

    match (format, shape) {
        (Format::Xml, ResponseShape::List) => xml_list(text, kind),
        (Format::Xml, _) => xml_scalar(text, kind),
        (Format::Json, ResponseShape::List) => json_list(text, kind, bucket),
        (Format::Json, _) => json_scalar(text, kind),
        (Format::Text, ResponseShape::List) => Err(Error::decode(
            "plain-text bodies carry no listing",
            text,
        )),
        (Format::Text, _) => text_scalar(text),
    }
}

fn build(kind: ObjectKind, fields: FieldMap, index: usize, body: &str) -> Result<PrtgObject, Error> {
    PrtgObject::from_fields(kind, fields)
        .map_err(|reason| Error::decode(format!("item {index}: {reason}"), body))
}

// ── XML ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            attributes.push((key, value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Children flattened to `name -> text`. Repeated names keep the last.
    fn fields(&self) -> FieldMap {
        self.children
            .iter()
            .map(|c| (c.name.clone(), FieldValue::Text(c.text.clone())))
            .collect()
    }
}

fn parse_xml(body: &str) -> Result<XmlNode, String> {
    let mut reader = Reader::from_reader(body.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) => stack.push(XmlNode::open(&e)?),
            Event::Empty(e) => {
                let node = XmlNode::open(&e)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack.pop().ok_or("unbalanced end tag")?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                push_text(&mut stack, text)?;
            }
            Event::CData(c) => push_text(&mut stack, String::from_utf8_lossy(&c))?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(format!("document ends inside <{}>", open.name));
    }
    root.ok_or_else(|| "no root element".to_owned())
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        Ok(())
    } else if root.is_some() {
        Err(format!("second root element <{}>", node.name))
    } else {
        *root = Some(node);
        Ok(())
    }
}

fn push_text(stack: &mut [XmlNode], text: Cow<'_, str>) -> Result<(), String> {
    match stack.last_mut() {
        Some(node) => {
            node.text.push_str(&text);
            Ok(())
        }
        None => Err("text outside the root element".to_owned()),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "-1" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// `<sensors totalcount="1200" listend="1"><treesize>1200</treesize><item>…</item></sensors>`
fn xml_list(body: &str, kind: ObjectKind) -> Result<Page, Error> {
    let root = parse_xml(body).map_err(|e| Error::decode(e, body))?;

    let total = root
        .attribute("totalcount")
        .or_else(|| root.child("treesize").map(|t| t.text.as_str()))
        .and_then(|raw| raw.trim().parse::<u64>().ok());
    let list_end = root.attribute("listend").and_then(parse_flag);

    let objects = root
        .children
        .iter()
        .filter(|c| c.name == "item")
        .enumerate()
        .map(|(i, item)| build(kind, item.fields(), i, body))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        objects,
        signal: PageSignal { total, list_end },
    })
}

/// `<status><NewAlarms>0</NewAlarms>…</status>` or `<prtg><result>…</result></prtg>`
fn xml_scalar(body: &str, kind: ObjectKind) -> Result<Page, Error> {
    let root = parse_xml(body).map_err(|e| Error::decode(e, body))?;
    let object = build(kind, root.fields(), 0, body)?;
    Ok(Page::complete(vec![object]))
}

// ── JSON ────────────────────────────────────────────────────────────

fn field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or_default()),
        }),
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Array(items) if items.iter().all(Value::is_string) => Some(FieldValue::List(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        )),
        other => Some(FieldValue::Text(other.to_string())),
    }
}

fn json_fields(object: &serde_json::Map<String, Value>) -> FieldMap {
    object
        .iter()
        .filter_map(|(k, v)| field_value(v).map(|fv| (k.clone(), fv)))
        .collect()
}

fn parse_json(body: &str) -> Result<serde_json::Map<String, Value>, Error> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::decode(
            format!("expected a JSON object, got {}", json_type(&other)),
            body,
        )),
        Err(e) => Err(Error::decode(e.to_string(), body)),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `{"prtg-version": "…", "treesize": 1200, "sensors": [{…}, …]}`
fn json_list(body: &str, kind: ObjectKind, bucket: Option<Bucket>) -> Result<Page, Error> {
    let root = parse_json(body)?;

    let total = root.get("treesize").and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    let items = bucket
        .and_then(|b| root.get(b.as_ref()))
        .and_then(Value::as_array)
        .or_else(|| root.values().find_map(Value::as_array));

    let Some(items) = items else {
        return Ok(Page {
            objects: Vec::new(),
            signal: PageSignal {
                total,
                list_end: None,
            },
        });
    };

    let objects = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => build(kind, json_fields(map), i, body),
            other => Err(Error::decode(
                format!("item {i}: expected an object, got {}", json_type(other)),
                body,
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        objects,
        signal: PageSignal {
            total,
            list_end: None,
        },
    })
}

fn json_scalar(body: &str, kind: ObjectKind) -> Result<Page, Error> {
    let root = parse_json(body)?;
    let object = build(kind, json_fields(&root), 0, body)?;
    Ok(Page::complete(vec![object]))
}

// ── Plain text ──────────────────────────────────────────────────────

fn text_scalar(body: &str) -> Result<Page, Error> {
    let mut fields = FieldMap::new();
    fields.insert("result".to_owned(), FieldValue::Text(body.trim().to_owned()));
    let object = build(ObjectKind::Object, fields, 0, body)?;
    Ok(Page::complete(vec![object]))
}
