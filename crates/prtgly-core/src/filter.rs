// ── Object filters ──
//
// Client-side predicates applied by `Client::content`.

use prtgly_api::{FieldValue, PrtgObject};
use regex::Regex;

/// Attribute a filter or update addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Name,
    Tags,
    Status,
    Active,
    /// Any other field: base ids and `type` first, then the variant
    /// details, then `extra`.
    Field(String),
}

impl Attribute {
    /// Parse a field name; the common ones map to dedicated variants.
    pub fn from_name(name: &str) -> Self {
        match name {
            "name" => Self::Name,
            "tags" => Self::Tags,
            "status" => Self::Status,
            "active" => Self::Active,
            other => Self::Field(other.to_owned()),
        }
    }

    /// Server-side property name.
    pub fn name(&self) -> &str {
        match self {
            Self::Name => "name",
            Self::Tags => "tags",
            Self::Status => "status",
            Self::Active => "active",
            Self::Field(name) => name,
        }
    }

    /// Textual value of this attribute on `obj`, if it has one.
    pub fn value_of(&self, obj: &PrtgObject) -> Option<String> {
        match self {
            Self::Name => Some(obj.name.clone()),
            Self::Tags => Some(obj.tags.join(" ")),
            Self::Status => Some(obj.status.clone()),
            Self::Active => Some(obj.active.to_string()),
            Self::Field(name) => match name.as_str() {
                "objid" => Some(obj.id.to_string()),
                "parentid" => Some(obj.parent_id.to_string()),
                "type" => obj.type_name.clone(),
                _ => obj
                    .details
                    .field(name)
                    .or_else(|| obj.extra.get(name).map(field_text)),
            },
        }
    }
}

fn field_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::List(items) => items.join(" "),
    }
}

/// Predicate over objects.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Unanchored regex search on one attribute's text.
    Matches { attribute: Attribute, pattern: Regex },
    /// Exact tag membership.
    HasTag(String),
}

impl Filter {
    pub fn matches(attribute: Attribute, pattern: Regex) -> Self {
        Self::Matches { attribute, pattern }
    }

    pub fn has_tag(tag: impl Into<String>) -> Self {
        Self::HasTag(tag.into())
    }

    pub fn accepts(&self, obj: &PrtgObject) -> bool {
        match self {
            Self::Matches { attribute, pattern } => attribute
                .value_of(obj)
                .is_some_and(|v| pattern.is_match(&v)),
            Self::HasTag(tag) => obj.has_tag(tag),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prtgly_api::{FieldMap, ObjectKind};

    fn object(kind: ObjectKind, pairs: &[(&str, &str)]) -> PrtgObject {
        let fields: FieldMap = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), FieldValue::Text((*v).to_owned())))
            .collect();
        PrtgObject::from_fields(kind, fields).unwrap()
    }

    fn sensor(pairs: &[(&str, &str)]) -> PrtgObject {
        object(ObjectKind::Sensor, pairs)
    }

    #[test]
    fn regex_match_on_name_is_unanchored() {
        let obj = sensor(&[("objid", "1"), ("name", "Ping core-sw-01")]);
        let f = Filter::matches(Attribute::Name, Regex::new("core-sw").unwrap());
        assert!(f.accepts(&obj));
        let f = Filter::matches(Attribute::Name, Regex::new("^core").unwrap());
        assert!(!f.accepts(&obj));
    }

    #[test]
    fn has_tag_is_exact_membership() {
        let obj = sensor(&[("objid", "1"), ("tags", "pingsensor core")]);
        assert!(Filter::has_tag("core").accepts(&obj));
        assert!(!Filter::has_tag("cor").accepts(&obj));
    }

    #[test]
    fn field_attribute_reads_details_then_extra() {
        let obj = sensor(&[("objid", "1"), ("device", "edge-01"), ("custom", "blue")]);
        assert_eq!(
            Attribute::from_name("device").value_of(&obj).as_deref(),
            Some("edge-01")
        );
        assert_eq!(
            Attribute::from_name("custom").value_of(&obj).as_deref(),
            Some("blue")
        );
        assert_eq!(Attribute::from_name("missing").value_of(&obj), None);
        assert_eq!(Attribute::from_name("objid").value_of(&obj).as_deref(), Some("1"));
    }

    #[test]
    fn status_fields_use_server_names() {
        let status = object(
            ObjectKind::Status,
            &[("NewAlarms", "4"), ("Version", "23.4.90"), ("IsCluster", "false")],
        );
        assert_eq!(
            Attribute::from_name("NewAlarms").value_of(&status).as_deref(),
            Some("4")
        );
        assert_eq!(
            Attribute::from_name("IsCluster").value_of(&status).as_deref(),
            Some("false")
        );
        let f = Filter::matches(Attribute::from_name("NewAlarms"), Regex::new("^4$").unwrap());
        assert!(f.accepts(&status));
    }

    #[test]
    fn device_counters_use_column_names() {
        let device = object(
            ObjectKind::Device,
            &[("objid", "40"), ("upsens", "12"), ("downsens", "1")],
        );
        assert_eq!(
            Attribute::from_name("upsens").value_of(&device).as_deref(),
            Some("12")
        );
        let f = Filter::matches(Attribute::from_name("downsens"), Regex::new("^[1-9]").unwrap());
        assert!(f.accepts(&device));
        assert_eq!(Attribute::from_name("warnsens").value_of(&device), None);
    }

    #[test]
    fn missing_attribute_never_matches() {
        let obj = sensor(&[("objid", "1")]);
        let f = Filter::matches(Attribute::from_name("lastvalue"), Regex::new(".*").unwrap());
        assert!(!f.accepts(&obj));
    }
}
