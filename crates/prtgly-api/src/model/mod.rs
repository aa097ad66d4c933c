// ── Domain objects ──
//
// Typed records decoded from server responses. Every object shares the
// base fields below; the variant-specific part lives in `ObjectDetails`
// and anything the schema doesn't recognise is kept in `extra`.

pub mod device;
pub mod field;
pub mod sensor;
pub mod status;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

pub use device::{DEVICE_SCHEMA, DeviceDetails, SensorCounts};
pub use field::{FieldKind, FieldMap, FieldSpec, FieldValue, split_tags};
pub use sensor::{SENSOR_SCHEMA, SensorDetails};
pub use status::{PROPERTY_SCHEMA, PropertyDetails, STATUS_SCHEMA, StatusDetails};

use field::{Validated, boolean, integer, list, text};

/// Fields every object may carry, whatever its variant.
pub const BASE_SCHEMA: &[FieldSpec] = &[
    integer("objid"),
    integer("parentid"),
    text("type"),
    list("tags"),
    boolean("active"),
    text("name"),
    text("status"),
];

// ── Bucket ──────────────────────────────────────────────────────────

/// Content bucket: the category used for cache partitioning and for
/// choosing which variant a decoded row becomes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Bucket {
    Sensors,
    Devices,
    Status,
}

impl Bucket {
    /// The object variant rows in this bucket decode into.
    pub fn kind(self) -> ObjectKind {
        match self {
            Self::Sensors => ObjectKind::Sensor,
            Self::Devices => ObjectKind::Device,
            Self::Status => ObjectKind::Status,
        }
    }

    /// Variant-specific schema for this bucket.
    pub fn schema(self) -> &'static [FieldSpec] {
        self.kind().schema()
    }
}

// ── ObjectKind ──────────────────────────────────────────────────────

/// Variant tag of a decoded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectKind {
    Sensor,
    Device,
    Status,
    /// Generic object, e.g. a property or pass-hash result.
    Object,
}

impl ObjectKind {
    pub fn schema(self) -> &'static [FieldSpec] {
        match self {
            Self::Sensor => SENSOR_SCHEMA,
            Self::Device => DEVICE_SCHEMA,
            Self::Status => STATUS_SCHEMA,
            Self::Object => PROPERTY_SCHEMA,
        }
    }

    /// Bucket objects of this kind are cached under, if any.
    pub fn bucket(self) -> Option<Bucket> {
        match self {
            Self::Sensor => Some(Bucket::Sensors),
            Self::Device => Some(Bucket::Devices),
            Self::Status => Some(Bucket::Status),
            Self::Object => None,
        }
    }
}

// ── PrtgObject ──────────────────────────────────────────────────────

/// Variant-specific part of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "lowercase")]
pub enum ObjectDetails {
    Sensor(SensorDetails),
    Device(DeviceDetails),
    Status(StatusDetails),
    Property(PropertyDetails),
}

impl ObjectDetails {
    /// Value of a variant field by its server column name.
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            Self::Sensor(d) => d.field(name),
            Self::Device(d) => d.field(name),
            Self::Status(d) => d.field(name),
            Self::Property(d) => d.field(name),
        }
    }
}

/// A decoded monitoring object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrtgObject {
    /// Server `objid`. Unique within one bucket.
    pub id: i64,
    /// Server `parentid`; 0 means no parent.
    pub parent_id: i64,
    pub kind: ObjectKind,
    /// The server's own `type` column (e.g. "Ping", "Device").
    pub type_name: Option<String>,
    pub tags: Vec<String>,
    pub active: bool,
    pub name: String,
    pub status: String,
    pub details: ObjectDetails,
    /// Fields the schema does not recognise, kept verbatim.
    #[serde(default)]
    pub extra: FieldMap,
}

impl PrtgObject {
    /// Build an object of `kind` from a raw field map.
    ///
    /// Recognised fields are coerced to their schema kind; a field that
    /// fails coercion rejects the whole object. Unrecognised fields land
    /// in `extra`.
    pub fn from_fields(kind: ObjectKind, mut fields: FieldMap) -> Result<Self, String> {
        let mut base = Validated::default();
        base.apply(&mut fields, BASE_SCHEMA)?;

        let mut specific = Validated::default();
        specific.apply(&mut fields, kind.schema())?;

        let details = match kind {
            ObjectKind::Sensor => ObjectDetails::Sensor(SensorDetails::from_validated(&mut specific)),
            ObjectKind::Device => ObjectDetails::Device(DeviceDetails::from_validated(&mut specific)),
            ObjectKind::Status => ObjectDetails::Status(StatusDetails::from_validated(&mut specific)),
            ObjectKind::Object => {
                ObjectDetails::Property(PropertyDetails::from_validated(&mut specific))
            }
        };

        Ok(Self {
            id: base.integer("objid").unwrap_or(0),
            parent_id: base.integer("parentid").unwrap_or(0),
            kind,
            type_name: base.text("type"),
            tags: base.list("tags"),
            active: base.boolean("active").unwrap_or(true),
            name: base.text("name").unwrap_or_default(),
            status: base.text("status").unwrap_or_default(),
            details,
            extra: fields,
        })
    }

    /// Bucket this object belongs to, if it is cacheable.
    pub fn content_type(&self) -> Option<Bucket> {
        self.kind.bucket()
    }

    /// Parent id, or `None` when the object has no parent.
    pub fn parent(&self) -> Option<i64> {
        (self.parent_id != 0).then_some(self.parent_id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn as_sensor(&self) -> Option<&SensorDetails> {
        match &self.details {
            ObjectDetails::Sensor(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&DeviceDetails> {
        match &self.details {
            ObjectDetails::Device(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusDetails> {
        match &self.details {
            ObjectDetails::Status(s) => Some(s),
            _ => None,
        }
    }

    /// Value of a property / pass-hash response.
    pub fn result(&self) -> Option<&str> {
        match &self.details {
            ObjectDetails::Property(p) => p.result.as_deref(),
            _ => None,
        }
    }
}
