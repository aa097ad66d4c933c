// ── Device details ──

use serde::{Deserialize, Serialize};

use super::field::{FieldSpec, Validated, integer, shown, text};

/// Columns a device row may carry beyond the base object fields.
pub const DEVICE_SCHEMA: &[FieldSpec] = &[
    text("device"),
    text("group"),
    text("probe"),
    text("grpdev"),
    text("probegroupdevice"),
    text("host"),
    text("location"),
    text("deviceicon"),
    text("icon"),
    text("message"),
    integer("priority"),
    integer("upsens"),
    integer("downsens"),
    integer("downacksens"),
    integer("partialdownsens"),
    integer("warnsens"),
    integer("pausedsens"),
    integer("unusualsens"),
    integer("undefinedsens"),
    integer("totalsens"),
    text("dependency"),
    text("schedule"),
    text("favorite"),
    text("comments"),
];

/// Per-state sensor counters reported on a device row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorCounts {
    pub up: Option<i64>,
    pub down: Option<i64>,
    pub down_acknowledged: Option<i64>,
    pub partial_down: Option<i64>,
    pub warning: Option<i64>,
    pub paused: Option<i64>,
    pub unusual: Option<i64>,
    pub undefined: Option<i64>,
    pub total: Option<i64>,
}

/// Device-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetails {
    pub device: Option<String>,
    pub group: Option<String>,
    pub probe: Option<String>,
    pub grpdev: Option<String>,
    pub probegroupdevice: Option<String>,
    /// IP address or DNS name the probe connects to.
    pub host: Option<String>,
    pub location: Option<String>,
    pub deviceicon: Option<String>,
    pub icon: Option<String>,
    pub message: Option<String>,
    pub priority: Option<i64>,
    pub sensors: SensorCounts,
    pub dependency: Option<String>,
    pub schedule: Option<String>,
    pub favorite: Option<String>,
    pub comments: Option<String>,
}

impl DeviceDetails {
    pub(crate) fn from_validated(v: &mut Validated) -> Self {
        Self {
            device: v.text("device"),
            group: v.text("group"),
            probe: v.text("probe"),
            grpdev: v.text("grpdev"),
            probegroupdevice: v.text("probegroupdevice"),
            host: v.text("host"),
            location: v.text("location"),
            deviceicon: v.text("deviceicon"),
            icon: v.text("icon"),
            message: v.text("message"),
            priority: v.integer("priority"),
            sensors: SensorCounts {
                up: v.integer("upsens"),
                down: v.integer("downsens"),
                down_acknowledged: v.integer("downacksens"),
                partial_down: v.integer("partialdownsens"),
                warning: v.integer("warnsens"),
                paused: v.integer("pausedsens"),
                unusual: v.integer("unusualsens"),
                undefined: v.integer("undefinedsens"),
                total: v.integer("totalsens"),
            },
            dependency: v.text("dependency"),
            schedule: v.text("schedule"),
            favorite: v.text("favorite"),
            comments: v.text("comments"),
        }
    }

    /// Value of the schema column `name`, as text. Sensor counters are
    /// addressed by their column names (`upsens`, `downsens`, ...).
    pub fn field(&self, name: &str) -> Option<String> {
        let counts = &self.sensors;
        match name {
            "device" => self.device.clone(),
            "group" => self.group.clone(),
            "probe" => self.probe.clone(),
            "grpdev" => self.grpdev.clone(),
            "probegroupdevice" => self.probegroupdevice.clone(),
            "host" => self.host.clone(),
            "location" => self.location.clone(),
            "deviceicon" => self.deviceicon.clone(),
            "icon" => self.icon.clone(),
            "message" => self.message.clone(),
            "priority" => shown(self.priority),
            "upsens" => shown(counts.up),
            "downsens" => shown(counts.down),
            "downacksens" => shown(counts.down_acknowledged),
            "partialdownsens" => shown(counts.partial_down),
            "warnsens" => shown(counts.warning),
            "pausedsens" => shown(counts.paused),
            "unusualsens" => shown(counts.unusual),
            "undefinedsens" => shown(counts.undefined),
            "totalsens" => shown(counts.total),
            "dependency" => self.dependency.clone(),
            "schedule" => self.schedule.clone(),
            "favorite" => self.favorite.clone(),
            "comments" => self.comments.clone(),
            _ => None,
        }
    }
}
