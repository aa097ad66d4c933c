// ── Sensor details ──

use serde::{Deserialize, Serialize};

use super::field::{FieldSpec, Validated, float, integer, shown, text};

/// Columns a sensor row may carry beyond the base object fields.
pub const SENSOR_SCHEMA: &[FieldSpec] = &[
    text("sensor"),
    text("device"),
    text("group"),
    text("probe"),
    text("grpdev"),
    text("probegroupdevice"),
    text("message"),
    text("lastvalue"),
    integer("priority"),
    text("interval"),
    float("uptime"),
    text("uptimetime"),
    text("uptimesince"),
    float("downtime"),
    text("downtimetime"),
    text("downtimesince"),
    text("knowntime"),
    text("cumsince"),
    text("lastcheck"),
    text("lastup"),
    text("lastdown"),
    text("dependency"),
    text("schedule"),
    text("favorite"),
    text("comments"),
];

/// Sensor-specific fields. All optional: the server only returns the
/// columns that were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDetails {
    /// Sensor type display name (e.g. "Ping").
    pub sensor: Option<String>,
    /// Name of the owning device.
    pub device: Option<String>,
    pub group: Option<String>,
    pub probe: Option<String>,
    pub grpdev: Option<String>,
    pub probegroupdevice: Option<String>,
    pub message: Option<String>,
    pub lastvalue: Option<String>,
    pub priority: Option<i64>,
    pub interval: Option<String>,
    /// Uptime percentage.
    pub uptime: Option<f64>,
    pub uptimetime: Option<String>,
    pub uptimesince: Option<String>,
    /// Downtime percentage.
    pub downtime: Option<f64>,
    pub downtimetime: Option<String>,
    pub downtimesince: Option<String>,
    pub knowntime: Option<String>,
    pub cumsince: Option<String>,
    pub lastcheck: Option<String>,
    pub lastup: Option<String>,
    pub lastdown: Option<String>,
    pub dependency: Option<String>,
    pub schedule: Option<String>,
    pub favorite: Option<String>,
    pub comments: Option<String>,
}

impl SensorDetails {
    pub(crate) fn from_validated(v: &mut Validated) -> Self {
        Self {
            sensor: v.text("sensor"),
            device: v.text("device"),
            group: v.text("group"),
            probe: v.text("probe"),
            grpdev: v.text("grpdev"),
            probegroupdevice: v.text("probegroupdevice"),
            message: v.text("message"),
            lastvalue: v.text("lastvalue"),
            priority: v.integer("priority"),
            interval: v.text("interval"),
            uptime: v.float("uptime"),
            uptimetime: v.text("uptimetime"),
            uptimesince: v.text("uptimesince"),
            downtime: v.float("downtime"),
            downtimetime: v.text("downtimetime"),
            downtimesince: v.text("downtimesince"),
            knowntime: v.text("knowntime"),
            cumsince: v.text("cumsince"),
            lastcheck: v.text("lastcheck"),
            lastup: v.text("lastup"),
            lastdown: v.text("lastdown"),
            dependency: v.text("dependency"),
            schedule: v.text("schedule"),
            favorite: v.text("favorite"),
            comments: v.text("comments"),
        }
    }

    /// Value of the schema column `name`, as text.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "sensor" => self.sensor.clone(),
            "device" => self.device.clone(),
            "group" => self.group.clone(),
            "probe" => self.probe.clone(),
            "grpdev" => self.grpdev.clone(),
            "probegroupdevice" => self.probegroupdevice.clone(),
            "message" => self.message.clone(),
            "lastvalue" => self.lastvalue.clone(),
            "priority" => shown(self.priority),
            "interval" => self.interval.clone(),
            "uptime" => shown(self.uptime),
            "uptimetime" => self.uptimetime.clone(),
            "uptimesince" => self.uptimesince.clone(),
            "downtime" => shown(self.downtime),
            "downtimetime" => self.downtimetime.clone(),
            "downtimesince" => self.downtimesince.clone(),
            "knowntime" => self.knowntime.clone(),
            "cumsince" => self.cumsince.clone(),
            "lastcheck" => self.lastcheck.clone(),
            "lastup" => self.lastup.clone(),
            "lastdown" => self.lastdown.clone(),
            "dependency" => self.dependency.clone(),
            "schedule" => self.schedule.clone(),
            "favorite" => self.favorite.clone(),
            "comments" => self.comments.clone(),
            _ => None,
        }
    }
}
