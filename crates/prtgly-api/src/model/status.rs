// ── Server status and property results ──

use serde::{Deserialize, Serialize};

use super::field::{FieldSpec, Validated, boolean, integer, shown, text};

/// Fields of a `getstatus` response. Names are the server's, verbatim.
pub const STATUS_SCHEMA: &[FieldSpec] = &[
    integer("NewMessages"),
    integer("NewAlarms"),
    integer("Alarms"),
    integer("AckAlarms"),
    integer("NewToDos"),
    text("Clock"),
    text("ActivationStatusMessage"),
    integer("BackgroundTasks"),
    integer("CorrelationTasks"),
    integer("AutoDiscoTasks"),
    text("Version"),
    boolean("PRTGUpdateAvailable"),
    boolean("IsAdminUser"),
    boolean("IsCluster"),
    boolean("ReadOnlyUser"),
    boolean("ReadOnlyAllowAcknowledge"),
];

/// Fields of a single-value property or pass-hash response.
pub const PROPERTY_SCHEMA: &[FieldSpec] = &[text("result")];

/// Server-wide counters and flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    pub new_messages: Option<i64>,
    pub new_alarms: Option<i64>,
    pub alarms: Option<i64>,
    pub ack_alarms: Option<i64>,
    pub new_todos: Option<i64>,
    pub clock: Option<String>,
    pub activation_status_message: Option<String>,
    pub background_tasks: Option<i64>,
    pub correlation_tasks: Option<i64>,
    pub auto_disco_tasks: Option<i64>,
    pub version: Option<String>,
    pub update_available: Option<bool>,
    pub is_admin_user: Option<bool>,
    pub is_cluster: Option<bool>,
    pub read_only_user: Option<bool>,
    pub read_only_allow_acknowledge: Option<bool>,
}

impl StatusDetails {
    pub(crate) fn from_validated(v: &mut Validated) -> Self {
        Self {
            new_messages: v.integer("NewMessages"),
            new_alarms: v.integer("NewAlarms"),
            alarms: v.integer("Alarms"),
            ack_alarms: v.integer("AckAlarms"),
            new_todos: v.integer("NewToDos"),
            clock: v.text("Clock"),
            activation_status_message: v.text("ActivationStatusMessage"),
            background_tasks: v.integer("BackgroundTasks"),
            correlation_tasks: v.integer("CorrelationTasks"),
            auto_disco_tasks: v.integer("AutoDiscoTasks"),
            version: v.text("Version"),
            update_available: v.boolean("PRTGUpdateAvailable"),
            is_admin_user: v.boolean("IsAdminUser"),
            is_cluster: v.boolean("IsCluster"),
            read_only_user: v.boolean("ReadOnlyUser"),
            read_only_allow_acknowledge: v.boolean("ReadOnlyAllowAcknowledge"),
        }
    }

    /// Value of the server field `name` (e.g. `NewAlarms`), as text.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "NewMessages" => shown(self.new_messages),
            "NewAlarms" => shown(self.new_alarms),
            "Alarms" => shown(self.alarms),
            "AckAlarms" => shown(self.ack_alarms),
            "NewToDos" => shown(self.new_todos),
            "Clock" => self.clock.clone(),
            "ActivationStatusMessage" => self.activation_status_message.clone(),
            "BackgroundTasks" => shown(self.background_tasks),
            "CorrelationTasks" => shown(self.correlation_tasks),
            "AutoDiscoTasks" => shown(self.auto_disco_tasks),
            "Version" => self.version.clone(),
            "PRTGUpdateAvailable" => shown(self.update_available),
            "IsAdminUser" => shown(self.is_admin_user),
            "IsCluster" => shown(self.is_cluster),
            "ReadOnlyUser" => shown(self.read_only_user),
            "ReadOnlyAllowAcknowledge" => shown(self.read_only_allow_acknowledge),
            _ => None,
        }
    }
}

/// Result of `getobjectproperty` or `getpasshash`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub result: Option<String>,
}

impl PropertyDetails {
    pub(crate) fn from_validated(v: &mut Validated) -> Self {
        Self {
            result: v.text("result"),
        }
    }

    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "result" => self.result.clone(),
            _ => None,
        }
    }
}
