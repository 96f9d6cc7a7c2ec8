//! The narrow interface to the host dataflow framework.
//!
//! The core never reaches further into the host than these calls: schema kinds are
//! registered and unregistered at group create/delete, and views receive field
//! additions and removals whenever the group schema changes. Views also show the
//! group's endpoint as read-only fields, refreshed whenever it changes.

use std::fmt;

use bitflags::bitflags;

use crate::group::GroupId;
use crate::net::{Endpoint, Mode};
use crate::variable::Variable;

pub const SCHEMA_CATEGORY: &str = "OSC Variables";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub mode: Mode,
    pub name: String,
}

impl SchemaKey {
    pub fn new(mode: Mode, name: impl Into<String>) -> Self {
        Self {
            mode,
            name: name.into(),
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.mode.label(), self.name)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u32 {
        /// Field is excluded from host presets; the network owns its value.
        const DISABLE_SAVE_PRESET = 1 << 0;
        const READ_ONLY = 1 << 1;
        /// Endpoint fields: shown but never edited or saved.
        const ENDPOINT = Self::DISABLE_SAVE_PRESET.bits() | Self::READ_ONLY.bits();
    }
}

/// Labelled values a view shows for an endpoint: `Host IP` and `Sender Port`
/// for a sender, `Receiver Port` for a receiver.
pub fn endpoint_fields(endpoint: &Endpoint) -> Vec<(&'static str, String)> {
    match endpoint {
        Endpoint::Sender { host, port } => {
            vec![("Host IP", host.clone()), ("Sender Port", port.to_string())]
        }
        Endpoint::Receiver { port } => vec![("Receiver Port", port.to_string())],
    }
}

pub trait HostFramework: Send + Sync {
    fn register_schema_kind(&self, category: &str, key: &SchemaKey, group: GroupId);
    fn unregister_schema_kind(&self, category: &str, key: &SchemaKey);
}

/// A host-owned object exposing a group's variables as editable fields.
pub trait View: Send {
    fn add_field(&mut self, variable: &Variable, flags: FieldFlags);
    fn remove_field(&mut self, name: &str);
    /// Replaces the endpoint fields. Called on attach and after every endpoint change.
    fn set_endpoint(&mut self, endpoint: &Endpoint, flags: FieldFlags);
    fn destroy(&mut self);
}
