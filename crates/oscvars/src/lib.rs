//! Synchronizes named, typed variables with an external process over OSC/UDP.
//!
//! A [`GroupDirectory`] owns named groups. Each [`Group`] binds one UDP endpoint as
//! either a sender, pushing local changes out, or a receiver, applying inbound
//! messages once per tick.

pub mod config;
pub mod directory;
pub mod group;
pub mod host;
pub mod net;
pub mod variable;

pub use config::{ConfigDocument, ConfigError, GroupRecord, ParameterRecord, RawDocument};
pub use directory::{DirectoryError, DirectoryEvent, GroupDirectory, LoadReport, ViewHandle};
pub use group::{BulkUpdate, Group, GroupError, GroupId, TickReport, ViewId};
pub use host::{FieldFlags, HostFramework, SCHEMA_CATEGORY, SchemaKey, View, endpoint_fields};
pub use net::{BoundState, ConnectionOptions, Endpoint, Mode, NetworkStats, OscArg, OscMessage};
pub use variable::{Bounds, Value, Variable, VariableError, VariableKind, VariableSpec};
