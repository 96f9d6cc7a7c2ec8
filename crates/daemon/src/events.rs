use std::fmt;
use std::path::PathBuf;

use log::Level;
use oscvars::DirectoryEvent;

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Directory(DirectoryEvent),
    Applied { group: String, count: usize },
    Saved { path: PathBuf },
    Resent { group: String, count: usize },
    Error { message: String },
}

impl MonitorEvent {
    pub fn level(&self) -> Level {
        match self {
            MonitorEvent::Directory(DirectoryEvent::BindFailed { .. }) => Level::Error,
            MonitorEvent::Directory(DirectoryEvent::RecordSkipped { .. }) => Level::Warn,
            MonitorEvent::Directory(_) => Level::Info,
            MonitorEvent::Applied { .. } => Level::Debug,
            MonitorEvent::Saved { .. } | MonitorEvent::Resent { .. } => Level::Info,
            MonitorEvent::Error { .. } => Level::Error,
        }
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEvent::Directory(event) => match event {
                DirectoryEvent::GroupCreated { id, name, mode } => {
                    write!(f, "Created {} group '{}' ({})", mode.as_str(), name, id)
                }
                DirectoryEvent::GroupDeleted { id, name } => {
                    write!(f, "Deleted group '{}' ({})", name, id)
                }
                DirectoryEvent::ConnectionBound { name, endpoint } => {
                    write!(f, "'{}' bound {}", name, endpoint)
                }
                DirectoryEvent::BindFailed { name, endpoint } => {
                    write!(f, "'{}' failed to bind {}", name, endpoint)
                }
                DirectoryEvent::RecordSkipped { index, reason } => {
                    write!(f, "Skipped group record {}: {}", index, reason)
                }
                DirectoryEvent::ConfigLoaded { groups, skipped } => {
                    write!(f, "Loaded {} group(s), skipped {}", groups, skipped)
                }
            },
            MonitorEvent::Applied { group, count } => {
                write!(f, "'{}' applied {} update(s)", group, count)
            }
            MonitorEvent::Saved { path } => {
                write!(f, "Saved configuration to {}", path.display())
            }
            MonitorEvent::Resent { group, count } => {
                write!(f, "'{}' resent {} variable(s)", group, count)
            }
            MonitorEvent::Error { message } => f.write_str(message),
        }
    }
}

impl From<DirectoryEvent> for MonitorEvent {
    fn from(event: DirectoryEvent) -> Self {
        MonitorEvent::Directory(event)
    }
}
