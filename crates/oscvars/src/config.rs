use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::group::Group;
use crate::net::{Endpoint, Mode};
use crate::variable::{VariableKind, VariableSpec};

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_SENDER_PORT: u16 = 8000;
pub const DEFAULT_RECEIVER_PORT: u16 = 9000;
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access configuration file: {0}")]
    Io(#[from] io::Error),
    #[error("configuration is not a valid document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported configuration version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    #[serde(default)]
    pub name: String,
    /// `None` when the stored type is missing or names no known kind.
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<VariableKind>,
}

impl ParameterRecord {
    /// The variable this record describes, if it has a name and a known type.
    pub fn spec(&self) -> Option<VariableSpec> {
        if self.name.is_empty() {
            return None;
        }
        self.kind.map(|kind| VariableSpec::new(&self.name, kind))
    }
}

fn lenient_kind<'de, D>(deserializer: D) -> Result<Option<VariableKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.and_then(|name| name.parse().ok()))
}

/// Persisted schema of one group. Values are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
}

impl GroupRecord {
    pub fn from_group(group: &Group) -> Self {
        let endpoint = group.endpoint();
        Self {
            name: group.name().to_string(),
            mode: endpoint.mode(),
            host: endpoint.host().map(str::to_string),
            port: Some(endpoint.port()),
            parameters: group
                .variables()
                .iter()
                .map(|v| ParameterRecord {
                    name: v.name().to_string(),
                    kind: Some(v.kind()),
                })
                .collect(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self.mode {
            Mode::Sender => Endpoint::Sender {
                host: self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: self.port.unwrap_or(DEFAULT_SENDER_PORT),
            },
            Mode::Receiver => Endpoint::Receiver {
                port: self.port.unwrap_or(DEFAULT_RECEIVER_PORT),
            },
        }
    }
}

fn default_mode() -> Mode {
    Mode::Sender
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub version: u32,
    pub groups: Vec<GroupRecord>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            groups: Vec::new(),
        }
    }
}

impl ConfigDocument {
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }
}

/// A document whose group records have not been validated yet.
///
/// Each record is parsed on its own so one malformed record does not reject
/// the rest of the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDocument {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub groups: Vec<serde_json::Value>,
}

fn current_version() -> u32 {
    CONFIG_VERSION
}

impl RawDocument {
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let doc: RawDocument = serde_json::from_str(json)?;
        if doc.version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(doc.version));
        }
        Ok(doc)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::parse(&json)
    }

    pub fn records(&self) -> impl Iterator<Item = Result<GroupRecord, serde_json::Error>> + '_ {
        self.groups
            .iter()
            .map(|value| GroupRecord::deserialize(value))
    }
}
