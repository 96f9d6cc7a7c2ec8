use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{ConfigDocument, ConfigError, GroupRecord, RawDocument};
use crate::group::{Group, GroupError, GroupId, TickReport, ViewId};
use crate::host::{HostFramework, SCHEMA_CATEGORY, SchemaKey, View};
use crate::net::{BoundState, ConnectionOptions, Endpoint, Mode};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DirectoryError {
    #[error("group name must not be empty")]
    EmptyName,
    #[error("group '{0}' already exists")]
    DuplicateName(String),
    #[error("no group named '{0}'")]
    UnknownGroup(String),
    #[error("group {0} no longer exists")]
    GroupGone(GroupId),
    #[error(transparent)]
    Group(#[from] GroupError),
}

#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    GroupCreated {
        id: GroupId,
        name: String,
        mode: Mode,
    },
    GroupDeleted {
        id: GroupId,
        name: String,
    },
    ConnectionBound {
        name: String,
        endpoint: Endpoint,
    },
    BindFailed {
        name: String,
        endpoint: Endpoint,
    },
    RecordSkipped {
        index: usize,
        reason: String,
    },
    ConfigLoaded {
        groups: usize,
        skipped: usize,
    },
}

/// Non-owning reference from a host view to its group, resolved at use time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle {
    pub group: GroupId,
    pub view: ViewId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<(usize, String)>,
    /// Parameters left out of a loaded group: group name and parameter index.
    pub ignored_parameters: Vec<(String, usize)>,
}

/// Owns every live group. Names are unique across live groups.
pub struct GroupDirectory {
    host: Arc<dyn HostFramework>,
    options: ConnectionOptions,
    groups: BTreeMap<GroupId, Arc<Group>>,
    next_id: u64,
    events: Vec<DirectoryEvent>,
}

impl GroupDirectory {
    pub fn new(host: Arc<dyn HostFramework>) -> Self {
        Self::with_options(host, ConnectionOptions::default())
    }

    pub fn with_options(host: Arc<dyn HostFramework>, options: ConnectionOptions) -> Self {
        Self {
            host,
            options,
            groups: BTreeMap::new(),
            next_id: 1,
            events: Vec::new(),
        }
    }

    pub fn create_group(
        &mut self,
        name: &str,
        endpoint: Endpoint,
    ) -> Result<Arc<Group>, DirectoryError> {
        if name.is_empty() {
            return Err(DirectoryError::EmptyName);
        }
        if self.find(name).is_some() {
            return Err(DirectoryError::DuplicateName(name.to_string()));
        }

        let id = GroupId(self.next_id);
        self.next_id += 1;

        let mode = endpoint.mode();
        let group = Arc::new(Group::new(id, name, endpoint, self.options));
        self.groups.insert(id, group.clone());

        self.reset_group(&group);
        self.host
            .register_schema_kind(SCHEMA_CATEGORY, &SchemaKey::new(mode, name), id);

        log::info!("Created {} group '{}' ({})", mode.as_str(), name, id);
        self.events.push(DirectoryEvent::GroupCreated {
            id,
            name: name.to_string(),
            mode,
        });

        Ok(group)
    }

    /// Returns false if no group of that name exists.
    pub fn delete_group(&mut self, name: &str) -> bool {
        let Some(id) = self.find(name).map(|g| g.id()) else {
            return false;
        };
        let Some(group) = self.groups.remove(&id) else {
            return false;
        };

        let key = SchemaKey::new(group.mode(), name);
        group.teardown();
        self.host.unregister_schema_kind(SCHEMA_CATEGORY, &key);

        log::info!("Deleted group '{}' ({})", name, id);
        self.events.push(DirectoryEvent::GroupDeleted {
            id,
            name: name.to_string(),
        });
        true
    }

    pub fn resolve(&self, id: GroupId) -> Result<Arc<Group>, DirectoryError> {
        self.groups
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::GroupGone(id))
    }

    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.find(name).cloned()
    }

    /// Live groups in creation order.
    pub fn groups(&self) -> Vec<Arc<Group>> {
        self.groups.values().cloned().collect()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.values().map(|g| g.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Arc<Group>> {
        self.groups.values().find(|g| g.name() == name)
    }

    fn lookup(&self, name: &str) -> Result<Arc<Group>, DirectoryError> {
        self.group(name)
            .ok_or_else(|| DirectoryError::UnknownGroup(name.to_string()))
    }

    /// Points a group at a new endpoint. A mode change also re-keys its schema kind.
    pub fn reconfigure_group(
        &mut self,
        name: &str,
        endpoint: Endpoint,
    ) -> Result<BoundState, DirectoryError> {
        let group = self.lookup(name)?;
        let old_mode = group.mode();
        let new_mode = endpoint.mode();

        if old_mode == new_mode {
            let state = group.reconfigure(endpoint)?;
            self.record_bind(&group, state);
            return Ok(state);
        }

        self.host
            .unregister_schema_kind(SCHEMA_CATEGORY, &SchemaKey::new(old_mode, name));
        let result = group.switch_endpoint(endpoint);
        let mode = group.mode();
        self.host
            .register_schema_kind(SCHEMA_CATEGORY, &SchemaKey::new(mode, name), group.id());

        let state = result?;
        log::info!("Group '{}' switched from {} to {}", name, old_mode, mode);
        self.record_bind(&group, state);
        Ok(state)
    }

    /// Unbinds and rebinds the group's socket on its current endpoint.
    pub fn reset_connection(&mut self, name: &str) -> Result<BoundState, DirectoryError> {
        let group = self.lookup(name)?;
        Ok(self.reset_group(&group))
    }

    fn reset_group(&mut self, group: &Group) -> BoundState {
        let state = group.reset_connection();
        self.record_bind(group, state);
        state
    }

    fn record_bind(&mut self, group: &Group, state: BoundState) {
        let name = group.name().to_string();
        let endpoint = group.endpoint();
        match state {
            BoundState::Bound => self
                .events
                .push(DirectoryEvent::ConnectionBound { name, endpoint }),
            BoundState::BindFailed => self
                .events
                .push(DirectoryEvent::BindFailed { name, endpoint }),
            BoundState::Unbound => {}
        }
    }

    pub fn attach_view(
        &self,
        name: &str,
        view: Box<dyn View>,
    ) -> Result<ViewHandle, DirectoryError> {
        let group = self.lookup(name)?;
        let view = group.attach_view(view)?;
        Ok(ViewHandle {
            group: group.id(),
            view,
        })
    }

    pub fn detach_view(&self, handle: ViewHandle) -> Result<bool, DirectoryError> {
        Ok(self.resolve(handle.group)?.detach_view(handle.view))
    }

    /// Runs one dispatcher tick on every receiver group.
    pub fn tick_all(&self) -> Vec<(GroupId, TickReport)> {
        self.groups
            .values()
            .filter(|g| g.mode() == Mode::Receiver)
            .map(|g| (g.id(), g.tick()))
            .collect()
    }

    /// Deletes every group.
    pub fn clear(&mut self) {
        for name in self.group_names() {
            self.delete_group(&name);
        }
    }

    pub fn drain_events(&mut self) -> Vec<DirectoryEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn to_document(&self) -> ConfigDocument {
        ConfigDocument {
            groups: self
                .groups
                .values()
                .map(|g| GroupRecord::from_group(g))
                .collect(),
            ..Default::default()
        }
    }

    /// Replaces every group with those described by `doc`.
    ///
    /// A record that fails to parse or build is skipped and any group it
    /// partially created is deleted again; other records are unaffected.
    /// Parameters without a name or with an unknown type are left out of
    /// their group without failing it.
    pub fn load_document(&mut self, doc: RawDocument) -> LoadReport {
        self.clear();

        let mut report = LoadReport::default();
        for (index, record) in doc.records().enumerate() {
            let outcome = record
                .map_err(|e| e.to_string())
                .and_then(|record| self.build_record(&record).map_err(|e| e.to_string()));

            match outcome {
                Ok((name, ignored)) => {
                    report
                        .ignored_parameters
                        .extend(ignored.into_iter().map(|i| (name.clone(), i)));
                    report.loaded.push(name);
                }
                Err(reason) => {
                    log::warn!("Skipped group record {}: {}", index, reason);
                    self.events.push(DirectoryEvent::RecordSkipped {
                        index,
                        reason: reason.clone(),
                    });
                    report.skipped.push((index, reason));
                }
            }
        }

        log::info!(
            "Loaded {} group(s), skipped {}",
            report.loaded.len(),
            report.skipped.len()
        );
        self.events.push(DirectoryEvent::ConfigLoaded {
            groups: report.loaded.len(),
            skipped: report.skipped.len(),
        });
        report
    }

    fn build_record(
        &mut self,
        record: &GroupRecord,
    ) -> Result<(String, Vec<usize>), DirectoryError> {
        let group = self.create_group(&record.name, record.endpoint())?;

        let mut ignored = Vec::new();
        let bulk = group.suppress();
        for (index, parameter) in record.parameters.iter().enumerate() {
            let Some(spec) = parameter.spec() else {
                log::warn!(
                    "Group '{}': ignoring parameter {} ('{}') with no name or an unknown type",
                    record.name,
                    index,
                    parameter.name
                );
                ignored.push(index);
                continue;
            };
            if let Err(e) = group.add_variable(spec) {
                self.delete_group(&record.name);
                drop(bulk);
                return Err(e.into());
            }
        }
        bulk.finish();

        Ok((record.name.clone(), ignored))
    }

    pub fn save_config(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        self.to_document().save(path)?;
        log::info!("Saved {} group(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Reads `path` and replaces the group set. A file that cannot be read or
    /// parsed leaves the current groups untouched.
    pub fn load_config(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, ConfigError> {
        let doc = RawDocument::read(path)?;
        Ok(self.load_document(doc))
    }
}

impl Drop for GroupDirectory {
    fn drop(&mut self) {
        self.clear();
    }
}
