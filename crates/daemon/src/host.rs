use parking_lot::Mutex;

use oscvars::{GroupId, HostFramework, SchemaKey};

/// Stand-in host that only records which schema kinds are registered.
#[derive(Default)]
pub struct LogHost {
    kinds: Mutex<Vec<(SchemaKey, GroupId)>>,
}

impl LogHost {
    pub fn kind_count(&self) -> usize {
        self.kinds.lock().len()
    }
}

impl HostFramework for LogHost {
    fn register_schema_kind(&self, category: &str, key: &SchemaKey, group: GroupId) {
        log::debug!("Registered '{}' under {} for group {}", key, category, group);
        self.kinds.lock().push((key.clone(), group));
    }

    fn unregister_schema_kind(&self, category: &str, key: &SchemaKey) {
        log::debug!("Unregistered '{}' from {}", key, category);
        self.kinds.lock().retain(|(k, _)| k != key);
    }
}
