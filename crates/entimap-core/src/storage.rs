//! Identity storage: per-request cache of hydrated entities.
//!
//! Entries are [`Snapshot`]s, so a cached entity is rebuilt without a host
//! fetch and the storage never holds on to the manager.

use crate::model::Snapshot;
use std::collections::HashMap;

pub trait IdentityStorage {
    fn get(&self, key: &str) -> Option<Snapshot>;

    /// Store under `key`, reachable through `other_keys` as well.
    fn save(&mut self, key: &str, snapshot: Snapshot, other_keys: &[String]);

    /// Remove `key` and every alias pointing at the same entry.
    fn delete(&mut self, key: &str);

    fn flush(&mut self);
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    aliases: HashMap<String, String>,
    entries: HashMap<String, Snapshot>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn primary<'a>(&'a self, key: &'a str) -> &'a str {
        self.aliases.get(key).map(String::as_str).unwrap_or(key)
    }
}

impl IdentityStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<Snapshot> {
        self.entries.get(self.primary(key)).cloned()
    }

    fn save(&mut self, key: &str, snapshot: Snapshot, other_keys: &[String]) {
        for alias in other_keys.iter().filter(|alias| alias.as_str() != key) {
            self.aliases.insert(alias.clone(), key.to_string());
        }
        self.entries.insert(key.to_string(), snapshot);
    }

    fn delete(&mut self, key: &str) {
        let primary = self.primary(key).to_string();
        self.entries.remove(&primary);
        self.aliases.retain(|_, target| *target != primary);
    }

    fn flush(&mut self) {
        self.aliases.clear();
        self.entries.clear();
    }
}

/// Storage that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlankStorage;

impl IdentityStorage for BlankStorage {
    fn get(&self, _key: &str) -> Option<Snapshot> {
        None
    }

    fn save(&mut self, _key: &str, _snapshot: Snapshot, _other_keys: &[String]) {}

    fn delete(&mut self, _key: &str) {}

    fn flush(&mut self) {}
}

/// Creates one storage per registered repository.
pub trait StorageFactory {
    fn create(&self) -> Box<dyn IdentityStorage>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStorageFactory;

impl StorageFactory for DefaultStorageFactory {
    fn create(&self) -> Box<dyn IdentityStorage> {
        Box::new(MemoryStorage::new())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BlankStorageFactory;

impl StorageFactory for BlankStorageFactory {
    fn create(&self) -> Box<dyn IdentityStorage> {
        Box::new(BlankStorage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::host::Record;
    use crate::schema::{FieldDescriptor, FieldType, ModelKind, ModelSchema};
    use crate::{Manager, Model};
    use std::rc::Rc;

    fn snapshot() -> Snapshot {
        let schema = ModelSchema::builder(ModelKind::new("thing"))
            .field(FieldDescriptor::new("id", FieldType::Int))
            .build()
            .unwrap();
        let manager = Manager::new(MemoryHost::new().host());
        Model::new(Rc::new(schema), manager, Some(Record::new().into_ref())).snapshot()
    }

    #[test]
    fn aliases_resolve_to_the_primary_entry() {
        let mut storage = MemoryStorage::new();
        storage.save("id:1", snapshot(), &["slug:one".to_string()]);
        assert!(storage.get("slug:one").is_some());
        assert!(storage.get("id:1").is_some());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn delete_through_alias_drops_everything() {
        let mut storage = MemoryStorage::new();
        storage.save("id:1", snapshot(), &["slug:one".to_string()]);
        storage.delete("slug:one");
        assert!(storage.get("id:1").is_none());
        assert!(storage.get("slug:one").is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn blank_storage_never_hits() {
        let mut storage = BlankStorage;
        storage.save("id:1", snapshot(), &[]);
        assert!(storage.get("id:1").is_none());
    }
}
