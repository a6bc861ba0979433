//! Persistence gateways.
//!
//! A [`Repository`] owns one model kind. It turns host records into
//! [`Model`]s and drives the save protocol ([`save_model`]).
//! [`EntityRepository`] serves every host entity family;
//! table-backed repositories live in the store crate.

mod entity;
mod query;
mod save;

pub use entity::{EntityConfig, EntityRepository, MetaBinding};
pub use query::{FindArgs, Page, Pagination};
pub use save::{save_model, RecordWriter};

use crate::errors::{EntimapError, Result};
use crate::host::{Lookup, RecordRef};
use crate::manager::{Manager, WeakManager};
use crate::model::{Model, Snapshot};
use crate::schema::{ModelKind, ModelSchema};
use crate::storage::IdentityStorage;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Manager handle and identity storage injected at registration.
#[derive(Default)]
pub struct RepositoryContext {
    manager: RefCell<Option<WeakManager>>,
    storage: RefCell<Option<Box<dyn IdentityStorage>>>,
}

impl RepositoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, manager: WeakManager, storage: Box<dyn IdentityStorage>) {
        *self.manager.borrow_mut() = Some(manager);
        *self.storage.borrow_mut() = Some(storage);
    }

    /// # Errors
    ///
    /// `RepositoryNotInitialized` before registration or after the manager
    /// is dropped.
    pub fn manager(&self, repository: &str) -> Result<Manager> {
        self.manager
            .borrow()
            .as_ref()
            .and_then(WeakManager::upgrade)
            .ok_or_else(|| EntimapError::RepositoryNotInitialized {
                repository: repository.to_string(),
            })
    }

    pub fn cached(&self, key: &str) -> Option<Snapshot> {
        self.storage.borrow().as_ref().and_then(|s| s.get(key))
    }

    pub fn remember(&self, key: &str, snapshot: Snapshot, other_keys: &[String]) {
        if let Some(storage) = self.storage.borrow_mut().as_mut() {
            storage.save(key, snapshot, other_keys);
        }
    }

    pub fn forget(&self, key: &str) {
        if let Some(storage) = self.storage.borrow_mut().as_mut() {
            storage.delete(key);
        }
    }

    pub fn flush_storage(&self) {
        if let Some(storage) = self.storage.borrow_mut().as_mut() {
            storage.flush();
        }
    }
}

pub trait Repository {
    fn kind(&self) -> ModelKind;

    /// Registry name; defaults to the model kind.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn schema(&self) -> Rc<ModelSchema>;

    fn context(&self) -> &RepositoryContext;

    /// Model field holding the primary key.
    fn primary_key_field(&self) -> &str {
        "id"
    }

    /// `Ok(None)` when no record matches.
    ///
    /// # Errors
    ///
    /// Host or SQL failures, depending on the backend.
    fn get(&self, lookup: Lookup) -> Result<Option<Model>>;

    /// # Errors
    ///
    /// `CouldNotPersist` when the host write fails; the model is left
    /// untouched in that case.
    fn save(&self, model: &mut Model) -> Result<()>;

    /// # Errors
    ///
    /// `CouldNotPersist` when the host delete fails.
    fn delete(&self, model: &mut Model) -> Result<bool>;

    /// # Errors
    ///
    /// Host or SQL failures, depending on the backend.
    fn find(&self, args: &FindArgs) -> Result<Vec<Model>>;

    fn attach(&self, manager: WeakManager, storage: Box<dyn IdentityStorage>) {
        self.context().attach(manager, storage);
    }

    /// # Errors
    ///
    /// `RepositoryNotInitialized` when not registered with a manager.
    fn manager(&self) -> Result<Manager> {
        self.context().manager(self.name())
    }

    /// Wrap an already fetched record.
    ///
    /// # Errors
    ///
    /// `RepositoryNotInitialized` when not registered with a manager.
    fn hydrate(&self, record: RecordRef) -> Result<Model> {
        Ok(Model::new(self.schema(), self.manager()?, Some(record)))
    }

    /// A new, unsaved model with `data` written through the normal set path.
    /// Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Write errors such as `ReadOnlyViolation`.
    fn create(&self, data: &[(&str, Value)]) -> Result<Model> {
        let mut model = Model::new(self.schema(), self.manager()?, None);
        for (name, value) in data {
            if model.contains(name) {
                model.set(name, value.clone())?;
            }
        }
        Ok(model)
    }

    /// # Errors
    ///
    /// See [`Repository::find`].
    fn find_by_ids(&self, ids: &[Value]) -> Result<Vec<Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.find(&FindArgs::new().include(ids.to_vec()))
    }

    /// # Errors
    ///
    /// See [`Repository::find`].
    fn find_all(&self) -> Result<Vec<Model>> {
        self.find(&FindArgs::new())
    }

    /// Models of this repository whose `parent_key` field holds the
    /// primary key of `parent`.
    ///
    /// # Errors
    ///
    /// See [`Repository::find`].
    fn find_children_of(&self, parent: &mut Model, parent_key: &str) -> Result<Vec<Model>> {
        let parent_id = parent.primary_key()?;
        if parent_id.is_empty() {
            return Ok(Vec::new());
        }
        let schema = self.schema();
        let filter = schema.target_name(parent_key).to_string();
        self.find(&FindArgs::new().filter(&filter, parent_id))
    }

    /// Taxonomy whose terms this repository serves, if any.
    fn taxonomy_name(&self) -> Option<&str> {
        None
    }

    /// Models of this repository that carry `term`.
    ///
    /// # Errors
    ///
    /// `RepositoryMethodNotImplemented` unless the repository reads term
    /// assignments and `term` belongs to a taxonomy repository.
    fn find_by_term(&self, term: &mut Model) -> Result<Vec<Model>> {
        let _ = term;
        Err(EntimapError::not_implemented(self.name(), "find_by_term"))
    }

    /// # Errors
    ///
    /// `RepositoryMethodNotImplemented` unless the repository serves a taxonomy.
    fn find_terms_of(&self, model: &mut Model) -> Result<Vec<Model>> {
        let _ = model;
        Err(EntimapError::not_implemented(self.name(), "find_terms_of"))
    }

    /// # Errors
    ///
    /// `RepositoryMethodNotImplemented` unless the repository serves a taxonomy.
    fn assign_terms(&self, model: &mut Model, terms: &mut [Model]) -> Result<()> {
        let _ = (model, terms);
        Err(EntimapError::not_implemented(self.name(), "assign_terms"))
    }

    /// Side-store read for a meta-backed field. Repositories without meta
    /// resolve every meta field to `Null`.
    ///
    /// # Errors
    ///
    /// Implementations may fail when the primary key cannot be resolved.
    fn fetch_meta(&self, model: &mut Model, key: &str, single: bool) -> Result<Value> {
        let _ = (model, key, single);
        Ok(Value::Null)
    }

    /// Side-store write for a meta-backed field; `false` when nothing was
    /// written yet (e.g. the entity is unsaved).
    ///
    /// # Errors
    ///
    /// Implementations may fail when the primary key cannot be resolved.
    fn store_meta(&self, model: &mut Model, key: &str, value: &Value) -> Result<bool> {
        let _ = (model, key, value);
        Ok(false)
    }
}
