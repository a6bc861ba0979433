//! Repository registry.
//!
//! The manager is an explicit value: build it with the host collaborators,
//! register every repository, then hand out models. Relation sources find
//! their target repositories through it.

use crate::errors::{EntimapError, Result};
use crate::host::Host;
use crate::repository::Repository;
use crate::schema::ModelKind;
use crate::storage::{DefaultStorageFactory, StorageFactory};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Builds a repository on first request.
pub type RepositoryBuilder = Box<dyn Fn(&Manager) -> Result<Box<dyn Repository>>>;

struct ManagerInner {
    host: Host,
    storage_factory: Box<dyn StorageFactory>,
    by_model: RefCell<HashMap<ModelKind, Rc<dyn Repository>>>,
    by_name: RefCell<HashMap<String, Rc<dyn Repository>>>,
    builders: RefCell<HashMap<String, RepositoryBuilder>>,
}

/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct Manager {
    inner: Rc<ManagerInner>,
}

/// Non-owning handle kept by repositories.
#[derive(Clone)]
pub struct WeakManager {
    inner: Weak<ManagerInner>,
}

impl WeakManager {
    pub fn upgrade(&self) -> Option<Manager> {
        self.inner.upgrade().map(|inner| Manager { inner })
    }
}

impl Manager {
    pub fn new(host: Host) -> Self {
        Self::with_storage_factory(host, DefaultStorageFactory)
    }

    pub fn with_storage_factory(host: Host, factory: impl StorageFactory + 'static) -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                host,
                storage_factory: Box::new(factory),
                by_model: RefCell::new(HashMap::new()),
                by_name: RefCell::new(HashMap::new()),
                builders: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn host(&self) -> &Host {
        &self.inner.host
    }

    pub fn downgrade(&self) -> WeakManager {
        WeakManager {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Bind `repository` to its model kind and name, attaching this manager
    /// and a fresh identity storage. A later registration for the same kind
    /// replaces the earlier one.
    pub fn register_repository<R: Repository + 'static>(&self, repository: R) -> Rc<dyn Repository> {
        self.register_shared(Rc::new(repository))
    }

    pub fn register_shared(&self, repository: Rc<dyn Repository>) -> Rc<dyn Repository> {
        repository.attach(self.downgrade(), self.inner.storage_factory.create());
        tracing::debug!(
            repository = repository.name(),
            model = %repository.kind(),
            "repository registered"
        );
        self.inner
            .by_model
            .borrow_mut()
            .insert(repository.kind(), Rc::clone(&repository));
        self.inner
            .by_name
            .borrow_mut()
            .insert(repository.name().to_string(), Rc::clone(&repository));
        repository
    }

    /// Register a lazily built repository reachable by `name`.
    pub fn register_builder<F>(&self, name: &str, builder: F)
    where
        F: Fn(&Manager) -> Result<Box<dyn Repository>> + 'static,
    {
        self.inner
            .builders
            .borrow_mut()
            .insert(name.to_string(), Box::new(builder));
    }

    /// # Errors
    ///
    /// `RepositoryNotRegistered` when nothing is bound to `kind`.
    pub fn get_model_repository(&self, kind: ModelKind) -> Result<Rc<dyn Repository>> {
        self.inner
            .by_model
            .borrow()
            .get(&kind)
            .cloned()
            .ok_or_else(|| EntimapError::RepositoryNotRegistered {
                model: kind.to_string(),
            })
    }

    /// Repository registered under `name`, building it on first request.
    /// A built repository is memoized and, unless another repository
    /// already serves its model kind, bound to that kind too.
    ///
    /// # Errors
    ///
    /// `RepositoryNotRegistered` when neither a repository nor a builder is
    /// known by `name`; builder failures propagate.
    pub fn get_repository(&self, name: &str) -> Result<Rc<dyn Repository>> {
        if let Some(repository) = self.inner.by_name.borrow().get(name) {
            return Ok(Rc::clone(repository));
        }
        let built = {
            let builders = self.inner.builders.borrow();
            let builder = builders
                .get(name)
                .ok_or_else(|| EntimapError::RepositoryNotRegistered {
                    model: name.to_string(),
                })?;
            builder(self)?
        };
        let repository: Rc<dyn Repository> = Rc::from(built);
        repository.attach(self.downgrade(), self.inner.storage_factory.create());
        self.inner
            .by_model
            .borrow_mut()
            .entry(repository.kind())
            .or_insert_with(|| Rc::clone(&repository));
        self.inner
            .by_name
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&repository));
        tracing::debug!(repository = name, model = %repository.kind(), "repository built");
        Ok(repository)
    }

    pub fn registered_models(&self) -> Vec<ModelKind> {
        let mut kinds: Vec<ModelKind> = self.inner.by_model.borrow().keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Empty every repository's identity storage.
    pub fn flush_storage(&self) {
        for repository in self.inner.by_name.borrow().values() {
            repository.context().flush_storage();
        }
        for repository in self.inner.by_model.borrow().values() {
            repository.context().flush_storage();
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("models", &self.registered_models())
            .field("host", &self.inner.host)
            .finish()
    }
}
