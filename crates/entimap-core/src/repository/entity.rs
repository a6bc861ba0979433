//! Repository over a host entity family.

use super::{save_model, FindArgs, Page, Pagination, RecordWriter, Repository, RepositoryContext};
use crate::errors::{EntimapError, Result};
use crate::host::{
    EntityStore, Host, HostError, HostResult, Lookup, MetaStore, Payload, RecordRef,
    TermAssignments,
};
use crate::model::Model;
use crate::schema::{ModelKind, ModelSchema};
use crate::value::Value;
use crate::log_op;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Where meta-backed fields live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaBinding {
    /// The family has no meta; meta fields resolve to their defaults
    None,
    /// The shared side store, under this entity type
    SideStore(String),
    /// Meta embedded in the record itself
    Record,
}

#[derive(Debug, Clone)]
pub struct EntityConfig {
    pub name: String,
    pub family: String,
    pub meta: MetaBinding,
    /// Model field holding the primary key
    pub primary_key: String,
    /// Filters every query and lookup must satisfy, by host name
    pub query_defaults: BTreeMap<String, Value>,
    /// Field values written into models built by `create`
    pub create_defaults: Vec<(String, Value)>,
    /// Set for taxonomy repositories
    pub taxonomy: Option<String>,
    pub refresh_after_save: bool,
}

impl EntityConfig {
    pub fn new(name: &str, family: &str) -> Self {
        Self {
            name: name.to_string(),
            family: family.to_string(),
            meta: MetaBinding::None,
            primary_key: "id".to_string(),
            query_defaults: BTreeMap::new(),
            create_defaults: Vec::new(),
            taxonomy: None,
            refresh_after_save: true,
        }
    }

    pub fn meta(mut self, meta: MetaBinding) -> Self {
        self.meta = meta;
        self
    }

    pub fn primary_key(mut self, field: &str) -> Self {
        self.primary_key = field.to_string();
        self
    }

    /// Scope queries to `host_field == value` and write `model_field` on create.
    pub fn scoped(mut self, host_field: &str, model_field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.query_defaults
            .insert(host_field.to_string(), value.clone());
        self.create_defaults.push((model_field.to_string(), value));
        self
    }

    pub fn taxonomy(mut self, taxonomy: &str) -> Self {
        self.taxonomy = Some(taxonomy.to_string());
        self
    }

    pub fn refresh_after_save(mut self, refresh: bool) -> Self {
        self.refresh_after_save = refresh;
        self
    }
}

pub struct EntityRepository {
    context: RepositoryContext,
    schema: Rc<ModelSchema>,
    config: EntityConfig,
    store: Rc<dyn EntityStore>,
    meta: Rc<dyn MetaStore>,
    terms: Rc<dyn TermAssignments>,
    last_query: Cell<Option<Pagination>>,
}

impl EntityRepository {
    /// # Errors
    ///
    /// `HostFailure` when `host` has no store for the configured family,
    /// `InvalidInput` when the primary key field is not declared.
    pub fn new(schema: ModelSchema, config: EntityConfig, host: &Host) -> Result<Self> {
        if !schema.contains(&config.primary_key) {
            return Err(EntimapError::InvalidInput {
                reason: format!(
                    "primary key {} is not a field of {}",
                    config.primary_key,
                    schema.kind()
                ),
            });
        }
        Ok(Self {
            context: RepositoryContext::new(),
            schema: Rc::new(schema),
            store: host.store(&config.family)?,
            meta: host.meta(),
            terms: host.terms(),
            config,
            last_query: Cell::new(None),
        })
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    /// Paging metadata of the last `find`.
    pub fn pagination(&self) -> Option<Pagination> {
        self.last_query.get()
    }

    /// # Errors
    ///
    /// See [`Repository::find`].
    pub fn find_paginated(&self, args: &FindArgs) -> Result<Page> {
        let items = self.find(args)?;
        let pagination = self
            .pagination()
            .unwrap_or_else(|| Pagination::from_query(args, items.len()));
        Ok(Page { pagination, items })
    }

    fn taxonomy(&self) -> Result<&str> {
        self.config
            .taxonomy
            .as_deref()
            .ok_or_else(|| EntimapError::not_implemented(self.name(), "taxonomy"))
    }

    fn in_scope(&self, record: &RecordRef) -> bool {
        let record = record.borrow();
        self.config.query_defaults.iter().all(|(field, expected)| {
            record
                .property(field)
                .map_or(true, |actual| actual.loose_eq(expected))
        })
    }

    fn host_failure(&self, operation: &str, err: HostError) -> EntimapError {
        EntimapError::HostFailure {
            operation: format!("{}.{operation}", self.config.family),
            detail: err.to_string(),
        }
    }

    fn identity_keys(&self, model: &mut Model) -> Result<(String, Vec<String>)> {
        let id = model.primary_key()?;
        let mut others = Vec::new();
        if self.schema.contains("slug") {
            let slug = model.get("slug")?;
            if !slug.is_empty() {
                others.push(Lookup::Slug(slug.to_text()).cache_key());
            }
        }
        Ok((Lookup::Id(id).cache_key(), others))
    }

    fn remember(&self, model: &mut Model) -> Result<()> {
        let (key, others) = self.identity_keys(model)?;
        self.context.remember(&key, model.snapshot(), &others);
        Ok(())
    }

    fn object_id(&self, model: &mut Model) -> Result<Value> {
        model.get(&self.config.primary_key)
    }

}

/// Unsaved models have no key to link by.
fn require_key(model: &Model, id: Value) -> Result<Value> {
    if !id.is_empty() {
        return Ok(id);
    }
    let column = model
        .repository()
        .map(|repository| repository.primary_key_field().to_string())
        .unwrap_or_else(|_| "id".to_string());
    Err(EntimapError::MissingPrimaryKey {
        model: model.kind().to_string(),
        column,
    })
}

impl Repository for EntityRepository {
    fn kind(&self) -> ModelKind {
        self.schema.kind()
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn schema(&self) -> Rc<ModelSchema> {
        Rc::clone(&self.schema)
    }

    fn context(&self) -> &RepositoryContext {
        &self.context
    }

    fn primary_key_field(&self) -> &str {
        &self.config.primary_key
    }

    fn get(&self, lookup: Lookup) -> Result<Option<Model>> {
        if lookup.is_empty() {
            return Ok(None);
        }
        let manager = self.manager()?;
        if let Some(snapshot) = self.context.cached(&lookup.cache_key()) {
            tracing::trace!(repository = self.name(), key = %lookup.cache_key(), "identity hit");
            return Ok(Some(Model::from_snapshot(snapshot, manager)));
        }
        let record = match self.store.fetch(&lookup) {
            Ok(Some(record)) if self.in_scope(&record) => record,
            Ok(_) => return Ok(None),
            Err(err) => {
                tracing::warn!(
                    repository = self.name(),
                    error = %err,
                    "fetch failed, treating as not found"
                );
                return Ok(None);
            }
        };
        let mut model = Model::new(self.schema(), manager, Some(record));
        self.remember(&mut model)?;
        Ok(Some(model))
    }

    fn save(&self, model: &mut Model) -> Result<()> {
        let id = log_op!(
            "repository_save",
            save_model(self, self, model, self.config.refresh_after_save),
            repository = self.name()
        )?;
        self.context.forget(&Lookup::Id(id).cache_key());
        Ok(())
    }

    fn delete(&self, model: &mut Model) -> Result<bool> {
        let id = model.primary_key()?;
        if id.is_empty() {
            return Ok(false);
        }
        let deleted = log_op!(
            "repository_delete",
            self.store.delete(&id).map_err(|err| EntimapError::CouldNotPersist {
                model: self.name().to_string(),
                detail: err.to_string(),
            }),
            repository = self.name()
        )?;
        self.context.forget(&Lookup::Id(id).cache_key());
        Ok(deleted)
    }

    fn find(&self, args: &FindArgs) -> Result<Vec<Model>> {
        let args = args.with_defaults(&self.config.query_defaults);
        let result = self
            .store
            .query(&args)
            .map_err(|err| self.host_failure("query", err))?;
        self.last_query
            .set(Some(Pagination::from_query(&args, result.found)));
        let manager = self.manager()?;
        result
            .records
            .into_iter()
            .map(|record| {
                let mut model = Model::new(self.schema(), manager.clone(), Some(record));
                self.remember(&mut model)?;
                Ok(model)
            })
            .collect()
    }

    fn create(&self, data: &[(&str, Value)]) -> Result<Model> {
        let mut model = Model::new(self.schema(), self.manager()?, None);
        for (name, value) in &self.config.create_defaults {
            model.set(name, value.clone())?;
        }
        for (name, value) in data {
            if model.contains(name) {
                model.set(name, value.clone())?;
            }
        }
        Ok(model)
    }

    fn taxonomy_name(&self) -> Option<&str> {
        self.config.taxonomy.as_deref()
    }

    fn find_by_term(&self, term: &mut Model) -> Result<Vec<Model>> {
        let term_repository = term.repository()?;
        let taxonomy = term_repository
            .taxonomy_name()
            .ok_or_else(|| EntimapError::not_implemented(term_repository.name(), "taxonomy"))?;
        let term_id = term.primary_key()?;
        if term_id.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self
            .terms
            .objects_of(taxonomy, &term_id)
            .map_err(|err| self.host_failure("objects_of", err))?;
        self.find_by_ids(&ids)
    }

    fn find_terms_of(&self, model: &mut Model) -> Result<Vec<Model>> {
        let taxonomy = self.taxonomy()?;
        let object_id = model.primary_key()?;
        if object_id.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self
            .terms
            .terms_of(&object_id, taxonomy)
            .map_err(|err| self.host_failure("terms_of", err))?;
        self.find_by_ids(&ids)
    }

    fn assign_terms(&self, model: &mut Model, terms: &mut [Model]) -> Result<()> {
        let taxonomy = self.taxonomy()?;
        let object_id = model.primary_key()?;
        require_key(model, object_id.clone())?;
        let term_ids = terms
            .iter_mut()
            .map(|term| {
                let id = self.object_id(term)?;
                require_key(term, id)
            })
            .collect::<Result<Vec<_>>>()?;
        self.terms
            .set_terms(&object_id, taxonomy, &term_ids)
            .map_err(|err| EntimapError::CouldNotPersist {
                model: model.kind().to_string(),
                detail: err.to_string(),
            })
    }

    fn fetch_meta(&self, model: &mut Model, key: &str, single: bool) -> Result<Value> {
        match &self.config.meta {
            MetaBinding::None => Ok(Value::Null),
            MetaBinding::SideStore(meta_type) => {
                let id = self.object_id(model)?;
                if id.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(self.meta.get(meta_type, &id, key, single))
            }
            MetaBinding::Record => Ok(model
                .record()
                .and_then(|record| record.borrow().meta(key, single))
                .unwrap_or_default()),
        }
    }

    fn store_meta(&self, model: &mut Model, key: &str, value: &Value) -> Result<bool> {
        match &self.config.meta {
            MetaBinding::None => Ok(false),
            MetaBinding::SideStore(meta_type) => {
                let id = self.object_id(model)?;
                if id.is_empty() {
                    return Ok(false);
                }
                Ok(self.meta.set(meta_type, &id, key, value))
            }
            MetaBinding::Record => Ok(model
                .record()
                .map(|record| record.borrow_mut().set_meta(key, value.clone()))
                .unwrap_or(false)),
        }
    }
}

impl RecordWriter for EntityRepository {
    fn write(&self, existing: bool, key: &Value, payload: &Payload) -> HostResult<Value> {
        let side_meta = match &self.config.meta {
            MetaBinding::SideStore(meta_type) => Some(meta_type.as_str()),
            _ => None,
        };
        let primary = match side_meta {
            Some(_) => Payload {
                fields: payload.fields.clone(),
                meta: BTreeMap::new(),
            },
            None => payload.clone(),
        };
        let id = if existing {
            self.store.update(key, &primary)?
        } else {
            self.store.insert(&primary)?
        };
        if let Some(meta_type) = side_meta {
            for (meta_key, value) in &payload.meta {
                if !self.meta.set(meta_type, &id, meta_key, value) {
                    tracing::warn!(
                        repository = self.name(),
                        meta_type,
                        key = meta_key.as_str(),
                        "meta write rejected by host"
                    );
                }
            }
        }
        Ok(id)
    }

    fn reload(&self, key: &Value) -> Result<Option<RecordRef>> {
        self.store
            .fetch(&Lookup::Id(key.clone()))
            .map_err(|err| self.host_failure("fetch", err))
    }
}
