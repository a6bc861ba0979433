//! In-memory host collaborators.
//!
//! Every store appends to a shared [`Journal`] so tests can assert which
//! host primitives ran, and in what order.

use super::{
    EntityStore, Host, HostError, HostResult, Lookup, MetaStore, OptionStore, Payload,
    QueryResult, Record, RecordRef, TermAssignments,
};
use crate::catalog::FAMILIES;
use crate::repository::FindArgs;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// One host primitive invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Fetch {
        family: String,
        lookup: Lookup,
    },
    Query {
        family: String,
    },
    Insert {
        family: String,
        payload: Payload,
    },
    Update {
        family: String,
        id: Value,
        payload: Payload,
    },
    Delete {
        family: String,
        id: Value,
    },
    MetaGet {
        meta_type: String,
        key: String,
    },
    MetaSet {
        meta_type: String,
        key: String,
        value: Value,
    },
    TermsOf {
        taxonomy: String,
    },
    ObjectsOf {
        taxonomy: String,
        term_id: Value,
    },
    SetTerms {
        taxonomy: String,
        object_id: Value,
        term_ids: Vec<Value>,
    },
}

impl HostCall {
    pub fn is_primary_write(&self) -> bool {
        matches!(self, HostCall::Insert { .. } | HostCall::Update { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<HostCall>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: HostCall) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.0.borrow().clone()
    }

    pub fn count<F: Fn(&HostCall) -> bool>(&self, predicate: F) -> usize {
        self.0.borrow().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Entity store for one family. Fetches hand out copies, like a platform
/// returning a fresh object per call.
#[derive(Debug)]
pub struct MemoryEntityStore {
    family: String,
    id_property: String,
    slug_property: Option<String>,
    accessor_backed: bool,
    records: RefCell<Vec<Record>>,
    next_id: Cell<i64>,
    fail_next: RefCell<Option<HostError>>,
    journal: Journal,
}

impl MemoryEntityStore {
    pub fn new(family: &str, id_property: &str) -> Self {
        Self {
            family: family.to_string(),
            id_property: id_property.to_string(),
            slug_property: None,
            accessor_backed: false,
            records: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            fail_next: RefCell::new(None),
            journal: Journal::new(),
        }
    }

    pub fn with_slug(mut self, slug_property: &str) -> Self {
        self.slug_property = Some(slug_property.to_string());
        self
    }

    /// Store written fields as accessor data instead of properties.
    pub fn accessor_backed(mut self) -> Self {
        self.accessor_backed = true;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Add a record without journaling. Assigns an id when it has none.
    pub fn seed(&self, mut record: Record) -> Value {
        let existing = record
            .value(&self.id_property)
            .filter(|id| !id.is_empty())
            .cloned();
        let id = match existing {
            Some(id) => id,
            None => {
                let id = Value::Int(self.next_id.get());
                if self.accessor_backed {
                    record.insert_data(&self.id_property, id.clone());
                } else {
                    record = record.with(&self.id_property, id.clone());
                }
                id
            }
        };
        if let Value::Int(n) = id {
            self.next_id.set(self.next_id.get().max(n + 1));
        }
        self.records.borrow_mut().push(record);
        id
    }

    /// Make the next insert, update or delete fail with `error`.
    pub fn fail_next(&self, error: HostError) {
        *self.fail_next.borrow_mut() = Some(error);
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.borrow().clone()
    }

    pub fn record(&self, id: &Value) -> Option<Record> {
        self.records
            .borrow()
            .iter()
            .find(|r| self.has_id(r, id))
            .cloned()
    }

    fn has_id(&self, record: &Record, id: &Value) -> bool {
        record
            .value(&self.id_property)
            .is_some_and(|own| own.loose_eq(id))
    }

    fn matches(&self, record: &Record, lookup: &Lookup) -> bool {
        match lookup {
            Lookup::Id(id) => self.has_id(record, id),
            Lookup::Slug(slug) => self
                .slug_property
                .as_deref()
                .and_then(|prop| record.value(prop))
                .is_some_and(|own| own.to_text() == *slug),
            Lookup::By { field, value } => {
                record.value(field).is_some_and(|own| own.loose_eq(value))
            }
        }
    }

    fn take_failure(&self) -> HostResult<()> {
        match self.fail_next.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn passes_filters(&self, record: &Record, args: &FindArgs) -> bool {
        let filters_hold = args.filters.iter().all(|(key, expected)| {
            let actual = record.value(key);
            match expected {
                Value::Array(options) => {
                    actual.is_some_and(|a| options.iter().any(|o| a.loose_eq(o)))
                }
                Value::Null => actual.map_or(true, Value::is_null),
                other => actual.is_some_and(|a| a.loose_eq(other)),
            }
        });
        let included = args
            .include
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| self.has_id(record, id)));
        filters_hold && included
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.cloned().unwrap_or_default();
    let b = b.cloned().unwrap_or_default();
    if a.is_numeric() && b.is_numeric() {
        let (x, y) = (a.to_text().parse::<f64>(), b.to_text().parse::<f64>());
        if let (Ok(x), Ok(y)) = (x, y) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    a.to_text().cmp(&b.to_text())
}

impl EntityStore for MemoryEntityStore {
    fn fetch(&self, lookup: &Lookup) -> HostResult<Option<RecordRef>> {
        self.journal.record(HostCall::Fetch {
            family: self.family.clone(),
            lookup: lookup.clone(),
        });
        Ok(self
            .records
            .borrow()
            .iter()
            .find(|r| self.matches(r, lookup))
            .map(|r| r.clone().into_ref()))
    }

    fn query(&self, args: &FindArgs) -> HostResult<QueryResult> {
        self.journal.record(HostCall::Query {
            family: self.family.clone(),
        });
        let records = self.records.borrow();
        let mut matched: Vec<&Record> = records
            .iter()
            .filter(|r| self.passes_filters(r, args))
            .collect();

        if !args.order_by.is_empty() {
            matched.sort_by(|a, b| {
                args.order_by
                    .iter()
                    .map(|spec| {
                        let mut parts = spec.split_whitespace();
                        let field = parts.next().unwrap_or_default();
                        let descending = parts
                            .next()
                            .is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));
                        let ordering = compare_values(a.value(field), b.value(field));
                        if descending {
                            ordering.reverse()
                        } else {
                            ordering
                        }
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        } else if let Some(ids) = &args.include {
            matched.sort_by_key(|r| ids.iter().position(|id| self.has_id(r, id)));
        }

        let found = matched.len();
        let limit = args.limit.unwrap_or(usize::MAX);
        Ok(QueryResult {
            records: matched
                .into_iter()
                .skip(args.effective_offset())
                .take(limit)
                .map(|r| r.clone().into_ref())
                .collect(),
            found,
        })
    }

    fn insert(&self, payload: &Payload) -> HostResult<Value> {
        self.take_failure()?;
        let id = Value::Int(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        let mut record = Record::new();
        if self.accessor_backed {
            for (name, value) in &payload.fields {
                record.insert_data(name, value.clone());
            }
            record.insert_data(&self.id_property, id.clone());
        } else {
            record = record.with(&self.id_property, id.clone());
        }
        record.merge(payload);
        self.records.borrow_mut().push(record);
        self.journal.record(HostCall::Insert {
            family: self.family.clone(),
            payload: payload.clone(),
        });
        Ok(id)
    }

    fn update(&self, id: &Value, payload: &Payload) -> HostResult<Value> {
        self.take_failure()?;
        let mut records = self.records.borrow_mut();
        let record = records
            .iter_mut()
            .find(|r| self.has_id(r, id))
            .ok_or_else(|| HostError::new("invalid_id", format!("no {} with id {id}", self.family)))?;
        record.merge(payload);
        self.journal.record(HostCall::Update {
            family: self.family.clone(),
            id: id.clone(),
            payload: payload.clone(),
        });
        Ok(id.clone())
    }

    fn delete(&self, id: &Value) -> HostResult<bool> {
        self.take_failure()?;
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|r| !self.has_id(r, id));
        self.journal.record(HostCall::Delete {
            family: self.family.clone(),
            id: id.clone(),
        });
        Ok(records.len() < before)
    }
}

/// Meta side store with a read counter.
#[derive(Debug, Default)]
pub struct MemoryMetaStore {
    entries: RefCell<BTreeMap<(String, String, String), Vec<Value>>>,
    reads: Cell<usize>,
    rejected: RefCell<BTreeSet<String>>,
    journal: Journal,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn seed(&self, meta_type: &str, id: &Value, key: &str, value: impl Into<Value>) {
        self.entries
            .borrow_mut()
            .entry(Self::slot(meta_type, id, key))
            .or_default()
            .push(value.into());
    }

    /// Make every later `set` of `key` fail.
    pub fn reject_key(&self, key: &str) {
        self.rejected.borrow_mut().insert(key.to_string());
    }

    /// Number of `get` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn value(&self, meta_type: &str, id: &Value, key: &str) -> Option<Value> {
        self.entries
            .borrow()
            .get(&Self::slot(meta_type, id, key))
            .and_then(|values| values.first().cloned())
    }

    fn slot(meta_type: &str, id: &Value, key: &str) -> (String, String, String) {
        (meta_type.to_string(), id.to_text(), key.to_string())
    }
}

impl MetaStore for MemoryMetaStore {
    fn get(&self, meta_type: &str, id: &Value, key: &str, single: bool) -> Value {
        self.reads.set(self.reads.get() + 1);
        self.journal.record(HostCall::MetaGet {
            meta_type: meta_type.to_string(),
            key: key.to_string(),
        });
        let entries = self.entries.borrow();
        let values = entries.get(&Self::slot(meta_type, id, key));
        match (values, single) {
            (Some(values), true) => values.first().cloned().unwrap_or_default(),
            (Some(values), false) => Value::Array(values.clone()),
            (None, true) => Value::Null,
            (None, false) => Value::Array(Vec::new()),
        }
    }

    fn set(&self, meta_type: &str, id: &Value, key: &str, value: &Value) -> bool {
        if self.rejected.borrow().contains(key) {
            return false;
        }
        self.entries
            .borrow_mut()
            .insert(Self::slot(meta_type, id, key), vec![value.clone()]);
        self.journal.record(HostCall::MetaSet {
            meta_type: meta_type.to_string(),
            key: key.to_string(),
            value: value.clone(),
        });
        true
    }
}

#[derive(Debug, Default)]
pub struct MemoryTermAssignments {
    assignments: RefCell<BTreeMap<(String, String), Vec<Value>>>,
    journal: Journal,
}

impl MemoryTermAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn seed(&self, object_id: &Value, taxonomy: &str, term_ids: Vec<Value>) {
        self.assignments
            .borrow_mut()
            .insert((object_id.to_text(), taxonomy.to_string()), term_ids);
    }
}

impl TermAssignments for MemoryTermAssignments {
    fn terms_of(&self, object_id: &Value, taxonomy: &str) -> HostResult<Vec<Value>> {
        self.journal.record(HostCall::TermsOf {
            taxonomy: taxonomy.to_string(),
        });
        Ok(self
            .assignments
            .borrow()
            .get(&(object_id.to_text(), taxonomy.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn objects_of(&self, taxonomy: &str, term_id: &Value) -> HostResult<Vec<Value>> {
        self.journal.record(HostCall::ObjectsOf {
            taxonomy: taxonomy.to_string(),
            term_id: term_id.clone(),
        });
        Ok(self
            .assignments
            .borrow()
            .iter()
            .filter(|((_, assigned_in), term_ids)| {
                assigned_in == taxonomy && term_ids.iter().any(|id| id.loose_eq(term_id))
            })
            .map(|((object_id, _), _)| Value::from(object_id.as_str()))
            .collect())
    }

    fn set_terms(&self, object_id: &Value, taxonomy: &str, term_ids: &[Value]) -> HostResult<()> {
        if object_id.is_empty() {
            return Err(HostError::new("invalid_object", "cannot assign terms to an unsaved object"));
        }
        self.assignments.borrow_mut().insert(
            (object_id.to_text(), taxonomy.to_string()),
            term_ids.to_vec(),
        );
        self.journal.record(HostCall::SetTerms {
            taxonomy: taxonomy.to_string(),
            object_id: object_id.clone(),
            term_ids: term_ids.to_vec(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    options: RefCell<BTreeMap<String, String>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryOptionStore {
    fn get_option(&self, name: &str) -> Option<String> {
        self.options.borrow().get(name).cloned()
    }

    fn update_option(&self, name: &str, value: &str) -> bool {
        self.options
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        true
    }
}

/// A store for every catalog family plus side stores, sharing one journal.
pub struct MemoryHost {
    stores: BTreeMap<&'static str, Rc<MemoryEntityStore>>,
    pub meta: Rc<MemoryMetaStore>,
    pub terms: Rc<MemoryTermAssignments>,
    pub options: Rc<MemoryOptionStore>,
    journal: Journal,
}

impl MemoryHost {
    pub fn new() -> Self {
        let journal = Journal::new();
        let stores = FAMILIES
            .iter()
            .map(|family| {
                let mut store = MemoryEntityStore::new(family.name, family.id_property)
                    .with_journal(journal.clone());
                if let Some(slug) = family.slug_property {
                    store = store.with_slug(slug);
                }
                if family.accessor_backed {
                    store = store.accessor_backed();
                }
                (family.name, Rc::new(store))
            })
            .collect();
        Self {
            stores,
            meta: Rc::new(MemoryMetaStore::new().with_journal(journal.clone())),
            terms: Rc::new(MemoryTermAssignments::new().with_journal(journal.clone())),
            options: Rc::new(MemoryOptionStore::new()),
            journal,
        }
    }

    pub fn store(&self, family: &str) -> Option<Rc<MemoryEntityStore>> {
        self.stores.get(family).cloned()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Collaborator bundle backed by these stores.
    pub fn host(&self) -> Host {
        let meta: Rc<dyn MetaStore> = self.meta.clone();
        let terms: Rc<dyn TermAssignments> = self.terms.clone();
        let options: Rc<dyn OptionStore> = self.options.clone();
        self.stores.iter().fold(
            Host::new(meta, terms, options),
            |host, (family, store)| {
                let store: Rc<dyn EntityStore> = store.clone();
                host.with_store(*family, store)
            },
        )
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}
