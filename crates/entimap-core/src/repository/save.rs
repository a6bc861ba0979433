//! The save protocol shared by every repository.

use super::Repository;
use crate::errors::{EntimapError, Result};
use crate::host::{HostResult, Payload, RecordRef};
use crate::model::Model;
use crate::source::PayloadSlot;
use crate::value::Value;
use std::rc::Rc;

/// Backend half of the save protocol.
pub trait RecordWriter {
    /// Whether `model` maps onto an existing host record.
    fn is_persisted(&self, model: &Model, key: &Value) -> bool {
        let _ = model;
        !key.is_empty()
    }

    /// One insert (`existing == false`) or update. Returns the record's key.
    fn write(&self, existing: bool, key: &Value, payload: &Payload) -> HostResult<Value>;

    /// Canonical record for `key` after the write.
    ///
    /// # Errors
    ///
    /// Backend read failures.
    fn reload(&self, key: &Value) -> Result<Option<RecordRef>>;
}

/// Persist `model` and return its primary key.
///
/// 1. Collect a payload from non-read-only object, accessor, column and
///    meta fields, keyed by target name. Inserts carry every field; updates
///    carry changed fields only. Meta entries are sent only when changed.
/// 2. Issue exactly one insert or update through `writer`. A failure
///    becomes `CouldNotPersist` and leaves the model untouched.
/// 3. Cache the key, then run persist hooks and persistable relations of
///    changed fields, in declaration order.
/// 4. When `refresh` is set, rebind the model to the reloaded record.
///
/// # Errors
///
/// `CouldNotPersist` for a failed write; relation persistence and reload
/// errors propagate as they are.
pub fn save_model(
    repository: &dyn Repository,
    writer: &dyn RecordWriter,
    model: &mut Model,
    refresh: bool,
) -> Result<Value> {
    let schema = Rc::clone(model.schema());
    let key_field = repository.primary_key_field().to_string();
    let key = model.get(&key_field)?;
    let existing = writer.is_persisted(model, &key);

    let mut payload = Payload::default();
    for (position, field) in schema.fields().iter().enumerate() {
        let name = field.name();
        if field.is_readonly() || name == key_field {
            continue;
        }
        let source = schema.source_at(position);
        let Some(slot) = source.payload_slot() else {
            continue;
        };
        let changed = model.is_changed(name);
        let target = source.target_name(name).to_string();
        match slot {
            PayloadSlot::Field if !existing || changed => {
                payload.fields.insert(target, model.get(name)?);
            }
            PayloadSlot::Meta if changed => {
                payload.meta.insert(target, model.get(name)?);
            }
            _ => {}
        }
    }

    tracing::debug!(
        model = %model.kind(),
        existing,
        fields = payload.fields.len(),
        meta = payload.meta.len(),
        "writing record"
    );
    let written = writer
        .write(existing, &key, &payload)
        .map_err(|err| EntimapError::CouldNotPersist {
            model: model.kind().to_string(),
            detail: err.to_string(),
        })?;
    let key = if written.is_empty() { key } else { written };
    model.assign(&key_field, key.clone());

    for (position, field) in schema.fields().iter().enumerate() {
        let name = field.name();
        if !model.is_changed(name) {
            continue;
        }
        let source = schema.source_at(position);
        if let Some(persist) = field.hooks().persist {
            let value = model.get(name)?;
            persist(model, value)?;
        } else if source.can_persist() {
            let value = model.get(name)?;
            source.persist(model, name, value)?;
        }
    }

    if refresh {
        let record = writer.reload(&key)?;
        model.refresh(record);
    }
    Ok(key)
}
