use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FormError, FormResult};
use crate::notify::ChangeKind;
use crate::path::{FieldPath, IntoFieldPath};
use crate::rules::FieldOptions;
use crate::session::FormSession;
use crate::values;

/// Identity of a field-array entry; survives reordering and removal of
/// siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldArrayEntry {
    pub id: EntryId,
    pub value: Value,
}

/// Options for [`FormSession::use_field_array`].
#[derive(Debug, Clone)]
pub struct FieldArrayOptions {
    /// `remove` fails rather than go below this many entries.
    pub min_entries: usize,
    /// Fields registered for every entry, relative to the entry path.
    pub item_fields: Vec<(String, FieldOptions)>,
}

impl FieldArrayOptions {
    pub fn new() -> Self {
        Self {
            min_entries: 1,
            item_fields: Vec::new(),
        }
    }

    pub fn min_entries(mut self, min_entries: usize) -> Self {
        self.min_entries = min_entries;
        self
    }

    pub fn item_field(mut self, relative: impl Into<String>, options: impl Into<FieldOptions>) -> Self {
        self.item_fields.push((relative.into(), options.into()));
        self
    }
}

impl Default for FieldArrayOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct FieldArrayState {
    /// Entry ids in display order; position `i` belongs to `array.i`.
    pub(crate) ids: Vec<EntryId>,
    pub(crate) options: FieldArrayOptions,
}

pub(crate) type FieldArrays = BTreeMap<FieldPath, FieldArrayState>;

/// Moves every key of the form `array.N...` to `array.mapping[N]...`; keys
/// whose entry maps to `None` are dropped.
pub(crate) fn remap_keys<V>(
    map: &mut BTreeMap<FieldPath, V>,
    array: &FieldPath,
    mapping: &[Option<usize>],
) {
    let affected = map
        .keys()
        .filter(|key| key.array_position(array).is_some())
        .cloned()
        .collect::<Vec<_>>();
    let mut renamed = Vec::with_capacity(affected.len());
    for key in affected {
        let Some(value) = map.remove(&key) else {
            continue;
        };
        if let Some((old, _)) = key.array_position(array)
            && let Some(Some(new)) = mapping.get(old)
            && let Some(target) = key.with_array_index(array, *new)
        {
            renamed.push((target, value));
        }
    }
    map.extend(renamed);
}

impl FormSession {
    /// Declares a field array and assigns ids to its current entries. A
    /// missing array is created empty (in the defaults as well).
    pub fn use_field_array(
        &mut self,
        path: impl IntoFieldPath,
        options: FieldArrayOptions,
    ) -> FormResult<Vec<FieldArrayEntry>> {
        let path = path.into_field_path()?;
        self.batch(ChangeKind::FieldArray, |session| {
            if values::get(&session.defaults, &path).is_none() {
                values::set(&mut session.defaults, &path, Value::Array(Vec::new()))?;
            }
            let len = values::array_mut(&mut session.values, &path)?.len();
            let ids = match session.arrays.remove(&path) {
                Some(existing) if existing.ids.len() == len => existing.ids,
                _ => (0..len).map(|_| EntryId::generate()).collect(),
            };
            session
                .arrays
                .insert(path.clone(), FieldArrayState { ids, options });
            for index in 0..len {
                session.register_item_fields(&path, index)?;
            }
            session.ensure_leaf_meta(&path);
            session.notifier.mark(&path);
            tracing::debug!(form = %session.id, %path, entries = len, "declared field array");
            session.entries(&path)
        })
    }

    /// Entries of a field array in display order.
    pub fn fields(&self, path: impl IntoFieldPath) -> FormResult<Vec<FieldArrayEntry>> {
        let path = path.into_field_path()?;
        self.entries(&path)
    }

    pub fn field_array_paths(&self) -> Vec<FieldPath> {
        self.arrays.keys().cloned().collect()
    }

    pub fn append(&mut self, path: impl IntoFieldPath, value: impl Into<Value>) -> FormResult<EntryId> {
        let path = path.into_field_path()?;
        let len = self.array_len(&path)?;
        self.insert(path, len, value)
    }

    pub fn prepend(&mut self, path: impl IntoFieldPath, value: impl Into<Value>) -> FormResult<EntryId> {
        self.insert(path, 0, value)
    }

    pub fn insert(
        &mut self,
        path: impl IntoFieldPath,
        index: usize,
        value: impl Into<Value>,
    ) -> FormResult<EntryId> {
        let path = path.into_field_path()?;
        let value = value.into();
        let len = self.array_len(&path)?;
        if index > len {
            return Err(FormError::IndexOutOfBounds { path, index, len });
        }
        self.batch(ChangeKind::FieldArray, |session| {
            let mapping = (0..len)
                .map(|old| Some(if old < index { old } else { old + 1 }))
                .collect::<Vec<_>>();
            session.remap_array(&path, &mapping);
            values::array_mut(&mut session.values, &path)?.insert(index, value);
            let id = EntryId::generate();
            session.state_mut(&path)?.ids.insert(index, id);
            session.register_item_fields(&path, index)?;
            session.after_array_change(&path);
            tracing::debug!(form = %session.id, %path, index, %id, "inserted field array entry");
            Ok(id)
        })
    }

    /// Removes the entry at `index`; later entries shift down by one.
    pub fn remove(&mut self, path: impl IntoFieldPath, index: usize) -> FormResult<FieldArrayEntry> {
        let path = path.into_field_path()?;
        let len = self.array_len(&path)?;
        if index >= len {
            return Err(FormError::IndexOutOfBounds { path, index, len });
        }
        let min = self.state(&path)?.options.min_entries;
        if len - 1 < min {
            return Err(FormError::MinEntries { path, min });
        }
        self.batch(ChangeKind::FieldArray, |session| {
            let mapping = (0..len)
                .map(|old| match old.cmp(&index) {
                    std::cmp::Ordering::Less => Some(old),
                    std::cmp::Ordering::Equal => None,
                    std::cmp::Ordering::Greater => Some(old - 1),
                })
                .collect::<Vec<_>>();
            let value = values::array_mut(&mut session.values, &path)?.remove(index);
            let id = session.state_mut(&path)?.ids.remove(index);
            session.remap_array(&path, &mapping);
            session.after_array_change(&path);
            tracing::debug!(form = %session.id, %path, index, %id, "removed field array entry");
            Ok(FieldArrayEntry { id, value })
        })
    }

    pub fn swap(&mut self, path: impl IntoFieldPath, a: usize, b: usize) -> FormResult<()> {
        let path = path.into_field_path()?;
        let len = self.array_len(&path)?;
        for index in [a, b] {
            if index >= len {
                return Err(FormError::IndexOutOfBounds { path, index, len });
            }
        }
        let mut order = (0..len).collect::<Vec<_>>();
        order.swap(a, b);
        self.reorder(&path, order)
    }

    /// Moves the entry at `from` so that it ends up at `to`.
    pub fn move_entry(&mut self, path: impl IntoFieldPath, from: usize, to: usize) -> FormResult<()> {
        let path = path.into_field_path()?;
        let len = self.array_len(&path)?;
        for index in [from, to] {
            if index >= len {
                return Err(FormError::IndexOutOfBounds { path, index, len });
            }
        }
        let mut order = (0..len).collect::<Vec<_>>();
        let moved = order.remove(from);
        order.insert(to, moved);
        self.reorder(&path, order)
    }

    /// Applies a permutation where `order[new] = old`.
    fn reorder(&mut self, path: &FieldPath, order: Vec<usize>) -> FormResult<()> {
        self.batch(ChangeKind::FieldArray, |session| {
            let mut mapping = vec![None; order.len()];
            for (new, old) in order.iter().enumerate() {
                mapping[*old] = Some(new);
            }
            let items = values::array_mut(&mut session.values, path)?;
            let previous = std::mem::take(items);
            *items = order.iter().map(|old| previous[*old].clone()).collect();
            let state = session.state_mut(path)?;
            let previous_ids = std::mem::take(&mut state.ids);
            state.ids = order.iter().map(|old| previous_ids[*old]).collect();
            session.remap_array(path, &mapping);
            session.after_array_change(path);
            tracing::debug!(form = %session.id, %path, "reordered field array");
            Ok(())
        })
    }

    fn entries(&self, path: &FieldPath) -> FormResult<Vec<FieldArrayEntry>> {
        self.array_len(path)?;
        let state = self.state(path)?;
        let items = values::get(&self.values, path)
            .and_then(Value::as_array)
            .ok_or_else(|| FormError::NotAnArray(path.clone()))?;
        Ok(state
            .ids
            .iter()
            .zip(items)
            .map(|(id, value)| FieldArrayEntry {
                id: *id,
                value: value.clone(),
            })
            .collect())
    }

    fn state(&self, path: &FieldPath) -> FormResult<&FieldArrayState> {
        self.arrays
            .get(path)
            .ok_or_else(|| FormError::UnknownFieldArray(path.clone()))
    }

    fn state_mut(&mut self, path: &FieldPath) -> FormResult<&mut FieldArrayState> {
        self.arrays
            .get_mut(path)
            .ok_or_else(|| FormError::UnknownFieldArray(path.clone()))
    }

    /// Entry count; fails when the value is not an array or the ids lag behind it.
    fn array_len(&self, path: &FieldPath) -> FormResult<usize> {
        let len = self.state(path)?.ids.len();
        let items = values::get(&self.values, path)
            .and_then(Value::as_array)
            .map(Vec::len)
            .ok_or_else(|| FormError::NotAnArray(path.clone()))?;
        if items != len {
            return Err(FormError::ValueShape {
                path: path.clone(),
                reason: format!("{} entry ids for {} items", len, items),
            });
        }
        Ok(len)
    }

    /// Re-aligns every declared array touched by a write to `path`: ids of
    /// surviving indices are kept, new slots get fresh ids and item fields,
    /// and state above the new length is dropped.
    pub(crate) fn sync_field_arrays(&mut self, path: &FieldPath) -> FormResult<()> {
        let touched = self
            .arrays
            .keys()
            .filter(|array| array.overlaps(path))
            .cloned()
            .collect::<Vec<_>>();
        for array in touched {
            self.sync_array(&array)?;
        }
        Ok(())
    }

    fn sync_array(&mut self, array: &FieldPath) -> FormResult<()> {
        let len = values::get(&self.values, array)
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let known = self.state(array)?.ids.len();
        if len < known {
            let mapping = (0..known)
                .map(|index| (index < len).then_some(index))
                .collect::<Vec<_>>();
            self.remap_array(array, &mapping);
            self.state_mut(array)?.ids.truncate(len);
        } else if len > known {
            self.state_mut(array)?
                .ids
                .extend((known..len).map(|_| EntryId::generate()));
            for index in known..len {
                self.register_item_fields(array, index)?;
            }
        }
        if len != known {
            tracing::debug!(form = %self.id, %array, from = known, to = len, "resynced field array");
            self.notifier.mark(array);
        }
        Ok(())
    }

    fn register_item_fields(&mut self, array: &FieldPath, index: usize) -> FormResult<()> {
        let item_fields = self.state(array)?.options.item_fields.clone();
        let entry = array.index(index);
        for (relative, options) in item_fields {
            let path = entry.join(&relative)?;
            self.registry.register(&path, options, &self.values)?;
            self.ensure_meta(&path);
            self.sync_disabled(&path);
        }
        Ok(())
    }

    /// Renumbers everything keyed by path below the array.
    fn remap_array(&mut self, array: &FieldPath, mapping: &[Option<usize>]) {
        self.invalidate_tickets(array);
        remap_keys(&mut self.meta, array, mapping);
        self.registry.remap(array, mapping);
    }

    fn after_array_change(&mut self, array: &FieldPath) {
        self.ensure_leaf_meta(array);
        self.refresh_dirty(array);
        self.notifier.mark(array);
        self.refresh_dependents(array);
    }

    /// Regenerates ids and item registrations after the values were reset.
    pub(crate) fn reset_arrays(&mut self) -> FormResult<()> {
        for path in self.field_array_paths() {
            let len = values::array_mut(&mut self.values, &path)?.len();
            self.registry.truncate_array(&path, len);
            self.state_mut(&path)?.ids = (0..len).map(|_| EntryId::generate()).collect();
            for index in 0..len {
                self.register_item_fields(&path, index)?;
            }
        }
        Ok(())
    }
}
