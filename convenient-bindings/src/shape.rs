//! Grouping of flat binding rows into nested application data.
//!
//! The case is picked from which keys the [`ShapingSpec`] sets:
//!
//! 1. **Flat** - no group or entity key, or no binding keys and no sub-group
//!    key: one item per row.
//! 2. **Grouped** - `group_key` set: items keyed by the group value; a second
//!    item under the same key promotes the entry to a list.
//! 3. **Single attribute per entity** - `entity_key` set with fewer than two
//!    binding keys and no sub-group key: as case 2, keyed by the entity.
//! 4. **Entity records** - `entity_key` set otherwise: one attribute map per
//!    entity, differing values for an attribute promoted to a list.
//!
//! An item is the bare value when exactly one binding key is requested,
//! otherwise a map of the requested keys bound in that row. Map keys and
//! promoted lists both keep row-arrival order.

use crate::row::BindingRow;
use crate::sort::sort_shaped;
use serde::Serialize;
use indexmap::IndexMap;
use tracing::debug;

/// Shaped query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Shaped {
    /// A single lexical value
    Scalar(String),
    /// Values in row-arrival order
    List(Vec<Shaped>),
    /// Values keyed by a binding value or attribute name, first seen first
    Map(IndexMap<String, Shaped>),
    /// Attribute maps keyed by entity, first seen first
    NestedMap(IndexMap<String, IndexMap<String, Shaped>>),
}

impl Shaped {
    /// The scalar value, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Shaped::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// The items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Shaped]> {
        match self {
            Shaped::List(items) => Some(items),
            _ => None,
        }
    }

    /// The entries, if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Shaped>> {
        match self {
            Shaped::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up `key` in a map, or the record for `key` in a nested map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Shaped> {
        match self {
            Shaped::Map(map) => map.get(key).cloned(),
            Shaped::NestedMap(map) => map.get(key).cloned().map(Shaped::Map),
            _ => None,
        }
    }

    /// Number of items or entries; 1 for a scalar.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Shaped::Scalar(_) => 1,
            Shaped::List(items) => items.len(),
            Shaped::Map(map) => map.len(),
            Shaped::NestedMap(map) => map.len(),
        }
    }

    /// Returns `true` for an empty list or map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// What to extract from each row and how to group it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapingSpec {
    /// Variables extracted from each row
    pub binding_keys: Vec<String>,
    /// Variable whose value groups items
    pub group_key: Option<String>,
    /// Variable whose value identifies an entity
    pub entity_key: Option<String>,
    /// Field to sort lists by
    pub sort_key: Option<String>,
    /// Variables extracted into the per-entity sub-grouping
    pub sub_binding_keys: Vec<String>,
    /// Variable grouping the per-entity sub-grouping
    pub sub_group_key: Option<String>,
}

impl ShapingSpec {
    /// Extracts `keys` from every row.
    #[must_use]
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            binding_keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Groups by `key`.
    #[must_use]
    pub fn group_by(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// Keys results by entity.
    #[must_use]
    pub fn by_entity(mut self, key: impl Into<String>) -> Self {
        self.entity_key = Some(key.into());
        self
    }

    /// Sorts lists by `key`.
    #[must_use]
    pub fn sort_by(mut self, key: impl Into<String>) -> Self {
        self.sort_key = Some(key.into());
        self
    }

    /// Adds a per-entity sub-grouping of `keys` by `group_key`.
    #[must_use]
    pub fn sub_group<I, S>(mut self, group_key: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_group_key = Some(group_key.into());
        self.sub_binding_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    fn is_flat(&self) -> bool {
        (self.group_key.is_none() && self.entity_key.is_none())
            || (self.binding_keys.is_empty() && self.sub_group_key.is_none())
    }
}

// Bare value for one key, otherwise the bound subset of `keys`.
fn row_value(row: &BindingRow, keys: &[String]) -> Option<Shaped> {
    if let [key] = keys {
        return row.value(key).map(|v| Shaped::Scalar(v.to_string()));
    }
    Some(Shaped::Map(
        keys.iter()
            .filter_map(|key| {
                row.value(key)
                    .map(|v| (key.clone(), Shaped::Scalar(v.to_string())))
            })
            .collect(),
    ))
}

// Turns the stored value into a list on the first repeat, then appends.
fn promote(stored: &mut Shaped, value: Shaped) {
    if let Shaped::List(items) = stored {
        items.push(value);
    } else {
        let first = std::mem::replace(stored, Shaped::List(Vec::new()));
        *stored = Shaped::List(vec![first, value]);
    }
}

fn group<'a>(
    rows: impl IntoIterator<Item = &'a BindingRow>,
    key: &str,
    value_keys: &[String],
) -> IndexMap<String, Shaped> {
    let mut grouped: IndexMap<String, Shaped> = IndexMap::new();
    for row in rows {
        let Some(group) = row.value(key) else {
            debug!("row without `{}` skipped while grouping", key);
            continue;
        };
        let Some(value) = row_value(row, value_keys) else {
            continue;
        };
        match grouped.get_mut(group) {
            Some(stored) => promote(stored, value),
            None => {
                let _ = grouped.insert(group.to_string(), value);
            }
        }
    }
    grouped
}

// A stored value is compared with the incoming one as it currently is: once
// promoted to a list it never equals a scalar, so later values always append.
fn entities(
    rows: &[BindingRow],
    entity_key: &str,
    spec: &ShapingSpec,
) -> IndexMap<String, IndexMap<String, Shaped>> {
    let mut records: IndexMap<String, IndexMap<String, Shaped>> = IndexMap::new();
    for row in rows {
        let Some(entity) = row.value(entity_key) else {
            debug!("row without `{}` skipped while keying entities", entity_key);
            continue;
        };
        let first_seen = !records.contains_key(entity);
        let record = records.entry(entity.to_string()).or_default();

        for key in &spec.binding_keys {
            if spec.sub_group_key.as_ref() == Some(key) {
                continue;
            }
            let Some(value) = row.value(key) else {
                continue;
            };
            let value = Shaped::Scalar(value.to_string());
            match record.get_mut(key) {
                Some(stored) if *stored != value => promote(stored, value),
                Some(_) => {}
                None => {
                    let _ = record.insert(key.clone(), value);
                }
            }
        }

        if !first_seen {
            continue;
        }
        if let Some(sub_key) = &spec.sub_group_key {
            let own_rows = rows.iter().filter(|r| r.value(entity_key) == Some(entity));
            let _ = record.insert(
                sub_key.clone(),
                Shaped::Map(group(own_rows, sub_key, &spec.sub_binding_keys)),
            );
        }
    }
    records
}

/// Shapes `rows` as described by `spec`, then sorts a flat result if
/// `spec.sort_key` is set.
///
/// Pure and deterministic: the same rows and spec always give the same result.
#[must_use]
pub fn shape(rows: &[BindingRow], spec: &ShapingSpec) -> Shaped {
    let mut shaped = if spec.is_flat() {
        Shaped::List(
            rows.iter()
                .filter_map(|row| row_value(row, &spec.binding_keys))
                .collect(),
        )
    } else if let Some(group_key) = &spec.group_key {
        Shaped::Map(group(rows, group_key, &spec.binding_keys))
    } else if let Some(entity_key) = &spec.entity_key {
        if spec.binding_keys.len() < 2 && spec.sub_group_key.is_none() {
            Shaped::Map(group(rows, entity_key, &spec.binding_keys))
        } else {
            Shaped::NestedMap(entities(rows, entity_key, spec))
        }
    } else {
        Shaped::List(Vec::new())
    };

    if let Some(sort_key) = &spec.sort_key {
        sort_shaped(&mut shaped, sort_key);
    }
    shaped
}
