//! # Ordering Engine
//!
//! Variables are displayed by `(group_key, row_key, name)`. Two orderings
//! share one algorithm: rows inside a group (`SortKey`) and groups among
//! groups (`GroupSortKey`, repeated on every member of the group).
//!
//! ## Reorder by delta
//!
//! 1. Snapshot the siblings sorted by current key, then by name.
//! 2. Treat the snapshot position as the current rank. This is what heals
//!    sparse, duplicated or missing keys.
//! 3. Move the target to `clamp(rank + delta, 0, n - 1)`, or to the very
//!    first or last slot for [`Delta::First`] / [`Delta::Last`].
//! 4. Write each sibling's index as its new key, skipping keys that already
//!    match.
//!
//! After any reorder the touched keys form the dense range `0..n`.
//!
//! ## Group keys
//!
//! Every member of a group carries the group's key. When members disagree
//! the key of the member with the smallest internal id wins; the mismatch is
//! logged and repaired, never surfaced as an error. A group seen for the
//! first time gets `max(existing) + 1`, or `0`.

use crate::error::{Result, VarsError};
use crate::model::{ObjectId, TypeTag, Value};
use crate::names::{self, DEFAULT_GROUP};
use crate::store::{props, DocumentStore, PropertySpec};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// A signed move, or a jump to either end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    First,
    Last,
    By(i64),
}

impl Delta {
    /// Non-finite values are the sentinels.
    pub fn from_f64(delta: f64) -> Delta {
        if delta == f64::NEG_INFINITY {
            Delta::First
        } else if delta == f64::INFINITY {
            Delta::Last
        } else if delta.is_nan() {
            Delta::By(0)
        } else {
            Delta::By(delta.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
        }
    }

    fn target(self, index: usize, len: usize) -> usize {
        let last = len.saturating_sub(1);
        match self {
            Delta::First => 0,
            Delta::Last => last,
            Delta::By(d) => (index as i64).saturating_add(d).clamp(0, last as i64) as usize,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::First => f.write_str("first"),
            Delta::Last => f.write_str("last"),
            Delta::By(d) => write!(f, "{:+}", d),
        }
    }
}

impl FromStr for Delta {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "first" | "top" => return Ok(Delta::First),
            "last" | "bottom" => return Ok(Delta::Last),
            _ => {}
        }
        if let Ok(d) = s.parse::<i64>() {
            return Ok(Delta::By(d));
        }
        s.parse::<f64>()
            .map(Delta::from_f64)
            .map_err(|_| format!("Invalid delta '{}': expected an integer, 'first' or 'last'", s))
    }
}

/// Move `items[index]` by `delta` with list semantics. Returns the new index.
pub fn reposition<T>(items: &mut Vec<T>, index: usize, delta: Delta) -> usize {
    let target = delta.target(index, items.len());
    let item = items.remove(index);
    items.insert(target, item);
    target
}

/// Integer key stored on `id`, if present.
pub fn read_key<S: DocumentStore>(store: &S, id: &ObjectId, property: &str) -> Result<Option<i64>> {
    if !store.has_property(id, property)? {
        return Ok(None);
    }
    Ok(match store.get_property(id, property)? {
        Value::Integer(k) => Some(k),
        _ => None,
    })
}

/// Store an integer key, adding the property if needed. Returns whether anything changed.
pub fn write_key<S: DocumentStore>(
    store: &mut S,
    id: &ObjectId,
    property: &str,
    key: i64,
) -> Result<bool> {
    if !store.has_property(id, property)? {
        store.add_property(id, property, PropertySpec::new(TypeTag::Integer))?;
    } else if store.property_type(id, property)? != TypeTag::Integer {
        store.remove_property(id, property)?;
        store.add_property(id, property, PropertySpec::new(TypeTag::Integer))?;
    } else if store.get_property(id, property)? == Value::Integer(key) {
        return Ok(false);
    }
    store.set_property(id, property, Value::Integer(key))?;
    Ok(true)
}

/// Stored group of a variable; missing or blank reads as the default group.
pub fn read_group<S: DocumentStore>(store: &S, id: &ObjectId) -> Result<String> {
    if !store.has_property(id, props::GROUP)? {
        return Ok(DEFAULT_GROUP.to_string());
    }
    Ok(match store.get_property(id, props::GROUP)? {
        Value::String(g) if !g.trim().is_empty() => g,
        _ => DEFAULT_GROUP.to_string(),
    })
}

/// Ordering-relevant view of one variable.
#[derive(Debug, Clone)]
struct Member {
    id: ObjectId,
    name: String,
    group: String,
    row: Option<i64>,
    group_key: Option<i64>,
}

fn members<S: DocumentStore>(store: &S) -> Result<Vec<Member>> {
    names::var_ids(store)?
        .into_iter()
        .map(|id| -> Result<Member> {
            Ok(Member {
                name: store.label(&id)?,
                group: read_group(store, &id)?,
                row: read_key(store, &id, props::SORT_KEY)?,
                group_key: read_key(store, &id, props::GROUP_SORT_KEY)?,
                id,
            })
        })
        .collect()
}

/// Canonical key of every group that has one.
///
/// Members are visited in internal id order so the first key seen belongs
/// to the smallest id.
pub fn group_keys<S: DocumentStore>(store: &S) -> Result<BTreeMap<String, i64>> {
    Ok(canonical_keys(&members(store)?))
}

fn canonical_keys(members: &[Member]) -> BTreeMap<String, i64> {
    let mut keys: BTreeMap<String, i64> = BTreeMap::new();
    for m in members {
        let Some(key) = m.group_key else { continue };
        match keys.get(&m.group) {
            None => {
                keys.insert(m.group.clone(), key);
            }
            Some(&canonical) if canonical != key => warn!(
                group = %m.group,
                variable = %m.name,
                found = key,
                kept = canonical,
                "inconsistent group key"
            ),
            Some(_) => {}
        }
    }
    keys
}

/// Key for `group`: its existing canonical key, or the next free one.
pub fn group_key_for<S: DocumentStore>(store: &S, group: &str) -> Result<i64> {
    let keys = group_keys(store)?;
    Ok(match keys.get(group) {
        Some(&key) => key,
        None => keys.values().max().map_or(0, |max| max + 1),
    })
}

/// Row key that appends to the end of `group`.
pub fn next_row<S: DocumentStore>(store: &S, group: &str, exclude: Option<&ObjectId>) -> Result<i64> {
    Ok(members(store)?
        .iter()
        .filter(|m| m.group == group && Some(&m.id) != exclude)
        .filter_map(|m| m.row)
        .max()
        .map_or(0, |max| max + 1))
}

/// Group names in display order.
pub fn ordered_groups<S: DocumentStore>(store: &S) -> Result<Vec<String>> {
    let all = members(store)?;
    Ok(sorted_groups(&all, &canonical_keys(&all)))
}

fn sorted_groups(members: &[Member], keys: &BTreeMap<String, i64>) -> Vec<String> {
    let mut groups: Vec<String> = members.iter().map(|m| m.group.clone()).collect();
    groups.sort();
    groups.dedup();
    groups.sort_by_key(|g| keys.get(g).copied().unwrap_or(i64::MAX));
    groups
}

/// Members of `group` sorted by row key (missing keys last), then name.
fn sorted_rows(members: &[Member], group: &str) -> Vec<Member> {
    let mut rows: Vec<Member> = members.iter().filter(|m| m.group == group).cloned().collect();
    rows.sort_by(|a, b| {
        a.row
            .unwrap_or(i64::MAX)
            .cmp(&b.row.unwrap_or(i64::MAX))
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Variable ids of `group` in display order.
pub fn group_rows<S: DocumentStore>(store: &S, group: &str) -> Result<Vec<ObjectId>> {
    Ok(sorted_rows(&members(store)?, group)
        .into_iter()
        .map(|m| m.id)
        .collect())
}

fn assign_rows<S: DocumentStore>(store: &mut S, rows: &[Member]) -> Result<usize> {
    let mut changed = 0;
    for (index, m) in rows.iter().enumerate() {
        if write_key(store, &m.id, props::SORT_KEY, index as i64)? {
            changed += 1;
        }
    }
    Ok(changed)
}

fn assign_groups<S: DocumentStore>(
    store: &mut S,
    members: &[Member],
    groups: &[String],
) -> Result<usize> {
    let mut changed = 0;
    for (index, group) in groups.iter().enumerate() {
        for m in members.iter().filter(|m| &m.group == group) {
            if write_key(store, &m.id, props::GROUP_SORT_KEY, index as i64)? {
                changed += 1;
            }
        }
    }
    Ok(changed)
}

/// Move a variable within its group. Returns whether any key changed.
pub fn reorder_variable<S: DocumentStore>(store: &mut S, id: &ObjectId, delta: Delta) -> Result<bool> {
    if !store.contains(id) {
        return Err(VarsError::ObjectNotFound(id.clone()));
    }
    let group = read_group(store, id)?;
    let mut rows = sorted_rows(&members(store)?, &group);
    let Some(index) = rows.iter().position(|m| &m.id == id) else {
        return Err(VarsError::ObjectNotFound(id.clone()));
    };
    let target = reposition(&mut rows, index, delta);
    debug!(%group, from = index, to = target, %delta, "reorder variable");
    Ok(assign_rows(store, &rows)? > 0)
}

/// Move a group among groups. Returns whether any key changed.
pub fn reorder_group<S: DocumentStore>(store: &mut S, group: &str, delta: Delta) -> Result<bool> {
    let group = names::normalize_group(Some(group));
    let all = members(store)?;
    let mut groups = sorted_groups(&all, &canonical_keys(&all));
    let Some(index) = groups.iter().position(|g| *g == group) else {
        return Err(VarsError::GroupNotFound(group));
    };
    let target = reposition(&mut groups, index, delta);
    debug!(%group, from = index, to = target, %delta, "reorder group");
    Ok(assign_groups(store, &all, &groups)? > 0)
}

/// Renumber the rows of `group` densely, keeping their order.
pub fn normalize_rows<S: DocumentStore>(store: &mut S, group: &str) -> Result<bool> {
    let rows = sorted_rows(&members(store)?, group);
    Ok(assign_rows(store, &rows)? > 0)
}

/// Outcome of [`repair`]. Counts are numbers of variables touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub retitled_groups: usize,
    pub filled_row_keys: usize,
    pub filled_group_keys: usize,
    pub reconciled_group_keys: usize,
    pub renumbered_rows: usize,
    pub renumbered_groups: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == RepairReport::default()
    }
}

/// Bring legacy or damaged ordering data back to a dense, consistent state.
pub fn repair<S: DocumentStore>(store: &mut S) -> Result<RepairReport> {
    let mut report = RepairReport::default();

    // Group names
    for m in members(store)? {
        let stored = store.has_property(&m.id, props::GROUP)?;
        let canonical = names::normalize_group(Some(&m.group));
        if !stored {
            store.add_property(&m.id, props::GROUP, PropertySpec::new(TypeTag::String))?;
        }
        if !stored || canonical != m.group {
            store.set_property(&m.id, props::GROUP, Value::String(canonical))?;
            report.retitled_groups += 1;
        }
    }

    // Group keys: reconcile, then bootstrap groups that have none
    let all = members(store)?;
    let mut keys = canonical_keys(&all);
    let mut unkeyed: Vec<&str> = all
        .iter()
        .filter(|m| !keys.contains_key(&m.group))
        .map(|m| m.group.as_str())
        .collect();
    unkeyed.sort();
    unkeyed.dedup();
    for group in unkeyed {
        let next = keys.values().max().map_or(0, |max| max + 1);
        debug!(%group, key = next, "bootstrap group key");
        keys.insert(group.to_string(), next);
    }
    for m in &all {
        let canonical = keys[&m.group];
        match m.group_key {
            None => report.filled_group_keys += 1,
            Some(k) if k != canonical => report.reconciled_group_keys += 1,
            Some(_) => continue,
        }
        write_key(store, &m.id, props::GROUP_SORT_KEY, canonical)?;
    }

    // Dense group keys
    let all = members(store)?;
    let groups = sorted_groups(&all, &canonical_keys(&all));
    report.renumbered_groups = assign_groups(store, &all, &groups)?;

    // Dense rows
    let all = members(store)?;
    for group in &groups {
        let rows = sorted_rows(&all, group);
        report.filled_row_keys += rows.iter().filter(|m| m.row.is_none()).count();
        let changed = assign_rows(store, &rows)?;
        report.renumbered_rows += changed - rows.iter().filter(|m| m.row.is_none()).count();
    }

    if !report.is_clean() {
        debug!(?report, "ordering repaired");
    }
    Ok(report)
}
