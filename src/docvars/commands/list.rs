use crate::error::Result;
use crate::model::VarRecord;
use crate::names::{self, DEFAULT_GROUP};
use crate::store::DocumentStore;
use crate::variable::Variable;
use std::collections::BTreeSet;

/// Every live variable, ordered by group key, group, row key, then name.
pub fn all<S: DocumentStore>(store: &S) -> Result<Vec<VarRecord>> {
    let mut records = names::var_ids(store)?
        .into_iter()
        .map(|id| Variable::bound(store.label(&id)?, id).snapshot(store))
        .collect::<Result<Vec<_>>>()?;
    records.sort_by(|a, b| {
        a.group_key
            .cmp(&b.group_key)
            .then_with(|| a.group.cmp(&b.group))
            .then_with(|| a.row_key.cmp(&b.row_key))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(records)
}

/// Variables of one group, in row order.
pub fn in_group<S: DocumentStore>(store: &S, group: &str) -> Result<Vec<VarRecord>> {
    let group = names::normalize_group(Some(group));
    Ok(all(store)?
        .into_iter()
        .filter(|r| r.group == group)
        .collect())
}

/// Names of all groups, sorted. The default group is always present.
pub fn groups<S: DocumentStore>(store: &S) -> Result<BTreeSet<String>> {
    let mut groups: BTreeSet<String> = all(store)?.into_iter().map(|r| r.group).collect();
    groups.insert(DEFAULT_GROUP.to_string());
    Ok(groups)
}
