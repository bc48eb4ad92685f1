use crate::error::Result;
use crate::ordering::{self, Delta};
use crate::store::DocumentStore;
use crate::variable::Variable;

/// Move a variable within its group. Returns whether anything moved.
pub fn variable<S: DocumentStore>(store: &mut S, name: &str, delta: Delta) -> Result<bool> {
    let id = Variable::new(name.trim()).id(store)?;
    ordering::reorder_variable(store, &id, delta)
}

/// Move a group among groups. Returns whether anything moved.
pub fn group<S: DocumentStore>(store: &mut S, group: &str, delta: Delta) -> Result<bool> {
    ordering::reorder_group(store, group, delta)
}
