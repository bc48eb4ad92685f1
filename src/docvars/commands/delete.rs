use crate::error::Result;
use crate::names;
use crate::ordering;
use crate::store::DocumentStore;
use crate::variable::Variable;
use tracing::debug;

/// Delete a variable by name and close the gap in its group.
/// Returns `false` when no such variable exists.
pub fn run<S: DocumentStore>(store: &mut S, name: &str) -> Result<bool> {
    let name = names::sanitize(name)?;
    let var = Variable::new(name.as_str());
    let Ok(group) = var.group(store) else {
        debug!(%name, "nothing to delete");
        return Ok(false);
    };
    if !var.delete(store)? {
        return Ok(false);
    }
    ordering::normalize_rows(store, &group)?;
    debug!(%name, %group, "variable deleted");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create, list, NewVar};
    use crate::error::VarsError;
    use crate::model::TypeTag;
    use crate::store::memory::InMemoryDocument;

    fn store_with(names: &[&str]) -> InMemoryDocument {
        let mut store = InMemoryDocument::new();
        for name in names {
            create::run(&mut store, &NewVar::new(*name, TypeTag::Float), TypeTag::Length).unwrap();
        }
        store
    }

    #[test]
    fn test_delete_renumbers_remaining_rows() {
        let mut store = store_with(&["A", "B", "C"]);
        assert!(run(&mut store, "b").unwrap());
        let rows: Vec<_> = list::all(&store)
            .unwrap()
            .into_iter()
            .map(|r| (r.name, r.row_key))
            .collect();
        assert_eq!(rows, vec![("A".to_string(), 0), ("C".to_string(), 1)]);
    }

    #[test]
    fn test_delete_missing_is_false() {
        let mut store = store_with(&["A"]);
        assert!(!run(&mut store, "Nope").unwrap());
        assert!(run(&mut store, "A").unwrap());
        assert!(!run(&mut store, "A").unwrap());
    }

    #[test]
    fn test_delete_bad_name_raises() {
        let mut store = store_with(&[]);
        assert!(matches!(run(&mut store, "a b"), Err(VarsError::InvalidName(_))));
    }
}
