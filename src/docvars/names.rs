//! Name and identity resolution.
//!
//! A variable is found by its label, compared case-insensitively. The label
//! keeps whatever casing the last create or rename gave it.

use crate::error::{Result, VarsError};
use crate::model::ObjectId;
use crate::store::{DocumentStore, VARSET_TYPE, VAR_PREFIX};

pub const DEFAULT_GROUP: &str = "Default";

/// Internal ids of all live variables, in id order.
///
/// Other `VarSet` objects in the document are not ours and are skipped.
pub fn var_ids<S: DocumentStore>(store: &S) -> Result<Vec<ObjectId>> {
    let mut ids: Vec<ObjectId> = store
        .find_objects(VARSET_TYPE)?
        .into_iter()
        .filter(|id| id.as_str().starts_with(VAR_PREFIX))
        .collect();
    ids.sort();
    Ok(ids)
}

/// Trim and validate a variable name.
pub fn sanitize(name: &str) -> Result<String> {
    let name = name.trim();
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(VarsError::InvalidName(name.to_string()))
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Case-insensitive lookup of a live variable.
pub fn resolve<S: DocumentStore>(store: &S, name: &str) -> Result<Option<ObjectId>> {
    let wanted = name.trim().to_lowercase();
    for id in var_ids(store)? {
        if store.label(&id)?.to_lowercase() == wanted {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

/// Title-case every run of letters: first letter upper, the rest lower.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Canonical stored form of a group name. Blank means the default group.
pub fn normalize_group(group: Option<&str>) -> String {
    match group.map(str::trim) {
        Some(g) if !g.is_empty() => title_case(g),
        _ => DEFAULT_GROUP.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::fixtures::DocumentFixture;
    use crate::model::Value;

    #[test]
    fn sanitize_trims_and_validates() {
        assert_eq!(sanitize("  Width ").unwrap(), "Width");
        assert_eq!(sanitize("_private2").unwrap(), "_private2");
        assert_eq!(sanitize("Wïdth").unwrap(), "Wïdth");
        assert_eq!(sanitize("Größe").unwrap(), "Größe");
        for bad in ["", "   ", "2nd", "has space", "dash-ed", "²x"] {
            assert!(
                matches!(sanitize(bad), Err(VarsError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn title_case_matches_word_runs() {
        assert_eq!(title_case("metrics"), "Metrics");
        assert_eq!(title_case("MAIN body"), "Main Body");
        assert_eq!(title_case("top_level"), "Top_Level");
        assert_eq!(title_case("2nd pass"), "2Nd Pass");
    }

    #[test]
    fn blank_group_is_default() {
        assert_eq!(normalize_group(None), DEFAULT_GROUP);
        assert_eq!(normalize_group(Some("  ")), DEFAULT_GROUP);
        assert_eq!(normalize_group(Some("metrics")), "Metrics");
    }

    #[test]
    fn resolve_ignores_case_and_foreign_objects() {
        let fixture = DocumentFixture::new()
            .with_raw_var("Width", Value::Integer(1), "Default", Some(0), Some(0))
            .with_foreign_varset("Height");

        let found = resolve(&fixture.doc, "WIDTH").unwrap();
        assert_eq!(found.as_ref(), Some(&fixture.ids[0]));
        assert_eq!(resolve(&fixture.doc, "Height").unwrap(), None);
        assert_eq!(var_ids(&fixture.doc).unwrap().len(), 1);
    }
}
