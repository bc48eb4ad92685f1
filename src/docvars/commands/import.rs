use crate::commands::export::{ExportFile, VarInfo};
use crate::commands::{create, CmdMessage, CmdResult, NewVar};
use crate::convert;
use crate::error::{Result, VarsError};
use crate::model::TypeTag;
use crate::names;
use crate::ordering;
use crate::store::{props, DocumentStore};
use crate::variable::Variable;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Envelope(ExportFile),
    Bare(Vec<VarInfo>),
}

/// Parse an export file. A bare array of records is accepted too.
pub fn parse(text: &str) -> Result<Vec<VarInfo>> {
    let file: ImportFile = serde_json::from_str(text).map_err(VarsError::Serialization)?;
    Ok(match file {
        ImportFile::Envelope(file) => file.variables,
        ImportFile::Bare(records) => records,
    })
}

enum Outcome {
    Created,
    Updated,
}

/// Import records one by one.
///
/// A record that cannot be imported is reported and skipped; the rest
/// still go in. Rows of every touched group are renumbered at the end.
pub fn run<S: DocumentStore>(
    store: &mut S,
    records: &[VarInfo],
    default_type: TypeTag,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    let mut touched = BTreeSet::new();
    let (mut created, mut updated, mut skipped) = (0, 0, 0);

    for record in records {
        match import_one(store, record, default_type, &mut result) {
            Ok(Some((outcome, group))) => {
                match outcome {
                    Outcome::Created => created += 1,
                    Outcome::Updated => updated += 1,
                }
                touched.insert(group);
            }
            Ok(None) => skipped += 1,
            Err(err) => {
                warn!(name = %record.name, %err, "import failed");
                result.add_message(CmdMessage::warning(format!(
                    "Variable '{}' could not be imported: {}",
                    record.name, err
                )));
                skipped += 1;
            }
        }
    }

    for group in &touched {
        ordering::normalize_rows(store, group)?;
    }

    info!(created, updated, skipped, "variables imported");
    result.add_message(CmdMessage::success(format!(
        "Imported {} new, updated {}, skipped {}",
        created, updated, skipped
    )));
    Ok(result)
}

pub fn run_file<S: DocumentStore>(
    store: &mut S,
    path: &Path,
    default_type: TypeTag,
) -> Result<CmdResult> {
    let text = fs::read_to_string(path).map_err(VarsError::Io)?;
    run(store, &parse(&text)?, default_type)
}

/// `Ok(None)` means skipped with a message already recorded.
fn import_one<S: DocumentStore>(
    store: &mut S,
    record: &VarInfo,
    default_type: TypeTag,
    result: &mut CmdResult,
) -> Result<Option<(Outcome, String)>> {
    let var_type = match record.var_type.parse::<TypeTag>() {
        Ok(t) if store.supported_types().contains(&t) => t,
        _ => {
            warn!(name = %record.name, var_type = %record.var_type, "unsupported type");
            result.add_message(CmdMessage::warning(format!(
                "Variable '{}' type '{}' is not supported. (Not imported)",
                record.name, record.var_type
            )));
            return Ok(None);
        }
    };

    let name = names::sanitize(&record.name)?;
    let var = Variable::new(name.as_str());
    let outcome = if var.exists(store) {
        let existing = var.var_type(store)?;
        if existing != var_type {
            warn!(%name, %existing, imported = %var_type, "type conflict");
            result.add_message(CmdMessage::warning(format!(
                "Variable '{}' already exists with a different type. (Not imported)",
                name
            )));
            return Ok(None);
        }
        Outcome::Updated
    } else {
        let mut new = NewVar::new(name.as_str(), var_type).with_description(&record.description);
        new.options = record.options.clone();
        new.expression = record.expression.clone();
        new.group = Some(record.group.clone());
        create::run(store, &new, default_type)?;
        Outcome::Created
    };

    let has_expression = record
        .expression
        .as_deref()
        .is_some_and(|e| !e.trim().is_empty());
    if !record.value.is_null() && !has_expression {
        let options = var.options(store)?;
        let applied = convert::from_json(var_type, &record.value, options.as_deref())
            .and_then(|value| var.set_value(store, value).map_err(|err| err.to_string()));
        if let Err(reason) = applied {
            warn!(%name, value = %record.value, %reason, "value ignored");
            result.add_message(CmdMessage::warning(format!(
                "Variable '{}' value ({}) is not valid. (Ignored)",
                name, record.value
            )));
        }
    }

    var.set_read_only(store, record.read_only)?;
    var.set_hidden(store, record.hidden)?;
    let id = var.id(store)?;
    if let Some(key) = record.sort_key {
        ordering::write_key(store, &id, props::SORT_KEY, key)?;
    }

    result.affected_vars.push(var.snapshot(store)?);
    Ok(Some((outcome, var.group(store)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{export, list, MessageLevel};
    use crate::model::Value;
    use crate::store::memory::InMemoryDocument;
    use serde_json::json;

    fn record(value: serde_json::Value) -> VarInfo {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_accepts_envelope_and_bare_array() {
        let bare = r#"[{"type": "Integer", "name": "A", "value": 3}]"#;
        assert_eq!(parse(bare).unwrap().len(), 1);

        let envelope = r#"{"version": 1, "variables": [{"type": "Integer", "name": "A"}]}"#;
        assert_eq!(parse(envelope).unwrap()[0].name, "A");

        assert!(parse("{}").is_err());
    }

    #[test]
    fn test_unsupported_type_is_skipped_and_rest_continue() {
        let mut store = InMemoryDocument::new();
        let records = vec![
            record(json!({"type": "App::PropertyMatrix", "name": "M"})),
            record(json!({"type": "App::PropertyInteger", "name": "N", "value": 4})),
        ];
        let result = run(&mut store, &records, TypeTag::Length).unwrap();

        assert_eq!(result.messages_at(MessageLevel::Warning).count(), 1);
        let all = list::all(&store).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, Value::Integer(4));
    }

    #[test]
    fn test_type_conflict_is_not_retyped() {
        let mut store = InMemoryDocument::new();
        create::run(&mut store, &NewVar::new("A", TypeTag::Bool), TypeTag::Length).unwrap();
        let records = vec![record(json!({"type": "Float", "name": "a", "value": 1.5}))];
        run(&mut store, &records, TypeTag::Length).unwrap();
        assert_eq!(Variable::new("A").var_type(&store).unwrap(), TypeTag::Bool);
    }

    #[test]
    fn test_existing_variable_gets_value_and_flags() {
        let mut store = InMemoryDocument::new();
        create::run(&mut store, &NewVar::new("A", TypeTag::Float), TypeTag::Length).unwrap();
        let records = vec![record(
            json!({"type": "Float", "name": "A", "value": 2.5, "read_only": true}),
        )];
        let result = run(&mut store, &records, TypeTag::Length).unwrap();
        assert_eq!(result.affected_vars[0].value, Value::Float(2.5));
        assert!(result.affected_vars[0].read_only);
    }

    #[test]
    fn test_value_is_ignored_when_expression_is_given() {
        let mut store = InMemoryDocument::new();
        let records = vec![record(
            json!({"type": "Float", "name": "A", "value": 2.5, "expression": "7"}),
        )];
        run(&mut store, &records, TypeTag::Length).unwrap();
        let var = Variable::new("A");
        assert_eq!(var.value(&store).unwrap(), Value::Float(0.0));
        assert_eq!(var.expression(&store).unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn test_bad_value_is_a_warning_not_a_failure() {
        let mut store = InMemoryDocument::new();
        let records = vec![
            record(json!({"type": "Integer", "name": "A", "value": "lots"})),
            record(json!({"type": "Integer", "name": "B", "value": 2})),
        ];
        let result = run(&mut store, &records, TypeTag::Length).unwrap();
        assert_eq!(result.messages_at(MessageLevel::Warning).count(), 1);
        assert_eq!(list::all(&store).unwrap().len(), 2);
    }

    #[test]
    fn test_roundtrip_into_empty_document() {
        let mut source = InMemoryDocument::new();
        let specs = vec![
            NewVar::new("Width", TypeTag::Length)
                .with_value(Value::Length(20.0))
                .with_description("outer"),
            NewVar::new("Height", TypeTag::Length).with_value(Value::Length(5.0)),
            NewVar::new("Count", TypeTag::IntegerList)
                .with_value(Value::IntegerList(vec![1, 2]))
                .with_group("metrics"),
            NewVar::new("Size", TypeTag::Enumeration)
                .with_options(["S", "L"])
                .with_value(Value::Enumeration("L".into()))
                .with_group("metrics"),
        ];
        for new in &specs {
            create::run(&mut source, new, TypeTag::Length).unwrap();
        }
        Variable::new("Height")
            .set_hidden(&mut source, true)
            .unwrap();
        let height_id = Variable::new("Height").id(&source).unwrap();
        crate::ordering::reorder_variable(
            &mut source,
            &height_id,
            crate::ordering::Delta::First,
        )
        .unwrap();

        let text = export::render(&export::build(&source).unwrap(), true).unwrap();
        let mut target = InMemoryDocument::new();
        run(&mut target, &parse(&text).unwrap(), TypeTag::Length).unwrap();

        let strip = |records: Vec<crate::model::VarRecord>| {
            records
                .into_iter()
                .map(|mut r| {
                    r.internal_id = crate::model::ObjectId::new("");
                    r
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(
            strip(list::all(&target).unwrap()),
            strip(list::all(&source).unwrap())
        );
    }
}
