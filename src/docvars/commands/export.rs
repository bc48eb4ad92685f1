use crate::commands::{list, CmdMessage, CmdResult};
use crate::error::{Result, VarsError};
use crate::model::VarRecord;
use crate::names::DEFAULT_GROUP;
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

pub const FORMAT_VERSION: u32 = 1;

/// One exported variable.
///
/// `value` is plain JSON in base units and is coerced by `type` on import.
/// Everything but `type` and `name` may be missing in older files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarInfo {
    #[serde(rename = "type")]
    pub var_type: String,
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, alias = "internal_id")]
    pub internal_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub sort_key: Option<i64>,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

impl From<&VarRecord> for VarInfo {
    fn from(record: &VarRecord) -> Self {
        Self {
            var_type: record.var_type.host_name(),
            name: record.name.clone(),
            value: record.value.to_json(),
            internal_name: record.internal_id.to_string(),
            description: record.description.clone(),
            group: record.group.clone(),
            expression: record.expression.clone(),
            options: record.options.clone(),
            read_only: record.read_only,
            hidden: record.hidden,
            sort_key: Some(record.row_key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFile {
    pub version: u32,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
    pub variables: Vec<VarInfo>,
}

impl ExportFile {
    pub fn new(variables: Vec<VarInfo>) -> Self {
        Self {
            version: FORMAT_VERSION,
            exported_at: Some(Utc::now()),
            variables,
        }
    }
}

/// Snapshot every live variable, group-then-row ordered.
pub fn build<S: DocumentStore>(store: &S) -> Result<ExportFile> {
    let records = list::all(store)?;
    Ok(ExportFile::new(records.iter().map(VarInfo::from).collect()))
}

pub fn render(file: &ExportFile, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(file)
    } else {
        serde_json::to_string(file)
    };
    text.map_err(VarsError::Serialization)
}

pub fn run<S: DocumentStore>(store: &S, path: &Path, pretty: bool) -> Result<CmdResult> {
    let file = build(store)?;
    let count = file.variables.len();
    fs::write(path, render(&file, pretty)?).map_err(VarsError::Io)?;
    info!(count, path = %path.display(), "variables exported");

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Exported {} variable(s) to {}",
        count,
        path.display()
    )));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create, NewVar};
    use crate::model::{TypeTag, Value};
    use crate::store::memory::InMemoryDocument;
    use serde_json::json;

    #[test]
    fn test_export_records_every_field() {
        let mut store = InMemoryDocument::new();
        let new = NewVar::new("Size", TypeTag::Enumeration)
            .with_options(["S", "L"])
            .with_value(Value::String("L".into()))
            .with_description("shirt")
            .with_group("apparel");
        create::run(&mut store, &new, TypeTag::Length).unwrap();

        let file = build(&store).unwrap();
        assert_eq!(file.version, FORMAT_VERSION);
        let info = &file.variables[0];
        assert_eq!(info.var_type, "App::PropertyEnumeration");
        assert_eq!(info.value, json!("L"));
        assert_eq!(info.group, "Apparel");
        assert_eq!(info.options, Some(vec!["S".to_string(), "L".to_string()]));
        assert_eq!(info.sort_key, Some(0));
        assert!(info.internal_name.starts_with("XVar_"));
    }

    #[test]
    fn test_minimal_record_gets_defaults() {
        let info: VarInfo =
            serde_json::from_value(json!({"type": "App::PropertyFloat", "name": "X"})).unwrap();
        assert_eq!(info.group, "Default");
        assert_eq!(info.value, serde_json::Value::Null);
        assert_eq!(info.sort_key, None);
        assert!(!info.read_only);
    }

    #[test]
    fn test_run_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.json");
        let mut store = InMemoryDocument::new();
        create::run(&mut store, &NewVar::new("A", TypeTag::Integer), TypeTag::Length).unwrap();

        let result = run(&store, &path, false).unwrap();
        assert_eq!(result.messages.len(), 1);
        let text = fs::read_to_string(&path).unwrap();
        let parsed: ExportFile = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.variables.len(), 1);
    }
}
