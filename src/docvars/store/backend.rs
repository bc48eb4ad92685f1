use crate::error::Result;
use crate::model::{EditorMode, ObjectId, TypeTag, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Persisted form of a whole host document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    #[serde(default)]
    pub objects: BTreeMap<ObjectId, HostObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostObject {
    pub type_id: String,
    pub label: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

impl HostObject {
    pub fn new(type_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            label: label.into(),
            properties: BTreeMap::new(),
        }
    }
}

/// One typed property slot on a host object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub type_tag: TypeTag,
    pub value: Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "EditorMode::is_empty")]
    pub mode: EditorMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl Property {
    pub fn new(type_tag: TypeTag, value: Value) -> Self {
        Self {
            type_tag,
            value,
            doc: String::new(),
            enumerations: None,
            mode: EditorMode::empty(),
            expression: None,
        }
    }
}

/// Abstract interface for raw document I/O.
/// The backend handles where the document lives; `HostDocument` handles
/// what is in it.
pub trait StorageBackend {
    /// Load the document. Returns Ok(None) when nothing has been saved yet.
    fn load(&self) -> Result<Option<DocumentData>>;

    /// Save the document.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn save(&self, data: &DocumentData) -> Result<()>;

    /// Where the document lives. A virtual path for in-memory backends.
    fn location(&self) -> PathBuf;
}
