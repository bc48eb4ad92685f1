use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable, document-scoped identifier of a host object.
///
/// Distinct from a variable's label: it is generated once by the host and
/// survives renames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}{}", prefix, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const HOST_PREFIX: &str = "App::Property";

/// Closed set of variable types.
///
/// Every scalar kind that has a list form maps to it by appending `List`
/// to its name, the relation the type migration rules are built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeTag {
    String,
    Integer,
    Float,
    Bool,
    Length,
    Angle,
    Percent,
    Enumeration,
    StringList,
    IntegerList,
    FloatList,
    BoolList,
}

impl TypeTag {
    pub const ALL: [TypeTag; 12] = [
        TypeTag::String,
        TypeTag::Integer,
        TypeTag::Float,
        TypeTag::Bool,
        TypeTag::Length,
        TypeTag::Angle,
        TypeTag::Percent,
        TypeTag::Enumeration,
        TypeTag::StringList,
        TypeTag::IntegerList,
        TypeTag::FloatList,
        TypeTag::BoolList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::String => "String",
            TypeTag::Integer => "Integer",
            TypeTag::Float => "Float",
            TypeTag::Bool => "Bool",
            TypeTag::Length => "Length",
            TypeTag::Angle => "Angle",
            TypeTag::Percent => "Percent",
            TypeTag::Enumeration => "Enumeration",
            TypeTag::StringList => "StringList",
            TypeTag::IntegerList => "IntegerList",
            TypeTag::FloatList => "FloatList",
            TypeTag::BoolList => "BoolList",
        }
    }

    /// The legacy host spelling, e.g. `App::PropertyLength`.
    pub fn host_name(self) -> String {
        format!("{}{}", HOST_PREFIX, self.name())
    }

    pub fn is_list(self) -> bool {
        self.element_type().is_some()
    }

    pub fn list_form(self) -> Option<TypeTag> {
        match self {
            TypeTag::String => Some(TypeTag::StringList),
            TypeTag::Integer => Some(TypeTag::IntegerList),
            TypeTag::Float => Some(TypeTag::FloatList),
            TypeTag::Bool => Some(TypeTag::BoolList),
            _ => None,
        }
    }

    pub fn element_type(self) -> Option<TypeTag> {
        match self {
            TypeTag::StringList => Some(TypeTag::String),
            TypeTag::IntegerList => Some(TypeTag::Integer),
            TypeTag::FloatList => Some(TypeTag::Float),
            TypeTag::BoolList => Some(TypeTag::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let short = trimmed.strip_prefix(HOST_PREFIX).unwrap_or(trimmed);
        TypeTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.name().eq_ignore_ascii_case(short))
            .ok_or_else(|| format!("Unknown variable type: {}", s))
    }
}

/// A variable value, tagged with its type.
///
/// Quantities are kept in base units: millimetres for `Length`, degrees for
/// `Angle`, and plain percent points for `Percent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Length(f64),
    Angle(f64),
    Percent(f64),
    Enumeration(String),
    StringList(Vec<String>),
    IntegerList(Vec<i64>),
    FloatList(Vec<f64>),
    BoolList(Vec<bool>),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::String(_) => TypeTag::String,
            Value::Integer(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Float,
            Value::Bool(_) => TypeTag::Bool,
            Value::Length(_) => TypeTag::Length,
            Value::Angle(_) => TypeTag::Angle,
            Value::Percent(_) => TypeTag::Percent,
            Value::Enumeration(_) => TypeTag::Enumeration,
            Value::StringList(_) => TypeTag::StringList,
            Value::IntegerList(_) => TypeTag::IntegerList,
            Value::FloatList(_) => TypeTag::FloatList,
            Value::BoolList(_) => TypeTag::BoolList,
        }
    }

    /// The value a freshly added property of `var_type` holds.
    pub fn default_for(var_type: TypeTag, options: Option<&[String]>) -> Value {
        match var_type {
            TypeTag::String => Value::String(String::new()),
            TypeTag::Integer => Value::Integer(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::Bool => Value::Bool(false),
            TypeTag::Length => Value::Length(0.0),
            TypeTag::Angle => Value::Angle(0.0),
            TypeTag::Percent => Value::Percent(0.0),
            TypeTag::Enumeration => Value::Enumeration(
                options
                    .and_then(|opts| opts.first())
                    .cloned()
                    .unwrap_or_default(),
            ),
            TypeTag::StringList => Value::StringList(Vec::new()),
            TypeTag::IntegerList => Value::IntegerList(Vec::new()),
            TypeTag::FloatList => Value::FloatList(Vec::new()),
            TypeTag::BoolList => Value::BoolList(Vec::new()),
        }
    }

    /// Empty strings and empty lists. Numbers and booleans are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) | Value::Enumeration(s) => s.is_empty(),
            Value::StringList(v) => v.is_empty(),
            Value::IntegerList(v) => v.is_empty(),
            Value::FloatList(v) => v.is_empty(),
            Value::BoolList(v) => v.is_empty(),
            _ => false,
        }
    }

    /// `false` when any number held is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) | Value::Length(f) | Value::Angle(f) | Value::Percent(f) => f.is_finite(),
            Value::FloatList(v) => v.iter().all(|f| f.is_finite()),
            _ => true,
        }
    }

    /// Split a list value into scalar values of its element type.
    pub fn into_elements(self) -> Option<Vec<Value>> {
        match self {
            Value::StringList(v) => Some(v.into_iter().map(Value::String).collect()),
            Value::IntegerList(v) => Some(v.into_iter().map(Value::Integer).collect()),
            Value::FloatList(v) => Some(v.into_iter().map(Value::Float).collect()),
            Value::BoolList(v) => Some(v.into_iter().map(Value::Bool).collect()),
            _ => None,
        }
    }

    /// Build a list of `list_type` from scalars that already match its element type.
    /// Elements of any other type are skipped.
    pub fn from_elements(list_type: TypeTag, elements: Vec<Value>) -> Option<Value> {
        let list = match list_type {
            TypeTag::StringList => Value::StringList(
                elements
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            TypeTag::IntegerList => Value::IntegerList(
                elements
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Integer(i) => Some(i),
                        _ => None,
                    })
                    .collect(),
            ),
            TypeTag::FloatList => Value::FloatList(
                elements
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Float(f) => Some(f),
                        _ => None,
                    })
                    .collect(),
            ),
            TypeTag::BoolList => Value::BoolList(
                elements
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Bool(b) => Some(b),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => return None,
        };
        Some(list)
    }

    /// Plain JSON form used by export files. The record's type carries the tag.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::String(s) | Value::Enumeration(s) => json!(s),
            Value::Integer(i) => json!(i),
            Value::Float(f) | Value::Length(f) | Value::Angle(f) | Value::Percent(f) => json!(f),
            Value::Bool(b) => json!(b),
            Value::StringList(v) => json!(v),
            Value::IntegerList(v) => json!(v),
            Value::FloatList(v) => json!(v),
            Value::BoolList(v) => json!(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            Value::String(s) | Value::Enumeration(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Length(v) => write!(f, "{} mm", v),
            Value::Angle(v) => write!(f, "{} deg", v),
            Value::Percent(v) => write!(f, "{} %", v),
            Value::StringList(v) => write!(f, "[{}]", join(v)),
            Value::IntegerList(v) => write!(f, "[{}]", join(v)),
            Value::FloatList(v) => write!(f, "[{}]", join(v)),
            Value::BoolList(v) => write!(f, "[{}]", join(v)),
        }
    }
}

bitflags::bitflags! {
    /// Per-property editor flags kept by the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EditorMode: u8 {
        const READ_ONLY = 1;
        const HIDDEN = 2;
    }
}

/// One read-modify-write step over an [`EditorMode`] mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Set(EditorMode),
    Clear(EditorMode),
}

impl EditorMode {
    pub fn apply(self, changes: &[ModeChange]) -> EditorMode {
        changes.iter().fold(self, |mode, change| match change {
            ModeChange::Set(flags) => mode | *flags,
            ModeChange::Clear(flags) => mode & !*flags,
        })
    }

    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(EditorMode::READ_ONLY) {
            names.push("ReadOnly");
        }
        if self.contains(EditorMode::HIDDEN) {
            names.push("Hidden");
        }
        names
    }
}

impl FromStr for ModeChange {
    type Err = String;

    /// Accepts `ReadOnly`, `Hidden` and their `-` prefixed clearing forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (clear, flag) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let flags = match flag {
            "ReadOnly" => EditorMode::READ_ONLY,
            "Hidden" => EditorMode::HIDDEN,
            other => return Err(format!("Unknown editor mode: {}", other)),
        };
        Ok(if clear {
            ModeChange::Clear(flags)
        } else {
            ModeChange::Set(flags)
        })
    }
}

/// A point-in-time snapshot of one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarRecord {
    pub internal_id: ObjectId,
    pub name: String,
    pub var_type: TypeTag,
    pub value: Value,
    pub options: Option<Vec<String>>,
    pub description: String,
    pub expression: Option<String>,
    pub group: String,
    pub row_key: i64,
    pub group_key: i64,
    pub read_only: bool,
    pub hidden: bool,
}
