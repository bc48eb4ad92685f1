use crate::model::{ObjectId, TypeTag};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VarsError {
    #[error("Invalid var name: '{0}'")]
    InvalidName(String),

    #[error("Variable name already in use: '{0}'")]
    DuplicateName(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Variable {0} does not exist")]
    NotFound(String),

    #[error("Group '{0}' does not exist")]
    GroupNotFound(String),

    #[error("Unsupported var type: '{0}'")]
    UnsupportedType(String),

    #[error("Variable '{0}' is driven by an expression; clear it before assigning a value")]
    ExpressionBound(String),

    #[error("Value '{value}' is not valid for {var_type} variable '{name}'")]
    InvalidValue {
        name: String,
        var_type: TypeTag,
        value: String,
    },

    #[error("Document object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Property '{property}' not found on {object}")]
    PropertyNotFound { object: ObjectId, property: String },

    #[error("Property '{property}' expects {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: TypeTag,
        found: TypeTag,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VarsError>;
