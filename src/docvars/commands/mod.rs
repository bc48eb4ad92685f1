use crate::model::{TypeTag, Value, VarRecord};
use crate::ordering::RepairReport;

pub mod create;
pub mod delete;
pub mod doctor;
pub mod export;
pub mod import;
pub mod list;
pub mod reorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub affected_vars: Vec<VarRecord>,
    pub report: Option<RepairReport>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_report(mut self, report: RepairReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Messages at `level`, in order.
    pub fn messages_at(&self, level: MessageLevel) -> impl Iterator<Item = &CmdMessage> {
        self.messages.iter().filter(move |m| m.level == level)
    }
}

/// Everything needed to create one variable.
///
/// Only the name is required; a missing type falls back to the configured
/// default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewVar {
    pub name: String,
    pub var_type: Option<TypeTag>,
    pub value: Option<Value>,
    pub options: Option<Vec<String>>,
    pub description: String,
    pub expression: Option<String>,
    pub group: Option<String>,
}

impl NewVar {
    pub fn new(name: impl Into<String>, var_type: TypeTag) -> Self {
        Self {
            name: name.into(),
            var_type: Some(var_type),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_options<I, T>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}
