use std::fmt;

/// Failures surfaced by the runtime.
///
/// Nothing here is retried; errors propagate to whoever called into the
/// runtime (a setter, `create`, or the host running a flush).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    /// `create` could not resolve a constructor for the type or id.
    UnknownType { name: String },
    /// A constructor is already registered under this type.
    DuplicateRegistration { name: String },
    /// A property conversion rejected the assigned value.
    ConversionFailure { prop: String, message: String },
    /// An internal invariant was broken by the caller.
    AssertionViolation { message: String },
}

impl WidgetError {
    pub fn assertion(message: impl Into<String>) -> Self {
        WidgetError::AssertionViolation {
            message: message.into(),
        }
    }

    pub fn conversion(prop: impl Into<String>, message: impl Into<String>) -> Self {
        WidgetError::ConversionFailure {
            prop: prop.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for WidgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetError::UnknownType { name } => write!(f, "unknown widget type `{name}`"),
            WidgetError::DuplicateRegistration { name } => {
                write!(f, "widget type `{name}` is already registered")
            }
            WidgetError::ConversionFailure { prop, message } => {
                write!(f, "cannot convert value for prop `{prop}`: {message}")
            }
            WidgetError::AssertionViolation { message } => write!(f, "assertion failed: {message}"),
        }
    }
}

impl std::error::Error for WidgetError {}
