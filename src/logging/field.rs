//! Log record types: [`Field`] key/value pairs and the [`DaemonLog`] record.

use crate::logging::Level;

/// A string key/value pair attached to a log record.
///
/// Values are stringified at construction so records are immutable and cheap
/// to move across the log channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: String,
    pub value: String,
}

impl Field {
    /// A string-valued field.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Field {
        Field {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A signed integer field.
    pub fn int(key: impl Into<String>, value: i64) -> Field {
        Field {
            key: key.into(),
            value: value.to_string(),
        }
    }

    /// An unsigned integer field.
    pub fn uint(key: impl Into<String>, value: u64) -> Field {
        Field {
            key: key.into(),
            value: value.to_string(),
        }
    }

    /// A boolean field.
    pub fn bool(key: impl Into<String>, value: bool) -> Field {
        Field {
            key: key.into(),
            value: value.to_string(),
        }
    }

    /// A floating-point field.
    pub fn float(key: impl Into<String>, value: f64) -> Field {
        Field {
            key: key.into(),
            value: value.to_string(),
        }
    }

    /// A field from any displayable value.
    pub fn display(key: impl Into<String>, value: impl std::fmt::Display) -> Field {
        Field {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// One immutable log record emitted by a service or the daemon itself.
#[derive(Debug, Clone)]
pub struct DaemonLog {
    /// Name of the emitting service, or `"daemon"` for the supervisor.
    pub name: String,
    pub level: Level,
    pub message: String,
    pub fields: Vec<Field>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_stringify() {
        assert_eq!(Field::int("attempt", 3).value, "3");
        assert_eq!(Field::uint("seq", 42).value, "42");
        assert_eq!(Field::bool("stopped", true).value, "true");
        assert_eq!(Field::float("ratio", 0.5).value, "0.5");
        assert_eq!(Field::display("state", "idle").value, "idle");
        let f = Field::string("service", "poller");
        assert_eq!((f.key.as_str(), f.value.as_str()), ("service", "poller"));
    }
}
