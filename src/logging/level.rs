//! Log severity levels.
//!
//! The ladder follows RFC 5424: lower numeric values are more severe.
//! [`Level::Unknown`] (-1) is the parse fallback, never emitted by the core.

/// Log severity. Lower values are more severe.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Parse fallback for unrecognized level names.
    Unknown = -1,
    /// System is unusable; requires immediate human intervention.
    Emergency = 0,
    /// Immediate attention required (security breach, key component down).
    Alert = 1,
    /// Severe failure that may stop the application.
    Critical = 2,
    /// Significant issue that prevents an operation but not the application.
    Error = 3,
    /// Something unexpected, or an indication of trouble ahead.
    Warning = 4,
    /// Significant but healthy events (startup, auth, config changes).
    Notice = 5,
    /// General operational information.
    Info = 6,
    /// Detailed internal state for debugging.
    Debug = 7,
}

impl Level {
    /// Uppercase name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Emergency => "EMERGENCY",
            Level::Alert => "ALERT",
            Level::Critical => "CRITICAL",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Unknown => "UNKNOWN",
        }
    }

    /// Parses a level name, case-insensitively.
    ///
    /// Returns [`Level::Unknown`] when the name does not match any level.
    pub fn from_str(level: &str) -> Level {
        match level.to_ascii_uppercase().as_str() {
            "EMERGENCY" => Level::Emergency,
            "ALERT" => Level::Alert,
            "CRITICAL" => Level::Critical,
            "ERROR" => Level::Error,
            "WARNING" => Level::Warning,
            "NOTICE" => Level::Notice,
            "INFO" => Level::Info,
            "DEBUG" => Level::Debug,
            _ => Level::Unknown,
        }
    }

    /// True when a record at this level passes a sink configured at `min`.
    ///
    /// `min` is the least severe level the sink still accepts; `Unknown`
    /// records never pass.
    pub fn enabled(&self, min: Level) -> bool {
        *self != Level::Unknown && (*self as i8) <= (min as i8)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_values_are_stable() {
        assert_eq!(Level::Unknown as i8, -1);
        assert_eq!(Level::Emergency as i8, 0);
        assert_eq!(Level::Alert as i8, 1);
        assert_eq!(Level::Critical as i8, 2);
        assert_eq!(Level::Error as i8, 3);
        assert_eq!(Level::Warning as i8, 4);
        assert_eq!(Level::Notice as i8, 5);
        assert_eq!(Level::Info as i8, 6);
        assert_eq!(Level::Debug as i8, 7);
    }

    #[test]
    fn from_str_round_trips() {
        for level in [
            Level::Emergency,
            Level::Alert,
            Level::Critical,
            Level::Error,
            Level::Warning,
            Level::Notice,
            Level::Info,
            Level::Debug,
        ] {
            assert_eq!(Level::from_str(level.as_str()), level);
        }
        assert_eq!(Level::from_str("debug"), Level::Debug);
        assert_eq!(Level::from_str("nonsense"), Level::Unknown);
    }

    #[test]
    fn enabled_respects_severity() {
        assert!(Level::Error.enabled(Level::Info));
        assert!(Level::Info.enabled(Level::Info));
        assert!(!Level::Debug.enabled(Level::Info));
        assert!(!Level::Unknown.enabled(Level::Debug));
    }
}
