use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    dialect::DialectKind,
    resource::{ResourceError, ResourceLimits},
};

/// Construction-time settings of a [`Runtime`](crate::Runtime).
///
/// The dialect is fixed for the lifetime of the runtime; everything version-specific is
/// answered by it afterwards.
///
/// ```
/// use pyops::{DialectKind, RuntimeConfig};
///
/// let config = RuntimeConfig::from_json(r#"{"dialect": "2.7", "limits": {"max_memory": 1048576}}"#).unwrap();
/// assert_eq!(config.dialect, DialectKind::Legacy);
/// assert_eq!(config.limits.max_memory, Some(1_048_576));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub dialect: DialectKind,
    pub limits: ResourceLimits,
    /// Number of heap slots reserved up front.
    pub heap_capacity: usize,
}

impl RuntimeConfig {
    #[must_use]
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_heap_capacity(mut self, capacity: usize) -> Self {
        self.heap_capacity = capacity;
        self
    }

    /// Parses a configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(ConfigError::Json)
    }
}

/// Error building a runtime.
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    /// The type registry was built for a different dialect than the configuration names.
    DialectMismatch {
        config: DialectKind,
        registry: DialectKind,
    },
    /// The limits do not leave room for the runtime's own singletons.
    Resource(ResourceError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid runtime configuration: {err}"),
            Self::DialectMismatch { config, registry } => write!(
                f,
                "type registry was built for dialect {registry} but the configuration selects {config}"
            ),
            Self::Resource(err) => write!(f, "cannot initialize runtime: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Resource(err) => Some(err),
            Self::DialectMismatch { .. } => None,
        }
    }
}

impl From<ResourceError> for ConfigError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.dialect, DialectKind::Current);
    }

    #[test]
    fn dialect_accepts_version_names() {
        for (text, kind) in [
            ("\"2.7\"", DialectKind::Legacy),
            ("\"Classic\"", DialectKind::Classic),
            ("\"3.14\"", DialectKind::Current),
        ] {
            let config = RuntimeConfig::from_json(&format!("{{\"dialect\": {text}}}")).unwrap();
            assert_eq!(config.dialect, kind);
        }
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        let err = RuntimeConfig::from_json(r#"{"dialect": "4.0"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
