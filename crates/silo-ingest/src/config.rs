//! Run configuration
//!
//! One strongly-typed configuration structure, deserialized from a JSON file
//! and validated once at the boundary. The core receives it by reference and
//! assumes it is well-formed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use silo_common::TimeRange;
use std::path::{Path, PathBuf};

/// A named operational time window (half-open `[start_time, end_time)`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    /// Event identifier, used as part of the processed-period key
    pub event: String,

    /// Human-readable label; not consumed by the core
    pub description: String,

    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

impl EventInfo {
    pub fn window(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Full ingestion run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Root directory to scan for log files and archives
    pub target_folder: PathBuf,

    /// Substring patterns; a file qualifies if any pattern matches anywhere
    /// in its name
    pub name_patterns: Vec<String>,

    /// Text encoding label for raw log files (e.g. "shift_jis", "utf-8")
    pub encoding: String,

    /// Path of the embedded analytical store
    pub db_path: PathBuf,

    /// Plant display name; not consumed by the core
    pub plant_name: String,

    /// Machine display number; not consumed by the core
    pub machine_no: String,

    /// Run label; not consumed by the core
    #[serde(default)]
    pub label: String,

    /// Run label description; not consumed by the core
    #[serde(default)]
    pub label_description: String,

    /// Event windows to reconcile file coverage against
    pub events: Vec<EventInfo>,
}

/// A single configuration violation: which field, and what is wrong with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl IngestConfig {
    /// Load and deserialize a configuration file (JSON)
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate every field, returning all violations rather than the first.
    ///
    /// An empty vector means the configuration is usable.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.target_folder.as_os_str().is_empty() {
            errors.push(FieldError {
                field: "target_folder".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.name_patterns.is_empty() {
            errors.push(FieldError {
                field: "name_patterns".to_string(),
                message: "at least one name pattern is required".to_string(),
            });
        }
        for (i, pattern) in self.name_patterns.iter().enumerate() {
            if pattern.is_empty() {
                errors.push(FieldError {
                    field: format!("name_patterns[{}]", i),
                    message: "pattern must not be empty".to_string(),
                });
            }
        }

        if encoding_rs::Encoding::for_label(self.encoding.as_bytes()).is_none() {
            errors.push(FieldError {
                field: "encoding".to_string(),
                message: format!("unknown encoding label '{}'", self.encoding),
            });
        }

        if self.db_path.as_os_str().is_empty() {
            errors.push(FieldError {
                field: "db_path".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.events.is_empty() {
            errors.push(FieldError {
                field: "events".to_string(),
                message: "at least one event window is required".to_string(),
            });
        }

        let mut seen_names = std::collections::HashSet::new();
        for (i, ev) in self.events.iter().enumerate() {
            if ev.event.is_empty() {
                errors.push(FieldError {
                    field: format!("events[{}].event", i),
                    message: "event name must not be empty".to_string(),
                });
            } else if !seen_names.insert(ev.event.as_str()) {
                errors.push(FieldError {
                    field: format!("events[{}].event", i),
                    message: format!("duplicate event name '{}'", ev.event),
                });
            }
            if ev.end_time <= ev.start_time {
                errors.push(FieldError {
                    field: format!("events[{}].end_time", i),
                    message: "end_time must be after start_time".to_string(),
                });
            }
        }

        errors
    }

    /// The configured encoding, resolved. Call after `validate()`.
    pub fn resolved_encoding(&self) -> silo_common::Result<&'static encoding_rs::Encoding> {
        encoding_rs::Encoding::for_label(self.encoding.as_bytes())
            .ok_or_else(|| silo_common::SiloError::UnknownEncoding(self.encoding.clone()))
    }
}
