//! Suite document loading
//!
//! Reads a suite definition from disk (JSON or YAML, chosen by file
//! extension), validates the parsed tree against the companion JSON Schema,
//! and deserializes it into the typed model. No defaulting happens here; a
//! minimal valid document may omit `parallel`/`thread_count` entirely.

use jsonschema::JSONSchema;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::model::SuiteDocument;

/// Companion schema resource shipped with the binary.
pub const DEFAULT_SCHEMA_PATH: &str = "schemas/suite_schema.json";

/// Errors raised while loading a suite definition. All of these are fatal to
/// the whole run and surface before any task executes.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("suite file '{}' not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to parse suite file '{}': {}", .path.display(), .message)]
    ParseFailed { path: PathBuf, message: String },

    #[error("schema file '{}' not found", .0.display())]
    SchemaFileNotFound(PathBuf),

    #[error("invalid schema file '{}': {}", .path.display(), .message)]
    SchemaParseFailed { path: PathBuf, message: String },

    #[error("suite validation error: {0}")]
    ValidationFailed(String),
}

/// Loads and validates suite definitions against a fixed schema.
#[derive(Debug)]
pub struct SuiteLoader {
    schema: JSONSchema,
}

impl SuiteLoader {
    /// Read and compile the companion schema.
    pub fn new(schema_path: impl AsRef<Path>) -> Result<Self, SuiteError> {
        let schema_path = schema_path.as_ref();

        if !schema_path.exists() {
            return Err(SuiteError::SchemaFileNotFound(schema_path.to_path_buf()));
        }

        let content = std::fs::read_to_string(schema_path).map_err(|err| {
            SuiteError::SchemaParseFailed {
                path: schema_path.to_path_buf(),
                message: err.to_string(),
            }
        })?;

        // serde_json errors carry the offending line/column in their message.
        let schema_value: Value =
            serde_json::from_str(&content).map_err(|err| SuiteError::SchemaParseFailed {
                path: schema_path.to_path_buf(),
                message: format!("invalid JSON: {err}"),
            })?;

        let schema =
            JSONSchema::compile(&schema_value).map_err(|err| SuiteError::SchemaParseFailed {
                path: schema_path.to_path_buf(),
                message: err.to_string(),
            })?;

        debug!("Compiled suite schema from {}", schema_path.display());

        Ok(Self { schema })
    }

    /// Load, validate and deserialize a suite file.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<SuiteDocument, SuiteError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SuiteError::FileNotFound(path.to_path_buf()));
        }

        let content =
            std::fs::read_to_string(path).map_err(|err| SuiteError::ParseFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        let value: Value = match extension.as_deref() {
            Some("json") => {
                serde_json::from_str(&content).map_err(|err| SuiteError::ParseFailed {
                    path: path.to_path_buf(),
                    message: format!("invalid JSON: {err}"),
                })?
            }
            Some("yaml") | Some("yml") => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_str(&content).map_err(|err| SuiteError::ParseFailed {
                        path: path.to_path_buf(),
                        message: format!("invalid YAML: {err}"),
                    })?;
                serde_json::to_value(yaml).map_err(|err| SuiteError::ParseFailed {
                    path: path.to_path_buf(),
                    message: format!("invalid YAML: {err}"),
                })?
            }
            _ => {
                return Err(SuiteError::ParseFailed {
                    path: path.to_path_buf(),
                    message: "unsupported file format; use .json or .yaml".to_string(),
                })
            }
        };

        self.validate(&value)?;

        // The schema guarantees the overall shape; a mismatch with the typed
        // model at this point is still a validation problem.
        serde_json::from_value(value).map_err(|err| SuiteError::ValidationFailed(err.to_string()))
    }

    fn validate(&self, value: &Value) -> Result<(), SuiteError> {
        if let Err(mut errors) = self.schema.validate(value) {
            let message = errors
                .next()
                .map(|err| err.to_string())
                .unwrap_or_else(|| "schema validation failed".to_string());
            return Err(SuiteError::ValidationFailed(message));
        }
        Ok(())
    }
}
