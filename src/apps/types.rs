//! Application configuration and deployed records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::exec::ExecError;
use crate::layout::is_single_component;
use crate::templates::TemplateError;
use crate::transfer::TransferError;

fn default_node_count() -> u32 {
    1
}

fn default_processors_per_node() -> u32 {
    1
}

fn default_max_run_time() -> String {
    String::from("00:10:00")
}

/// Application description as written by its author in `app.json`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Application name.
    #[serde(default)]
    pub name: String,
    /// Application version.
    #[serde(default)]
    pub version: String,
    /// Command the wrapper runs, relative to the job directory.
    #[serde(default)]
    pub entry_command: String,
    /// One-line description, used as the default job description.
    #[serde(default)]
    pub short_description: String,
    /// Default scheduler partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_queue: Option<String>,
    /// Default node count.
    #[serde(default = "default_node_count")]
    pub default_node_count: u32,
    /// Default tasks per node.
    #[serde(default = "default_processors_per_node")]
    pub default_processors_per_node: u32,
    /// Default wall-clock limit.
    #[serde(default = "default_max_run_time")]
    pub default_max_run_time: String,
    /// Input name to description.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Parameter name to default value.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl AppConfig {
    /// Composite id, `name--version`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}--{}", self.name, self.version)
    }

    /// Checks the fields needed to deploy.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigValidation`] naming the first bad field.
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [("name", &self.name), ("version", &self.version)] {
            if !is_single_component(value)
                || value.contains(char::is_whitespace)
                || value.starts_with('.')
            {
                return Err(AppError::ConfigValidation {
                    field: field.to_owned(),
                    message: String::from(
                        "must be a non-empty word without '/', spaces or a leading '.'",
                    ),
                });
            }
        }
        if self.entry_command.trim().is_empty() {
            return Err(AppError::ConfigValidation {
                field: String::from("entryCommand"),
                message: String::from("must name the command the wrapper runs"),
            });
        }
        Ok(())
    }
}

/// A deployed application: its id plus the stored configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AppRecord {
    /// Composite id, `name--version`.
    pub id: String,
    /// Stored configuration.
    #[serde(flatten)]
    pub config: AppConfig,
}

/// Errors raised by the application registry.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required field is missing or malformed.
    #[error("invalid app field {field}: {message}")]
    ConfigValidation {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
    /// The application is deployed and overwrite was not requested.
    #[error("app {app_id} already exists; pass overwrite to replace it")]
    AlreadyExists {
        /// Application id.
        app_id: String,
    },
    /// No application with this id is deployed.
    #[error("app {app_id} not found")]
    NotFound {
        /// Application id.
        app_id: String,
    },
    /// The stored record is not valid JSON.
    #[error("app record {app_id} is malformed: {message}")]
    Parse {
        /// Application id.
        app_id: String,
        /// Parser message.
        message: String,
    },
    /// Local configuration could not be loaded.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// File transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// Remote command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}
