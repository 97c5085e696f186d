//! Project configuration and templated records.
//!
//! A project file is TOML. Its tables feed `{{ section.key }}` placeholders
//! in application and job JSON files, so one `project.toml` can drive the
//! name and version of several records.

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::toml;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tera::Context;
use thiserror::Error;

/// Parsed project configuration.
pub type ProjectConfig = toml::value::Table;

/// Errors raised while loading or rendering templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// File does not exist.
    #[error("template file not found: {path}")]
    NotFound {
        /// Missing file.
        path: String,
    },
    /// File could not be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// File path.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Project file is not valid TOML.
    #[error("failed to parse project config {path}: {message}")]
    Project {
        /// File path.
        path: String,
        /// Parser message.
        message: String,
    },
    /// Placeholders could not be rendered.
    #[error("failed to render {name}: {message}")]
    Render {
        /// Template name or path.
        name: String,
        /// Renderer message.
        message: String,
    },
    /// Rendered document is not valid JSON for the target type.
    #[error("invalid JSON in {path}: {message}")]
    Json {
        /// File path.
        path: String,
        /// Parser message.
        message: String,
    },
}

/// Reads a local UTF-8 file through a capability handle on its parent.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`] or [`TemplateError::Read`].
pub fn read_local_file(path: &Utf8Path) -> Result<String, TemplateError> {
    let read_err = |err: std::io::Error| {
        if err.kind() == std::io::ErrorKind::NotFound {
            TemplateError::NotFound {
                path: path.to_string(),
            }
        } else {
            TemplateError::Read {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| TemplateError::Read {
        path: path.to_string(),
        message: String::from("path has no file name"),
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_err)?;
    dir.read_to_string(file_name).map_err(read_err)
}

/// Loads a TOML project configuration.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`] for a missing file and
/// [`TemplateError::Project`] for invalid TOML.
pub fn load_project_config(path: &Utf8Path) -> Result<ProjectConfig, TemplateError> {
    let contents = read_local_file(path)?;
    toml::from_str(&contents).map_err(|err| TemplateError::Project {
        path: path.to_string(),
        message: err.to_string(),
    })
}

/// Renders `template` with values from `context`.
///
/// # Errors
///
/// Returns [`TemplateError::Render`] when a placeholder cannot be resolved
/// or `context` does not serialise to a map.
pub fn render(name: &str, template: &str, context: &impl Serialize) -> Result<String, TemplateError> {
    let render_err = |err: tera::Error| TemplateError::Render {
        name: name.to_owned(),
        message: error_chain(&err),
    };
    let values = Context::from_serialize(context).map_err(render_err)?;
    tera::Tera::one_off(template, &values, false).map_err(render_err)
}

/// Loads a JSON file, rendering `{{ section.key }}` placeholders from
/// `project` first when one is supplied.
///
/// # Errors
///
/// Returns [`TemplateError`] for missing files, render failures and JSON
/// that does not match `T`.
pub fn load_templated_json<T: DeserializeOwned>(
    path: &Utf8Path,
    project: Option<&ProjectConfig>,
) -> Result<T, TemplateError> {
    let raw = read_local_file(path)?;
    let contents = match project {
        Some(values) => render(path.as_str(), &raw, values)?,
        None => raw,
    };
    serde_json::from_str(&contents).map_err(|err| TemplateError::Json {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
