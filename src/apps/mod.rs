//! Application registry.
//!
//! Applications live under `{root}/apps/{name}--{version}/` with their
//! assets, an `app.json` record and a generated `wrapper.sh`.

mod types;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

pub use types::{AppConfig, AppError, AppRecord};

use crate::exec::{RemoteExecutor, quote};
use crate::layout::{RemoteLayout, is_single_component};
use crate::templates::{self, load_project_config, load_templated_json};
use crate::transfer::{FileTransfer, SendOptions, is_hidden};

/// Stored application record.
pub const APP_RECORD: &str = "app.json";
/// Generated wrapper script.
pub const WRAPPER_SCRIPT: &str = "wrapper.sh";
/// Local subdirectory uploaded with the application.
pub const ASSETS_DIR: &str = "assets";

const WRAPPER_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/wrapper.sh.tera"
));

/// Where [`AppRegistry::deploy`] finds the application files.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeployOptions {
    /// Application JSON, relative to the local app directory.
    pub config_file: String,
    /// Project TOML feeding placeholders, relative to the local app
    /// directory. Ignored when the file does not exist.
    pub project_file: Option<String>,
    /// Replace an already deployed application with the same id.
    pub overwrite: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            config_file: String::from(APP_RECORD),
            project_file: Some(String::from("project.toml")),
            overwrite: false,
        }
    }
}

#[derive(Serialize)]
struct WrapperContext<'a> {
    app_id: &'a str,
    description: &'a str,
    command: String,
}

/// Renders the wrapper script that runs an application's entry command
/// with its output appended to `out.txt`.
///
/// # Errors
///
/// Returns [`AppError::Template`] when rendering fails.
pub fn render_wrapper(record: &AppRecord) -> Result<String, AppError> {
    let context = WrapperContext {
        app_id: &record.id,
        description: &record.config.short_description.replace(['\n', '\r'], " "),
        command: quote(&record.config.entry_command),
    };
    Ok(templates::render(WRAPPER_SCRIPT, WRAPPER_TEMPLATE, &context)?)
}

/// Deploys and inspects applications on the remote system.
pub struct AppRegistry<'a, E, T> {
    layout: &'a RemoteLayout,
    executor: &'a E,
    transfer: &'a T,
}

impl<'a, E: RemoteExecutor, T: FileTransfer> AppRegistry<'a, E, T> {
    /// Creates a registry over an existing remote layout.
    #[must_use]
    pub const fn new(layout: &'a RemoteLayout, executor: &'a E, transfer: &'a T) -> Self {
        Self {
            layout,
            executor,
            transfer,
        }
    }

    /// Lists deployed application ids.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transfer`] when the apps directory is unreadable.
    pub fn list(&self) -> Result<Vec<String>, AppError> {
        let mut names = self.transfer.list(&self.layout.apps_dir())?;
        names.retain(|name| !is_hidden(name));
        Ok(names)
    }

    /// Loads an application from `local_app_dir` and deploys it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigValidation`] for an invalid config,
    /// [`AppError::AlreadyExists`] when the id is taken and overwrite is off,
    /// and transfer or exec errors from the upload. A failed upload leaves
    /// no partial application behind and any earlier deployment of the same
    /// id untouched.
    pub fn deploy(
        &self,
        local_app_dir: &Utf8Path,
        options: &DeployOptions,
    ) -> Result<AppRecord, AppError> {
        let project = match options.project_file.as_deref() {
            Some(name) if local_app_dir.join(name).is_file() => {
                Some(load_project_config(&local_app_dir.join(name))?)
            }
            _ => None,
        };
        let config: AppConfig =
            load_templated_json(&local_app_dir.join(&options.config_file), project.as_ref())?;
        self.deploy_config(config, &local_app_dir.join(ASSETS_DIR), options.overwrite)
    }

    /// Deploys an already loaded configuration with its assets directory.
    ///
    /// # Errors
    ///
    /// See [`AppRegistry::deploy`].
    pub fn deploy_config(
        &self,
        config: AppConfig,
        assets_dir: &Utf8Path,
        overwrite: bool,
    ) -> Result<AppRecord, AppError> {
        config.validate()?;
        let record = AppRecord {
            id: config.id(),
            config,
        };
        let app_dir = self.layout.app_dir(&record.id);
        let staging = self.layout.app_staging_dir(&record.id);

        let replacing = self.list()?.contains(&record.id);
        if replacing && !overwrite {
            return Err(AppError::AlreadyExists { app_id: record.id });
        }

        self.executor
            .execute(&format!("rm -rf {}", quote(staging.as_str())))?;
        if let Err(err) = self.upload(&record, assets_dir, &staging) {
            self.discard(&staging);
            return Err(err);
        }
        if replacing {
            info!(app_id = %record.id, "replacing deployed app");
        }
        if let Err(err) = self.promote(&record.id, &staging, &app_dir) {
            self.discard(&staging);
            return Err(err);
        }
        info!(app_id = %record.id, dir = %app_dir, "deployed app");
        Ok(record)
    }

    /// Swaps a fully uploaded staging directory into place. The previous
    /// deployment is put back if the final rename fails.
    fn promote(&self, app_id: &str, staging: &Utf8Path, app_dir: &Utf8Path) -> Result<(), AppError> {
        let retired = quote(self.layout.app_retired_dir(app_id).as_str());
        let (new, live) = (quote(staging.as_str()), quote(app_dir.as_str()));
        self.executor.execute(&format!(
            "rm -rf {retired} && if [ -e {live} ]; then mv {live} {retired}; fi && \
             if mv {new} {live}; then rm -rf {retired}; \
             else [ ! -e {retired} ] || mv {retired} {live}; exit 1; fi"
        ))?;
        Ok(())
    }

    fn upload(
        &self,
        record: &AppRecord,
        assets_dir: &Utf8Path,
        app_dir: &Utf8Path,
    ) -> Result<(), AppError> {
        self.transfer
            .send(assets_dir, app_dir, SendOptions::default())?;
        let json = serde_json::to_string_pretty(record).map_err(|err| AppError::Parse {
            app_id: record.id.clone(),
            message: err.to_string(),
        })?;
        self.transfer.write(&app_dir.join(APP_RECORD), &json)?;
        let wrapper_path = app_dir.join(WRAPPER_SCRIPT);
        self.transfer
            .write(&wrapper_path, &render_wrapper(record)?)?;
        self.executor
            .execute(&format!("chmod +x {}", quote(wrapper_path.as_str())))?;
        Ok(())
    }

    fn discard(&self, dir: &Utf8Path) {
        if let Err(err) = self
            .executor
            .execute(&format!("rm -rf {}", quote(dir.as_str())))
        {
            warn!(%dir, error = %err, "failed to remove partially uploaded app");
        }
    }

    fn checked_dir(&self, app_id: &str) -> Result<Utf8PathBuf, AppError> {
        if is_single_component(app_id) {
            Ok(self.layout.app_dir(app_id))
        } else {
            Err(AppError::NotFound {
                app_id: app_id.to_owned(),
            })
        }
    }

    /// Returns the stored record of a deployed application.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] when the application is not deployed
    /// and [`AppError::Parse`] when its record is malformed.
    pub fn load_config(&self, app_id: &str) -> Result<AppRecord, AppError> {
        let path = self.checked_dir(app_id)?.join(APP_RECORD);
        let contents = self.read_app_file(app_id, &path)?;
        serde_json::from_str(&contents).map_err(|err| AppError::Parse {
            app_id: app_id.to_owned(),
            message: err.to_string(),
        })
    }

    /// Returns the wrapper script of a deployed application.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] when the application is not deployed.
    pub fn get_wrapper(&self, app_id: &str) -> Result<String, AppError> {
        let path = self.checked_dir(app_id)?.join(WRAPPER_SCRIPT);
        self.read_app_file(app_id, &path)
    }

    fn read_app_file(&self, app_id: &str, path: &Utf8Path) -> Result<String, AppError> {
        self.transfer.read(path).map_err(|err| {
            if err.is_not_found() {
                AppError::NotFound {
                    app_id: app_id.to_owned(),
                }
            } else {
                AppError::Transfer(err)
            }
        })
    }
}
