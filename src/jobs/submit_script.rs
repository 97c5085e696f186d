//! Batch script rendering.

use camino::Utf8Path;
use serde::Serialize;
use serde_json::Value;

use super::{JobConfig, JobError};
use crate::exec::quote;
use crate::templates;

const TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/submit_script.sh.tera"
));

#[derive(Serialize)]
struct SubmitContext<'a> {
    job_id: &'a str,
    desc: Option<String>,
    queue: &'a str,
    node_count: u32,
    total_tasks: u32,
    max_run_time: &'a str,
    email: Option<&'a str>,
    allocation: Option<&'a str>,
    job_dir: String,
    exports: Vec<String>,
}

/// File name an input lands under inside the job directory.
pub(crate) fn input_file_name(local: &str) -> Result<&str, JobError> {
    Utf8Path::new(local)
        .file_name()
        .ok_or_else(|| JobError::invalid_path(local, "input path has no file name"))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, JobError> {
    value.ok_or_else(|| JobError::ConfigValidation {
        field: field.to_owned(),
        message: String::from("must be set before rendering the submit script"),
    })
}

fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Renders `submit_script.sh` for a staged job.
///
/// Inputs are exported as absolute paths inside the job directory and
/// parameters as shell-quoted values; `NP` carries the total task count.
///
/// # Errors
///
/// Returns [`JobError::ConfigValidation`] when a staged field is missing or
/// the task count overflows, and [`JobError::Template`] on render failure.
pub fn render_submit_script(job: &JobConfig) -> Result<String, JobError> {
    let job_id = required(job.job_id.as_deref(), "job_id")?;
    let job_dir = Utf8Path::new(required(job.job_dir.as_deref(), "job_dir")?);
    let node_count = job.node_count.unwrap_or(1);
    let total_tasks = node_count
        .checked_mul(job.processors_per_node.unwrap_or(1))
        .ok_or_else(|| JobError::ConfigValidation {
            field: String::from("processorsPerNode"),
            message: String::from("total task count overflows"),
        })?;

    let mut exports = Vec::with_capacity(job.inputs.len() + job.parameters.len());
    for (name, local) in &job.inputs {
        let remote = job_dir.join(input_file_name(local)?);
        exports.push(format!("{name}={}", quote(remote.as_str())));
    }
    for (name, value) in &job.parameters {
        exports.push(format!("{name}={}", quote(&parameter_text(value))));
    }

    let context = SubmitContext {
        job_id,
        desc: job.desc.as_deref().map(|desc| desc.replace(['\n', '\r'], " ")),
        queue: required(job.queue.as_deref(), "queue")?,
        node_count,
        total_tasks,
        max_run_time: required(job.max_run_time.as_deref(), "maxRunTime")?,
        email: job.email.as_deref(),
        allocation: job.allocation.as_deref(),
        job_dir: quote(job_dir.as_str()),
        exports,
    };
    Ok(templates::render("submit_script.sh", TEMPLATE, &context)?)
}
