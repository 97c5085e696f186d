//! Binary entry point for the `taccjm` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use taccjm::apps::DeployOptions;
use taccjm::logging::{self, LogFormat, LogOptions, LoggingError};
use taccjm::{
    AppError, ClusterConfig, ConfigError, ExecError, FilePattern, FileTransfer, JobError,
    JobManager, JobUpdate, ManagerSettings, PeekRange, ProcessCommandRunner, ScriptError,
    SendOptions, SshClient, TransferError,
};

mod cli;

use cli::{
    AppsCommand, Cli, Command, FilesCommand, JobsCommand, LogArgs, PeekArgs, ScriptsCommand,
    TrashCommand,
};

type Manager = JobManager<SshClient<ProcessCommandRunner>, SshClient<ProcessCommandRunner>>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            write_error(io::stderr(), &err);
            1
        }
    };

    process::exit(exit_code);
}

fn run(cli: Cli) -> Result<(), CliError> {
    let _log_guard = logging::init(&log_options(&cli.log)?)?;

    let config = ClusterConfig::load_without_cli_args()?;
    let client = SshClient::with_process_runner(config)?;
    let settings = ManagerSettings::from_config(client.config());
    let manager = JobManager::connect(client.clone(), client, settings)?;

    let result = dispatch(&manager, cli.command);
    let (executor, _) = manager.into_parts();
    if let Err(err) = executor.close() {
        warn!(error = %err, "failed to close ssh control connection");
    }
    print_json(io::stdout(), &result?)
}

fn log_options(args: &LogArgs) -> Result<LogOptions, LoggingError> {
    Ok(LogOptions {
        level: args.log_level.clone(),
        format: args.log_format.parse::<LogFormat>()?,
        console: true,
        file: args.log_file.clone(),
    })
}

fn to_json(value: &impl Serialize) -> Result<Value, CliError> {
    Ok(serde_json::to_value(value)?)
}

fn dispatch(manager: &Manager, command: Command) -> Result<Value, CliError> {
    match command {
        Command::Exec { command } => to_json(&manager.execute(&command.join(" "))?),
        Command::Allocations => to_json(&manager.allocations()?),
        Command::Queue { user } => to_json(&manager.queue(user.as_deref())?),
        Command::Files(files) => dispatch_files(manager, files),
        Command::Apps(apps) => dispatch_apps(manager, apps),
        Command::Jobs(jobs) => dispatch_jobs(manager, jobs),
        Command::Scripts(scripts) => dispatch_scripts(manager, scripts),
        Command::Trash(TrashCommand::Restore { path }) => {
            let restored = manager.restore(&path)?;
            Ok(json!({ "restored": restored.as_str() }))
        }
        Command::Trash(TrashCommand::Empty) => {
            manager.empty_trash()?;
            Ok(json!({ "trash": "emptied" }))
        }
    }
}

fn send_options(include_hidden: bool, include: Option<&str>) -> Result<SendOptions, CliError> {
    Ok(SendOptions {
        exclude_hidden: !include_hidden,
        pattern: include.map(FilePattern::new).transpose()?,
    })
}

fn dispatch_files(manager: &Manager, command: FilesCommand) -> Result<Value, CliError> {
    let transfer = manager.transfer();
    match command {
        FilesCommand::List { path } => to_json(&transfer.list(&path)?),
        FilesCommand::Send {
            local,
            remote,
            include_hidden,
            include,
        } => {
            let options = send_options(include_hidden, include.as_deref())?;
            transfer.send(&local, &remote, options)?;
            Ok(json!({ "sent": local.as_str(), "to": remote.as_str() }))
        }
        FilesCommand::Get { remote, local } => {
            transfer.get(&remote, &local)?;
            Ok(json!({ "fetched": remote.as_str(), "to": local.as_str() }))
        }
        FilesCommand::Peek { path, range } => Ok(Value::String(transfer.peek(&path, peek_range(&range))?)),
        FilesCommand::Remove { path } => {
            let trashed = manager.remove(&path)?;
            Ok(json!({ "removed": path, "trash": trashed.as_str() }))
        }
    }
}

fn dispatch_apps(manager: &Manager, command: AppsCommand) -> Result<Value, CliError> {
    let apps = manager.apps();
    match command {
        AppsCommand::Deploy {
            dir,
            config_file,
            project_file,
            overwrite,
        } => {
            let options = DeployOptions {
                config_file,
                project_file: Some(project_file),
                overwrite,
            };
            to_json(&apps.deploy(&dir, &options)?)
        }
        AppsCommand::List => to_json(&apps.list()?),
        AppsCommand::Show { app_id } => to_json(&apps.load_config(&app_id)?),
        AppsCommand::Wrapper { app_id } => Ok(Value::String(apps.get_wrapper(&app_id)?)),
    }
}

fn dispatch_jobs(manager: &Manager, command: JobsCommand) -> Result<Value, CliError> {
    match command {
        JobsCommand::Setup {
            dir,
            job_file,
            project_file,
            dry_run,
        } => to_json(&manager.setup_job_from_dir(&dir, &job_file, Some(&project_file), !dry_run)?),
        JobsCommand::List => to_json(&manager.list_jobs()?),
        JobsCommand::Show { job_id } => to_json(&manager.load_job(&job_id)?),
        JobsCommand::Update {
            job_id,
            email,
            allocation,
        } => to_json(&manager.stage_job(&job_id, JobUpdate { email, allocation })?),
        JobsCommand::Submit { job_id } => to_json(&manager.submit_job(&job_id)?),
        JobsCommand::Cancel { job_id } => to_json(&manager.cancel_job(&job_id)?),
        JobsCommand::Status { job_id } => to_json(&manager.refresh_status(&job_id)?),
        JobsCommand::Cleanup { job_id } => {
            let outcome = manager.cleanup_job(&job_id)?;
            Ok(json!({ "job_id": job_id, "outcome": outcome }))
        }
        JobsCommand::Restore { job_id } => to_json(&manager.restore_job(&job_id)?),
        JobsCommand::Ls { job_id, subdir } => to_json(&manager.list_job_files(&job_id, &subdir)?),
        JobsCommand::Get { job_id, path, dest } => {
            let local = manager.get_job_file(&job_id, &path, &dest)?;
            Ok(json!({ "fetched": path, "to": local.as_str() }))
        }
        JobsCommand::Send {
            job_id,
            local,
            dest_dir,
            include,
        } => {
            let options = send_options(false, include.as_deref())?;
            let remote = manager.send_job_file(&job_id, &local, &dest_dir, options)?;
            Ok(json!({ "sent": local.as_str(), "to": remote.as_str() }))
        }
        JobsCommand::Peek {
            job_id,
            path,
            range,
        } => Ok(Value::String(manager.peek_job_file(&job_id, &path, peek_range(&range))?)),
    }
}

fn dispatch_scripts(manager: &Manager, command: ScriptsCommand) -> Result<Value, CliError> {
    match command {
        ScriptsCommand::Deploy { file, name } => {
            let deployed = manager.scripts().deploy(&file, name.as_deref())?;
            Ok(json!({ "script": deployed }))
        }
        ScriptsCommand::Run { name, job, args } => {
            to_json(&manager.run_script(&name, job.as_deref(), &args)?)
        }
        ScriptsCommand::List => to_json(&manager.scripts().list()?),
    }
}

const fn peek_range(args: &PeekArgs) -> PeekRange {
    match (args.head, args.tail) {
        (_, Some(lines)) => PeekRange::Tail(lines),
        (Some(lines), None) => PeekRange::Head(lines),
        (None, None) => PeekRange::Default,
    }
}

fn print_json(mut target: impl Write, value: &Value) -> Result<(), CliError> {
    let rendered = match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other)?,
    };
    writeln!(target, "{}", rendered.trim_end_matches('\n')).ok();
    Ok(())
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
