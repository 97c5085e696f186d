//! [`FileTransfer`] over `rsync` and remote shell utilities.

use std::ffi::OsString;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::debug;

use super::{FileTransfer, PeekRange, SendOptions, TransferError, staging_path};
use crate::exec::{CommandRunner, RemoteExecutor, SshClient, check_output, quote};

/// Kind of a remote path as reported by `test`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RemoteKind {
    Directory,
    File,
    Missing,
}

impl<R: CommandRunner> SshClient<R> {
    fn remote_kind(&self, remote: &Utf8Path) -> Result<RemoteKind, TransferError> {
        let path = quote(remote.as_str());
        let check = format!(
            "if [ -d {path} ]; then echo dir; elif [ -e {path} ]; then echo file; else echo missing; fi"
        );
        let output = self.execute(&check)?;
        Ok(match output.stdout.trim() {
            "dir" => RemoteKind::Directory,
            "file" => RemoteKind::File,
            _ => RemoteKind::Missing,
        })
    }

    fn remote_spec(&self, remote: &Utf8Path, trailing_slash: bool) -> String {
        let slash = if trailing_slash { "/" } else { "" };
        format!("{}:{remote}{slash}", self.target().destination())
    }

    fn rsync(&self, source: &str, dest: &str, filters: Vec<OsString>) -> Result<(), TransferError> {
        let mut args = vec![OsString::from("-a"), OsString::from("--protect-args")];
        args.extend(filters);
        args.push(OsString::from("--rsh"));
        args.push(OsString::from(self.remote_shell()));
        args.push(OsString::from(source));
        args.push(OsString::from(dest));

        let program = &self.config().rsync_bin;
        debug!(%source, %dest, "running rsync");
        let output = self.runner().run(program, &args)?;
        check_output(&format!("{program} {source} {dest}"), output)?;
        Ok(())
    }

    fn run_on_path(&self, remote: &Utf8Path, command: &str) -> Result<String, TransferError> {
        self.execute(command)
            .map(|output| output.stdout)
            .map_err(|err| TransferError::from_exec(remote, err))
    }
}

/// rsync filter rules for a directory send. Rules apply first match wins,
/// so the hidden exclude comes before the pattern include.
fn filter_args(options: &SendOptions) -> Vec<OsString> {
    let mut args = Vec::new();
    if options.exclude_hidden {
        args.push(OsString::from("--exclude=.*"));
    }
    if let Some(ref pattern) = options.pattern {
        args.push(OsString::from("--include=*/"));
        args.push(OsString::from(format!("--include={}", pattern.as_str())));
        args.push(OsString::from("--exclude=*"));
        args.push(OsString::from("--prune-empty-dirs"));
    }
    args
}

fn create_local_dir(path: &Utf8Path) -> Result<(), TransferError> {
    Dir::create_ambient_dir_all(path, ambient_authority())
        .map_err(|err| TransferError::from_io(path, &err))
}

impl<R: CommandRunner> FileTransfer for SshClient<R> {
    fn send(
        &self,
        local: &Utf8Path,
        remote: &Utf8Path,
        options: SendOptions,
    ) -> Result<(), TransferError> {
        if local.is_dir() {
            self.run_on_path(remote, &format!("mkdir -p {}", quote(remote.as_str())))?;
            return self.rsync(
                &format!("{local}/"),
                &self.remote_spec(remote, true),
                filter_args(&options),
            );
        }
        if !local.is_file() {
            return Err(TransferError::PathNotFound {
                path: local.to_path_buf(),
            });
        }
        if let Some(parent) = remote.parent().filter(|p| !p.as_str().is_empty()) {
            self.run_on_path(parent, &format!("mkdir -p {}", quote(parent.as_str())))?;
        }
        self.rsync(local.as_str(), &self.remote_spec(remote, false), Vec::new())
    }

    fn get(&self, remote: &Utf8Path, local: &Utf8Path) -> Result<(), TransferError> {
        match self.remote_kind(remote)? {
            RemoteKind::Missing => Err(TransferError::PathNotFound {
                path: remote.to_path_buf(),
            }),
            RemoteKind::Directory => {
                create_local_dir(local)?;
                self.rsync(&self.remote_spec(remote, true), &format!("{local}/"), Vec::new())
            }
            RemoteKind::File => {
                if let Some(parent) = local.parent().filter(|p| !p.as_str().is_empty()) {
                    create_local_dir(parent)?;
                }
                self.rsync(&self.remote_spec(remote, false), local.as_str(), Vec::new())
            }
        }
    }

    fn list(&self, remote: &Utf8Path) -> Result<Vec<String>, TransferError> {
        let stdout = self.run_on_path(remote, &format!("ls -1A {}", quote(remote.as_str())))?;
        let mut names: Vec<String> = stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        names.sort();
        Ok(names)
    }

    fn peek(&self, remote: &Utf8Path, range: PeekRange) -> Result<String, TransferError> {
        let path = quote(remote.as_str());
        let command = match range {
            PeekRange::Head(lines) => format!("head -n {lines} {path}"),
            PeekRange::Tail(lines) => format!("tail -n {lines} {path}"),
            PeekRange::Default => format!("head {path}"),
        };
        self.run_on_path(remote, &command)
    }

    fn read(&self, remote: &Utf8Path) -> Result<String, TransferError> {
        self.run_on_path(remote, &format!("cat {}", quote(remote.as_str())))
    }

    fn write(&self, remote: &Utf8Path, contents: &str) -> Result<(), TransferError> {
        let staging = quote(staging_path(remote).as_str());
        let command = format!(
            "printf '%s' {} > {staging} && mv -f {staging} {}",
            quote(contents),
            quote(remote.as_str())
        );
        self.run_on_path(remote, &command).map(|_| ())
    }
}
