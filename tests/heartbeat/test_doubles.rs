//! Session providers with scripted failures and delays.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use taccjm::session::SessionState;
use taccjm::{ExecError, ExecOutput, RemoteExecutor, SessionApi, SessionError, SessionInfo};

pub type DynExecutor = Box<dyn RemoteExecutor + Send + Sync>;

fn connection_lost(command: &str) -> ExecError {
    ExecError::CommandFailure {
        command: command.to_owned(),
        status: Some(255),
        status_text: String::from("255"),
        stdout: String::new(),
        stderr: String::from("Connection closed by remote host"),
    }
}

fn session(id: &str) -> SessionInfo {
    SessionInfo {
        id: id.to_owned(),
        host: format!("{id}.example.org"),
        user: String::from("tester"),
        port: 22,
        state: SessionState::Connected,
    }
}

/// Answers the connection check, then loses every later command.
#[derive(Debug, Default)]
pub struct DroppedConnection;

impl RemoteExecutor for DroppedConnection {
    fn execute(&self, command: &str) -> Result<ExecOutput, ExecError> {
        if command == "echo connected" {
            return Ok(ExecOutput {
                stdout: String::from("connected\n"),
                stderr: String::new(),
            });
        }
        Err(connection_lost(command))
    }
}

/// A provider whose session listing always fails.
#[derive(Debug, Default)]
pub struct UnavailableApi {
    calls: AtomicUsize,
}

impl UnavailableApi {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SessionApi for UnavailableApi {
    fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SessionError::Exec {
            id: String::from("sessions"),
            source: connection_lost("list sessions"),
        })
    }

    fn execute(&self, id: &str, _command: &str) -> Result<ExecOutput, SessionError> {
        Err(SessionError::UnknownSession { id: id.to_owned() })
    }
}

/// A provider with fixed listing and command latencies and one session.
#[derive(Debug)]
pub struct SlowApi {
    pub list_delay: Duration,
    pub check_delay: Duration,
}

impl SessionApi for SlowApi {
    fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        thread::sleep(self.list_delay);
        Ok(vec![session("ls6")])
    }

    fn execute(&self, _id: &str, _command: &str) -> Result<ExecOutput, SessionError> {
        thread::sleep(self.check_delay);
        Ok(ExecOutput {
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
