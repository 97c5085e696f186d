//! Named remote sessions shared with the heartbeat.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::SshTarget;
use crate::exec::{ExecError, ExecOutput, RemoteExecutor};

/// Connection state of a session.
#[derive(Clone, Copy, Debug, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The connection check succeeded.
    Connected,
}

/// Public description of a session.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct SessionInfo {
    /// Caller-chosen id.
    pub id: String,
    /// Remote host.
    pub host: String,
    /// Remote user.
    pub user: String,
    /// SSH port.
    pub port: u16,
    /// Connection state.
    pub state: SessionState,
}

/// Errors raised by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session has this id.
    #[error("unknown session {id}")]
    UnknownSession {
        /// Requested id.
        id: String,
    },
    /// A session with this id is already registered.
    #[error("session {id} already exists")]
    DuplicateSession {
        /// Requested id.
        id: String,
    },
    /// A session description does not read `id=user@host[:port]`.
    #[error("invalid session {spec}: {message}")]
    InvalidSpec {
        /// Offending text.
        spec: String,
        /// What is wrong with it.
        message: String,
    },
    /// The remote command failed.
    #[error("session {id}: {source}")]
    Exec {
        /// Session id.
        id: String,
        /// Underlying failure.
        #[source]
        source: ExecError,
    },
}

/// A session named as `id=user@host[:port]`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionSpec {
    /// Session id.
    pub id: String,
    /// Login target; the port defaults to 22.
    pub target: SshTarget,
}

impl FromStr for SessionSpec {
    type Err = SessionError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| SessionError::InvalidSpec {
            spec: spec.to_owned(),
            message: message.to_owned(),
        };
        let (id, login) = spec
            .split_once('=')
            .ok_or_else(|| invalid("expected id=user@host[:port]"))?;
        let (user, address) = login
            .split_once('@')
            .ok_or_else(|| invalid("missing user@"))?;
        let (host, port) = match address.rsplit_once(':') {
            Some((name, port_text)) => (
                name,
                port_text
                    .parse::<u16>()
                    .ok()
                    .filter(|value| *value > 0)
                    .ok_or_else(|| invalid("port must be between 1 and 65535"))?,
            ),
            None => (address, 22),
        };
        if [id, user, host].iter().any(|part| part.trim().is_empty()) {
            return Err(invalid("id, user and host must be non-empty"));
        }
        Ok(Self {
            id: id.to_owned(),
            target: SshTarget {
                user: user.to_owned(),
                host: host.to_owned(),
                port,
            },
        })
    }
}

/// Operations the heartbeat needs from a session provider.
pub trait SessionApi {
    /// Lists the open sessions.
    ///
    /// # Errors
    ///
    /// Implementations backed by a remote service may fail to answer.
    fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError>;

    /// Runs `command` in session `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownSession`] for an unknown id and
    /// [`SessionError::Exec`] when the command fails.
    fn execute(&self, id: &str, command: &str) -> Result<ExecOutput, SessionError>;
}

struct Session<E> {
    info: SessionInfo,
    executor: Arc<E>,
}

/// In-process registry of sessions keyed by id.
pub struct SessionRegistry<E> {
    sessions: RwLock<BTreeMap<String, Session<E>>>,
}

impl<E> Default for SessionRegistry<E> {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<E: RemoteExecutor> SessionRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `executor` with `echo` and registers it under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DuplicateSession`] when `id` is taken and
    /// [`SessionError::Exec`] when the check fails.
    pub fn connect(
        &self,
        id: &str,
        host: &str,
        user: &str,
        port: u16,
        executor: E,
    ) -> Result<SessionInfo, SessionError> {
        if self.read().contains_key(id) {
            return Err(SessionError::DuplicateSession { id: id.to_owned() });
        }
        executor.execute("echo connected").map_err(|source| SessionError::Exec {
            id: id.to_owned(),
            source,
        })?;
        let info = SessionInfo {
            id: id.to_owned(),
            host: host.to_owned(),
            user: user.to_owned(),
            port,
            state: SessionState::Connected,
        };
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(id) {
            return Err(SessionError::DuplicateSession { id: id.to_owned() });
        }
        sessions.insert(
            id.to_owned(),
            Session {
                info: info.clone(),
                executor: Arc::new(executor),
            },
        );
        info!(session = id, host, user, "session connected");
        Ok(info)
    }

    /// Removes a session and returns its executor. Commands already running
    /// in the session keep their own handle and finish normally.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownSession`] for an unknown id.
    pub fn disconnect(&self, id: &str) -> Result<Arc<E>, SessionError> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        let session = removed.ok_or_else(|| SessionError::UnknownSession { id: id.to_owned() })?;
        info!(session = id, "session disconnected");
        Ok(session.executor)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Session<E>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: RemoteExecutor> SessionApi for SessionRegistry<E> {
    fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        Ok(self
            .read()
            .values()
            .map(|session| session.info.clone())
            .collect())
    }

    fn execute(&self, id: &str, command: &str) -> Result<ExecOutput, SessionError> {
        // The lock is released before the command runs.
        let executor = self
            .read()
            .get(id)
            .map(|session| Arc::clone(&session.executor))
            .ok_or_else(|| SessionError::UnknownSession { id: id.to_owned() })?;
        executor
            .execute(command)
            .map_err(|source| SessionError::Exec {
                id: id.to_owned(),
                source,
            })
    }
}
