//! Command/response client over a single control connection.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use super::reply::{Terminator, VersionInfo, parse_uptime, parse_version};
use super::{LiquidsoapError, Transport};

/// Command that ends the control session. The engine answers `Bye!`.
pub const QUIT_COMMAND: &str = "exit";

/// Connection state behind the admission gate.
#[derive(Debug)]
struct Connection {
    transport: Option<Transport>,
    /// Set once the stream can no longer be trusted to pair replies.
    poisoned: Option<String>,
    quit: bool,
}

/// Serialized command/response API over one [`Transport`].
///
/// Every command holds a FIFO mutex for its full write/read cycle, so
/// concurrent callers never interleave on the wire. Callers that need several
/// commands back to back without anybody else in between take a [`Session`].
#[derive(Debug)]
pub struct LiquidsoapClient {
    connection: Mutex<Connection>,
    command_timeout: Duration,
}

impl LiquidsoapClient {
    /// Create a client owning `transport`. Each command is bounded by `command_timeout`.
    pub fn new(transport: Transport, command_timeout: Duration) -> Self {
        Self {
            connection: Mutex::new(Connection {
                transport: Some(transport),
                poisoned: None,
                quit: false,
            }),
            command_timeout,
        }
    }

    /// Wait for exclusive use of the connection.
    pub async fn session(&self) -> Session<'_> {
        Session {
            connection: self.connection.lock().await,
            command_timeout: self.command_timeout,
        }
    }

    /// Send one command and return its reply without the terminator.
    pub async fn send_command(&self, command: &str) -> Result<String, LiquidsoapError> {
        self.session().await.send_command(command).await
    }

    /// Start time of the engine, derived from its uptime.
    ///
    /// `Ok(None)` means the engine answered but the reply was not an uptime.
    pub async fn uptime(&self) -> Result<Option<DateTime<Utc>>, LiquidsoapError> {
        let reply = self.send_command("uptime").await?;
        let now = Utc::now();

        match parse_uptime(&reply) {
            Some(uptime) => Ok(now.checked_sub_signed(uptime)),
            None => {
                tracing::warn!(reply = %reply.trim_end(), "Unrecognized uptime reply");
                Ok(None)
            }
        }
    }

    /// Engine version.
    ///
    /// `Ok(None)` means the engine answered but the reply was not a version.
    pub async fn version(&self) -> Result<Option<VersionInfo>, LiquidsoapError> {
        let reply = self.send_command("version").await?;

        let version = parse_version(&reply);
        if version.is_none() {
            tracing::warn!(reply = %reply.trim_end(), "Unrecognized version reply");
        }
        Ok(version)
    }

    /// Say goodbye to the engine. The transport stays open; see [`close`](Self::close).
    pub async fn quit(&self) -> Result<(), LiquidsoapError> {
        let mut session = self.session().await;
        session.send_command(QUIT_COMMAND).await?;
        session.connection.quit = true;
        tracing::debug!("Control session ended");
        Ok(())
    }

    /// Release the transport. Safe to call more than once.
    pub async fn close(&self) -> Result<(), LiquidsoapError> {
        let mut connection = self.connection.lock().await;
        match connection.transport.take() {
            Some(mut transport) => {
                transport.close().await?;
                tracing::info!("Closed control connection");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Whether a framing failure made the connection unusable.
    pub async fn is_poisoned(&self) -> bool {
        self.connection.lock().await.poisoned.is_some()
    }
}

/// Exclusive use of the connection for a sequence of commands.
pub struct Session<'a> {
    connection: MutexGuard<'a, Connection>,
    command_timeout: Duration,
}

impl Session<'_> {
    /// Send one command and return its reply without the terminator.
    ///
    /// A trailing newline is appended if missing. Any failure that may have
    /// left a partial reply on the stream poisons the connection.
    pub async fn send_command(&mut self, command: &str) -> Result<String, LiquidsoapError> {
        let connection = &mut *self.connection;
        if connection.quit {
            return Err(LiquidsoapError::Closed);
        }
        if let Some(reason) = &connection.poisoned {
            return Err(LiquidsoapError::Poisoned(reason.clone()));
        }
        let transport = connection
            .transport
            .as_mut()
            .ok_or(LiquidsoapError::Closed)?;

        let mut line = command.to_owned();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        let name = line.trim_end().to_owned();
        tracing::debug!(command = %name, "Sending command");

        let result = timeout(self.command_timeout, exchange(transport, &line))
            .await
            .unwrap_or_else(|_| {
                Err(LiquidsoapError::Timeout {
                    command: name.clone(),
                    timeout: self.command_timeout,
                })
            });

        if let Err(e) = &result {
            if e.poisons_connection() {
                tracing::error!(command = %name, error = %e, "Control connection desynchronized");
                connection.poisoned = Some(e.to_string());
            }
        }
        result
    }
}

/// One write/read cycle.
async fn exchange(transport: &mut Transport, line: &str) -> Result<String, LiquidsoapError> {
    let expected = Terminator::for_command(line);
    let unexpected = expected.other();

    transport.write(line.as_bytes()).await?;
    let (mut data, matched) = transport
        .read_until_any(&[expected.as_bytes(), unexpected.as_bytes()])
        .await?;

    if matched != 0 {
        return Err(LiquidsoapError::Protocol(format!(
            "expected {:?} terminator for '{}', got {:?}",
            expected,
            line.trim_end(),
            unexpected
        )));
    }

    data.truncate(data.len() - expected.as_bytes().len());
    String::from_utf8(data)
        .map_err(|e| LiquidsoapError::Protocol(format!("reply is not valid UTF-8: {e}")))
}
