//! Liquidsoap control protocol.
//!
//! The engine exposes a line-oriented command interface on a Unix socket
//! (or its telnet server). Each command is a single newline-terminated line
//! and each reply is raw text closed by a fixed terminator. There are no
//! request identifiers, so commands and replies must strictly alternate on
//! the connection.
//!
//! - [`Transport`]: owns the byte stream, writes bytes and reads up to a delimiter
//! - [`LiquidsoapClient`]: serialized command/response API with typed accessors
//! - [`Terminator`]: which terminator closes the reply to a given command

mod client;
mod error;
mod reply;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use client::{LiquidsoapClient, QUIT_COMMAND, Session};
pub use error::LiquidsoapError;
pub use reply::{Terminator, VersionInfo, parse_uptime, parse_version};
pub use transport::{ControlStream, Endpoint, Transport};
