//! In-memory engine for unit tests.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

use super::Transport;

/// Format an ordinary reply the way the engine does.
pub(crate) fn reply(body: &str) -> String {
    format!("{body}\r\nEND\r\n")
}

/// Scripted engine on the far side of an in-memory stream.
///
/// The handler maps each received command line to the raw bytes written
/// back. An empty answer hangs up.
pub(crate) struct FakeEngine {
    pub transport: Transport,
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl FakeEngine {
    pub fn spawn<F>(mut handler: F) -> Self
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        let (client, server) = duplex(4096);
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = commands.clone();

        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log.lock().unwrap().push(line.clone());
                let answer = handler(&line);
                if answer.is_empty() {
                    break;
                }
                if write.write_all(answer.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        Self {
            transport: Transport::from_stream(client),
            commands,
        }
    }
}
