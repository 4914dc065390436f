use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, info, trace};

use super::protocol::{encode_request, parse_reply, seconds_from_value};
use super::{PlayerControl, PlayerError};

/// JSON IPC client for an mpv started with `--input-ipc-server=<socket>`.
pub(crate) struct MpvClient {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
    next_request_id: u64,
    closed: bool,
}

impl MpvClient {
    pub(crate) fn connect(path: &Path, query_timeout: Duration) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("failed to connect to mpv socket {}", path.display()))?;
        let client = Self::from_stream(stream, query_timeout)
            .with_context(|| format!("failed to set up mpv socket {}", path.display()))?;
        info!(socket = %path.display(), "connected to mpv");
        Ok(client)
    }

    pub(crate) fn from_stream(
        stream: UnixStream,
        query_timeout: Duration,
    ) -> Result<Self, PlayerError> {
        // A zero timeout is rejected by the socket API; treat it as "wait forever".
        let timeout = (!query_timeout.is_zero()).then_some(query_timeout);
        stream.set_read_timeout(timeout)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            next_request_id: 1,
            closed: false,
        })
    }

    fn send(&mut self, command: &[Value]) -> Result<u64, PlayerError> {
        if self.closed {
            return Err(PlayerError::Closed);
        }
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let line = encode_request(command, request_id)?;
        if let Err(err) = self.writer.write_all(line.as_bytes()) {
            self.closed = true;
            return Err(err.into());
        }
        let shown = Value::from(command.to_vec());
        trace!(request_id, command = %shown, "sent player command");
        Ok(request_id)
    }

    fn request(&mut self, command: &[Value]) -> Result<Option<Value>, PlayerError> {
        let request_id = self.send(command)?;
        self.await_reply(request_id, command)
    }

    fn await_reply(
        &mut self,
        request_id: u64,
        command: &[Value],
    ) -> Result<Option<Value>, PlayerError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                self.closed = true;
                return Err(PlayerError::Closed);
            }
            if line.trim().is_empty() {
                continue;
            }
            let reply = parse_reply(&line)?;
            if !reply.answers(request_id) {
                // Events and replies to fire-and-forget commands.
                trace!(line = line.trim(), "skipped player message");
                continue;
            }
            if reply.is_success() {
                return Ok(reply.data);
            }
            return Err(PlayerError::Rejected {
                command: command_name(command),
                error: reply.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
    }

    fn get_property(&mut self, name: &str) -> Option<Value> {
        match self.request(&[json!("get_property"), json!(name)]) {
            Ok(value) => value.filter(|value| !value.is_null()),
            Err(err) => {
                debug!(property = name, error = %err, "player query unavailable");
                None
            }
        }
    }
}

impl PlayerControl for MpvClient {
    fn load(&mut self, uri: &str) -> Result<()> {
        self.request(&[json!("loadfile"), json!(uri), json!("replace")])
            .with_context(|| format!("failed to load {uri}"))?;
        debug!(uri, "load requested");
        Ok(())
    }

    fn seek(&mut self, offset: i64) -> Result<()> {
        if offset <= 0 {
            return Ok(());
        }
        self.send(&[json!("set_property"), json!("time-pos"), json!(offset)])
            .with_context(|| format!("failed to seek to {offset}s"))?;
        Ok(())
    }

    fn position(&mut self) -> Option<u64> {
        self.get_property("time-pos")
            .as_ref()
            .and_then(seconds_from_value)
    }

    fn current_item(&mut self) -> Option<String> {
        match self.get_property("path")? {
            Value::String(path) if !path.trim().is_empty() => Some(path),
            _ => None,
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.send(&[json!("quit")]) {
            debug!(error = %err, "quit request not delivered");
        }
        let _ = self.writer.shutdown(Shutdown::Both);
        self.closed = true;
    }
}

fn command_name(command: &[Value]) -> String {
    command
        .first()
        .and_then(Value::as_str)
        .unwrap_or("command")
        .to_string()
}
