//! Interactive SSH shell session implementing [`DeviceSession`].

use std::time::{Duration, Instant};

use log::{debug, trace};
use regex::bytes::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::buffer::PatternBuffer;
use super::transport::SshTransport;
use super::{DeviceSession, SessionFactory};
use crate::config::DeviceDescriptor;
use crate::error::SessionError;

/// Opens [`SshSession`]s.
#[derive(Debug, Clone)]
pub struct SshSessionFactory {
    /// Pattern that marks the prompt after login and after each command.
    prompt: Regex,
}

impl SshSessionFactory {
    /// Create a factory that waits for `prompt` after login.
    pub fn new(prompt: Regex) -> Self {
        Self { prompt }
    }
}

impl SessionFactory for SshSessionFactory {
    type Session = SshSession;

    async fn open(&self, device: &DeviceDescriptor) -> Result<SshSession, SessionError> {
        let transport = SshTransport::connect(device).await?;
        let channel = transport.open_channel().await?;

        let mut session = SshSession {
            host: device.address.clone(),
            transport,
            channel,
            buffer: PatternBuffer::default(),
            prompt: self.prompt.clone(),
            timeout: device.command_timeout(),
        };

        // Consume the login banner up to the first prompt
        session.read_until(&self.prompt).await?;
        debug!("Connected to {}", device.address);

        Ok(session)
    }
}

/// A PTY shell on one device.
pub struct SshSession {
    host: String,
    transport: SshTransport,
    channel: Channel<Msg>,
    buffer: PatternBuffer,
    prompt: Regex,
    timeout: Duration,
}

impl SshSession {
    async fn write_line(&mut self, text: &str) -> Result<(), SessionError> {
        let line = format!("{text}\n");
        self.channel.data(line.as_bytes()).await?;
        Ok(())
    }

    /// Read until `pattern` matches the tail of the buffer, then drain it.
    async fn read_until(&mut self, pattern: &Regex) -> Result<Vec<u8>, SessionError> {
        let timeout = self.timeout;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.buffer.search_tail(pattern).is_some() {
                return Ok(self.buffer.take());
            }

            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| SessionError::Timeout(timeout))?;

            match msg {
                Some(ChannelMsg::Data { ref data }) => {
                    trace!("{}: read {} bytes", self.host, data.len());
                    self.buffer.extend(data);
                }
                Some(ChannelMsg::ExtendedData { ref data, .. }) => self.buffer.extend(data),
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                    return Err(SessionError::Closed);
                }
                Some(_) => {}
            }
        }
    }
}

impl DeviceSession for SshSession {
    async fn resolve_prompt(&mut self) -> Result<String, SessionError> {
        self.write_line("").await?;
        let prompt = self.prompt.clone();
        let data = self.read_until(&prompt).await?;
        let text = String::from_utf8_lossy(&data);

        Ok(text
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string())
    }

    async fn send_command(&mut self, command: &str, terminator: &Regex) -> Result<String, SessionError> {
        let start = Instant::now();
        self.write_line(command).await?;
        let data = self.read_until(terminator).await?;
        let raw = String::from_utf8_lossy(&data);
        debug!(
            "{}: '{}' returned {} bytes in {:?}",
            self.host,
            command,
            data.len(),
            start.elapsed()
        );
        Ok(normalize_output(&raw, command))
    }

    async fn close(self) -> Result<(), SessionError> {
        // The channel is torn down with the connection
        self.transport.close().await
    }
}

/// Strip the command echo and the trailing prompt line.
fn normalize_output(raw: &str, command: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let output = text.trim_start_matches(['\r', '\n']);
    let output = output
        .strip_prefix(command)
        .unwrap_or(output)
        .trim_start_matches(['\r', '\n']);

    match memchr::memrchr(b'\n', output.as_bytes()) {
        Some(pos) => output[..pos].trim_end_matches('\r').to_string(),
        None => String::new(),
    }
}
