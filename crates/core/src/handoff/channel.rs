//! One outbound descriptor channel

use std::io;
use std::time::{Duration, Instant};

use dxpipe_sdk::TextureInfo;

use super::PipeEndpoint;

/// Outcome of trying to write a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No pipe yet or no client connected; try again later
    Deferred,
}

/// A pipe plus the delivery state of the descriptor sent over it
#[derive(Debug)]
pub struct HandoffChannel<P> {
    name: String,
    pipe: Option<P>,
    last_sent: Option<TextureInfo>,
    awaiting: bool,
    sent_at: Option<Instant>,
}

impl<P: PipeEndpoint> HandoffChannel<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipe: None,
            last_sent: None,
            awaiting: false,
            sent_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_pipe(&self) -> bool {
        self.pipe.is_some()
    }

    pub fn set_pipe(&mut self, pipe: P) {
        self.pipe = Some(pipe);
    }

    pub fn last_sent(&self) -> Option<TextureInfo> {
        self.last_sent
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    /// Whether `current` differs from what the consumer last received
    pub fn needs_send(&self, current: &TextureInfo) -> bool {
        self.last_sent.as_ref() != Some(current)
    }

    /// Write `info` if a pipe is available
    pub fn send(&mut self, info: TextureInfo, now: Instant) -> io::Result<SendOutcome> {
        let Some(pipe) = self.pipe.as_mut() else {
            return Ok(SendOutcome::Deferred);
        };

        let bytes = info.to_bytes();
        match pipe.write(&bytes) {
            Ok(written) if written == bytes.len() => {
                self.last_sent = Some(info);
                self.awaiting = true;
                self.sent_at = Some(now);
                tracing::info!(
                    pipe = %self.name,
                    handle = format_args!("{:#x}", info.handle),
                    width = info.width,
                    height = info.height,
                    format = info.format,
                    "Sent texture descriptor"
                );
                Ok(SendOutcome::Sent)
            }
            Ok(written) => {
                tracing::warn!(pipe = %self.name, "Short descriptor write ({} bytes)", written);
                Ok(SendOutcome::Deferred)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::NotConnected) => {
                Ok(SendOutcome::Deferred)
            }
            Err(e) => Err(e),
        }
    }

    /// Acknowledgment arrived
    pub fn confirm(&mut self) {
        self.awaiting = false;
        self.sent_at = None;
    }

    pub fn timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.awaiting
            && self
                .sent_at
                .is_some_and(|sent| now.saturating_duration_since(sent) > timeout)
    }

    /// Give up on the outstanding acknowledgment and force a resend
    pub fn expire(&mut self) {
        self.awaiting = false;
        self.sent_at = None;
        self.last_sent = None;
    }

    /// Drop the pipe and all delivery state
    pub fn reset(&mut self) {
        self.pipe = None;
        self.expire();
    }
}
