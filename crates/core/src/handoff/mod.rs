//! Cross-process handoff
//!
//! Delivers the shareable-handle descriptor of each tracked texture to the
//! consumer process. One outbound pipe per texture, one inbound pipe for
//! acknowledgments:
//!
//! 1. wait until at least one shareable handle exists
//! 2. find the consumer by executable name
//! 3. create the pipes
//! 4. write any descriptor that changed since it was last delivered
//! 5. wait for an acknowledgment byte; after the timeout, resend
//!
//! The whole cycle runs on a frame cooldown, shortened while something is
//! outstanding. Nothing here blocks: pipes are non-blocking and a missing
//! consumer just defers to a later cycle.

mod channel;

pub use channel::{HandoffChannel, SendOutcome};

use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use dxpipe_sdk::wire::{self, CONFIRMATION_BUFFER_SIZE};
use dxpipe_sdk::TextureInfo;

use crate::capture::TextureRole;

/// Direction of a pipe as seen from this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    Outbound,
    Inbound,
}

/// Server end of a non-blocking byte pipe
pub trait PipeEndpoint: Send {
    /// Write without blocking
    ///
    /// `WouldBlock` or `NotConnected` mean no client yet. `BrokenPipe` means
    /// the client went away.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Read whatever is available without blocking; `Ok(0)` when nothing is
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// OS services the handoff needs
pub trait HandoffTransport: Send {
    type Pipe: PipeEndpoint;

    /// Create the server end of a single-instance pipe
    fn create_pipe(
        &mut self,
        name: &str,
        direction: PipeDirection,
        buffer_size: u32,
    ) -> io::Result<Self::Pipe>;

    /// Whether a process with this executable name is running
    fn consumer_running(&mut self, executable: &str) -> bool;

    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffConfig {
    pub consumer_executable: String,
    pub confirmation_timeout: Duration,
    /// Frames between cycles while idle or searching
    pub idle_interval: u32,
    /// Frames between cycles while a delivery is outstanding
    pub retry_interval: u32,
    pub backbuffer_pipe: String,
    pub depthbuffer_pipe: String,
    pub confirmation_pipe: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            consumer_executable: "bloxshade.exe".to_string(),
            confirmation_timeout: Duration::from_millis(2000),
            idle_interval: 30,
            retry_interval: 5,
            backbuffer_pipe: wire::BACKBUFFER_PIPE.to_string(),
            depthbuffer_pipe: wire::DEPTHBUFFER_PIPE.to_string(),
            confirmation_pipe: wire::CONFIRMATION_PIPE.to_string(),
        }
    }
}

impl HandoffConfig {
    pub fn pipe_for(&self, role: TextureRole) -> &str {
        match role {
            TextureRole::Color => &self.backbuffer_pipe,
            TextureRole::Depth => &self.depthbuffer_pipe,
        }
    }
}

/// What one call to [`Handoff::cycle`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffStatus {
    /// Between cycles
    CoolingDown,
    /// No shareable handle exists yet
    WaitingForHandles,
    /// Consumer process not running
    Searching,
    /// At least one descriptor was written
    Sent,
    /// A descriptor is out, no acknowledgment yet
    AwaitingConfirmation,
    /// The consumer acknowledged
    Confirmed,
    /// Pipes not ready or no client connected yet
    Deferred,
    /// Everything current has been delivered
    Idle,
}

impl HandoffStatus {
    /// Whether the next cycle should come sooner
    fn wants_retry(self) -> bool {
        matches!(
            self,
            HandoffStatus::Sent | HandoffStatus::AwaitingConfirmation | HandoffStatus::Deferred
        )
    }
}

impl fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Handoff protocol state
pub struct Handoff<T: HandoffTransport> {
    transport: T,
    config: HandoffConfig,
    channels: [HandoffChannel<T::Pipe>; 2],
    confirmation: Option<T::Pipe>,
    consumer_found: bool,
    cooldown: u32,
}

impl<T: HandoffTransport> Handoff<T> {
    pub fn new(transport: T, config: HandoffConfig) -> Self {
        let channels = [
            HandoffChannel::new(config.pipe_for(TextureRole::Color)),
            HandoffChannel::new(config.pipe_for(TextureRole::Depth)),
        ];
        Self {
            transport,
            config,
            channels,
            confirmation: None,
            consumer_found: false,
            cooldown: 0,
        }
    }

    pub fn config(&self) -> &HandoffConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn channel(&self, role: TextureRole) -> &HandoffChannel<T::Pipe> {
        &self.channels[role.index()]
    }

    pub fn consumer_found(&self) -> bool {
        self.consumer_found
    }

    fn awaiting(&self) -> bool {
        self.channels.iter().any(HandoffChannel::is_awaiting)
    }

    /// Run one frame's worth of the protocol
    ///
    /// `descriptors` is indexed by [`TextureRole`].
    pub fn cycle(&mut self, descriptors: [Option<TextureInfo>; 2]) -> HandoffStatus {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return HandoffStatus::CoolingDown;
        }

        let status = self.run(descriptors);
        let interval = if status.wants_retry() {
            self.config.retry_interval
        } else {
            self.config.idle_interval
        };
        self.cooldown = interval.saturating_sub(1);
        status
    }

    fn run(&mut self, descriptors: [Option<TextureInfo>; 2]) -> HandoffStatus {
        if descriptors.iter().all(Option::is_none) {
            return HandoffStatus::WaitingForHandles;
        }

        if !self.consumer_found {
            if !self.transport.consumer_running(&self.config.consumer_executable) {
                return HandoffStatus::Searching;
            }
            tracing::info!("Found consumer {}", self.config.consumer_executable);
            self.consumer_found = true;
        }

        self.ensure_pipes(&descriptors);

        let now = self.transport.now();
        let mut status = HandoffStatus::Idle;

        if self.awaiting() {
            match self.poll_confirmation() {
                Ok(true) => {
                    tracing::info!("Consumer confirmed texture descriptors");
                    self.channels.iter_mut().for_each(HandoffChannel::confirm);
                    status = HandoffStatus::Confirmed;
                }
                Ok(false) => {
                    let timeout = self.config.confirmation_timeout;
                    if self.channels.iter().any(|c| c.timed_out(now, timeout)) {
                        tracing::warn!("No confirmation within {:?}, resending", timeout);
                        self.channels.iter_mut().for_each(HandoffChannel::expire);
                    } else {
                        status = HandoffStatus::AwaitingConfirmation;
                    }
                }
                Err(e) => return self.consumer_lost(e),
            }
        }

        let mut sent = false;
        let mut deferred = false;
        for (channel, descriptor) in self.channels.iter_mut().zip(descriptors) {
            let Some(info) = descriptor else { continue };
            if !channel.needs_send(&info) {
                continue;
            }
            match channel.send(info, now) {
                Ok(SendOutcome::Sent) => sent = true,
                Ok(SendOutcome::Deferred) => deferred = true,
                Err(e) => {
                    tracing::warn!(pipe = channel.name(), "Descriptor write failed: {}", e);
                    if e.kind() == io::ErrorKind::BrokenPipe {
                        return self.consumer_lost(e);
                    }
                    deferred = true;
                }
            }
        }

        if sent {
            HandoffStatus::Sent
        } else if deferred && status == HandoffStatus::Idle {
            HandoffStatus::Deferred
        } else {
            status
        }
    }

    fn ensure_pipes(&mut self, descriptors: &[Option<TextureInfo>; 2]) {
        if self.confirmation.is_none() {
            match self.transport.create_pipe(
                &self.config.confirmation_pipe,
                PipeDirection::Inbound,
                CONFIRMATION_BUFFER_SIZE,
            ) {
                Ok(pipe) => self.confirmation = Some(pipe),
                Err(e) => tracing::warn!(
                    pipe = %self.config.confirmation_pipe,
                    "Failed to create pipe: {}",
                    e
                ),
            }
        }

        for (channel, descriptor) in self.channels.iter_mut().zip(descriptors) {
            if channel.has_pipe() || descriptor.is_none() {
                continue;
            }
            match self.transport.create_pipe(
                channel.name(),
                PipeDirection::Outbound,
                TextureInfo::SIZE as u32,
            ) {
                Ok(pipe) => {
                    tracing::debug!(pipe = channel.name(), "Created pipe");
                    channel.set_pipe(pipe);
                }
                Err(e) => tracing::warn!(pipe = channel.name(), "Failed to create pipe: {}", e),
            }
        }
    }

    fn poll_confirmation(&mut self) -> io::Result<bool> {
        let Some(pipe) = self.confirmation.as_mut() else {
            return Ok(false);
        };
        let mut buf = [0u8; CONFIRMATION_BUFFER_SIZE as usize];
        match pipe.read(&mut buf) {
            Ok(read) => Ok(read > 0),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::NotConnected) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// The consumer disconnected: tear everything down and search again
    fn consumer_lost(&mut self, error: io::Error) -> HandoffStatus {
        tracing::warn!("Consumer disconnected ({}), searching again", error);
        self.channels.iter_mut().for_each(HandoffChannel::reset);
        self.confirmation = None;
        self.consumer_found = false;
        HandoffStatus::Searching
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Shared state behind a [`ScriptedTransport`]
    #[derive(Default)]
    pub struct Script {
        pub consumer_running: bool,
        pub client_connected: bool,
        pub broken: bool,
        pub acks: usize,
        pub created: Vec<(String, PipeDirection, u32)>,
        pub writes: HashMap<String, Vec<Vec<u8>>>,
        pub elapsed: Duration,
    }

    impl Script {
        pub fn writes_to(&self, pipe: &str) -> usize {
            self.writes.get(pipe).map(Vec::len).unwrap_or(0)
        }
    }

    pub struct ScriptedTransport {
        pub script: Arc<Mutex<Script>>,
        epoch: Instant,
    }

    impl ScriptedTransport {
        pub fn new() -> (Self, Arc<Mutex<Script>>) {
            let script = Arc::new(Mutex::new(Script::default()));
            (
                Self {
                    script: script.clone(),
                    epoch: Instant::now(),
                },
                script,
            )
        }
    }

    pub struct ScriptedPipe {
        name: String,
        script: Arc<Mutex<Script>>,
    }

    impl PipeEndpoint for ScriptedPipe {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            let mut script = self.script.lock();
            if script.broken {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            if !script.client_connected {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            script
                .writes
                .entry(self.name.clone())
                .or_default()
                .push(bytes.to_vec());
            Ok(bytes.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut script = self.script.lock();
            if script.acks == 0 {
                return Ok(0);
            }
            script.acks -= 1;
            buf[0] = 1;
            Ok(1)
        }
    }

    impl HandoffTransport for ScriptedTransport {
        type Pipe = ScriptedPipe;

        fn create_pipe(
            &mut self,
            name: &str,
            direction: PipeDirection,
            buffer_size: u32,
        ) -> io::Result<ScriptedPipe> {
            self.script
                .lock()
                .created
                .push((name.to_string(), direction, buffer_size));
            Ok(ScriptedPipe {
                name: name.to_string(),
                script: self.script.clone(),
            })
        }

        fn consumer_running(&mut self, _executable: &str) -> bool {
            self.script.lock().consumer_running
        }

        fn now(&self) -> Instant {
            self.epoch + self.script.lock().elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::*;
    use super::*;
    use dxpipe_sdk::Format;

    const BACK: &str = "dxpipe_backbuffer";
    const DEPTH: &str = "dxpipe_depthbuffer";

    fn color() -> TextureInfo {
        TextureInfo::new(0x1000, 1920, 1080, Format::B8G8R8A8_UNORM)
    }

    fn depth() -> TextureInfo {
        TextureInfo::new(0x2000, 1920, 1080, Format::R32_TYPELESS)
    }

    /// Call `cycle` until it does something other than cool down
    fn next_cycle<T: HandoffTransport>(
        handoff: &mut Handoff<T>,
        descriptors: [Option<TextureInfo>; 2],
    ) -> HandoffStatus {
        for _ in 0..64 {
            let status = handoff.cycle(descriptors);
            if status != HandoffStatus::CoolingDown {
                return status;
            }
        }
        panic!("handoff never left cooldown");
    }

    fn connected() -> (Handoff<ScriptedTransport>, std::sync::Arc<parking_lot::Mutex<Script>>) {
        let (transport, script) = ScriptedTransport::new();
        {
            let mut s = script.lock();
            s.consumer_running = true;
            s.client_connected = true;
        }
        (Handoff::new(transport, HandoffConfig::default()), script)
    }

    #[test]
    fn test_waits_for_handles() {
        let (mut handoff, script) = connected();
        assert_eq!(handoff.cycle([None, None]), HandoffStatus::WaitingForHandles);
        assert!(script.lock().created.is_empty());
    }

    #[test]
    fn test_consumer_absent_makes_no_writes() {
        let (transport, script) = ScriptedTransport::new();
        let mut handoff = Handoff::new(transport, HandoffConfig::default());

        for _ in 0..3 {
            assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Searching);
        }
        let s = script.lock();
        assert!(s.created.is_empty());
        assert!(s.writes.is_empty());
    }

    #[test]
    fn test_consumer_appears_creates_pipes_and_sends() {
        let (transport, script) = ScriptedTransport::new();
        script.lock().client_connected = true;
        let mut handoff = Handoff::new(transport, HandoffConfig::default());

        assert_eq!(next_cycle(&mut handoff, [Some(color()), Some(depth())]), HandoffStatus::Searching);

        script.lock().consumer_running = true;
        assert_eq!(next_cycle(&mut handoff, [Some(color()), Some(depth())]), HandoffStatus::Sent);
        assert!(handoff.channel(TextureRole::Color).is_awaiting());
        assert!(handoff.channel(TextureRole::Depth).is_awaiting());

        let s = script.lock();
        assert_eq!(s.created.len(), 3);
        assert!(s
            .created
            .contains(&("dxpipe_confirmation".to_string(), PipeDirection::Inbound, 4)));
        assert!(s
            .created
            .contains(&(BACK.to_string(), PipeDirection::Outbound, TextureInfo::SIZE as u32)));
        assert_eq!(s.writes[BACK], vec![color().to_bytes().to_vec()]);
        assert_eq!(s.writes[DEPTH], vec![depth().to_bytes().to_vec()]);
    }

    #[test]
    fn test_idle_cadence() {
        let (transport, script) = ScriptedTransport::new();
        let mut handoff = Handoff::new(transport, HandoffConfig::default());

        assert_eq!(handoff.cycle([Some(color()), None]), HandoffStatus::Searching);
        for _ in 0..29 {
            assert_eq!(handoff.cycle([Some(color()), None]), HandoffStatus::CoolingDown);
        }
        script.lock().consumer_running = true;
        assert_eq!(handoff.cycle([Some(color()), None]), HandoffStatus::Sent);
    }

    #[test]
    fn test_retry_cadence_while_awaiting() {
        let (mut handoff, _script) = connected();
        assert_eq!(handoff.cycle([Some(color()), None]), HandoffStatus::Sent);
        for _ in 0..4 {
            assert_eq!(handoff.cycle([Some(color()), None]), HandoffStatus::CoolingDown);
        }
        assert_eq!(
            handoff.cycle([Some(color()), None]),
            HandoffStatus::AwaitingConfirmation
        );
    }

    #[test]
    fn test_confirmation_clears_awaiting() {
        let (mut handoff, script) = connected();
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Sent);

        script.lock().acks = 1;
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Confirmed);
        assert!(!handoff.channel(TextureRole::Color).is_awaiting());

        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Idle);
        assert_eq!(script.lock().writes_to(BACK), 1);
    }

    #[test]
    fn test_timeout_resends_identical_descriptor() {
        let (mut handoff, script) = connected();
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Sent);

        script.lock().elapsed = Duration::from_millis(1500);
        assert_eq!(
            next_cycle(&mut handoff, [Some(color()), None]),
            HandoffStatus::AwaitingConfirmation
        );
        assert_eq!(script.lock().writes_to(BACK), 1);

        script.lock().elapsed = Duration::from_millis(2001);
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Sent);

        let s = script.lock();
        assert_eq!(s.writes_to(BACK), 2);
        assert_eq!(s.writes[BACK][0], s.writes[BACK][1]);
    }

    #[test]
    fn test_changed_descriptor_is_resent() {
        let (mut handoff, script) = connected();
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Sent);
        script.lock().acks = 1;
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Confirmed);

        let resized = TextureInfo::new(0x3000, 1280, 720, Format::B8G8R8A8_UNORM);
        assert_eq!(next_cycle(&mut handoff, [Some(resized), None]), HandoffStatus::Sent);
        assert_eq!(handoff.channel(TextureRole::Color).last_sent(), Some(resized));
        assert_eq!(script.lock().writes_to(BACK), 2);
    }

    #[test]
    fn test_unconnected_client_defers() {
        let (transport, script) = ScriptedTransport::new();
        script.lock().consumer_running = true;
        let mut handoff = Handoff::new(transport, HandoffConfig::default());

        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Deferred);
        assert_eq!(handoff.channel(TextureRole::Color).last_sent(), None);

        script.lock().client_connected = true;
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Sent);
    }

    #[test]
    fn test_broken_pipe_returns_to_search() {
        let (mut handoff, script) = connected();
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Sent);
        script.lock().acks = 1;
        assert_eq!(next_cycle(&mut handoff, [Some(color()), None]), HandoffStatus::Confirmed);

        {
            let mut s = script.lock();
            s.broken = true;
            s.consumer_running = false;
        }
        let moved = TextureInfo::new(0x4000, 1920, 1080, Format::B8G8R8A8_UNORM);
        assert_eq!(next_cycle(&mut handoff, [Some(moved), None]), HandoffStatus::Searching);
        assert!(!handoff.consumer_found());
        assert!(!handoff.channel(TextureRole::Color).has_pipe());

        {
            let mut s = script.lock();
            s.broken = false;
            s.consumer_running = true;
        }
        assert_eq!(next_cycle(&mut handoff, [Some(moved), None]), HandoffStatus::Sent);
        assert_eq!(script.lock().created.len(), 4);
    }
}
