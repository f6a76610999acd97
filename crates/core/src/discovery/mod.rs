//! ONVIF device discovery over WS-Discovery.
//!
//! A scan is a single multicast round trip:
//!
//! ```text
//! client                          239.255.255.250:3702
//!   | --- Probe (uuid:...) ------------> |
//!   | <-- ProbeMatches (XAddrs) -------- |  camera A
//!   | <-- ProbeMatches (XAddrs) -------- |  camera B
//!   |          ... until deadline ...    |
//! ```
//!
//! - [`probe`]: builds the outbound `Probe` envelope.
//! - [`parse`]: extracts `XAddrs` service addresses from replies.
//! - [`transport`]: the UDP socket, with timeouts modelled as
//!   [`transport::RecvOutcome::TimedOut`] rather than an error.
//!
//! Results are deduplicated by `host:port`. Nothing is persisted between
//! scans; every call to [`Discoverer::run`] is independent.

pub mod parse;
pub mod probe;
pub mod transport;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use url::{Position, Url};

use crate::cancel::CancelToken;
use crate::error::{CamsnapError, Result};
pub use parse::parse_probe_matches;
pub use probe::ProbeEnvelope;
pub use transport::{ProbeSocket, RecvOutcome, ReplySource};

/// Scan length used when the caller passes a zero timeout.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Upper bound on a single blocking receive, so cancellation is noticed
/// promptly even when the deadline is far away.
const RECV_SLICE: Duration = Duration::from_millis(100);

const RECV_BUFFER_SIZE: usize = 8192;

/// A network endpoint that answered a probe.
///
/// Only `address` and `host` are filled in by discovery; the identity
/// fields stay empty until [`Device::apply_info`] is called with the result
/// of a device-info fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Device {
    /// Full service endpoint as reported in `XAddrs`.
    pub address: String,
    /// `host[:port]` taken from `address`; empty when it has no authority.
    pub host: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware: String,
    pub serial: String,
    pub hardware_id: String,
}

impl Device {
    pub fn from_address(address: &str) -> Self {
        Self {
            address: address.to_string(),
            host: host_port(address),
            ..Self::default()
        }
    }

    /// Key used for deduplication: `host`, or `address` when host is empty.
    pub fn dedup_key(&self) -> &str {
        if self.host.is_empty() {
            &self.address
        } else {
            &self.host
        }
    }

    /// Copy identity fields from a device-info response.
    pub fn apply_info(&mut self, info: &crate::onvif::DeviceInfo) {
        self.manufacturer = info.manufacturer.clone();
        self.model = info.model.clone();
        self.firmware = info.firmware.clone();
        self.serial = info.serial.clone();
        self.hardware_id = info.hardware_id.clone();
    }

    /// Identity fields as a [`DeviceInfo`](crate::onvif::DeviceInfo).
    pub fn info(&self) -> crate::onvif::DeviceInfo {
        crate::onvif::DeviceInfo {
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            firmware: self.firmware.clone(),
            serial: self.serial.clone(),
            hardware_id: self.hardware_id.clone(),
        }
    }
}

/// Extract `host[:port]` from a service address.
///
/// Returns an empty string for unparseable or host-less addresses (e.g.
/// `urn:uuid:...`). Default ports (`:80` for `http`) are normalized away.
pub fn host_port(address: &str) -> String {
    match Url::parse(address) {
        Ok(url) if url.has_host() => url[Position::BeforeHost..Position::AfterPort].to_string(),
        _ => String::new(),
    }
}

/// Insertion-ordered set of devices keyed by [`Device::dedup_key`].
///
/// The first device seen for a key wins; later duplicates are dropped
/// without merging their fields.
#[derive(Debug, Default)]
pub struct DeviceSet {
    seen: HashSet<String>,
    devices: Vec<Device>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already present. Returns whether it was new.
    pub fn insert(&mut self, device: Device) -> bool {
        if !self.seen.insert(device.dedup_key().to_string()) {
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn into_vec(self) -> Vec<Device> {
        self.devices
    }
}

/// Deduplicate a list of devices, preserving first-seen order.
pub fn unique_devices(devices: impl IntoIterator<Item = Device>) -> Vec<Device> {
    let mut set = DeviceSet::new();
    for device in devices {
        set.insert(device);
    }
    set.into_vec()
}

/// Scan parameters.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Where the probe is sent: `239.255.255.250:3702` in production; tests
    /// point this at a loopback responder.
    pub target: SocketAddr,
    /// Local bind address for the ephemeral socket.
    pub bind: SocketAddr,
    /// How long to collect replies. Zero falls back to
    /// [`DEFAULT_DISCOVERY_TIMEOUT`].
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::from(([239, 255, 255, 250], 3702)),
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Runs WS-Discovery scans.
pub struct Discoverer {
    config: DiscoveryConfig,
}

impl Discoverer {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Send one probe and collect replies until the timeout elapses or
    /// `cancel` fires, whichever comes first.
    ///
    /// Malformed or empty replies are skipped. A receive timeout ends the
    /// scan normally; any other receive error ends it with
    /// [`CamsnapError::ScanAborted`], which carries the devices already
    /// collected.
    pub fn run(&self, cancel: &CancelToken) -> Result<Vec<Device>> {
        let timeout = if self.config.timeout.is_zero() {
            DEFAULT_DISCOVERY_TIMEOUT
        } else {
            self.config.timeout
        };
        let mut deadline = Instant::now() + timeout;
        if let Some(cancel_deadline) = cancel.deadline() {
            deadline = deadline.min(cancel_deadline);
        }

        let mut socket = ProbeSocket::bind(self.config.bind)?;
        let probe = ProbeEnvelope::new();
        socket.send_probe(probe.serialize().as_bytes(), self.config.target)?;

        tracing::debug!(
            target_addr = %self.config.target,
            message_id = probe.message_id(),
            ?timeout,
            "WS-Discovery probe sent"
        );

        collect_replies(&mut socket, deadline, cancel)
    }
}

/// Read and parse replies from `source` until `deadline` or cancellation.
///
/// Unusable replies are skipped. A receive error other than a timeout ends
/// collection with [`CamsnapError::ScanAborted`] carrying what was found.
pub fn collect_replies<S: ReplySource>(
    source: &mut S,
    deadline: Instant,
    cancel: &CancelToken,
) -> Result<Vec<Device>> {
    let mut devices = DeviceSet::new();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        if cancel.is_cancelled() {
            tracing::debug!("discovery cancelled");
            break;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let wait = (deadline - now).min(RECV_SLICE);

        match source.recv_reply(&mut buf, wait) {
            Ok(RecvOutcome::TimedOut) => continue,
            Ok(RecvOutcome::Datagram { len, from }) => match parse_probe_matches(&buf[..len]) {
                Ok(addrs) => {
                    for addr in addrs {
                        devices.insert(Device::from_address(&addr));
                    }
                }
                Err(e) => {
                    tracing::debug!(%from, error = %e, "ignoring unusable probe reply");
                }
            },
            Err(source) => {
                tracing::warn!(error = %source, "discovery receive failed");
                return Err(CamsnapError::ScanAborted {
                    source,
                    partial: devices.into_vec(),
                });
            }
        }
    }

    tracing::info!(devices = devices.len(), "discovery finished");
    Ok(devices.into_vec())
}

/// Scan the local network with default settings.
pub fn discover(timeout: Duration) -> Result<Vec<Device>> {
    Discoverer::new(DiscoveryConfig::with_timeout(timeout)).run(&CancelToken::new())
}
