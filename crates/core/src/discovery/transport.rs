use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{CamsnapError, Result};

/// Result of one bounded receive on the probe socket.
///
/// Timeouts are a distinct variant rather than an `io::Error`: the scan
/// loop treats them as "no more replies" while any other error aborts.
#[derive(Debug)]
pub enum RecvOutcome {
    /// A datagram of `len` bytes arrived from `from`.
    Datagram { len: usize, from: SocketAddr },
    /// Nothing arrived within the requested wait.
    TimedOut,
}

/// Where a scan reads probe replies from. [`ProbeSocket`] is the only
/// production implementation.
pub trait ReplySource {
    /// Wait up to `wait` for one reply, copying it into `buf`.
    fn recv_reply(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<RecvOutcome>;
}

/// UDP socket used for a single WS-Discovery scan.
///
/// Binds an ephemeral socket, sends exactly one probe, then reads replies
/// with bounded waits. Owned by one scan and dropped with it.
pub struct ProbeSocket {
    socket: UdpSocket,
}

impl ProbeSocket {
    /// Bind the local end of the scan (usually `0.0.0.0:0`).
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| CamsnapError::Discovery {
            stage: "bind",
            source,
        })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send the probe payload once. No retries.
    pub fn send_probe(&self, payload: &[u8], target: SocketAddr) -> Result<usize> {
        self.socket
            .send_to(payload, target)
            .map_err(|source| CamsnapError::Discovery {
                stage: "send probe",
                source,
            })
    }

    /// Wait up to `wait` for one datagram.
    ///
    /// `WouldBlock` and `TimedOut` both surface as [`RecvOutcome::TimedOut`]
    /// (platforms disagree on which one a read timeout produces).
    pub fn recv(&self, buf: &mut [u8], wait: Duration) -> io::Result<RecvOutcome> {
        // A zero read timeout is rejected by the OS; clamp to 1ms.
        let wait = wait.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(wait))?;
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(RecvOutcome::Datagram { len, from }),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(RecvOutcome::TimedOut)
            }
            Err(e) => Err(e),
        }
    }
}

impl ReplySource for ProbeSocket {
    fn recv_reply(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<RecvOutcome> {
        self.recv(buf, wait)
    }
}
