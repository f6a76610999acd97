//! TCP reachability checks.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{CamsnapError, Result};

/// One TCP connect attempt to `host:port`, bounded by `timeout`.
///
/// Every resolved address is tried in turn; the last connect error is
/// returned when none answers.
pub fn check_reachable(host: &str, port: u16, timeout: Duration) -> Result<()> {
    let addrs: Vec<_> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => {
                tracing::debug!(%addr, "reachable");
                return Ok(());
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => e.into(),
        None => CamsnapError::InvalidInput(format!("{host} resolved to no addresses")),
    })
}
