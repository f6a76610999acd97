//! ONVIF device identification.
//!
//! [`DeviceInfoClient`] calls `GetDeviceInformation` on a discovered
//! service address. Cameras differ in which credential scheme they accept,
//! so a fetch is a two-step sequence:
//!
//! | Attempt | SOAP header | HTTP `Authorization` | Runs when |
//! |---------|-------------|----------------------|-----------|
//! | 1 | WS-Security `UsernameToken` digest | none | a username is set |
//! | 2 | none | Basic (or absent when anonymous) | no username, or attempt 1 got 401/403 |

pub mod info;
pub mod security;

pub use info::{AttemptOutcome, AuthScheme, DeviceInfo, DeviceInfoClient, fetch_device_info};
pub use security::UsernameToken;
