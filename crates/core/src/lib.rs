//! camsnap: find ONVIF cameras on the LAN, identify them, and run
//! motion-triggered automations against their RTSP streams.
//!
//! | Module | Role |
//! |--------|------|
//! | [`discovery`] | WS-Discovery probe over UDP multicast |
//! | [`onvif`] | `GetDeviceInformation` with WS-Security / Basic fallback |
//! | [`watch`] | ffmpeg scene-score watcher with cooldown and actions |
//! | [`config`] | Saved cameras (YAML) |
//! | [`rtsp_url`] | Stream URL building |
//! | [`ffmpeg`] | Argument lists for snapshot, clip, probe and analysis |
//! | [`process`] | Supervised and detached child processes |

pub mod cancel;
pub mod config;
pub mod discovery;
pub mod error;
pub mod ffmpeg;
pub mod net;
pub mod onvif;
pub mod process;
pub mod rtsp_url;
pub mod watch;
pub(crate) mod xml;

pub use cancel::CancelToken;
pub use config::{Camera, Config};
pub use discovery::{Device, Discoverer, DiscoveryConfig, discover};
pub use error::{CamsnapError, Result};
pub use net::check_reachable;
pub use onvif::{DeviceInfo, DeviceInfoClient, fetch_device_info};
pub use watch::{MotionWatch, WatchConfig, run_motion_watch};
