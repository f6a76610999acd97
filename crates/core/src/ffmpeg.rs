//! ffmpeg invocations.
//!
//! camsnap never touches video itself; every capture and analysis job is an
//! ffmpeg child process. This module only builds argument lists and runs
//! them under [`crate::process`] supervision.
//!
//! | Job | Key arguments |
//! |-----|---------------|
//! | Motion analysis | `-nostats ... -vf select='gt(scene\,T)',metadata=print -f null -` |
//! | Snapshot | `-frames:v 1 -q:v 2 <out>` |
//! | Clip | `-t <secs> -c:v copy [-an \| -c:a <codec>] <out>` |
//! | Probe | `-t 1 -f null -` |

use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{CamsnapError, Result};
use crate::process::{self, ProcessSpec};
use crate::watch::classify_error;

pub const FFMPEG: &str = "ffmpeg";

/// Audio codec used for clips when none is configured.
pub const DEFAULT_AUDIO_CODEC: &str = "aac";

/// RTSP lower transport passed to `-rtsp_transport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtspTransport {
    #[default]
    Tcp,
    Udp,
}

impl RtspTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for RtspTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RtspTransport {
    type Err = CamsnapError;

    /// Case-insensitive; an empty string means TCP.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(CamsnapError::InvalidInput(format!(
                "invalid RTSP transport {other:?} (use tcp|udp)"
            ))),
        }
    }
}

fn input_args(url: &str, transport: RtspTransport) -> Vec<String> {
    vec![
        "-rtsp_transport".to_string(),
        transport.as_str().to_string(),
        "-i".to_string(),
        url.to_string(),
    ]
}

/// Scene-change analysis writing per-frame scores to stderr.
pub fn motion_args(url: &str, threshold: f64, transport: RtspTransport) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-nostats", "-loglevel", "info"]
        .into_iter()
        .map(String::from)
        .collect();
    args.extend(input_args(url, transport));
    args.extend(["-an", "-sn", "-dn", "-vf"].into_iter().map(String::from));
    args.push(format!("select='gt(scene\\,{threshold:.3})',metadata=print"));
    args.extend(["-f", "null", "-"].into_iter().map(String::from));
    args
}

/// Grab one frame into `out`.
pub fn snapshot_args(url: &str, transport: RtspTransport, out: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    args.extend(input_args(url, transport));
    args.extend(["-frames:v", "1", "-q:v", "2"].into_iter().map(String::from));
    args.push(out.display().to_string());
    args
}

/// Audio handling for clips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipAudio {
    Drop,
    Encode(String),
}

impl Default for ClipAudio {
    fn default() -> Self {
        Self::Encode(DEFAULT_AUDIO_CODEC.to_string())
    }
}

/// Record `duration` of stream into `out`, copying video.
pub fn clip_args(
    url: &str,
    transport: RtspTransport,
    duration: Duration,
    audio: &ClipAudio,
    out: &Path,
) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    args.extend(input_args(url, transport));
    args.push("-t".to_string());
    args.push(format!("{:.0}", duration.as_secs_f64()));
    args.extend(["-c:v", "copy"].into_iter().map(String::from));
    match audio {
        ClipAudio::Drop => args.push("-an".to_string()),
        ClipAudio::Encode(codec) => {
            args.push("-c:a".to_string());
            args.push(codec.clone());
        }
    }
    args.push(out.display().to_string());
    args
}

/// Pull one second of stream and discard it; a cheap end-to-end check.
pub fn probe_args(url: &str, transport: RtspTransport) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(String::from)
        .collect();
    args.extend(input_args(url, transport));
    args.extend(["-t", "1", "-f", "null", "-"].into_iter().map(String::from));
    args
}

/// Whether `name` resolves to a file in one of the `PATH` directories.
pub fn has_binary(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(name).is_file())
}

/// Run ffmpeg with `args` until it exits or `cancel` fires.
///
/// A non-zero exit becomes [`CamsnapError::ProcessExited`] classified from
/// the captured stderr. Returns the stderr text on success.
pub fn run(args: &[String], cancel: &CancelToken) -> Result<String> {
    let spec = ProcessSpec::new(FFMPEG).args(args.iter().cloned());
    tracing::debug!(args = ?args, "running ffmpeg");
    let out = process::run_captured(&spec, cancel)?;
    if !out.status.success() {
        return Err(CamsnapError::ProcessExited {
            program: FFMPEG.to_string(),
            status: out.status.to_string(),
            class: classify_error(&out.stderr),
        });
    }
    Ok(out.stderr)
}
