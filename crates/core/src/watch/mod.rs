//! Motion watch engine.
//!
//! Supervises one analysis process (ffmpeg with a scene-change filter),
//! reads its stderr line by line and turns scene scores into motion events.
//!
//! ```text
//!  Starting ──spawn──► Running ──score passes cooldown──► Triggering
//!     │                  │  ▲                                 │
//!     │ spawn error      │  └──── record written, action ─────┘
//!     ▼                  │        launched (detached)
//!  Err(Spawn)            │ end of stream / read error
//!                        ▼
//!                     Exited ──► Normal     (exit 0)
//!                            ──► Cancelled  (token fired; exit status ignored)
//!                            ──► Err(ProcessExited { class, .. })
//! ```
//!
//! Output is split on `\n` and `\r` and each line is capped at
//! [`MAX_LINE_BYTES`]. The last [`TRAILING_LINES`] lines are kept so an
//! abnormal exit can be classified (auth, refused, timeout, not found)
//! without holding the whole stream in memory.

mod classify;
mod event;
mod lines;
mod score;
mod session;

use std::io::{BufReader, Write};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::cancel::CancelToken;
use crate::error::{CamsnapError, Result};
use crate::ffmpeg::{self, RtspTransport};
use crate::process::{self, ProcessSpec, Supervised};
use crate::rtsp_url::replace_last_segment;

pub use classify::{ErrorClass, classify_error};
pub use event::{ENV_CAMERA, ENV_SCORE, ENV_TIME, MotionEvent, OutputFormat, render_template};
pub use lines::{LineReader, MAX_LINE_BYTES};
pub use score::{SCENE_SCORE_MARKER, parse_scene_score};
pub use session::{CooldownGate, LineWindow, TRAILING_LINES, WatchSession};

pub const DEFAULT_THRESHOLD: f64 = 0.2;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Which stream of the camera to analyse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamTarget {
    /// Use the URL as given.
    #[default]
    Default,
    /// Replace the last path segment with a stream name, e.g. `stream2`.
    Stream(String),
    /// Replace the last path segment with an explicit path.
    Path(String),
}

impl StreamTarget {
    /// Build from the mutually exclusive `--stream` / `--path` options.
    pub fn from_options(stream: Option<&str>, path: Option<&str>) -> Result<Self> {
        match (stream.filter(|s| !s.is_empty()), path.filter(|p| !p.is_empty())) {
            (Some(_), Some(_)) => Err(CamsnapError::InvalidInput(
                "use either --stream or --path, not both".to_string(),
            )),
            (Some(s), None) => Ok(Self::Stream(s.to_string())),
            (None, Some(p)) => Ok(Self::Path(p.to_string())),
            (None, None) => Ok(Self::Default),
        }
    }

    pub fn apply(&self, url: &str) -> String {
        match self {
            Self::Default => url.to_string(),
            Self::Stream(segment) | Self::Path(segment) => replace_last_segment(url, segment),
        }
    }
}

/// Parameters of one watch.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Camera name, used in records and templates.
    pub camera: String,
    /// Resolved stream URL, credentials included.
    pub url: String,
    /// Scene-change threshold, strictly between 0 and 1.
    pub threshold: f64,
    pub cooldown: Duration,
    /// Static action command, run with `sh -c`.
    pub action: String,
    /// Per-event template; when set it takes precedence over `action`.
    pub action_template: Option<String>,
    pub output: OutputFormat,
    pub transport: RtspTransport,
    pub stream: StreamTarget,
    /// Analysis program, `ffmpeg` unless overridden.
    pub program: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            camera: String::new(),
            url: String::new(),
            threshold: DEFAULT_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
            action: String::new(),
            action_template: None,
            output: OutputFormat::Text,
            transport: RtspTransport::Tcp,
            stream: StreamTarget::Default,
            program: ffmpeg::FFMPEG.to_string(),
        }
    }
}

impl WatchConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(CamsnapError::InvalidInput(format!(
                "threshold must be between 0 and 1 (exclusive), got {}",
                self.threshold
            )));
        }
        let has_template = self.action_template.as_deref().is_some_and(|t| !t.is_empty());
        if self.action.is_empty() && !has_template {
            return Err(CamsnapError::InvalidInput(
                "an action or action template is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The command to run for `event`.
    pub fn resolve_action(&self, event: &MotionEvent) -> String {
        match self.action_template.as_deref() {
            Some(template) if !template.is_empty() => render_template(template, event),
            _ => self.action.clone(),
        }
    }

    /// URL after applying the stream target.
    pub fn stream_url(&self) -> String {
        self.stream.apply(&self.url)
    }
}

/// How a watch ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The analysis process ended on its own with success.
    Normal,
    /// The cancel token fired; the process exit status was ignored.
    Cancelled,
}

/// Result of a watch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSummary {
    pub exit: WatchExit,
    /// Number of events that passed the cooldown gate.
    pub events: usize,
}

/// Runs a [`WatchConfig`] against its analysis process.
pub struct MotionWatch {
    config: WatchConfig,
    analyzer: Option<ProcessSpec>,
}

impl MotionWatch {
    /// Validates `config` up front so a bad threshold never starts a process.
    pub fn new(config: WatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            analyzer: None,
        })
    }

    /// Replace the analysis command entirely. Its stderr is read exactly as
    /// ffmpeg's would be.
    pub fn with_analyzer(mut self, spec: ProcessSpec) -> Self {
        self.analyzer = Some(spec);
        self
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    fn analyzer_spec(&self) -> ProcessSpec {
        match &self.analyzer {
            Some(spec) => spec.clone(),
            None => ProcessSpec::new(&self.config.program).args(ffmpeg::motion_args(
                &self.config.stream_url(),
                self.config.threshold,
                self.config.transport,
            )),
        }
    }

    /// Watch until the analysis process exits or `cancel` fires, writing
    /// one record per event to `out`.
    pub fn run(&self, cancel: &CancelToken, out: &mut dyn Write) -> Result<WatchSummary> {
        let spec = self.analyzer_spec();
        let mut proc = Supervised::spawn(&spec, cancel)?;
        tracing::info!(
            camera = %self.config.camera,
            program = %spec.program,
            threshold = self.config.threshold,
            cooldown = ?self.config.cooldown,
            "motion watch started"
        );

        let mut session = WatchSession::new(self.config.cooldown);
        let mut events = 0usize;
        let mut read_error = None;

        if let Some(stderr) = proc.take_stderr() {
            let mut reader = LineReader::new(BufReader::new(stderr));
            let mut raw = Vec::new();
            loop {
                match reader.read_line(&mut raw) {
                    Ok(false) => break,
                    Ok(true) => {}
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                }
                if raw.is_empty() {
                    continue;
                }
                let line = String::from_utf8_lossy(&raw);
                session.window.push(&line);

                let Some(score) = parse_scene_score(&line) else {
                    continue;
                };
                if !session.gate.try_trigger(Instant::now()) {
                    tracing::trace!(score, "candidate inside cooldown");
                    continue;
                }
                if let Err(e) = self.trigger(score, out) {
                    proc.kill();
                    let _ = proc.wait();
                    return Err(e);
                }
                events += 1;
            }
        }

        if let Some(e) = read_error {
            tracing::warn!(error = %e, "reading analysis output failed");
            proc.kill();
        }

        let status = proc.wait()?;
        if cancel.is_cancelled() {
            tracing::info!(camera = %self.config.camera, events, "motion watch cancelled");
            return Ok(WatchSummary {
                exit: WatchExit::Cancelled,
                events,
            });
        }
        if !status.success() {
            let class = classify_error(&session.window.joined());
            tracing::warn!(%status, %class, "analysis process failed");
            return Err(CamsnapError::ProcessExited {
                program: spec.program,
                status: status.to_string(),
                class,
            });
        }

        tracing::info!(camera = %self.config.camera, events, "motion watch finished");
        Ok(WatchSummary {
            exit: WatchExit::Normal,
            events,
        })
    }

    /// Emit the record for one accepted score and launch its action.
    fn trigger(&self, score: f64, out: &mut dyn Write) -> Result<()> {
        let event = MotionEvent {
            camera: self.config.camera.clone(),
            score,
            time: Utc::now(),
        };
        let action = self.config.resolve_action(&event);
        tracing::debug!(camera = %event.camera, score, "motion triggered");

        let record = event.format_record(self.config.output, &action)?;
        writeln!(out, "{record}")?;
        out.flush()?;

        if let Err(e) = process::detach(&event.action_spec(&action)) {
            tracing::warn!(error = %e, "action failed to start");
        }
        Ok(())
    }
}

/// Validate `config` and watch until exit or cancellation, writing records
/// to stdout.
pub fn run_motion_watch(config: WatchConfig, cancel: &CancelToken) -> Result<()> {
    let watch = MotionWatch::new(config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    watch.run(cancel, &mut out)?;
    Ok(())
}
