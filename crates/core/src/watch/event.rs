use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::Result;
use crate::process::ProcessSpec;

/// Environment variables exposed to action commands.
pub const ENV_CAMERA: &str = "CAMSNAP_CAMERA";
pub const ENV_SCORE: &str = "CAMSNAP_SCORE";
pub const ENV_TIME: &str = "CAMSNAP_TIME";

/// One accepted motion detection.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    pub camera: String,
    pub score: f64,
    pub time: DateTime<Utc>,
}

/// How event records are written to the caller's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `event=motion camera=... score=... action="..." time=...`
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    event: &'static str,
    camera: &'a str,
    score: Box<RawValue>,
    time: String,
}

impl MotionEvent {
    /// Score with three decimals, as used in output and templates.
    pub fn score_text(&self) -> String {
        format!("{:.3}", self.score)
    }

    /// RFC 3339 timestamp with nanoseconds.
    pub fn time_text(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Render the event record line (no trailing newline).
    pub fn format_record(&self, format: OutputFormat, action: &str) -> Result<String> {
        match format {
            OutputFormat::Json => {
                // RawValue keeps the fixed three decimals a plain f64 would lose.
                let record = JsonRecord {
                    event: "motion",
                    camera: &self.camera,
                    score: RawValue::from_string(self.score_text())?,
                    time: self.time_text(),
                };
                Ok(serde_json::to_string(&record)?)
            }
            OutputFormat::Text => Ok(format!(
                "event=motion camera={} score={} action={:?} time={}",
                self.camera,
                self.score_text(),
                action,
                self.time_text()
            )),
        }
    }

    /// Shell invocation for `action`, with the event exposed via env vars.
    pub fn action_spec(&self, action: &str) -> ProcessSpec {
        ProcessSpec::shell(action)
            .env(ENV_SCORE, self.score_text())
            .env(ENV_TIME, self.time_text())
            .env(ENV_CAMERA, &self.camera)
    }
}

/// Substitute `{camera}`, `{score}` and `{time}` in an action template.
///
/// Single pass over the template: substituted values are never rescanned,
/// so a camera named `{time}` stays literal. Unknown `{...}` sequences are
/// copied through unchanged.
pub fn render_template(template: &str, event: &MotionEvent) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let replacement = [
            ("{camera}", event.camera.clone()),
            ("{score}", event.score_text()),
            ("{time}", event.time_text()),
        ]
        .into_iter()
        .find(|(placeholder, _)| tail.starts_with(placeholder));

        match replacement {
            Some((placeholder, value)) => {
                out.push_str(&value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
