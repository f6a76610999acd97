//! Motion watch driven by `sh` scripts that print ffmpeg-style score lines.
#![cfg(unix)]

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use camsnap::process::ProcessSpec;
use camsnap::watch::{ErrorClass, MotionWatch, OutputFormat, WatchConfig, WatchExit};
use camsnap::{CamsnapError, CancelToken};

fn config(cooldown: Duration) -> WatchConfig {
    WatchConfig {
        camera: "porch".to_string(),
        url: "rtsp://10.0.0.5:554/stream1".to_string(),
        cooldown,
        action: "true".to_string(),
        ..WatchConfig::default()
    }
}

fn analyzer(script: &str) -> ProcessSpec {
    ProcessSpec::shell(script)
}

fn run(
    watch: &MotionWatch,
    cancel: &CancelToken,
) -> (camsnap::Result<camsnap::watch::WatchSummary>, String) {
    let mut out = Vec::new();
    let result = watch.run(cancel, &mut out);
    (result, String::from_utf8(out).unwrap())
}

fn wait_for_file(path: &Path) -> String {
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(5) {
        if let Ok(text) = std::fs::read_to_string(path) {
            if !text.is_empty() {
                return text;
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("{} never appeared", path.display());
}

const TWO_SCORES: &str = "echo 'frame=1 fps=0.0 q=-0.0' >&2; \
     echo '[Parsed_metadata_1 @ 0x55d1] lavfi.scene_score=0.512345' >&2; \
     echo 'frame:12 pts:1200 pts_time:0.4' >&2; \
     echo '[Parsed_metadata_1 @ 0x55d1] lavfi.scene_score=0.734000' >&2";

#[test]
fn cooldown_allows_one_event() {
    let watch = MotionWatch::new(config(Duration::from_secs(5)))
        .unwrap()
        .with_analyzer(analyzer(TWO_SCORES));
    let (result, out) = run(&watch, &CancelToken::new());
    let summary = result.unwrap();
    assert_eq!(summary.exit, WatchExit::Normal);
    assert_eq!(summary.events, 1);
    assert_eq!(out.lines().count(), 1);
    assert!(out.starts_with("event=motion camera=porch score=0.512 action=\"true\" time="));
}

#[test]
fn zero_cooldown_triggers_every_score() {
    let watch = MotionWatch::new(config(Duration::ZERO))
        .unwrap()
        .with_analyzer(analyzer(TWO_SCORES));
    let (result, out) = run(&watch, &CancelToken::new());
    assert_eq!(result.unwrap().events, 2);
    assert_eq!(out.lines().count(), 2);
}

#[test]
fn json_records() {
    let cfg = WatchConfig {
        output: OutputFormat::Json,
        ..config(Duration::ZERO)
    };
    let watch = MotionWatch::new(cfg).unwrap().with_analyzer(analyzer(TWO_SCORES));
    let (result, out) = run(&watch, &CancelToken::new());
    result.unwrap();

    let records: Vec<serde_json::Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["event"], "motion");
    assert_eq!(records[0]["camera"], "porch");
    assert!(out.lines().next().unwrap().contains("\"score\":0.512"));
    assert!(records[1]["time"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn template_action_runs_with_event_values() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("fired.txt");
    let cfg = WatchConfig {
        action: String::new(),
        action_template: Some(format!(
            "echo \"{{camera}} {{score}} $CAMSNAP_SCORE\" > {}",
            target.display()
        )),
        ..config(Duration::from_secs(5))
    };
    let watch = MotionWatch::new(cfg)
        .unwrap()
        .with_analyzer(analyzer("echo 'lavfi.scene_score=0.42' >&2"));
    let (result, out) = run(&watch, &CancelToken::new());
    result.unwrap();

    let expected_action = format!(
        "action=\"echo \\\"porch 0.420 $CAMSNAP_SCORE\\\" > {}\"",
        target.display()
    );
    assert!(out.contains(&expected_action));
    assert_eq!(wait_for_file(&target).trim(), "porch 0.420 0.420");
}

#[test]
fn carriage_return_progress_lines_are_split() {
    let script = "i=0; while [ $i -lt 2000 ]; do \
         printf 'frame=%d fps=25 q=-0.0 size=N/A time=00:00:01.00 speed=1x\\r' $i >&2; \
         i=$((i+1)); done; \
         printf 'lavfi.scene_score=0.61\\r' >&2; \
         printf 'frame=2001 fps=25\\r' >&2; \
         printf 'lavfi.scene_score=0.72\\r' >&2";
    let watch = MotionWatch::new(config(Duration::ZERO))
        .unwrap()
        .with_analyzer(analyzer(script));
    let (result, out) = run(&watch, &CancelToken::new());
    assert_eq!(result.unwrap().events, 2);
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].contains("score=0.610"));
    assert!(lines[1].contains("score=0.720"));
}

#[test]
fn overflowing_score_is_ignored_in_json_mode() {
    let nines = "9".repeat(400);
    let cfg = WatchConfig {
        output: OutputFormat::Json,
        ..config(Duration::ZERO)
    };
    let script = format!("echo 'scene_score={nines}' >&2; echo 'scene_score=0.5' >&2");
    let watch = MotionWatch::new(cfg).unwrap().with_analyzer(analyzer(&script));
    let (result, out) = run(&watch, &CancelToken::new());
    assert_eq!(result.unwrap().events, 1);
    assert!(out.contains("\"score\":0.500"), "{out}");
}

#[test]
fn failing_action_does_not_stop_watch() {
    let cfg = WatchConfig {
        action: "exit 7".to_string(),
        ..config(Duration::ZERO)
    };
    let watch = MotionWatch::new(cfg).unwrap().with_analyzer(analyzer(TWO_SCORES));
    let (result, _) = run(&watch, &CancelToken::new());
    assert_eq!(result.unwrap().events, 2);
}

#[test]
fn abnormal_exit_is_classified() {
    let script = "echo 'scene_score=0.3' >&2; \
         echo '[tcp @ 0x1] Connection to tcp://10.0.0.5:554 failed: Connection refused' >&2; \
         exit 1";
    let watch = MotionWatch::new(config(Duration::ZERO))
        .unwrap()
        .with_analyzer(analyzer(script));
    let (result, out) = run(&watch, &CancelToken::new());
    assert_eq!(out.lines().count(), 1);
    match result.unwrap_err() {
        CamsnapError::ProcessExited { class, status, .. } => {
            assert_eq!(class, ErrorClass::NetworkRefused);
            assert!(status.contains('1'));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn auth_failure_names_class_in_message() {
    let watch = MotionWatch::new(config(Duration::ZERO))
        .unwrap()
        .with_analyzer(analyzer("echo 'method DESCRIBE failed: 401 Unauthorized' >&2; exit 1"));
    let (result, _) = run(&watch, &CancelToken::new());
    let err = result.unwrap_err();
    assert!(err.to_string().ends_with("(auth)"), "{err}");
}

#[test]
fn cancellation_is_a_clean_exit() {
    let watch = MotionWatch::new(config(Duration::ZERO))
        .unwrap()
        .with_analyzer(analyzer("echo 'scene_score=0.9' >&2; exec sleep 30"));
    let cancel = CancelToken::with_timeout(Duration::from_millis(300));
    let started = Instant::now();
    let (result, out) = run(&watch, &cancel);
    let summary = result.unwrap();
    assert_eq!(summary.exit, WatchExit::Cancelled);
    assert_eq!(summary.events, 1);
    assert_eq!(out.lines().count(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn bad_threshold_never_starts() {
    for threshold in [0.0, 1.0, 2.5] {
        let cfg = WatchConfig {
            threshold,
            ..config(Duration::ZERO)
        };
        assert!(matches!(MotionWatch::new(cfg), Err(CamsnapError::InvalidInput(_))));
    }
}

#[test]
fn missing_analyzer_is_spawn_error() {
    let watch = MotionWatch::new(config(Duration::ZERO))
        .unwrap()
        .with_analyzer(ProcessSpec::new("/no/such/analyzer"));
    let (result, out) = run(&watch, &CancelToken::new());
    assert!(matches!(result, Err(CamsnapError::Spawn { .. })));
    assert!(out.is_empty());
}
