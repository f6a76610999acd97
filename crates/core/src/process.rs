//! External process management.
//!
//! Two lifecycles, deliberately separate:
//!
//! - [`Supervised`]: a long-running child whose stderr the caller consumes
//!   and whose exit the caller waits on. A watchdog thread kills it once
//!   the governing [`CancelToken`] fires.
//! - [`detach`]: fire-and-forget. The child is started and handed to a
//!   reaper thread; the caller never learns how it ends.

use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::error::{CamsnapError, Result};

/// How often the watchdog checks the cancel token.
const WATCHDOG_POLL: Duration = Duration::from_millis(50);

/// How often `wait` polls for exit. Polling keeps the child lock free for
/// the watchdog between checks.
const WAIT_POLL: Duration = Duration::from_millis(20);

/// What to run.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables, added on top of the inherited ones.
    pub env: HashMap<String, String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// A `sh -c <script>` invocation.
    pub fn shell(script: &str) -> Self {
        Self::new("sh").args(["-c", script])
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        cmd
    }
}

/// A child process bound to a [`CancelToken`].
pub struct Supervised {
    program: String,
    child: Arc<Mutex<Child>>,
    stderr: Option<ChildStderr>,
    finished: Arc<AtomicBool>,
    watchdog: Option<JoinHandle<()>>,
}

impl Supervised {
    /// Start `spec` with stderr piped and stdin/stdout discarded.
    pub fn spawn(spec: &ProcessSpec, cancel: &CancelToken) -> Result<Self> {
        let mut child = spec
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CamsnapError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        tracing::debug!(program = %spec.program, pid = child.id(), "process started");

        let stderr = child.stderr.take();
        let child = Arc::new(Mutex::new(child));
        let finished = Arc::new(AtomicBool::new(false));

        let watchdog = {
            let child = child.clone();
            let finished = finished.clone();
            let cancel = cancel.clone();
            let program = spec.program.clone();
            thread::spawn(move || {
                while !finished.load(Ordering::SeqCst) {
                    if cancel.is_cancelled() {
                        tracing::debug!(%program, "cancelled, killing process");
                        let _ = child.lock().kill();
                        return;
                    }
                    thread::sleep(WATCHDOG_POLL);
                }
            })
        };

        Ok(Self {
            program: spec.program.clone(),
            child,
            stderr,
            finished,
            watchdog: Some(watchdog),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Take the stderr pipe for incremental reading. Returns `None` after
    /// the first call.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Kill the child now, regardless of the cancel token.
    pub fn kill(&self) {
        let _ = self.child.lock().kill();
    }

    /// Block until the child exits and return its status.
    pub fn wait(mut self) -> Result<ExitStatus> {
        let status = loop {
            if let Some(status) = self.child.lock().try_wait()? {
                break status;
            }
            thread::sleep(WAIT_POLL);
        };
        self.stop_watchdog();
        tracing::debug!(program = %self.program, %status, "process exited");
        Ok(status)
    }

    fn stop_watchdog(&mut self) {
        self.finished.store(true, Ordering::SeqCst);
        if let Some(handle) = self.watchdog.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Supervised {
    fn drop(&mut self) {
        if self.watchdog.is_some() {
            let mut child = self.child.lock();
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
                let _ = child.wait();
            }
            drop(child);
            self.stop_watchdog();
        }
    }
}

/// Output of a process run to completion.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Run `spec` to completion under `cancel`, collecting its stderr.
pub fn run_captured(spec: &ProcessSpec, cancel: &CancelToken) -> Result<Captured> {
    let mut proc = Supervised::spawn(spec, cancel)?;
    let mut stderr = String::new();
    if let Some(mut pipe) = proc.take_stderr() {
        let mut raw = Vec::new();
        pipe.read_to_end(&mut raw)?;
        stderr = String::from_utf8_lossy(&raw).into_owned();
    }
    let status = proc.wait()?;
    Ok(Captured { status, stderr })
}

/// Start `spec` and return without waiting for it.
///
/// All stdio is discarded. A background thread reaps the child so it does
/// not linger as a zombie; its exit status is only logged.
pub fn detach(spec: &ProcessSpec) -> Result<()> {
    let mut child = spec
        .command()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| CamsnapError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let program = spec.program.clone();
    thread::spawn(move || match child.wait() {
        Ok(status) if !status.success() => {
            tracing::debug!(%program, %status, "detached process exited abnormally");
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(%program, error = %e, "detached process wait failed"),
    });
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn captures_stderr_and_status() {
        let spec = ProcessSpec::shell("echo oops >&2; exit 3");
        let out = run_captured(&spec, &CancelToken::new()).unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[test]
    fn extra_env_is_visible() {
        let spec =
            ProcessSpec::shell("echo $CAMSNAP_TEST_VALUE >&2").env("CAMSNAP_TEST_VALUE", "42");
        let out = run_captured(&spec, &CancelToken::new()).unwrap();
        assert_eq!(out.stderr.trim(), "42");
    }

    #[test]
    fn cancel_kills_long_running_child() {
        let cancel = CancelToken::with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let out = run_captured(&ProcessSpec::shell("exec sleep 30"), &cancel).unwrap();
        assert!(!out.status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let spec = ProcessSpec::new("/definitely/not/a/real/binary");
        assert!(matches!(
            Supervised::spawn(&spec, &CancelToken::new()),
            Err(CamsnapError::Spawn { .. })
        ));
        assert!(matches!(detach(&spec), Err(CamsnapError::Spawn { .. })));
    }

    #[test]
    fn detach_returns_immediately() {
        let started = Instant::now();
        detach(&ProcessSpec::shell("sleep 2")).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
