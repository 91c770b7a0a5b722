//! Worker process handle: spawn, output draining, cooperative shutdown.
//!
//! The child's stdout and stderr are both piped and drained into one
//! shared batch buffer, which merges the two streams the way a combined
//! console would. Lines accumulate until the flush threshold is reached,
//! then leave as a single newline-joined event; this bounds the rate of
//! cross-task handoffs when the worker is chatty.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{watch, Mutex};

use crate::events::EventSink;
use crate::supervisor::SupervisorError;

/// How long the exit waiter lets the readers finish after the process is
/// gone. A grandchild inheriting the pipes can keep them open forever,
/// so the drain must not gate exit reporting indefinitely.
const DRAIN_COMPLETION_WINDOW: Duration = Duration::from_secs(1);

/// Where the worker currently is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Process alive, output flowing.
    Running,
    /// Output streams closed; waiting for process exit.
    Draining,
    /// Process exited. `code` is `None` when killed by a signal.
    Exited { code: Option<i32> },
}

/// Line accumulator flushed as one joined event per `threshold` lines.
/// Private state of the drain pipeline; the lock around it is only ever
/// held for push/clear, never across I/O.
struct BatchBuffer {
    lines: Vec<String>,
    threshold: usize,
}

impl BatchBuffer {
    fn new(threshold: usize) -> Self {
        Self {
            lines: Vec::new(),
            threshold: threshold.max(1),
        }
    }

    /// Append a line. Returns the joined batch when the threshold is
    /// reached; the buffer is empty immediately after a flush.
    fn push(&mut self, line: String) -> Option<String> {
        self.lines.push(line);
        if self.lines.len() >= self.threshold {
            let joined = self.lines.join("\n");
            self.lines.clear();
            Some(joined)
        } else {
            None
        }
    }

    /// Flush whatever is left, regardless of threshold.
    fn take_remainder(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            let joined = self.lines.join("\n");
            self.lines.clear();
            Some(joined)
        }
    }
}

/// Exclusive handle to the live child process. Valid from a successful
/// spawn until the process is observed to exit or is forcibly killed.
pub struct WorkerProcess {
    pid: u32,
    phase_rx: watch::Receiver<WorkerPhase>,
}

impl WorkerProcess {
    /// Spawn the worker with piped stdout/stderr and no visible console
    /// window, and start the drain pipeline.
    pub async fn spawn(
        program: &Path,
        args: &[String],
        flush_threshold: usize,
        sink: EventSink,
    ) -> Result<Self, SupervisorError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(false);
        apply_creation_flags(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| SupervisorError::LaunchFailed(format!("{}: {}", program.display(), e)))?;

        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::LaunchFailed("spawned process has no PID".into()))?;

        let (phase_tx, phase_rx) = watch::channel(WorkerPhase::Running);
        let phase_tx = Arc::new(phase_tx);
        let buffer = Arc::new(Mutex::new(BatchBuffer::new(flush_threshold)));

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Reader task: drain both streams to EOF, flush the remainder,
        // then mark the drain phase. Runs independently of the waiter so
        // a grandchild holding the pipes open cannot stall exit handling.
        let readers = {
            let sink = sink.clone();
            let buffer = buffer.clone();
            let phase = phase_tx.clone();
            tokio::spawn(async move {
                let out_reader = drain_stream(stdout, buffer.clone(), sink.clone());
                let err_reader = drain_stream(stderr, buffer.clone(), sink.clone());
                tokio::join!(out_reader, err_reader);

                if let Some(rest) = buffer.lock().await.take_remainder() {
                    sink.info(rest);
                }
                phase.send_if_modified(|p| {
                    if *p == WorkerPhase::Running {
                        *p = WorkerPhase::Draining;
                        true
                    } else {
                        false
                    }
                });
            })
        };

        // Waiter task: observe process exit, give the readers a bounded
        // window to finish draining, then publish the exit.
        {
            let phase = phase_tx;
            tokio::spawn(async move {
                let code = match child.wait().await {
                    Ok(status) => {
                        tracing::info!("Worker process exited with {}", status);
                        status.code()
                    }
                    Err(e) => {
                        tracing::error!("Failed to wait for worker process: {}", e);
                        None
                    }
                };
                let _ = tokio::time::timeout(DRAIN_COMPLETION_WINDOW, readers).await;
                let _ = phase.send(WorkerPhase::Exited { code });
            });
        }

        sink.info(format!("Worker process started with PID {}", pid));
        Ok(Self { pid, phase_rx })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn phase(&self) -> WorkerPhase {
        *self.phase_rx.borrow()
    }

    /// A watch receiver over the worker's phase, for observers that must
    /// not hold the process handle itself.
    pub fn watch_phase(&self) -> watch::Receiver<WorkerPhase> {
        self.phase_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.phase(), WorkerPhase::Exited { .. })
    }

    /// Await process exit and return its code (`None` if signal-killed).
    pub async fn wait(&mut self) -> Option<i32> {
        loop {
            if let WorkerPhase::Exited { code } = *self.phase_rx.borrow() {
                return code;
            }
            if self.phase_rx.changed().await.is_err() {
                // Waiter task gone; treat as signal-killed.
                return None;
            }
        }
    }

    /// Await the moment the output streams close (end of drain). Returns
    /// immediately when the process already exited.
    pub async fn wait_drained(&mut self) {
        loop {
            match *self.phase_rx.borrow() {
                WorkerPhase::Running => {}
                WorkerPhase::Draining | WorkerPhase::Exited { .. } => return,
            }
            if self.phase_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Graceful terminate, then force kill after `grace`. Never blocks
    /// longer than roughly twice the grace period.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        tracing::info!("Sending terminate signal to worker (pid {})", self.pid);
        if let Err(e) = terminate_pid(self.pid) {
            // Process may have exited between the liveness check and the
            // signal; the bounded wait below settles it either way.
            tracing::warn!("Terminate signal to pid {} failed: {}", self.pid, e);
        }

        if tokio::time::timeout(grace, self.wait()).await.is_ok() {
            return Ok(());
        }

        tracing::warn!(
            "Worker (pid {}) did not exit within {:?}, force killing",
            self.pid,
            grace
        );
        if let Err(e) = force_kill_pid(self.pid) {
            tracing::warn!("Force kill of pid {} failed: {}", self.pid, e);
        }

        // Bounded wait after the kill so shutdown can never hang on an
        // unkillable process.
        let _ = tokio::time::timeout(grace, self.wait()).await;
        Ok(())
    }
}

/// Read lines from one piped stream into the shared batch buffer. The
/// joined batch is sent after the lock is released.
async fn drain_stream<R>(stream: Option<R>, buffer: Arc<Mutex<BatchBuffer>>, sink: EventSink)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(stream) = stream else { return };
    let reader = BufReader::new(stream);
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let flushed = buffer.lock().await.push(line);
        if let Some(batch) = flushed {
            sink.info(batch);
        }
    }
}

/// Hide the console window on Windows; no-op elsewhere.
#[cfg(target_os = "windows")]
fn apply_creation_flags(cmd: &mut Command) {
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(target_os = "windows"))]
fn apply_creation_flags(_cmd: &mut Command) {}

/// Ask a process to terminate. Cross-platform helper.
fn terminate_pid(pid: u32) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
        use winapi::um::winnt::PROCESS_TERMINATE;

        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                anyhow::bail!("Failed to open process {}", pid);
            }
            let result = TerminateProcess(handle, 0);
            CloseHandle(handle);
            if result == 0 {
                anyhow::bail!("TerminateProcess failed for pid {}", pid);
            }
        }
    }
    #[cfg(not(target_os = "windows"))]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| anyhow::anyhow!("Failed to send SIGTERM to {}: {}", pid, e))?;
    }
    Ok(())
}

/// Force-kill a process by PID.
fn force_kill_pid(pid: u32) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        std::process::Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .creation_flags(CREATE_NO_WINDOW)
            .output()
            .map_err(|e| anyhow::anyhow!("Failed to kill PID {}: {}", pid, e))?;
    }
    #[cfg(not(target_os = "windows"))]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL)
            .map_err(|e| anyhow::anyhow!("Failed to send SIGKILL to {}: {}", pid, e))?;
    }
    Ok(())
}
