//! Process Supervisor.
//!
//! Drives the full worker lifecycle in one background task: resolve the
//! runtime, discover the newest artifact version, download it unless the
//! cached copy is fresh, launch the worker, relay its output, and wait
//! for exit. Every failure is terminal for the run; recovery is the
//! user's job (relaunch the application), never an automatic retry.

pub mod error;
pub mod state;
pub mod worker;

pub use error::SupervisorError;
pub use state::{State, StateMachine};
pub use worker::{WorkerPhase, WorkerProcess};

use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::artifact::ArtifactSource;
use crate::events::EventSink;
use crate::resolver::{runtime_executable, RuntimeResolver};

pub struct Supervisor {
    resolver: RuntimeResolver,
    source: ArtifactSource,
    download_dir: PathBuf,
    flush_threshold: usize,
    grace_period: Duration,
    sink: EventSink,
    state: StdMutex<StateMachine>,
    worker: Mutex<Option<WorkerProcess>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Supervisor {
    pub fn new(
        resolver: RuntimeResolver,
        source: ArtifactSource,
        download_dir: PathBuf,
        flush_threshold: usize,
        grace_period: Duration,
        sink: EventSink,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            resolver,
            source,
            download_dir,
            flush_threshold,
            grace_period,
            sink,
            state: StdMutex::new(StateMachine::new()),
            worker: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
            .lock()
            .map(|sm| sm.state)
            .unwrap_or(State::Failed)
    }

    /// Request cooperative shutdown (application close path). Returns
    /// immediately; `run()` performs terminate-then-kill and settles in
    /// `Stopped`.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the whole lifecycle to completion. Intended to be spawned once
    /// on a background task; the UI keeps polling the event queue while
    /// this makes progress.
    pub async fn run(&self) -> Result<(), SupervisorError> {
        // ── Resolving ────────────────────────────────────────
        if self.abort_if_shutdown_requested() {
            return Ok(());
        }
        self.set_state(State::Resolving);
        let runtime_home = match self.resolver.resolve() {
            Ok(path) => path,
            Err(e) => return Err(self.fail(e.into())),
        };

        // ── Fetching ─────────────────────────────────────────
        if self.abort_if_shutdown_requested() {
            return Ok(());
        }
        self.set_state(State::Fetching);
        self.sink.info("Checking remote listing for the latest worker version...");
        let version = match self.source.fetch_latest_version().await {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };
        self.sink.info(format!("Latest worker version: {}", version));

        let artifact_path = if self.source.is_cached(&self.download_dir, &version) {
            self.sink.info(format!(
                "Cached artifact {} is up to date, skipping download",
                self.source.file_name(&version)
            ));
            self.source.local_path(&self.download_dir, &version)
        } else {
            self.sink.info(format!(
                "Downloading {} ...",
                self.source.file_name(&version)
            ));
            match self.source.download(&version, &self.download_dir).await {
                Ok(path) => {
                    self.sink.info(format!("Download complete: {}", path.display()));
                    path
                }
                Err(e) => return Err(self.fail(e)),
            }
        };

        // ── Launching ────────────────────────────────────────
        if self.abort_if_shutdown_requested() {
            return Ok(());
        }
        self.set_state(State::Launching);
        let java = runtime_executable(&runtime_home);
        if !java.exists() {
            return Err(self.fail(SupervisorError::RuntimeExecutableMissing(java)));
        }

        let args = vec![
            "-jar".to_string(),
            artifact_path.to_string_lossy().to_string(),
        ];
        let worker = match WorkerProcess::spawn(
            &java,
            &args,
            self.flush_threshold,
            self.sink.clone(),
        )
        .await
        {
            Ok(w) => w,
            Err(e) => return Err(self.fail(e)),
        };

        let mut phase_rx = worker.watch_phase();
        *self.worker.lock().await = Some(worker);
        self.set_state(State::Running);

        // ── Running / Draining / Terminating ─────────────────
        // The shutdown flag may already be set (request raced the
        // launch); the loop entry picks it up and terminates at once
        // rather than waiting for the select arm.
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut shutdown_requested = *shutdown_rx.borrow();
        let mut termination_started = false;
        loop {
            let phase = *phase_rx.borrow();
            match phase {
                WorkerPhase::Running => {}
                WorkerPhase::Draining => {
                    if self.state() == State::Running {
                        self.set_state(State::Draining);
                    }
                }
                WorkerPhase::Exited { code } => {
                    // Fast exits can skip the observable Draining window
                    if self.state() == State::Running {
                        self.set_state(State::Draining);
                    }
                    self.sink.info("Worker process terminated.");
                    if shutdown_requested || code == Some(0) {
                        self.set_state(State::Stopped);
                        return Ok(());
                    }
                    let detail = match code {
                        Some(c) => format!("exit code {}", c),
                        None => "killed by signal".to_string(),
                    };
                    return Err(self.fail(SupervisorError::ProcessCrashed(detail)));
                }
            }

            if shutdown_requested && !termination_started {
                termination_started = true;
                self.set_state(State::Terminating);
                self.sink.info("Shutting down worker process...");
                let mut guard = self.worker.lock().await;
                if let Some(w) = guard.as_mut() {
                    if let Err(e) = w.shutdown(self.grace_period).await {
                        tracing::error!("Worker shutdown error: {}", e);
                        self.sink.error(format!("Worker shutdown error: {}", e));
                    }
                }
                // Loop observes the Exited phase next and settles
                continue;
            }

            tokio::select! {
                changed = phase_rx.changed() => {
                    if changed.is_err() {
                        // Waiter gone without a final phase; treat as crash
                        return Err(self.fail(SupervisorError::ProcessCrashed(
                            "worker monitor ended unexpectedly".into(),
                        )));
                    }
                }
                _ = shutdown_rx.changed(), if !shutdown_requested => {
                    shutdown_requested = true;
                }
            }
        }
    }

    /// Abort cleanly when shutdown was requested before the worker was
    /// launched. Settles in `Stopped` without touching the network or
    /// spawning anything.
    fn abort_if_shutdown_requested(&self) -> bool {
        if !*self.shutdown_rx.borrow() {
            return false;
        }
        self.sink.info("Shutdown requested before worker launch, stopping.");
        self.set_state(State::Terminating);
        self.set_state(State::Stopped);
        true
    }

    /// Transition helper. Transitions issued here follow the machine by
    /// construction; an unexpected rejection is logged, not propagated.
    fn set_state(&self, to: State) {
        if let Ok(mut sm) = self.state.lock() {
            if let Err(e) = sm.transition(to) {
                tracing::error!("{}", e);
            }
        }
    }

    /// Mark the run failed and surface the error on the sink. No retry.
    fn fail(&self, err: SupervisorError) -> SupervisorError {
        self.set_state(State::Failed);
        self.sink.error(format!("Error: {} ({})", err, err.error_code()));
        err
    }
}
