use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jarvisor::artifact::ArtifactSource;
use jarvisor::config::AppConfig;
use jarvisor::events::{self, Severity};
use jarvisor::resolver::RuntimeResolver;
use jarvisor::settings::FileSettingsStore;
use jarvisor::supervisor::Supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("jarvisor starting");

    let cfg = AppConfig::load()?;
    let (sink, mut queue) = events::channel();

    let settings = Arc::new(FileSettingsStore::new(cfg.settings_file()));
    let preset = cfg
        .runtime_home
        .clone()
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("JAVA_HOME").map(PathBuf::from));

    let resolver = RuntimeResolver::new(cfg.install_roots(), preset, settings, sink.clone());
    let source = ArtifactSource::new(&cfg.listing_url(), &cfg.artifact_name(), &cfg.artifact_ext());
    let supervisor = Arc::new(Supervisor::new(
        resolver,
        source,
        cfg.download_dir(),
        cfg.flush_threshold(),
        Duration::from_secs(cfg.grace_period_secs()),
        sink,
    ));

    // One background task owns the whole resolve/fetch/launch/drain
    // sequence; the console loop below never blocks on it.
    let sup = supervisor.clone();
    let mut run_task = tokio::spawn(async move { sup.run().await });

    // Ctrl+C triggers the cooperative shutdown path
    let sup_shutdown = supervisor.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received, stopping worker...");
        sup_shutdown.shutdown();
    });

    // Console consumer: fixed-interval poll of the event queue, standing
    // in for the UI update loop.
    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.poll_interval_ms()));
    let outcome = loop {
        tokio::select! {
            _ = ticker.tick() => {
                print_events(&mut queue);
            }
            result = &mut run_task => {
                break result;
            }
        }
    };

    // Flush whatever the supervisor said on its way out
    print_events(&mut queue);

    match outcome {
        Ok(Ok(())) => {
            tracing::info!("jarvisor shutting down");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("Supervisor failed: {}", e);
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("Supervisor task panicked: {}", e);
            Err(e.into())
        }
    }
}

fn print_events(queue: &mut jarvisor::events::ConsoleQueue) {
    for event in queue.drain() {
        match event.severity {
            Severity::Info => println!("{}", event.text),
            Severity::Warn | Severity::Error => eprintln!("{}", event.text),
        }
    }
}
