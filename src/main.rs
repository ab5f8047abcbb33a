//! thermolog daemon entry point
//!
//! The instance lock and the fork happen before any runtime or logging thread
//! exists; the tokio runtime is built in the process that keeps running.

use clap::Parser;
use std::process::ExitCode;
use thermolog::{
    lifecycle::{daemonize, InstanceLock, Lifecycle, LifecycleState, StopSignal},
    logging::{init_logging, LogConfig},
    DaemonArgs, Monitor, Result, Settings, ThermologError,
};
use tracing::{debug, error, info};

fn main() -> ExitCode {
    let args = match DaemonArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // help, version and usage errors all end here
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                error!("{}", e);
            } else {
                eprintln!("thermolog-daemon: {e}");
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: DaemonArgs) -> Result<()> {
    let settings = Settings::resolve(&args)?;
    let mut lock = InstanceLock::acquire(&settings.lock_file)?;

    if !settings.foreground {
        daemonize(settings.log_destination.as_deref())?;
        lock.record_pid()?;
    }

    let _guard = init_logging(&LogConfig::from_settings(&settings))?;
    let mut lifecycle = Lifecycle::new();
    info!(
        "thermolog {} {}, lock {}",
        env!("CARGO_PKG_VERSION"),
        lifecycle.state(),
        lock.path().display()
    );
    debug!("{:?}", settings);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let stop = StopSignal::new();
    runtime.block_on(async {
        stop.listen()?;

        let mut monitor = Monitor::from_settings(&settings).await?;
        monitor.seed_weather().await;

        lifecycle.enter(LifecycleState::Running);
        monitor.run(stop.token()).await;
        lifecycle.enter(LifecycleState::Stopping);
        Ok::<_, ThermologError>(())
    })?;

    info!("stopped by {}", stop.signal_name().unwrap_or("request"));
    lifecycle.enter(LifecycleState::Stopped);
    drop(lock);
    Ok(())
}
