use std::error::Error as _;
use std::process::ExitCode;

use clap::Parser;
use log::error;
use noctum_install::cli::Args;
use noctum_install::orchestrator::Orchestrator;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let args = Args::parse();
    let intent = args.intent();

    // Strictly sequential tool; a single-threaded runtime is enough.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Racing against the signal future drops the run future on interrupt,
    // which releases the scoped download workspace before exit.
    let orchestrator = Orchestrator::new();
    let outcome = runtime.block_on(async {
        tokio::select! {
            result = orchestrator.run(intent) => Some(result),
            _ = shutdown_signal() => None,
        }
    });

    match outcome {
        None => {
            error!("interrupted; temporary files have been cleaned up");
            ExitCode::from(130)
        }
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(e)) => {
            error!("{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = signal::ctrl_c();
    let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(_) => {
            let _ = ctrl_c.await;
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate.recv() => {}
    }
}
