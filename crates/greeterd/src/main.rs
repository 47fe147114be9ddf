use anyhow::Result;
use greeter_core::{FaceRegistry, ShutdownSignal};
use std::io::BufRead;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod context;
mod dispatcher;
mod monitor;

use context::CoordinationContext;
use dispatcher::{Dispatcher, VoiceSessionRunner};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("greeterd starting");

    let config = config::Config::from_env();
    tracing::info!(
        camera = %config.camera_device,
        threshold = config.distance_threshold,
        cooldown_secs = config.cooldown.as_secs(),
        sample_every = config.sample_every,
        "configuration loaded"
    );
    let shutdown = ShutdownSignal::new();
    let ctx = Arc::new(CoordinationContext::new(
        FaceRegistry::new(config.distance_threshold, config.cooldown),
        shutdown.clone(),
    ));

    // Camera failures end this thread only; the dispatcher keeps running.
    let monitor = {
        let ctx = ctx.clone();
        let config = config.clone();
        std::thread::Builder::new()
            .name("greeter-monitor".into())
            .spawn(move || {
                if let Err(e) = monitor::run_monitor(&config, ctx) {
                    tracing::error!(error = %e, "face monitor stopped; no new conversations will be triggered");
                }
            })?
    };

    let dispatcher = {
        let ctx = ctx.clone();
        let runner = VoiceSessionRunner::new(config.voice.clone());
        let poll = config.dispatch_poll;
        std::thread::Builder::new()
            .name("greeter-dispatch".into())
            .spawn(move || Dispatcher::new(ctx, runner, poll).run())?
    };

    spawn_operator_keys(ctx.clone())?;

    tracing::info!("greeterd ready; press q then Enter, or Ctrl-C, to quit");

    let stopped = shutdown.clone();
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = tokio::task::spawn_blocking(move || stopped.wait()) => {}
    }
    ctx.request_shutdown();

    tracing::info!("greeterd shutting down");
    tokio::task::spawn_blocking(move || {
        if dispatcher.join().is_err() {
            tracing::error!("dispatcher thread panicked");
        }
        if monitor.join().is_err() {
            tracing::error!("monitor thread panicked");
        }
    })
    .await?;

    tracing::info!(
        status = %serde_json::to_string(&ctx.snapshot())?,
        individuals = ctx.registry_len(),
        "final status"
    );
    Ok(())
}

/// Stop everything when the operator types `q`.
fn spawn_operator_keys(ctx: Arc<CoordinationContext>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("greeter-keys".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("q") {
                    ctx.request_shutdown();
                    break;
                }
            }
        })?;
    Ok(())
}
