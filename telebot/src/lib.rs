//! Binary crate wiring: the webhook ingress (component D), the processing
//! worker pool (component E), and the outbound dispatcher (component F)
//! around the `modbot_core` library, plus the settings/state-file/CLI
//! surface that SPEC_FULL adds as ambient stack. `main.rs` does nothing but
//! set up `RUST_LOG` and hand [`entry`] to `arch_bot_commons::start_everything`.

pub mod cli;
pub mod config_watcher;
pub mod dispatcher;
pub mod error;
pub mod ingress;
pub mod queue;
pub mod settings;
pub mod state;
pub mod state_file;
pub mod unicode_escape;
pub mod worker;

use std::sync::Arc;

use error::BotError;
use settings::Settings;
use state::ModerationState;
use state_file::StateFile;

/// Top-level entry point handed to `arch_bot_commons::start_everything`.
/// `start_everything` only accepts `impl Future<Output = ()>`, so every
/// fatal-at-startup case is handled here by logging and exiting with code 1,
/// rather than bubbling a `Result` back to `main`.
pub async fn entry(cli: cli::Cli) {
    if let Err(e) = run(cli).await {
        log::error!("fatal: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: cli::Cli) -> Result<(), BotError> {
    let settings = Settings::load(&cli.settings_path)?;
    let state_file = StateFile::load(&settings.state_file);
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| BotError::Settings(format!("could not build HTTP client: {e}")))?;

    // TLS and the listening socket are set up (and any failure surfaced as
    // fatal) before anything else is spawned.
    let state = Arc::new(ModerationState::new(settings, http, state_file));
    let (listener, acceptor) = ingress::bind(&state).await?;

    config_watcher::reload_config(&state).await;

    let dispatcher = dispatcher::Dispatcher::new(Arc::clone(&state));
    let me = dispatcher
        .get_me()
        .await
        .map_err(|e| BotError::GetMeFailed(e.to_string()))?;
    state.set_bot_user_id(me.id);
    log::info!("logged in as bot id {}", me.id.0);

    let worker_count = state.settings.worker_count.max(1);
    let mut tasks = Vec::with_capacity(worker_count + 4);
    for id in 0..worker_count {
        tasks.push(tokio::spawn(worker::run(id, Arc::clone(&state))));
    }

    tasks.push(tokio::spawn(ingress::serve(listener, acceptor, Arc::clone(&state))));
    tasks.push(tokio::spawn(config_watcher::watch_config(Arc::clone(&state))));
    tasks.push(tokio::spawn(config_watcher::run_admin_refresh_timer(Arc::clone(&state))));
    tasks.push(tokio::spawn(wait_for_shutdown_signal(Arc::clone(&state))));

    for task in tasks {
        let _ = task.await;
    }

    if let Err(e) = state.state_file.save_if_dirty() {
        log::error!("failed to persist state file at shutdown: {e}");
    }
    log::info!("clean shutdown");

    Ok(())
}

/// Observes Ctrl-C (or the stop flag firing from elsewhere, e.g. a fatal
/// ingress error) and propagates it to every other task via
/// [`state::StopFlag`].
async fn wait_for_shutdown_signal(state: Arc<ModerationState>) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("received shutdown signal");
        }
        () = state.stop.notified() => {}
    }
    state.stop.stop();
}
