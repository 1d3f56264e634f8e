//! Headless status board.
//!
//! Polls the proxy on a fixed interval, aggregates devices and alerts, and
//! emits the filtered, sorted view as structured log lines. Rendering proper
//! (cards, split-flap ticker) is left to whatever consumes these lines.
//!
//! # Environment Variables
//! - `PROXY_URL` (**required**) – URL of the proxy endpoint
//! - `POLL_INTERVAL_SECS` (optional) – seconds between cycles (default: 60)
//! - `GROUP_FETCH_CONCURRENCY` (optional) – parallel membership fetches (default: 8)
//! - `BOARD_SETTINGS_PATH` (optional) – settings file (default: `statusboard.json`)
//! - `BOARD_VIEW` (optional) – view as a query string, e.g. `sort=name&down=true`
//! - `PROXY_TIMEOUT_SECS` (optional) – proxy request timeout (default: 15)
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::sync::watch;

use nms_statusboard::board::{BoardSession, BoardState};
use nms_statusboard::client::ProxyClient;
use nms_statusboard::settings::SettingsStore;
use nms_statusboard::view::{self, ViewState};
use nms_statusboard::{config, logging};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    logging::init_tracing();

    let cfg = config::load_board_from_env()?;
    cfg.log_config();

    let store = SettingsStore::new(&cfg.settings_path);
    let settings = store.load()?;
    let view_state = ViewState::from_query(&cfg.initial_view);
    tracing::info!("View: ?{}", view_state.to_query());

    let client = ProxyClient::new(cfg.proxy_url.clone(), cfg.proxy_timeout)?;
    let session = Arc::new(BoardSession::new(
        client,
        store,
        settings,
        cfg.group_concurrency,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(Arc::clone(&session).run(cfg.poll_interval, shutdown_rx));

    let mut updates = session.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                render(&state, &view_state);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    shutdown_tx.send(true).ok();
    poller.await?;
    Ok(())
}

/// Emit one board frame.
fn render(state: &BoardState, view_state: &ViewState) {
    // ---
    if let Some(error) = &state.error {
        tracing::error!("Board error: {} (showing cycle {})", error, state.cycle);
    }

    let visible = view::view(&state.devices, &state.groups, view_state);
    let messages = view::alert_messages(&visible);

    tracing::info!(
        cycle = state.cycle,
        shown = visible.len(),
        total = state.devices.len(),
        alerting = messages.len(),
        "Board updated"
    );

    for message in &messages {
        tracing::warn!("{}", message);
    }

    for device in &visible {
        let link = state
            .nms_base_url
            .as_deref()
            .map(|base| view::device_link(base, device.device.id))
            .unwrap_or_default();
        let status = match (&device.active_alert, device.is_down()) {
            (_, true) => "CONNECTION LOST".to_string(),
            (Some(alert), false) => format!("{:?}: {}", alert.severity, alert.rule),
            (None, false) => "OPERATIONAL".to_string(),
        };
        tracing::debug!(
            "#{} {} [{}] {} {}",
            device.device.id,
            device.device.display_name,
            device.device.ip,
            status,
            link
        );
    }
}
