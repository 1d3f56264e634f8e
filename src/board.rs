//! Board session: the poll-and-aggregate cycle.
//!
//! A [`BoardSession`] owns everything one running dashboard needs (proxy
//! client, settings, published state) and lives from startup to teardown.
//! Each cycle fetches alerts, devices, groups and the upstream base URL
//! concurrently, enriches groups with their membership through a bounded
//! fan-out, aggregates, and publishes the result on a `watch` channel.
//!
//! Cycles may overlap (a manual refresh during a scheduled one). Every cycle
//! takes a number from a monotonic counter and only the most recently issued
//! cycle may publish; anything older is discarded when it completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, AllowList};
use crate::client::ProxyClient;
use crate::error::{PipelineError, SettingsError};
use crate::models::{AggregatedDevice, DeviceGroup};
use crate::settings::{BoardSettings, SettingsStore};

// ---

/// What the board currently displays.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardState {
    /// Cycle that produced `devices` and `groups`; 0 before the first success.
    pub cycle: u64,
    pub devices: Vec<AggregatedDevice>,
    pub groups: Vec<DeviceGroup>,
    pub nms_base_url: Option<String>,
    /// Banner text of the most recent failed cycle; cleared on success.
    pub error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

/// How a refresh ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Committed { cycle: u64 },
    /// A newer cycle was issued while this one was in flight.
    Superseded { cycle: u64 },
}

struct Snapshot {
    devices: Vec<AggregatedDevice>,
    groups: Vec<DeviceGroup>,
    base_url: Option<String>,
}

pub struct BoardSession {
    client: ProxyClient,
    store: SettingsStore,
    settings: RwLock<BoardSettings>,
    state: watch::Sender<BoardState>,
    issued: AtomicU64,
    group_concurrency: usize,
}

impl BoardSession {
    pub fn new(
        client: ProxyClient,
        store: SettingsStore,
        settings: BoardSettings,
        group_concurrency: usize,
    ) -> Self {
        // ---
        let (state, _) = watch::channel(BoardState::default());
        Self {
            client,
            store,
            settings: RwLock::new(settings),
            state,
            issued: AtomicU64::new(0),
            group_concurrency: group_concurrency.max(1),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> BoardState {
        self.state.borrow().clone()
    }

    pub async fn settings(&self) -> BoardSettings {
        self.settings.read().await.clone()
    }

    /// Persist new settings; they apply from the next cycle on.
    pub async fn save_settings(&self, settings: BoardSettings) -> Result<(), SettingsError> {
        // ---
        self.store.save(&settings)?;
        *self.settings.write().await = settings;
        Ok(())
    }

    fn begin_cycle(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, cycle: u64) -> bool {
        self.issued.load(Ordering::SeqCst) == cycle
    }

    /// Run one full cycle. Also serves as the manual retry action.
    ///
    /// On failure the error is published for display while the previously
    /// committed device list stays in place.
    pub async fn refresh(&self) -> Result<CycleOutcome, PipelineError> {
        // ---
        let cycle = self.begin_cycle();
        let allow_list = self.settings.read().await.allow_list();
        debug!(cycle, "Starting cycle");

        match self.collect(cycle, &allow_list).await {
            Ok(Some(snapshot)) => Ok(self.commit(cycle, snapshot)),
            Ok(None) => {
                debug!(cycle, "Cycle superseded before group enrichment");
                Ok(CycleOutcome::Superseded { cycle })
            }
            Err(e) => {
                warn!(cycle, error = %e, "Cycle failed");
                self.record_failure(cycle, &e);
                Err(e)
            }
        }
    }

    /// Fetch and aggregate. `Ok(None)` means the cycle went stale midway.
    async fn collect(
        &self,
        cycle: u64,
        allow_list: &AllowList,
    ) -> Result<Option<Snapshot>, PipelineError> {
        // ---
        let (alerts, devices, groups, base_url) = tokio::join!(
            self.client.alerts(),
            self.client.devices(),
            self.client.groups(),
            self.client.base_url(),
        );

        let alerts = alerts?;
        let devices = devices?;
        let groups = groups.unwrap_or_else(|e| {
            warn!(error = %e, "Group list unavailable, continuing without groups");
            Vec::new()
        });
        let base_url = base_url.unwrap_or_else(|e| {
            debug!(error = %e, "Base URL unavailable, keeping previous");
            None
        });

        if !self.is_current(cycle) {
            return Ok(None);
        }

        let groups = self.enrich_groups(cycle, groups).await;
        let devices = aggregate(&alerts, devices, allow_list);

        Ok(Some(Snapshot {
            devices,
            groups,
            base_url,
        }))
    }

    /// Attach membership to every group, at most `group_concurrency` at a time.
    ///
    /// A failed membership fetch leaves that group with unknown membership;
    /// it never affects the other groups or the cycle. Once `cycle` is
    /// superseded no further fetches are issued.
    async fn enrich_groups(&self, cycle: u64, groups: Vec<DeviceGroup>) -> Vec<DeviceGroup> {
        // ---
        stream::iter(groups)
            .map(|group| async move {
                if !self.is_current(cycle) {
                    return group;
                }
                match self.client.group_members(group.id).await {
                    Ok(members) => group.with_members(members),
                    Err(e) => {
                        warn!(group_id = group.id, error = %e, "Failed to fetch group members");
                        group
                    }
                }
            })
            .buffered(self.group_concurrency)
            .collect()
            .await
    }

    fn commit(&self, cycle: u64, snapshot: Snapshot) -> CycleOutcome {
        // ---
        let device_count = snapshot.devices.len();
        let group_count = snapshot.groups.len();

        // The currency check runs under the channel's write lock, so commits
        // are serialized against each other.
        let committed = self.state.send_if_modified(|state| {
            if !self.is_current(cycle) {
                return false;
            }
            state.cycle = cycle;
            state.devices = snapshot.devices;
            state.groups = snapshot.groups;
            if snapshot.base_url.is_some() {
                state.nms_base_url = snapshot.base_url;
            }
            state.error = None;
            state.last_success = Some(Utc::now());
            true
        });

        if committed {
            info!(
                cycle,
                devices = device_count,
                groups = group_count,
                "Cycle committed"
            );
            CycleOutcome::Committed { cycle }
        } else {
            debug!(cycle, "Discarding results of superseded cycle");
            CycleOutcome::Superseded { cycle }
        }
    }

    fn record_failure(&self, cycle: u64, error: &PipelineError) {
        // ---
        self.state.send_if_modified(|state| {
            if !self.is_current(cycle) {
                return false;
            }
            state.error = Some(error.to_string());
            true
        });
    }

    /// Poll every `interval` until `shutdown` flips to `true`.
    ///
    /// Each tick runs its cycle on a separate task. A tick that arrives while
    /// the previous scheduled cycle is still running is skipped, so a slow
    /// backend delays commits instead of superseding every cycle. In-flight
    /// cycles are aborted on shutdown.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        // ---
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight = JoinSet::new();

        info!("Board session started, polling every {}s", interval.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    while in_flight.try_join_next().is_some() {}
                    if !in_flight.is_empty() {
                        debug!("Previous cycle still running, skipping tick");
                        continue;
                    }
                    let session = Arc::clone(&self);
                    in_flight.spawn(async move {
                        // Failures are already logged and published.
                        let _ = session.refresh().await;
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        in_flight.abort_all();
        info!("Board session stopped");
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Device, OperationalStatus};
    use url::Url;

    fn session() -> BoardSession {
        let client = ProxyClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/proxy").unwrap(),
        );
        let dir = std::env::temp_dir().join("statusboard-unused.json");
        BoardSession::new(client, SettingsStore::new(dir), BoardSettings::default(), 4)
    }

    fn snapshot(id: u64) -> Snapshot {
        Snapshot {
            devices: vec![AggregatedDevice {
                device: Device {
                    id,
                    hostname: format!("host-{id}"),
                    display_name: format!("host-{id}"),
                    ip: String::new(),
                    status: OperationalStatus::Up,
                    device_type: None,
                    polling_disabled: false,
                    alerting_disabled: false,
                    last_polled: None,
                },
                active_alert: None,
            }],
            groups: Vec::new(),
            base_url: None,
        }
    }

    #[test]
    fn test_stale_cycle_cannot_overwrite_newer() {
        // ---
        let session = session();
        let older = session.begin_cycle();
        let newer = session.begin_cycle();

        assert_eq!(
            session.commit(newer, snapshot(7)),
            CycleOutcome::Committed { cycle: newer }
        );
        assert_eq!(
            session.commit(older, snapshot(3)),
            CycleOutcome::Superseded { cycle: older }
        );

        let state = session.snapshot();
        assert_eq!(state.cycle, newer);
        assert_eq!(state.devices[0].device.id, 7);
    }

    #[test]
    fn test_success_clears_error() {
        // ---
        let session = session();
        let cycle = session.begin_cycle();
        session.record_failure(
            cycle,
            &PipelineError::Status {
                endpoint: "/alerts".into(),
                status: 500,
            },
        );
        assert!(session.snapshot().error.is_some());

        let cycle = session.begin_cycle();
        session.commit(cycle, snapshot(4));
        assert!(session.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_stale_cycle_issues_no_member_fetches() {
        // ---
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ProxyClient::with_client(
            reqwest::Client::new(),
            Url::parse(&format!("{}/proxy", server.uri())).unwrap(),
        );
        let session = BoardSession::new(
            client,
            SettingsStore::new(std::env::temp_dir().join("statusboard-unused.json")),
            BoardSettings::default(),
            2,
        );

        let older = session.begin_cycle();
        session.begin_cycle();

        let groups: Vec<DeviceGroup> = (10..14)
            .map(|id| DeviceGroup {
                id,
                name: format!("group-{id}"),
                description: String::new(),
                members: None,
            })
            .collect();
        let out = session.enrich_groups(older, groups).await;

        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|g| g.members.is_none()));
    }

    #[test]
    fn test_base_url_kept_when_info_missing() {
        // ---
        let session = session();
        let cycle = session.begin_cycle();
        let mut first = snapshot(4);
        first.base_url = Some("https://nms.example.com".into());
        session.commit(cycle, first);

        let cycle = session.begin_cycle();
        session.commit(cycle, snapshot(4));
        assert_eq!(
            session.snapshot().nms_base_url.as_deref(),
            Some("https://nms.example.com")
        );
    }
}
