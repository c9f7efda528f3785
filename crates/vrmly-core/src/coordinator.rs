// ── Poll coordinator ──
//
// Drives the fetch -> derive -> publish cycle on a fixed interval, counts
// consecutive failures, and suspends itself while the access token is
// being replaced.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{AttributeCatalog, AttributeId};
use crate::config::EngineConfig;
use crate::derive::DerivationEngine;
use crate::error::{CoreError, FetchError};
use crate::model::{DEFAULT_SENSORS, SensorSet, Snapshot};
use crate::reauth::{AuthStatus, AuthWatch, ReauthGate};
use crate::session::VrmSession;
use crate::store::{Feed, FeedStatus, FeedStore};
use crate::stream::SensorStream;

// ── PollState ────────────────────────────────────────────────────

/// Where the coordinator is in its cycle.
///
/// `Published`, `AuthBlocked` and `TransientFailure` describe the outcome
/// of the last cycle and persist until the next one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PollState {
    /// Not started yet.
    Idle,
    Polling,
    Published,
    AuthBlocked,
    TransientFailure { consecutive: u32 },
    Stopped,
}

/// Result of a single [`PollCoordinator::poll_once`] cycle.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Published(Arc<Snapshot>),
    /// The token is not trusted; nothing was fetched or nothing will be
    /// until a new one is supplied.
    AuthBlocked,
    Failed {
        consecutive: u32,
        error: FetchError,
    },
}

// ── PollCoordinator ──────────────────────────────────────────────

/// Polls one installation and publishes to any number of subscribers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. The background loop only
/// holds a weak reference, so dropping the last clone stops polling even
/// without [`stop`](Self::stop).
#[derive(Clone)]
pub struct PollCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: EngineConfig,
    sensors: SensorSet,
    attribute_ids: Vec<AttributeId>,
    session: VrmSession,
    gate: ReauthGate,
    store: FeedStore,
    state: watch::Sender<PollState>,
    /// Held for the duration of a cycle so cycles never overlap.
    cycle: Mutex<CycleState>,
    cancel: CancellationToken,
    /// Child token for the current run; replaced on restart.
    cancel_child: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Default)]
struct CycleState {
    sequence: u64,
    consecutive_failures: u32,
}

impl PollCoordinator {
    /// Validate `config`, resolve the enabled sensors against the default
    /// table and build the HTTP client. Does not start polling.
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let sensors = SensorSet::resolve(
            AttributeCatalog::victron(),
            DEFAULT_SENSORS,
            &config.enabled_sensors,
        )?;
        let session = VrmSession::from_config(&config)?;
        Ok(Self::with_session(config, sensors, session))
    }

    /// Assemble a coordinator from pre-built parts. `config` is assumed
    /// valid.
    pub fn with_session(config: EngineConfig, sensors: SensorSet, session: VrmSession) -> Self {
        let gate = ReauthGate::new(config.token.clone());
        let (state, _) = watch::channel(PollState::Idle);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let attribute_ids = sensors.attribute_ids();

        debug!(
            installation_id = config.installation_id,
            sensors = sensors.len(),
            attributes = attribute_ids.len(),
            "poll coordinator created"
        );

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                sensors,
                attribute_ids,
                session,
                gate,
                store: FeedStore::new(),
                state,
                cycle: Mutex::new(CycleState::default()),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn sensors(&self) -> &SensorSet {
        &self.inner.sensors
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the scheduling loop. The first cycle runs immediately.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut task = self.inner.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(CoreError::AlreadyRunning);
        }

        // Fresh child token per run so the coordinator can be restarted.
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        info!(
            installation_id = self.inner.config.installation_id,
            interval_secs = self.inner.config.poll_interval.as_secs(),
            "starting poller"
        );
        *task = Some(tokio::spawn(poll_task(
            Arc::downgrade(&self.inner),
            self.inner.config.poll_interval,
            child,
        )));
        Ok(())
    }

    /// Cancel any in-flight fetch and halt the schedule. Nothing is
    /// published after this returns.
    pub async fn stop(&self) {
        self.inner.cancel_child.lock().await.cancel();

        if let Some(handle) = self.inner.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "poll task ended abnormally");
            }
        }

        self.inner.state.send_replace(PollState::Stopped);
        debug!("poller stopped");
    }

    // ── One cycle ────────────────────────────────────────────────

    /// Run one fetch -> derive -> publish cycle now.
    ///
    /// Waits for any cycle already in progress. Does nothing but report
    /// [`PollOutcome::AuthBlocked`] while the token is not trusted. A
    /// rejection of a token that was replaced mid-fetch is discarded and the
    /// fetch is repeated with the replacement.
    pub async fn poll_once(&self) -> PollOutcome {
        let inner = &self.inner;
        let mut cycle = inner.cycle.lock().await;

        let result = loop {
            let Some(lease) = inner.gate.lease() else {
                inner.store.degrade(FeedStatus::AuthBlocked);
                inner.state.send_replace(PollState::AuthBlocked);
                return PollOutcome::AuthBlocked;
            };
            inner.session.set_token(lease.token);
            inner.state.send_replace(PollState::Polling);

            let result = inner
                .session
                .fetch(
                    inner.config.installation_id,
                    inner.config.device_instance,
                    &inner.attribute_ids,
                )
                .await;

            if let Err(error @ FetchError::Unauthorized { .. }) = &result {
                if inner.gate.report_unauthorized(lease.generation) != AuthStatus::Expired {
                    // The gate moved on while this fetch was in flight.
                    debug!(%error, "rejected token was already replaced");
                    continue;
                }
            }
            break result;
        };

        match result {
            Ok(raw) => {
                let derived = DerivationEngine::derive(&raw, inner.sensors.definitions());
                let fetched_at = raw.first().map_or_else(Utc::now, |r| r.fetched_at);
                cycle.sequence += 1;
                let snapshot = Arc::new(Snapshot::new(cycle.sequence, fetched_at, raw, derived));

                if cycle.consecutive_failures > 0 {
                    info!(
                        failures = cycle.consecutive_failures,
                        "VRM reachable again"
                    );
                }
                cycle.consecutive_failures = 0;

                inner.store.publish(Arc::clone(&snapshot));
                inner.state.send_replace(PollState::Published);
                debug!(sequence = snapshot.sequence(), "snapshot published");
                PollOutcome::Published(snapshot)
            }
            Err(error @ FetchError::Unauthorized { .. }) => {
                warn!(%error, "access token rejected, suspending polling");
                inner.gate.request_replacement();
                inner.store.degrade(FeedStatus::AuthBlocked);
                inner.state.send_replace(PollState::AuthBlocked);
                PollOutcome::AuthBlocked
            }
            Err(error) => {
                cycle.consecutive_failures = cycle.consecutive_failures.saturating_add(1);
                let consecutive = cycle.consecutive_failures;

                if matches!(error, FetchError::Protocol { .. }) {
                    warn!(%error, consecutive, "VRM returned an unexpected response");
                } else {
                    warn!(%error, consecutive, "poll failed, retrying next cycle");
                }

                if consecutive >= inner.config.failure_threshold {
                    inner.store.degrade(FeedStatus::Stale {
                        consecutive_failures: consecutive,
                    });
                }
                inner
                    .state
                    .send_replace(PollState::TransientFailure { consecutive });
                PollOutcome::Failed { consecutive, error }
            }
        }
    }

    // ── Reauthentication ─────────────────────────────────────────

    pub fn auth_status(&self) -> AuthStatus {
        self.inner.gate.current_state()
    }

    /// Reauth-required signal: resolves to `AwaitingReplacement` when the
    /// host should prompt for a new token.
    pub fn auth_watch(&self) -> AuthWatch {
        self.inner.gate.subscribe()
    }

    /// Install a new token. A suspended poller polls immediately.
    pub fn supply_token(&self, token: SecretString) {
        let previous = self.inner.gate.supply_token(token);
        info!(%previous, "new access token supplied");
    }

    /// Distrust the current token without waiting for VRM to reject it.
    pub fn invalidate_token(&self) {
        self.inner.gate.invalidate();
        self.inner.gate.request_replacement();
    }

    // ── Subscriptions ────────────────────────────────────────────

    pub fn subscribe(&self) -> SensorStream {
        SensorStream::new(
            self.inner.store.subscribe(),
            self.inner.sensors.clone(),
            self.inner.config.installation_id,
        )
    }

    pub fn feed(&self) -> Arc<Feed> {
        self.inner.store.current()
    }

    pub fn state(&self) -> watch::Receiver<PollState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> PollState {
        *self.inner.state.borrow()
    }
}

// ── Background task ──────────────────────────────────────────────

async fn poll_task(
    handle: Weak<CoordinatorInner>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let Some(mut auth) = handle.upgrade().map(|inner| inner.gate.subscribe()) else {
        return;
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        // Only keep the coordinator alive for the length of one cycle.
        let Some(inner) = handle.upgrade() else {
            break;
        };
        let coordinator = PollCoordinator { inner };
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = coordinator.poll_once() => outcome,
        };
        drop(coordinator);

        if matches!(outcome, PollOutcome::AuthBlocked) {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                alive = auth.wait_for(AuthStatus::Valid) => {
                    if !alive {
                        break;
                    }
                }
            }
            debug!("token replaced, polling immediately");
            interval.reset_immediately();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sensor_fails_construction() {
        let mut config = EngineConfig::new(SecretString::from("t".to_string()), 1);
        config.enabled_sensors = vec!["wind_speed".into()];
        let err = PollCoordinator::new(config).err().unwrap();
        assert!(matches!(err, CoreError::UnknownSensor { .. }));
    }

    #[test]
    fn short_interval_fails_construction() {
        let mut config = EngineConfig::new(SecretString::from("t".to_string()), 1);
        config.poll_interval = Duration::from_secs(5);
        config.timeout = Duration::from_secs(5);
        assert!(PollCoordinator::new(config).err().unwrap().is_configuration());
    }

    #[tokio::test]
    async fn starts_idle_and_pending() {
        let config = EngineConfig::new(SecretString::from("t".to_string()), 1);
        let coordinator = PollCoordinator::new(config).unwrap();
        assert_eq!(coordinator.current_state(), PollState::Idle);
        assert_eq!(coordinator.feed().status(), FeedStatus::Pending);
        assert_eq!(coordinator.auth_status(), AuthStatus::Valid);
    }

    #[tokio::test]
    async fn invalidated_token_blocks_without_fetching() {
        let config = EngineConfig::new(SecretString::from("t".to_string()), 1);
        let coordinator = PollCoordinator::new(config).unwrap();

        coordinator.invalidate_token();
        assert_eq!(coordinator.auth_status(), AuthStatus::AwaitingReplacement);

        // The default base URL is never contacted: the gate short-circuits.
        assert!(matches!(
            coordinator.poll_once().await,
            PollOutcome::AuthBlocked
        ));
        assert_eq!(coordinator.current_state(), PollState::AuthBlocked);
        assert_eq!(coordinator.feed().status(), FeedStatus::AuthBlocked);
    }
}
