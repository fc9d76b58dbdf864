//! Remote origin health tracking and call gating
//!
//! [`RemoteHealthController`] wraps every outbound call to one origin. It keeps
//! a [`RemoteStatus`] that moves between the states of [`RemoteStatusKind`]
//! as calls succeed or fail, and refuses calls while the origin is blocked.
//!
//! The status and its block window live behind one narrow mutex. The wrapped
//! call runs outside it, and observers are notified after it is released.
//! Auto-block expiry is evaluated lazily when the next call arrives; there is
//! no background task.

mod auto_block;
mod status;

pub use auto_block::AutoBlockSchedule;
pub use status::{RemoteStatus, RemoteStatusKind};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, system_clock};
use crate::error::{RemoteError, TransportError};

/// Receives remote status transitions
///
/// Called synchronously on the thread that caused the transition, so
/// implementations must return quickly. Observers run after the status lock
/// is released, so two racing transitions can be delivered in either order.
/// Use [`RemoteStatus::sequence`] to discard a notification older than one
/// already seen.
pub trait StatusObserver: Send + Sync {
    fn on_status_changed(&self, old: &RemoteStatus, new: &RemoteStatus);
}

impl<F> StatusObserver for F
where
    F: Fn(&RemoteStatus, &RemoteStatus) + Send + Sync,
{
    fn on_status_changed(&self, old: &RemoteStatus, new: &RemoteStatus) {
        self(old, new);
    }
}

/// Health policy of one remote, read from repository configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHealthSettings {
    /// Manual block
    pub blocked: bool,
    /// Manual offline; takes precedence over `blocked`
    pub offline: bool,
    /// Refuse calls for a while after a connectivity failure
    pub auto_block: bool,
    pub auto_block_initial_window: Duration,
    pub auto_block_max_window: Duration,
}

impl Default for RemoteHealthSettings {
    fn default() -> Self {
        Self {
            blocked: false,
            offline: false,
            auto_block: true,
            auto_block_initial_window: Duration::from_secs(40),
            auto_block_max_window: Duration::from_secs(3600),
        }
    }
}

/// Call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteHealthStats {
    /// Calls that were let through
    pub attempted: u64,
    /// Calls refused without being attempted
    pub rejected: u64,
    /// Attempted calls that failed with a connectivity error
    pub connectivity_failures: u64,
}

#[derive(Debug)]
struct HealthState {
    status: RemoteStatus,
    blocked: bool,
    offline: bool,
    auto_block: bool,
    schedule: AutoBlockSchedule,
}

impl HealthState {
    /// Status implied by the manual flags, if any
    fn manual_status(&self) -> Option<RemoteStatus> {
        if self.offline {
            Some(RemoteStatus::offline())
        } else if self.blocked {
            Some(RemoteStatus::blocked())
        } else {
            None
        }
    }
}

/// A status change, applied under the lock and reported after it
struct Transition {
    old: RemoteStatus,
    new: RemoteStatus,
}

/// Circuit breaker for one remote origin
pub struct RemoteHealthController {
    name: String,
    state: Mutex<HealthState>,
    observers: RwLock<Vec<Arc<dyn StatusObserver>>>,
    clock: Arc<dyn Clock>,
    attempted: AtomicU64,
    rejected: AtomicU64,
    connectivity_failures: AtomicU64,
}

impl std::fmt::Debug for RemoteHealthController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHealthController")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl RemoteHealthController {
    /// Create a controller using the system clock
    #[must_use]
    pub fn new(name: impl Into<String>, settings: &RemoteHealthSettings) -> Self {
        Self::with_clock(name, settings, system_clock())
    }

    /// Create a controller with an explicit clock
    ///
    /// Manual flags are applied immediately: offline wins over blocked, and
    /// otherwise the remote starts as READY. Construction notifies nobody.
    #[must_use]
    pub fn with_clock(
        name: impl Into<String>,
        settings: &RemoteHealthSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut state = HealthState {
            status: RemoteStatus::ready(),
            blocked: settings.blocked,
            offline: settings.offline,
            auto_block: settings.auto_block,
            schedule: AutoBlockSchedule::new(
                settings.auto_block_initial_window,
                settings.auto_block_max_window,
            ),
        };
        if let Some(manual) = state.manual_status() {
            state.status = manual;
        }
        Self {
            name: name.into(),
            state: Mutex::new(state),
            observers: RwLock::new(Vec::new()),
            clock,
            attempted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            connectivity_failures: AtomicU64::new(0),
        }
    }

    /// Repository name used in log output
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an observer of status changes
    pub fn add_observer(&self, observer: Arc<dyn StatusObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> RemoteStatus {
        self.lock().status.clone()
    }

    /// Whether a call made now would be attempted
    #[must_use]
    pub fn is_call_allowed(&self) -> bool {
        self.lock().status.allows_calls(self.clock.now_millis())
    }

    #[must_use]
    pub fn is_auto_block_enabled(&self) -> bool {
        self.lock().auto_block
    }

    #[must_use]
    pub fn stats(&self) -> RemoteHealthStats {
        RemoteHealthStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            connectivity_failures: self.connectivity_failures.load(Ordering::Relaxed),
        }
    }

    /// Run `call` if the remote currently accepts calls, and record its outcome
    ///
    /// Refused calls are never invoked. A success makes the remote AVAILABLE; a
    /// connectivity failure makes it AUTO_BLOCKED_UNAVAILABLE (auto-block on) or
    /// UNAVAILABLE (auto-block off). Other transport errors are returned
    /// without touching the status.
    pub async fn filter<F, Fut, T>(&self, call: F) -> Result<T, RemoteError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.gate(None, call).await
    }

    /// Like [`filter`](Self::filter), recording `request_url` on failure
    pub async fn filter_request<F, Fut, T>(
        &self,
        request_url: &str,
        call: F,
    ) -> Result<T, RemoteError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.gate(Some(request_url), call).await
    }

    async fn gate<F, Fut, T>(&self, request_url: Option<&str>, call: F) -> Result<T, RemoteError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        if let Err(rejection) = self.admit() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(rejection);
        }
        self.attempted.fetch_add(1, Ordering::Relaxed);

        match call().await {
            Ok(value) => {
                self.report_success();
                Ok(value)
            }
            Err(err) if err.is_connectivity_error() => {
                self.report_failure(&err, request_url);
                Err(RemoteError::Transport(err))
            }
            Err(err) => {
                debug!(repository = %self.name, error = %err, "Remote call failed, status unchanged");
                Err(RemoteError::Transport(err))
            }
        }
    }

    fn admit(&self) -> Result<(), RemoteError> {
        let state = self.lock();
        match state.status.kind() {
            RemoteStatusKind::Offline => Err(RemoteError::Offline),
            RemoteStatusKind::Blocked => {
                trace!(repository = %self.name, "Call refused, remote is blocked");
                Err(RemoteError::Blocked)
            }
            RemoteStatusKind::AutoBlockedUnavailable
                if !state.status.allows_calls(self.clock.now_millis()) =>
            {
                let until = state.status.blocked_until().unwrap_or_default();
                trace!(repository = %self.name, until, "Call refused, remote is auto-blocked");
                Err(RemoteError::AutoBlocked { until })
            }
            _ => Ok(()),
        }
    }

    /// Record a successful call made outside [`filter`](Self::filter)
    pub fn report_success(&self) {
        self.update(|state, _now| {
            if state.status.kind().is_manual() {
                return None;
            }
            state.schedule.reset();
            Some(RemoteStatus::available())
        });
    }

    /// Record a connectivity failure of a call made outside [`filter`](Self::filter)
    ///
    /// A failure that lands while an auto-block is still running belongs to a
    /// call started before the block, and leaves the block alone.
    pub fn report_failure(&self, err: &TransportError, request_url: Option<&str>) {
        self.connectivity_failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            repository = %self.name,
            url = request_url.unwrap_or_default(),
            error = %err,
            "Remote connectivity failure"
        );
        let reason = err.reason();
        let url = request_url.map(str::to_owned);
        self.update(|state, now| {
            if state.status.kind().is_manual() {
                return None;
            }
            if !state.auto_block {
                return Some(RemoteStatus::unavailable(reason, url));
            }
            if state.status.kind() == RemoteStatusKind::AutoBlockedUnavailable
                && !state.status.allows_calls(now)
            {
                return None;
            }
            let window = state.schedule.next_window();
            let until = now.saturating_add(u64::try_from(window.as_millis()).unwrap_or(u64::MAX));
            Some(RemoteStatus::auto_blocked(until, reason, url))
        });
    }

    /// Apply or lift a manual block
    ///
    /// Lifting it returns the remote to READY unless it is also offline.
    /// Returns whether the status changed.
    pub fn set_blocked(&self, blocked: bool) -> bool {
        self.update(|state, _now| {
            state.blocked = blocked;
            Some(Self::resolve_manual(state))
        })
    }

    /// Take the remote offline or bring it back; returns whether the status changed
    pub fn set_offline(&self, offline: bool) -> bool {
        self.update(|state, _now| {
            state.offline = offline;
            Some(Self::resolve_manual(state))
        })
    }

    /// Enable or disable auto-blocking
    ///
    /// Disabling it while auto-blocked lifts the block and leaves the remote
    /// UNAVAILABLE, since the last call did fail.
    pub fn set_auto_block(&self, enabled: bool) -> bool {
        self.update(|state, _now| {
            state.auto_block = enabled;
            if enabled || state.status.kind() != RemoteStatusKind::AutoBlockedUnavailable {
                return None;
            }
            state.schedule.reset();
            let reason = state.status.reason().unwrap_or("Auto-block disabled").to_owned();
            let url = state.status.request_url().map(str::to_owned);
            Some(RemoteStatus::unavailable(reason, url))
        })
    }

    /// Replace the auto-block window bounds; the sequence restarts
    pub fn set_auto_block_windows(&self, initial: Duration, max: Duration) {
        self.lock().schedule = AutoBlockSchedule::new(initial, max);
    }

    /// Clear an automatic block or failure by hand
    ///
    /// Has no effect on manual states.
    pub fn mark_available(&self) -> bool {
        self.update(|state, _now| {
            if state.status.kind().is_manual() {
                return None;
            }
            state.schedule.reset();
            Some(RemoteStatus::available())
        })
    }

    /// Apply every setting at once, as on a configuration refresh
    pub fn apply_settings(&self, settings: &RemoteHealthSettings) {
        let windows = AutoBlockSchedule::new(
            settings.auto_block_initial_window,
            settings.auto_block_max_window,
        );
        {
            let mut state = self.lock();
            if state.schedule.initial() != windows.initial() || state.schedule.max() != windows.max()
            {
                state.schedule = windows;
            }
        }
        self.set_auto_block(settings.auto_block);
        self.update(|state, _now| {
            state.blocked = settings.blocked;
            state.offline = settings.offline;
            Some(Self::resolve_manual(state))
        });
    }

    /// Status after a manual flag changed
    fn resolve_manual(state: &HealthState) -> RemoteStatus {
        match state.manual_status() {
            Some(manual) => manual,
            None if state.status.kind().is_manual() => RemoteStatus::ready(),
            None => state.status.clone(),
        }
    }

    /// Apply `next` under the lock, then log and notify outside it
    fn update<F>(&self, next: F) -> bool
    where
        F: FnOnce(&mut HealthState, u64) -> Option<RemoteStatus>,
    {
        let transition = {
            let mut state = self.lock();
            let now = self.clock.now_millis();
            next(&mut *state, now).and_then(|new| {
                let sequence = state.status.sequence();
                if state.status.differs_from(&new) {
                    let new = new.with_sequence(sequence + 1);
                    let old = std::mem::replace(&mut state.status, new.clone());
                    Some(Transition { old, new })
                } else {
                    state.status = new.with_sequence(sequence);
                    None
                }
            })
        };

        match transition {
            Some(transition) => {
                self.log_transition(&transition);
                self.notify(&transition);
                true
            }
            None => false,
        }
    }

    fn log_transition(&self, Transition { old, new }: &Transition) {
        let name = &self.name;
        if old.kind() == RemoteStatusKind::Ready {
            info!("Remote status of repository {name} set to {}", new.kind());
        } else if old.kind() == new.kind() && new.kind() == RemoteStatusKind::AutoBlockedUnavailable
        {
            info!(
                "Remote status of repository {name} continued as {} until {}",
                new.kind(),
                new.blocked_until().unwrap_or_default()
            );
        } else {
            info!("Remote status of repository {name} changed from {} to {new}", old.kind());
        }
    }

    fn notify(&self, Transition { old, new }: &Transition) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_status_changed(old, new);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;

    fn refused() -> TransportError {
        TransportError::Connect {
            host: "repo.example.com".into(),
            reason: "refused".into(),
        }
    }

    fn controller(settings: RemoteHealthSettings) -> (RemoteHealthController, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let controller = RemoteHealthController::with_clock("central", &settings, clock.handle());
        (controller, clock)
    }

    fn recorder(
        controller: &RemoteHealthController,
    ) -> Arc<Mutex<Vec<(RemoteStatusKind, RemoteStatusKind)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.add_observer(Arc::new(move |old: &RemoteStatus, new: &RemoteStatus| {
            sink.lock().unwrap().push((old.kind(), new.kind()));
        }));
        seen
    }

    #[test]
    fn starts_ready() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        assert_eq!(controller.status().kind(), RemoteStatusKind::Ready);
        assert!(controller.is_call_allowed());
    }

    #[test]
    fn manual_flags_at_construction() {
        let (blocked, _) = controller(RemoteHealthSettings {
            blocked: true,
            ..Default::default()
        });
        assert_eq!(blocked.status().kind(), RemoteStatusKind::Blocked);

        let (offline, _) = controller(RemoteHealthSettings {
            blocked: true,
            offline: true,
            ..Default::default()
        });
        assert_eq!(offline.status().kind(), RemoteStatusKind::Offline);
    }

    #[tokio::test]
    async fn success_makes_available_once() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        let seen = recorder(&controller);

        controller.filter(|| async { Ok::<_, TransportError>(1) }).await.unwrap();
        controller.filter(|| async { Ok::<_, TransportError>(2) }).await.unwrap();

        assert_eq!(controller.status().kind(), RemoteStatusKind::Available);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(RemoteStatusKind::Ready, RemoteStatusKind::Available)]
        );
    }

    #[tokio::test]
    async fn connectivity_failure_auto_blocks() {
        let (controller, clock) = controller(RemoteHealthSettings::default());
        let result = controller
            .filter(|| async { Err::<(), _>(refused()) })
            .await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));

        let status = controller.status();
        assert_eq!(status.kind(), RemoteStatusKind::AutoBlockedUnavailable);
        assert_eq!(status.blocked_until(), Some(clock.now_millis() + 40_000));
        assert_eq!(status.reason(), Some("Connection refused"));
    }

    #[tokio::test]
    async fn auto_blocked_rejects_without_calling() {
        let (controller, clock) = controller(RemoteHealthSettings::default());
        let _ = controller.filter(|| async { Err::<(), _>(refused()) }).await;

        let calls = AtomicUsize::new(0);
        let result = controller
            .filter(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TransportError>(())
            })
            .await;
        assert!(matches!(result, Err(RemoteError::AutoBlocked { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        clock.advance(Duration::from_secs(40));
        controller
            .filter(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TransportError>(())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.status().kind(), RemoteStatusKind::Available);
    }

    #[tokio::test]
    async fn failed_probe_extends_block() {
        let (controller, clock) = controller(RemoteHealthSettings::default());
        let seen = recorder(&controller);

        let _ = controller.filter(|| async { Err::<(), _>(refused()) }).await;
        clock.advance(Duration::from_secs(40));
        let _ = controller.filter(|| async { Err::<(), _>(refused()) }).await;
        clock.advance(Duration::from_secs(40));
        let _ = controller.filter(|| async { Err::<(), _>(refused()) }).await;

        assert_eq!(
            controller.status().blocked_until(),
            Some(clock.now_millis() + 80_000)
        );
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn failure_during_active_block_is_absorbed() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        let seen = recorder(&controller);

        controller.report_failure(&refused(), None);
        let until = controller.status().blocked_until();
        controller.report_failure(&refused(), None);

        assert_eq!(controller.status().blocked_until(), until);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn without_auto_block_failure_is_unavailable() {
        let (controller, _clock) = controller(RemoteHealthSettings {
            auto_block: false,
            ..Default::default()
        });
        let seen = recorder(&controller);

        for _ in 0..3 {
            let _ = controller.filter(|| async { Err::<(), _>(refused()) }).await;
        }
        assert_eq!(controller.status().kind(), RemoteStatusKind::Unavailable);
        assert!(controller.is_call_allowed());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_errors_leave_health_alone() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        let result = controller
            .filter(|| async { Err::<(), _>(TransportError::Status { code: 500 }) })
            .await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));
        assert_eq!(controller.status().kind(), RemoteStatusKind::Ready);
    }

    #[tokio::test]
    async fn explicit_connectivity_report_flips_health() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        let _ = controller
            .filter(|| async { Err::<(), _>(TransportError::connectivity("gateway 502")) })
            .await;
        assert_eq!(
            controller.status().kind(),
            RemoteStatusKind::AutoBlockedUnavailable
        );
        assert_eq!(controller.status().reason(), Some("gateway 502"));
    }

    #[tokio::test]
    async fn offline_never_calls_and_never_notifies() {
        let (controller, _clock) = controller(RemoteHealthSettings {
            offline: true,
            ..Default::default()
        });
        let seen = recorder(&controller);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = controller
                .filter(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TransportError>(())
                })
                .await;
            assert!(matches!(result, Err(RemoteError::Offline)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(controller.stats().rejected, 3);
    }

    #[test]
    fn unblock_returns_to_ready() {
        let (controller, _clock) = controller(RemoteHealthSettings {
            blocked: true,
            ..Default::default()
        });
        assert!(controller.set_blocked(false));
        assert_eq!(controller.status().kind(), RemoteStatusKind::Ready);
        assert!(!controller.set_blocked(false));
    }

    #[test]
    fn offline_wins_over_blocked() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        controller.set_offline(true);
        controller.set_blocked(true);
        assert_eq!(controller.status().kind(), RemoteStatusKind::Offline);

        controller.set_offline(false);
        assert_eq!(controller.status().kind(), RemoteStatusKind::Blocked);
    }

    #[test]
    fn success_does_not_override_manual_block() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        controller.set_blocked(true);
        controller.report_success();
        assert_eq!(controller.status().kind(), RemoteStatusKind::Blocked);
    }

    #[test]
    fn disabling_auto_block_lifts_block() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        controller.report_failure(&refused(), Some("https://repo.example.com/a"));
        assert!(controller.set_auto_block(false));

        let status = controller.status();
        assert_eq!(status.kind(), RemoteStatusKind::Unavailable);
        assert_eq!(status.request_url(), Some("https://repo.example.com/a"));
        assert!(controller.is_call_allowed());
    }

    #[test]
    fn mark_available_clears_auto_block() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        controller.report_failure(&refused(), None);
        assert!(controller.mark_available());
        assert_eq!(controller.status().kind(), RemoteStatusKind::Available);
    }

    #[test]
    fn apply_settings_updates_flags() {
        let (controller, _clock) = controller(RemoteHealthSettings::default());
        controller.apply_settings(&RemoteHealthSettings {
            blocked: true,
            ..Default::default()
        });
        assert_eq!(controller.status().kind(), RemoteStatusKind::Blocked);

        controller.apply_settings(&RemoteHealthSettings {
            auto_block: false,
            ..Default::default()
        });
        assert_eq!(controller.status().kind(), RemoteStatusKind::Ready);
        assert!(!controller.is_auto_block_enabled());
    }
}
