//! Account-deletion confirmation flow.
//!
//! Deleting an account is a two-phase confirmation gated by a live countdown:
//!
//! ```text
//! Idle ──request_delete()──> AwaitingConfirmation ──confirm()──> CountingDown ──tick() x10──> Deleted
//!  ^                               │                                  │
//!  └───────────cancel()────────────┴──────────────cancel()────────────┘
//! ```
//!
//! [`DeletionRequest`] is the pure state machine: no clocks, no I/O, every
//! transition is a method call. [`DeletionCountdown`] wraps it with the one
//! resource the flow owns, the one-second ticker, and with the account
//! service that performs the actual deletion once the budget runs out.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::account::AccountService;
use crate::error::{Result, VoyagerError};
use crate::types::UserId;

/// Seconds between confirmation and the delete call.
pub const COUNTDOWN_SECONDS: u32 = 10;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// DeletionPhase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPhase {
    Idle,
    AwaitingConfirmation,
    CountingDown,
    Deleted,
}

impl DeletionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionPhase::Idle => "idle",
            DeletionPhase::AwaitingConfirmation => "awaiting_confirmation",
            DeletionPhase::CountingDown => "counting_down",
            DeletionPhase::Deleted => "deleted",
        }
    }
}

impl fmt::Display for DeletionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DeletionRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not counting down; the tick had no effect.
    Ignored,
    /// Still counting; carries the seconds left.
    Counting(u32),
    /// The budget hit zero on this tick. Returned at most once per request.
    Deleted,
}

/// `remaining_seconds` only moves while counting down and is back at
/// [`COUNTDOWN_SECONDS`] whenever the phase is `Idle` or `AwaitingConfirmation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequest {
    phase: DeletionPhase,
    remaining_seconds: u32,
}

impl Default for DeletionRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl DeletionRequest {
    pub fn new() -> Self {
        Self {
            phase: DeletionPhase::Idle,
            remaining_seconds: COUNTDOWN_SECONDS,
        }
    }

    pub fn phase(&self) -> DeletionPhase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn request_delete(&mut self) -> Result<()> {
        match self.phase {
            DeletionPhase::Idle | DeletionPhase::AwaitingConfirmation => {
                self.phase = DeletionPhase::AwaitingConfirmation;
                self.remaining_seconds = COUNTDOWN_SECONDS;
                Ok(())
            }
            _ => Err(self.invalid("request deletion")),
        }
    }

    pub fn confirm(&mut self) -> Result<()> {
        if self.phase != DeletionPhase::AwaitingConfirmation {
            return Err(self.invalid("confirm deletion"));
        }
        self.phase = DeletionPhase::CountingDown;
        self.remaining_seconds = COUNTDOWN_SECONDS;
        Ok(())
    }

    /// Returns `Ok(false)` when there was nothing to cancel.
    pub fn cancel(&mut self) -> Result<bool> {
        match self.phase {
            DeletionPhase::Idle => Ok(false),
            DeletionPhase::AwaitingConfirmation | DeletionPhase::CountingDown => {
                self.phase = DeletionPhase::Idle;
                self.remaining_seconds = COUNTDOWN_SECONDS;
                Ok(true)
            }
            DeletionPhase::Deleted => Err(self.invalid("cancel deletion")),
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != DeletionPhase::CountingDown {
            return TickOutcome::Ignored;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = DeletionPhase::Deleted;
            TickOutcome::Deleted
        } else {
            TickOutcome::Counting(self.remaining_seconds)
        }
    }

    fn invalid(&self, action: &'static str) -> VoyagerError {
        VoyagerError::InvalidDeletionTransition {
            from: self.phase,
            action,
        }
    }
}

// ---------------------------------------------------------------------------
// DeletionEvent
// ---------------------------------------------------------------------------

/// Signals delivered to the host view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeletionEvent {
    ConfirmationRequested,
    CountdownStarted { remaining_seconds: u32 },
    Tick { remaining_seconds: u32 },
    Cancelled,
    /// The countdown reached zero; the delete call is being made.
    DeleteNow,
    Deleted,
    DeleteFailed { message: String },
}

// ---------------------------------------------------------------------------
// DeletionCountdown
// ---------------------------------------------------------------------------

struct Shared {
    request: DeletionRequest,
    /// Bumped on every timer acquire and release. A ticker only acts while
    /// its generation is current.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drives a [`DeletionRequest`] with a real ticker and performs the delete.
///
/// `cancel()` and the ticker take the same lock, so once `cancel()` returns
/// no tick and no delete call can come from the superseded timer. The timer
/// is also released on drop unless the delete call is already under way.
pub struct DeletionCountdown {
    shared: Arc<Mutex<Shared>>,
    account: Arc<dyn AccountService>,
    user_id: UserId,
    events: broadcast::Sender<DeletionEvent>,
    period: Duration,
}

impl DeletionCountdown {
    pub fn new(account: Arc<dyn AccountService>, user_id: UserId) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                request: DeletionRequest::new(),
                generation: 0,
                timer: None,
            })),
            account,
            user_id,
            events,
            period: TICK_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeletionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> DeletionRequest {
        lock(&self.shared).request
    }

    pub fn request_delete(&self) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.request.request_delete()?;
        let _ = self.events.send(DeletionEvent::ConfirmationRequested);
        Ok(())
    }

    /// Start the countdown. Must be called from within a Tokio runtime.
    pub fn confirm(&self) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.request.confirm()?;
        debug_assert!(shared.timer.is_none(), "previous timer was not released");

        shared.generation += 1;
        let ticker = Ticker {
            shared: Arc::clone(&self.shared),
            generation: shared.generation,
            period: self.period,
            account: Arc::clone(&self.account),
            user_id: self.user_id.clone(),
            events: self.events.clone(),
        };
        shared.timer = Some(tokio::spawn(ticker.run()));

        tracing::info!(user = %self.user_id, "account deletion countdown started");
        let _ = self.events.send(DeletionEvent::CountdownStarted {
            remaining_seconds: shared.request.remaining_seconds(),
        });
        Ok(())
    }

    /// Returns `Ok(false)` when there was nothing to cancel.
    pub fn cancel(&self) -> Result<bool> {
        let mut shared = lock(&self.shared);
        let cancelled = shared.request.cancel()?;
        if cancelled {
            shared.generation += 1;
            if let Some(timer) = shared.timer.take() {
                timer.abort();
            }
            tracing::info!(user = %self.user_id, "account deletion cancelled");
            let _ = self.events.send(DeletionEvent::Cancelled);
        }
        Ok(cancelled)
    }
}

impl Drop for DeletionCountdown {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        if let Some(timer) = shared.timer.take() {
            shared.generation += 1;
            timer.abort();
        }
    }
}

struct Ticker {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    period: Duration,
    account: Arc<dyn AccountService>,
    user_id: UserId,
    events: broadcast::Sender<DeletionEvent>,
}

impl Ticker {
    async fn run(self) {
        let start = tokio::time::Instant::now() + self.period;
        let mut interval = tokio::time::interval_at(start, self.period);

        loop {
            interval.tick().await;

            let outcome = {
                let mut shared = lock(&self.shared);
                if shared.generation != self.generation {
                    return;
                }
                let outcome = shared.request.tick();
                match outcome {
                    TickOutcome::Counting(remaining_seconds) => {
                        let _ = self.events.send(DeletionEvent::Tick { remaining_seconds });
                    }
                    TickOutcome::Deleted => {
                        // Detach: from here on the delete call must not be aborted.
                        shared.timer.take();
                        let _ = self.events.send(DeletionEvent::Tick {
                            remaining_seconds: 0,
                        });
                        let _ = self.events.send(DeletionEvent::DeleteNow);
                    }
                    TickOutcome::Ignored => {}
                }
                outcome
            };

            match outcome {
                TickOutcome::Counting(_) => continue,
                TickOutcome::Deleted => break,
                TickOutcome::Ignored => return,
            }
        }

        match self.account.delete_account(&self.user_id).await {
            Ok(()) => {
                tracing::info!(user = %self.user_id, "account deleted");
                let _ = self.events.send(DeletionEvent::Deleted);
            }
            Err(e) => {
                tracing::error!(user = %self.user_id, error = %e, "account deletion failed");
                let _ = self.events.send(DeletionEvent::DeleteFailed {
                    message: e.to_string(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{User, UserPatch};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockAccount {
        deletes: AtomicUsize,
        fail_delete: bool,
    }

    impl MockAccount {
        fn failing() -> Self {
            Self {
                fail_delete: true,
                ..Default::default()
            }
        }

        fn deletes(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccountService for MockAccount {
        async fn update_user(&self, user_id: &UserId, _patch: &UserPatch) -> Result<User> {
            Err(VoyagerError::UserNotFound(user_id.to_string()))
        }

        async fn delete_account(&self, _user_id: &UserId) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                return Err(VoyagerError::Api {
                    status: 500,
                    message: "Failed to delete account".into(),
                });
            }
            Ok(())
        }
    }

    fn counting_request() -> DeletionRequest {
        let mut req = DeletionRequest::new();
        req.request_delete().unwrap();
        req.confirm().unwrap();
        req
    }

    fn countdown(account: &Arc<MockAccount>) -> DeletionCountdown {
        let service: Arc<dyn AccountService> = account.clone();
        DeletionCountdown::new(service, UserId::new("user-1"))
    }

    fn drain(rx: &mut broadcast::Receiver<DeletionEvent>) -> Vec<DeletionEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    // -- pure state machine --------------------------------------------------

    #[test]
    fn starts_idle_with_full_budget() {
        let req = DeletionRequest::new();
        assert_eq!(req.phase(), DeletionPhase::Idle);
        assert_eq!(req.remaining_seconds(), COUNTDOWN_SECONDS);
    }

    #[test]
    fn confirm_requires_awaiting_confirmation() {
        let mut req = DeletionRequest::new();
        let err = req.confirm().unwrap_err();
        assert!(matches!(
            err,
            VoyagerError::InvalidDeletionTransition {
                from: DeletionPhase::Idle,
                ..
            }
        ));
    }

    #[test]
    fn ticks_are_ignored_outside_countdown() {
        let mut req = DeletionRequest::new();
        assert_eq!(req.tick(), TickOutcome::Ignored);
        req.request_delete().unwrap();
        assert_eq!(req.tick(), TickOutcome::Ignored);
        assert_eq!(req.remaining_seconds(), COUNTDOWN_SECONDS);
    }

    #[test]
    fn three_ticks_then_cancel_resets_to_idle() {
        let mut req = DeletionRequest::new();
        req.request_delete().unwrap();
        assert_eq!(req.phase(), DeletionPhase::AwaitingConfirmation);
        assert_eq!(req.remaining_seconds(), 10);

        req.confirm().unwrap();
        for _ in 0..3 {
            req.tick();
        }
        assert_eq!(req.phase(), DeletionPhase::CountingDown);
        assert_eq!(req.remaining_seconds(), 7);

        assert!(req.cancel().unwrap());
        assert_eq!(req.phase(), DeletionPhase::Idle);
        assert_eq!(req.remaining_seconds(), 10);
    }

    #[test]
    fn cancel_at_any_point_before_zero_never_deletes() {
        for ticks_before_cancel in 0..COUNTDOWN_SECONDS {
            let mut req = counting_request();
            for _ in 0..ticks_before_cancel {
                assert_ne!(req.tick(), TickOutcome::Deleted);
            }
            assert!(req.cancel().unwrap());
            // Repeated cancels are harmless no-ops.
            assert!(!req.cancel().unwrap());
            for _ in 0..(2 * COUNTDOWN_SECONDS) {
                assert_eq!(req.tick(), TickOutcome::Ignored);
            }
        }
    }

    #[test]
    fn tenth_tick_deletes_exactly_once() {
        let mut req = counting_request();
        let outcomes: Vec<TickOutcome> = (0..15).map(|_| req.tick()).collect();

        let deleted_at: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == TickOutcome::Deleted)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(deleted_at, vec![10]);
        assert_eq!(outcomes[8], TickOutcome::Counting(1));
        assert_eq!(req.phase(), DeletionPhase::Deleted);
        assert_eq!(req.remaining_seconds(), 0);
    }

    #[test]
    fn cancel_then_confirm_restarts_full_budget() {
        let mut req = counting_request();
        for _ in 0..6 {
            req.tick();
        }
        req.cancel().unwrap();
        req.request_delete().unwrap();
        req.confirm().unwrap();
        assert_eq!(req.remaining_seconds(), COUNTDOWN_SECONDS);
        assert_eq!(req.tick(), TickOutcome::Counting(9));
    }

    #[test]
    fn deleted_is_terminal() {
        let mut req = counting_request();
        for _ in 0..COUNTDOWN_SECONDS {
            req.tick();
        }
        assert!(req.cancel().is_err());
        assert!(req.request_delete().is_err());
        assert!(req.confirm().is_err());
        assert_eq!(req.phase(), DeletionPhase::Deleted);
    }

    // -- timer driver --------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn countdown_cancel_mid_way_never_deletes() {
        let account = Arc::new(MockAccount::default());
        let flow = countdown(&account);

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        let snap = flow.snapshot();
        assert_eq!(snap.phase(), DeletionPhase::CountingDown);
        assert_eq!(snap.remaining_seconds(), 7);

        assert!(flow.cancel().unwrap());
        let snap = flow.snapshot();
        assert_eq!(snap.phase(), DeletionPhase::Idle);
        assert_eq!(snap.remaining_seconds(), 10);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(account.deletes(), 0);
        assert_eq!(flow.snapshot().remaining_seconds(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_out_and_deletes_once() {
        let account = Arc::new(MockAccount::default());
        let flow = countdown(&account);
        let mut rx = flow.subscribe();

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(account.deletes(), 0);
        assert_eq!(flow.snapshot().remaining_seconds(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(account.deletes(), 1);
        assert_eq!(flow.snapshot().phase(), DeletionPhase::Deleted);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(account.deletes(), 1);

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&DeletionEvent::ConfirmationRequested));
        let ticks = events
            .iter()
            .filter(|e| matches!(e, DeletionEvent::Tick { .. }))
            .count();
        assert_eq!(ticks, 10);
        assert_eq!(
            &events[events.len() - 2..],
            &[DeletionEvent::DeleteNow, DeletionEvent::Deleted]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_completion_is_rejected() {
        let account = Arc::new(MockAccount::default());
        let flow = countdown(&account);

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        tokio::time::sleep(Duration::from_millis(10_500)).await;

        assert!(flow.cancel().is_err());
        assert_eq!(account.deletes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfirm_after_cancel_starts_fresh_timer() {
        let account = Arc::new(MockAccount::default());
        let flow = countdown(&account);

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(flow.snapshot().remaining_seconds(), 6);
        flow.cancel().unwrap();

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        assert_eq!(flow.snapshot().remaining_seconds(), 10);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(flow.snapshot().remaining_seconds(), 9);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(account.deletes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delete_is_reported_not_retried() {
        let account = Arc::new(MockAccount::failing());
        let flow = countdown(&account);
        let mut rx = flow.subscribe();

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(account.deletes(), 1);
        assert_eq!(flow.snapshot().phase(), DeletionPhase::Deleted);
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(DeletionEvent::DeleteFailed { message }) if message.contains("500")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_flow_releases_the_timer() {
        let account = Arc::new(MockAccount::default());
        let flow = countdown(&account);

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        drop(flow);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(account.deletes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_period_scales_the_countdown() {
        let account = Arc::new(MockAccount::default());
        let flow = countdown(&account).with_period(Duration::from_millis(100));

        flow.request_delete().unwrap();
        flow.confirm().unwrap();
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        assert_eq!(account.deletes(), 1);
    }
}
