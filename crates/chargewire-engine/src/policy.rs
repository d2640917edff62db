//! Reconnection policy as a pure state machine.
//!
//! [`Reconnector::handle`] takes one [`Signal`] and returns the [`Effect`]s the
//! owner must carry out: open or close a socket, arm or cancel a retry timer,
//! publish a phase. Nothing here touches a socket or a clock, so every
//! transition is testable by feeding signals and inspecting effects.
//!
//! Stale-handle guard: socket signals carry the [`HandleId`] they came from and
//! are ignored unless it is the handle currently attached. Retry expiries carry
//! a [`TimerId`] and are ignored unless that timer is still pending.

use std::time::Duration;

use chargewire_protocol::Phase;
use tracing::{debug, trace};

/// Default first retry delay.
pub const DEFAULT_BASE: Duration = Duration::from_millis(1000);
/// Default upper bound for exponential delays.
pub const DEFAULT_CEILING: Duration = Duration::from_millis(30_000);
/// Default number of automatic retries before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// How the retry delay grows with consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Always wait the base interval.
    Fixed,
    /// Double the base interval per failure, bounded by the ceiling.
    #[default]
    Exponential,
}

/// Retry delay schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Growth rule.
    pub strategy: Strategy,
    /// Delay before the first retry.
    pub base: Duration,
    /// No exponential delay exceeds this. Fixed delays ignore it.
    pub ceiling: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            base: DEFAULT_BASE,
            ceiling: DEFAULT_CEILING,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based). Non-decreasing in
    /// `attempt`. Exponential delays never exceed the ceiling; a fixed delay
    /// is always the base.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.strategy {
            Strategy::Fixed => self.base,
            Strategy::Exponential => {
                let shift = attempt.saturating_sub(1).min(31);
                self.base.saturating_mul(1u32 << shift).min(self.ceiling)
            }
        }
    }
}

/// Identifies one socket opened by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

/// Identifies one scheduled retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Lifecycle state of the reconnection machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not enabled; nothing open, nothing scheduled.
    Idle,
    /// A socket has been requested and has not opened yet.
    Connecting,
    /// The socket is open.
    Connected,
    /// The socket is gone and a retry is scheduled.
    Disconnected,
    /// Retries are exhausted; only an explicit reconnect leaves this state.
    Stopped,
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The owner turned the subsystem on.
    Enable,
    /// The owner turned the subsystem off.
    Disable,
    /// The owner asked for a fresh connection with a reset attempt counter.
    Reconnect,
    /// The socket finished its handshake.
    Opened(HandleId),
    /// The socket reported a transport error.
    Errored(HandleId),
    /// The socket closed.
    Closed(HandleId),
    /// A scheduled retry delay elapsed.
    RetryElapsed(TimerId),
}

/// Work the owner must perform after a transition, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Open a new socket and [`Reconnector::attach`] its handle.
    Open,
    /// Close this socket and suppress its remaining signals.
    Close(HandleId),
    /// Fire [`Signal::RetryElapsed`] with `timer` after `delay`.
    Schedule {
        /// Timer to report back.
        timer: TimerId,
        /// How long to wait.
        delay: Duration,
    },
    /// Cancel a pending retry.
    CancelRetry(TimerId),
    /// Publish a new connection phase.
    SetPhase(Phase),
}

/// The reconnection state machine.
#[derive(Debug, Clone)]
pub struct Reconnector {
    /// Current state.
    state: State,
    /// Consecutive failures since the last successful open.
    attempts: u32,
    /// Retry cap.
    max_attempts: u32,
    /// Delay schedule.
    backoff: Backoff,
    /// Handle of the socket this machine is tracking, if any.
    live: Option<HandleId>,
    /// Retry timer currently armed, if any.
    pending: Option<TimerId>,
    /// Source of timer ids.
    next_timer: u64,
}

impl Default for Reconnector {
    fn default() -> Self {
        Self::new(Backoff::default(), DEFAULT_MAX_ATTEMPTS)
    }
}

impl Reconnector {
    /// Create an idle machine.
    pub fn new(backoff: Backoff, max_attempts: u32) -> Self {
        Self {
            state: State::Idle,
            attempts: 0,
            max_attempts,
            backoff,
            live: None,
            pending: None,
            next_timer: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Consecutive failures since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retry cap.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay schedule.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Handle currently tracked.
    pub fn live(&self) -> Option<HandleId> {
        self.live
    }

    /// Record the handle produced for the last [`Effect::Open`].
    pub fn attach(&mut self, handle: HandleId) {
        trace!(handle = handle.0, "attach");
        self.live = Some(handle);
    }

    /// Whether signals from `handle` are still meaningful.
    pub fn is_current(&self, handle: HandleId) -> bool {
        self.live == Some(handle)
    }

    /// Apply one signal and return the effects to carry out.
    pub fn handle(&mut self, signal: Signal) -> Vec<Effect> {
        let effects = match signal {
            Signal::Enable => self.on_enable(),
            Signal::Disable => self.on_disable(),
            Signal::Reconnect => self.on_reconnect(),
            Signal::Opened(h) => self.on_opened(h),
            Signal::Errored(h) => self.on_lost(h, Phase::Error),
            Signal::Closed(h) => self.on_lost(h, Phase::Disconnected),
            Signal::RetryElapsed(t) => self.on_retry(t),
        };
        trace!(?signal, state = ?self.state, attempts = self.attempts, ?effects, "policy");
        effects
    }

    /// Enter `Connecting` and request a socket.
    fn start(&mut self) -> Vec<Effect> {
        self.state = State::Connecting;
        vec![Effect::SetPhase(Phase::Connecting), Effect::Open]
    }

    /// Cancel the pending retry and close the live socket.
    fn teardown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(t) = self.pending.take() {
            effects.push(Effect::CancelRetry(t));
        }
        if let Some(h) = self.live.take() {
            effects.push(Effect::Close(h));
        }
        effects
    }

    /// Idle only; enabling a running machine is a no-op.
    fn on_enable(&mut self) -> Vec<Effect> {
        if self.state != State::Idle {
            return Vec::new();
        }
        self.attempts = 0;
        self.start()
    }

    /// Any state to `Idle`.
    fn on_disable(&mut self) -> Vec<Effect> {
        if self.state == State::Idle {
            return Vec::new();
        }
        let mut effects = self.teardown();
        self.state = State::Idle;
        self.attempts = 0;
        effects.push(Effect::SetPhase(Phase::Disconnected));
        effects
    }

    /// Drop whatever is in flight and start over with a fresh counter.
    fn on_reconnect(&mut self) -> Vec<Effect> {
        let mut effects = self.teardown();
        self.attempts = 0;
        effects.extend(self.start());
        effects
    }

    /// `Connecting -> Connected`; resets the counter.
    fn on_opened(&mut self, h: HandleId) -> Vec<Effect> {
        if !self.is_current(h) || self.state != State::Connecting {
            debug!(handle = h.0, "ignoring open from stale handle");
            return Vec::new();
        }
        self.state = State::Connected;
        self.attempts = 0;
        vec![Effect::SetPhase(Phase::Connected)]
    }

    /// The tracked socket failed or closed: retry while the budget lasts.
    fn on_lost(&mut self, h: HandleId, phase: Phase) -> Vec<Effect> {
        if !self.is_current(h) {
            debug!(handle = h.0, "ignoring signal from stale handle");
            return Vec::new();
        }
        self.live = None;
        let mut effects = vec![Effect::Close(h)];
        if self.attempts >= self.max_attempts {
            self.state = State::Stopped;
            debug!(attempts = self.attempts, "reconnect attempts exhausted");
            effects.push(Effect::SetPhase(Phase::Error));
            return effects;
        }
        self.attempts += 1;
        self.next_timer += 1;
        let timer = TimerId(self.next_timer);
        let delay = self.backoff.delay(self.attempts);
        self.pending = Some(timer);
        self.state = State::Disconnected;
        debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        effects.push(Effect::SetPhase(phase));
        effects.push(Effect::Schedule { timer, delay });
        effects
    }

    /// `Disconnected -> Connecting` when the armed timer fires.
    fn on_retry(&mut self, t: TimerId) -> Vec<Effect> {
        if self.pending != Some(t) || self.state != State::Disconnected {
            trace!(timer = t.0, "ignoring stale retry");
            return Vec::new();
        }
        self.pending = None;
        self.start()
    }
}
