//! The session task: the imperative shell around the reconnection policy.
//!
//! One task owns the [`Reconnector`], the [`Driver`] and the retry timers. It
//! processes owner commands, socket signals and timer expiries one at a time,
//! so events are dispatched strictly in delivery order and no transition ever
//! races another.

use std::{collections::HashMap, sync::Arc};

use chargewire_engine::{
    Dispatcher, Effect, HandleId, ObserverId, Reconnector, Signal, StatusStore, TimerId,
};
use chargewire_protocol::{
    Event, Phase, Subscription,
    codec::{self, Frame},
};
use tokio::{
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::{
    Error, Result,
    driver::{Connector, Driver, DriverEvent, DriverSignal},
};

/// Longest frame excerpt included in a log line.
const MAX_LOGGED_FRAME: usize = 256;

/// Owner requests, processed in order with socket signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Start connecting.
    Enable,
    /// Close everything and go idle.
    Disable,
    /// Start over with a fresh attempt counter.
    Reconnect,
    /// Disable, then end the task.
    Shutdown,
}

/// Handle to a running session.
///
/// Commands are queued to the session task; read access goes straight to the
/// shared [`StatusStore`].
pub struct SessionHandle {
    /// Command queue.
    commands: UnboundedSender<Command>,
    /// Shared phase and feed.
    store: StatusStore,
    /// Observer registry.
    dispatcher: Dispatcher,
    /// The session task.
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue a command for the session task.
    fn send(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).map_err(|_| Error::SessionClosed)
    }

    /// Start connecting. A no-op while connecting or connected.
    pub fn enable(&self) -> Result<()> {
        self.send(Command::Enable)
    }

    /// Close the socket, cancel any pending retry and go idle.
    pub fn disable(&self) -> Result<()> {
        self.send(Command::Disable)
    }

    /// Reset the attempt counter and connect again. This is the only way out
    /// of the stopped state once retries are exhausted.
    pub fn reconnect(&self) -> Result<()> {
        self.send(Command::Reconnect)
    }

    /// Disable and wait for the session task to finish.
    pub async fn shutdown(self) -> Result<()> {
        // A closed queue means the task is already gone; joining still applies.
        self.send(Command::Shutdown).ok();
        self.task.await.map_err(|_| Error::SessionClosed)
    }

    /// Current connection phase.
    pub fn status(&self) -> Phase {
        self.store.phase()
    }

    /// Receiver that wakes on every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.store.watch_phase()
    }

    /// Up to `n` most recent events, newest first.
    pub fn latest(&self, n: usize) -> Vec<Event> {
        self.store.latest(n)
    }

    /// Empty the live feed.
    pub fn clear_events(&self) {
        self.store.clear_events();
    }

    /// The shared status store.
    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Register `callback` for dispatched events matching `filter`.
    pub fn observe<F>(&self, filter: Subscription, callback: F) -> ObserverId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.dispatcher.observe(filter, callback)
    }

    /// Remove an observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.dispatcher.unobserve(id)
    }
}

/// State owned by the session task.
struct Session {
    /// Push-channel URL, subscription parameters included.
    url: Url,
    /// Reconnection state machine.
    policy: Reconnector,
    /// Socket owner.
    driver: Driver,
    /// Event fan-out.
    dispatcher: Dispatcher,
    /// Cancellation tokens of armed retry timers.
    timers: HashMap<TimerId, CancellationToken>,
    /// Where timer tasks report expiry.
    timer_tx: UnboundedSender<TimerId>,
}

/// Spawn the session task on the current runtime.
pub(crate) fn spawn(
    url: Url,
    policy: Reconnector,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = unbounded_channel();
    let (driver_tx, driver_rx) = unbounded_channel();
    let (timer_tx, timer_rx) = unbounded_channel();
    let store = dispatcher.store().clone();
    let session = Session {
        url,
        policy,
        driver: Driver::new(connector, driver_tx),
        dispatcher: dispatcher.clone(),
        timers: HashMap::new(),
        timer_tx,
    };
    let task = tokio::spawn(session.run(cmd_rx, driver_rx, timer_rx));
    SessionHandle {
        commands: cmd_tx,
        store,
        dispatcher,
        task,
    }
}

impl Session {
    /// Main loop. Ends on [`Command::Shutdown`] or when every handle is gone.
    async fn run(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        mut driver_events: UnboundedReceiver<DriverEvent>,
        mut timers: UnboundedReceiver<TimerId>,
    ) {
        info!(url = %self.url, "session started");
        loop {
            tokio::select! {
                biased;
                cmd = commands.recv() => match cmd {
                    Some(Command::Enable) => self.signal(Signal::Enable),
                    Some(Command::Disable) => self.signal(Signal::Disable),
                    Some(Command::Reconnect) => self.signal(Signal::Reconnect),
                    Some(Command::Shutdown) | None => {
                        self.signal(Signal::Disable);
                        break;
                    }
                },
                Some(ev) = driver_events.recv() => self.on_driver_event(ev),
                Some(timer) = timers.recv() => {
                    self.timers.remove(&timer);
                    self.signal(Signal::RetryElapsed(timer));
                }
            }
        }
        info!("session stopped");
    }

    /// Feed one signal to the policy and carry out its effects.
    fn signal(&mut self, signal: Signal) {
        for effect in self.policy.handle(signal) {
            self.apply(effect);
        }
    }

    /// Carry out one effect.
    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Open => {
                let handle = self.driver.open(&self.url);
                self.policy.attach(handle);
            }
            Effect::Close(handle) => self.driver.close(handle),
            Effect::Schedule { timer, delay } => {
                let token = CancellationToken::new();
                let cancel = token.clone();
                let tx = self.timer_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = time::sleep(delay) => {
                            tx.send(timer).ok();
                        }
                    }
                });
                self.timers.insert(timer, token);
            }
            Effect::CancelRetry(timer) => {
                if let Some(token) = self.timers.remove(&timer) {
                    token.cancel();
                }
            }
            Effect::SetPhase(phase) => {
                self.dispatcher.store().set_phase(phase);
            }
        }
    }

    /// Translate a socket signal, dropping anything from a stale handle.
    fn on_driver_event(&mut self, ev: DriverEvent) {
        let DriverEvent { handle, signal } = ev;
        match signal {
            DriverSignal::Open => {
                info!(handle = handle.0, "push channel connected");
                self.signal(Signal::Opened(handle));
            }
            DriverSignal::Message(text) => self.on_frame(handle, &text),
            DriverSignal::Error(error) => {
                if self.policy.is_current(handle) {
                    warn!(handle = handle.0, %error, "push channel error");
                }
                self.signal(Signal::Errored(handle));
            }
            DriverSignal::Close => {
                debug!(handle = handle.0, "push channel closed");
                self.signal(Signal::Closed(handle));
            }
        }
    }

    /// Decode and dispatch one text frame.
    fn on_frame(&self, handle: HandleId, text: &str) {
        if !self.policy.is_current(handle) {
            trace!(handle = handle.0, "dropping frame from stale handle");
            return;
        }
        match codec::decode_frame(text) {
            Ok(Frame::Event(event)) => self.dispatcher.dispatch(event),
            Ok(Frame::Ack) => debug!(handle = handle.0, "connection acknowledged"),
            Err(e) => warn!(error = %e, frame = %truncate(text), "dropping malformed frame"),
        }
    }
}

/// Cap logged frames at a readable length.
fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_LOGGED_FRAME) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
