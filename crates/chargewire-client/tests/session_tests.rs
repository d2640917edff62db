//! Session behavior over a scripted in-memory connector.
//!
//! Time is paused, so reconnect delays elapse as soon as every task is idle.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use chargewire_client::{Client, Connector, Error, Inbound, Result, SessionHandle, Socket};
use chargewire_engine::{Backoff, Strategy};
use chargewire_protocol::{MsgToUI, NotifyKind, Phase, Subscription, ui::UiRx};
use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    time::{sleep, timeout},
};
use url::Url;

/// What the next connect attempt does.
enum Attempt {
    /// Refuse the connection.
    Refuse,
    /// Accept, and read frames from this channel.
    Accept(UnboundedReceiver<Result<Inbound>>),
}

/// Connector that follows a script and refuses once the script runs out.
#[derive(Default)]
struct ScriptedConnector {
    script: Mutex<VecDeque<Attempt>>,
    urls: Mutex<Vec<Url>>,
}

impl ScriptedConnector {
    /// Queue an accepted connection and return its frame feed.
    fn accept(&self) -> UnboundedSender<Result<Inbound>> {
        let (tx, rx) = unbounded_channel();
        self.script.lock().push_back(Attempt::Accept(rx));
        tx
    }

    fn refuse(&self) {
        self.script.lock().push_back(Attempt::Refuse);
    }

    fn attempts(&self) -> usize {
        self.urls.lock().len()
    }
}

struct ScriptedSocket {
    frames: UnboundedReceiver<Result<Inbound>>,
}

#[async_trait]
impl Socket for ScriptedSocket {
    async fn recv(&mut self) -> Result<Inbound> {
        match self.frames.recv().await {
            Some(item) => item,
            None => Ok(Inbound::Closed),
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>> {
        self.urls.lock().push(url.clone());
        let next = self.script.lock().pop_front();
        match next {
            Some(Attempt::Accept(frames)) => Ok(Box::new(ScriptedSocket { frames })),
            Some(Attempt::Refuse) | None => Err(Error::Transport("connection refused".into())),
        }
    }
}

const URL: &str = "ws://backend.test/api/v1/notifications/ws";

fn start(connector: &Arc<ScriptedConnector>, max_attempts: u32) -> (SessionHandle, UiRx) {
    Client::new(URL)
        .unwrap()
        .with_connector(connector.clone())
        .with_max_attempts(max_attempts)
        .with_backoff(Backoff {
            strategy: Strategy::Exponential,
            base: Duration::from_secs(1),
            ceiling: Duration::from_secs(30),
        })
        .spawn()
}

/// Let every runnable task go idle. Shorter than any retry delay.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

async fn wait_phase(session: &SessionHandle, want: Phase) {
    let mut rx = session.watch_phase();
    timeout(Duration::from_secs(600), rx.wait_for(|p| *p == want))
        .await
        .expect("phase reached in time")
        .expect("store alive");
}

fn drain(rx: &mut UiRx) -> (Vec<String>, Vec<(NotifyKind, String)>) {
    let mut keys = Vec::new();
    let mut notes = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        match msg {
            MsgToUI::Invalidate { key } => keys.push(key),
            MsgToUI::Notify { kind, text, .. } => notes.push((kind, text)),
        }
    }
    (keys, notes)
}

#[tokio::test(start_paused = true)]
async fn transaction_started_end_to_end() {
    let connector = Arc::new(ScriptedConnector::default());
    let feed = connector.accept();
    let (session, mut ui) = start(&connector, 10);
    assert_eq!(session.status(), Phase::Disconnected);

    session.enable().unwrap();
    wait_phase(&session, Phase::Connected).await;

    feed.send(Ok(Inbound::Text(
        r#"{"type":"ConnectionEstablished","data":{"client_id":"c1"}}"#.into(),
    )))
    .unwrap();
    feed.send(Ok(Inbound::Text(
        r#"{"type":"TransactionStarted","data":{"charge_point_id":"CP7","connector_id":2,"transaction_id":55}}"#.into(),
    )))
    .unwrap();
    settle().await;

    let events = session.latest(10);
    assert_eq!(events.len(), 1, "acknowledgement must not be recorded");
    assert_eq!(events[0].kind.as_str(), "transaction_started");
    assert_eq!(events[0].station_id, "CP7");

    let (keys, notes) = drain(&mut ui);
    assert_eq!(
        keys,
        [
            "transactions:all",
            "station:CP7",
            "station:CP7:connectors",
            "monitoring:stats"
        ]
    );
    assert_eq!(notes.len(), 1);
    assert!(notes[0].1.contains("CP7") && notes[0].1.contains("connector 2"));

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn enabling_twice_opens_one_socket() {
    let connector = Arc::new(ScriptedConnector::default());
    let _feed = connector.accept();
    let (session, _ui) = start(&connector, 10);
    session.enable().unwrap();
    session.enable().unwrap();
    wait_phase(&session, Phase::Connected).await;
    session.enable().unwrap();
    settle().await;
    assert_eq!(connector.attempts(), 1);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_stop_until_reconnect() {
    let connector = Arc::new(ScriptedConnector::default());
    let (session, _ui) = start(&connector, 3);
    session.enable().unwrap();

    // Initial attempt plus three retries at 1s, 2s and 4s.
    sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 4);
    assert_eq!(session.status(), Phase::Error);

    sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempts(), 4, "no retry after the ceiling");

    let _feed = connector.accept();
    session.reconnect().unwrap();
    wait_phase(&session, Phase::Connected).await;
    assert_eq!(connector.attempts(), 5);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn server_close_reconnects_after_delay() {
    let connector = Arc::new(ScriptedConnector::default());
    let first = connector.accept();
    let second = connector.accept();
    let (session, _ui) = start(&connector, 10);
    session.enable().unwrap();
    wait_phase(&session, Phase::Connected).await;

    first.send(Ok(Inbound::Closed)).unwrap();
    wait_phase(&session, Phase::Disconnected).await;
    assert_eq!(connector.attempts(), 1);

    wait_phase(&session, Phase::Connected).await;
    assert_eq!(connector.attempts(), 2);
    drop(second);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn transport_error_shows_error_phase_then_retries() {
    let connector = Arc::new(ScriptedConnector::default());
    let first = connector.accept();
    let _second = connector.accept();
    let (session, _ui) = start(&connector, 10);
    session.enable().unwrap();
    wait_phase(&session, Phase::Connected).await;

    first
        .send(Err(Error::Transport("connection reset".into())))
        .unwrap();
    wait_phase(&session, Phase::Error).await;
    wait_phase(&session, Phase::Connected).await;
    assert_eq!(connector.attempts(), 2);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn disable_ignores_signals_from_closed_socket() {
    let connector = Arc::new(ScriptedConnector::default());
    let feed = connector.accept();
    let (session, _ui) = start(&connector, 10);
    session.enable().unwrap();
    wait_phase(&session, Phase::Connected).await;

    session.disable().unwrap();
    wait_phase(&session, Phase::Disconnected).await;
    // The closed socket's task is gone, so these go nowhere.
    feed.send(Err(Error::Transport("late".into()))).ok();
    feed.send(Ok(Inbound::Closed)).ok();
    sleep(Duration::from_secs(120)).await;

    assert_eq!(connector.attempts(), 1);
    assert_eq!(session.status(), Phase::Disconnected);

    // Re-enabling starts a fresh attempt.
    connector.refuse();
    session.enable().unwrap();
    settle().await;
    assert_eq!(connector.attempts(), 2);
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped_without_phase_change() {
    let connector = Arc::new(ScriptedConnector::default());
    let feed = connector.accept();
    let (session, mut ui) = start(&connector, 10);
    session.enable().unwrap();
    wait_phase(&session, Phase::Connected).await;

    for raw in ["not json", "[]", r#"{"data":{}}"#] {
        feed.send(Ok(Inbound::Text(raw.into()))).unwrap();
    }
    feed.send(Ok(Inbound::Text(
        r#"{"type":"FirmwareStatusNotification","data":{"status":"Installed"}}"#.into(),
    )))
    .unwrap();
    settle().await;

    assert_eq!(session.status(), Phase::Connected);
    let events = session.latest(10);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind.as_str(), "firmware_status_notification");
    assert_eq!(drain(&mut ui), (vec![], vec![]));
    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn subscription_scope_reaches_the_connector() {
    let connector = Arc::new(ScriptedConnector::default());
    let _feed = connector.accept();
    let (session, _ui) = Client::new(URL)
        .unwrap()
        .with_connector(connector.clone())
        .with_subscription(Subscription::station("CP1"))
        .spawn();
    session.enable().unwrap();
    wait_phase(&session, Phase::Connected).await;
    let url = connector.urls.lock()[0].clone();
    assert_eq!(url.query(), Some("charge_point_id=CP1"));
    session.shutdown().await.unwrap();
}
