//! Tail loop and line rendering for the operator console.

use chargewire_client::{Client, SessionHandle};
use chargewire_engine::describe;
use chargewire_protocol::{Event, MsgToUI, NotifyKind, Phase, Subscription, ui::UiRx};
use tokio::{
    signal,
    sync::{
        mpsc::{UnboundedReceiver, unbounded_channel},
        watch,
    },
};
use tracing::{info, warn};

use crate::error::Result;

/// One feed line: time, kind, station and description.
pub fn event_line(event: &Event) -> String {
    let station = if event.station_id.is_empty() {
        "-"
    } else {
        event.station_id.as_str()
    };
    format!(
        "{} event  {:<28} {:<10} {}",
        event.timestamp,
        event.kind.as_str(),
        station,
        describe(event)
    )
}

/// One line for an invalidation or a notification.
pub fn ui_line(msg: &MsgToUI) -> String {
    match msg {
        MsgToUI::Invalidate { key } => format!("stale  {key}"),
        MsgToUI::Notify { kind, title, text } => {
            format!("{:<6} {title}: {text}", notify_label(*kind))
        }
    }
}

/// Short label for a notification severity.
fn notify_label(kind: NotifyKind) -> &'static str {
    match kind {
        NotifyKind::Info => "info",
        NotifyKind::Warn => "warn",
        NotifyKind::Error => "error",
        NotifyKind::Success => "ok",
    }
}

/// One line for a phase change.
pub fn phase_line(phase: Phase) -> String {
    format!("phase  {phase}")
}

/// Connect and print everything the session produces until Ctrl-C.
pub async fn tail(client: Client) -> Result<()> {
    info!(url = %client.url(), "connecting");
    let (session, mut ui) = client.spawn();

    let (events_tx, mut events) = unbounded_channel();
    session.observe(Subscription::all(), move |event: &Event| {
        // The receiver only goes away at shutdown.
        events_tx.send(event.clone()).ok();
    });

    session.enable()?;
    let result = pump(&session, &mut ui, &mut events).await;
    session.shutdown().await?;
    drain(&mut ui);
    result
}

/// Print until Ctrl-C.
async fn pump(
    session: &SessionHandle,
    ui: &mut UiRx,
    events: &mut UnboundedReceiver<Event>,
) -> Result<()> {
    let mut phase = session.watch_phase();
    println!("{}", phase_line(*phase.borrow_and_update()));
    loop {
        tokio::select! {
            biased;
            res = signal::ctrl_c() => {
                res?;
                info!("interrupted, disconnecting");
                return Ok(());
            }
            line = next_line(events, ui, &mut phase) => match line {
                Some(line) => println!("{line}"),
                None => {
                    warn!("status store dropped");
                    return Ok(());
                }
            }
        }
    }
}

/// Next console line. Events come before the invalidations and
/// notifications they caused, since dispatch sends them in that order.
/// `None` once the status store is gone.
async fn next_line(
    events: &mut UnboundedReceiver<Event>,
    ui: &mut UiRx,
    phase: &mut watch::Receiver<Phase>,
) -> Option<String> {
    tokio::select! {
        biased;
        Some(event) = events.recv() => Some(event_line(&event)),
        Some(msg) = ui.recv() => Some(ui_line(&msg)),
        changed = phase.changed() => match changed {
            Ok(()) => Some(phase_line(*phase.borrow_and_update())),
            Err(_) => None,
        },
    }
}

/// Print whatever the session emitted while shutting down.
fn drain(ui: &mut UiRx) {
    while let Ok(msg) = ui.try_recv() {
        println!("{}", ui_line(&msg));
    }
}
