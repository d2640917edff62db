//! Connection driver: owns at most one push-channel socket at a time.
//!
//! Each socket runs in its own task and reports back through a channel as
//! [`DriverEvent`]s tagged with the [`HandleId`] it was opened under. Closing a
//! handle cancels its task; from then on nothing more is reported for it.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chargewire_engine::HandleId;
use futures::StreamExt;
use tokio::{
    net::TcpStream,
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::Result;

/// Upper bound on a graceful close handshake.
const CLOSE_TIMEOUT_MS: u64 = 1000;

/// One item read from a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// The peer closed the socket, or the stream ended.
    Closed,
}

/// An open push-channel socket.
#[async_trait]
pub trait Socket: Send {
    /// Wait for the next frame. Transport failures are returned as errors.
    async fn recv(&mut self) -> Result<Inbound>;

    /// Start a graceful close.
    async fn close(&mut self) -> Result<()>;
}

/// Opens sockets. The seam between the driver and the network.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `url`.
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>>;
}

/// [`Connector`] over tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>> {
        let (stream, _response) = connect_async(url.as_str()).await?;
        Ok(Box::new(WsSocket { stream }))
    }
}

/// A tokio-tungstenite client stream.
struct WsSocket {
    /// The underlying stream.
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Socket for WsSocket {
    async fn recv(&mut self) -> Result<Inbound> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Inbound::Text(text)),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Inbound::Text(text)),
                    Err(_) => trace!(len = data.len(), "ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "peer closed socket");
                    return Ok(Inbound::Closed);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(Inbound::Closed),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        // Drain until the peer acknowledges.
        while let Some(Ok(_)) = self.stream.next().await {}
        Ok(())
    }
}

/// Low-level socket signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSignal {
    /// The socket is open.
    Open,
    /// A text frame arrived.
    Message(String),
    /// A transport error; always followed by [`DriverSignal::Close`].
    Error(String),
    /// The socket is gone.
    Close,
}

/// A signal from the socket opened under `handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverEvent {
    /// Which socket.
    pub handle: HandleId,
    /// What happened.
    pub signal: DriverSignal,
}

/// The socket task currently owned by the driver.
struct Live {
    /// Handle the task reports under.
    handle: HandleId,
    /// Cancels the task.
    cancel: CancellationToken,
    /// The task itself.
    task: JoinHandle<()>,
}

/// Owns at most one live socket and reports its signals to `events`.
pub struct Driver {
    /// Opens sockets.
    connector: Arc<dyn Connector>,
    /// Where socket tasks report.
    events: UnboundedSender<DriverEvent>,
    /// The live socket task, if any.
    live: Option<Live>,
    /// Last handle id handed out.
    last_handle: u64,
}

impl Driver {
    /// Create a driver that reports socket signals to `events`.
    pub fn new(connector: Arc<dyn Connector>, events: UnboundedSender<DriverEvent>) -> Self {
        Self {
            connector,
            events,
            live: None,
            last_handle: 0,
        }
    }

    /// Handle of the live socket, if one is connecting or open.
    pub fn live(&self) -> Option<HandleId> {
        self.live
            .as_ref()
            .filter(|l| !l.task.is_finished())
            .map(|l| l.handle)
    }

    /// Open a socket to `url`. While a socket is connecting or open this is a
    /// no-op that returns the existing handle.
    pub fn open(&mut self, url: &Url) -> HandleId {
        if let Some(handle) = self.live() {
            debug!(handle = handle.0, "socket already live");
            return handle;
        }
        self.last_handle += 1;
        let handle = HandleId(self.last_handle);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_socket(
            self.connector.clone(),
            url.clone(),
            handle,
            cancel.clone(),
            self.events.clone(),
        ));
        debug!(handle = handle.0, url = %url, "opening socket");
        self.live = Some(Live {
            handle,
            cancel,
            task,
        });
        handle
    }

    /// Close the socket opened under `handle` and suppress anything it would
    /// still report. Unknown or already closed handles are ignored.
    pub fn close(&mut self, handle: HandleId) {
        match self.live.take() {
            Some(live) if live.handle == handle => {
                debug!(handle = handle.0, "closing socket");
                live.cancel.cancel();
            }
            other => self.live = other,
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.cancel.cancel();
        }
    }
}

/// Body of one socket task.
async fn run_socket(
    connector: Arc<dyn Connector>,
    url: Url,
    handle: HandleId,
    cancel: CancellationToken,
    events: UnboundedSender<DriverEvent>,
) {
    let emit = |signal: DriverSignal| {
        if cancel.is_cancelled() {
            trace!(handle = handle.0, ?signal, "suppressed signal from closed handle");
            return;
        }
        // The session owns the receiver; if it is gone there is nobody to tell.
        events.send(DriverEvent { handle, signal }).ok();
    };

    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        r = connector.connect(&url) => r,
    };
    let mut socket = match connected {
        Ok(socket) => socket,
        Err(e) => {
            emit(DriverSignal::Error(e.to_string()));
            emit(DriverSignal::Close);
            return;
        }
    };
    emit(DriverSignal::Open);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                match timeout(Duration::from_millis(CLOSE_TIMEOUT_MS), socket.close()).await {
                    Ok(Ok(())) => trace!(handle = handle.0, "socket closed"),
                    Ok(Err(e)) => debug!(handle = handle.0, error = %e, "close failed"),
                    Err(_) => debug!(handle = handle.0, "close timed out"),
                }
                return;
            }
            r = socket.recv() => match r {
                Ok(Inbound::Text(text)) => emit(DriverSignal::Message(text)),
                Ok(Inbound::Closed) => {
                    emit(DriverSignal::Close);
                    return;
                }
                Err(e) => {
                    emit(DriverSignal::Error(e.to_string()));
                    emit(DriverSignal::Close);
                    return;
                }
            }
        }
    }
}
