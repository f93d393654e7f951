use anyhow::{anyhow, bail, Context, Result};
use futures::{SinkExt, StreamExt};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::Connector;
use tracing::{debug, error, info, warn};

use super::{FrameKind, Transport, TransportErrorKind, TransportEvent, TransportHandle};

/// Capacity of the outbound frame channel into the pump task.
const OUT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the lifecycle event channel toward the session.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// WebSocket transport over tokio-tungstenite.
///
/// Each connection is split into a sink/stream pair driven by a single pump
/// task: outbound frames arrive over an mpsc channel, inbound messages and
/// connection failures are surfaced as ordered [`TransportEvent`]s.
pub struct WsTransport {
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl WsTransport {
    /// Build the transport. When `ca_cert` is given, the PEM bundle becomes
    /// the only trusted root (self-signed server deployments); otherwise the
    /// platform's native roots are used for wss URIs.
    pub fn new(ca_cert: Option<&Path>) -> Result<Self> {
        let tls = match ca_cert {
            Some(path) => Some(Arc::new(client_tls_config(path)?)),
            None => None,
        };

        Ok(Self { tls })
    }
}

/// Load a PEM CA bundle into a rustls client config trusting only it.
fn client_tls_config(path: &Path) -> Result<rustls::ClientConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CA bundle {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut store = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.context("Failed to parse CA certificate")?;
        store
            .add(cert)
            .context("Failed to add CA certificate to root store")?;
    }

    if store.is_empty() {
        bail!("CA bundle {} holds no certificates", path.display());
    }

    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(store)
        .with_no_client_auth())
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        uri: &str,
    ) -> Result<(Arc<dyn TransportHandle>, mpsc::Receiver<TransportEvent>)> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let _ = event_tx.send(TransportEvent::BeforeConnect).await;

        let connector = self.tls.clone().map(Connector::Rustls);

        let (stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(uri, None, false, connector)
                .await
                .with_context(|| format!("WebSocket connect to {uri} failed"))?;

        info!("Connected to {uri}");

        let _ = event_tx.send(TransportEvent::Begin).await;
        let _ = event_tx.send(TransportEvent::Connected).await;

        let (sink, stream) = stream.split();
        let (out_tx, out_rx) = mpsc::channel(OUT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(pump(sink, stream, out_rx, event_tx, Arc::clone(&connected)));

        let handle = Arc::new(WsHandle { out_tx, connected });

        Ok((handle, event_rx))
    }
}

enum Outbound {
    Frame {
        payload: Vec<u8>,
        kind: FrameKind,
        done: oneshot::Sender<Result<usize>>,
    },
    Close,
}

struct WsHandle {
    out_tx: mpsc::Sender<Outbound>,
    connected: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl TransportHandle for WsHandle {
    async fn send(&self, payload: &[u8], kind: FrameKind) -> Result<usize> {
        if !self.is_connected() {
            bail!("connection is down");
        }

        let (done, done_rx) = oneshot::channel();
        self.out_tx
            .send(Outbound::Frame {
                payload: payload.to_vec(),
                kind,
                done,
            })
            .await
            .map_err(|_| anyhow!("connection pump has shut down"))?;

        done_rx
            .await
            .map_err(|_| anyhow!("send dropped by connection pump"))?
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.out_tx.send(Outbound::Close).await;
    }
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream = futures::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

async fn pump(
    mut sink: WsSink,
    mut stream: WsStream,
    mut out_rx: mpsc::Receiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Frame { payload, kind, done }) => {
                    let len = payload.len();
                    let message = match kind {
                        FrameKind::Binary => Message::Binary(payload),
                        FrameKind::Text => match String::from_utf8(payload) {
                            Ok(text) => Message::Text(text),
                            Err(e) => {
                                let _ = done.send(Err(anyhow!("text frame is not UTF-8: {e}")));
                                continue;
                            }
                        },
                    };

                    match sink.send(message).await {
                        Ok(()) => {
                            let _ = done.send(Ok(len));
                        }
                        Err(e) => {
                            error!("WebSocket send failed: {e}");
                            let kind = classify(&e);
                            let _ = done.send(Err(anyhow!("websocket send failed: {e}")));
                            let _ = events.send(TransportEvent::Error(kind)).await;
                            break;
                        }
                    }
                }
                Some(Outbound::Close) => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = events.send(TransportEvent::Closed).await;
                    break;
                }
                None => break,
            },

            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Data(text.into_bytes())).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(TransportEvent::Data(data)).await;
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = sink.send(Message::Pong(payload)).await {
                        warn!("Failed to answer ping: {e}");
                        let _ = events.send(TransportEvent::Error(classify(&e))).await;
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("WebSocket closed by server");
                    let _ = events.send(TransportEvent::Closed).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error: {e}");
                    let _ = events.send(TransportEvent::Error(classify(&e))).await;
                    break;
                }
                None => {
                    let _ = events.send(TransportEvent::Disconnected).await;
                    break;
                }
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
    let _ = events.send(TransportEvent::Finish).await;
    debug!("WebSocket pump ended");
}

/// TLS and protocol violations require a full teardown; everything else is
/// worth retrying on the same reconnect path.
fn classify(e: &tungstenite::Error) -> TransportErrorKind {
    match e {
        tungstenite::Error::Tls(_) | tungstenite::Error::Protocol(_) => TransportErrorKind::Fatal,
        _ => TransportErrorKind::Transient,
    }
}
