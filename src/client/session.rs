use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};
use tungstenite::Bytes;
use tungstenite::Error as WsError;
use tungstenite::protocol::Message as WsMessage;

use crate::config::Liveness;
use crate::hub::{HubHandle, Payload, Registration, SessionId};
use crate::utils::error::{Disconnect, RelayError};

/// A registered connection and the two tasks pumping it.
///
/// Dropping the value detaches the pumps; they keep running until the
/// connection ends.
#[derive(Debug)]
pub struct ClientSession {
    pub id: SessionId,
    inbound: JoinHandle<Disconnect>,
    outbound: JoinHandle<Disconnect>,
}

impl ClientSession {
    /// Register the connection with the hub, then start both pumps.
    ///
    /// Registration completes before either pump runs, so nothing broadcast
    /// after this returns can miss the session.
    pub async fn start<S>(
        hub: &HubHandle,
        ws: WebSocketStream<S>,
        liveness: Liveness,
    ) -> Result<Self, RelayError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let registration = hub.register().await?;
        let id = registration.id;
        let (writer, reader) = ws.split();

        let (seen_tx, seen_rx) = watch::channel(Instant::now());
        let (done_tx, done_rx) = oneshot::channel();

        let outbound = tokio::spawn(outbound_pump(
            writer,
            registration,
            hub.clone(),
            seen_rx,
            liveness,
            done_tx,
        ));
        let inbound = tokio::spawn(inbound_pump(id, reader, hub.clone(), seen_tx, done_rx));

        Ok(Self {
            id,
            inbound,
            outbound,
        })
    }

    /// Wait for both pumps to finish; yields (inbound, outbound) exit reasons.
    /// A pump that panicked or was cancelled yields its `JoinError`.
    pub async fn finished(
        self,
    ) -> (
        Result<Disconnect, JoinError>,
        Result<Disconnect, JoinError>,
    ) {
        let inbound = join_pump(self.id, "inbound", self.inbound).await;
        let outbound = join_pump(self.id, "outbound", self.outbound).await;
        (inbound, outbound)
    }
}

pub(crate) async fn join_pump(
    id: SessionId,
    pump: &'static str,
    handle: JoinHandle<Disconnect>,
) -> Result<Disconnect, JoinError> {
    handle.await.inspect_err(|err| {
        warn!(session = id, pump, error = %err, "pump task did not finish cleanly");
    })
}

/// Forward every data frame from the peer to the hub until the connection
/// ends or the outbound pump gives up.
pub async fn inbound_pump<R>(
    id: SessionId,
    mut reader: R,
    hub: HubHandle,
    seen: watch::Sender<Instant>,
    mut outbound_done: oneshot::Receiver<()>,
) -> Disconnect
where
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let reason = loop {
        tokio::select! {
            _ = &mut outbound_done => break Disconnect::SiblingFinished,
            frame = reader.next() => match frame {
                None => break Disconnect::Hangup,
                Some(Err(err)) => break Disconnect::ReceiveFailed(err),
                Some(Ok(WsMessage::Close(frame))) => break Disconnect::Closed(frame),
                Some(Ok(msg)) => {
                    seen.send_replace(Instant::now());
                    if let Some(payload) = Payload::from_ws(msg) {
                        if hub.broadcast(payload).await.is_err() {
                            break Disconnect::HubUnavailable;
                        }
                    }
                }
            },
        }
    };

    hub.deregister(id);
    log_disconnect(id, "inbound", &reason);
    reason
}

/// Write hub output to the peer in queue order and probe liveness. The only
/// place the connection is closed.
///
/// A ping counts as answered once any frame arrives after it; the session is
/// dropped when the oldest unanswered ping is `pong_timeout` old. Eviction
/// closes the connection at once, skipping whatever is still queued.
pub async fn outbound_pump<W>(
    mut writer: W,
    registration: Registration,
    hub: HubHandle,
    seen: watch::Receiver<Instant>,
    liveness: Liveness,
    done: oneshot::Sender<()>,
) -> Disconnect
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    let probing = !liveness.ping_interval.is_zero();
    let period = if probing {
        liveness.ping_interval
    } else {
        Duration::from_secs(3600)
    };
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let Registration {
        id,
        mut outbound,
        mut evicted,
    } = registration;
    let mut eviction_pending = true;
    let mut unanswered_ping: Option<Instant> = None;

    let reason = loop {
        let pong_deadline = unanswered_ping
            .map_or_else(Instant::now, |sent| sent + liveness.pong_timeout);

        tokio::select! {
            biased;
            signal = &mut evicted, if eviction_pending => match signal {
                Ok(()) => break Disconnect::Evicted,
                // removed without eviction: deliver what is already queued
                Err(_) => eviction_pending = false,
            },
            next = outbound.recv() => match next {
                Some(payload) => {
                    if let Err(reason) = send_frame(&mut writer, payload.into_ws(), liveness.write_timeout).await {
                        break reason;
                    }
                }
                None => break Disconnect::Released,
            },
            _ = time::sleep_until(pong_deadline), if unanswered_ping.is_some() => {
                if let Some(sent) = unanswered_ping.take() {
                    if *seen.borrow() < sent {
                        break Disconnect::LivenessTimeout(sent.elapsed());
                    }
                }
            }
            _ = ticker.tick(), if probing => {
                if unanswered_ping.is_some_and(|sent| *seen.borrow() >= sent) {
                    unanswered_ping = None;
                }
                let sent = Instant::now();
                if let Err(reason) = send_frame(&mut writer, WsMessage::Ping(Bytes::new()), liveness.write_timeout).await {
                    break reason;
                }
                unanswered_ping.get_or_insert(sent);
            }
        }
    };

    drop(ticker);
    drop(done);
    hub.deregister(id);

    match time::timeout(liveness.write_timeout, writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(session = id, error = %err, "close handshake failed"),
        Err(_) => debug!(session = id, "close handshake timed out"),
    }

    log_disconnect(id, "outbound", &reason);
    reason
}

async fn send_frame<W>(writer: &mut W, msg: WsMessage, limit: Duration) -> Result<(), Disconnect>
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    match time::timeout(limit, writer.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(Disconnect::SendFailed(err)),
        Err(_) => Err(Disconnect::WriteTimeout(limit)),
    }
}

fn log_disconnect(id: SessionId, pump: &'static str, reason: &Disconnect) {
    if reason.is_expected() {
        debug!(session = id, pump, %reason, "session ended");
    } else {
        warn!(session = id, pump, error = %reason, "unexpected disconnect");
    }
}
