//! Hub engine
//!
//! The hub is the single owner of client membership. It runs as one task
//! (`Hub::run`) and is reachable only through the queues held by a
//! [`HubHandle`]:
//! - the control queue: registrations and membership snapshots, each answered
//!   through a oneshot reply
//! - the broadcast queue: payloads to fan out to every member
//! - the deregistration queue: sessions to remove
//!
//! Concurrency and usage notes:
//! - Membership is mutated only inside `Hub::run`, so there is no lock around
//!   it. Each event is handled to completion before the next one is taken,
//!   which makes registration, removal and fan-out atomic with respect to
//!   each other.
//! - Fan-out never waits on a recipient. Every member has a bounded outbound
//!   queue; a member whose queue is full is evicted instead of stalling the
//!   rest. Eviction fires the member's eviction signal so the session's
//!   outbound pump closes the connection without writing out its stale
//!   backlog. A plain removal only drops the member's sender: whatever was
//!   already queued is still delivered before the pump closes.
//! - Deregistration is idempotent: removing an unknown session is a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::config::HubSettings;
use crate::hub::message::Payload;
use crate::utils::error::RelayError;

/// Process-unique session identity, for diagnostics only.
pub type SessionId = u64;

enum Control {
    Register {
        id: SessionId,
        outbound: mpsc::Sender<Payload>,
        evict: oneshot::Sender<()>,
        ack: oneshot::Sender<()>,
    },
    Members {
        reply: oneshot::Sender<Vec<SessionId>>,
    },
}

/// What a session gets back from registration: its identity, the receiving
/// end of its outbound queue, and the signal fired if the hub evicts it.
///
/// `evicted` resolves with `Ok(())` on eviction and with an error when the
/// session is removed any other way.
#[derive(Debug)]
pub struct Registration {
    pub id: SessionId,
    pub outbound: mpsc::Receiver<Payload>,
    pub evicted: oneshot::Receiver<()>,
}

#[derive(Debug)]
struct Member {
    outbound: mpsc::Sender<Payload>,
    evict: oneshot::Sender<()>,
}

#[derive(Debug)]
pub struct Hub {
    members: HashMap<SessionId, Member>,
    control_rx: mpsc::Receiver<Control>,
    broadcast_rx: mpsc::Receiver<Payload>,
    deregister_rx: mpsc::UnboundedReceiver<SessionId>,
}

/// Cloneable access to a running hub. Holds only queue senders; it never
/// sees membership.
#[derive(Debug, Clone)]
pub struct HubHandle {
    control_tx: mpsc::Sender<Control>,
    broadcast_tx: mpsc::Sender<Payload>,
    deregister_tx: mpsc::UnboundedSender<SessionId>,
    next_id: Arc<AtomicU64>,
    outbound_capacity: usize,
}

impl Hub {
    const CONTROL_CAPACITY: usize = 64;

    /// Create a hub and the handle used to reach it. The hub does nothing
    /// until [`Hub::run`] is spawned.
    pub fn new(settings: &HubSettings) -> (Self, HubHandle) {
        let (control_tx, control_rx) = mpsc::channel(Self::CONTROL_CAPACITY);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(settings.broadcast_capacity.max(1));
        let (deregister_tx, deregister_rx) = mpsc::unbounded_channel();

        let hub = Self {
            members: HashMap::new(),
            control_rx,
            broadcast_rx,
            deregister_rx,
        };
        let handle = HubHandle {
            control_tx,
            broadcast_tx,
            deregister_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            outbound_capacity: settings.outbound_capacity.max(1),
        };
        (hub, handle)
    }

    /// The control loop. Returns once every [`HubHandle`] is gone.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                // Removals first, so a dead session is never fanned out to.
                biased;
                Some(id) = self.deregister_rx.recv() => self.deregister(id),
                Some(control) = self.control_rx.recv() => self.control(control),
                Some(payload) = self.broadcast_rx.recv() => self.fan_out(payload),
                else => break,
            }
        }
        debug!("hub stopped");
    }

    fn deregister(&mut self, id: SessionId) {
        if self.members.remove(&id).is_some() {
            debug!(session = id, members = self.members.len(), "session deregistered");
        }
    }

    fn control(&mut self, control: Control) {
        match control {
            Control::Register {
                id,
                outbound,
                evict,
                ack,
            } => {
                self.members.insert(id, Member { outbound, evict });
                debug!(session = id, members = self.members.len(), "session registered");
                let _ = ack.send(());
            }
            Control::Members { reply } => {
                let mut ids: Vec<SessionId> = self.members.keys().copied().collect();
                ids.sort_unstable();
                let _ = reply.send(ids);
            }
        }
    }

    fn evict(&mut self, id: SessionId) {
        if let Some(member) = self.members.remove(&id) {
            // the session may already be on its way out
            let _ = member.evict.send(());
            debug!(session = id, members = self.members.len(), "session evicted");
        }
    }

    fn fan_out(&mut self, payload: Payload) {
        let mut slow = Vec::new();
        let mut gone = Vec::new();

        for (id, member) in &self.members {
            match member.outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(session = *id, "outbound queue full, disconnecting slow client");
                    slow.push(*id);
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }

        trace!(
            recipients = self.members.len() - slow.len() - gone.len(),
            bytes = payload.len(),
            "payload fanned out"
        );

        for id in slow {
            self.evict(id);
        }
        for id in gone {
            self.deregister(id);
        }
    }
}

impl HubHandle {
    /// Add a new session to the membership.
    ///
    /// Resolves only after the control loop has inserted the session, so a
    /// payload broadcast after this returns is guaranteed to reach it.
    pub async fn register(&self) -> Result<Registration, RelayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);
        let (evict_tx, evict_rx) = oneshot::channel();
        let (ack_tx, ack_rx) = oneshot::channel();

        self.control_tx
            .send(Control::Register {
                id,
                outbound: outbound_tx,
                evict: evict_tx,
                ack: ack_tx,
            })
            .await
            .map_err(|_| RelayError::HubUnavailable)?;
        ack_rx.await.map_err(|_| RelayError::HubUnavailable)?;

        Ok(Registration {
            id,
            outbound: outbound_rx,
            evicted: evict_rx,
        })
    }

    /// Queue a payload for every member. Waits while the broadcast queue is
    /// full.
    pub async fn broadcast(&self, payload: Payload) -> Result<(), RelayError> {
        self.broadcast_tx
            .send(payload)
            .await
            .map_err(|_| RelayError::HubUnavailable)
    }

    /// Queue a session for removal. Never waits; unknown ids are ignored by
    /// the hub.
    pub fn deregister(&self, id: SessionId) {
        // A stopped hub has no membership left to clean up.
        let _ = self.deregister_tx.send(id);
    }

    /// Snapshot of the current membership, sorted by id.
    pub async fn members(&self) -> Result<Vec<SessionId>, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(Control::Members { reply: reply_tx })
            .await
            .map_err(|_| RelayError::HubUnavailable)?;
        reply_rx.await.map_err(|_| RelayError::HubUnavailable)
    }
}
