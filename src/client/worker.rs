//! Sender and receiver loops, and inbound packet dispatch.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::client::Shared;
use super::config::{DeliveryFailurePolicy, LogoutPolicy};
use super::event::ClientEvent;
use crate::core::REASON_TIMEOUT;
use crate::packet::{Ack, Login, Logout, Ping};
use crate::transport::{Endpoint, Envelope, TetherSocket, TransportError, TransportResult};

/// Receive datagrams until cancelled or the socket fails.
pub(crate) async fn run_receiver(
    shared: Arc<Shared>,
    socket: TetherSocket,
    cancel: CancellationToken,
) {
    let mut buf = socket.recv_buffer();

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((len, from)) => shared.on_datagram(&buf[..len], from),
            Err(err) => {
                if !cancel.is_cancelled() {
                    error!(error = %err, "socket receive failed");
                    shared.shutdown(&err.to_string());
                }
                break;
            }
        }
    }

    trace!("receiver loop stopped");
}

/// Drive timeouts, retransmissions, keepalives and the outbound queue until
/// cancelled or the socket fails.
pub(crate) async fn run_sender(
    shared: Arc<Shared>,
    socket: TetherSocket,
    cancel: CancellationToken,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
    timeout: Duration,
) {
    let mut buf = socket.send_buffer();
    let config = shared.config.clone();

    'run: while !cancel.is_cancelled() {
        let now = Instant::now();

        if shared.is_timed_out(now, timeout) {
            warn!(timeout_ms = timeout.as_millis() as u64, "connection timed out");
            shared.shutdown(REASON_TIMEOUT);
            break;
        }

        let sweep = shared.queue.sweep(
            now,
            config.resend_interval,
            config.max_retries,
            shared.session_id(),
        );
        for envelope in sweep.resend {
            debug!(
                sequence = envelope.sequence,
                retries = envelope.retries,
                "retransmitting"
            );
            if !shared.transmit(&socket, &mut buf, envelope).await {
                break 'run;
            }
        }
        for envelope in sweep.failed {
            let err = TransportError::DeliveryFailed {
                sequence: envelope.sequence,
                retries: envelope.retries,
            };
            warn!(packet_id = envelope.packet_id(), error = %err, "giving up on reliable packet");
            shared.emit(ClientEvent::DeliveryFailed(envelope));
            if config.delivery_failure_policy == DeliveryFailurePolicy::Disconnect {
                shared.shutdown(&err.to_string());
                break 'run;
            }
        }

        if let Some(interval) = config.keepalive_interval {
            if shared.needs_keepalive(now, interval) {
                let ping = Envelope::new(Ping).with_session(shared.session_id());
                if !shared.transmit(&socket, &mut buf, ping).await {
                    break;
                }
            }
        }

        while let Ok(envelope) = outbound.try_recv() {
            if !shared.transmit(&socket, &mut buf, envelope).await {
                break 'run;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            next = outbound.recv() => match next {
                Some(envelope) => {
                    if !shared.transmit(&socket, &mut buf, envelope).await {
                        break;
                    }
                }
                None => break,
            },
            _ = sleep(config.send_tick) => {}
        }
    }

    trace!("sender loop stopped");
}

impl Shared {
    fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.state.lock().is_timed_out(now, timeout)
    }

    fn needs_keepalive(&self, now: Instant, interval: Duration) -> bool {
        self.state.lock().needs_keepalive(now, interval)
    }

    /// Put one envelope on the wire.
    ///
    /// Returns `false` once the connection has been torn down by a socket
    /// error. Envelopes that cannot be framed or addressed are dropped.
    async fn transmit(&self, socket: &TetherSocket, buf: &mut BytesMut, envelope: Envelope) -> bool {
        match self.write_envelope(socket, buf, &envelope).await {
            Ok(len) => {
                let now = Instant::now();
                self.state.lock().on_sent(now);
                if envelope.is_reliable() {
                    self.queue.mark_sent(envelope.sequence, now);
                }
                trace!(
                    packet_id = envelope.packet_id(),
                    sequence = envelope.sequence,
                    len,
                    "sent"
                );
                self.emit(ClientEvent::PacketSent(envelope));
                true
            }
            Err(err) if err.is_silent_drop() => {
                debug!(packet_id = envelope.packet_id(), error = %err, "dropping outbound packet");
                true
            }
            Err(err) => {
                error!(error = %err, "socket send failed");
                let reason = match &err {
                    TransportError::Io(io) => io.to_string(),
                    other => other.to_string(),
                };
                self.shutdown(&reason);
                false
            }
        }
    }

    async fn write_envelope(
        &self,
        socket: &TetherSocket,
        buf: &mut BytesMut,
        envelope: &Envelope,
    ) -> TransportResult<usize> {
        let addr = match envelope.addr {
            Some(addr) => addr,
            None => self.remote().ok_or(TransportError::NoRemote)?,
        };
        buf.clear();
        envelope.encode_into(socket.mtu(), buf)?;
        Ok(socket.send_to(&buf[..], addr).await?)
    }

    /// Handle one inbound datagram.
    pub(crate) fn on_datagram(&self, data: &[u8], from: SocketAddr) {
        let now = Instant::now();
        self.state.lock().on_activity(now);
        let endpoint = self.endpoints.resolve_at(from, now);

        let decoded = match self.registry.decode(data) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(peer = %from, len = data.len(), error = %err, "dropping malformed datagram");
                return;
            }
        };
        self.dispatch(Envelope::from_decoded(decoded, from), endpoint, now);
    }

    fn dispatch(&self, envelope: Envelope, endpoint: Arc<Endpoint>, now: Instant) {
        let packet_id = envelope.packet_id();
        let accepted = self
            .state
            .lock()
            .accepts(packet_id, envelope.is_unconnected());
        if !accepted {
            debug!(peer = %endpoint, packet_id, "dropping connected-only packet before handshake");
            return;
        }

        trace!(peer = %endpoint, packet_id, sequence = envelope.sequence, "received");
        self.emit(ClientEvent::PacketReceived {
            envelope: envelope.clone(),
            endpoint: Arc::clone(&endpoint),
        });

        if envelope.packet.is::<Login>() {
            self.on_login(&envelope, &endpoint, now);
        } else if envelope.is_reliable() {
            self.acknowledge(&envelope, &endpoint, self.session_id());
        } else if envelope.packet.is::<Ack>() {
            self.on_ack(&envelope, now);
        } else if let Some(logout) = envelope.downcast_ref::<Logout>() {
            self.on_logout(logout, &endpoint);
        }
    }

    fn on_login(&self, login: &Envelope, peer: &Endpoint, now: Instant) {
        let (accepted, from_remote, session_id) = {
            let mut state = self.state.lock();
            let accepted = state.accept(peer.addr(), new_session_id(), now);
            (accepted, state.is_remote(peer.addr()), state.session_id)
        };

        if accepted {
            info!(peer = %peer, session_id, "connected");
            self.emit(ClientEvent::Connected { session_id });
        } else if from_remote {
            debug!(peer = %peer, sequence = login.sequence, "acknowledging repeated login");
        } else {
            debug!(peer = %peer, sequence = login.sequence, "ignoring login from another peer");
            return;
        }

        self.acknowledge(login, peer, session_id);
    }

    fn acknowledge(&self, envelope: &Envelope, peer: &Endpoint, session_id: u32) {
        let ack = Envelope::new(Ack)
            .to(peer.addr())
            .with_session(session_id)
            .with_sequence(envelope.sequence);
        if !self.enqueue(ack) {
            trace!(sequence = envelope.sequence, "ack dropped, loops stopped");
        }
    }

    fn on_ack(&self, ack: &Envelope, now: Instant) {
        let Some(acked) = self.queue.acknowledge(ack.sequence) else {
            trace!(sequence = ack.sequence, "ignoring unmatched ack");
            return;
        };
        debug!(
            sequence = acked.sequence,
            retries = acked.retries,
            "acknowledged"
        );
        let handshake = acked.packet.is::<Login>();
        self.emit(ClientEvent::PacketAcknowledged(acked));

        if handshake && self.state.lock().complete_handshake(ack.session_id, now) {
            info!(session_id = ack.session_id, "connected");
            self.emit(ClientEvent::Connected {
                session_id: ack.session_id,
            });
        }
    }

    fn on_logout(&self, logout: &Logout, peer: &Endpoint) {
        info!(peer = %peer, reason = %logout.reason, "peer logged out");
        if self.config.logout_policy == LogoutPolicy::Authoritative {
            self.shutdown(&logout.reason);
        }
    }
}

fn new_session_id() -> u32 {
    loop {
        let id = rand::random::<u32>();
        if id != 0 {
            return id;
        }
    }
}
