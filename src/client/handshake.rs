use crate::error::{Error, Result};
use crate::packet::{HandshakePacket, Packet, PacketId};
use crate::transport::Transport;
use crate::transports::PollingTransport;
use bytes::Bytes;
use native_tls::TlsConnector;
use reqwest::header::HeaderMap;
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::time::Duration;
use tracing::debug;
use tungstenite::Error as TungsteniteError;
use url::Url;

/// The stages of the upgrade handshake, in order. Parsing the URI and
/// building the base url happen before the state machine exists.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stage {
    /// Opening poll: the first packet must be `Open`.
    Opening,
    /// Message-connect post on the fresh session id.
    Connecting,
    /// Ping probe over the new transport, drained by a follow-up poll.
    Probing,
    /// Final poll draining the noop the server uses to flush polling.
    ClosingPoll,
    /// Upgrade packet sent, waiting for the confirming noop.
    Upgrading,
    /// Terminal success: pending packets get replayed, the session is live.
    Active,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Opening => "the opening poll",
            Stage::Connecting => "the connect message",
            Stage::Probing => "the upgrade probe",
            Stage::ClosingPoll => "the closing poll",
            Stage::Upgrading => "the upgrade",
            Stage::Active => "the active session",
        })
    }
}

/// Everything the handshake produces: the upgraded transport, the session
/// parameters, and the packets that arrived while we were still polling.
/// The pending packets must reach the caller's handler, in order, before
/// anything received over the new transport.
pub(crate) struct HandshakeOutcome<T: Transport> {
    pub transport: T,
    pub handshake: HandshakePacket,
    pub pending: Vec<Packet>,
}

/// Drives the strictly ordered open → probe → upgrade sequence over a
/// polling transport, then hands control to the persistent transport built
/// by the caller-supplied factory. Every wait is bounded; any failure aborts
/// the remaining stages and surfaces to the caller, nothing retries.
pub(crate) struct Handshake {
    base_url: Url,
    polling: PollingTransport,
    connect_stage: bool,
    timeout: Duration,
    stage: Stage,
}

impl Handshake {
    pub(crate) fn new(
        base_url: Url,
        tls_config: Option<TlsConnector>,
        headers: Option<HeaderMap>,
        connect_stage: bool,
        timeout: Duration,
    ) -> Self {
        let polling = PollingTransport::new(base_url.clone(), tls_config, headers);
        Handshake {
            base_url,
            polling,
            connect_stage,
            timeout,
            stage: Stage::Opening,
        }
    }

    pub(crate) fn run<T, F>(mut self, make_transport: F) -> Result<HandshakeOutcome<T>>
    where
        T: Transport,
        F: FnOnce(Url) -> Result<T>,
    {
        // Opening: the first packet of the first poll opens the session,
        // everything after it is application data that arrived early.
        self.stage = Stage::Opening;
        let payload = self.polling.open_poll(self.timeout)?;
        let mut packets = payload.into_iter();
        let open = match packets.next() {
            Some(packet) => packet?,
            None => return Err(self.unexpected("an open packet", "an empty payload")),
        };
        if open.packet_id != PacketId::Open {
            return Err(self.unexpected("an open packet", format!("{:?}", open.packet_id)));
        }
        let handshake = HandshakePacket::try_from(open)?;
        let pending = packets.collect::<Result<Vec<_>>>()?;

        if !handshake.websocket_upgrade_allowed() {
            return Err(Error::WebsocketUpgradeRefused());
        }

        debug!(sid = %handshake.sid, pending = pending.len(), "session opened");

        self.base_url
            .query_pairs_mut()
            .append_pair("sid", &handshake.sid);
        self.polling.set_base_url(self.base_url.clone())?;

        // once the server told us its timing, use it as the deadline for
        // every remaining wait
        let ping_timeout = Duration::from_millis(handshake.ping_timeout);

        // Connecting: some server versions expect a message-connect before
        // they accept the probe, so the stage is configurable.
        if self.connect_stage {
            self.stage = Stage::Connecting;
            self.polling.connect_message(ping_timeout)?;
            debug!("connect message accepted");
        }

        // Probing: ping the new transport, drain the noop the server flushes
        // to the polling channel, then the probe echo must come back.
        self.stage = Stage::Probing;
        let transport = make_transport(self.base_url.clone())?;
        transport.set_receive_timeout(Some(ping_timeout))?;
        transport.send(Packet::new(PacketId::Ping, "probe"))?;
        self.expect_single_noop(ping_timeout)?;

        let reply = self.receive_bounded(&transport)?;
        if reply.packet_id != PacketId::Pong || reply.data.as_ref() != b"probe" {
            return Err(self.unexpected("a pong echoing \"probe\"", format!("{reply:?}")));
        }

        // ClosingPoll: one last noop drains the polling channel before the
        // session leaves it for good.
        self.stage = Stage::ClosingPoll;
        self.expect_single_noop(ping_timeout)?;

        // Upgrading: after this confirmation the polling transport is done.
        self.stage = Stage::Upgrading;
        transport.send(Packet::new(PacketId::Upgrade, Bytes::new()))?;
        let confirmation = self.receive_bounded(&transport)?;
        if confirmation.packet_id != PacketId::Noop {
            return Err(self.unexpected(
                "a noop confirming the upgrade",
                format!("{:?}", confirmation.packet_id),
            ));
        }
        transport.set_receive_timeout(None)?;

        self.stage = Stage::Active;
        debug!(sid = %handshake.sid, "upgrade complete");

        Ok(HandshakeOutcome {
            transport,
            handshake,
            pending,
        })
    }

    /// Polls once and requires the payload to hold exactly one noop packet.
    fn expect_single_noop(&self, timeout: Duration) -> Result<()> {
        let payload = self.polling.poll(timeout)?;
        let mut packets = payload.into_iter();
        match packets.next() {
            Some(packet) => {
                let packet = packet?;
                if packet.packet_id != PacketId::Noop {
                    return Err(
                        self.unexpected("a noop packet", format!("{:?}", packet.packet_id))
                    );
                }
            }
            None => return Err(self.unexpected("a noop packet", "an empty payload")),
        }
        if packets.next().is_some() {
            return Err(self.unexpected("exactly one noop packet", "trailing packets"));
        }
        Ok(())
    }

    /// Receives from the persistent transport, turning a read that ran past
    /// its deadline into a handshake timeout for the current stage.
    fn receive_bounded<T: Transport>(&self, transport: &T) -> Result<Packet> {
        match transport.receive() {
            Err(Error::IncompleteIo(err)) if is_timeout(&err) => {
                Err(Error::HandshakeTimeout(self.stage))
            }
            Err(Error::WebsocketError(TungsteniteError::Io(err))) if is_timeout(&err) => {
                Err(Error::HandshakeTimeout(self.stage))
            }
            other => other,
        }
    }

    fn unexpected(&self, expected: &'static str, found: impl Into<String>) -> Error {
        Error::UnexpectedPacket {
            stage: self.stage,
            expected,
            found: found.into(),
        }
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
