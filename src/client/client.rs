use crate::callback::OptionalCallback;
use crate::error::{Error, Result};
use crate::packet::{HandshakePacket, Packet, PacketId};
use crate::transport::Transport;
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A live `engine.io` session, already upgraded onto its persistent
/// transport. Only the handshake constructs this type, so a `Client` in the
/// caller's hands is never half connected.
///
/// ## Note:
/// There is no need to put this Client behind an `Arc`, as the type uses `Arc`
/// internally and provides a shared state beyond all cloned instances.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    handshake: Arc<HandshakePacket>,
    connected: Arc<AtomicBool>,
    on_close: OptionalCallback<()>,
    on_data: OptionalCallback<Bytes>,
    on_error: OptionalCallback<String>,
    on_open: OptionalCallback<()>,
    on_packet: OptionalCallback<Packet>,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        handshake: HandshakePacket,
        on_close: OptionalCallback<()>,
        on_data: OptionalCallback<Bytes>,
        on_error: OptionalCallback<String>,
        on_open: OptionalCallback<()>,
        on_packet: OptionalCallback<Packet>,
    ) -> Self {
        Client {
            transport,
            handshake: Arc::new(handshake),
            connected: Arc::new(AtomicBool::default()),
            on_close,
            on_data,
            on_error,
            on_open,
            on_packet,
        }
    }

    /// Marks the session live, fires the connection event and replays the
    /// packets that arrived while the handshake was still polling, in their
    /// original order. Anything received over the persistent transport is
    /// only ever delivered after this returns.
    pub(crate) fn activate(&self, pending: Vec<Packet>) -> Result<()> {
        self.connected.store(true, Ordering::Release);

        if let Some(on_open) = self.on_open.as_ref() {
            spawn_scoped!(on_open(()));
        }

        for packet in pending {
            self.dispatch(packet)?;
        }

        Ok(())
    }

    /// Sends a packet to the server.
    pub fn emit(&self, packet: Packet) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            let error = Error::IllegalActionBeforeOpen();
            self.call_error_callback(format!("{error}"));
            return Err(error);
        }

        if let Err(error) = self.transport.send(packet) {
            self.call_error_callback(error.to_string());
            return Err(error);
        }

        Ok(())
    }

    /// Receives the next packet and runs the appropriate callbacks. Returns
    /// `None` once the session is disconnected.
    pub fn poll(&self) -> Result<Option<Packet>> {
        if !self.connected.load(Ordering::Acquire) {
            return Ok(None);
        }

        let packet = self.transport.receive()?;
        self.dispatch(packet.clone())?;
        Ok(Some(packet))
    }

    /// Closes the session.
    pub fn disconnect(&self) -> Result<()> {
        if let Some(on_close) = self.on_close.as_ref() {
            spawn_scoped!(on_close(()));
        }

        // will not succeed when the connection to the server is interrupted
        let _ = self.transport.send(Packet::new(PacketId::Close, Bytes::new()));
        let _ = self.transport.close();

        self.connected.store(false, Ordering::Release);

        Ok(())
    }

    /// Check if the underlying transport client is connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The session id the server assigned during the handshake.
    pub fn sid(&self) -> &str {
        &self.handshake.sid
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.handshake.ping_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake.ping_timeout)
    }

    pub fn iter(&self) -> Iter {
        Iter { socket: self }
    }

    fn dispatch(&self, packet: Packet) -> Result<()> {
        if let Some(on_packet) = self.on_packet.as_ref() {
            spawn_scoped!(on_packet(packet.clone()));
        }

        match packet.packet_id {
            PacketId::Message => {
                if let Some(on_data) = self.on_data.as_ref() {
                    spawn_scoped!(on_data(packet.data));
                }
            }
            PacketId::Close => {
                if let Some(on_close) = self.on_close.as_ref() {
                    spawn_scoped!(on_close(()));
                }
                self.connected.store(false, Ordering::Release);
            }
            PacketId::Ping => {
                self.emit(Packet::new(PacketId::Pong, packet.data))?;
            }
            // the handshake consumed these, anything else is server noise
            PacketId::Open | PacketId::Pong | PacketId::Upgrade => {
                warn!(packet = ?packet.packet_id, "ignoring unexpected control packet");
            }
            PacketId::Noop => (),
        }
        Ok(())
    }

    /// Calls the error callback with a given message.
    #[inline]
    fn call_error_callback(&self, text: String) {
        if let Some(function) = self.on_error.as_ref() {
            spawn_scoped!(function(text));
        }
    }
}

impl Debug for Client {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "Client(sid: {:?}, connected: {:?}, on_error: {:?}, on_open: {:?}, on_close: {:?}, on_packet: {:?}, on_data: {:?})",
            self.handshake.sid,
            self.connected,
            self.on_error,
            self.on_open,
            self.on_close,
            self.on_packet,
            self.on_data,
        ))
    }
}

#[derive(Clone)]
pub struct Iter<'a> {
    socket: &'a Client,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Packet>;
    fn next(&mut self) -> std::option::Option<<Self as std::iter::Iterator>::Item> {
        match self.socket.poll() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::test::MockTransport;
    use std::sync::Mutex;

    fn handshake() -> HandshakePacket {
        HandshakePacket {
            sid: "abc".to_owned(),
            upgrades: vec!["websocket".to_owned()],
            ping_interval: 25000,
            ping_timeout: 20000,
        }
    }

    fn client(transport: MockTransport, on_data: OptionalCallback<Bytes>) -> Client {
        Client::new(
            Arc::new(transport),
            handshake(),
            OptionalCallback::default(),
            on_data,
            OptionalCallback::default(),
            OptionalCallback::default(),
            OptionalCallback::default(),
        )
    }

    #[test]
    fn test_pending_replay_precedes_transport_packets() -> Result<()> {
        let received: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorder = received.clone();

        let transport = MockTransport::with_incoming(vec![Packet::new(PacketId::Message, "c")]);
        let sut = client(
            transport,
            OptionalCallback::new(move |data: Bytes| {
                recorder
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&data).into_owned());
            }),
        );

        sut.activate(vec![
            Packet::new(PacketId::Message, "a"),
            Packet::new(PacketId::Message, "b"),
        ])?;
        sut.poll()?;

        assert_eq!(*received.lock().unwrap(), vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn test_ping_is_answered_with_pong() -> Result<()> {
        let transport =
            MockTransport::with_incoming(vec![Packet::new(PacketId::Ping, Bytes::new())]);
        let sut = client(transport.clone(), OptionalCallback::default());

        sut.activate(vec![])?;
        sut.poll()?;

        assert_eq!(
            transport.sent(),
            vec![Packet::new(PacketId::Pong, Bytes::new())]
        );
        Ok(())
    }

    #[test]
    fn test_illegal_actions() {
        let sut = client(MockTransport::default(), OptionalCallback::default());

        // not activated yet
        let error = sut
            .emit(Packet::new(PacketId::Message, "too early"))
            .expect_err("error");
        assert!(matches!(error, Error::IllegalActionBeforeOpen()));
    }

    #[test]
    fn test_close_packet_disconnects() -> Result<()> {
        let transport =
            MockTransport::with_incoming(vec![Packet::new(PacketId::Close, Bytes::new())]);
        let sut = client(transport, OptionalCallback::default());

        sut.activate(vec![])?;
        assert!(sut.is_connected());

        sut.poll()?;
        assert!(!sut.is_connected());
        assert_eq!(sut.poll()?, None);
        Ok(())
    }

    #[test]
    fn test_disconnect_closes_the_transport() -> Result<()> {
        let transport = MockTransport::default();
        let sut = client(transport.clone(), OptionalCallback::default());

        sut.activate(vec![])?;
        sut.disconnect()?;

        assert!(transport.is_closed());
        assert!(!sut.is_connected());
        Ok(())
    }

    #[test]
    fn test_accessors() {
        let sut = client(MockTransport::default(), OptionalCallback::default());
        assert_eq!(sut.sid(), "abc");
        assert_eq!(sut.ping_interval(), Duration::from_secs(25));
        assert_eq!(sut.ping_timeout(), Duration::from_secs(20));
    }
}
