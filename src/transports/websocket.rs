use crate::error::{Error, Result};
use crate::packet::{Packet, PacketId};
use crate::transport::Transport;
use bytes::Bytes;
use native_tls::TlsConnector;
use reqwest::header::HeaderMap;
use std::convert::TryFrom;
use std::net::{SocketAddr, TcpStream};
use std::str::from_utf8;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tungstenite::client::IntoClientRequest;
use tungstenite::connect;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Connector::NativeTls;
use tungstenite::{client_tls_with_config, Message, WebSocket};
use url::Url;

/// The persistent transport the session upgrades onto: a synchronous
/// websocket carrying one `engine.io` packet per text frame.
#[derive(Clone)]
pub struct WebsocketTransport {
    client: Arc<Mutex<WebSocket<MaybeTlsStream<TcpStream>>>>,
    base_url: Arc<RwLock<Url>>,
}

impl WebsocketTransport {
    /// Connects a websocket to the given http(s) base url. The scheme is
    /// swapped to `ws`/`wss` and `transport=websocket` appended.
    pub fn new(
        base_url: Url,
        tls_config: Option<TlsConnector>,
        headers: Option<HeaderMap>,
    ) -> Result<Self> {
        let url = websocket_url(base_url);

        let mut request = url.clone().into_client_request()?;
        if let Some(map) = headers {
            request.headers_mut().extend(map);
        }

        let (client, _) = match tls_config {
            None => connect(request)?,
            Some(connector) => {
                let stream = TcpStream::connect(first_address(url.socket_addrs(|| None)?, &url)?)?;
                match client_tls_with_config(request, stream, None, Some(NativeTls(connector))) {
                    Ok(websocket) => Ok(websocket),
                    Err(err) => Err(Error::InvalidHandshake(err.to_string())),
                }?
            }
        };

        Ok(WebsocketTransport {
            client: Arc::new(Mutex::new(client)),
            base_url: Arc::new(RwLock::new(url)),
        })
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(self.base_url.read()?.clone())
    }
}

/// Rewrites an http(s) base url into the websocket address for the same
/// session: `ws(s)` scheme, `transport=websocket` query parameter.
fn websocket_url(base_url: Url) -> Url {
    let mut url = base_url;
    match url.scheme() {
        "http" => url.set_scheme("ws").unwrap(),
        "https" => url.set_scheme("wss").unwrap(),
        _ => (),
    };
    if !url
        .query_pairs()
        .any(|(k, v)| k == "transport" && v == "websocket")
    {
        url.query_pairs_mut().append_pair("transport", "websocket");
    }
    url
}

/// Picks the address to dial out of a resolution result, which may be empty.
fn first_address(addresses: Vec<SocketAddr>, url: &Url) -> Result<SocketAddr> {
    addresses
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidHandshake(format!("no socket address for {url}")))
}

impl Transport for WebsocketTransport {
    fn send(&self, packet: Packet) -> Result<()> {
        let encoded = Bytes::from(packet);
        let text = from_utf8(&encoded)?.to_owned();

        let mut client = self.client.lock()?;
        client.send(Message::text(text))?;

        Ok(())
    }

    fn receive(&self) -> Result<Packet> {
        let mut client = self.client.lock()?;

        loop {
            let message = client.read()?;
            match message {
                Message::Text(text) => return Packet::try_from(Bytes::from(text)),
                Message::Binary(_) => return Err(Error::UnsupportedBinaryEncoding()),
                Message::Close(_) => return Ok(Packet::new(PacketId::Close, Bytes::new())),
                // websocket-level control frames, not engine.io packets
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    fn set_receive_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let client = self.client.lock()?;
        match client.get_ref() {
            MaybeTlsStream::Plain(stream) => stream.set_read_timeout(timeout)?,
            MaybeTlsStream::NativeTls(stream) => stream.get_ref().set_read_timeout(timeout)?,
            _ => (),
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.client.lock()?.close(None)?;
        Ok(())
    }
}

impl std::fmt::Debug for WebsocketTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "WebsocketTransport(base_url: {:?})",
            self.base_url(),
        ))
    }
}
