use super::client::Client;
use super::handshake::Handshake;
use crate::address::Address;
use crate::callback::OptionalCallback;
use crate::error::Result;
use crate::packet::Packet;
use crate::transports::WebsocketTransport;
use crate::ENGINE_IO_VERSION;
use bytes::Bytes;
use native_tls::TlsConnector;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The default bound on every handshake wait until the server's own
/// `pingTimeout` is known.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(45);

/// Configures and opens an `engine.io` session: polling handshake, probe,
/// websocket upgrade. `connect` returns only once the session is live.
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    url: Url,
    tls_config: Option<TlsConnector>,
    headers: Option<HeaderMap>,
    connect_stage: bool,
    handshake_timeout: Duration,
    on_error: OptionalCallback<String>,
    on_open: OptionalCallback<()>,
    on_close: OptionalCallback<()>,
    on_data: OptionalCallback<Bytes>,
    on_packet: OptionalCallback<Packet>,
}

impl ClientBuilder {
    pub fn new(url: Url) -> Self {
        let mut url = url;
        url.query_pairs_mut()
            .append_pair("EIO", &ENGINE_IO_VERSION.to_string());

        // No path, add the well-known one
        if url.path() == "/" {
            url.set_path("/socket.io/");
        }
        ClientBuilder {
            url,
            tls_config: None,
            headers: None,
            connect_stage: true,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            on_close: OptionalCallback::default(),
            on_data: OptionalCallback::default(),
            on_error: OptionalCallback::default(),
            on_open: OptionalCallback::default(),
            on_packet: OptionalCallback::default(),
        }
    }

    /// Builds from a URI string under the strict address grammar: the port
    /// is mandatory, the scheme must be http(s).
    pub fn from_uri(uri: &str) -> Result<Self> {
        let address = Address::parse(uri)?;
        Ok(Self::new(address.base_url()?))
    }

    /// Appends extra query pairs, verbatim, to every request of the session.
    pub fn query(mut self, query: &str) -> Self {
        if !query.is_empty() {
            let combined = match self.url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                _ => query.to_owned(),
            };
            self.url.set_query(Some(&combined));
        }
        self
    }

    /// Specify transport's tls config
    pub fn tls_config(mut self, tls_config: TlsConnector) -> Self {
        self.tls_config = Some(tls_config);
        self
    }

    /// Specify transport's HTTP headers
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Whether to post the message-connect packet after the session opens.
    /// Defaults to on; some server versions reject the probe without it.
    pub fn connect_stage(mut self, enabled: bool) -> Self {
        self.connect_stage = enabled;
        self
    }

    /// Bound on every handshake wait before the server announces its ping
    /// timing.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Registers the `on_close` callback.
    pub fn on_close<T>(mut self, callback: T) -> Self
    where
        T: Fn(()) + 'static + Sync + Send,
    {
        self.on_close = OptionalCallback::new(callback);
        self
    }

    /// Registers the `on_data` callback.
    pub fn on_data<T>(mut self, callback: T) -> Self
    where
        T: Fn(Bytes) + 'static + Sync + Send,
    {
        self.on_data = OptionalCallback::new(callback);
        self
    }

    /// Registers the `on_error` callback.
    pub fn on_error<T>(mut self, callback: T) -> Self
    where
        T: Fn(String) + 'static + Sync + Send,
    {
        self.on_error = OptionalCallback::new(callback);
        self
    }

    /// Registers the `on_open` callback, fired once the upgrade completes.
    pub fn on_open<T>(mut self, callback: T) -> Self
    where
        T: Fn(()) + 'static + Sync + Send,
    {
        self.on_open = OptionalCallback::new(callback);
        self
    }

    /// Registers the `on_packet` callback.
    pub fn on_packet<T>(mut self, callback: T) -> Self
    where
        T: Fn(Packet) + 'static + Sync + Send,
    {
        self.on_packet = OptionalCallback::new(callback);
        self
    }

    /// Runs the handshake and returns the upgraded, live session. Any
    /// protocol violation, bad response or missed deadline aborts the whole
    /// attempt; a failed connect can only be retried from scratch.
    pub fn connect(self) -> Result<Client> {
        let handshake = Handshake::new(
            self.url.clone(),
            self.tls_config.clone(),
            self.headers.clone(),
            self.connect_stage,
            self.handshake_timeout,
        );

        let tls_config = self.tls_config;
        let headers = self.headers;
        let outcome =
            handshake.run(move |url| WebsocketTransport::new(url, tls_config, headers))?;

        let client = Client::new(
            Arc::new(outcome.transport),
            outcome.handshake,
            self.on_close,
            self.on_data,
            self.on_error,
            self.on_open,
            self.on_packet,
        );
        client.activate(outcome.pending)?;

        Ok(client)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_appends_version_and_default_path() {
        let builder = ClientBuilder::new(Url::parse("http://localhost:4201/").unwrap());
        assert_eq!(
            builder.url.to_string(),
            "http://localhost:4201/socket.io/?EIO=4"
        );
    }

    #[test]
    fn test_from_uri_requires_port() {
        assert!(ClientBuilder::from_uri("http://localhost").is_err());

        let builder = ClientBuilder::from_uri("http://localhost:4201").unwrap();
        assert_eq!(
            builder.url.to_string(),
            "http://localhost:4201/socket.io/?EIO=4"
        );
    }

    #[test]
    fn test_query_pairs_are_appended() {
        let builder = ClientBuilder::from_uri("http://localhost:4201")
            .unwrap()
            .query("token=deadbeef");
        assert_eq!(
            builder.url.to_string(),
            "http://localhost:4201/socket.io/?EIO=4&token=deadbeef"
        );
    }
}
