use crate::error::{Error, Result};
use crate::packet::{Packet, PacketId, Payload};
use adler32::adler32;
use bytes::Bytes;
use native_tls::TlsConnector;
use reqwest::{
    blocking::{Client, ClientBuilder, Response},
    header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE},
};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tracing::debug;
use url::Url;

/// The content type of the opening poll response.
const OCTET_STREAM: &str = "application/octet-stream";
/// The content type of every follow-up poll response and of our own posts.
const PLAIN_TEXT: &str = "text/plain;charset=UTF-8";

/// One-shot HTTP long-polling against the `engine.io` endpoint. Every call
/// performs exactly one request/response exchange, there is no pipelining;
/// the connection is scoped to the call and released on every exit path.
#[derive(Debug, Clone)]
pub struct PollingTransport {
    client: Arc<Client>,
    base_url: Arc<RwLock<Url>>,
}

impl PollingTransport {
    /// Creates an instance of `PollingTransport`.
    pub fn new(
        base_url: Url,
        tls_config: Option<TlsConnector>,
        opening_headers: Option<HeaderMap>,
    ) -> Self {
        let client = match (tls_config, opening_headers) {
            (Some(config), Some(map)) => ClientBuilder::new()
                .use_preconfigured_tls(config)
                .default_headers(map)
                .build()
                .unwrap(),
            (Some(config), None) => ClientBuilder::new()
                .use_preconfigured_tls(config)
                .build()
                .unwrap(),
            (None, Some(map)) => ClientBuilder::new().default_headers(map).build().unwrap(),
            (None, None) => Client::new(),
        };

        let mut url = base_url;
        if !url
            .query_pairs()
            .any(|(k, v)| k == "transport" && v == "polling")
        {
            url.query_pairs_mut().append_pair("transport", "polling");
        }

        PollingTransport {
            client: Arc::new(client),
            base_url: Arc::new(RwLock::new(url)),
        }
    }

    /// The opening GET of a session. The server answers the very first poll
    /// as an octet stream.
    pub fn open_poll(&self, timeout: Duration) -> Result<Payload> {
        self.request_payload(timeout, OCTET_STREAM)
    }

    /// A follow-up or closing GET once a session id exists. These answers
    /// come back as plain text.
    pub fn poll(&self, timeout: Duration) -> Result<Payload> {
        self.request_payload(timeout, PLAIN_TEXT)
    }

    /// Posts the two-byte message-connect packet (`40`) that establishes the
    /// logical connection on the fresh session. The response body, if any,
    /// is read and discarded.
    pub fn connect_message(&self, timeout: Duration) -> Result<()> {
        self.emit(Packet::new(PacketId::Message, "0"), timeout)
    }

    /// Posts a single encoded packet.
    pub fn emit(&self, packet: Packet, timeout: Duration) -> Result<()> {
        let response = self
            .client
            .post(self.address()?)
            .header(CONTENT_TYPE, PLAIN_TEXT)
            .body(Bytes::from(packet))
            .timeout(timeout)
            .send()?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(Error::UnexpectedStatus(status));
        }
        let _ = response.bytes()?;

        Ok(())
    }

    fn request_payload(&self, timeout: Duration, expected_type: &str) -> Result<Payload> {
        let address = self.address()?;
        debug!(url = %address, "polling");
        let response = self.client.get(address).timeout(timeout).send()?;
        Ok(Payload::new(validated_body(response, expected_type)?))
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(self.base_url.read()?.clone())
    }

    /// Used to update the base url, like when adding the sid.
    pub fn set_base_url(&self, base_url: Url) -> Result<()> {
        let mut url = base_url;
        if !url
            .query_pairs()
            .any(|(k, v)| k == "transport" && v == "polling")
        {
            url.query_pairs_mut().append_pair("transport", "polling");
        }
        *self.base_url.write()? = url;
        Ok(())
    }

    /// Full query address, with a cache-busting `t` parameter.
    fn address(&self) -> Result<Url> {
        let reader = format!("{:#?}", SystemTime::now());
        let hash = adler32(reader.as_bytes())?;
        let mut url = self.base_url()?;
        url.query_pairs_mut().append_pair("t", &hash.to_string());
        Ok(url)
    }
}

/// Checks the status line, the `Content-Length` and `Content-Type` headers,
/// and reads the body as exactly `Content-Length` bytes. Chunked responses
/// carry no `Content-Length` and are rejected by the same rule.
fn validated_body(response: Response, expected_type: &str) -> Result<Bytes> {
    let status = response.status().as_u16();
    if status != 200 {
        return Err(Error::UnexpectedStatus(status));
    }

    let length: usize = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .ok_or_else(Error::MissingContentLength)?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_owned();
    if normalized(&content_type) != normalized(expected_type) {
        return Err(Error::UnexpectedContentType(content_type));
    }

    let body = response.bytes()?;
    if body.len() < length {
        return Err(Error::IncompleteResponseBody());
    }
    Ok(body.slice(..length))
}

fn normalized(content_type: &str) -> String {
    content_type.replace(' ', "").to_ascii_lowercase()
}
