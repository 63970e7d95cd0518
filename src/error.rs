use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;
use std::io::Error as IoError;
use std::str::Utf8Error;
use thiserror::Error;
use tungstenite::Error as TungsteniteError;
use url::ParseError as UrlParseError;

use crate::client::Stage;

/// Enumeration of all possible errors in the `engine.io` context.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // Conform to https://rust-lang.github.io/api-guidelines/naming.html#names-use-a-consistent-word-order-c-word-order
    // Negative verb-object
    #[error("Invalid packet id: {0}")]
    InvalidPacketId(u8),
    #[error("Error while parsing an incomplete packet")]
    IncompletePacket(),
    #[error("Packet uses the base64 binary marker, binary payloads are not supported")]
    UnsupportedBinaryEncoding(),
    #[error("An error occurred while decoding the utf-8 text: {0}")]
    InvalidUtf8(#[from] Utf8Error),
    #[error("Invalid Url during parsing")]
    InvalidUrl(#[from] UrlParseError),
    #[error("Malformed URI, expected scheme://host:port[/path]: {0}")]
    MalformedUri(String),
    #[error("Error during connection via http: {0}")]
    IncompleteResponseFromReqwest(#[from] ReqwestError),
    #[error("Error with websocket connection: {0}")]
    WebsocketError(#[from] TungsteniteError),
    #[error("Network request returned with status code: {0}")]
    UnexpectedStatus(u16),
    #[error("Response carried no Content-Length header")]
    MissingContentLength(),
    #[error("Response carried an unexpected Content-Type: {0}")]
    UnexpectedContentType(String),
    #[error("Response body ended before the announced Content-Length")]
    IncompleteResponseBody(),
    #[error("Got illegal handshake response: {0}")]
    InvalidHandshake(String),
    #[error("Unexpected packet during {stage}: expected {expected}, got {found}")]
    UnexpectedPacket {
        stage: Stage,
        expected: &'static str,
        found: String,
    },
    #[error("Server did not advertise a websocket upgrade")]
    WebsocketUpgradeRefused(),
    #[error("Timed out waiting for the server during {0}")]
    HandshakeTimeout(Stage),
    #[error("Called an action before the connection was established")]
    IllegalActionBeforeOpen(),
    #[error("string is not json serializable: {0}")]
    InvalidJson(#[from] JsonError),
    #[error("A lock was poisoned")]
    InvalidPoisonedLock(),
    #[error("Got an IO-Error: {0}")]
    IncompleteIo(#[from] IoError),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::InvalidPoisonedLock()
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, err)
    }
}
