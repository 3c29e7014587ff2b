//! Error types, returned from this crate.

use std::{fmt, io, sync::Arc};

use rmp::{
    decode::{MarkerReadError, NumValueReadError, ValueReadError},
    encode::{RmpWriteErr, ValueWriteError},
};

/// Error, returned from the server in response to a request.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{description} (code {code})")]
pub struct ErrorResponse {
    pub code: u32,
    pub description: String,
}

impl ErrorResponse {
    pub fn new(code: u32, description: String) -> Self {
        Self { code, description }
    }
}

/// Top-level error type of this crate.
///
/// Fatal connection errors (I/O, malformed frames) are `Arc`-wrapped
/// internally, so a single failure can be delivered to every request
/// which was in flight when the connection died.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// Connection attempt didn't finish in time.
    #[error("connect timeout")]
    ConnectTimeout,
    /// Greeting or authentication failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    /// Underlying connection is closed.
    #[error("connection closed")]
    ConnectionClosed,
    /// Request did not receive a response in time.
    ///
    /// The connection itself stays open, a late response is discarded.
    #[error("request timed out")]
    Timeout,
    /// Server responded to a request with an error.
    #[error("error response: {0}")]
    Response(#[from] ErrorResponse),
    /// Failed to encode a request into MessagePack.
    #[error("encoding error: {0}")]
    Encode(#[from] EncodingError),
    /// Failed to decode a frame from the server.
    #[error("decoding error: {0}")]
    Decode(#[from] DecodingError),
    /// Underlying TCP error.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
    /// Space not present in the loaded schema.
    #[error("space with {0} not found in schema")]
    UnknownSpace(String),
    /// Index not present in the loaded schema.
    #[error("index with name '{index}' not found in space with {space}")]
    UnknownIndex { space: String, index: String },
    /// Space or index was addressed by name before the schema was loaded.
    #[error("schema not loaded, load it or address spaces and indexes by id")]
    SchemaNotLoaded,
    /// Input is not a known iterator alias or value.
    #[error("unknown iterator '{0}'")]
    UnknownIterator(String),
    /// Two in-flight requests were assigned the same sync.
    #[error("duplicated sync {0}")]
    DuplicatedSync(u64),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}

impl From<CodecDecodeError> for Error {
    fn from(value: CodecDecodeError) -> Self {
        match value {
            CodecDecodeError::Io(x) => Self::Io(x),
            CodecDecodeError::Decode(x) => Self::Decode(x),
            CodecDecodeError::Closed => Self::ConnectionClosed,
        }
    }
}

impl From<CodecEncodeError> for Error {
    fn from(value: CodecEncodeError) -> Self {
        match value {
            CodecEncodeError::Io(x) => Self::Io(Arc::new(x)),
            CodecEncodeError::Encode(x) => Self::Encode(x),
        }
    }
}

/// Errors of the initial exchange with the server.
#[derive(Clone, Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("truncated greeting from server")]
    TruncatedGreeting,
    #[error("failed to decode salt from base64: {0}")]
    InvalidSaltEncoding(#[from] base64::DecodeError),
    #[error("decoded salt is only {0} bytes long")]
    SaltTooShort(usize),
    #[error("authentication rejected by server: {0}")]
    Rejected(ErrorResponse),
}

/// Error of encoding a value into MessagePack.
#[derive(Clone, Debug, thiserror::Error)]
#[error("failed to encode into MessagePack: {0}")]
pub struct EncodingError(Arc<anyhow::Error>);

impl EncodingError {
    fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }
}

impl<E> From<ValueWriteError<E>> for EncodingError
where
    E: RmpWriteErr + Send + Sync,
{
    fn from(v: ValueWriteError<E>) -> Self {
        Self::new(v)
    }
}

impl From<rmp_serde::encode::Error> for EncodingError {
    fn from(v: rmp_serde::encode::Error) -> Self {
        Self::new(v)
    }
}

impl From<io::Error> for EncodingError {
    fn from(v: io::Error) -> Self {
        Self::new(v)
    }
}

/// Error of decoding a value from MessagePack.
///
/// Carries an optional location, describing in which part of the frame
/// decoding failed.
#[derive(Clone, Debug)]
pub struct DecodingError {
    kind: Arc<DecodingErrorKind>,
    location: Option<&'static str>,
}

impl DecodingError {
    fn new(kind: DecodingErrorKind) -> Self {
        Self {
            kind: Arc::new(kind),
            location: None,
        }
    }

    pub(crate) fn type_mismatch(expected: &'static str, actual: impl Into<String>) -> Self {
        Self::new(DecodingErrorKind::TypeMismatch {
            expected,
            actual: actual.into(),
        })
    }

    pub(crate) fn missing_key(key: &'static str) -> Self {
        Self::new(DecodingErrorKind::MissingKey(key))
    }

    pub(crate) fn unknown_response_code(code: u32) -> Self {
        Self::new(DecodingErrorKind::UnknownResponseCode(code))
    }

    pub(crate) fn trailing_bytes(count: usize) -> Self {
        Self::new(DecodingErrorKind::TrailingBytes(count))
    }

    pub(crate) fn invalid_tuple_length(expected: usize, actual: usize) -> Self {
        Self::new(DecodingErrorKind::InvalidTupleLength { expected, actual })
    }

    /// Attach a location description to this error.
    pub(crate) fn in_other(mut self, location: &'static str) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(location) = self.location {
            write!(f, " (in {location})")?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

#[derive(Debug, thiserror::Error)]
enum DecodingErrorKind {
    #[error("type mismatch, expected '{expected}', actual '{actual}'")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },
    #[error("missing key '{0}'")]
    MissingKey(&'static str),
    #[error("unknown response code {0}")]
    UnknownResponseCode(u32),
    #[error("{0} trailing bytes after decoded value")]
    TrailingBytes(usize),
    #[error("expected tuple of length {expected}, got {actual}")]
    InvalidTupleLength { expected: usize, actual: usize },
    #[error("MessagePack error: {0}")]
    MessagePack(#[source] anyhow::Error),
}

macro_rules! impl_decoding_error_from {
    ($t:ty) => {
        impl From<$t> for DecodingError {
            fn from(v: $t) -> Self {
                Self::new(DecodingErrorKind::MessagePack(v.into()))
            }
        }
    };
}

impl_decoding_error_from!(ValueReadError);
impl_decoding_error_from!(NumValueReadError);
impl_decoding_error_from!(rmpv::decode::Error);
impl_decoding_error_from!(rmpv::ext::Error);
impl_decoding_error_from!(io::Error);

impl From<MarkerReadError> for DecodingError {
    fn from(v: MarkerReadError) -> Self {
        Self::new(DecodingErrorKind::MessagePack(v.0.into()))
    }
}

/// Errors of the frame decoder.
#[derive(Clone, Debug, thiserror::Error)]
pub(crate) enum CodecDecodeError {
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
    #[error(transparent)]
    Decode(DecodingError),
    #[error("connection closed by server")]
    Closed,
}

impl From<io::Error> for CodecDecodeError {
    fn from(value: io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

/// Errors of the frame encoder.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CodecEncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Encode(EncodingError),
}
