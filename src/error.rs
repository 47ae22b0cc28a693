//! Errors raised while building, parsing and driving the NTLM exchange.


use thiserror::Error;

use crate::auth::{NtStatus, SessionId};


/// An error that may occur while parsing NTLM messages or SPNEGO tokens received from the server.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum ParsingError {
    /// The header is shorter than expected.
    #[error("header too short (expected at least {expected_min_len} bytes, obtained {obtained_len})")]
    ShortHeader { expected_min_len: usize, obtained_len: usize },

    /// The magic value does not match the expected one.
    #[error("mismatched magic (expected {expected:?}, obtained {obtained:?})")]
    MagicMismatch { expected: [u8; 8], obtained: Vec<u8> },

    /// The message is a valid NTLM message, but not of the expected type.
    #[error("unexpected message type (expected {expected}, obtained {obtained})")]
    UnexpectedMessageType { expected: u32, obtained: u32 },

    /// An internal item has a different length than expected.
    #[error("wrong length for an internal item (expected {expected}, obtained {obtained})")]
    ItemLengthMismatch { expected: usize, obtained: usize },

    /// An internal item is shorter than expected.
    #[error("insufficient minimum length for an internal item (expected at least {expected_at_least}, obtained {obtained})")]
    ItemMinLengthMismatch { expected_at_least: usize, obtained: usize },

    /// An internal item's length is not divisible by an expected divisor.
    #[error("item length {obtained_length} not divisible by {expected_divisor}")]
    ItemLengthNotDivisible { expected_divisor: usize, obtained_length: usize },

    /// A string in the OEM encoding could not be decoded.
    #[error("failed to decode value with the OEM encoding: {value:?}")]
    InvalidOemEncoding { value: Vec<u8> },

    /// A string of 16-bit characters could not be decoded.
    #[error("failed to decode value as UTF-16: {value:?}")]
    InvalidUtf16 { value: Vec<u16> },

    /// A security buffer points outside of the message.
    #[error("security buffer (offset {offset}, length {length}) out of range (message has {message_len} bytes)")]
    BufferOutOfRange { offset: u32, length: u16, message_len: usize },

    /// Neither Unicode nor OEM encoding was selected.
    #[error("neither Unicode nor OEM encoding was selected")]
    NeitherUnicodeNorOem,

    /// A negotiation token is not valid DER or does not match the SPNEGO structure.
    #[error("malformed negotiation token: {0}")]
    InvalidDer(String),

    /// A negotiation token of the wrong kind was received.
    #[error("unexpected kind of negotiation token")]
    UnexpectedNegotiationToken,

    /// The token does not announce the SPNEGO mechanism.
    #[error("unexpected mechanism object identifier")]
    InvalidObjectIdentifier,
}

/// An error that may occur while writing an NTLM message.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum StoringError {
    /// Neither Unicode nor OEM encoding was selected.
    #[error("neither Unicode nor OEM encoding was selected")]
    NeitherUnicodeNorOem,

    /// A field is too long to be addressed by a security buffer.
    #[error("field of {length} bytes does not fit into a security buffer")]
    FieldTooLong { length: usize },

    /// A negotiation token could not be DER-encoded.
    #[error("failed to encode negotiation token: {0}")]
    InvalidDer(String),
}

/// A failure of the symmetric cipher used for the session key exchange.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The RC4 key has the wrong length.
    #[error("invalid RC4 key")]
    InvalidKeyLength(#[source] cipher::InvalidLength),
}

/// The server's responses violate the session setup protocol or refuse the credentials.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum ProtocolError {
    /// The server answered with a status other than the ones permitted at this point.
    #[error("session setup failed with status {0}")]
    UnexpectedStatus(NtStatus),

    /// The server rejected the NTLMSSP mechanism.
    #[error("server rejected the NTLMSSP mechanism")]
    NegotiationRejected,

    /// The server requested more processing but sent no challenge.
    #[error("server response carries no NTLM challenge token")]
    MissingChallengeToken,

    /// The session identifier of the final response differs from the one issued with the
    /// challenge.
    #[error("session id changed from {interim} to {terminal} during authentication")]
    SessionIdMismatch { interim: SessionId, terminal: SessionId },
}
impl ProtocolError {
    /// The status code reported by the server, if this error was caused by one.
    pub fn status(&self) -> Option<NtStatus> {
        match self {
            Self::UnexpectedStatus(status) => Some(*status),
            _ => None,
        }
    }
}

/// An error that ends an authentication attempt.
///
/// None of these are retried; a caller wishing to try again must start a fresh attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to parse server token: {0}")]
    Parse(#[from] ParsingError),

    #[error("failed to encode NTLM message: {0}")]
    Store(#[from] StoringError),

    #[error("session key exchange failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("authentication failed: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection failed to send or receive; the original error is kept as the source.
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
impl AuthError {
    pub(crate) fn transport<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Transport(Box::new(error))
    }
}
