//! NTLMv2 client authentication for the SMB2 session setup handshake.
//!
//! The exchange consists of two round trips, each carrying an NTLM message wrapped in an SPNEGO
//! token. [`NtlmAuthenticator`] drives it over anything implementing [`Connection`] and yields
//! the session identifier assigned by the server together with the signing key, if one was
//! negotiated.
//!
//! Sample usage:
//! ```
//! use smbntlm::{AuthenticatedSession, AuthenticationContext, Authenticator, AuthError, Connection};
//! use smbntlm::{NtlmAuthenticator, NtlmConfig};
//!
//! fn log_on<C: Connection>(connection: &mut C, password: &str) -> Result<AuthenticatedSession, AuthError> {
//!     let context = AuthenticationContext::new("alice", "CONTOSO", password);
//!     let mut authenticator = NtlmAuthenticator::new(NtlmConfig::default());
//!     let session = authenticator.authenticate(&context, connection)?;
//!     if session.session_key.is_none() {
//!         eprintln!("warning: session {} is not signed", session.session_id);
//!     }
//!     Ok(session)
//! }
//! ```


pub mod auth;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod messages;
pub mod spnego;


use std::fmt;

use bitflags::bitflags;
use zeroize::Zeroizing;

pub use crate::auth::{
    AuthenticatedSession, Authenticator, Connection, NtlmAuthenticator, NtlmConfig, NtStatus,
    SecurityMode, SessionId, SessionSetupRequest, SessionSetupResponse,
};
pub use crate::crypto::{respond_challenge_ntlm_v2, ntlm_time, ChallengeResponse, SessionKey};
pub use crate::error::{AuthError, CryptoError, ParsingError, ProtocolError, StoringError};
pub use crate::messages::{AuthenticateMessage, ChallengeMessage, Message, NegotiateMessage, OsVersion};


/// The credentials used for an authentication attempt.
#[derive(Clone, Eq, PartialEq)]
pub struct AuthenticationContext {
    /// The username part of the credentials.
    pub username: String,

    /// The domain part of the credentials.
    ///
    /// Often specified in combination with the username as `<DOMAIN>\<USERNAME>`. In credentials
    /// without a domain, the domain is an empty string.
    pub domain: String,

    /// The password part of the credentials. Wiped from memory when dropped.
    pub password: Zeroizing<String>,
}
impl AuthenticationContext {
    pub fn new<U: Into<String>, D: Into<String>, P: Into<String>>(username: U, domain: D, password: P) -> Self {
        Self {
            username: username.into(),
            domain: domain.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}
impl fmt::Debug for AuthenticationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationContext")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}


bitflags! {
    /// NTLM operation flags.
    #[derive(Clone, Copy, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct Flags: u32 {
        const NEGOTIATE_UNICODE = 0x0000_0001;
        const NEGOTIATE_OEM = 0x0000_0002;
        const REQUEST_TARGET = 0x0000_0004;
        const UNKNOWN_8 = 0x0000_0008;
        const NEGOTIATE_SIGN = 0x0000_0010;
        const NEGOTIATE_SEAL = 0x0000_0020;
        const NEGOTIATE_DATAGRAM = 0x0000_0040;
        const NEGOTIATE_LANMAN_KEY = 0x0000_0080;
        const NEGOTIATE_NETWARE = 0x0000_0100;
        const NEGOTIATE_NTLM = 0x0000_0200;
        const UNKNOWN_400 = 0x0000_0400;
        const NEGOTIATE_ANONYMOUS = 0x0000_0800;
        const NEGOTIATE_DOMAIN_SUPPLIED = 0x0000_1000;
        const NEGOTIATE_WORKSTATION_SUPPLIED = 0x0000_2000;
        const NEGOTIATE_LOCAL_CALL = 0x0000_4000;
        const NEGOTIATE_ALWAYS_SIGN = 0x0000_8000;
        const TARGET_TYPE_DOMAIN = 0x0001_0000;
        const TARGET_TYPE_SERVER = 0x0002_0000;
        const TARGET_TYPE_SHARE = 0x0004_0000;
        /// Extended session security (NTLM2 session response).
        const NEGOTIATE_NTLM2_KEY = 0x0008_0000;
        const REQUEST_INIT_RESPONSE = 0x0010_0000;
        const REQUEST_ACCEPT_RESPONSE = 0x0020_0000;
        const REQUEST_NON_NT_SESSION_KEY = 0x0040_0000;
        const NEGOTIATE_TARGET_INFO = 0x0080_0000;
        const UNKNOWN_1000000 = 0x0100_0000;
        const NEGOTIATE_VERSION = 0x0200_0000;
        const UNKNOWN_4000000 = 0x0400_0000;
        const UNKNOWN_8000000 = 0x0800_0000;
        const UNKNOWN_10000000 = 0x1000_0000;
        const NEGOTIATE_128BIT = 0x2000_0000;
        const NEGOTIATE_KEY_EXCHANGE = 0x4000_0000;
        const NEGOTIATE_56BIT = 0x8000_0000;
    }
}
