//! The NTLM authentication exchange over SMB2 session setup.
//!
//! Two round trips are made: the first carries the Negotiate message and receives the server's
//! Challenge, the second carries the Authenticate message and receives the final verdict. Each
//! message travels inside an SPNEGO token.


use std::fmt;

use bitflags::bitflags;
use rand::{CryptoRng, RngCore};
use rand::rngs::OsRng;
use tracing::{debug, info, trace, warn};

use crate::{AuthenticationContext, Flags};
use crate::crypto::{ntlm_time, respond_challenge_ntlm_v2, SessionKey};
use crate::error::{AuthError, ProtocolError};
use crate::messages::{ChallengeMessage, NegotiateMessage};
use crate::spnego::{self, NegotiationResult, NTLMSSP_OID};


/// A 32-bit status code returned by the server.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NtStatus(pub u32);
impl NtStatus {
    pub const SUCCESS: Self = Self(0x0000_0000);
    pub const MORE_PROCESSING_REQUIRED: Self = Self(0xC000_0016);
    pub const ACCESS_DENIED: Self = Self(0xC000_0022);
    pub const LOGON_FAILURE: Self = Self(0xC000_006D);

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}
impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SUCCESS => write!(f, "STATUS_SUCCESS"),
            Self::MORE_PROCESSING_REQUIRED => write!(f, "STATUS_MORE_PROCESSING_REQUIRED"),
            Self::ACCESS_DENIED => write!(f, "STATUS_ACCESS_DENIED"),
            Self::LOGON_FAILURE => write!(f, "STATUS_LOGON_FAILURE"),
            Self(other) => write!(f, "{:#010x}", other),
        }
    }
}

/// The 64-bit identifier the server assigns to a session.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SessionId(pub u64);
impl SessionId {
    /// The identifier sent before the server has assigned one.
    pub const NONE: Self = Self(0);
}
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

bitflags! {
    /// The signing requirements advertised in a session setup request.
    #[derive(Clone, Copy, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct SecurityMode: u16 {
        const SIGNING_ENABLED = 0x0001;
        const SIGNING_REQUIRED = 0x0002;
    }
}


/// The parts of an SMB2 SESSION_SETUP request relevant to authentication.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SessionSetupRequest {
    pub security_mode: SecurityMode,
    pub session_id: SessionId,
    pub security_buffer: Vec<u8>,
}

/// The parts of an SMB2 SESSION_SETUP response relevant to authentication.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SessionSetupResponse {
    pub status: NtStatus,
    pub session_id: SessionId,
    pub security_buffer: Vec<u8>,
}

/// A connection to an SMB2 server able to exchange session setup messages.
///
/// Framing, timeouts and the rest of the SMB2 header are the implementation's business.
pub trait Connection {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The name of the server, for diagnostics.
    fn remote_hostname(&self) -> &str;

    fn send(&mut self, request: SessionSetupRequest) -> Result<(), Self::Error>;

    fn receive(&mut self) -> Result<SessionSetupResponse, Self::Error>;
}

/// An authentication mechanism for SMB2 session setup.
pub trait Authenticator {
    /// The object identifier of the mechanism in dotted notation.
    fn name(&self) -> String;

    /// Performs the complete exchange on `connection` using the credentials in `context`.
    fn authenticate<C: Connection>(
        &mut self,
        context: &AuthenticationContext,
        connection: &mut C,
    ) -> Result<AuthenticatedSession, AuthError>;
}


/// Settings of the NTLM authenticator.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NtlmConfig {
    /// The flags offered in the Negotiate message. The Authenticate message uses the subset of
    /// these that the server also set in its Challenge.
    pub negotiate_flags: Flags,

    /// The security mode sent with both session setup requests.
    pub security_mode: SecurityMode,
}
impl Default for NtlmConfig {
    fn default() -> Self {
        Self {
            negotiate_flags: Flags::NEGOTIATE_UNICODE
                | Flags::REQUEST_TARGET
                | Flags::NEGOTIATE_SIGN
                | Flags::NEGOTIATE_ALWAYS_SIGN
                | Flags::NEGOTIATE_NTLM
                | Flags::NEGOTIATE_NTLM2_KEY
                | Flags::NEGOTIATE_TARGET_INFO
                | Flags::NEGOTIATE_128BIT
                | Flags::NEGOTIATE_KEY_EXCHANGE
                | Flags::NEGOTIATE_56BIT,
            security_mode: SecurityMode::SIGNING_ENABLED,
        }
    }
}

/// The outcome of a successful authentication.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthenticatedSession {
    pub session_id: SessionId,

    /// The key for signing subsequent traffic; absent if signing was not negotiated or the
    /// server accepted the session without a challenge.
    pub session_key: Option<SessionKey>,
}


/// Authenticates SMB2 sessions using NTLMv2 wrapped in SPNEGO.
pub struct NtlmAuthenticator<R = OsRng> {
    config: NtlmConfig,
    rng: R,
}
impl NtlmAuthenticator<OsRng> {
    pub fn new(config: NtlmConfig) -> Self {
        Self::with_rng(config, OsRng)
    }
}
impl<R: RngCore + CryptoRng> NtlmAuthenticator<R> {
    /// Creates an authenticator drawing client challenges and session keys from `rng`.
    pub fn with_rng(config: NtlmConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &NtlmConfig {
        &self.config
    }

    fn exchange<C: Connection>(
        &mut self,
        context: &AuthenticationContext,
        connection: &mut C,
    ) -> Result<AuthenticatedSession, AuthError> {
        let negotiate = NegotiateMessage::new(self.config.negotiate_flags);
        let negotiate_token = spnego::wrap_init(NTLMSSP_OID, &negotiate.to_bytes()?)?;
        connection.send(SessionSetupRequest {
            security_mode: self.config.security_mode,
            session_id: SessionId::NONE,
            security_buffer: negotiate_token,
        })
            .map_err(AuthError::transport)?;
        let response = connection.receive()
            .map_err(AuthError::transport)?;

        if response.status == NtStatus::SUCCESS {
            info!(session_id = %response.session_id, "session accepted without a challenge");
            return Ok(AuthenticatedSession {
                session_id: response.session_id,
                session_key: None,
            });
        }
        if response.status != NtStatus::MORE_PROCESSING_REQUIRED {
            return Err(ProtocolError::UnexpectedStatus(response.status).into());
        }
        let session_id = response.session_id;
        debug!(%session_id, "server requires more processing");
        trace!(token = %hex::encode(&response.security_buffer), "received challenge token");

        let targ = spnego::unwrap_targ(&response.security_buffer)?;
        if targ.negotiation_result == Some(NegotiationResult::Reject) {
            return Err(ProtocolError::NegotiationRejected.into());
        }
        let challenge_bytes = targ.response_token
            .ok_or(ProtocolError::MissingChallengeToken)?;
        let challenge = ChallengeMessage::decode(&challenge_bytes)?;
        debug!(target_name = %challenge.target_name, flags = ?challenge.flags, "decoded challenge");

        let flags = authenticate_flags(challenge.flags, self.config.negotiate_flags);
        let challenge_response = respond_challenge_ntlm_v2(&challenge, flags, context, ntlm_time(), &mut self.rng)?;
        let authenticate = challenge_response.to_message(context, flags);
        let authenticate_token = spnego::wrap_targ(&authenticate.to_bytes()?)?;
        connection.send(SessionSetupRequest {
            security_mode: self.config.security_mode,
            session_id,
            security_buffer: authenticate_token,
        })
            .map_err(AuthError::transport)?;
        let response = connection.receive()
            .map_err(AuthError::transport)?;

        if response.status != NtStatus::SUCCESS {
            return Err(ProtocolError::UnexpectedStatus(response.status).into());
        }
        if response.session_id != session_id {
            warn!(
                interim = %session_id, terminal = %response.session_id,
                "server changed the session id during authentication"
            );
            return Err(ProtocolError::SessionIdMismatch { interim: session_id, terminal: response.session_id }.into());
        }

        info!(%session_id, signing = challenge_response.session_key.is_some(), "authenticated");
        Ok(AuthenticatedSession {
            session_id,
            session_key: challenge_response.session_key,
        })
    }
}
impl<R: RngCore + CryptoRng> Authenticator for NtlmAuthenticator<R> {
    fn name(&self) -> String {
        spnego::oid_to_string(NTLMSSP_OID)
    }

    fn authenticate<C: Connection>(
        &mut self,
        context: &AuthenticationContext,
        connection: &mut C,
    ) -> Result<AuthenticatedSession, AuthError> {
        info!(
            username = %context.username, domain = %context.domain, remote = connection.remote_hostname(),
            "starting NTLM authentication"
        );
        let result = self.exchange(context, connection);
        if let Err(e) = &result {
            warn!(error = %e, remote = connection.remote_hostname(), "NTLM authentication failed");
        }
        result
    }
}
impl<R> fmt::Debug for NtlmAuthenticator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtlmAuthenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Derives the flags of the Authenticate message from those of the Challenge.
///
/// The session key is derived from the same flags, so the server reads from the message exactly
/// the key material the client used.
fn authenticate_flags(challenge_flags: Flags, configured_flags: Flags) -> Flags {
    let mut flags = challenge_flags & configured_flags;
    if !flags.contains(Flags::NEGOTIATE_SIGN) {
        // a key is only exchanged for signing
        flags.remove(Flags::NEGOTIATE_KEY_EXCHANGE);
    }
    if !flags.intersects(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_OEM) {
        flags.insert(Flags::NEGOTIATE_UNICODE);
    }
    flags
}
