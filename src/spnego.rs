//! SPNEGO negotiation tokens (RFC 4178) carrying NTLMSSP messages in the session setup security
//! buffer.
//!
//! ```plain
//! InitialContextToken ::= [APPLICATION 0] IMPLICIT SEQUENCE { thisMech OID, innerContextToken NegotiationToken }
//! NegotiationToken    ::= CHOICE { negTokenInit [0] NegTokenInit, negTokenTarg [1] NegTokenTarg }
//! ```
//!
//! The client's first token is an InitialContextToken; every later token in either direction is a
//! bare NegotiationToken carrying a NegTokenTarg. Everything is DER-encoded.


use std::fmt::Write;

use rasn::{der, AsnType, Decode, Encode};
use rasn::types::{BitString, ObjectIdentifier, OctetString, Oid, SequenceOf};

use crate::error::{ParsingError, StoringError};


/// The object identifier of SPNEGO itself (1.3.6.1.5.5.2).
pub const SPNEGO_OID: &Oid = Oid::const_new(&[1, 3, 6, 1, 5, 5, 2]);

/// The object identifier of the NTLMSSP mechanism (1.3.6.1.4.1.311.2.2.10).
pub const NTLMSSP_OID: &Oid = Oid::const_new(&[1, 3, 6, 1, 4, 1, 311, 2, 2, 10]);


/// The state of the negotiation as reported by the acceptor.
#[derive(AsnType, Clone, Copy, Debug, Decode, Encode, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[rasn(enumerated)]
pub enum NegotiationResult {
    AcceptCompleted = 0,
    AcceptIncomplete = 1,
    Reject = 2,
    RequestMic = 3,
}


/// The initial token sent by the client.
#[derive(AsnType, Clone, Debug, Decode, Default, Encode, Eq, PartialEq)]
pub struct NegTokenInit {
    /// The mechanisms offered by the client, most preferred first.
    #[rasn(tag(explicit(0)))]
    pub mech_types: SequenceOf<ObjectIdentifier>,

    #[rasn(tag(explicit(1)))]
    pub req_flags: Option<BitString>,

    /// The initial token of the most preferred mechanism.
    #[rasn(tag(explicit(2)))]
    pub mech_token: Option<OctetString>,

    #[rasn(tag(explicit(3)))]
    pub mech_list_mic: Option<OctetString>,
}
impl NegTokenInit {
    /// Serializes the token as the InitialContextToken that opens the exchange.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let token = InitialContextToken {
            this_mech: ObjectIdentifier::from(SPNEGO_OID),
            inner_token: NegotiationToken::Init(self.clone()),
        };
        der::encode(&token)
            .map_err(|e| StoringError::InvalidDer(e.to_string()))
    }
}

/// A subsequent token, sent by either side.
#[derive(AsnType, Clone, Debug, Decode, Default, Encode, Eq, PartialEq)]
pub struct NegTokenTarg {
    #[rasn(tag(explicit(0)))]
    pub negotiation_result: Option<NegotiationResult>,

    #[rasn(tag(explicit(1)))]
    pub supported_mech: Option<ObjectIdentifier>,

    #[rasn(tag(explicit(2)))]
    pub response_token: Option<OctetString>,

    #[rasn(tag(explicit(3)))]
    pub mech_list_mic: Option<OctetString>,
}
impl NegTokenTarg {
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        der::encode(&NegotiationToken::Targ(self.clone()))
            .map_err(|e| StoringError::InvalidDer(e.to_string()))
    }
}

#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, PartialEq)]
#[rasn(choice)]
enum NegotiationToken {
    #[rasn(tag(explicit(0)))]
    Init(NegTokenInit),

    #[rasn(tag(explicit(1)))]
    Targ(NegTokenTarg),
}

#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, PartialEq)]
#[rasn(tag(application, 0))]
struct InitialContextToken {
    this_mech: ObjectIdentifier,
    inner_token: NegotiationToken,
}


/// Wraps the first mechanism token in a NegTokenInit offering only `mech`.
pub fn wrap_init(mech: &'static Oid, mech_token: &[u8]) -> Result<Vec<u8>, StoringError> {
    NegTokenInit {
        mech_types: vec![ObjectIdentifier::from(mech)],
        mech_token: Some(OctetString::from(mech_token.to_vec())),
        ..NegTokenInit::default()
    }.to_bytes()
}

/// Wraps a subsequent mechanism token in a NegTokenTarg carrying nothing else.
pub fn wrap_targ(response_token: &[u8]) -> Result<Vec<u8>, StoringError> {
    NegTokenTarg {
        response_token: Some(OctetString::from(response_token.to_vec())),
        ..NegTokenTarg::default()
    }.to_bytes()
}

/// Parses the InitialContextToken opening an exchange.
pub fn unwrap_init(bytes: &[u8]) -> Result<NegTokenInit, ParsingError> {
    let token: InitialContextToken = der::decode(bytes)
        .map_err(|e| ParsingError::InvalidDer(e.to_string()))?;
    if *token.this_mech != *SPNEGO_OID {
        return Err(ParsingError::InvalidObjectIdentifier);
    }
    match token.inner_token {
        NegotiationToken::Init(init) => Ok(init),
        NegotiationToken::Targ(_) => Err(ParsingError::UnexpectedNegotiationToken),
    }
}

/// Parses a NegTokenTarg received from the server.
pub fn unwrap_targ(bytes: &[u8]) -> Result<NegTokenTarg, ParsingError> {
    let token: NegotiationToken = der::decode(bytes)
        .map_err(|e| ParsingError::InvalidDer(e.to_string()))?;
    match token {
        NegotiationToken::Targ(targ) => Ok(targ),
        NegotiationToken::Init(_) => Err(ParsingError::UnexpectedNegotiationToken),
    }
}

/// Formats an object identifier in dotted notation.
pub fn oid_to_string(oid: &[u32]) -> String {
    let mut ret = String::new();
    for (i, arc) in oid.iter().enumerate() {
        if i > 0 {
            ret.push('.');
        }
        let _ = write!(ret, "{}", arc);
    }
    ret
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::NTLMSSP_MAGIC;

    const NTLMSSP_OID_DER: [u8; 12] = [0x06, 0x0a, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a];

    #[test]
    fn oid_formatting() {
        assert_eq!(oid_to_string(NTLMSSP_OID), "1.3.6.1.4.1.311.2.2.10");
        assert_eq!(oid_to_string(SPNEGO_OID), "1.3.6.1.5.5.2");
    }

    #[test]
    fn init_token_layout() {
        let mech_token = [&NTLMSSP_MAGIC[..], &[1u8, 0, 0, 0][..]].concat();
        let token = wrap_init(NTLMSSP_OID, &mech_token).unwrap();

        assert_eq!(token[0], 0x60); // APPLICATION 0
        assert_eq!(&token[2..10], &[0x06, 0x06, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x02]);
        assert!(token.windows(NTLMSSP_OID_DER.len()).any(|w| w == NTLMSSP_OID_DER));

        let decoded = unwrap_init(&token).unwrap();
        assert_eq!(decoded.mech_types, vec![ObjectIdentifier::from(NTLMSSP_OID)]);
        assert_eq!(decoded.mech_token.map(|t| t.to_vec()), Some(mech_token));
    }

    #[test]
    fn init_token_bytes() {
        let token = wrap_init(NTLMSSP_OID, &[0xde, 0xad]).unwrap();
        let expected: Vec<u8> = vec![
            0x60, 0x22,
                0x06, 0x06, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x02,
                0xa0, 0x18,
                    0x30, 0x16,
                        0xa0, 0x0e,
                            0x30, 0x0c,
                                0x06, 0x0a, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a,
                        0xa2, 0x04,
                            0x04, 0x02, 0xde, 0xad,
        ];
        assert_eq!(token, expected);
    }

    #[test]
    fn targ_token_bytes() {
        let token = wrap_targ(&[0xca, 0xfe]).unwrap();
        assert_eq!(token, vec![0xa1, 0x08, 0x30, 0x06, 0xa2, 0x04, 0x04, 0x02, 0xca, 0xfe]);
    }

    #[test]
    fn targ_round_trips_arbitrary_payloads() {
        for len in [0usize, 1, 127, 128, 255, 256, 4096, 65_535] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
            let token = unwrap_targ(&wrap_targ(&payload).unwrap()).unwrap();
            assert_eq!(token.response_token.map(|t| t.to_vec()), Some(payload), "payload of {} bytes", len);
            assert_eq!(token.negotiation_result, None);
        }
    }

    #[test]
    fn long_form_lengths() {
        let token = wrap_targ(&[0u8; 300]).unwrap();
        // [1] { SEQUENCE { [2] { OCTET STRING } } } with two-byte lengths throughout
        assert_eq!(&token[0..4], &[0xa1, 0x82, 0x01, 0x38]);
        assert_eq!(&token[4..8], &[0x30, 0x82, 0x01, 0x34]);
        assert_eq!(&token[8..12], &[0xa2, 0x82, 0x01, 0x30]);
        assert_eq!(&token[12..16], &[0x04, 0x82, 0x01, 0x2c]);
    }

    #[test]
    fn targ_from_server() {
        let challenge = [&NTLMSSP_MAGIC[..], &[2u8, 0, 0, 0][..]].concat();
        let server_token = NegTokenTarg {
            negotiation_result: Some(NegotiationResult::AcceptIncomplete),
            supported_mech: Some(ObjectIdentifier::from(NTLMSSP_OID)),
            response_token: Some(OctetString::from(challenge)),
            mech_list_mic: None,
        };
        let bytes = server_token.to_bytes().unwrap();
        assert_eq!(&bytes[0..1], &[0xa1]);
        assert!(bytes.windows(NTLMSSP_OID_DER.len()).any(|w| w == NTLMSSP_OID_DER));

        let decoded = unwrap_targ(&bytes).unwrap();
        assert_eq!(decoded, server_token);
    }

    #[test]
    fn final_targ_without_token() {
        // negState accept-completed only, as sent with STATUS_SUCCESS
        let bytes = [0xa1, 0x07, 0x30, 0x05, 0xa0, 0x03, 0x0a, 0x01, 0x00];
        let decoded = unwrap_targ(&bytes).unwrap();
        assert_eq!(decoded.negotiation_result, Some(NegotiationResult::AcceptCompleted));
        assert_eq!(decoded.response_token, None);
    }

    #[test]
    fn malformed_targ_is_rejected() {
        let bytes = wrap_targ(&[1, 2, 3, 4]).unwrap();

        // truncated
        assert!(matches!(unwrap_targ(&bytes[..bytes.len() - 1]), Err(ParsingError::InvalidDer(_))));
        // an initial token is not a targ token
        assert!(unwrap_targ(&wrap_init(NTLMSSP_OID, &[]).unwrap()).is_err());
        // bogus negotiation result
        let bad_result = [0xa1, 0x07, 0x30, 0x05, 0xa0, 0x03, 0x0a, 0x01, 0x09];
        assert!(matches!(unwrap_targ(&bad_result), Err(ParsingError::InvalidDer(_))));
    }

    #[test]
    fn init_in_place_of_targ_is_reported() {
        let init = NegotiationToken::Init(NegTokenInit::default());
        let bytes = der::encode(&init).unwrap();
        assert_eq!(unwrap_targ(&bytes), Err(ParsingError::UnexpectedNegotiationToken));
    }
}
