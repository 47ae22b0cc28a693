//! NTLMv2 response calculation and session key derivation.
//!
//! Everything in here is a pure function of its inputs, except for the client nonce and the
//! exchanged master key, which are drawn from the random source passed in by the caller.


use std::fmt;

use chrono::Utc;
use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;
use rand::{CryptoRng, RngCore};
use rc4::{KeyInit, Rc4, StreamCipher};
use rc4::consts::U16;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{AuthenticationContext, Flags};
use crate::encoding::utf16_le_bytes;
use crate::error::CryptoError;
use crate::messages::{AuthenticateMessage, ChallengeMessage, OsVersion};


type HmacMd5 = Hmac<Md5>;

/// The number of 100ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

/// The length of the NTLMv2 proof at the start of the NT response.
pub const NT_PROOF_LEN: usize = 16;

/// The length of a client challenge blob with an empty target info.
pub const MIN_CLIENT_BLOB_LEN: usize = 28;


/// A 16-byte session key. Wiped from memory when dropped.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 16]);
impl SessionKey {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// The outcome of the key exchange sub-protocol.
#[derive(Clone, Debug)]
pub struct KeyExchange {
    /// The master key encrypted with the session base key; this is transmitted to the server.
    pub encrypted_key: Vec<u8>,

    /// The master key itself, which becomes the working session key.
    pub exported_key: SessionKey,
}

/// The response to an NTLM challenge.
#[derive(Clone, Debug)]
pub struct ChallengeResponse {
    /// The LM response; always empty.
    pub lm_response: Vec<u8>,

    /// The NTLMv2 response (proof followed by the client challenge blob).
    pub ntlm_response: Vec<u8>,

    /// The encrypted master key to transmit; empty unless key exchange took place.
    pub encrypted_session_key: Vec<u8>,

    /// The working session key; absent unless signing was negotiated.
    pub session_key: Option<SessionKey>,
}
impl ChallengeResponse {
    /// Converts this response to a challenge into an Authenticate message.
    pub fn to_message(&self, context: &AuthenticationContext, flags: Flags) -> AuthenticateMessage {
        AuthenticateMessage {
            lm_response: self.lm_response.clone(),
            ntlm_response: self.ntlm_response.clone(),
            domain_name: context.domain.clone(),
            user_name: context.username.clone(),
            workstation_name: String::new(),
            session_key: self.encrypted_session_key.clone(),
            flags,
            os_version: OsVersion::default(),
        }
    }
}


/// Obtains the current NTLM timestamp: tenths of a microsecond since 1601-01-01 UTC.
pub fn ntlm_time() -> u64 {
    let now = Utc::now();
    let ticks = now.timestamp()
        .saturating_mul(10_000_000)
        .saturating_add(i64::from(now.timestamp_subsec_nanos() / 100))
        .saturating_add(FILETIME_UNIX_EPOCH);
    u64::try_from(ticks).unwrap_or(0)
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    // HMAC pads or hashes the key to the block size, so no key length is rejected
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key)
        .expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    let mut ret = [0u8; 16];
    ret.copy_from_slice(mac.finalize().into_bytes().as_slice());
    ret
}

/// Encrypts (or, equivalently, decrypts) `data` with RC4 under a 16-byte `key`.
pub fn rc4(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut cipher = Rc4::<U16>::new_from_slice(key)
        .map_err(CryptoError::InvalidKeyLength)?;
    let mut buf = Vec::from(data);
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}


/// Derives the NT one-way hash of a password (NTOWFv1).
///
/// The password is encoded as UTF-16 in little-endian byte order (without the Byte Order Mark) and
/// hashed using MD4.
pub fn ntowf_v1(password: &str) -> [u8; 16] {
    let mut password_bytes = utf16_le_bytes(password);
    let mut md4_state = <Md4 as Digest>::new();
    md4_state.update(&password_bytes);
    password_bytes.zeroize();

    let mut ret = [0u8; 16];
    ret.copy_from_slice(md4_state.finalize().as_slice());
    ret
}

/// Derives the NTLMv2 response key (NTOWFv2).
///
/// This is an HMAC-MD5 whose key is [`ntowf_v1`] of the password and whose plaintext is the
/// uppercased username followed by the unchanged-case domain, both encoded as UTF-16LE. The domain
/// may be empty.
pub fn response_key_nt(password: &str, username: &str, domain: &str) -> [u8; 16] {
    let mut hmac_key = ntowf_v1(password);
    let upper_user_bytes = utf16_le_bytes(&username.to_uppercase());
    let dom_bytes = utf16_le_bytes(domain);
    let ret = hmac_md5(&hmac_key, &[upper_user_bytes.as_slice(), dom_bytes.as_slice()]);
    hmac_key.zeroize();
    ret
}

/// Assembles the NTLMv2 client challenge blob.
///
/// ```plain
/// 01 01 00 00 | 00 00 00 00 | time (8) | client challenge (8) | 00 00 00 00 | target info | 00 00 00 00
/// ```
pub fn client_challenge_blob(client_challenge: [u8; 8], time: u64, target_info: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(MIN_CLIENT_BLOB_LEN + target_info.len());
    blob.push(0x01); // RespType
    blob.push(0x01); // HiRespType
    blob.extend_from_slice(&[0u8; 6]);
    blob.extend_from_slice(&time.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0u8; 4]);
    blob
}

/// Calculates the NTLMv2 response: the HMAC-MD5 proof over server challenge and blob, followed by
/// the blob itself.
pub fn ntlm_v2_response(response_key_nt: &[u8; 16], server_challenge: [u8; 8], client_blob: &[u8]) -> Vec<u8> {
    let nt_proof = hmac_md5(response_key_nt, &[&server_challenge[..], client_blob]);

    let mut response = Vec::with_capacity(NT_PROOF_LEN + client_blob.len());
    response.extend_from_slice(&nt_proof);
    response.extend_from_slice(client_blob);
    response
}

/// Derives the session base key (the NTLMv2 user session key) from the proof at the start of an
/// NTLMv2 response.
pub fn session_base_key(response_key_nt: &[u8; 16], ntlm_v2_response: &[u8]) -> SessionKey {
    let proof_len = ntlm_v2_response.len().min(NT_PROOF_LEN);
    SessionKey(hmac_md5(response_key_nt, &[&ntlm_v2_response[..proof_len]]))
}

/// Exchanges a fresh random master key, encrypting it with RC4 under the session base key.
pub fn key_exchange<R: RngCore + CryptoRng>(session_base_key: &SessionKey, rng: &mut R) -> Result<KeyExchange, CryptoError> {
    let mut master_key = [0u8; 16];
    rng.fill_bytes(&mut master_key);
    let exported_key = SessionKey(master_key);
    master_key.zeroize();

    let encrypted_key = rc4(session_base_key.as_bytes(), exported_key.as_bytes())?;
    Ok(KeyExchange {
        encrypted_key,
        exported_key,
    })
}

/// Calculates an NTLMv2 response to the given challenge, including the target info and time
/// value to protect against replay attacks.
///
/// Session key material depends on `flags`, which must be the flags that will be sent in the
/// Authenticate message: without `NEGOTIATE_SIGN` there is none; with it, the session base key is
/// used unless `NEGOTIATE_KEY_EXCHANGE` is also set, in which case a random master key is
/// exchanged.
pub fn respond_challenge_ntlm_v2<R: RngCore + CryptoRng>(
    challenge: &ChallengeMessage,
    flags: Flags,
    context: &AuthenticationContext,
    time: u64,
    rng: &mut R,
) -> Result<ChallengeResponse, CryptoError> {
    let mut client_challenge = [0u8; 8];
    rng.fill_bytes(&mut client_challenge);

    let blob = client_challenge_blob(client_challenge, time, &challenge.target_info);
    let mut ntlm_key = response_key_nt(&context.password, &context.username, &context.domain);
    let ntlm_response = ntlm_v2_response(&ntlm_key, challenge.server_challenge, &blob);

    let mut encrypted_session_key = Vec::new();
    let session_key = if flags.contains(Flags::NEGOTIATE_SIGN) {
        let base_key = session_base_key(&ntlm_key, &ntlm_response);
        if flags.contains(Flags::NEGOTIATE_KEY_EXCHANGE) {
            let exchange = key_exchange(&base_key, rng)?;
            encrypted_session_key = exchange.encrypted_key;
            Some(exchange.exported_key)
        } else {
            Some(base_key)
        }
    } else {
        None
    };
    ntlm_key.zeroize();

    Ok(ChallengeResponse {
        lm_response: Vec::new(),
        ntlm_response,
        encrypted_session_key,
        session_key,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    // test vectors from MS-NLMP 4.2.4
    const SERVER_CHALLENGE: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
    const CLIENT_CHALLENGE: [u8; 8] = [0xaa; 8];
    const TARGET_INFO: [u8; 36] = [
        0x02, 0x00, 0x0c, 0x00, 0x44, 0x00, 0x6f, 0x00, 0x6d, 0x00, 0x61, 0x00, 0x69, 0x00, 0x6e, 0x00,
        0x01, 0x00, 0x0c, 0x00, 0x53, 0x00, 0x65, 0x00, 0x72, 0x00, 0x76, 0x00, 0x65, 0x00, 0x72, 0x00,
        0x00, 0x00, 0x00, 0x00,
    ];
    const RESPONSE_KEY_NT: [u8; 16] = [
        0x0c, 0x86, 0x8a, 0x40, 0x3b, 0xfd, 0x7a, 0x93, 0xa3, 0x00, 0x1e, 0xf2, 0x2e, 0xf0, 0x2e, 0x3f,
    ];
    const NT_PROOF: [u8; 16] = [
        0x68, 0xcd, 0x0a, 0xb8, 0x51, 0xe5, 0x1c, 0x96, 0xaa, 0xbc, 0x92, 0x7b, 0xeb, 0xef, 0x6a, 0x1c,
    ];
    const SESSION_BASE_KEY: [u8; 16] = [
        0x8d, 0xe4, 0x0c, 0xca, 0xdb, 0xc1, 0x4a, 0x82, 0xf1, 0x5c, 0xb0, 0xad, 0x0d, 0xe9, 0x5c, 0xa3,
    ];
    const ENCRYPTED_SESSION_KEY: [u8; 16] = [
        0xc5, 0xda, 0xd2, 0x54, 0x4f, 0xc9, 0x79, 0x90, 0x94, 0xce, 0x1c, 0xe9, 0x0b, 0xc9, 0xd0, 0x3e,
    ];

    /// Yields the same byte over and over.
    struct RepeatRng(u8);
    impl RngCore for RepeatRng {
        fn next_u32(&mut self) -> u32 { u32::from_le_bytes([self.0; 4]) }
        fn next_u64(&mut self) -> u64 { u64::from_le_bytes([self.0; 8]) }
        fn fill_bytes(&mut self, dest: &mut [u8]) { dest.fill(self.0) }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }
    impl CryptoRng for RepeatRng {}

    fn context() -> AuthenticationContext {
        AuthenticationContext::new("User", "Domain", "Password")
    }

    #[test]
    fn ntowf_v1_vector() {
        assert_eq!(
            ntowf_v1("Password"),
            [0xa4, 0xf4, 0x9c, 0x40, 0x65, 0x10, 0xbd, 0xca, 0xb6, 0x82, 0x4e, 0xe7, 0xc3, 0x0f, 0xd8, 0x52],
        );
    }

    #[test]
    fn response_key_nt_vector() {
        assert_eq!(response_key_nt("Password", "User", "Domain"), RESPONSE_KEY_NT);
        // the username is case-insensitive
        assert_eq!(response_key_nt("Password", "uSeR", "Domain"), RESPONSE_KEY_NT);
    }

    #[test]
    fn response_key_nt_depends_on_every_input() {
        let base = response_key_nt("Password", "User", "Domain");
        assert_ne!(response_key_nt("password", "User", "Domain"), base);
        assert_ne!(response_key_nt("Password", "User2", "Domain"), base);
        assert_ne!(response_key_nt("Password", "User", "DOMAIN"), base);
        assert_ne!(response_key_nt("Password", "User", ""), base);
        assert_eq!(response_key_nt("Password", "User", ""), response_key_nt("Password", "User", ""));
    }

    #[test]
    fn client_blob_layout() {
        let blob = client_challenge_blob(CLIENT_CHALLENGE, 0x0102_0304_0506_0708, &TARGET_INFO);
        assert_eq!(blob.len(), MIN_CLIENT_BLOB_LEN + TARGET_INFO.len());
        assert_eq!(&blob[0..8], &[1, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&blob[8..16], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&blob[16..24], &CLIENT_CHALLENGE);
        assert_eq!(&blob[24..28], &[0; 4]);
        assert_eq!(&blob[28..64], &TARGET_INFO);
        assert_eq!(&blob[64..], &[0; 4]);

        assert_eq!(client_challenge_blob(CLIENT_CHALLENGE, 0, &[]).len(), MIN_CLIENT_BLOB_LEN);
    }

    #[test]
    fn ntlm_v2_response_vector() {
        let blob = client_challenge_blob(CLIENT_CHALLENGE, 0, &TARGET_INFO);
        let response = ntlm_v2_response(&RESPONSE_KEY_NT, SERVER_CHALLENGE, &blob);

        assert_eq!(response.len(), NT_PROOF_LEN + blob.len());
        assert_eq!(&response[..16], &NT_PROOF);
        assert_eq!(&response[16..], blob.as_slice());
    }

    #[test]
    fn session_base_key_vector() {
        let blob = client_challenge_blob(CLIENT_CHALLENGE, 0, &TARGET_INFO);
        let response = ntlm_v2_response(&RESPONSE_KEY_NT, SERVER_CHALLENGE, &blob);
        assert_eq!(session_base_key(&RESPONSE_KEY_NT, &response).as_bytes(), &SESSION_BASE_KEY);
    }

    #[test]
    fn session_base_key_depends_on_inputs() {
        let blob = client_challenge_blob(CLIENT_CHALLENGE, 0, &TARGET_INFO);
        let response = ntlm_v2_response(&RESPONSE_KEY_NT, SERVER_CHALLENGE, &blob);
        let base = session_base_key(&RESPONSE_KEY_NT, &response);

        assert_eq!(session_base_key(&RESPONSE_KEY_NT, &response), base);

        let mut other_key = RESPONSE_KEY_NT;
        other_key[0] ^= 0x01;
        assert_ne!(session_base_key(&other_key, &response), base);

        let mut other_response = response.clone();
        other_response[3] ^= 0x80;
        assert_ne!(session_base_key(&RESPONSE_KEY_NT, &other_response), base);
    }

    #[test]
    fn key_exchange_vector() {
        let base_key = SessionKey::from_bytes(SESSION_BASE_KEY);
        let exchange = key_exchange(&base_key, &mut RepeatRng(0x55)).unwrap();
        assert_eq!(exchange.encrypted_key, ENCRYPTED_SESSION_KEY.to_vec());
        assert_eq!(exchange.exported_key.as_bytes(), &[0x55; 16]);

        // RC4 is its own inverse
        assert_eq!(rc4(&SESSION_BASE_KEY, &ENCRYPTED_SESSION_KEY).unwrap(), vec![0x55; 16]);
    }

    #[test]
    fn rc4_rejects_short_keys() {
        assert!(matches!(rc4(&[0u8; 5], b"data"), Err(CryptoError::InvalidKeyLength(_))));
    }

    #[test]
    fn full_response_with_key_exchange() {
        let challenge = ChallengeMessage {
            flags: Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_SIGN | Flags::NEGOTIATE_KEY_EXCHANGE,
            server_challenge: SERVER_CHALLENGE,
            target_info: TARGET_INFO.to_vec(),
            ..ChallengeMessage::default()
        };
        let response = respond_challenge_ntlm_v2(&challenge, challenge.flags, &context(), 0, &mut RepeatRng(0xaa)).unwrap();

        // the client challenge is drawn first, so it matches the vector
        assert_eq!(&response.ntlm_response[..16], &NT_PROOF);
        assert!(response.lm_response.is_empty());

        let expected_master = rc4(&SESSION_BASE_KEY, &response.encrypted_session_key).unwrap();
        assert_eq!(response.session_key.unwrap().as_bytes().to_vec(), expected_master);
    }

    #[test]
    fn full_response_without_key_exchange_uses_session_base_key() {
        let challenge = ChallengeMessage {
            flags: Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_SIGN,
            server_challenge: SERVER_CHALLENGE,
            target_info: TARGET_INFO.to_vec(),
            ..ChallengeMessage::default()
        };
        let response = respond_challenge_ntlm_v2(&challenge, challenge.flags, &context(), 0, &mut RepeatRng(0xaa)).unwrap();

        assert!(response.encrypted_session_key.is_empty());
        assert_eq!(response.session_key.unwrap().as_bytes(), &SESSION_BASE_KEY);
    }

    #[test]
    fn key_material_follows_the_given_flags() {
        let challenge = ChallengeMessage {
            flags: Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_SIGN | Flags::NEGOTIATE_KEY_EXCHANGE,
            server_challenge: SERVER_CHALLENGE,
            target_info: TARGET_INFO.to_vec(),
            ..ChallengeMessage::default()
        };

        let flags = Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_SIGN;
        let response = respond_challenge_ntlm_v2(&challenge, flags, &context(), 0, &mut RepeatRng(0xaa)).unwrap();
        assert!(response.encrypted_session_key.is_empty());
        assert_eq!(response.session_key.unwrap().as_bytes(), &SESSION_BASE_KEY);

        let response = respond_challenge_ntlm_v2(&challenge, Flags::NEGOTIATE_UNICODE, &context(), 0, &mut RepeatRng(0xaa)).unwrap();
        assert!(response.encrypted_session_key.is_empty());
        assert!(response.session_key.is_none());
    }

    #[test]
    fn full_response_without_signing_has_no_key() {
        let challenge = ChallengeMessage {
            flags: Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_KEY_EXCHANGE,
            server_challenge: SERVER_CHALLENGE,
            target_info: TARGET_INFO.to_vec(),
            ..ChallengeMessage::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let response = respond_challenge_ntlm_v2(&challenge, challenge.flags, &context(), ntlm_time(), &mut rng).unwrap();

        assert!(response.session_key.is_none());
        assert!(response.encrypted_session_key.is_empty());
        assert_eq!(response.ntlm_response.len(), NT_PROOF_LEN + MIN_CLIENT_BLOB_LEN + TARGET_INFO.len());
    }

    #[test]
    fn fresh_nonces_change_the_response() {
        let challenge = ChallengeMessage {
            flags: Flags::NEGOTIATE_UNICODE,
            server_challenge: SERVER_CHALLENGE,
            ..ChallengeMessage::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let first = respond_challenge_ntlm_v2(&challenge, challenge.flags, &context(), 0, &mut rng).unwrap();
        let second = respond_challenge_ntlm_v2(&challenge, challenge.flags, &context(), 0, &mut rng).unwrap();
        assert_ne!(first.ntlm_response, second.ntlm_response);
    }

    #[test]
    fn hmac_takes_keys_of_any_length() {
        // RFC 2104: an empty key is padded, a key longer than the block is hashed first
        let empty = hmac_md5(&[], &[]);
        assert_eq!(empty, [
            0x74, 0xe6, 0xf7, 0x29, 0x8a, 0x9c, 0x2d, 0x16, 0x89, 0x35, 0xf5, 0x8c, 0x00, 0x1b, 0xad, 0x88,
        ]);
        let long = hmac_md5(&[0xaa; 80], &[b"Test Using Larger Than Block-Size Key - Hash Key First"]);
        assert_eq!(long, [
            0x6b, 0x1a, 0xb7, 0xfe, 0x4b, 0xd7, 0xbf, 0x8f, 0x0b, 0x62, 0xe6, 0xce, 0x61, 0xb9, 0xd0, 0xcd,
        ]);
    }

    #[test]
    fn ntlm_time_is_after_2020() {
        // 2020-01-01 as a FILETIME
        assert!(ntlm_time() > 132_223_104_000_000_000);
    }

    #[test]
    fn session_key_debug_is_redacted() {
        let key = SessionKey::from_bytes([0x42; 16]);
        assert_eq!(format!("{:?}", key), "SessionKey(..)");
    }
}
