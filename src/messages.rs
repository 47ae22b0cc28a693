//! Serialization and deserialization of the NTLMSSP Negotiate, Challenge and Authenticate
//! messages.
//!
//! Every message starts with a header of fixed fields. Variable-length data (names, responses,
//! keys) lives in a payload region appended after the header and is addressed from the header
//! through [`SecurityBuffer`]s, each a `(length, capacity, offset)` triple counted from the start
//! of the message.


use crate::Flags;
use crate::encoding::{ntlm_bytes_to_string, string_to_ntlm_bytes, utf16_le_bytes, utf16_le_bytes_to_string};
use crate::error::{ParsingError, StoringError};


/// The magic value at the start of every NTLMSSP data packet.
pub const NTLMSSP_MAGIC: [u8; 8] = *b"NTLMSSP\0";

pub const NEGOTIATE_MESSAGE_TYPE: u32 = 0x0000_0001;
pub const CHALLENGE_MESSAGE_TYPE: u32 = 0x0000_0002;
pub const AUTHENTICATE_MESSAGE_TYPE: u32 = 0x0000_0003;

const NEGOTIATE_HEADER_LEN: u32
    = 8 // magic
    + 4 // message type
    + 4 // flags
    + 8 // supplied domain secbuffer
    + 8 // supplied workstation secbuffer
    + 8 // version
    ;

/// Challenge header without the optional version block.
const CHALLENGE_MIN_HEADER_LEN: usize
    = 8 // magic
    + 4 // message type
    + 8 // target name secbuffer
    + 4 // flags
    + 8 // server challenge
    + 8 // reserved
    + 8 // target information secbuffer
    ;
const CHALLENGE_HEADER_LEN: u32 = CHALLENGE_MIN_HEADER_LEN as u32 + 8;

/// Authenticate header without the optional version block.
const AUTHENTICATE_MIN_HEADER_LEN: usize
    = 8 // magic
    + 4 // message type
    + 8 // LM response secbuffer
    + 8 // NT response secbuffer
    + 8 // domain name secbuffer
    + 8 // user name secbuffer
    + 8 // workstation name secbuffer
    + 8 // encrypted session key secbuffer
    + 4 // flags
    ;
const AUTHENTICATE_HEADER_LEN: u32 = AUTHENTICATE_MIN_HEADER_LEN as u32 + 8;


/// An NTLM message.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Message {
    Negotiate(NegotiateMessage),
    Challenge(ChallengeMessage),
    Authenticate(AuthenticateMessage),
    Other(u32, Vec<u8>),
}
impl Message {
    /// Returns the 32-bit message number identifying the type of this message.
    pub fn message_number(&self) -> u32 {
        match self {
            Self::Negotiate(_) => NEGOTIATE_MESSAGE_TYPE,
            Self::Challenge(_) => CHALLENGE_MESSAGE_TYPE,
            Self::Authenticate(_) => AUTHENTICATE_MESSAGE_TYPE,
            Self::Other(t, _data) => *t,
        }
    }

    /// Serializes the NTLM message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        match self {
            Self::Negotiate(t1m) => t1m.to_bytes(),
            Self::Challenge(t2m) => t2m.to_bytes(),
            Self::Authenticate(t3m) => t3m.to_bytes(),
            Self::Other(msg_num, data) => {
                let mut buf = Vec::with_capacity(12 + data.len());
                buf.extend_from_slice(&NTLMSSP_MAGIC);
                buf.extend_from_slice(&msg_num.to_le_bytes());
                buf.extend_from_slice(data);
                Ok(buf)
            },
        }
    }
}
impl TryFrom<&[u8]> for Message {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let message_type = check_magic(value)?;
        match message_type {
            NEGOTIATE_MESSAGE_TYPE => NegotiateMessage::decode(value)
                .map(Message::Negotiate),
            CHALLENGE_MESSAGE_TYPE => ChallengeMessage::decode(value)
                .map(Message::Challenge),
            AUTHENTICATE_MESSAGE_TYPE => AuthenticateMessage::decode(value)
                .map(Message::Authenticate),
            other_type => Ok(Message::Other(other_type, Vec::from(&value[12..]))),
        }
    }
}


/// A structure representing the version of an operating system as well as the NTLM revision used.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct OsVersion {
    pub major_version: u8,
    pub minor_version: u8,
    pub build_number: u16,
    pub reserved: [u8; 3],
    pub ntlm_revision: u8,
}
impl OsVersion {
    /// Serializes the OS version structure into bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        let build = self.build_number.to_le_bytes();
        [
            self.major_version,
            self.minor_version,
            build[0],
            build[1],
            self.reserved[0],
            self.reserved[1],
            self.reserved[2],
            self.ntlm_revision,
        ]
    }
}
impl TryFrom<&[u8]> for OsVersion {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != 8 {
            return Err(ParsingError::ItemLengthMismatch { expected: 8, obtained: value.len() });
        }

        Ok(OsVersion {
            major_version: value[0],
            minor_version: value[1],
            build_number: le_u16(value, 2),
            reserved: [value[4], value[5], value[6]],
            ntlm_revision: value[7],
        })
    }
}


/// The contents of an NTLM Negotiate message.
///
/// The Negotiate message is the first message in an NTLM challenge-response process and is sent by
/// the client to the server; the server is expected to respond with a Challenge message.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct NegotiateMessage {
    /// Stores which NTLM behavior should be negotiated.
    pub flags: Flags,

    /// The domain against which the client wishes to authenticate. Usually left empty.
    pub supplied_domain: String,

    /// The NT hostname of the client. Usually left empty.
    pub supplied_workstation: String,

    /// Version information about the client's operating system.
    pub os_version: OsVersion,
}
impl NegotiateMessage {
    /// A minimal Negotiate message requesting `flags`, with no domain or workstation supplied.
    pub fn new(flags: Flags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Serializes the Negotiate message into bytes.
    ///
    /// A minimal message (empty domain and workstation) always succeeds.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let mut writer = PayloadWriter::new(NEGOTIATE_MESSAGE_TYPE, NEGOTIATE_HEADER_LEN);
        writer.push(&self.flags.bits().to_le_bytes());
        writer.push_string(self.flags, &self.supplied_domain)?;
        writer.push_string(self.flags, &self.supplied_workstation)?;
        writer.push(&self.os_version.to_bytes());
        Ok(writer.finish())
    }

    /// Parses a complete Negotiate message, including magic and message type.
    pub fn decode(value: &[u8]) -> Result<Self, ParsingError> {
        check_header(value, NEGOTIATE_MESSAGE_TYPE, 32)?;

        let flags = Flags::from_bits_retain(le_u32(value, 12));
        let supplied_domain_secbuf = SecurityBuffer::try_from(&value[16..24])?;
        let supplied_workstation_secbuf = SecurityBuffer::try_from(&value[24..32])?;
        let os_version = read_version(value, flags, 32, &[&supplied_domain_secbuf, &supplied_workstation_secbuf])?;

        let supplied_domain = ntlm_bytes_to_string(flags, supplied_domain_secbuf.apply_to_slice(value)?)?;
        let supplied_workstation = ntlm_bytes_to_string(flags, supplied_workstation_secbuf.apply_to_slice(value)?)?;

        Ok(Self {
            flags,
            supplied_domain,
            supplied_workstation,
            os_version,
        })
    }
}


/// The contents of an NTLM Challenge message.
///
/// The Challenge message is sent by the server in response to the client's Negotiate message; the
/// client is expected to respond with an Authenticate message.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ChallengeMessage {
    /// The host or domain against which the client is authenticating.
    pub target_name: String,

    /// Stores which NTLM behavior has been accepted by the server from the client's request.
    pub flags: Flags,

    /// The server's nonce.
    pub server_challenge: [u8; 8],

    /// Information about the target of the authentication as a raw sequence of AV pairs.
    ///
    /// The client echoes this back verbatim inside its NTLMv2 response, so it is not normalized in
    /// any way. Use [`ChallengeMessage::target_info_entries`] to inspect it.
    pub target_info: Vec<u8>,

    /// Version information about the server's operating system.
    pub os_version: OsVersion,
}
impl ChallengeMessage {
    /// Serializes the Challenge message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let mut writer = PayloadWriter::new(CHALLENGE_MESSAGE_TYPE, CHALLENGE_HEADER_LEN);
        writer.push_string(self.flags, &self.target_name)?;
        writer.push(&self.flags.bits().to_le_bytes());
        writer.push(&self.server_challenge);
        writer.push(&[0u8; 8]);
        writer.push_buffer(&self.target_info)?;
        writer.push(&self.os_version.to_bytes());
        Ok(writer.finish())
    }

    /// Parses a complete Challenge message, including magic and message type.
    ///
    /// Fails if the buffer is truncated, does not carry the NTLMSSP magic, is not a Challenge
    /// message or any of its security buffers reaches beyond the end of the message.
    pub fn decode(value: &[u8]) -> Result<Self, ParsingError> {
        check_header(value, CHALLENGE_MESSAGE_TYPE, CHALLENGE_MIN_HEADER_LEN)?;

        let target_name_secbuf = SecurityBuffer::try_from(&value[12..20])?;
        let flags = Flags::from_bits_retain(le_u32(value, 20));
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&value[24..32]);
        // 32..40 is reserved
        let target_info_secbuf = SecurityBuffer::try_from(&value[40..48])?;
        let os_version = read_version(value, flags, CHALLENGE_MIN_HEADER_LEN, &[&target_name_secbuf, &target_info_secbuf])?;

        let target_name = ntlm_bytes_to_string(flags, target_name_secbuf.apply_to_slice(value)?)?;
        let target_info = Vec::from(target_info_secbuf.apply_to_slice(value)?);

        Ok(Self {
            target_name,
            flags,
            server_challenge,
            target_info,
            os_version,
        })
    }

    /// Parses the target info blob into its AV pairs, stopping at the terminator entry.
    pub fn target_info_entries(&self) -> Result<Vec<TargetInfoEntry>, ParsingError> {
        let mut entries = Vec::new();
        let mut rest = self.target_info.as_slice();
        while !rest.is_empty() {
            let (entry, next) = TargetInfoEntry::try_from_bytes(rest)?;
            if entry.entry_type == TargetInfoType::Terminator {
                break;
            }
            entries.push(entry);
            rest = next;
        }
        Ok(entries)
    }
}


/// The contents of an NTLM Authenticate message.
///
/// The Authenticate message is sent by the client in response to the server's Challenge message;
/// once it is accepted by the server, the authentication has succeeded.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct AuthenticateMessage {
    /// The LM response; always empty for NTLMv2 authentication.
    pub lm_response: Vec<u8>,

    /// The NTLMv2 response: the 16-byte proof followed by the client challenge blob.
    pub ntlm_response: Vec<u8>,

    pub domain_name: String,
    pub user_name: String,
    pub workstation_name: String,

    /// The encrypted random session key; empty unless key exchange was negotiated.
    pub session_key: Vec<u8>,

    pub flags: Flags,
    pub os_version: OsVersion,
}
impl AuthenticateMessage {
    /// Serializes the Authenticate message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let mut writer = PayloadWriter::new(AUTHENTICATE_MESSAGE_TYPE, AUTHENTICATE_HEADER_LEN);
        writer.push_buffer(&self.lm_response)?;
        writer.push_buffer(&self.ntlm_response)?;
        writer.push_string(self.flags, &self.domain_name)?;
        writer.push_string(self.flags, &self.user_name)?;
        writer.push_string(self.flags, &self.workstation_name)?;
        writer.push_buffer(&self.session_key)?;
        writer.push(&self.flags.bits().to_le_bytes());
        writer.push(&self.os_version.to_bytes());
        Ok(writer.finish())
    }

    /// Parses a complete Authenticate message, including magic and message type.
    pub fn decode(value: &[u8]) -> Result<Self, ParsingError> {
        check_header(value, AUTHENTICATE_MESSAGE_TYPE, AUTHENTICATE_MIN_HEADER_LEN)?;

        let lm_response_secbuf = SecurityBuffer::try_from(&value[12..20])?;
        let ntlm_response_secbuf = SecurityBuffer::try_from(&value[20..28])?;
        let domain_name_secbuf = SecurityBuffer::try_from(&value[28..36])?;
        let user_name_secbuf = SecurityBuffer::try_from(&value[36..44])?;
        let workstation_name_secbuf = SecurityBuffer::try_from(&value[44..52])?;
        let session_key_secbuf = SecurityBuffer::try_from(&value[52..60])?;
        let flags = Flags::from_bits_retain(le_u32(value, 60));
        let os_version = read_version(
            value, flags, AUTHENTICATE_MIN_HEADER_LEN,
            &[
                &lm_response_secbuf, &ntlm_response_secbuf, &domain_name_secbuf,
                &user_name_secbuf, &workstation_name_secbuf, &session_key_secbuf,
            ],
        )?;

        Ok(Self {
            lm_response: Vec::from(lm_response_secbuf.apply_to_slice(value)?),
            ntlm_response: Vec::from(ntlm_response_secbuf.apply_to_slice(value)?),
            domain_name: ntlm_bytes_to_string(flags, domain_name_secbuf.apply_to_slice(value)?)?,
            user_name: ntlm_bytes_to_string(flags, user_name_secbuf.apply_to_slice(value)?)?,
            workstation_name: ntlm_bytes_to_string(flags, workstation_name_secbuf.apply_to_slice(value)?)?,
            session_key: Vec::from(session_key_secbuf.apply_to_slice(value)?),
            flags,
            os_version,
        })
    }
}


/// An NTLM security buffer, pointing to data contained later in the message.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SecurityBuffer {
    pub length: u16,
    pub capacity: u16,
    pub offset: u32,
}
impl SecurityBuffer {
    /// Generates a security buffer describing `slice` stored at `offset`.
    pub fn for_slice(slice: &[u8], offset: u32) -> Result<Self, StoringError> {
        let length: u16 = slice.len()
            .try_into()
            .or(Err(StoringError::FieldTooLong { length: slice.len() }))?;
        Ok(Self {
            length,
            capacity: length,
            offset,
        })
    }

    /// Serializes the security buffer into bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut ret = [0u8; 8];
        ret[0..2].copy_from_slice(&self.length.to_le_bytes());
        ret[2..4].copy_from_slice(&self.capacity.to_le_bytes());
        ret[4..8].copy_from_slice(&self.offset.to_le_bytes());
        ret
    }

    /// Applies the security buffer to a complete message, extracting the data itself.
    pub fn apply_to_slice<'a>(&self, message: &'a [u8]) -> Result<&'a [u8], ParsingError> {
        if self.length == 0 {
            // servers are free to put anything into the offset of an empty buffer
            return Ok(&[]);
        }

        let out_of_range = ParsingError::BufferOutOfRange {
            offset: self.offset,
            length: self.length,
            message_len: message.len(),
        };
        let start: usize = self.offset.try_into()
            .or(Err(out_of_range.clone()))?;
        let end = start.checked_add(usize::from(self.length))
            .ok_or_else(|| out_of_range.clone())?;
        message.get(start..end)
            .ok_or(out_of_range)
    }
}
impl TryFrom<&[u8]> for SecurityBuffer {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != 8 {
            return Err(ParsingError::ItemLengthMismatch { expected: 8, obtained: value.len() });
        }

        Ok(Self {
            length: le_u16(value, 0),
            capacity: le_u16(value, 2),
            offset: le_u32(value, 4),
        })
    }
}


/// Assembles a message from its fixed header and the payload region behind it.
///
/// Security buffers are written into the header in field order while their data is appended to
/// the payload; the offset of the next buffer is always the header length plus the payload
/// written so far, so references can neither overlap nor point outside the message.
struct PayloadWriter {
    header: Vec<u8>,
    payload: Vec<u8>,
    header_len: u32,
}
impl PayloadWriter {
    fn new(message_type: u32, header_len: u32) -> Self {
        let mut header = Vec::with_capacity(header_len as usize);
        header.extend_from_slice(&NTLMSSP_MAGIC);
        header.extend_from_slice(&message_type.to_le_bytes());
        Self {
            header,
            payload: Vec::new(),
            header_len,
        }
    }

    /// Appends a fixed-size field to the header.
    fn push(&mut self, bytes: &[u8]) {
        self.header.extend_from_slice(bytes);
    }

    /// Appends a security buffer to the header and its data to the payload.
    fn push_buffer(&mut self, data: &[u8]) -> Result<(), StoringError> {
        let offset = u32::try_from(self.payload.len())
            .ok()
            .and_then(|len| len.checked_add(self.header_len))
            .ok_or(StoringError::FieldTooLong { length: self.payload.len() })?;
        let sb = SecurityBuffer::for_slice(data, offset)?;
        self.header.extend_from_slice(&sb.to_bytes());
        self.payload.extend_from_slice(data);
        Ok(())
    }

    /// Like [`PayloadWriter::push_buffer`], encoding the string as selected by `flags` first.
    fn push_string(&mut self, flags: Flags, string: &str) -> Result<(), StoringError> {
        let bytes = string_to_ntlm_bytes(flags, string)?;
        self.push_buffer(&bytes)
    }

    fn finish(mut self) -> Vec<u8> {
        debug_assert_eq!(self.header.len(), self.header_len as usize);
        self.header.append(&mut self.payload);
        self.header
    }
}


/// The type of an AV pair in the target information of the Challenge message.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TargetInfoType {
    Terminator,
    NbComputerName,
    NbDomainName,
    DnsComputerName,
    DnsDomainName,
    DnsTreeName,
    Flags,
    Timestamp,
    SingleHost,
    TargetName,
    ChannelBindings,
    Unknown(u16),
}
impl From<TargetInfoType> for u16 {
    fn from(t: TargetInfoType) -> Self {
        match t {
            TargetInfoType::Terminator => 0x0000,
            TargetInfoType::NbComputerName => 0x0001,
            TargetInfoType::NbDomainName => 0x0002,
            TargetInfoType::DnsComputerName => 0x0003,
            TargetInfoType::DnsDomainName => 0x0004,
            TargetInfoType::DnsTreeName => 0x0005,
            TargetInfoType::Flags => 0x0006,
            TargetInfoType::Timestamp => 0x0007,
            TargetInfoType::SingleHost => 0x0008,
            TargetInfoType::TargetName => 0x0009,
            TargetInfoType::ChannelBindings => 0x000A,
            TargetInfoType::Unknown(w) => w,
        }
    }
}
impl From<u16> for TargetInfoType {
    fn from(w: u16) -> Self {
        match w {
            0x0000 => TargetInfoType::Terminator,
            0x0001 => TargetInfoType::NbComputerName,
            0x0002 => TargetInfoType::NbDomainName,
            0x0003 => TargetInfoType::DnsComputerName,
            0x0004 => TargetInfoType::DnsDomainName,
            0x0005 => TargetInfoType::DnsTreeName,
            0x0006 => TargetInfoType::Flags,
            0x0007 => TargetInfoType::Timestamp,
            0x0008 => TargetInfoType::SingleHost,
            0x0009 => TargetInfoType::TargetName,
            0x000A => TargetInfoType::ChannelBindings,
            other => TargetInfoType::Unknown(other),
        }
    }
}

/// One AV pair of the target information included in the Challenge message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TargetInfoEntry {
    pub entry_type: TargetInfoType,
    pub data: Vec<u8>,
}
impl TargetInfoEntry {
    /// Creates a target info entry from an entry type and a string.
    pub fn from_string(entry_type: TargetInfoType, string: &str) -> Self {
        // always Unicode, even if flags claim OEM
        Self {
            entry_type,
            data: utf16_le_bytes(string),
        }
    }

    /// Serializes the target info entry into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let entry_type_u16: u16 = self.entry_type.into();
        let bytes_len: u16 = self.data.len()
            .try_into()
            .or(Err(StoringError::FieldTooLong { length: self.data.len() }))?;

        let mut ret = Vec::with_capacity(4 + self.data.len());
        ret.extend_from_slice(&entry_type_u16.to_le_bytes());
        ret.extend_from_slice(&bytes_len.to_le_bytes());
        ret.extend_from_slice(&self.data);
        Ok(ret)
    }

    /// Attempts to deserialize a target info entry from the given byte slice. If successful,
    /// returns the deserialized target info entry as well as any bytes remaining in the slice.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), ParsingError> {
        if bytes.len() < 4 {
            return Err(ParsingError::ItemMinLengthMismatch { expected_at_least: 4, obtained: bytes.len() });
        }

        let entry_type: TargetInfoType = le_u16(bytes, 0).into();
        let length = usize::from(le_u16(bytes, 2));
        if length + 4 > bytes.len() {
            return Err(ParsingError::ItemMinLengthMismatch { expected_at_least: length + 4, obtained: bytes.len() });
        }

        let entry = Self {
            entry_type,
            data: Vec::from(&bytes[4..4+length]),
        };
        Ok((entry, &bytes[4+length..]))
    }

    /// Attempts to decode the data within this entry as a UTF-16 string.
    pub fn value_as_string(&self) -> Result<String, ParsingError> {
        utf16_le_bytes_to_string(&self.data)
    }
}


// byte-level helpers; callers have already verified the length of the slice


fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Verifies the magic and returns the message type.
fn check_magic(value: &[u8]) -> Result<u32, ParsingError> {
    if value.len() < 12 {
        return Err(ParsingError::ShortHeader { expected_min_len: 12, obtained_len: value.len() });
    }
    if value[0..8] != NTLMSSP_MAGIC {
        return Err(ParsingError::MagicMismatch { expected: NTLMSSP_MAGIC, obtained: Vec::from(&value[0..8]) });
    }
    Ok(le_u32(value, 8))
}

fn check_header(value: &[u8], expected_type: u32, min_len: usize) -> Result<(), ParsingError> {
    let message_type = check_magic(value)?;
    if message_type != expected_type {
        return Err(ParsingError::UnexpectedMessageType { expected: expected_type, obtained: message_type });
    }
    if value.len() < min_len {
        return Err(ParsingError::ShortHeader { expected_min_len: min_len, obtained_len: value.len() });
    }
    Ok(())
}

/// Reads the version block following the fixed header, if the flags announce one and the header
/// actually leaves room for it.
///
/// The version block ends where the payload begins at the latest, so a message whose first
/// non-empty security buffer starts right behind the fixed header has no version block even if
/// the flag is set.
fn read_version(value: &[u8], flags: Flags, at: usize, buffers: &[&SecurityBuffer]) -> Result<OsVersion, ParsingError> {
    let payload_start = buffers.iter()
        .filter(|b| b.length > 0)
        .map(|b| usize::try_from(b.offset).unwrap_or(usize::MAX))
        .min()
        .unwrap_or(value.len());
    if flags.contains(Flags::NEGOTIATE_VERSION) && payload_start >= at + 8 && value.len() >= at + 8 {
        OsVersion::try_from(&value[at..at + 8])
    } else {
        Ok(OsVersion::default())
    }
}
