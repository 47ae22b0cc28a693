//! Text encoding functions.
//!
//! NTLM transports text either as UTF-16 in little-endian byte order or in an "OEM" code page.
//! Outside of Windows there is no system-wide OEM code page; the absolute majority of systems use
//! UTF-8, so that is what the OEM encoding maps to here.


use crate::Flags;
use crate::error::{ParsingError, StoringError};


/// Encodes a string as UTF-16 in little-endian byte order without a Byte Order Mark.
pub fn utf16_le_bytes(string: &str) -> Vec<u8> {
    string.encode_utf16()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

/// Converts UTF-16 values stored as bytes in little-endian format into a string.
pub fn utf16_le_bytes_to_string(bytes: &[u8]) -> Result<String, ParsingError> {
    if bytes.len() % 2 != 0 {
        return Err(ParsingError::ItemLengthNotDivisible { expected_divisor: 2, obtained_length: bytes.len() });
    }
    let u16s: Vec<u16> = bytes.chunks_exact(2)
        .map(|chk| u16::from_le_bytes([chk[0], chk[1]]))
        .collect();
    String::from_utf16(&u16s)
        .or(Err(ParsingError::InvalidUtf16 { value: u16s }))
}

/// Converts a string in the OEM encoding into a Rust string.
fn oem_bytes_to_string(bytes: &[u8]) -> Result<String, ParsingError> {
    String::from_utf8(Vec::from(bytes))
        .map_err(|_| ParsingError::InvalidOemEncoding { value: Vec::from(bytes) })
}

/// Decodes a string field, using UTF-16 or the OEM encoding depending on the `flags`.
pub(crate) fn ntlm_bytes_to_string(flags: Flags, bytes: &[u8]) -> Result<String, ParsingError> {
    if bytes.is_empty() {
        Ok(String::new())
    } else if flags.contains(Flags::NEGOTIATE_UNICODE) {
        utf16_le_bytes_to_string(bytes)
    } else if flags.contains(Flags::NEGOTIATE_OEM) {
        oem_bytes_to_string(bytes)
    } else {
        Err(ParsingError::NeitherUnicodeNorOem)
    }
}

/// Encodes a string field, using UTF-16 or the OEM encoding depending on the `flags`.
pub(crate) fn string_to_ntlm_bytes(flags: Flags, string: &str) -> Result<Vec<u8>, StoringError> {
    if string.is_empty() {
        Ok(Vec::new())
    } else if flags.contains(Flags::NEGOTIATE_UNICODE) {
        Ok(utf16_le_bytes(string))
    } else if flags.contains(Flags::NEGOTIATE_OEM) {
        Ok(Vec::from(string.as_bytes()))
    } else {
        Err(StoringError::NeitherUnicodeNorOem)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_is_little_endian_without_bom() {
        assert_eq!(utf16_le_bytes("Ab"), vec![0x41, 0x00, 0x62, 0x00]);
        assert_eq!(utf16_le_bytes_to_string(&[0x41, 0x00, 0x62, 0x00]).unwrap(), "Ab");
    }

    #[test]
    fn odd_utf16_length_is_rejected() {
        assert_eq!(
            utf16_le_bytes_to_string(&[0x41, 0x00, 0x62]),
            Err(ParsingError::ItemLengthNotDivisible { expected_divisor: 2, obtained_length: 3 }),
        );
    }

    #[test]
    fn encoding_follows_flags() {
        assert_eq!(string_to_ntlm_bytes(Flags::NEGOTIATE_OEM, "ab").unwrap(), b"ab".to_vec());
        assert_eq!(string_to_ntlm_bytes(Flags::empty(), "ab"), Err(StoringError::NeitherUnicodeNorOem));
        assert_eq!(string_to_ntlm_bytes(Flags::empty(), "").unwrap(), Vec::<u8>::new());
        assert_eq!(ntlm_bytes_to_string(Flags::empty(), b"ab"), Err(ParsingError::NeitherUnicodeNorOem));
    }
}
