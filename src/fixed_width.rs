//! Unicode transform encodings: UTF-8, UTF-16 and UTF-32 in both byte orders
//!
//! Encoding is plain bit packing. Decoding is handed to [`UnicodeCodec`].

use crate::codec::{CodepointCodec, UnicodeCodec};
use crate::{Codepoint, Decoded, Encoded, Error, MAX_CODEPOINT, Result};

/// Byte order of 16- and 32-bit units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

/// One of the fixed-width Unicode forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnicodeForm {
    /// UTF-8
    Utf8,
    /// UTF-16 with the given byte order
    Utf16(Endian),
    /// UTF-32 with the given byte order
    Utf32(Endian),
}

impl UnicodeForm {
    /// Canonical name of the form
    pub fn name(self) -> &'static str {
        match self {
            UnicodeForm::Utf8 => "UTF-8",
            UnicodeForm::Utf16(Endian::Little) => "UTF-16LE",
            UnicodeForm::Utf16(Endian::Big) => "UTF-16BE",
            UnicodeForm::Utf32(Endian::Little) => "UTF-32LE",
            UnicodeForm::Utf32(Endian::Big) => "UTF-32BE",
        }
    }
}

fn is_surrogate(codepoint: Codepoint) -> bool {
    (0xD800..=0xDFFF).contains(&codepoint)
}

/// Stateless encoder/decoder for one Unicode form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWidthCodec {
    form: UnicodeForm,
    decoder: UnicodeCodec,
}

impl FixedWidthCodec {
    /// Create a codec for one form
    pub fn new(form: UnicodeForm) -> Self {
        Self {
            form,
            decoder: UnicodeCodec::new(form),
        }
    }

    /// The Unicode form this codec writes
    pub fn form(&self) -> UnicodeForm {
        self.form
    }

    /// Decode one unit; invalid input yields the replacement and advances one byte
    pub fn decode_one(&self, bytes: &[u8]) -> Decoded {
        match self.decoder.decode_unit(bytes) {
            Some((codepoint, len)) => Decoded {
                codepoint,
                len,
                malformed: false,
            },
            None => Decoded::invalid(1),
        }
    }

    /// Encode one code point
    pub fn encode(&self, codepoint: Codepoint) -> Result<Encoded> {
        if codepoint > MAX_CODEPOINT {
            return Err(Error::Unmappable { codepoint });
        }
        match self.form {
            UnicodeForm::Utf8 => encode_utf8(codepoint),
            UnicodeForm::Utf16(endian) => encode_utf16(codepoint, endian),
            UnicodeForm::Utf32(endian) => Ok(Encoded::from_slice(&match endian {
                Endian::Little => codepoint.to_le_bytes(),
                Endian::Big => codepoint.to_be_bytes(),
            })),
        }
    }
}

fn encode_utf8(codepoint: Codepoint) -> Result<Encoded> {
    let cp = codepoint;
    if cp < 0x80 {
        Ok(Encoded::from_slice(&[cp as u8]))
    } else if cp < 0x800 {
        Ok(Encoded::from_slice(&[
            0xC0 | (cp >> 6) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]))
    } else if cp < 0x10000 {
        if is_surrogate(cp) {
            return Err(Error::Unmappable { codepoint });
        }
        Ok(Encoded::from_slice(&[
            0xE0 | (cp >> 12) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]))
    } else {
        Ok(Encoded::from_slice(&[
            0xF0 | (cp >> 18) as u8,
            0x80 | ((cp >> 12) & 0x3F) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]))
    }
}

fn unit_bytes(unit: u16, endian: Endian) -> [u8; 2] {
    match endian {
        Endian::Little => unit.to_le_bytes(),
        Endian::Big => unit.to_be_bytes(),
    }
}

fn encode_utf16(codepoint: Codepoint, endian: Endian) -> Result<Encoded> {
    if codepoint < 0x10000 {
        if is_surrogate(codepoint) {
            return Err(Error::Unmappable { codepoint });
        }
        return Ok(Encoded::from_slice(&unit_bytes(codepoint as u16, endian)));
    }

    let v = codepoint - 0x10000;
    let high = unit_bytes(0xD800 + (v >> 10) as u16, endian);
    let low = unit_bytes(0xDC00 + (v & 0x3FF) as u16, endian);
    Ok(Encoded::from_slice(&[high[0], high[1], low[0], low[1]]))
}
