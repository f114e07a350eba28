//! # wxm-encoding - Codepoint Conversion Engine
//!
//! Converts byte buffers in legacy or Unicode text encodings to and from
//! 32-bit code points, one unit at a time, so an editor can load, display
//! and save files in many character sets.
//!
//! ## Features
//!
//! - **Single-byte code pages** with eagerly built 256-entry tables and
//!   code-page specific corrections (DOS/OEM, Windows-874)
//! - **Double-byte code pages** (Shift_JIS, GBK, Big5, EUC-KR, ...) with lazy,
//!   per-row cached tables that are safe to share between threads
//! - **Fixed-width Unicode forms**: UTF-8, UTF-16LE/BE, UTF-32LE/BE
//! - **Flyweight catalog**: one shared handle per encoding identity
//!
//! ## Quick Start
//!
//! ```rust
//! use wxm_encoding::{Catalog, CatalogConfig};
//!
//! let catalog = Catalog::new(CatalogConfig::default());
//! let sjis = catalog.lookup("Windows-932").unwrap();
//!
//! // "あ" in Shift_JIS
//! let decoded = sjis.decode_one(&[0x82, 0xA0], 0).unwrap();
//! assert_eq!(decoded.codepoint, 0x3042);
//! assert_eq!(decoded.len, 2);
//!
//! let utf16 = catalog.lookup("UTF-16BE").unwrap();
//! assert_eq!(utf16.encode_one(0x10000).unwrap().as_bytes(), &[0xD8, 0x00, 0xDC, 0x00]);
//! ```

#![deny(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod codec;
pub mod config;
pub mod detection;
pub mod double_byte;
pub mod fixed_width;
pub mod fixer;
pub mod handle;
pub mod single_byte;
pub mod translate;

pub use catalog::{Catalog, CatalogEntry, EncodingId};
pub use codec::CodepointCodec;
pub use config::CatalogConfig;
pub use handle::{EncodingHandle, EncodingInfo, Engine};
pub use translate::{Conversion, Translator};

/// A Unicode scalar value, or [`REPLACEMENT`] for undecodable input
pub type Codepoint = u32;

/// Replacement sentinel returned for invalid input and written by fixers
/// for bytes a code page leaves undefined
pub const REPLACEMENT: Codepoint = 0xFFFD;

/// Highest valid Unicode scalar value
pub const MAX_CODEPOINT: Codepoint = 0x10FFFF;

/// Result type for encoding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during encoding operations
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Code point has no representation in the target encoding
    Unmappable {
        /// The unmappable code point
        codepoint: Codepoint,
    },
    /// Code point at a known input position cannot be encoded
    UnmappableTarget {
        /// The unmappable code point
        codepoint: Codepoint,
        /// Byte offset of the decoded unit in the input
        position: usize,
    },
    /// Bytes at a position could not be interpreted by the source encoding
    InvalidSequence {
        /// First byte of the malformed sequence
        byte: u8,
        /// Position of the byte in input
        position: usize,
    },
    /// Decode was asked to read at or past the end of the buffer
    EndOfInput {
        /// Requested offset
        offset: usize,
    },
    /// Name or index not present in the catalog
    UnknownEncoding(String),
    /// Catalog entry whose conversion provider is unavailable
    UnsupportedEncoding {
        /// Catalog name of the encoding
        name: &'static str,
        /// Why the provider could not be created
        reason: String,
    },
    /// Configuration could not be read or parsed
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unmappable { codepoint } => {
                write!(f, "Cannot encode U+{:04X} in target encoding", codepoint)
            }
            Error::UnmappableTarget {
                codepoint,
                position,
            } => {
                write!(
                    f,
                    "Cannot encode U+{:04X} decoded at position {}",
                    codepoint, position
                )
            }
            Error::InvalidSequence { byte, position } => {
                write!(
                    f,
                    "Invalid byte sequence starting with 0x{:02X} at position {}",
                    byte, position
                )
            }
            Error::EndOfInput { offset } => write!(f, "No input left at offset {}", offset),
            Error::UnknownEncoding(id) => write!(f, "Unknown encoding: {}", id),
            Error::UnsupportedEncoding { name, reason } => {
                write!(f, "Encoding {} is not available: {}", name, reason)
            }
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// How an encoding maps bytes to code points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// One byte per character, 256-entry table
    SingleByte,
    /// Lead/trail byte pairs backed by the general conversion library
    DoubleByte,
    /// Lead/trail byte pairs backed by the numeric code-page provider
    DoubleByteAltCodec,
    /// UTF-8
    Utf8,
    /// UTF-16 little endian
    Utf16Le,
    /// UTF-16 big endian
    Utf16Be,
    /// UTF-32 little endian
    Utf32Le,
    /// UTF-32 big endian
    Utf32Be,
}

impl Classification {
    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::SingleByte => "single_byte",
            Classification::DoubleByte => "double_byte",
            Classification::DoubleByteAltCodec => "double_byte_alt_codec",
            Classification::Utf8 => "utf8",
            Classification::Utf16Le => "utf16le",
            Classification::Utf16Be => "utf16be",
            Classification::Utf32Le => "utf32le",
            Classification::Utf32Be => "utf32be",
        }
    }

    /// Whether lead bytes exist in this encoding
    pub fn is_double_byte(self) -> bool {
        matches!(
            self,
            Classification::DoubleByte | Classification::DoubleByteAltCodec
        )
    }

    /// Whether this is one of the fixed-width Unicode transforms
    pub fn is_unicode(self) -> bool {
        matches!(
            self,
            Classification::Utf8
                | Classification::Utf16Le
                | Classification::Utf16Be
                | Classification::Utf32Le
                | Classification::Utf32Be
        )
    }

    /// Get the byte order mark (BOM) for this encoding if it has one
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            Classification::Utf8 => Some(&[0xEF, 0xBB, 0xBF]),
            Classification::Utf16Le => Some(&[0xFF, 0xFE]),
            Classification::Utf16Be => Some(&[0xFE, 0xFF]),
            Classification::Utf32Le => Some(&[0xFF, 0xFE, 0x00, 0x00]),
            Classification::Utf32Be => Some(&[0x00, 0x00, 0xFE, 0xFF]),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of decoding one unit from a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Decoded code point, [`REPLACEMENT`] when malformed
    pub codepoint: Codepoint,
    /// Number of bytes consumed
    pub len: usize,
    /// The bytes could not be interpreted
    pub malformed: bool,
}

impl Decoded {
    pub(crate) fn new(codepoint: Codepoint, len: usize) -> Self {
        Self {
            codepoint,
            len,
            malformed: codepoint == REPLACEMENT,
        }
    }

    pub(crate) fn invalid(len: usize) -> Self {
        Self {
            codepoint: REPLACEMENT,
            len,
            malformed: true,
        }
    }
}

/// Bytes produced by encoding one code point
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    bytes: [u8; 4],
    len: u8,
}

impl Encoded {
    pub(crate) fn from_slice(src: &[u8]) -> Self {
        let len = src.len().min(4);
        let mut bytes = [0u8; 4];
        bytes[..len].copy_from_slice(&src[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of encoded bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false for a successful encode
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Encoded {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Encoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Encoded({:02X?})", self.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_jis_round_trip() {
        let catalog = Catalog::new(CatalogConfig::default());
        let sjis = catalog.lookup("Windows-932").unwrap();

        let input = &[0x82, 0xA0, b'A', 0x82, 0xA2];
        let codepoints = sjis.decode_all(input);
        assert_eq!(codepoints, vec![0x3042, 0x41, 0x3044]);

        let (bytes, lossy) = sjis.encode_all(&codepoints, b'?');
        assert!(!lossy);
        assert_eq!(bytes, input);
    }

    #[test]
    fn test_windows_1252_to_utf16le() {
        let catalog = Catalog::new(CatalogConfig::default());
        let translator = Translator::new(
            catalog.lookup("Windows-1252").unwrap(),
            catalog.lookup("UTF-16LE").unwrap(),
        );

        // Euro symbol is 0x80 in Windows-1252
        let output = translator.convert(&[0x80]).unwrap();
        assert_eq!(output, vec![0xAC, 0x20]);
    }

    #[test]
    fn test_utf16_surrogate_pair_bytes() {
        let catalog = Catalog::new(CatalogConfig::default());
        let le = catalog.lookup("UTF-16LE").unwrap();
        let be = catalog.lookup("UTF-16BE").unwrap();

        assert_eq!(le.encode_one(0x10000).unwrap().as_bytes(), &[0x00, 0xD8, 0x00, 0xDC]);
        assert_eq!(be.encode_one(0x10000).unwrap().as_bytes(), &[0xD8, 0x00, 0xDC, 0x00]);
    }

    #[test]
    fn test_utf32_bytes() {
        let catalog = Catalog::new(CatalogConfig::default());
        let le = catalog.lookup("UTF-32LE").unwrap();
        let be = catalog.lookup("UTF-32BE").unwrap();

        assert_eq!(le.encode_one(0x41).unwrap().as_bytes(), &[0x41, 0x00, 0x00, 0x00]);
        assert_eq!(be.encode_one(0x41).unwrap().as_bytes(), &[0x00, 0x00, 0x00, 0x41]);
    }

    #[test]
    fn test_cp437_box_drawing() {
        let catalog = Catalog::new(CatalogConfig::default());
        let cp437 = catalog.lookup("CP437").unwrap();

        let text: String = cp437.decode_to_string(&[0xC9, 0xCD, 0xBB, 0x20, 0xF8]).0;
        assert_eq!(text, "╔═╗ °");
        assert_eq!(cp437.decode_one(&[0xFF], 0).unwrap().codepoint, 0x00A0);
    }

    #[test]
    fn test_classification_properties() {
        assert!(Classification::DoubleByteAltCodec.is_double_byte());
        assert!(!Classification::SingleByte.is_double_byte());
        assert!(Classification::Utf32Be.is_unicode());
        assert_eq!(Classification::Utf8.bom(), Some([0xEF, 0xBB, 0xBF].as_slice()));
        assert_eq!(Classification::Utf16Le.bom(), Some([0xFF, 0xFE].as_slice()));
        assert_eq!(Classification::SingleByte.bom(), None);
        assert_eq!(Classification::Utf16Be.to_string(), "utf16be");
    }

    #[test]
    fn test_encoded_buffer() {
        let encoded = Encoded::from_slice(&[0xE3, 0x81, 0x82]);
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded.as_bytes(), &[0xE3, 0x81, 0x82]);
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidSequence {
            byte: 0x81,
            position: 7,
        };
        assert_eq!(
            err.to_string(),
            "Invalid byte sequence starting with 0x81 at position 7"
        );
        assert_eq!(
            Error::Unmappable { codepoint: 0x20AC }.to_string(),
            "Cannot encode U+20AC in target encoding"
        );
    }
}
