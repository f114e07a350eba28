//! One-byte encodings backed by a fully built 256-entry table

use std::collections::HashMap;

use crate::codec::CodepointCodec;
use crate::fixer::{ByteTable, TableFixer};
use crate::{Codepoint, Decoded, Encoded, Error, REPLACEMENT, Result};

/// Eagerly built byte <-> code point tables for a single-byte code page
#[derive(Debug, Clone)]
pub struct SingleByteEngine {
    /// Direct lookup table: byte -> code point (REPLACEMENT = undefined)
    to_unicode: ByteTable,
    /// Code point -> lowest byte producing it
    from_unicode: HashMap<Codepoint, u8>,
}

impl SingleByteEngine {
    /// Probe every byte through `codec`, apply `fixer`, then build the reverse map
    pub fn new(codec: &dyn CodepointCodec, fixer: TableFixer) -> Self {
        let mut to_unicode = [REPLACEMENT; 256];
        for (byte, entry) in to_unicode.iter_mut().enumerate() {
            if let Some((codepoint, 1)) = codec.decode_unit(&[byte as u8]) {
                *entry = codepoint;
            }
        }

        fixer.fix(&mut to_unicode);

        let mut from_unicode = HashMap::with_capacity(256);
        for (byte, &codepoint) in to_unicode.iter().enumerate() {
            if codepoint != REPLACEMENT {
                from_unicode.entry(codepoint).or_insert(byte as u8);
            }
        }

        tracing::debug!(
            codec = codec.name(),
            ?fixer,
            mapped = from_unicode.len(),
            "built single-byte table"
        );

        Self {
            to_unicode,
            from_unicode,
        }
    }

    /// Decode one byte, never fails
    #[inline]
    pub fn decode(&self, byte: u8) -> Codepoint {
        self.to_unicode[byte as usize]
    }

    /// Decode the first byte of `bytes`
    pub fn decode_one(&self, bytes: &[u8]) -> Decoded {
        match bytes.first() {
            Some(&byte) => Decoded::new(self.decode(byte), 1),
            None => Decoded::invalid(0),
        }
    }

    /// Encode one code point; the caller picks any substitute byte
    pub fn encode(&self, codepoint: Codepoint) -> Result<Encoded> {
        self.from_unicode
            .get(&codepoint)
            .map(|&byte| Encoded::from_slice(&[byte]))
            .ok_or(Error::Unmappable { codepoint })
    }

    /// Forward table after corrections
    pub fn table(&self) -> &ByteTable {
        &self.to_unicode
    }

    /// Number of distinct encodable code points
    pub fn mapped_len(&self) -> usize {
        self.from_unicode.len()
    }
}
