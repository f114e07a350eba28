//! Uniform entry point the editor converts through

use serde::Serialize;

use crate::double_byte::DoubleByteEngine;
use crate::fixed_width::FixedWidthCodec;
use crate::single_byte::SingleByteEngine;
use crate::{Classification, Codepoint, Decoded, Encoded, Error, Result};

/// Catalog metadata carried by a handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingInfo {
    /// Position in the catalog
    pub index: usize,
    /// Display name
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Suggested font for displaying the encoding
    pub font_name: &'static str,
    /// How bytes map to code points
    pub classification: Classification,
}

/// Conversion state owned by a handle
#[derive(Debug)]
pub enum Engine {
    /// Fully built 256-entry tables
    SingleByte(SingleByteEngine),
    /// Lazily cached lead-byte/row tables
    DoubleByte(DoubleByteEngine),
    /// Stateless Unicode transform
    FixedWidth(FixedWidthCodec),
}

/// Shared handle for one encoding
#[derive(Debug)]
pub struct EncodingHandle {
    info: EncodingInfo,
    engine: Engine,
}

impl EncodingHandle {
    pub(crate) fn new(info: EncodingInfo, engine: Engine) -> Self {
        Self { info, engine }
    }

    /// Catalog metadata
    pub fn info(&self) -> &EncodingInfo {
        &self.info
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Classification, fixed for the lifetime of the handle
    pub fn classification(&self) -> Classification {
        self.info.classification
    }

    /// The engine behind this handle
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Whether `byte` starts a two-byte sequence; always false unless double-byte
    pub fn is_lead_byte(&self, byte: u8) -> bool {
        match &self.engine {
            Engine::DoubleByte(engine) => engine.is_lead_byte(byte),
            Engine::SingleByte(_) | Engine::FixedWidth(_) => false,
        }
    }

    /// Decode the unit starting at `offset`.
    ///
    /// Malformed input never fails: it yields [`crate::REPLACEMENT`] with
    /// `malformed` set so the caller can carry on from `offset + len`.
    pub fn decode_one(&self, bytes: &[u8], offset: usize) -> Result<Decoded> {
        let rest = match bytes.get(offset..) {
            Some(rest) if !rest.is_empty() => rest,
            _ => return Err(Error::EndOfInput { offset }),
        };
        Ok(match &self.engine {
            Engine::SingleByte(engine) => engine.decode_one(rest),
            Engine::DoubleByte(engine) => engine.decode_one(rest),
            Engine::FixedWidth(codec) => codec.decode_one(rest),
        })
    }

    /// Encode one code point; never substitutes
    pub fn encode_one(&self, codepoint: Codepoint) -> Result<Encoded> {
        match &self.engine {
            Engine::SingleByte(engine) => engine.encode(codepoint),
            Engine::DoubleByte(engine) => engine.encode(codepoint),
            Engine::FixedWidth(codec) => codec.encode(codepoint),
        }
    }

    /// Decode a whole buffer, resynchronising after malformed units
    pub fn decode_all(&self, bytes: &[u8]) -> Vec<Codepoint> {
        self.decoded_units(bytes).map(|(_, d)| d.codepoint).collect()
    }

    /// Decode into a `String`, reporting whether anything was malformed
    pub fn decode_to_string(&self, bytes: &[u8]) -> (String, bool) {
        let mut text = String::with_capacity(bytes.len());
        let mut lossy = false;
        for (_, decoded) in self.decoded_units(bytes) {
            lossy |= decoded.malformed;
            text.push(char::from_u32(decoded.codepoint).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        (text, lossy)
    }

    /// Encode code points, writing `fallback` for unmappable ones
    pub fn encode_all(&self, codepoints: &[Codepoint], fallback: u8) -> (Vec<u8>, bool) {
        let mut output = Vec::with_capacity(codepoints.len());
        let mut lossy = false;
        for &codepoint in codepoints {
            match self.encode_one(codepoint) {
                Ok(encoded) => output.extend_from_slice(encoded.as_bytes()),
                Err(_) => {
                    lossy = true;
                    output.push(fallback);
                }
            }
        }
        (output, lossy)
    }

    /// Iterate `(offset, decoded)` over a buffer
    pub fn decoded_units<'a>(&'a self, bytes: &'a [u8]) -> DecodedUnits<'a> {
        DecodedUnits {
            handle: self,
            bytes,
            offset: 0,
        }
    }
}

/// Iterator returned by [`EncodingHandle::decoded_units`]
pub struct DecodedUnits<'a> {
    handle: &'a EncodingHandle,
    bytes: &'a [u8],
    offset: usize,
}

impl Iterator for DecodedUnits<'_> {
    type Item = (usize, Decoded);

    fn next(&mut self) -> Option<Self::Item> {
        let decoded = self.handle.decode_one(self.bytes, self.offset).ok()?;
        let offset = self.offset;
        // Always make progress, even if an engine reports zero length
        self.offset += decoded.len.max(1);
        Some((offset, decoded))
    }
}
