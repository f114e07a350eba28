//! Conversion between two catalog encodings through code points

use std::sync::Arc;

use serde::Serialize;

use crate::handle::{EncodingHandle, Engine};
use crate::{Codepoint, Error, REPLACEMENT, Result};

/// Output of a lossy conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    /// Bytes in the target encoding
    pub bytes: Vec<u8>,
    /// Whether any unit was malformed or unmappable
    pub lossy: bool,
}

/// Direct byte -> byte table between two single-byte encodings
struct ByteMap {
    table: [Option<u8>; 256],
}

impl ByteMap {
    fn new(from: &EncodingHandle, to: &EncodingHandle) -> Option<Self> {
        let (Engine::SingleByte(source), Engine::SingleByte(_)) = (from.engine(), to.engine())
        else {
            return None;
        };
        let mut table = [None; 256];
        for (byte, slot) in table.iter_mut().enumerate() {
            let codepoint = source.decode(byte as u8);
            if codepoint != REPLACEMENT {
                *slot = to.encode_one(codepoint).ok().map(|e| e.as_bytes()[0]);
            }
        }
        Some(Self { table })
    }

    #[inline]
    fn get(&self, byte: u8) -> Option<u8> {
        self.table[byte as usize]
    }
}

/// Converts bytes from one encoding to another
pub struct Translator {
    from: Arc<EncodingHandle>,
    to: Arc<EncodingHandle>,
    byte_map: Option<Box<ByteMap>>,
}

impl Translator {
    /// Create a translator between two handles.
    ///
    /// A double-byte target is primed so every code point it can represent
    /// is encodable from the start.
    pub fn new(from: Arc<EncodingHandle>, to: Arc<EncodingHandle>) -> Self {
        if let Engine::DoubleByte(engine) = to.engine() {
            engine.prime();
        }
        let byte_map = ByteMap::new(&from, &to).map(Box::new);
        tracing::debug!(
            from = from.name(),
            to = to.name(),
            direct = byte_map.is_some(),
            "created translator"
        );
        Self { from, to, byte_map }
    }

    /// Source encoding
    pub fn from_encoding(&self) -> &EncodingHandle {
        &self.from
    }

    /// Target encoding
    pub fn to_encoding(&self) -> &EncodingHandle {
        &self.to
    }

    /// Whether conversion runs through a direct byte table
    pub fn is_direct(&self) -> bool {
        self.byte_map.is_some()
    }

    /// Convert, failing on the first malformed or unmappable unit
    pub fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        if let Some(map) = &self.byte_map {
            let mut output = Vec::with_capacity(input.len());
            for (position, &byte) in input.iter().enumerate() {
                match map.get(byte) {
                    Some(translated) => output.push(translated),
                    None => return Err(self.failure(input, position)),
                }
            }
            return Ok(output);
        }

        let mut output = Vec::with_capacity(input.len());
        for (position, decoded) in self.from.decoded_units(input) {
            if decoded.malformed {
                return Err(Error::InvalidSequence {
                    byte: input[position],
                    position,
                });
            }
            let encoded = self
                .to
                .encode_one(decoded.codepoint)
                .map_err(|_| Error::UnmappableTarget {
                    codepoint: decoded.codepoint,
                    position,
                })?;
            output.extend_from_slice(encoded.as_bytes());
        }
        Ok(output)
    }

    /// Convert single-byte data in place.
    ///
    /// The buffer is left untouched when any byte cannot be converted.
    pub fn convert_in_place(&self, buffer: &mut [u8]) -> Result<()> {
        let Some(map) = &self.byte_map else {
            return Err(Error::UnsupportedEncoding {
                name: self.to.name(),
                reason: format!(
                    "in-place conversion from {} needs single-byte encodings on both sides",
                    self.from.name()
                ),
            });
        };
        if let Some(position) = buffer.iter().position(|&b| map.get(b).is_none()) {
            return Err(self.failure(buffer, position));
        }
        for byte in buffer.iter_mut() {
            if let Some(translated) = map.get(*byte) {
                *byte = translated;
            }
        }
        Ok(())
    }

    /// Convert, writing `replacement` for every malformed or unmappable unit.
    ///
    /// Fails only when `replacement` itself is not encodable in the target.
    pub fn convert_lossy(&self, input: &[u8], replacement: Codepoint) -> Result<Conversion> {
        let fallback = self.to.encode_one(replacement)?;
        let mut bytes = Vec::with_capacity(input.len());
        let mut lossy = false;
        for (_, decoded) in self.from.decoded_units(input) {
            let encoded = if decoded.malformed {
                None
            } else {
                self.to.encode_one(decoded.codepoint).ok()
            };
            match encoded {
                Some(encoded) => bytes.extend_from_slice(encoded.as_bytes()),
                None => {
                    lossy = true;
                    bytes.extend_from_slice(fallback.as_bytes());
                }
            }
        }
        Ok(Conversion { bytes, lossy })
    }

    fn failure(&self, input: &[u8], position: usize) -> Error {
        match self.from.decode_one(input, position) {
            Ok(decoded) if !decoded.malformed => Error::UnmappableTarget {
                codepoint: decoded.codepoint,
                position,
            },
            _ => Error::InvalidSequence {
                byte: input[position],
                position,
            },
        }
    }
}
