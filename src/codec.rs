//! Single-unit byte/codepoint conversion providers
//!
//! Engines never convert through a provider at runtime; they probe it while
//! building their tables. Every provider answers the same two questions:
//! what does the unit at the start of this buffer decode to, and which bytes
//! encode this code point.

use std::fmt;

use encoding_rs::Encoding as RsEncoding;

use crate::fixed_width::{Endian, FixedWidthCodec, UnicodeForm};
use crate::{Codepoint, Error, Result};

/// Longest unit any provider will examine
pub const MAX_UNIT_LEN: usize = 4;

/// Opaque single-unit byte <-> code point capability
pub trait CodepointCodec: Send + Sync + fmt::Debug {
    /// Provider-specific name of the underlying converter
    fn name(&self) -> &str;

    /// Decode the unit at the start of `bytes`.
    ///
    /// Returns the code point and the number of bytes it occupies, or `None`
    /// when the bytes are invalid or incomplete.
    fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)>;

    /// Encode one code point, `None` when the provider cannot represent it
    fn encode_unit(&self, codepoint: Codepoint) -> Option<Vec<u8>>;
}

/// Decode the shortest prefix of `bytes` that forms exactly one scalar value
fn decode_prefix(encoding: &'static RsEncoding, bytes: &[u8]) -> Option<(Codepoint, usize)> {
    for len in 1..=bytes.len().min(MAX_UNIT_LEN) {
        if let Some(text) =
            encoding.decode_without_bom_handling_and_without_replacement(&bytes[..len])
        {
            let mut chars = text.chars();
            return match (chars.next(), chars.next()) {
                (Some(ch), None) => Some((ch as Codepoint, len)),
                // Either nothing came out or the prefix holds several characters
                _ => None,
            };
        }
    }
    None
}

fn encode_with(encoding: &'static RsEncoding, codepoint: Codepoint) -> Option<Vec<u8>> {
    let ch = char::from_u32(codepoint)?;
    let mut buf = [0u8; 4];
    let (out, _, had_errors) = encoding.encode(ch.encode_utf8(&mut buf));
    if had_errors || out.is_empty() {
        None
    } else {
        Some(out.into_owned())
    }
}

/// General-purpose provider resolved by WHATWG label through `encoding_rs`
#[derive(Clone, Copy)]
pub struct LabelCodec {
    encoding: &'static RsEncoding,
}

impl LabelCodec {
    /// Resolve a label such as `"shift_jis"` or `"iso-8859-2"`
    pub fn for_label(label: &str) -> Result<Self> {
        RsEncoding::for_label(label.as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| Error::UnknownEncoding(label.to_string()))
    }
}

impl fmt::Debug for LabelCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LabelCodec").field(&self.encoding.name()).finish()
    }
}

impl CodepointCodec for LabelCodec {
    fn name(&self) -> &str {
        self.encoding.name()
    }

    fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
        decode_prefix(self.encoding, bytes)
    }

    fn encode_unit(&self, codepoint: Codepoint) -> Option<Vec<u8>> {
        encode_with(self.encoding.output_encoding(), codepoint)
    }
}

/// ISO-8859 part layered over a Windows superset: bytes 0x80..=0x9F are the
/// C1 controls instead of the Windows punctuation
#[derive(Debug, Clone, Copy)]
pub struct C1Codec {
    inner: LabelCodec,
}

const C1_CONTROLS: std::ops::RangeInclusive<u32> = 0x80..=0x9F;

impl C1Codec {
    /// Wrap the Windows code page named by `label`
    pub fn over_label(label: &str) -> Result<Self> {
        LabelCodec::for_label(label).map(|inner| Self { inner })
    }
}

impl CodepointCodec for C1Codec {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
        let first = *bytes.first()? as Codepoint;
        if C1_CONTROLS.contains(&first) {
            Some((first, 1))
        } else {
            self.inner.decode_unit(bytes)
        }
    }

    fn encode_unit(&self, codepoint: Codepoint) -> Option<Vec<u8>> {
        if C1_CONTROLS.contains(&codepoint) {
            return Some(vec![codepoint as u8]);
        }
        self.inner
            .encode_unit(codepoint)
            .filter(|bytes| !matches!(bytes[..], [byte] if C1_CONTROLS.contains(&(byte as u32))))
    }
}

/// Alternative provider resolved by numeric Windows code page
#[derive(Clone, Copy)]
pub struct CodePageCodec {
    code_page: u16,
    encoding: &'static RsEncoding,
}

impl CodePageCodec {
    /// Resolve a Windows code page number such as 936
    pub fn new(code_page: u16) -> Result<Self> {
        codepage::to_encoding(code_page)
            .map(|encoding| Self {
                code_page,
                encoding,
            })
            .ok_or_else(|| Error::UnknownEncoding(format!("code page {}", code_page)))
    }

    /// The Windows code page number
    pub fn code_page(&self) -> u16 {
        self.code_page
    }
}

impl fmt::Debug for CodePageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodePageCodec")
            .field("code_page", &self.code_page)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

impl CodepointCodec for CodePageCodec {
    fn name(&self) -> &str {
        self.encoding.name()
    }

    fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
        decode_prefix(self.encoding, bytes)
    }

    fn encode_unit(&self, codepoint: Codepoint) -> Option<Vec<u8>> {
        encode_with(self.encoding.output_encoding(), codepoint)
    }
}

/// DOS/OEM code pages from the `oem_cp` tables
pub struct OemCodec {
    code_page: u16,
    name: String,
    decode: &'static oem_cp::code_table_type::TableType,
    encode: &'static oem_cp::OEMCPHashMap<char, u8>,
}

impl OemCodec {
    /// Look up an OEM code page such as 437 or 852
    pub fn new(code_page: u16) -> Result<Self> {
        let unknown = || Error::UnknownEncoding(format!("OEM code page {}", code_page));
        let decode = oem_cp::code_table::DECODING_TABLE_CP_MAP
            .get(&code_page)
            .ok_or_else(unknown)?;
        let encode = oem_cp::code_table::ENCODING_TABLE_CP_MAP
            .get(&code_page)
            .copied()
            .ok_or_else(unknown)?;
        Ok(Self {
            code_page,
            name: format!("cp{}", code_page),
            decode,
            encode,
        })
    }
}

impl fmt::Debug for OemCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OemCodec").field(&self.code_page).finish()
    }
}

impl CodepointCodec for OemCodec {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
        let ch = self.decode.decode_char_checked(*bytes.first()?)?;
        Some((ch as Codepoint, 1))
    }

    fn encode_unit(&self, codepoint: Codepoint) -> Option<Vec<u8>> {
        let ch = char::from_u32(codepoint)?;
        oem_cp::encode_char_checked(ch, self.encode).map(|byte| vec![byte])
    }
}

/// Decode side of the fixed-width Unicode forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnicodeCodec {
    form: UnicodeForm,
}

impl UnicodeCodec {
    /// Provider for one Unicode form
    pub fn new(form: UnicodeForm) -> Self {
        Self { form }
    }
}

impl CodepointCodec for UnicodeCodec {
    fn name(&self) -> &str {
        self.form.name()
    }

    fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
        match self.form {
            UnicodeForm::Utf8 => decode_prefix(encoding_rs::UTF_8, bytes),
            UnicodeForm::Utf16(Endian::Little) => decode_prefix(encoding_rs::UTF_16LE, bytes),
            UnicodeForm::Utf16(Endian::Big) => decode_prefix(encoding_rs::UTF_16BE, bytes),
            UnicodeForm::Utf32(endian) => {
                let unit: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
                let value = match endian {
                    Endian::Little => u32::from_le_bytes(unit),
                    Endian::Big => u32::from_be_bytes(unit),
                };
                char::from_u32(value).map(|ch| (ch as Codepoint, 4))
            }
        }
    }

    fn encode_unit(&self, codepoint: Codepoint) -> Option<Vec<u8>> {
        FixedWidthCodec::new(self.form)
            .encode(codepoint)
            .ok()
            .map(|encoded| encoded.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_codec_single_and_double_units() {
        let sjis = LabelCodec::for_label("shift_jis").unwrap();

        assert_eq!(sjis.decode_unit(&[0x41, 0x82]), Some((0x41, 1)));
        assert_eq!(sjis.decode_unit(&[0x82, 0xA0]), Some((0x3042, 2)));
        // Lead byte alone is incomplete
        assert_eq!(sjis.decode_unit(&[0x82]), None);
        // Lead byte followed by a byte that cannot be a trail
        assert_eq!(sjis.decode_unit(&[0x82, 0x20]), None);
    }

    #[test]
    fn test_label_codec_encode() {
        let cp1252 = LabelCodec::for_label("windows-1252").unwrap();
        assert_eq!(cp1252.encode_unit(0x20AC), Some(vec![0x80]));
        assert_eq!(cp1252.encode_unit(0x3042), None);
        assert_eq!(cp1252.name(), "windows-1252");
    }

    #[test]
    fn test_c1_codec_latin1() {
        let latin1 = C1Codec::over_label("windows-1252").unwrap();
        assert_eq!(latin1.decode_unit(&[0x80]), Some((0x80, 1)));
        assert_eq!(latin1.decode_unit(&[0x9F]), Some((0x9F, 1)));
        assert_eq!(latin1.decode_unit(&[0xE9]), Some((0xE9, 1)));
        assert_eq!(latin1.encode_unit(0x80), Some(vec![0x80]));
        assert_eq!(latin1.encode_unit(0xE9), Some(vec![0xE9]));
        // The euro sign lives where the C1 controls are
        assert_eq!(latin1.encode_unit(0x20AC), None);
    }

    #[test]
    fn test_c1_codec_turkish_and_thai() {
        let latin5 = C1Codec::over_label("windows-1254").unwrap();
        assert_eq!(latin5.decode_unit(&[0x9F]), Some((0x9F, 1)));
        assert_eq!(latin5.decode_unit(&[0xD0]), Some((0x011E, 1)));

        let thai = C1Codec::over_label("windows-874").unwrap();
        assert_eq!(thai.decode_unit(&[0x80]), Some((0x80, 1)));
        assert_eq!(thai.decode_unit(&[0xA1]), Some((0x0E01, 1)));
        assert_eq!(thai.encode_unit(0x2026), None);
    }

    #[test]
    fn test_unknown_label() {
        assert!(matches!(
            LabelCodec::for_label("no-such-charset"),
            Err(Error::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_code_page_codec_matches_label_codec() {
        let by_number = CodePageCodec::new(936).unwrap();
        let by_label = LabelCodec::for_label("gbk").unwrap();

        // "啊" is the first GB2312 hanzi
        assert_eq!(by_number.decode_unit(&[0xB0, 0xA1]), Some((0x554A, 2)));
        for pair in [[0xB0, 0xA1], [0xC4, 0xE3], [0x81, 0x40]] {
            assert_eq!(by_number.decode_unit(&pair), by_label.decode_unit(&pair));
        }
        assert_eq!(by_number.code_page(), 936);
    }

    #[test]
    fn test_oem_codec() {
        let cp437 = OemCodec::new(437).unwrap();
        assert_eq!(cp437.decode_unit(&[0x41]), Some((0x41, 1)));
        assert_eq!(cp437.decode_unit(&[0xC9]), Some((0x2554, 1)));
        assert_eq!(cp437.encode_unit(0x2554), Some(vec![0xC9]));
        assert_eq!(cp437.encode_unit(0x20AC), None);
        assert!(OemCodec::new(1).is_err());

        // CP857 leaves some bytes undefined
        let cp857 = OemCodec::new(857).unwrap();
        assert_eq!(cp857.decode_unit(&[0x80]), Some((0xC7, 1)));
        assert_eq!(cp857.decode_unit(&[0xD5]), None);
        assert_eq!(cp857.encode_unit(0x011E), Some(vec![0xA6]));
    }

    #[test]
    fn test_unicode_codec_decode() {
        let utf8 = UnicodeCodec::new(UnicodeForm::Utf8);
        assert_eq!(utf8.decode_unit(&[0xE2, 0x82, 0xAC, 0x41]), Some((0x20AC, 3)));
        assert_eq!(utf8.decode_unit(&[0xC3, 0x41]), None);

        let utf16le = UnicodeCodec::new(UnicodeForm::Utf16(Endian::Little));
        assert_eq!(utf16le.decode_unit(&[0x41, 0x00]), Some((0x41, 2)));
        assert_eq!(utf16le.decode_unit(&[0x00, 0xD8, 0x00, 0xDC]), Some((0x10000, 4)));

        let utf32be = UnicodeCodec::new(UnicodeForm::Utf32(Endian::Big));
        assert_eq!(utf32be.decode_unit(&[0x00, 0x01, 0xF6, 0x00]), Some((0x1F600, 4)));
        assert_eq!(utf32be.decode_unit(&[0x00, 0x00, 0xD8, 0x00]), None);
        assert_eq!(utf32be.decode_unit(&[0x00, 0x00]), None);
    }

    #[test]
    fn test_unicode_codec_encode() {
        let utf8 = UnicodeCodec::new(UnicodeForm::Utf8);
        assert_eq!(utf8.encode_unit(0xE9), Some(vec![0xC3, 0xA9]));
        assert_eq!(utf8.encode_unit(0xD800), None);
    }
}
