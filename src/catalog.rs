//! Encoding catalog: names, metadata and the flyweight handle registry
//!
//! A [`Catalog`] is an explicit context object. It owns one handle slot per
//! entry, creates the handle the first time it is asked for and hands out
//! the same `Arc` from then on. Handles live until
//! [`Catalog::free_encodings`] or the catalog itself is dropped.

use std::sync::{Arc, OnceLock};

use crate::codec::{C1Codec, CodePageCodec, CodepointCodec, LabelCodec, OemCodec};
use crate::config::CatalogConfig;
use crate::double_byte::DoubleByteEngine;
use crate::fixed_width::{Endian, FixedWidthCodec, UnicodeForm};
use crate::fixer::TableFixer;
use crate::handle::{EncodingHandle, EncodingInfo, Engine};
use crate::single_byte::SingleByteEngine;
use crate::{Classification, Error, Result};

/// Where an entry's conversion provider comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecSource {
    /// `encoding_rs` label
    Label(&'static str),
    /// Windows superset named by an `encoding_rs` label, with C1 controls
    /// restored at 0x80..=0x9F
    C1Over(&'static str),
    /// Windows code page number, through the `codepage` crate
    CodePage(u16),
    /// DOS/OEM code page from the `oem_cp` tables
    Oem(u16),
    /// Fixed-width Unicode form, no provider tables
    Unicode,
}

/// Static description of one catalog encoding
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    /// Display name
    pub name: &'static str,
    /// Alternative names accepted by lookups
    pub aliases: &'static [&'static str],
    /// Human readable description
    pub description: &'static str,
    /// Suggested display font
    pub font_name: &'static str,
    /// How bytes map to code points
    pub classification: Classification,
    /// Provider used to seed tables
    pub source: CodecSource,
    /// Corrections applied to single-byte tables
    pub fixer: TableFixer,
}

const MONO: &str = "Courier New";

const fn single(
    name: &'static str,
    aliases: &'static [&'static str],
    description: &'static str,
    source: CodecSource,
    fixer: TableFixer,
) -> CatalogEntry {
    CatalogEntry {
        name,
        aliases,
        description,
        font_name: MONO,
        classification: Classification::SingleByte,
        source,
        fixer,
    }
}

const fn double(
    name: &'static str,
    aliases: &'static [&'static str],
    description: &'static str,
    font_name: &'static str,
    classification: Classification,
    source: CodecSource,
) -> CatalogEntry {
    CatalogEntry {
        name,
        aliases,
        description,
        font_name,
        classification,
        source,
        fixer: TableFixer::Identity,
    }
}

const fn unicode(
    name: &'static str,
    aliases: &'static [&'static str],
    description: &'static str,
    classification: Classification,
) -> CatalogEntry {
    CatalogEntry {
        name,
        aliases,
        description,
        font_name: MONO,
        classification,
        source: CodecSource::Unicode,
        fixer: TableFixer::Identity,
    }
}

use self::CodecSource::{C1Over, CodePage, Label, Oem};

/// Every encoding the catalog knows about, in display order
pub static ENTRIES: &[CatalogEntry] = &[
    // Unicode
    unicode("UTF-8", &["UTF8"], "Unicode 8-bit", Classification::Utf8),
    unicode("UTF-16LE", &["UTF16LE"], "Unicode 16-bit Little Endian", Classification::Utf16Le),
    unicode("UTF-16BE", &["UTF16BE"], "Unicode 16-bit Big Endian", Classification::Utf16Be),
    unicode("UTF-32LE", &["UTF32LE", "UCS-4LE"], "Unicode 32-bit Little Endian", Classification::Utf32Le),
    unicode("UTF-32BE", &["UTF32BE", "UCS-4BE"], "Unicode 32-bit Big Endian", Classification::Utf32Be),
    // ISO-8859 series
    single("ISO-8859-1", &["LATIN1"], "Western European", C1Over("windows-1252"), TableFixer::Identity),
    single("ISO-8859-2", &["LATIN2"], "Central European", Label("iso-8859-2"), TableFixer::Identity),
    single("ISO-8859-3", &["LATIN3"], "South European", Label("iso-8859-3"), TableFixer::Identity),
    single("ISO-8859-4", &["LATIN4"], "North European", Label("iso-8859-4"), TableFixer::Identity),
    single("ISO-8859-5", &[], "Cyrillic", Label("iso-8859-5"), TableFixer::Identity),
    single("ISO-8859-6", &[], "Arabic", Label("iso-8859-6"), TableFixer::Identity),
    single("ISO-8859-7", &[], "Greek", Label("iso-8859-7"), TableFixer::Identity),
    single("ISO-8859-8", &[], "Hebrew", Label("iso-8859-8"), TableFixer::Identity),
    single("ISO-8859-9", &["LATIN5"], "Turkish", C1Over("windows-1254"), TableFixer::Identity),
    single("ISO-8859-10", &["LATIN6"], "Nordic", Label("iso-8859-10"), TableFixer::Identity),
    single("ISO-8859-11", &[], "Thai", C1Over("windows-874"), TableFixer::Identity),
    single("ISO-8859-13", &["LATIN7"], "Baltic Rim", Label("iso-8859-13"), TableFixer::Identity),
    single("ISO-8859-14", &["LATIN8"], "Celtic", Label("iso-8859-14"), TableFixer::Identity),
    single("ISO-8859-15", &["LATIN9"], "Western European with Euro", Label("iso-8859-15"), TableFixer::Identity),
    single("ISO-8859-16", &["LATIN10"], "South-Eastern European", Label("iso-8859-16"), TableFixer::Identity),
    // Windows code pages
    single("Windows-874", &["CP874"], "Windows Thai", Label("windows-874"), TableFixer::Windows874),
    single("Windows-1250", &["CP1250"], "Windows Central European", Label("windows-1250"), TableFixer::Identity),
    single("Windows-1251", &["CP1251"], "Windows Cyrillic", Label("windows-1251"), TableFixer::Identity),
    single("Windows-1252", &["CP1252"], "Windows Western European", Label("windows-1252"), TableFixer::Identity),
    single("Windows-1253", &["CP1253"], "Windows Greek", Label("windows-1253"), TableFixer::Identity),
    single("Windows-1254", &["CP1254"], "Windows Turkish", Label("windows-1254"), TableFixer::Identity),
    single("Windows-1255", &["CP1255"], "Windows Hebrew", Label("windows-1255"), TableFixer::Identity),
    single("Windows-1256", &["CP1256"], "Windows Arabic", Label("windows-1256"), TableFixer::Identity),
    single("Windows-1257", &["CP1257"], "Windows Baltic", Label("windows-1257"), TableFixer::Identity),
    single("Windows-1258", &["CP1258"], "Windows Vietnamese", Label("windows-1258"), TableFixer::Identity),
    // DOS/OEM code pages
    single("CP437", &["IBM437", "DOS437"], "OEM United States", Oem(437), TableFixer::Cp437),
    single("CP850", &["IBM850", "DOS850"], "OEM Multilingual Latin I", Oem(850), TableFixer::Oem),
    single("CP852", &["IBM852", "DOS852"], "OEM Latin II", Oem(852), TableFixer::Cp852),
    single("CP855", &["IBM855", "DOS855"], "OEM Cyrillic", Oem(855), TableFixer::Oem),
    single("CP857", &["IBM857", "DOS857"], "OEM Turkish", Oem(857), TableFixer::Oem),
    single("CP860", &["IBM860", "DOS860"], "OEM Portuguese", Oem(860), TableFixer::Oem),
    single("CP861", &["IBM861", "DOS861"], "OEM Icelandic", Oem(861), TableFixer::Oem),
    single("CP862", &["IBM862", "DOS862"], "OEM Hebrew", Oem(862), TableFixer::Oem),
    single("CP863", &["IBM863", "DOS863"], "OEM Canadian French", Oem(863), TableFixer::Oem),
    single("CP865", &["IBM865", "DOS865"], "OEM Nordic", Oem(865), TableFixer::Oem),
    single("CP866", &["IBM866", "DOS866"], "OEM Russian", Oem(866), TableFixer::Oem),
    // Other single-byte
    single("KOI8-R", &[], "Cyrillic (KOI8-R)", Label("koi8-r"), TableFixer::Identity),
    single("KOI8-U", &[], "Cyrillic (KOI8-U)", Label("koi8-u"), TableFixer::Identity),
    // Double-byte
    double("Windows-932", &["CP932", "MS932", "SHIFT_JIS", "SJIS"], "Windows Japanese (Shift-JIS)", "MS Gothic", Classification::DoubleByte, Label("shift_jis")),
    double("Windows-936", &["CP936", "MS936", "GBK"], "Windows Chinese Simplified (GBK)", "NSimSun", Classification::DoubleByteAltCodec, CodePage(936)),
    double("Windows-949", &["CP949", "UHC"], "Windows Korean (Unified Hangul Code)", "GulimChe", Classification::DoubleByteAltCodec, CodePage(949)),
    double("Windows-950", &["CP950", "BIG5"], "Windows Chinese Traditional (Big5)", "MingLiU", Classification::DoubleByte, Label("big5")),
    double("EUC-JP", &["EUCJP"], "Japanese (EUC-JP)", "MS Gothic", Classification::DoubleByte, Label("euc-jp")),
    double("EUC-KR", &["EUCKR"], "Korean (EUC-KR)", "GulimChe", Classification::DoubleByte, Label("euc-kr")),
    double("GB2312", &["EUC-CN"], "Chinese Simplified (GB2312)", "NSimSun", Classification::DoubleByte, Label("gb2312")),
];

/// Name of the encoding used when the configured system encoding is unusable
pub const FALLBACK_ENCODING: &str = "UTF-8";

/// Ignore case and separators: "utf_8", "UTF8" and "Utf-8" are the same name
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn unicode_form(classification: Classification) -> Option<UnicodeForm> {
    match classification {
        Classification::Utf8 => Some(UnicodeForm::Utf8),
        Classification::Utf16Le => Some(UnicodeForm::Utf16(Endian::Little)),
        Classification::Utf16Be => Some(UnicodeForm::Utf16(Endian::Big)),
        Classification::Utf32Le => Some(UnicodeForm::Utf32(Endian::Little)),
        Classification::Utf32Be => Some(UnicodeForm::Utf32(Endian::Big)),
        _ => None,
    }
}

impl CatalogEntry {
    fn matches(&self, normalized: &str) -> bool {
        normalize(self.name) == normalized
            || self.aliases.iter().any(|alias| normalize(alias) == normalized)
    }

    fn codec(&self) -> Result<Arc<dyn CodepointCodec>> {
        let codec: Result<Arc<dyn CodepointCodec>> = match self.source {
            CodecSource::Label(label) => LabelCodec::for_label(label).map(|c| Arc::new(c) as _),
            CodecSource::C1Over(label) => C1Codec::over_label(label).map(|c| Arc::new(c) as _),
            CodecSource::CodePage(cp) => CodePageCodec::new(cp).map(|c| Arc::new(c) as _),
            CodecSource::Oem(cp) => OemCodec::new(cp).map(|c| Arc::new(c) as _),
            CodecSource::Unicode => Err(Error::UnknownEncoding(self.name.to_string())),
        };
        codec.map_err(|e| {
            tracing::warn!(name = self.name, error = %e, "no provider for encoding");
            Error::UnsupportedEncoding {
                name: self.name,
                reason: e.to_string(),
            }
        })
    }

    fn info(&self, index: usize) -> EncodingInfo {
        EncodingInfo {
            index,
            name: self.name,
            description: self.description,
            font_name: self.font_name,
            classification: self.classification,
        }
    }
}

/// Identifies a catalog encoding by position or by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingId<'a> {
    /// Position in [`Catalog::entries`]
    Index(usize),
    /// Display name or alias
    Name(&'a str),
}

impl From<usize> for EncodingId<'_> {
    fn from(index: usize) -> Self {
        EncodingId::Index(index)
    }
}

impl<'a> From<&'a str> for EncodingId<'a> {
    fn from(name: &'a str) -> Self {
        EncodingId::Name(name)
    }
}

impl<'a> From<&'a String> for EncodingId<'a> {
    fn from(name: &'a String) -> Self {
        EncodingId::Name(name)
    }
}

/// Registry that owns one shared handle per encoding
pub struct Catalog {
    config: CatalogConfig,
    entries: &'static [CatalogEntry],
    instances: Vec<OnceLock<Arc<EncodingHandle>>>,
}

impl Catalog {
    /// Create a catalog over the built-in entries; no handle is built yet
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            entries: ENTRIES,
            instances: ENTRIES.iter().map(|_| OnceLock::new()).collect(),
        }
    }

    /// Configuration this catalog was created with
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// All entries in display order
    pub fn entries(&self) -> &'static [CatalogEntry] {
        self.entries
    }

    /// Number of encodings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for the built-in catalog
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`
    pub fn entry(&self, index: usize) -> Option<&'static CatalogEntry> {
        self.entries.get(index)
    }

    /// Display name at `index`
    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.entry(index).map(|e| e.name)
    }

    /// Description at `index`
    pub fn description(&self, index: usize) -> Option<&'static str> {
        self.entry(index).map(|e| e.description)
    }

    /// Font name at `index`
    pub fn font_name(&self, index: usize) -> Option<&'static str> {
        self.entry(index).map(|e| e.font_name)
    }

    /// Classification at `index`
    pub fn classification(&self, index: usize) -> Option<Classification> {
        self.entry(index).map(|e| e.classification)
    }

    /// Position of the entry whose name or alias matches `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let normalized = normalize(name);
        self.entries.iter().position(|e| e.matches(&normalized))
    }

    fn resolve(&self, id: EncodingId<'_>) -> Result<usize> {
        match id {
            EncodingId::Index(index) if index < self.entries.len() => Ok(index),
            EncodingId::Index(index) => Err(Error::UnknownEncoding(format!("#{}", index))),
            EncodingId::Name(name) => self
                .index_of(name)
                .ok_or_else(|| Error::UnknownEncoding(name.to_string())),
        }
    }

    /// Shared handle for an encoding, built on first request
    pub fn lookup<'a>(&self, id: impl Into<EncodingId<'a>>) -> Result<Arc<EncodingHandle>> {
        let index = self.resolve(id.into())?;
        let slot = &self.instances[index];
        if let Some(handle) = slot.get() {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(self.create(index)?);
        // A concurrent lookup may have won; everyone gets the stored handle
        Ok(Arc::clone(slot.get_or_init(|| handle)))
    }

    fn create(&self, index: usize) -> Result<EncodingHandle> {
        let entry = &self.entries[index];
        let engine = match entry.classification {
            Classification::SingleByte => {
                let codec = entry.codec()?;
                Engine::SingleByte(SingleByteEngine::new(&*codec, entry.fixer))
            }
            Classification::DoubleByte | Classification::DoubleByteAltCodec => {
                let engine = DoubleByteEngine::new(entry.codec()?);
                if self.config.eager_double_byte {
                    engine.prime();
                }
                Engine::DoubleByte(engine)
            }
            unicode => match unicode_form(unicode) {
                Some(form) => Engine::FixedWidth(FixedWidthCodec::new(form)),
                None => return Err(Error::UnknownEncoding(entry.name.to_string())),
            },
        };
        tracing::debug!(
            name = entry.name,
            classification = %entry.classification,
            "created encoding handle"
        );
        Ok(EncodingHandle::new(entry.info(index), engine))
    }

    /// Handle for the configured system encoding, falling back to UTF-8
    pub fn system_encoding(&self) -> Result<Arc<EncodingHandle>> {
        if let Some(name) = self.config.system_encoding.as_deref() {
            match self.lookup(name) {
                Ok(handle) => return Ok(handle),
                Err(e) => tracing::warn!(
                    system_encoding = name,
                    error = %e,
                    "system encoding unusable, falling back to {}",
                    FALLBACK_ENCODING
                ),
            }
        }
        self.lookup(FALLBACK_ENCODING)
    }

    /// Number of handles created so far
    pub fn loaded(&self) -> usize {
        self.instances.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Drop every cached handle; outstanding `Arc`s stay valid
    pub fn free_encodings(&mut self) {
        let freed = self.loaded();
        for slot in &mut self.instances {
            slot.take();
        }
        tracing::debug!(freed, "freed encoding handles");
    }
}
