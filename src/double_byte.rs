//! Two-byte legacy encodings with lazily probed, cached tables
//!
//! Nothing is built up front. The first time a byte is seen it is classified
//! by probing the provider with a representative pair, falling back to a scan
//! of the trail range when that pair is a hole. The first time a lead byte is
//! decoded its whole row of 256 trail bytes is probed, and every valid pair
//! found on the way is recorded for encoding. Consequently a code point only becomes
//! encodable after the byte (or row) producing it has been touched, unless
//! [`DoubleByteEngine::prime`] is called.
//!
//! Every cache is written at most once per slot. Classification and rows sit
//! in once-cells, so concurrent first use of the same byte blocks on a single
//! probe and readers afterwards never take a lock.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::codec::CodepointCodec;
use crate::{Codepoint, Decoded, Encoded, Error, REPLACEMENT, Result};

/// Trail byte appended when probing whether a byte starts a pair
pub const PROBE_TRAIL: u8 = 0xA1;

/// Lowest and highest trails tried when the representative pair is unmapped
const TRAIL_SCAN: (u8, u8) = (0x40, 0xFE);

type Row = [Codepoint; 256];

/// Probed classification of one byte value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeadByte {
    /// Starts a two-byte sequence
    Lead,
    /// Stands alone, decoding to the cached code point
    Single(Codepoint),
}

/// Bytes that encode one code point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteCode {
    Single(u8),
    Pair(u8, u8),
}

impl ByteCode {
    fn encoded(self) -> Encoded {
        match self {
            ByteCode::Single(byte) => Encoded::from_slice(&[byte]),
            ByteCode::Pair(lead, trail) => Encoded::from_slice(&[lead, trail]),
        }
    }
}

/// Code point -> byte code, filled as bytes and rows are probed
struct EncodeTables {
    /// Indexed by BMP code point
    bmp: Box<[Option<ByteCode>]>,
    non_bmp: HashMap<Codepoint, ByteCode>,
}

impl EncodeTables {
    fn new() -> Self {
        Self {
            bmp: vec![None; 0x10000].into_boxed_slice(),
            non_bmp: HashMap::new(),
        }
    }

    /// Record `code` for `codepoint` unless an earlier code already claimed it
    fn insert_if_absent(&mut self, codepoint: Codepoint, code: ByteCode) {
        if codepoint == REPLACEMENT {
            return;
        }
        match self.bmp.get_mut(codepoint as usize) {
            Some(slot) => {
                slot.get_or_insert(code);
            }
            None => {
                self.non_bmp.entry(codepoint).or_insert(code);
            }
        }
    }

    fn get(&self, codepoint: Codepoint) -> Option<ByteCode> {
        if codepoint <= 0xFFFF {
            self.bmp[codepoint as usize]
        } else {
            self.non_bmp.get(&codepoint).copied()
        }
    }

    fn len(&self) -> usize {
        self.bmp.iter().filter(|slot| slot.is_some()).count() + self.non_bmp.len()
    }
}

/// Lazily cached tables for one double-byte code page
pub struct DoubleByteEngine {
    codec: Arc<dyn CodepointCodec>,
    lead_bytes: Box<[OnceLock<LeadByte>; 256]>,
    rows: Box<[OnceLock<Box<Row>>; 256]>,
    encode: RwLock<EncodeTables>,
}

impl std::fmt::Debug for DoubleByteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleByteEngine")
            .field("codec", &self.codec)
            .field("cached_rows", &self.cached_rows())
            .finish()
    }
}

impl DoubleByteEngine {
    /// Create an engine; no probing happens until first use
    pub fn new(codec: Arc<dyn CodepointCodec>) -> Self {
        Self {
            codec,
            lead_bytes: Box::new([const { OnceLock::new() }; 256]),
            rows: Box::new([const { OnceLock::new() }; 256]),
            encode: RwLock::new(EncodeTables::new()),
        }
    }

    /// Name of the backing provider
    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }

    fn classify(&self, byte: u8) -> LeadByte {
        *self.lead_bytes[byte as usize].get_or_init(|| {
            let state = match self.codec.decode_unit(&[byte, PROBE_TRAIL]) {
                Some((_, 2)) => LeadByte::Lead,
                Some((codepoint, _)) => LeadByte::Single(codepoint),
                // The representative pair can be a hole in a populated row
                None if self.has_any_pair(byte) => LeadByte::Lead,
                None => LeadByte::Single(REPLACEMENT),
            };
            if let LeadByte::Single(codepoint) = state {
                self.write_encode_tables()
                    .insert_if_absent(codepoint, ByteCode::Single(byte));
            }
            state
        })
    }

    fn has_any_pair(&self, lead: u8) -> bool {
        let (first, last) = TRAIL_SCAN;
        (first..=last).any(|trail| {
            matches!(self.codec.decode_unit(&[lead, trail]), Some((_, 2)))
        })
    }

    /// Whether `byte` starts a two-byte sequence, probing it on first query
    pub fn is_lead_byte(&self, byte: u8) -> bool {
        self.classify(byte) == LeadByte::Lead
    }

    fn row(&self, lead: u8) -> &Row {
        self.rows[lead as usize].get_or_init(|| {
            let mut row = Box::new([REPLACEMENT; 256]);
            for (trail, entry) in row.iter_mut().enumerate() {
                if let Some((codepoint, 2)) = self.codec.decode_unit(&[lead, trail as u8]) {
                    *entry = codepoint;
                }
            }

            let mut tables = self.write_encode_tables();
            for (trail, &codepoint) in row.iter().enumerate() {
                tables.insert_if_absent(codepoint, ByteCode::Pair(lead, trail as u8));
            }
            drop(tables);

            tracing::debug!(
                codec = self.codec.name(),
                lead = format_args!("0x{:02X}", lead),
                "built double-byte row"
            );
            row
        })
    }

    fn write_encode_tables(&self) -> std::sync::RwLockWriteGuard<'_, EncodeTables> {
        self.encode.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decode the unit at the start of `bytes`.
    ///
    /// A lead byte with no byte after it is malformed and consumes one byte;
    /// a lead byte followed by an unmapped trail consumes both.
    pub fn decode_one(&self, bytes: &[u8]) -> Decoded {
        let Some(&first) = bytes.first() else {
            return Decoded::invalid(0);
        };
        match self.classify(first) {
            LeadByte::Single(codepoint) => Decoded::new(codepoint, 1),
            LeadByte::Lead => match bytes.get(1) {
                Some(&trail) => Decoded::new(self.row(first)[trail as usize], 2),
                None => Decoded::invalid(1),
            },
        }
    }

    /// Encode from whatever has been probed so far
    pub fn encode(&self, codepoint: Codepoint) -> Result<Encoded> {
        self.encode
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(codepoint)
            .map(ByteCode::encoded)
            .ok_or(Error::Unmappable { codepoint })
    }

    /// Classify every byte and build every lead row, making encode complete
    pub fn prime(&self) {
        for byte in 0..=255u8 {
            if self.is_lead_byte(byte) {
                self.row(byte);
            }
        }
        tracing::debug!(
            codec = self.codec.name(),
            rows = self.cached_rows(),
            "primed double-byte tables"
        );
    }

    /// Number of lead rows built so far
    pub fn cached_rows(&self) -> usize {
        self.rows.iter().filter(|row| row.get().is_some()).count()
    }

    /// Number of code points currently encodable
    pub fn encodable_len(&self) -> usize {
        self.encode
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Bytes 0x81..=0xFE lead; trails 0x40..=0xFE are valid.
    /// Lead 0xFE maps to the supplementary plane; trails 0x40 and 0x41 of
    /// lead 0x82 share a code point.
    #[derive(Debug, Default)]
    struct FakeDbcs {
        calls: AtomicUsize,
    }

    impl FakeDbcs {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn pair_codepoint(lead: u8, trail: u8) -> Codepoint {
        match (lead, trail) {
            (0xFE, _) => 0x20000 + trail as Codepoint,
            (0x82, 0x41) => pair_codepoint(0x82, 0x40),
            _ => 0x4E00 + (((lead - 0x81) as Codepoint) << 8) + trail as Codepoint,
        }
    }

    impl CodepointCodec for FakeDbcs {
        fn name(&self) -> &str {
            "fake-dbcs"
        }

        fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let lead = *bytes.first()?;
            match lead {
                0x00..=0x7F => Some((lead as Codepoint, 1)),
                0x80 | 0xFF => None,
                _ => match bytes.get(1) {
                    Some(&trail @ 0x40..=0xFE) => Some((pair_codepoint(lead, trail), 2)),
                    _ => None,
                },
            }
        }

        fn encode_unit(&self, _codepoint: Codepoint) -> Option<Vec<u8>> {
            None
        }
    }

    fn engine() -> (Arc<FakeDbcs>, DoubleByteEngine) {
        let codec = Arc::new(FakeDbcs::default());
        let engine = DoubleByteEngine::new(codec.clone());
        (codec, engine)
    }

    #[test]
    fn test_lead_byte_probed_once() {
        let (codec, engine) = engine();

        assert!(engine.is_lead_byte(0x81));
        assert_eq!(codec.calls(), 1);
        for _ in 0..10 {
            assert!(engine.is_lead_byte(0x81));
        }
        assert_eq!(codec.calls(), 1);

        assert!(!engine.is_lead_byte(0x41));
        assert!(!engine.is_lead_byte(0x41));
        assert_eq!(codec.calls(), 2);
    }

    #[test]
    fn test_single_byte_fallback_is_cached() {
        let (codec, engine) = engine();

        let decoded = engine.decode_one(b"A");
        assert_eq!(decoded, Decoded::new(0x41, 1));
        let before = codec.calls();
        assert_eq!(engine.decode_one(b"AB").codepoint, 0x41);
        assert_eq!(codec.calls(), before);

        // Bytes the provider rejects outright decode to the sentinel
        let invalid = engine.decode_one(&[0x80, 0x41]);
        assert_eq!(invalid, Decoded::invalid(1));
    }

    #[test]
    fn test_row_built_once_on_first_decode() {
        let (codec, engine) = engine();

        assert_eq!(engine.cached_rows(), 0);
        let decoded = engine.decode_one(&[0x81, 0x40]);
        assert_eq!(decoded, Decoded::new(0x4E40, 2));
        assert_eq!(engine.cached_rows(), 1);
        // one classification probe plus 256 trail probes
        assert_eq!(codec.calls(), 257);

        assert_eq!(engine.decode_one(&[0x81, 0x50]).codepoint, 0x4E50);
        assert_eq!(codec.calls(), 257);
    }

    #[test]
    fn test_unmapped_trail_consumes_two_bytes() {
        let (_, engine) = engine();

        let decoded = engine.decode_one(&[0x81, 0x20, 0x41]);
        assert_eq!(decoded.codepoint, REPLACEMENT);
        assert_eq!(decoded.len, 2);
        assert!(decoded.malformed);
    }

    #[test]
    fn test_truncated_lead_consumes_one_byte() {
        let (_, engine) = engine();

        assert_eq!(engine.decode_one(&[0x81]), Decoded::invalid(1));
        assert_eq!(engine.decode_one(&[]), Decoded::invalid(0));
    }

    #[test]
    fn test_encode_is_demand_driven() {
        let (_, engine) = engine();

        // Defined by the code page but the row has not been probed yet
        assert_eq!(
            engine.encode(0x4F40),
            Err(Error::Unmappable { codepoint: 0x4F40 })
        );
        engine.decode_one(&[0x82, 0x42]);
        assert_eq!(engine.encode(0x4F40).unwrap().as_bytes(), &[0x82, 0x40]);
        assert_eq!(engine.encode(0x4F42).unwrap().as_bytes(), &[0x82, 0x42]);
    }

    #[test]
    fn test_encode_first_wins_within_row() {
        let (_, engine) = engine();

        engine.decode_one(&[0x82, 0x41]);
        assert_eq!(engine.decode_one(&[0x82, 0x41]).codepoint, 0x4F40);
        assert_eq!(engine.encode(0x4F40).unwrap().as_bytes(), &[0x82, 0x40]);
    }

    #[test]
    fn test_non_bmp_encode_table() {
        let (_, engine) = engine();

        assert_eq!(engine.decode_one(&[0xFE, 0x50]).codepoint, 0x20050);
        assert_eq!(engine.encode(0x20050).unwrap().as_bytes(), &[0xFE, 0x50]);
        assert!(engine.encode(0x30000).is_err());
    }

    #[test]
    fn test_single_bytes_become_encodable_once_probed() {
        let (_, engine) = engine();

        assert!(engine.encode(0x41).is_err());
        assert!(!engine.is_lead_byte(0x41));
        assert_eq!(engine.encode(0x41).unwrap().as_bytes(), &[0x41]);
        // REPLACEMENT from a rejected byte is never encodable
        engine.is_lead_byte(0x80);
        assert!(engine.encode(REPLACEMENT).is_err());
    }

    #[test]
    fn test_prime_builds_everything() {
        let (_, engine) = engine();

        engine.prime();
        assert_eq!(engine.cached_rows(), 0xFE - 0x81 + 1);
        assert_eq!(engine.encode(0x4E40).unwrap().as_bytes(), &[0x81, 0x40]);
        assert_eq!(engine.encode(0x7A).unwrap().as_bytes(), &[0x7A]);
        assert!(engine.encodable_len() > 128);
    }

    #[test]
    fn test_concurrent_first_touch() {
        let (codec, engine) = engine();
        let engine = Arc::new(engine);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for trail in 0x40..=0xFEu8 {
                        let decoded = engine.decode_one(&[0x90, trail]);
                        assert_eq!(decoded.codepoint, pair_codepoint(0x90, trail));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(engine.cached_rows(), 1);
        assert_eq!(codec.calls(), 257);
    }

    /// Leads 0x81..=0x9F only pair with trails 0x40..=0x7E, so the
    /// representative trail is always unmapped
    #[derive(Debug, Default)]
    struct LowTrailDbcs {
        calls: AtomicUsize,
    }

    impl CodepointCodec for LowTrailDbcs {
        fn name(&self) -> &str {
            "low-trail-dbcs"
        }

        fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let lead = *bytes.first()?;
            match (lead, bytes.get(1)) {
                (0x00..=0x7F, _) => Some((lead as Codepoint, 1)),
                (0x81..=0x9F, Some(&trail @ 0x40..=0x7E)) => Some((
                    0x3000 + (((lead - 0x81) as Codepoint) << 8) + trail as Codepoint,
                    2,
                )),
                _ => None,
            }
        }

        fn encode_unit(&self, _codepoint: Codepoint) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn test_lead_byte_with_hole_at_representative_trail() {
        let codec = Arc::new(LowTrailDbcs::default());
        let engine = DoubleByteEngine::new(codec.clone());

        assert!(engine.is_lead_byte(0x81));
        // representative pair, then the scan stops at the first valid trail
        assert_eq!(codec.calls.load(Ordering::SeqCst), 2);
        assert!(engine.is_lead_byte(0x81));
        assert_eq!(codec.calls.load(Ordering::SeqCst), 2);

        assert_eq!(engine.decode_one(&[0x81, 0x40]), Decoded::new(0x3040, 2));
        let hole = engine.decode_one(&[0x81, 0xA1]);
        assert_eq!(hole.len, 2);
        assert!(hole.malformed);

        // No trail at all pairs with 0xA0
        assert!(!engine.is_lead_byte(0xA0));
        assert_eq!(engine.decode_one(&[0xA0, 0x41]), Decoded::invalid(1));

        engine.prime();
        assert_eq!(engine.cached_rows(), 0x9F - 0x81 + 1);
        assert_eq!(engine.encode(0x4E7E).unwrap().as_bytes(), &[0x9F, 0x7E]);
    }

    /// 0x00 leads a row of private-use characters
    #[derive(Debug)]
    struct ZeroLeadDbcs;

    impl CodepointCodec for ZeroLeadDbcs {
        fn name(&self) -> &str {
            "zero-lead-dbcs"
        }

        fn decode_unit(&self, bytes: &[u8]) -> Option<(Codepoint, usize)> {
            match (*bytes.first()?, bytes.get(1)) {
                (0x00, Some(&trail @ 0x40..=0x7E)) => Some((0xE000 + trail as Codepoint, 2)),
                (0x00, _) => None,
                (byte @ 0x01..=0x7F, _) => Some((byte as Codepoint, 1)),
                _ => None,
            }
        }

        fn encode_unit(&self, _codepoint: Codepoint) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn test_zero_lead_byte_encodes_as_pair() {
        let engine = DoubleByteEngine::new(Arc::new(ZeroLeadDbcs));

        assert!(engine.is_lead_byte(0x00));
        assert_eq!(engine.decode_one(&[0x00, 0x41]), Decoded::new(0xE041, 2));
        assert_eq!(engine.encode(0xE041).unwrap().as_bytes(), &[0x00, 0x41]);

        assert!(!engine.is_lead_byte(0x41));
        assert_eq!(engine.encode(0x41).unwrap().as_bytes(), &[0x41]);
    }

    #[test]
    fn test_real_rows_without_representative_pair() {
        let euc_jp = DoubleByteEngine::new(Arc::new(
            crate::codec::LabelCodec::for_label("euc-jp").unwrap(),
        ));
        // Full-width digits and Latin letters
        assert!(euc_jp.is_lead_byte(0xA3));
        assert_eq!(euc_jp.decode_one(&[0xA3, 0xB0]), Decoded::new(0xFF10, 2));

        let sjis = DoubleByteEngine::new(Arc::new(
            crate::codec::LabelCodec::for_label("shift_jis").unwrap(),
        ));
        // NEC circled numbers
        assert!(sjis.is_lead_byte(0x87));
        assert_eq!(sjis.decode_one(&[0x87, 0x40]), Decoded::new(0x2460, 2));
        assert_eq!(sjis.encode(0x2460).unwrap().as_bytes(), &[0x87, 0x40]);
        // IBM extensions
        assert!(sjis.is_lead_byte(0xFC));
        let ibm = sjis.decode_one(&[0xFC, 0x40]);
        assert_eq!(ibm.len, 2);
        assert!(!ibm.malformed);

        let euc_kr = DoubleByteEngine::new(Arc::new(
            crate::codec::LabelCodec::for_label("euc-kr").unwrap(),
        ));
        for lead in 0xAD..=0xAFu8 {
            assert!(euc_kr.is_lead_byte(lead), "0x{:02X}", lead);
        }
        assert_eq!(euc_kr.decode_one(&[0xAD, 0x41]), Decoded::new(0xCD61, 2));
    }

    #[test]
    fn test_prime_reaches_rows_without_representative_pair() {
        let euc_jp = DoubleByteEngine::new(Arc::new(
            crate::codec::LabelCodec::for_label("euc-jp").unwrap(),
        ));
        euc_jp.prime();
        assert_eq!(euc_jp.encode(0xFF10).unwrap().as_bytes(), &[0xA3, 0xB0]);
        assert_eq!(euc_jp.encode(0xFF21).unwrap().as_bytes(), &[0xA3, 0xC1]);
    }

    #[test]
    fn test_real_shift_jis_rows() {
        let codec = crate::codec::LabelCodec::for_label("shift_jis").unwrap();
        let engine = DoubleByteEngine::new(Arc::new(codec));

        assert!(engine.is_lead_byte(0x82));
        assert!(!engine.is_lead_byte(0x41));
        // Half-width katakana stand alone
        assert!(!engine.is_lead_byte(0xB1));
        assert_eq!(engine.decode_one(&[0x82, 0xA0]), Decoded::new(0x3042, 2));
        assert_eq!(engine.encode(0x3042).unwrap().as_bytes(), &[0x82, 0xA0]);
    }
}
