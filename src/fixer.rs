//! Corrections for single-byte tables built by probing a provider
//!
//! Conversion libraries disagree with the code pages as DOS and Windows
//! actually shipped them in a handful of places. Each fixer overwrites only
//! the bytes it knows about.

use crate::{Codepoint, REPLACEMENT};

/// Forward table of a single-byte encoding
pub type ByteTable = [Codepoint; 256];

/// Bytes Windows-874 leaves undefined
const WINDOWS_874_HOLES: &[(u8, u8)] = &[
    (0x81, 0x84),
    (0x86, 0x90),
    (0x98, 0x9F),
    (0xDB, 0xDE),
    (0xFC, 0xFF),
];

/// Post-processing pass applied once to a freshly probed table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableFixer {
    /// Leave the table unchanged
    #[default]
    Identity,
    /// Corrections shared by the DOS/OEM code pages
    Oem,
    /// CP437 (US OEM), extends [`TableFixer::Oem`]
    Cp437,
    /// CP852 (Central European OEM), extends [`TableFixer::Oem`]
    Cp852,
    /// Windows-874 (Thai)
    Windows874,
}

impl TableFixer {
    /// Apply the corrections in place
    pub fn fix(self, table: &mut ByteTable) {
        match self {
            TableFixer::Identity => {}
            TableFixer::Oem => fix_oem(table),
            TableFixer::Cp437 => {
                fix_oem(table);
                table[0xE6] = 0x00B5;
            }
            TableFixer::Cp852 => {
                fix_oem(table);
                table[0xAA] = 0x00AC;
            }
            TableFixer::Windows874 => {
                for &(first, last) in WINDOWS_874_HOLES {
                    for byte in first..=last {
                        table[byte as usize] = REPLACEMENT;
                    }
                }
            }
        }
    }
}

fn fix_oem(table: &mut ByteTable) {
    // Some providers rotate 0x1A/0x1C/0x7F the way IBM's host tables do
    table[0x1A] = 0x001A;
    table[0x1C] = 0x001C;
    table[0x7F] = 0x2302;
    table[0xFF] = 0x00A0;
}
