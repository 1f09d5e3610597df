//! `kerx` table parsing.
//!
//! Only format 0 (ordered pair list) subtables are decoded. State machine and class based
//! formats are skipped.
//!
//! <https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6kerx.html>

use log::warn;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be};
use crate::error::ParseError;

/// `kerx` Extended Kerning Table.
pub struct KerxTable<'a> {
    pub version: u16,
    pub subtables: Vec<KerxSubtable<'a>>,
}

pub struct KerxSubtable<'a> {
    pub coverage: u32,
    pub tuple_count: u32,
    pairs: ReadArray<'a, KerxPair>,
}

#[derive(Debug, Copy, Clone)]
struct KerxPair {
    left: u16,
    right: u16,
    value: i16,
}

impl ReadFrom for KerxPair {
    type ReadType = (U16Be, U16Be, I16Be);

    fn read_from((left, right, value): (u16, u16, i16)) -> Self {
        KerxPair { left, right, value }
    }
}

impl ReadBinary for KerxTable<'_> {
    type HostType<'a> = KerxTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let version = ctxt.read_u16be()?;
        ctxt.check_version((2..=4).contains(&version))?;
        let _padding = ctxt.read_u16be()?;
        let n_tables = ctxt.read_u32be()?;

        let mut subtables = Vec::new();
        for _ in 0..n_tables {
            let length = usize::try_from(ctxt.read_u32be()?)?;
            let coverage = ctxt.read_u32be()?;
            let tuple_count = ctxt.read_u32be()?;
            let body_length = length.checked_sub(12).ok_or(ParseError::BadValue)?;
            let body = ctxt.read_scope(body_length)?;
            match coverage & 0xFF {
                0 => match read_format0(body) {
                    Ok(pairs) => subtables.push(KerxSubtable {
                        coverage,
                        tuple_count,
                        pairs,
                    }),
                    Err(err) => warn!("skipping invalid kerx subtable: {}", err),
                },
                format => warn!("skipping kerx subtable format {}", format),
            }
        }

        Ok(KerxTable {
            version,
            subtables,
        })
    }
}

fn read_format0(scope: ReadScope<'_>) -> Result<ReadArray<'_, KerxPair>, ParseError> {
    let mut ctxt = scope.ctxt();
    let n_pairs = usize::try_from(ctxt.read_u32be()?)?;
    let _search_range = ctxt.read_u32be()?;
    let _entry_selector = ctxt.read_u32be()?;
    let _range_shift = ctxt.read_u32be()?;
    ctxt.read_array_upto_hack::<KerxPair>(n_pairs)
}

impl<'a> KerxTable<'a> {
    /// The summed kerning of the subtables that apply in the given orientation.
    pub fn kerning(&self, left: u16, right: u16, vertical: bool) -> i32 {
        self.subtables
            .iter()
            .filter(|subtable| subtable.applies_to(vertical))
            .filter_map(|subtable| subtable.lookup(left, right))
            .map(i32::from)
            .sum()
    }
}

impl<'a> KerxSubtable<'a> {
    const VERTICAL: u32 = 0x8000_0000;
    const CROSS_STREAM: u32 = 0x4000_0000;
    const VARIATION: u32 = 0x2000_0000;

    /// Whether the subtable adjusts advances for text in the given orientation.
    ///
    /// Cross-stream and variation subtables are not applied.
    pub fn applies_to(&self, vertical: bool) -> bool {
        (self.coverage & Self::VERTICAL != 0) == vertical
            && self.coverage & (Self::CROSS_STREAM | Self::VARIATION) == 0
            && self.tuple_count == 0
    }

    pub fn lookup(&self, left: u16, right: u16) -> Option<i16> {
        let needle = (u32::from(left) << 16) | u32::from(right);
        let index = self
            .pairs
            .binary_search_by(|pair| ((u32::from(pair.left) << 16) | u32::from(pair.right)).cmp(&needle))
            .ok()?;
        self.pairs.get_item(index).map(|pair| pair.value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A `kerx` table with a single horizontal format 0 subtable.
    pub(crate) fn kerx_table(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        let length = 12 + 16 + 6 * pairs.len() as u32;
        for value in [length, 0, 0, pairs.len() as u32, 0, 0, 0] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        for &(left, right, value) in pairs {
            data.extend_from_slice(&left.to_be_bytes());
            data.extend_from_slice(&right.to_be_bytes());
            data.extend_from_slice(&value.to_be_bytes());
        }
        data
    }

    #[test]
    fn format0_kerning() {
        let data = kerx_table(&[(4, 5, -30), (4, 9, 12)]);
        let kerx = ReadScope::new(&data).read::<KerxTable<'_>>().unwrap();
        assert_eq!(kerx.kerning(4, 5, false), -30);
        assert_eq!(kerx.kerning(4, 9, false), 12);
        assert_eq!(kerx.kerning(5, 4, false), 0);
        assert_eq!(kerx.kerning(4, 5, true), 0);
    }

    #[test]
    fn skips_unknown_formats() {
        let mut data = kerx_table(&[(4, 5, -30)]);
        // format 2 in the low byte of the coverage
        data[15] = 2;
        let kerx = ReadScope::new(&data).read::<KerxTable<'_>>().unwrap();
        assert!(kerx.subtables.is_empty());
    }
}
