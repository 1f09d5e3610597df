//! `kern` table parsing.
//!
//! Only the OpenType (version 0) header is read. Format 0 pair lists and format 2 class
//! arrays are decoded; other subtable formats are skipped.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/kern>

use bitflags::bitflags;
use log::warn;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be};
use crate::error::ParseError;

/// `kern` Kerning Table.
pub struct KernTable<'a> {
    pub subtables: Vec<KernSubtable<'a>>,
}

bitflags! {
    /// The low byte of a subtable's coverage field.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct KernCoverage: u8 {
        const HORIZONTAL = 1 << 0;
        const MINIMUM = 1 << 1;
        const CROSS_STREAM = 1 << 2;
        const OVERRIDE = 1 << 3;
    }
}

/// Sub-table within `kern` table.
pub struct KernSubtable<'a> {
    pub coverage: KernCoverage,
    data: KernData<'a>,
}

enum KernData<'a> {
    /// Ordered pairs of glyphs.
    Format0(ReadArray<'a, KernPair>),
    /// A two dimensional array indexed by glyph classes.
    Format2 {
        left_table: ClassTable<'a>,
        right_table: ClassTable<'a>,
        scope: ReadScope<'a>,
    },
}

#[derive(Debug, Copy, Clone)]
struct KernPair {
    left: u16,
    right: u16,
    value: i16,
}

struct ClassTable<'a> {
    first_glyph: u16,
    values: ReadArray<'a, U16Be>,
}

impl ReadBinary for KernTable<'_> {
    type HostType<'a> = KernTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let table_count = ctxt.read_u16be()?;

        let mut subtables = Vec::with_capacity(usize::from(table_count));
        for _ in 0..table_count {
            let start = ctxt.scope();
            let _version = ctxt.read_u16be()?;
            let length = usize::from(ctxt.read_u16be()?);
            let coverage = ctxt.read_u16be()?;
            // Subtables longer than 64K have an overflowed length; the data runs to the end.
            let body = if length < 6 {
                ctxt.read_slice(ctxt.remaining())?
            } else {
                ctxt.read_slice(length - 6).or_else(|_| ctxt.read_slice(ctxt.remaining()))?
            };
            let data = match coverage >> 8 {
                0 => read_format0(ReadScope::new(body)).map(Some),
                2 => read_format2(start).map(Some),
                format => {
                    warn!("skipping kern subtable format {}", format);
                    Ok(None)
                }
            };
            match data {
                Ok(Some(data)) => subtables.push(KernSubtable {
                    coverage: KernCoverage::from_bits_truncate(coverage as u8),
                    data,
                }),
                Ok(None) => {}
                Err(err) => warn!("skipping invalid kern subtable: {}", err),
            }
        }

        Ok(KernTable { subtables })
    }
}

fn read_format0(scope: ReadScope<'_>) -> Result<KernData<'_>, ParseError> {
    let mut ctxt = scope.ctxt();
    let n_pairs = usize::from(ctxt.read_u16be()?);
    let _search_range = ctxt.read_u16be()?;
    let _entry_selector = ctxt.read_u16be()?;
    let _range_shift = ctxt.read_u16be()?;
    let kern_pairs = ctxt.read_array_upto_hack::<KernPair>(n_pairs)?;
    Ok(KernData::Format0(kern_pairs))
}

fn read_format2(start: ReadScope<'_>) -> Result<KernData<'_>, ParseError> {
    let mut ctxt = start.offset(6).ctxt();
    let _row_width = ctxt.read_u16be()?;
    let left_class_offset = usize::from(ctxt.read_u16be()?);
    let right_class_offset = usize::from(ctxt.read_u16be()?);
    let _kerning_array_offset = ctxt.read_u16be()?;
    let left_table = start.offset(left_class_offset).read::<ClassTable<'_>>()?;
    let right_table = start.offset(right_class_offset).read::<ClassTable<'_>>()?;
    Ok(KernData::Format2 {
        left_table,
        right_table,
        scope: start,
    })
}

impl<'a> KernTable<'a> {
    /// Whether any subtable kerns horizontally along the text.
    pub fn has_horizontal(&self) -> bool {
        self.subtables.iter().any(KernSubtable::is_horizontal)
    }

    /// The total horizontal kerning between `left` and `right`.
    pub fn horizontal_kerning(&self, left: u16, right: u16) -> i32 {
        self.subtables
            .iter()
            .filter(|subtable| subtable.is_horizontal())
            .fold(0, |total, subtable| match subtable.lookup(left, right) {
                Some(value) if subtable.coverage.contains(KernCoverage::OVERRIDE) => {
                    i32::from(value)
                }
                Some(value) => total + i32::from(value),
                None => total,
            })
    }
}

impl<'a> KernSubtable<'a> {
    /// Horizontal kerning values, not minimums or cross-stream adjustments.
    pub fn is_horizontal(&self) -> bool {
        self.coverage & (KernCoverage::HORIZONTAL | KernCoverage::MINIMUM | KernCoverage::CROSS_STREAM)
            == KernCoverage::HORIZONTAL
    }

    /// Lookup the kerning for a pair of glyphs
    pub fn lookup(&self, left: u16, right: u16) -> Option<i16> {
        match &self.data {
            KernData::Format0(kern_pairs) => {
                // Pairs are ordered by left glyph then right glyph.
                let needle = (u32::from(left) << 16) | u32::from(right);
                kern_pairs
                    .binary_search_by(|pair| pair.search_key().cmp(&needle))
                    .ok()
                    .and_then(|index| kern_pairs.get_item(index))
                    .map(|pair| pair.value)
            }
            KernData::Format2 {
                left_table,
                right_table,
                scope,
            } => {
                // Class values are byte offsets: left classes into the subtable, right
                // classes into a row.
                let left_class = left_table.get(left)?;
                let right_class = right_table.get(right)?;
                scope
                    .offset(usize::from(left_class) + usize::from(right_class))
                    .read::<I16Be>()
                    .ok()
            }
        }
    }
}

impl KernPair {
    fn search_key(&self) -> u32 {
        (u32::from(self.left) << 16) | u32::from(self.right)
    }
}

impl ReadFrom for KernPair {
    type ReadType = (U16Be, U16Be, I16Be);

    fn read_from((left, right, value): (u16, u16, i16)) -> Self {
        KernPair { left, right, value }
    }
}

impl ReadBinary for ClassTable<'_> {
    type HostType<'a> = ClassTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let first_glyph = ctxt.read_u16be()?;
        let n_glyphs = ctxt.read_u16be()?;
        let values = ctxt.read_array(usize::from(n_glyphs))?;

        Ok(ClassTable {
            first_glyph,
            values,
        })
    }
}

impl<'a> ClassTable<'a> {
    fn get(&self, glyph_id: u16) -> Option<u16> {
        let index = glyph_id.checked_sub(self.first_glyph).map(usize::from)?;
        self.values.get_item(index)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A `kern` table with one horizontal format 0 subtable holding `pairs`, which must be
    /// sorted.
    pub(crate) fn kern_table(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut push = |value: u16| data.extend_from_slice(&value.to_be_bytes());
        push(0);
        push(1);
        push(0);
        push(14 + 6 * pairs.len() as u16);
        push(0x0001);
        push(pairs.len() as u16);
        push(0);
        push(0);
        push(0);
        for &(left, right, value) in pairs {
            push(left);
            push(right);
            push(value as u16);
        }
        data
    }

    #[test]
    fn format0_pairs() {
        let data = kern_table(&[(1, 2, -40), (1, 5, 10), (3, 2, -5)]);
        let kern = ReadScope::new(&data).read::<KernTable<'_>>().unwrap();
        assert!(kern.has_horizontal());
        assert_eq!(kern.horizontal_kerning(1, 2), -40);
        assert_eq!(kern.horizontal_kerning(3, 2), -5);
        assert_eq!(kern.horizontal_kerning(2, 1), 0);
    }

    #[test]
    fn cross_stream_subtables_are_ignored() {
        let mut data = kern_table(&[(1, 2, -40)]);
        // coverage: horizontal and cross-stream
        data[9] = 0x05;
        let kern = ReadScope::new(&data).read::<KernTable<'_>>().unwrap();
        assert!(!kern.has_horizontal());
        assert_eq!(kern.horizontal_kerning(1, 2), 0);
    }

    #[test]
    fn unsupported_version() {
        let data = [0, 1, 0, 0];
        assert_eq!(
            ReadScope::new(&data).read::<KernTable<'_>>().err(),
            Some(ParseError::BadVersion)
        );
    }
}
