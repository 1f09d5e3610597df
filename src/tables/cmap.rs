//! Character to glyph mapping (`cmap`).
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>

use std::cmp::Ordering;
use std::convert::TryFrom;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be, U24Be, U32Be, U8};
use crate::error::ParseError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const WINDOWS_SYMBOL: EncodingId = EncodingId(0);
    pub const WINDOWS_UNICODE_BMP_UCS2: EncodingId = EncodingId(1);
    pub const WINDOWS_UNICODE_UCS4: EncodingId = EncodingId(10);

    pub const UNICODE_1_0: EncodingId = EncodingId(0);
    pub const UNICODE_1_1: EncodingId = EncodingId(1);
    pub const UNICODE_ISO_10646: EncodingId = EncodingId(2);
    pub const UNICODE_BMP: EncodingId = EncodingId(3);
    pub const UNICODE_FULL: EncodingId = EncodingId(4);
    pub const UNICODE_VARIATION_SEQUENCES: EncodingId = EncodingId(5);
    pub const UNICODE_FULL_REPERTOIRE: EncodingId = EncodingId(6);

    pub const MACINTOSH_APPLE_ROMAN: EncodingId = EncodingId(0);
}

pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    encoding_records: ReadArray<'a, EncodingRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

pub enum CmapSubtable<'a> {
    Format0 {
        glyph_id_array: ReadArray<'a, U8>,
    },
    Format4 {
        end_codes: ReadArray<'a, U16Be>,
        start_codes: ReadArray<'a, U16Be>,
        id_deltas: ReadArray<'a, I16Be>,
        id_range_offsets: ReadArray<'a, U16Be>,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format6 {
        first_code: u16,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format10 {
        start_char_code: u32,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format12 {
        groups: ReadArray<'a, SequentialMapGroup>,
    },
    /// Many-to-one range mappings: every character in a group maps to the same glyph.
    Format13 {
        groups: ReadArray<'a, SequentialMapGroup>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequentialMapGroup {
    start_char_code: u32,
    end_char_code: u32,
    start_glyph_id: u32,
}

/// Format 14 subtable: Unicode variation sequences.
pub struct VariationSequences<'a> {
    scope: ReadScope<'a>,
    records: ReadArray<'a, VariationSelectorRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VariationSelectorRecord {
    var_selector: u32,
    default_uvs_offset: u32,
    non_default_uvs_offset: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct UnicodeRange {
    start_unicode_value: u32,
    additional_count: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct UvsMapping {
    unicode_value: u32,
    glyph_id: u16,
}

/// The outcome of looking up a variation sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VariationGlyph {
    /// The sequence is not supported by the font.
    NotFound,
    /// The sequence maps to the base character's default glyph.
    UseDefault,
    /// The sequence maps to a specific glyph.
    Found(u16),
}

impl<'b> ReadBinary for Cmap<'b> {
    type HostType<'a> = Cmap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        Ok(Cmap {
            scope,
            encoding_records,
        })
    }
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);

    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl<'b> ReadBinary for CmapSubtable<'b> {
    type HostType<'a> = CmapSubtable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let subtable_format = ctxt.read_u16be()?;
        match subtable_format {
            0 => {
                let length = usize::from(ctxt.read_u16be()?);
                ctxt.check(length >= 3 * 2 + 256)?;
                let _language = ctxt.read_u16be()?;
                let glyph_id_array = ctxt.read_array::<U8>(256)?;
                Ok(CmapSubtable::Format0 { glyph_id_array })
            }
            4 => {
                let length = usize::from(ctxt.read_u16be()?);
                let _language = ctxt.read_u16be()?;
                let seg_count_x2 = usize::from(ctxt.read_u16be()?);
                ctxt.check((seg_count_x2 & 1) == 0)?;
                let seg_count = seg_count_x2 >> 1;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
                // Many fonts get the length wrong; read whatever glyph ids are present.
                let header_len = (8 + 4 * seg_count) * 2;
                let num_indices = length.saturating_sub(header_len) / 2;
                let glyph_id_array = ctxt.read_array_upto_hack::<U16Be>(num_indices)?;
                Ok(CmapSubtable::Format4 {
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                })
            }
            6 => {
                let _length = ctxt.read_u16be()?;
                let _language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = usize::from(ctxt.read_u16be()?);
                let glyph_id_array = ctxt.read_array::<U16Be>(entry_count)?;
                Ok(CmapSubtable::Format6 {
                    first_code,
                    glyph_id_array,
                })
            }
            10 => {
                let _reserved = ctxt.read_u16be()?;
                let _length = ctxt.read_u32be()?;
                let _language = ctxt.read_u32be()?;
                let start_char_code = ctxt.read_u32be()?;
                let num_chars = usize::try_from(ctxt.read_u32be()?)?;
                let glyph_id_array = ctxt.read_array::<U16Be>(num_chars)?;
                Ok(CmapSubtable::Format10 {
                    start_char_code,
                    glyph_id_array,
                })
            }
            12 | 13 => {
                let _reserved = ctxt.read_u16be()?;
                let _length = ctxt.read_u32be()?;
                let _language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;
                if subtable_format == 12 {
                    Ok(CmapSubtable::Format12 { groups })
                } else {
                    Ok(CmapSubtable::Format13 { groups })
                }
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadFrom for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);

    fn read_from((start_char_code, end_char_code, start_glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            start_glyph_id,
        }
    }
}

impl<'b> ReadBinary for VariationSequences<'b> {
    type HostType<'a> = VariationSequences<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == 14)?;
        let _length = ctxt.read_u32be()?;
        let num_records = usize::try_from(ctxt.read_u32be()?)?;
        let records = ctxt.read_array::<VariationSelectorRecord>(num_records)?;
        Ok(VariationSequences { scope, records })
    }
}

impl ReadFrom for VariationSelectorRecord {
    type ReadType = (U24Be, U32Be, U32Be);

    fn read_from(
        (var_selector, default_uvs_offset, non_default_uvs_offset): (u32, u32, u32),
    ) -> Self {
        VariationSelectorRecord {
            var_selector,
            default_uvs_offset,
            non_default_uvs_offset,
        }
    }
}

impl ReadFrom for UnicodeRange {
    type ReadType = (U24Be, U8);

    fn read_from((start_unicode_value, additional_count): (u32, u8)) -> Self {
        UnicodeRange {
            start_unicode_value,
            additional_count,
        }
    }
}

impl ReadFrom for UvsMapping {
    type ReadType = (U24Be, U16Be);

    fn read_from((unicode_value, glyph_id): (u32, u16)) -> Self {
        UvsMapping {
            unicode_value,
            glyph_id,
        }
    }
}

impl<'a> Cmap<'a> {
    /// Find the first encoding record for the given `platform_id` and `encoding_id`
    pub fn find_subtable(
        &self,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Option<EncodingRecord> {
        self.encoding_records.iter().find(|record| {
            record.platform_id == platform_id.0 && record.encoding_id == encoding_id.0
        })
    }

    pub fn read_subtable(&self, record: EncodingRecord) -> Result<CmapSubtable<'a>, ParseError> {
        self.scope
            .offset(usize::try_from(record.offset)?)
            .read::<CmapSubtable<'_>>()
    }

    /// Pick the subtable best suited to Unicode lookups, in order of preference: full Unicode
    /// coverage, then the BMP, then symbol and Mac Roman encodings.
    pub fn find_unicode_subtable(&self) -> Option<(EncodingRecord, CmapSubtable<'a>)> {
        const PREFERENCE: [(PlatformId, EncodingId); 10] = [
            (PlatformId::WINDOWS, EncodingId::WINDOWS_UNICODE_UCS4),
            (PlatformId::UNICODE, EncodingId::UNICODE_FULL_REPERTOIRE),
            (PlatformId::UNICODE, EncodingId::UNICODE_FULL),
            (PlatformId::WINDOWS, EncodingId::WINDOWS_UNICODE_BMP_UCS2),
            (PlatformId::UNICODE, EncodingId::UNICODE_BMP),
            (PlatformId::UNICODE, EncodingId::UNICODE_ISO_10646),
            (PlatformId::UNICODE, EncodingId::UNICODE_1_1),
            (PlatformId::UNICODE, EncodingId::UNICODE_1_0),
            (PlatformId::WINDOWS, EncodingId::WINDOWS_SYMBOL),
            (PlatformId::MACINTOSH, EncodingId::MACINTOSH_APPLE_ROMAN),
        ];
        PREFERENCE
            .iter()
            .filter_map(|&(platform_id, encoding_id)| self.find_subtable(platform_id, encoding_id))
            .find_map(|record| {
                self.read_subtable(record)
                    .ok()
                    .map(|subtable| (record, subtable))
            })
    }

    pub fn find_variation_sequences(&self) -> Option<VariationSequences<'a>> {
        let record = self.find_subtable(
            PlatformId::UNICODE,
            EncodingId::UNICODE_VARIATION_SEQUENCES,
        )?;
        let offset = usize::try_from(record.offset).ok()?;
        self.scope.offset(offset).read::<VariationSequences<'_>>().ok()
    }
}

impl<'a> CmapSubtable<'a> {
    /// The glyph for `ch`. Characters mapped to glyph 0 are reported as unmapped.
    pub fn map_glyph(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        self.lookup(ch)
            .map(|glyph_id| glyph_id.filter(|&glyph_id| glyph_id != 0))
    }

    fn lookup(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        match self {
            CmapSubtable::Format0 { glyph_id_array } => Ok(usize::try_from(ch)
                .ok()
                .and_then(|index| glyph_id_array.get_item(index))
                .map(u16::from)),
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                id_deltas,
                id_range_offsets,
                glyph_id_array,
            } => {
                if ch > 0xFFFF {
                    return Ok(None);
                }
                // Segments are sorted by end code; find the first that ends at or after `ch`.
                let i = match end_codes.binary_search_by(|end| u32::from(end).cmp(&ch)) {
                    Ok(i) | Err(i) => i,
                };
                let (start_code, id_delta, id_range_offset) = match (
                    start_codes.get_item(i),
                    id_deltas.get_item(i),
                    id_range_offsets.get_item(i),
                ) {
                    (Some(start), Some(delta), Some(offset)) => (u32::from(start), delta, offset),
                    _ => return Ok(None),
                };
                if ch < start_code {
                    return Ok(None);
                }
                if id_range_offset == 0 {
                    // The idDelta arithmetic is modulo 65536.
                    return Ok(Some((ch as u16).wrapping_add(id_delta as u16)));
                }
                let glyph_id_offset =
                    usize::from(id_range_offset) / 2 + i + (ch - start_code) as usize;
                let index = glyph_id_offset
                    .checked_sub(id_range_offsets.len())
                    .ok_or(ParseError::BadIndex)?;
                match glyph_id_array.get_item(index) {
                    Some(0) | None => Ok(None),
                    Some(glyph_id) => Ok(Some(glyph_id.wrapping_add(id_delta as u16))),
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
            } => Ok(ch
                .checked_sub(u32::from(*first_code))
                .and_then(|index| glyph_id_array.get_item(index as usize))),
            CmapSubtable::Format10 {
                start_char_code,
                glyph_id_array,
            } => Ok(ch
                .checked_sub(*start_char_code)
                .and_then(|index| glyph_id_array.get_item(index as usize))),
            CmapSubtable::Format12 { groups } => Ok(find_group(groups, ch).and_then(|group| {
                u16::try_from(group.start_glyph_id + (ch - group.start_char_code)).ok()
            })),
            CmapSubtable::Format13 { groups } => Ok(find_group(groups, ch)
                .and_then(|group| u16::try_from(group.start_glyph_id).ok())),
        }
    }
}

fn find_group(groups: &ReadArray<'_, SequentialMapGroup>, ch: u32) -> Option<SequentialMapGroup> {
    let index = groups
        .binary_search_by(|group| {
            if ch < group.start_char_code {
                Ordering::Greater
            } else if ch > group.end_char_code {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        })
        .ok()?;
    groups.get_item(index)
}

impl<'a> VariationSequences<'a> {
    pub fn map_variant(&self, ch: u32, selector: u32) -> Result<VariationGlyph, ParseError> {
        let record = match self
            .records
            .binary_search_by(|record| record.var_selector.cmp(&selector))
        {
            Ok(index) => self.records.read_item(index)?,
            Err(_) => return Ok(VariationGlyph::NotFound),
        };

        if record.default_uvs_offset != 0 {
            let mut ctxt = self
                .scope
                .offset(usize::try_from(record.default_uvs_offset)?)
                .ctxt();
            let count = usize::try_from(ctxt.read_u32be()?)?;
            let ranges = ctxt.read_array::<UnicodeRange>(count)?;
            let found = ranges
                .binary_search_by(|range| {
                    let end = range.start_unicode_value + u32::from(range.additional_count);
                    if ch < range.start_unicode_value {
                        Ordering::Greater
                    } else if ch > end {
                        Ordering::Less
                    } else {
                        Ordering::Equal
                    }
                })
                .is_ok();
            if found {
                return Ok(VariationGlyph::UseDefault);
            }
        }

        if record.non_default_uvs_offset != 0 {
            let mut ctxt = self
                .scope
                .offset(usize::try_from(record.non_default_uvs_offset)?)
                .ctxt();
            let count = usize::try_from(ctxt.read_u32be()?)?;
            let mappings = ctxt.read_array::<UvsMapping>(count)?;
            if let Ok(index) = mappings.binary_search_by(|mapping| mapping.unicode_value.cmp(&ch))
            {
                let mapping = mappings.read_item(index)?;
                return Ok(VariationGlyph::Found(mapping.glyph_id));
            }
        }

        Ok(VariationGlyph::NotFound)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A format 4 subtable mapping `first..=last` to consecutive glyphs from `first_glyph`.
    pub(crate) fn format4_subtable(first: u16, last: u16, first_glyph: u16) -> Vec<u8> {
        let mut data = Vec::new();
        let seg_count = 2u16;
        let length = (8 + 4 * seg_count) * 2;
        for v in [4, length, 0, seg_count * 2, 4, 1, 0] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        // end codes, pad, start codes, deltas, range offsets
        for v in [last, 0xFFFF, 0, first, 0xFFFF] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        for v in [first_glyph.wrapping_sub(first), 1] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&[0; 4]);
        data
    }

    /// A `cmap` table holding `subtables` for the given (platform, encoding) pairs.
    pub(crate) fn cmap_table(subtables: &[(u16, u16, Vec<u8>)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&(subtables.len() as u16).to_be_bytes());
        let mut offset = 4 + 8 * subtables.len();
        for (platform_id, encoding_id, subtable) in subtables {
            data.extend_from_slice(&platform_id.to_be_bytes());
            data.extend_from_slice(&encoding_id.to_be_bytes());
            data.extend_from_slice(&(offset as u32).to_be_bytes());
            offset += subtable.len();
        }
        for (_, _, subtable) in subtables {
            data.extend_from_slice(subtable);
        }
        data
    }

    fn format14_subtable() -> Vec<u8> {
        // One selector (U+FE00) with a default range U+4E00..=U+4E01 and a mapping for U+4E08.
        let mut data = Vec::new();
        data.extend_from_slice(&14u16.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&[0x00, 0xFE, 0x00]);
        data.extend_from_slice(&21u32.to_be_bytes());
        data.extend_from_slice(&29u32.to_be_bytes());
        // default UVS
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x4E, 0x00, 1]);
        // non-default UVS
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x4E, 0x08, 0, 42]);
        data
    }

    #[test]
    fn format4_lookup() {
        let data = format4_subtable(0x41, 0x5A, 3);
        let subtable = ReadScope::new(&data).read::<CmapSubtable<'_>>().unwrap();
        assert_eq!(subtable.map_glyph(0x41), Ok(Some(3)));
        assert_eq!(subtable.map_glyph(0x5A), Ok(Some(28)));
        assert_eq!(subtable.map_glyph(0x40), Ok(None));
        assert_eq!(subtable.map_glyph(0x1F600), Ok(None));
    }

    #[test]
    fn format12_and_13_lookup() {
        let mut data = vec![0, 12, 0, 0, 0, 0, 0, 40, 0, 0, 0, 0, 0, 0, 0, 2];
        for v in [0x20u32, 0x7E, 1, 0x1F600, 0x1F64F, 200] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let subtable = ReadScope::new(&data).read::<CmapSubtable<'_>>().unwrap();
        assert_eq!(subtable.map_glyph(0x21), Ok(Some(2)));
        assert_eq!(subtable.map_glyph(0x1F601), Ok(Some(201)));
        assert_eq!(subtable.map_glyph(0x7F), Ok(None));

        data[1] = 13;
        let subtable = ReadScope::new(&data).read::<CmapSubtable<'_>>().unwrap();
        assert_eq!(subtable.map_glyph(0x1F601), Ok(Some(200)));
    }

    #[test]
    fn prefers_full_unicode_subtable() {
        let bmp = format4_subtable(0x41, 0x5A, 3);
        let full = format4_subtable(0x41, 0x5A, 100);
        let data = cmap_table(&[(3, 1, bmp), (3, 10, full)]);
        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let (record, subtable) = cmap.find_unicode_subtable().unwrap();
        assert_eq!(record.encoding_id, 10);
        assert_eq!(subtable.map_glyph(0x41), Ok(Some(100)));
    }

    #[test]
    fn variation_sequences() {
        let data = cmap_table(&[(0, 5, format14_subtable())]);
        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let uvs = cmap.find_variation_sequences().unwrap();
        assert_eq!(uvs.map_variant(0x4E01, 0xFE00), Ok(VariationGlyph::UseDefault));
        assert_eq!(uvs.map_variant(0x4E08, 0xFE00), Ok(VariationGlyph::Found(42)));
        assert_eq!(uvs.map_variant(0x4E09, 0xFE00), Ok(VariationGlyph::NotFound));
        assert_eq!(uvs.map_variant(0x4E00, 0xE0101), Ok(VariationGlyph::NotFound));
    }
}
