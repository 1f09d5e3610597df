//! Graphite glyph attribute tables: `Gloc` and `Glat`.

use std::borrow::Cow;

use log::warn;

use super::lz4;
use crate::binary::read::{ReadBinaryDep, ReadCtxt, ReadScope};
use crate::error::ParseError;

/// Largest size a compressed `Glat` table may expand to.
const UNCOMPRESSED_LIMIT: usize = 10_000_000;

/// Parsed `Gloc` table: the offset of each glyph's attributes in `Glat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlocTable {
    pub locations: Vec<u32>,
    pub num_attrs: u16,
}

impl ReadBinaryDep for GlocTable {
    /// The number of glyphs in the font
    type Args<'a> = usize;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, num_glyphs: usize) -> Result<Self, ParseError> {
        let length = ctxt.remaining();
        let _version = ctxt.read_u32be()?;
        let flags = ctxt.read_u16be()?;
        let num_attrs = ctxt.read_u16be()?;
        let long_offsets = flags & 1 != 0;

        // There may be more locations than glyphs when the font has pseudo glyphs. The
        // count is derived from the table size, less the attribute ids when present.
        let attr_ids_len = if flags & 2 != 0 {
            usize::from(num_attrs) * 2
        } else {
            0
        };
        let byte_len = length
            .checked_sub(8 + attr_ids_len)
            .ok_or(ParseError::BadEof)?;
        let num_locations = if long_offsets {
            byte_len / 4
        } else {
            byte_len / 2
        };
        if num_locations < num_glyphs + 1 {
            return Err(ParseError::BadValue);
        }

        let locations = if long_offsets {
            ctxt.read_array::<crate::binary::U32Be>(num_locations)?.to_vec()
        } else {
            ctxt.read_array::<crate::binary::U16Be>(num_locations)?
                .iter()
                .map(u32::from)
                .collect()
        };
        Ok(GlocTable {
            locations,
            num_attrs,
        })
    }
}

/// A run of consecutive attribute values starting at attribute `first`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRun {
    pub first: u16,
    pub values: Vec<i16>,
}

/// Collision bounds of a glyph, as fractions of its bounding box in 1/255ths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Octabox {
    pub bitmap: u16,
    /// Negative diagonal min and max, positive diagonal min and max
    pub diagonals: [u8; 4],
    /// One entry per set bit of `bitmap`: left, right, bottom, top, then the diagonals
    pub subboxes: Vec<[u8; 8]>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphAttrs {
    /// Sorted by `first`, non-overlapping
    pub runs: Vec<AttrRun>,
    pub octabox: Option<Octabox>,
}

impl GlyphAttrs {
    pub fn get(&self, attr: u16) -> Option<i16> {
        let index = match self.runs.binary_search_by(|run| run.first.cmp(&attr)) {
            Ok(index) => index,
            Err(0) => return None,
            Err(index) => index - 1,
        };
        let run = &self.runs[index];
        run.values.get(usize::from(attr - run.first)).copied()
    }
}

/// Parsed `Glat` table, one entry per `Gloc` location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlatTable {
    pub glyphs: Vec<GlyphAttrs>,
}

impl GlatTable {
    pub fn parse(data: &[u8], gloc: &GlocTable) -> Result<GlatTable, ParseError> {
        let data = decompress_table(data)?;
        let mut ctxt = ReadScope::new(&data).ctxt();
        let version = ctxt.read_u32be()? >> 16;
        ctxt.check_version(version <= 3)?;
        let has_octaboxes = if version >= 3 {
            ctxt.read_u32be()? & 1 != 0
        } else {
            false
        };

        let scope = ReadScope::new(&data);
        let glyphs = gloc
            .locations
            .windows(2)
            .map(|window| {
                let (start, end) = (window[0] as usize, window[1] as usize);
                if start >= end {
                    return Ok(GlyphAttrs::default());
                }
                let mut ctxt = scope.offset_length(start, end - start)?.ctxt();
                read_glyph_attrs(&mut ctxt, version, has_octaboxes)
            })
            .collect::<Result<Vec<_>, ParseError>>()?;
        Ok(GlatTable { glyphs })
    }

    pub fn glyph(&self, index: usize) -> Option<&GlyphAttrs> {
        self.glyphs.get(index)
    }
}

/// Undo the table level compression of version 3 tables. The result includes the
/// table header.
fn decompress_table(data: &[u8]) -> Result<Cow<'_, [u8]>, ParseError> {
    let mut ctxt = ReadScope::new(data).ctxt();
    let version = ctxt.read_u32be()?;
    if version >> 16 < 3 || ctxt.remaining() < 4 {
        return Ok(Cow::Borrowed(data));
    }
    let compression = ctxt.read_u32be()?;
    match compression >> 27 {
        0 => Ok(Cow::Borrowed(data)),
        1 => {
            let size = (compression & 0x07FF_FFFF) as usize;
            if size > UNCOMPRESSED_LIMIT {
                return Err(ParseError::LimitExceeded);
            }
            let uncompressed = lz4::decompress(&data[8..], size)?;
            // the uncompressed table repeats the header
            match uncompressed.get(..4) {
                Some(header) if header == version.to_be_bytes() => Ok(Cow::Owned(uncompressed)),
                _ => Err(ParseError::CompressionError),
            }
        }
        scheme => {
            warn!("unsupported Glat compression scheme {}", scheme);
            Err(ParseError::CompressionError)
        }
    }
}

fn read_glyph_attrs(
    ctxt: &mut ReadCtxt<'_>,
    version: u32,
    has_octaboxes: bool,
) -> Result<GlyphAttrs, ParseError> {
    let octabox = if has_octaboxes {
        let bitmap = ctxt.read_u16be()?;
        let mut diagonals = [0; 4];
        for diagonal in diagonals.iter_mut() {
            *diagonal = ctxt.read_u8()?;
        }
        let mut subboxes = Vec::with_capacity(bitmap.count_ones() as usize);
        for _ in 0..bitmap.count_ones() {
            let mut subbox = [0; 8];
            for value in subbox.iter_mut() {
                *value = ctxt.read_u8()?;
            }
            subboxes.push(subbox);
        }
        Some(Octabox {
            bitmap,
            diagonals,
            subboxes,
        })
    } else {
        None
    };

    let header_len = if version < 2 { 2 } else { 4 };
    let mut runs: Vec<AttrRun> = Vec::new();
    let mut last_end = 0;
    while ctxt.remaining() >= header_len {
        let (first, count) = if version < 2 {
            (u16::from(ctxt.read_u8()?), usize::from(ctxt.read_u8()?))
        } else {
            (ctxt.read_u16be()?, usize::from(ctxt.read_u16be()?))
        };
        if usize::from(first) < last_end {
            return Err(ParseError::BadValue);
        }
        let values = ctxt.read_array::<crate::binary::I16Be>(count)?.to_vec();
        last_end = usize::from(first) + values.len();
        runs.push(AttrRun { first, values });
    }

    Ok(GlyphAttrs { runs, octabox })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gloc(locations: &[u16], num_attrs: u16) -> Vec<u8> {
        let mut data = vec![0, 1, 0, 0, 0, 0];
        data.extend_from_slice(&num_attrs.to_be_bytes());
        for location in locations {
            data.extend_from_slice(&location.to_be_bytes());
        }
        data
    }

    #[test]
    fn read_gloc() {
        let data = gloc(&[4, 10, 10], 3);
        let table = ReadScope::new(&data).read_dep::<GlocTable>(2).unwrap();
        assert_eq!(table.locations, vec![4, 10, 10]);
        assert_eq!(table.num_attrs, 3);
    }

    #[test]
    fn gloc_too_short() {
        let data = gloc(&[4, 10], 3);
        assert_eq!(
            ReadScope::new(&data).read_dep::<GlocTable>(2),
            Err(ParseError::BadValue)
        );
    }

    #[test]
    fn read_glat_v1() {
        let glat = [
            0, 1, 0, 0, // version
            0, 2, 0, 7, 0, 8, // attrs 0 and 1
            5, 1, 0xFF, 0xFF, // attr 5
        ];
        let gloc = GlocTable {
            locations: vec![4, 14, 14],
            num_attrs: 6,
        };
        let table = GlatTable::parse(&glat, &gloc).unwrap();
        let attrs = table.glyph(0).unwrap();
        assert_eq!(attrs.get(0), Some(7));
        assert_eq!(attrs.get(1), Some(8));
        assert_eq!(attrs.get(2), None);
        assert_eq!(attrs.get(5), Some(-1));
        assert_eq!(table.glyph(1), Some(&GlyphAttrs::default()));
    }

    #[test]
    fn glat_keys_must_increase() {
        let glat = [0, 2, 0, 0, 0, 3, 0, 1, 0, 1, 0, 1, 0, 1, 0, 2];
        let gloc = GlocTable {
            locations: vec![4, 16],
            num_attrs: 4,
        };
        assert_eq!(GlatTable::parse(&glat, &gloc), Err(ParseError::BadValue));
    }

    #[test]
    fn read_glat_v3_with_octabox() {
        let glat = [
            0, 3, 0, 0, // version
            0, 0, 0, 1, // uncompressed, octaboxes present
            0, 1, 1, 2, 3, 4, // bitmap with one subbox, diagonals
            10, 20, 30, 40, 50, 60, 70, 80, // subbox
            0, 0, 0, 1, 0, 9, // attr 0
        ];
        let gloc = GlocTable {
            locations: vec![8, 28],
            num_attrs: 1,
        };
        let table = GlatTable::parse(&glat, &gloc).unwrap();
        let attrs = table.glyph(0).unwrap();
        assert_eq!(attrs.get(0), Some(9));
        let octabox = attrs.octabox.as_ref().unwrap();
        assert_eq!(octabox.diagonals, [1, 2, 3, 4]);
        assert_eq!(octabox.subboxes, vec![[10, 20, 30, 40, 50, 60, 70, 80]]);
    }

    #[test]
    fn compressed_glat() {
        let uncompressed = [0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 4];
        let mut glat = vec![0, 3, 0, 0];
        glat.extend_from_slice(&((1u32 << 27) | uncompressed.len() as u32).to_be_bytes());
        glat.push((uncompressed.len() as u8) << 4);
        glat.extend_from_slice(&uncompressed);
        let gloc = GlocTable {
            locations: vec![8, 14],
            num_attrs: 1,
        };
        let table = GlatTable::parse(&glat, &gloc).unwrap();
        assert_eq!(table.glyph(0).unwrap().get(0), Some(4));
    }

    #[test]
    fn unknown_compression() {
        let glat = [0, 3, 0, 0, 0x10, 0, 0, 0];
        let gloc = GlocTable {
            locations: vec![8, 8],
            num_attrs: 0,
        };
        assert_eq!(
            GlatTable::parse(&glat, &gloc),
            Err(ParseError::CompressionError)
        );
    }
}
