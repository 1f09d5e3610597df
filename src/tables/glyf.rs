//! Glyph bounding boxes from the `glyf` and `loca` tables.
//!
//! Only the glyph header is decoded: its bounding box is all that glyph extents need.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>

use crate::binary::read::{ReadArray, ReadBinaryDep, ReadCtxt, ReadScope};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::IndexToLocFormat;

/// `loca` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>
#[derive(Clone, Debug)]
pub enum LocaTable<'a> {
    Short(ReadArray<'a, U16Be>),
    Long(ReadArray<'a, U32Be>),
}

/// The bounding box from a glyph header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// Glyph data addressed through `loca`.
#[derive(Clone)]
pub struct GlyfTable<'a> {
    scope: ReadScope<'a>,
    loca: LocaTable<'a>,
}

impl<'b> ReadBinaryDep for LocaTable<'b> {
    type Args<'a> = (u16, IndexToLocFormat);
    type HostType<'a> = LocaTable<'a>;

    /// Read a `loca` table from `ctxt`
    ///
    /// * `num_glyphs` is the number of glyphs in the font, from the `maxp` table.
    /// * `index_to_loc_format` is read from the `head` table.
    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, index_to_loc_format): (u16, IndexToLocFormat),
    ) -> Result<Self::HostType<'a>, ParseError> {
        // The value of n is numGlyphs + 1.
        let count = usize::from(num_glyphs) + 1;
        match index_to_loc_format {
            IndexToLocFormat::Short => Ok(LocaTable::Short(ctxt.read_array::<U16Be>(count)?)),
            IndexToLocFormat::Long => Ok(LocaTable::Long(ctxt.read_array::<U32Be>(count)?)),
        }
    }
}

impl<'a> LocaTable<'a> {
    /// The byte range of `glyph_id` within `glyf`.
    pub fn glyph_range(&self, glyph_id: u16) -> Option<(usize, usize)> {
        let index = usize::from(glyph_id);
        let (start, end) = match self {
            // The actual local offset divided by 2 is stored.
            LocaTable::Short(offsets) => (
                usize::from(offsets.get_item(index)?) * 2,
                usize::from(offsets.get_item(index + 1)?) * 2,
            ),
            LocaTable::Long(offsets) => (
                offsets.get_item(index)? as usize,
                offsets.get_item(index + 1)? as usize,
            ),
        };
        (start <= end).then_some((start, end))
    }
}

impl<'a> GlyfTable<'a> {
    pub fn new(glyf_data: &'a [u8], loca: LocaTable<'a>) -> GlyfTable<'a> {
        GlyfTable {
            scope: ReadScope::new(glyf_data),
            loca,
        }
    }

    /// The bounding box of `glyph_id`. Empty glyphs have `Ok(None)`.
    pub fn bounding_box(&self, glyph_id: u16) -> Result<Option<BoundingBox>, ParseError> {
        let (start, end) = self.loca.glyph_range(glyph_id).ok_or(ParseError::BadIndex)?;
        if start == end {
            return Ok(None);
        }
        let mut ctxt = self.scope.offset_length(start, end - start)?.ctxt();
        let _number_of_contours = ctxt.read_i16be()?;
        Ok(Some(BoundingBox {
            x_min: ctxt.read_i16be()?,
            y_min: ctxt.read_i16be()?,
            x_max: ctxt.read_i16be()?,
            y_max: ctxt.read_i16be()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_boxes() {
        // glyph 0 is empty, glyph 1 has a 10 byte header
        let loca_data = [0, 0, 0, 0, 0, 5];
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((2, IndexToLocFormat::Short))
            .unwrap();
        let glyf_data = [0, 1, 0, 10, 0xFF, 0xF6, 1, 0, 2, 0];
        let glyf = GlyfTable::new(&glyf_data, loca);
        assert_eq!(glyf.bounding_box(0), Ok(None));
        assert_eq!(
            glyf.bounding_box(1),
            Ok(Some(BoundingBox {
                x_min: 10,
                y_min: -10,
                x_max: 256,
                y_max: 512
            }))
        );
        assert_eq!(glyf.bounding_box(2), Err(ParseError::BadIndex));
    }
}
