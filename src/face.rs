//! Font faces: the tables and metrics that shaping reads.
//!
//! Shaping only sees a font through the [FontFace] trait. [OpenTypeFace] implements it over
//! the tables of an sfnt font, parsed once when the face is created.

use log::warn;

use crate::binary::read::ReadScope;
use crate::cff::CFF;
use crate::error::ParseError;
use crate::graphite::{GlyphFace, GraphiteFace, Position, Rect};
use crate::layout::{GDEFTable, LayoutTable, GPOS, GSUB};
use crate::tables::cmap::{Cmap, CmapSubtable, VariationGlyph, VariationSequences};
use crate::tables::glyf::{GlyfTable, LocaTable};
use crate::tables::kern::KernTable;
use crate::tables::kerx::KerxTable;
use crate::tables::morx::MorxTable;
use crate::tables::os2::Os2;
use crate::tables::variable_fonts::avar::AvarTable;
use crate::tables::variable_fonts::fvar::FvarTable;
use crate::tables::{
    F2Dot14, Fixed, FontTableProvider, HeadTable, HheaTable, HmtxTable, MaxpTable,
    OffsetTableFontProvider, PostTable,
};
use crate::tag;
use crate::variations::{design_coords, Variation};

/// Ink bounds of a glyph, in font units with y pointing up.
///
/// `y_bearing` is the top of the glyph and `height` is negative for glyphs with ink.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GlyphExtents {
    pub x_bearing: i32,
    pub y_bearing: i32,
    pub width: i32,
    pub height: i32,
}

/// Line spacing metrics for one direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct FontExtents {
    pub ascender: i32,
    pub descender: i32,
    pub line_gap: i32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineMetric {
    UnderlinePosition,
    UnderlineThickness,
    StrikeoutPosition,
    StrikeoutSize,
}

/// The font queries used while shaping.
///
/// Glyph ids are those of the face. Metrics are in font units.
pub trait FontFace {
    fn units_per_em(&self) -> u16;

    fn num_glyphs(&self) -> u16;

    /// The glyph for `ch`, `None` when the font does not map it.
    fn nominal_glyph(&self, ch: u32) -> Option<u16>;

    /// The glyph for `ch` followed by the variation selector `selector`.
    fn variation_glyph(&self, _ch: u32, _selector: u32) -> Option<u16> {
        None
    }

    fn glyph_h_advance(&self, glyph: u16) -> i32;

    /// The vertical advance. It is negative since y points up.
    fn glyph_v_advance(&self, _glyph: u16) -> i32 {
        -i32::from(self.units_per_em())
    }

    fn glyph_h_origin(&self, _glyph: u16) -> (i32, i32) {
        (0, 0)
    }

    /// The origin of vertical layout, relative to the horizontal origin.
    fn glyph_v_origin(&self, glyph: u16) -> (i32, i32) {
        (
            self.glyph_h_advance(glyph) / 2,
            self.font_extents_h().ascender,
        )
    }

    fn glyph_extents(&self, _glyph: u16) -> Option<GlyphExtents> {
        None
    }

    fn font_extents_h(&self) -> FontExtents;

    fn font_extents_v(&self) -> Option<FontExtents> {
        None
    }

    fn line_metric(&self, _metric: LineMetric) -> Option<i32> {
        None
    }

    fn gdef(&self) -> Option<&GDEFTable> {
        None
    }

    fn gsub(&self) -> Option<&LayoutTable<GSUB>> {
        None
    }

    fn gpos(&self) -> Option<&LayoutTable<GPOS>> {
        None
    }

    fn kern(&self) -> Option<&KernTable<'_>> {
        None
    }

    fn morx(&self) -> Option<&MorxTable<'_>> {
        None
    }

    fn kerx(&self) -> Option<&KerxTable<'_>> {
        None
    }

    fn graphite(&self) -> Option<&GraphiteFace> {
        None
    }
}

/// Metrics for vertical layout.
struct VerticalMetrics<'a> {
    vhea: HheaTable,
    vmtx: HmtxTable<'a>,
}

/// A face over the tables of an OpenType or TrueType font.
pub struct OpenTypeFace<'a> {
    head: HeadTable,
    maxp: MaxpTable,
    hhea: HheaTable,
    hmtx: HmtxTable<'a>,
    vertical: Option<VerticalMetrics<'a>>,
    os2: Option<Os2>,
    post: Option<PostTable>,
    cmap: Option<CmapSubtable<'a>>,
    variation_sequences: Option<VariationSequences<'a>>,
    glyf: Option<GlyfTable<'a>>,
    cff: Option<CFF<'a>>,
    gdef: Option<GDEFTable>,
    gsub: Option<LayoutTable<GSUB>>,
    gpos: Option<LayoutTable<GPOS>>,
    kern: Option<KernTable<'a>>,
    morx: Option<MorxTable<'a>>,
    kerx: Option<KerxTable<'a>>,
    fvar: Option<FvarTable<'a>>,
    avar: Option<AvarTable<'a>>,
    graphite: Option<GraphiteFace>,
    coords: Vec<F2Dot14>,
}

impl<'a> OpenTypeFace<'a> {
    /// Parse the tables of the sfnt font in `data`.
    ///
    /// Fails when the table directory or any table present is invalid, or when one of
    /// `head`, `maxp`, `hhea` or `hmtx` is missing.
    pub fn new(data: &'a [u8]) -> Result<OpenTypeFace<'a>, ParseError> {
        let provider = OffsetTableFontProvider::new(data)?;
        let required = |tag: u32| -> Result<ReadScope<'a>, ParseError> {
            provider.table_scope(tag)?.ok_or(ParseError::MissingTable(tag))
        };

        let head = required(tag::HEAD)?.read::<HeadTable>()?;
        let maxp = required(tag::MAXP)?.read::<MaxpTable>()?;
        let num_glyphs = maxp.num_glyphs;
        let hhea = required(tag::HHEA)?.read::<HheaTable>()?;
        let hmtx = required(tag::HMTX)?.read_dep::<HmtxTable<'_>>((
            usize::from(num_glyphs),
            usize::from(hhea.num_h_metrics),
        ))?;

        let vertical = match (
            provider.table_scope(tag::VHEA)?,
            provider.table_scope(tag::VMTX)?,
        ) {
            (Some(vhea), Some(vmtx)) => {
                let vhea = vhea.read::<HheaTable>()?;
                let vmtx = vmtx.read_dep::<HmtxTable<'_>>((
                    usize::from(num_glyphs),
                    usize::from(vhea.num_h_metrics),
                ))?;
                Some(VerticalMetrics { vhea, vmtx })
            }
            _ => None,
        };

        let (cmap, variation_sequences) = match provider.table_scope(tag::CMAP)? {
            Some(scope) => {
                let cmap = scope.read::<Cmap<'_>>()?;
                let subtable = cmap.find_unicode_subtable().map(|(_, subtable)| subtable);
                (subtable, cmap.find_variation_sequences())
            }
            None => (None, None),
        };

        let glyf = match (
            provider.table_scope(tag::GLYF)?,
            provider.table_scope(tag::LOCA)?,
        ) {
            (Some(glyf), Some(loca)) => {
                let loca = loca
                    .read_dep::<LocaTable<'_>>((num_glyphs, head.index_to_loc_format))?;
                Some(GlyfTable::new(glyf.data(), loca))
            }
            _ => None,
        };

        let mut face = OpenTypeFace {
            head,
            maxp,
            hhea,
            hmtx,
            vertical,
            os2: read_optional(&provider, tag::OS_2, |scope| scope.read::<Os2>())?,
            post: read_optional(&provider, tag::POST, |scope| scope.read::<PostTable>())?,
            cmap,
            variation_sequences,
            glyf,
            cff: read_optional(&provider, tag::CFF, |scope| scope.read::<CFF<'_>>())?,
            gdef: read_optional(&provider, tag::GDEF, |scope| scope.read::<GDEFTable>())?,
            gsub: read_optional(&provider, tag::GSUB, |scope| {
                scope.read::<LayoutTable<GSUB>>()
            })?,
            gpos: read_optional(&provider, tag::GPOS, |scope| {
                scope.read::<LayoutTable<GPOS>>()
            })?,
            kern: read_optional(&provider, tag::KERN, |scope| scope.read::<KernTable<'_>>())?,
            morx: read_optional(&provider, tag::MORX, |scope| {
                scope.read_dep::<MorxTable<'_>>(num_glyphs)
            })?,
            kerx: read_optional(&provider, tag::KERX, |scope| scope.read::<KerxTable<'_>>())?,
            fvar: read_optional(&provider, tag::FVAR, |scope| scope.read::<FvarTable<'_>>())?,
            avar: read_optional(&provider, tag::AVAR, |scope| scope.read::<AvarTable<'_>>())?,
            graphite: None,
            coords: Vec::new(),
        };

        if provider.has_table(tag::SILF) {
            let extents = face.font_extents_h();
            let glyphs = (0..num_glyphs).map(|glyph| face.graphite_glyph(glyph)).collect();
            face.graphite =
                GraphiteFace::load(&provider, glyphs, extents.ascender, extents.descender)?;
        }

        Ok(face)
    }

    fn graphite_glyph(&self, glyph: u16) -> GlyphFace {
        let advance = Position::new(self.glyph_h_advance(glyph) as f32, 0.0);
        let extents = self.glyph_extents(glyph).unwrap_or_default();
        let bbox = Rect::new(
            Position::new(
                extents.x_bearing as f32,
                (extents.y_bearing + extents.height) as f32,
            ),
            Position::new(
                (extents.x_bearing + extents.width) as f32,
                extents.y_bearing as f32,
            ),
        );
        GlyphFace::new(advance, bbox)
    }

    /// Set the variation axes from design space settings such as `wght=700`.
    ///
    /// Does nothing for fonts without an `fvar` table.
    pub fn set_variations(&mut self, variations: &[Variation]) {
        if let Some(fvar) = &self.fvar {
            let user_coords = design_coords(fvar, variations);
            self.coords = self.normalize_variations(&user_coords);
        }
    }

    /// Map design space coordinates, one per `fvar` axis, to normalized coordinates.
    pub fn normalize_variations(&self, user_coords: &[Fixed]) -> Vec<F2Dot14> {
        match &self.fvar {
            Some(fvar) => fvar.normalize(user_coords, self.avar.as_ref()),
            None => Vec::new(),
        }
    }

    /// The normalized variation coordinates of the face. Empty for the default instance.
    pub fn coords(&self) -> &[F2Dot14] {
        &self.coords
    }

    pub fn head(&self) -> &HeadTable {
        &self.head
    }

    pub fn is_cff(&self) -> bool {
        self.cff.is_some()
    }
}

fn read_optional<'a, T>(
    provider: &OffsetTableFontProvider<'a>,
    tag: u32,
    read: impl FnOnce(ReadScope<'a>) -> Result<T, ParseError>,
) -> Result<Option<T>, ParseError> {
    provider.table_scope(tag)?.map(read).transpose()
}

impl<'a> FontFace for OpenTypeFace<'a> {
    fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    fn num_glyphs(&self) -> u16 {
        self.maxp.num_glyphs
    }

    fn nominal_glyph(&self, ch: u32) -> Option<u16> {
        let cmap = self.cmap.as_ref()?;
        cmap.map_glyph(ch)
            .ok()
            .flatten()
            .filter(|&glyph| glyph != 0)
    }

    fn variation_glyph(&self, ch: u32, selector: u32) -> Option<u16> {
        let sequences = self.variation_sequences.as_ref()?;
        match sequences.map_variant(ch, selector).ok()? {
            VariationGlyph::NotFound => None,
            VariationGlyph::UseDefault => self.nominal_glyph(ch),
            VariationGlyph::Found(glyph) => Some(glyph),
        }
    }

    fn glyph_h_advance(&self, glyph: u16) -> i32 {
        self.hmtx.advance(glyph).map(i32::from).unwrap_or(0)
    }

    fn glyph_v_advance(&self, glyph: u16) -> i32 {
        match &self.vertical {
            Some(vertical) => -vertical.vmtx.advance(glyph).map(i32::from).unwrap_or(0),
            None => -i32::from(self.units_per_em()),
        }
    }

    fn glyph_v_origin(&self, glyph: u16) -> (i32, i32) {
        let x = self.glyph_h_advance(glyph) / 2;
        let top = self.vertical.as_ref().and_then(|vertical| {
            let top_side_bearing = vertical.vmtx.side_bearing(glyph).ok()?;
            let extents = self.glyph_extents(glyph)?;
            Some(i32::from(top_side_bearing) + extents.y_bearing)
        });
        (x, top.unwrap_or_else(|| self.font_extents_h().ascender))
    }

    fn glyph_extents(&self, glyph: u16) -> Option<GlyphExtents> {
        if let Some(glyf) = &self.glyf {
            return match glyf.bounding_box(glyph) {
                Ok(Some(bbox)) => Some(GlyphExtents {
                    x_bearing: i32::from(bbox.x_min),
                    y_bearing: i32::from(bbox.y_max),
                    width: i32::from(bbox.x_max) - i32::from(bbox.x_min),
                    height: i32::from(bbox.y_min) - i32::from(bbox.y_max),
                }),
                Ok(None) => Some(GlyphExtents::default()),
                Err(_) => None,
            };
        }
        let cff = self.cff.as_ref()?;
        match cff.glyph_metrics(glyph) {
            Ok(metrics) => {
                let bounds = metrics.bounds;
                Some(GlyphExtents {
                    x_bearing: bounds.x_min(),
                    y_bearing: bounds.y_max(),
                    width: bounds.x_max() - bounds.x_min(),
                    height: bounds.y_min() - bounds.y_max(),
                })
            }
            Err(err) => {
                warn!("charstring for glyph {} failed: {}", glyph, err);
                Some(GlyphExtents::default())
            }
        }
    }

    fn font_extents_h(&self) -> FontExtents {
        match self.os2.as_ref().and_then(Os2::preferred_typo_metrics) {
            Some(typo) => FontExtents {
                ascender: i32::from(typo.s_typo_ascender),
                descender: i32::from(typo.s_typo_descender),
                line_gap: i32::from(typo.s_typo_line_gap),
            },
            None => FontExtents {
                ascender: i32::from(self.hhea.ascender),
                descender: i32::from(self.hhea.descender),
                line_gap: i32::from(self.hhea.line_gap),
            },
        }
    }

    fn font_extents_v(&self) -> Option<FontExtents> {
        let vhea = &self.vertical.as_ref()?.vhea;
        Some(FontExtents {
            ascender: i32::from(vhea.ascender),
            descender: i32::from(vhea.descender),
            line_gap: i32::from(vhea.line_gap),
        })
    }

    fn line_metric(&self, metric: LineMetric) -> Option<i32> {
        match metric {
            LineMetric::UnderlinePosition => {
                self.post.as_ref().map(|post| i32::from(post.underline_position))
            }
            LineMetric::UnderlineThickness => {
                self.post.as_ref().map(|post| i32::from(post.underline_thickness))
            }
            LineMetric::StrikeoutPosition => {
                self.os2.as_ref().map(|os2| i32::from(os2.y_strikeout_position))
            }
            LineMetric::StrikeoutSize => {
                self.os2.as_ref().map(|os2| i32::from(os2.y_strikeout_size))
            }
        }
    }

    fn gdef(&self) -> Option<&GDEFTable> {
        self.gdef.as_ref()
    }

    fn gsub(&self) -> Option<&LayoutTable<GSUB>> {
        self.gsub.as_ref()
    }

    fn gpos(&self) -> Option<&LayoutTable<GPOS>> {
        self.gpos.as_ref()
    }

    fn kern(&self) -> Option<&KernTable<'_>> {
        self.kern.as_ref()
    }

    fn morx(&self) -> Option<&MorxTable<'_>> {
        self.morx.as_ref()
    }

    fn kerx(&self) -> Option<&KerxTable<'_>> {
        self.kerx.as_ref()
    }

    fn graphite(&self) -> Option<&GraphiteFace> {
        self.graphite.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tables::os2::tests::os2_table;
    use crate::tables::os2::USE_TYPO_METRICS;

    /// Assemble an sfnt font from `(tag, data)` pairs.
    pub(crate) fn build_font(tables: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let mut tables = tables.to_vec();
        tables.sort_by_key(|(tag, _)| *tag);
        let mut data = Vec::new();
        data.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        data.extend_from_slice(&(tables.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0; 6]);
        let mut offset = 12 + 16 * tables.len();
        for (tag, table) in &tables {
            data.extend_from_slice(&tag.to_be_bytes());
            data.extend_from_slice(&0u32.to_be_bytes());
            data.extend_from_slice(&(offset as u32).to_be_bytes());
            data.extend_from_slice(&(table.len() as u32).to_be_bytes());
            offset += (table.len() + 3) & !3;
        }
        for (_, table) in &tables {
            data.extend_from_slice(table);
            data.resize((data.len() + 3) & !3, 0);
        }
        data
    }

    fn push(data: &mut Vec<u8>, values: &[i16]) {
        for value in values {
            data.extend_from_slice(&value.to_be_bytes());
        }
    }

    /// The required tables of a font with `advances.len()` glyphs, a format 6 `cmap` for
    /// `first_char..` and 1000 units per em.
    pub(crate) fn simple_tables(first_char: u16, advances: &[u16]) -> Vec<(u32, Vec<u8>)> {
        let num_glyphs = advances.len() as i16;

        let mut head = Vec::new();
        push(&mut head, &[1, 0, 1, 0, 0, 0]);
        head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        push(&mut head, &[0, 1000]);
        head.extend_from_slice(&[0; 16]);
        push(&mut head, &[-100, -200, 900, 800, 0, 8, 2, 0, 0]);

        let mut maxp = Vec::new();
        push(&mut maxp, &[0, 0x5000, num_glyphs]);

        let mut hhea = Vec::new();
        push(&mut hhea, &[1, 0, 800, -200, 90, 1000, 0, 0, 0, 1, 0, 0]);
        push(&mut hhea, &[0, 0, 0, 0, 0, num_glyphs]);

        let mut hmtx = Vec::new();
        for &advance in advances {
            push(&mut hmtx, &[advance as i16, 0]);
        }

        let mut cmap = Vec::new();
        push(&mut cmap, &[0, 1, 3, 1, 0, 12]);
        push(&mut cmap, &[6, 10 + 2 * num_glyphs, 0, first_char as i16, num_glyphs]);
        for glyph in 0..num_glyphs {
            push(&mut cmap, &[glyph]);
        }

        vec![
            (tag::HEAD, head),
            (tag::MAXP, maxp),
            (tag::HHEA, hhea),
            (tag::HMTX, hmtx),
            (tag::CMAP, cmap),
        ]
    }

    #[test]
    fn simple_face_metrics() {
        let data = build_font(&simple_tables(0x41, &[500, 600, 700]));
        let face = OpenTypeFace::new(&data).unwrap();
        assert_eq!(face.units_per_em(), 1000);
        assert_eq!(face.num_glyphs(), 3);
        assert_eq!(face.nominal_glyph(0x42), Some(1));
        // glyph 0 is notdef
        assert_eq!(face.nominal_glyph(0x41), None);
        assert_eq!(face.nominal_glyph(0x61), None);
        assert_eq!(face.glyph_h_advance(2), 700);
        assert_eq!(face.glyph_v_advance(2), -1000);
        assert_eq!(
            face.font_extents_h(),
            FontExtents {
                ascender: 800,
                descender: -200,
                line_gap: 90
            }
        );
        assert_eq!(face.font_extents_v(), None);
        assert_eq!(face.line_metric(LineMetric::UnderlinePosition), None);
        assert!(face.gsub().is_none());
        assert!(face.coords().is_empty());
    }

    #[test]
    fn typo_metrics_and_strikeout() {
        let mut tables = simple_tables(0x41, &[500]);
        tables.push((tag::OS_2, os2_table(USE_TYPO_METRICS)));
        let data = build_font(&tables);
        let face = OpenTypeFace::new(&data).unwrap();
        assert_eq!(face.font_extents_h().ascender, 850);
        assert_eq!(face.font_extents_h().descender, -150);
        assert_eq!(face.line_metric(LineMetric::StrikeoutPosition), Some(300));
        assert_eq!(face.line_metric(LineMetric::StrikeoutSize), Some(50));
    }

    #[test]
    fn missing_required_table() {
        let mut tables = simple_tables(0x41, &[500]);
        tables.retain(|(tag, _)| *tag != tag::HMTX);
        let data = build_font(&tables);
        assert_eq!(
            OpenTypeFace::new(&data).err(),
            Some(ParseError::MissingTable(tag::HMTX))
        );
    }
}
