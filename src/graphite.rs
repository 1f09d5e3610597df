//! Graphite smart font shaping.
//!
//! A [GraphiteFace] holds the parsed Graphite tables of a font along with the glyph
//! metrics the passes refer to. Shaping builds a [Segment](segment::Segment) of slots from
//! the input characters and runs the passes of the selected `Silf` subtable over it.

pub mod code;
pub mod feat;
pub mod glat;
pub mod lz4;
pub mod machine;
pub mod opcodes;
pub mod pass;
pub mod segment;
pub mod silf;
pub mod slot;

use std::ops::{Add, Sub};

use log::debug;

use self::feat::{zero_to_space, FeatTable, FeatureDefn, Features, SillTable};
use self::glat::{GlatTable, GlocTable};
use self::opcodes::metric;
use self::segment::Segment;
use self::silf::SilfTable;
use crate::binary::read::ReadScope;
use crate::error::ParseError;
use crate::tables::FontTableProvider;
use crate::tag;

/// A point or offset in font units.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Position { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, other: Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, other: Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y)
    }
}

/// A rectangle given by its bottom left and top right corners.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub bl: Position,
    pub tr: Position,
}

impl Rect {
    pub fn new(bl: Position, tr: Position) -> Self {
        Rect { bl, tr }
    }

    /// The smallest rectangle containing both `self` and `other`.
    pub fn widen(&self, other: &Rect) -> Rect {
        Rect::new(
            Position::new(self.bl.x.min(other.bl.x), self.bl.y.min(other.bl.y)),
            Position::new(self.tr.x.max(other.tr.x), self.tr.y.max(other.tr.y)),
        )
    }

    pub fn translate(&self, offset: Position) -> Rect {
        Rect::new(self.bl + offset, self.tr + offset)
    }
}

/// Advance and bounding box of a glyph.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct GlyphFace {
    pub advance: Position,
    pub bbox: Rect,
}

impl GlyphFace {
    pub fn new(advance: Position, bbox: Rect) -> Self {
        GlyphFace { advance, bbox }
    }

    fn metric(&self, metric: u8) -> i32 {
        let value = match metric {
            metric::LSB | metric::BB_LEFT => self.bbox.bl.x,
            metric::RSB => self.advance.x - self.bbox.tr.x,
            metric::BB_TOP => self.bbox.tr.y,
            metric::BB_BOTTOM => self.bbox.bl.y,
            metric::BB_RIGHT => self.bbox.tr.x,
            metric::BB_HEIGHT => self.bbox.tr.y - self.bbox.bl.y,
            metric::BB_WIDTH => self.bbox.tr.x - self.bbox.bl.x,
            metric::ADV_WIDTH => self.advance.x,
            metric::ADV_HEIGHT => self.advance.y,
            _ => 0.0,
        };
        value as i32
    }
}

/// The Graphite tables of a font.
#[derive(Debug, Clone)]
pub struct GraphiteFace {
    pub silf: SilfTable,
    pub feat: FeatTable,
    pub sill: SillTable,
    pub glat: GlatTable,
    glyphs: Vec<GlyphFace>,
    ascent: i32,
    descent: i32,
}

impl GraphiteFace {
    /// Load the Graphite tables from `provider`.
    ///
    /// `glyphs` holds the metrics of each glyph in the font. Returns `None` if the font
    /// has no `Silf` table.
    pub fn load<T: FontTableProvider>(
        provider: &T,
        glyphs: Vec<GlyphFace>,
        ascent: i32,
        descent: i32,
    ) -> Result<Option<GraphiteFace>, ParseError> {
        let Some(silf_data) = provider.table_data(tag::SILF)? else {
            return Ok(None);
        };
        let num_glyphs = glyphs.len();
        let gloc_data = provider.read_table_data(tag::GLOC)?;
        let gloc = ReadScope::new(&gloc_data).read_dep::<GlocTable>(num_glyphs)?;
        let glat_data = provider.read_table_data(tag::GLAT)?;
        let glat = GlatTable::parse(&glat_data, &gloc)?;
        let feat = match provider.table_data(tag::FEAT)? {
            Some(data) => ReadScope::new(&data).read::<FeatTable>()?,
            None => FeatTable::default(),
        };
        let sill = match provider.table_data(tag::SILL)? {
            Some(data) => ReadScope::new(&data).read::<SillTable>()?,
            None => SillTable::default(),
        };
        let silf = ReadScope::new(&silf_data)
            .read_dep::<SilfTable>((gloc.num_attrs, feat.len() as u16))?;
        debug!(
            "loaded Graphite face: {} subtables, {} features",
            silf.subtables.len(),
            feat.len()
        );

        // Pseudo glyphs have attributes but no outlines.
        let mut glyphs = glyphs;
        let num_locations = gloc.locations.len().saturating_sub(1);
        if glyphs.len() < num_locations {
            glyphs.resize(num_locations, GlyphFace::default());
        }

        Ok(Some(GraphiteFace {
            silf,
            feat,
            sill,
            glat,
            glyphs,
            ascent,
            descent,
        }))
    }

    pub fn num_glyphs(&self) -> u16 {
        self.glyphs.len().min(usize::from(u16::MAX)) as u16
    }

    pub fn glyph(&self, glyph_id: u16) -> Option<&GlyphFace> {
        self.glyphs.get(usize::from(glyph_id))
    }

    /// Glyph attribute `attr` of `glyph_id`, 0 when not set.
    pub fn glyph_attr(&self, glyph_id: u16, attr: u16) -> i16 {
        self.glat
            .glyph(usize::from(glyph_id))
            .and_then(|attrs| attrs.get(attr))
            .unwrap_or(0)
    }

    pub fn glyph_metric(&self, glyph_id: u16, metric: u8) -> i32 {
        match metric {
            metric::ASCENT => self.ascent,
            metric::DESCENT => self.descent,
            _ => self.glyph(glyph_id).map_or(0, |glyph| glyph.metric(metric)),
        }
    }

    pub fn find_feature(&self, id: u32) -> Option<&FeatureDefn> {
        self.feat.find(id).map(|(_, defn)| defn)
    }

    /// The feature values for `language`: the defaults, overridden by the `Sill` entry
    /// for the language.
    pub fn features_for_language(&self, language: u32) -> Features {
        self.sill.features_for_language(&self.feat, zero_to_space(language))
    }

    /// Shape `chars` with the `Silf` subtable for `script`.
    ///
    /// `cmap` maps characters to glyphs. The returned segment holds the positioned glyphs.
    pub fn shape<'f>(
        &'f self,
        chars: &[u32],
        script: u32,
        features: Features,
        rtl: bool,
        cmap: impl Fn(u32) -> Option<u16>,
    ) -> Option<Segment<'f>> {
        let silf = self.silf.subtable_for_script(zero_to_space(script))?;
        let mut seg = Segment::new(self, silf, u8::from(rtl), chars.len());
        seg.read_text(chars, features, cmap);
        if seg.slot_count() == 0 {
            return Some(seg);
        }
        silf.run_graphite(&mut seg);
        seg.finalise(true);
        Some(seg)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graphite::glat::{AttrRun, GlyphAttrs};
    use crate::graphite::pass::tests::substitution_pass;
    use crate::graphite::pass::Pass;
    use crate::graphite::silf::{ClassMap, GlyphClass, SilfSubtable};

    pub(crate) const NUM_GLYPHS: usize = 10;

    /// A subtable where glyph attribute 1 holds the bidi class and class 0 is `[5]`.
    pub(crate) fn simple_silf(passes: Vec<Pass>) -> SilfSubtable {
        let num_passes = passes.len() as u8;
        SilfSubtable {
            rule_version: 0x0003_0000,
            max_glyph_id: NUM_GLYPHS as u16 - 1,
            extra_ascent: 0,
            extra_descent: 0,
            num_passes,
            sub_pass: 0,
            pos_pass: num_passes,
            just_pass: num_passes,
            bidi_pass: 0xFF,
            flags: 0,
            max_pre_context: 0,
            max_post_context: 0,
            attr_pseudo: 2,
            attr_break_weight: 3,
            attr_directionality: 1,
            attr_mirroring: 0,
            attr_skip_passes: 0,
            justification_levels: Vec::new(),
            num_lig_comp: 0,
            num_user_defn: 1,
            max_comp_per_lig: 0,
            dir: 0,
            attr_collisions: 0,
            critical_features: Vec::new(),
            script_tags: Vec::new(),
            line_break_glyph: 0,
            pseudo_glyphs: Vec::new(),
            class_map: ClassMap {
                classes: vec![GlyphClass::Linear(vec![5])],
            },
            passes,
        }
    }

    /// A face with glyphs 500 units wide, except glyph 3 which is a zero width
    /// non-spacing mark.
    pub(crate) fn simple_face(silf: SilfSubtable) -> GraphiteFace {
        let bbox = Rect::new(Position::new(0.0, 0.0), Position::new(500.0, 700.0));
        let mut glyphs = vec![GlyphFace::new(Position::new(500.0, 0.0), bbox); NUM_GLYPHS];
        glyphs[3] = GlyphFace::new(
            Position::default(),
            Rect::new(Position::new(-200.0, 700.0), Position::new(0.0, 900.0)),
        );
        let mut glat = GlatTable {
            glyphs: vec![GlyphAttrs::default(); NUM_GLYPHS],
        };
        glat.glyphs[3].runs.push(AttrRun {
            first: 1,
            values: vec![16],
        });
        GraphiteFace {
            silf: SilfTable {
                version: 0x0003_0000,
                subtables: vec![silf],
            },
            feat: FeatTable::default(),
            sill: SillTable::default(),
            glat,
            glyphs,
            ascent: 800,
            descent: -200,
        }
    }

    #[test]
    fn rect_widen_and_translate() {
        let a = Rect::new(Position::new(0.0, 0.0), Position::new(10.0, 10.0));
        let b = Rect::new(Position::new(-5.0, 2.0), Position::new(5.0, 20.0));
        let wide = a.widen(&b.translate(Position::new(1.0, 0.0)));
        assert_eq!(wide.bl, Position::new(-4.0, 0.0));
        assert_eq!(wide.tr, Position::new(10.0, 20.0));
    }

    #[test]
    fn glyph_metrics() {
        let face = simple_face(simple_silf(Vec::new()));
        assert_eq!(face.glyph_metric(1, metric::ADV_WIDTH), 500);
        assert_eq!(face.glyph_metric(3, metric::BB_LEFT), -200);
        assert_eq!(face.glyph_metric(3, metric::BB_HEIGHT), 200);
        assert_eq!(face.glyph_metric(1, metric::ASCENT), 800);
        assert_eq!(face.glyph_metric(42, metric::ADV_WIDTH), 0);
        assert_eq!(face.glyph_attr(3, 1), 16);
        assert_eq!(face.glyph_attr(4, 1), 0);
    }

    #[test]
    fn shape_without_rules() {
        let face = simple_face(simple_silf(Vec::new()));
        let seg = face
            .shape(&[1, 3, 2], 0, Features::default(), false, |ch| Some(ch as u16))
            .unwrap();
        assert_eq!(seg.glyphs(), vec![1, 3, 2]);
        assert_eq!(seg.advance(), Position::new(1000.0, 0.0));
    }

    #[test]
    fn shape_empty_text() {
        let face = simple_face(simple_silf(Vec::new()));
        let seg = face
            .shape(&[], 0, Features::default(), false, |ch| Some(ch as u16))
            .unwrap();
        assert!(seg.glyphs().is_empty());
    }

    #[test]
    fn shape_runs_substitution_pass() {
        let face = simple_face(simple_silf(vec![substitution_pass()]));
        let seg = face
            .shape(&[1, 2, 1], 0, Features::default(), false, |ch| Some(ch as u16))
            .unwrap();
        assert_eq!(seg.glyphs(), vec![5, 2, 5]);
        assert_eq!(seg.advance(), Position::new(1500.0, 0.0));
    }
}
