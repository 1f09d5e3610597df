//! Shared test code.

use rustc_hash::FxHashMap;

use crate::face::{FontExtents, FontFace, GlyphExtents};
use crate::layout::{GDEFTable, LayoutTable, GPOS, GSUB};

/// A face over in-memory tables: a character map, advances, extents, and optional
/// layout tables.
pub(crate) struct TestFace {
    pub units_per_em: u16,
    pub num_glyphs: u16,
    pub cmap: FxHashMap<u32, u16>,
    pub variations: FxHashMap<(u32, u32), u16>,
    pub advances: FxHashMap<u16, i32>,
    pub default_advance: i32,
    pub extents: FxHashMap<u16, GlyphExtents>,
    pub gdef: Option<GDEFTable>,
    pub gsub: Option<LayoutTable<GSUB>>,
    pub gpos: Option<LayoutTable<GPOS>>,
}

impl TestFace {
    pub fn new() -> TestFace {
        TestFace {
            units_per_em: 1000,
            num_glyphs: 100,
            cmap: FxHashMap::default(),
            variations: FxHashMap::default(),
            advances: FxHashMap::default(),
            default_advance: 500,
            extents: FxHashMap::default(),
            gdef: None,
            gsub: None,
            gpos: None,
        }
    }

    /// A face mapping each character of `chars` to glyphs 1, 2, 3 and so on.
    pub fn with_chars(chars: &str) -> TestFace {
        let mut face = TestFace::new();
        for (glyph, ch) in (1..).zip(chars.chars()) {
            face.cmap.insert(u32::from(ch), glyph);
        }
        face
    }

    pub fn map(&mut self, ch: char, glyph: u16) -> &mut TestFace {
        self.cmap.insert(u32::from(ch), glyph);
        self
    }
}

impl FontFace for TestFace {
    fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    fn nominal_glyph(&self, ch: u32) -> Option<u16> {
        self.cmap.get(&ch).copied()
    }

    fn variation_glyph(&self, ch: u32, selector: u32) -> Option<u16> {
        self.variations.get(&(ch, selector)).copied()
    }

    fn glyph_h_advance(&self, glyph: u16) -> i32 {
        self.advances
            .get(&glyph)
            .copied()
            .unwrap_or(self.default_advance)
    }

    fn glyph_extents(&self, glyph: u16) -> Option<GlyphExtents> {
        self.extents.get(&glyph).copied()
    }

    fn font_extents_h(&self) -> FontExtents {
        FontExtents {
            ascender: 800,
            descender: -200,
            line_gap: 0,
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
}
