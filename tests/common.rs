#![allow(dead_code)]

use std::collections::HashMap;

use regex::Regex;

use fontshape::face::{FontExtents, FontFace, GlyphExtents};
use fontshape::{shape, Buffer, Feature};

/// A face that maps characters through a table, with every glyph the same width unless
/// given its own advance.
pub struct MapFace {
    pub num_glyphs: u16,
    pub cmap: HashMap<char, u16>,
    pub advances: HashMap<u16, i32>,
    pub extents: HashMap<u16, GlyphExtents>,
    pub default_advance: i32,
}

impl MapFace {
    pub fn new(mapping: &[(char, u16)]) -> MapFace {
        MapFace {
            num_glyphs: 256,
            cmap: mapping.iter().copied().collect(),
            advances: HashMap::new(),
            extents: HashMap::new(),
            default_advance: 500,
        }
    }

    /// Map the characters of `chars` to glyphs 1, 2, 3 and so on.
    pub fn with_chars(chars: &str) -> MapFace {
        let mapping = chars.chars().zip(1..).collect::<Vec<_>>();
        MapFace::new(&mapping)
    }
}

impl FontFace for MapFace {
    fn units_per_em(&self) -> u16 {
        1000
    }

    fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    fn nominal_glyph(&self, ch: u32) -> Option<u16> {
        char::from_u32(ch).and_then(|ch| self.cmap.get(&ch).copied())
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
}

/// Parse a comma or space separated feature list such as `"liga, -kern aalt=2"`.
pub fn parse_features(features: &str) -> Vec<Feature> {
    let separator = Regex::new(r"[,\s]+").unwrap();
    separator
        .split(features.trim())
        .filter(|feature| !feature.is_empty())
        .map(|feature| feature.parse().expect("invalid feature"))
        .collect()
}

/// Shape `text` after letting `setup` adjust the buffer.
pub fn shape_text(
    face: &dyn FontFace,
    text: &str,
    features: &str,
    setup: impl FnOnce(&mut Buffer),
) -> Buffer {
    let mut buffer = Buffer::new();
    setup(&mut buffer);
    buffer.push_str(text);
    shape(face, &mut buffer, &parse_features(features));
    buffer
}

/// A glyph parsed from the serialized form of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Glyph {
    pub id: u32,
    pub cluster: u32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub x_advance: i32,
}

/// Parse a glyph string such as `[1=0+500|2=0@-500,0+0]`.
pub fn parse_glyphs(glyphs: &str) -> Vec<Glyph> {
    let glyph = Regex::new(r"(\d+)=(\d+)(?:@(-?\d+),(-?\d+))?(?:\+(-?\d+))?").unwrap();
    glyph
        .captures_iter(glyphs)
        .map(|caps| {
            let number = |i: usize| caps.get(i).map_or(0, |m| m.as_str().parse::<i64>().unwrap());
            Glyph {
                id: number(1) as u32,
                cluster: number(2) as u32,
                x_offset: number(3) as i32,
                y_offset: number(4) as i32,
                x_advance: number(5) as i32,
            }
        })
        .collect()
}

pub fn glyphs(buffer: &Buffer) -> Vec<Glyph> {
    parse_glyphs(&buffer.serialize(true))
}

pub fn glyph_ids(buffer: &Buffer) -> Vec<u32> {
    glyphs(buffer).iter().map(|glyph| glyph.id).collect()
}
