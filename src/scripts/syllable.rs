//! Combinators for matching syllables over a run of shaper categories, and the dotted
//! circle insertion shared by syllabic shapers.
//!
//! A matcher takes the categories starting at some position and returns the length of the
//! longest match there, or `None` when nothing matches.

use crate::buffer::{Buffer, BufferFlags, GlyphInfo, GlyphProps};
use crate::face::FontFace;
use crate::unicode::GeneralCategory;

const DOTTED_CIRCLE: u32 = 0x25CC;

pub fn match_unit() -> impl Fn(&[u8]) -> Option<usize> {
    |_cs: &[u8]| Some(0)
}

pub fn match_one(f: impl Fn(u8) -> bool) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| match cs.first() {
        Some(&c) if f(c) => Some(1),
        _ => None,
    }
}

/// Match exactly one of `categories`.
pub fn match_any(categories: &'static [u8]) -> impl Fn(&[u8]) -> Option<usize> {
    match_one(move |c| categories.contains(&c))
}

pub fn match_nonempty(f: impl Fn(&[u8]) -> Option<usize>) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| f(cs).filter(|&n| n > 0)
}

pub fn match_optional(f: impl Fn(&[u8]) -> Option<usize>) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| f(cs).or(Some(0))
}

/// `f? g`, taking the longer of the two readings.
pub fn match_optional_seq(
    f: impl Fn(&[u8]) -> Option<usize>,
    g: impl Fn(&[u8]) -> Option<usize>,
) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| match_either(&g, match_seq(&f, &g))(cs)
}

/// Greedily repeat `f`, at least `min` times. Stops on an empty match.
pub fn match_repeat(
    min: usize,
    f: impl Fn(&[u8]) -> Option<usize>,
) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| {
        let mut total = 0;
        let mut count = 0;
        while let Some(n) = f(&cs[total..]) {
            if n == 0 {
                break;
            }
            total += n;
            count += 1;
        }
        (count >= min).then_some(total)
    }
}

/// Zero or more of `categories`.
pub fn match_star(categories: &'static [u8]) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| Some(cs.iter().take_while(|c| categories.contains(c)).count())
}

pub fn match_seq(
    f1: impl Fn(&[u8]) -> Option<usize>,
    f2: impl Fn(&[u8]) -> Option<usize>,
) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| {
        let n1 = f1(cs)?;
        let n2 = f2(&cs[n1..])?;
        Some(n1 + n2)
    }
}

pub fn match_either(
    f1: impl Fn(&[u8]) -> Option<usize>,
    f2: impl Fn(&[u8]) -> Option<usize>,
) -> impl Fn(&[u8]) -> Option<usize> {
    move |cs: &[u8]| {
        let n1 = f1(cs);
        let n2 = f2(cs);
        std::cmp::max(n1, n2)
    }
}

/// Insert a dotted circle into each broken syllable, after any leading repha.
///
/// Syllables are read from the low nibble of each glyph's syllable byte.
pub fn insert_dotted_circles(
    face: &dyn FontFace,
    buffer: &mut Buffer,
    broken_syllable_type: u8,
    dotted_circle_category: u8,
    repha_category: Option<u8>,
) {
    if buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE) {
        return;
    }
    if !buffer
        .info
        .iter()
        .any(|info| info.syllable & 0x0F == broken_syllable_type)
    {
        return;
    }
    let glyph = match face.nominal_glyph(DOTTED_CIRCLE) {
        Some(glyph) => glyph,
        None => return,
    };

    let mut dotted_circle = GlyphInfo::new(u32::from(glyph), 0);
    dotted_circle.set_general_category(GeneralCategory::OtherSymbol);
    dotted_circle.glyph_props = GlyphProps::BASE_GLYPH;
    dotted_circle.complex_category = dotted_circle_category;

    buffer.clear_output();
    let mut last_syllable = 0;
    while buffer.idx < buffer.len() && buffer.successful {
        let syllable = buffer.cur(0).syllable;
        if last_syllable == syllable || syllable & 0x0F != broken_syllable_type {
            buffer.next_glyph();
            continue;
        }
        last_syllable = syllable;

        let cur = buffer.cur(0);
        let info = GlyphInfo {
            cluster: cur.cluster,
            mask: cur.mask,
            syllable: cur.syllable,
            ..dotted_circle
        };

        if let Some(repha) = repha_category {
            while buffer.idx < buffer.len()
                && buffer.cur(0).syllable == last_syllable
                && buffer.cur(0).complex_category == repha
            {
                buffer.next_glyph();
            }
        }

        buffer.output_info(info);
    }
    buffer.swap_buffers();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestFace;

    const A: u8 = 1;
    const B: u8 = 2;
    const C: u8 = 3;

    #[test]
    fn optional_seq_prefers_longer_reading() {
        let f = match_optional_seq(match_any(&[A]), match_any(&[A, B]));
        assert_eq!(f(&[A, B]), Some(2));
        assert_eq!(f(&[A, C]), Some(1));
        assert_eq!(f(&[C]), None);
    }

    #[test]
    fn repeat_respects_minimum() {
        let f = match_repeat(1, match_seq(match_any(&[A]), match_any(&[B])));
        assert_eq!(f(&[A, B, A, B, A]), Some(4));
        assert_eq!(f(&[B, A]), None);
        assert_eq!(match_repeat(0, match_any(&[C]))(&[A]), Some(0));
    }

    #[test]
    fn repeat_stops_on_empty_match() {
        let f = match_repeat(0, match_star(&[A]));
        assert_eq!(f(&[A, A, B]), Some(2));
        assert_eq!(f(&[B]), Some(0));
    }

    #[test]
    fn nonempty_rejects_empty_match() {
        assert_eq!(match_nonempty(match_star(&[A]))(&[B]), None);
        assert_eq!(match_nonempty(match_unit())(&[B]), None);
        assert_eq!(match_optional(match_any(&[A]))(&[B]), Some(0));
    }

    #[test]
    fn dotted_circle_follows_repha() {
        const BROKEN: u8 = 8;
        const REPHA: u8 = 18;
        let mut face = TestFace::new();
        face.map('\u{25CC}', 42);

        let mut buffer = Buffer::new();
        for (cluster, (category, syllable)) in
            [(REPHA, 0x18), (5, 0x18), (5, 0x23)].iter().enumerate()
        {
            buffer.add(7, cluster as u32);
            let info = buffer.info.last_mut().unwrap();
            info.complex_category = *category;
            info.syllable = *syllable;
        }
        insert_dotted_circles(&face, &mut buffer, BROKEN, 11, Some(REPHA));

        let glyphs: Vec<_> = buffer.info.iter().map(|info| info.codepoint).collect();
        assert_eq!(glyphs, vec![7, 42, 7, 7]);
        assert_eq!(buffer.info[1].cluster, 0);
        assert_eq!(buffer.info[1].complex_category, 11);
    }

    #[test]
    fn dotted_circle_needs_glyph() {
        let face = TestFace::new();
        let mut buffer = Buffer::new();
        buffer.add(7, 0);
        buffer.info[0].syllable = 0x18;
        insert_dotted_circles(&face, &mut buffer, 8, 11, None);
        assert_eq!(buffer.len(), 1);
    }
}
