//! Unicode normalization tuned to the glyphs a font has.
//!
//! Text is decomposed as far as needed to reach characters the font supports, runs of
//! marks are put in canonical order, and then characters are recomposed where the font
//! has a glyph for the composition. Each character's glyph is recorded in `glyph_index`
//! for later mapping.

use crate::buffer::{Buffer, GlyphInfo, ScratchFlags};
use crate::face::FontFace;
use crate::plan::ShapePlan;
use crate::scripts::{ComplexShaper, NormalizationMode};
use crate::unicode;

/// Longer runs of marks are left unsorted.
const MAX_COMBINING_MARKS: usize = 32;

struct NormalizeContext<'a> {
    shaper: ComplexShaper,
    face: &'a dyn FontFace,
}

impl NormalizeContext<'_> {
    fn nominal_glyph(&self, ch: u32) -> Option<u32> {
        self.face.nominal_glyph(ch).map(u32::from)
    }

    /// Output the decomposition of `ab`, returning the number of characters written.
    fn decompose(&self, buffer: &mut Buffer, shortest: bool, ab: u32) -> usize {
        let (a, b) = match self.shaper.decompose(ab) {
            Some(pair) => pair,
            None => return 0,
        };
        let b = match b {
            Some(b) => match self.nominal_glyph(b) {
                Some(b_glyph) => Some((b, b_glyph)),
                None => return 0,
            },
            None => None,
        };

        let a_glyph = self.nominal_glyph(a);
        if shortest {
            if let Some(a_glyph) = a_glyph {
                return output_pair(buffer, (a, a_glyph), b);
            }
        }

        let written = self.decompose(buffer, shortest, a);
        if written != 0 {
            if let Some((b, b_glyph)) = b {
                buffer.output_char(b, b_glyph);
                return written + 1;
            }
            return written;
        }

        match a_glyph {
            Some(a_glyph) => output_pair(buffer, (a, a_glyph), b),
            None => 0,
        }
    }

    fn decompose_current_character(&self, buffer: &mut Buffer, shortest: bool) {
        let ch = buffer.cur(0).codepoint;

        if shortest {
            if let Some(glyph) = self.nominal_glyph(ch) {
                buffer.next_char(glyph);
                return;
            }
        }

        if self.decompose(buffer, shortest, ch) != 0 {
            buffer.skip_glyph();
            return;
        }

        if !shortest {
            if let Some(glyph) = self.nominal_glyph(ch) {
                buffer.next_char(glyph);
                return;
            }
        }

        if buffer.cur(0).is_unicode_space() {
            let space_type = unicode::space_fallback_type(ch);
            if space_type != unicode::SpaceType::NotSpace {
                if let Some(space_glyph) = self.nominal_glyph(0x0020) {
                    buffer.cur_mut(0).set_space_fallback(space_type);
                    buffer.next_char(space_glyph);
                    buffer.scratch_flags |= ScratchFlags::HAS_SPACE_FALLBACK;
                    return;
                }
            }
        }

        // Non-breaking hyphen falls back to the plain hyphen.
        if ch == 0x2011 {
            if let Some(glyph) = self.nominal_glyph(0x2010) {
                buffer.next_char(glyph);
                return;
            }
        }

        let replacement = u32::from(buffer.replacement_glyph);
        buffer.next_char(replacement);
    }

    fn set_glyph(&self, info: &mut GlyphInfo) {
        info.glyph_index = self.nominal_glyph(info.codepoint).unwrap_or(0);
    }

    fn handle_variation_selector_cluster(&self, buffer: &mut Buffer, end: usize) {
        while buffer.idx + 1 < end && buffer.successful {
            let base = buffer.cur(0).codepoint;
            let selector = buffer.cur(1).codepoint;
            if !unicode::is_variation_selector(selector) {
                self.set_glyph(buffer.cur_mut(0));
                buffer.next_glyph();
                continue;
            }

            match self.face.variation_glyph(base, selector) {
                Some(glyph) => {
                    buffer.cur_mut(0).glyph_index = u32::from(glyph);
                    // The selector is absorbed into the base character.
                    buffer.replace_glyphs(2, &[base]);
                }
                None => {
                    // Pass the base on, and the selector with it so it can be hidden later.
                    self.set_glyph(buffer.cur_mut(0));
                    buffer.next_glyph();
                }
            }

            while buffer.idx < end
                && buffer.successful
                && unicode::is_variation_selector(buffer.cur(0).codepoint)
            {
                self.set_glyph(buffer.cur_mut(0));
                buffer.next_glyph();
            }
        }

        if buffer.idx < end {
            self.set_glyph(buffer.cur_mut(0));
            buffer.next_glyph();
        }
    }

    fn decompose_multi_char_cluster(&self, buffer: &mut Buffer, end: usize, shortest: bool) {
        let has_selector = buffer.info[buffer.idx..end]
            .iter()
            .any(|info| unicode::is_variation_selector(info.codepoint));
        if has_selector {
            self.handle_variation_selector_cluster(buffer, end);
            return;
        }

        while buffer.idx < end && buffer.successful {
            self.decompose_current_character(buffer, shortest);
        }
    }
}

fn output_pair(buffer: &mut Buffer, a: (u32, u32), b: Option<(u32, u32)>) -> usize {
    buffer.output_char(a.0, a.1);
    match b {
        Some((b, b_glyph)) => {
            buffer.output_char(b, b_glyph);
            2
        }
        None => 1,
    }
}

/// Normalize the characters of `buffer` for `face` in the mode of the plan's shaper.
pub(crate) fn normalize(plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    if buffer.is_empty() {
        return;
    }

    let mode = match plan.shaper.normalization_mode() {
        // Decomposing for fonts with mark positioning breaks fonts that expect
        // precomposed diacritics, so both cases compose.
        NormalizationMode::Auto => NormalizationMode::ComposedDiacritics,
        mode => mode,
    };
    let ctx = NormalizeContext {
        shaper: plan.shaper,
        face,
    };

    let always_short_circuit = mode == NormalizationMode::None;
    let might_short_circuit = always_short_circuit
        || !matches!(
            mode,
            NormalizationMode::Decomposed | NormalizationMode::ComposedDiacriticsNoShortCircuit
        );

    // First round: decompose.
    let mut all_simple = true;
    buffer.clear_output();
    let count = buffer.len();
    loop {
        let mut end = buffer.idx + 1;
        while end < count && !buffer.info[end].is_unicode_mark() {
            end += 1;
        }
        // Leave one base for the marks to cluster with.
        if end < count {
            end -= 1;
        }

        // `idx..end` are simple clusters.
        if might_short_circuit {
            let mut done = 0;
            while buffer.idx + done < end {
                let info = &mut buffer.info[buffer.idx + done];
                match ctx.nominal_glyph(info.codepoint) {
                    Some(glyph) => info.glyph_index = glyph,
                    None => break,
                }
                done += 1;
            }
            buffer.next_glyphs(done);
        }
        while buffer.idx < end && buffer.successful {
            ctx.decompose_current_character(buffer, might_short_circuit);
        }

        if buffer.idx >= count || !buffer.successful {
            break;
        }

        all_simple = false;

        let mut end = buffer.idx + 1;
        while end < count && buffer.info[end].is_unicode_mark() {
            end += 1;
        }
        // `idx..end` is one cluster of a base and its marks.
        if buffer.idx + 1 == end {
            ctx.decompose_current_character(buffer, might_short_circuit);
        } else {
            ctx.decompose_multi_char_cluster(buffer, end, always_short_circuit);
        }

        if buffer.idx >= count || !buffer.successful {
            break;
        }
    }
    buffer.swap_buffers();

    // Second round: reorder marks.
    if !all_simple && buffer.scratch_flags.contains(ScratchFlags::HAS_NON_ASCII) {
        reorder_marks(plan.shaper, buffer);
    }
    if buffer.scratch_flags.contains(ScratchFlags::HAS_CGJ) {
        unhide_unused_cgj(buffer);
    }

    // Third round: recompose.
    if !all_simple
        && matches!(
            mode,
            NormalizationMode::ComposedDiacritics
                | NormalizationMode::ComposedDiacriticsNoShortCircuit
        )
    {
        recompose(&ctx, buffer);
    }
}

fn reorder_marks(shaper: ComplexShaper, buffer: &mut Buffer) {
    let count = buffer.len();
    let mut i = 0;
    while i < count {
        if buffer.info[i].modified_combining_class() == 0 {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < count && buffer.info[end].modified_combining_class() != 0 {
            end += 1;
        }
        if end - i <= MAX_COMBINING_MARKS {
            buffer.sort(i, end, |a, b| {
                a.modified_combining_class() > b.modified_combining_class()
            });
            shaper.reorder_marks(buffer, i, end);
        }
        i = end;
    }
}

/// A combining grapheme joiner that separates marks already in order has no effect, so it
/// stops being hidden and can be skipped by lookups.
fn unhide_unused_cgj(buffer: &mut Buffer) {
    for i in 1..buffer.len().saturating_sub(1) {
        if buffer.info[i].codepoint != 0x034F {
            continue;
        }
        let next = buffer.info[i + 1].modified_combining_class();
        if next == 0 || buffer.info[i - 1].modified_combining_class() <= next {
            buffer.info[i].unhide();
        }
    }
}

fn recompose(ctx: &NormalizeContext<'_>, buffer: &mut Buffer) {
    buffer.clear_output();
    let count = buffer.len();
    let mut starter = 0;
    buffer.next_glyph();
    while buffer.idx < count && buffer.successful {
        // Only marks compose with their starter, which keeps Hangul syllables and jamo apart.
        if buffer.cur(0).is_unicode_mark() {
            let out_len = buffer.out_len();
            let cur_mcc = buffer.cur(0).modified_combining_class();
            let unblocked = starter + 1 == out_len
                || buffer
                    .prev()
                    .map_or(false, |prev| prev.modified_combining_class() < cur_mcc);
            if unblocked {
                let composed = ctx
                    .shaper
                    .compose(buffer.out_info[starter].codepoint, buffer.cur(0).codepoint)
                    .and_then(|composed| Some((composed, ctx.nominal_glyph(composed)?)));
                if let Some((composed, glyph)) = composed {
                    buffer.next_glyph();
                    if !buffer.successful {
                        break;
                    }
                    buffer.merge_out_clusters(starter, buffer.out_len());
                    buffer.out_info.pop();
                    let mut scratch_flags = buffer.scratch_flags;
                    let info = &mut buffer.out_info[starter];
                    info.codepoint = composed;
                    info.glyph_index = glyph;
                    info.init_unicode_props(&mut scratch_flags);
                    buffer.scratch_flags = scratch_flags;
                    continue;
                }
            }
        }

        buffer.next_glyph();
        if !buffer.successful {
            break;
        }
        if buffer
            .prev()
            .map_or(false, |prev| prev.modified_combining_class() == 0)
        {
            starter = buffer.out_len() - 1;
        }
    }
    buffer.swap_buffers();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Direction, SegmentProperties};
    use crate::tests::TestFace;
    use crate::unicode::script;

    fn plan_for(face: &TestFace, script: u32) -> ShapePlan {
        let props = SegmentProperties {
            direction: Direction::from_script(script),
            script,
            language: None,
        };
        ShapePlan::new(face, &props, &[])
    }

    fn latin_buffer(text: &str) -> Buffer {
        let mut buffer = Buffer::new();
        buffer.push_str(text);
        buffer.set_script(script::LATIN);
        buffer.set_direction(Direction::LeftToRight);
        let mut scratch_flags = ScratchFlags::empty();
        for info in &mut buffer.info {
            info.init_unicode_props(&mut scratch_flags);
        }
        buffer.scratch_flags = scratch_flags;
        buffer
    }

    fn codepoints(buffer: &Buffer) -> Vec<u32> {
        buffer.info.iter().map(|info| info.codepoint).collect()
    }

    #[test]
    fn decomposes_to_supported_characters() {
        // The font has 'e' and the combining acute but not the precomposed letter.
        let face = TestFace::with_chars("e\u{301}");
        let plan = plan_for(&face, script::LATIN);
        let mut buffer = latin_buffer("\u{e9}");
        normalize(&plan, &face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x65, 0x301]);
        assert_eq!(buffer.info[0].cluster, buffer.info[1].cluster);
        assert_ne!(buffer.info[0].glyph_index, 0);
    }

    #[test]
    fn recomposes_when_the_font_has_the_composite() {
        let face = TestFace::with_chars("e\u{301}\u{e9}");
        let plan = plan_for(&face, script::LATIN);
        let mut buffer = latin_buffer("e\u{301}");
        normalize(&plan, &face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0xE9]);
        assert_eq!(
            buffer.info[0].glyph_index,
            u32::from(face.cmap[&0xE9])
        );
    }

    #[test]
    fn marks_are_sorted_by_combining_class() {
        let face = TestFace::with_chars("a\u{301}\u{323}");
        let plan = plan_for(&face, script::LATIN);
        // Acute (230) before dot below (220).
        let mut buffer = latin_buffer("a\u{301}\u{323}");
        normalize(&plan, &face, &mut buffer);
        let classes = buffer
            .info
            .iter()
            .filter(|info| info.is_unicode_mark())
            .map(|info| info.modified_combining_class())
            .collect::<Vec<_>>();
        assert!(classes.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(codepoints(&buffer), vec![0x61, 0x323, 0x301]);
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let face = TestFace::with_chars("ae\u{301}\u{323}\u{e9}");
        let plan = plan_for(&face, script::LATIN);
        let mut buffer = latin_buffer("a\u{301}\u{323}e\u{301}\u{e9}");
        normalize(&plan, &face, &mut buffer);
        let once = buffer.info.clone();
        normalize(&plan, &face, &mut buffer);
        assert_eq!(buffer.info, once);
    }

    #[test]
    fn unsupported_variation_selector_is_kept() {
        let face = TestFace::with_chars("\u{4e00}");
        let plan = plan_for(&face, script::HAN);
        let mut buffer = latin_buffer("\u{4e00}\u{e0101}");
        normalize(&plan, &face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x4E00, 0xE0101]);
        assert_ne!(buffer.info[0].glyph_index, 0);
        assert_eq!(buffer.info[1].glyph_index, 0);
    }

    #[test]
    fn supported_variation_selector_is_absorbed() {
        let mut face = TestFace::with_chars("\u{4e00}");
        face.variations.insert((0x4E00, 0xE0101), 42);
        let plan = plan_for(&face, script::HAN);
        let mut buffer = latin_buffer("\u{4e00}\u{e0101}");
        normalize(&plan, &face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x4E00]);
        assert_eq!(buffer.info[0].glyph_index, 42);
    }

    #[test]
    fn missing_spaces_fall_back_to_the_space_glyph() {
        let face = TestFace::with_chars(" a");
        let plan = plan_for(&face, script::LATIN);
        let mut buffer = latin_buffer("a\u{2003}a");
        normalize(&plan, &face, &mut buffer);
        assert_eq!(buffer.info[1].glyph_index, u32::from(face.cmap[&0x20]));
        assert_eq!(buffer.info[1].space_fallback(), unicode::SpaceType::Em);
        assert!(buffer
            .scratch_flags
            .contains(ScratchFlags::HAS_SPACE_FALLBACK));
    }

    #[test]
    fn cgj_between_ordered_marks_is_unhidden() {
        let face = TestFace::with_chars("a\u{323}\u{301}\u{34f}");
        let plan = plan_for(&face, script::LATIN);
        let mut buffer = latin_buffer("a\u{323}\u{34f}\u{301}");
        normalize(&plan, &face, &mut buffer);
        assert_eq!(buffer.info[2].codepoint, 0x034F);
        assert!(!buffer.info[2].is_hidden());

        let mut buffer = latin_buffer("a\u{301}\u{34f}\u{323}");
        normalize(&plan, &face, &mut buffer);
        // The joiner keeps the marks apart, so it stays hidden.
        assert_eq!(codepoints(&buffer), vec![0x61, 0x301, 0x34F, 0x323]);
        assert!(buffer.info[2].is_hidden());
    }
}
