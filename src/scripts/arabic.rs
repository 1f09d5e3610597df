//! Arabic joining, for Arabic and the other scripts whose letters join like it.
//!
//! Each letter is given the positional form feature (`isol`, `init`, `medi`, `fina` and
//! the Syriac alaph forms) that its neighbours call for, following the joining types of
//! `ArabicShaping.txt`.

use log::trace;
use unicode_joining_type::{get_joining_group, get_joining_type, JoiningGroup, JoiningType};

use crate::buffer::{Buffer, GlyphInfo, Mask, ScratchFlags};
use crate::face::FontFace;
use crate::feature_map::{FeatureFlags, FeatureMap, MapBuilder};
use crate::plan::ShapePlan;
use crate::scripts::arabic_fallback::ArabicFallbackPlan;
use crate::scripts::ShaperData;
use crate::tag;
use crate::unicode::{script, GeneralCategory, Script};

/// The joining action recorded on each glyph, indexing `FEATURES`.
mod action {
    pub const ISOL: u8 = 0;
    pub const FINA: u8 = 1;
    pub const FIN2: u8 = 2;
    pub const FIN3: u8 = 3;
    pub const MEDI: u8 = 4;
    pub const MED2: u8 = 5;
    pub const INIT: u8 = 6;
    pub const NONE: u8 = 7;

    // Pieces of a glyph decomposed for stretching by `stch`.
    pub const STCH_FIXED: u8 = 8;
    pub const STCH_REPEATING: u8 = 9;
}

const FEATURES: [u32; 7] = [
    tag!(b"isol"),
    tag!(b"fina"),
    tag!(b"fin2"),
    tag!(b"fin3"),
    tag!(b"medi"),
    tag!(b"med2"),
    tag!(b"init"),
];

/// The alaph forms have no Arabic counterpart and are never emulated.
fn is_syriac_feature(feature: u32) -> bool {
    feature == tag!(b"fin2") || feature == tag!(b"fin3") || feature == tag!(b"med2")
}

/// Columns of `STATE_TABLE`.
mod joining {
    pub const U: usize = 0;
    pub const L: usize = 1;
    pub const R: usize = 2;
    pub const D: usize = 3;
    pub const ALAPH: usize = 4;
    pub const DALATH_RISH: usize = 5;
    pub const T: usize = 6;
}

/// `(previous glyph action, current glyph action, next state)` by state and joining
/// column.
#[rustfmt::skip]
const STATE_TABLE: [[(u8, u8, usize); 6]; 7] = {
    use action::*;
    [
        //   U              L              R              D              ALAPH          DALATH_RISH
        // 0: previous was U, not willing to join.
        [(NONE, NONE, 0), (NONE, ISOL, 2), (NONE, ISOL, 1), (NONE, ISOL, 2), (NONE, ISOL, 1), (NONE, ISOL, 6)],
        // 1: previous was R or isolated alaph, not willing to join.
        [(NONE, NONE, 0), (NONE, ISOL, 2), (NONE, ISOL, 1), (NONE, ISOL, 2), (NONE, FIN2, 5), (NONE, ISOL, 6)],
        // 2: previous was D or L in isolated form, willing to join.
        [(NONE, NONE, 0), (NONE, ISOL, 2), (INIT, FINA, 1), (INIT, FINA, 3), (INIT, FINA, 4), (INIT, FINA, 6)],
        // 3: previous was D in final form, willing to join.
        [(NONE, NONE, 0), (NONE, ISOL, 2), (MEDI, FINA, 1), (MEDI, FINA, 3), (MEDI, FINA, 4), (MEDI, FINA, 6)],
        // 4: previous was final alaph, not willing to join.
        [(NONE, NONE, 0), (NONE, ISOL, 2), (MED2, ISOL, 1), (MED2, ISOL, 2), (MED2, FIN2, 5), (MED2, ISOL, 6)],
        // 5: previous was fin2 or fin3 alaph, not willing to join.
        [(NONE, NONE, 0), (NONE, ISOL, 2), (ISOL, ISOL, 1), (ISOL, ISOL, 2), (ISOL, FIN2, 5), (ISOL, ISOL, 6)],
        // 6: previous was dalath or rish, not willing to join.
        [(NONE, NONE, 0), (NONE, ISOL, 2), (NONE, ISOL, 1), (NONE, ISOL, 2), (NONE, FIN3, 5), (NONE, ISOL, 6)],
    ]
};

/// Scripts shaped with Arabic joining.
pub(crate) fn has_arabic_joining(script: Script) -> bool {
    matches!(
        script,
        script::ARABIC
            | script::SYRIAC
            | script::MONGOLIAN
            | script::NKO
            | script::PHAGS_PA
            | script::MANDAIC
            | script::MANICHAEAN
            | script::PSALTER_PAHLAVI
            | script::ADLAM
            | script::HANIFI_ROHINGYA
            | script::SOGDIAN
            | script::CHORASMIAN
            | script::OLD_UYGHUR
    )
}

fn joining_column(ch: u32) -> usize {
    let ch = match char::from_u32(ch) {
        Some(ch) => ch,
        None => return joining::U,
    };
    match get_joining_group(ch) {
        JoiningGroup::Alaph => return joining::ALAPH,
        JoiningGroup::DalathRish => return joining::DALATH_RISH,
        _ => {}
    }
    match get_joining_type(ch) {
        JoiningType::DualJoining | JoiningType::JoinCausing => joining::D,
        JoiningType::LeftJoining => joining::L,
        JoiningType::RightJoining => joining::R,
        JoiningType::Transparent => joining::T,
        JoiningType::NonJoining => joining::U,
        _ => joining::U,
    }
}

/// Per plan Arabic data: the mask of each joining form and the fallback lookups.
pub(crate) struct ArabicPlan {
    /// Indexed by action; `NONE` has no mask.
    mask_array: [Mask; 8],
    has_stch: bool,
    fallback: Option<ArabicFallbackPlan>,
}

impl ArabicPlan {
    pub(crate) fn new(map: &FeatureMap, script: Script, face: &dyn FontFace) -> ArabicPlan {
        let mut mask_array = [0; 8];
        // Only Arabic itself has presentation forms to fall back on.
        let mut do_fallback = script == script::ARABIC;
        for (mask, &feature) in mask_array.iter_mut().zip(FEATURES.iter()) {
            *mask = map.one_mask(feature);
            do_fallback =
                do_fallback && (is_syriac_feature(feature) || map.needs_fallback(feature));
        }
        let fallback = if do_fallback {
            ArabicFallbackPlan::new(map, face)
        } else {
            None
        };
        if fallback.is_some() {
            trace!("font lacks Arabic forms, using fallback lookups");
        }
        ArabicPlan {
            mask_array,
            has_stch: map.one_mask(tag!(b"stch")) != 0,
            fallback,
        }
    }

    /// Record the joining action of each glyph and set the mask of its form.
    pub(crate) fn setup_masks(&self, buffer: &mut Buffer, script: Script) {
        arabic_joining(buffer);
        if script == script::MONGOLIAN {
            mongolian_variation_selectors(buffer);
        }
        for info in &mut buffer.info {
            info.mask |= self.mask_array[usize::from(info.complex_aux)];
        }
    }
}

fn arabic_plan(plan: &ShapePlan) -> Option<&ArabicPlan> {
    match &plan.data {
        ShaperData::Arabic(arabic) => Some(arabic),
        _ => None,
    }
}

pub(crate) fn collect_features(builder: &mut MapBuilder<'_>, script: Script) {
    builder.enable_feature(tag!(b"stch"));
    builder.add_gsub_pause(Some(record_stch));

    builder.enable_feature_ext(tag!(b"ccmp"), FeatureFlags::MANUAL_ZWJ, 1);
    builder.enable_feature_ext(tag!(b"locl"), FeatureFlags::MANUAL_ZWJ, 1);
    builder.add_gsub_pause(None);

    for &feature in FEATURES.iter() {
        let flags = if script == script::ARABIC && !is_syriac_feature(feature) {
            FeatureFlags::HAS_FALLBACK
        } else {
            FeatureFlags::empty()
        };
        builder.add_feature_ext(feature, flags, 1);
        builder.add_gsub_pause(None);
    }

    // In Arabic a ZWJ, like a ZWNJ, means "don't ligate", so the ligating features treat
    // joiners manually.
    builder.enable_feature_ext(
        tag!(b"rlig"),
        FeatureFlags::MANUAL_ZWJ | FeatureFlags::HAS_FALLBACK,
        1,
    );
    if script == script::ARABIC {
        builder.add_gsub_pause(Some(fallback_shape));
    }
    // No pause after rclt, so that calt can see its output.
    builder.enable_feature_ext(tag!(b"rclt"), FeatureFlags::MANUAL_ZWJ, 1);
    builder.enable_feature_ext(tag!(b"calt"), FeatureFlags::MANUAL_ZWJ, 1);
    builder.add_gsub_pause(None);

    builder.enable_feature(tag!(b"mset"));
}

fn arabic_joining(buffer: &mut Buffer) {
    let mut prev: Option<usize> = None;
    let mut state = 0;

    for &ch in buffer.context[0].iter() {
        let column = joining_column(ch);
        if column == joining::T {
            continue;
        }
        state = STATE_TABLE[state][column].2;
        break;
    }

    for i in 0..buffer.len() {
        let column = joining_column(buffer.info[i].codepoint);
        if column == joining::T {
            buffer.info[i].complex_aux = action::NONE;
            continue;
        }

        let (prev_action, curr_action, next_state) = STATE_TABLE[state][column];
        if prev_action != action::NONE {
            if let Some(prev) = prev {
                buffer.info[prev].complex_aux = prev_action;
                buffer.unsafe_to_break(prev, i + 1);
            }
        }
        buffer.info[i].complex_aux = curr_action;
        prev = Some(i);
        state = next_state;
    }

    for &ch in buffer.context[1].iter() {
        let column = joining_column(ch);
        if column == joining::T {
            continue;
        }
        let (prev_action, _, _) = STATE_TABLE[state][column];
        if prev_action != action::NONE {
            if let Some(prev) = prev {
                buffer.info[prev].complex_aux = prev_action;
            }
        }
        break;
    }
}

/// Free variation selectors take the joining form of the letter they follow.
fn mongolian_variation_selectors(buffer: &mut Buffer) {
    for i in 1..buffer.len() {
        if matches!(buffer.info[i].codepoint, 0x180B..=0x180D | 0x180F) {
            buffer.info[i].complex_aux = buffer.info[i - 1].complex_aux;
        }
    }
}

/// After `stch`, glyphs a multiple substitution produced are the pieces of a stretched
/// glyph: the odd components repeat, the even ones are fixed.
fn record_stch(plan: &ShapePlan, _face: &dyn FontFace, buffer: &mut Buffer) {
    if !arabic_plan(plan).is_some_and(|arabic| arabic.has_stch) {
        return;
    }
    let mut found = false;
    for info in buffer.info.iter_mut().filter(|info| info.is_multiplied()) {
        info.complex_aux = if info.lig_comp() % 2 != 0 {
            action::STCH_REPEATING
        } else {
            action::STCH_FIXED
        };
        found = true;
    }
    if found {
        buffer.scratch_flags |= ScratchFlags::ARABIC_HAS_STCH;
    }
}

fn fallback_shape(plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    if let Some(fallback) = arabic_plan(plan).and_then(|arabic| arabic.fallback.as_ref()) {
        fallback.shape(face, buffer);
    }
}

fn is_stch(info: &GlyphInfo) -> bool {
    matches!(
        info.complex_aux,
        action::STCH_FIXED | action::STCH_REPEATING
    )
}

fn is_word_category(gc: GeneralCategory) -> bool {
    use GeneralCategory::*;

    matches!(
        gc,
        Unassigned
            | PrivateUse
            | ModifierLetter
            | OtherLetter
            | SpacingMark
            | EnclosingMark
            | NonspacingMark
            | DecimalNumber
            | LetterNumber
            | OtherNumber
            | CurrencySymbol
            | ModifierSymbol
            | MathSymbol
            | OtherSymbol
    )
}

/// Stretch `stch` glyphs over the rest of their word, repeating the repeating pieces as
/// often as fits.
///
/// Runs on glyphs in visual order; the pieces extend over the glyphs before them.
pub(crate) fn postprocess_glyphs(_plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    apply_stch(face, buffer);
}

fn apply_stch(face: &dyn FontFace, buffer: &mut Buffer) {
    if !buffer.scratch_flags.contains(ScratchFlags::ARABIC_HAS_STCH) {
        return;
    }

    // Built back to front.
    let mut info_out = Vec::with_capacity(buffer.len());
    let mut pos_out = Vec::with_capacity(buffer.len());
    let mut i = buffer.len();
    while i > 0 {
        if !is_stch(&buffer.info[i - 1]) {
            info_out.push(buffer.info[i - 1]);
            pos_out.push(buffer.pos[i - 1]);
            i -= 1;
            continue;
        }

        let end = i;
        let mut w_fixed = 0;
        let mut w_repeating = 0;
        let mut n_repeating = 0;
        while i > 0 && is_stch(&buffer.info[i - 1]) {
            i -= 1;
            let width = face.glyph_h_advance(buffer.info[i].glyph_id());
            if buffer.info[i].complex_aux == action::STCH_FIXED {
                w_fixed += width;
            } else {
                w_repeating += width;
                n_repeating += 1;
            }
        }
        let start = i;

        let mut context = start;
        let mut w_total = 0;
        while context > 0 {
            let info = &buffer.info[context - 1];
            if is_stch(info)
                || !(info.is_default_ignorable() || is_word_category(info.general_category()))
            {
                break;
            }
            context -= 1;
            w_total += buffer.pos[context].x_advance;
        }

        // Additional copies of each repeating piece.
        let mut n_copies = 0;
        let w_remaining = w_total - w_fixed;
        if w_remaining > w_repeating && w_repeating > 0 {
            n_copies = w_remaining / w_repeating - 1;
        }
        // An extra copy, squeezed to fit, is better than a gap.
        let mut extra_repeat_overlap = 0;
        let shortfall = w_remaining - w_repeating * (n_copies + 1);
        if shortfall > 0 && n_repeating > 0 {
            n_copies += 1;
            let excess = (n_copies + 1) * w_repeating - w_remaining;
            if excess > 0 {
                extra_repeat_overlap = excess / (n_copies * n_repeating);
            }
        }
        trace!(
            "stretching glyphs {}..{} over {} units with {} extra copies",
            start,
            end,
            w_total,
            n_copies
        );

        buffer.unsafe_to_break(context, end);
        let mut x_offset = 0;
        for k in (start..end).rev() {
            let width = face.glyph_h_advance(buffer.info[k].glyph_id());
            let repeat = if buffer.info[k].complex_aux == action::STCH_REPEATING {
                1 + n_copies.max(0) as usize
            } else {
                1
            };
            for n in 0..repeat {
                x_offset -= width;
                if n > 0 {
                    x_offset += extra_repeat_overlap;
                }
                buffer.pos[k].x_offset = x_offset;
                info_out.push(buffer.info[k]);
                pos_out.push(buffer.pos[k]);
            }
        }
    }

    info_out.reverse();
    pos_out.reverse();
    buffer.info = info_out;
    buffer.pos = pos_out;
}

/// Marks that the Arabic Mark Transient Reordering Algorithm moves ahead of the other
/// marks of their run.
fn is_modifier_combining_mark(ch: u32) -> bool {
    matches!(
        ch,
        0x0654 | 0x0655 | 0x0658 | 0x06DC | 0x06E3 | 0x06E7 | 0x06E8 | 0x08D3 | 0x08F3
    )
}

/// Reorder a run of marks already sorted by combining class.
///
/// Modifier combining marks of class 220 and then 230 move to the start of the run, and
/// are given classes 22 and 26 so they sort before the other marks.
///
/// <https://www.unicode.org/reports/tr53/>
pub(crate) fn reorder_marks(buffer: &mut Buffer, mut start: usize, end: usize) {
    let mut i = start;
    for cc in [220, 230] {
        while i < end && buffer.info[i].modified_combining_class() < cc {
            i += 1;
        }
        if i == end {
            break;
        }
        if buffer.info[i].modified_combining_class() > cc {
            continue;
        }

        let mut j = i;
        while j < end
            && buffer.info[j].modified_combining_class() == cc
            && is_modifier_combining_mark(buffer.info[j].codepoint)
        {
            j += 1;
        }
        if i == j {
            continue;
        }

        buffer.merge_clusters(start, j);
        buffer.info[start..j].rotate_left(i - start);

        let new_start = start + j - i;
        let new_cc = if cc == 220 { 22 } else { 26 };
        for info in &mut buffer.info[start..new_start] {
            info.set_modified_combining_class(new_cc);
        }
        start = new_start;
        i = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Direction, SegmentProperties};
    use crate::tests::TestFace;

    fn buffer_for(chars: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        buffer.add_codepoints(chars, 0, chars.len());
        let mut scratch_flags = buffer.scratch_flags;
        for info in &mut buffer.info {
            info.init_unicode_props(&mut scratch_flags);
        }
        buffer.scratch_flags = scratch_flags;
        buffer
    }

    fn actions(buffer: &Buffer) -> Vec<u8> {
        buffer.info.iter().map(|info| info.complex_aux).collect()
    }

    #[test]
    fn joining_forms() {
        let mut buffer = buffer_for(&[0x0628, 0x062A, 0x0628]);
        arabic_joining(&mut buffer);
        assert_eq!(
            actions(&buffer),
            vec![action::INIT, action::MEDI, action::FINA]
        );
    }

    #[test]
    fn right_joining_letter_breaks_the_word() {
        // beh alef beh
        let mut buffer = buffer_for(&[0x0628, 0x0627, 0x0628]);
        arabic_joining(&mut buffer);
        assert_eq!(
            actions(&buffer),
            vec![action::INIT, action::FINA, action::ISOL]
        );
    }

    #[test]
    fn marks_are_transparent() {
        let mut buffer = buffer_for(&[0x0644, 0x064E, 0x0627]);
        arabic_joining(&mut buffer);
        assert_eq!(
            actions(&buffer),
            vec![action::INIT, action::NONE, action::FINA]
        );
        assert!(!buffer.info[0].unsafe_to_break());
        assert!(buffer.info[2].unsafe_to_break());
    }

    #[test]
    fn non_joining_characters() {
        let mut buffer = buffer_for(&[0x0628, 0x0020, 0x0628]);
        arabic_joining(&mut buffer);
        assert_eq!(
            actions(&buffer),
            vec![action::ISOL, action::NONE, action::ISOL]
        );
    }

    #[test]
    fn context_joins_across_item_boundaries() {
        let text = [0x0628, 0x0628, 0x0628];
        let mut buffer = Buffer::new();
        buffer.add_codepoints(&text, 1, 1);
        arabic_joining(&mut buffer);
        assert_eq!(actions(&buffer), vec![action::MEDI]);
    }

    #[test]
    fn syriac_alaph_forms() {
        // beth alaph
        let mut buffer = buffer_for(&[0x0712, 0x0710]);
        arabic_joining(&mut buffer);
        assert_eq!(actions(&buffer), vec![action::INIT, action::FINA]);

        // dalath alaph
        let mut buffer = buffer_for(&[0x0715, 0x0710]);
        arabic_joining(&mut buffer);
        assert_eq!(actions(&buffer), vec![action::ISOL, action::FIN3]);

        // alaph after a non-joining letter
        let mut buffer = buffer_for(&[0x0020, 0x0710, 0x0710]);
        arabic_joining(&mut buffer);
        assert_eq!(
            actions(&buffer),
            vec![action::NONE, action::ISOL, action::FIN2]
        );
    }

    #[test]
    fn mongolian_selectors_copy_the_form() {
        let mut buffer = buffer_for(&[0x1820, 0x180B, 0x1821]);
        arabic_joining(&mut buffer);
        mongolian_variation_selectors(&mut buffer);
        assert_eq!(buffer.info[1].complex_aux, buffer.info[0].complex_aux);
    }

    #[test]
    fn plan_masks() {
        let face = TestFace::with_chars("\u{0628}");
        let props = SegmentProperties {
            direction: Direction::RightToLeft,
            script: script::ARABIC,
            language: None,
        };
        let mut builder = MapBuilder::new(&face, &props);
        collect_features(&mut builder, script::ARABIC);
        let map = builder.compile();
        let plan = ArabicPlan::new(&map, script::ARABIC, &face);
        // The font has no presentation forms to fall back on.
        assert!(plan.fallback.is_none());
        // No fin2 in the font and no fallback for it.
        assert_eq!(plan.mask_array[usize::from(action::FIN2)], 0);

        let mut buffer = buffer_for(&[0x0628, 0x0628]);
        plan.setup_masks(&mut buffer, script::ARABIC);
        let init = map.one_mask(tag!(b"init"));
        let fina = map.one_mask(tag!(b"fina"));
        assert_ne!(init, 0);
        assert_eq!(buffer.info[0].mask & init, init);
        assert_eq!(buffer.info[0].mask & fina, 0);
        assert_eq!(buffer.info[1].mask & fina, fina);
    }

    #[test]
    fn stretch_fills_the_word() {
        let mut face = TestFace::new();
        face.advances.insert(1, 500);
        face.advances.insert(2, 100);
        face.advances.insert(3, 100);

        let mut buffer = Buffer::new();
        for (cluster, glyph) in [1, 1, 2, 3].into_iter().enumerate() {
            buffer.add(glyph, cluster as u32);
        }
        for info in &mut buffer.info[..2] {
            info.set_general_category(GeneralCategory::OtherLetter);
            info.complex_aux = action::NONE;
        }
        buffer.info[2].complex_aux = action::STCH_FIXED;
        buffer.info[3].complex_aux = action::STCH_REPEATING;
        for (pos, advance) in buffer.pos.iter_mut().zip([500, 500, 0, 0]) {
            pos.x_advance = advance;
        }
        buffer.scratch_flags |= ScratchFlags::ARABIC_HAS_STCH;

        apply_stch(&face, &mut buffer);

        // 1000 units of word, 100 fixed: nine repeating pieces.
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.info.len(), buffer.pos.len());
        assert_eq!(buffer.pos[2].x_offset, -1000);
        assert_eq!(buffer.pos[3].x_offset, -900);
        assert_eq!(buffer.pos[11].x_offset, -100);
        assert!(buffer.info[3..].iter().all(|info| info.codepoint == 3));
    }

    mod reorder_marks {
        use super::*;

        // Marks are first sorted by combining class, as normalization does.
        fn test_reorder_marks(cs: &[u32], expected: &[u32]) {
            let mut buffer = buffer_for(cs);
            let mut start = 0;
            while start < buffer.len() {
                if buffer.info[start].modified_combining_class() == 0 {
                    start += 1;
                    continue;
                }
                let mut end = start + 1;
                while end < buffer.len() && buffer.info[end].modified_combining_class() != 0 {
                    end += 1;
                }
                buffer.sort(start, end, |a, b| {
                    a.modified_combining_class() > b.modified_combining_class()
                });
                reorder_marks(&mut buffer, start, end);
                start = end;
            }
            let actual: Vec<u32> = buffer.info.iter().map(|info| info.codepoint).collect();
            assert_eq!(actual, expected);
        }

        #[test]
        fn artificial() {
            let cs = [
                0x0618, 0x0619, 0x064E, 0x064F, 0x0654, 0x0658, 0x0653, 0x0654, 0x0651, 0x0656,
                0x0651, 0x065C, 0x0655, 0x0650,
            ];
            let expected = [
                0x0654, 0x0658, 0x0651, 0x0651, 0x0618, 0x064E, 0x0619, 0x064F, 0x0650, 0x0656,
                0x065C, 0x0655, 0x0653, 0x0654,
            ];
            test_reorder_marks(&cs, &expected);
        }

        #[test]
        fn artificial_below_and_above() {
            let cs = [
                0x0618, 0x0619, 0x064E, 0x064F, 0x0654, 0x0658, 0x0653, 0x0654, 0x0651, 0x0655,
                0x0651, 0x065C, 0x0655, 0x0650,
            ];
            let expected = [
                0x0655, 0x0654, 0x0658, 0x0651, 0x0651, 0x0618, 0x064E, 0x0619, 0x064F, 0x0650,
                0x065C, 0x0655, 0x0653, 0x0654,
            ];
            test_reorder_marks(&cs, &expected);
        }

        #[test]
        fn hamza_above_moves_first() {
            test_reorder_marks(&[0x0627, 0x064F, 0x0654], &[0x0627, 0x0654, 0x064F]);
            test_reorder_marks(&[0x0627, 0x064F, 0x034F, 0x0654], &[0x0627, 0x064F, 0x034F, 0x0654]);
            test_reorder_marks(&[0x0649, 0x0650, 0x0655], &[0x0649, 0x0655, 0x0650]);
            test_reorder_marks(&[0x0649, 0x0650, 0x034F, 0x0655], &[0x0649, 0x0650, 0x034F, 0x0655]);
        }

        #[test]
        fn small_high_meem() {
            test_reorder_marks(&[0x0635, 0x06DC, 0x0652], &[0x0635, 0x06DC, 0x0652]);
            test_reorder_marks(&[0x0647, 0x0652, 0x06DC], &[0x0647, 0x06DC, 0x0652]);
            test_reorder_marks(&[0x0647, 0x0652, 0x034F, 0x06DC], &[0x0647, 0x0652, 0x034F, 0x06DC]);
        }

        #[test]
        fn small_high_yeh() {
            test_reorder_marks(&[0x0640, 0x0650, 0x0651, 0x06E7], &[0x0640, 0x06E7, 0x0651, 0x0650]);
            test_reorder_marks(
                &[0x0640, 0x0650, 0x0651, 0x034F, 0x06E7],
                &[0x0640, 0x0651, 0x0650, 0x034F, 0x06E7],
            );
        }

        #[test]
        fn small_high_noon() {
            test_reorder_marks(&[0x0640, 0x0652, 0x034F, 0x06E8], &[0x0640, 0x0652, 0x034F, 0x06E8]);
            test_reorder_marks(&[0x06C6, 0x064F, 0x06E8], &[0x06C6, 0x06E8, 0x064F]);
            test_reorder_marks(&[0x06C6, 0x064F, 0x034F, 0x06E8], &[0x06C6, 0x064F, 0x034F, 0x06E8]);
        }

        #[test]
        fn moved_marks_get_low_classes() {
            let mut buffer = buffer_for(&[0x0627, 0x064F, 0x0654]);
            reorder_marks(&mut buffer, 1, 3);
            assert_eq!(buffer.info[1].modified_combining_class(), 26);
            assert_eq!(buffer.info[1].cluster, buffer.info[2].cluster);
        }
    }
}
