//! Shaping for the Thai and Lao scripts, following
//! <https://linux.thai.net/~thep/th-otf/shaping.html>.
//!
//! SARA AM is always decomposed. Fonts without Thai `GSUB` lookups get their marks
//! positioned by substituting the private use area forms many older Thai fonts carry.

use crate::buffer::{Buffer, ClusterLevel};
use crate::face::FontFace;
use crate::feature_map::TableIndex;
use crate::plan::ShapePlan;
use crate::unicode::{script, GeneralCategory};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Consonant {
    Normal,
    Ascender,
    RemovableDescender,
    StrictDescender,
    NotConsonant,
}

fn consonant_type(ch: u32) -> Consonant {
    match ch {
        0x0E1B | 0x0E1D | 0x0E1F => Consonant::Ascender,
        0x0E0D | 0x0E10 => Consonant::RemovableDescender,
        0x0E0E | 0x0E0F => Consonant::StrictDescender,
        0x0E01..=0x0E2E => Consonant::Normal,
        _ => Consonant::NotConsonant,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mark {
    AboveVowel = 0,
    BelowVowel = 1,
    Tone = 2,
}

fn mark_type(ch: u32) -> Option<Mark> {
    match ch {
        0x0E31 | 0x0E34..=0x0E37 | 0x0E47 | 0x0E4D..=0x0E4E => Some(Mark::AboveVowel),
        0x0E38..=0x0E3A => Some(Mark::BelowVowel),
        0x0E48..=0x0E4C => Some(Mark::Tone),
        _ => None,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Action {
    Nop,
    /// Shift the mark down.
    ShiftDown,
    /// Shift the mark left.
    ShiftLeft,
    ShiftDownLeft,
    /// Remove the descender from the base.
    RemoveDescender,
}

/// `(character, Windows PUA form, Macintosh PUA form)`.
type PuaMapping = (u32, u32, u32);

const SHIFT_DOWN_MAPPINGS: &[PuaMapping] = &[
    (0x0E48, 0xF70A, 0xF88B), // MAI EK
    (0x0E49, 0xF70B, 0xF88E), // MAI THO
    (0x0E4A, 0xF70C, 0xF891), // MAI TRI
    (0x0E4B, 0xF70D, 0xF894), // MAI CHATTAWA
    (0x0E4C, 0xF70E, 0xF897), // THANTHAKHAT
    (0x0E38, 0xF718, 0xF89B), // SARA U
    (0x0E39, 0xF719, 0xF89C), // SARA UU
    (0x0E3A, 0xF71A, 0xF89D), // PHINTHU
];

const SHIFT_DOWN_LEFT_MAPPINGS: &[PuaMapping] = &[
    (0x0E48, 0xF705, 0xF88C), // MAI EK
    (0x0E49, 0xF706, 0xF88F), // MAI THO
    (0x0E4A, 0xF707, 0xF892), // MAI TRI
    (0x0E4B, 0xF708, 0xF895), // MAI CHATTAWA
    (0x0E4C, 0xF709, 0xF898), // THANTHAKHAT
];

const SHIFT_LEFT_MAPPINGS: &[PuaMapping] = &[
    (0x0E48, 0xF713, 0xF88A), // MAI EK
    (0x0E49, 0xF714, 0xF88D), // MAI THO
    (0x0E4A, 0xF715, 0xF890), // MAI TRI
    (0x0E4B, 0xF716, 0xF893), // MAI CHATTAWA
    (0x0E4C, 0xF717, 0xF896), // THANTHAKHAT
    (0x0E31, 0xF710, 0xF884), // MAI HAN-AKAT
    (0x0E34, 0xF701, 0xF885), // SARA I
    (0x0E35, 0xF702, 0xF886), // SARA II
    (0x0E36, 0xF703, 0xF887), // SARA UE
    (0x0E37, 0xF704, 0xF888), // SARA UEE
    (0x0E47, 0xF712, 0xF889), // MAITAIKHU
    (0x0E4D, 0xF711, 0xF899), // NIKHAHIT
];

const REMOVE_DESCENDER_MAPPINGS: &[PuaMapping] = &[
    (0x0E0D, 0xF70F, 0xF89A), // YO YING
    (0x0E10, 0xF700, 0xF89E), // THO THAN
];

fn pua_shape(ch: u32, action: Action, face: &dyn FontFace) -> u32 {
    let mappings = match action {
        Action::Nop => return ch,
        Action::ShiftDown => SHIFT_DOWN_MAPPINGS,
        Action::ShiftDownLeft => SHIFT_DOWN_LEFT_MAPPINGS,
        Action::ShiftLeft => SHIFT_LEFT_MAPPINGS,
        Action::RemoveDescender => REMOVE_DESCENDER_MAPPINGS,
    };
    match mappings.iter().find(|&&(u, _, _)| u == ch) {
        Some(&(_, win, mac)) => [win, mac]
            .into_iter()
            .find(|&pua| face.nominal_glyph(pua).is_some())
            .unwrap_or(ch),
        None => ch,
    }
}

// What the marks above the base look like so far.
#[derive(Debug, Copy, Clone)]
enum AboveState {
    /// A normal consonant.
    T0,
    /// An ascender.
    T1,
    /// An ascender and one mark shifted left.
    T2,
    /// Nothing more to adjust.
    T3,
}

#[derive(Debug, Copy, Clone)]
enum BelowState {
    NoDescender,
    RemovableDescender,
    StrictDescender,
}

fn above_start_state(consonant: Consonant) -> AboveState {
    match consonant {
        Consonant::Ascender => AboveState::T1,
        Consonant::NotConsonant => AboveState::T3,
        _ => AboveState::T0,
    }
}

fn below_start_state(consonant: Consonant) -> BelowState {
    match consonant {
        Consonant::Normal | Consonant::Ascender => BelowState::NoDescender,
        Consonant::RemovableDescender => BelowState::RemovableDescender,
        Consonant::StrictDescender | Consonant::NotConsonant => BelowState::StrictDescender,
    }
}

fn above_transition(state: AboveState, mark: Mark) -> (Action, AboveState) {
    use AboveState::*;

    match (state, mark) {
        (T0, Mark::AboveVowel) => (Action::Nop, T3),
        (T0, Mark::BelowVowel) => (Action::Nop, T0),
        (T0, Mark::Tone) => (Action::ShiftDown, T3),
        (T1, Mark::AboveVowel) => (Action::ShiftLeft, T2),
        (T1, Mark::BelowVowel) => (Action::Nop, T1),
        (T1, Mark::Tone) => (Action::ShiftDownLeft, T2),
        (T2, Mark::AboveVowel) => (Action::Nop, T3),
        (T2, Mark::BelowVowel) => (Action::Nop, T2),
        (T2, Mark::Tone) => (Action::ShiftLeft, T3),
        (T3, _) => (Action::Nop, T3),
    }
}

fn below_transition(state: BelowState, mark: Mark) -> (Action, BelowState) {
    use BelowState::*;

    match (state, mark) {
        (NoDescender, Mark::BelowVowel) => (Action::Nop, StrictDescender),
        (NoDescender, _) => (Action::Nop, NoDescender),
        (RemovableDescender, Mark::BelowVowel) => (Action::RemoveDescender, StrictDescender),
        (RemovableDescender, _) => (Action::Nop, RemovableDescender),
        (StrictDescender, Mark::BelowVowel) => (Action::ShiftDown, StrictDescender),
        (StrictDescender, _) => (Action::Nop, StrictDescender),
    }
}

/// Replace marks, and bases whose descender is in the way, with their PUA forms.
fn do_pua_shaping(face: &dyn FontFace, buffer: &mut Buffer) {
    let mut above_state = above_start_state(Consonant::NotConsonant);
    let mut below_state = below_start_state(Consonant::NotConsonant);
    let mut base = 0;

    for i in 0..buffer.len() {
        let ch = buffer.info[i].codepoint;
        let mark = match mark_type(ch) {
            Some(mark) => mark,
            None => {
                let consonant = consonant_type(ch);
                above_state = above_start_state(consonant);
                below_state = below_start_state(consonant);
                base = i;
                continue;
            }
        };

        let (above_action, next_above) = above_transition(above_state, mark);
        let (below_action, next_below) = below_transition(below_state, mark);
        above_state = next_above;
        below_state = next_below;

        // At least one of the two is a no-op.
        let action = if above_action != Action::Nop {
            above_action
        } else {
            below_action
        };

        buffer.unsafe_to_break(base, i);
        if action == Action::RemoveDescender {
            buffer.info[base].codepoint = pua_shape(buffer.info[base].codepoint, action, face);
        } else {
            buffer.info[i].codepoint = pua_shape(ch, action, face);
        }
    }
}

// Lao characters are the Thai ones plus 0x80.

fn is_sara_am(ch: u32) -> bool {
    ch & !0x0080 == 0x0E33
}

fn nikhahit_from_sara_am(ch: u32) -> u32 {
    ch - 0x0E33 + 0x0E4D
}

fn sara_aa_from_sara_am(ch: u32) -> u32 {
    ch - 1
}

fn is_above_base_mark(ch: u32) -> bool {
    matches!(ch & !0x0080, 0x0E31 | 0x0E34..=0x0E37 | 0x0E47..=0x0E4E)
}

/// Decompose SARA AM into NIKHAHIT and SARA AA, moving the NIKHAHIT back over any marks
/// above the base.
///
/// `<0E14, 0E4B, 0E33>` becomes `<0E14, 0E4D, 0E4B, 0E32>`. A NIKHAHIT that was there to
/// start with stays where it is.
fn decompose_sara_am(buffer: &mut Buffer) {
    buffer.clear_output();
    while buffer.idx < buffer.len() && buffer.successful {
        let ch = buffer.cur(0).codepoint;
        if !is_sara_am(ch) {
            buffer.next_glyph();
            continue;
        }

        buffer.output_glyph(nikhahit_from_sara_am(ch));
        if let Some(nikhahit) = buffer.out_info.last_mut() {
            nikhahit.set_continuation();
        }
        buffer.replace_glyph(sara_aa_from_sara_am(ch));
        if !buffer.successful {
            break;
        }

        let end = buffer.out_info.len();
        // A mark of class 0, for zeroing widths.
        buffer.out_info[end - 2].set_general_category(GeneralCategory::NonspacingMark);

        let mut start = end - 2;
        while start > 0 && is_above_base_mark(buffer.out_info[start - 1].codepoint) {
            start -= 1;
        }

        if start + 2 < end {
            buffer.merge_out_clusters(start, end);
            buffer.out_info[start..end - 1].rotate_right(1);
        } else if start != 0 && buffer.cluster_level == ClusterLevel::MonotoneGraphemes {
            // The NIKHAHIT is combining, so it joins the previous cluster.
            buffer.merge_out_clusters(start - 1, end);
        }
    }
    buffer.swap_buffers();
}

pub(crate) fn preprocess_text(plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    decompose_sara_am(buffer);

    if plan.props.script == script::THAI && !plan.map.found_script(TableIndex::Gsub) {
        do_pua_shaping(face, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestFace;

    fn buffer_for(chars: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        buffer.add_codepoints(chars, 0, chars.len());
        let mut scratch_flags = buffer.scratch_flags;
        for info in &mut buffer.info {
            info.init_unicode_props(&mut scratch_flags);
        }
        buffer
    }

    fn codepoints(buffer: &Buffer) -> Vec<u32> {
        buffer.info.iter().map(|info| info.codepoint).collect()
    }

    #[test]
    fn sara_am_moves_nikhahit_before_tone_mark() {
        let mut buffer = buffer_for(&[0x0E14, 0x0E48, 0x0E33]);
        decompose_sara_am(&mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E14, 0x0E4D, 0x0E48, 0x0E32]);
        // The moved NIKHAHIT takes the tone mark's cluster along.
        assert_eq!(buffer.info[1].cluster, 1);
        assert_eq!(buffer.info[3].cluster, 1);
        assert!(buffer.info[1].is_unicode_mark());
        assert_eq!(buffer.info[1].modified_combining_class(), 0);
    }

    #[test]
    fn sara_am_after_consonant_joins_its_cluster() {
        let mut buffer = buffer_for(&[0x0E19, 0x0E33]);
        decompose_sara_am(&mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E19, 0x0E4D, 0x0E32]);
        assert!(buffer.info.iter().all(|info| info.cluster == 0));
    }

    #[test]
    fn lao_sara_am() {
        let mut buffer = buffer_for(&[0x0E81, 0x0EC8, 0x0EB3]);
        decompose_sara_am(&mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E81, 0x0ECD, 0x0EC8, 0x0EB2]);
    }

    #[test]
    fn tone_mark_shifts_down() {
        let mut face = TestFace::new();
        face.map('\u{F70A}', 9);
        let mut buffer = buffer_for(&[0x0E14, 0x0E48]);
        do_pua_shaping(&face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E14, 0xF70A]);
    }

    #[test]
    fn tone_mark_over_ascender_shifts_down_left() {
        let mut face = TestFace::new();
        face.map('\u{F705}', 9).map('\u{F713}', 10);
        // PO PLA, MAI EK
        let mut buffer = buffer_for(&[0x0E1B, 0x0E48]);
        do_pua_shaping(&face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E1B, 0xF705]);

        // PO PLA, SARA I, MAI EK
        let mut buffer = buffer_for(&[0x0E1B, 0x0E34, 0x0E48]);
        face.map('\u{F701}', 11);
        do_pua_shaping(&face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E1B, 0xF701, 0xF713]);
    }

    #[test]
    fn descender_is_removed_for_below_vowel() {
        let mut face = TestFace::new();
        face.map('\u{F70F}', 9);
        // YO YING, SARA U
        let mut buffer = buffer_for(&[0x0E0D, 0x0E38]);
        do_pua_shaping(&face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0xF70F, 0x0E38]);
    }

    #[test]
    fn macintosh_forms_are_a_second_choice() {
        let mut face = TestFace::new();
        face.map('\u{F88B}', 9);
        let mut buffer = buffer_for(&[0x0E14, 0x0E48]);
        do_pua_shaping(&face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E14, 0xF88B]);
    }

    #[test]
    fn pua_forms_need_the_font() {
        let face = TestFace::new();
        let mut buffer = buffer_for(&[0x0E14, 0x0E48]);
        do_pua_shaping(&face, &mut buffer);
        assert_eq!(codepoints(&buffer), vec![0x0E14, 0x0E48]);
    }
}
