//! Apply `morx` substitution chains and `kerx` kerning to a buffer.

use log::debug;

use crate::binary::read::ReadUnchecked;
use crate::buffer::{Buffer, GlyphInfo};
use crate::feature_map::Feature;
use crate::tables::kerx::KerxTable;
use crate::tables::morx::{
    Chain, ContextualEntry, ContextualSubtable, InsertionEntry, InsertionSubtable,
    LigatureEntry, LigatureSubtable, LookupTable, MorxTable, RearrangementEntry,
    RearrangementVerb, StateTable, SubtableKind, DELETED_GLYPH,
};
use crate::tag;

const STATE_START_OF_TEXT: u16 = 0;

/// Longest run of glyphs a rearrangement may reorder.
const MAX_CONTEXT_LENGTH: usize = 64;

/// Size of the ligature component stack. Older entries are overwritten.
const MAX_COMPONENTS: usize = 64;

/// An AAT feature type and selector, as listed in a chain's feature table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AatSelector {
    pub feature_type: u16,
    pub setting: u16,
}

const LIGATURES: u16 = 1;
const LETTER_CASE: u16 = 3;
const VERTICAL_SUBSTITUTION: u16 = 4;
const NUMBER_SPACING: u16 = 6;
const VERTICAL_POSITION: u16 = 10;
const FRACTIONS: u16 = 11;
const TYPOGRAPHIC_EXTRAS: u16 = 14;
const NUMBER_CASE: u16 = 21;
const CASE_SENSITIVE_LAYOUT: u16 = 33;
const CONTEXTUAL_ALTERNATIVES: u16 = 36;
const LOWER_CASE: u16 = 37;
const UPPER_CASE: u16 = 38;

/// OpenType feature tag to (type, selector when on, selector when off).
const FEATURE_MAPPINGS: &[(u32, u16, u16, u16)] = &[
    (tag!(b"afrc"), FRACTIONS, 1, 0),
    (tag!(b"c2pc"), UPPER_CASE, 2, 0),
    (tag!(b"c2sc"), UPPER_CASE, 1, 0),
    (tag!(b"calt"), CONTEXTUAL_ALTERNATIVES, 0, 1),
    (tag!(b"case"), CASE_SENSITIVE_LAYOUT, 0, 1),
    (tag!(b"clig"), LIGATURES, 18, 19),
    (tag!(b"cpsp"), CASE_SENSITIVE_LAYOUT, 2, 3),
    (tag!(b"dlig"), LIGATURES, 4, 5),
    (tag!(b"frac"), FRACTIONS, 2, 0),
    (tag!(b"hist"), LIGATURES, 20, 21),
    (tag!(b"liga"), LIGATURES, 2, 3),
    (tag!(b"lnum"), NUMBER_CASE, 1, 2),
    (tag!(b"onum"), NUMBER_CASE, 0, 2),
    (tag!(b"ordn"), VERTICAL_POSITION, 3, 0),
    (tag!(b"pcap"), LOWER_CASE, 2, 0),
    (tag!(b"pnum"), NUMBER_SPACING, 1, 4),
    (tag!(b"rlig"), LIGATURES, 0, 1),
    (tag!(b"sinf"), VERTICAL_POSITION, 4, 0),
    (tag!(b"smcp"), LOWER_CASE, 1, 0),
    (tag!(b"subs"), VERTICAL_POSITION, 2, 0),
    (tag!(b"sups"), VERTICAL_POSITION, 1, 0),
    (tag!(b"swsh"), CONTEXTUAL_ALTERNATIVES, 2, 3),
    (tag!(b"tnum"), NUMBER_SPACING, 0, 4),
    (tag!(b"vert"), VERTICAL_SUBSTITUTION, 0, 1),
    (tag!(b"zero"), TYPOGRAPHIC_EXTRAS, 4, 5),
];

/// Translate OpenType feature requests into AAT selectors.
///
/// Features without an AAT equivalent are dropped. Ranges are not honoured: every mapped
/// feature applies to the whole buffer.
pub fn aat_selectors(features: &[Feature]) -> Vec<AatSelector> {
    features
        .iter()
        .filter_map(|feature| {
            let &(_, feature_type, on, off) = FEATURE_MAPPINGS
                .iter()
                .find(|(tag, ..)| *tag == feature.tag)?;
            Some(AatSelector {
                feature_type,
                setting: if feature.value != 0 { on } else { off },
            })
        })
        .collect()
}

/// The subtable flags enabled for `chain` by `selectors`.
fn chain_flags(chain: &Chain<'_>, selectors: &[AatSelector]) -> u32 {
    let small_caps = selectors.contains(&AatSelector {
        feature_type: LOWER_CASE,
        setting: 1,
    });
    chain.features.iter().fold(chain.default_flags, |flags, feature| {
        let requested = selectors.contains(&AatSelector {
            feature_type: feature.feature_type,
            setting: feature.feature_setting,
        });
        // Older fonts expose small caps through the letter case type.
        let legacy_small_caps =
            feature.feature_type == LETTER_CASE && feature.feature_setting == 3 && small_caps;
        if requested || legacy_small_caps {
            (flags & feature.disable_flags) | feature.enable_flags
        } else {
            flags
        }
    })
}

/// Run every enabled subtable of every chain in `morx` over the glyphs in `buffer`.
///
/// Glyphs deleted by the chains are removed afterwards.
pub fn apply_morx(morx: &MorxTable<'_>, buffer: &mut Buffer, selectors: &[AatSelector]) {
    let vertical = buffer.direction().is_vertical();
    let backward = buffer.direction().is_backward();

    for chain in &morx.chains {
        let flags = chain_flags(chain, selectors);
        for subtable in &chain.subtables {
            if subtable.sub_feature_flags & flags == 0 || !subtable.applies_to(vertical) {
                continue;
            }
            let reverse = subtable.process_reversed(backward);
            if reverse {
                buffer.reverse();
            }
            match &subtable.kind {
                SubtableKind::Rearrangement(table) => apply_rearrangement(table, buffer),
                SubtableKind::Contextual(contextual) => apply_contextual(contextual, buffer),
                SubtableKind::Ligature(ligature) => apply_ligature(ligature, buffer),
                SubtableKind::NonContextual(lookup) => apply_noncontextual(lookup, buffer),
                SubtableKind::Insertion(insertion) => apply_insertion(insertion, buffer),
            }
            if reverse {
                buffer.reverse();
            }
            if !buffer.successful {
                debug!("morx chain stopped: buffer limits reached");
                break;
            }
        }
    }

    remove_deleted_glyphs(buffer);
}

pub(crate) fn remove_deleted_glyphs(buffer: &mut Buffer) {
    buffer.delete_glyphs_inplace(|info| info.codepoint == u32::from(DELETED_GLYPH));
}

trait StateEntry: Copy {
    fn next_state(&self) -> u16;
    fn dont_advance(&self) -> bool;
}

macro_rules! state_entry {
    ($($entry:ty),*) => {
        $(impl StateEntry for $entry {
            fn next_state(&self) -> u16 {
                self.next_state
            }

            fn dont_advance(&self) -> bool {
                <$entry>::dont_advance(self)
            }
        })*
    };
}

state_entry!(RearrangementEntry, ContextualEntry, LigatureEntry, InsertionEntry);

/// Run the state machine over the buffer, calling `transition` for each entry taken.
///
/// Subtables that change the number of glyphs write to the output buffer, the others
/// modify glyphs in place.
fn drive<E>(
    table: &StateTable<'_, E>,
    buffer: &mut Buffer,
    in_place: bool,
    mut transition: impl FnMut(&mut Buffer, E),
) where
    E: ReadUnchecked<HostType = E> + StateEntry,
{
    if !in_place {
        buffer.clear_output();
    }
    buffer.idx = 0;

    let mut state = STATE_START_OF_TEXT;
    while buffer.successful {
        let glyph = buffer.info.get(buffer.idx).map(GlyphInfo::glyph_id);
        let class = table.class(glyph);
        let entry = match table.entry(state, class) {
            Some(entry) => entry,
            None => {
                debug!("morx state {} class {} has no entry", state, class);
                break;
            }
        };

        transition(buffer, entry);
        state = entry.next_state();

        if buffer.idx >= buffer.len() || !buffer.successful {
            break;
        }
        if !entry.dont_advance() || !buffer.decrement_max_ops() {
            buffer.next_glyph();
        }
    }

    if !in_place {
        buffer.swap_buffers();
    }
}

fn apply_rearrangement(table: &StateTable<'_, RearrangementEntry>, buffer: &mut Buffer) {
    let mut start = 0;
    let mut end = 0;
    drive(table, buffer, true, |buffer, entry| {
        let len = buffer.len();
        if entry.mark_first() {
            start = buffer.idx;
        }
        if entry.mark_last() {
            end = (buffer.idx + 1).min(len);
        }

        let verb = entry.verb();
        if verb == RearrangementVerb::NoChange || start >= end {
            return;
        }
        let (l, r) = verb.moved();
        if end - start >= l + r && end - start <= MAX_CONTEXT_LENGTH {
            buffer.merge_clusters(start, (buffer.idx + 1).min(len));
            buffer.merge_clusters(start, end);
            rearrange_glyphs(verb, &mut buffer.info[start..end]);
        }
    });
}

/// Reorder `seq` according to `verb`. The sequence must hold at least as many glyphs as the
/// verb moves.
fn rearrange_glyphs<T>(verb: RearrangementVerb, seq: &mut [T]) {
    use RearrangementVerb::*;

    let len = seq.len();
    match verb {
        NoChange => {}
        Verb1 => seq.rotate_left(1),
        Verb2 => seq.rotate_right(1),
        Verb3 => seq.swap(0, len - 1),
        Verb4 => seq.rotate_left(2),
        Verb5 => {
            seq.swap(0, 1);
            seq.rotate_left(2);
        }
        Verb6 => seq.rotate_right(2),
        Verb7 => {
            seq.rotate_right(2);
            seq.swap(0, 1);
        }
        Verb8 => {
            seq.rotate_right(2);
            seq[2..].rotate_left(1);
        }
        Verb9 => {
            seq.rotate_right(2);
            seq.swap(0, 1);
            seq[2..].rotate_left(1);
        }
        Verb10 => {
            seq.rotate_right(1);
            seq[1..].rotate_left(2);
        }
        Verb11 => {
            seq.swap(0, 1);
            seq.rotate_right(1);
            seq[1..].rotate_left(2);
        }
        Verb12 => {
            seq.rotate_right(2);
            seq[2..].rotate_left(2);
        }
        Verb13 => {
            seq.swap(0, 1);
            seq.rotate_right(2);
            seq[2..].rotate_left(2);
        }
        Verb14 => {
            seq.rotate_right(2);
            seq.swap(0, 1);
            seq[2..].rotate_left(2);
        }
        Verb15 => {
            seq.swap(0, 1);
            seq.rotate_right(2);
            seq.swap(0, 1);
            seq[2..].rotate_left(2);
        }
    }
}

fn apply_contextual(subtable: &ContextualSubtable<'_>, buffer: &mut Buffer) {
    let mut mark: Option<usize> = None;
    drive(&subtable.state_table, buffer, true, |buffer, entry| {
        let len = buffer.len();
        // Neither substitution applies at the end of the text unless a mark was set.
        if buffer.idx == len && mark.is_none() {
            return;
        }

        if let Some(mark) = mark.filter(|&mark| mark < len) {
            let glyph = buffer.info[mark].glyph_id();
            if let Some(replacement) = subtable.substitute(entry.mark_index, glyph) {
                buffer.unsafe_to_break(mark, (buffer.idx + 1).min(len));
                buffer.info[mark].codepoint = u32::from(replacement);
            }
        }

        if len > 0 {
            let current = buffer.idx.min(len - 1);
            let glyph = buffer.info[current].glyph_id();
            if let Some(replacement) = subtable.substitute(entry.current_index, glyph) {
                buffer.info[current].codepoint = u32::from(replacement);
            }
        }

        if entry.set_mark() {
            mark = Some(buffer.idx);
        }
    });
}

fn apply_ligature(subtable: &LigatureSubtable<'_>, buffer: &mut Buffer) {
    // Output positions of the components pushed so far.
    let mut match_positions = [0usize; MAX_COMPONENTS];
    let mut match_length = 0usize;

    drive(&subtable.state_table, buffer, false, |buffer, entry| {
        if entry.set_component() {
            // Never mark the same position twice, which can happen with DontAdvance.
            if match_length > 0
                && match_positions[(match_length - 1) % MAX_COMPONENTS] == buffer.out_len()
            {
                match_length -= 1;
            }
            match_positions[match_length % MAX_COMPONENTS] = buffer.out_len();
            match_length += 1;
        }

        if entry.perform_action() {
            perform_ligature_actions(
                subtable,
                buffer,
                usize::from(entry.action_index),
                &mut match_positions,
                &mut match_length,
            );
        }
    });
}

fn perform_ligature_actions(
    subtable: &LigatureSubtable<'_>,
    buffer: &mut Buffer,
    mut action_index: usize,
    match_positions: &mut [usize; MAX_COMPONENTS],
    match_length: &mut usize,
) {
    let end = buffer.out_len();
    if *match_length == 0 || buffer.idx >= buffer.len() {
        return;
    }

    let mut cursor = *match_length;
    let mut ligature_index: i64 = 0;
    loop {
        let action = match subtable.action(action_index) {
            Some(action) => action,
            None => break,
        };
        if cursor == 0 {
            // Stack underflow. Clear the stack.
            *match_length = 0;
            break;
        }
        cursor -= 1;
        if !buffer.move_to(match_positions[cursor % MAX_COMPONENTS]) {
            return;
        }
        if buffer.idx >= buffer.len() {
            break;
        }

        let component_index = i64::from(buffer.cur(0).glyph_id()) + i64::from(action.offset());
        let component = match usize::try_from(component_index)
            .ok()
            .and_then(|index| subtable.component(index))
        {
            Some(component) => component,
            None => break,
        };
        ligature_index += i64::from(component);

        if action.store() || action.last() {
            let ligature = match usize::try_from(ligature_index)
                .ok()
                .and_then(|index| subtable.ligature(index))
            {
                Some(ligature) => ligature,
                None => break,
            };
            buffer.replace_glyph(u32::from(ligature));

            // Replace the remaining components with deleted glyphs, keeping the ligature
            // on the stack so that it can take part in a further ligature.
            let lig_end = match_positions[(*match_length - 1) % MAX_COMPONENTS] + 1;
            while *match_length - 1 > cursor {
                *match_length -= 1;
                if !buffer.move_to(match_positions[*match_length % MAX_COMPONENTS]) {
                    return;
                }
                if buffer.idx >= buffer.len() {
                    break;
                }
                buffer.replace_glyph(u32::from(DELETED_GLYPH));
            }

            if !buffer.move_to(lig_end) {
                return;
            }
            buffer.merge_out_clusters(match_positions[cursor % MAX_COMPONENTS], buffer.out_len());
        }

        action_index += 1;
        if action.last() {
            break;
        }
    }

    buffer.move_to(end);
}

fn apply_noncontextual(lookup: &LookupTable<'_>, buffer: &mut Buffer) {
    for info in buffer.info.iter_mut() {
        if let Some(replacement) = lookup.lookup(info.glyph_id()) {
            info.codepoint = u32::from(replacement);
        }
    }
}

fn apply_insertion(subtable: &InsertionSubtable<'_>, buffer: &mut Buffer) {
    let mut mark: Option<usize> = None;
    drive(&subtable.state_table, buffer, false, |buffer, entry| {
        if let Some(mark_position) = mark {
            let count = entry.marked_insert_count();
            if let Some(glyphs) = subtable.glyphs(entry.marked_insert_index, count) {
                if !consume_ops(buffer, count) {
                    return;
                }
                let end = buffer.out_len();
                if !buffer.move_to(mark_position) {
                    return;
                }
                insert_glyphs(buffer, &glyphs, entry.marked_insert_before());
                if !buffer.move_to(end + glyphs.len()) {
                    return;
                }
                let unsafe_end = (buffer.idx + 1).min(buffer.len());
                buffer.unsafe_to_break_from_outbuffer(mark_position, unsafe_end);
            }
        }

        if entry.set_mark() {
            mark = Some(buffer.out_len());
        }

        let count = entry.current_insert_count();
        if let Some(glyphs) = subtable.glyphs(entry.current_insert_index, count) {
            if !consume_ops(buffer, count) {
                return;
            }
            let end = buffer.out_len();
            insert_glyphs(buffer, &glyphs, entry.current_insert_before());
            // With DontAdvance the inserted glyphs are processed by the next step.
            let target = if entry.dont_advance() {
                end
            } else {
                end + glyphs.len()
            };
            buffer.move_to(target);
        }
    });
}

fn consume_ops(buffer: &mut Buffer, count: usize) -> bool {
    let count = i32::try_from(count).unwrap_or(i32::MAX);
    buffer.max_ops = buffer.max_ops.saturating_sub(count);
    buffer.max_ops > 0
}

/// Write `glyphs` to the output before or after the glyph at the cursor.
fn insert_glyphs(buffer: &mut Buffer, glyphs: &[u16], before: bool) {
    let after = buffer.idx < buffer.len() && !before;
    if after {
        buffer.copy_glyph();
    }
    for &glyph in glyphs {
        buffer.output_glyph(u32::from(glyph));
    }
    if after {
        buffer.skip_glyph();
    }
}

/// Apply `kerx` pair kerning between adjacent non-mark glyphs.
pub fn apply_kerx(kerx: &KerxTable<'_>, buffer: &mut Buffer) {
    let vertical = buffer.direction().is_vertical();
    crate::kern::kern_pairs(buffer, None, |left, right| {
        kerx.kerning(left, right, vertical)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::tables::morx::tests::{format8_lookup, noncontextual_morx, push_u16s, push_u32s};

    fn glyph_buffer(glyphs: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        for (cluster, &glyph) in glyphs.iter().enumerate() {
            buffer.add(glyph, cluster as u32);
        }
        buffer
    }

    fn glyphs(buffer: &Buffer) -> Vec<u32> {
        buffer.glyph_infos().iter().map(|info| info.codepoint).collect()
    }

    /// A ligature subtable joining glyphs 1 and 2 into glyph 9.
    ///
    /// Classes: 4 for glyph 1, 5 for glyph 2. State 2 is entered after glyph 1.
    fn ligature_morx() -> Vec<u8> {
        let mut body = Vec::new();
        // STXHeader: nClasses, classTable, stateArray, entryTable, then the
        // ligActionOffset, componentOffset, ligatureOffset.
        let class_table = format8_lookup(1, &[4, 5]);
        let class_offset = 28u32;
        let state_offset = class_offset + class_table.len() as u32;
        let states: [[u16; 6]; 3] = [[0, 0, 0, 0, 1, 0], [0, 0, 0, 0, 1, 0], [0, 0, 0, 0, 1, 2]];
        let entry_offset = state_offset + 36;
        // Entries: 0 = nothing, 1 = push glyph 1 and go to state 2,
        // 2 = push glyph 2 and perform actions from index 0.
        let entries: [[u16; 3]; 3] = [[0, 0, 0], [2, 0x8000, 0], [0, 0xA000, 0]];
        let action_offset = entry_offset + 18;
        // Pop glyph 2: component index 2 + 0 -> 1. Pop glyph 1: index 1 - 1 -> 0, last.
        let actions: [u32; 2] = [0x0000_0000, 0xBFFF_FFFF];
        let component_offset = action_offset + 8;
        let components: [u16; 3] = [0, 0, 0];
        let ligature_offset = component_offset + 6;

        push_u32s(
            &mut body,
            &[
                6,
                class_offset,
                state_offset,
                entry_offset,
                action_offset,
                component_offset,
                ligature_offset,
            ],
        );
        body.extend_from_slice(&class_table);
        for row in &states {
            push_u16s(&mut body, row);
        }
        for entry in &entries {
            push_u16s(&mut body, entry);
        }
        push_u32s(&mut body, &actions);
        push_u16s(&mut body, &components);
        push_u16s(&mut body, &[9]);

        let subtable_length = 12 + body.len() as u32;
        let mut data = Vec::new();
        push_u16s(&mut data, &[2, 0]);
        push_u32s(&mut data, &[1]);
        push_u32s(&mut data, &[1, 16 + subtable_length, 0, 1]);
        push_u32s(&mut data, &[subtable_length, 0x2000_0002, 1]);
        data.extend_from_slice(&body);
        data
    }

    #[test]
    fn noncontextual_substitution() {
        let data = noncontextual_morx(&format8_lookup(3, &[30, 40]));
        let morx = ReadScope::new(&data).read_dep::<MorxTable<'_>>(50).unwrap();
        let mut buffer = glyph_buffer(&[3, 5, 4]);
        apply_morx(&morx, &mut buffer, &[]);
        assert_eq!(glyphs(&buffer), vec![30, 5, 40]);
    }

    #[test]
    fn disabled_chain_flags() {
        let mut data = noncontextual_morx(&format8_lookup(3, &[30]));
        // default flags of the chain
        data[8..12].copy_from_slice(&0u32.to_be_bytes());
        let morx = ReadScope::new(&data).read_dep::<MorxTable<'_>>(50).unwrap();
        let mut buffer = glyph_buffer(&[3]);
        apply_morx(&morx, &mut buffer, &[]);
        assert_eq!(glyphs(&buffer), vec![3]);
    }

    #[test]
    fn ligature_substitution() {
        let data = ligature_morx();
        let morx = ReadScope::new(&data).read_dep::<MorxTable<'_>>(10).unwrap();
        let mut buffer = glyph_buffer(&[7, 1, 2, 7]);
        apply_morx(&morx, &mut buffer, &[]);
        assert_eq!(glyphs(&buffer), vec![7, 9, 7]);
        let clusters = buffer
            .glyph_infos()
            .iter()
            .map(|info| info.cluster)
            .collect::<Vec<_>>();
        assert_eq!(clusters, vec![0, 1, 3]);
    }

    #[test]
    fn rearrangement_verbs() {
        let mut seq = ['A', 'B', 'x', 'C', 'D'];
        rearrange_glyphs(RearrangementVerb::Verb15, &mut seq);
        assert_eq!(seq, ['D', 'C', 'x', 'B', 'A']);

        let mut seq = ['A', 'x', 'C', 'D'];
        rearrange_glyphs(RearrangementVerb::Verb9, &mut seq);
        assert_eq!(seq, ['D', 'C', 'x', 'A']);

        let mut seq = ['A', 'x', 'x', 'D'];
        rearrange_glyphs(RearrangementVerb::Verb3, &mut seq);
        assert_eq!(seq, ['D', 'x', 'x', 'A']);
    }

    #[test]
    fn selectors_from_features() {
        let features = ["-liga", "smcp"]
            .iter()
            .map(|s| s.parse::<Feature>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            aat_selectors(&features),
            vec![
                AatSelector {
                    feature_type: LIGATURES,
                    setting: 3
                },
                AatSelector {
                    feature_type: LOWER_CASE,
                    setting: 1
                },
            ]
        );
    }
}
