//! Application of `GPOS` lookups to a buffer
//! (<https://docs.microsoft.com/en-us/typography/opentype/spec/gpos>).
//!
//! Attachments are recorded as a chain offset on each attached glyph and turned into offsets
//! once all lookups have run, see [position_finish_offsets].

use crate::buffer::{Buffer, Direction, GlyphPosition, ScratchFlags};
use crate::context::{ApplyContext, ApplyTable, SkippyIter};
use crate::face::FontFace;
use crate::feature_map::TableIndex;
use crate::layout::{
    Anchor, CursivePos, LayoutTable, LookupFlag, MarkBasePos, MarkLigPos, PairPos, PosSubtable,
    SinglePos, ValueRecord, GPOS,
};

pub(crate) const ATTACH_TYPE_NONE: u8 = 0;
pub(crate) const ATTACH_TYPE_MARK: u8 = 1;
pub(crate) const ATTACH_TYPE_CURSIVE: u8 = 2;

impl ApplyTable for GPOS {
    const TABLE_INDEX: TableIndex = TableIndex::Gpos;
    const IN_PLACE: bool = true;

    fn layout_table(face: &dyn FontFace) -> Option<&LayoutTable<GPOS>> {
        face.gpos()
    }

    fn apply_subtable(ctx: &mut ApplyContext<'_, GPOS>, subtable: &PosSubtable) -> bool {
        match subtable {
            PosSubtable::Single(pos) => apply_single(ctx, pos),
            PosSubtable::Pair(pos) => apply_pair(ctx, pos),
            PosSubtable::Cursive(pos) => apply_cursive(ctx, pos),
            PosSubtable::MarkBase(pos) => apply_mark_base(ctx, pos),
            PosSubtable::MarkLig(pos) => apply_mark_lig(ctx, pos),
            PosSubtable::MarkMark(pos) => apply_mark_mark(ctx, pos),
            PosSubtable::Context(lookup) | PosSubtable::ChainContext(lookup) => {
                ctx.apply_context(lookup)
            }
        }
    }
}

/// Drop attachments left over from earlier passes.
pub(crate) fn position_start(buffer: &mut Buffer) {
    for pos in &mut buffer.pos {
        pos.attach_chain = 0;
        pos.attach_type = ATTACH_TYPE_NONE;
    }
}

/// Resolve attachment chains into offsets relative to each attached glyph's own origin.
pub(crate) fn position_finish_offsets(buffer: &mut Buffer) {
    if !buffer.scratch_flags.contains(ScratchFlags::HAS_GPOS_ATTACHMENT) {
        return;
    }
    let direction = buffer.props.direction;
    for i in 0..buffer.pos.len() {
        propagate_attachment_offsets(&mut buffer.pos, i, direction);
    }
}

fn propagate_attachment_offsets(pos: &mut [GlyphPosition], i: usize, direction: Direction) {
    // Each attachment is resolved once, the chain is cleared on the way.
    let chain = pos[i].attach_chain;
    if chain == 0 {
        return;
    }
    let attach_type = pos[i].attach_type;
    pos[i].attach_chain = 0;

    let j = match offset_index(i, chain) {
        Some(j) if j < pos.len() => j,
        _ => return,
    };
    propagate_attachment_offsets(pos, j, direction);

    match attach_type {
        ATTACH_TYPE_CURSIVE => {
            if direction.is_horizontal() {
                pos[i].y_offset += pos[j].y_offset;
            } else {
                pos[i].x_offset += pos[j].x_offset;
            }
        }
        ATTACH_TYPE_MARK => {
            pos[i].x_offset += pos[j].x_offset;
            pos[i].y_offset += pos[j].y_offset;

            if direction.is_forward() {
                for k in j..i {
                    pos[i].x_offset -= pos[k].x_advance;
                    pos[i].y_offset -= pos[k].y_advance;
                }
            } else {
                for k in j + 1..=i {
                    pos[i].x_offset += pos[k].x_advance;
                    pos[i].y_offset += pos[k].y_advance;
                }
            }
        }
        _ => {}
    }
}

fn offset_index(i: usize, offset: i16) -> Option<usize> {
    if offset < 0 {
        i.checked_sub(usize::from(offset.unsigned_abs()))
    } else {
        i.checked_add(offset as usize)
    }
}

fn chain_offset(from: usize, to: usize) -> i16 {
    if to >= from {
        (to - from) as i16
    } else {
        -((from - to) as i16)
    }
}

/// Add `value` to `pos`, returning whether it moved anything.
fn apply_value(direction: Direction, value: &ValueRecord, pos: &mut GlyphPosition) -> bool {
    let adjust = match value {
        Some(adjust) => adjust,
        None => return false,
    };
    let mut changed = false;

    if adjust.x_placement != 0 {
        pos.x_offset += i32::from(adjust.x_placement);
        changed = true;
    }
    if adjust.y_placement != 0 {
        pos.y_offset += i32::from(adjust.y_placement);
        changed = true;
    }
    if direction.is_horizontal() {
        if adjust.x_advance != 0 {
            pos.x_advance += i32::from(adjust.x_advance);
            changed = true;
        }
    } else if adjust.y_advance != 0 {
        // y points up, so vertical advances are negative.
        pos.y_advance -= i32::from(adjust.y_advance);
        changed = true;
    }
    changed
}

fn apply_single(ctx: &mut ApplyContext<'_, GPOS>, single: &SinglePos) -> bool {
    let glyph = ctx.buffer.cur(0).glyph_id();
    let value = match single.apply(glyph) {
        Some(value) => value,
        None => return false,
    };
    let direction = ctx.direction;
    apply_value(direction, &value, ctx.buffer.cur_pos_mut());
    ctx.buffer.idx += 1;
    true
}

fn apply_pair(ctx: &mut ApplyContext<'_, GPOS>, pair: &PairPos) -> bool {
    let idx = ctx.buffer.idx;
    let mut iter = SkippyIter::new(ctx, idx, 1, false, None);
    if !iter.next(ctx) {
        return false;
    }
    let second = iter.idx;

    let first_glyph = ctx.buffer.info[idx].glyph_id();
    let second_glyph = ctx.buffer.info[second].glyph_id();
    let (value1, value2) = match pair.apply(first_glyph, second_glyph) {
        Some(values) => values,
        None => return false,
    };

    let direction = ctx.direction;
    let applied1 = apply_value(direction, &value1, &mut ctx.buffer.pos[idx]);
    let applied2 = apply_value(direction, &value2, &mut ctx.buffer.pos[second]);
    if applied1 || applied2 {
        ctx.buffer.unsafe_to_break(idx, second + 1);
    }

    ctx.buffer.idx = if pair.has_second_value() {
        second + 1
    } else {
        second
    };
    true
}

fn apply_cursive(ctx: &mut ApplyContext<'_, GPOS>, cursive: &CursivePos) -> bool {
    let idx = ctx.buffer.idx;
    let entry = match cursive.entry_exit(ctx.buffer.info[idx].glyph_id()) {
        Some((Some(entry), _)) => entry,
        _ => return false,
    };

    let mut iter = SkippyIter::new(ctx, idx, 1, false, None);
    if !iter.prev(ctx) {
        return false;
    }
    let i = iter.idx;
    let exit = match cursive.entry_exit(ctx.buffer.info[i].glyph_id()) {
        Some((_, Some(exit))) => exit,
        _ => return false,
    };
    let j = idx;

    ctx.buffer.unsafe_to_break(i, j + 1);
    let direction = ctx.direction;
    let right_to_left = ctx.lookup_flag().contains(LookupFlag::RIGHT_TO_LEFT);
    let pos = &mut ctx.buffer.pos;
    let (entry_x, entry_y) = (i32::from(entry.x), i32::from(entry.y));
    let (exit_x, exit_y) = (i32::from(exit.x), i32::from(exit.y));

    // Main direction: the exit of one glyph meets the entry of the next.
    match direction {
        Direction::LeftToRight => {
            pos[i].x_advance = exit_x + pos[i].x_offset;
            let d = entry_x + pos[j].x_offset;
            pos[j].x_advance -= d;
            pos[j].x_offset -= d;
        }
        Direction::RightToLeft => {
            let d = exit_x + pos[i].x_offset;
            pos[i].x_advance -= d;
            pos[i].x_offset -= d;
            pos[j].x_advance = entry_x + pos[j].x_offset;
        }
        Direction::TopToBottom => {
            pos[i].y_advance = exit_y + pos[i].y_offset;
            let d = entry_y + pos[j].y_offset;
            pos[j].y_advance -= d;
            pos[j].y_offset -= d;
        }
        Direction::BottomToTop => {
            let d = exit_y + pos[i].y_offset;
            pos[i].y_advance -= d;
            pos[i].y_offset -= d;
            pos[j].y_advance = entry_y;
        }
        Direction::Invalid => {}
    }

    // Cross direction: the child hangs off the parent.
    let (mut child, mut parent) = (i, j);
    let mut x_offset = entry_x - exit_x;
    let mut y_offset = entry_y - exit_y;
    if !right_to_left {
        std::mem::swap(&mut child, &mut parent);
        x_offset = -x_offset;
        y_offset = -y_offset;
    }

    // An existing attachment the other way round would make a cycle.
    reverse_cursive_minor_offset(pos, child, direction, parent);

    pos[child].attach_type = ATTACH_TYPE_CURSIVE;
    pos[child].attach_chain = chain_offset(child, parent);
    if direction.is_horizontal() {
        pos[child].y_offset = y_offset;
    } else {
        pos[child].x_offset = x_offset;
    }
    if pos[parent].attach_chain == -pos[child].attach_chain {
        pos[parent].attach_chain = 0;
    }

    ctx.buffer.scratch_flags |= ScratchFlags::HAS_GPOS_ATTACHMENT;
    ctx.buffer.idx += 1;
    true
}

fn reverse_cursive_minor_offset(
    pos: &mut [GlyphPosition],
    i: usize,
    direction: Direction,
    new_parent: usize,
) {
    let chain = pos[i].attach_chain;
    let attach_type = pos[i].attach_type;
    if chain == 0 || attach_type != ATTACH_TYPE_CURSIVE {
        return;
    }
    pos[i].attach_chain = 0;

    let j = match offset_index(i, chain) {
        Some(j) if j < pos.len() => j,
        _ => return,
    };
    if j == new_parent {
        return;
    }

    reverse_cursive_minor_offset(pos, j, direction, new_parent);

    if direction.is_horizontal() {
        pos[j].y_offset = -pos[i].y_offset;
    } else {
        pos[j].x_offset = -pos[i].x_offset;
    }
    pos[j].attach_chain = -chain;
    pos[j].attach_type = attach_type;
}

/// Attach the mark at the cursor to the glyph at `glyph_pos`.
fn apply_mark_anchors(
    ctx: &mut ApplyContext<'_, GPOS>,
    glyph_pos: usize,
    anchors: Option<(Anchor, Anchor)>,
) -> bool {
    let (base_anchor, mark_anchor) = match anchors {
        Some(anchors) => anchors,
        // Leave the mark to later subtables.
        None => return false,
    };

    let idx = ctx.buffer.idx;
    ctx.buffer.unsafe_to_break(glyph_pos, idx + 1);

    let pos = &mut ctx.buffer.pos[idx];
    pos.x_offset = i32::from(base_anchor.x) - i32::from(mark_anchor.x);
    pos.y_offset = i32::from(base_anchor.y) - i32::from(mark_anchor.y);
    pos.attach_type = ATTACH_TYPE_MARK;
    pos.attach_chain = chain_offset(idx, glyph_pos);

    ctx.buffer.scratch_flags |= ScratchFlags::HAS_GPOS_ATTACHMENT;
    ctx.buffer.idx += 1;
    true
}

fn apply_mark_base(ctx: &mut ApplyContext<'_, GPOS>, mark_base: &MarkBasePos) -> bool {
    let idx = ctx.buffer.idx;
    let mark_glyph = ctx.buffer.info[idx].glyph_id();
    if !mark_base.mark_covers(mark_glyph) {
        return false;
    }

    // Search backwards for a base, skipping marks.
    let mut iter = SkippyIter::new(ctx, idx, 1, false, None);
    iter.lookup_props = u32::from(LookupFlag::IGNORE_MARKS.bits());
    loop {
        if !iter.prev(ctx) {
            return false;
        }
        let j = iter.idx;
        let info = &ctx.buffer.info[j];
        // Only attach to the first of the glyphs a multiple substitution produced.
        let later_component = info.is_multiplied()
            && info.lig_comp() != 0
            && j > 0
            && !ctx.buffer.info[j - 1].is_mark()
            && info.lig_id() == ctx.buffer.info[j - 1].lig_id()
            && info.lig_comp() == ctx.buffer.info[j - 1].lig_comp() + 1;
        if !later_component {
            break;
        }
        iter.reject();
    }

    let base = iter.idx;
    let base_glyph = ctx.buffer.info[base].glyph_id();
    let anchors = mark_base.apply(base_glyph, mark_glyph);
    apply_mark_anchors(ctx, base, anchors)
}

fn apply_mark_lig(ctx: &mut ApplyContext<'_, GPOS>, mark_lig: &MarkLigPos) -> bool {
    let idx = ctx.buffer.idx;
    let mark_glyph = ctx.buffer.info[idx].glyph_id();
    if !mark_lig.mark_covers(mark_glyph) {
        return false;
    }

    let mut iter = SkippyIter::new(ctx, idx, 1, false, None);
    iter.lookup_props = u32::from(LookupFlag::IGNORE_MARKS.bits());
    if !iter.prev(ctx) {
        return false;
    }
    let j = iter.idx;
    let lig_glyph = ctx.buffer.info[j].glyph_id();
    let component_count = match mark_lig.component_count(lig_glyph) {
        Some(count) if count > 0 => count,
        _ => return false,
    };

    // A mark that came out of the ligature's own components goes back on the component it
    // followed; anything else goes on the last component.
    let lig_id = ctx.buffer.info[j].lig_id();
    let mark_id = ctx.buffer.info[idx].lig_id();
    let mark_comp = usize::from(ctx.buffer.info[idx].lig_comp());
    let component_index = if lig_id != 0 && lig_id == mark_id && mark_comp > 0 {
        component_count.min(mark_comp) - 1
    } else {
        component_count - 1
    };

    let anchors = mark_lig.apply(lig_glyph, mark_glyph, component_index);
    apply_mark_anchors(ctx, j, anchors)
}

fn apply_mark_mark(ctx: &mut ApplyContext<'_, GPOS>, mark_mark: &MarkBasePos) -> bool {
    let idx = ctx.buffer.idx;
    let mark1_glyph = ctx.buffer.info[idx].glyph_id();
    if !mark_mark.mark_covers(mark1_glyph) {
        return false;
    }

    // The previous mark, whatever the lookup ignores otherwise.
    let mut iter = SkippyIter::new(ctx, idx, 1, false, None);
    iter.lookup_props = ctx.lookup_props & !u32::from(LookupFlag::IGNORE_FLAGS.bits());
    if !iter.prev(ctx) {
        return false;
    }
    let j = iter.idx;
    if !ctx.buffer.info[j].is_mark() {
        return false;
    }

    let id1 = ctx.buffer.info[idx].lig_id();
    let id2 = ctx.buffer.info[j].lig_id();
    let comp1 = ctx.buffer.info[idx].lig_comp();
    let comp2 = ctx.buffer.info[j].lig_comp();

    let same_component = if id1 == id2 {
        // Marks on the same base, or on the same ligature component.
        id1 == 0 || comp1 == comp2
    } else {
        // One of the marks was itself ligated.
        (id1 > 0 && comp1 == 0) || (id2 > 0 && comp2 == 0)
    };
    if !same_component {
        return false;
    }

    let mark2_glyph = ctx.buffer.info[j].glyph_id();
    let anchors = mark_mark.apply(mark2_glyph, mark1_glyph);
    apply_mark_anchors(ctx, j, anchors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GlyphProps;
    use crate::feature_map::LookupMap;
    use crate::layout::{Adjust, Coverage, Lookup};
    use crate::tests::TestFace;

    fn gpos_with(lookups: Vec<Lookup<GPOS>>) -> LayoutTable<GPOS> {
        LayoutTable {
            opt_script_list: None,
            opt_feature_list: None,
            lookups,
        }
    }

    fn buffer_of(glyphs: &[u32], direction: Direction) -> Buffer {
        let mut buffer = Buffer::new();
        for (cluster, &glyph) in glyphs.iter().enumerate() {
            buffer.add(glyph, cluster as u32);
        }
        buffer.set_direction(direction);
        buffer.reset_masks(1);
        buffer.clear_positions();
        for pos in &mut buffer.pos {
            pos.x_advance = 500;
        }
        buffer
    }

    fn apply(face: &TestFace, buffer: &mut Buffer) {
        let table = face.gpos.as_ref().unwrap();
        position_start(buffer);
        for index in 0..table.lookups.len() {
            let mut ctx = ApplyContext::new(face, table, buffer);
            ctx.apply_string(&LookupMap {
                index: index as u16,
                mask: 1,
                auto_zwnj: true,
                auto_zwj: true,
                random: false,
            });
        }
        position_finish_offsets(buffer);
    }

    fn adjust(x_placement: i16, y_placement: i16, x_advance: i16) -> ValueRecord {
        Some(Adjust {
            x_placement,
            y_placement,
            x_advance,
            y_advance: 0,
        })
    }

    fn anchor(x: i16, y: i16) -> Anchor {
        Anchor { x, y }
    }

    fn advances(buffer: &Buffer) -> Vec<i32> {
        buffer.glyph_positions().iter().map(|pos| pos.x_advance).collect()
    }

    fn offsets(buffer: &Buffer) -> Vec<(i32, i32)> {
        buffer
            .glyph_positions()
            .iter()
            .map(|pos| (pos.x_offset, pos.y_offset))
            .collect()
    }

    #[test]
    fn single_adjustment() {
        let single = SinglePos::Format1 {
            coverage: Coverage::from_glyphs(vec![2]),
            value_record: adjust(10, 20, -50),
        };
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            1,
            LookupFlag::empty(),
            vec![PosSubtable::Single(single)],
        )]));

        let mut buffer = buffer_of(&[1, 2], Direction::LeftToRight);
        apply(&face, &mut buffer);
        assert_eq!(advances(&buffer), vec![500, 450]);
        assert_eq!(offsets(&buffer), vec![(0, 0), (10, 20)]);
    }

    #[test]
    fn vertical_advances_grow_downwards() {
        let single = SinglePos::Format1 {
            coverage: Coverage::from_glyphs(vec![1]),
            value_record: Some(Adjust {
                x_placement: 0,
                y_placement: 0,
                x_advance: 70,
                y_advance: 100,
            }),
        };
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            1,
            LookupFlag::empty(),
            vec![PosSubtable::Single(single)],
        )]));

        let mut buffer = buffer_of(&[1], Direction::TopToBottom);
        buffer.pos[0] = GlyphPosition {
            y_advance: -1000,
            ..GlyphPosition::default()
        };
        apply(&face, &mut buffer);
        assert_eq!(buffer.glyph_positions()[0].y_advance, -1100);
        assert_eq!(buffer.glyph_positions()[0].x_advance, 0);
    }

    #[test]
    fn pair_kerning_skips_marks() {
        let pair = PairPos::from_pairs(vec![(1, 2, adjust(0, 0, -100), None)]);
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            2,
            LookupFlag::IGNORE_MARKS,
            vec![PosSubtable::Pair(pair)],
        )]));

        let mut buffer = buffer_of(&[1, 9, 2, 1, 2], Direction::LeftToRight);
        buffer.info[1].glyph_props = GlyphProps::MARK;
        apply(&face, &mut buffer);
        assert_eq!(advances(&buffer), vec![400, 500, 500, 400, 500]);
        assert!(buffer.glyph_infos()[1].unsafe_to_break());
        assert!(buffer.glyph_infos()[2].unsafe_to_break());
    }

    #[test]
    fn pair_with_second_value_skips_second_glyph() {
        let pair = PairPos::from_pairs(vec![
            (1, 1, adjust(0, 0, -10), adjust(0, 0, -20)),
        ]);
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            2,
            LookupFlag::empty(),
            vec![PosSubtable::Pair(pair)],
        )]));

        // The second glyph of a pair is not the first of the next one.
        let mut buffer = buffer_of(&[1, 1, 1], Direction::LeftToRight);
        apply(&face, &mut buffer);
        assert_eq!(advances(&buffer), vec![490, 480, 500]);
    }

    #[test]
    fn cursive_connection_left_to_right() {
        let cursive = CursivePos::from_records(vec![
            (1, (None, Some(anchor(450, 100)))),
            (2, (Some(anchor(50, 50)), None)),
        ]);
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            3,
            LookupFlag::empty(),
            vec![PosSubtable::Cursive(cursive)],
        )]));

        let mut buffer = buffer_of(&[1, 2], Direction::LeftToRight);
        apply(&face, &mut buffer);
        assert_eq!(advances(&buffer), vec![450, 450]);
        // The second glyph hangs off the first, raised to meet its exit.
        assert_eq!(offsets(&buffer), vec![(0, 0), (-50, 50)]);
    }

    #[test]
    fn cursive_connection_right_to_left() {
        let cursive = CursivePos::from_records(vec![
            (1, (None, Some(anchor(0, 100)))),
            (2, (Some(anchor(480, 40)), None)),
        ]);
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            3,
            LookupFlag::RIGHT_TO_LEFT,
            vec![PosSubtable::Cursive(cursive)],
        )]));

        let mut buffer = buffer_of(&[1, 2], Direction::RightToLeft);
        apply(&face, &mut buffer);
        assert_eq!(advances(&buffer), vec![500, 480]);
        // With RIGHT_TO_LEFT the earlier glyph is the child.
        assert_eq!(offsets(&buffer), vec![(0, -60), (0, 0)]);
    }

    #[test]
    fn mark_to_base() {
        let mark_base = MarkBasePos::from_records(
            vec![(10, 0, anchor(100, 0))],
            vec![(1, vec![Some(anchor(250, 600))])],
            1,
        );
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            4,
            LookupFlag::empty(),
            vec![PosSubtable::MarkBase(mark_base)],
        )]));

        let mut buffer = buffer_of(&[1, 10], Direction::LeftToRight);
        buffer.info[0].glyph_props = GlyphProps::BASE_GLYPH;
        buffer.info[1].glyph_props = GlyphProps::MARK;
        buffer.pos[1].x_advance = 0;
        apply(&face, &mut buffer);
        // The mark's origin sits after the base's advance.
        assert_eq!(offsets(&buffer), vec![(0, 0), (150 - 500, 600)]);
        assert!(buffer.glyph_infos()[1].unsafe_to_break());
    }

    #[test]
    fn mark_to_base_right_to_left() {
        let mark_base = MarkBasePos::from_records(
            vec![(10, 0, anchor(0, 0))],
            vec![(1, vec![Some(anchor(200, 500))])],
            1,
        );
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            4,
            LookupFlag::empty(),
            vec![PosSubtable::MarkBase(mark_base)],
        )]));

        let mut buffer = buffer_of(&[1, 10], Direction::RightToLeft);
        buffer.info[0].glyph_props = GlyphProps::BASE_GLYPH;
        buffer.info[1].glyph_props = GlyphProps::MARK;
        buffer.pos[1].x_advance = 0;
        apply(&face, &mut buffer);
        assert_eq!(offsets(&buffer)[1], (200, 500));
    }

    #[test]
    fn mark_to_base_skips_intervening_marks() {
        let mark_base = MarkBasePos::from_records(
            vec![(10, 0, anchor(0, 0)), (11, 0, anchor(0, 0))],
            vec![(1, vec![Some(anchor(300, 700))])],
            1,
        );
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            4,
            LookupFlag::empty(),
            vec![PosSubtable::MarkBase(mark_base)],
        )]));

        let mut buffer = buffer_of(&[1, 10, 11], Direction::LeftToRight);
        buffer.info[0].glyph_props = GlyphProps::BASE_GLYPH;
        buffer.info[1].glyph_props = GlyphProps::MARK;
        buffer.info[2].glyph_props = GlyphProps::MARK;
        buffer.pos[1].x_advance = 0;
        buffer.pos[2].x_advance = 0;
        apply(&face, &mut buffer);
        assert_eq!(offsets(&buffer)[2], (300 - 500, 700));
    }

    #[test]
    fn mark_to_ligature_component() {
        let mark_lig = MarkLigPos::from_records(
            vec![(10, 0, anchor(0, 0))],
            vec![(5, vec![Some(anchor(100, 500)), Some(anchor(400, 500))])],
            1,
        );
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            5,
            LookupFlag::empty(),
            vec![PosSubtable::MarkLig(mark_lig)],
        )]));

        let mut buffer = buffer_of(&[5, 10, 10], Direction::LeftToRight);
        buffer.info[0].glyph_props = GlyphProps::LIGATURE;
        buffer.info[0].set_lig_props_for_ligature(1, 2);
        buffer.info[1].glyph_props = GlyphProps::MARK;
        buffer.info[1].set_lig_props_for_mark(1, 1);
        buffer.info[2].glyph_props = GlyphProps::MARK;
        buffer.pos[1].x_advance = 0;
        buffer.pos[2].x_advance = 0;
        apply(&face, &mut buffer);

        // The first mark followed the first component, the second goes on the last.
        assert_eq!(offsets(&buffer)[1], (100 - 500, 500));
        assert_eq!(offsets(&buffer)[2], (400 - 500, 500));
    }

    #[test]
    fn mark_to_mark_stacks() {
        let mark_base = MarkBasePos::from_records(
            vec![(10, 0, anchor(50, 0))],
            vec![(1, vec![Some(anchor(250, 600))])],
            1,
        );
        let mark_mark = MarkBasePos::from_records(
            vec![(11, 0, anchor(50, 0))],
            vec![(10, vec![Some(anchor(50, 200))])],
            1,
        );
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![
            Lookup::new(4, LookupFlag::empty(), vec![PosSubtable::MarkBase(mark_base)]),
            Lookup::new(6, LookupFlag::empty(), vec![PosSubtable::MarkMark(mark_mark)]),
        ]));

        let mut buffer = buffer_of(&[1, 10, 11], Direction::LeftToRight);
        buffer.info[0].glyph_props = GlyphProps::BASE_GLYPH;
        buffer.info[1].glyph_props = GlyphProps::MARK;
        buffer.info[2].glyph_props = GlyphProps::MARK;
        buffer.pos[1].x_advance = 0;
        buffer.pos[2].x_advance = 0;
        apply(&face, &mut buffer);

        assert_eq!(offsets(&buffer)[1], (200 - 500, 600));
        // Stacked on the first mark, so its offset carries over.
        assert_eq!(offsets(&buffer)[2], (200 - 500, 800));
    }

    #[test]
    fn mark_to_mark_needs_same_component() {
        let mark_mark = MarkBasePos::from_records(
            vec![(11, 0, anchor(0, 0))],
            vec![(10, vec![Some(anchor(0, 200))])],
            1,
        );
        let mut face = TestFace::new();
        face.gpos = Some(gpos_with(vec![Lookup::new(
            6,
            LookupFlag::empty(),
            vec![PosSubtable::MarkMark(mark_mark)],
        )]));

        let mut buffer = buffer_of(&[5, 10, 11], Direction::LeftToRight);
        buffer.info[0].glyph_props = GlyphProps::LIGATURE;
        buffer.info[1].glyph_props = GlyphProps::MARK;
        buffer.info[1].set_lig_props_for_mark(1, 1);
        buffer.info[2].glyph_props = GlyphProps::MARK;
        buffer.info[2].set_lig_props_for_mark(1, 2);
        apply(&face, &mut buffer);
        assert_eq!(offsets(&buffer)[2], (0, 0));
    }

    #[test]
    fn finish_offsets_only_with_attachments() {
        let mut buffer = buffer_of(&[1, 2], Direction::LeftToRight);
        buffer.pos[1].attach_chain = -1;
        buffer.pos[1].attach_type = ATTACH_TYPE_MARK;
        position_finish_offsets(&mut buffer);
        assert_eq!(buffer.pos[1].x_offset, 0);

        buffer.scratch_flags |= ScratchFlags::HAS_GPOS_ATTACHMENT;
        position_finish_offsets(&mut buffer);
        assert_eq!(buffer.pos[1].x_offset, -500);
        assert_eq!(buffer.pos[1].attach_chain, 0);
    }

    #[test]
    fn chain_offsets() {
        assert_eq!(offset_index(3, -2), Some(1));
        assert_eq!(offset_index(1, -2), None);
        assert_eq!(offset_index(1, 4), Some(5));
        assert_eq!(chain_offset(4, 1), -3);
        assert_eq!(chain_offset(1, 4), 3);
    }
}
