//! Matching and applying lookups against a buffer, shared by GSUB and GPOS.

use crate::buffer::{Buffer, Direction, GlyphInfo, GlyphProps, Mask};
use crate::face::FontFace;
use crate::feature_map::{LookupMap, TableIndex};
use crate::layout::{
    ClassDef, ContextLookup, Coverage, GDEFTable, LayoutTable, LayoutTableType, Lookup,
    LookupFlag, SequenceLookup,
};
use crate::unicode::GeneralCategory;

/// How deep nested lookups may recurse.
pub const MAX_NESTING_LEVEL: usize = 6;
/// The longest input sequence a contextual rule or ligature may match.
pub const MAX_CONTEXT_LENGTH: usize = 64;

/// A layout table whose lookups can be applied to a buffer.
pub trait ApplyTable: LayoutTableType {
    const TABLE_INDEX: TableIndex;
    /// Lookups rewrite the buffer in place rather than through the output.
    const IN_PLACE: bool;

    fn layout_table(face: &dyn FontFace) -> Option<&LayoutTable<Self>>;

    /// Apply one subtable at the cursor, `true` if it applied.
    fn apply_subtable(ctx: &mut ApplyContext<'_, Self>, subtable: &Self::Subtable) -> bool;

    /// Lookups that run from the end of the buffer to the start.
    fn is_reverse(_lookup: &Lookup<Self>) -> bool {
        false
    }
}

/// The sequence a rule matches glyphs against, one entry per glyph.
#[derive(Copy, Clone)]
pub enum GlyphTable<'a> {
    ById(&'a [u16]),
    ByClassDef(&'a ClassDef, &'a [u16]),
    ByCoverage(&'a [Coverage]),
}

impl<'a> GlyphTable<'a> {
    pub fn len(&self) -> usize {
        match self {
            GlyphTable::ById(ids) => ids.len(),
            GlyphTable::ByClassDef(_, classes) => classes.len(),
            GlyphTable::ByCoverage(coverages) => coverages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(&self, index: usize, glyph: u16) -> bool {
        match self {
            GlyphTable::ById(ids) => ids.get(index) == Some(&glyph),
            GlyphTable::ByClassDef(classdef, classes) => classes
                .get(index)
                .map_or(false, |&class| classdef.glyph_class_value(glyph) == class),
            GlyphTable::ByCoverage(coverages) => coverages
                .get(index)
                .map_or(false, |coverage| coverage.glyph_coverage_value(glyph).is_some()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Tri {
    No,
    Yes,
    Maybe,
}

/// Walks the buffer from a start position, stepping over glyphs the lookup ignores.
pub(crate) struct SkippyIter<'m> {
    pub(crate) idx: usize,
    num_items: usize,
    end: usize,
    pub(crate) lookup_props: u32,
    mask: Mask,
    syllable: u8,
    ignore_zwnj: bool,
    ignore_zwj: bool,
    glyphs: Option<GlyphTable<'m>>,
    match_index: usize,
}

impl<'m> SkippyIter<'m> {
    /// An iterator for `num_items` glyphs around `start`. Context matching accepts
    /// glyphs outside the lookup mask.
    pub(crate) fn new<T: ApplyTable>(
        ctx: &ApplyContext<'_, T>,
        start: usize,
        num_items: usize,
        context_match: bool,
        glyphs: Option<GlyphTable<'m>>,
    ) -> SkippyIter<'m> {
        let syllable = if start == ctx.buffer.idx && start < ctx.buffer.len() {
            ctx.buffer.cur(0).syllable
        } else {
            0
        };
        SkippyIter {
            idx: start,
            num_items,
            end: ctx.buffer.len(),
            lookup_props: ctx.lookup_props,
            mask: if context_match {
                Mask::MAX
            } else {
                ctx.lookup_mask
            },
            syllable,
            ignore_zwnj: T::TABLE_INDEX == TableIndex::Gpos || (context_match && ctx.auto_zwnj),
            ignore_zwj: context_match || ctx.auto_zwj,
            glyphs,
            match_index: 0,
        }
    }

    pub(crate) fn may_skip<T: ApplyTable>(
        &self,
        ctx: &ApplyContext<'_, T>,
        info: &GlyphInfo,
    ) -> Tri {
        if !ctx.check_glyph_property(info, self.lookup_props) {
            return Tri::Yes;
        }
        if info.is_default_ignorable_and_not_hidden()
            && (self.ignore_zwnj || !info.is_zwnj())
            && (self.ignore_zwj || !info.is_zwj())
        {
            return Tri::Maybe;
        }
        Tri::No
    }

    fn may_match(&self, info: &GlyphInfo) -> Tri {
        if info.mask & self.mask == 0 || (self.syllable != 0 && self.syllable != info.syllable) {
            return Tri::No;
        }
        match &self.glyphs {
            Some(glyphs) if glyphs.matches(self.match_index, info.glyph_id()) => Tri::Yes,
            Some(_) => Tri::No,
            None => Tri::Maybe,
        }
    }

    /// Whether `info` is accepted, `None` to keep looking.
    fn accept<T: ApplyTable>(
        &mut self,
        ctx: &ApplyContext<'_, T>,
        info: &GlyphInfo,
    ) -> Option<bool> {
        let skip = self.may_skip(ctx, info);
        if skip == Tri::Yes {
            return None;
        }
        let matched = self.may_match(info);
        if matched == Tri::Yes || (matched == Tri::Maybe && skip == Tri::No) {
            self.num_items -= 1;
            self.match_index += 1;
            return Some(true);
        }
        if skip == Tri::No {
            return Some(false);
        }
        None
    }

    pub(crate) fn next<T: ApplyTable>(&mut self, ctx: &ApplyContext<'_, T>) -> bool {
        while self.idx + self.num_items < self.end {
            self.idx += 1;
            let info = &ctx.buffer.info[self.idx];
            if let Some(accepted) = self.accept(ctx, info) {
                return accepted;
            }
        }
        false
    }

    /// Step back through the output, or the input when positioning.
    pub(crate) fn prev<T: ApplyTable>(&mut self, ctx: &ApplyContext<'_, T>) -> bool {
        while self.num_items > 0 && self.idx >= self.num_items {
            self.idx -= 1;
            let info = ctx.buffer.backtrack_info(self.idx);
            if let Some(accepted) = self.accept(ctx, info) {
                return accepted;
            }
        }
        false
    }

    /// Undo the last accepted glyph so the walk can continue past it.
    pub(crate) fn reject(&mut self) {
        self.num_items += 1;
        self.match_index = self.match_index.saturating_sub(1);
    }
}

/// The state of applying the lookups of one table to a buffer.
pub struct ApplyContext<'a, T: ApplyTable> {
    pub(crate) face: &'a dyn FontFace,
    pub(crate) table: &'a LayoutTable<T>,
    pub(crate) gdef: Option<&'a GDEFTable>,
    pub(crate) buffer: &'a mut Buffer,
    pub(crate) direction: Direction,
    pub(crate) lookup_mask: Mask,
    pub(crate) lookup_props: u32,
    pub(crate) lookup_index: u16,
    pub(crate) nesting_level_left: usize,
    pub(crate) auto_zwnj: bool,
    pub(crate) auto_zwj: bool,
    pub(crate) random: bool,
    pub(crate) random_state: u32,
    has_glyph_classes: bool,
}

impl<'a, T: ApplyTable> ApplyContext<'a, T> {
    pub fn new(
        face: &'a dyn FontFace,
        table: &'a LayoutTable<T>,
        buffer: &'a mut Buffer,
    ) -> ApplyContext<'a, T> {
        let gdef = face.gdef();
        ApplyContext {
            face,
            table,
            gdef,
            direction: buffer.direction(),
            buffer,
            lookup_mask: 1,
            lookup_props: 0,
            lookup_index: 0,
            nesting_level_left: MAX_NESTING_LEVEL,
            auto_zwnj: true,
            auto_zwj: true,
            random: false,
            random_state: 1,
            has_glyph_classes: gdef.map_or(false, GDEFTable::has_glyph_classes),
        }
    }

    /// Apply one lookup to the whole buffer.
    pub fn apply_string(&mut self, lookup_map: &LookupMap) {
        let table = self.table;
        let lookup = match table.lookup(usize::from(lookup_map.index)) {
            Some(lookup) => lookup,
            None => return,
        };
        self.lookup_index = lookup_map.index;
        self.lookup_mask = lookup_map.mask;
        self.auto_zwnj = lookup_map.auto_zwnj;
        self.auto_zwj = lookup_map.auto_zwj;
        self.random = lookup_map.random;
        if self.buffer.is_empty() || self.lookup_mask == 0 {
            return;
        }
        self.lookup_props = lookup_props(lookup);

        if !T::is_reverse(lookup) {
            if !T::IN_PLACE {
                self.buffer.clear_output();
            }
            self.buffer.idx = 0;
            self.apply_forward(lookup);
            if !T::IN_PLACE {
                self.buffer.swap_buffers();
            }
        } else {
            if !T::IN_PLACE {
                self.buffer.remove_output();
            }
            self.apply_backward(lookup);
        }
    }

    fn apply_forward(&mut self, lookup: &Lookup<T>) {
        while self.buffer.idx < self.buffer.len() && self.buffer.successful {
            if !(self.may_apply_at_cursor(lookup) && self.apply_subtables(lookup)) {
                self.buffer.next_glyph();
            }
        }
    }

    fn apply_backward(&mut self, lookup: &Lookup<T>) {
        let mut idx = self.buffer.len();
        while idx > 0 && self.buffer.successful {
            idx -= 1;
            self.buffer.idx = idx;
            if self.may_apply_at_cursor(lookup) {
                self.apply_subtables(lookup);
            }
        }
        self.buffer.idx = 0;
    }

    fn may_apply_at_cursor(&self, lookup: &Lookup<T>) -> bool {
        let cur = self.buffer.cur(0);
        lookup.digest.may_have(cur.glyph_id())
            && cur.mask & self.lookup_mask != 0
            && self.check_glyph_property(cur, self.lookup_props)
    }

    /// Try the subtables in order; the first that applies wins.
    fn apply_subtables(&mut self, lookup: &Lookup<T>) -> bool {
        lookup
            .subtables
            .iter()
            .any(|subtable| T::apply_subtable(self, subtable))
    }

    /// Apply lookup `lookup_index` at the cursor, on behalf of a contextual rule.
    pub(crate) fn recurse(&mut self, lookup_index: u16) -> bool {
        if self.nesting_level_left == 0 {
            return false;
        }
        let ops = self.buffer.max_ops;
        self.buffer.max_ops -= 1;
        if ops <= 0 {
            return false;
        }

        let table = self.table;
        let lookup = match table.lookup(usize::from(lookup_index)) {
            Some(lookup) => lookup,
            None => return false,
        };
        let saved_props = self.lookup_props;
        let saved_index = self.lookup_index;
        self.lookup_props = lookup_props(lookup);
        self.lookup_index = lookup_index;
        self.nesting_level_left -= 1;

        let applied = self.apply_subtables(lookup);

        self.nesting_level_left += 1;
        self.lookup_index = saved_index;
        self.lookup_props = saved_props;
        applied
    }

    pub(crate) fn lookup_flag(&self) -> LookupFlag {
        LookupFlag::from_bits_truncate(self.lookup_props as u16)
    }

    /// Whether a glyph with these properties takes part in a lookup with `match_props`.
    pub(crate) fn check_glyph_property(&self, info: &GlyphInfo, match_props: u32) -> bool {
        let glyph_props = u32::from(info.glyph_props.bits());
        if glyph_props & match_props & u32::from(LookupFlag::IGNORE_FLAGS.bits()) != 0 {
            return false;
        }
        if info.is_mark() {
            return self.match_properties_mark(info.glyph_id(), glyph_props, match_props);
        }
        true
    }

    fn match_properties_mark(&self, glyph: u16, glyph_props: u32, match_props: u32) -> bool {
        if match_props & u32::from(LookupFlag::USE_MARK_FILTERING_SET.bits()) != 0 {
            let set_index = (match_props >> 16) as u16;
            return self
                .gdef
                .map_or(false, |gdef| gdef.is_mark_in_set(glyph, set_index));
        }
        let attachment_type = u32::from(LookupFlag::MARK_ATTACHMENT_TYPE.bits());
        if match_props & attachment_type != 0 {
            return match_props & attachment_type == glyph_props & attachment_type;
        }
        true
    }

    /// Update the properties of the glyph at the cursor, which is being replaced by `glyph`.
    pub(crate) fn set_glyph_props_ext(
        &mut self,
        glyph: u16,
        class_guess: GlyphProps,
        ligature: bool,
        component: bool,
    ) {
        let mut props = self.buffer.cur(0).glyph_props | GlyphProps::SUBSTITUTED;
        if ligature {
            props |= GlyphProps::LIGATED;
            props.remove(GlyphProps::MULTIPLIED);
        }
        if component {
            props |= GlyphProps::MULTIPLIED;
        }
        if self.has_glyph_classes {
            if let Some(gdef) = self.gdef {
                props = (props & GlyphProps::PRESERVE) | gdef.glyph_props(glyph);
            }
        } else if !class_guess.is_empty() {
            props = (props & GlyphProps::PRESERVE) | class_guess;
        }
        self.buffer.cur_mut(0).glyph_props = props;
    }

    pub(crate) fn set_glyph_props(&mut self, glyph: u16) {
        self.set_glyph_props_ext(glyph, GlyphProps::empty(), false, false);
    }

    pub(crate) fn replace_glyph(&mut self, glyph: u16) {
        self.set_glyph_props(glyph);
        self.buffer.replace_glyph(u32::from(glyph));
    }

    pub(crate) fn replace_glyph_inplace(&mut self, glyph: u16) {
        self.set_glyph_props(glyph);
        self.buffer.cur_mut(0).codepoint = u32::from(glyph);
    }

    pub(crate) fn output_glyph_for_component(&mut self, glyph: u16, class_guess: GlyphProps) {
        self.set_glyph_props_ext(glyph, class_guess, false, true);
        self.buffer.output_glyph(u32::from(glyph));
    }

    /// The next value of a minimal standard generator seeded with 1.
    pub(crate) fn random_number(&mut self) -> u32 {
        self.random_state = (u64::from(self.random_state) * 48271 % 2_147_483_647) as u32;
        self.random_state
    }

    /// Match the glyphs after the cursor against `input`, recording where each
    /// matched glyph is. Returns the length of the matched span and the total number
    /// of ligature components it covers.
    pub(crate) fn match_input(
        &self,
        input: GlyphTable<'_>,
        match_positions: &mut [usize; MAX_CONTEXT_LENGTH],
    ) -> Option<(usize, u8)> {
        let count = input.len() + 1;
        if count > MAX_CONTEXT_LENGTH {
            return None;
        }

        let buffer = &*self.buffer;
        let mut iter = SkippyIter::new(self, buffer.idx, count - 1, false, Some(input));

        let first = buffer.cur(0);
        let mut total_component_count = first.lig_num_comps();
        let first_lig_id = first.lig_id();
        let first_lig_comp = first.lig_comp();

        // Whether the ligature the first glyph is attached to may be skipped.
        let mut ligbase: Option<bool> = None;

        match_positions[0] = buffer.idx;
        for position in match_positions.iter_mut().take(count).skip(1) {
            if !iter.next(self) {
                return None;
            }
            *position = iter.idx;

            let info = &buffer.info[iter.idx];
            let this_lig_id = info.lig_id();
            let this_lig_comp = info.lig_comp();

            if first_lig_id != 0 && first_lig_comp != 0 {
                // Components attached to a ligature only ligate with glyphs attached to
                // the same component, unless that ligature is itself ignored.
                if first_lig_id != this_lig_id || first_lig_comp != this_lig_comp {
                    let may_skip = *ligbase
                        .get_or_insert_with(|| self.ligature_base_may_skip(&iter, first_lig_id));
                    if !may_skip {
                        return None;
                    }
                }
            } else if this_lig_id != 0 && this_lig_comp != 0 && this_lig_id != first_lig_id {
                return None;
            }

            total_component_count = total_component_count.wrapping_add(info.lig_num_comps());
        }

        Some((iter.idx - buffer.idx + 1, total_component_count))
    }

    fn ligature_base_may_skip(&self, iter: &SkippyIter<'_>, lig_id: u8) -> bool {
        let out = &self.buffer.out_info;
        let mut j = out.len();
        while j != 0 && out[j - 1].lig_id() == lig_id {
            j -= 1;
            if out[j].lig_comp() == 0 {
                return iter.may_skip(self, &out[j]) == Tri::Yes;
            }
        }
        false
    }

    /// Replace the matched glyphs with `lig_glyph`, reassigning the marks between and
    /// after the components to the new ligature.
    pub(crate) fn ligate_input(
        &mut self,
        count: usize,
        match_positions: &[usize; MAX_CONTEXT_LENGTH],
        match_length: usize,
        lig_glyph: u16,
        total_component_count: u8,
    ) {
        let idx = self.buffer.idx;
        self.buffer.merge_clusters(idx, idx + match_length);

        // A base followed by marks stays a base so later marks still attach to it. A
        // ligature of marks keeps its ligature id so it can attach to an earlier ligature.
        let mut is_base_ligature = self.buffer.info[match_positions[0]].is_base_glyph();
        let mut is_mark_ligature = self.buffer.info[match_positions[0]].is_mark();
        if match_positions[1..count]
            .iter()
            .any(|&position| !self.buffer.info[position].is_mark())
        {
            is_base_ligature = false;
            is_mark_ligature = false;
        }
        let is_ligature = !is_base_ligature && !is_mark_ligature;

        let (class, lig_id) = if is_ligature {
            (GlyphProps::LIGATURE, self.buffer.allocate_lig_id())
        } else {
            (GlyphProps::empty(), 0)
        };

        let mut last_lig_id = self.buffer.cur(0).lig_id();
        let mut last_num_components = self.buffer.cur(0).lig_num_comps();
        let mut components_so_far = last_num_components;

        if is_ligature {
            let cur = self.buffer.cur_mut(0);
            cur.set_lig_props_for_ligature(lig_id, total_component_count);
            if cur.general_category() == GeneralCategory::NonspacingMark {
                cur.set_general_category(GeneralCategory::OtherLetter);
            }
        }

        self.set_glyph_props_ext(lig_glyph, class, true, false);
        self.buffer.replace_glyph(u32::from(lig_glyph));

        for &position in &match_positions[1..count] {
            while self.buffer.idx < position && self.buffer.successful {
                if is_ligature {
                    let cur = self.buffer.cur_mut(0);
                    let this_comp = match cur.lig_comp() {
                        0 => last_num_components,
                        comp => comp,
                    };
                    let new_lig_comp = components_so_far - last_num_components
                        + this_comp.min(last_num_components);
                    cur.set_lig_props_for_mark(lig_id, new_lig_comp);
                }
                self.buffer.next_glyph();
            }

            let cur = self.buffer.cur(0);
            last_lig_id = cur.lig_id();
            last_num_components = cur.lig_num_comps();
            components_so_far = components_so_far.wrapping_add(last_num_components);

            // Skip the component itself.
            self.buffer.skip_glyph();
        }

        if !is_mark_ligature && last_lig_id != 0 {
            // Marks following the last component were attached to it.
            for i in self.buffer.idx..self.buffer.len() {
                let info = &mut self.buffer.info[i];
                if info.lig_id() != last_lig_id {
                    break;
                }
                let this_comp = info.lig_comp();
                if this_comp == 0 {
                    break;
                }
                let new_lig_comp = components_so_far - last_num_components
                    + this_comp.min(last_num_components);
                info.set_lig_props_for_mark(lig_id, new_lig_comp);
            }
        }
    }

    /// Match `backtrack` before the cursor, returning the output index where it starts.
    pub(crate) fn match_backtrack(&self, backtrack: GlyphTable<'_>) -> Option<usize> {
        let mut iter = SkippyIter::new(
            self,
            self.buffer.backtrack_len(),
            backtrack.len(),
            true,
            Some(backtrack),
        );
        for _ in 0..backtrack.len() {
            if !iter.prev(self) {
                return None;
            }
        }
        Some(iter.idx)
    }

    /// Match `lookahead` after the first `offset` glyphs from the cursor, returning the
    /// index just past it.
    pub(crate) fn match_lookahead(
        &self,
        lookahead: GlyphTable<'_>,
        offset: usize,
    ) -> Option<usize> {
        let mut iter = SkippyIter::new(
            self,
            self.buffer.idx + offset - 1,
            lookahead.len(),
            true,
            Some(lookahead),
        );
        for _ in 0..lookahead.len() {
            if !iter.next(self) {
                return None;
            }
        }
        Some(iter.idx + 1)
    }

    /// Apply a contextual or chained contextual subtable at the cursor.
    pub(crate) fn apply_context(&mut self, lookup: &ContextLookup) -> bool {
        let glyph = self.buffer.cur(0).glyph_id();
        match lookup {
            ContextLookup::Glyphs {
                coverage,
                rule_sets,
            } => {
                let rule_set = match coverage
                    .glyph_coverage_value(glyph)
                    .and_then(|index| rule_sets.get(usize::from(index)))
                {
                    Some(rule_set) => rule_set,
                    None => return false,
                };
                rule_set.iter().any(|rule| {
                    self.apply_rule(
                        GlyphTable::ById(&rule.backtrack),
                        GlyphTable::ById(&rule.input),
                        GlyphTable::ById(&rule.lookahead),
                        &rule.lookup_records,
                    )
                })
            }
            ContextLookup::Classes {
                coverage,
                backtrack_classdef,
                input_classdef,
                lookahead_classdef,
                rule_sets,
            } => {
                if coverage.glyph_coverage_value(glyph).is_none() {
                    return false;
                }
                let class = input_classdef.glyph_class_value(glyph);
                let rule_set = match rule_sets.get(usize::from(class)) {
                    Some(rule_set) => rule_set,
                    None => return false,
                };
                rule_set.iter().any(|rule| {
                    self.apply_rule(
                        GlyphTable::ByClassDef(backtrack_classdef, &rule.backtrack),
                        GlyphTable::ByClassDef(input_classdef, &rule.input),
                        GlyphTable::ByClassDef(lookahead_classdef, &rule.lookahead),
                        &rule.lookup_records,
                    )
                })
            }
            ContextLookup::Coverages {
                backtrack_coverages,
                input_coverages,
                lookahead_coverages,
                lookup_records,
            } => {
                let (first, rest) = match input_coverages.split_first() {
                    Some(split) => split,
                    None => return false,
                };
                if first.glyph_coverage_value(glyph).is_none() {
                    return false;
                }
                self.apply_rule(
                    GlyphTable::ByCoverage(backtrack_coverages),
                    GlyphTable::ByCoverage(rest),
                    GlyphTable::ByCoverage(lookahead_coverages),
                    lookup_records,
                )
            }
        }
    }

    fn apply_rule(
        &mut self,
        backtrack: GlyphTable<'_>,
        input: GlyphTable<'_>,
        lookahead: GlyphTable<'_>,
        lookup_records: &[SequenceLookup],
    ) -> bool {
        let mut match_positions = [0; MAX_CONTEXT_LENGTH];
        let (match_length, _) = match self.match_input(input, &mut match_positions) {
            Some(matched) => matched,
            None => return false,
        };

        if backtrack.is_empty() && lookahead.is_empty() {
            let idx = self.buffer.idx;
            self.buffer.unsafe_to_break(idx, idx + match_length);
        } else {
            let start = match self.match_backtrack(backtrack) {
                Some(start) => start,
                None => return false,
            };
            let end = match self.match_lookahead(lookahead, match_length) {
                Some(end) => end,
                None => return false,
            };
            self.buffer.unsafe_to_break_from_outbuffer(start, end);
        }

        self.apply_lookup(input.len() + 1, &mut match_positions, lookup_records, match_length);
        true
    }

    /// Apply the nested lookups of a matched rule, tracking how they change the length
    /// of the matched sequence.
    fn apply_lookup(
        &mut self,
        count: usize,
        match_positions: &mut [usize; MAX_CONTEXT_LENGTH],
        lookup_records: &[SequenceLookup],
        match_length: usize,
    ) {
        let mut count = count;
        let backtrack_len = self.buffer.backtrack_len();
        let mut end = backtrack_len + match_length;

        // From here on positions are indices into the output.
        let idx = self.buffer.idx;
        for position in &mut match_positions[..count] {
            *position = *position - idx + backtrack_len;
        }

        for record in lookup_records {
            let seq = usize::from(record.sequence_index);
            if seq >= count {
                continue;
            }
            // Don't recurse to ourselves at the same position.
            if seq == 0 && record.lookup_index == self.lookup_index {
                continue;
            }
            if !self.buffer.move_to(match_positions[seq]) {
                break;
            }
            if self.buffer.max_ops <= 0 {
                break;
            }

            let orig_len = self.buffer.backtrack_len() + self.buffer.lookahead_len();
            if !self.recurse(record.lookup_index) {
                continue;
            }
            let new_len = self.buffer.backtrack_len() + self.buffer.lookahead_len();
            let mut delta = new_len as isize - orig_len as isize;
            if delta == 0 {
                continue;
            }

            // Growth is assumed to happen right after the current position, shrinking
            // to remove the positions that follow it.
            let new_end = end as isize + delta;
            if new_end <= match_positions[seq] as isize {
                end = match_positions[seq];
                break;
            }
            end = new_end as usize;

            let mut next = seq + 1;
            if delta > 0 {
                if delta as usize + count > MAX_CONTEXT_LENGTH {
                    break;
                }
            } else {
                delta = delta.max(next as isize - count as isize);
                next = (next as isize - delta) as usize;
            }

            let dest = (next as isize + delta) as usize;
            match_positions.copy_within(next..count, dest);
            next = dest;
            count = (count as isize + delta) as usize;

            for j in seq + 1..next {
                match_positions[j] = match_positions[j - 1] + 1;
            }
            for position in &mut match_positions[next..count] {
                *position = (*position as isize + delta) as usize;
            }
        }

        self.buffer.move_to(end);
    }
}

/// The lookup flag, with the mark filtering set in the upper half when one is used.
pub(crate) fn lookup_props<T: LayoutTableType>(lookup: &Lookup<T>) -> u32 {
    let mut props = u32::from(lookup.lookup_flag.bits());
    if lookup.lookup_flag.contains(LookupFlag::USE_MARK_FILTERING_SET) {
        if let Some(set) = lookup.mark_filtering_set {
            props |= u32::from(set) << 16;
        }
    }
    props
}
