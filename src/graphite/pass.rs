//! Graphite passes: reading the state machine and rules of a pass, and applying them to
//! a segment.

use itertools::Itertools;
use log::{debug, warn};
use rustc_hash::FxHashMap;

use super::code::{Code, CodeContext};
use super::machine::{Machine, MachineStatus, SlotMap, MAX_SLOTS};
use super::segment::{Segment, MAX_SEG_GROWTH_FACTOR};
use super::silf::SilfSubtable;
use super::slot::SlotId;
use crate::binary::read::ReadScope;
use crate::binary::{U16Be, U8};
use crate::error::ParseError;

/// Most rules a state machine match can produce.
const MAX_RULES: usize = 128;

/// Largest sort key a rule may have.
const MAX_SORT: u16 = 63;

#[derive(Debug, Clone)]
pub struct Rule {
    pub constraint: Code,
    pub action: Code,
    /// Number of slots matched by the rule
    pub sort: u16,
    pub pre_context: u8,
}

#[derive(Debug, Clone)]
pub struct Pass {
    /// Number of collision avoidance runs
    pub num_coll_runs: u8,
    pub kern_colls: u8,
    pub reverse_dir: bool,
    pub max_rule_loop: u8,
    pub col_threshold: u8,
    /// Rules that failed to load are `None`
    pub rules: Vec<Option<Rule>>,
    pub constraint: Code,
    min_pre_context: u8,
    max_pre_context: u8,
    num_columns: u16,
    num_transitional: u16,
    success_start: u16,
    /// One past the highest glyph with a column
    num_glyphs: u16,
    columns: FxHashMap<u16, u16>,
    start_states: Vec<u16>,
    transitions: Vec<u16>,
    /// The rules of each success state, best first
    success_rules: Vec<Vec<u16>>,
}

impl Pass {
    /// Read a pass. Code offsets in the pass header are relative to the start of the
    /// `Silf` subtable, `subtable_scope`.
    pub fn read(
        subtable_scope: ReadScope<'_>,
        pass_data: ReadScope<'_>,
        pass_offset: usize,
        context: &CodeContext,
        _version: u32,
    ) -> Result<Pass, ParseError> {
        let mut ctxt = pass_data.ctxt();
        let flags = ctxt.read_u8()?;
        let max_rule_loop = ctxt.read_u8()?.max(1);
        let _max_context = ctxt.read_u8()?;
        let _max_backup = ctxt.read_u8()?;
        let num_rules = ctxt.read_u16be()?;
        let num_coll_runs = flags & 0x7;
        let kern_colls = (flags >> 3) & 0x3;
        ctxt.check(num_rules != 0 || num_coll_runs != 0)?;
        let _fsm_offset = ctxt.read_u16be()?;
        let pc_code = usize::try_from(ctxt.read_u32be()?)?;
        let rc_code = usize::try_from(ctxt.read_u32be()?)?;
        let a_code = usize::try_from(ctxt.read_u32be()?)?;
        let _debug_offset = ctxt.read_u32be()?;
        let num_states = ctxt.read_u16be()?;
        let num_transitional = ctxt.read_u16be()?;
        let num_success = ctxt.read_u16be()?;
        let num_columns = ctxt.read_u16be()?;
        let num_ranges = ctxt.read_u16be()?;
        ctxt.skip(6)?;

        ctxt.check(num_transitional <= num_states)?;
        ctxt.check(num_success <= num_states)?;
        ctxt.check(u32::from(num_success) + u32::from(num_transitional) >= u32::from(num_states))?;
        ctxt.check(num_rules == 0 || num_ranges != 0)?;
        ctxt.check(num_columns <= 0x7FFF)?;
        let success_start = num_states - num_success;

        let ranges = ctxt.read_array::<(U16Be, U16Be, U16Be)>(usize::from(num_ranges))?;
        let rule_map_offsets = ctxt
            .read_array::<U16Be>(usize::from(num_success) + 1)?
            .to_vec();
        let num_entries = rule_map_offsets.last().copied().map_or(0, usize::from);
        let rule_map = ctxt.read_array::<U16Be>(num_entries)?;
        let min_pre_context = ctxt.read_u8()?;
        let max_pre_context = ctxt.read_u8()?;
        ctxt.check(min_pre_context <= max_pre_context)?;
        let start_states = ctxt
            .read_array::<U16Be>(usize::from(max_pre_context - min_pre_context) + 1)?
            .to_vec();
        let sort_keys = ctxt.read_array::<U16Be>(usize::from(num_rules))?;
        let pre_contexts = ctxt.read_array::<U8>(usize::from(num_rules))?;
        let col_threshold = match ctxt.read_u8()? {
            0 => 10,
            threshold => threshold,
        };
        let pass_constraint_len = usize::from(ctxt.read_u16be()?);
        let constraint_offsets = ctxt.read_array::<U16Be>(usize::from(num_rules) + 1)?;
        let action_offsets = ctxt.read_array::<U16Be>(usize::from(num_rules) + 1)?;
        let transitions = ctxt
            .read_array::<U16Be>(usize::from(num_transitional) * usize::from(num_columns))?
            .to_vec();
        ctxt.skip(1)?;

        // The code blocks follow the state machine directly.
        let position = pass_offset + ctxt.position();
        ctxt.check(position == pc_code)?;
        ctxt.check(rc_code == pc_code + pass_constraint_len)?;
        let constraint_len = constraint_offsets.last().map_or(0, usize::from);
        ctxt.check(a_code == rc_code + constraint_len)?;
        let action_len = action_offsets.last().map_or(0, usize::from);
        ctxt.check(a_code - pass_offset + action_len <= pass_data.data().len())?;

        let pass_constraint = if pass_constraint_len > 0 {
            let bytecode = subtable_scope.offset_length(pc_code, pass_constraint_len)?;
            let pre_context = pre_contexts.get_item(0).unwrap_or(0);
            let sort = sort_keys.get_item(0).unwrap_or(0);
            Code::load(true, bytecode.data(), pre_context, sort, context).map_err(|err| {
                warn!("unable to load pass constraint: {}", err);
                ParseError::BadValue
            })?
        } else {
            Code::default()
        };

        let mut pass = Pass {
            num_coll_runs,
            kern_colls,
            reverse_dir: (flags >> 5) & 1 != 0,
            max_rule_loop,
            col_threshold,
            rules: Vec::new(),
            constraint: pass_constraint,
            min_pre_context,
            max_pre_context,
            num_columns,
            num_transitional,
            success_start,
            num_glyphs: 0,
            columns: FxHashMap::default(),
            start_states,
            transitions,
            success_rules: Vec::new(),
        };

        if num_rules > 0 {
            pass.read_ranges(ranges.iter())?;
            let constraint_code = subtable_scope.offset_length(rc_code, constraint_len)?.data();
            let action_code = subtable_scope.offset_length(a_code, action_len)?.data();
            pass.rules = read_rules(
                sort_keys.iter().collect(),
                pre_contexts.iter().collect(),
                constraint_offsets.iter().map(usize::from).collect(),
                action_offsets.iter().map(usize::from).collect(),
                constraint_code,
                action_code,
                (min_pre_context, max_pre_context),
                context,
            )?;
        }
        pass.read_states(num_states, &rule_map_offsets, &rule_map.to_vec())?;

        Ok(pass)
    }

    fn read_ranges(&mut self, ranges: impl Iterator<Item = (u16, u16, u16)>) -> Result<(), ParseError> {
        for (first, last, column) in ranges {
            if first > last || column >= self.num_columns {
                return Err(ParseError::BadValue);
            }
            for glyph in first..=last {
                // a glyph may only belong to one column
                if self.columns.insert(glyph, column).is_some() {
                    return Err(ParseError::BadValue);
                }
            }
            self.num_glyphs = self.num_glyphs.max(last.saturating_add(1));
        }
        Ok(())
    }

    fn read_states(
        &mut self,
        num_states: u16,
        rule_map_offsets: &[u16],
        rule_map: &[u16],
    ) -> Result<(), ParseError> {
        if self.start_states.iter().any(|&s| s >= num_states)
            || self.transitions.iter().any(|&s| s >= num_states)
        {
            return Err(ParseError::BadValue);
        }

        let success_rules = rule_map_offsets
            .windows(2)
            .map(|window| {
                let (begin, end) = (usize::from(window[0]), usize::from(window[1]));
                let entries = rule_map.get(begin..end).ok_or(ParseError::BadOffset)?;
                let mut rules = Vec::with_capacity(entries.len());
                for &rule in entries {
                    match self.rules.get(usize::from(rule)) {
                        Some(Some(_)) => rules.push(rule),
                        Some(None) => {}
                        None => return Err(ParseError::BadIndex),
                    }
                }
                rules.sort_by(|&a, &b| self.rule_order(a, b));
                rules.truncate(MAX_RULES);
                Ok(rules)
            })
            .collect::<Result<Vec<_>, ParseError>>()?;
        self.success_rules = success_rules;
        Ok(())
    }

    fn rule(&self, index: u16) -> Option<&Rule> {
        self.rules.get(usize::from(index)).and_then(Option::as_ref)
    }

    /// Longer rules are tried first, then rules in font order.
    fn rule_order(&self, a: u16, b: u16) -> std::cmp::Ordering {
        let sort = |index| self.rule(index).map_or(0, |rule| rule.sort);
        sort(b).cmp(&sort(a)).then(a.cmp(&b))
    }

    pub fn has_collisions(&self) -> bool {
        self.num_coll_runs != 0 || self.kern_colls != 0
    }

    /// Merge the rules of a success state into `rules`, keeping the order and dropping
    /// duplicates.
    fn accumulate_rules(&self, rules: &mut Vec<u16>, state: u16) {
        let Some(state_rules) = self.success_rules.get(usize::from(state - self.success_start))
        else {
            return;
        };
        if state_rules.is_empty() {
            return;
        }
        *rules = rules
            .iter()
            .copied()
            .merge_by(state_rules.iter().copied(), |&a, &b| {
                self.rule_order(a, b) != std::cmp::Ordering::Greater
            })
            .dedup()
            .take(MAX_RULES)
            .collect();
    }

    /// Run the state machine from `slot`, filling `map` with the slots it passes and
    /// `rules` with the candidate rules. Returns false if no rule can match.
    fn run_fsm(&self, seg: &Segment<'_>, map: &mut SlotMap, rules: &mut Vec<u16>, slot: SlotId) -> bool {
        rules.clear();
        let mut slot = slot;
        let mut ctxt = 0;
        while ctxt != usize::from(self.max_pre_context) {
            match seg.slot(slot).prev {
                Some(prev) => slot = prev,
                None => break,
            }
            ctxt += 1;
        }
        map.reset(seg.slot(slot).prev, ctxt);
        if ctxt < usize::from(self.min_pre_context) {
            return false;
        }

        let Some(&start) = self
            .start_states
            .get(usize::from(self.max_pre_context) - ctxt)
        else {
            return false;
        };
        let mut state = start;
        let mut free_slots = MAX_SLOTS;
        let mut current = Some(slot);
        while let Some(id) = current {
            map.push_slot(Some(id));
            let glyph = seg.slot(id).glyph_id;
            let column = match self.columns.get(&glyph) {
                Some(&column) if glyph < self.num_glyphs => column,
                _ => return free_slots != 0,
            };
            free_slots -= 1;
            if free_slots == 0 || state >= self.num_transitional {
                return free_slots != 0;
            }

            let row = usize::from(state) * usize::from(self.num_columns);
            state = self
                .transitions
                .get(row + usize::from(column))
                .copied()
                .unwrap_or(0);
            if state >= self.success_start {
                self.accumulate_rules(rules, state);
            }
            current = seg.slot(id).next;
            if state == 0 {
                break;
            }
        }

        map.push_slot(current);
        true
    }

    /// Whether the constraint of `rule` holds for the slots in `map`.
    fn test_constraint(
        &self,
        rule: &Rule,
        seg: &mut Segment<'_>,
        map: &mut SlotMap,
        machine: &mut Machine,
    ) -> Result<bool, MachineStatus> {
        let curr_context = map.pre_context as isize;
        let offset = curr_context - isize::from(rule.pre_context);
        if offset < 0 || offset + rule.sort as isize > map.size() as isize {
            return Ok(false);
        }
        let mut pos = 1 + offset as usize;
        if map.at(pos + usize::from(rule.sort) - 1).is_none() {
            return Ok(false);
        }
        if rule.constraint.is_empty() {
            return Ok(true);
        }

        for _ in 0..rule.sort {
            if map.at(pos).is_some() {
                let mut run_pos = pos;
                if machine.run(&rule.constraint, seg, map, &mut run_pos)? == 0 {
                    return Ok(false);
                }
            }
            pos += 1;
        }
        Ok(true)
    }

    /// Run `code` as the action of a rule. Returns the slot the action finished on and
    /// the number of slots to advance from it.
    fn do_action(
        &self,
        code: &Code,
        seg: &mut Segment<'_>,
        map: &mut SlotMap,
        machine: &mut Machine,
    ) -> Result<(Option<SlotId>, i32), MachineStatus> {
        let mut pos = map.pre_context + 1;
        map.highpassed = false;
        match machine.run(code, seg, map, &mut pos) {
            Ok(advance) => Ok((map.at(pos), advance)),
            Err(status) => {
                map.highwater = None;
                Err(status)
            }
        }
    }

    fn find_and_do_rule(
        &self,
        slot: &mut Option<SlotId>,
        seg: &mut Segment<'_>,
        map: &mut SlotMap,
        machine: &mut Machine,
        rules: &mut Vec<u16>,
    ) -> Result<(), MachineStatus> {
        let Some(current) = *slot else {
            return Ok(());
        };

        if self.run_fsm(seg, map, rules, current) {
            let mut found = None;
            for &index in rules.iter() {
                let Some(rule) = self.rule(index) else {
                    continue;
                };
                if self.test_constraint(rule, seg, map, machine)? {
                    found = Some(rule);
                    break;
                }
            }

            if let Some(rule) = found {
                if !rule.action.is_empty() {
                    let (slot_out, advance) = self.do_action(&rule.action, seg, map, machine)?;
                    *slot = slot_out;
                    if rule.action.deletes() {
                        map.collect_garbage(seg, slot);
                    }
                    adjust_slot(advance, slot, seg, map);
                    return Ok(());
                }
            }
        }

        *slot = seg.slot(current).next;
        Ok(())
    }

    /// Whether the pass should run. A constraint that fails to run skips the pass.
    fn test_pass_constraint(
        &self,
        seg: &mut Segment<'_>,
        map: &mut SlotMap,
        machine: &mut Machine,
    ) -> bool {
        if self.constraint.is_empty() {
            return true;
        }
        let first = seg.first();
        map.reset(first.and_then(|first| seg.slot(first).prev), 0);
        map.push_slot(first);
        let mut pos = 1;
        matches!(machine.run(&self.constraint, seg, map, &mut pos), Ok(value) if value != 0)
    }

    /// Apply the pass to `seg`.
    pub fn run_graphite(
        &self,
        seg: &mut Segment<'_>,
        map: &mut SlotMap,
        machine: &mut Machine,
        reverse: bool,
    ) -> Result<(), MachineStatus> {
        let mut slot = seg.first();
        if slot.is_none() || !self.test_pass_constraint(seg, map, machine) {
            return Ok(());
        }
        if reverse {
            seg.reverse_slots();
            slot = seg.first();
        }

        if self.rules.iter().any(Option::is_some) {
            let mut rules = Vec::with_capacity(MAX_RULES);
            map.highwater = slot.and_then(|s| seg.slot(s).next);
            let mut loop_count = self.max_rule_loop;
            while slot.is_some() {
                self.find_and_do_rule(&mut slot, seg, map, machine, &mut rules)?;
                if let Some(s) = slot {
                    let at_highwater = Some(s) == map.highwater || map.highpassed;
                    if !at_highwater {
                        loop_count -= 1;
                    }
                    if at_highwater || loop_count == 0 {
                        if loop_count == 0 {
                            slot = map.highwater;
                        }
                        loop_count = self.max_rule_loop;
                        if let Some(s) = slot {
                            map.highwater = seg.slot(s).next;
                        }
                    }
                }
            }
        }

        // Shifting and kerning collisions apart is not done; only the offsets already
        // recorded are kept.
        if self.has_collisions() && seg.has_collision_info() {
            seg.collision_finish();
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn read_rules(
    sort_keys: Vec<u16>,
    pre_contexts: Vec<u8>,
    constraint_offsets: Vec<usize>,
    action_offsets: Vec<usize>,
    constraint_code: &[u8],
    action_code: &[u8],
    (min_pre_context, max_pre_context): (u8, u8),
    context: &CodeContext,
) -> Result<Vec<Option<Rule>>, ParseError> {
    let num_rules = sort_keys.len();
    let mut rules = vec![None; num_rules];
    // Rules are read last to first: a rule's code ends where the next non-empty code
    // begins.
    let mut action_end = action_offsets[num_rules];
    let mut constraint_end = constraint_offsets[num_rules];
    for index in (0..num_rules).rev() {
        let sort = sort_keys[index];
        let pre_context = pre_contexts[index];
        if sort > MAX_SORT
            || u16::from(pre_context) >= sort
            || pre_context > max_pre_context
            || pre_context < min_pre_context
        {
            return Err(ParseError::BadValue);
        }

        let action_begin = action_offsets[index];
        let constraint_begin = match constraint_offsets[index] {
            0 => constraint_end,
            offset => offset,
        };
        if action_begin > action_end || constraint_begin > constraint_end {
            return Err(ParseError::BadOffset);
        }
        let action = action_code
            .get(action_begin..action_end)
            .ok_or(ParseError::BadOffset)?;
        let constraint = constraint_code
            .get(constraint_begin..constraint_end)
            .ok_or(ParseError::BadOffset)?;
        action_end = action_begin;
        constraint_end = constraint_begin;

        let loaded = Code::load(false, action, pre_context, sort, context).and_then(|action| {
            let constraint = Code::load(true, constraint, pre_context, sort, context)?;
            Ok(Rule {
                constraint,
                action,
                sort,
                pre_context,
            })
        });
        match loaded {
            Ok(rule) => rules[index] = Some(rule),
            Err(err) => warn!("dropping Graphite rule {}: {}", index, err),
        }
    }
    Ok(rules)
}

/// Move `slot` by `delta` slots after an action has run, tracking the high water mark.
fn adjust_slot(mut delta: i32, slot: &mut Option<SlotId>, seg: &Segment<'_>, map: &mut SlotMap) {
    if slot.is_none() {
        if map.highpassed || map.highwater.is_none() {
            *slot = seg.last();
            delta += 1;
            if map.highwater.is_none() || map.highwater == *slot {
                map.highpassed = false;
            }
        } else {
            *slot = seg.first();
            delta -= 1;
        }
    }

    while delta < 0 {
        let Some(s) = *slot else {
            break;
        };
        *slot = seg.slot(s).prev;
        if map.highpassed && map.highwater == *slot {
            map.highpassed = false;
        }
        delta += 1;
    }
    while delta > 0 {
        let Some(s) = *slot else {
            break;
        };
        if map.highwater == Some(s) {
            map.highpassed = true;
        }
        *slot = seg.slot(s).next;
        delta -= 1;
    }
}

/// Run passes `first..last` of `silf` over `seg`. Bidi reordering and mirroring happen
/// at the bidi pass when `dobidi` is set. A pass whose program fails is undone and
/// shaping carries on with the next pass.
pub fn run_passes(silf: &SilfSubtable, seg: &mut Segment<'_>, first: u8, last: u8, dobidi: bool) {
    let max_size = seg.slot_count() * MAX_SEG_GROWTH_FACTOR;
    let mut map = SlotMap::new(silf.is_rtl(), max_size);
    let mut machine = Machine::new();
    let mut lbidi = silf.bidi_pass;
    let mut last = last;

    if last == 0 {
        if first == last && lbidi == 0xFF {
            return;
        }
        last = silf.num_passes;
    }
    if (first < lbidi || (dobidi && first == lbidi))
        && (last >= lbidi || (dobidi && u16::from(last) + 1 == u16::from(lbidi)))
    {
        last += 1;
    } else {
        lbidi = 0xFF;
    }

    let mut i = first;
    while i < last {
        if i == lbidi {
            if seg.currdir() != silf.is_rtl() {
                seg.reverse_slots();
            }
            if silf.attr_mirroring != 0 && seg.dir & 3 == 3 {
                seg.do_mirror(silf.attr_mirroring);
            }
            lbidi = last;
            last -= 1;
            continue;
        }

        let index = usize::from(i);
        i += 1;
        let Some(pass) = silf.passes.get(index) else {
            continue;
        };
        let pass_dir = silf.dir & 1 != 0;
        let reverse = lbidi == 0xFF && seg.currdir() != (pass_dir ^ pass.reverse_dir);
        let enabled = index >= 32 || seg.pass_bits & (1 << index) == 0 || pass.has_collisions();
        if !enabled {
            continue;
        }

        debug!("running Graphite pass {}", index);
        let snapshot = seg.clone();
        if let Err(status) = pass.run_graphite(seg, &mut map, &mut machine, reverse) {
            warn!("Graphite pass {} discarded: {}", index, status);
            *seg = snapshot;
        } else if seg.slot_count() > max_size {
            warn!("Graphite pass {} grew the segment too far", index);
            *seg = snapshot;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graphite::code::PassType;
    use crate::graphite::feat::Features;
    use crate::graphite::tests::{simple_face, simple_silf};

    fn context() -> CodeContext {
        CodeContext {
            num_classes: 1,
            num_glyph_attrs: 4,
            num_features: 0,
            num_user_attrs: 0,
            pass_type: PassType::Substitution,
        }
    }

    fn rule(sort: u16) -> Option<Rule> {
        Some(Rule {
            constraint: Code::default(),
            action: Code::default(),
            sort,
            pre_context: 0,
        })
    }

    fn pass_with_rules(rules: Vec<Option<Rule>>, success_rules: Vec<Vec<u16>>) -> Pass {
        Pass {
            num_coll_runs: 0,
            kern_colls: 0,
            reverse_dir: false,
            max_rule_loop: 1,
            col_threshold: 10,
            rules,
            constraint: Code::default(),
            min_pre_context: 0,
            max_pre_context: 0,
            num_columns: 1,
            num_transitional: 1,
            success_start: 1,
            num_glyphs: 0,
            columns: FxHashMap::default(),
            start_states: vec![0],
            transitions: vec![1],
            success_rules,
        }
    }

    /// A pass with one rule that replaces glyph 1 with the first glyph of class 0.
    pub(crate) fn substitution_pass() -> Pass {
        // PUT_GLYPH class 0, RET_TRUE
        let action = Code::load(false, &[59, 0, 0, 50], 0, 1, &context()).unwrap();
        let rule = Rule {
            constraint: Code::default(),
            action,
            sort: 1,
            pre_context: 0,
        };
        let mut pass = pass_with_rules(vec![Some(rule)], vec![vec![0]]);
        pass.num_glyphs = 2;
        pass.columns.insert(1, 0);
        pass
    }

    #[test]
    fn substitution_pass_replaces_every_match() {
        let face = simple_face(simple_silf(vec![substitution_pass()]));
        let silf = &face.silf.subtables[0];
        let mut seg = Segment::new(&face, silf, 0, 3);
        seg.read_text(&[1, 2, 1], Features::default(), |ch| Some(ch as u16));
        run_passes(silf, &mut seg, 0, 1, false);
        assert_eq!(seg.glyphs(), vec![5, 2, 5]);
    }

    #[test]
    fn accumulate_merges_in_order() {
        let pass = pass_with_rules(
            vec![rule(1), rule(2), rule(2), rule(1)],
            vec![vec![1, 0], vec![1, 2, 3]],
        );
        let mut rules = Vec::new();
        pass.accumulate_rules(&mut rules, 1);
        assert_eq!(rules, vec![1, 0]);
        pass.accumulate_rules(&mut rules, 2);
        assert_eq!(rules, vec![1, 2, 0, 3]);
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let mut pass = pass_with_rules(Vec::new(), Vec::new());
        pass.num_columns = 2;
        let ranges = [(1, 5, 0), (5, 6, 1)];
        assert_eq!(
            pass.read_ranges(ranges.iter().copied()),
            Err(ParseError::BadValue)
        );
    }

    #[test]
    fn range_column_out_of_bounds() {
        let mut pass = pass_with_rules(Vec::new(), Vec::new());
        assert_eq!(
            pass.read_ranges([(1, 2, 1)].iter().copied()),
            Err(ParseError::BadValue)
        );
        assert_eq!(
            pass.read_ranges([(3, 2, 0)].iter().copied()),
            Err(ParseError::BadValue)
        );
        assert_eq!(pass.read_ranges([(1, 2, 0)].iter().copied()), Ok(()));
        assert_eq!(pass.num_glyphs, 3);
    }

    #[test]
    fn bad_rule_is_dropped() {
        // rule 0 has an invalid opcode, rule 1 is empty
        let rules = read_rules(
            vec![1, 1],
            vec![0, 0],
            vec![0, 0, 0],
            vec![0, 1, 1],
            &[],
            &[200],
            (0, 0),
            &context(),
        )
        .unwrap();
        assert!(rules[0].is_none());
        assert!(rules[1].is_some());
    }

    #[test]
    fn rule_sort_limits() {
        let rules = read_rules(
            vec![64],
            vec![0],
            vec![0, 0],
            vec![0, 0],
            &[],
            &[],
            (0, 0),
            &context(),
        );
        assert!(rules.is_err());
        // the pre-context must be shorter than the rule
        let rules = read_rules(
            vec![1],
            vec![1],
            vec![0, 0],
            vec![0, 0],
            &[],
            &[],
            (0, 1),
            &context(),
        );
        assert!(rules.is_err());
    }
}
