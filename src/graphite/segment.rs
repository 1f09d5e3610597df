//! A segment: the run of slots that Graphite passes transform.
//!
//! Slots live in an arena owned by the segment and refer to each other by index. The
//! `prev`/`next` links give the glyph order, while `parent`/`child`/`sibling` links form
//! the attachment forest used when positioning.

use rustc_hash::FxHashMap;

use super::feat::Features;
use super::machine::SlotMap;
use super::opcodes::{attr, metric};
use super::silf::SilfSubtable;
use super::slot::{collision, Slot, SlotCollision, SlotId};
use super::{GraphiteFace, Position, Rect};

/// Segments may grow to this many times the number of characters.
pub const MAX_SEG_GROWTH_FACTOR: usize = 64;

/// Deepest attachment chain followed while positioning.
const MAX_ATTACH_DEPTH: u32 = 100;

/// Bidi class of glyphs that stay after their base when slots are reversed.
const BIDI_CLASS_NSM: i8 = 16;

/// Per character information of a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharInfo {
    pub ch: u32,
    /// Index of the character in the input
    pub base: usize,
    /// First slot associated with the character, or -1
    pub before: i32,
    /// Last slot associated with the character, or -1
    pub after: i32,
    pub break_weight: i16,
    pub flags: u8,
    /// Index into the feature sets of the segment
    pub feature_index: u8,
}

#[derive(Debug, Clone)]
pub struct Segment<'f> {
    pub(crate) face: &'f GraphiteFace,
    pub(crate) silf: &'f SilfSubtable,
    pub(crate) slots: Vec<Slot>,
    pub(crate) first: Option<SlotId>,
    pub(crate) last: Option<SlotId>,
    free_slots: Vec<SlotId>,
    pub(crate) char_infos: Vec<CharInfo>,
    pub(crate) features: Vec<Features>,
    collisions: Option<FxHashMap<SlotId, SlotCollision>>,
    /// Bit 0: right-to-left. Bit 1: mirroring requested. Bit 6: slots are reversed.
    pub(crate) dir: u8,
    pub(crate) pass_bits: u32,
    pub(crate) num_glyphs: usize,
    pub(crate) advance: Position,
    num_user_attrs: usize,
}

impl<'f> Segment<'f> {
    pub fn new(face: &'f GraphiteFace, silf: &'f SilfSubtable, dir: u8, num_chars: usize) -> Self {
        Segment {
            face,
            silf,
            slots: Vec::with_capacity(num_chars),
            first: None,
            last: None,
            free_slots: Vec::new(),
            char_infos: Vec::with_capacity(num_chars),
            features: Vec::new(),
            collisions: None,
            dir,
            pass_bits: if silf.attr_skip_passes != 0 { !0 } else { 0 },
            num_glyphs: 0,
            advance: Position::default(),
            num_user_attrs: usize::from(silf.num_user_defn),
        }
    }

    /// Create a slot for each character, mapping characters to glyphs with `cmap` and
    /// falling back to the pseudo glyphs of the `Silf` subtable.
    pub fn read_text(
        &mut self,
        chars: &[u32],
        features: Features,
        cmap: impl Fn(u32) -> Option<u16>,
    ) {
        let feature_index = self.add_features(features);
        for (index, &ch) in chars.iter().enumerate() {
            let glyph_id = cmap(ch)
                .filter(|&glyph| glyph != 0)
                .or_else(|| self.silf.find_pseudo(ch))
                .unwrap_or(0);
            self.append_slot(index, ch, glyph_id, feature_index);
        }
    }

    fn add_features(&mut self, features: Features) -> u8 {
        match self.features.iter().position(|f| *f == features) {
            Some(index) => index as u8,
            None => {
                self.features.push(features);
                (self.features.len() - 1) as u8
            }
        }
    }

    fn append_slot(&mut self, index: usize, ch: u32, glyph_id: u16, feature_index: u8) {
        let Some(id) = self.new_slot() else {
            return;
        };
        let break_weight = self.face.glyph_attr(glyph_id, u16::from(self.silf.attr_break_weight));
        self.char_infos.push(CharInfo {
            ch,
            base: index,
            before: -1,
            after: -1,
            break_weight,
            flags: 0,
            feature_index,
        });
        self.set_glyph(id, glyph_id);
        let slot = &mut self.slots[id];
        slot.original = index;
        slot.before = index as i32;
        slot.after = index as i32;
        slot.prev = self.last;
        if let Some(last) = self.last {
            self.slots[last].next = Some(id);
        }
        self.last = Some(id);
        if self.first.is_none() {
            self.first = Some(id);
        }
        self.num_glyphs += 1;
    }

    /// Take a slot from the free list, or grow the arena. Fails once the segment has
    /// grown too far beyond its text.
    pub(crate) fn new_slot(&mut self) -> Option<SlotId> {
        match self.free_slots.pop() {
            Some(id) => {
                self.slots[id].next = None;
                Some(id)
            }
            None => {
                if self.num_glyphs > self.char_infos.len().max(1) * MAX_SEG_GROWTH_FACTOR {
                    return None;
                }
                self.slots.push(Slot::new(self.num_user_attrs));
                Some(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn free_slot(&mut self, id: SlotId) {
        if self.last == Some(id) {
            self.last = self.slots[id].prev;
        }
        if self.first == Some(id) {
            self.first = self.slots[id].next;
        }
        if let Some(parent) = self.slots[id].parent {
            self.remove_child(parent, id);
        }
        while let Some(child) = self.slots[id].child {
            if self.slots[child].parent == Some(id) {
                self.slots[child].parent = None;
                self.remove_child(id, child);
            } else {
                self.slots[id].child = None;
            }
        }
        self.slots[id].reset();
        if let Some(collisions) = self.collisions.as_mut() {
            collisions.remove(&id);
        }
        self.free_slots.push(id);
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id]
    }

    pub fn first(&self) -> Option<SlotId> {
        self.first
    }

    pub fn last(&self) -> Option<SlotId> {
        self.last
    }

    /// Slot ids in glyph order.
    pub fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        std::iter::successors(self.first, move |&id| self.slots[id].next)
    }

    pub fn slot_count(&self) -> usize {
        self.num_glyphs
    }

    pub fn char_info(&self, index: usize) -> Option<&CharInfo> {
        self.char_infos.get(index)
    }

    pub fn advance(&self) -> Position {
        self.advance
    }

    /// Whether the slots are currently in right-to-left order.
    pub fn currdir(&self) -> bool {
        ((self.dir >> 6) ^ self.dir) & 1 != 0
    }

    pub(crate) fn glyph_attr(&self, glyph_id: u16, attr: u16) -> i16 {
        self.face.glyph_attr(glyph_id, attr)
    }

    pub(crate) fn set_glyph(&mut self, id: SlotId, glyph_id: u16) {
        let face = self.face;
        let silf = self.silf;
        let slot = &mut self.slots[id];
        slot.glyph_id = glyph_id;
        slot.bidi_class = -1;
        if glyph_id >= face.num_glyphs() {
            slot.real_glyph_id = 0;
            slot.advance = Position::default();
            return;
        }
        let mut real = face.glyph_attr(glyph_id, u16::from(silf.attr_pseudo)) as u16;
        if real > face.num_glyphs() {
            real = 0;
        }
        slot.real_glyph_id = real;
        let shown = if real != 0 { real } else { glyph_id };
        slot.advance = Position::new(face.glyph(shown).map_or(0.0, |glyph| glyph.advance.x), 0.0);

        if silf.attr_skip_passes != 0 {
            let attr = u16::from(silf.attr_skip_passes);
            let mut bits = u32::from(face.glyph_attr(glyph_id, attr) as u16);
            if silf.num_passes > 16 {
                bits |= u32::from(face.glyph_attr(glyph_id, attr + 1) as u16) << 16;
            }
            self.pass_bits &= bits;
        }
    }

    pub(crate) fn feature(&self, feature_index: u8, feature: u8) -> i32 {
        self.features
            .get(usize::from(feature_index))
            .map_or(0, |features| i32::from(features.get(usize::from(feature))))
    }

    pub(crate) fn set_feature(&mut self, feature_index: u8, feature: u8, value: i32) {
        if let Some(features) = self.features.get_mut(usize::from(feature_index)) {
            features.set(usize::from(feature), value as i16);
        }
    }

    pub(crate) fn bidi_class(&mut self, id: SlotId) -> i8 {
        let slot = &self.slots[id];
        if slot.bidi_class != -1 {
            return slot.bidi_class;
        }
        let class = self.glyph_attr(slot.glyph_id, u16::from(self.silf.attr_directionality)) as i8;
        self.slots[id].bidi_class = class;
        class
    }

    /// Put the slots in the order given by `order`.
    fn relink(&mut self, order: &[SlotId]) {
        for (i, &id) in order.iter().enumerate() {
            let slot = &mut self.slots[id];
            slot.prev = i.checked_sub(1).map(|p| order[p]);
            slot.next = order.get(i + 1).copied();
        }
        self.first = order.first().copied();
        self.last = order.last().copied();
    }

    /// Reverse the order of the slots. Non-spacing marks keep following their base.
    pub fn reverse_slots(&mut self) {
        self.dir ^= 64;
        if self.first == self.last {
            return;
        }

        let order: Vec<SlotId> = self.iter().collect();
        let classes: Vec<i8> = order.iter().map(|&id| self.bidi_class(id)).collect();
        let lead = classes.iter().take_while(|&&c| c == BIDI_CLASS_NSM).count();
        if lead == order.len() {
            return;
        }

        let mut groups = Vec::new();
        let mut i = lead;
        while i < order.len() {
            let start = i;
            i += 1;
            while i < order.len() && classes[i] == BIDI_CLASS_NSM {
                i += 1;
            }
            groups.push(&order[start..i]);
        }
        let reversed: Vec<SlotId> = order[..lead]
            .iter()
            .chain(groups.iter().rev().flat_map(|group| group.iter()))
            .copied()
            .collect();
        self.relink(&reversed);
    }

    /// Replace glyphs by their mirrored forms.
    pub fn do_mirror(&mut self, mirror_attr: u8) {
        let ids: Vec<SlotId> = self.iter().collect();
        for id in ids {
            let glyph_id = self.slots[id].glyph_id;
            let mirrored = self.glyph_attr(glyph_id, u16::from(mirror_attr)) as u16;
            if mirrored != 0
                && (self.dir & 4 == 0 || self.glyph_attr(glyph_id, u16::from(mirror_attr) + 1) == 0)
            {
                self.set_glyph(id, mirrored);
            }
        }
    }

    /// Recompute the mapping between characters and slots for `num_chars` characters
    /// starting at `offset`, after substitution has finished.
    pub fn associate_chars(&mut self, offset: usize, num_chars: usize) {
        let end = (offset + num_chars).min(self.char_infos.len());
        for info in &mut self.char_infos[offset.min(end)..end] {
            info.before = -1;
            info.after = -1;
        }

        let ids: Vec<SlotId> = self.iter().collect();
        for (i, &id) in ids.iter().enumerate() {
            self.slots[id].index = i;
            let (before, after) = (self.slots[id].before, self.slots[id].after);
            if before < 0 {
                continue;
            }
            let i = i as i32;
            for j in before..=after {
                if let Some(info) = self.char_infos.get_mut(j as usize) {
                    if info.before == -1 || i < info.before {
                        info.before = i;
                    }
                    if info.after < i {
                        info.after = i;
                    }
                }
            }
        }

        let end = end as i32;
        let offset = offset as i32;
        for &id in &ids {
            let index = self.slots[id].index as i32;
            let mut a = self.slots[id].after + 1;
            while a < end && self.char_infos[a as usize].after < 0 {
                self.char_infos[a as usize].after = index;
                a += 1;
            }
            self.slots[id].after = a - 1;

            let mut a = self.slots[id].before - 1;
            while a >= offset && self.char_infos[a as usize].before < 0 {
                self.char_infos[a as usize].before = index;
                a -= 1;
            }
            self.slots[id].before = a + 1;
        }
    }

    /// Create the collision information of every slot from its glyph attributes.
    pub fn init_collisions(&mut self) {
        let base = u16::from(self.silf.attr_collisions);
        let mut collisions = FxHashMap::default();
        for id in self.iter() {
            let glyph_id = self.slots[id].glyph_id;
            let mut attrs = [0; 16];
            for (i, value) in attrs.iter_mut().enumerate() {
                *value = self.glyph_attr(glyph_id, base + i as u16);
            }
            collisions.insert(id, SlotCollision::from_attrs(&attrs));
        }
        self.collisions = Some(collisions);
    }

    pub fn has_collision_info(&self) -> bool {
        self.collisions.is_some()
    }

    pub fn collision(&self, id: SlotId) -> Option<&SlotCollision> {
        self.collisions.as_ref()?.get(&id)
    }

    pub(crate) fn collision_mut(&mut self, id: SlotId) -> Option<&mut SlotCollision> {
        self.collisions.as_mut()?.get_mut(&id)
    }

    /// Fold the shift found by collision avoidance into the collision offsets.
    pub fn collision_finish(&mut self) {
        if let Some(collisions) = self.collisions.as_mut() {
            for coll in collisions.values_mut() {
                if coll.shift != Position::default() {
                    coll.offset = coll.offset + coll.shift;
                    coll.shift = Position::default();
                }
            }
        }
    }

    pub(crate) fn find_root(&self, mut id: SlotId) -> SlotId {
        let mut depth = 0;
        while let Some(parent) = self.slots[id].parent {
            depth += 1;
            if depth > MAX_ATTACH_DEPTH {
                break;
            }
            id = parent;
        }
        id
    }

    pub(crate) fn glyph_metric(&mut self, id: SlotId, metric: u8, attr_level: u8, rtl: bool) -> i32 {
        if attr_level > 0 {
            let root = self.find_root(id);
            self.cluster_metric(root, metric, attr_level, rtl)
        } else {
            self.face.glyph_metric(self.slots[id].glyph_id, metric)
        }
    }

    fn cluster_metric(&mut self, id: SlotId, metric: u8, attr_level: u8, rtl: bool) -> i32 {
        let glyph = self.slots[id].glyph();
        let Some(glyph_face) = self.face.glyph(glyph) else {
            return 0;
        };
        let mut bbox = glyph_face.bbox;
        let mut cluster_min = 0.0;
        let res = self.finalise_slot(
            id,
            Position::default(),
            &mut bbox,
            attr_level,
            &mut cluster_min,
            rtl,
            false,
            0,
        );
        let value = match metric {
            metric::LSB | metric::BB_LEFT => bbox.bl.x,
            metric::RSB => res.x - bbox.tr.x,
            metric::BB_TOP => bbox.tr.y,
            metric::BB_BOTTOM => bbox.bl.y,
            metric::BB_RIGHT => bbox.tr.x,
            metric::BB_WIDTH => bbox.tr.x - bbox.bl.x,
            metric::BB_HEIGHT => bbox.tr.y - bbox.bl.y,
            metric::ADV_WIDTH => res.x,
            metric::ADV_HEIGHT => res.y,
            _ => 0.0,
        };
        value as i32
    }

    /// Compute the absolute positions of the slots from `start` to `end` inclusive, or of
    /// the whole segment. Returns the advance of the positioned run.
    pub fn position_slots(
        &mut self,
        mut start: Option<SlotId>,
        mut end: Option<SlotId>,
        is_rtl: bool,
        is_final: bool,
    ) -> Position {
        let mut currpos = Position::default();
        let mut cluster_min = 0.0;
        let mut bbox = Rect::default();
        let reorder = self.currdir() != is_rtl;

        if reorder {
            self.reverse_slots();
            std::mem::swap(&mut start, &mut end);
        }
        let start = start.or(self.first);
        let end = end.or(self.last);

        if let (Some(start), Some(end)) = (start, end) {
            let (from, stop) = if is_rtl {
                (end, self.slots[start].prev)
            } else {
                (start, self.slots[end].next)
            };
            let mut current = Some(from);
            while let Some(id) = current {
                if Some(id) == stop {
                    break;
                }
                if self.slots[id].is_base() {
                    cluster_min = currpos.x;
                    currpos = self.finalise_slot(
                        id,
                        currpos,
                        &mut bbox,
                        0,
                        &mut cluster_min,
                        is_rtl,
                        is_final,
                        0,
                    );
                }
                current = if is_rtl {
                    self.slots[id].prev
                } else {
                    self.slots[id].next
                };
            }
        }

        if reorder {
            self.reverse_slots();
        }
        currpos
    }

    #[allow(clippy::too_many_arguments)]
    fn finalise_slot(
        &mut self,
        id: SlotId,
        base: Position,
        bbox: &mut Rect,
        attr_level: u8,
        cluster_min: &mut f32,
        rtl: bool,
        is_final: bool,
        depth: u32,
    ) -> Position {
        let slot = &self.slots[id];
        if depth > MAX_ATTACH_DEPTH || (attr_level != 0 && slot.att_level > attr_level) {
            return Position::default();
        }
        let direction = if rtl { -1.0 } else { 1.0 };
        let mut shift = Position::new(slot.shift.x * direction + slot.just, slot.shift.y);
        let t_advance = slot.advance.x + slot.just;
        if is_final {
            if let Some(coll) = self.collision(id) {
                if coll.flags & collision::KERN == 0 || rtl {
                    shift = shift + coll.offset;
                }
            }
        }

        let slot = &self.slots[id];
        let (parent, child, sibling, advance) = (slot.parent, slot.child, slot.sibling, slot.advance);
        let mut position = base + shift;
        let mut res;
        if parent.is_none() {
            res = base + Position::new(t_advance, advance.y);
            *cluster_min = position.x;
        } else {
            position = position + (slot.attach - slot.with);
            let t_adv = if advance.x >= 0.5 {
                position.x + t_advance - shift.x
            } else {
                0.0
            };
            res = Position::new(t_adv, 0.0);
            if (advance.x >= 0.5 || position.x < 0.0) && position.x < *cluster_min {
                *cluster_min = position.x;
            }
        }
        if let Some(glyph) = self.face.glyph(slot.glyph()) {
            *bbox = bbox.widen(&glyph.bbox.translate(position));
        }
        self.slots[id].position = position;

        if let Some(child) = child {
            if child != id && self.slots[child].parent == Some(id) {
                let t_res = self.finalise_slot(
                    child,
                    position,
                    bbox,
                    attr_level,
                    cluster_min,
                    rtl,
                    is_final,
                    depth + 1,
                );
                if (parent.is_none() || advance.x >= 0.5) && t_res.x > res.x {
                    res = t_res;
                }
            }
        }

        if let (Some(parent), Some(sibling)) = (parent, sibling) {
            if sibling != id && self.slots[sibling].parent == Some(parent) {
                let t_res = self.finalise_slot(
                    sibling,
                    base,
                    bbox,
                    attr_level,
                    cluster_min,
                    rtl,
                    is_final,
                    depth + 1,
                );
                if t_res.x > res.x {
                    res = t_res;
                }
            }
        }

        if parent.is_none() && *cluster_min < base.x {
            let adj = Position::new(position.x - *cluster_min, 0.0);
            res = res + adj;
            self.slots[id].position = position + adj;
            if let Some(child) = child {
                self.flood_shift(child, adj, 0);
            }
        }
        res
    }

    fn flood_shift(&mut self, id: SlotId, adj: Position, depth: u32) {
        if depth > MAX_ATTACH_DEPTH {
            return;
        }
        self.slots[id].position = self.slots[id].position + adj;
        if let Some(child) = self.slots[id].child {
            self.flood_shift(child, adj, depth + 1);
        }
        if let Some(sibling) = self.slots[id].sibling {
            self.flood_shift(sibling, adj, depth + 1);
        }
    }

    /// Position the slots for output, and put them back in logical order when the passes
    /// left them reversed.
    pub fn finalise(&mut self, reverse: bool) {
        if self.first.is_none() || self.last.is_none() {
            return;
        }
        self.advance = self.position_slots(None, None, self.silf.is_rtl(), true);
        if reverse && self.currdir() != (self.dir & 1 != 0) {
            self.reverse_slots();
        }
    }

    /// Add `ap` to the children of `id`.
    pub(crate) fn add_child(&mut self, id: SlotId, ap: SlotId) -> bool {
        if id == ap {
            return false;
        }
        match self.slots[id].child {
            Some(child) if child == ap => true,
            Some(child) => self.add_sibling(child, ap),
            None => {
                self.slots[id].child = Some(ap);
                true
            }
        }
    }

    fn add_sibling(&mut self, mut id: SlotId, ap: SlotId) -> bool {
        loop {
            if id == ap {
                return false;
            }
            match self.slots[id].sibling {
                Some(sibling) if sibling == ap => return true,
                Some(sibling) => id = sibling,
                None => {
                    self.slots[id].sibling = Some(ap);
                    return true;
                }
            }
        }
    }

    pub(crate) fn remove_child(&mut self, id: SlotId, ap: SlotId) -> bool {
        if id == ap {
            return false;
        }
        match self.slots[id].child {
            None => false,
            Some(child) if child == ap => {
                self.slots[id].child = self.slots[child].sibling;
                self.slots[child].sibling = None;
                true
            }
            Some(child) => self.remove_sibling(child, ap),
        }
    }

    fn remove_sibling(&mut self, mut id: SlotId, ap: SlotId) -> bool {
        loop {
            if id == ap {
                return false;
            }
            match self.slots[id].sibling {
                None => return false,
                Some(sibling) if sibling == ap => {
                    self.slots[id].sibling = self.slots[sibling].sibling;
                    self.slots[sibling].sibling = None;
                    return true;
                }
                Some(sibling) => id = sibling,
            }
        }
    }

    /// Read slot attribute `attr` of slot `id`.
    pub(crate) fn slot_attr(&self, id: SlotId, attr: u8, subindex: u8) -> i32 {
        let slot = &self.slots[id];
        if is_justify_attr(attr) {
            return 0;
        }
        let coll = || self.collision(id);
        let coll_attr = |f: fn(&SlotCollision) -> f32| coll().map_or(0, |c| f(c) as i32);
        let char_info = self.char_infos.get(slot.original);
        match attr {
            attr::ADV_X => slot.advance.x as i32,
            attr::ADV_Y => slot.advance.y as i32,
            attr::ATT_TO => i32::from(slot.parent.is_some()),
            attr::ATT_X => slot.attach.x as i32,
            attr::ATT_Y => slot.attach.y as i32,
            attr::ATT_WITH_X => slot.with.x as i32,
            attr::ATT_WITH_Y => slot.with.y as i32,
            attr::ATT_LEVEL => i32::from(slot.att_level),
            attr::BREAK => char_info.map_or(0, |info| i32::from(info.break_weight)),
            attr::DIR => i32::from(self.dir & 1),
            attr::INSERT => i32::from(slot.can_insert_before()),
            attr::POS_X => slot.position.x as i32,
            attr::POS_Y => slot.position.y as i32,
            attr::SHIFT_X => slot.shift.x as i32,
            attr::SHIFT_Y => slot.shift.y as i32,
            attr::MEASURE_SOL | attr::MEASURE_EOL => -1,
            attr::J_WIDTH => slot.just as i32,
            attr::USER_DEFN_V1 => slot.user_attrs.first().map_or(0, |&v| i32::from(v)),
            attr::USER_DEFN => slot
                .user_attrs
                .get(usize::from(subindex))
                .map_or(0, |&v| i32::from(v)),
            attr::SEG_SPLIT => char_info.map_or(0, |info| i32::from(info.flags & 3)),
            attr::BIDI_LEVEL => i32::from(slot.bidi_level),
            attr::COL_FLAGS => coll().map_or(0, |c| i32::from(c.flags)),
            attr::COL_LIMIT_BLX => coll_attr(|c| c.limit.bl.x),
            attr::COL_LIMIT_BLY => coll_attr(|c| c.limit.bl.y),
            attr::COL_LIMIT_TRX => coll_attr(|c| c.limit.tr.x),
            attr::COL_LIMIT_TRY => coll_attr(|c| c.limit.tr.y),
            attr::COL_SHIFT_X => coll_attr(|c| c.offset.x),
            attr::COL_SHIFT_Y => coll_attr(|c| c.offset.y),
            attr::COL_MARGIN => coll_attr(|c| f32::from(c.margin)),
            attr::COL_MARGIN_WT => coll_attr(|c| f32::from(c.margin_weight)),
            attr::COL_EXCL_GLYPH => coll_attr(|c| f32::from(c.excl_glyph)),
            attr::COL_EXCL_OFF_X => coll_attr(|c| c.excl_offset.x),
            attr::COL_EXCL_OFF_Y => coll_attr(|c| c.excl_offset.y),
            attr::SEQ_CLASS => coll_attr(|c| f32::from(c.seq_class)),
            attr::SEQ_PROX_CLASS => coll_attr(|c| f32::from(c.seq_prox_class)),
            attr::SEQ_ORDER => coll_attr(|c| f32::from(c.seq_order)),
            attr::SEQ_ABOVE_X_OFF => coll_attr(|c| f32::from(c.seq_above_xoff)),
            attr::SEQ_ABOVE_WT => coll_attr(|c| f32::from(c.seq_above_weight)),
            attr::SEQ_BELOW_X_LIM => coll_attr(|c| f32::from(c.seq_below_xlim)),
            attr::SEQ_BELOW_WT => coll_attr(|c| f32::from(c.seq_below_weight)),
            attr::SEQ_VALIGN_HT => coll_attr(|c| f32::from(c.seq_valign_height)),
            attr::SEQ_VALIGN_WT => coll_attr(|c| f32::from(c.seq_valign_weight)),
            _ => 0,
        }
    }

    /// Write slot attribute `attr` of slot `id`. For `ATT_TO`, `value` indexes `map` and
    /// `subindex` is the position of slot `id` in the map.
    pub(crate) fn set_slot_attr(
        &mut self,
        id: SlotId,
        attr: u8,
        subindex: u8,
        value: i16,
        map: &SlotMap,
    ) {
        if is_justify_attr(attr) {
            return;
        }
        let v = f32::from(value);
        let original = self.slots[id].original;
        match attr {
            attr::ADV_X => self.slots[id].advance.x = v,
            attr::ADV_Y => self.slots[id].advance.y = v,
            attr::ATT_TO => self.attach_to_map_slot(id, usize::from(value as u16), subindex, map),
            attr::ATT_X => self.slots[id].attach.x = v,
            attr::ATT_Y => self.slots[id].attach.y = v,
            attr::ATT_WITH_X => self.slots[id].with.x = v,
            attr::ATT_WITH_Y => self.slots[id].with.y = v,
            attr::ATT_LEVEL => self.slots[id].att_level = value as u8,
            attr::BREAK => {
                if let Some(info) = self.char_infos.get_mut(original) {
                    info.break_weight = value;
                }
            }
            attr::INSERT => self.slots[id].mark_insert_before(value != 0),
            attr::SHIFT_X => self.slots[id].shift.x = v,
            attr::SHIFT_Y => self.slots[id].shift.y = v,
            attr::J_WIDTH => self.slots[id].just = v,
            attr::SEG_SPLIT => {
                if let Some(info) = self.char_infos.get_mut(original) {
                    info.flags |= (value & 3) as u8;
                }
            }
            attr::USER_DEFN_V1 | attr::USER_DEFN => {
                let index = if attr == attr::USER_DEFN_V1 {
                    0
                } else {
                    usize::from(subindex)
                };
                if let Some(user) = self.slots[id].user_attrs.get_mut(index) {
                    *user = value;
                }
            }
            attr::COL_FLAGS => {
                if let Some(coll) = self.collision_mut(id) {
                    coll.flags = value as u16;
                }
            }
            attr::COL_LIMIT_BLX..=attr::SEQ_VALIGN_WT => {
                if let Some(coll) = self.collision_mut(id) {
                    set_collision_attr(coll, attr, value);
                    coll.unknown();
                }
            }
            _ => {}
        }
    }

    fn attach_to_map_slot(&mut self, id: SlotId, idx: usize, subindex: u8, map: &SlotMap) {
        if idx >= map.size() {
            return;
        }
        let Some(other) = map.get(idx) else {
            return;
        };
        if other == id || Some(other) == self.slots[id].parent || self.slots[other].is_copied() {
            return;
        }
        if let Some(parent) = self.slots[id].parent {
            self.remove_child(parent, id);
            self.slots[id].parent = None;
        }

        let mut count = 0;
        let mut found_self = false;
        let mut p = Some(other);
        while let Some(s) = p {
            count += 1;
            if s == id {
                found_self = true;
            }
            if count >= MAX_ATTACH_DEPTH {
                break;
            }
            p = self.slots[s].parent;
        }
        let mut p = self.slots[id].child;
        while let (Some(s), true) = (p, count < MAX_ATTACH_DEPTH) {
            count += 1;
            p = self.slots[s].child;
        }
        let mut p = self.slots[id].sibling;
        while let (Some(s), true) = (p, count < MAX_ATTACH_DEPTH) {
            count += 1;
            p = self.slots[s].sibling;
        }

        if count < MAX_ATTACH_DEPTH && !found_self && self.add_child(other, id) {
            self.slots[id].parent = Some(other);
            if map.is_rtl() ^ (idx > usize::from(subindex)) {
                self.slots[id].with = Position::new(self.slots[id].advance.x, 0.0);
            } else {
                self.slots[id].attach = Position::new(self.slots[other].advance.x, 0.0);
            }
        }
    }

    /// Glyph ids of the slots, in order.
    pub fn glyphs(&self) -> Vec<u16> {
        self.iter().map(|id| self.slots[id].glyph()).collect()
    }
}

fn is_justify_attr(attr: u8) -> bool {
    (attr::J_STRETCH..attr::J_STRETCH + 20).contains(&attr) && attr != attr::J_WIDTH
}

fn set_collision_attr(coll: &mut SlotCollision, attr: u8, value: i16) {
    let v = f32::from(value);
    match attr {
        attr::COL_LIMIT_BLX => coll.limit.bl.x = v,
        attr::COL_LIMIT_BLY => coll.limit.bl.y = v,
        attr::COL_LIMIT_TRX => coll.limit.tr.x = v,
        attr::COL_LIMIT_TRY => coll.limit.tr.y = v,
        attr::COL_SHIFT_X => coll.offset.x = v,
        attr::COL_SHIFT_Y => coll.offset.y = v,
        attr::COL_MARGIN => coll.margin = value as u16,
        attr::COL_MARGIN_WT => coll.margin_weight = value as u16,
        attr::COL_EXCL_GLYPH => coll.excl_glyph = value as u16,
        attr::COL_EXCL_OFF_X => coll.excl_offset.x = v,
        attr::COL_EXCL_OFF_Y => coll.excl_offset.y = v,
        attr::SEQ_CLASS => coll.seq_class = value as u16,
        attr::SEQ_PROX_CLASS => coll.seq_prox_class = value as u16,
        attr::SEQ_ORDER => coll.seq_order = value as u16,
        attr::SEQ_ABOVE_X_OFF => coll.seq_above_xoff = value,
        attr::SEQ_ABOVE_WT => coll.seq_above_weight = value as u16,
        attr::SEQ_BELOW_X_LIM => coll.seq_below_xlim = value,
        attr::SEQ_BELOW_WT => coll.seq_below_weight = value as u16,
        attr::SEQ_VALIGN_HT => coll.seq_valign_height = value as u16,
        attr::SEQ_VALIGN_WT => coll.seq_valign_weight = value as u16,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphite::tests::{simple_face, simple_silf};

    fn segment<'f>(face: &'f GraphiteFace, chars: &[u32]) -> Segment<'f> {
        let silf = &face.silf.subtables[0];
        let mut seg = Segment::new(face, silf, 0, chars.len());
        seg.read_text(chars, Features::default(), |ch| Some(ch as u16));
        seg
    }

    #[test]
    fn read_text_links_slots() {
        let face = simple_face(simple_silf(Vec::new()));
        let seg = segment(&face, &[1, 2, 3]);
        assert_eq!(seg.slot_count(), 3);
        assert_eq!(seg.glyphs(), vec![1, 2, 3]);
        let last = seg.last().unwrap();
        assert_eq!(seg.slot(last).before(), 2);
        assert_eq!(seg.slot(last).prev, Some(1));
    }

    #[test]
    fn reverse_keeps_marks_after_base() {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, &[1, 2, 3, 4]);
        // glyph 3 is a non-spacing mark in the test face
        seg.reverse_slots();
        assert_eq!(seg.glyphs(), vec![4, 2, 3, 1]);
        assert!(seg.currdir());
        seg.reverse_slots();
        assert_eq!(seg.glyphs(), vec![1, 2, 3, 4]);
        assert!(!seg.currdir());
    }

    #[test]
    fn position_with_attachment() {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, &[1, 3, 2]);
        let ids: Vec<_> = seg.iter().collect();
        assert!(seg.add_child(ids[0], ids[1]));
        seg.slots[ids[1]].parent = Some(ids[0]);
        seg.slots[ids[1]].attach = Position::new(100.0, 0.0);
        seg.finalise(true);
        assert_eq!(seg.slot(ids[0]).position(), Position::new(0.0, 0.0));
        assert_eq!(seg.slot(ids[1]).position(), Position::new(100.0, 0.0));
        assert_eq!(seg.slot(ids[2]).position(), Position::new(500.0, 0.0));
        assert_eq!(seg.advance(), Position::new(1000.0, 0.0));
    }

    #[test]
    fn associate_chars_after_delete() {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, &[1, 2, 3]);
        let ids: Vec<_> = seg.iter().collect();
        // unlink the middle slot as a delete would
        seg.slots[ids[0]].next = Some(ids[2]);
        seg.slots[ids[2]].prev = Some(ids[0]);
        seg.associate_chars(0, 3);
        assert_eq!(seg.char_info(1).unwrap().before, 1);
        assert_eq!(seg.slot(ids[0]).after(), 1);
    }

    #[test]
    fn free_slot_is_reused() {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, &[1, 2]);
        let extra = seg.new_slot().unwrap();
        assert_eq!(extra, 2);
        seg.free_slot(extra);
        assert_eq!(seg.new_slot(), Some(2));
    }
}
