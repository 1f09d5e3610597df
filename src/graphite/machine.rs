//! The Graphite stack machine.
//!
//! Runs a loaded [Code] program against a window of slots, the [SlotMap], that the
//! pass engine fills while matching rules.

use std::fmt;

use super::code::{Code, Instr};
use super::opcodes::{attr, Opcode};
use super::segment::Segment;
use super::slot::SlotId;

/// Number of slots a rule can match.
pub const MAX_SLOTS: usize = 64;

const STACK_MAX: usize = 1024;

/// Value pushed by `PUSH_VERSION`.
const ENGINE_VERSION: i32 = 0x0003_0000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MachineStatus {
    Finished,
    StackUnderflow,
    StackNotEmpty,
    StackOverflow,
    SlotOffsetOutBounds,
    DiedEarly,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineStatus::Finished => write!(f, "finished"),
            MachineStatus::StackUnderflow => write!(f, "stack underflow"),
            MachineStatus::StackNotEmpty => write!(f, "stack not empty"),
            MachineStatus::StackOverflow => write!(f, "stack overflow"),
            MachineStatus::SlotOffsetOutBounds => write!(f, "slot offset out of bounds"),
            MachineStatus::DiedEarly => write!(f, "died early"),
        }
    }
}

impl std::error::Error for MachineStatus {}

/// The window of slots a rule is matched against.
///
/// Entry 0 holds the slot before the window. Entries `1..=size` hold the slots pushed by
/// the state machine, the first `pre_context` of which precede the slot the rule applies
/// to.
#[derive(Debug, Clone)]
pub struct SlotMap {
    slots: Vec<Option<SlotId>>,
    size: usize,
    pub(crate) pre_context: usize,
    pub(crate) highwater: Option<SlotId>,
    pub(crate) highpassed: bool,
    max_size: i32,
    rtl: bool,
}

impl SlotMap {
    pub fn new(rtl: bool, max_size: usize) -> Self {
        SlotMap {
            slots: vec![None; MAX_SLOTS + 3],
            size: 0,
            pre_context: 0,
            highwater: None,
            highpassed: false,
            max_size: i32::try_from(max_size).unwrap_or(i32::MAX),
            rtl,
        }
    }

    /// Empty the map, starting a new window after `prev`.
    pub(crate) fn reset(&mut self, prev: Option<SlotId>, pre_context: usize) {
        self.size = 0;
        self.pre_context = pre_context;
        self.slots[0] = prev;
    }

    pub(crate) fn push_slot(&mut self, slot: Option<SlotId>) {
        if self.size + 1 < self.slots.len() {
            self.size += 1;
            self.slots[self.size] = slot;
        }
    }

    /// Number of slots in the window.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_rtl(&self) -> bool {
        self.rtl
    }

    /// The slot at `index` within the window.
    pub fn get(&self, index: usize) -> Option<SlotId> {
        self.slots.get(index + 1).copied().flatten()
    }

    /// The entry at absolute position `pos`, where position 0 is the slot before the window.
    pub(crate) fn at(&self, pos: usize) -> Option<SlotId> {
        self.slots.get(pos).copied().flatten()
    }

    fn set_at(&mut self, pos: usize, slot: Option<SlotId>) {
        if let Some(entry) = self.slots.get_mut(pos) {
            *entry = slot;
        }
    }

    /// Reduce the remaining growth allowance of the segment, returning what is left.
    pub(crate) fn dec_max(&mut self) -> i32 {
        self.max_size -= 1;
        self.max_size
    }

    /// Free slots in the window that were deleted or left behind as copies. `slot` is
    /// moved off any slot that is freed.
    pub(crate) fn collect_garbage(&mut self, seg: &mut Segment<'_>, slot: &mut Option<SlotId>) {
        for pos in 1..self.size {
            let Some(id) = self.slots[pos] else {
                continue;
            };
            let s = seg.slot(id);
            if s.is_deleted() || s.is_copied() {
                if *slot == Some(id) {
                    *slot = s.prev.or(s.next);
                }
                seg.free_slot(id);
            }
        }
    }
}

struct Regs<'a, 'f> {
    seg: &'a mut Segment<'f>,
    map: &'a mut SlotMap,
    /// Absolute position of the current slot in `map`
    pos: usize,
    /// The current slot
    is: Option<SlotId>,
    /// Absolute position of the slot the rule applies to
    mapb: usize,
    rtl: bool,
    positioned: bool,
}

impl Regs<'_, '_> {
    fn slot_at(&self, offset: i8) -> Option<SlotId> {
        let pos = self.pos as isize + isize::from(offset);
        usize::try_from(pos).ok().and_then(|pos| self.map.at(pos))
    }

    /// Position the window before reading or adjusting positions.
    fn ensure_positioned(&mut self, slat: u8) {
        if (slat == attr::POS_X || slat == attr::POS_Y) && !self.positioned {
            let first = self.map.at(1);
            let last = self.map.at(self.map.size());
            let rtl = self.seg.currdir();
            self.seg.position_slots(first, last, rtl, true);
            self.positioned = true;
        }
    }
}

/// Result of executing one instruction.
enum Flow {
    Continue,
    Return,
}

#[derive(Debug)]
pub struct Machine {
    stack: Vec<i32>,
    status: MachineStatus,
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Machine {
            stack: Vec::with_capacity(STACK_MAX),
            status: MachineStatus::Finished,
        }
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    /// Run `code` with the current slot at absolute position `pos` of `map`. On return
    /// `pos` holds the position the program finished at.
    pub fn run(
        &mut self,
        code: &Code,
        seg: &mut Segment<'_>,
        map: &mut SlotMap,
        pos: &mut usize,
    ) -> Result<i32, MachineStatus> {
        self.stack.clear();
        self.status = MachineStatus::Finished;
        if *pos as i32 - 1 + code.max_ref >= map.size() as i32 {
            self.status = MachineStatus::SlotOffsetOutBounds;
            return Err(self.status);
        }

        let mut regs = Regs {
            is: map.at(*pos),
            mapb: 1 + map.pre_context,
            pos: *pos,
            rtl: map.is_rtl(),
            positioned: false,
            seg,
            map,
        };
        let mut ip = 0;
        let mut died = None;
        while let Some(instr) = code.instrs.get(ip) {
            ip += 1;
            match self.execute(instr, &mut regs, &mut ip) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return) => break,
                Err(status) => {
                    if status == MachineStatus::DiedEarly {
                        regs.is = regs.seg.last();
                    }
                    died = Some(status);
                    break;
                }
            }
        }

        *pos = regs.pos;
        regs.map.set_at(regs.pos, regs.is);

        self.status = match died {
            Some(status) => status,
            None if self.stack.is_empty() => MachineStatus::StackUnderflow,
            None if self.stack.len() >= STACK_MAX => MachineStatus::StackOverflow,
            None if self.stack.len() > 1 => MachineStatus::StackNotEmpty,
            None => MachineStatus::Finished,
        };
        match self.status {
            MachineStatus::Finished => Ok(self.stack[0]),
            status => Err(status),
        }
    }

    fn push(&mut self, value: i32) -> Result<(), MachineStatus> {
        if self.stack.len() >= STACK_MAX {
            return Err(MachineStatus::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, MachineStatus> {
        self.stack.pop().ok_or(MachineStatus::StackUnderflow)
    }

    fn top(&mut self) -> Result<&mut i32, MachineStatus> {
        self.stack.last_mut().ok_or(MachineStatus::StackUnderflow)
    }

    fn binop(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<Flow, MachineStatus> {
        let b = self.pop()?;
        let a = self.top()?;
        *a = f(*a, b);
        Ok(Flow::Continue)
    }

    fn unop(&mut self, f: impl FnOnce(i32) -> i32) -> Result<Flow, MachineStatus> {
        let a = self.top()?;
        *a = f(*a);
        Ok(Flow::Continue)
    }

    fn execute(
        &mut self,
        instr: &Instr,
        regs: &mut Regs<'_, '_>,
        ip: &mut usize,
    ) -> Result<Flow, MachineStatus> {
        use Opcode::*;
        const DIE: MachineStatus = MachineStatus::DiedEarly;

        match instr.opcode {
            Nop => {}
            PushByte => self.push(i32::from(instr.arg_i8(0)))?,
            PushByteU => self.push(i32::from(instr.arg_u8(0)))?,
            PushShort => self.push(i32::from(instr.arg_u16(0) as i16))?,
            PushShortU => self.push(i32::from(instr.arg_u16(0)))?,
            PushLong => {
                let value = (u32::from(instr.arg_u16(0)) << 16) | u32::from(instr.arg_u16(2));
                self.push(value as i32)?
            }
            Add => return self.binop(i32::wrapping_add),
            Sub => return self.binop(i32::wrapping_sub),
            Mul => return self.binop(i32::wrapping_mul),
            Div => {
                let b = self.pop()?;
                let a = self.top()?;
                if b == 0 || (*a == i32::MIN && b == -1) {
                    return Err(DIE);
                }
                *a /= b;
            }
            Min => return self.binop(i32::min),
            Max => return self.binop(i32::max),
            Neg => return self.unop(i32::wrapping_neg),
            Trunc8 => return self.unop(|a| a & 0xFF),
            Trunc16 => return self.unop(|a| a & 0xFFFF),
            Cond => {
                let f = self.pop()?;
                let t = self.pop()?;
                let c = self.top()?;
                *c = if *c != 0 { t } else { f };
            }
            And => return self.binop(|a, b| i32::from(a != 0 && b != 0)),
            Or => return self.binop(|a, b| i32::from(a != 0 || b != 0)),
            Not => return self.unop(|a| i32::from(a == 0)),
            Equal => return self.binop(|a, b| i32::from(a == b)),
            NotEq => return self.binop(|a, b| i32::from(a != b)),
            Less => return self.binop(|a, b| i32::from(a < b)),
            Gtr => return self.binop(|a, b| i32::from(a > b)),
            LessEq => return self.binop(|a, b| i32::from(a <= b)),
            GtrEq => return self.binop(|a, b| i32::from(a >= b)),
            BitOr => return self.binop(|a, b| a | b),
            BitAnd => return self.binop(|a, b| a & b),
            BitNot => return self.unop(|a| !a),
            BitSet => {
                let mask = i32::from(instr.arg_u16(0));
                let value = i32::from(instr.arg_u16(2));
                return self.unop(|a| (a & !mask) | value);
            }
            Next => {
                if regs.pos > regs.map.size() {
                    return Err(DIE);
                }
                if let Some(is) = regs.is {
                    if regs.map.highwater == Some(is) {
                        regs.map.highpassed = true;
                    }
                    regs.is = regs.seg.slot(is).next;
                }
                regs.pos += 1;
            }
            CopyNext => {
                if let Some(is) = regs.is {
                    regs.is = regs.seg.slot(is).next;
                }
                regs.pos += 1;
            }
            NextN | PushIGlyphAttr | PutSubs2 | PutSubs3 => return Err(DIE),
            PutGlyph8bitObs | PutGlyph => {
                let class = if instr.opcode == PutGlyph {
                    instr.arg_u16(0)
                } else {
                    u16::from(instr.arg_u8(0))
                };
                let is = regs.is.ok_or(DIE)?;
                let silf = regs.seg.silf;
                let glyph = silf.class_map.glyph(class, 0);
                regs.seg.set_glyph(is, glyph);
            }
            PutSubs8bitObs | PutSubs => {
                let (input, output) = if instr.opcode == PutSubs {
                    (instr.arg_u16(1), instr.arg_u16(3))
                } else {
                    (u16::from(instr.arg_u8(1)), u16::from(instr.arg_u8(2)))
                };
                if let Some(slot) = regs.slot_at(instr.arg_i8(0)) {
                    let is = regs.is.ok_or(DIE)?;
                    let silf = regs.seg.silf;
                    let class_map = &silf.class_map;
                    let index = class_map.find_index(input, regs.seg.slot(slot).glyph_id);
                    let glyph = class_map.glyph(output, index);
                    regs.seg.set_glyph(is, glyph);
                }
            }
            PutCopy => put_copy(regs, instr.arg_i8(0))?,
            Insert => insert(regs)?,
            Delete => delete(regs)?,
            Assoc => {
                let count = usize::from(instr.arg_u8(0));
                let mut min = -1;
                let mut max = -1;
                for i in 0..count {
                    if let Some(slot) = regs.slot_at(instr.arg_i8(i + 1)) {
                        let slot = regs.seg.slot(slot);
                        if min == -1 || slot.before < min {
                            min = slot.before;
                        }
                        if slot.after > max {
                            max = slot.after;
                        }
                    }
                }
                if min > -1 {
                    let is = regs.is.ok_or(DIE)?;
                    let slot = &mut regs.seg.slots[is];
                    slot.before = min;
                    slot.after = max;
                }
            }
            CntxtItem => {
                let target = regs.mapb as isize + isize::from(instr.arg_i8(0));
                if target != regs.pos as isize {
                    *ip += usize::from(instr.arg_u8(1));
                    self.push(1)?;
                }
            }
            AttrSet | IAttrSet => {
                let slat = instr.arg_u8(0);
                let subindex = if instr.opcode == IAttrSet {
                    instr.arg_u8(1)
                } else {
                    0
                };
                let value = self.pop()?;
                let is = regs.is.ok_or(DIE)?;
                regs.seg
                    .set_slot_attr(is, slat, subindex, value as i16, regs.map);
            }
            AttrAdd | AttrSub | IAttrAdd | IAttrSub => {
                let slat = instr.arg_u8(0);
                let subindex = if matches!(instr.opcode, IAttrAdd | IAttrSub) {
                    instr.arg_u8(1)
                } else {
                    0
                };
                let value = self.pop()? as u32;
                regs.ensure_positioned(slat);
                let is = regs.is.ok_or(DIE)?;
                let current = regs.seg.slot_attr(is, slat, subindex) as u32;
                let result = if matches!(instr.opcode, AttrAdd | IAttrAdd) {
                    current.wrapping_add(value)
                } else {
                    current.wrapping_sub(value)
                };
                regs.seg
                    .set_slot_attr(is, slat, subindex, result as i16, regs.map);
            }
            AttrSetSlot | IAttrSetSlot => {
                let slat = instr.arg_u8(0);
                let offset = if slat == attr::ATT_TO {
                    regs.pos as i32 - 1
                } else {
                    0
                };
                let subindex = if instr.opcode == IAttrSetSlot {
                    instr.arg_u8(1)
                } else {
                    offset as u8
                };
                let value = self.pop()?.wrapping_add(offset);
                let is = regs.is.ok_or(DIE)?;
                regs.seg
                    .set_slot_attr(is, slat, subindex, value as i16, regs.map);
            }
            PushSlotAttr | PushISlotAttr => {
                let slat = instr.arg_u8(0);
                let subindex = if instr.opcode == PushISlotAttr {
                    instr.arg_u8(2)
                } else {
                    0
                };
                regs.ensure_positioned(slat);
                if let Some(slot) = regs.slot_at(instr.arg_i8(1)) {
                    self.push(regs.seg.slot_attr(slot, slat, subindex))?;
                }
            }
            PushGlyphAttrObs | PushAttToGAttrObs | PushGlyphAttr | PushAttToGlyphAttr => {
                let (glyph_attr, slot_ref) = match instr.opcode {
                    PushGlyphAttr | PushAttToGlyphAttr => (instr.arg_u16(0), instr.arg_i8(2)),
                    _ => (u16::from(instr.arg_u8(0)), instr.arg_i8(1)),
                };
                if let Some(mut slot) = regs.slot_at(slot_ref) {
                    if matches!(instr.opcode, PushAttToGAttrObs | PushAttToGlyphAttr) {
                        slot = regs.seg.slot(slot).parent.unwrap_or(slot);
                    }
                    let glyph_id = regs.seg.slot(slot).glyph_id;
                    self.push(i32::from(regs.seg.glyph_attr(glyph_id, glyph_attr)))?;
                }
            }
            PushGlyphMetric | PushAttToGlyphMetric => {
                let metric = instr.arg_u8(0);
                let level = instr.arg_u8(2);
                if let Some(mut slot) = regs.slot_at(instr.arg_i8(1)) {
                    if instr.opcode == PushAttToGlyphMetric {
                        slot = regs.seg.slot(slot).parent.unwrap_or(slot);
                    }
                    let value = regs.seg.glyph_metric(slot, metric, level, regs.rtl);
                    self.push(value)?;
                }
            }
            PushFeat => {
                if let Some(slot) = regs.slot_at(instr.arg_i8(1)) {
                    let fid = feature_index(regs.seg, slot);
                    self.push(regs.seg.feature(fid, instr.arg_u8(0)))?;
                }
            }
            SetFeat => {
                if let Some(slot) = regs.slot_at(instr.arg_i8(1)) {
                    let fid = feature_index(regs.seg, slot);
                    let value = self.pop()?;
                    regs.seg.set_feature(fid, instr.arg_u8(0), value);
                }
            }
            PopRet => {
                let value = self.pop()?;
                self.push(value)?;
                return Ok(Flow::Return);
            }
            RetZero => {
                self.push(0)?;
                return Ok(Flow::Return);
            }
            RetTrue => {
                self.push(1)?;
                return Ok(Flow::Return);
            }
            PushProcState => self.push(1)?,
            PushVersion => self.push(ENGINE_VERSION)?,
            TempCopy => {
                let is = regs.is.ok_or(DIE)?;
                let copy = regs.seg.new_slot().ok_or(DIE)?;
                let mut slot = regs.seg.slot(is).clone();
                slot.mark_copied(true);
                regs.seg.slots[copy] = slot;
                regs.map.set_at(regs.pos, Some(copy));
            }
        }
        Ok(Flow::Continue)
    }
}

fn feature_index(seg: &Segment<'_>, slot: SlotId) -> u8 {
    seg.char_info(seg.slot(slot).original)
        .map_or(0, |info| info.feature_index)
}

fn put_copy(regs: &mut Regs<'_, '_>, slot_ref: i8) -> Result<(), MachineStatus> {
    let Some(is) = regs.is else {
        return Ok(());
    };
    if regs.seg.slot(is).is_deleted() {
        return Ok(());
    }
    if let Some(source) = regs.slot_at(slot_ref).filter(|&source| source != is) {
        let current = regs.seg.slot(is);
        if current.parent.is_some() || current.child.is_some() {
            return Err(MachineStatus::DiedEarly);
        }
        let (prev, next) = (current.prev, current.next);
        let mut copy = regs.seg.slot(source).clone();
        copy.child = None;
        copy.sibling = None;
        copy.prev = prev;
        copy.next = next;
        let parent = copy.parent;
        regs.seg.slots[is] = copy;
        if let Some(parent) = parent {
            regs.seg.add_child(parent, is);
        }
    }
    let slot = &mut regs.seg.slots[is];
    slot.mark_copied(false);
    slot.mark_deleted(false);
    Ok(())
}

fn insert(regs: &mut Regs<'_, '_>) -> Result<(), MachineStatus> {
    if regs.map.dec_max() <= 0 {
        return Err(MachineStatus::DiedEarly);
    }
    let seg = &mut *regs.seg;
    let new = seg.new_slot().ok_or(MachineStatus::DiedEarly)?;

    let mut iss = regs.is;
    while let Some(id) = iss.filter(|&id| seg.slot(id).is_deleted()) {
        iss = seg.slot(id).next;
    }

    match iss {
        None => {
            if let Some(last) = seg.last {
                let before = seg.slot(last).before;
                seg.slots[last].next = Some(new);
                seg.slots[new].prev = Some(last);
                seg.slots[new].before = before;
                seg.last = Some(new);
            } else {
                seg.first = Some(new);
                seg.last = Some(new);
            }
        }
        Some(iss) => match seg.slot(iss).prev {
            Some(prev) => {
                let after = seg.slot(prev).after;
                seg.slots[prev].next = Some(new);
                seg.slots[new].prev = Some(prev);
                seg.slots[new].before = after;
            }
            None => {
                let before = seg.slot(iss).before;
                seg.slots[new].prev = None;
                seg.slots[new].before = before;
                seg.first = Some(new);
            }
        },
    }

    seg.slots[new].next = iss;
    if let Some(iss) = iss {
        seg.slots[iss].prev = Some(new);
        let (original, before) = (seg.slot(iss).original, seg.slot(iss).before);
        seg.slots[new].original = original;
        seg.slots[new].after = before;
    } else if let Some(prev) = seg.slot(new).prev {
        let (original, after) = (seg.slot(prev).original, seg.slot(prev).after);
        seg.slots[new].original = original;
        seg.slots[new].after = after;
    } else {
        seg.slots[new].original = 0;
    }

    if regs.is.is_some() && regs.is == regs.map.highwater {
        regs.map.highpassed = false;
    }
    regs.is = Some(new);
    seg.num_glyphs += 1;
    if regs.pos != 0 {
        regs.pos -= 1;
    }
    Ok(())
}

fn delete(regs: &mut Regs<'_, '_>) -> Result<(), MachineStatus> {
    let is = regs.is.ok_or(MachineStatus::DiedEarly)?;
    let seg = &mut *regs.seg;
    if seg.slot(is).is_deleted() {
        return Err(MachineStatus::DiedEarly);
    }
    seg.slots[is].mark_deleted(true);
    let (prev, next) = (seg.slot(is).prev, seg.slot(is).next);
    match prev {
        Some(prev) => seg.slots[prev].next = next,
        None => seg.first = next,
    }
    match next {
        Some(next) => seg.slots[next].prev = prev,
        None => seg.last = prev,
    }
    if regs.map.highwater == Some(is) {
        regs.map.highwater = next;
    }
    if let Some(prev) = prev {
        regs.is = Some(prev);
    }
    seg.num_glyphs = seg.num_glyphs.saturating_sub(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphite::code::{CodeContext, CodeError, PassType};
    use crate::graphite::feat::Features;
    use crate::graphite::tests::{simple_face, simple_silf};
    use crate::graphite::GraphiteFace;

    fn context() -> CodeContext {
        CodeContext {
            num_classes: 1,
            num_glyph_attrs: 8,
            num_features: 1,
            num_user_attrs: 1,
            pass_type: PassType::Substitution,
        }
    }

    fn segment<'f>(face: &'f GraphiteFace, chars: &[u32]) -> Segment<'f> {
        let silf = &face.silf.subtables[0];
        let mut seg = Segment::new(face, silf, 0, chars.len());
        seg.read_text(chars, Features::default(), |ch| Some(ch as u16));
        seg
    }

    fn window(seg: &Segment<'_>) -> SlotMap {
        let mut map = SlotMap::new(false, seg.slot_count() * 64);
        map.reset(None, 0);
        for id in seg.iter() {
            map.push_slot(Some(id));
        }
        map.push_slot(None);
        map
    }

    fn run(bytecode: &[u8], chars: &[u32]) -> Result<i32, MachineStatus> {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, chars);
        let mut map = window(&seg);
        let code = Code::load(false, bytecode, 0, chars.len() as u16, &context()).unwrap();
        let mut pos = 1;
        Machine::new().run(&code, &mut seg, &mut map, &mut pos)
    }

    #[test]
    fn arithmetic_and_cond() {
        // PUSH_BYTE 43, PUSH_BYTE 42, PUSH_BYTE 11, PUSH_BYTE 13, ADD, PUSH_BYTE 4, SUB,
        // COND, POP_RET
        let bytecode = [1, 43, 1, 42, 1, 11, 1, 13, 6, 1, 4, 7, 15, 48];
        assert_eq!(run(&bytecode, &[1]), Ok(42));
    }

    #[test]
    fn underfull_stack_rejected_at_load() {
        let bytecode = [1, 43, 1, 42, 1, 11, 1, 13, 6, 1, 4, 7, 15, 48, 15];
        assert_eq!(
            Code::load(false, &bytecode, 0, 1, &context()),
            Err(CodeError::UnderfullStack)
        );
    }

    #[test]
    fn divide_by_zero_dies() {
        // PUSH_BYTE 1, PUSH_BYTE 0, DIV, POP_RET
        assert_eq!(run(&[1, 1, 1, 0, 9, 48], &[1]), Err(MachineStatus::DiedEarly));
    }

    #[test]
    fn signed_pushes() {
        // PUSH_BYTE -1, PUSH_BYTE_U 255, ADD, POP_RET
        assert_eq!(run(&[1, 0xFF, 2, 0xFF, 6, 48], &[1]), Ok(254));
        // PUSH_SHORT -2, PUSH_LONG 0x00010000, ADD, POP_RET
        assert_eq!(run(&[3, 0xFF, 0xFE, 5, 0, 1, 0, 0, 6, 48], &[1]), Ok(0xFFFE));
    }

    #[test]
    fn put_glyph_and_delete() {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, &[1, 2]);
        let mut map = window(&seg);
        // PUT_GLYPH class 0, NEXT, DELETE, RET_ZERO
        let code = Code::load(false, &[59, 0, 0, 25, 32, 49], 0, 2, &context()).unwrap();
        let mut pos = 1;
        let result = Machine::new().run(&code, &mut seg, &mut map, &mut pos);
        assert_eq!(result, Ok(0));
        assert_eq!(seg.glyphs(), vec![5]);
        assert_eq!(seg.slot_count(), 1);
        assert_eq!(pos, 2);
    }

    #[test]
    fn insert_slot() {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, &[1, 2]);
        let mut map = window(&seg);
        // INSERT, PUT_GLYPH class 0, RET_ZERO
        let code = Code::load(false, &[31, 59, 0, 0, 49], 0, 2, &context()).unwrap();
        let mut pos = 1;
        let result = Machine::new().run(&code, &mut seg, &mut map, &mut pos);
        assert_eq!(result, Ok(0));
        assert_eq!(seg.glyphs(), vec![5, 1, 2]);
        assert_eq!(seg.slot_count(), 3);
        assert_eq!(pos, 0);
    }

    #[test]
    fn out_of_bounds_reference() {
        let face = simple_face(simple_silf(Vec::new()));
        let mut seg = segment(&face, &[1]);
        let mut map = window(&seg);
        // PUSH_GLYPH_ATTR_OBS 0 2, POP_RET with a rule length of 3
        let code = Code::load(false, &[41, 0, 2, 48], 0, 3, &context()).unwrap();
        let mut pos = 1;
        let result = Machine::new().run(&code, &mut seg, &mut map, &mut pos);
        assert_eq!(result, Err(MachineStatus::SlotOffsetOutBounds));
    }
}
