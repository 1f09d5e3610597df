//! Loading and validation of Graphite rule bytecode.
//!
//! Bytecode is decoded once, when the `Silf` table is read. Every instruction is checked
//! against the limits of the face (classes, attributes and features) and of the rule it
//! belongs to, and the stack depth is tracked, so that the machine can run the resulting
//! program without repeating those checks.

use std::fmt;

use tinyvec::TinyVec;

use super::opcodes::{attr, metric, Opcode, MAX_OPCODE, VARARGS};

const NUM_CONTEXTS: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CodeError {
    AllocFailed,
    InvalidOpcode(u8),
    UnimplementedOpcodeUsed(Opcode),
    OutOfRangeData,
    JumpPastEnd,
    ArgumentsExhausted,
    MissingReturn,
    NestedContextItem,
    UnderfullStack,
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeError::AllocFailed => write!(f, "unable to allocate code"),
            CodeError::InvalidOpcode(byte) => write!(f, "invalid opcode {}", byte),
            CodeError::UnimplementedOpcodeUsed(opcode) => {
                write!(f, "opcode {} is not available here", opcode)
            }
            CodeError::OutOfRangeData => write!(f, "argument out of range"),
            CodeError::JumpPastEnd => write!(f, "jump past end of code"),
            CodeError::ArgumentsExhausted => write!(f, "code ends within arguments"),
            CodeError::MissingReturn => write!(f, "code does not end with a return"),
            CodeError::NestedContextItem => write!(f, "nested context item"),
            CodeError::UnderfullStack => write!(f, "stack underflow"),
        }
    }
}

impl std::error::Error for CodeError {}

/// The kind of pass a program belongs to. Determines which opcodes and attributes are
/// permitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassType {
    Unknown,
    LineBreak,
    Substitution,
    Positioning,
    Justification,
}

/// The face and pass limits that bytecode is validated against.
#[derive(Debug, Copy, Clone)]
pub struct CodeContext {
    pub num_classes: u16,
    pub num_glyph_attrs: u16,
    pub num_features: u16,
    pub num_user_attrs: u8,
    pub pass_type: PassType,
}

impl CodeContext {
    /// Upper bound for the index argument of the indexed slot attribute opcodes.
    fn attr_index_limit(&self, attr: u8) -> u16 {
        match attr {
            attr::COMP_REF => 255,
            attr::USER_DEFN => u16::from(self.num_user_attrs),
            a if a < 30 => 1,
            _ => 0,
        }
    }
}

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub opcode: Opcode,
    pub args: TinyVec<[u8; 5]>,
}

impl Instr {
    fn new(opcode: Opcode, args: &[u8]) -> Self {
        Instr {
            opcode,
            args: args.iter().copied().collect(),
        }
    }

    pub fn arg_i8(&self, index: usize) -> i8 {
        self.args.get(index).map_or(0, |&b| b as i8)
    }

    pub fn arg_u8(&self, index: usize) -> u8 {
        self.args.get(index).copied().unwrap_or(0)
    }

    /// A big-endian 16-bit argument starting at `index`.
    pub fn arg_u16(&self, index: usize) -> u16 {
        u16::from_be_bytes([self.arg_u8(index), self.arg_u8(index + 1)])
    }
}

/// A validated program: the constraint or action of a rule, or a pass constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    pub(crate) instrs: Vec<Instr>,
    pub(crate) constraint: bool,
    /// The program changes glyphs
    pub(crate) modify: bool,
    /// The program deletes slots or leaves copies behind, either needs garbage collection
    pub(crate) delete: bool,
    /// Furthest slot referenced, relative to the start of the rule context
    pub(crate) max_ref: i32,
}

impl Code {
    pub fn load(
        constraint: bool,
        bytecode: &[u8],
        pre_context: u8,
        rule_length: u16,
        context: &CodeContext,
    ) -> Result<Code, CodeError> {
        let mut code = Code {
            constraint,
            ..Code::default()
        };
        if bytecode.is_empty() {
            return Ok(code);
        }

        let mut decoder = Decoder::new(&mut code, pre_context, rule_length, context);
        decoder.load(bytecode)?;
        let max_ref = decoder.apply_analysis();

        match code.instrs.last() {
            None => return Ok(Code::default()),
            Some(instr) if !instr.opcode.is_return() => return Err(CodeError::MissingReturn),
            Some(_) => {}
        }
        code.max_ref = max_ref;
        Ok(code)
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn deletes(&self) -> bool {
        self.delete
    }

    pub fn modifies(&self) -> bool {
        self.modify
    }

    pub fn opcodes(&self) -> impl Iterator<Item = Opcode> + '_ {
        self.instrs.iter().map(|instr| instr.opcode)
    }
}

#[derive(Debug, Copy, Clone, Default)]
struct Context {
    code_ref: usize,
    changed: bool,
    referenced: bool,
}

struct Decoder<'c> {
    code: &'c mut Code,
    limits: &'c CodeContext,
    pre_context: i32,
    rule_length: i32,
    stack_depth: i32,
    out_index: i32,
    out_length: i32,
    slot_ref: i32,
    max_ref: i32,
    in_ctxt_item: bool,
    contexts: Box<[Context; NUM_CONTEXTS]>,
}

impl<'c> Decoder<'c> {
    fn new(
        code: &'c mut Code,
        pre_context: u8,
        rule_length: u16,
        limits: &'c CodeContext,
    ) -> Self {
        let (out_index, out_length) = if code.constraint {
            (0, 1)
        } else {
            (i32::from(pre_context), i32::from(rule_length))
        };
        Decoder {
            code,
            limits,
            pre_context: i32::from(pre_context),
            rule_length: i32::from(rule_length),
            stack_depth: 0,
            out_index,
            out_length,
            slot_ref: 0,
            max_ref: 0,
            in_ctxt_item: false,
            contexts: Box::new([Context::default(); NUM_CONTEXTS]),
        }
    }

    fn load(&mut self, mut bytecode: &[u8]) -> Result<(), CodeError> {
        while let Some((&byte, rest)) = bytecode.split_first() {
            let opcode = self.validate_opcode(byte, rest)?;
            let param_size = match opcode.info().param_size {
                VARARGS => usize::from(rest[0]) + 1,
                size => usize::from(size),
            };
            let (args, rest) = rest.split_at(param_size);
            self.fetch_opcode(opcode, args, rest)?;
            self.analyse_opcode(opcode, args);
            bytecode = self.emit_opcode(opcode, args, rest)?;
        }
        Ok(())
    }

    fn validate_opcode(&self, byte: u8, rest: &[u8]) -> Result<Opcode, CodeError> {
        if byte >= MAX_OPCODE {
            return Err(CodeError::InvalidOpcode(byte));
        }
        let opcode = Opcode::from_byte(byte).ok_or(CodeError::InvalidOpcode(byte))?;
        let info = opcode.info();
        let available = if self.code.constraint {
            info.constraint
        } else {
            info.action
        };
        if !available {
            return Err(CodeError::UnimplementedOpcodeUsed(opcode));
        }
        let param_size = if info.param_size == VARARGS {
            match rest.first() {
                Some(&n) => usize::from(n) + 1,
                None => return Err(CodeError::ArgumentsExhausted),
            }
        } else {
            usize::from(info.param_size)
        };
        if param_size > rest.len() {
            return Err(CodeError::ArgumentsExhausted);
        }
        Ok(opcode)
    }

    fn fetch_opcode(&mut self, opcode: Opcode, bc: &[u8], rest: &[u8]) -> Result<(), CodeError> {
        use Opcode::*;

        let u16_at = |i: usize| u16::from_be_bytes([bc[i], bc[i + 1]]);
        let limits = self.limits;
        match opcode {
            Nop => {}
            PushByte | PushByteU | PushShort | PushShortU | PushLong => self.stack_depth += 1,
            Add | Sub | Mul | Div | Min | Max | And | Or | Equal | NotEq | Less | Gtr
            | LessEq | GtrEq | BitOr | BitAnd => {
                self.stack_depth -= 1;
                if self.stack_depth <= 0 {
                    return Err(CodeError::UnderfullStack);
                }
            }
            Neg | Trunc8 | Trunc16 | Not | BitNot | BitSet => {
                if self.stack_depth <= 0 {
                    return Err(CodeError::UnderfullStack);
                }
            }
            Cond => {
                self.stack_depth -= 2;
                if self.stack_depth <= 0 {
                    return Err(CodeError::UnderfullStack);
                }
            }
            NextN => {}
            Next | CopyNext => {
                self.out_index += 1;
                if self.out_index < -1
                    || self.out_index > self.out_length
                    || self.slot_ref > self.rule_length
                {
                    return Err(CodeError::OutOfRangeData);
                }
            }
            PutGlyph8bitObs => {
                valid_upto(limits.num_classes, u16::from(bc[0]))?;
                self.test_context()?;
            }
            PutSubs8bitObs => {
                self.test_ref(bc[0] as i8)?;
                valid_upto(limits.num_classes, u16::from(bc[1]))?;
                valid_upto(limits.num_classes, u16::from(bc[2]))?;
                self.test_context()?;
            }
            PutCopy => {
                self.test_ref(bc[0] as i8)?;
                self.test_context()?;
            }
            Insert => {
                if limits.pass_type >= PassType::Positioning {
                    return Err(CodeError::InvalidOpcode(opcode as u8));
                }
                self.out_length += 1;
                if self.out_index < 0 {
                    self.out_index += 1;
                }
                if self.out_index < -1 || self.out_index >= self.out_length {
                    return Err(CodeError::OutOfRangeData);
                }
            }
            Delete => {
                if limits.pass_type >= PassType::Positioning {
                    return Err(CodeError::InvalidOpcode(opcode as u8));
                }
                if self.out_index < self.pre_context {
                    return Err(CodeError::OutOfRangeData);
                }
                self.out_index -= 1;
                self.out_length -= 1;
                if self.out_index < -1 || self.out_index > self.out_length {
                    return Err(CodeError::OutOfRangeData);
                }
            }
            Assoc => {
                if bc[0] == 0 {
                    return Err(CodeError::OutOfRangeData);
                }
                for &slot in &bc[1..] {
                    self.test_ref(slot as i8)?;
                }
                self.test_context()?;
            }
            CntxtItem => {
                let target = self.pre_context + i32::from(bc[0] as i8);
                if self.rule_length == 0 || target < 0 || target >= self.rule_length {
                    return Err(CodeError::OutOfRangeData);
                }
                if rest.len() < usize::from(bc[1]) {
                    return Err(CodeError::JumpPastEnd);
                }
                if self.in_ctxt_item {
                    return Err(CodeError::NestedContextItem);
                }
            }
            AttrSet | AttrAdd | AttrSub | AttrSetSlot => {
                self.stack_depth -= 1;
                if self.stack_depth < 0 {
                    return Err(CodeError::UnderfullStack);
                }
                valid_upto(u16::from(attr::MAX), u16::from(bc[0]))?;
                // user attributes are only reachable through the indexed opcodes
                if bc[0] == attr::USER_DEFN {
                    return Err(CodeError::OutOfRangeData);
                }
                self.test_attr(bc[0])?;
                self.test_context()?;
            }
            IAttrSetSlot | IAttrSet | IAttrAdd | IAttrSub => {
                self.stack_depth -= 1;
                if self.stack_depth < 0 {
                    return Err(CodeError::UnderfullStack);
                }
                valid_upto(u16::from(attr::MAX), u16::from(bc[0]))?;
                valid_upto(limits.attr_index_limit(bc[0]), u16::from(bc[1]))?;
                self.test_attr(bc[0])?;
                self.test_context()?;
            }
            PushSlotAttr => {
                self.stack_depth += 1;
                valid_upto(u16::from(attr::MAX), u16::from(bc[0]))?;
                self.test_ref(bc[1] as i8)?;
                if bc[0] == attr::USER_DEFN {
                    return Err(CodeError::OutOfRangeData);
                }
                self.test_attr(bc[0])?;
            }
            PushGlyphAttrObs | PushAttToGAttrObs => {
                self.stack_depth += 1;
                valid_upto(limits.num_glyph_attrs, u16::from(bc[0]))?;
                self.test_ref(bc[1] as i8)?;
            }
            PushGlyphMetric | PushAttToGlyphMetric => {
                self.stack_depth += 1;
                valid_upto(u16::from(metric::DESCENT), u16::from(bc[0]))?;
                self.test_ref(bc[1] as i8)?;
            }
            PushFeat => {
                self.stack_depth += 1;
                valid_upto(limits.num_features, u16::from(bc[0]))?;
                self.test_ref(bc[1] as i8)?;
            }
            PushISlotAttr => {
                self.stack_depth += 1;
                valid_upto(u16::from(attr::MAX), u16::from(bc[0]))?;
                self.test_ref(bc[1] as i8)?;
                valid_upto(limits.attr_index_limit(bc[0]), u16::from(bc[2]))?;
                self.test_attr(bc[0])?;
            }
            PushIGlyphAttr => self.stack_depth += 1,
            PopRet => {
                self.stack_depth -= 1;
                if self.stack_depth < 0 {
                    return Err(CodeError::UnderfullStack);
                }
            }
            RetZero | RetTrue => {}
            PushProcState | PushVersion => self.stack_depth += 1,
            PutSubs => {
                self.test_ref(bc[0] as i8)?;
                valid_upto(limits.num_classes, u16_at(1))?;
                valid_upto(limits.num_classes, u16_at(3))?;
                self.test_context()?;
            }
            PutSubs2 | PutSubs3 => {}
            PutGlyph => {
                valid_upto(limits.num_classes, u16_at(0))?;
                self.test_context()?;
            }
            PushGlyphAttr | PushAttToGlyphAttr => {
                self.stack_depth += 1;
                valid_upto(limits.num_glyph_attrs, u16_at(0))?;
                self.test_ref(bc[2] as i8)?;
            }
            SetFeat => {
                valid_upto(limits.num_features, u16::from(bc[0]))?;
                self.test_ref(bc[1] as i8)?;
            }
            TempCopy => return Err(CodeError::InvalidOpcode(opcode as u8)),
        }
        Ok(())
    }

    fn test_context(&self) -> Result<(), CodeError> {
        if self.out_index >= self.out_length
            || self.out_index < 0
            || self.slot_ref >= NUM_CONTEXTS as i32 - 1
        {
            return Err(CodeError::OutOfRangeData);
        }
        Ok(())
    }

    fn test_ref(&self, index: i8) -> Result<(), CodeError> {
        let index = i32::from(index);
        if self.code.constraint && !self.in_ctxt_item {
            if index > 0 || -index > self.pre_context {
                return Err(CodeError::OutOfRangeData);
            }
        } else {
            let target = self.slot_ref + self.pre_context + index;
            if self.rule_length == 0 || target >= self.rule_length || target < 0 {
                return Err(CodeError::OutOfRangeData);
            }
        }
        Ok(())
    }

    /// Passes before positioning may only touch the attributes that do not depend on
    /// glyph placement.
    fn test_attr(&self, attr: u8) -> Result<(), CodeError> {
        if self.limits.pass_type < PassType::Positioning
            && !matches!(
                attr,
                attr::BREAK | attr::DIR | attr::USER_DEFN | attr::COMP_REF
            )
        {
            return Err(CodeError::OutOfRangeData);
        }
        Ok(())
    }

    fn analyse_opcode(&mut self, opcode: Opcode, args: &[u8]) {
        use Opcode::*;

        let arg = |i: usize| args.get(i).map_or(0, |&b| i32::from(b as i8));
        match opcode {
            Delete => self.code.delete = true,
            Assoc => self.set_changed(0),
            PutGlyph8bitObs | PutGlyph => {
                self.code.modify = true;
                self.set_changed(0);
            }
            AttrSet | AttrAdd | AttrSub | AttrSetSlot | IAttrSetSlot | IAttrSet | IAttrAdd
            | IAttrSub => self.set_noref(0),
            Next | CopyNext => {
                self.slot_ref += 1;
                if let Some(context) = usize::try_from(self.slot_ref)
                    .ok()
                    .and_then(|i| self.contexts.get_mut(i))
                {
                    *context = Context {
                        code_ref: self.code.instrs.len() + 1,
                        ..Context::default()
                    };
                }
            }
            Insert => {
                if self.slot_ref >= 0 {
                    self.slot_ref -= 1;
                }
                self.code.modify = true;
            }
            PutSubs8bitObs | PutSubs | PutCopy => {
                if opcode != PutCopy {
                    self.code.modify = true;
                    self.set_changed(0);
                }
                if arg(0) != 0 {
                    self.set_changed(0);
                    self.code.modify = true;
                }
                self.set_ref(arg(0));
            }
            PushGlyphAttrObs | PushSlotAttr | PushGlyphMetric | PushAttToGAttrObs
            | PushAttToGlyphMetric | PushISlotAttr | PushFeat | SetFeat => self.set_ref(arg(1)),
            PushAttToGlyphAttr | PushGlyphAttr => self.set_ref(arg(2)),
            _ => {}
        }
    }

    fn context_index(&mut self, index: i32) -> Option<usize> {
        let target = index + self.slot_ref;
        let i = usize::try_from(target).ok().filter(|&i| i < NUM_CONTEXTS)?;
        self.max_ref = self.max_ref.max(target);
        Some(i)
    }

    fn set_ref(&mut self, index: i32) {
        if let Some(i) = self.context_index(index) {
            self.contexts[i].referenced = true;
        }
    }

    fn set_noref(&mut self, index: i32) {
        self.context_index(index);
    }

    fn set_changed(&mut self, index: i32) {
        if let Some(i) = self.context_index(index) {
            self.contexts[i].changed = true;
        }
    }

    fn emit_opcode<'b>(
        &mut self,
        opcode: Opcode,
        args: &[u8],
        rest: &'b [u8],
    ) -> Result<&'b [u8], CodeError> {
        let index = self.code.instrs.len();
        self.code.instrs.push(Instr::new(opcode, args));
        if opcode != Opcode::CntxtItem {
            return Ok(rest);
        }

        // The body of the context item is loaded in place. Its byte length is rewritten
        // as an instruction count for the machine to skip.
        let slot = i32::from(args[0] as i8);
        self.in_ctxt_item = true;
        self.out_index = self.pre_context + slot;
        self.slot_ref = slot;
        self.out_length = self.rule_length;

        let byte_skip = usize::from(args[1]);
        let (body, rest) = rest.split_at(byte_skip);
        let result = self.load(body);
        self.out_index = 0;
        self.slot_ref = 0;
        result?;

        let instr_skip = self.code.instrs.len() - index - 1;
        self.code.instrs[index].args[1] =
            u8::try_from(instr_skip).map_err(|_| CodeError::JumpPastEnd)?;
        self.out_length = 1;
        self.in_ctxt_item = false;
        Ok(rest)
    }

    /// Insert copies of slots that are changed and then referenced later by the same
    /// action, so that later references see the original. Returns the maximum
    /// referenced slot.
    fn apply_analysis(&mut self) -> i32 {
        if self.code.constraint {
            return self.max_ref;
        }
        let count = usize::try_from(self.slot_ref).unwrap_or(0).min(NUM_CONTEXTS);
        let mut temp_count = 0;
        for context in &self.contexts[..count] {
            if !context.referenced || !context.changed {
                continue;
            }
            let at = (context.code_ref + temp_count).min(self.code.instrs.len());
            self.code.instrs.insert(at, Instr::new(Opcode::TempCopy, &[]));
            temp_count += 1;
            self.code.delete = true;
        }
        self.max_ref
    }
}

fn valid_upto(limit: u16, x: u16) -> Result<(), CodeError> {
    if limit != 0 && x < limit {
        Ok(())
    } else {
        Err(CodeError::OutOfRangeData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pass_type: PassType) -> CodeContext {
        CodeContext {
            num_classes: 1,
            num_glyph_attrs: 8,
            num_features: 1,
            num_user_attrs: 1,
            pass_type,
        }
    }

    fn action(bytecode: &[u8], rule_length: u16) -> Result<Code, CodeError> {
        Code::load(false, bytecode, 0, rule_length, &context(PassType::Substitution))
    }

    #[test]
    fn empty_bytecode() {
        let code = action(&[], 1).unwrap();
        assert!(code.is_empty());
    }

    #[test]
    fn simple_program() {
        // PUSH_BYTE 1, POP_RET
        let code = action(&[1, 1, 48], 1).unwrap();
        assert_eq!(
            code.opcodes().collect::<Vec<_>>(),
            vec![Opcode::PushByte, Opcode::PopRet]
        );
        assert!(!code.deletes());
        assert!(!code.modifies());
    }

    #[test]
    fn missing_return() {
        assert_eq!(action(&[1, 5], 1), Err(CodeError::MissingReturn));
    }

    #[test]
    fn underfull_stack() {
        assert_eq!(action(&[6, 48], 1), Err(CodeError::UnderfullStack));
        // PUSH_BYTE 1, PUSH_BYTE 2, COND
        assert_eq!(action(&[1, 1, 1, 2, 15, 48], 1), Err(CodeError::UnderfullStack));
    }

    #[test]
    fn invalid_opcodes() {
        assert_eq!(action(&[200], 1), Err(CodeError::InvalidOpcode(200)));
        assert_eq!(
            action(&[57, 49], 1),
            Err(CodeError::UnimplementedOpcodeUsed(Opcode::PutSubs2))
        );
        let constraint = Code::load(true, &[25, 49], 0, 1, &context(PassType::Substitution));
        assert_eq!(
            constraint,
            Err(CodeError::UnimplementedOpcodeUsed(Opcode::Next))
        );
    }

    #[test]
    fn arguments_exhausted() {
        assert_eq!(action(&[5, 0, 0], 1), Err(CodeError::ArgumentsExhausted));
        assert_eq!(action(&[33], 1), Err(CodeError::ArgumentsExhausted));
    }

    #[test]
    fn class_out_of_range() {
        // PUT_GLYPH 1 with a single class
        assert_eq!(action(&[59, 0, 1, 49], 1), Err(CodeError::OutOfRangeData));
    }

    #[test]
    fn positioning_attr_in_substitution_pass() {
        // PUSH_BYTE 1, ATTR_SET ShiftX
        assert_eq!(action(&[1, 1, 35, 20, 49], 1), Err(CodeError::OutOfRangeData));
        let code = Code::load(
            false,
            &[1, 1, 35, 20, 49],
            0,
            1,
            &context(PassType::Positioning),
        );
        assert!(code.is_ok());
    }

    #[test]
    fn insert_not_allowed_when_positioning() {
        let code = Code::load(false, &[31, 49], 0, 1, &context(PassType::Positioning));
        assert_eq!(code, Err(CodeError::InvalidOpcode(31)));
    }

    #[test]
    fn temp_copy_is_inserted() {
        // PUT_GLYPH 0, NEXT, PUT_COPY -1, RET_ZERO
        let code = action(&[59, 0, 0, 25, 30, 0xFF, 49], 2).unwrap();
        assert_eq!(
            code.opcodes().collect::<Vec<_>>(),
            vec![
                Opcode::TempCopy,
                Opcode::PutGlyph,
                Opcode::Next,
                Opcode::PutCopy,
                Opcode::RetZero
            ]
        );
        assert!(code.deletes());
        assert!(code.modifies());
        assert_eq!(code.max_ref, 1);
    }

    #[test]
    fn context_item_skip_counts_instructions() {
        // CNTXT_ITEM 0 3 { PUSH_BYTE 1, NOT }, POP_RET
        let code = Code::load(
            true,
            &[34, 0, 3, 1, 1, 18, 48],
            1,
            2,
            &context(PassType::Substitution),
        )
        .unwrap();
        assert_eq!(code.instrs.len(), 4);
        assert_eq!(code.instrs[0].args[1], 2);
    }

    #[test]
    fn context_item_past_end() {
        let code = Code::load(true, &[34, 0, 9, 48], 1, 2, &context(PassType::Substitution));
        assert_eq!(code, Err(CodeError::JumpPastEnd));
    }

    #[test]
    fn nested_context_item() {
        let code = Code::load(
            true,
            &[34, 0, 4, 34, 0, 0, 49, 49],
            1,
            2,
            &context(PassType::Substitution),
        );
        assert_eq!(code, Err(CodeError::NestedContextItem));
    }
}
