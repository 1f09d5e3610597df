//! Opcodes of the Graphite rule language.

use std::fmt;

/// Parameter size of opcodes whose first argument byte gives the number of extra bytes.
pub const VARARGS: u8 = 0xFF;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    PushByte,
    PushByteU,
    PushShort,
    PushShortU,
    PushLong,
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Neg,
    Trunc8,
    Trunc16,
    Cond,
    And,
    Or,
    Not,
    Equal,
    NotEq,
    Less,
    Gtr,
    LessEq,
    GtrEq,
    Next,
    NextN,
    CopyNext,
    PutGlyph8bitObs,
    PutSubs8bitObs,
    PutCopy,
    Insert,
    Delete,
    Assoc,
    CntxtItem,
    AttrSet,
    AttrAdd,
    AttrSub,
    AttrSetSlot,
    IAttrSetSlot,
    PushSlotAttr,
    PushGlyphAttrObs,
    PushGlyphMetric,
    PushFeat,
    PushAttToGAttrObs,
    PushAttToGlyphMetric,
    PushISlotAttr,
    PushIGlyphAttr,
    PopRet,
    RetZero,
    RetTrue,
    IAttrSet,
    IAttrAdd,
    IAttrSub,
    PushProcState,
    PushVersion,
    PutSubs,
    PutSubs2,
    PutSubs3,
    PutGlyph,
    PushGlyphAttr,
    PushAttToGlyphAttr,
    BitOr,
    BitAnd,
    BitNot,
    BitSet,
    SetFeat,
    /// Internal opcode, never present in font data. Inserted by the code analysis.
    TempCopy,
}

/// Number of opcodes that may appear in font data.
pub const MAX_OPCODE: u8 = Opcode::TempCopy as u8;

/// Static description of an opcode.
#[derive(Debug, Copy, Clone)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub param_size: u8,
    /// Usable in action code
    pub action: bool,
    /// Usable in constraint code
    pub constraint: bool,
}

const fn both(name: &'static str, param_size: u8) -> OpcodeInfo {
    OpcodeInfo {
        name,
        param_size,
        action: true,
        constraint: true,
    }
}

const fn action(name: &'static str, param_size: u8) -> OpcodeInfo {
    OpcodeInfo {
        name,
        param_size,
        action: true,
        constraint: false,
    }
}

const fn constraint(name: &'static str, param_size: u8) -> OpcodeInfo {
    OpcodeInfo {
        name,
        param_size,
        action: false,
        constraint: true,
    }
}

const fn unimplemented(name: &'static str, param_size: u8) -> OpcodeInfo {
    OpcodeInfo {
        name,
        param_size,
        action: false,
        constraint: false,
    }
}

static OPCODE_TABLE: [OpcodeInfo; MAX_OPCODE as usize + 1] = [
    both("NOP", 0),
    both("PUSH_BYTE", 1),
    both("PUSH_BYTE_U", 1),
    both("PUSH_SHORT", 2),
    both("PUSH_SHORT_U", 2),
    both("PUSH_LONG", 4),
    both("ADD", 0),
    both("SUB", 0),
    both("MUL", 0),
    both("DIV", 0),
    both("MIN", 0),
    both("MAX", 0),
    both("NEG", 0),
    both("TRUNC8", 0),
    both("TRUNC16", 0),
    both("COND", 0),
    both("AND", 0),
    both("OR", 0),
    both("NOT", 0),
    both("EQUAL", 0),
    both("NOT_EQ", 0),
    both("LESS", 0),
    both("GTR", 0),
    both("LESS_EQ", 0),
    both("GTR_EQ", 0),
    action("NEXT", 0),
    unimplemented("NEXT_N", 1),
    action("COPY_NEXT", 0),
    action("PUT_GLYPH_8BIT_OBS", 1),
    action("PUT_SUBS_8BIT_OBS", 3),
    action("PUT_COPY", 1),
    action("INSERT", 0),
    action("DELETE", 0),
    action("ASSOC", VARARGS),
    constraint("CNTXT_ITEM", 2),
    action("ATTR_SET", 1),
    action("ATTR_ADD", 1),
    action("ATTR_SUB", 1),
    action("ATTR_SET_SLOT", 1),
    action("IATTR_SET_SLOT", 2),
    both("PUSH_SLOT_ATTR", 2),
    both("PUSH_GLYPH_ATTR_OBS", 2),
    both("PUSH_GLYPH_METRIC", 3),
    both("PUSH_FEAT", 2),
    both("PUSH_ATT_TO_GATTR_OBS", 2),
    both("PUSH_ATT_TO_GLYPH_METRIC", 3),
    both("PUSH_ISLOT_ATTR", 3),
    unimplemented("PUSH_IGLYPH_ATTR", 3),
    both("POP_RET", 0),
    both("RET_ZERO", 0),
    both("RET_TRUE", 0),
    action("IATTR_SET", 2),
    action("IATTR_ADD", 2),
    action("IATTR_SUB", 2),
    both("PUSH_PROC_STATE", 1),
    both("PUSH_VERSION", 0),
    action("PUT_SUBS", 5),
    unimplemented("PUT_SUBS2", 0),
    unimplemented("PUT_SUBS3", 0),
    action("PUT_GLYPH", 2),
    both("PUSH_GLYPH_ATTR", 3),
    both("PUSH_ATT_TO_GLYPH_ATTR", 3),
    both("BITOR", 0),
    both("BITAND", 0),
    both("BITNOT", 0),
    both("BITSET", 4),
    both("SET_FEAT", 2),
    action("TEMP_COPY", 0),
];

impl Opcode {
    /// Map a byte of bytecode to its opcode. `TEMP_COPY` is never produced.
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        const OPCODES: [Opcode; MAX_OPCODE as usize] = [
            Nop,
            PushByte,
            PushByteU,
            PushShort,
            PushShortU,
            PushLong,
            Add,
            Sub,
            Mul,
            Div,
            Min,
            Max,
            Neg,
            Trunc8,
            Trunc16,
            Cond,
            And,
            Or,
            Not,
            Equal,
            NotEq,
            Less,
            Gtr,
            LessEq,
            GtrEq,
            Next,
            NextN,
            CopyNext,
            PutGlyph8bitObs,
            PutSubs8bitObs,
            PutCopy,
            Insert,
            Delete,
            Assoc,
            CntxtItem,
            AttrSet,
            AttrAdd,
            AttrSub,
            AttrSetSlot,
            IAttrSetSlot,
            PushSlotAttr,
            PushGlyphAttrObs,
            PushGlyphMetric,
            PushFeat,
            PushAttToGAttrObs,
            PushAttToGlyphMetric,
            PushISlotAttr,
            PushIGlyphAttr,
            PopRet,
            RetZero,
            RetTrue,
            IAttrSet,
            IAttrAdd,
            IAttrSub,
            PushProcState,
            PushVersion,
            PutSubs,
            PutSubs2,
            PutSubs3,
            PutGlyph,
            PushGlyphAttr,
            PushAttToGlyphAttr,
            BitOr,
            BitAnd,
            BitNot,
            BitSet,
            SetFeat,
        ];
        OPCODES.get(usize::from(byte)).copied()
    }

    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODE_TABLE[self as usize]
    }

    pub fn is_return(self) -> bool {
        matches!(self, Opcode::PopRet | Opcode::RetZero | Opcode::RetTrue)
    }

    /// Look an opcode up by its name in compiled font listings, such as `PUSH_BYTE`.
    pub fn from_name(name: &str) -> Option<Opcode> {
        (0..MAX_OPCODE)
            .filter_map(Opcode::from_byte)
            .find(|opcode| opcode.info().name == name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

/// Slot attribute identifiers, as used by the attribute opcodes.
pub mod attr {
    pub const ADV_X: u8 = 0;
    pub const ADV_Y: u8 = 1;
    pub const ATT_TO: u8 = 2;
    pub const ATT_X: u8 = 3;
    pub const ATT_Y: u8 = 4;
    pub const ATT_GPT: u8 = 5;
    pub const ATT_X_OFF: u8 = 6;
    pub const ATT_Y_OFF: u8 = 7;
    pub const ATT_WITH_X: u8 = 8;
    pub const ATT_WITH_Y: u8 = 9;
    pub const WITH_GPT: u8 = 10;
    pub const ATT_WITH_X_OFF: u8 = 11;
    pub const ATT_WITH_Y_OFF: u8 = 12;
    pub const ATT_LEVEL: u8 = 13;
    pub const BREAK: u8 = 14;
    pub const COMP_REF: u8 = 15;
    pub const DIR: u8 = 16;
    pub const INSERT: u8 = 17;
    pub const POS_X: u8 = 18;
    pub const POS_Y: u8 = 19;
    pub const SHIFT_X: u8 = 20;
    pub const SHIFT_Y: u8 = 21;
    pub const USER_DEFN_V1: u8 = 22;
    pub const MEASURE_SOL: u8 = 23;
    pub const MEASURE_EOL: u8 = 24;
    pub const J_STRETCH: u8 = 25;
    pub const J_SHRINK: u8 = 26;
    pub const J_STEP: u8 = 27;
    pub const J_WEIGHT: u8 = 28;
    pub const J_WIDTH: u8 = 29;
    pub const SEG_SPLIT: u8 = J_STRETCH + 29;
    pub const USER_DEFN: u8 = 55;
    pub const BIDI_LEVEL: u8 = 56;
    pub const COL_FLAGS: u8 = 57;
    pub const COL_LIMIT_BLX: u8 = 58;
    pub const COL_LIMIT_BLY: u8 = 59;
    pub const COL_LIMIT_TRX: u8 = 60;
    pub const COL_LIMIT_TRY: u8 = 61;
    pub const COL_SHIFT_X: u8 = 62;
    pub const COL_SHIFT_Y: u8 = 63;
    pub const COL_MARGIN: u8 = 64;
    pub const COL_MARGIN_WT: u8 = 65;
    pub const COL_EXCL_GLYPH: u8 = 66;
    pub const COL_EXCL_OFF_X: u8 = 67;
    pub const COL_EXCL_OFF_Y: u8 = 68;
    pub const SEQ_CLASS: u8 = 69;
    pub const SEQ_PROX_CLASS: u8 = 70;
    pub const SEQ_ORDER: u8 = 71;
    pub const SEQ_ABOVE_X_OFF: u8 = 72;
    pub const SEQ_ABOVE_WT: u8 = 73;
    pub const SEQ_BELOW_X_LIM: u8 = 74;
    pub const SEQ_BELOW_WT: u8 = 75;
    pub const SEQ_VALIGN_HT: u8 = 76;
    pub const SEQ_VALIGN_WT: u8 = 77;
    pub const MAX: u8 = 78;
}

/// Glyph metric identifiers for `PUSH_GLYPH_METRIC`.
pub mod metric {
    pub const LSB: u8 = 0;
    pub const RSB: u8 = 1;
    pub const BB_TOP: u8 = 2;
    pub const BB_BOTTOM: u8 = 3;
    pub const BB_LEFT: u8 = 4;
    pub const BB_RIGHT: u8 = 5;
    pub const BB_HEIGHT: u8 = 6;
    pub const BB_WIDTH: u8 = 7;
    pub const ADV_WIDTH: u8 = 8;
    pub const ADV_HEIGHT: u8 = 9;
    pub const ASCENT: u8 = 10;
    pub const DESCENT: u8 = 11;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_values() {
        assert_eq!(Opcode::from_byte(1), Some(Opcode::PushByte));
        assert_eq!(Opcode::from_byte(34), Some(Opcode::CntxtItem));
        assert_eq!(Opcode::from_byte(48), Some(Opcode::PopRet));
        assert_eq!(Opcode::from_byte(66), Some(Opcode::SetFeat));
        assert_eq!(Opcode::from_byte(MAX_OPCODE), None);
    }

    #[test]
    fn names() {
        assert_eq!(Opcode::PushByte.to_string(), "PUSH_BYTE");
        assert_eq!(Opcode::from_name("IATTR_SET_SLOT"), Some(Opcode::IAttrSetSlot));
        assert_eq!(Opcode::from_name("TEMP_COPY"), None);
    }

    #[test]
    fn availability() {
        assert!(Opcode::Next.info().action);
        assert!(!Opcode::Next.info().constraint);
        assert!(Opcode::CntxtItem.info().constraint);
        assert!(!Opcode::CntxtItem.info().action);
        assert!(!Opcode::PutSubs2.info().action);
        assert_eq!(Opcode::Assoc.info().param_size, VARARGS);
    }
}
