//! PostScript charstring interpreter shared by CFF dictionaries, Type2 charstrings and
//! Type1 charstrings.
//!
//! The `Machine` decodes operands onto its argument stack and hands every operator to an
//! `OperatorHandler`. The handler tells the machine how many arguments to drop afterwards.
//!
//! References:
//!
//! - <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5176.CFF.pdf>
//! - <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf>
//! - <https://adobe-type-tools.github.io/font-tech-notes/pdfs/T1_SPEC.pdf>

use std::fmt;

use tinyvec::ArrayVec;

mod argstack;
pub mod bounds;
pub mod type1;

pub use argstack::ArgumentsStack;

// Limits according to the Adobe Technical Note #5177 Appendix B.
pub const MAX_ARGUMENTS_STACK_LEN: usize = 48;
pub const MAX_CALL_STACK_LEN: usize = 10;

/// Prefix byte of two byte operators.
pub const ESCAPE: u8 = 12;

/// Selects which operand encodings and operators are valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Context {
    TopDict,
    PrivateDict,
    Type2Charstring,
    Type1Charstring,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Operator {
    pub code: u8,
    pub escaped: bool,
}

/// What the machine does to the argument stack once an operator has been handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StackEffect {
    /// Drop this many arguments from the top of the stack.
    Pop(usize),
    /// Drop every argument.
    Clear,
    /// Stop running. This is a normal end, not an error.
    Interrupt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Subroutines {
    Local,
    Global,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharStringError {
    InvalidBytecode,
    StackOverflow,
    StackUnderflow,
    TooDeep,
    InvalidSubroutineIndex,
    InvalidOperator,
    InvalidOperand,
}

impl fmt::Display for CharStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharStringError::InvalidBytecode => write!(f, "invalid charstring bytecode"),
            CharStringError::StackOverflow => write!(f, "argument stack overflow"),
            CharStringError::StackUnderflow => write!(f, "argument stack underflow"),
            CharStringError::TooDeep => write!(f, "subroutine calls nested too deeply"),
            CharStringError::InvalidSubroutineIndex => write!(f, "invalid subroutine index"),
            CharStringError::InvalidOperator => write!(f, "invalid operator"),
            CharStringError::InvalidOperand => write!(f, "invalid operand"),
        }
    }
}

impl std::error::Error for CharStringError {}

pub trait OperatorHandler {
    fn context(&self) -> Context;

    fn apply(
        &mut self,
        op: Operator,
        machine: &mut Machine<'_>,
    ) -> Result<StackEffect, CharStringError>;
}

pub struct Machine<'a> {
    instructions: &'a [u8],
    call_stack: ArrayVec<[&'a [u8]; MAX_CALL_STACK_LEN]>,
    local_subrs: &'a [&'a [u8]],
    global_subrs: &'a [&'a [u8]],
    pub args: ArgumentsStack,
}

impl<'a> Machine<'a> {
    pub fn new(local_subrs: &'a [&'a [u8]], global_subrs: &'a [&'a [u8]]) -> Self {
        Machine {
            instructions: &[],
            call_stack: ArrayVec::new(),
            local_subrs,
            global_subrs,
            args: ArgumentsStack::new(),
        }
    }

    /// Execute `instructions` until they are exhausted or the handler interrupts.
    ///
    /// The argument stack is reset first. Reaching the end of a subroutine without an
    /// explicit `return` resumes the caller.
    pub fn run<H: OperatorHandler>(
        &mut self,
        instructions: &'a [u8],
        handler: &mut H,
    ) -> Result<(), CharStringError> {
        let context = handler.context();
        self.instructions = instructions;
        self.call_stack.clear();
        self.args.clear();

        loop {
            if self.instructions.is_empty() {
                match self.call_stack.pop() {
                    Some(caller) => {
                        self.instructions = caller;
                        continue;
                    }
                    None => return Ok(()),
                }
            }

            if self.parse_number(context)? {
                continue;
            }

            let op = match self.instructions {
                [ESCAPE, code, rest @ ..] => {
                    self.instructions = rest;
                    Operator {
                        code: *code,
                        escaped: true,
                    }
                }
                [ESCAPE] => return Err(CharStringError::InvalidBytecode),
                [code, rest @ ..] => {
                    self.instructions = rest;
                    Operator {
                        code: *code,
                        escaped: false,
                    }
                }
                [] => return Err(CharStringError::InvalidBytecode),
            };

            match handler.apply(op, self)? {
                StackEffect::Interrupt => return Ok(()),
                StackEffect::Clear => self.args.clear(),
                StackEffect::Pop(n) => {
                    self.args.pop_n(n).map_err(|_| CharStringError::InvalidBytecode)?;
                }
            }
        }
    }

    /// Decode one operand if the next byte starts one. Returns `false` when the next byte
    /// is an operator.
    fn parse_number(&mut self, context: Context) -> Result<bool, CharStringError> {
        let charstring = matches!(
            context,
            Context::Type1Charstring | Context::Type2Charstring
        );
        let (number, len) = match self.instructions {
            [28, b1, b2, ..] => (i32::from(i16::from_be_bytes([*b1, *b2])), 3),
            [29, b1, b2, b3, b4, ..] if context != Context::Type2Charstring => {
                (i32::from_be_bytes([*b1, *b2, *b3, *b4]), 5)
            }
            [30, rest @ ..] if !charstring => {
                // Only DICT data uses reals and none of the DICT values read here need a
                // fractional part.
                let (value, len) = parse_real(rest)?;
                (value.round() as i32, len + 1)
            }
            [b0 @ 32..=246, ..] => (i32::from(*b0) - 139, 1),
            [b0 @ 247..=250, b1, ..] => ((i32::from(*b0) - 247) * 256 + i32::from(*b1) + 108, 2),
            [b0 @ 251..=254, b1, ..] => (-(i32::from(*b0) - 251) * 256 - i32::from(*b1) - 108, 2),
            [255, b1, b2, b3, b4, ..] if charstring => {
                let value = i32::from_be_bytes([*b1, *b2, *b3, *b4]);
                if context == Context::Type2Charstring {
                    // 16.16 fixed point, keep the integer part
                    (value >> 16, 5)
                } else {
                    (value, 5)
                }
            }
            // truncated operands
            [28, ..] | [247..=254, ..] => return Err(CharStringError::InvalidBytecode),
            [29, ..] if context != Context::Type2Charstring => {
                return Err(CharStringError::InvalidBytecode)
            }
            [255, ..] if charstring => return Err(CharStringError::InvalidBytecode),
            _ => return Ok(false),
        };

        self.args.push(number)?;
        self.instructions = &self.instructions[len..];
        Ok(true)
    }

    /// Jump into subroutine `index` (already biased), saving the rest of the current
    /// instructions.
    pub fn call_subroutine(
        &mut self,
        index: i32,
        subrs: Subroutines,
    ) -> Result<(), CharStringError> {
        let subrs_array = match subrs {
            Subroutines::Local => self.local_subrs,
            Subroutines::Global => self.global_subrs,
        };
        let subr = usize::try_from(index)
            .ok()
            .and_then(|index| subrs_array.get(index))
            .ok_or(CharStringError::InvalidSubroutineIndex)?;
        if self.call_stack.len() == MAX_CALL_STACK_LEN {
            return Err(CharStringError::TooDeep);
        }
        self.call_stack.push(self.instructions);
        self.instructions = subr;
        Ok(())
    }

    pub fn return_from_subroutine(&mut self) -> Result<(), CharStringError> {
        match self.call_stack.pop() {
            Some(caller) => {
                self.instructions = caller;
                Ok(())
            }
            None => Err(CharStringError::InvalidBytecode),
        }
    }

    /// Skip `len` bytes of inline data, such as a hintmask.
    pub fn skip_bytes(&mut self, len: usize) -> Result<(), CharStringError> {
        if len > self.instructions.len() {
            return Err(CharStringError::InvalidBytecode);
        }
        self.instructions = &self.instructions[len..];
        Ok(())
    }

    pub fn subroutine_count(&self, subrs: Subroutines) -> usize {
        match subrs {
            Subroutines::Local => self.local_subrs.len(),
            Subroutines::Global => self.global_subrs.len(),
        }
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }
}

/// Decode a nibble encoded real number, returning the value and the number of bytes used.
fn parse_real(data: &[u8]) -> Result<(f32, usize), CharStringError> {
    let mut text = String::new();
    for (i, byte) in data.iter().enumerate() {
        for nibble in [byte >> 4, byte & 0xF] {
            match nibble {
                0..=9 => text.push(char::from(b'0' + nibble)),
                0xA => text.push('.'),
                0xB => text.push('E'),
                0xC => text.push_str("E-"),
                0xE => text.push('-'),
                0xF => {
                    let value = text
                        .parse::<f32>()
                        .map_err(|_| CharStringError::InvalidOperand)?;
                    return Ok((value, i + 1));
                }
                _ => return Err(CharStringError::InvalidOperand),
            }
        }
    }
    Err(CharStringError::InvalidBytecode)
}

/// Bias applied to Type2 subroutine numbers, which depends on the number of subroutines.
pub fn calc_subroutine_bias(len: usize) -> i32 {
    if len < 1240 {
        107
    } else if len < 33900 {
        1131
    } else {
        32768
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every operator it sees, with the arguments present at the time.
    struct Recorder {
        context: Context,
        seen: Vec<(Operator, Vec<i32>)>,
    }

    impl Recorder {
        fn new(context: Context) -> Self {
            Recorder {
                context,
                seen: Vec::new(),
            }
        }
    }

    impl OperatorHandler for Recorder {
        fn context(&self) -> Context {
            self.context
        }

        fn apply(
            &mut self,
            op: Operator,
            machine: &mut Machine<'_>,
        ) -> Result<StackEffect, CharStringError> {
            self.seen.push((op, machine.args.all().to_vec()));
            match (op.escaped, op.code) {
                (false, 10) => {
                    let index = machine.args.pop()?;
                    machine.call_subroutine(index, Subroutines::Local)?;
                    Ok(StackEffect::Pop(0))
                }
                (false, 11) => {
                    machine.return_from_subroutine()?;
                    Ok(StackEffect::Pop(0))
                }
                (false, 14) => Ok(StackEffect::Interrupt),
                _ => Ok(StackEffect::Clear),
            }
        }
    }

    fn op(code: u8) -> Operator {
        Operator {
            code,
            escaped: false,
        }
    }

    #[test]
    fn empty_program() {
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        machine.run(&[], &mut recorder).unwrap();
        assert!(recorder.seen.is_empty());
        assert!(machine.args.is_empty());
    }

    #[test]
    fn operand_encodings() {
        let program = [
            139, // 0
            247, 0, // 108
            251, 0, // -108
            28, 0x12, 0x34, // 0x1234
            255, 0, 1, 0, 0, // 1.0 in 16.16
            21,
        ];
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        machine.run(&program, &mut recorder).unwrap();
        assert_eq!(recorder.seen, vec![(op(21), vec![0, 108, -108, 0x1234, 1])]);
    }

    #[test]
    fn int32_only_outside_type2() {
        let program = [29, 0, 1, 0, 0, 17];
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::TopDict);
        machine.run(&program, &mut recorder).unwrap();
        assert_eq!(recorder.seen, vec![(op(17), vec![0x10000])]);

        // In a Type2 charstring byte 29 is callgsubr.
        let mut recorder = Recorder::new(Context::Type2Charstring);
        let program = [139, 29];
        machine.run(&program, &mut recorder).unwrap();
        assert_eq!(recorder.seen, vec![(op(29), vec![0])]);
    }

    #[test]
    fn real_operand() {
        // -2.25
        let program = [30, 0xE2, 0xA2, 0x5F, 18];
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::PrivateDict);
        machine.run(&program, &mut recorder).unwrap();
        assert_eq!(recorder.seen, vec![(op(18), vec![-2])]);
    }

    #[test]
    fn truncated_operand() {
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        assert_eq!(
            machine.run(&[28, 1], &mut recorder),
            Err(CharStringError::InvalidBytecode)
        );
        assert_eq!(
            machine.run(&[ESCAPE], &mut recorder),
            Err(CharStringError::InvalidBytecode)
        );
    }

    #[test]
    fn subroutine_call_and_return() {
        let subr: &[u8] = &[140, 11];
        let locals = [subr];
        let mut machine = Machine::new(&locals, &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        // push 1, call subr 0 (pushes 1, returns), then rlineto
        machine.run(&[140, 139, 10, 5], &mut recorder).unwrap();
        assert_eq!(recorder.seen.last(), Some(&(op(5), vec![1, 1])));
    }

    #[test]
    fn implicit_return() {
        let subr: &[u8] = &[141];
        let locals = [subr];
        let mut machine = Machine::new(&locals, &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        machine.run(&[139, 10, 5], &mut recorder).unwrap();
        assert_eq!(recorder.seen.last(), Some(&(op(5), vec![2])));
    }

    #[test]
    fn invalid_subroutine_index() {
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        assert_eq!(
            machine.run(&[139, 10], &mut recorder),
            Err(CharStringError::InvalidSubroutineIndex)
        );
    }

    #[test]
    fn recursion_too_deep() {
        // subroutine 0 calls itself forever
        let subr: &[u8] = &[139, 10];
        let locals = [subr];
        let mut machine = Machine::new(&locals, &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        assert_eq!(
            machine.run(&[139, 10], &mut recorder),
            Err(CharStringError::TooDeep)
        );
        assert_eq!(machine.call_depth(), MAX_CALL_STACK_LEN);
    }

    #[test]
    fn argument_stack_overflow() {
        let program = [139; MAX_ARGUMENTS_STACK_LEN + 1];
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        assert_eq!(
            machine.run(&program, &mut recorder),
            Err(CharStringError::StackOverflow)
        );
    }

    #[test]
    fn interrupt_stops_execution() {
        let mut machine = Machine::new(&[], &[]);
        let mut recorder = Recorder::new(Context::Type2Charstring);
        machine.run(&[14, 139, 5], &mut recorder).unwrap();
        assert_eq!(recorder.seen, vec![(op(14), vec![])]);
    }

    #[test]
    fn bias() {
        assert_eq!(calc_subroutine_bias(0), 107);
        assert_eq!(calc_subroutine_bias(1240), 1131);
        assert_eq!(calc_subroutine_bias(33900), 32768);
    }
}
