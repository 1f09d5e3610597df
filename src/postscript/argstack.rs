// This file is derived from ttf-parser, licenced under Apache-2.0.
// https://github.com/RazrFalcon/ttf-parser/blob/439aaaebd50eb8aed66302e3c1b51fae047f85b2/src/tables/cff/argstack.rs

use std::fmt;

use super::{CharStringError, MAX_ARGUMENTS_STACK_LEN};

/// Operand stack of the charstring machine.
///
/// Items live in `data[..len]`; the next value to pop is `data[len - 1]`.
#[derive(Clone)]
pub struct ArgumentsStack {
    data: [i32; MAX_ARGUMENTS_STACK_LEN],
    len: usize,
}

impl ArgumentsStack {
    pub fn new() -> Self {
        ArgumentsStack {
            data: [0; MAX_ARGUMENTS_STACK_LEN],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, n: i32) -> Result<(), CharStringError> {
        if self.len == MAX_ARGUMENTS_STACK_LEN {
            Err(CharStringError::StackOverflow)
        } else {
            self.data[self.len] = n;
            self.len += 1;
            Ok(())
        }
    }

    /// Value at `index`, counted from the bottom of the stack.
    pub fn at(&self, index: usize) -> i32 {
        self.all().get(index).copied().unwrap_or(0)
    }

    /// The value that would be popped next.
    pub fn top(&self) -> Option<i32> {
        self.all().last().copied()
    }

    pub fn pop(&mut self) -> Result<i32, CharStringError> {
        if self.is_empty() {
            return Err(CharStringError::StackUnderflow);
        }
        self.len -= 1;
        Ok(self.data[self.len])
    }

    /// pop n values from the stack
    pub fn pop_n(&mut self, n: usize) -> Result<&[i32], CharStringError> {
        if n > self.len {
            return Err(CharStringError::StackUnderflow);
        }
        self.len -= n;
        Ok(&self.data[self.len..self.len + n])
    }

    /// Restore `n` previously popped values, as required by the Type1 `pop` operator.
    pub fn unpop(&mut self, n: usize) -> Result<(), CharStringError> {
        if self.len + n > MAX_ARGUMENTS_STACK_LEN {
            return Err(CharStringError::StackOverflow);
        }
        self.len += n;
        Ok(())
    }

    pub fn all(&self) -> &[i32] {
        &self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for ArgumentsStack {
    fn default() -> Self {
        ArgumentsStack::new()
    }
}

impl fmt::Debug for ArgumentsStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.all()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop() {
        let mut stack = ArgumentsStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.pop(), Ok(2));
        assert_eq!(stack.all(), &[1]);
        assert_eq!(stack.pop(), Ok(1));
        assert_eq!(stack.pop(), Err(CharStringError::StackUnderflow));
    }

    #[test]
    fn overflow() {
        let mut stack = ArgumentsStack::new();
        for i in 0..MAX_ARGUMENTS_STACK_LEN {
            stack.push(i as i32).unwrap();
        }
        assert_eq!(stack.push(0), Err(CharStringError::StackOverflow));
        assert_eq!(stack.len(), MAX_ARGUMENTS_STACK_LEN);
    }

    #[test]
    fn pop_n_returns_in_push_order() {
        let mut stack = ArgumentsStack::new();
        for i in 1..=4 {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.pop_n(3).unwrap(), &[2, 3, 4]);
        stack.unpop(2).unwrap();
        assert_eq!(stack.all(), &[1, 2, 3]);
    }
}
