//! The LSCVM emulator.
//!
//! # Execution model
//!
//! A program is a flat ASCII string of single-character instructions.  The
//! machine state is a program counter, a data stack and a call stack of
//! 32-bit words, and a fixed-size word-addressed memory, zeroed at startup.
//! Execution runs top to bottom until the counter walks off the end of the
//! program; `B` halts by moving it there.
//!
//! # Instruction set
//!
//! ```txt
//! a-j    push the constant 0..9
//! A S M  pop y, pop x, push x+y / x-y / x*y        (wrapping)
//! V      pop y, pop x, push x/y                    (y == 0 is fatal)
//! J      pop y, pop x, push -1 | 0 | 1 as x <=> y  (unsigned order)
//! D      drop the top of the stack
//! F      pop n, push a copy of the element n deep  (0 = top)
//! H      pop n, remove the element n deep and push it
//! E      pop addr, push memory[addr]
//! K      pop addr, pop val, memory[addr] = val
//! I      pop, print as a signed decimal integer
//! P      pop, print the low 8 bits as a character
//! C      pop f, save pc on the call stack, jump to f
//! R      pop the call stack into pc
//! G      pop ofs, pc += ofs                        (ofs is two's complement)
//! Z      pop ofs, pop cond, pc += ofs if cond == 0
//! B      halt
//! ? !    reserved for a debugger; no-ops
//! ```
//!
//! Space and newline are no-ops.  In source form `;` starts a comment that
//! runs to the end of the line; [sanitize] strips comments, maps each
//! whitespace byte to a single space (so cycle counts are preserved), and
//! warns about and drops anything that is not an instruction.
//!
//! # Errors
//!
//! Every fault — stack underflow, out-of-bounds memory or jump targets,
//! division by zero, an unknown opcode — is non-recoverable: the run loop
//! stops and reports a [MachineError].  Emitted programs are expected by
//! construction never to trigger one, so any fault indicates a code
//! generator bug, not a user error.

use std::io::Write;

use derive_more::Display;
use regex::Regex;

/// Words of addressable memory.
pub const MEMORY_SIZE: usize = 0x13880;

pub const OP_ADD: char = 'A';
pub const OP_HALT: char = 'B';
pub const OP_CALL: char = 'C';
pub const OP_DROP: char = 'D';
pub const OP_READ_MEM: char = 'E';
pub const OP_FETCH_STACK: char = 'F';
pub const OP_JMP_REL: char = 'G';
pub const OP_FETCH_DEL_STACK: char = 'H';
pub const OP_PRINT_INT: char = 'I';
pub const OP_COMPARE: char = 'J';
pub const OP_WRITE_MEM: char = 'K';
pub const OP_MULTIPLY: char = 'M';
pub const OP_PRINT_CHAR: char = 'P';
pub const OP_RETURN: char = 'R';
pub const OP_SUBTRACT: char = 'S';
pub const OP_DIVIDE: char = 'V';
pub const OP_JMP_REL_IF_ZERO: char = 'Z';

/// A fatal machine fault.
#[derive(Display)]
pub enum MachineError {
    #[display("stack underflow")]
    StackUnderflow,
    #[display("return with an empty call stack")]
    CallStackUnderflow,
    #[display("read from address '{_0:#x}' out of bounds")]
    ReadOutOfBounds(u32),
    #[display("write to address '{_0:#x}' out of bounds")]
    WriteOutOfBounds(u32),
    #[display("fetch stack '{_0:#x}' out of bounds")]
    FetchOutOfBounds(u32),
    #[display("call to instruction '{_0}' out of bounds")]
    CallOutOfBounds(u32),
    #[display("jump to instruction '{_0}' out of bounds")]
    JumpOutOfBounds(usize),
    #[display("division by zero")]
    DivideByZero,
    #[display("invalid instruction '{_0}'")]
    BadOpcode(char),
    #[display("print failed: {_0}")]
    Print(std::io::Error),
}

impl std::fmt::Debug for MachineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Strip a program down to executable form: comments removed, each
/// whitespace byte turned into one space, debugger taps kept, anything else
/// warned about on stderr and dropped.
pub fn sanitize(input: &str) -> String {
    let comment = Regex::new(r";[^\n]*").unwrap();
    let input = comment.replace_all(input, "");

    let mut clean = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            _ if c.is_whitespace() => clean.push(' '),
            '?' | '!' => clean.push(c),
            'a'..='j' | 'A'..='K' | 'M' | 'P' | 'R' | 'S' | 'V' | 'Z' => clean.push(c),
            _ => eprintln!("warning: skipping invalid input character '{c}'"),
        }
    }
    clean
}

/// Sanitize and run a program, writing its output to `out`.
pub fn execute_program(input: &str, out: &mut impl Write) -> Result<(), MachineError> {
    Machine::new(sanitize(input).into_bytes()).run(out)
}

pub struct Machine {
    pc: usize,
    code: Vec<u8>,
    stack: Vec<u32>,
    call_stack: Vec<usize>,
    memory: Box<[u32]>,
}

impl Machine {
    /// Build a machine around already-sanitized code.  Unknown bytes are
    /// still rejected, at execution time.
    pub fn new(code: Vec<u8>) -> Machine {
        Machine {
            pc: 0,
            code,
            stack: Vec::new(),
            call_stack: Vec::new(),
            memory: vec![0u32; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// The data stack, bottom first.  Mostly useful to inspect what a
    /// program left behind.
    pub fn into_stack(self) -> Vec<u32> {
        self.stack
    }

    pub fn run(&mut self, out: &mut impl Write) -> Result<(), MachineError> {
        while self.pc < self.code.len() {
            let op = char::from(self.code[self.pc]);
            match op {
                'a'..='j' => self.stack.push(op as u32 - 'a' as u32),

                OP_ADD => {
                    let (x, y) = self.pop2()?;
                    self.stack.push(x.wrapping_add(y));
                }
                OP_SUBTRACT => {
                    let (x, y) = self.pop2()?;
                    self.stack.push(x.wrapping_sub(y));
                }
                OP_MULTIPLY => {
                    let (x, y) = self.pop2()?;
                    self.stack.push(x.wrapping_mul(y));
                }
                OP_DIVIDE => {
                    let (x, y) = self.pop2()?;
                    if y == 0 {
                        return Err(MachineError::DivideByZero);
                    }
                    self.stack.push(x / y);
                }
                OP_COMPARE => {
                    let (x, y) = self.pop2()?;
                    let ord = match x.cmp(&y) {
                        std::cmp::Ordering::Less => -1i32,
                        std::cmp::Ordering::Equal => 0,
                        std::cmp::Ordering::Greater => 1,
                    };
                    self.stack.push(ord as u32);
                }

                OP_DROP => {
                    self.pop()?;
                }
                OP_FETCH_STACK => {
                    let n = self.pop()?;
                    let i = self.depth_index(n)?;
                    let v = self.stack[i];
                    self.stack.push(v);
                }
                OP_FETCH_DEL_STACK => {
                    let n = self.pop()?;
                    let i = self.depth_index(n)?;
                    let v = self.stack.remove(i);
                    self.stack.push(v);
                }

                OP_READ_MEM => {
                    let addr = self.pop()?;
                    let v = *self
                        .memory
                        .get(addr as usize)
                        .ok_or(MachineError::ReadOutOfBounds(addr))?;
                    self.stack.push(v);
                }
                OP_WRITE_MEM => {
                    let addr = self.pop()?;
                    let val = self.pop()?;
                    *self
                        .memory
                        .get_mut(addr as usize)
                        .ok_or(MachineError::WriteOutOfBounds(addr))? = val;
                }

                OP_PRINT_INT => {
                    let v = self.pop()?;
                    write!(out, "{}", v as i32).map_err(MachineError::Print)?;
                    out.flush().map_err(MachineError::Print)?;
                }
                OP_PRINT_CHAR => {
                    let v = self.pop()?;
                    out.write_all(&[(v & 0xff) as u8]).map_err(MachineError::Print)?;
                    out.flush().map_err(MachineError::Print)?;
                }

                OP_CALL => {
                    let f = self.pop()?;
                    if f as usize >= self.code.len() {
                        return Err(MachineError::CallOutOfBounds(f));
                    }
                    self.call_stack.push(self.pc);
                    // -1 because the loop increments afterwards.  A call to
                    // instruction 0 wraps the unsigned counter and the
                    // increment wraps it back; both operations are defined.
                    self.pc = (f as usize).wrapping_sub(1);
                }
                OP_RETURN => {
                    self.pc = self
                        .call_stack
                        .pop()
                        .ok_or(MachineError::CallStackUnderflow)?;
                }
                OP_JMP_REL => {
                    let ofs = self.pop()?;
                    self.jump(ofs)?;
                }
                OP_JMP_REL_IF_ZERO => {
                    let ofs = self.pop()?;
                    let cond = self.pop()?;
                    if cond == 0 {
                        self.jump(ofs)?;
                    }
                }

                OP_HALT => self.pc = self.code.len(),

                '?' | '!' | ' ' | '\n' => {}

                _ => return Err(MachineError::BadOpcode(op)),
            }

            self.pc = self.pc.wrapping_add(1);
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<u32, MachineError> {
        self.stack.pop().ok_or(MachineError::StackUnderflow)
    }

    /// Pop the two operands of a binary instruction: the top of the stack
    /// is the right-hand side.
    fn pop2(&mut self) -> Result<(u32, u32), MachineError> {
        let y = self.pop()?;
        let x = self.pop()?;
        Ok((x, y))
    }

    fn depth_index(&self, n: u32) -> Result<usize, MachineError> {
        if (n as usize) < self.stack.len() {
            Ok(self.stack.len() - 1 - n as usize)
        } else {
            Err(MachineError::FetchOutOfBounds(n))
        }
    }

    /// Adjust the counter by a two's-complement offset.  The offset lands
    /// on the instruction *before* the target; the main loop's increment
    /// finishes the jump.
    fn jump(&mut self, ofs: u32) -> Result<(), MachineError> {
        let target = self.pc.wrapping_add(ofs as i32 as isize as usize);
        if target >= self.code.len() {
            return Err(MachineError::JumpOutOfBounds(self.pc));
        }
        self.pc = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(program: &str) -> (String, Vec<u32>) {
        let mut out = Vec::new();
        let mut m = Machine::new(program.bytes().collect());
        m.run(&mut out).expect("program should not fault");
        (String::from_utf8(out).unwrap(), m.into_stack())
    }

    fn fault(program: &str) -> MachineError {
        Machine::new(program.bytes().collect())
            .run(&mut Vec::new())
            .expect_err("program should fault")
    }

    #[test]
    fn empty_program_does_nothing() {
        assert_eq!(run(""), (String::new(), vec![]));
    }

    #[test]
    fn arithmetic_round_trips() {
        assert_eq!(run("jI").0, "9");
        assert_eq!(run("jjAI").0, "18");
        assert_eq!(run("jjMI").0, "81");
        assert_eq!(run("dcSI").0, "1");
        assert_eq!(run("cfMI").0, "10");
        assert_eq!(run("ghMI").0, "42");
    }

    #[test]
    fn whitespace_is_a_no_op() {
        assert_eq!(run("c I a I c c A I").0, "204");
    }

    #[test]
    fn subtraction_can_go_negative() {
        let (out, stack) = run("cdSI");
        assert_eq!(out, "-1");
        assert_eq!(stack, vec![]);
    }

    #[test]
    fn compare_pushes_exactly_one_word() {
        assert_eq!(run("fdJ").1, vec![1]);
        assert_eq!(run("dfJ").1, vec![(-1i32) as u32]);
        assert_eq!(run("eeJ").1, vec![0]);
    }

    #[test]
    fn division() {
        assert_eq!(run("icVI").0, "4");
        assert!(matches!(fault("baV"), MachineError::DivideByZero));
    }

    #[test]
    fn fetch_duplicates() {
        // push 9, fetch depth 0
        assert_eq!(run("jaF").1, vec![9, 9]);
        // push 9 7, fetch depth 1
        assert_eq!(run("jhbF").1, vec![9, 7, 9]);
    }

    #[test]
    fn fetch_del_rotates() {
        // push 9 7, lift depth 1 to the top
        assert_eq!(run("jhbH").1, vec![7, 9]);
    }

    #[test]
    fn memory_round_trip() {
        // mem[3] = 9, read it back, print
        assert_eq!(run("jdKdEI").0, "9");
    }

    #[test]
    fn memory_starts_zeroed() {
        assert_eq!(run("cEI").0, "0");
    }

    #[test]
    fn call_and_return() {
        // call to offset 3, which prints 9 and returns to the halt
        assert_eq!(run("dCBjIR").0, "9");
    }

    #[test]
    fn conditional_jump() {
        // cond 0: skip the print
        assert_eq!(run("acZjIB").0, "");
        // cond 1: fall through
        assert_eq!(run("bcZjIB").0, "9");
    }

    #[test]
    fn backward_jump() {
        // hop over the payload, then jump back into it with offset -7
        assert_eq!(run("dGjIBahSG").0, "9");
    }

    #[test]
    fn print_char_uses_low_byte() {
        assert_eq!(run("fgAdMP").0, "!");
        // 353 & 0xff == 97 == 'a'
        assert_eq!(run("dcfMMfAcfMMdAP").0, "a");
    }

    #[test]
    fn faults() {
        assert!(matches!(fault("A"), MachineError::StackUnderflow));
        assert!(matches!(fault("R"), MachineError::CallStackUnderflow));
        assert!(matches!(fault("abSE"), MachineError::ReadOutOfBounds(_)));
        assert!(matches!(fault("jabSK"), MachineError::WriteOutOfBounds(_)));
        assert!(matches!(fault("bF"), MachineError::FetchOutOfBounds(_)));
        assert!(matches!(fault("jC"), MachineError::CallOutOfBounds(9)));
        assert!(matches!(fault("jG"), MachineError::JumpOutOfBounds(_)));
        assert!(matches!(fault("q"), MachineError::BadOpcode('q')));
    }

    #[test]
    fn sanitize_strips_comments_and_junk() {
        assert_eq!(sanitize("jI ; print nine\njjAI"), "jI  jjAI");
        assert_eq!(sanitize("j\t\nI"), "j  I");
        assert_eq!(sanitize("j?!I"), "j?!I");
        assert_eq!(sanitize("jLNOQTUWXYkxyzI"), "jI");
    }

    #[test]
    fn execute_program_sanitizes_first() {
        let mut out = Vec::new();
        execute_program("gh ; six times seven\nMI", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "42");
    }
}
