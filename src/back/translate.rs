//! SSA to LSCVM lowering.
//!
//! The target is about as impoverished as a machine can be: no registers,
//! no immediate operands, no absolute jumps.  Everything is built out of
//! single-digit pushes, two stacks, a small flat memory and relative jumps.
//! This module turns an [ir::Module] into one linear program for it.
//!
//! # Memory map
//!
//! ```txt
//!   0x00000 ┬ general memory
//!   0x10000 │ the stack pointer: one word naming the top of the frame area
//!   0x10001 │ in-memory frames (grow upward), one per active function
//!   0x12000 │ the constant pool (string globals)
//!   0x13880 ┴ end of memory
//! ```
//!
//! The "stack pointer" is a convention of this translator, not of the
//! machine: SSA temporaries live directly on the data stack and are fetched
//! with `F` at computed depths, but lvalues (frame allocations) must be
//! spilled to memory because the data stack cannot be written in place.
//!
//! # Calling convention
//!
//! 1. The caller pushes the argument words right to left, so the callee
//!    sees the first argument nearest the top.
//! 2. The caller pushes the callee's address (via a patched relocation) and
//!    executes `C`.
//! 3. The callee's prologue reads the stack pointer, keeps the old value on
//!    the data stack, and bumps the pointer by its frame size.
//! 4. On return the callee drops its stack-resident locals, restores the
//!    stack pointer from the saved word, consumes the argument words, and
//!    leaves only the return words for the caller before `R`.
//!
//! There are no registers, so there is nothing else to save.  Multi-word
//! values are laid out in memory most-significant word first.
//!
//! # Relocations
//!
//! Function and block addresses are unknown while code is being emitted, so
//! every address operand is written as a placeholder of 32 spaces (spaces
//! execute as no-ops) and recorded for a patch pass that runs once the
//! whole program, with its memory initializers prepended, is laid out.
//! Absolute relocations are patched with the target's final offset;
//! relative ones with `target - origin`, where the origin was recorded as
//! the instruction just past the jump that consumes the offset.  Patches
//! are written as a parenthesized integer materialization padded with
//! spaces to exactly 32 bytes; the parentheses are stripped by the loader's
//! sanitizer and exist only for readability of the emitted text.

use derive_more::Display;

use crate::common::Map;
use crate::ir::{
    BinOp, Cmp, Constant, Function, Inst, InstKind, Module, Operand, Terminator, Type, ValueId,
};

use super::encode;
use super::vm::{
    OP_ADD, OP_CALL, OP_COMPARE, OP_DIVIDE, OP_DROP, OP_FETCH_DEL_STACK, OP_FETCH_STACK, OP_HALT,
    OP_JMP_REL, OP_JMP_REL_IF_ZERO, OP_MULTIPLY, OP_PRINT_CHAR, OP_PRINT_INT, OP_READ_MEM,
    OP_RETURN, OP_SUBTRACT, OP_WRITE_MEM,
};

pub const WORD_SIZE: usize = 4;

/// Placeholders are this wide, and a patched address must fit in one.
pub const MAX_RELOCATION_SIZE: usize = 32;

// limits are imposed by the machine!
pub const MAX_PROGRAM_SIZE: usize = 0x2000;

pub const STACK_POINTER_IN_MEMORY: i32 = 0x10000;
pub const STACK_FRAME_IN_MEMORY: i32 = 0x10001;

pub const CONSTANT_OFFSET_IN_MEMORY: i32 = 0x12000;
pub const MAX_MEMORY_SIZE: i32 = 0x13880;

pub const INTRINSIC_PRINT_CHAR: &str = "lscvm.P";
pub const INTRINSIC_PRINT_INT: &str = "lscvm.I";

// spaces are also no-ops, so that's good.
const EMPTY_RELOCATION: &str = "                                ";

/// A compile error worth reporting to the user.  Anything else the
/// translator trips over — an unmapped value id, a clobbered placeholder, a
/// frame allocation past the frame's end — is a translator bug and panics.
#[derive(Display)]
pub enum TranslateError {
    #[display("module has no entry function")]
    MissingEntry,
    #[display("program size {_0:#x} exceeds the maximum 0x2000")]
    ProgramTooLarge(usize),
    #[display("encoded address for '{target}' ({value}) exceeds the relocation size")]
    RelocationTooLarge { target: String, value: i32 },
    #[display("string '{name}' does not fit in constant memory")]
    ConstantPoolOverflow { name: String },
}

impl std::fmt::Debug for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Lower a module to one LSCVM program.
pub fn translate(module: &Module) -> Result<String, TranslateError> {
    let mut t = Translator::new(module);
    t.emit_module()?;
    t.finalize()
}

/// Words a value of `ty` occupies on the stack or in memory.
pub fn size_in_words(ty: &Type) -> usize {
    let sz = ty.size_in_bytes();
    if sz == 0 {
        return 0;
    }
    std::cmp::max(1, sz / WORD_SIZE)
}

struct Translator<'m> {
    module: &'m Module,

    program: String,

    // these must run first to set up all our constants.
    memory_initializers: Vec<String>,

    // string global -> its constant-pool address
    memory_value_map: Map<ValueId, i32>,

    // so we can jump around.
    function_locations: Map<ValueId, usize>,
    block_locations: Map<ValueId, usize>,

    // program offset of a placeholder -> the id whose address goes there
    relocations: Map<usize, ValueId>,

    // same, but patched with target - origin.
    relative_relocations: Map<usize, (ValueId, usize)>,

    constant_memory_watermark: i32,
    cached_constants: Map<Constant, String>,

    // per-function state
    types: Map<ValueId, Type>,
    stack_frame_value_map: Map<ValueId, i32>,
    stack_values: Map<ValueId, i32>,
    current_stack_offset: i32,
    current_stack_frame_size: i32,
}

impl<'m> Translator<'m> {
    fn new(module: &'m Module) -> Translator<'m> {
        Translator {
            module,
            program: String::new(),
            memory_initializers: Vec::new(),
            memory_value_map: Map::new(),
            function_locations: Map::new(),
            block_locations: Map::new(),
            relocations: Map::new(),
            relative_relocations: Map::new(),
            constant_memory_watermark: CONSTANT_OFFSET_IN_MEMORY,
            cached_constants: Map::new(),
            types: Map::new(),
            stack_frame_value_map: Map::new(),
            stack_values: Map::new(),
            current_stack_offset: 0,
            current_stack_frame_size: 0,
        }
    }

    /// Emit initializers, the module prologue, and every function body.
    /// After this, all that is left is prepending and patching.
    fn emit_module(&mut self) -> Result<(), TranslateError> {
        self.layout_strings()?;

        // set up the stack pointer.
        let init = format!(
            "{}{}{}",
            encode::integer(STACK_FRAME_IN_MEMORY),
            encode::integer(STACK_POINTER_IN_MEMORY),
            OP_WRITE_MEM
        );
        self.memory_initializers.push(init);

        // run the global initializers, if the module has any...
        if let Some(init_fn) = self.module.global_init {
            self.add_relocation(init_fn);
            self.emit_op(OP_CALL);
        }

        // ...then call main...
        let entry = self.module.entry.ok_or(TranslateError::MissingEntry)?;
        self.add_relocation(entry);
        self.emit_op(OP_CALL);

        // ...then quit.
        self.emit_op(OP_HALT);

        for func in &self.module.functions {
            if func.is_declaration() {
                continue;
            }
            self.translate_function(func);
        }
        Ok(())
    }

    fn layout_strings(&mut self) -> Result<(), TranslateError> {
        for s in &self.module.strings {
            let loc = self.constant_memory_watermark;

            let mut init = String::new();
            for c in s.text.chars() {
                if self.constant_memory_watermark >= MAX_MEMORY_SIZE {
                    return Err(TranslateError::ConstantPoolOverflow {
                        name: s.name.to_string(),
                    });
                }
                init.push_str(&encode::integer(c as i32));
                init.push_str(&encode::integer(self.constant_memory_watermark));
                init.push(OP_WRITE_MEM);
                self.constant_memory_watermark += 1;
            }

            self.memory_initializers.push(init);
            self.memory_value_map.insert(s.id, loc);
        }
        Ok(())
    }

    fn translate_function(&mut self, func: &Function) {
        // this one is for the real stack
        self.stack_values.clear();
        self.current_stack_offset = 0;

        // this one is for the stack frame, ie. what lives in memory.
        self.stack_frame_value_map.clear();

        self.types.clear();
        for p in &func.params {
            self.types.insert(p.id, p.ty.clone());
        }
        for inst in func.blocks.iter().flat_map(|b| &b.insts) {
            self.types.insert(inst.id, inst.ty.clone());
        }

        // the caller pushed arguments right to left, so the first parameter
        // sits just under the saved stack pointer (which is at -1).
        let mut pos = -1;
        for p in &func.params {
            pos -= size_in_words(&p.ty) as i32;
            self.stack_values.insert(p.id, pos);
        }

        self.function_locations.insert(func.id, self.program.len());

        self.current_stack_frame_size = func
            .stack_allocations()
            .iter()
            .map(|ty| size_in_words(ty) as i32)
            .sum();

        // the function prologue: essentially
        // push %rbp; mov %rsp, %rbp; sub $N, %rsp
        {
            // keep the current stack pointer on the data stack...
            self.emit(&encode::integer(STACK_POINTER_IN_MEMORY));
            self.emit_op(OP_READ_MEM);

            // ...duplicate it...
            self.emit("a");
            self.emit_op(OP_FETCH_STACK);

            // ...bump it past our frame, and store it back.
            self.emit(&encode::integer(self.current_stack_frame_size));
            self.emit_op(OP_ADD);
            self.emit(&encode::integer(STACK_POINTER_IN_MEMORY));
            self.emit_op(OP_WRITE_MEM);
        }

        let mut frame_watermark = 0i32;

        for block in &func.blocks {
            self.block_locations.insert(block.id, self.program.len());

            for inst in &block.insts {
                self.lower_inst(inst, &mut frame_watermark);
            }
            self.lower_terminator(func, &block.term);
        }
    }

    fn lower_inst(&mut self, inst: &Inst, frame_watermark: &mut i32) {
        match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => {
                let base = self.current_stack_offset;
                self.push_operand(lhs);
                self.push_operand(rhs);
                self.emit_op(match op {
                    BinOp::Add => OP_ADD,
                    BinOp::Sub => OP_SUBTRACT,
                    BinOp::Mul => OP_MULTIPLY,
                    BinOp::Div => OP_DIVIDE,
                });
                self.current_stack_offset = base;
                self.record_local(inst);
            }

            InstKind::Compare { cmp, lhs, rhs } => self.lower_compare(inst, *cmp, lhs, rhs),

            InstKind::Alloc { ty } => {
                let sz = size_in_words(ty) as i32;
                if *frame_watermark + sz > self.current_stack_frame_size {
                    panic!("frame allocation for {} overruns the frame", inst.id);
                }
                let slot = *frame_watermark;
                *frame_watermark += sz;

                // small opt: make the base address once, use 'F' for the rest
                let addr = self.frame_addr(slot);
                self.emit(&addr);

                for i in 0..sz {
                    // write 0s.
                    self.emit("ab");
                    self.emit_op(OP_FETCH_STACK);
                    self.emit(&encode::integer(i));
                    self.emit_op(OP_ADD);
                    self.emit_op(OP_WRITE_MEM);
                }

                // throw the address away
                self.emit_op(OP_DROP);

                self.stack_frame_value_map.insert(inst.id, slot);
            }

            InstKind::Load { addr } => {
                let base = self.current_stack_offset;
                self.push_address(addr);
                self.emit_load(size_in_words(&inst.ty));
                self.current_stack_offset = base;
                self.record_local(inst);
            }

            InstKind::Store { value, addr } => {
                let base = self.current_stack_offset;
                let sz = size_in_words(&self.operand_type(value)) as i32;

                self.push_operand(value);

                // push the address once, then use 'F' to compute offsets.
                self.push_address(addr);

                for i in 0..sz {
                    // the current word of the (possibly multi-word) value
                    self.emit(&encode::integer(sz - i));
                    self.emit_op(OP_FETCH_STACK);
                    // the address again
                    self.emit("b");
                    self.emit_op(OP_FETCH_STACK);
                    self.emit(&encode::integer(i));
                    self.emit_op(OP_ADD);
                    self.emit_op(OP_WRITE_MEM);
                }

                self.emit_op(OP_DROP);
                for _ in 0..sz {
                    // drop the value also
                    self.emit_op(OP_DROP);
                }
                self.current_stack_offset = base;
            }

            InstKind::Call { callee, args } => self.lower_call(inst, *callee, args),
        }
    }

    fn lower_compare(&mut self, inst: &Inst, cmp: Cmp, lhs: &Operand, rhs: &Operand) {
        // The ordered comparisons multiply the three-way result of 'J' by a
        // constant and use it as a computed goto over two landing pads, so
        // execution falls onto one of three constant pushes.  The equality
        // forms are the simpler special case: subtract and select on zero.
        const TAIL_GT: &str = "cGeGJgMGaeGaaab";
        const TAIL_GE: &str = "cGeGJgMGbeGaaaa";

        let base = self.current_stack_offset;
        match cmp {
            Cmp::Eq => {
                self.push_operand(lhs);
                self.push_operand(rhs);
                // sub; jz +3; push 0; push 1; jmp +1; push 1
                self.emit("SdZabGb");
            }
            Cmp::Ne => {
                self.push_operand(lhs);
                self.push_operand(rhs);
                // like eq, with the result constants swapped
                self.emit("SdZbbGa");
            }
            Cmp::Gt => {
                self.push_operand(lhs);
                self.push_operand(rhs);
                self.emit(TAIL_GT);
            }
            Cmp::Lt => {
                // swap the operands
                self.push_operand(rhs);
                self.push_operand(lhs);
                self.emit(TAIL_GT);
            }
            Cmp::Ge => {
                // the lt form with the outputs inverted
                self.push_operand(rhs);
                self.push_operand(lhs);
                self.emit(TAIL_GE);
            }
            Cmp::Le => {
                self.push_operand(lhs);
                self.push_operand(rhs);
                self.emit(TAIL_GE);
            }
            Cmp::Order => {
                self.push_operand(lhs);
                self.push_operand(rhs);
                self.emit_op(OP_COMPARE);
            }
        }
        self.current_stack_offset = base;
        self.record_local(inst);
    }

    fn lower_call(&mut self, inst: &Inst, callee: ValueId, args: &[Operand]) {
        let target = self
            .module
            .function(callee)
            .unwrap_or_else(|| panic!("call to unknown function {callee}"));

        if target.is_declaration() {
            let base = self.current_stack_offset;
            match target.name.as_str() {
                INTRINSIC_PRINT_CHAR | INTRINSIC_PRINT_INT => {
                    assert!(args.len() == 1, "intrinsic '{}' takes one argument", target.name);
                    self.push_operand(&args[0]);
                    self.emit_op(if target.name.as_str() == INTRINSIC_PRINT_CHAR {
                        OP_PRINT_CHAR
                    } else {
                        OP_PRINT_INT
                    });
                }
                other => panic!("unknown intrinsic '{other}'"),
            }
            self.current_stack_offset = base;
            return;
        }

        let base = self.current_stack_offset;

        // arguments go right to left; the callee consumes them.
        for arg in args.iter().rev() {
            self.push_operand(arg);
        }

        self.add_relocation(callee);
        self.emit_op(OP_CALL);

        self.current_stack_offset = base;
        if target.ret != Type::Void {
            self.record_local(inst);
        }
    }

    fn lower_terminator(&mut self, func: &Function, term: &Terminator) {
        match term {
            Terminator::Jump(target) => {
                self.add_relative_relocation(*target);
                self.emit_op(OP_JMP_REL);
            }

            Terminator::Branch { cond, tt, ff } => {
                let base = self.current_stack_offset;
                self.push_operand(cond);

                // we want to jump if 1, so subtract 1 to make that zero.
                self.emit("b");
                self.emit_op(OP_SUBTRACT);

                self.add_relative_relocation(*tt);
                self.emit_op(OP_JMP_REL_IF_ZERO);

                self.add_relative_relocation(*ff);
                self.emit_op(OP_JMP_REL);

                self.current_stack_offset = base;
            }

            Terminator::Return(value) => {
                let live = self.current_stack_offset;
                if let Some(v) = value {
                    self.push_operand(v);
                }
                let ret_words = size_in_words(&func.ret) as i32;

                // drop the locals still resident beneath the return words
                for _ in 0..live {
                    self.drop_under(ret_words);
                }

                // the function epilogue: lift the saved stack pointer past
                // the return words and store it back.
                self.emit(&encode::integer(ret_words));
                self.emit_op(OP_FETCH_DEL_STACK);
                self.emit(&encode::integer(STACK_POINTER_IN_MEMORY));
                self.emit_op(OP_WRITE_MEM);

                // consume the arguments the caller pushed
                let arg_words: i32 = func
                    .params
                    .iter()
                    .map(|p| size_in_words(&p.ty) as i32)
                    .sum();
                for _ in 0..arg_words {
                    self.drop_under(ret_words);
                }

                self.emit_op(OP_RETURN);
                self.current_stack_offset = 0;
            }
        }
    }

    /// Remove the word `ret_words` deep, leaving everything above in place.
    fn drop_under(&mut self, ret_words: i32) {
        if ret_words == 0 {
            self.emit_op(OP_DROP);
        } else {
            self.emit(&encode::integer(ret_words));
            self.emit_op(OP_FETCH_DEL_STACK);
            self.emit_op(OP_DROP);
        }
    }

    /// Evaluate an operand onto the stack, loading lvalues.
    fn push_operand(&mut self, op: &Operand) {
        match op {
            Operand::Const(c) => {
                let s = self.constant(c);
                self.emit(&s);
                self.current_stack_offset += size_in_words(&c.ty) as i32;
            }

            Operand::Str(id) => {
                let addr = *self
                    .memory_value_map
                    .get(id)
                    .unwrap_or_else(|| panic!("no constant-pool address for {id}"));
                self.emit(&encode::integer(addr));
                self.current_stack_offset += 1;
            }

            Operand::Func(id) => panic!("function {id} used as a value"),

            Operand::Value(id) => {
                if let Some(&slot) = self.stack_frame_value_map.get(id) {
                    // an lvalue: compute its frame address, then load it.
                    let sz = size_in_words(&self.value_type(*id));
                    let addr = self.frame_addr(slot);
                    self.emit(&addr);
                    self.emit_load(sz);
                    self.current_stack_offset += sz as i32;
                } else if let Some(&pos) = self.stack_values.get(id) {
                    let sz = size_in_words(&self.value_type(*id)) as i32;

                    // one depth serves every word: each fetch buries the
                    // source a word deeper while the next word to fetch sits
                    // a word shallower.
                    let depth = self.current_stack_offset - 1 - pos;
                    assert!(depth >= 0, "stack value {id} is above the stack top");

                    for _ in 0..sz {
                        self.emit(&encode::integer(depth));
                        self.emit_op(OP_FETCH_STACK);
                    }
                    self.current_stack_offset += sz;
                } else {
                    panic!("no value for {id}");
                }
            }
        }
    }

    /// Evaluate an operand as an address: lvalues yield their frame
    /// address rather than their contents.
    fn push_address(&mut self, op: &Operand) {
        if let Operand::Value(id) = op {
            if let Some(&slot) = self.stack_frame_value_map.get(id) {
                let addr = self.frame_addr(slot);
                self.emit(&addr);
                self.current_stack_offset += 1;
                return;
            }
        }
        self.push_operand(op);
    }

    /// With an address on top of the stack, replace it by the `sz` words it
    /// points at.
    fn emit_load(&mut self, sz: usize) {
        if sz == 1 {
            self.emit_op(OP_READ_MEM);
            return;
        }
        for i in 0..sz {
            // copy the buried address, offset it, read
            self.emit(&encode::integer(i as i32));
            self.emit_op(OP_FETCH_STACK);
            self.emit(&encode::integer(i as i32));
            self.emit_op(OP_ADD);
            self.emit_op(OP_READ_MEM);
        }
        // lift the address out and discard it
        self.emit(&encode::integer(sz as i32));
        self.emit_op(OP_FETCH_DEL_STACK);
        self.emit_op(OP_DROP);
    }

    /// The runtime address of a frame slot: read the stack pointer,
    /// subtract how far the slot sits below it.
    fn frame_addr(&self, slot: i32) -> String {
        let ofs = self.current_stack_frame_size - slot;
        format!(
            "{}{}{}{}",
            encode::integer(STACK_POINTER_IN_MEMORY),
            OP_READ_MEM,
            encode::integer(ofs),
            OP_SUBTRACT
        )
    }

    fn constant(&mut self, c: &Constant) -> String {
        if let Some(cached) = self.cached_constants.get(c) {
            return cached.clone();
        }
        let s = encode::integer(c.bits as i32);
        self.cached_constants.insert(c.clone(), s.clone());
        s
    }

    fn value_type(&self, id: ValueId) -> Type {
        self.types
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("no type for {id}"))
    }

    fn operand_type(&self, op: &Operand) -> Type {
        match op {
            Operand::Const(c) => c.ty.clone(),
            Operand::Str(_) => Type::Ptr,
            Operand::Func(id) => panic!("function {id} used as a value"),
            Operand::Value(id) => self.value_type(*id),
        }
    }

    fn record_local(&mut self, inst: &Inst) {
        self.stack_values.insert(inst.id, self.current_stack_offset);
        self.current_stack_offset += size_in_words(&inst.ty) as i32;
    }

    fn emit(&mut self, s: &str) {
        self.program.push_str(s);
    }

    fn emit_op(&mut self, op: char) {
        self.program.push(op);
    }

    fn add_relocation(&mut self, target: ValueId) {
        self.relocations.insert(self.program.len(), target);
        self.program.push_str(EMPTY_RELOCATION);
    }

    fn add_relative_relocation(&mut self, target: ValueId) {
        // the origin is the instruction just past the jump op that follows
        // this placeholder: the jump adds the offset and the machine's main
        // loop increments, landing exactly on the target.
        let origin = self.program.len() + MAX_RELOCATION_SIZE + 1;
        self.relative_relocations
            .insert(self.program.len(), (target, origin));
        self.program.push_str(EMPTY_RELOCATION);
    }

    /// Prepend the memory initializers and resolve every placeholder.
    fn finalize(mut self) -> Result<String, TranslateError> {
        let initializers: String = self.memory_initializers.concat();
        let relocation_offset = initializers.len();
        self.program = initializers + &self.program;

        let absolute: Vec<(usize, ValueId)> =
            self.relocations.iter().map(|(&o, &t)| (o, t)).collect();
        for (offset, target) in absolute {
            self.patch(relocation_offset, offset, target, None)?;
        }

        let relative: Vec<(usize, (ValueId, usize))> = self
            .relative_relocations
            .iter()
            .map(|(&o, &t)| (o, t))
            .collect();
        for (offset, (target, origin)) in relative {
            self.patch(relocation_offset, offset, target, Some(origin))?;
        }

        if self.program.len() > MAX_PROGRAM_SIZE {
            return Err(TranslateError::ProgramTooLarge(self.program.len()));
        }
        Ok(self.program)
    }

    fn patch(
        &mut self,
        relocation_offset: usize,
        offset: usize,
        target: ValueId,
        origin: Option<usize>,
    ) -> Result<(), TranslateError> {
        let at = relocation_offset + offset;

        // expect the relocation to be unfilled!
        let span = &self.program[at..at + MAX_RELOCATION_SIZE];
        if span != EMPTY_RELOCATION {
            panic!("relocation at {at:#x} was clobbered: '{span}'");
        }

        let address = self
            .function_locations
            .get(&target)
            .or_else(|| self.block_locations.get(&target))
            .copied()
            .unwrap_or_else(|| panic!("no location for {target}"));

        // locations were recorded before the initializers were prepended;
        // absolute addresses shift by the prefix, differences do not.
        let value = match origin {
            None => (address + relocation_offset) as i64,
            Some(origin) => address as i64 - origin as i64,
        };

        let mut patched = format!("({})", encode::integer(value as i32));
        if patched.len() > MAX_RELOCATION_SIZE {
            return Err(TranslateError::RelocationTooLarge {
                target: self.describe(target),
                value: value as i32,
            });
        }
        for _ in patched.len()..MAX_RELOCATION_SIZE {
            patched.push(' ');
        }

        self.program
            .replace_range(at..at + MAX_RELOCATION_SIZE, &patched);
        Ok(())
    }

    fn describe(&self, target: ValueId) -> String {
        match self.module.function(target) {
            Some(f) => f.name.to_string(),
            None => target.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ir::Context;

    fn print_42_module() -> Module {
        let mut cx = Context::new();
        let mut m = Module::new();
        let print_int = m.declare(&mut cx, INTRINSIC_PRINT_INT, vec![Type::Int], Type::Void);

        let mut main = Function::new(&mut cx, "main", vec![], Type::Void);
        let b0 = main.add_block(&mut cx);
        let v = main.block_mut(b0).binary(
            &mut cx,
            BinOp::Mul,
            Type::Int,
            Operand::Const(Constant::int(7)),
            Operand::Const(Constant::int(6)),
        );
        main.block_mut(b0)
            .call(&mut cx, Type::Void, print_int, vec![Operand::Value(v)]);
        let main = m.add_function(main);
        m.entry = Some(main);
        m
    }

    #[test]
    fn placeholders_are_spaces_until_patched() {
        let m = print_42_module();
        let mut t = Translator::new(&m);
        t.emit_module().unwrap();

        for &offset in t.relocations.keys() {
            assert_eq!(
                &t.program[offset..offset + MAX_RELOCATION_SIZE],
                EMPTY_RELOCATION
            );
        }
        for &offset in t.relative_relocations.keys() {
            assert_eq!(
                &t.program[offset..offset + MAX_RELOCATION_SIZE],
                EMPTY_RELOCATION
            );
        }
    }

    #[test]
    fn function_locations_are_valid_offsets() {
        let m = print_42_module();
        let mut t = Translator::new(&m);
        t.emit_module().unwrap();

        for func in &m.functions {
            if func.is_declaration() {
                continue;
            }
            let loc = t.function_locations[&func.id];
            assert!(loc < t.program.len());
        }
    }

    #[test]
    fn program_starts_with_the_stack_pointer_initializer() {
        let program = translate(&print_42_module()).unwrap();
        let init = format!(
            "{}{}K",
            encode::integer(STACK_FRAME_IN_MEMORY),
            encode::integer(STACK_POINTER_IN_MEMORY)
        );
        assert!(program.starts_with(&init));
    }

    #[test]
    fn translation_is_deterministic() {
        let a = translate(&print_42_module()).unwrap();
        let b = translate(&print_42_module()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_entry_is_an_error() {
        let m = Module::new();
        assert!(matches!(translate(&m), Err(TranslateError::MissingEntry)));
    }

    #[test]
    fn unencodable_addresses_overflow_the_placeholder() {
        let m = print_42_module();
        let mut t = Translator::new(&m);
        t.emit_module().unwrap();

        // pretend the entry function landed absurdly far away; its address
        // no longer encodes within one placeholder.
        t.function_locations.insert(m.entry.unwrap(), 100_000_000);

        assert!(matches!(
            t.finalize(),
            Err(TranslateError::RelocationTooLarge { .. })
        ));
    }

    #[test]
    fn constant_pool_overflow_is_an_error() {
        let mut cx = Context::new();
        let mut m = Module::new();
        let huge = "x".repeat((MAX_MEMORY_SIZE - CONSTANT_OFFSET_IN_MEMORY) as usize + 1);
        m.add_string(&mut cx, "huge", &huge);

        let mut main = Function::new(&mut cx, "main", vec![], Type::Void);
        main.add_block(&mut cx);
        let main = m.add_function(main);
        m.entry = Some(main);

        assert!(matches!(
            translate(&m),
            Err(TranslateError::ConstantPoolOverflow { .. })
        ));
    }
}
