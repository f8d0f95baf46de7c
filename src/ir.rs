//! The SSA intermediate representation consumed by the backend.
//!
//! A [Module] is the unit of compilation: an ordered list of functions, each
//! a list of basic blocks, each a list of instructions closed off by exactly
//! one [Terminator].  Every entity that can be referred to from somewhere
//! else (functions, blocks, instruction results, parameters, string
//! globals) carries a stable [ValueId]; cross-references in the IR are ids,
//! never owning pointers, so the graph may be cyclic (a branch back to an
//! earlier block) without any ownership knots.
//!
//! Ids are handed out by a [Context] that callers thread through the
//! factory operations explicitly.  There is no default context and no
//! process-wide state.
//!
//! Instruction kinds are a closed enum rather than an open class hierarchy:
//! the translator dispatches with a single exhaustive `match`, and adding a
//! kind is a compile error everywhere it matters.

use derive_more::Display;

use crate::common::Name;

/// Allocator for [ValueId]s.  One per compilation session.
#[derive(Debug, Default)]
pub struct Context {
    next: u64,
}

impl Context {
    pub fn new() -> Context {
        Context { next: 0 }
    }

    /// Mint a fresh id, distinct from every id this context has produced.
    pub fn fresh(&mut self) -> ValueId {
        let id = ValueId(self.next);
        self.next += 1;
        id
    }
}

/// A stable identifier for an IR entity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[display("%{_0}")]
pub struct ValueId(u64);

/// The types the backend can size and move around.
///
/// Scalars all occupy one 32-bit machine word; `Array` exists so that frame
/// allocations can span several words.  Pointers are opaque: the pointee
/// type of a load lives on the load instruction itself.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Type {
    Void,
    Bool,
    Char,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    Uint,
    Ptr,
    Array(Box<Type>, usize),
}

impl Type {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::Bool | Type::Char | Type::Int | Type::Uint | Type::Ptr => 4,
            Type::Array(elem, n) => n * elem.size_in_bytes(),
        }
    }

}

/// A typed compile-time constant, stored as its 32-bit word pattern.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Constant {
    pub ty: Type,
    pub bits: u32,
}

impl Constant {
    pub fn int(v: i32) -> Constant {
        Constant { ty: Type::Int, bits: v as u32 }
    }

    pub fn uint(v: u32) -> Constant {
        Constant { ty: Type::Uint, bits: v }
    }

    pub fn chr(c: char) -> Constant {
        Constant { ty: Type::Char, bits: c as u32 }
    }

    pub fn bool(v: bool) -> Constant {
        Constant { ty: Type::Bool, bits: v as u32 }
    }
}

/// An instruction operand.
#[derive(Clone, Debug)]
pub enum Operand {
    Const(Constant),
    /// The result of another instruction, or a function parameter.
    Value(ValueId),
    /// A function, usable only as a call target.
    Func(ValueId),
    /// A string global; evaluates to its constant-pool address.
    Str(ValueId),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum BinOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
}

/// Comparison predicates.  `Order` is the three-way compare: -1, 0 or +1.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum Cmp {
    #[display("eq")]
    Eq,
    #[display("ne")]
    Ne,
    #[display("lt")]
    Lt,
    #[display("le")]
    Le,
    #[display("gt")]
    Gt,
    #[display("ge")]
    Ge,
    #[display("ord")]
    Order,
}

#[derive(Clone, Debug)]
pub enum InstKind {
    Binary {
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        cmp: Cmp,
        lhs: Operand,
        rhs: Operand,
    },
    /// Reserve `ty` in the function's in-memory frame.  The result is an
    /// lvalue of `ty`: using it as a plain operand loads the slot, using it
    /// as a load/store address yields the slot's address.
    Alloc {
        ty: Type,
    },
    Load {
        addr: Operand,
    },
    Store {
        value: Operand,
        addr: Operand,
    },
    Call {
        callee: ValueId,
        args: Vec<Operand>,
    },
}

/// One SSA instruction.  `ty` is the type of the result (`Void` for
/// instructions that produce none); `id` names the result.
#[derive(Clone, Debug)]
pub struct Inst {
    pub id: ValueId,
    pub ty: Type,
    pub kind: InstKind,
}

#[derive(Clone, Debug)]
pub enum Terminator {
    Return(Option<Operand>),
    Jump(ValueId),
    Branch {
        cond: Operand,
        tt: ValueId,
        ff: ValueId,
    },
}

#[derive(Debug)]
pub struct Block {
    pub id: ValueId,
    pub insts: Vec<Inst>,
    pub term: Terminator,
}

impl Block {
    /// Append an instruction and return its result id.
    pub fn inst(&mut self, cx: &mut Context, ty: Type, kind: InstKind) -> ValueId {
        let id = cx.fresh();
        self.insts.push(Inst { id, ty, kind });
        id
    }

    pub fn binary(&mut self, cx: &mut Context, op: BinOp, ty: Type, lhs: Operand, rhs: Operand) -> ValueId {
        self.inst(cx, ty, InstKind::Binary { op, lhs, rhs })
    }

    pub fn compare(&mut self, cx: &mut Context, cmp: Cmp, lhs: Operand, rhs: Operand) -> ValueId {
        let ty = if cmp == Cmp::Order { Type::Int } else { Type::Bool };
        self.inst(cx, ty, InstKind::Compare { cmp, lhs, rhs })
    }

    pub fn alloc(&mut self, cx: &mut Context, ty: Type) -> ValueId {
        self.inst(cx, ty.clone(), InstKind::Alloc { ty })
    }

    pub fn load(&mut self, cx: &mut Context, ty: Type, addr: Operand) -> ValueId {
        self.inst(cx, ty, InstKind::Load { addr })
    }

    pub fn store(&mut self, cx: &mut Context, value: Operand, addr: Operand) {
        self.inst(cx, Type::Void, InstKind::Store { value, addr });
    }

    pub fn call(&mut self, cx: &mut Context, ret: Type, callee: ValueId, args: Vec<Operand>) -> ValueId {
        self.inst(cx, ret, InstKind::Call { callee, args })
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub id: ValueId,
    pub ty: Type,
}

#[derive(Debug)]
pub struct Function {
    pub id: ValueId,
    pub name: Name,
    pub params: Vec<Param>,
    pub ret: Type,
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn new(cx: &mut Context, name: &str, params: Vec<Type>, ret: Type) -> Function {
        let id = cx.fresh();
        let params = params
            .into_iter()
            .map(|ty| Param { id: cx.fresh(), ty })
            .collect();
        Function {
            id,
            name: Name::new(name.to_string()),
            params,
            ret,
            blocks: Vec::new(),
        }
    }

    /// Append an empty block (terminated by a void return until the caller
    /// installs the real terminator) and return its id.
    pub fn add_block(&mut self, cx: &mut Context) -> ValueId {
        let id = cx.fresh();
        self.blocks.push(Block {
            id,
            insts: Vec::new(),
            term: Terminator::Return(None),
        });
        id
    }

    pub fn block_mut(&mut self, id: ValueId) -> &mut Block {
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("no block {id} in function"))
    }

    /// Declared-only functions have no body; the backend inlines the ones
    /// it recognizes by name and rejects the rest.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The types of all frame allocations made by this function, in
    /// instruction order.
    pub fn stack_allocations(&self) -> Vec<&Type> {
        self.blocks
            .iter()
            .flat_map(|b| &b.insts)
            .filter_map(|i| match &i.kind {
                InstKind::Alloc { ty } => Some(ty),
                _ => None,
            })
            .collect()
    }
}

/// A string global destined for the constant pool.
#[derive(Debug)]
pub struct StringData {
    pub id: ValueId,
    pub name: Name,
    pub text: String,
}

/// The unit of compilation.
#[derive(Debug, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub strings: Vec<StringData>,
    pub entry: Option<ValueId>,
    pub global_init: Option<ValueId>,
}

impl Module {
    pub fn new() -> Module {
        Module::default()
    }

    /// Install a function; returns its id.
    pub fn add_function(&mut self, f: Function) -> ValueId {
        let id = f.id;
        self.functions.push(f);
        id
    }

    /// Declare a body-less function, e.g. an intrinsic.
    pub fn declare(&mut self, cx: &mut Context, name: &str, params: Vec<Type>, ret: Type) -> ValueId {
        self.add_function(Function::new(cx, name, params, ret))
    }

    pub fn add_string(&mut self, cx: &mut Context, name: &str, text: &str) -> ValueId {
        let id = cx.fresh();
        self.strings.push(StringData {
            id,
            name: Name::new(name.to_string()),
            text: text.to_string(),
        });
        id
    }

    pub fn function(&self, id: ValueId) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes() {
        assert_eq!(Type::Void.size_in_bytes(), 0);
        assert_eq!(Type::Int.size_in_bytes(), 4);
        assert_eq!(Type::Ptr.size_in_bytes(), 4);
        assert_eq!(Type::Array(Box::new(Type::Int), 6).size_in_bytes(), 24);
    }

    #[test]
    fn ids_are_unique() {
        let mut cx = Context::new();
        let a = cx.fresh();
        let b = cx.fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn builder_wiring() {
        let mut cx = Context::new();
        let mut m = Module::new();

        let mut f = Function::new(&mut cx, "main", vec![], Type::Void);
        let b0 = f.add_block(&mut cx);
        let v = f.block_mut(b0).binary(
            &mut cx,
            BinOp::Mul,
            Type::Int,
            Operand::Const(Constant::int(7)),
            Operand::Const(Constant::int(6)),
        );
        f.block_mut(b0).term = Terminator::Return(Some(Operand::Value(v)));
        let main = m.add_function(f);
        m.entry = Some(main);

        let f = m.function(main).expect("function was just added");
        assert_eq!(f.blocks.len(), 1);
        assert_eq!(f.blocks[0].insts.len(), 1);
        assert!(!f.is_declaration());
    }
}
