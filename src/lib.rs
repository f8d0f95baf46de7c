//! This is the LSCVM compiler backend as a library.  See the `src/bin`
//! directory for the executable program using this library.
//!
//! The pipeline here starts where a front end stops: a fully-typed SSA
//! module ([ir::Module]) goes in, and an ASCII instruction stream for the
//! LSCVM stack machine comes out ([back::translate]), ready to be written to
//! a file or executed directly on the emulator ([back::vm::Machine]).

pub mod common;
pub mod ir;
pub mod back;
