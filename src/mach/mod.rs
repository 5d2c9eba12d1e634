/*!
## Rust Machine Module

This Rust module is a compiler and virtual machine for BASIC.
The compiler emits instructions straight into a `Vm`, which runs
them in bounded slices so the host stays in control.

*/

mod builtin;
mod codegen;
mod compile;
mod config;
mod data;
mod debug;
mod flow;
mod function;
mod inspect;
mod link;
mod listing;
mod opcode;
mod operation;
mod program;
mod runtime;
mod stack;
mod statement;
mod stream;
mod types;
mod val;
mod var;

pub use builtin::{register, val as parse_val, BufferConsole, Console, RND_MAX};
pub use compile::Compiler;
pub use config::{Config, Syntax};
pub use data::{Data, DataElement};
pub use function::{BinaryExtension, Function, Overload, Resources, Signature, UnaryExtension};
pub use inspect::{VmState, MAX_DISPLAY};
pub use link::Label;
pub use opcode::{Instruction, Opcode, INSTRUCTION_SIZE};
pub use program::Program;
pub use runtime::{Event, Vm};
pub use types::{BasicType, Field, Structure, TypeLibrary, ValType, MAX_DIMENSIONS};
pub use val::{real_to_string, Val};
pub use var::{Variable, Variables};
