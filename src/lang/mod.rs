/*!
# Rust Language Module

This Rust module provides lexical analysis of the BASIC language.
Tokens are produced on demand for the single-pass compiler in `mach`.

*/

#[macro_use]
mod error;
mod lex;
mod token;

pub use error::Error;
pub use error::ErrorCode;
pub use lex::{Cursor, TokenSource};
pub use token::{Literal, Token, TokenKind};

pub type LineNumber = u32;
pub type Column = u16;
