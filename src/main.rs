//! # Basic4
//!
//! Command line compiler and runner for Basic4GL programs.
//!

mod term;

fn main() {
    term::main();
}
