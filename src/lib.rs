//! # Basic4
//!
//! A compiler and stepped virtual machine for the Basic4GL dialect of BASIC.
//!
//! Programs are compiled into a flat list of instructions for a register
//! machine. The host runs the machine in slices of a few thousand steps,
//! so it can service input, breakpoints and interrupts in between.
//!
//! ```
//! use basic4::mach::{register, BufferConsole, Compiler, Config, Event, Vm};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let config = Config::default();
//! let console = Rc::new(RefCell::new(BufferConsole::default()));
//! let mut comp = Compiler::new(Vm::new(&config), &config);
//! register(&mut comp, console.clone());
//! comp.compile("dim i\nfor i = 1 to 3: print i; \" \";: next").unwrap();
//! comp.vm_mut().reset();
//! while let Event::Running | Event::Yield = comp.vm_mut().execute(1000) {}
//! assert_eq!(console.borrow().output, "1 2 3 ");
//! ```

pub mod lang;
pub mod mach;
