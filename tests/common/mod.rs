#![allow(dead_code)]
use basic4::lang::Error;
use basic4::mach::{register, BufferConsole, Compiler, Config, Event, Vm};
use std::cell::RefCell;
use std::rc::Rc;

pub const STEPS: usize = 100_000;

pub struct Session {
    pub comp: Compiler,
    pub console: Rc<RefCell<BufferConsole>>,
}

impl Session {
    pub fn new(input: &[&str]) -> Session {
        Session::with_config(&Config::default(), input)
    }

    pub fn with_config(config: &Config, input: &[&str]) -> Session {
        let console = Rc::new(RefCell::new(BufferConsole::with_input(input)));
        let mut comp = Compiler::new(Vm::new(config), config);
        register(&mut comp, console.clone());
        Session { comp, console }
    }

    pub fn vm(&mut self) -> &mut Vm {
        self.comp.vm_mut()
    }

    pub fn output(&self) -> String {
        self.console.borrow().output.clone()
    }
}

/// Runs until the program ends. `Ok(false)` when the step budget ran
/// out or a breakpoint was hit first.
pub fn exec_n(vm: &mut Vm, steps: usize) -> Result<bool, Error> {
    loop {
        match vm.execute(steps) {
            Event::End => return Ok(true),
            Event::Yield => {}
            Event::Running | Event::Breakpoint => return Ok(false),
            Event::Error(error) => return Err(error),
        }
    }
}

/// Output of a program, followed by the error that stopped it.
pub fn run(source: &str) -> String {
    run_input(source, &[])
}

pub fn run_input(source: &str, input: &[&str]) -> String {
    let mut session = Session::new(input);
    if let Err(error) = session.comp.compile(source) {
        return error.to_string();
    }
    session.vm().reset();
    let result = exec_n(session.vm(), STEPS);
    let mut s = session.output();
    match result {
        Ok(true) => {}
        Ok(false) => s.push_str("\nExecution steps exceeded."),
        Err(error) => s.push_str(&error.to_string()),
    }
    s
}

/// Compile or run-time error of a program that is expected to fail.
pub fn run_err(source: &str) -> Error {
    let mut session = Session::new(&[]);
    if let Err(error) = session.comp.compile(source) {
        return error;
    }
    session.vm().reset();
    match exec_n(session.vm(), STEPS) {
        Err(error) => error,
        Ok(ended) => panic!("no error, ended: {}", ended),
    }
}
