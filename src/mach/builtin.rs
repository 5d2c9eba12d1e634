use super::function::Signature;
use super::types::BasicType::{Int, Real, String as Str};
use super::{Compiler, Vm};
use crate::lang::Literal;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Largest value returned by `rnd()`.
pub const RND_MAX: i32 = 32767;

/// Where `print` output goes and `input` text comes from.
pub trait Console {
    fn print(&mut self, text: &str);
    /// One line of input without the line ending. `None` at end of input.
    fn input(&mut self) -> Option<String>;
}

/// ## In-memory console
///
/// Collects output and replays queued input lines.
/// ```
/// use basic4::mach::{BufferConsole, Console};
/// let mut console = BufferConsole::with_input(&["42"]);
/// console.print("hi");
/// assert_eq!(console.output, "hi");
/// assert_eq!(console.input().as_deref(), Some("42"));
/// ```
#[derive(Debug, Default)]
pub struct BufferConsole {
    pub output: String,
    pub input: VecDeque<String>,
}

impl BufferConsole {
    pub fn with_input(lines: &[&str]) -> BufferConsole {
        BufferConsole {
            output: String::new(),
            input: lines.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Console for BufferConsole {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn input(&mut self) -> Option<String> {
        self.input.pop_front()
    }
}

/// Numeric prefix of `s`, ignoring leading whitespace. Zero when there is none.
pub fn val(s: &str) -> f32 {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = s.as_bytes();
    while end < bytes.len() {
        let c = bytes[end];
        match c {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 => {}
            b'+' | b'-' if seen_exp && matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }
    let mut prefix = &s[..end];
    while !prefix.is_empty() {
        if let Ok(value) = prefix.parse::<f32>() {
            return value;
        }
        prefix = &prefix[..prefix.len() - 1];
    }
    0.0
}

fn substring(s: &str, start: usize, count: usize) -> String {
    s.chars().skip(start).take(count).collect()
}

/// Registers the console, string and math functions and the
/// `true`, `false` and `pi` constants.
pub fn register(comp: &mut Compiler, console: Rc<RefCell<dyn Console>>) {
    comp.add_constant("true", Literal::Int(-1));
    comp.add_constant("false", Literal::Int(0));
    comp.add_constant("pi", Literal::Real(std::f32::consts::PI));

    register_console(comp, console);
    register_strings(comp);
    register_math(comp);
}

fn register_console(comp: &mut Compiler, console: Rc<RefCell<dyn Console>>) {
    let out = console.clone();
    comp.add_function(
        "print",
        Signature::statement().no_brackets().param(Str),
        Rc::new(move |vm: &mut Vm| out.borrow_mut().print(&vm.string_param(1))),
    );
    let out = console.clone();
    comp.add_function(
        "printr",
        Signature::statement().no_brackets().param(Str),
        Rc::new(move |vm: &mut Vm| {
            let mut console = out.borrow_mut();
            console.print(&vm.string_param(1));
            console.print("\n");
        }),
    );
    let out = console.clone();
    comp.add_function(
        "printr",
        Signature::statement().no_brackets(),
        Rc::new(move |_: &mut Vm| out.borrow_mut().print("\n")),
    );
    comp.add_function(
        "input$",
        Signature::function(Str).timeshare(),
        Rc::new(move |vm: &mut Vm| {
            let line = console.borrow_mut().input().unwrap_or_default();
            vm.set_reg_string(line);
        }),
    );
}

fn register_strings(comp: &mut Compiler) {
    comp.add_function(
        "val",
        Signature::function(Real).param(Str),
        Rc::new(|vm: &mut Vm| {
            let value = val(&vm.string_param(1));
            vm.set_reg_real(value);
        }),
    );
    comp.add_function(
        "str$",
        Signature::function(Str).param(Str),
        Rc::new(|vm: &mut Vm| {
            let s = vm.string_param(1);
            vm.set_reg_string(s);
        }),
    );
    comp.add_function(
        "len",
        Signature::function(Int).param(Str),
        Rc::new(|vm: &mut Vm| {
            let len = vm.string_param(1).chars().count();
            vm.set_reg_int(len as i32);
        }),
    );
    comp.add_function(
        "left$",
        Signature::function(Str).param(Str).param(Int),
        Rc::new(|vm: &mut Vm| {
            let count = vm.int_param(1).max(0) as usize;
            let s = substring(&vm.string_param(2), 0, count);
            vm.set_reg_string(s);
        }),
    );
    comp.add_function(
        "right$",
        Signature::function(Str).param(Str).param(Int),
        Rc::new(|vm: &mut Vm| {
            let count = vm.int_param(1).max(0) as usize;
            let s = vm.string_param(2);
            let len = s.chars().count();
            let s = substring(&s, len.saturating_sub(count), count);
            vm.set_reg_string(s);
        }),
    );
    comp.add_function(
        "mid$",
        Signature::function(Str).param(Str).param(Int).param(Int),
        Rc::new(|vm: &mut Vm| {
            let count = vm.int_param(1).max(0) as usize;
            let start = vm.int_param(2).saturating_sub(1).max(0) as usize;
            let s = substring(&vm.string_param(3), start, count);
            vm.set_reg_string(s);
        }),
    );
    comp.add_function(
        "chr$",
        Signature::function(Str).param(Int),
        Rc::new(|vm: &mut Vm| {
            let s = std::char::from_u32(vm.int_param(1).max(0) as u32)
                .map(|c| c.to_string())
                .unwrap_or_default();
            vm.set_reg_string(s);
        }),
    );
    comp.add_function(
        "asc",
        Signature::function(Int).param(Str),
        Rc::new(|vm: &mut Vm| {
            let code = vm.string_param(1).chars().next().map_or(0, |c| c as i32);
            vm.set_reg_int(code);
        }),
    );
    comp.add_function(
        "upper$",
        Signature::function(Str).param(Str),
        Rc::new(|vm: &mut Vm| {
            let s = vm.string_param(1).to_uppercase();
            vm.set_reg_string(s);
        }),
    );
    comp.add_function(
        "lower$",
        Signature::function(Str).param(Str),
        Rc::new(|vm: &mut Vm| {
            let s = vm.string_param(1).to_lowercase();
            vm.set_reg_string(s);
        }),
    );
}

fn real_function(comp: &mut Compiler, name: &str, f: fn(f32) -> f32) {
    comp.add_function(
        name,
        Signature::function(Real).param(Real),
        Rc::new(move |vm: &mut Vm| {
            let value = f(vm.real_param(1));
            vm.set_reg_real(value);
        }),
    );
}

fn register_math(comp: &mut Compiler) {
    real_function(comp, "abs", f32::abs);
    real_function(comp, "sin", f32::sin);
    real_function(comp, "cos", f32::cos);
    real_function(comp, "tan", f32::tan);
    real_function(comp, "atn", f32::atan);
    comp.add_function(
        "sqr",
        Signature::function(Real).param(Real),
        Rc::new(|vm: &mut Vm| {
            let value = vm.real_param(1);
            if value < 0.0 {
                vm.function_error("sqr");
            } else {
                vm.set_reg_real(value.sqrt());
            }
        }),
    );
    comp.add_function(
        "int",
        Signature::function(Int).param(Real),
        Rc::new(|vm: &mut Vm| {
            let value = vm.real_param(1).floor() as i32;
            vm.set_reg_int(value);
        }),
    );
    comp.add_function(
        "sgn",
        Signature::function(Int).param(Real),
        Rc::new(|vm: &mut Vm| {
            let value = vm.real_param(1);
            let sign = if value > 0.0 {
                1
            } else if value < 0.0 {
                -1
            } else {
                0
            };
            vm.set_reg_int(sign);
        }),
    );

    let rng = Rc::new(RefCell::new(StdRng::from_entropy()));
    let reseed = rng.clone();
    comp.vm_mut()
        .add_init_function(Rc::new(move |_: &mut Vm| {
            *reseed.borrow_mut() = StdRng::from_entropy();
        }));
    let source = rng.clone();
    comp.add_function(
        "rnd",
        Signature::function(Int),
        Rc::new(move |vm: &mut Vm| {
            let value = source.borrow_mut().gen_range(0..=RND_MAX);
            vm.set_reg_int(value);
        }),
    );
    let seeded = rng.clone();
    comp.add_function(
        "randomize",
        Signature::statement().no_brackets().param(Int),
        Rc::new(move |vm: &mut Vm| {
            *seeded.borrow_mut() = StdRng::seed_from_u64(vm.int_param(1) as u64);
        }),
    );
    comp.add_function(
        "randomize",
        Signature::statement().no_brackets(),
        Rc::new(move |_: &mut Vm| {
            *rng.borrow_mut() = StdRng::from_entropy();
        }),
    );
}
