use super::types::{BasicType, ValType};
use super::val::real_to_string;
use super::{Val, Vm};
use crate::lang::Error;

/// Longest string the value display will produce.
pub const MAX_DISPLAY: usize = 4000;

/// ## Saved machine state
///
/// Captured before running temporary code, such as a watch expression,
/// and restored afterwards so the paused program carries on untouched.

#[derive(Debug, Clone)]
pub struct VmState {
    ip: usize,
    reg: Val,
    reg2: Val,
    reg_string: String,
    reg2_string: String,
    stack_top: usize,
    strings: Vec<bool>,
    call_stack_top: usize,
    code_size: usize,
    data_size: usize,
    temp_start: Option<usize>,
    error: Option<Error>,
    paused: bool,
}

/// Appends to the output without going over the character budget.
struct Display {
    out: String,
    room: usize,
}

impl Display {
    fn new(room: usize) -> Display {
        Display {
            out: String::new(),
            room,
        }
    }

    fn full(&self) -> bool {
        self.room == 0
    }

    fn push(&mut self, s: &str) {
        let count = s.chars().count();
        if count > self.room {
            self.out.extend(s.chars().take(self.room));
            self.room = 0;
        } else {
            self.out.push_str(s);
            self.room -= count;
        }
    }
}

impl Vm {
    /// Current temporary data becomes permanent so it survives the temporary code.
    pub fn state(&mut self) -> VmState {
        let (data_size, temp_start) = self.data.state();
        VmState {
            ip: self.ip,
            reg: self.reg,
            reg2: self.reg2,
            reg_string: self.reg_string.clone(),
            reg2_string: self.reg2_string.clone(),
            stack_top: self.stack.len(),
            strings: self.strings.allocation(),
            call_stack_top: self.call_stack.len(),
            code_size: self.program.code.len(),
            data_size,
            temp_start,
            error: self.error.clone(),
            paused: self.paused,
        }
    }

    pub fn set_state(&mut self, state: VmState) {
        self.ip = state.ip;
        self.reg = state.reg;
        self.reg2 = state.reg2;
        self.reg_string = state.reg_string;
        self.reg2_string = state.reg2_string;
        self.stack.truncate(state.stack_top);
        self.strings.free_since(&state.strings);
        self.call_stack.truncate(state.call_stack_top);
        if state.code_size < self.program.code.len() {
            self.rollback_program(state.code_size);
        }
        self.data.set_state(state.data_size, state.temp_start);
        self.error = state.error;
        self.paused = state.paused;
    }

    fn basic_to_string(&self, val: Val, basic: BasicType) -> String {
        match basic {
            BasicType::Int => val.int().to_string(),
            BasicType::Real => real_to_string(val.real()),
            BasicType::String => match self.strings.get(val.int()) {
                Some(s) => format!("\"{}\"", s),
                None => "???".to_string(),
            },
            _ => "???".to_string(),
        }
    }

    /// Follows one level of pointer. Values that don't fit in a register
    /// stay as a reference.
    fn deref_display(&self, val: Val, ty: &mut ValType) -> Val {
        ty.pointer_level = ty.pointer_level.saturating_sub(1);
        if ty.pointer_level == 0 && !ty.is_basic() {
            ty.pointer_level = 1;
            ty.by_ref = true;
            val
        } else {
            self.data.get(val.int()).unwrap_or_default()
        }
    }

    fn display_val(&self, val: Val, mut ty: ValType, display: &mut Display) {
        if display.full() {
            return;
        }
        if ty.is_basic() {
            display.push(&self.basic_to_string(val, ty.basic));
            return;
        }
        if ty.virtual_pointer_level() > 0 {
            if val.int() == 0 {
                display.push("[UNSET POINTER]");
                return;
            }
            let val = self.deref_display(val, &mut ty);
            display.push("&");
            self.display_val(val, ty, display);
            return;
        }
        let address = val.int();
        if address == 0 {
            display.push("[UNSET]");
            return;
        }
        if ty.array_level > 0 {
            let count = self.data.get(address).map_or(0, |v| v.int());
            let element_size = self.data.get(address + 1).map_or(0, |v| v.int());
            display.push("{");
            for i in 0..count {
                if display.full() {
                    break;
                }
                let mut element_type = ty.element_type();
                element_type.pointer_level = 1;
                element_type.by_ref = false;
                let element = Val::from_int(address + 2 + i * element_size);
                let element = self.deref_display(element, &mut element_type);
                self.display_val(element, element_type, display);
                if i < count - 1 {
                    display.push(", ");
                }
            }
            display.push("}");
            return;
        }
        if let BasicType::Struct(index) = ty.basic {
            let structure = match self.types.structure(index) {
                Some(s) => s,
                None => {
                    display.push("???");
                    return;
                }
            };
            display.push("{");
            let last = structure.fields.len().saturating_sub(1);
            for (i, field) in structure.fields.iter().enumerate() {
                if display.full() {
                    break;
                }
                let mut field_type = field.ty;
                field_type.pointer_level += 1;
                let value = Val::from_int(address + field.offset as i32);
                let value = self.deref_display(value, &mut field_type);
                display.push(&field.name);
                display.push("=");
                self.display_val(value, field_type, display);
                if i < last {
                    display.push(", ");
                }
            }
            display.push("}");
            return;
        }
        display.push("???");
    }

    /// Renders a value of the given type, truncated to `max_chars`.
    pub fn val_to_string(&self, val: Val, ty: &ValType, max_chars: usize) -> String {
        let mut display = Display::new(max_chars);
        self.display_val(val, *ty, &mut display);
        display.out
    }

    /// Renders a variable by name. `None` when there is no such variable.
    pub fn var_to_string(&self, name: &str, max_chars: usize) -> Option<String> {
        let var = self.variables.get(self.variables.find(name)?)?;
        if !var.allocated() {
            return Some("[UNSET]".to_string());
        }
        let mut ty = var.ty;
        ty.pointer_level += 1;
        let val = self.deref_display(Val::from_int(var.data_index as i32), &mut ty);
        Some(self.val_to_string(val, &ty, max_chars))
    }

    /// Renders the result register for a value of the given type.
    pub fn reg_to_string(&self, ty: &ValType) -> String {
        if ty.is(BasicType::String) {
            let mut display = Display::new(MAX_DISPLAY);
            display.push(&format!("\"{}\"", self.reg_string));
            return display.out;
        }
        self.val_to_string(self.reg, ty, MAX_DISPLAY)
    }
}
