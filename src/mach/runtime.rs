use super::data::{Data, DataElement, Store};
use super::debug::Breakpoints;
use super::function::{Function, Resources};
use super::opcode::Instruction;
use super::operation::Operation;
use super::program::Program;
use super::stack::Stack;
use super::types::{BasicType, TypeLibrary, ValType};
use super::val::real_to_string;
use super::var::Variables;
use super::{Config, Opcode, Val};
use crate::error;
use crate::lang::{Column, Error, LineNumber};
use log::{debug, trace};
use std::cell::RefCell;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Why `execute` returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Step budget used up. Call `execute` again to continue.
    Running,
    /// A `TIMESHARE` or `RUN` handed control back to the host.
    Yield,
    /// Stopped on a patched in breakpoint.
    Breakpoint,
    End,
    Error(Error),
}

enum Flow {
    Next,
    Jump,
    Yield,
    Restart,
    Pause,
    End,
}

/// ## Virtual machine
///
/// Executes compiled instructions in bounded slices so the host keeps
/// control. All program visible state lives here: registers, stacks,
/// the data arena, the string store and the variable table.

pub struct Vm {
    pub(super) program: Program,
    pub(super) types: TypeLibrary,
    pub(super) variables: Variables,
    pub(super) data: Data,
    pub(super) strings: Store<String>,
    pub(super) stack: Stack<Val>,
    pub(super) call_stack: Stack<usize>,
    pub(super) reg: Val,
    pub(super) reg2: Val,
    pub(super) reg_string: String,
    pub(super) reg2_string: String,
    pub(super) data_offset: usize,
    pub(super) ip: usize,
    pub(super) paused: bool,
    pub(super) error: Option<Error>,
    pub(super) breakpoints: Breakpoints,
    functions: Vec<Function>,
    operator_functions: Vec<Function>,
    init_functions: Vec<Function>,
    resources: Vec<Rc<RefCell<dyn Resources>>>,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new(&Config::default())
    }
}

fn index(val: Val) -> usize {
    val.int().max(0) as usize
}

fn unset_pointer() -> Error {
    error!(UnsetPointer; "Unset pointer")
}

impl Vm {
    pub fn new(config: &Config) -> Vm {
        Vm {
            program: Program::default(),
            types: TypeLibrary::default(),
            variables: Variables::default(),
            data: Data::new(config.max_data),
            strings: Store::default(),
            stack: Stack::new("Expression stack overflow", config.max_data),
            call_stack: Stack::new("Stack overflow", config.max_calls),
            reg: Val::default(),
            reg2: Val::default(),
            reg_string: String::new(),
            reg2_string: String::new(),
            data_offset: 0,
            ip: 0,
            paused: false,
            error: None,
            breakpoints: Breakpoints::default(),
            functions: vec![],
            operator_functions: vec![],
            init_functions: vec![],
            resources: vec![],
        }
    }

    /// Forget the program. Host functions and user breakpoints are kept.
    pub fn new_program(&mut self) {
        self.clr();
        self.variables.clear();
        self.types.clear();
        self.program.clear();
        self.ip = 0;
        self.paused = false;
        self.breakpoints.forget_patches();
    }

    /// Release all run-time state while keeping the program.
    pub fn clr(&mut self) {
        self.variables.deallocate();
        self.data.clear();
        self.strings.clear();
        self.stack.clear();
        self.call_stack.clear();
        for resources in &self.resources {
            resources.borrow_mut().clear();
        }
        self.reg = Val::default();
        self.reg2 = Val::default();
        self.reg_string.clear();
        self.reg2_string.clear();
        self.data_offset = 0;
    }

    /// Prepare to run the program from the start.
    pub fn reset(&mut self) {
        self.error = None;
        self.clr();
        for init in self.init_functions.clone() {
            init(self);
        }
        self.ip = 0;
        self.paused = false;
        debug!("machine reset, {} instructions", self.program.code.len());
    }

    /// Run at most `steps` instructions.
    pub fn execute(&mut self, steps: usize) -> Event {
        self.error = None;
        self.paused = false;
        for _ in 0..steps {
            let instr = match self.program.code.get(self.ip) {
                Some(instr) => *instr,
                None => return self.fail(error!(InternalError; "Instruction pointer out of range")),
            };
            trace!("{:>6} {}", self.ip, instr.opcode);
            match self.step(&instr) {
                Ok(Flow::Next) => self.ip += 1,
                Ok(Flow::Jump) => {}
                Ok(Flow::Yield) => {
                    self.ip += 1;
                    return Event::Yield;
                }
                Ok(Flow::Restart) => return Event::Yield,
                Ok(Flow::Pause) => {
                    self.paused = true;
                    return Event::Breakpoint;
                }
                Ok(Flow::End) => return Event::End,
                Err(error) => {
                    let error = if error.has_position() {
                        error
                    } else {
                        error.in_position(instr.line, instr.col)
                    };
                    return self.fail(error);
                }
            }
        }
        Event::Running
    }

    fn fail(&mut self, error: Error) -> Event {
        debug!("run-time error: {}", error);
        self.error = Some(error.clone());
        Event::Error(error)
    }

    fn step(&mut self, instr: &Instruction) -> Result<Flow> {
        match instr.opcode {
            Opcode::Nop => {}
            Opcode::End => return Ok(Flow::End),
            Opcode::LoadConst => {
                if instr.basic == BasicType::String {
                    self.reg_string = self
                        .program
                        .string_constants
                        .get(index(instr.value))
                        .cloned()
                        .ok_or_else(|| error!(InternalError; "Invalid string constant"))?;
                } else {
                    self.reg = instr.value;
                }
            }
            Opcode::LoadVar => {
                let var = self
                    .variables
                    .get(index(instr.value))
                    .ok_or_else(|| error!(InternalError; "Invalid variable"))?;
                if !var.allocated() {
                    return Err(error!(UndimmedVariable; "UnDIMmed variable"));
                }
                self.reg = Val::from_int(var.data_index as i32);
            }
            Opcode::Deref => {
                let val = self.cell(self.pointer(self.reg)?)?;
                match instr.basic {
                    BasicType::Int | BasicType::Real => self.reg = val,
                    BasicType::String => self.reg_string = self.string_at(val),
                    _ => return Err(error!(InternalError; "Invalid dereference type")),
                }
            }
            Opcode::AddConst => {
                let address = self.pointer(self.reg)?;
                self.reg = Val::from_int(address.wrapping_add(instr.value.int()));
            }
            Opcode::ArrayIndex => {
                let array = self.pointer(self.reg2)?;
                let count = self.cell(array)?.int();
                let size = self.cell(array + 1)?.int();
                let i = self.reg.int();
                if i < 0 || i >= count {
                    return Err(error!(SubscriptOutOfRange; "Array index out of range"));
                }
                self.reg = Val::from_int(array + 2 + i * size);
            }
            Opcode::Push => {
                if instr.basic == BasicType::String {
                    let slot = self.strings.alloc() as i32;
                    if let Some(s) = self.strings.get_mut(slot) {
                        s.push_str(&self.reg_string);
                    }
                    self.stack.push(Val::from_int(slot))?;
                } else {
                    self.stack.push(self.reg)?;
                }
            }
            Opcode::Pop => {
                let val = self.stack.pop()?;
                if instr.basic == BasicType::String {
                    self.reg2_string = self.string_at(val);
                    self.strings.free(val.int());
                } else {
                    self.reg2 = val;
                }
            }
            Opcode::Save => self.save(instr.basic)?,
            Opcode::Copy => {
                let ty = self.type_from_set(instr.value)?;
                self.copy_data(self.reg.int(), self.reg2.int(), ty)?;
            }
            Opcode::Declare => self.declare(index(instr.value))?,
            Opcode::Timeshare => return Ok(Flow::Yield),
            Opcode::FreeTemp => self.data.free_temp(),
            Opcode::Alloc => {
                let mut ty = self.type_from_set(instr.value)?;
                self.pop_array_dimensions(&mut ty)?;
                self.validate_type_size(&ty)?;
                let address = self.data.allocate(self.types.data_size(&ty));
                self.data.init_data(address, &ty, &self.types);
                self.reg = Val::from_int(address as i32);
            }
            Opcode::DataRead => self.read_program_data(instr.basic)?,
            Opcode::DataReset => self.data_offset = index(instr.value),
            Opcode::Jump => return self.jump(instr),
            Opcode::JumpTrue => {
                if self.reg.int() != 0 {
                    return self.jump(instr);
                }
            }
            Opcode::JumpFalse => {
                if self.reg.int() == 0 {
                    return self.jump(instr);
                }
            }
            Opcode::CallFunc => {
                let function = self
                    .functions
                    .get(index(instr.value))
                    .cloned()
                    .ok_or_else(|| error!(InternalError; "Invalid function"))?;
                function(self);
                if let Some(error) = self.error.take() {
                    return Err(error);
                }
            }
            Opcode::CallOperatorFunc => {
                let function = self
                    .operator_functions
                    .get(index(instr.value))
                    .cloned()
                    .ok_or_else(|| error!(InternalError; "Invalid operator function"))?;
                function(self);
                if let Some(error) = self.error.take() {
                    return Err(error);
                }
            }
            Opcode::Call => {
                let target = self.jump_target(instr)?;
                self.call_stack.push(self.ip + 1)?;
                self.ip = target;
                return Ok(Flow::Jump);
            }
            Opcode::Return => {
                let address = self
                    .call_stack
                    .pop()
                    .map_err(|_| error!(ReturnWithoutGosub; "Return without gosub"))?;
                if address >= self.program.code.len() {
                    return Err(error!(InternalError; "Stack error"));
                }
                self.ip = address;
                return Ok(Flow::Jump);
            }
            Opcode::Neg => self.reg = Operation::negate(instr.basic, self.reg)?,
            Opcode::Plus if instr.basic == BasicType::String => {
                self.reg_string.insert_str(0, &self.reg2_string);
            }
            Opcode::Plus | Opcode::Minus | Opcode::Times | Opcode::Div | Opcode::Mod => {
                self.reg = Operation::arithmetic(instr.opcode, instr.basic, self.reg2, self.reg)?
            }
            Opcode::Not => self.reg = Operation::not(instr.basic, self.reg)?,
            Opcode::Equal
            | Opcode::NotEqual
            | Opcode::Greater
            | Opcode::GreaterEqual
            | Opcode::Less
            | Opcode::LessEqual => {
                self.reg = if instr.basic == BasicType::String {
                    Operation::compare_strings(instr.opcode, &self.reg2_string, &self.reg_string)?
                } else {
                    Operation::compare(instr.opcode, instr.basic, self.reg2, self.reg)?
                }
            }
            Opcode::And | Opcode::Or | Opcode::Xor => {
                self.reg = Operation::logic(instr.opcode, self.reg2, self.reg)?
            }
            Opcode::ConvIntReal => self.reg = Val::from_real(self.reg.int() as f32),
            Opcode::ConvIntString => self.reg_string = self.reg.int().to_string(),
            Opcode::ConvRealString => self.reg_string = real_to_string(self.reg.real()),
            Opcode::ConvRealInt => self.reg = Val::from_int(self.reg.real() as i32),
            Opcode::ConvIntReal2 => self.reg2 = Val::from_real(self.reg2.int() as f32),
            Opcode::ConvIntString2 => self.reg2_string = self.reg2.int().to_string(),
            Opcode::ConvRealString2 => self.reg2_string = real_to_string(self.reg2.real()),
            Opcode::ConvRealInt2 => self.reg2 = Val::from_int(self.reg2.real() as i32),
            Opcode::Run => {
                self.reset();
                return Ok(Flow::Restart);
            }
            Opcode::Breakpt => return Ok(Flow::Pause),
        }
        Ok(Flow::Next)
    }

    fn jump_target(&self, instr: &Instruction) -> Result<usize> {
        let target = instr.value.int();
        if target < 0 || target as usize >= self.program.code.len() {
            return Err(error!(InternalError; "Invalid jump target"));
        }
        Ok(target as usize)
    }

    fn jump(&mut self, instr: &Instruction) -> Result<Flow> {
        self.ip = self.jump_target(instr)?;
        Ok(Flow::Jump)
    }

    fn pointer(&self, val: Val) -> Result<i32> {
        match val.int() {
            0 => Err(unset_pointer()),
            address => Ok(address),
        }
    }

    fn cell(&self, address: i32) -> Result<Val> {
        self.data.get(address).ok_or_else(unset_pointer)
    }

    fn cell_mut(&mut self, address: i32) -> Result<&mut Val> {
        self.data.get_mut(address).ok_or_else(unset_pointer)
    }

    fn string_at(&self, slot: Val) -> String {
        self.strings.get(slot.int()).cloned().unwrap_or_default()
    }

    fn type_from_set(&self, val: Val) -> Result<ValType> {
        self.program
            .type_set
            .get(index(val))
            .copied()
            .ok_or_else(|| error!(InternalError; "Invalid type index"))
    }

    fn save(&mut self, basic: BasicType) -> Result<()> {
        let dest = self.reg2.int();
        if dest <= 0 {
            return Err(unset_pointer());
        }
        match basic {
            BasicType::Int | BasicType::Real => *self.cell_mut(dest)? = self.reg,
            BasicType::String => {
                let mut slot = self.cell(dest)?.int();
                if slot <= 0 || !self.strings.is_allocated(slot) {
                    slot = self.strings.alloc() as i32;
                    *self.cell_mut(dest)? = Val::from_int(slot);
                }
                let value = self.reg_string.clone();
                if let Some(s) = self.strings.get_mut(slot) {
                    *s = value;
                }
            }
            _ => return Err(error!(InternalError; "Invalid save type")),
        }
        Ok(())
    }

    fn declare(&mut self, var_index: usize) -> Result<()> {
        let var = self
            .variables
            .get(var_index)
            .ok_or_else(|| error!(InternalError; "Invalid variable"))?;
        if var.allocated() {
            return Err(error!(RedimensionedArray; "ReDIMmed variable"));
        }
        let mut ty = var.ty;
        if ty.physical_pointer_level() == 0 {
            self.pop_array_dimensions(&mut ty)?;
        }
        self.validate_type_size(&ty)?;
        let address = self.data.allocate(self.types.data_size(&ty));
        self.data.init_data(address, &ty, &self.types);
        if let Some(var) = self.variables.get_mut(var_index) {
            var.ty = ty;
            var.data_index = address;
        }
        Ok(())
    }

    /// Dimension sizes are pushed outermost first, so the first pop is the innermost.
    fn pop_array_dimensions(&mut self, ty: &mut ValType) -> Result<()> {
        for i in 0..ty.array_level as usize {
            let size = self
                .stack
                .pop()?
                .int()
                .checked_add(1)
                .filter(|size| *size >= 1)
                .ok_or_else(|| error!(SubscriptOutOfRange; "Array size must be 0 or greater"))?;
            ty.array_dims[i] = size;
        }
        Ok(())
    }

    fn validate_type_size(&self, ty: &ValType) -> Result<()> {
        if self.types.data_size_bigger_than(ty, self.data.max_size()) {
            return Err(error!(OutOfMemory; "Variable is too big"));
        }
        if !self.data.room_for(self.types.data_size(ty)) {
            return Err(error!(OutOfMemory; "Ran out of variable memory"));
        }
        Ok(())
    }

    fn copy_data(&mut self, source: i32, dest: i32, mut ty: ValType) -> Result<()> {
        if ty.by_ref {
            ty.pointer_level = ty.pointer_level.saturating_sub(1);
            ty.by_ref = false;
        }
        if source <= 0 || dest <= 0 || !self.data.is_valid(source) || !self.data.is_valid(dest) {
            return Err(unset_pointer());
        }
        if ty.array_level > 0 {
            let (mut s, mut d) = (source, dest);
            for _ in 0..ty.array_level {
                if self.cell(s)?.int() != self.cell(d)?.int() {
                    return Err(error!(ArraySizeMismatch; "Array sizes are different"));
                }
                s += 2;
                d += 2;
            }
        }
        if self.types.contains_string(&ty) {
            self.copy_field(source as usize, dest as usize, &ty)
        } else {
            let size = self.block_size(source, &ty)?;
            self.block_copy(source as usize, dest as usize, size)
        }
    }

    /// Size of the block at `address`, read from array headers where present.
    fn block_size(&self, address: i32, ty: &ValType) -> Result<usize> {
        if ty.array_level == 0 || ty.pointer_level > 0 {
            return Ok(self.types.data_size(ty));
        }
        let count = self.cell(address)?.int().max(0) as usize;
        let element_size = self.cell(address + 1)?.int().max(0) as usize;
        Ok(count * element_size + 2)
    }

    fn block_copy(&mut self, source: usize, dest: usize, size: usize) -> Result<()> {
        if self.data.copy_within(source, dest, size) {
            Ok(())
        } else {
            Err(unset_pointer())
        }
    }

    fn copy_field(&mut self, source: usize, dest: usize, ty: &ValType) -> Result<()> {
        if ty.is(BasicType::String) {
            let value = self.string_at(self.cell(source as i32)?);
            let mut slot = self.cell(dest as i32)?.int();
            if slot <= 0 || !self.strings.is_allocated(slot) {
                slot = self.strings.alloc() as i32;
                *self.cell_mut(dest as i32)? = Val::from_int(slot);
            }
            if let Some(s) = self.strings.get_mut(slot) {
                *s = value;
            }
            Ok(())
        } else if ty.is_basic() || ty.virtual_pointer_level() > 0 {
            *self.cell_mut(dest as i32)? = self.cell(source as i32)?;
            Ok(())
        } else if !self.types.contains_string(ty) {
            let size = self.block_size(source as i32, ty)?;
            self.block_copy(source, dest, size)
        } else if ty.array_level > 0 {
            self.copy_array(source, dest, ty)
        } else {
            self.copy_structure(source, dest, ty)
        }
    }

    fn copy_array(&mut self, source: usize, dest: usize, ty: &ValType) -> Result<()> {
        let count = self.cell(source as i32)?.int().max(0) as usize;
        let element_size = self.cell(source as i32 + 1)?.int().max(0) as usize;
        let element = ty.element_type();
        for i in 0..count {
            let offset = 2 + i * element_size;
            self.copy_field(source + offset, dest + offset, &element)?;
        }
        Ok(())
    }

    fn copy_structure(&mut self, source: usize, dest: usize, ty: &ValType) -> Result<()> {
        let fields = match ty.basic {
            BasicType::Struct(index) => match self.types.structure(index) {
                Some(s) => s.fields.clone(),
                None => return Err(error!(InternalError; "Invalid structure")),
            },
            _ => return Err(error!(InternalError; "Invalid structure")),
        };
        for field in fields {
            self.copy_field(source + field.offset, dest + field.offset, &field.ty)?;
        }
        Ok(())
    }

    fn read_program_data(&mut self, basic: BasicType) -> Result<()> {
        let element = self
            .program
            .data
            .get(self.data_offset)
            .copied()
            .ok_or_else(|| error!(OutOfData; "Out of DATA"))?;
        self.data_offset += 1;
        match (basic, element.basic) {
            (BasicType::String, BasicType::String) => {
                self.reg_string = self
                    .program
                    .string_constants
                    .get(index(element.value))
                    .cloned()
                    .unwrap_or_default()
            }
            (BasicType::String, BasicType::Int) => self.reg_string = element.value.int().to_string(),
            (BasicType::String, BasicType::Real) => {
                self.reg_string = real_to_string(element.value.real())
            }
            (BasicType::Int, BasicType::String) | (BasicType::Real, BasicType::String) => {
                return Err(error!(TypeMismatch;
                    "Expected to READ a number, got a text string instead"))
            }
            (BasicType::Int, BasicType::Int) | (BasicType::Real, BasicType::Real) => {
                self.reg = element.value
            }
            (BasicType::Int, BasicType::Real) => {
                self.reg = Val::from_int(element.value.real() as i32)
            }
            (BasicType::Real, BasicType::Int) => {
                self.reg = Val::from_real(element.value.int() as f32)
            }
            _ => return Err(error!(InternalError; "Invalid data type")),
        }
        Ok(())
    }
}

/// Program construction, used by the compiler.
impl Vm {
    pub fn code(&self) -> &[Instruction] {
        &self.program.code
    }

    pub fn instruction_count(&self) -> usize {
        self.program.code.len()
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.program.code.get(index)
    }

    pub fn instruction_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.patch_out();
        self.program.code.get_mut(index)
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.program.code.last()
    }

    pub fn add_instruction(&mut self, instr: Instruction) {
        self.patch_out();
        self.program.code.push(instr);
    }

    pub fn remove_last_instruction(&mut self) {
        self.program.code.pop();
    }

    pub fn rollback_program(&mut self, size: usize) {
        self.patch_out();
        self.program.code.truncate(size);
    }

    pub fn store_type(&mut self, ty: &ValType) -> usize {
        self.program.store_type(ty)
    }

    pub fn store_string_constant(&mut self, s: String) -> usize {
        self.program.store_string_constant(s)
    }

    pub fn string_constants(&self) -> &[String] {
        &self.program.string_constants
    }

    pub fn type_set(&self) -> &[ValType] {
        &self.program.type_set
    }

    pub fn store_program_data(&mut self, basic: BasicType, value: Val) {
        self.program.data.push(DataElement { basic, value });
    }

    pub fn program_data_len(&self) -> usize {
        self.program.data.len()
    }

    pub fn types(&self) -> &TypeLibrary {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeLibrary {
        &mut self.types
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn data(&self) -> &Data {
        &self.data
    }
}

/// Execution control and host interface.
impl Vm {
    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn goto_instruction(&mut self, ip: usize) {
        self.ip = ip;
    }

    /// Source position of the next instruction.
    pub fn ip_position(&self) -> Option<(LineNumber, Column)> {
        self.program.code.get(self.ip).map(|i| (i.line, i.col))
    }

    pub fn done(&self) -> bool {
        self.program
            .code
            .get(self.ip)
            .map_or(true, |i| i.opcode == Opcode::End)
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Return addresses, innermost call last.
    pub fn return_addresses(&self) -> Vec<usize> {
        self.call_stack.iter().copied().collect()
    }

    pub fn add_function(&mut self, function: Function) -> usize {
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn add_operator_function(&mut self, function: Function) -> usize {
        self.operator_functions.push(function);
        self.operator_functions.len() - 1
    }

    /// Called on every reset, in registration order.
    pub fn add_init_function(&mut self, function: Function) {
        self.init_functions.push(function);
    }

    pub fn add_resources(&mut self, resources: Rc<RefCell<dyn Resources>>) {
        self.resources.push(resources);
    }

    /// Fails the current host function call.
    pub fn function_error(&mut self, name: &str) {
        self.error = Some(error!(IllegalFunctionCall; format!("Function error: {}", name)));
    }

    pub fn reg(&self) -> Val {
        self.reg
    }

    pub fn reg2(&self) -> Val {
        self.reg2
    }

    pub fn set_reg(&mut self, val: Val) {
        self.reg = val;
    }

    pub fn set_reg_int(&mut self, i: i32) {
        self.reg = Val::from_int(i);
    }

    pub fn set_reg_real(&mut self, r: f32) {
        self.reg = Val::from_real(r);
    }

    pub fn reg_string(&self) -> &str {
        &self.reg_string
    }

    pub fn reg2_string(&self) -> &str {
        &self.reg2_string
    }

    pub fn set_reg_string<S: Into<String>>(&mut self, s: S) {
        self.reg_string = s.into();
    }

    /// Function parameter. 1 is the last parameter pushed.
    pub fn param(&self, index: usize) -> Val {
        let len = self.stack.len();
        if index == 0 || index > len {
            return Val::default();
        }
        self.stack.get(len - index).copied().unwrap_or_default()
    }

    pub fn int_param(&self, index: usize) -> i32 {
        self.param(index).int()
    }

    pub fn real_param(&self, index: usize) -> f32 {
        self.param(index).real()
    }

    pub fn string_param(&self, index: usize) -> String {
        self.string_at(self.param(index))
    }

    /// Allocates a one dimensional real array in temporary data.
    pub fn temp_real_array(&mut self, values: &[f32]) -> i32 {
        let mut ty = ValType::new(BasicType::Real, 1, 0, false);
        ty.array_dims[0] = values.len() as i32;
        let address = self.data.allocate_temp(self.types.data_size(&ty));
        self.data.init_data(address, &ty, &self.types);
        for (i, value) in values.iter().enumerate() {
            if let Some(cell) = self.data.get_mut((address + 2 + i) as i32) {
                *cell = Val::from_real(*value);
            }
        }
        address as i32
    }

    pub fn read_real_array(&self, address: i32) -> Option<Vec<f32>> {
        let count = self.data.get(address)?.int();
        (0..count)
            .map(|i| self.data.get(address + 2 + i).map(|v| v.real()))
            .collect()
    }
}
