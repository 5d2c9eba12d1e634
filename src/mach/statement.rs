use super::compile::{Compiler, Result};
use super::types::{BasicType, ValType, MAX_DIMENSIONS};
use super::{Opcode, Syntax, Val};
use crate::error;
use crate::lang::{Literal, TokenKind};

fn suffix_type(name: &str) -> Option<BasicType> {
    match name.chars().last() {
        Some('$') => Some(BasicType::String),
        Some('#') => Some(BasicType::Real),
        Some('%') => Some(BasicType::Int),
        _ => None,
    }
}

impl Compiler {
    /// Rejects the current token as a new name, or takes it.
    fn take_name(&mut self, expected: &str) -> Result<String> {
        self.check_name()?;
        if self.token.kind != TokenKind::Text {
            return Err(error!(SyntaxError; format!("Expected {}", expected)));
        }
        let name = self.token.text.clone();
        self.get_token()?;
        Ok(name)
    }

    fn expect_comma(&mut self, need_comma: bool) -> Result<()> {
        if need_comma {
            if !self.token.is(",") {
                return Err(error!(SyntaxError; "Expected ','"));
            }
            self.get_token()?;
        }
        Ok(())
    }

    /// `struc name ... endstruc` or `type name ... end type`.
    pub(super) fn compile_structure(&mut self) -> Result<()> {
        let keyword = self.token.text.clone();
        self.get_token()?;

        self.check_name()?;
        if self.token.kind != TokenKind::Text {
            return Err(error!(SyntaxError; "Expected structure name"));
        }
        let name = self.token.text.clone();
        if self.vm.types().structure_index(&name).is_some() {
            return Err(error!(SyntaxError; format!(
                "'{}' has already been used as a structure name",
                name
            )));
        }
        self.get_token()?;
        self.skip_separators()?;

        let index = self.vm.types_mut().new_structure(&name);
        if self.token.is("endstruc") || self.token.is("end") {
            return Err(error!(SyntaxError; "Expected DIM or field name"));
        }
        while !self.token.is("endstruc") && !self.token.is("end") {
            self.compile_dim_list(Some(index))?;
            self.skip_separators()?;
        }

        if self.token.is("end") {
            self.get_token()?;
            if !self.token.is(&keyword) {
                return Err(error!(SyntaxError; format!("Expected '{}'", keyword)));
            }
        } else if keyword != "struc" {
            return Err(error!(SyntaxError; format!("Expected 'end {}'", keyword)));
        }
        self.get_token()
    }

    pub(super) fn compile_dim(&mut self) -> Result<()> {
        self.compile_dim_list(None)
    }

    /// Fields of a `dim`. Inside a structure they become fields of `structure`,
    /// otherwise variables with a `DECLARE` each.
    fn compile_dim_list(&mut self, structure: Option<usize>) -> Result<()> {
        if self.token.is("dim") {
            self.get_token()?;
        }
        if self.at_statement_end() {
            return Err(error!(SyntaxError; "Expected variable declaration"));
        }

        let mut need_comma = false;
        while !self.at_statement_end() {
            self.expect_comma(need_comma)?;
            need_comma = true;

            let (name, ty) = self.compile_dim_field(structure.is_some())?;
            match structure {
                Some(index) => self.add_structure_field(index, &name, ty)?,
                None => self.declare_variable(&name, ty)?,
            }
        }
        Ok(())
    }

    fn add_structure_field(&mut self, index: usize, name: &str, ty: ValType) -> Result<()> {
        let types = self.vm.types();
        let structure = types
            .structure(index)
            .ok_or_else(|| error!(InternalError; "Invalid structure"))?;
        if structure.field(name).is_some() {
            return Err(error!(SyntaxError; format!(
                "Field '{}' has already been DIMmed in structure '{}'",
                name, structure.name
            )));
        }
        if ty.pointer_level == 0 && ty.basic == BasicType::Struct(index) {
            return Err(error!(SyntaxError; "Structure cannot contain an element of its own type"));
        }
        self.vm.types_mut().add_field(name, ty)
    }

    fn declare_variable(&mut self, name: &str, ty: ValType) -> Result<()> {
        let index = match self.vm.variables().find(name) {
            Some(index) => {
                let same = self.vm.variables().get(index).map_or(false, |var| var.ty == ty);
                if !same {
                    return Err(error!(TypeMismatch; format!(
                        "Variable '{}' has already been allocated as a different type.",
                        name
                    )));
                }
                index
            }
            None => self.vm.variables_mut().add(name, ty),
        };
        self.add_instruction(Opcode::Declare, BasicType::Int, Val::from_int(index as i32));
        if ty.physical_pointer_level() == 0 {
            for _ in 0..ty.array_level {
                self.operands.pop();
            }
        }
        Ok(())
    }

    /// One `[type] [&]name[(dims)] [as type]` declaration.
    fn compile_dim_field(&mut self, for_structure: bool) -> Result<(String, ValType)> {
        let mut ty = ValType::from(BasicType::Undefined);

        if self.token.kind == TokenKind::Text {
            if let Some(index) = self.vm.types().structure_index(&self.token.text) {
                ty.basic = BasicType::Struct(index);
                self.get_token()?;
            }
        }
        if self.token.is("&") {
            ty.pointer_level += 1;
            self.get_token()?;
        }

        let name = self.take_name("variable name")?;
        let suffix = suffix_type(&name);
        if ty.basic == BasicType::Undefined {
            ty.basic = suffix.unwrap_or(BasicType::Int);
        } else if suffix.is_some() {
            return Err(error!(SyntaxError; format!(
                "\"{}\" is a structure variable, and cannot end with #, $ or %",
                name
            )));
        }

        if self.token.is("(") {
            let mut found_comma = false;
            while self.token.is("(") || found_comma {
                if ty.array_level as usize >= MAX_DIMENSIONS {
                    return Err(error!(SyntaxError; format!(
                        "Arrays cannot have more than {} dimensions.",
                        MAX_DIMENSIONS
                    )));
                }
                self.get_token()?;

                if ty.pointer_level > 0 {
                    if !self.token.is(")") {
                        return Err(error!(SyntaxError; "Use '()' to declare a pointer to an array"));
                    }
                    ty.array_level += 1;
                } else if for_structure {
                    let size = match &self.token.kind {
                        TokenKind::Constant(Literal::Int(size)) => *size,
                        _ => {
                            return Err(error!(SyntaxError; "Expected array size as integer constant"))
                        }
                    };
                    ty.push_dimension(size.saturating_add(1))?;
                    self.get_token()?;
                } else {
                    self.compile_expression(false)?;
                    self.compile_convert_basic(BasicType::Int)?;
                    self.compile_push()?;
                    ty.array_level += 1;
                }

                found_comma = false;
                if self.token.is(")") {
                    self.get_token()?;
                } else if self.token.is(",") {
                    found_comma = true;
                } else {
                    return Err(error!(SyntaxError; "Expected ')' or ','"));
                }
            }
        }

        if self.token.is("as") {
            if ty.basic != BasicType::Int || suffix == Some(BasicType::Int) {
                return Err(error!(SyntaxError; format!(
                    "'{}'s type has already been defined. Cannot use 'as' here.",
                    name
                )));
            }
            self.get_token()?;
            let expected = || {
                error!(SyntaxError; "Expected 'single', 'double', 'real', 'integer', 'string' or type name")
            };
            if self.token.kind != TokenKind::Text && self.token.kind != TokenKind::Keyword {
                return Err(expected());
            }
            ty.basic = match self.token.text.as_str() {
                "integer" => BasicType::Int,
                "single" | "double" | "real" => BasicType::Real,
                "string" => BasicType::String,
                text => BasicType::Struct(
                    self.vm.types().structure_index(text).ok_or_else(expected)?,
                ),
            };
            self.get_token()?;
        }
        Ok((name, ty))
    }

    /// `goto` and `gosub`. The target is patched in when the program is linked.
    pub(super) fn compile_goto(&mut self, opcode: Opcode) -> Result<()> {
        if self.token.kind != TokenKind::Text {
            return Err(error!(SyntaxError; "Expected label name"));
        }
        let offset = self.vm.instruction_count();
        self.link.jump_to_label(offset, &self.token.text);
        self.add_instruction(opcode, BasicType::Int, Val::from_int(0));
        self.get_token()
    }

    pub(super) fn compile_const(&mut self) -> Result<()> {
        self.get_token()?;
        if self.at_statement_end() {
            return Err(error!(SyntaxError; "Expected constant declaration"));
        }

        let mut need_comma = false;
        while !self.at_statement_end() {
            self.expect_comma(need_comma)?;
            need_comma = true;

            if self.program_constants.contains_key(&self.token.text) {
                return Err(error!(SyntaxError; format!(
                    "'{}' has already been declared as a constant.",
                    self.token.text
                )));
            }
            let name = self.take_name("constant name")?;
            let basic = suffix_type(&name).unwrap_or(BasicType::Int);
            if !self.token.is("=") {
                return Err(error!(SyntaxError; "Expected '='"));
            }
            self.get_token()?;
            let value = self.evaluate_constant(Some(basic))?;
            self.program_constants.insert(name, value);
        }
        Ok(())
    }

    /// `alloc pointer [, dims...]`
    pub(super) fn compile_alloc(&mut self) -> Result<()> {
        self.get_token()?;
        let not_pointer = || error!(TypeMismatch; "First argument must be a pointer");
        if self.token.is("&") {
            return Err(not_pointer());
        }

        self.compile_load_var()?;
        self.compile_take_address()?;
        let ptr_type = self.reg_type;
        let mut data_type = self.reg_type;
        data_type.by_ref = false;
        data_type.pointer_level = data_type
            .pointer_level
            .checked_sub(1)
            .ok_or_else(not_pointer)?;
        self.compile_take_address().map_err(|_| not_pointer())?;
        self.compile_push()?;

        for _ in 0..data_type.array_level {
            if !self.token.is(",") {
                return Err(error!(SyntaxError; "Expected ','"));
            }
            self.get_token()?;
            self.compile_expression(false)?;
            if self.compile_convert_basic(BasicType::Int).is_err() {
                return Err(error!(TypeMismatch; format!(
                    "Array index must be a number. {} is not a number",
                    self.vm.types().describe(&self.reg_type)
                )));
            }
            self.compile_push()?;
        }

        let index = self.vm.store_type(&data_type);
        self.add_instruction(Opcode::Alloc, BasicType::Int, Val::from_int(index as i32));
        for _ in 0..data_type.array_level {
            self.operands.pop();
        }
        self.reg_type = ptr_type;
        self.reg_type.by_ref = false;
        self.compile_pop()?;
        self.add_instruction(Opcode::Save, BasicType::Int, Val::default());
        Ok(())
    }

    /// Stores `data` items in the program. No code is generated.
    pub(super) fn compile_data(&mut self) -> Result<()> {
        self.get_data_token()?;
        let mut need_comma = false;
        loop {
            if need_comma {
                if !self.token.is(",") {
                    return Err(error!(SyntaxError; "Expected ','"));
                }
                self.get_data_token()?;
            }
            need_comma = true;

            if self.token.is(",") || self.at_statement_end() {
                let index = self.vm.store_string_constant(String::new());
                self.vm.store_program_data(BasicType::String, Val::from_int(index as i32));
            } else {
                let (basic, value) = match &self.token.kind {
                    TokenKind::Constant(Literal::Int(i)) => (BasicType::Int, Val::from_int(*i)),
                    TokenKind::Constant(Literal::Real(r)) => (BasicType::Real, Val::from_real(*r)),
                    TokenKind::Constant(Literal::String(s)) => {
                        let index = self.vm.store_string_constant(s.clone());
                        (BasicType::String, Val::from_int(index as i32))
                    }
                    _ => {
                        let index = self.vm.store_string_constant(self.token.text.clone());
                        (BasicType::String, Val::from_int(index as i32))
                    }
                };
                self.vm.store_program_data(basic, value);
                self.get_token()?;
            }
            if self.at_statement_end() {
                return Ok(());
            }
        }
    }

    pub(super) fn compile_read(&mut self) -> Result<()> {
        self.get_token()?;
        if self.at_statement_end() {
            return Err(error!(SyntaxError; "Expected variable name"));
        }

        let mut need_comma = false;
        while !self.at_statement_end() {
            self.expect_comma(need_comma)?;
            need_comma = true;

            self.compile_load_var()?;
            let ty = self.reg_type;
            if !ty.is_basic() {
                return Err(error!(TypeMismatch; "Can only READ built in types (int, real or string)"));
            }
            self.compile_take_address()
                .map_err(|_| error!(SyntaxError; "Value cannot be READ into"))?;
            self.compile_push()?;
            self.add_instruction(Opcode::DataRead, ty.basic, Val::default());
            self.compile_pop()?;
            self.add_instruction(Opcode::Save, self.reg2_type.basic, Val::default());
        }
        Ok(())
    }

    /// `reset [label]`
    pub(super) fn compile_reset(&mut self) -> Result<()> {
        self.get_token()?;
        if !self.at_statement_end() {
            if self.token.kind != TokenKind::Text {
                return Err(error!(SyntaxError; "Expected label name"));
            }
            let offset = self.vm.instruction_count();
            self.link.reset_to_label(offset, &self.token.text);
            self.get_token()?;
        }
        self.add_instruction(Opcode::DataReset, BasicType::Int, Val::from_int(0));
        Ok(())
    }

    /// `print` and `printr` join their `;` separated operands into one string
    /// and hand it to the host's print function.
    pub(super) fn compile_print(&mut self, force_newline: bool) -> Result<()> {
        self.get_token()?;
        let mut found_semicolon = false;
        let mut count = 0;
        while !self.at_statement_end() {
            if self.token.is(";") {
                found_semicolon = true;
                self.get_token()?;
                continue;
            }
            found_semicolon = false;
            if count > 0 {
                self.compile_push()?;
            }
            self.compile_expression(false)?;
            self.compile_convert_basic(BasicType::String)?;
            count += 1;
        }

        while count > 1 {
            self.compile_pop()?;
            self.add_instruction(Opcode::Plus, BasicType::String, Val::default());
            self.reg_type = ValType::from(BasicType::String);
            count -= 1;
        }
        if count == 1 {
            self.compile_push()?;
        }

        let traditional = self.syntax == Syntax::Traditional || self.syntax == Syntax::TraditionalPrint;
        let newline = force_newline || (traditional && !found_semicolon);
        if !newline && count == 0 {
            return Ok(());
        }
        let spec = self.find_function(if newline { "printr" } else { "print" }, count)?;
        self.add_instruction(Opcode::CallFunc, BasicType::Int, Val::from_int(spec.index as i32));
        if count == 1 {
            self.compile_pop()?;
        }
        Ok(())
    }

    /// `input ["prompt" (;|,)] variable`, compiled as
    /// `variable = input$()` or `variable = val(input$())`.
    pub(super) fn compile_input(&mut self) -> Result<()> {
        self.get_token()?;

        if let TokenKind::Constant(Literal::String(prompt)) = &self.token.kind {
            let mut prompt = prompt.clone();
            self.get_token()?;
            if self.token.is(";") {
                prompt.push_str("? ");
            } else if !self.token.is(",") {
                return Err(error!(SyntaxError; "Expected ',' or ';'"));
            }
            self.get_token()?;

            let index = self.vm.store_string_constant(prompt);
            self.add_instruction(Opcode::LoadConst, BasicType::String, Val::from_int(index as i32));
            self.reg_type = ValType::from(BasicType::String);
            self.compile_push()?;
            let spec = self.find_function("print", 1)?;
            self.add_instruction(Opcode::CallFunc, BasicType::Int, Val::from_int(spec.index as i32));
            self.compile_pop()?;
        }

        self.compile_load_var()?;
        if !self.reg_type.is_basic() {
            return Err(error!(TypeMismatch;
                "Input variable must be a basic string, integer or real type"));
        }
        let basic = self.reg_type.basic;
        self.compile_take_address()?;
        self.compile_push()?;

        let spec = self.find_function("input$", 0)?;
        self.add_instruction(Opcode::CallFunc, BasicType::Int, Val::from_int(spec.index as i32));
        self.add_instruction(Opcode::Timeshare, BasicType::Int, Val::default());
        self.reg_type = ValType::from(BasicType::String);

        if basic != BasicType::String {
            self.compile_push()?;
            let spec = self.find_function("val", 1)?;
            self.add_instruction(Opcode::CallFunc, BasicType::Int, Val::from_int(spec.index as i32));
            self.reg_type = ValType::from(BasicType::Real);
            self.compile_pop()?;
        }

        self.compile_pop()?;
        let target = self.reg2_type.basic;
        self.compile_convert_basic(target)
            .map_err(|_| error!(TypeMismatch; "Types do not match"))?;
        self.add_instruction(Opcode::Save, target, Val::default());
        Ok(())
    }

    pub(super) fn compile_language(&mut self) -> Result<()> {
        self.get_token()?;
        self.syntax = match self.token.text.as_str() {
            "traditional" if !self.token.is_constant() => Syntax::Traditional,
            "basic4gl" if !self.token.is_constant() => Syntax::Basic4gl,
            "traditional_print" if !self.token.is_constant() => Syntax::TraditionalPrint,
            _ => {
                return Err(error!(SyntaxError;
                    "Expected 'traditional', 'basic4gl' or 'traditional_print'"))
            }
        };
        self.get_token()
    }

    /// `target = expression`. Scalars are converted and saved, pointers are
    /// re-pointed and structures or arrays are copied.
    pub(super) fn compile_assignment(&mut self) -> Result<()> {
        self.compile_load_var()?;
        if !self.token.is("=") {
            return Err(error!(SyntaxError; "Expected '='"));
        }
        self.compile_take_address()
            .map_err(|_| error!(SyntaxError; "Left side cannot be assigned to"))?;
        self.get_token()?;
        self.compile_push()?;
        self.compile_expression(false)?;
        self.compile_pop()?;

        let mismatch = || error!(TypeMismatch; "Types do not match");
        let (reg, reg2) = (self.reg_type, self.reg2_type);
        if reg2.pointer_level == 1 && reg2.array_level == 0 && reg2.basic.is_scalar() {
            self.compile_convert_basic(reg2.basic).map_err(|_| mismatch())?;
            self.add_instruction(Opcode::Save, reg2.basic, Val::default());
        } else if reg2.virtual_pointer_level() == 2 && reg.virtual_pointer_level() == 1 {
            if !(reg.is_null() || (reg.array_level == reg2.array_level && reg.basic == reg2.basic)) {
                return Err(mismatch());
            }
            self.add_instruction(Opcode::Save, BasicType::Int, Val::default());
        } else if reg2.virtual_pointer_level() == 1
            && reg.virtual_pointer_level() == 0
            && reg.physical_pointer_level() == 1
        {
            if reg.array_level != reg2.array_level || reg.basic != reg2.basic {
                return Err(mismatch());
            }
            let index = self.vm.store_type(&reg);
            self.add_instruction(Opcode::Copy, BasicType::Int, Val::from_int(index as i32));
        } else {
            return Err(mismatch());
        }
        Ok(())
    }
}
