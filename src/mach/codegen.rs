use super::compile::{Compiler, OperatorKind, Result, LEFT_BRACKET, STOP};
use super::types::{BasicType, ValType};
use super::{Opcode, Syntax, Val};
use crate::error;
use crate::lang::{Literal, TokenKind};

/// Opcode that converts `from` to `to`. `None` when no code is needed.
fn conversion(from: &ValType, to: BasicType, second: bool) -> Result<Option<Opcode>> {
    if from.is(to) {
        return Ok(None);
    }
    if !from.is_basic() {
        return Err(error!(TypeMismatch; "Incorrect data type"));
    }
    let opcode = match (from.basic, to, second) {
        (BasicType::Int, BasicType::Real, false) => Opcode::ConvIntReal,
        (BasicType::Int, BasicType::String, false) => Opcode::ConvIntString,
        (BasicType::Real, BasicType::String, false) => Opcode::ConvRealString,
        (BasicType::Real, BasicType::Int, false) => Opcode::ConvRealInt,
        (BasicType::Int, BasicType::Real, true) => Opcode::ConvIntReal2,
        (BasicType::Int, BasicType::String, true) => Opcode::ConvIntString2,
        (BasicType::Real, BasicType::String, true) => Opcode::ConvRealString2,
        (BasicType::Real, BasicType::Int, true) => Opcode::ConvRealInt2,
        _ => return Err(error!(TypeMismatch; "Incorrect data type")),
    };
    Ok(Some(opcode))
}

impl Compiler {
    pub(super) fn compile_expression(&mut self, must_be_constant: bool) -> Result<()> {
        self.operators.push(STOP);
        self.compile_expression_load(must_be_constant)?;

        loop {
            let top = self.operators.last().map_or(OperatorKind::Stop, |op| op.kind);
            if self.token.is(")") && top != OperatorKind::Stop {
                loop {
                    match self.operators.last().map(|op| op.kind) {
                        Some(OperatorKind::Stop) | None => break,
                        Some(OperatorKind::LeftBracket) => break,
                        Some(_) => self.compile_operation()?,
                    }
                }
                if self.operators.last().map(|op| op.kind) != Some(OperatorKind::LeftBracket) {
                    // The bracket belongs to an enclosing construct.
                    self.operators.pop();
                    return Ok(());
                }
                self.operators.pop();
                self.get_token()?;
                self.compile_data_lookup(false)?;
                continue;
            }

            let op = match self.binary_operator() {
                Some(op) => op,
                None => break,
            };
            while let Some(top) = self.operators.last() {
                if top.kind == OperatorKind::Stop || top.binding < op.binding {
                    break;
                }
                self.compile_operation()?;
            }
            self.operators.push(op);
            self.compile_push()?;
            self.get_token()?;
            self.compile_expression_load(must_be_constant)?;
        }

        while let Some(top) = self.operators.last() {
            if top.kind == OperatorKind::Stop {
                break;
            }
            self.compile_operation()?;
        }
        self.operators.pop();
        Ok(())
    }

    fn compile_expression_load(&mut self, must_be_constant: bool) -> Result<()> {
        loop {
            if self.token.is("(") {
                self.operators.push(LEFT_BRACKET);
            } else if let Some(op) = self.unary_operator() {
                self.operators.push(op);
            } else if must_be_constant {
                return self.compile_load_const();
            } else {
                return self.compile_load();
            }
            self.get_token()?;
        }
    }

    pub(super) fn compile_operation(&mut self) -> Result<()> {
        let op = self
            .operators
            .pop()
            .ok_or_else(|| error!(InternalError; "Expression error"))?;
        if op.kind == OperatorKind::LeftBracket {
            return Err(error!(SyntaxError; "Expected ')'"));
        }

        if op.params == 1 {
            if self.compile_extended_unary(op.opcode)? {
                return Ok(());
            }
            if !self.reg_type.is_basic() {
                return Err(error!(TypeMismatch; "Operator cannot be applied to this data type"));
            }
            if op.kind == OperatorKind::Bool {
                self.compile_convert_basic(BasicType::Int)?;
            }
            self.add_instruction(op.opcode, self.reg_type.basic, Val::default());
            if op.kind == OperatorKind::ReturnBool {
                self.reg_type = ValType::from(BasicType::Int);
            }
            return Ok(());
        }

        self.compile_pop()?;
        if self.compile_extended_binary(op.opcode)? {
            return Ok(());
        }

        let equality = op.opcode == Opcode::Equal || op.opcode == Opcode::NotEqual;
        let basic = if self.reg_type.is_null() || self.reg2_type.is_null() {
            if !equality {
                return Err(error!(TypeMismatch; "Operator cannot be applied to this data type"));
            }
            if self.reg_type.is_null() {
                let ty = self.reg2_type;
                self.compile_convert(&ty)?;
            }
            if self.reg2_type.is_null() {
                let ty = self.reg_type;
                self.compile_convert2(&ty)?;
            }
            BasicType::Int
        } else if self.reg_type.virtual_pointer_level() > 0
            || self.reg2_type.virtual_pointer_level() > 0
        {
            if !equality {
                return Err(error!(TypeMismatch; "Operator cannot be applied to this data type"));
            }
            if !self.reg_type.exact_equals(&self.reg2_type) {
                return Err(error!(TypeMismatch; "Cannot compare pointers to different types"));
            }
            BasicType::Int
        } else {
            if !self.reg_type.is_basic() || !self.reg2_type.is_basic() {
                return Err(error!(TypeMismatch; "Operator cannot be applied to this data type"));
            }
            let mut highest = if self.reg2_type.basic.rank() > self.reg_type.basic.rank() {
                self.reg2_type.basic
            } else {
                self.reg_type.basic
            };
            if op.kind == OperatorKind::Bool {
                highest = BasicType::Int;
            }
            if self.syntax == Syntax::Traditional && op.opcode == Opcode::Div {
                highest = BasicType::Real;
            }
            self.compile_convert_basic(highest)?;
            self.compile_convert_basic2(highest)?;
            highest
        };

        self.add_instruction(op.opcode, basic, Val::default());
        if op.kind == OperatorKind::ReturnBool {
            self.reg_type = ValType::from(BasicType::Int);
        }
        Ok(())
    }

    fn compile_extended_unary(&mut self, opcode: Opcode) -> Result<bool> {
        let reg_type = self.reg_type;
        let overload = self
            .unary_extensions
            .iter()
            .find_map(|extension| extension(&reg_type, opcode));
        let overload = match overload {
            Some(overload) => overload,
            None => return Ok(false),
        };
        self.compile_convert(&overload.reg)?;
        self.add_instruction(
            Opcode::CallOperatorFunc,
            BasicType::Int,
            Val::from_int(overload.function as i32),
        );
        self.reg_type = overload.result;
        self.free_temp |= overload.free_temp;
        Ok(true)
    }

    fn compile_extended_binary(&mut self, opcode: Opcode) -> Result<bool> {
        let (reg_type, reg2_type) = (self.reg_type, self.reg2_type);
        let overload = self
            .binary_extensions
            .iter()
            .find_map(|extension| extension(&reg_type, &reg2_type, opcode));
        let overload = match overload {
            Some(overload) => overload,
            None => return Ok(false),
        };
        self.compile_convert(&overload.reg)?;
        self.compile_convert2(&overload.reg2)?;
        self.add_instruction(
            Opcode::CallOperatorFunc,
            BasicType::Int,
            Val::from_int(overload.function as i32),
        );
        self.reg_type = overload.result;
        self.free_temp |= overload.free_temp;
        Ok(true)
    }

    /// Pushes reg. The operand type stack tracks what is on the machine stack.
    pub(super) fn compile_push(&mut self) -> Result<()> {
        self.operands.push(self.reg_type);
        self.add_instruction(Opcode::Push, self.reg_type.stored_type(), Val::default());
        Ok(())
    }

    pub(super) fn compile_pop(&mut self) -> Result<()> {
        self.reg2_type = self
            .operands
            .pop()
            .ok_or_else(|| error!(InternalError; "Expression error"))?;
        self.add_instruction(Opcode::Pop, self.reg2_type.stored_type(), Val::default());
        Ok(())
    }

    pub(super) fn compile_load_const(&mut self) -> Result<()> {
        if self.token.is("null") {
            self.add_instruction(Opcode::LoadConst, BasicType::Int, Val::from_int(0));
            self.reg_type = ValType::null();
            return self.get_token();
        }
        let literal = match &self.token.kind {
            TokenKind::Constant(literal) => literal.clone(),
            _ => return Err(error!(SyntaxError; "Expected constant")),
        };
        match literal {
            Literal::Int(i) => {
                self.add_instruction(Opcode::LoadConst, BasicType::Int, Val::from_int(i));
                self.reg_type = ValType::from(BasicType::Int);
            }
            Literal::Real(r) => {
                self.add_instruction(Opcode::LoadConst, BasicType::Real, Val::from_real(r));
                self.reg_type = ValType::from(BasicType::Real);
            }
            Literal::String(s) => {
                let index = self.vm.store_string_constant(s);
                self.add_instruction(
                    Opcode::LoadConst,
                    BasicType::String,
                    Val::from_int(index as i32),
                );
                self.reg_type = ValType::from(BasicType::String);
            }
        }
        self.get_token()
    }

    fn compile_load(&mut self) -> Result<()> {
        if self.token.is_constant() || self.token.is("null") {
            self.compile_load_const()
        } else if self.token.kind == TokenKind::Text || self.token.is("&") {
            self.compile_load_var()
        } else if self.token.kind == TokenKind::Function {
            self.compile_function(true)
        } else {
            Err(error!(SyntaxError; "Expected constant, variable or function"))
        }
    }

    /// Loads a variable's value, or its address when prefixed with `&`.
    pub(super) fn compile_load_var(&mut self) -> Result<()> {
        let take_address = self.token.is("&");
        if take_address {
            self.get_token()?;
        }
        if self.token.kind != TokenKind::Text {
            return Err(error!(SyntaxError; "Expected variable name"));
        }
        let name = self.token.text.clone();
        let (index, ty) = self.find_variable(&name)?;
        self.add_instruction(Opcode::LoadVar, BasicType::Int, Val::from_int(index as i32));
        self.reg_type = ty;
        self.reg_type.pointer_level += 1;
        self.reg_type.by_ref = false;
        self.get_token()?;
        self.compile_derefs()?;
        self.compile_data_lookup(take_address)
    }

    pub(super) fn find_variable(&self, name: &str) -> Result<(usize, ValType)> {
        let unknown = || {
            error!(UndimmedVariable; format!(
                "Unknown variable: {}. Must be declared with DIM",
                name
            ))
        };
        let index = self.vm.variables().find(name).ok_or_else(unknown)?;
        let var = self.vm.variables().get(index).ok_or_else(unknown)?;
        if !super::var::suffix_matches(name, &var.ty) {
            return Err(error!(TypeMismatch; format!(
                "Variable '{}' was declared as a different type",
                var.name
            )));
        }
        Ok((index, var.ty))
    }

    fn compile_derefs(&mut self) -> Result<()> {
        self.compile_deref()?;
        if self.reg_type.virtual_pointer_level() > 0 {
            self.compile_deref()?;
        }
        Ok(())
    }

    /// Arrays and structures don't fit in a register, so they stay
    /// pointers and are marked by reference instead.
    fn compile_deref(&mut self) -> Result<()> {
        if self.reg_type.virtual_pointer_level() == 0 {
            return Err(error!(InternalError; "Attempted to dereference a non-pointer"));
        }
        if self.reg_type.physical_pointer_level() == 1
            && (self.reg_type.array_level > 0 || self.reg_type.basic.is_struct())
        {
            self.reg_type.by_ref = true;
            return Ok(());
        }
        self.reg_type.pointer_level -= 1;
        self.add_instruction(Opcode::Deref, self.reg_type.stored_type(), Val::default());
        Ok(())
    }

    /// Field access and array indexing after a value.
    pub(super) fn compile_data_lookup(&mut self, take_address: bool) -> Result<()> {
        loop {
            if self.token.is(".") {
                self.compile_field_lookup()?;
            } else if self.token.is("(") {
                self.compile_array_lookup()?;
            } else {
                break;
            }
        }
        if take_address {
            self.compile_take_address()?;
        }
        Ok(())
    }

    fn compile_field_lookup(&mut self) -> Result<()> {
        let index = match self.reg_type.basic {
            BasicType::Struct(index)
                if self.reg_type.virtual_pointer_level() == 0 && self.reg_type.array_level == 0 =>
            {
                index
            }
            _ => return Err(error!(SyntaxError; "Unexpected '.'")),
        };
        self.get_token()?;
        if self.token.kind != TokenKind::Text {
            return Err(error!(SyntaxError; "Expected field name"));
        }
        let structure = self
            .vm
            .types()
            .structure(index)
            .ok_or_else(|| error!(InternalError; "Invalid structure"))?;
        let field = structure.field(&self.token.text).cloned().ok_or_else(|| {
            error!(SyntaxError; format!(
                "'{}' is not a field of structure '{}'",
                self.token.text, structure.name
            ))
        })?;
        if field.offset > 0 {
            self.add_instruction(
                Opcode::AddConst,
                BasicType::Int,
                Val::from_int(field.offset as i32),
            );
        }
        self.reg_type = field.ty;
        self.reg_type.pointer_level += 1;
        self.reg_type.by_ref = false;
        self.get_token()?;
        self.compile_derefs()
    }

    fn compile_array_lookup(&mut self) -> Result<()> {
        if self.reg_type.virtual_pointer_level() != 0 || self.reg_type.array_level == 0 {
            return Err(error!(SyntaxError; "Unexpected '('"));
        }
        loop {
            if self.reg_type.array_level == 0 {
                return Err(error!(SyntaxError; "Unexpected ','"));
            }
            self.get_token()?;
            self.compile_push()?;
            self.compile_expression(false)?;
            if !self.reg_type.is_basic() || self.reg_type.basic == BasicType::String {
                return Err(error!(TypeMismatch; format!(
                    "Array index must be a number. {} is not a number",
                    self.vm.types().describe(&self.reg_type)
                )));
            }
            self.compile_convert_basic(BasicType::Int)?;
            self.compile_pop()?;
            self.add_instruction(Opcode::ArrayIndex, BasicType::Int, Val::default());
            self.reg_type = self.reg2_type;
            self.reg_type.by_ref = false;
            self.reg_type.pointer_level = 1;
            self.reg_type.array_level -= 1;
            self.compile_derefs()?;
            if !self.token.is(",") {
                break;
            }
        }
        if !self.token.is(")") {
            return Err(error!(SyntaxError; "Expected ')'"));
        }
        self.get_token()
    }

    pub(super) fn compile_take_address(&mut self) -> Result<()> {
        if self.reg_type.by_ref {
            self.reg_type.by_ref = false;
            return Ok(());
        }
        match self.vm.last_instruction() {
            Some(instr) if instr.opcode == Opcode::Deref => {
                self.vm.remove_last_instruction();
                self.reg_type.pointer_level += 1;
                Ok(())
            }
            _ => Err(error!(SyntaxError; "Cannot take address of this data")),
        }
    }

    pub(super) fn compile_convert_basic(&mut self, basic: BasicType) -> Result<()> {
        if let Some(opcode) = conversion(&self.reg_type, basic, false)? {
            self.add_instruction(opcode, BasicType::Int, Val::default());
            self.reg_type = ValType::from(basic);
        }
        Ok(())
    }

    pub(super) fn compile_convert_basic2(&mut self, basic: BasicType) -> Result<()> {
        if let Some(opcode) = conversion(&self.reg2_type, basic, true)? {
            self.add_instruction(opcode, BasicType::Int, Val::default());
            self.reg2_type = ValType::from(basic);
        }
        Ok(())
    }

    pub(super) fn compile_convert(&mut self, ty: &ValType) -> Result<()> {
        if self.reg_type.is_null() {
            if ty.virtual_pointer_level() == 0 {
                return Err(error!(TypeMismatch; format!(
                    "Cannot convert NULL to {}",
                    self.vm.types().describe(ty)
                )));
            }
            self.reg_type = *ty;
            return Ok(());
        }
        if ty.pointer_level == 1
            && ty.by_ref
            && self.reg_type.pointer_level == 0
            && self.reg_type.basic == ty.basic
            && self.reg_type.array_level == ty.array_level
        {
            self.compile_take_address()?;
            self.reg_type.by_ref = true;
            return Ok(());
        }
        if ty.is_basic() {
            return self.compile_convert_basic(ty.basic);
        }
        if self.reg_type.exact_equals(ty) {
            return Ok(());
        }
        Err(error!(TypeMismatch; format!(
            "Cannot convert to {}",
            self.vm.types().describe(ty)
        )))
    }

    pub(super) fn compile_convert2(&mut self, ty: &ValType) -> Result<()> {
        if self.reg2_type.is_null() {
            if ty.virtual_pointer_level() == 0 {
                return Err(error!(TypeMismatch; format!(
                    "Cannot convert NULL to {}",
                    self.vm.types().describe(ty)
                )));
            }
            self.reg2_type = *ty;
            return Ok(());
        }
        if ty.is_basic() {
            return self.compile_convert_basic2(ty.basic);
        }
        if self.reg2_type.exact_equals(ty) {
            return Ok(());
        }
        Err(error!(TypeMismatch; format!(
            "Cannot convert to {}",
            self.vm.types().describe(ty)
        )))
    }

    /// Calls a host function, choosing the overload from the arguments.
    pub(super) fn compile_function(&mut self, need_result: bool) -> Result<()> {
        let name = self.token.text.clone();
        let all = self.function_index.get(&name).cloned().unwrap_or_default();
        let mut candidates: Vec<usize> = all
            .iter()
            .copied()
            .filter(|i| !need_result || self.functions[*i].is_function)
            .collect();
        if candidates.is_empty() {
            return Err(if all.is_empty() {
                error!(SyntaxError; format!("{} is not a recognised function name", name))
            } else {
                error!(SyntaxError; format!("{} does not return a value", name))
            });
        }
        self.get_token()?;

        let mut brackets = self.functions[candidates[0]].brackets;
        if self.syntax == Syntax::Traditional && brackets {
            brackets = candidates.iter().any(|i| self.functions[*i].is_function);
        }
        if brackets {
            if !self.token.is("(") {
                return Err(error!(SyntaxError; "Expected '('"));
            }
            self.get_token()?;
        }

        let mut count = 0;
        while !self.token.is(")") && !self.at_statement_end() {
            {
                let functions = &self.functions;
                candidates.retain(|i| functions[*i].params.len() > count);
            }
            if candidates.is_empty() {
                return Err(if brackets {
                    error!(SyntaxError; "Expected ')'")
                } else {
                    error!(SyntaxError; "Expected ':' or end of line")
                });
            }
            if count > 0 {
                if !self.token.is(",") {
                    return Err(error!(SyntaxError; "Expected ','"));
                }
                self.get_token()?;
            }
            self.compile_expression(false)?;

            let mut matched = None;
            let mut last_error = None;
            for i in candidates.clone() {
                let ty = self.functions[i].params[count];
                match self.compile_convert(&ty) {
                    Ok(()) => {
                        matched = Some(ty);
                        break;
                    }
                    Err(error) => last_error = Some(error),
                }
            }
            let ty = match (matched, last_error) {
                (Some(ty), _) => ty,
                (None, Some(error)) => return Err(error),
                (None, None) => return Err(error!(InternalError; "No candidate function")),
            };
            {
                let functions = &self.functions;
                candidates.retain(|i| functions[*i].params[count].exact_equals(&ty));
            }
            self.compile_push()?;
            count += 1;
        }

        let spec = candidates
            .iter()
            .map(|i| &self.functions[*i])
            .find(|spec| spec.params.len() == count)
            .cloned()
            .ok_or_else(|| {
                if count == 0 {
                    error!(SyntaxError; "Expected function parameter")
                } else {
                    error!(SyntaxError; "Expected ','")
                }
            })?;
        if brackets {
            if !self.token.is(")") {
                return Err(error!(SyntaxError; "Expected ')'"));
            }
            self.get_token()?;
        }

        self.add_instruction(Opcode::CallFunc, BasicType::Int, Val::from_int(spec.index as i32));
        if spec.is_function {
            self.reg_type = spec.return_type;
        }
        self.free_temp |= spec.free_temp;
        for _ in 0..count {
            self.compile_pop()?;
        }
        if spec.timeshare {
            self.add_instruction(Opcode::Timeshare, BasicType::Int, Val::default());
        }
        if spec.is_function {
            self.compile_data_lookup(false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mach::{Config, Vm};

    fn opcodes(source: &str) -> Vec<Opcode> {
        let mut comp = Compiler::new(Vm::default(), &Config::default());
        comp.compile(source).unwrap();
        comp.vm().code().iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn test_assignment_code() {
        use Opcode::*;
        assert_eq!(
            opcodes("dim a\na = 3 * a"),
            vec![
                Declare, LoadVar, Push, LoadConst, Push, LoadVar, Deref, Pop, Times, Pop, Save,
                End
            ]
        );
    }

    #[test]
    fn test_conversion() {
        let int = ValType::from(BasicType::Int);
        assert_eq!(conversion(&int, BasicType::Int, false).unwrap(), None);
        assert_eq!(
            conversion(&int, BasicType::String, true).unwrap(),
            Some(Opcode::ConvIntString2)
        );
        let string = ValType::from(BasicType::String);
        assert!(conversion(&string, BasicType::Int, false).is_err());
        assert!(conversion(&ValType::null(), BasicType::Int, false).is_err());
    }

    #[test]
    fn test_take_address() {
        use Opcode::*;
        assert_eq!(
            opcodes("dim a, &p\n&p = &a"),
            vec![Declare, Declare, LoadVar, Push, LoadVar, Pop, Save, End]
        );
    }
}
