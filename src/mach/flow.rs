use super::compile::{Compiler, Result};
use super::types::BasicType;
use super::{Opcode, Syntax, Val};
use crate::error;
use crate::lang::{Column, Error, LineNumber, Literal, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FlowKind {
    If,
    Else,
    For,
    While,
    /// `do while` or `do until`.
    DoPre,
    /// Condition comes with `loop`, if at all.
    DoPost,
}

/// An open `if`, `for`, `while` or `do` waiting for its closing keyword.
#[derive(Debug, Clone)]
pub(super) struct FlowControl {
    pub kind: FlowKind,
    /// Jump to patch with the exit address.
    pub jump_out: usize,
    /// Start of the loop body or test.
    pub jump_loop: usize,
    pub line: LineNumber,
    pub col: Column,
    /// Closing this frame also closes the one below. Set for `elseif`.
    pub implied_endif: bool,
    /// False for a single line `if` that closes at end of line.
    pub block_if: bool,
    /// Synthetic `var = var + step` statement for `next`.
    pub increment: Vec<Token>,
}

impl FlowControl {
    fn new(kind: FlowKind, jump_out: usize, line: LineNumber, col: Column) -> FlowControl {
        FlowControl {
            kind,
            jump_out,
            jump_loop: 0,
            line,
            col,
            implied_endif: false,
            block_if: true,
            increment: vec![],
        }
    }

    /// Error for a frame still open at the end of the program.
    pub(super) fn unclosed(&self) -> Error {
        let (line, col) = (self.line, self.col);
        match self.kind {
            FlowKind::If => error!(IfWithoutEndif, line, col; "'if' without 'endif'"),
            FlowKind::Else => error!(IfWithoutEndif, line, col; "'else' without 'endif'"),
            FlowKind::For => error!(ForWithoutNext, line, col; "'for' without 'next'"),
            FlowKind::While => error!(WhileWithoutWend, line, col; "'while' without 'wend'"),
            FlowKind::DoPre | FlowKind::DoPost => {
                error!(DoWithoutLoop, line, col; "'do' without 'loop'")
            }
        }
    }
}

impl Compiler {
    fn top_kind(&self) -> Option<FlowKind> {
        self.flow.last().map(|frame| frame.kind)
    }

    fn patch_jump(&mut self, offset: usize) {
        let target = self.vm.instruction_count() as i32;
        if let Some(instr) = self.vm.instruction_mut(offset) {
            instr.value = Val::from_int(target);
        }
    }

    fn jump(&mut self, opcode: Opcode, target: usize) {
        self.add_instruction(opcode, BasicType::Int, Val::from_int(target as i32));
    }

    pub(super) fn compile_if(&mut self, elseif: bool) -> Result<()> {
        let (line, col) = (self.token.line, self.token.col);
        self.get_token()?;
        self.compile_expression(false)?;
        self.compile_convert_basic(BasicType::Int)?;
        self.compile_free_temp();

        if !self.token.is("goto") {
            if !self.token.is("then") {
                return Err(error!(SyntaxError; "Expected 'then'"));
            }
            self.get_token()?;
        }

        let auto_endif = self.syntax == Syntax::Traditional && !self.token.is_end_of_line();
        let mut frame = FlowControl::new(FlowKind::If, self.vm.instruction_count(), line, col);
        frame.implied_endif = elseif;
        frame.block_if = !auto_endif;
        self.flow.push(frame);
        self.jump(Opcode::JumpFalse, 0);
        self.need_colon = false;
        Ok(())
    }

    pub(super) fn compile_else(&mut self, elseif: bool) -> Result<()> {
        if self.top_kind() != Some(FlowKind::If) {
            return Err(error!(ElseWithoutIf; "'else' without 'if'"));
        }
        let top = match self.flow.pop() {
            Some(top) => top,
            None => return Err(error!(ElseWithoutIf; "'else' without 'if'")),
        };
        let (line, col) = (self.token.line, self.token.col);
        if !elseif {
            self.get_token()?;
        }
        let mut frame = FlowControl::new(FlowKind::Else, self.vm.instruction_count(), line, col);
        frame.implied_endif = top.implied_endif;
        frame.block_if = top.block_if;
        self.flow.push(frame);
        self.jump(Opcode::Jump, 0);
        self.patch_jump(top.jump_out);
        self.need_colon = false;
        Ok(())
    }

    /// Closes an `if` or `else`. `automatic` is set at end of line for a
    /// single line `if`, where there is no keyword to skip.
    pub(super) fn compile_endif(&mut self, automatic: bool) -> Result<()> {
        if !matches!(self.top_kind(), Some(FlowKind::If) | Some(FlowKind::Else)) {
            return Err(error!(EndifWithoutIf; "'endif' without 'if'"));
        }
        let top = match self.flow.pop() {
            Some(top) => top,
            None => return Err(error!(EndifWithoutIf; "'endif' without 'if'")),
        };
        if !top.implied_endif && !automatic {
            self.get_token()?;
        }
        self.patch_jump(top.jump_out);
        if top.implied_endif {
            self.compile_endif(automatic)
        } else {
            Ok(())
        }
    }

    pub(super) fn compile_for(&mut self) -> Result<()> {
        let (line, col) = (self.token.line, self.token.col);
        self.get_token()?;
        if self.token.kind != TokenKind::Text {
            return Err(error!(SyntaxError; "Expected variable name"));
        }
        if self.peek_token()?.is("(") {
            return Err(error!(SyntaxError;
                "Cannot use array variable in 'for' - 'next' structure"));
        }
        let name = self.token.text.clone();
        let (_, var_type) = self.find_variable(&name)?;
        if !var_type.is(BasicType::Int) && !var_type.is(BasicType::Real) {
            return Err(error!(TypeMismatch; "Loop variable must be an Integer or Real"));
        }

        let var_token = self.token.clone();
        let var_cursor = self.source.position();
        self.compile_assignment()?;

        let loop_pos = self.vm.instruction_count();
        if !self.token.is("to") {
            return Err(error!(SyntaxError; "Expected 'to'"));
        }
        self.get_token()?;

        // Load the loop variable again for the comparison.
        let saved_token = std::mem::replace(&mut self.token, var_token);
        let saved_cursor = self.source.position();
        self.source.set_position(var_cursor);
        self.compile_load_var()?;
        self.compile_push()?;
        self.source.set_position(saved_cursor);
        self.token = saved_token;

        self.compile_expression(false)?;
        self.compile_convert_basic(var_type.basic)?;

        let step = if self.token.is("step") {
            self.get_token()?;
            let bound_type = self.reg_type;
            let step = self.evaluate_constant(Some(var_type.basic))?;
            self.reg_type = bound_type;
            step
        } else if var_type.basic == BasicType::Real {
            Literal::Real(1.0)
        } else {
            Literal::Int(1)
        };
        let comparison = match &step {
            Literal::Int(i) if *i > 0 => "<=",
            Literal::Int(i) if *i < 0 => ">=",
            Literal::Real(r) if *r > 0.0 => "<=",
            Literal::Real(r) if *r < 0.0 => ">=",
            _ => "<>",
        };
        // The variable is on the stack and the bound in reg: `var op bound`.
        let op = self
            .binary_operator_for(comparison)
            .ok_or_else(|| error!(InternalError; "Missing comparison operator"))?;
        self.operators.push(op);
        self.compile_operation()?;

        let mut frame = FlowControl::new(FlowKind::For, self.vm.instruction_count(), line, col);
        frame.jump_loop = loop_pos;
        frame.increment = vec![
            Token::text(&name),
            Token::symbol("="),
            Token::text(&name),
            Token::symbol("+"),
            Token::constant(step),
        ];
        self.flow.push(frame);
        self.jump(Opcode::JumpFalse, 0);
        Ok(())
    }

    pub(super) fn compile_next(&mut self) -> Result<()> {
        if self.top_kind() != Some(FlowKind::For) {
            return Err(error!(NextWithoutFor; "'next' without 'for'"));
        }
        let top = match self.flow.pop() {
            Some(top) => top,
            None => return Err(error!(NextWithoutFor; "'next' without 'for'")),
        };
        let (line, col) = (self.token.line, self.token.col);
        self.get_token()?;
        if self.token.kind == TokenKind::Text {
            let loop_var = top.increment.first().map(|t| t.text.as_str()).unwrap_or("");
            if super::var::base_name(&self.token.text) != super::var::base_name(loop_var) {
                return Err(error!(NextWithoutFor; format!(
                    "'next {}' does not match 'for {}'",
                    self.token.text, loop_var
                )));
            }
            self.get_token()?;
        }

        self.source.set_special(top.increment.clone(), line, col);
        let saved_token = self.token.clone();
        let result = self.get_token().and_then(|_| self.compile_assignment());
        self.source.set_normal();
        self.token = saved_token;
        result?;

        self.jump(Opcode::Jump, top.jump_loop);
        self.patch_jump(top.jump_out);
        Ok(())
    }

    pub(super) fn compile_while(&mut self) -> Result<()> {
        let (line, col) = (self.token.line, self.token.col);
        let loop_pos = self.vm.instruction_count();
        self.get_token()?;
        self.compile_expression(false)?;
        self.compile_convert_basic(BasicType::Int)?;
        self.compile_free_temp();
        let mut frame = FlowControl::new(FlowKind::While, self.vm.instruction_count(), line, col);
        frame.jump_loop = loop_pos;
        self.flow.push(frame);
        self.jump(Opcode::JumpFalse, 0);
        Ok(())
    }

    pub(super) fn compile_wend(&mut self) -> Result<()> {
        if self.top_kind() != Some(FlowKind::While) {
            return Err(error!(WendWithoutWhile; "'wend' without 'while'"));
        }
        let top = match self.flow.pop() {
            Some(top) => top,
            None => return Err(error!(WendWithoutWhile; "'wend' without 'while'")),
        };
        self.get_token()?;
        self.jump(Opcode::Jump, top.jump_loop);
        self.patch_jump(top.jump_out);
        Ok(())
    }

    pub(super) fn compile_do(&mut self) -> Result<()> {
        let (line, col) = (self.token.line, self.token.col);
        let loop_pos = self.vm.instruction_count();
        self.get_token()?;
        let until = self.token.is("until");
        if until || self.token.is("while") {
            self.get_token()?;
            self.compile_expression(false)?;
            self.compile_convert_basic(BasicType::Int)?;
            self.compile_free_temp();
            let mut frame =
                FlowControl::new(FlowKind::DoPre, self.vm.instruction_count(), line, col);
            frame.jump_loop = loop_pos;
            self.flow.push(frame);
            let opcode = if until { Opcode::JumpTrue } else { Opcode::JumpFalse };
            self.jump(opcode, 0);
        } else {
            let mut frame = FlowControl::new(FlowKind::DoPost, 0, line, col);
            frame.jump_loop = loop_pos;
            self.flow.push(frame);
        }
        self.need_colon = false;
        Ok(())
    }

    pub(super) fn compile_loop(&mut self) -> Result<()> {
        if !matches!(self.top_kind(), Some(FlowKind::DoPre) | Some(FlowKind::DoPost)) {
            return Err(error!(LoopWithoutDo; "'loop' without 'do'"));
        }
        let top = match self.flow.pop() {
            Some(top) => top,
            None => return Err(error!(LoopWithoutDo; "'loop' without 'do'")),
        };
        self.get_token()?;
        let until = self.token.is("until");
        if until || self.token.is("while") {
            if top.kind == FlowKind::DoPre {
                return Err(error!(SyntaxError;
                    "'until' or 'while' condition has already been specified for this 'do'"));
            }
            self.get_token()?;
            self.compile_expression(false)?;
            self.compile_convert_basic(BasicType::Int)?;
            self.compile_free_temp();
            let opcode = if until { Opcode::JumpFalse } else { Opcode::JumpTrue };
            self.jump(opcode, top.jump_loop);
        } else {
            self.jump(Opcode::Jump, top.jump_loop);
            if top.kind == FlowKind::DoPre {
                self.patch_jump(top.jump_out);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::lang::ErrorCode;
    use crate::mach::{Compiler, Config, Opcode, Vm};

    fn compile(source: &str) -> Result<Compiler, crate::lang::Error> {
        let mut comp = Compiler::new(Vm::default(), &Config::default());
        comp.compile(source)?;
        Ok(comp)
    }

    #[test]
    fn test_if_else_jumps() {
        let comp = compile("dim a\nif a then\na = 1\nelse\na = 2\nendif").unwrap();
        let code = comp.vm().code();
        let jump_false = code.iter().position(|i| i.opcode == Opcode::JumpFalse).unwrap();
        let jump = code.iter().position(|i| i.opcode == Opcode::Jump).unwrap();
        assert_eq!(code[jump_false].value.int() as usize, jump + 1);
        assert_eq!(code[jump].value.int() as usize, code.len() - 1);
    }

    #[test]
    fn test_unmatched_closers() {
        let cases = [
            ("endif", ErrorCode::EndifWithoutIf),
            ("else", ErrorCode::ElseWithoutIf),
            ("next", ErrorCode::NextWithoutFor),
            ("wend", ErrorCode::WendWithoutWhile),
            ("loop", ErrorCode::LoopWithoutDo),
        ];
        for (source, code) in cases.iter() {
            assert_eq!(compile(source).err().map(|e| e.code()), Some(*code));
        }
    }

    #[test]
    fn test_one_condition_per_do() {
        let err = compile("dim a\ndo while a\nloop until a").err().unwrap();
        assert_eq!(
            err.text(),
            "'until' or 'while' condition has already been specified for this 'do'"
        );
    }

    #[test]
    fn test_next_variable_must_match() {
        assert!(compile("dim i, j\nfor i = 1 to 2\nnext i").is_ok());
        let err = compile("dim i, j\nfor i = 1 to 2\nnext j").err().unwrap();
        assert_eq!(err.code(), ErrorCode::NextWithoutFor);
    }
}
