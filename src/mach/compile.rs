use super::flow::{FlowControl, FlowKind};
use super::function::{BinaryExtension, FuncSpec, Function, Signature, UnaryExtension};
use super::link::{Label, Link};
use super::types::{BasicType, ValType};
use super::{Config, Event, Instruction, Opcode, Syntax, Val, Vm};
use crate::error;
use crate::lang::{Column, Error, LineNumber, Literal, Token, TokenKind, TokenSource};
use log::debug;
use std::collections::{HashMap, HashSet};

pub(super) type Result<T> = std::result::Result<T, Error>;

const RESERVED: &[&str] = &[
    "dim",
    "goto",
    "if",
    "then",
    "elseif",
    "else",
    "endif",
    "end",
    "gosub",
    "return",
    "for",
    "to",
    "step",
    "next",
    "while",
    "wend",
    "run",
    "struc",
    "endstruc",
    "const",
    "alloc",
    "null",
    "data",
    "read",
    "reset",
    "type",
    "as",
    "integer",
    "single",
    "double",
    "string",
    "language",
    "traditional",
    "basic4gl",
    "traditional_print",
    "input",
    "do",
    "loop",
    "until",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum OperatorKind {
    Arithmetic,
    /// Operands are converted to int first.
    Bool,
    /// Result is an int whatever the operands were.
    ReturnBool,
    LeftBracket,
    Stop,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Operator {
    pub kind: OperatorKind,
    pub opcode: Opcode,
    pub params: u8,
    pub binding: i32,
}

impl Operator {
    const fn new(kind: OperatorKind, opcode: Opcode, params: u8, binding: i32) -> Operator {
        Operator {
            kind,
            opcode,
            params,
            binding,
        }
    }
}

pub(super) const STOP: Operator = Operator::new(OperatorKind::Stop, Opcode::Nop, 0, -200_000);
pub(super) const LEFT_BRACKET: Operator =
    Operator::new(OperatorKind::LeftBracket, Opcode::Nop, 0, -10_000);

fn binary_operators() -> HashMap<&'static str, Operator> {
    use OperatorKind::*;
    let mut map = HashMap::new();
    map.insert("xor", Operator::new(Bool, Opcode::Xor, 2, 10));
    map.insert("or", Operator::new(Bool, Opcode::Or, 2, 11));
    map.insert("and", Operator::new(Bool, Opcode::And, 2, 12));
    map.insert("=", Operator::new(ReturnBool, Opcode::Equal, 2, 30));
    map.insert("<>", Operator::new(ReturnBool, Opcode::NotEqual, 2, 30));
    map.insert(">", Operator::new(ReturnBool, Opcode::Greater, 2, 30));
    map.insert(">=", Operator::new(ReturnBool, Opcode::GreaterEqual, 2, 30));
    map.insert("<", Operator::new(ReturnBool, Opcode::Less, 2, 30));
    map.insert("<=", Operator::new(ReturnBool, Opcode::LessEqual, 2, 30));
    map.insert("+", Operator::new(Arithmetic, Opcode::Plus, 2, 40));
    map.insert("-", Operator::new(Arithmetic, Opcode::Minus, 2, 40));
    map.insert("*", Operator::new(Arithmetic, Opcode::Times, 2, 41));
    map.insert("/", Operator::new(Arithmetic, Opcode::Div, 2, 42));
    map.insert("%", Operator::new(Arithmetic, Opcode::Mod, 2, 43));
    map
}

fn unary_operators() -> HashMap<&'static str, Operator> {
    use OperatorKind::*;
    let mut map = HashMap::new();
    map.insert("not", Operator::new(Bool, Opcode::Not, 1, 20));
    map.insert("-", Operator::new(Arithmetic, Opcode::Neg, 1, 50));
    map
}

/// ## Compiler
///
/// A single pass compiler that reads tokens on demand and appends
/// instructions straight into the machine it owns. Expressions are
/// compiled with an operator stack and an operand type stack that
/// mirror the machine's run-time stack.

pub struct Compiler {
    pub(super) vm: Vm,
    pub(super) source: TokenSource,
    pub(super) token: Token,
    case_sensitive: bool,
    default_syntax: Syntax,
    steps: usize,
    pub(super) syntax: Syntax,
    binary_operators: HashMap<&'static str, Operator>,
    unary_operators: HashMap<&'static str, Operator>,
    reserved: HashSet<&'static str>,
    constants: HashMap<String, Literal>,
    pub(super) program_constants: HashMap<String, Literal>,
    pub(super) functions: Vec<FuncSpec>,
    pub(super) function_index: HashMap<String, Vec<usize>>,
    pub(super) unary_extensions: Vec<UnaryExtension>,
    pub(super) binary_extensions: Vec<BinaryExtension>,
    pub(super) reg_type: ValType,
    pub(super) reg2_type: ValType,
    pub(super) operands: Vec<ValType>,
    pub(super) operators: Vec<Operator>,
    pub(super) link: Link,
    pub(super) flow: Vec<FlowControl>,
    pub(super) need_colon: bool,
    pub(super) free_temp: bool,
    last_line: LineNumber,
    last_col: Column,
}

impl Compiler {
    pub fn new(vm: Vm, config: &Config) -> Compiler {
        Compiler {
            vm,
            source: TokenSource::default(),
            token: Token::new(TokenKind::Eof, "", 0, 0),
            case_sensitive: config.case_sensitive,
            default_syntax: config.syntax,
            steps: config.steps.max(1),
            syntax: config.syntax,
            binary_operators: binary_operators(),
            unary_operators: unary_operators(),
            reserved: RESERVED.iter().copied().collect(),
            constants: HashMap::new(),
            program_constants: HashMap::new(),
            functions: vec![],
            function_index: HashMap::new(),
            unary_extensions: vec![],
            binary_extensions: vec![],
            reg_type: ValType::from(BasicType::Int),
            reg2_type: ValType::from(BasicType::Int),
            operands: vec![],
            operators: vec![],
            link: Link::default(),
            flow: vec![],
            need_colon: false,
            free_temp: false,
            last_line: 0,
            last_col: 0,
        }
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Registers one overload of a host function.
    pub fn add_function(&mut self, name: &str, signature: Signature, function: Function) {
        let index = self.vm.add_function(function);
        let name = self.normalize(name);
        self.function_index
            .entry(name)
            .or_insert_with(Vec::new)
            .push(self.functions.len());
        self.functions.push(signature.into_spec(index));
    }

    pub fn add_constant(&mut self, name: &str, value: Literal) {
        let name = self.normalize(name);
        self.constants.insert(name, value);
    }

    pub fn add_unary_extension(&mut self, extension: UnaryExtension) {
        self.unary_extensions.push(extension);
    }

    pub fn add_binary_extension(&mut self, extension: BinaryExtension) {
        self.binary_extensions.push(extension);
    }

    /// Host or program constant.
    pub fn constant(&self, name: &str) -> Option<&Literal> {
        let name = self.normalize(name);
        self.constants
            .get(&name)
            .or_else(|| self.program_constants.get(&name))
    }

    fn normalize(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Replaces the machine's program with the compiled source.
    pub fn compile(&mut self, source: &str) -> Result<()> {
        debug!("compiling {} lines", source.lines().count());
        self.vm.new_program();
        self.source = TokenSource::new(source);
        self.syntax = self.default_syntax;
        self.program_constants.clear();
        self.link.clear();
        self.clear_state();
        self.last_line = 0;
        self.last_col = 0;
        match self.compile_program() {
            Ok(()) => {
                debug!("compiled {} instructions", self.vm.instruction_count());
                Ok(())
            }
            Err(error) => {
                debug!("compile error: {}", error);
                Err(self.in_position(error))
            }
        }
    }

    fn clear_state(&mut self) {
        self.reg_type = ValType::from(BasicType::Int);
        self.reg2_type = ValType::from(BasicType::Int);
        self.operands.clear();
        self.operators.clear();
        self.flow.clear();
        self.need_colon = false;
        self.free_temp = false;
    }

    fn in_position(&self, error: Error) -> Error {
        if error.has_position() {
            error
        } else {
            error.in_position(self.token.line, self.token.col)
        }
    }

    fn compile_program(&mut self) -> Result<()> {
        self.get_token_skip_eol()?;
        while self.token.kind != TokenKind::Eof {
            self.compile_instruction()?;
        }
        self.add_instruction(Opcode::End, BasicType::Int, Val::default());
        self.link.link(&mut self.vm)?;
        match self.flow.last() {
            Some(frame) => Err(frame.unclosed()),
            None => Ok(()),
        }
    }

    fn compile_instruction(&mut self) -> Result<()> {
        self.need_colon = true;

        if self.token.new_line && self.token.kind == TokenKind::Text && self.peek_token()?.is(":")
        {
            let name = self.token.text.clone();
            let label = Label {
                offset: self.vm.instruction_count(),
                data_offset: self.vm.program_data_len(),
            };
            self.link.insert(&name, label)?;
            self.get_token()?;
            return self.skip_separators();
        }

        let text = if self.token.is_constant() {
            String::new()
        } else {
            self.token.text.clone()
        };
        match text.as_str() {
            "struc" | "type" => self.compile_structure()?,
            "dim" => self.compile_dim()?,
            "goto" => {
                self.get_token()?;
                self.compile_goto(Opcode::Jump)?;
            }
            "gosub" => {
                self.get_token()?;
                self.compile_goto(Opcode::Call)?;
            }
            "return" => {
                self.get_token()?;
                self.add_instruction(Opcode::Return, BasicType::Int, Val::default());
            }
            "if" => self.compile_if(false)?,
            "elseif" => {
                self.compile_else(true)?;
                self.compile_if(true)?;
            }
            "else" => self.compile_else(false)?,
            "endif" => self.compile_endif(false)?,
            "for" => self.compile_for()?,
            "next" => self.compile_next()?,
            "while" => self.compile_while()?,
            "wend" => self.compile_wend()?,
            "do" => self.compile_do()?,
            "loop" => self.compile_loop()?,
            "end" => {
                self.get_token()?;
                if self.token.is("if") {
                    self.compile_endif(false)?;
                } else {
                    self.add_instruction(Opcode::End, BasicType::Int, Val::default());
                }
            }
            "run" => {
                self.get_token()?;
                self.add_instruction(Opcode::Run, BasicType::Int, Val::default());
            }
            "const" => self.compile_const()?,
            "alloc" => self.compile_alloc()?,
            "data" => self.compile_data()?,
            "read" => self.compile_read()?,
            "reset" => self.compile_reset()?,
            "print" => self.compile_print(false)?,
            "printr" => self.compile_print(true)?,
            "input" => self.compile_input()?,
            "language" => self.compile_language()?,
            _ if self.token.kind == TokenKind::Function => self.compile_function(false)?,
            _ => self.compile_assignment()?,
        }

        self.compile_free_temp();
        self.skip_separators()
    }

    pub(super) fn compile_free_temp(&mut self) {
        if self.free_temp {
            self.add_instruction(Opcode::FreeTemp, BasicType::Int, Val::default());
            self.free_temp = false;
        }
    }

    pub(super) fn at_separator(&self) -> bool {
        self.token.is_end_of_line() || self.token.is(":")
    }

    /// Statement boundary, including keywords that may follow a single line `if`.
    pub(super) fn at_statement_end(&self) -> bool {
        self.at_separator()
            || self.token.is("else")
            || self.token.is("elseif")
            || self.token.is("endif")
    }

    pub(super) fn skip_separators(&mut self) -> Result<()> {
        if self.need_colon && !self.at_statement_end() {
            return Err(error!(SyntaxError; "Expected ':'"));
        }
        while self.at_separator() {
            if self.token.is_end_of_line() {
                while self.need_auto_endif() {
                    self.compile_endif(true)?;
                }
                for frame in self.flow.iter_mut() {
                    frame.block_if = true;
                }
                if self.token.kind == TokenKind::Eof {
                    break;
                }
            }
            self.get_token_skip_eol()?;
        }
        Ok(())
    }

    fn need_auto_endif(&self) -> bool {
        match self.flow.last() {
            Some(frame) => {
                matches!(frame.kind, FlowKind::If | FlowKind::Else) && !frame.block_if
            }
            None => false,
        }
    }

    /// Marks text identifiers as keywords, functions or constants.
    fn classify(&self, mut token: Token) -> Token {
        if token.kind != TokenKind::Text {
            return token;
        }
        if !self.case_sensitive {
            token.text = token.text.to_lowercase();
        }
        if self.reserved.contains(token.text.as_str()) {
            token.kind = TokenKind::Keyword;
        } else if self.function_index.contains_key(&token.text) {
            token.kind = TokenKind::Function;
        } else if let Some(literal) = self
            .constants
            .get(&token.text)
            .or_else(|| self.program_constants.get(&token.text))
        {
            token.kind = TokenKind::Constant(literal.clone());
        }
        token
    }

    fn read_token(&mut self, skip_eol: bool, data_mode: bool) -> Result<()> {
        let token = self.source.next_token(skip_eol, data_mode)?;
        self.token = self.classify(token);
        Ok(())
    }

    pub(super) fn get_token(&mut self) -> Result<()> {
        self.read_token(false, false)
    }

    pub(super) fn get_token_skip_eol(&mut self) -> Result<()> {
        self.read_token(true, false)
    }

    pub(super) fn get_data_token(&mut self) -> Result<()> {
        self.read_token(false, true)
    }

    pub(super) fn peek_token(&mut self) -> Result<Token> {
        let token = self.source.peek_token(false)?;
        Ok(self.classify(token))
    }

    /// Appends an instruction tagged with the current source position.
    /// Positions never go backwards so line lookups stay ordered.
    pub(super) fn add_instruction(&mut self, opcode: Opcode, basic: BasicType, value: Val) {
        let (mut line, mut col) = (self.token.line, self.token.col);
        if line < self.last_line || (line == self.last_line && col < self.last_col) {
            line = self.last_line;
            col = self.last_col;
        }
        let mut instr = Instruction::new(opcode, basic, value);
        instr.line = line;
        instr.col = col;
        self.vm.add_instruction(instr);
        self.last_line = line;
        self.last_col = col;
    }

    /// Rejects names that are reserved or already constants.
    pub(super) fn check_name(&self) -> Result<()> {
        if self.token.is_constant() {
            return Err(error!(SyntaxError; format!(
                "'{}' is a constant, and cannot be used here",
                self.token.text
            )));
        }
        if self.token.kind == TokenKind::Keyword {
            return Err(error!(SyntaxError; format!(
                "'{}' is a reserved word, and cannot be used here",
                self.token.text
            )));
        }
        Ok(())
    }

    /// Compiles a constant expression as temporary code, runs it and
    /// removes it again.
    pub(super) fn evaluate_constant(&mut self, basic: Option<BasicType>) -> Result<Literal> {
        let start = self.vm.instruction_count();
        self.compile_expression(true)?;
        if let Some(basic) = basic {
            self.compile_convert_basic(basic)?;
        }
        self.add_instruction(Opcode::End, BasicType::Int, Val::default());

        self.vm.goto_instruction(start);
        let result = loop {
            match self.vm.execute(self.steps) {
                Event::End => break Ok(()),
                Event::Running | Event::Yield => {}
                Event::Breakpoint | Event::Error(_) => {
                    break Err(error!(SyntaxError; "Error evaluating constant expression"))
                }
            }
        };
        self.vm.clear_error();
        self.vm.goto_instruction(0);
        self.vm.rollback_program(start);
        result?;

        match self.reg_type {
            ty if ty.is(BasicType::Int) => Ok(Literal::Int(self.vm.reg().int())),
            ty if ty.is(BasicType::Real) => Ok(Literal::Real(self.vm.reg().real())),
            ty if ty.is(BasicType::String) => {
                Ok(Literal::String(self.vm.reg_string().to_string()))
            }
            _ => Err(error!(SyntaxError; "Error evaluating constant expression")),
        }
    }

    /// Compiles and runs an expression against the current machine state,
    /// for watching variables in a paused program. The machine is left as
    /// it was.
    pub fn evaluate(&mut self, expression: &str) -> Result<String> {
        let state = self.vm.state();
        let result = self.evaluate_in_place(expression);
        self.vm.set_state(state);
        result
    }

    fn evaluate_in_place(&mut self, expression: &str) -> Result<String> {
        self.source = TokenSource::new(expression);
        self.clear_state();
        self.get_token()?;
        let start = self.vm.instruction_count();
        self.compile_expression(false)?;
        if !self.token.is_end_of_line() {
            return Err(error!(SyntaxError; "Extra characters after expression"));
        }
        let ty = self.reg_type;
        self.add_instruction(Opcode::End, BasicType::Int, Val::default());
        self.vm.goto_instruction(start);
        loop {
            match self.vm.execute(self.steps) {
                Event::End => break,
                Event::Running | Event::Yield => {}
                Event::Breakpoint => {
                    return Err(error!(InternalError; "Breakpoint in watch expression"))
                }
                Event::Error(error) => return Err(error),
            }
        }
        Ok(self.vm.reg_to_string(&ty))
    }

    /// Name of the label a `gosub` returning to `return_address` went to.
    pub fn describe_call(&self, return_address: usize) -> String {
        let call = match return_address.checked_sub(1).and_then(|i| self.vm.instruction(i)) {
            Some(instr) if instr.opcode == Opcode::Call => instr,
            _ => return "???".to_string(),
        };
        self.link
            .label_at(call.value.int().max(0) as usize)
            .unwrap_or("???")
            .to_string()
    }

    /// Overload of a function with exactly `params` parameters.
    pub(super) fn find_function(&self, name: &str, params: usize) -> Result<FuncSpec> {
        self.function_index
            .get(name)
            .and_then(|list| {
                list.iter()
                    .map(|i| &self.functions[*i])
                    .find(|spec| spec.params.len() == params)
            })
            .cloned()
            .ok_or_else(|| error!(SyntaxError; format!("'{}' function not found", name)))
    }

    pub(super) fn binary_operator(&self) -> Option<Operator> {
        if self.token.is_constant() {
            return None;
        }
        self.binary_operators.get(self.token.text.as_str()).copied()
    }

    pub(super) fn unary_operator(&self) -> Option<Operator> {
        if self.token.is_constant() {
            return None;
        }
        self.unary_operators.get(self.token.text.as_str()).copied()
    }

    pub(super) fn binary_operator_for(&self, text: &str) -> Option<Operator> {
        self.binary_operators.get(text).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use std::rc::Rc;

    fn compiler() -> Compiler {
        Compiler::new(Vm::default(), &Config::default())
    }

    #[test]
    fn test_operator_table() {
        let binary = binary_operators();
        assert_eq!(binary["+"].kind, OperatorKind::Arithmetic);
        assert_eq!(binary["="].kind, OperatorKind::ReturnBool);
        assert_eq!(binary["and"].kind, OperatorKind::Bool);
        assert!(binary["*"].binding > binary["+"].binding);
        assert!(binary["+"].binding > binary["<"].binding);
        let unary = unary_operators();
        assert_eq!(unary["-"].opcode, Opcode::Neg);
        assert!(unary["-"].binding > binary["%"].binding);
    }

    #[test]
    fn test_classify() {
        let mut comp = compiler();
        comp.add_function("Beep", Signature::statement(), Rc::new(|_| {}));
        comp.add_constant("ANSWER", Literal::Int(42));
        comp.source = TokenSource::new("DIM beep Answer Other");
        let mut kinds = vec![];
        for _ in 0..4 {
            comp.get_token().unwrap();
            kinds.push(comp.token.kind.clone());
        }
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::Function,
                TokenKind::Constant(Literal::Int(42)),
                TokenKind::Text
            ]
        );
        assert_eq!(comp.token.text, "other");
    }

    #[test]
    fn test_positions_never_go_back() {
        let mut comp = compiler();
        comp.token.line = 3;
        comp.token.col = 5;
        comp.add_instruction(Opcode::Nop, BasicType::Int, Val::default());
        comp.token.line = 2;
        comp.add_instruction(Opcode::Nop, BasicType::Int, Val::default());
        assert_eq!(comp.vm.code()[1].line, 3);
        assert_eq!(comp.vm.code()[1].col, 5);
    }

    #[test]
    fn test_constant_expression() {
        let mut comp = compiler();
        comp.compile("const a = 2 * (3 + 4), b# = 1.0 / 4, c$ = \"x\" + 1").unwrap();
        assert_eq!(comp.constant("a"), Some(&Literal::Int(14)));
        assert_eq!(comp.constant("b#"), Some(&Literal::Real(0.25)));
        assert_eq!(comp.constant("c$"), Some(&Literal::String("x1".to_string())));
        assert_eq!(comp.vm.instruction_count(), 1);
    }

    #[test]
    fn test_unclosed_frame_position() {
        let mut comp = compiler();
        let err = comp.compile("dim i, a\n\nfor i = 1 to 3\na = i").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ForWithoutNext);
        assert_eq!(err.line_number(), Some(3));
        assert_eq!(err.text(), "'for' without 'next'");
    }

    #[test]
    fn test_describe_call() {
        let mut comp = compiler();
        comp.compile("gosub sub\nend\nsub:\nreturn").unwrap();
        assert_eq!(comp.describe_call(1), "sub");
        assert_eq!(comp.describe_call(0), "???");
        assert_eq!(comp.describe_call(2), "???");
    }
}
