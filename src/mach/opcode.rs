use super::types::BasicType;
use super::Val;
use crate::lang::{Column, LineNumber};

/// ## Virtual machine instruction set
///
/// The machine has two general registers, `reg` and `reg2`, each with
/// a companion string register. Binary operators compute `reg2 op reg`
/// and leave the result in `reg`.
///
/// For example: `a = 3 * b` compiles to
/// `[LOAD_VAR a, PUSH, LOAD_CONST 3, PUSH, LOAD_VAR b, DEREF, POP, OP_TIMES, POP, SAVE]`

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // *** Data movement
    Nop = 0x00,
    End = 0x01,
    /// Load constant into reg. String constants load reg_string by index.
    LoadConst = 0x02,
    /// Load address of variable into reg.
    LoadVar = 0x03,
    /// Load the value at address reg into reg.
    Deref = 0x04,
    /// Add constant to reg. Used to address a structure field.
    AddConst = 0x05,
    /// reg is an index into the array at address reg2. Result is the element address.
    ArrayIndex = 0x06,
    Push = 0x07,
    /// Pop stack into reg2.
    Pop = 0x08,
    /// Store reg at address reg2.
    Save = 0x09,
    /// Copy the block at reg to reg2. Value is a type set index.
    Copy = 0x0a,
    /// Allocate a variable. Value is the variable index.
    Declare = 0x0b,
    /// Return control to the host after this instruction.
    Timeshare = 0x0c,
    FreeTemp = 0x0d,
    /// Allocate data for a pointer. Value is a type set index.
    Alloc = 0x0e,
    DataRead = 0x0f,
    DataReset = 0x10,

    // *** Branch control
    Jump = 0x40,
    JumpTrue = 0x41,
    JumpFalse = 0x42,
    CallFunc = 0x43,
    CallOperatorFunc = 0x44,
    Call = 0x45,
    Return = 0x46,

    // *** Arithmetic
    Neg = 0x60,
    /// Doubles as string concatenation.
    Plus = 0x61,
    Minus = 0x62,
    Times = 0x63,
    Div = 0x64,
    Mod = 0x65,

    // *** Logic and comparison
    Not = 0x80,
    Equal = 0x81,
    NotEqual = 0x82,
    Greater = 0x83,
    GreaterEqual = 0x84,
    Less = 0x85,
    LessEqual = 0x86,
    And = 0x87,
    Or = 0x88,
    Xor = 0x89,

    // *** Conversion
    ConvIntReal = 0xa0,
    ConvIntString = 0xa1,
    ConvRealString = 0xa2,
    ConvRealInt = 0xa3,
    ConvIntReal2 = 0xa4,
    ConvIntString2 = 0xa5,
    ConvRealString2 = 0xa6,
    ConvRealInt2 = 0xa7,

    // *** Misc
    Run = 0xc0,
    Breakpt = 0xe0,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        let op = match byte {
            0x00 => Nop,
            0x01 => End,
            0x02 => LoadConst,
            0x03 => LoadVar,
            0x04 => Deref,
            0x05 => AddConst,
            0x06 => ArrayIndex,
            0x07 => Push,
            0x08 => Pop,
            0x09 => Save,
            0x0a => Opcode::Copy,
            0x0b => Declare,
            0x0c => Timeshare,
            0x0d => FreeTemp,
            0x0e => Alloc,
            0x0f => DataRead,
            0x10 => DataReset,
            0x40 => Jump,
            0x41 => JumpTrue,
            0x42 => JumpFalse,
            0x43 => CallFunc,
            0x44 => CallOperatorFunc,
            0x45 => Call,
            0x46 => Return,
            0x60 => Neg,
            0x61 => Plus,
            0x62 => Minus,
            0x63 => Times,
            0x64 => Div,
            0x65 => Mod,
            0x80 => Not,
            0x81 => Equal,
            0x82 => NotEqual,
            0x83 => Greater,
            0x84 => GreaterEqual,
            0x85 => Less,
            0x86 => LessEqual,
            0x87 => And,
            0x88 => Or,
            0x89 => Xor,
            0xa0 => ConvIntReal,
            0xa1 => ConvIntString,
            0xa2 => ConvRealString,
            0xa3 => ConvRealInt,
            0xa4 => ConvIntReal2,
            0xa5 => ConvIntString2,
            0xa6 => ConvRealString2,
            0xa7 => ConvRealInt2,
            0xc0 => Run,
            0xe0 => Breakpt,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "NOP",
            End => "END",
            LoadConst => "LOAD_CONST",
            LoadVar => "LOAD_VAR",
            Deref => "DEREF",
            AddConst => "ADD_CONST",
            ArrayIndex => "ARRAY_INDEX",
            Push => "PUSH",
            Pop => "POP",
            Save => "SAVE",
            Opcode::Copy => "COPY",
            Declare => "DECLARE",
            Timeshare => "TIMESHARE",
            FreeTemp => "FREE_TEMP",
            Alloc => "ALLOC",
            DataRead => "DATA_READ",
            DataReset => "DATA_RESET",
            Jump => "JUMP",
            JumpTrue => "JUMP_TRUE",
            JumpFalse => "JUMP_FALSE",
            CallFunc => "CALL_FUNC",
            CallOperatorFunc => "CALL_OPERATOR_FUNC",
            Call => "CALL",
            Return => "RETURN",
            Neg => "OP_NEG",
            Plus => "OP_PLUS",
            Minus => "OP_MINUS",
            Times => "OP_TIMES",
            Div => "OP_DIV",
            Mod => "OP_MOD",
            Not => "OP_NOT",
            Equal => "OP_EQUAL",
            NotEqual => "OP_NOT_EQUAL",
            Greater => "OP_GREATER",
            GreaterEqual => "OP_GREATER_EQUAL",
            Less => "OP_LESS",
            LessEqual => "OP_LESS_EQUAL",
            And => "OP_AND",
            Or => "OP_OR",
            Xor => "OP_XOR",
            ConvIntReal => "CONV_INT_REAL",
            ConvIntString => "CONV_INT_STRING",
            ConvRealString => "CONV_REAL_STRING",
            ConvRealInt => "CONV_REAL_INT",
            ConvIntReal2 => "CONV_INT_REAL2",
            ConvIntString2 => "CONV_INT_STRING2",
            ConvRealString2 => "CONV_REAL_STRING2",
            ConvRealInt2 => "CONV_REAL_INT2",
            Run => "RUN",
            Breakpt => "BREAKPT",
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::JumpTrue | Opcode::JumpFalse | Opcode::Call
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub const INSTRUCTION_SIZE: usize = 12;

/// One machine instruction with the source position it was compiled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub value: Val,
    pub line: LineNumber,
    pub col: Column,
    pub opcode: Opcode,
    pub basic: BasicType,
}

impl Instruction {
    pub fn new(opcode: Opcode, basic: BasicType, value: Val) -> Instruction {
        Instruction {
            value,
            line: 0,
            col: 0,
            opcode,
            basic,
        }
    }

    /// Little-endian stream form: value, line, column, opcode, type tag.
    pub fn to_bytes(&self) -> [u8; INSTRUCTION_SIZE] {
        let mut bytes = [0u8; INSTRUCTION_SIZE];
        bytes[0..4].copy_from_slice(&self.value.bits().to_le_bytes());
        bytes[4..8].copy_from_slice(&self.line.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.col.to_le_bytes());
        bytes[10] = self.opcode as u8;
        bytes[11] = self.basic.tag() as i8 as u8;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Instruction> {
        if bytes.len() < INSTRUCTION_SIZE {
            return None;
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[0..4]);
        let value = Val::from_bits(u32::from_le_bytes(word));
        word.copy_from_slice(&bytes[4..8]);
        let line = u32::from_le_bytes(word);
        let col = u16::from_le_bytes([bytes[8], bytes[9]]);
        let opcode = Opcode::from_u8(bytes[10])?;
        let basic = BasicType::from_tag(bytes[11] as i8 as i32)?;
        Some(Instruction {
            value,
            line,
            col,
            opcode,
            basic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes() {
        for byte in 0..=255u8 {
            if let Some(op) = Opcode::from_u8(byte) {
                assert_eq!(op as u8, byte);
            }
        }
        assert_eq!(Opcode::from_u8(0x11), None);
        assert_eq!(Opcode::Breakpt.name(), "BREAKPT");
    }

    #[test]
    fn test_instruction_bytes() {
        let mut instr = Instruction::new(Opcode::LoadConst, BasicType::Real, Val::from_real(2.5));
        instr.line = 7;
        instr.col = 3;
        let bytes = instr.to_bytes();
        assert_eq!(bytes[10], 0x02);
        assert_eq!(bytes[11], 0xfe);
        assert_eq!(Instruction::from_bytes(&bytes), Some(instr));
    }
}
