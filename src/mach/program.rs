use super::data::DataElement;
use super::opcode::Instruction;
use super::types::ValType;

/// ## Compiled program
///
/// Everything the compiler emits for the machine: instructions, the
/// string constant table, the type set referenced by `COPY` and `ALLOC`,
/// and the contents of `data` statements.

#[derive(Debug, Default)]
pub struct Program {
    pub code: Vec<Instruction>,
    pub string_constants: Vec<String>,
    pub type_set: Vec<ValType>,
    pub data: Vec<DataElement>,
}

impl Program {
    pub fn clear(&mut self) {
        self.code.clear();
        self.string_constants.clear();
        self.type_set.clear();
        self.data.clear();
    }

    /// Index of an exactly equal type, adding it when missing.
    pub fn store_type(&mut self, ty: &ValType) -> usize {
        match self.type_set.iter().position(|t| t.exact_equals(ty)) {
            Some(index) => index,
            None => {
                self.type_set.push(*ty);
                self.type_set.len() - 1
            }
        }
    }

    pub fn store_string_constant(&mut self, s: String) -> usize {
        self.string_constants.push(s);
        self.string_constants.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mach::BasicType;

    #[test]
    fn test_type_set() {
        let mut program = Program::default();
        let a = ValType::new(BasicType::Int, 1, 1, true);
        let b = ValType::new(BasicType::Int, 1, 1, false);
        assert_eq!(program.store_type(&a), 0);
        assert_eq!(program.store_type(&b), 1);
        assert_eq!(program.store_type(&a), 0);
    }
}
