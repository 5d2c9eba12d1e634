use super::types::{BasicType, ValType};
use super::{Opcode, Vm};
use std::rc::Rc;

/// Host function. Parameters are read from the stack with `Vm::param`,
/// results are left in the registers.
pub type Function = Rc<dyn Fn(&mut Vm)>;

/// Compiler side description of one overload of a host function.
#[derive(Debug, Clone)]
pub struct FuncSpec {
    pub params: Vec<ValType>,
    pub brackets: bool,
    pub is_function: bool,
    pub return_type: ValType,
    pub timeshare: bool,
    pub free_temp: bool,
    /// Index into the machine's function table.
    pub index: usize,
}

/// ## Builder for host function signatures
///
/// ```
/// use basic4::mach::{BasicType, Signature};
/// let sig = Signature::function(BasicType::Int).param(BasicType::String);
/// ```
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<ValType>,
    brackets: bool,
    return_type: Option<ValType>,
    timeshare: bool,
    free_temp: bool,
}

impl Signature {
    pub fn function<T: Into<ValType>>(return_type: T) -> Signature {
        Signature {
            params: vec![],
            brackets: true,
            return_type: Some(return_type.into()),
            timeshare: false,
            free_temp: false,
        }
    }

    pub fn statement() -> Signature {
        Signature {
            params: vec![],
            brackets: true,
            return_type: None,
            timeshare: false,
            free_temp: false,
        }
    }

    pub fn param<T: Into<ValType>>(mut self, ty: T) -> Signature {
        self.params.push(ty.into());
        self
    }

    /// Yield to the host after each call.
    pub fn timeshare(mut self) -> Signature {
        self.timeshare = true;
        self
    }

    /// The result lives in temporary data.
    pub fn free_temp(mut self) -> Signature {
        self.free_temp = true;
        self
    }

    pub fn no_brackets(mut self) -> Signature {
        self.brackets = false;
        self
    }

    pub(super) fn into_spec(self, index: usize) -> FuncSpec {
        FuncSpec {
            params: self.params,
            brackets: self.brackets,
            is_function: self.return_type.is_some(),
            return_type: self
                .return_type
                .unwrap_or_else(|| ValType::from(BasicType::Undefined)),
            timeshare: self.timeshare,
            free_temp: self.free_temp,
            index,
        }
    }
}

/// Returned by an operator extension that accepts a pair of operand types.
#[derive(Debug, Clone, Copy)]
pub struct Overload {
    /// Operands are converted to these types before the call.
    pub reg: ValType,
    pub reg2: ValType,
    /// Index into the machine's operator function table.
    pub function: usize,
    pub result: ValType,
    pub free_temp: bool,
}

pub type UnaryExtension = Rc<dyn Fn(&ValType, Opcode) -> Option<Overload>>;
pub type BinaryExtension = Rc<dyn Fn(&ValType, &ValType, Opcode) -> Option<Overload>>;

/// Host owned state that is reset with the program.
pub trait Resources {
    fn clear(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        let spec = Signature::function(BasicType::Real)
            .param(BasicType::Int)
            .param(ValType::new(BasicType::Real, 1, 1, true))
            .timeshare()
            .into_spec(4);
        assert!(spec.is_function);
        assert!(spec.brackets);
        assert!(spec.timeshare);
        assert_eq!(spec.params.len(), 2);
        assert_eq!(spec.index, 4);
        let spec = Signature::statement().no_brackets().into_spec(0);
        assert!(!spec.is_function);
        assert!(!spec.brackets);
    }
}
