use super::types::BasicType;
use super::{Opcode, Val};
use crate::error;
use crate::lang::Error;
use std::cmp::Ordering;

type Result<T> = std::result::Result<T, Error>;

/// ## Register arithmetic
///
/// Binary forms take `lhs` from reg2 and `rhs` from reg.
/// Integer arithmetic wraps. Booleans are -1 and 0.

pub struct Operation {}

fn bad_type() -> Error {
    error!(TypeMismatch; "Operator cannot be applied to data type")
}

fn truth(b: bool) -> Val {
    Val::from_int(if b { -1 } else { 0 })
}

impl Operation {
    pub fn negate(basic: BasicType, val: Val) -> Result<Val> {
        match basic {
            BasicType::Int => Ok(Val::from_int(val.int().wrapping_neg())),
            BasicType::Real => Ok(Val::from_real(-val.real())),
            _ => Err(bad_type()),
        }
    }

    pub fn not(basic: BasicType, val: Val) -> Result<Val> {
        match basic {
            BasicType::Int => Ok(truth(val.int() == 0)),
            _ => Err(bad_type()),
        }
    }

    pub fn arithmetic(opcode: Opcode, basic: BasicType, lhs: Val, rhs: Val) -> Result<Val> {
        match basic {
            BasicType::Int => Operation::int_arithmetic(opcode, lhs.int(), rhs.int()),
            BasicType::Real => Operation::real_arithmetic(opcode, lhs.real(), rhs.real()),
            _ => Err(bad_type()),
        }
    }

    fn int_arithmetic(opcode: Opcode, lhs: i32, rhs: i32) -> Result<Val> {
        let i = match opcode {
            Opcode::Plus => lhs.wrapping_add(rhs),
            Opcode::Minus => lhs.wrapping_sub(rhs),
            Opcode::Times => lhs.wrapping_mul(rhs),
            Opcode::Div => {
                if rhs == 0 {
                    return Err(error!(DivisionByZero; "Division by zero"));
                }
                lhs.wrapping_div(rhs)
            }
            Opcode::Mod => {
                if rhs == 0 {
                    return Err(error!(DivisionByZero; "Division by zero"));
                }
                let i = lhs.wrapping_rem(rhs);
                if i >= 0 {
                    i
                } else {
                    rhs.wrapping_add(i)
                }
            }
            _ => return Err(bad_type()),
        };
        Ok(Val::from_int(i))
    }

    fn real_arithmetic(opcode: Opcode, lhs: f32, rhs: f32) -> Result<Val> {
        let r = match opcode {
            Opcode::Plus => lhs + rhs,
            Opcode::Minus => lhs - rhs,
            Opcode::Times => lhs * rhs,
            Opcode::Div => lhs / rhs,
            _ => return Err(bad_type()),
        };
        Ok(Val::from_real(r))
    }

    pub fn compare(opcode: Opcode, basic: BasicType, lhs: Val, rhs: Val) -> Result<Val> {
        let ordering = match basic {
            BasicType::Int => Some(lhs.int().cmp(&rhs.int())),
            BasicType::Real => lhs.real().partial_cmp(&rhs.real()),
            _ => return Err(bad_type()),
        };
        Operation::ordering(opcode, ordering)
    }

    pub fn compare_strings(opcode: Opcode, lhs: &str, rhs: &str) -> Result<Val> {
        Operation::ordering(opcode, Some(lhs.cmp(rhs)))
    }

    fn ordering(opcode: Opcode, ordering: Option<Ordering>) -> Result<Val> {
        use Ordering::*;
        let b = match (opcode, ordering) {
            (Opcode::NotEqual, None) => true,
            (_, None) => false,
            (Opcode::Equal, Some(o)) => o == Equal,
            (Opcode::NotEqual, Some(o)) => o != Equal,
            (Opcode::Greater, Some(o)) => o == Greater,
            (Opcode::GreaterEqual, Some(o)) => o != Less,
            (Opcode::Less, Some(o)) => o == Less,
            (Opcode::LessEqual, Some(o)) => o != Greater,
            _ => return Err(bad_type()),
        };
        Ok(truth(b))
    }

    pub fn logic(opcode: Opcode, lhs: Val, rhs: Val) -> Result<Val> {
        let i = match opcode {
            Opcode::And => lhs.int() & rhs.int(),
            Opcode::Or => lhs.int() | rhs.int(),
            Opcode::Xor => lhs.int() ^ rhs.int(),
            _ => return Err(bad_type()),
        };
        Ok(Val::from_int(i))
    }
}
