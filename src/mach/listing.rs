use super::types::BasicType;
use super::val::real_to_string;
use super::{Instruction, Opcode, Vm};
use std::fmt::Write;

impl Vm {
    /// Human readable disassembly, one instruction per line.
    pub fn listing(&self) -> String {
        let mut s = String::new();
        for (offset, instr) in self.code().iter().enumerate() {
            let _ = writeln!(
                s,
                "{:>6} {:>5}:{:<4} {:<20} {:<10} {}",
                offset,
                instr.line,
                instr.col,
                instr.opcode.name(),
                tag_name(instr.basic),
                self.operand(instr)
            );
        }
        s
    }

    fn operand(&self, instr: &Instruction) -> String {
        let value = instr.value;
        match instr.opcode {
            Opcode::LoadConst => match instr.basic {
                BasicType::String => self
                    .string_constants()
                    .get(value.int().max(0) as usize)
                    .map_or_else(|| "???".to_string(), |s| format!("{:?}", s)),
                BasicType::Real => real_to_string(value.real()),
                _ => value.int().to_string(),
            },
            Opcode::LoadVar | Opcode::Declare => self
                .variables()
                .get(value.int().max(0) as usize)
                .map_or_else(|| "???".to_string(), |var| var.name.clone()),
            Opcode::Copy | Opcode::Alloc => self
                .type_set()
                .get(value.int().max(0) as usize)
                .map_or_else(|| "???".to_string(), |ty| self.types().describe(ty)),
            Opcode::Jump | Opcode::JumpTrue | Opcode::JumpFalse | Opcode::Call => {
                format!("-> {}", value.int())
            }
            Opcode::AddConst | Opcode::CallFunc | Opcode::CallOperatorFunc | Opcode::DataReset => {
                value.int().to_string()
            }
            _ => String::new(),
        }
    }
}

fn tag_name(basic: BasicType) -> String {
    match basic {
        BasicType::Undefined => String::new(),
        BasicType::Struct(index) => format!("struct {}", index),
        basic => basic.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mach::Val;

    #[test]
    fn test_listing() {
        let mut vm = Vm::default();
        let s = vm.store_string_constant("hi".to_string());
        let mut instr = Instruction::new(Opcode::LoadConst, BasicType::String, Val::from_int(s as i32));
        instr.line = 2;
        instr.col = 7;
        vm.add_instruction(instr);
        vm.add_instruction(Instruction::new(Opcode::Jump, BasicType::Undefined, Val::from_int(0)));
        let listing = vm.listing();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("LOAD_CONST"));
        assert!(lines[0].contains("2:7"));
        assert!(lines[0].ends_with("\"hi\""));
        assert!(lines[1].ends_with("-> 0"));
    }
}
