use super::{Instruction, Opcode, Vm};
use crate::lang::LineNumber;
use log::debug;
use std::collections::BTreeMap;

/// A breakpoint currently written over an instruction.
#[derive(Debug, Clone, Copy)]
struct Patch {
    offset: usize,
    replaced: Opcode,
}

/// ## Breakpoints
///
/// User breakpoints are keyed by source line. Temporary breakpoints
/// are instruction offsets used for stepping. Breakpoints are written into the code as `BREAKPT` only
/// while running.

#[derive(Debug, Default)]
pub struct Breakpoints {
    patched: Vec<Patch>,
    temp: Vec<usize>,
    user: BTreeMap<LineNumber, Option<usize>>,
    is_patched: bool,
}

impl Breakpoints {
    /// Drops everything tied to the old program. User lines survive.
    pub(super) fn forget_patches(&mut self) {
        self.patched.clear();
        self.temp.clear();
        self.is_patched = false;
        for offset in self.user.values_mut() {
            *offset = None;
        }
    }

    pub(super) fn restore(&self, code: &mut [Instruction]) {
        for patch in &self.patched {
            if let Some(instr) = code.get_mut(patch.offset) {
                instr.opcode = patch.replaced;
            }
        }
    }
}

impl Vm {
    pub fn set_user_breakpoint(&mut self, line: LineNumber) {
        self.patch_out();
        self.breakpoints.user.insert(line, None);
    }

    pub fn clear_user_breakpoint(&mut self, line: LineNumber) {
        self.patch_out();
        self.breakpoints.user.remove(&line);
    }

    pub fn clear_user_breakpoints(&mut self) {
        self.patch_out();
        self.breakpoints.user.clear();
    }

    pub fn is_user_breakpoint(&self, line: LineNumber) -> bool {
        self.breakpoints.user.contains_key(&line)
    }

    pub fn user_breakpoints(&self) -> Vec<LineNumber> {
        self.breakpoints.user.keys().copied().collect()
    }

    pub fn is_patched(&self) -> bool {
        self.breakpoints.is_patched
    }

    /// Writes `BREAKPT` over every user and temporary breakpoint.
    pub fn patch_in(&mut self) {
        if self.breakpoints.is_patched {
            return;
        }
        let lines: Vec<LineNumber> = self.breakpoints.user.keys().copied().collect();
        for line in lines {
            let offset = self
                .program
                .code
                .iter()
                .position(|instr| instr.line >= line)
                .filter(|offset| self.program.code[*offset].line == line);
            self.breakpoints.user.insert(line, offset);
            if let Some(offset) = offset {
                self.patch_in_breakpoint(offset);
            }
        }
        for offset in self.breakpoints.temp.clone() {
            self.patch_in_breakpoint(offset);
        }
        self.breakpoints.is_patched = true;
        debug!("patched in {} breakpoints", self.breakpoints.patched.len());
    }

    /// Restores the original instructions.
    pub fn patch_out(&mut self) {
        if !self.breakpoints.is_patched {
            return;
        }
        while let Some(patch) = self.breakpoints.patched.pop() {
            if let Some(instr) = self.program.code.get_mut(patch.offset) {
                instr.opcode = patch.replaced;
            }
        }
        self.breakpoints.is_patched = false;
        debug!("patched out breakpoints");
    }

    pub fn clear_temp_breakpoints(&mut self) {
        self.patch_out();
        self.breakpoints.temp.clear();
    }

    fn patch_in_breakpoint(&mut self, offset: usize) {
        // the final END is never replaced
        if offset + 1 >= self.program.code.len() {
            return;
        }
        let instr = &mut self.program.code[offset];
        if instr.opcode == Opcode::Breakpt {
            return;
        }
        self.breakpoints.patched.push(Patch {
            offset,
            replaced: instr.opcode,
        });
        instr.opcode = Opcode::Breakpt;
    }

    fn add_temp_breakpoint(&mut self, offset: usize) {
        self.breakpoints.temp.push(offset);
    }

    /// Temporary breakpoints that stop at the next line.
    /// Calls are followed only when `step_into` is set.
    pub fn add_step_breakpoints(&mut self, step_into: bool) {
        if self.ip >= self.program.code.len() {
            return;
        }
        self.patch_out();
        let line = self.program.code[self.ip].line;
        let mut start = self.ip;
        while start > 0 && self.program.code[start - 1].line == line {
            start -= 1;
        }
        let mut end = self.ip + 1;
        while end < self.program.code.len() && self.program.code[end].line == line {
            end += 1;
        }
        self.add_temp_breakpoint(end);
        for offset in start..end {
            let instr = self.program.code[offset];
            let target = match instr.opcode {
                Opcode::Call if step_into => Some(instr.value.int()),
                Opcode::Jump | Opcode::JumpTrue | Opcode::JumpFalse => Some(instr.value.int()),
                Opcode::Return => self.call_stack.last().map(|a| *a as i32),
                _ => None,
            };
            if let Some(target) = target {
                let target = target as usize;
                if target < self.program.code.len() && (target < start || target >= end) {
                    self.add_temp_breakpoint(target);
                }
            }
        }
    }

    /// Temporary breakpoint at the current return address.
    pub fn add_step_out_breakpoint(&mut self) -> bool {
        let address = match self.call_stack.last() {
            Some(address) => *address,
            None => return false,
        };
        if address >= self.program.code.len() {
            return false;
        }
        self.patch_out();
        self.add_temp_breakpoint(address);
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::mach::{BasicType, Instruction, Opcode, Val, Vm};

    fn program(vm: &mut Vm, lines: &[u32]) {
        for line in lines {
            let mut instr = Instruction::new(Opcode::Nop, BasicType::Undefined, Val::default());
            instr.line = *line;
            vm.add_instruction(instr);
        }
        vm.add_instruction(Instruction::new(Opcode::End, BasicType::Undefined, Val::default()));
    }

    #[test]
    fn test_patch_in_out() {
        let mut vm = Vm::default();
        program(&mut vm, &[1, 1, 3, 4]);
        vm.set_user_breakpoint(2);
        vm.set_user_breakpoint(3);
        let before: Vec<_> = vm.code().iter().map(Instruction::to_bytes).collect();
        vm.patch_in();
        assert_eq!(vm.code()[1].opcode, Opcode::Nop);
        assert_eq!(vm.code()[2].opcode, Opcode::Breakpt);
        vm.patch_out();
        assert_eq!(vm.code()[2].opcode, Opcode::Nop);
        let after: Vec<_> = vm.code().iter().map(Instruction::to_bytes).collect();
        assert_eq!(after, before);
        assert!(!vm.is_patched());
    }

    #[test]
    fn test_never_patch_end() {
        let mut vm = Vm::default();
        program(&mut vm, &[1]);
        vm.patch_in();
        vm.patch_out();
        vm.goto_instruction(0);
        vm.add_step_breakpoints(false);
        vm.patch_in();
        assert_eq!(vm.code()[0].opcode, Opcode::Nop);
        assert_eq!(vm.code()[1].opcode, Opcode::End);
    }
}
