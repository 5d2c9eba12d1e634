use super::{Val, Vm};
use crate::error;
use crate::lang::Error;
use log::debug;
use std::collections::{BTreeMap, HashMap};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    /// Instruction the label points at.
    pub offset: usize,
    /// Program data position for `reset`.
    pub data_offset: usize,
}

/// ## Label linker
///
/// Jumps to labels are emitted with a zero target and fixed up
/// once the whole program has been compiled.

#[derive(Debug, Default)]
pub struct Link {
    labels: HashMap<String, Label>,
    label_index: BTreeMap<usize, String>,
    jumps: Vec<(usize, String)>,
    resets: Vec<(usize, String)>,
}

impl Link {
    pub fn clear(&mut self) {
        self.labels.clear();
        self.label_index.clear();
        self.jumps.clear();
        self.resets.clear();
    }

    pub fn insert(&mut self, name: &str, label: Label) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(error!(DuplicateLabel; format!("Duplicate label name: {}", name)));
        }
        self.labels.insert(name.to_string(), label);
        self.label_index
            .entry(label.offset)
            .or_insert_with(|| name.to_string());
        Ok(())
    }

    /// The `JUMP` or `CALL` at `offset` goes to the label.
    pub fn jump_to_label(&mut self, offset: usize, name: &str) {
        self.jumps.push((offset, name.to_string()));
    }

    /// The `DATA_RESET` at `offset` uses the label's data position.
    pub fn reset_to_label(&mut self, offset: usize, name: &str) {
        self.resets.push((offset, name.to_string()));
    }

    /// Name of the label at exactly this offset.
    pub fn label_at(&self, offset: usize) -> Option<&str> {
        self.label_index.get(&offset).map(|s| s.as_str())
    }

    pub fn link(&mut self, vm: &mut Vm) -> Result<()> {
        for (offset, name) in &self.jumps {
            let label = self.find(vm, *offset, name)?;
            if let Some(instr) = vm.instruction_mut(*offset) {
                instr.value = Val::from_int(label.offset as i32);
            }
        }
        for (offset, name) in &self.resets {
            let label = self.find(vm, *offset, name)?;
            if let Some(instr) = vm.instruction_mut(*offset) {
                instr.value = Val::from_int(label.data_offset as i32);
            }
        }
        debug!(
            "linked {} jumps and {} resets to {} labels",
            self.jumps.len(),
            self.resets.len(),
            self.labels.len()
        );
        Ok(())
    }

    fn find(&self, vm: &Vm, offset: usize, name: &str) -> Result<Label> {
        self.labels.get(name).copied().ok_or_else(|| {
            let message = format!("Label: {} does not exist", name);
            match vm.instruction(offset) {
                Some(instr) => error!(UndefinedLabel, instr.line, instr.col; message),
                None => error!(UndefinedLabel; message),
            }
        })
    }
}
