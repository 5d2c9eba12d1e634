use super::types::{BasicType, ValType};
use std::collections::HashMap;

/// ## Variable table
///
/// Variables are declared at compile time and allocated at run time
/// by `DECLARE`. A name with a type suffix refers to the same variable
/// as the bare name; the suffix only has to agree with the declared type.

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: ValType,
    pub data_index: usize,
}

impl Variable {
    pub fn allocated(&self) -> bool {
        self.data_index > 0
    }
}

#[derive(Debug, Default)]
pub struct Variables {
    vars: Vec<Variable>,
    index: HashMap<String, usize>,
}

pub fn base_name(name: &str) -> &str {
    match name.chars().last() {
        Some('$') | Some('#') | Some('%') => &name[..name.len() - 1],
        _ => name,
    }
}

/// True when a name's suffix, if any, agrees with the type.
pub fn suffix_matches(name: &str, ty: &ValType) -> bool {
    match name.chars().last() {
        Some('$') => ty.basic == BasicType::String,
        Some('#') => ty.basic == BasicType::Real,
        Some('%') => ty.basic == BasicType::Int,
        _ => true,
    }
}

impl Variables {
    pub fn clear(&mut self) {
        self.vars.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.vars.iter()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(base_name(name)).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.vars.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Variable> {
        self.vars.get_mut(index)
    }

    pub fn add(&mut self, name: &str, ty: ValType) -> usize {
        let index = self.vars.len();
        self.vars.push(Variable {
            name: name.to_string(),
            ty,
            data_index: 0,
        });
        self.index.insert(base_name(name).to_string(), index);
        index
    }

    /// Forget every allocation. Declarations stay.
    pub fn deallocate(&mut self) {
        for var in self.vars.iter_mut() {
            var.data_index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_names() {
        let mut vars = Variables::default();
        let i = vars.add("count%", ValType::from(BasicType::Int));
        assert_eq!(vars.find("count"), Some(i));
        assert_eq!(vars.find("count$"), Some(i));
        assert!(suffix_matches("count%", &vars.get(i).unwrap().ty));
        assert!(!suffix_matches("count$", &vars.get(i).unwrap().ty));
        assert!(!vars.get(i).unwrap().allocated());
    }
}
