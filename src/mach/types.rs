use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

pub const MAX_DIMENSIONS: usize = 10;

/// ## Basic types
///
/// Negative tags in the stream format are the scalar types,
/// non-negative tags index the structure table.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Undefined,
    Null,
    Int,
    Real,
    String,
    Struct(usize),
}

impl Default for BasicType {
    fn default() -> Self {
        BasicType::Undefined
    }
}

impl BasicType {
    pub fn tag(self) -> i32 {
        match self {
            BasicType::Int => -1,
            BasicType::Real => -2,
            BasicType::String => -3,
            BasicType::Null => -4,
            BasicType::Undefined => -5,
            BasicType::Struct(index) => index as i32,
        }
    }

    pub fn from_tag(tag: i32) -> Option<BasicType> {
        match tag {
            -1 => Some(BasicType::Int),
            -2 => Some(BasicType::Real),
            -3 => Some(BasicType::String),
            -4 => Some(BasicType::Null),
            -5 => Some(BasicType::Undefined),
            t if t >= 0 => Some(BasicType::Struct(t as usize)),
            _ => None,
        }
    }

    pub fn is_scalar(self) -> bool {
        !matches!(self, BasicType::Struct(_))
    }

    pub fn is_struct(self) -> bool {
        matches!(self, BasicType::Struct(_))
    }

    /// Widening order for binary operators: int, real, string.
    pub fn rank(self) -> i32 {
        match self {
            BasicType::Int => 1,
            BasicType::Real => 2,
            BasicType::String => 3,
            _ => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicType::Int => "integer",
            BasicType::Real => "real",
            BasicType::String => "string",
            BasicType::Null => "null",
            BasicType::Undefined => "undefined",
            BasicType::Struct(_) => "structure",
        }
    }
}

/// ## Full value type
///
/// `pointer_level` counts indirections. When `by_ref` is set the
/// outermost pointer is implicit and the value is really that
/// many levels minus one. `array_dims[0]` is the innermost dimension.

#[derive(Debug, Clone, Copy, Default)]
pub struct ValType {
    pub basic: BasicType,
    pub pointer_level: u32,
    pub array_level: u32,
    pub array_dims: [i32; MAX_DIMENSIONS],
    pub by_ref: bool,
}

impl PartialEq for ValType {
    fn eq(&self, other: &ValType) -> bool {
        self.basic == other.basic
            && self.array_level == other.array_level
            && self.pointer_level == other.pointer_level
    }
}

impl From<BasicType> for ValType {
    fn from(basic: BasicType) -> Self {
        ValType {
            basic,
            ..ValType::default()
        }
    }
}

impl ValType {
    pub fn new(basic: BasicType, array_level: u32, pointer_level: u32, by_ref: bool) -> ValType {
        ValType {
            basic,
            pointer_level,
            array_level,
            array_dims: [0; MAX_DIMENSIONS],
            by_ref,
        }
    }

    pub fn null() -> ValType {
        ValType::new(BasicType::Null, 0, 1, false)
    }

    pub fn exact_equals(&self, other: &ValType) -> bool {
        self == other
            && self.by_ref == other.by_ref
            && self.array_dims[..self.array_level as usize]
                == other.array_dims[..other.array_level as usize]
    }

    /// Pointer level as the program sees it.
    pub fn virtual_pointer_level(&self) -> u32 {
        if self.by_ref {
            self.pointer_level.saturating_sub(1)
        } else {
            self.pointer_level
        }
    }

    /// Pointer level as stored in memory.
    pub fn physical_pointer_level(&self) -> u32 {
        self.pointer_level
    }

    pub fn is(&self, basic: BasicType) -> bool {
        self.basic == basic && self.pointer_level == 0 && self.array_level == 0
    }

    pub fn is_basic(&self) -> bool {
        self.basic.is_scalar() && self.pointer_level == 0 && self.array_level == 0
    }

    pub fn is_null(&self) -> bool {
        self.basic == BasicType::Null
    }

    /// Type tag used by instructions that move this value.
    pub fn stored_type(&self) -> BasicType {
        if self.pointer_level > 0 {
            BasicType::Int
        } else if self.array_level == 0 {
            self.basic
        } else {
            BasicType::Undefined
        }
    }

    /// Adds an inner dimension of `size` elements, shifting the existing ones out.
    pub fn push_dimension(&mut self, size: i32) -> Result<()> {
        let level = self.array_level as usize;
        if level >= MAX_DIMENSIONS {
            return Err(error!(SyntaxError; "Too many array dimensions"));
        }
        self.array_dims.copy_within(0..level, 1);
        self.array_dims[0] = size;
        self.array_level += 1;
        Ok(())
    }

    pub fn element_type(&self) -> ValType {
        let mut ty = *self;
        if ty.array_level > 0 {
            ty.array_level -= 1;
        }
        ty
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: ValType,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub name: String,
    pub fields: Vec<Field>,
    pub size: usize,
}

impl Structure {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// ## Structure table
///
/// Owns every user defined structure and answers sizing questions for
/// any `ValType`.

#[derive(Debug, Default, Clone)]
pub struct TypeLibrary {
    structures: Vec<Structure>,
}

impl TypeLibrary {
    pub fn clear(&mut self) {
        self.structures.clear();
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    pub fn structure(&self, index: usize) -> Option<&Structure> {
        self.structures.get(index)
    }

    pub fn structure_index(&self, name: &str) -> Option<usize> {
        self.structures.iter().position(|s| s.name == name)
    }

    pub fn new_structure(&mut self, name: &str) -> usize {
        self.structures.push(Structure {
            name: name.to_string(),
            fields: vec![],
            size: 0,
        });
        self.structures.len() - 1
    }

    pub fn push_structure(&mut self, structure: Structure) {
        self.structures.push(structure);
    }

    /// Appends a field to the most recently created structure.
    pub fn add_field(&mut self, name: &str, ty: ValType) -> Result<()> {
        let size = self.data_size(&ty);
        let structure = match self.structures.last_mut() {
            Some(s) => s,
            None => return Err(error!(InternalError; "No structure to add field to")),
        };
        structure.fields.push(Field {
            name: name.to_string(),
            ty,
            offset: structure.size,
        });
        structure.size += size;
        Ok(())
    }

    fn element_size(&self, ty: &ValType) -> usize {
        if ty.pointer_level > 0 {
            return 1;
        }
        match ty.basic {
            BasicType::Struct(index) => self.structures.get(index).map_or(0, |s| s.size),
            _ => 1,
        }
    }

    /// Number of data cells a value of this type occupies.
    /// Each array level adds a two cell header: element count and element size.
    pub fn data_size(&self, ty: &ValType) -> usize {
        if ty.pointer_level > 0 {
            return 1;
        }
        let mut size = self.element_size(ty);
        for i in 0..ty.array_level as usize {
            size = size * ty.array_dims[i].max(0) as usize + 2;
        }
        size
    }

    pub fn data_size_bigger_than(&self, ty: &ValType, max: usize) -> bool {
        if ty.pointer_level > 0 {
            return 1 > max;
        }
        let mut size = self.element_size(ty);
        for i in 0..ty.array_level as usize {
            let count = ty.array_dims[i].max(0) as usize;
            size = match size.checked_mul(count).and_then(|s| s.checked_add(2)) {
                Some(s) => s,
                None => return true,
            };
            if size > max {
                return true;
            }
        }
        size > max
    }

    pub fn contains_string(&self, ty: &ValType) -> bool {
        if ty.pointer_level > 0 {
            return false;
        }
        match ty.basic {
            BasicType::String => true,
            BasicType::Struct(index) => self.structures.get(index).map_or(false, |s| {
                s.fields.iter().any(|f| self.contains_string(&f.ty))
            }),
            _ => false,
        }
    }

    pub fn contains_array(&self, ty: &ValType) -> bool {
        if ty.pointer_level > 0 {
            return false;
        }
        if ty.array_level > 0 {
            return true;
        }
        match ty.basic {
            BasicType::Struct(index) => self.structures.get(index).map_or(false, |s| {
                s.fields.iter().any(|f| self.contains_array(&f.ty))
            }),
            _ => false,
        }
    }

    /// Human readable type for error messages.
    pub fn describe(&self, ty: &ValType) -> String {
        let mut s = match ty.basic {
            BasicType::Struct(index) => self
                .structures
                .get(index)
                .map_or_else(|| "???".to_string(), |s| s.name.clone()),
            basic => basic.name().to_string(),
        };
        for _ in 0..ty.virtual_pointer_level() {
            s.insert(0, '&');
        }
        for _ in 0..ty.array_level {
            s.push_str("()");
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> TypeLibrary {
        let mut types = TypeLibrary::default();
        types.new_structure("point");
        types.add_field("x", ValType::from(BasicType::Int)).unwrap();
        types.add_field("y", ValType::from(BasicType::Int)).unwrap();
        types
    }

    #[test]
    fn test_struct_layout() {
        let types = point();
        let s = types.structure(0).unwrap();
        assert_eq!(s.size, 2);
        assert_eq!(s.field("y").unwrap().offset, 1);
        assert!(!types.contains_string(&ValType::from(BasicType::Struct(0))));
    }

    #[test]
    fn test_array_size() {
        let types = point();
        let mut ty = ValType::from(BasicType::Struct(0));
        ty.push_dimension(3).unwrap();
        ty.push_dimension(4).unwrap();
        // inner: 4 points -> 4 * 2 + 2, outer: 3 of those + 2
        assert_eq!(types.data_size(&ty), 3 * (4 * 2 + 2) + 2);
        assert_eq!(ty.array_dims[0], 4);
        assert_eq!(ty.array_dims[1], 3);
    }

    #[test]
    fn test_bigger_than() {
        let types = TypeLibrary::default();
        let mut ty = ValType::from(BasicType::Int);
        ty.push_dimension(i32::MAX).unwrap();
        ty.push_dimension(i32::MAX).unwrap();
        ty.push_dimension(i32::MAX).unwrap();
        assert!(types.data_size_bigger_than(&ty, 1_000_000));
        assert!(!types.data_size_bigger_than(&ValType::from(BasicType::Int), 1));
    }

    #[test]
    fn test_type_equality() {
        let a = ValType::new(BasicType::Int, 1, 1, true);
        let b = ValType::new(BasicType::Int, 1, 1, false);
        assert_eq!(a, b);
        assert!(!a.exact_equals(&b));
        assert_eq!(a.virtual_pointer_level(), 0);
        assert_eq!(TypeLibrary::default().describe(&b), "&integer()");
    }
}
