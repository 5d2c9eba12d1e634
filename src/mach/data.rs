use super::types::{BasicType, TypeLibrary, ValType};
use super::Val;

/// ## Variable data arena
///
/// Cell 0 is never handed out so a zero address reads as an unset pointer.
/// Temporary data lives above the permanent data and is dropped all at
/// once by `free_temp` or by the next permanent allocation.

#[derive(Debug)]
pub struct Data {
    cells: Vec<Val>,
    temp_start: Option<usize>,
    max_size: usize,
}

impl Data {
    pub fn new(max_size: usize) -> Data {
        Data {
            cells: vec![Val::default()],
            temp_start: None,
            max_size,
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.cells.push(Val::default());
        self.temp_start = None;
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.len() <= 1
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn temp_start(&self) -> Option<usize> {
        self.temp_start
    }

    pub fn get(&self, index: i32) -> Option<Val> {
        if index < 0 {
            return None;
        }
        self.cells.get(index as usize).copied()
    }

    pub fn get_mut(&mut self, index: i32) -> Option<&mut Val> {
        if index < 0 {
            return None;
        }
        self.cells.get_mut(index as usize)
    }

    pub fn is_valid(&self, index: i32) -> bool {
        index >= 0 && (index as usize) < self.cells.len()
    }

    pub fn room_for(&self, count: usize) -> bool {
        let used = self.temp_start.unwrap_or_else(|| self.cells.len());
        self.max_size.saturating_sub(used) >= count
    }

    /// Permanent allocation. Any temporary data is released first.
    pub fn allocate(&mut self, count: usize) -> usize {
        self.free_temp();
        let index = self.cells.len();
        self.cells.resize(index + count, Val::default());
        index
    }

    pub fn allocate_temp(&mut self, count: usize) -> usize {
        let index = self.cells.len();
        if self.temp_start.is_none() {
            self.temp_start = Some(index);
        }
        self.cells.resize(index + count, Val::default());
        index
    }

    pub fn free_temp(&mut self) {
        if let Some(start) = self.temp_start.take() {
            self.cells.truncate(start);
        }
    }

    pub fn copy_within(&mut self, source: usize, dest: usize, count: usize) -> bool {
        let len = self.cells.len();
        if source + count > len || dest + count > len {
            return false;
        }
        self.cells.copy_within(source..source + count, dest);
        true
    }

    /// Snapshot for debugger watches; current temporary data becomes permanent.
    pub fn state(&mut self) -> (usize, Option<usize>) {
        let temp = self.temp_start.take();
        (self.cells.len(), temp)
    }

    pub fn set_state(&mut self, size: usize, temp_start: Option<usize>) {
        self.cells.truncate(size.max(1));
        self.temp_start = temp_start;
    }

    /// Writes array headers for every array reachable inside the block at `index`.
    pub fn init_data(&mut self, index: usize, ty: &ValType, types: &TypeLibrary) {
        if ty.pointer_level > 0 {
            return;
        }
        if ty.array_level > 0 {
            let level = ty.array_level as usize;
            let count = ty.array_dims[level - 1].max(0) as usize;
            let element = ty.element_type();
            let element_size = types.data_size(&element);
            if let Some(cell) = self.cells.get_mut(index) {
                *cell = Val::from_int(count as i32);
            }
            if let Some(cell) = self.cells.get_mut(index + 1) {
                *cell = Val::from_int(element_size as i32);
            }
            if types.contains_array(&element) {
                for i in 0..count {
                    self.init_data(index + 2 + i * element_size, &element, types);
                }
            }
        } else if let BasicType::Struct(s) = ty.basic {
            let fields = match types.structure(s) {
                Some(structure) => structure.fields.clone(),
                None => return,
            };
            for field in fields.iter().filter(|f| types.contains_array(&f.ty)) {
                self.init_data(index + field.offset, &field.ty, types);
            }
        }
    }
}

/// ## Indexed store with slot reuse
///
/// Slot 0 is allocated on clear so a zero index means "no value".

#[derive(Debug)]
pub struct Store<T> {
    values: Vec<T>,
    allocated: Vec<bool>,
    free: Vec<usize>,
}

impl<T: Default + Clone> Default for Store<T> {
    fn default() -> Self {
        let mut store = Store {
            values: vec![],
            allocated: vec![],
            free: vec![],
        };
        store.clear();
        store
    }
}

impl<T: Default + Clone> Store<T> {
    pub fn clear(&mut self) {
        self.values.clear();
        self.allocated.clear();
        self.free.clear();
        self.alloc();
    }

    pub fn alloc(&mut self) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.values[index] = T::default();
                self.allocated[index] = true;
                index
            }
            None => {
                self.values.push(T::default());
                self.allocated.push(true);
                self.values.len() - 1
            }
        }
    }

    pub fn free(&mut self, index: i32) {
        if index <= 0 {
            return;
        }
        let index = index as usize;
        if self.allocated.get(index) == Some(&true) {
            self.allocated[index] = false;
            self.free.push(index);
        }
    }

    pub fn allocation(&self) -> Vec<bool> {
        self.allocated.clone()
    }

    /// Frees every slot allocated since `before` was taken.
    pub fn free_since(&mut self, before: &[bool]) {
        for index in 1..self.allocated.len() {
            if self.allocated[index] && !before.get(index).copied().unwrap_or(false) {
                self.free(index as i32);
            }
        }
    }

    pub fn is_allocated(&self, index: i32) -> bool {
        index >= 0 && self.allocated.get(index as usize) == Some(&true)
    }

    pub fn get(&self, index: i32) -> Option<&T> {
        if self.is_allocated(index) {
            self.values.get(index as usize)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: i32) -> Option<&mut T> {
        if self.is_allocated(index) {
            self.values.get_mut(index as usize)
        } else {
            None
        }
    }
}

/// One element of the program's `data` statements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataElement {
    pub basic: BasicType,
    pub value: Val,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_data() {
        let mut data = Data::new(100);
        let a = data.allocate(3);
        assert_eq!(a, 1);
        let t = data.allocate_temp(5);
        assert_eq!(t, 4);
        assert_eq!(data.len(), 9);
        assert!(data.room_for(96));
        let b = data.allocate(2);
        assert_eq!(b, 4);
        assert_eq!(data.len(), 6);
        assert_eq!(data.temp_start(), None);
    }

    #[test]
    fn test_state() {
        let mut data = Data::new(100);
        data.allocate(2);
        data.allocate_temp(2);
        let (size, temp) = data.state();
        assert_eq!(data.temp_start(), None);
        data.allocate(10);
        data.set_state(size, temp);
        assert_eq!(data.len(), 5);
        assert_eq!(data.temp_start(), Some(3));
    }

    #[test]
    fn test_init_array() {
        let types = TypeLibrary::default();
        let mut ty = ValType::from(BasicType::Int);
        ty.push_dimension(2).unwrap();
        ty.push_dimension(3).unwrap();
        let mut data = Data::new(100);
        let index = data.allocate(types.data_size(&ty));
        data.init_data(index, &ty, &types);
        // outer: 2 elements of 5 cells each
        assert_eq!(data.get(1), Some(Val::from_int(2)));
        assert_eq!(data.get(2), Some(Val::from_int(5)));
        assert_eq!(data.get(3), Some(Val::from_int(3)));
        assert_eq!(data.get(4), Some(Val::from_int(1)));
        assert_eq!(data.get(8), Some(Val::from_int(3)));
    }

    #[test]
    fn test_store_reuse() {
        let mut store: Store<String> = Store::default();
        let a = store.alloc();
        let b = store.alloc();
        assert_eq!((a, b), (1, 2));
        *store.get_mut(a as i32).unwrap() = "x".to_string();
        store.free(a as i32);
        assert_eq!(store.get(a as i32), None);
        assert_eq!(store.alloc(), a);
        assert_eq!(store.get(a as i32).map(|s| s.as_str()), Some(""));
    }
}
