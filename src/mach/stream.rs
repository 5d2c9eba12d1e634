use super::data::DataElement;
use super::opcode::{Instruction, INSTRUCTION_SIZE};
use super::types::{BasicType, Field, Structure, ValType, MAX_DIMENSIONS};
use super::{Val, Vm};
use crate::error;
use crate::lang::Error;
use log::debug;

type Result<T> = std::result::Result<T, Error>;

const STREAM_HEADER: &str = "Basic4GL stream";
const STREAM_VERSION: u32 = 1;

fn corrupt(what: &str) -> Error {
    error!(StreamError; format!("Error in Virtual Machine stream: {}", what))
}

#[derive(Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, b: u8) {
        self.bytes.push(b);
    }

    fn u32(&mut self, n: u32) {
        self.bytes.extend_from_slice(&n.to_le_bytes());
    }

    fn i32(&mut self, n: i32) {
        self.bytes.extend_from_slice(&n.to_le_bytes());
    }

    fn len(&mut self, n: usize) {
        self.u32(n as u32);
    }

    fn string(&mut self, s: &str) {
        self.len(s.len());
        self.bytes.extend_from_slice(s.as_bytes());
    }

    fn val_type(&mut self, ty: &ValType) {
        self.u8(ty.basic.tag() as i8 as u8);
        self.u32(ty.pointer_level);
        self.u32(ty.array_level);
        for dim in ty.array_dims.iter() {
            self.i32(*dim);
        }
        self.u8(ty.by_ref as u8);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| corrupt("unexpected end of stream"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let mut word = [0u8; 4];
        word.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(word))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| corrupt("invalid text"))
    }

    fn basic_type(&mut self) -> Result<BasicType> {
        BasicType::from_tag(self.u8()? as i8 as i32).ok_or_else(|| corrupt("invalid type tag"))
    }

    fn val_type(&mut self) -> Result<ValType> {
        let basic = self.basic_type()?;
        let pointer_level = self.u32()?;
        let array_level = self.u32()?;
        if array_level as usize > MAX_DIMENSIONS {
            return Err(corrupt("too many array dimensions"));
        }
        let mut ty = ValType::new(basic, array_level, pointer_level, false);
        for dim in ty.array_dims.iter_mut() {
            *dim = self.i32()?;
        }
        ty.by_ref = self.u8()? != 0;
        Ok(ty)
    }
}

impl Vm {
    /// Serializes the compiled program, its types and its variable declarations.
    pub fn write_snapshot(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.string(STREAM_HEADER);
        w.u32(STREAM_VERSION);

        w.len(self.types.structures().len());
        for structure in self.types.structures() {
            w.string(&structure.name);
            w.len(structure.size);
            w.len(structure.fields.len());
            for field in &structure.fields {
                w.string(&field.name);
                w.len(field.offset);
                w.val_type(&field.ty);
            }
        }

        w.len(self.variables.len());
        for var in self.variables.iter() {
            w.string(&var.name);
            w.val_type(&var.ty);
        }

        w.len(self.program.string_constants.len());
        for s in &self.program.string_constants {
            w.string(s);
        }

        w.len(self.program.type_set.len());
        for ty in &self.program.type_set {
            w.val_type(ty);
        }

        w.len(self.program.code.len());
        for instr in self.unpatched_code() {
            w.bytes.extend_from_slice(&instr.to_bytes());
        }

        w.len(self.program.data.len());
        for element in &self.program.data {
            w.u8(element.basic.tag() as i8 as u8);
            w.u32(element.value.bits());
        }

        let checksum = crc::crc32::checksum_ieee(&w.bytes);
        w.u32(checksum);
        debug!("wrote snapshot of {} bytes", w.bytes.len());
        w.bytes
    }

    /// Code as it is without breakpoints patched in.
    fn unpatched_code(&self) -> Vec<Instruction> {
        let mut code = self.program.code.clone();
        self.breakpoints.restore(&mut code);
        code
    }

    /// Replaces the current program with one read from a snapshot.
    pub fn read_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
        let mut r = Reader { bytes, pos: 0 };
        let header = r.string().map_err(|_| corrupt("missing header"))?;
        if header != STREAM_HEADER {
            return Err(corrupt("bad header"));
        }
        let version = r.u32()?;
        if version != STREAM_VERSION {
            return Err(error!(StreamError; format!(
                "Wrong version in Virtual Machine stream. Stream version: {}, expected version: {}",
                version, STREAM_VERSION
            )));
        }
        if bytes.len() < r.pos + 4 {
            return Err(corrupt("missing checksum"));
        }
        let (body, tail) = bytes.split_at(bytes.len() - 4);
        let mut word = [0u8; 4];
        word.copy_from_slice(tail);
        if crc::crc32::checksum_ieee(body) != u32::from_le_bytes(word) {
            return Err(error!(StreamError; "Checksum mismatch in Virtual Machine stream"));
        }
        let mut r = Reader {
            bytes: body,
            pos: r.pos,
        };

        let mut structures = vec![];
        for _ in 0..r.len()? {
            let name = r.string()?;
            let size = r.len()?;
            let mut fields = vec![];
            for _ in 0..r.len()? {
                let name = r.string()?;
                let offset = r.len()?;
                let ty = r.val_type()?;
                fields.push(Field { name, ty, offset });
            }
            structures.push(Structure { name, fields, size });
        }

        let mut variables = vec![];
        for _ in 0..r.len()? {
            let name = r.string()?;
            variables.push((name, r.val_type()?));
        }

        let mut string_constants = vec![];
        for _ in 0..r.len()? {
            string_constants.push(r.string()?);
        }

        let mut type_set = vec![];
        for _ in 0..r.len()? {
            type_set.push(r.val_type()?);
        }

        let mut code = vec![];
        for _ in 0..r.len()? {
            let instr = Instruction::from_bytes(r.take(INSTRUCTION_SIZE)?)
                .ok_or_else(|| corrupt("invalid instruction"))?;
            code.push(instr);
        }

        let mut data = vec![];
        for _ in 0..r.len()? {
            let basic = r.basic_type()?;
            let value = Val::from_bits(r.u32()?);
            data.push(DataElement { basic, value });
        }

        if r.pos != body.len() {
            return Err(corrupt("trailing bytes"));
        }

        self.new_program();
        for structure in structures {
            self.types.push_structure(structure);
        }
        for (name, ty) in variables {
            self.variables.add(&name, ty);
        }
        self.program.string_constants = string_constants;
        self.program.type_set = type_set;
        self.program.code = code;
        self.program.data = data;
        debug!(
            "read snapshot: {} instructions, {} variables",
            self.program.code.len(),
            self.variables.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use crate::mach::Opcode;

    fn small_vm() -> Vm {
        let mut vm = Vm::default();
        vm.types_mut().new_structure("pair");
        vm.types_mut().add_field("a", ValType::from(BasicType::Int)).unwrap();
        vm.types_mut().add_field("b", ValType::from(BasicType::String)).unwrap();
        vm.variables_mut().add("p", ValType::from(BasicType::Struct(0)));
        vm.store_string_constant("hello".to_string());
        vm.store_program_data(BasicType::Real, Val::from_real(2.5));
        let mut instr = Instruction::new(Opcode::LoadConst, BasicType::String, Val::from_int(0));
        instr.line = 1;
        instr.col = 3;
        vm.add_instruction(instr);
        vm.add_instruction(Instruction::new(Opcode::End, BasicType::Undefined, Val::default()));
        vm
    }

    #[test]
    fn test_snapshot_contents() {
        let bytes = small_vm().write_snapshot();
        let mut vm = Vm::default();
        vm.read_snapshot(&bytes).unwrap();
        assert_eq!(vm.types().structure(0).unwrap().field("b").unwrap().offset, 1);
        assert_eq!(vm.variables().find("p"), Some(0));
        assert_eq!(vm.string_constants(), &["hello".to_string()]);
        assert_eq!(vm.code()[0].col, 3);
        assert_eq!(vm.program_data_len(), 1);
    }

    #[test]
    fn test_snapshot_errors() {
        let bytes = small_vm().write_snapshot();
        let mut vm = Vm::default();

        let mut bad = bytes.clone();
        bad[4] = b'X';
        assert_eq!(vm.read_snapshot(&bad).unwrap_err().code(), ErrorCode::StreamError);

        let mut bad = bytes.clone();
        bad[19] = 2;
        let err = vm.read_snapshot(&bad).unwrap_err();
        assert_eq!(
            err.text(),
            "Wrong version in Virtual Machine stream. Stream version: 2, expected version: 1"
        );

        let mut bad = bytes.clone();
        let last = bad.len() - 10;
        bad[last] ^= 0xff;
        let err = vm.read_snapshot(&bad).unwrap_err();
        assert_eq!(err.text(), "Checksum mismatch in Virtual Machine stream");
    }
}
