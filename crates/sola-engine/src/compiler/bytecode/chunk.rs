//! Bytecode chunk: code bytes, parallel line table and constant pool

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::opcode::Opcode;
use super::value::Value;

/// Placeholder written by [`Chunk::emit_jump`] until the target is known
pub const JUMP_PLACEHOLDER: u16 = 0xFFFF;

/// Assembler limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("too many constants in one function (limit 65536)")]
    TooManyConstants,
    #[error("jump distance {0} does not fit in 16 bits")]
    JumpTooFar(usize),
}

/// Code of one function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub code: Vec<u8>,
    /// Source line of every byte in `code`
    pub lines: Vec<u32>,
    pub constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    // ========================================================================
    // Raw writes
    // ========================================================================

    pub fn write_u8(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_u16(&mut self, value: u16, line: u32) {
        for byte in value.to_le_bytes() {
            self.write_u8(byte, line);
        }
    }

    pub fn write_i16(&mut self, value: i16, line: u32) {
        self.write_u16(value as u16, line);
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.code.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&self, offset: usize) -> Option<i16> {
        self.read_u16(offset).map(|v| v as i16)
    }

    /// Overwrite a previously written u16
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let bytes = value.to_le_bytes();
        self.code[offset] = bytes[0];
        self.code[offset + 1] = bytes[1];
    }

    pub fn patch_i16(&mut self, offset: usize, value: i16) {
        self.patch_u16(offset, value as u16);
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    pub fn emit(&mut self, op: Opcode, line: u32) {
        self.write_u8(op.to_u8(), line);
    }

    pub fn emit_u8(&mut self, op: Opcode, operand: u8, line: u32) {
        self.emit(op, line);
        self.write_u8(operand, line);
    }

    pub fn emit_u16(&mut self, op: Opcode, operand: u16, line: u32) {
        self.emit(op, line);
        self.write_u16(operand, line);
    }

    /// Add `value` to the pool and emit `PUSH idx`
    pub fn emit_constant(&mut self, value: Value, line: u32) -> Result<u16, ChunkError> {
        let index = self.add_constant(value)?;
        self.emit_u16(Opcode::Push, index, line);
        Ok(index)
    }

    /// Emit a forward jump with a placeholder delta; returns the operand offset
    pub fn emit_jump(&mut self, op: Opcode, line: u32) -> usize {
        self.emit_u16(op, JUMP_PLACEHOLDER, line);
        self.code.len() - 2
    }

    /// Point the jump whose operand is at `offset` to the current end
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), ChunkError> {
        let delta = self.code.len() - offset - 2;
        let delta = u16::try_from(delta).map_err(|_| ChunkError::JumpTooFar(delta))?;
        self.patch_u16(offset, delta);
        Ok(())
    }

    /// Emit a backward jump to `loop_start`
    pub fn emit_loop(&mut self, loop_start: usize, line: u32) -> Result<(), ChunkError> {
        self.emit(Opcode::Loop, line);
        let delta = self.code.len() + 2 - loop_start;
        let delta = u16::try_from(delta).map_err(|_| ChunkError::JumpTooFar(delta))?;
        self.write_u16(delta, line);
        Ok(())
    }

    /// Index of `value` in the pool, adding it when absent
    pub fn add_constant(&mut self, value: Value) -> Result<u16, ChunkError> {
        if let Some(index) = self.constants.iter().position(|c| same_constant(c, &value)) {
            return Ok(index as u16);
        }
        let index = u16::try_from(self.constants.len()).map_err(|_| ChunkError::TooManyConstants)?;
        self.constants.push(value);
        Ok(index)
    }

    /// Opcode sequence with operands stripped; malformed code ends the walk
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            let Some(op) = Opcode::from_u8(self.code[offset]) else {
                break;
            };
            out.push(op);
            offset += instruction_len(self, offset);
        }
        out
    }
}

/// Pool identity: floats compare by bit pattern so `-0.0` and `0.0` stay apart
fn same_constant(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

/// Length in bytes of the instruction at `offset`, opcode included
pub fn instruction_len(chunk: &Chunk, offset: usize) -> usize {
    use super::opcode::Operands;
    let Some(op) = chunk.code.get(offset).copied().and_then(Opcode::from_u8) else {
        return 1;
    };
    match op.operands() {
        Operands::None => 1,
        Operands::U8 => 2,
        Operands::U16 => 3,
        Operands::U16U8 => 4,
        Operands::U16U16 => 5,
        Operands::U16U16U8 => 6,
        Operands::TryTable => {
            let count = chunk.code.get(offset + 1).copied().unwrap_or(0) as usize;
            4 + count * 4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_deduplicated() {
        let mut chunk = Chunk::new();
        assert_eq!(chunk.add_constant(Value::Int(7)).unwrap(), 0);
        assert_eq!(chunk.add_constant(Value::string("x")).unwrap(), 1);
        assert_eq!(chunk.add_constant(Value::Int(7)).unwrap(), 0);
        assert_eq!(chunk.constants.len(), 2);
    }

    #[test]
    fn test_patch_jump_writes_delta_to_end() {
        let mut chunk = Chunk::new();
        let offset = chunk.emit_jump(Opcode::JumpIfFalse, 1);
        assert_eq!(chunk.read_u16(offset), Some(JUMP_PLACEHOLDER));
        chunk.emit(Opcode::Pop, 1);
        chunk.emit_constant(Value::Int(1), 1).unwrap();
        chunk.patch_jump(offset).unwrap();
        assert_eq!(chunk.read_u16(offset), Some((chunk.len() - offset - 2) as u16));
        assert_eq!(chunk.read_u16(offset), Some(4));
    }

    #[test]
    fn test_emit_loop_lands_on_start() {
        let mut chunk = Chunk::new();
        chunk.emit(Opcode::Null, 1);
        let start = chunk.len();
        chunk.emit(Opcode::Pop, 2);
        chunk.emit_loop(start, 2).unwrap();
        let delta = chunk.read_u16(chunk.len() - 2).unwrap() as usize;
        assert_eq!(chunk.len() - delta, start);
    }

    #[test]
    fn test_lines_parallel_code() {
        let mut chunk = Chunk::new();
        chunk.emit_u16(Opcode::LoadLocal, 3, 7);
        chunk.emit(Opcode::Return, 8);
        assert_eq!(chunk.lines, vec![7, 7, 7, 8]);
        assert_eq!(chunk.opcodes(), vec![Opcode::LoadLocal, Opcode::Return]);
    }

    #[test]
    fn test_jump_too_far() {
        let mut chunk = Chunk::new();
        let offset = chunk.emit_jump(Opcode::Jump, 1);
        chunk.code.resize(offset + 2 + 70_000, Opcode::Pop.to_u8());
        assert!(matches!(chunk.patch_jump(offset), Err(ChunkError::JumpTooFar(_))));
    }
}
