//! Sola Bytecode Definitions
//!
//! This module provides the instruction set, the per-function chunk with its
//! constant pool, the compiled-unit structures handed to the VM, and the
//! on-disk encoding used by the build cache.

pub mod chunk;
pub mod disassemble;
pub mod encode;
pub mod function;
pub mod opcode;
pub mod value;

pub use chunk::{instruction_len, Chunk, ChunkError, JUMP_PLACEHOLDER};
pub use disassemble::{disassemble, instruction_text};
pub use encode::{deserialize_from_bytes, serialize_to_bytes, validate_header, EncodeError};
pub use function::{ClassDef, CompiledUnit, EnumDef, Function, PropertyDef};
pub use opcode::{Opcode, Operands};
pub use value::Value;
