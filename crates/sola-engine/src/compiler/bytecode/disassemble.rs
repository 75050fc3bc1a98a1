//! Human-readable bytecode listing

use std::fmt::Write;

use super::chunk::{instruction_len, Chunk};
use super::function::Function;
use super::opcode::{Opcode, Operands};
use super::value::Value;

/// Render `function` one instruction per line, then every nested function
pub fn disassemble(function: &Function) -> String {
    let mut out = String::new();
    write_function(&mut out, function);
    out
}

fn write_function(out: &mut String, function: &Function) {
    let _ = writeln!(
        out,
        "== {} (arity {}, min {}, locals {}) ==",
        function.name, function.arity, function.min_arity, function.local_count
    );
    let chunk = &function.chunk;
    let mut offset = 0;
    while offset < chunk.code.len() {
        let _ = writeln!(out, "{}", instruction_text(chunk, offset));
        offset += instruction_len(chunk, offset);
    }
    for constant in &chunk.constants {
        if let Value::Function(nested) = constant {
            out.push('\n');
            write_function(out, nested);
        }
    }
}

/// `offset  MNEMONIC operands` for the instruction at `offset`
pub fn instruction_text(chunk: &Chunk, offset: usize) -> String {
    let byte = chunk.code[offset];
    let Some(op) = Opcode::from_u8(byte) else {
        return format!("{:04}  <invalid 0x{:02X}>", offset, byte);
    };
    let u16_at = |at: usize| chunk.read_u16(at).unwrap_or(0);
    let u8_at = |at: usize| chunk.code.get(at).copied().unwrap_or(0);
    let constant = |index: u16| {
        chunk
            .constants
            .get(index as usize)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string())
    };

    let operands = match op.operands() {
        Operands::None => String::new(),
        Operands::U8 => u8_at(offset + 1).to_string(),
        Operands::U16 => {
            let value = u16_at(offset + 1);
            match op {
                Opcode::Jump | Opcode::JumpIfFalse => {
                    format!("{} -> {}", value, offset + 3 + value as usize)
                }
                Opcode::Loop => format!("{} -> {}", value, (offset + 3).saturating_sub(value as usize)),
                Opcode::Push
                | Opcode::LoadGlobal
                | Opcode::StoreGlobal
                | Opcode::NewObject
                | Opcode::GetField
                | Opcode::SetField
                | Opcode::CheckType
                | Opcode::Cast
                | Opcode::CastSafe
                | Opcode::EnterCatch => format!("{} ({})", value, constant(value)),
                _ => value.to_string(),
            }
        }
        Operands::U16U16 => {
            let (a, b) = (u16_at(offset + 1), u16_at(offset + 3));
            if op == Opcode::NewFixedArray {
                format!("{} {}", a, b)
            } else {
                format!("{} {}", constant(a), constant(b))
            }
        }
        Operands::U16U8 => format!("{} {}", constant(u16_at(offset + 1)), u8_at(offset + 3)),
        Operands::U16U16U8 => format!(
            "{} {} {}",
            constant(u16_at(offset + 1)),
            constant(u16_at(offset + 3)),
            u8_at(offset + 5)
        ),
        Operands::TryTable => {
            let count = u8_at(offset + 1) as usize;
            let finally = u16_at(offset + 2);
            let mut text = if finally == 0xFFFF {
                "finally none".to_string()
            } else {
                format!("finally -> {}", offset as i64 + finally as i16 as i64)
            };
            for i in 0..count {
                let at = offset + 4 + i * 4;
                let catch_off = u16_at(at + 2) as i16;
                let _ = write!(
                    text,
                    ", catch {} -> {}",
                    constant(u16_at(at)),
                    offset as i64 + catch_off as i64
                );
            }
            text
        }
    };

    if operands.is_empty() {
        format!("{:04}  {}", offset, op.name())
    } else {
        format!("{:04}  {} {}", offset, op.name(), operands)
    }
}
