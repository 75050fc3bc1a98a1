//! Bytecode opcodes for the Sola VM
//!
//! Every instruction is a single opcode byte followed by fixed-width
//! operands. Jump deltas are unsigned 16-bit forward offsets measured from
//! the end of the operand; `Loop` jumps backwards by its operand.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Stack manipulation & constants
//! - 0x10-0x1F: Variables
//! - 0x20-0x2F: Arithmetic & bitwise
//! - 0x30-0x3F: Comparison & string
//! - 0x40-0x4F: Control flow
//! - 0x50-0x5F: Containers & iteration
//! - 0x60-0x6F: Objects, calls & closures
//! - 0x70-0x7F: Type assertions
//! - 0x80-0x8F: Exceptions
//! - 0x90-0x9F: Miscellaneous

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// Push constant from pool (operand: u16 index)
    Push = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Swap top two stack values
    Swap = 0x03,
    /// Push integer 1
    One = 0x04,
    /// Push null
    Null = 0x05,
    /// Push true
    True = 0x06,
    /// Push false
    False = 0x07,

    // ===== Variables (0x10-0x1F) =====
    /// Load local variable (operand: u16 slot)
    LoadLocal = 0x10,
    /// Store top of stack to local, leaving it on the stack (operand: u16 slot)
    StoreLocal = 0x11,
    /// Load global by name (operand: u16 constant index)
    LoadGlobal = 0x12,
    /// Store top of stack to global, leaving it on the stack (operand: u16 constant index)
    StoreGlobal = 0x13,

    // ===== Arithmetic & Bitwise (0x20-0x2F) =====
    /// pop b, pop a, push a + b
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
    Mod = 0x24,
    /// pop a, push -a
    Neg = 0x25,
    /// pop a, push !a
    Not = 0x26,
    /// pop a, push ~a
    BitNot = 0x27,
    BitAnd = 0x28,
    BitOr = 0x29,
    BitXor = 0x2A,
    Shl = 0x2B,
    Shr = 0x2C,

    // ===== Comparison & String (0x30-0x3F) =====
    Eq = 0x30,
    Ne = 0x31,
    Lt = 0x32,
    Le = 0x33,
    Gt = 0x34,
    Ge = 0x35,
    /// pop b, pop a, push string(a) . string(b)
    Concat = 0x36,

    // ===== Control Flow (0x40-0x4F) =====
    /// Unconditional forward jump (operand: u16 delta)
    Jump = 0x40,
    /// Forward jump when the top of stack is falsy; the condition stays (operand: u16 delta)
    JumpIfFalse = 0x41,
    /// Backward jump (operand: u16 delta)
    Loop = 0x42,
    /// Return top of stack
    Return = 0x43,
    /// Return null
    ReturnNull = 0x44,

    // ===== Containers & Iteration (0x50-0x5F) =====
    /// Pop `count` values into a new array (operand: u16 count)
    NewArray = 0x50,
    /// Pop `initlen` values into a fixed array (operands: u16 capacity, u16 initlen)
    NewFixedArray = 0x51,
    /// Pop `count` values into a byte buffer (operand: u16 count)
    NewBytes = 0x52,
    /// Pop `count` key/value pairs into a map (operand: u16 count)
    NewMap = 0x53,
    /// Pop `count` key/value pairs into a SuperArray (operand: u16 count)
    NewSuperArray = 0x54,
    /// pop index, pop array, push array[index] with bounds check
    ArrayGet = 0x55,
    /// pop index, pop array, push array[index] without bounds check
    ArrayGetUnchecked = 0x56,
    /// pop value, pop index, pop array, store, push value
    ArraySet = 0x57,
    /// pop value, pop array, append, push value
    ArrayPush = 0x58,
    /// pop array, push its length
    ArrayLen = 0x59,
    /// pop key, pop map, push whether key is present
    MapHas = 0x5A,
    /// Replace the iterable on top of stack with an iterator
    IterInit = 0x5B,
    /// Advance the iterator at peek(0); push whether an element is available
    IterNext = 0x5C,
    /// Push the current key of the iterator at peek(0)
    IterKey = 0x5D,
    /// Push the current value of the iterator at peek(0)
    IterValue = 0x5E,

    // ===== Objects, Calls & Closures (0x60-0x6F) =====
    /// Push a new instance (operand: u16 class name constant)
    NewObject = 0x60,
    /// pop object, push field (operand: u16 name constant)
    GetField = 0x61,
    /// pop value, pop object, store field, push value (operand: u16 name constant)
    SetField = 0x62,
    /// Push static property (operands: u16 class constant, u16 name constant)
    GetStatic = 0x63,
    /// Store static property, leaving the value (operands: u16 class constant, u16 name constant)
    SetStatic = 0x64,
    /// Call callee below `n` arguments (operand: u8 argument count)
    Call = 0x65,
    /// Call reusing the current frame (operand: u8 argument count)
    TailCall = 0x66,
    /// Call method on receiver below `n` arguments (operands: u16 name constant, u8 count)
    CallMethod = 0x67,
    /// Call static method (operands: u16 class constant, u16 name constant, u8 count)
    CallStatic = 0x68,
    /// Pop `n` captured values and the function below them, push a closure (operand: u16 n)
    Closure = 0x69,

    // ===== Type Assertions (0x70-0x7F) =====
    /// Push whether peek(0) has the named type (operand: u16 type constant)
    CheckType = 0x70,
    /// Convert to the named type or throw (operand: u16 type constant)
    Cast = 0x71,
    /// Convert to the named type or push null (operand: u16 type constant)
    CastSafe = 0x72,

    // ===== Exceptions (0x80-0x8F) =====
    /// pop value, throw it
    Throw = 0x80,
    /// Rethrow the exception being handled
    Rethrow = 0x81,
    /// Install handlers (operands: u8 catch count, i16 finally offset,
    /// then per catch: u16 type constant, i16 catch offset)
    EnterTry = 0x82,
    /// Remove the innermost handler
    LeaveTry = 0x83,
    /// Bind the caught exception (operand: u16 type constant)
    EnterCatch = 0x84,
    EnterFinally = 0x85,
    LeaveFinally = 0x86,

    // ===== Miscellaneous (0x90-0x9F) =====
    /// pop value, print it
    DebugPrint = 0x90,
    /// pop index, pop container, remove the element
    Unset = 0x91,
}

/// Shape of an instruction's operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    U8,
    U16,
    /// Two u16 operands
    U16U16,
    /// u16 constant followed by a u8 count
    U16U8,
    /// Two u16 constants followed by a u8 count
    U16U16U8,
    /// Variable-length exception handler table
    TryTable,
}

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        use Opcode::*;
        Some(match byte {
            0x00 => Push,
            0x01 => Pop,
            0x02 => Dup,
            0x03 => Swap,
            0x04 => One,
            0x05 => Null,
            0x06 => True,
            0x07 => False,
            0x10 => LoadLocal,
            0x11 => StoreLocal,
            0x12 => LoadGlobal,
            0x13 => StoreGlobal,
            0x20 => Add,
            0x21 => Sub,
            0x22 => Mul,
            0x23 => Div,
            0x24 => Mod,
            0x25 => Neg,
            0x26 => Not,
            0x27 => BitNot,
            0x28 => BitAnd,
            0x29 => BitOr,
            0x2A => BitXor,
            0x2B => Shl,
            0x2C => Shr,
            0x30 => Eq,
            0x31 => Ne,
            0x32 => Lt,
            0x33 => Le,
            0x34 => Gt,
            0x35 => Ge,
            0x36 => Concat,
            0x40 => Jump,
            0x41 => JumpIfFalse,
            0x42 => Loop,
            0x43 => Return,
            0x44 => ReturnNull,
            0x50 => NewArray,
            0x51 => NewFixedArray,
            0x52 => NewBytes,
            0x53 => NewMap,
            0x54 => NewSuperArray,
            0x55 => ArrayGet,
            0x56 => ArrayGetUnchecked,
            0x57 => ArraySet,
            0x58 => ArrayPush,
            0x59 => ArrayLen,
            0x5A => MapHas,
            0x5B => IterInit,
            0x5C => IterNext,
            0x5D => IterKey,
            0x5E => IterValue,
            0x60 => NewObject,
            0x61 => GetField,
            0x62 => SetField,
            0x63 => GetStatic,
            0x64 => SetStatic,
            0x65 => Call,
            0x66 => TailCall,
            0x67 => CallMethod,
            0x68 => CallStatic,
            0x69 => Closure,
            0x70 => CheckType,
            0x71 => Cast,
            0x72 => CastSafe,
            0x80 => Throw,
            0x81 => Rethrow,
            0x82 => EnterTry,
            0x83 => LeaveTry,
            0x84 => EnterCatch,
            0x85 => EnterFinally,
            0x86 => LeaveFinally,
            0x90 => DebugPrint,
            0x91 => Unset,
            _ => return None,
        })
    }

    /// Convert opcode to byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the mnemonic of this opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::One => "ONE",
            Self::Null => "NULL",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::LoadGlobal => "LOAD_GLOBAL",
            Self::StoreGlobal => "STORE_GLOBAL",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Neg => "NEG",
            Self::Not => "NOT",
            Self::BitNot => "BITNOT",
            Self::BitAnd => "BITAND",
            Self::BitOr => "BITOR",
            Self::BitXor => "BITXOR",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Concat => "CONCAT",
            Self::Jump => "JUMP",
            Self::JumpIfFalse => "JUMP_IF_FALSE",
            Self::Loop => "LOOP",
            Self::Return => "RETURN",
            Self::ReturnNull => "RETURN_NULL",
            Self::NewArray => "NEW_ARRAY",
            Self::NewFixedArray => "NEW_FIXED_ARRAY",
            Self::NewBytes => "NEW_BYTES",
            Self::NewMap => "NEW_MAP",
            Self::NewSuperArray => "NEW_SUPERARRAY",
            Self::ArrayGet => "ARRAY_GET",
            Self::ArrayGetUnchecked => "ARRAY_GET_UNCHECKED",
            Self::ArraySet => "ARRAY_SET",
            Self::ArrayPush => "ARRAY_PUSH",
            Self::ArrayLen => "ARRAY_LEN",
            Self::MapHas => "MAP_HAS",
            Self::IterInit => "ITER_INIT",
            Self::IterNext => "ITER_NEXT",
            Self::IterKey => "ITER_KEY",
            Self::IterValue => "ITER_VALUE",
            Self::NewObject => "NEW_OBJECT",
            Self::GetField => "GET_FIELD",
            Self::SetField => "SET_FIELD",
            Self::GetStatic => "GET_STATIC",
            Self::SetStatic => "SET_STATIC",
            Self::Call => "CALL",
            Self::TailCall => "TAIL_CALL",
            Self::CallMethod => "CALL_METHOD",
            Self::CallStatic => "CALL_STATIC",
            Self::Closure => "CLOSURE",
            Self::CheckType => "CHECK_TYPE",
            Self::Cast => "CAST",
            Self::CastSafe => "CAST_SAFE",
            Self::Throw => "THROW",
            Self::Rethrow => "RETHROW",
            Self::EnterTry => "ENTER_TRY",
            Self::LeaveTry => "LEAVE_TRY",
            Self::EnterCatch => "ENTER_CATCH",
            Self::EnterFinally => "ENTER_FINALLY",
            Self::LeaveFinally => "LEAVE_FINALLY",
            Self::DebugPrint => "DEBUG_PRINT",
            Self::Unset => "UNSET",
        }
    }

    /// Operand layout following the opcode byte
    pub fn operands(self) -> Operands {
        match self {
            Self::Push
            | Self::LoadLocal
            | Self::StoreLocal
            | Self::LoadGlobal
            | Self::StoreGlobal
            | Self::Jump
            | Self::JumpIfFalse
            | Self::Loop
            | Self::NewArray
            | Self::NewBytes
            | Self::NewMap
            | Self::NewSuperArray
            | Self::NewObject
            | Self::GetField
            | Self::SetField
            | Self::Closure
            | Self::CheckType
            | Self::Cast
            | Self::CastSafe
            | Self::EnterCatch => Operands::U16,
            Self::Call | Self::TailCall => Operands::U8,
            Self::NewFixedArray | Self::GetStatic | Self::SetStatic => Operands::U16U16,
            Self::CallMethod => Operands::U16U8,
            Self::CallStatic => Operands::U16U16U8,
            Self::EnterTry => Operands::TryTable,
            _ => Operands::None,
        }
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIfFalse | Self::Loop)
    }

    /// Check if this opcode is a call instruction
    pub fn is_call(self) -> bool {
        matches!(
            self,
            Self::Call | Self::TailCall | Self::CallMethod | Self::CallStatic
        )
    }

    /// Check if this opcode is a return instruction
    pub fn is_return(self) -> bool {
        matches!(self, Self::Return | Self::ReturnNull | Self::TailCall)
    }

    /// Net operand-stack effect, when it does not depend on operands
    pub fn stack_effect(self) -> Option<i32> {
        Some(match self {
            Self::Push | Self::Dup | Self::One | Self::Null | Self::True | Self::False => 1,
            Self::LoadLocal | Self::LoadGlobal | Self::NewObject | Self::GetStatic => 1,
            Self::IterNext | Self::IterKey | Self::IterValue | Self::CheckType => 1,
            Self::Pop | Self::Throw | Self::DebugPrint => -1,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod => -1,
            Self::BitAnd | Self::BitOr | Self::BitXor | Self::Shl | Self::Shr => -1,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Concat => -1,
            Self::ArrayGet | Self::ArrayGetUnchecked | Self::ArrayPush | Self::MapHas => -1,
            Self::SetField => -1,
            Self::ArraySet | Self::Unset => -2,
            _ => return None,
        })
    }
}
