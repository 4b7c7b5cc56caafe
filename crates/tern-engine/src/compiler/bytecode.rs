//! Bytecode definitions.

use std::fmt::{self, Write as _};

use rustc_hash::FxHashMap;

use crate::lexer::Position;
use crate::runtime::Value;

/// Placeholder target of a jump that has not been patched yet.
pub const UNPATCHED: u32 = u32::MAX;

/// A compiled program.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// The constant pool
    pub constants: Vec<Value>,
    /// The function table, indexed by function id
    pub functions: Vec<FunctionInfo>,
    /// Number of global slots the program uses
    pub globals: usize,
    function_ids: FxHashMap<String, u32>,
}

impl Bytecode {
    /// Creates a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Adds a constant and returns its index.
    pub fn add_constant(&mut self, value: Value) -> u32 {
        let index = self.constants.len();
        self.constants.push(value);
        index as u32
    }

    /// Adds a function to the table and returns its id.
    ///
    /// A later function with the same name takes over the name lookup; the
    /// earlier one stays callable by id.
    pub fn add_function(&mut self, info: FunctionInfo) -> u32 {
        let id = self.functions.len() as u32;
        self.function_ids.insert(info.name.clone(), id);
        self.functions.push(info);
        id
    }

    /// Looks up a function id by name.
    pub fn function_id(&self, name: &str) -> Option<u32> {
        self.function_ids.get(name).copied()
    }

    /// Looks up a function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.function_id(name)
            .and_then(|id| self.functions.get(id as usize))
    }

    /// Renders the instruction sequence one instruction per line, followed
    /// by the function table.
    ///
    /// ```text
    /// 0000  JUMP          -> 0009
    /// 0001  LOAD_LOCAL    0
    /// 0002  LOAD_CONST    0 (2)
    /// ```
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{}", self.describe(index, instruction));
        }
        if !self.functions.is_empty() {
            out.push_str("\nfunctions:\n");
            for (id, function) in self.functions.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {:<3}{:<16} entry={:04} arity={} locals={}",
                    id, function.name, function.entry, function.arity, function.local_count
                );
            }
        }
        out
    }

    fn describe(&self, index: usize, instruction: &Instruction) -> String {
        let operand = match instruction.operand {
            None => String::new(),
            Some(Operand::Constant(i)) => match self.constants.get(i as usize) {
                Some(Value::String(s)) => format!("{} (\"{}\")", i, s),
                Some(value) => format!("{} ({})", i, value),
                None => format!("{} (?)", i),
            },
            Some(Operand::Call { function, argc }) => {
                let name = self
                    .functions
                    .get(function as usize)
                    .map_or("?", |f| f.name.as_str());
                format!("{} ({}, {} args)", function, name, argc)
            }
            Some(Operand::Builtin { name, argc }) => match self.constants.get(name as usize) {
                Some(Value::String(s)) => format!("{} ({}, {} args)", name, s, argc),
                _ => format!("{} (?, {} args)", name, argc),
            },
            Some(other) => other.to_string(),
        };
        format!("{:04}  {:<14}{}", index, instruction.opcode.name(), operand)
            .trim_end()
            .to_string()
    }
}

/// An entry in the function table.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// Declared name
    pub name: String,
    /// Index of the first instruction of the body
    pub entry: usize,
    /// Number of parameters
    pub arity: usize,
    /// Number of local slots an activation needs, parameters included
    pub local_count: usize,
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
    /// Source position of the node the instruction was compiled from
    pub pos: Position,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
            pos: Position::default(),
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
            pos: Position::default(),
        }
    }

    /// Stamps the instruction with the position it was compiled from.
    pub fn at(mut self, pos: Position) -> Self {
        self.pos = pos;
        self
    }

    /// Returns the jump target if this is a jump instruction.
    pub fn jump_target(&self) -> Option<u32> {
        match self.operand {
            Some(Operand::Jump(target)) => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {}", self.opcode.name(), operand),
            None => f.write_str(self.opcode.name()),
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Constant pool index
    Constant(u32),
    /// Local or global slot
    Slot(u32),
    /// Absolute instruction index
    Jump(u32),
    /// Function id and argument count
    Call {
        /// Index into the function table
        function: u32,
        /// Number of arguments on the stack
        argc: u8,
    },
    /// Builtin name and argument count
    Builtin {
        /// Constant pool index of the builtin's name
        name: u32,
        /// Number of arguments on the stack
        argc: u8,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(i) | Operand::Slot(i) => write!(f, "{}", i),
            Operand::Jump(target) if *target == UNPATCHED => f.write_str("-> ????"),
            Operand::Jump(target) => write!(f, "-> {:04}", target),
            Operand::Call { function, argc } => write!(f, "{} ({} args)", function, argc),
            Operand::Builtin { name, argc } => write!(f, "{} ({} args)", name, argc),
        }
    }
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    /// Push a constant onto the stack
    LoadConst,
    /// Push undefined
    LoadUndefined,
    /// Push true
    LoadTrue,
    /// Push false
    LoadFalse,
    /// Pop the top value
    Pop,
    /// Duplicate the top value
    Dup,

    // Arithmetic operations
    /// Add top two values, concatenating if either is a string
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Modulo
    Mod,
    /// Exponentiation
    Pow,
    /// Negate (unary minus)
    Neg,
    /// Add one
    Inc,
    /// Subtract one
    Dec,

    // Comparison operations
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,

    // Logical operations
    /// Logical NOT
    Not,

    // Variable operations
    /// Load a local variable
    LoadLocal,
    /// Store to a local variable
    StoreLocal,
    /// Load a global variable
    LoadGlobal,
    /// Store to a global variable
    StoreGlobal,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Jump if false
    JumpIfFalse,
    /// Jump if true
    JumpIfTrue,

    // Function operations
    /// Call a user function
    Call,
    /// Call a builtin by name
    CallBuiltin,
    /// Return from function
    Return,

    // Special
    /// Halt execution
    Halt,
}

impl OpCode {
    /// Returns the mnemonic used in disassembly.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::LoadConst => "LOAD_CONST",
            OpCode::LoadUndefined => "LOAD_UNDEFINED",
            OpCode::LoadTrue => "LOAD_TRUE",
            OpCode::LoadFalse => "LOAD_FALSE",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Pow => "POW",
            OpCode::Neg => "NEG",
            OpCode::Inc => "INC",
            OpCode::Dec => "DEC",
            OpCode::Eq => "EQ",
            OpCode::Ne => "NE",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::Gt => "GT",
            OpCode::Ge => "GE",
            OpCode::Not => "NOT",
            OpCode::LoadLocal => "LOAD_LOCAL",
            OpCode::StoreLocal => "STORE_LOCAL",
            OpCode::LoadGlobal => "LOAD_GLOBAL",
            OpCode::StoreGlobal => "STORE_GLOBAL",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::Call => "CALL",
            OpCode::CallBuiltin => "CALL_BUILTIN",
            OpCode::Return => "RETURN",
            OpCode::Halt => "HALT",
        }
    }

    /// Returns true for the three jump opcodes.
    pub fn is_jump(&self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_returns_index() {
        let mut bytecode = Bytecode::new();
        assert_eq!(bytecode.emit(Instruction::simple(OpCode::LoadTrue)), 0);
        assert_eq!(bytecode.emit(Instruction::simple(OpCode::Halt)), 1);
    }

    #[test]
    fn test_function_lookup_by_name() {
        let mut bytecode = Bytecode::new();
        let id = bytecode.add_function(FunctionInfo {
            name: "f".into(),
            entry: 1,
            arity: 2,
            local_count: 3,
        });
        assert_eq!(bytecode.function_id("f"), Some(id));
        assert_eq!(bytecode.function("f").map(|f| f.arity), Some(2));
        assert_eq!(bytecode.function("g"), None);
    }

    #[test]
    fn test_disassemble_annotates_operands() {
        let mut bytecode = Bytecode::new();
        let five = bytecode.add_constant(Value::Number(5.0));
        let name = bytecode.add_constant(Value::from("logprint"));
        bytecode.emit(Instruction::with_operand(OpCode::LoadConst, Operand::Constant(five)));
        bytecode.emit(Instruction::with_operand(
            OpCode::CallBuiltin,
            Operand::Builtin { name, argc: 1 },
        ));
        bytecode.emit(Instruction::with_operand(OpCode::Jump, Operand::Jump(0)));
        bytecode.emit(Instruction::simple(OpCode::Halt));

        assert_eq!(
            bytecode.disassemble(),
            "0000  LOAD_CONST    0 (5)\n\
             0001  CALL_BUILTIN  1 (logprint, 1 args)\n\
             0002  JUMP          -> 0000\n\
             0003  HALT\n"
        );
    }

    #[test]
    fn test_instruction_display() {
        let jump = Instruction::with_operand(OpCode::JumpIfFalse, Operand::Jump(UNPATCHED));
        assert_eq!(jump.to_string(), "JUMP_IF_FALSE -> ????");
        assert_eq!(Instruction::simple(OpCode::Dup).to_string(), "DUP");
    }
}
