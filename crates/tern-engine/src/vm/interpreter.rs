// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode interpreter.

use std::cmp::Ordering;
use std::io::{self, Write};

use rustc_hash::FxHashMap;

use super::{Frame, VmConfig};
use crate::builtins::{self, Builtin, BuiltinContext};
use crate::compiler::{Bytecode, Instruction, OpCode, Operand};
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::runtime::Value;

type StepResult<T = ()> = Result<T, RuntimeErrorKind>;

/// What the loop does after an instruction.
enum Flow {
    Continue,
    Halt,
}

/// The virtual machine.
///
/// User calls push an explicit [`Frame`] rather than recursing on the host
/// stack, so recursion depth is bounded only by [`VmConfig::max_frames`].
pub struct VM {
    /// The value stack
    stack: Vec<Value>,
    /// Local slots of every active frame, addressed by frame base + slot
    locals: Vec<Value>,
    /// Global slots
    globals: Vec<Value>,
    /// Instruction pointer
    ip: usize,
    /// Active call frames
    frames: Vec<Frame>,
    builtins: FxHashMap<&'static str, Builtin>,
    config: VmConfig,
    out: Box<dyn Write>,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    /// Creates a VM with default limits that prints to stdout.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Creates a VM with the given limits that prints to stdout.
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            stack: Vec::with_capacity(256),
            locals: Vec::with_capacity(64),
            globals: Vec::new(),
            ip: 0,
            frames: Vec::with_capacity(64),
            builtins: builtins::register_builtins(),
            config,
            out: Box::new(io::stdout()),
        }
    }

    /// Redirects builtin output.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// Returns the active limits.
    pub fn config(&self) -> VmConfig {
        self.config
    }

    /// Returns the global slots as they are after the last run.
    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Executes a program from its first instruction with fresh globals.
    pub fn execute(&mut self, bytecode: &Bytecode) -> Result<Value, RuntimeError> {
        self.globals.clear();
        self.run_from(bytecode, 0)
    }

    /// Executes starting at `start`, keeping globals from earlier runs.
    ///
    /// Returns the value left on the stack by the program, or `undefined`.
    pub fn run_from(&mut self, bytecode: &Bytecode, start: usize) -> Result<Value, RuntimeError> {
        self.ip = start;
        self.stack.clear();
        self.locals.clear();
        self.frames.clear();
        if self.globals.len() < bytecode.globals {
            self.globals.resize(bytecode.globals, Value::Undefined);
        }

        tracing::debug!("Running from instruction {}", start);
        let result = self.run(bytecode);
        let flushed = self.out.flush();

        match result {
            Ok(value) => {
                flushed.map_err(|e| RuntimeError::new(RuntimeErrorKind::Output(e.to_string()), None))?;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!("Execution halted: {}", err);
                self.stack.clear();
                self.locals.clear();
                self.frames.clear();
                Err(err)
            }
        }
    }

    fn run(&mut self, bytecode: &Bytecode) -> Result<Value, RuntimeError> {
        while let Some(instruction) = bytecode.instructions.get(self.ip) {
            tracing::trace!("{:04} {}", self.ip, instruction);
            self.ip += 1;

            match self.step(bytecode, instruction) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => break,
                Err(kind) => return Err(RuntimeError::new(kind, Some(instruction.pos))),
            }
        }

        Ok(self.stack.pop().unwrap_or_default())
    }

    fn step(&mut self, bytecode: &Bytecode, instruction: &Instruction) -> StepResult<Flow> {
        match instruction.opcode {
            OpCode::Halt => return Ok(Flow::Halt),

            OpCode::LoadConst => {
                let index = constant_operand(instruction)?;
                let value = bytecode.constants.get(index).cloned().ok_or_else(|| {
                    RuntimeErrorKind::Internal(format!("constant {} out of range", index))
                })?;
                self.push(value)?;
            }
            OpCode::LoadUndefined => self.push(Value::Undefined)?,
            OpCode::LoadTrue => self.push(Value::Boolean(true))?,
            OpCode::LoadFalse => self.push(Value::Boolean(false))?,

            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let top = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or(RuntimeErrorKind::StackUnderflow)?;
                self.push(top)?;
            }

            // Arithmetic
            OpCode::Add => self.binary_add()?,
            OpCode::Sub => self.binary_num_op("-", |a, b| Ok(a - b))?,
            OpCode::Mul => self.binary_num_op("*", |a, b| Ok(a * b))?,
            OpCode::Div => self.binary_num_op("/", |a, b| {
                if b == 0.0 {
                    Err(RuntimeErrorKind::DivisionByZero)
                } else {
                    Ok(a / b)
                }
            })?,
            OpCode::Mod => self.binary_num_op("%", |a, b| {
                if b == 0.0 {
                    Err(RuntimeErrorKind::DivisionByZero)
                } else {
                    Ok(a % b)
                }
            })?,
            OpCode::Pow => self.binary_num_op("**", |a, b| Ok(a.powf(b)))?,
            OpCode::Neg => self.unary_num_op("-", |n| -n)?,
            OpCode::Inc => self.unary_num_op("++", |n| n + 1.0)?,
            OpCode::Dec => self.unary_num_op("--", |n| n - 1.0)?,

            // Comparison
            OpCode::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a == b))?;
            }
            OpCode::Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a != b))?;
            }
            OpCode::Lt => self.compare_op("<", |o| o == Ordering::Less)?,
            OpCode::Le => self.compare_op("<=", |o| o != Ordering::Greater)?,
            OpCode::Gt => self.compare_op(">", |o| o == Ordering::Greater)?,
            OpCode::Ge => self.compare_op(">=", |o| o != Ordering::Less)?,

            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Boolean(!value.is_truthy()))?;
            }

            // Variables
            OpCode::LoadLocal => {
                let index = self.local_index(slot_operand(instruction)?)?;
                let value = self.locals[index].clone();
                self.push(value)?;
            }
            OpCode::StoreLocal => {
                let index = self.local_index(slot_operand(instruction)?)?;
                self.locals[index] = self.pop()?;
            }
            OpCode::LoadGlobal => {
                let index = self.global_index(slot_operand(instruction)?)?;
                let value = self.globals[index].clone();
                self.push(value)?;
            }
            OpCode::StoreGlobal => {
                let index = self.global_index(slot_operand(instruction)?)?;
                self.globals[index] = self.pop()?;
            }

            // Control flow
            OpCode::Jump => {
                self.ip = jump_operand(instruction, bytecode)?;
            }
            OpCode::JumpIfFalse => {
                let target = jump_operand(instruction, bytecode)?;
                if !self.pop()?.is_truthy() {
                    self.ip = target;
                }
            }
            OpCode::JumpIfTrue => {
                let target = jump_operand(instruction, bytecode)?;
                if self.pop()?.is_truthy() {
                    self.ip = target;
                }
            }

            // Functions
            OpCode::Call => {
                let Some(Operand::Call { function, argc }) = instruction.operand else {
                    return Err(malformed(instruction));
                };
                self.call(bytecode, function, argc as usize)?;
            }
            OpCode::CallBuiltin => {
                let Some(Operand::Builtin { name, argc }) = instruction.operand else {
                    return Err(malformed(instruction));
                };
                self.call_builtin(bytecode, name as usize, argc as usize)?;
            }
            OpCode::Return => {
                let value = self.pop()?;
                let frame = self.frames.pop().ok_or_else(|| {
                    RuntimeErrorKind::Internal("return outside of a function".into())
                })?;
                if let Some(info) = bytecode.functions.get(frame.function as usize) {
                    tracing::trace!("Return from {} to {:04}", info.name, frame.return_ip);
                }
                self.locals.truncate(frame.base);
                self.stack.truncate(frame.stack_mark);
                self.ip = frame.return_ip;
                self.push(value)?;
            }
        }

        Ok(Flow::Continue)
    }

    fn call(&mut self, bytecode: &Bytecode, function: u32, argc: usize) -> StepResult {
        let info = bytecode.functions.get(function as usize).ok_or_else(|| {
            RuntimeErrorKind::Internal(format!("unknown function id {}", function))
        })?;

        if argc != info.arity {
            return Err(RuntimeErrorKind::ArityMismatch {
                function: info.name.clone(),
                expected: info.arity,
                found: argc,
            });
        }
        if self.frames.len() >= self.config.max_frames {
            return Err(RuntimeErrorKind::StackOverflow {
                limit: self.config.max_frames,
            });
        }

        let args = self.pop_args(argc)?;
        let base = self.locals.len();
        self.locals.extend(args);
        self.locals
            .resize(base + info.local_count.max(argc), Value::Undefined);

        self.frames.push(Frame {
            function,
            return_ip: self.ip,
            base,
            stack_mark: self.stack.len(),
        });
        tracing::trace!("Call {} at depth {}", info.name, self.frames.len());
        self.ip = info.entry;
        Ok(())
    }

    fn call_builtin(&mut self, bytecode: &Bytecode, name: usize, argc: usize) -> StepResult {
        let name = match bytecode.constants.get(name) {
            Some(Value::String(name)) => name.as_str(),
            _ => {
                return Err(RuntimeErrorKind::Internal(format!(
                    "builtin name constant {} is not a string",
                    name
                )));
            }
        };
        let builtin = *self
            .builtins
            .get(name)
            .ok_or_else(|| RuntimeErrorKind::UnknownBuiltin(name.to_string()))?;

        if argc != builtin.arity {
            return Err(RuntimeErrorKind::ArityMismatch {
                function: builtin.name.to_string(),
                expected: builtin.arity,
                found: argc,
            });
        }

        let args = self.pop_args(argc)?;
        let mut ctx = BuiltinContext {
            out: self.out.as_mut(),
        };
        let result = (builtin.func)(&mut ctx, &args)?;
        self.push(result)
    }

    // ========================================================================
    // Stack helpers
    // ========================================================================

    fn push(&mut self, value: Value) -> StepResult {
        if self.stack.len() >= self.config.max_stack {
            return Err(RuntimeErrorKind::StackOverflow {
                limit: self.config.max_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> StepResult<Value> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    /// Pops `argc` values, returning them in push order.
    fn pop_args(&mut self, argc: usize) -> StepResult<Vec<Value>> {
        let floor = self.frames.last().map_or(0, |f| f.stack_mark);
        if self.stack.len() < floor + argc {
            return Err(RuntimeErrorKind::StackUnderflow);
        }
        Ok(self.stack.split_off(self.stack.len() - argc))
    }

    fn local_index(&self, slot: usize) -> StepResult<usize> {
        let base = self.frames.last().map(|f| f.base).ok_or_else(|| {
            RuntimeErrorKind::Internal("local slot access outside of a function".into())
        })?;
        let len = self.locals.len() - base;
        if slot >= len {
            return Err(RuntimeErrorKind::SlotOutOfRange { slot, len });
        }
        Ok(base + slot)
    }

    fn global_index(&self, slot: usize) -> StepResult<usize> {
        if slot >= self.globals.len() {
            return Err(RuntimeErrorKind::SlotOutOfRange {
                slot,
                len: self.globals.len(),
            });
        }
        Ok(slot)
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn binary_add(&mut self) -> StepResult {
        let b = self.pop()?;
        let a = self.pop()?;

        let result = match (&a, &b) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::String(_), _) | (_, Value::String(_)) => Value::String(format!("{}{}", a, b)),
            _ => return Err(type_error("+", &a, &b)),
        };

        self.push(result)
    }

    fn binary_num_op<F>(&mut self, symbol: &str, op: F) -> StepResult
    where
        F: Fn(f64, f64) -> StepResult<f64>,
    {
        let b = self.pop()?;
        let a = self.pop()?;

        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => {
                let result = op(*x, *y)?;
                self.push(Value::Number(result))
            }
            _ => Err(type_error(symbol, &a, &b)),
        }
    }

    fn unary_num_op<F>(&mut self, symbol: &str, op: F) -> StepResult
    where
        F: Fn(f64) -> f64,
    {
        match self.pop()? {
            Value::Number(n) => self.push(Value::Number(op(n))),
            other => Err(RuntimeErrorKind::TypeError(format!(
                "cannot apply '{}' to {}",
                symbol,
                other.type_name()
            ))),
        }
    }

    fn compare_op<F>(&mut self, symbol: &str, test: F) -> StepResult
    where
        F: Fn(Ordering) -> bool,
    {
        let b = self.pop()?;
        let a = self.pop()?;

        let ordering = match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => return Err(type_error(symbol, &a, &b)),
        };

        // NaN is unordered, so every comparison with it is false
        let result = ordering.is_some_and(test);
        self.push(Value::Boolean(result))
    }
}

fn type_error(symbol: &str, a: &Value, b: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::TypeError(format!(
        "cannot apply '{}' to {} and {}",
        symbol,
        a.type_name(),
        b.type_name()
    ))
}

fn malformed(instruction: &Instruction) -> RuntimeErrorKind {
    RuntimeErrorKind::Internal(format!("malformed instruction {}", instruction))
}

fn constant_operand(instruction: &Instruction) -> StepResult<usize> {
    match instruction.operand {
        Some(Operand::Constant(index)) => Ok(index as usize),
        _ => Err(malformed(instruction)),
    }
}

fn slot_operand(instruction: &Instruction) -> StepResult<usize> {
    match instruction.operand {
        Some(Operand::Slot(slot)) => Ok(slot as usize),
        _ => Err(malformed(instruction)),
    }
}

fn jump_operand(instruction: &Instruction, bytecode: &Bytecode) -> StepResult<usize> {
    match instruction.operand {
        Some(Operand::Jump(target)) if (target as usize) <= bytecode.instructions.len() => {
            Ok(target as usize)
        }
        Some(Operand::Jump(target)) => Err(RuntimeErrorKind::Internal(format!(
            "jump target {} out of range",
            target
        ))),
        _ => Err(malformed(instruction)),
    }
}
