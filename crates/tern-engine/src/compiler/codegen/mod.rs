// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from AST to bytecode.
//!
//! This module contains the `Compiler` which lowers an analyzed [`Program`]
//! into a flat instruction sequence in one recursive pass. Forward jumps are
//! emitted with a placeholder target and patched once the target is known.

mod scope;


pub use scope::{Binding, Local, Scope};

use crate::ast::{Literal, Node, NodeKind, Operator, Program};
use crate::builtins;
use crate::compiler::bytecode::{
    Bytecode, FunctionInfo, Instruction, OpCode, Operand, UNPATCHED,
};
use crate::error::CompileError;
use crate::lexer::Position;
use crate::runtime::Value;

type CompileResult<T = ()> = Result<T, CompileError>;

/// Compiles AST to bytecode.
///
/// A compiler can be fed several programs in turn. Each one is appended to
/// the same bytecode and sees the globals and functions declared by the
/// earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    /// The bytecode being generated
    pub bytecode: Bytecode,
    /// Current scope for variable resolution
    pub scope: Scope,
}

impl Compiler {
    /// Creates a new compiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a program and returns the index of its first instruction.
    ///
    /// The value of a trailing expression statement is left on the stack as
    /// the program's result.
    pub fn compile(&mut self, program: &Program) -> CompileResult<usize> {
        let start = self.bytecode.instructions.len();

        let last = program.body.len().checked_sub(1);
        for (index, statement) in program.body.iter().enumerate() {
            if Some(index) == last && statement.is_expression() {
                self.compile_expression(statement)?;
            } else {
                self.compile_statement(statement)?;
            }
        }

        let end = program.body.last().map_or(Position::default(), |s| s.pos);
        self.emit(Instruction::simple(OpCode::Halt).at(end));
        self.bytecode.globals = self.scope.global_count();

        self.finish(start)?;
        tracing::debug!(
            "Compiled {} instructions starting at {}",
            self.bytecode.instructions.len() - start,
            start
        );
        Ok(start)
    }

    /// Returns the bytecode generated so far.
    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    /// Consumes the compiler, returning its bytecode.
    pub fn into_bytecode(self) -> Bytecode {
        self.bytecode
    }

    /// Checks that every jump emitted since `start` has a valid target.
    fn finish(&self, start: usize) -> CompileResult {
        let len = self.bytecode.instructions.len();
        for instruction in &self.bytecode.instructions[start..] {
            if !instruction.opcode.is_jump() {
                continue;
            }
            match instruction.jump_target() {
                Some(UNPATCHED) => {
                    return Err(CompileError::internal("unresolved jump", instruction.pos));
                }
                Some(target) if (target as usize) < len => {}
                Some(target) => {
                    return Err(CompileError::internal(
                        format!("jump target {} out of range", target),
                        instruction.pos,
                    ));
                }
                None => {
                    return Err(CompileError::internal(
                        format!("{} without a target", instruction.opcode),
                        instruction.pos,
                    ));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.bytecode.emit(instruction)
    }

    fn emit_jump(&mut self, opcode: OpCode, pos: Position) -> usize {
        self.emit(Instruction::with_operand(opcode, Operand::Jump(UNPATCHED)).at(pos))
    }

    /// Points the jump at `index` to the next instruction to be emitted.
    fn patch_jump(&mut self, index: usize) {
        let target = self.bytecode.instructions.len() as u32;
        if let Some(instruction) = self.bytecode.instructions.get_mut(index) {
            instruction.operand = Some(Operand::Jump(target));
        }
    }

    fn emit_jump_to(&mut self, opcode: OpCode, target: usize, pos: Position) {
        self.emit(Instruction::with_operand(opcode, Operand::Jump(target as u32)).at(pos));
    }

    fn emit_constant(&mut self, value: Value, pos: Position) {
        let index = self.bytecode.add_constant(value);
        self.emit(Instruction::with_operand(OpCode::LoadConst, Operand::Constant(index)).at(pos));
    }

    fn emit_load(&mut self, name: &str, pos: Position) -> CompileResult {
        let instruction = match self.scope.resolve(name) {
            Some(Binding::Global(slot)) => {
                Instruction::with_operand(OpCode::LoadGlobal, Operand::Slot(slot))
            }
            Some(Binding::Local(slot)) => {
                Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(slot))
            }
            Some(Binding::Function(_)) => {
                return Err(CompileError::internal(
                    format!("function '{}' used as a value", name),
                    pos,
                ));
            }
            None => {
                return Err(CompileError::internal(
                    format!("unresolved name '{}'", name),
                    pos,
                ));
            }
        };
        self.emit(instruction.at(pos));
        Ok(())
    }

    fn emit_store(&mut self, name: &str, pos: Position) -> CompileResult {
        match self.scope.resolve(name) {
            Some(binding) => self.emit_store_binding(binding, name, pos),
            None => Err(CompileError::internal(
                format!("unresolved name '{}'", name),
                pos,
            )),
        }
    }

    fn emit_store_binding(&mut self, binding: Binding, name: &str, pos: Position) -> CompileResult {
        let instruction = match binding {
            Binding::Global(slot) => {
                Instruction::with_operand(OpCode::StoreGlobal, Operand::Slot(slot))
            }
            Binding::Local(slot) => {
                Instruction::with_operand(OpCode::StoreLocal, Operand::Slot(slot))
            }
            Binding::Function(_) => {
                return Err(CompileError::internal(
                    format!("cannot assign to function '{}'", name),
                    pos,
                ));
            }
        };
        self.emit(instruction.at(pos));
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn compile_statement(&mut self, node: &Node) -> CompileResult {
        let pos = node.pos;
        match &node.kind {
            NodeKind::VarDeclaration(declarators) => {
                for declarator in declarators {
                    self.compile_declarator(declarator)?;
                }
                Ok(())
            }
            NodeKind::Declarator { .. } => self.compile_declarator(node),
            NodeKind::FuncDeclaration {
                ident,
                params,
                block,
            } => self.compile_function(ident, params.as_deref(), block, pos),
            NodeKind::Block(statements) => {
                self.scope.begin_scope();
                for statement in statements {
                    self.compile_statement(statement)?;
                }
                self.scope.end_scope();
                Ok(())
            }
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => self.compile_if(test, consequent, alternate.as_deref(), pos),
            NodeKind::While { test, block } => self.compile_while(test, block, pos),
            NodeKind::DoWhile { block, test } => self.compile_do_while(block, test, pos),
            NodeKind::For {
                init,
                test,
                update,
                block,
            } => self.compile_for(
                init.as_deref(),
                test.as_deref(),
                update.as_deref(),
                block,
                pos,
            ),
            NodeKind::Return(argument) => {
                match argument {
                    Some(argument) => self.compile_expression(argument)?,
                    None => {
                        self.emit(Instruction::simple(OpCode::LoadUndefined).at(pos));
                    }
                }
                self.emit(Instruction::simple(OpCode::Return).at(pos));
                Ok(())
            }
            NodeKind::Args(_) => Err(CompileError::internal(
                "parameter list in statement position",
                pos,
            )),
            NodeKind::Literal(_)
            | NodeKind::Ident(_)
            | NodeKind::BinaryExpr { .. }
            | NodeKind::UnaryExpr { .. }
            | NodeKind::Call { .. } => {
                self.compile_expression(node)?;
                self.emit(Instruction::simple(OpCode::Pop).at(pos));
                Ok(())
            }
        }
    }

    fn compile_declarator(&mut self, node: &Node) -> CompileResult {
        let NodeKind::Declarator { ident, init } = &node.kind else {
            return Err(CompileError::internal("expected a declarator", node.pos));
        };
        let name = ident
            .ident_name()
            .ok_or_else(|| CompileError::internal("declared name is not an identifier", ident.pos))?;

        match init {
            Some(init) => self.compile_expression(init)?,
            None => {
                self.emit(Instruction::simple(OpCode::LoadUndefined).at(node.pos));
            }
        }

        // Declared after the initializer so it cannot refer to itself
        let binding = self.scope.declare_variable(name);
        self.emit_store_binding(binding, name, node.pos)
    }

    fn compile_function(
        &mut self,
        ident: &Node,
        params: Option<&Node>,
        block: &Node,
        pos: Position,
    ) -> CompileResult {
        let name = ident
            .ident_name()
            .ok_or_else(|| CompileError::internal("function name is not an identifier", ident.pos))?;

        let params: Vec<&str> = match params.map(|p| &p.kind) {
            None => Vec::new(),
            Some(NodeKind::Args(names)) => names
                .iter()
                .map(|p| {
                    p.ident_name().ok_or_else(|| {
                        CompileError::internal("parameter is not an identifier", p.pos)
                    })
                })
                .collect::<CompileResult<_>>()?,
            Some(_) => return Err(CompileError::internal("malformed parameter list", pos)),
        };
        let NodeKind::Block(body) = &block.kind else {
            return Err(CompileError::internal("function body is not a block", block.pos));
        };

        // Straight-line execution skips over the body
        let jump_over = self.emit_jump(OpCode::Jump, pos);
        let entry = self.bytecode.instructions.len();

        // Registered before the body is compiled so the body can recurse
        let id = self.bytecode.add_function(FunctionInfo {
            name: name.to_string(),
            entry,
            arity: params.len(),
            local_count: 0,
        });
        self.scope.declare_function(name, id);

        self.scope.begin_function();
        for param in &params {
            self.scope.declare_variable(param);
        }
        for statement in body {
            self.compile_statement(statement)?;
        }
        if !matches!(body.last().map(|s| &s.kind), Some(NodeKind::Return(_))) {
            self.emit(Instruction::simple(OpCode::LoadUndefined).at(block.pos));
            self.emit(Instruction::simple(OpCode::Return).at(block.pos));
        }
        let local_count = self.scope.end_function();

        if let Some(info) = self.bytecode.functions.get_mut(id as usize) {
            info.local_count = local_count;
        }
        self.patch_jump(jump_over);

        tracing::trace!(
            "Compiled function {} (id {}, entry {}, {} locals)",
            name,
            id,
            entry,
            local_count
        );
        Ok(())
    }

    fn compile_if(
        &mut self,
        test: &Node,
        consequent: &Node,
        alternate: Option<&Node>,
        pos: Position,
    ) -> CompileResult {
        self.compile_expression(test)?;

        // Jump to else/end if false
        let jump_to_else = self.emit_jump(OpCode::JumpIfFalse, pos);
        self.compile_statement(consequent)?;

        match alternate {
            Some(alternate) => {
                let jump_to_end = self.emit_jump(OpCode::Jump, pos);
                self.patch_jump(jump_to_else);
                self.compile_statement(alternate)?;
                self.patch_jump(jump_to_end);
            }
            None => self.patch_jump(jump_to_else),
        }

        Ok(())
    }

    fn compile_while(&mut self, test: &Node, block: &Node, pos: Position) -> CompileResult {
        let loop_start = self.bytecode.instructions.len();

        self.compile_expression(test)?;
        let jump_to_end = self.emit_jump(OpCode::JumpIfFalse, pos);

        self.compile_statement(block)?;
        self.emit_jump_to(OpCode::Jump, loop_start, pos);

        self.patch_jump(jump_to_end);
        Ok(())
    }

    fn compile_do_while(&mut self, block: &Node, test: &Node, pos: Position) -> CompileResult {
        let loop_start = self.bytecode.instructions.len();

        // The body runs once before the first test
        self.compile_statement(block)?;
        self.compile_expression(test)?;
        self.emit_jump_to(OpCode::JumpIfTrue, loop_start, pos);

        Ok(())
    }

    fn compile_for(
        &mut self,
        init: Option<&Node>,
        test: Option<&Node>,
        update: Option<&Node>,
        block: &Node,
        pos: Position,
    ) -> CompileResult {
        // Names declared in the header belong to the loop
        self.scope.begin_scope();

        if let Some(init) = init {
            self.compile_statement(init)?;
        }

        let test_point = self.bytecode.instructions.len();
        let jump_to_end = match test {
            Some(test) => {
                self.compile_expression(test)?;
                Some(self.emit_jump(OpCode::JumpIfFalse, pos))
            }
            // No test means loop forever
            None => None,
        };

        self.compile_statement(block)?;

        if let Some(update) = update {
            self.compile_statement(update)?;
        }
        self.emit_jump_to(OpCode::Jump, test_point, pos);

        if let Some(jump) = jump_to_end {
            self.patch_jump(jump);
        }

        self.scope.end_scope();
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn compile_expression(&mut self, node: &Node) -> CompileResult {
        let pos = node.pos;
        match &node.kind {
            NodeKind::Literal(Literal::Number(n)) => self.emit_constant(Value::Number(*n), pos),
            NodeKind::Literal(Literal::String(s)) => {
                self.emit_constant(Value::String(s.clone()), pos)
            }
            NodeKind::Literal(Literal::Boolean(true)) => {
                self.emit(Instruction::simple(OpCode::LoadTrue).at(pos));
            }
            NodeKind::Literal(Literal::Boolean(false)) => {
                self.emit(Instruction::simple(OpCode::LoadFalse).at(pos));
            }
            NodeKind::Ident(name) => self.emit_load(name, pos)?,
            NodeKind::BinaryExpr { op, left, right } => {
                self.compile_binary(*op, left, right, pos)?
            }
            NodeKind::UnaryExpr {
                op,
                prefix,
                operand,
            } => {
                let operand = operand.as_deref().ok_or_else(|| {
                    CompileError::internal(format!("'{}' without an operand", op), pos)
                })?;
                self.compile_unary(*op, *prefix, operand, pos)?
            }
            NodeKind::Call { callee, args } => self.compile_call(callee, args, pos)?,
            _ => {
                return Err(CompileError::internal(
                    format!("'{}' is not an expression", node),
                    pos,
                ));
            }
        }
        Ok(())
    }

    fn compile_binary(
        &mut self,
        op: Operator,
        left: &Node,
        right: &Node,
        pos: Position,
    ) -> CompileResult {
        let opcode = match op {
            Operator::And => return self.compile_logical(OpCode::JumpIfFalse, left, right, pos),
            Operator::Or => return self.compile_logical(OpCode::JumpIfTrue, left, right, pos),
            Operator::Assign => return self.compile_assignment(left, right, pos),
            Operator::Add => OpCode::Add,
            Operator::Sub => OpCode::Sub,
            Operator::Mul => OpCode::Mul,
            Operator::Div => OpCode::Div,
            Operator::Mod => OpCode::Mod,
            Operator::Exp => OpCode::Pow,
            Operator::Eq => OpCode::Eq,
            Operator::Neq => OpCode::Ne,
            Operator::Lt => OpCode::Lt,
            Operator::Le => OpCode::Le,
            Operator::Gt => OpCode::Gt,
            Operator::Ge => OpCode::Ge,
            Operator::Incr | Operator::Decr | Operator::Not => {
                return Err(CompileError::internal(
                    format!("'{}' is not a binary operator", op),
                    pos,
                ));
            }
        };

        self.compile_expression(left)?;
        self.compile_expression(right)?;
        self.emit(Instruction::simple(opcode).at(pos));
        Ok(())
    }

    /// `&&` and `||`: the right side only runs when the left side does not
    /// already decide the result.
    fn compile_logical(
        &mut self,
        short_circuit: OpCode,
        left: &Node,
        right: &Node,
        pos: Position,
    ) -> CompileResult {
        self.compile_expression(left)?;

        // Keep the left value as the result if we skip the right side
        self.emit(Instruction::simple(OpCode::Dup).at(pos));
        let jump_to_end = self.emit_jump(short_circuit, pos);

        self.emit(Instruction::simple(OpCode::Pop).at(pos));
        self.compile_expression(right)?;

        self.patch_jump(jump_to_end);
        Ok(())
    }

    fn compile_assignment(&mut self, target: &Node, value: &Node, pos: Position) -> CompileResult {
        let name = target
            .ident_name()
            .ok_or_else(|| CompileError::internal("assignment target is not a name", target.pos))?;

        self.compile_expression(value)?;
        // The assigned value is also the expression's value
        self.emit(Instruction::simple(OpCode::Dup).at(pos));
        self.emit_store(name, pos)
    }

    fn compile_unary(
        &mut self,
        op: Operator,
        prefix: bool,
        operand: &Node,
        pos: Position,
    ) -> CompileResult {
        let update = match (op, prefix) {
            (Operator::Sub, true) | (Operator::Not, true) => {
                self.compile_expression(operand)?;
                let opcode = if op == Operator::Sub {
                    OpCode::Neg
                } else {
                    OpCode::Not
                };
                self.emit(Instruction::simple(opcode).at(pos));
                return Ok(());
            }
            (Operator::Incr, _) => OpCode::Inc,
            (Operator::Decr, _) => OpCode::Dec,
            _ => {
                return Err(CompileError::internal(
                    format!(
                        "'{}' is not a {} operator",
                        op,
                        if prefix { "prefix" } else { "postfix" }
                    ),
                    pos,
                ));
            }
        };

        let name = operand
            .ident_name()
            .ok_or_else(|| CompileError::internal("update target is not a name", operand.pos))?;

        self.emit_load(name, pos)?;
        if prefix {
            // ++x: the updated value is the result
            self.emit(Instruction::simple(update).at(pos));
            self.emit(Instruction::simple(OpCode::Dup).at(pos));
        } else {
            // x++: the old value is the result
            self.emit(Instruction::simple(OpCode::Dup).at(pos));
            self.emit(Instruction::simple(update).at(pos));
        }
        self.emit_store(name, pos)
    }

    fn compile_call(&mut self, callee: &Node, args: &[Node], pos: Position) -> CompileResult {
        let name = callee
            .ident_name()
            .ok_or_else(|| CompileError::internal("call target is not a name", callee.pos))?;
        let argc = u8::try_from(args.len()).map_err(|_| {
            CompileError::internal(format!("too many arguments in call to '{}'", name), pos)
        })?;

        for arg in args {
            self.compile_expression(arg)?;
        }

        let instruction = match self.scope.resolve(name) {
            Some(Binding::Function(function)) => {
                Instruction::with_operand(OpCode::Call, Operand::Call { function, argc })
            }
            _ if builtins::is_builtin(name) => {
                let name = self.bytecode.add_constant(Value::from(name));
                Instruction::with_operand(OpCode::CallBuiltin, Operand::Builtin { name, argc })
            }
            Some(_) => {
                return Err(CompileError::internal(
                    format!("'{}' is not a function", name),
                    pos,
                ));
            }
            None => {
                return Err(CompileError::internal(
                    format!("call to undeclared function '{}'", name),
                    pos,
                ));
            }
        };
        self.emit(instruction.at(pos));
        Ok(())
    }
}
