//! Single-pass code generation: walk the HIR once and append AT&T x86-64
//! text as it goes.
//!
//! Expressions evaluate into scratch registers that the consumer releases;
//! every function body gets exactly one frame reservation and one epilogue,
//! reached through a per-function exit label; all generated jump targets
//! come from one unit-wide monotonic counter, so they never collide across
//! functions.

use frontend::hir::{
  Basic, BinaryOp, Expression, Function, Statement, Type, Unit, VarId,
};

use crate::emit::Assembly;
use crate::error::CodegenError;
use crate::frame;
use crate::regs::{self, Register, RegisterAllocator, ARGUMENT_SLOTS};

/// Generated assembly plus the constructs that were skipped best-effort.
#[derive(Debug)]
pub struct GenOutput {
  pub assembly: String,
  pub diagnostics: Vec<CodegenError>,
}

/// Generate assembly for a whole unit.
pub fn generate(unit: &Unit) -> Result<GenOutput, CodegenError> {
  let mut codegen = Codegen {
    unit,
    regs: RegisterAllocator::new(),
    free_label: 0,
    diagnostics: Vec::new(),
    asm: Assembly::new(),
  };
  codegen.gen_unit()?;
  Ok(GenOutput {
    assembly: codegen.asm.finish(),
    diagnostics: codegen.diagnostics,
  })
}

/// A resolved assignable location. Exactly one storage kind per resolution.
#[derive(Debug)]
enum LValue {
  /// Plain frame slot.
  FrameDirect { offset: usize },
  /// Frame slot plus a scaled index held in a register.
  FrameIndexed { offset: usize, index: Register, scale: usize },
  /// A register already holding the address.
  Indirect(Register),
}

/// Fixed unit header: format strings and the printing helpers any program
/// may call.
const PREAMBLE: &str = concat!(
  "\t.text\n",
  ".LC0:\n",
  "\t.string \"%d\\n\"\n",
  ".LC1:\n",
  "\t.string \"%c\"\n",
  "print_int:\n",
  "\tpushq %rbp\n",
  "\tmovq %rsp, %rbp\n",
  "\tmovl %edi, %esi\n",
  "\tleaq .LC0(%rip), %rdi\n",
  "\txorl %eax, %eax\n",
  "\tcall printf@PLT\n",
  "\tmovq %rbp, %rsp\n",
  "\tpopq %rbp\n",
  "\tret\n",
  "print_char:\n",
  "\tpushq %rbp\n",
  "\tmovq %rsp, %rbp\n",
  "\tmovl %edi, %esi\n",
  "\tleaq .LC1(%rip), %rdi\n",
  "\txorl %eax, %eax\n",
  "\tcall printf@PLT\n",
  "\tmovq %rbp, %rsp\n",
  "\tpopq %rbp\n",
  "\tret\n",
);

struct Codegen<'u> {
  unit: &'u Unit,
  regs: RegisterAllocator,
  /// Monotonic label counter, shared by the whole unit.
  free_label: usize,
  diagnostics: Vec<CodegenError>,
  asm: Assembly,
}

impl<'u> Codegen<'u> {
  fn diagnose(&mut self, error: CodegenError) {
    self.diagnostics.push(error);
  }

  fn fresh_label(&mut self) -> usize {
    let label = self.free_label;
    self.free_label += 1;
    label
  }

  fn variable_size(&self, var: VarId) -> Result<usize, CodegenError> {
    frame::variable_size(self.unit, var)
  }

  fn gen_unit(&mut self) -> Result<(), CodegenError> {
    self.asm.raw(PREAMBLE);
    let unit = self.unit;
    for function in &unit.functions {
      if function.prototype {
        continue;
      }
      self.gen_function(function)?;
    }
    Ok(())
  }

  fn gen_function(&mut self, function: &'u Function) -> Result<(), CodegenError> {
    self.regs.release_all();

    let frame = frame::frame_size(self.unit, function.scope)?;

    self.asm.raw("\n");
    self.asm.ins(&format!(".globl {}", function.name));
    self.asm.label(&function.name);
    self.asm.ins("pushq %rbp");
    self.asm.ins("movq %rsp, %rbp");
    self.asm.ins(&format!("subq ${frame}, %rsp"));

    if function.params.len() > ARGUMENT_SLOTS {
      self.diagnose(CodegenError::ParameterOverflow {
        name: function.name.clone(),
        count: function.params.len(),
        slots: ARGUMENT_SLOTS,
      });
    }
    for (slot, &param) in function.params.iter().take(ARGUMENT_SLOTS).enumerate() {
      let size = self.variable_size(param)?;
      let offset = frame::frame_offset(self.unit, function.scope, param)?;
      self.asm.ins(&format!(
        "mov{} %{}, -{}(%rbp)",
        op_suffix(size),
        regs::argument_name(slot, size),
        offset
      ));
    }

    let unit = self.unit;
    for statement in &unit.scope(function.scope).statements {
      self.gen_statement(function, statement)?;
    }

    self.asm.label(&format!(".{}_exit", function.name));
    self.asm.ins("movq %rbp, %rsp");
    self.asm.ins("popq %rbp");
    self.asm.ins("ret");
    Ok(())
  }

  fn gen_statement(
    &mut self,
    function: &'u Function,
    statement: &'u Statement,
  ) -> Result<(), CodegenError> {
    let unit = self.unit;
    match statement {
      Statement::Compound(scope) => {
        // frame space was reserved at function entry; just emit the body
        for nested in &unit.scope(*scope).statements {
          self.gen_statement(function, nested)?;
        }
      }

      Statement::Goto(label) => {
        self.asm.ins(&format!("jmp .L{}_{}", function.name, label));
      }

      Statement::Label(name, scope) => {
        self.asm.label(&format!(".L{}_{}", function.name, name));
        for nested in &unit.scope(*scope).statements {
          self.gen_statement(function, nested)?;
        }
      }

      Statement::If { condition, success } => {
        let register = self.gen_value(function, condition)?;
        self
          .asm
          .ins(&format!("cmp{} $1, %{}", op_suffix(register.size), register.name()));
        self.regs.release(register);
        let end = self.fresh_label();
        self.asm.ins(&format!("jne .L{end}"));
        for nested in &unit.scope(*success).statements {
          self.gen_statement(function, nested)?;
        }
        self.asm.label(&format!(".L{end}"));
      }

      Statement::IfElse { condition, success, failure } => {
        let register = self.gen_value(function, condition)?;
        self
          .asm
          .ins(&format!("cmp{} $1, %{}", op_suffix(register.size), register.name()));
        self.regs.release(register);
        let else_label = self.fresh_label();
        let end = self.fresh_label();
        self.asm.ins(&format!("jne .L{else_label}"));
        for nested in &unit.scope(*success).statements {
          self.gen_statement(function, nested)?;
        }
        self.asm.ins(&format!("jmp .L{end}"));
        self.asm.label(&format!(".L{else_label}"));
        for nested in &unit.scope(*failure).statements {
          self.gen_statement(function, nested)?;
        }
        self.asm.label(&format!(".L{end}"));
      }

      Statement::Return(value) => {
        if let Some(value) = value {
          if let Some(register) = self.gen_expr(function, value)? {
            self.asm.ins(&format!(
              "mov{} %{}, %{}",
              op_suffix(register.size),
              register.name(),
              return_name(register.size)
            ));
            self.regs.release(register);
          }
        }
        // teardown lives in one place per function
        self.asm.ins(&format!("jmp .{}_exit", function.name));
      }

      Statement::Expression(expression) => {
        if let Some(register) = self.gen_expr(function, expression)? {
          self.regs.release(register);
        }
      }
    }
    Ok(())
  }

  /// Evaluate an expression that must produce a value. A void result is
  /// diagnosed and replaced with a fresh register so generation continues.
  fn gen_value(
    &mut self,
    function: &'u Function,
    expression: &'u Expression,
  ) -> Result<Register, CodegenError> {
    match self.gen_expr(function, expression)? {
      Some(register) => Ok(register),
      None => {
        self.diagnose(CodegenError::VoidValue);
        self.regs.allocate(4)
      }
    }
  }

  /// Evaluate `expression` into a scratch register the caller releases.
  /// Only a call to a void function yields `None`.
  fn gen_expr(
    &mut self,
    function: &'u Function,
    expression: &'u Expression,
  ) -> Result<Option<Register>, CodegenError> {
    match expression {
      Expression::Variable(var) => {
        let var = require(var, "variable")?;
        let size = self.variable_size(var)?;
        let offset = frame::frame_offset(self.unit, function.scope, var)?;
        let register = self.regs.allocate(size)?;
        self.asm.ins(&format!(
          "mov{} -{}(%rbp), %{}",
          op_suffix(size),
          offset,
          register.name()
        ));
        Ok(Some(register))
      }

      Expression::VariableIndex { base, index } => {
        let base = require(base, "variable")?;
        let (offset, scale) = self.indexed_slot(function, base)?;
        let register = self.regs.allocate(scale)?;
        let index_register = self.gen_value(function, index)?;
        self.move_index_to_rax(index_register);
        self.asm.ins(&format!(
          "mov{} -{}(%rbp,%rax,{}), %{}",
          op_suffix(scale),
          offset,
          scale,
          register.name()
        ));
        self.regs.release(index_register);
        Ok(Some(register))
      }

      Expression::AddressOf(operand) => match self.resolve_lvalue(function, operand)? {
        LValue::FrameDirect { offset } => {
          let register = self.regs.allocate(8)?;
          self
            .asm
            .ins(&format!("leaq -{}(%rbp), %{}", offset, register.name()));
          Ok(Some(register))
        }
        LValue::FrameIndexed { offset, index, scale } => {
          let register = self.regs.allocate(8)?;
          self.move_index_to_rax(index);
          self.asm.ins(&format!(
            "leaq -{}(%rbp,%rax,{}), %{}",
            offset,
            scale,
            register.name()
          ));
          self.regs.release(index);
          Ok(Some(register))
        }
        LValue::Indirect(register) => Ok(Some(register)),
      },

      Expression::Assign { target, value } => {
        let target = require(target, "variable")?;
        let register = self.gen_value(function, value)?;
        let size = self.variable_size(target)?;
        let offset = frame::frame_offset(self.unit, function.scope, target)?;
        if size == 4 || size == 8 {
          self.asm.ins(&format!(
            "mov{} %{}, -{}(%rbp)",
            op_suffix(size),
            regs::scratch_name(register.index, size),
            offset
          ));
        } else {
          self.diagnose(CodegenError::BadStoreWidth { size });
        }
        // the value is the expression's result, enabling chained assignment
        Ok(Some(register))
      }

      Expression::AssignIndex { target, index, value } => {
        let target = require(target, "variable")?;
        let register = self.gen_value(function, value)?;
        let index_register = self.gen_value(function, index)?;
        let (offset, scale) = self.indexed_slot(function, target)?;
        self.move_index_to_rax(index_register);
        self.asm.ins(&format!(
          "mov{} %{}, -{}(%rbp,%rax,{})",
          op_suffix(scale),
          regs::scratch_name(register.index, scale),
          offset,
          scale
        ));
        self.regs.release(index_register);
        Ok(Some(register))
      }

      Expression::Literal { text, ty } => {
        if matches!(ty, Type::Basic(Basic::F32)) {
          self.diagnose(CodegenError::FloatLiteral { text: text.clone() });
          return Ok(Some(self.regs.allocate(4)?));
        }
        let size = ty.byte_size().unwrap_or(4);
        let register = self.regs.allocate(size)?;
        self
          .asm
          .ins(&format!("mov{} ${}, %{}", op_suffix(size), text, register.name()));
        Ok(Some(register))
      }

      Expression::Call { callee, args } => self.gen_call(function, callee, args),

      Expression::Binary { op, left, right } => {
        let left_register = self.gen_value(function, left)?;
        let right_register = self.gen_value(function, right)?;
        self.gen_binary(*op, left_register, right_register);
        self.regs.release(right_register);
        Ok(Some(left_register))
      }
    }
  }

  fn gen_call(
    &mut self,
    function: &'u Function,
    callee: &Option<frontend::hir::FuncId>,
    args: &'u [Expression],
  ) -> Result<Option<Register>, CodegenError> {
    let unit = self.unit;
    let callee = unit.function(require(callee, "function")?);
    if args.len() > ARGUMENT_SLOTS {
      self.diagnose(CodegenError::ArgumentOverflow {
        name: callee.name.clone(),
        count: args.len(),
        slots: ARGUMENT_SLOTS,
      });
      return Ok(Some(self.regs.allocate(4)?));
    }

    // scratch registers are not preserved across calls, so anything live
    // is saved here and restored after; an odd push count gets one pad
    // slot to keep the callee's entry 16-byte aligned
    let saved = self.regs.live();
    for &index in &saved {
      self.asm.ins(&format!("pushq %{}", regs::scratch_name(index, 8)));
    }
    let padded = saved.len() % 2 == 1;
    if padded {
      self.asm.ins("subq $8, %rsp");
    }

    for (slot, argument) in args.iter().enumerate() {
      let register = self.gen_value(function, argument)?;
      self.asm.ins(&format!(
        "mov{} %{}, %{}",
        op_suffix(register.size),
        register.name(),
        regs::argument_name(slot, register.size)
      ));
      self.regs.release(register);
    }

    self.asm.ins(&format!("call {}", callee.name));

    if padded {
      self.asm.ins("addq $8, %rsp");
    }
    for &index in saved.iter().rev() {
      self.asm.ins(&format!("popq %{}", regs::scratch_name(index, 8)));
    }

    if callee.return_type.is_void() {
      return Ok(None);
    }
    let size = callee
      .return_type
      .byte_size()
      .ok_or_else(|| CodegenError::UnsizedType {
        ty: callee.return_type.clone(),
      })?;
    let register = self.regs.allocate(size)?;
    self.asm.ins(&format!(
      "mov{} %{}, %{}",
      op_suffix(size),
      return_name(size),
      register.name()
    ));
    Ok(Some(register))
  }

  /// Combine `right` into `left`; the caller releases `right`.
  fn gen_binary(&mut self, op: BinaryOp, left: Register, right: Register) {
    let suffix = op_suffix(left.size);
    let lhs = left.name();
    let rhs = regs::scratch_name(right.index, left.size);
    match op {
      BinaryOp::Add => self.asm.ins(&format!("add{suffix} %{rhs}, %{lhs}")),
      BinaryOp::Sub => self.asm.ins(&format!("sub{suffix} %{rhs}, %{lhs}")),
      BinaryOp::Mul => self.asm.ins(&format!("imul{suffix} %{rhs}, %{lhs}")),

      BinaryOp::Div => {
        // dividend goes through the accumulator, sign-extended into the
        // high half; the quotient comes back out of it
        self
          .asm
          .ins(&format!("mov{suffix} %{lhs}, %{}", return_name(left.size)));
        self.asm.ins(if left.size == 8 { "cqo" } else { "cdq" });
        self.asm.ins(&format!("idiv{suffix} %{rhs}"));
        self
          .asm
          .ins(&format!("mov{suffix} %{}, %{lhs}", return_name(left.size)));
      }

      BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
        self.asm.ins(&format!("cmp{suffix} %{rhs}, %{lhs}"));
        self
          .asm
          .ins(&format!("set{} %{}", condition_suffix(op), left.byte_name()));
        self
          .asm
          .ins(&format!("movzb{suffix} %{}, %{lhs}", left.byte_name()));
      }

      BinaryOp::And | BinaryOp::Or => {
        // contract: both operands were already evaluated eagerly; only the
        // 0/1 materialization branches over the computed values
        let decided = self.fresh_label();
        let end = self.fresh_label();
        let (jump, decided_value, fallthrough_value) = match op {
          BinaryOp::And => ("je", 0, 1),
          _ => ("jne", 1, 0),
        };
        self.asm.ins(&format!("cmp{suffix} $0, %{lhs}"));
        self.asm.ins(&format!("{jump} .L{decided}"));
        self.asm.ins(&format!("cmp{suffix} $0, %{rhs}"));
        self.asm.ins(&format!("{jump} .L{decided}"));
        self.asm.ins(&format!("mov{suffix} ${fallthrough_value}, %{lhs}"));
        self.asm.ins(&format!("jmp .L{end}"));
        self.asm.label(&format!(".L{decided}"));
        self.asm.ins(&format!("mov{suffix} ${decided_value}, %{lhs}"));
        self.asm.label(&format!(".L{end}"));
      }
    }
  }

  /// Resolve an expression to an assignable location.
  fn resolve_lvalue(
    &mut self,
    function: &'u Function,
    expression: &'u Expression,
  ) -> Result<LValue, CodegenError> {
    match expression {
      Expression::Variable(var) => {
        let var = require(var, "variable")?;
        let offset = frame::frame_offset(self.unit, function.scope, var)?;
        Ok(LValue::FrameDirect { offset })
      }
      Expression::VariableIndex { base, index } => {
        let base = require(base, "variable")?;
        let (offset, scale) = self.indexed_slot(function, base)?;
        let index = self.gen_value(function, index)?;
        Ok(LValue::FrameIndexed { offset, index, scale })
      }
      // anything else that evaluates to an address is reused as-is
      other => {
        let register = self.gen_value(function, other)?;
        Ok(LValue::Indirect(register))
      }
    }
  }

  /// Frame offset and element size for subscripting `var`. A size outside
  /// the hardware scales is diagnosed and falls back to 4 so emission can
  /// continue.
  fn indexed_slot(
    &mut self,
    function: &Function,
    var: VarId,
  ) -> Result<(usize, usize), CodegenError> {
    let offset = frame::frame_offset(self.unit, function.scope, var)?;
    let ty = &self.unit.variable(var).ty;
    let element = match ty {
      Type::Array { element, .. } => element.byte_size(),
      other => other.byte_size(),
    }
    .ok_or_else(|| CodegenError::UnsizedType { ty: ty.clone() })?;

    if matches!(element, 1 | 2 | 4 | 8) {
      Ok((offset, element))
    } else {
      self.diagnose(CodegenError::BadScale { size: element });
      Ok((offset, 4))
    }
  }

  /// Sign-extend an index register into `%rax` for scaled addressing.
  fn move_index_to_rax(&mut self, index: Register) {
    self.asm.ins(&format!("movl %{}, %eax", index.dword_name()));
    self.asm.ins("cltq");
  }
}

fn require<T: Copy>(reference: &Option<T>, what: &'static str) -> Result<T, CodegenError> {
  (*reference).ok_or(CodegenError::UnresolvedReference { what })
}

fn op_suffix(size: usize) -> &'static str {
  if size == 8 {
    "q"
  } else {
    "l"
  }
}

fn return_name(size: usize) -> &'static str {
  if size == 8 {
    "rax"
  } else {
    "eax"
  }
}

fn condition_suffix(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Lt => "l",
    BinaryOp::Gt => "g",
    BinaryOp::Le => "le",
    BinaryOp::Ge => "ge",
    BinaryOp::Eq => "e",
    BinaryOp::Ne => "ne",
    _ => unreachable!("not a comparison"),
  }
}
