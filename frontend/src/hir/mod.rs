//! The resolved program representation produced by lowering and consumed by
//! the backend.
//!
//! Every `Scope`, `Variable`, and `Function` lives in an arena owned by the
//! `Unit`; nodes refer to each other through typed indices. In particular a
//! scope's `parent` link is a borrowed index, so name lookup can walk
//! outward without any owning back-pointer, and the tree stays acyclic for
//! ownership purposes. References that failed to resolve during lowering
//! are kept as `None` so the rest of the tree can still be built.

pub mod lower;
pub mod types;

pub use types::{Basic, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
  pub name: String,
  pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  /// Parameter variables, also present in `scope` so frame layout sees them
  /// like any other local.
  pub params: Vec<VarId>,
  pub return_type: Type,
  pub scope: ScopeId,
  /// Declared but not defined; skipped by code generation.
  pub prototype: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
  pub parent: Option<ScopeId>,
  pub functions: Vec<FuncId>,
  pub variables: Vec<VarId>,
  pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
  Compound(ScopeId),
  Goto(String),
  Label(String, ScopeId),
  If { condition: Expression, success: ScopeId },
  IfElse { condition: Expression, success: ScopeId, failure: ScopeId },
  Return(Option<Expression>),
  Expression(Expression),
}

impl Statement {
  /// Scopes this statement introduces, in source order. Both branches of an
  /// if/else count: their variables need frame storage too.
  pub fn nested_scopes(&self) -> Vec<ScopeId> {
    match self {
      Statement::Compound(scope) | Statement::Label(_, scope) => vec![*scope],
      Statement::If { success, .. } => vec![*success],
      Statement::IfElse { success, failure, .. } => vec![*success, *failure],
      Statement::Goto(_) | Statement::Return(_) | Statement::Expression(_) => Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
  Variable(Option<VarId>),
  VariableIndex { base: Option<VarId>, index: Box<Expression> },
  AddressOf(Box<Expression>),
  Assign { target: Option<VarId>, value: Box<Expression> },
  AssignIndex { target: Option<VarId>, index: Box<Expression>, value: Box<Expression> },
  Literal { text: String, ty: Type },
  Call { callee: Option<FuncId>, args: Vec<Expression> },
  Binary { op: BinaryOp, left: Box<Expression>, right: Box<Expression> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Lt,
  Gt,
  Le,
  Ge,
  Eq,
  Ne,
  And,
  Or,
}

/// One translation unit: the top-level scope plus the arenas owning every
/// scope, variable, and function.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
  pub scopes: Vec<Scope>,
  pub variables: Vec<Variable>,
  pub functions: Vec<Function>,
}

impl Unit {
  pub fn new() -> Self {
    Unit {
      scopes: vec![Scope {
        parent: None,
        functions: Vec::new(),
        variables: Vec::new(),
        statements: Vec::new(),
      }],
      variables: Vec::new(),
      functions: Vec::new(),
    }
  }

  /// The unit scope that owns all top-level functions.
  pub fn root(&self) -> ScopeId {
    ScopeId(0)
  }

  pub fn scope(&self, id: ScopeId) -> &Scope {
    &self.scopes[id.0]
  }

  pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
    &mut self.scopes[id.0]
  }

  pub fn variable(&self, id: VarId) -> &Variable {
    &self.variables[id.0]
  }

  pub fn function(&self, id: FuncId) -> &Function {
    &self.functions[id.0]
  }

  pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
    self.scopes.push(Scope {
      parent: Some(parent),
      functions: Vec::new(),
      variables: Vec::new(),
      statements: Vec::new(),
    });
    ScopeId(self.scopes.len() - 1)
  }

  pub fn declare_variable(&mut self, scope: ScopeId, name: String, ty: Type) -> VarId {
    let id = VarId(self.variables.len());
    self.variables.push(Variable { name, ty });
    self.scope_mut(scope).variables.push(id);
    id
  }

  pub fn declare_function(&mut self, scope: ScopeId, function: Function) -> FuncId {
    let id = FuncId(self.functions.len());
    self.functions.push(function);
    self.scope_mut(scope).functions.push(id);
    id
  }

  /// Innermost-first lookup through the scope chain; first match wins.
  pub fn resolve_variable(&self, scope: ScopeId, name: &str) -> Option<VarId> {
    let mut current = Some(scope);
    while let Some(id) = current {
      let scope = self.scope(id);
      for &var in &scope.variables {
        if self.variable(var).name == name {
          return Some(var);
        }
      }
      current = scope.parent;
    }
    None
  }

  /// Innermost-first lookup for a callable name.
  pub fn resolve_function(&self, scope: ScopeId, name: &str) -> Option<FuncId> {
    let mut current = Some(scope);
    while let Some(id) = current {
      let scope = self.scope(id);
      for &func in &scope.functions {
        if self.function(func).name == name {
          return Some(func);
        }
      }
      current = scope.parent;
    }
    None
  }
}

impl Default for Unit {
  fn default() -> Self {
    Self::new()
  }
}
