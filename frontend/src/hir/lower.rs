//! Lowering: walk the tree-sitter syntax tree and build the resolved `Unit`.
//!
//! Name resolution happens here, innermost scope first. Failures are pushed
//! onto a diagnostics list and the walk keeps going, leaving a `None`
//! reference behind, so the whole tree is still lowered and every problem
//! gets reported in one pass. Declarations with initializers turn into a
//! synthetic assignment statement appended to the owning scope.

use tree_sitter::Node;

use crate::error::LowerError;
use crate::hir::{Basic, BinaryOp, Expression, Function, ScopeId, Statement, Type, Unit};

/// Result of lowering one translation unit.
#[derive(Debug)]
pub struct LowerOutput {
  pub unit: Unit,
  pub diagnostics: Vec<LowerError>,
}

/// Lower a parsed translation unit into the HIR.
pub fn lower(root: Node, source: &str) -> LowerOutput {
  let mut lowering = Lowering {
    source,
    unit: Unit::new(),
    diagnostics: Vec::new(),
  };
  lowering.register_runtime_helpers();
  lowering.lower_translation_unit(root);
  LowerOutput {
    unit: lowering.unit,
    diagnostics: lowering.diagnostics,
  }
}

struct Lowering<'s> {
  source: &'s str,
  unit: Unit,
  diagnostics: Vec<LowerError>,
}

/// A declarator peeled down to the name it introduces, the full type built
/// up around the base type, and the initializer node if one was present.
struct Declared<'t> {
  name: String,
  ty: Type,
  value: Option<Node<'t>>,
}

impl<'s> Lowering<'s> {
  fn text(&self, node: Node) -> &'s str {
    node.utf8_text(self.source.as_bytes()).unwrap_or("")
  }

  fn report(&mut self, error: LowerError) {
    self.diagnostics.push(error);
  }

  fn unsupported(&mut self, node: Node) {
    self.report(LowerError::UnsupportedConstruct {
      kind: node.kind().to_string(),
    });
  }

  /// The printing routines emitted in the unit preamble are callable like
  /// ordinary prototypes.
  fn register_runtime_helpers(&mut self) {
    let root = self.unit.root();
    for name in ["print_int", "print_char"] {
      let scope = self.unit.new_scope(root);
      let param = self
        .unit
        .declare_variable(scope, "value".to_string(), Type::Basic(Basic::I32));
      self.unit.declare_function(
        root,
        Function {
          name: name.to_string(),
          params: vec![param],
          return_type: Type::Basic(Basic::Void),
          scope,
          prototype: true,
        },
      );
    }
  }

  fn lower_translation_unit(&mut self, root: Node) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
      match child.kind() {
        "function_definition" => self.lower_function_definition(child),
        "declaration" => self.lower_top_level_declaration(child),
        "comment" => {}
        _ => self.unsupported(child),
      }
    }
  }

  // ----- declarations ------------------------------------------------------

  fn lower_function_definition(&mut self, node: Node) {
    let Some(base) = self.base_type(node) else {
      return;
    };
    let Some(declarator) = node.child_by_field_name("declarator") else {
      self.unsupported(node);
      return;
    };
    let Some((func_decl, pointers)) = function_declarator_of(declarator) else {
      self.unsupported(node);
      return;
    };
    let return_type = wrap_pointers(base, pointers);

    let Some(name_node) = func_decl.child_by_field_name("declarator") else {
      self.unsupported(node);
      return;
    };
    let name = self.text(name_node).to_string();

    let root = self.unit.root();
    let scope = self.unit.new_scope(root);
    let params = match func_decl.child_by_field_name("parameters") {
      Some(list) => self.lower_parameters(list, scope),
      None => Vec::new(),
    };

    self.unit.declare_function(
      root,
      Function {
        name,
        params,
        return_type,
        scope,
        prototype: false,
      },
    );

    if let Some(body) = node.child_by_field_name("body") {
      self.lower_compound_into(body, scope);
    }
  }

  /// Top-level `declaration` nodes are either prototypes or globals; only
  /// the former are supported.
  fn lower_top_level_declaration(&mut self, node: Node) {
    let Some(base) = self.base_type(node) else {
      return;
    };
    let mut cursor = node.walk();
    let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();
    for declarator in declarators {
      match function_declarator_of(declarator) {
        Some((func_decl, pointers)) => {
          let return_type = wrap_pointers(base.clone(), pointers);
          self.lower_prototype(func_decl, return_type);
        }
        None => self.report(LowerError::UnsupportedConstruct {
          kind: "global variable".to_string(),
        }),
      }
    }
  }

  fn lower_prototype(&mut self, declarator: Node, return_type: Type) {
    let Some(name_node) = declarator.child_by_field_name("declarator") else {
      self.unsupported(declarator);
      return;
    };
    let name = self.text(name_node).to_string();

    let root = self.unit.root();
    let scope = self.unit.new_scope(root);
    let params = match declarator.child_by_field_name("parameters") {
      Some(list) => self.lower_parameters(list, scope),
      None => Vec::new(),
    };

    self.unit.declare_function(
      root,
      Function {
        name,
        params,
        return_type,
        scope,
        prototype: true,
      },
    );
  }

  fn lower_parameters(&mut self, list: Node, scope: ScopeId) -> Vec<crate::hir::VarId> {
    let mut params = Vec::new();
    let mut cursor = list.walk();
    let nodes: Vec<Node> = list.named_children(&mut cursor).collect();
    for param in nodes {
      if param.kind() != "parameter_declaration" {
        if param.kind() != "comment" {
          self.unsupported(param);
        }
        continue;
      }
      let Some(base) = self.base_type(param) else {
        continue;
      };
      let declared = match param.child_by_field_name("declarator") {
        Some(declarator) => self.parse_declarator(base, declarator),
        // `f(void)` has a bare void type and no declarator
        None if base.is_void() => continue,
        // prototypes may leave parameters unnamed
        None => Some(Declared {
          name: format!("arg{}", params.len()),
          ty: base,
          value: None,
        }),
      };
      let Some(declared) = declared else { continue };
      if declared.ty.is_void() {
        self.report(LowerError::VoidVariable { name: declared.name });
        continue;
      }
      params.push(self.declare_checked(scope, declared.name, declared.ty));
    }
    params
  }

  fn lower_declaration(&mut self, node: Node, scope: ScopeId) {
    let Some(base) = self.base_type(node) else {
      return;
    };
    let mut cursor = node.walk();
    let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();
    if declarators.is_empty() {
      self.unsupported(node);
      return;
    }
    for declarator in declarators {
      if function_declarator_of(declarator).is_some() {
        self.report(LowerError::UnsupportedConstruct {
          kind: "local function declaration".to_string(),
        });
        continue;
      }
      let Some(declared) = self.parse_declarator(base.clone(), declarator) else {
        continue;
      };
      if declared.ty.is_void() {
        self.report(LowerError::VoidVariable { name: declared.name });
        continue;
      }
      let var = self.declare_checked(scope, declared.name, declared.ty);
      if let Some(value) = declared.value {
        if let Some(lowered) = self.lower_expression(value, scope) {
          self.unit.scope_mut(scope).statements.push(Statement::Expression(
            Expression::Assign {
              target: Some(var),
              value: Box::new(lowered),
            },
          ));
        }
      }
    }
  }

  fn declare_checked(&mut self, scope: ScopeId, name: String, ty: Type) -> crate::hir::VarId {
    let duplicate = self
      .unit
      .scope(scope)
      .variables
      .iter()
      .any(|&var| self.unit.variable(var).name == name);
    if duplicate {
      self.report(LowerError::DuplicateDeclaration { name: name.clone() });
    }
    self.unit.declare_variable(scope, name, ty)
  }

  fn base_type(&mut self, node: Node) -> Option<Type> {
    let type_node = node.child_by_field_name("type")?;
    match type_node.kind() {
      "primitive_type" => match self.text(type_node) {
        "void" => Some(Type::Basic(Basic::Void)),
        "int" => Some(Type::Basic(Basic::I32)),
        "float" => Some(Type::Basic(Basic::F32)),
        other => {
          self.report(LowerError::UnsupportedConstruct {
            kind: format!("type '{other}'"),
          });
          None
        }
      },
      _ => {
        self.unsupported(type_node);
        None
      }
    }
  }

  /// Peel declarator nodes around an identifier, building up the full type.
  fn parse_declarator<'t>(&mut self, base: Type, node: Node<'t>) -> Option<Declared<'t>> {
    match node.kind() {
      "identifier" => Some(Declared {
        name: self.text(node).to_string(),
        ty: base,
        value: None,
      }),
      "pointer_declarator" => {
        let inner = node.child_by_field_name("declarator")?;
        self.parse_declarator(Type::Pointer(Box::new(base)), inner)
      }
      "array_declarator" => {
        let inner = node.child_by_field_name("declarator")?;
        match self.array_length(node) {
          Some(length) => self.parse_declarator(
            Type::Array {
              element: Box::new(base),
              length,
            },
            inner,
          ),
          None => {
            self.report(LowerError::BadArrayLength {
              name: self.text(inner).to_string(),
            });
            None
          }
        }
      }
      "init_declarator" => {
        let inner = node.child_by_field_name("declarator")?;
        let mut declared = self.parse_declarator(base, inner)?;
        declared.value = node.child_by_field_name("value");
        Some(declared)
      }
      "parenthesized_declarator" => {
        let inner = node.named_child(0)?;
        self.parse_declarator(base, inner)
      }
      _ => {
        self.unsupported(node);
        None
      }
    }
  }

  /// Array lengths must be literal, non-zero integers.
  fn array_length(&self, node: Node) -> Option<usize> {
    let size = node.child_by_field_name("size")?;
    if size.kind() != "number_literal" {
      return None;
    }
    match self.text(size).parse::<usize>() {
      Ok(length) if length > 0 => Some(length),
      _ => None,
    }
  }

  // ----- statements --------------------------------------------------------

  /// Lower every statement of a compound block directly into `scope`.
  fn lower_compound_into(&mut self, node: Node, scope: ScopeId) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
      self.lower_statement(child, scope);
    }
  }

  /// If/else branches and label bodies get their own scope; a compound body
  /// is flattened into it rather than nesting twice.
  fn lower_branch(&mut self, node: Node, scope: ScopeId) {
    if node.kind() == "compound_statement" {
      self.lower_compound_into(node, scope);
    } else {
      self.lower_statement(node, scope);
    }
  }

  fn lower_statement(&mut self, node: Node, scope: ScopeId) {
    match node.kind() {
      "compound_statement" => {
        let inner = self.unit.new_scope(scope);
        self.unit.scope_mut(scope).statements.push(Statement::Compound(inner));
        self.lower_compound_into(node, inner);
      }

      "labeled_statement" => {
        let Some(label) = node.child_by_field_name("label") else {
          self.unsupported(node);
          return;
        };
        let name = self.text(label).to_string();
        let inner = self.unit.new_scope(scope);
        self
          .unit
          .scope_mut(scope)
          .statements
          .push(Statement::Label(name, inner));
        if let Some(body) = label.next_named_sibling() {
          self.lower_branch(body, inner);
        }
      }

      "goto_statement" => match node.child_by_field_name("label") {
        Some(label) => {
          let name = self.text(label).to_string();
          self.unit.scope_mut(scope).statements.push(Statement::Goto(name));
        }
        None => self.unsupported(node),
      },

      "if_statement" => self.lower_if(node, scope),

      "return_statement" => {
        let value = node
          .named_child(0)
          .and_then(|expr| self.lower_expression(expr, scope));
        self.unit.scope_mut(scope).statements.push(Statement::Return(value));
      }

      "declaration" => self.lower_declaration(node, scope),

      "expression_statement" => {
        if let Some(expr) = node.named_child(0) {
          if let Some(lowered) = self.lower_expression(expr, scope) {
            self
              .unit
              .scope_mut(scope)
              .statements
              .push(Statement::Expression(lowered));
          }
        }
      }

      "comment" => {}

      _ => self.unsupported(node),
    }
  }

  fn lower_if(&mut self, node: Node, scope: ScopeId) {
    let Some(cond_node) = node.child_by_field_name("condition") else {
      self.unsupported(node);
      return;
    };
    let Some(condition) = self.lower_expression(cond_node, scope) else {
      return;
    };
    let Some(consequence) = node.child_by_field_name("consequence") else {
      self.unsupported(node);
      return;
    };

    // a present third child promotes If to IfElse
    let alternative = node.child_by_field_name("alternative").map(|alt| {
      if alt.kind() == "else_clause" {
        alt.named_child(0).unwrap_or(alt)
      } else {
        alt
      }
    });

    let success = self.unit.new_scope(scope);
    match alternative {
      Some(alt) => {
        let failure = self.unit.new_scope(scope);
        self.unit.scope_mut(scope).statements.push(Statement::IfElse {
          condition,
          success,
          failure,
        });
        self.lower_branch(consequence, success);
        self.lower_branch(alt, failure);
      }
      None => {
        self
          .unit
          .scope_mut(scope)
          .statements
          .push(Statement::If { condition, success });
        self.lower_branch(consequence, success);
      }
    }
  }

  // ----- expressions -------------------------------------------------------

  fn lower_expression(&mut self, node: Node, scope: ScopeId) -> Option<Expression> {
    match node.kind() {
      "identifier" => {
        let name = self.text(node);
        let var = self.unit.resolve_variable(scope, name);
        if var.is_none() {
          self.report(LowerError::UnresolvedIdentifier {
            name: name.to_string(),
          });
        }
        Some(Expression::Variable(var))
      }

      "number_literal" => {
        let text = self.text(node).to_string();
        // `.` means a float; suffixes and exponents are not analysed
        let ty = if text.contains('.') {
          Type::Basic(Basic::F32)
        } else {
          Type::Basic(Basic::I32)
        };
        Some(Expression::Literal { text, ty })
      }

      "parenthesized_expression" => self.lower_expression(node.named_child(0)?, scope),

      "subscript_expression" => {
        let base = self.subscript_target(node, scope)?;
        let index = self.lower_expression(node.child_by_field_name("index")?, scope)?;
        Some(Expression::VariableIndex {
          base,
          index: Box::new(index),
        })
      }

      "assignment_expression" => self.lower_assignment(node, scope),

      "binary_expression" => {
        let op_node = node.child_by_field_name("operator")?;
        let op_text = self.text(op_node);
        let Some(op) = binary_op(op_text) else {
          self.report(LowerError::UnknownOperator {
            op: op_text.to_string(),
          });
          return None;
        };
        let left = self.lower_expression(node.child_by_field_name("left")?, scope)?;
        let right = self.lower_expression(node.child_by_field_name("right")?, scope)?;
        Some(Expression::Binary {
          op,
          left: Box::new(left),
          right: Box::new(right),
        })
      }

      "call_expression" => {
        let callee_node = node.child_by_field_name("function")?;
        if callee_node.kind() != "identifier" {
          self.unsupported(callee_node);
          return None;
        }
        let name = self.text(callee_node);
        let callee = self.unit.resolve_function(scope, name);
        if callee.is_none() {
          self.report(LowerError::UnresolvedCall {
            name: name.to_string(),
          });
        }
        let mut args = Vec::new();
        if let Some(list) = node.child_by_field_name("arguments") {
          let mut cursor = list.walk();
          let nodes: Vec<Node> = list.named_children(&mut cursor).collect();
          // left-to-right, preserving evaluation order
          for arg in nodes {
            if arg.kind() == "comment" {
              continue;
            }
            if let Some(lowered) = self.lower_expression(arg, scope) {
              args.push(lowered);
            }
          }
        }
        Some(Expression::Call { callee, args })
      }

      "pointer_expression" => {
        let operator = node
          .child_by_field_name("operator")
          .map(|op| self.text(op))
          .unwrap_or("");
        if operator != "&" {
          self.unsupported(node);
          return None;
        }
        let argument = self.lower_expression(node.child_by_field_name("argument")?, scope)?;
        Some(Expression::AddressOf(Box::new(argument)))
      }

      _ => {
        self.unsupported(node);
        None
      }
    }
  }

  /// Plain-variable and subscript targets become distinct variants here so
  /// the generator never re-classifies the left-hand side.
  fn lower_assignment(&mut self, node: Node, scope: ScopeId) -> Option<Expression> {
    if let Some(op) = node.child_by_field_name("operator") {
      let op_text = self.text(op);
      if op_text != "=" {
        self.report(LowerError::UnknownOperator {
          op: op_text.to_string(),
        });
        return None;
      }
    }
    let left = node.child_by_field_name("left")?;
    let value = self.lower_expression(node.child_by_field_name("right")?, scope)?;

    match left.kind() {
      "identifier" => {
        let name = self.text(left);
        let target = self.unit.resolve_variable(scope, name);
        if target.is_none() {
          self.report(LowerError::UnresolvedIdentifier {
            name: name.to_string(),
          });
        }
        Some(Expression::Assign {
          target,
          value: Box::new(value),
        })
      }
      "subscript_expression" => {
        let target = self.subscript_target(left, scope)?;
        let index = self.lower_expression(left.child_by_field_name("index")?, scope)?;
        Some(Expression::AssignIndex {
          target,
          index: Box::new(index),
          value: Box::new(value),
        })
      }
      _ => {
        self.unsupported(left);
        None
      }
    }
  }

  /// The subscripted base must be a plain variable name; resolution failure
  /// is reported but still lowers (as `None`).
  fn subscript_target(&mut self, node: Node, scope: ScopeId) -> Option<Option<crate::hir::VarId>> {
    let argument = node.child_by_field_name("argument")?;
    if argument.kind() != "identifier" {
      self.unsupported(argument);
      return None;
    }
    let name = self.text(argument);
    let base = self.unit.resolve_variable(scope, name);
    if base.is_none() {
      self.report(LowerError::UnresolvedIdentifier {
        name: name.to_string(),
      });
    }
    Some(base)
  }
}

fn binary_op(text: &str) -> Option<BinaryOp> {
  match text {
    "+" => Some(BinaryOp::Add),
    "-" => Some(BinaryOp::Sub),
    "*" => Some(BinaryOp::Mul),
    "/" => Some(BinaryOp::Div),
    "<" => Some(BinaryOp::Lt),
    ">" => Some(BinaryOp::Gt),
    "<=" => Some(BinaryOp::Le),
    ">=" => Some(BinaryOp::Ge),
    "==" => Some(BinaryOp::Eq),
    "!=" => Some(BinaryOp::Ne),
    "&&" => Some(BinaryOp::And),
    "||" => Some(BinaryOp::Or),
    _ => None,
  }
}

/// Unwrap pointer declarators down to a function declarator, counting the
/// pointer layers that belong to the return type.
fn function_declarator_of(declarator: Node) -> Option<(Node, usize)> {
  let mut node = declarator;
  let mut pointers = 0;
  while node.kind() == "pointer_declarator" {
    node = node.child_by_field_name("declarator")?;
    pointers += 1;
  }
  (node.kind() == "function_declarator").then_some((node, pointers))
}

fn wrap_pointers(base: Type, layers: usize) -> Type {
  let mut ty = base;
  for _ in 0..layers {
    ty = Type::Pointer(Box::new(ty));
  }
  ty
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::front_end;
  use crate::hir::VarId;

  fn lowered(source: &str) -> LowerOutput {
    front_end(source).expect("source should parse")
  }

  /// Functions written by the test source, without the runtime prototypes.
  fn user_functions(unit: &Unit) -> Vec<&Function> {
    unit
      .functions
      .iter()
      .filter(|f| f.name != "print_int" && f.name != "print_char")
      .collect()
  }

  #[test]
  fn add_function_lowers_to_binary_return() {
    let out = lowered("int add(int a, int b) { return a + b; }");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let funcs = user_functions(&out.unit);
    assert_eq!(funcs.len(), 1);
    let add = funcs[0];
    assert_eq!(add.params.len(), 2);
    assert_eq!(add.return_type, Type::Basic(Basic::I32));
    assert!(!add.prototype);

    let body = &out.unit.scope(add.scope).statements;
    assert_eq!(body.len(), 1);
    match &body[0] {
      Statement::Return(Some(Expression::Binary { op: BinaryOp::Add, left, right })) => {
        assert_eq!(**left, Expression::Variable(Some(add.params[0])));
        assert_eq!(**right, Expression::Variable(Some(add.params[1])));
      }
      other => panic!("expected return of an addition, got {other:?}"),
    }
  }

  #[test]
  fn unresolved_call_is_reported_but_lowering_continues() {
    let out = lowered("int main() { return foo(); }");
    assert!(out
      .diagnostics
      .iter()
      .any(|d| matches!(d, LowerError::UnresolvedCall { name } if name == "foo")));

    let main = user_functions(&out.unit)[0];
    match &out.unit.scope(main.scope).statements[0] {
      Statement::Return(Some(Expression::Call { callee: None, args })) => {
        assert!(args.is_empty());
      }
      other => panic!("expected a call with an unresolved callee, got {other:?}"),
    }
  }

  #[test]
  fn unresolved_symbol_does_not_hide_siblings() {
    let out = lowered("int main() { x = 1; return 2; }");
    assert!(out
      .diagnostics
      .iter()
      .any(|d| matches!(d, LowerError::UnresolvedIdentifier { name } if name == "x")));

    let main = user_functions(&out.unit)[0];
    let body = &out.unit.scope(main.scope).statements;
    assert_eq!(body.len(), 2);
    assert!(matches!(&body[1], Statement::Return(Some(Expression::Literal { .. }))));
  }

  #[test]
  fn subscript_assignment_lowers_to_assign_index() {
    let out = lowered("int main() { int arr[4]; arr[2] = 7; return 0; }");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let main = user_functions(&out.unit)[0];
    let body = &out.unit.scope(main.scope).statements;
    match &body[0] {
      Statement::Expression(Expression::AssignIndex { target: Some(target), .. }) => {
        let arr = out.unit.variable(*target);
        assert_eq!(arr.name, "arr");
        assert_eq!(arr.ty.byte_size(), Some(16));
      }
      other => panic!("expected an indexed assignment, got {other:?}"),
    }
  }

  #[test]
  fn number_literals_are_typed_by_decimal_point() {
    let out = lowered("int main() { int x = 7; float y = 1.5; return 0; }");
    let main = user_functions(&out.unit)[0];
    let body = &out.unit.scope(main.scope).statements;

    match &body[0] {
      Statement::Expression(Expression::Assign { value, .. }) => {
        assert_eq!(
          **value,
          Expression::Literal { text: "7".to_string(), ty: Type::Basic(Basic::I32) }
        );
      }
      other => panic!("expected the synthetic int assignment, got {other:?}"),
    }
    match &body[1] {
      Statement::Expression(Expression::Assign { value, .. }) => {
        assert_eq!(
          **value,
          Expression::Literal { text: "1.5".to_string(), ty: Type::Basic(Basic::F32) }
        );
      }
      other => panic!("expected the synthetic float assignment, got {other:?}"),
    }
  }

  #[test]
  fn inner_scopes_shadow_outer_names() {
    let out = lowered("int main() { int x; x = 1; { int x; x = 2; } return x; }");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let main = user_functions(&out.unit)[0];
    let body = &out.unit.scope(main.scope).statements;
    let outer: VarId = out.unit.scope(main.scope).variables[0];

    let inner_scope = match &body[1] {
      Statement::Compound(scope) => *scope,
      other => panic!("expected a compound statement, got {other:?}"),
    };
    let inner = out.unit.scope(inner_scope).variables[0];
    assert_ne!(outer, inner);

    match &out.unit.scope(inner_scope).statements[0] {
      Statement::Expression(Expression::Assign { target, .. }) => {
        assert_eq!(*target, Some(inner));
      }
      other => panic!("expected the shadowing assignment, got {other:?}"),
    }

    match &body[2] {
      Statement::Return(Some(Expression::Variable(var))) => assert_eq!(*var, Some(outer)),
      other => panic!("expected return of the outer variable, got {other:?}"),
    }
  }

  #[test]
  fn else_branch_promotes_if_to_if_else() {
    let with_else = lowered("int main() { if (1 < 2) { return 1; } else { return 2; } }");
    let main = user_functions(&with_else.unit)[0];
    assert!(matches!(
      with_else.unit.scope(main.scope).statements[0],
      Statement::IfElse { .. }
    ));

    let without = lowered("int main() { if (1 < 2) { return 1; } return 2; }");
    let main = user_functions(&without.unit)[0];
    assert!(matches!(
      without.unit.scope(main.scope).statements[0],
      Statement::If { .. }
    ));
  }

  #[test]
  fn labels_carry_their_own_scope() {
    let out = lowered("int main() { loop: { goto loop; } return 0; }");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let main = user_functions(&out.unit)[0];
    match &out.unit.scope(main.scope).statements[0] {
      Statement::Label(name, scope) => {
        assert_eq!(name, "loop");
        assert_eq!(
          out.unit.scope(*scope).statements[0],
          Statement::Goto("loop".to_string())
        );
      }
      other => panic!("expected a label, got {other:?}"),
    }
  }

  #[test]
  fn zero_length_array_is_rejected() {
    let out = lowered("int main() { int a[0]; return 0; }");
    assert!(out
      .diagnostics
      .iter()
      .any(|d| matches!(d, LowerError::BadArrayLength { name } if name == "a")));

    let main = user_functions(&out.unit)[0];
    assert!(out.unit.scope(main.scope).variables.is_empty());
  }

  #[test]
  fn non_literal_array_length_is_rejected() {
    let out = lowered("int main() { int n; int a[n]; return 0; }");
    assert!(out
      .diagnostics
      .iter()
      .any(|d| matches!(d, LowerError::BadArrayLength { .. })));
  }

  #[test]
  fn void_variables_are_rejected() {
    let out = lowered("int main() { void x; return 0; }");
    assert!(out
      .diagnostics
      .iter()
      .any(|d| matches!(d, LowerError::VoidVariable { name } if name == "x")));
  }

  #[test]
  fn unsupported_statements_are_skipped_not_fatal() {
    let out = lowered("int main() { while (1) { } return 3; }");
    assert!(out
      .diagnostics
      .iter()
      .any(|d| matches!(d, LowerError::UnsupportedConstruct { kind } if kind == "while_statement")));

    let main = user_functions(&out.unit)[0];
    assert!(matches!(
      out.unit.scope(main.scope).statements.last(),
      Some(Statement::Return(Some(_)))
    ));
  }

  #[test]
  fn initializer_becomes_synthetic_assignment() {
    let out = lowered("int main() { int x = 5; return x; }");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let main = user_functions(&out.unit)[0];
    let var = out.unit.scope(main.scope).variables[0];
    assert_eq!(
      out.unit.scope(main.scope).statements[0],
      Statement::Expression(Expression::Assign {
        target: Some(var),
        value: Box::new(Expression::Literal {
          text: "5".to_string(),
          ty: Type::Basic(Basic::I32),
        }),
      })
    );
  }

  #[test]
  fn calls_resolve_to_the_first_declaration() {
    let out = lowered("int f(int); int main() { return f(1); } int f(int x) { return x; }");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let funcs = user_functions(&out.unit);
    assert_eq!(funcs.len(), 3);
    assert!(funcs[0].prototype);
    assert!(!funcs[2].prototype);

    let main = funcs[1];
    match &out.unit.scope(main.scope).statements[0] {
      Statement::Return(Some(Expression::Call { callee: Some(callee), .. })) => {
        assert!(out.unit.function(*callee).prototype);
        assert_eq!(out.unit.function(*callee).name, "f");
      }
      other => panic!("expected a resolved call, got {other:?}"),
    }
  }

  #[test]
  fn address_of_lowers_through_pointer_declarators() {
    let out = lowered("int main() { int x; int *p; p = &x; return 0; }");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let main = user_functions(&out.unit)[0];
    let p = out.unit.scope(main.scope).variables[1];
    assert_eq!(
      out.unit.variable(p).ty,
      Type::Pointer(Box::new(Type::Basic(Basic::I32)))
    );
    match &out.unit.scope(main.scope).statements[0] {
      Statement::Expression(Expression::Assign { target, value }) => {
        assert_eq!(*target, Some(p));
        assert!(matches!(**value, Expression::AddressOf(_)));
      }
      other => panic!("expected the pointer assignment, got {other:?}"),
    }
  }

  #[test]
  fn relowering_is_idempotent() {
    let source = "int add(int a, int b) { return a + b; } int main() { return add(1, 2); }";
    let first = lowered(source);
    let second = lowered(source);
    assert_eq!(first.unit, second.unit);
    assert_eq!(first.diagnostics, second.diagnostics);
  }
}
