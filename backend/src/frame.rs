//! Stack frame layout.
//!
//! Storage for every scope in a function body is reserved once at entry, so
//! offsets are assigned in a fixed pre-order walk of the scope tree and stay
//! stable for the whole body. Both branches of an if statement and label
//! scopes are included in the sums, which keeps branch-local variables from
//! colliding. An offset is the distance from `%rbp` down to the start of the
//! variable's storage, so `-offset(%rbp)` addresses its first byte.

use frontend::hir::{ScopeId, Unit, VarId};

use crate::error::CodegenError;

/// Stack alignment quantum required at function entry.
pub const STACK_ALIGNMENT: usize = 16;

pub(crate) fn variable_size(unit: &Unit, var: VarId) -> Result<usize, CodegenError> {
  let variable = unit.variable(var);
  variable
    .ty
    .byte_size()
    .ok_or_else(|| CodegenError::UnsizedType {
      ty: variable.ty.clone(),
    })
}

/// Bytes needed by a scope's own variables plus everything nested below it.
pub fn scope_size(unit: &Unit, scope: ScopeId) -> Result<usize, CodegenError> {
  let mut total = 0;
  for &var in &unit.scope(scope).variables {
    total += variable_size(unit, var)?;
  }
  for statement in &unit.scope(scope).statements {
    for nested in statement.nested_scopes() {
      total += scope_size(unit, nested)?;
    }
  }
  Ok(total)
}

/// Full frame reservation for a function scope. Parameters are aliased into
/// the scope's variable list, so their storage is counted exactly once. The
/// result is rounded up to the alignment quantum and never zero.
pub fn frame_size(unit: &Unit, scope: ScopeId) -> Result<usize, CodegenError> {
  let raw = scope_size(unit, scope)?;
  let aligned = (raw + STACK_ALIGNMENT - 1) / STACK_ALIGNMENT * STACK_ALIGNMENT;
  Ok(aligned.max(STACK_ALIGNMENT))
}

/// Stable frame offset of `var` within the function whose scope is `scope`.
pub fn frame_offset(unit: &Unit, scope: ScopeId, var: VarId) -> Result<usize, CodegenError> {
  offset_within(unit, scope, var)?.ok_or_else(|| CodegenError::MissingFrameSlot {
    name: unit.variable(var).name.clone(),
  })
}

fn offset_within(unit: &Unit, scope: ScopeId, var: VarId) -> Result<Option<usize>, CodegenError> {
  let mut used = 0;
  for &candidate in &unit.scope(scope).variables {
    used += variable_size(unit, candidate)?;
    if candidate == var {
      return Ok(Some(used));
    }
  }
  for statement in &unit.scope(scope).statements {
    for nested in statement.nested_scopes() {
      if let Some(offset) = offset_within(unit, nested, var)? {
        return Ok(Some(used + offset));
      }
      used += scope_size(unit, nested)?;
    }
  }
  Ok(None)
}

#[cfg(test)]
mod tests {
  use super::*;
  use frontend::hir::Function;

  fn unit_for(source: &str) -> Unit {
    let output = frontend::front_end(source).expect("source should parse");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    output.unit
  }

  fn function<'u>(unit: &'u Unit, name: &str) -> &'u Function {
    unit
      .functions
      .iter()
      .find(|f| f.name == name)
      .expect("function should exist")
  }

  /// Every variable reachable from `scope`, depth first.
  fn all_variables(unit: &Unit, scope: ScopeId) -> Vec<VarId> {
    let mut vars = unit.scope(scope).variables.clone();
    for statement in &unit.scope(scope).statements {
      for nested in statement.nested_scopes() {
        vars.extend(all_variables(unit, nested));
      }
    }
    vars
  }

  #[test]
  fn empty_function_still_gets_one_aligned_quantum() {
    let unit = unit_for("int main() { return 0; }");
    let main = function(&unit, "main");
    assert_eq!(frame_size(&unit, main.scope).unwrap(), 16);
  }

  #[test]
  fn frame_size_is_always_sixteen_byte_aligned() {
    let unit = unit_for("int main() { int arr[4]; int i; return 0; }");
    let main = function(&unit, "main");
    assert_eq!(scope_size(&unit, main.scope).unwrap(), 20);
    assert_eq!(frame_size(&unit, main.scope).unwrap(), 32);
  }

  #[test]
  fn parameters_get_distinct_offsets_inside_the_frame() {
    let unit = unit_for("int add(int a, int b) { return a + b; }");
    let add = function(&unit, "add");
    let a = frame_offset(&unit, add.scope, add.params[0]).unwrap();
    let b = frame_offset(&unit, add.scope, add.params[1]).unwrap();
    assert_eq!(a, 4);
    assert_eq!(b, 8);
    assert!(frame_size(&unit, add.scope).unwrap() >= 8);
  }

  #[test]
  fn both_branches_and_labels_get_non_overlapping_ranges() {
    let unit = unit_for(
      "int main() {\
         int a;\
         if (a > 0) { int b; b = 1; } else { int c; c = 2; }\
         here: { int d; d = 3; }\
         return a;\
       }",
    );
    let main = function(&unit, "main");
    let vars = all_variables(&unit, main.scope);
    assert_eq!(vars.len(), 4);

    // each variable occupies [offset - size, offset); ranges must not overlap
    let mut ranges = Vec::new();
    for var in vars {
      let size = unit.variable(var).ty.byte_size().unwrap();
      let offset = frame_offset(&unit, main.scope, var).unwrap();
      ranges.push((offset - size, offset));
    }
    for (i, &(start_a, end_a)) in ranges.iter().enumerate() {
      for &(start_b, end_b) in &ranges[i + 1..] {
        assert!(
          end_a <= start_b || end_b <= start_a,
          "overlapping ranges {ranges:?}"
        );
      }
    }

    let frame = frame_size(&unit, main.scope).unwrap();
    assert_eq!(frame % STACK_ALIGNMENT, 0);
    assert!(ranges.iter().all(|&(_, end)| end <= frame));
  }

  #[test]
  fn offsets_are_stable_across_queries() {
    let unit = unit_for("int main() { int x; { int y; y = 1; } x = 2; return x; }");
    let main = function(&unit, "main");
    let x = unit.scope(main.scope).variables[0];
    let first = frame_offset(&unit, main.scope, x).unwrap();
    let second = frame_offset(&unit, main.scope, x).unwrap();
    assert_eq!(first, second);
  }
}
