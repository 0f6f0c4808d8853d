//! Storage types of the little language: scalars, pointers, fixed-length
//! arrays, and a compound (struct) kind reserved for later work.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basic {
  Void,
  I32,
  F32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
  Basic(Basic),
  Pointer(Box<Type>),
  Array { element: Box<Type>, length: usize },
  Compound { fields: Vec<(String, Type)> },
}

impl Type {
  /// Storage size in bytes. `None` for `void`, which is never a storage
  /// type, and for compound types, whose layout is not implemented yet.
  pub fn byte_size(&self) -> Option<usize> {
    match self {
      Type::Basic(Basic::Void) => None,
      Type::Basic(Basic::I32) | Type::Basic(Basic::F32) => Some(4),
      Type::Pointer(_) => Some(8),
      Type::Array { element, length } => Some(element.byte_size()? * length),
      Type::Compound { .. } => None,
    }
  }

  pub fn is_void(&self) -> bool {
    matches!(self, Type::Basic(Basic::Void))
  }
}
