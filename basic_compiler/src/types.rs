//! Value types and the operand coercion lattice.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Float,
    String,
}

impl ValueType {
    /// Result type of a binary operator applied to the given operand types.
    ///
    /// `int` dominates any pairing it appears in. Otherwise both
    /// operands must be of the same type.
    pub fn resolve(lhs: ValueType, rhs: ValueType) -> Result<ValueType, TypeError> {
        use ValueType as V;

        match (lhs, rhs) {
            (V::Int, _) | (_, V::Int) => Ok(V::Int),
            (V::Float, V::Float) => Ok(V::Float),
            (V::String, V::String) => Ok(V::String),
            _ => Err(TypeError { lhs, rhs }),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
        }
    }
}

/// Operand pair with no entry in the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeError {
    pub lhs: ValueType,
    pub rhs: ValueType,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "operands have incompatible types '{}' and '{}'", self.lhs, self.rhs)
    }
}

impl std::error::Error for TypeError {}
