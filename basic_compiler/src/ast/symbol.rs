//! Variable declarations and array layout.
use super::NodeId;
use crate::types::ValueType;
use smol_str::SmolStr;
use std::fmt;

/// Size in bytes of one scalar, or one array element.
pub const WORD_SIZE: u32 = 4;

/// Largest number of bytes addressable below `%ebp` with a 32-bit displacement.
pub const MAX_FRAME_SIZE: u32 = i32::MAX as u32;

/// Handle to a variable declaration.
///
/// Two references to variables with the same name in different
/// scopes have different handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) u32);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: SmolStr,
    /// Inferred on first assignment. `None` until then.
    pub ty: Option<ValueType>,
    /// Dimension sizes, outermost first. Empty for scalars.
    pub dims: Vec<usize>,
    /// Frame relative address, assigned by the code generator.
    pub address: Option<u32>,
    /// Scope node that owns the declaration.
    pub scope: NodeId,
}

impl Variable {
    pub fn new(name: impl Into<SmolStr>, dims: Vec<usize>, scope: NodeId) -> Self {
        Self {
            name: name.into(),
            ty: None,
            dims,
            address: None,
            scope,
        }
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    /// Storage size in bytes.
    ///
    /// Returns `None` when the size doesn't fit a frame displacement.
    pub fn size(&self) -> Option<u32> {
        self.dims
            .iter()
            .try_fold(WORD_SIZE, |size, dim| {
                u32::try_from(*dim).ok().and_then(|dim| size.checked_mul(dim))
            })
            .filter(|size| *size <= MAX_FRAME_SIZE)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for dim in &self.dims {
            write!(f, "[{dim}]")?;
        }
        match self.ty {
            Some(ty) => write!(f, ": {ty}"),
            None => write!(f, ": ?"),
        }
    }
}

/// Row major strides, in elements, for each dimension.
///
/// The innermost dimension has a stride of one, and every outer
/// stride is the product of the sizes of the dimensions inside it.
pub fn strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

/// Linear element offset of an index tuple into an array of the given shape.
///
/// Returns `None` when the tuple has the wrong number of indices, or
/// an index is out of bounds.
pub fn linear_offset(dims: &[usize], indices: &[usize]) -> Option<usize> {
    if dims.len() != indices.len() {
        return None;
    }

    dims.iter()
        .zip(indices)
        .zip(strides(dims))
        .try_fold(0, |offset, ((dim, index), stride)| {
            (index < dim).then(|| offset + index * stride)
        })
}
