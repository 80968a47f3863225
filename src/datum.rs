//! Datum: the value-or-array input/output unit of every kernel
//!
//! A `Datum` is a tagged union of a scalar and an array. A scalar is
//! represented as a length-1 array so kernels have a single element-access
//! path; the tag is preserved so callers can tell the shapes apart and so
//! broadcasting can replicate the scalar across array positions. Buffers
//! are reference-counted and never copied on read.

use arrow::array::{new_null_array, Array, ArrayRef};
use arrow::buffer::NullBuffer;
use arrow::datatypes::DataType;

use crate::error::{ComputeError, Result};

/// A value that is either a single scalar (with validity) or an array.
#[derive(Debug, Clone)]
pub enum Datum {
    /// A length-1 array holding the scalar value and its validity.
    Scalar(ArrayRef),
    /// An array of values with a parallel validity bitmap.
    Array(ArrayRef),
}

impl Datum {
    /// Wrap an array as an array-shaped datum.
    pub fn array(array: ArrayRef) -> Self {
        Datum::Array(array)
    }

    /// Wrap a length-1 array as a scalar-shaped datum.
    ///
    /// Returns `Invalid` if the backing array does not have exactly one
    /// element.
    pub fn scalar(array: ArrayRef) -> Result<Self> {
        if array.len() != 1 {
            return Err(ComputeError::Invalid(format!(
                "Scalar datum requires a length-1 array, got length {}",
                array.len()
            )));
        }
        Ok(Datum::Scalar(array))
    }

    /// A null scalar of the given type.
    pub fn null_scalar(data_type: &DataType) -> Self {
        Datum::Scalar(new_null_array(data_type, 1))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Datum::Scalar(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Datum::Array(_))
    }

    /// The backing array, regardless of shape.
    pub fn values(&self) -> &ArrayRef {
        match self {
            Datum::Scalar(a) | Datum::Array(a) => a,
        }
    }

    /// Consume the datum, returning the backing array.
    pub fn into_values(self) -> ArrayRef {
        match self {
            Datum::Scalar(a) | Datum::Array(a) => a,
        }
    }

    pub fn data_type(&self) -> &DataType {
        self.values().data_type()
    }

    /// Logical length: the array length, or 1 for a scalar.
    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// True if this is a scalar whose single slot is null.
    ///
    /// A Null-typed scalar counts even though the null type carries no
    /// physical validity buffer.
    pub fn is_null_scalar(&self) -> bool {
        match self {
            Datum::Scalar(a) => a.data_type() == &DataType::Null || a.is_null(0),
            Datum::Array(_) => false,
        }
    }

    /// Rewrap a result array in the same shape as this datum.
    pub fn rewrap(&self, array: ArrayRef) -> Datum {
        match self {
            Datum::Scalar(_) => Datum::Scalar(array),
            Datum::Array(_) => Datum::Array(array),
        }
    }
}

impl From<ArrayRef> for Datum {
    fn from(array: ArrayRef) -> Self {
        Datum::Array(array)
    }
}

/// Resolve the broadcast output length of a set of operands.
///
/// All array operands must agree on length; scalars broadcast to any
/// length. Returns `(length, all_scalar)`.
pub fn broadcast_len(args: &[&Datum]) -> Result<(usize, bool)> {
    let mut len: Option<usize> = None;
    for arg in args {
        if let Datum::Array(a) = arg {
            match len {
                None => len = Some(a.len()),
                Some(l) if l != a.len() => {
                    return Err(ComputeError::Invalid(format!(
                        "Array arguments must all be the same length, got {} and {}",
                        l,
                        a.len()
                    )));
                }
                _ => {}
            }
        }
    }
    match len {
        Some(l) => Ok((l, false)),
        None => Ok((1, true)),
    }
}

/// The validity of one operand, broadcast over `len` output positions.
///
/// A valid scalar constrains nothing; a null scalar nullifies every
/// position; an array contributes its own bitmap.
pub fn broadcast_nulls(arg: &Datum, len: usize) -> Option<NullBuffer> {
    // The null type carries no physical validity buffer; every slot is
    // logically null.
    if arg.data_type() == &DataType::Null {
        return Some(NullBuffer::new_null(len));
    }
    match arg {
        Datum::Scalar(a) => {
            if a.is_null(0) {
                Some(NullBuffer::new_null(len))
            } else {
                None
            }
        }
        Datum::Array(a) => a.nulls().cloned(),
    }
}

/// Intersect the validity of all operands into the output validity.
///
/// This is the null-propagation rule shared by every
/// propagate-nulls kernel: an output slot is null iff any operand's slot
/// is null.
pub fn intersect_validity(args: &[&Datum], len: usize) -> Option<NullBuffer> {
    let mut out: Option<NullBuffer> = None;
    for arg in args {
        let nulls = broadcast_nulls(arg, len);
        out = NullBuffer::union(out.as_ref(), nulls.as_ref());
    }
    out
}

/// Index helper for broadcasting: scalars always read slot 0.
#[inline]
pub fn broadcast_index(is_scalar: bool, i: usize) -> usize {
    if is_scalar {
        0
    } else {
        i
    }
}

/// Build a null datum of the requested shape.
pub fn null_datum(data_type: &DataType, len: usize, scalar: bool) -> Datum {
    if scalar {
        Datum::Scalar(new_null_array(data_type, 1))
    } else {
        Datum::Array(new_null_array(data_type, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use std::sync::Arc;

    #[test]
    fn test_scalar_requires_length_one() {
        let arr: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        assert!(Datum::scalar(arr).is_err());

        let arr: ArrayRef = Arc::new(Int32Array::from(vec![7]));
        let datum = Datum::scalar(arr).unwrap();
        assert!(datum.is_scalar());
        assert_eq!(datum.len(), 1);
    }

    #[test]
    fn test_broadcast_len_mismatch() {
        let a = Datum::array(Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef);
        let b = Datum::array(Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef);
        assert!(broadcast_len(&[&a, &b]).is_err());

        let s = Datum::scalar(Arc::new(Int32Array::from(vec![5])) as ArrayRef).unwrap();
        let (len, all_scalar) = broadcast_len(&[&a, &s]).unwrap();
        assert_eq!(len, 3);
        assert!(!all_scalar);

        let (len, all_scalar) = broadcast_len(&[&s]).unwrap();
        assert_eq!(len, 1);
        assert!(all_scalar);
    }

    #[test]
    fn test_null_scalar_nullifies_broadcast() {
        let null = Datum::null_scalar(&DataType::Int32);
        assert!(null.is_null_scalar());
        let nulls = broadcast_nulls(&null, 4).unwrap();
        assert_eq!(nulls.null_count(), 4);
    }
}
