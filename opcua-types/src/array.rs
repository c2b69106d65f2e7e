// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `Array`: the homogeneous-array payload carried by a `Variant` whose
//! array-flag bit is set (spec §4.1). Optionally carries matrix dimensions;
//! the product of the dimensions must equal the flat value count.

use thiserror::Error;

use crate::variant_type_id::VariantScalarTypeId;
use crate::variant::Variant;

/// Errors raised validating an `Array`'s shape against its declared type
/// and dimensions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArrayError {
    /// Not every value in the array matches `value_type`.
    #[error("Variant array values do not match the declared array type")]
    ContentMismatch,
    /// `dimensions`, multiplied together, does not equal `values.len()`.
    #[error("Variant array dimensions multiplied together do not equal the actual array length")]
    InvalidDimensions,
}

/// A homogeneous array of `Variant` values, optionally shaped into a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    /// The scalar type every element of `values` must hold.
    pub value_type: VariantScalarTypeId,
    /// The flattened (row-major) array contents.
    pub values: Vec<Variant>,
    /// Matrix dimensions, if this is a multi-dimensional array. Their
    /// product must equal `values.len()`.
    pub dimensions: Option<Vec<u32>>,
}

impl Array {
    /// Build a flat (single-dimension) array, validating that every value
    /// matches `value_type`.
    pub fn new(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
    ) -> Result<Self, ArrayError> {
        let values = values.into();
        let array = Array {
            value_type,
            values,
            dimensions: None,
        };
        array.validate_array_type_to_values()?;
        Ok(array)
    }

    /// Build a multi-dimensional array, validating both the element types
    /// and that the dimensions multiply out to the flat length.
    pub fn new_multi(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
        dimensions: impl Into<Vec<u32>>,
    ) -> Result<Self, ArrayError> {
        let values = values.into();
        let dimensions = dimensions.into();
        let array = Array {
            value_type,
            values,
            dimensions: Some(dimensions),
        };
        array.validate_array_type_to_values()?;
        array.validate_dimensions()?;
        Ok(array)
    }

    /// `true` if every value's scalar type id matches `self.value_type`.
    pub fn validate_array_type_to_values(&self) -> Result<(), ArrayError> {
        if self
            .values
            .iter()
            .all(|v| v.scalar_type_id() == self.value_type)
        {
            Ok(())
        } else {
            Err(ArrayError::ContentMismatch)
        }
    }

    /// `true` if `dimensions` (when present) multiply out to `values.len()`.
    pub fn validate_dimensions(&self) -> Result<(), ArrayError> {
        let Some(dimensions) = &self.dimensions else {
            return Ok(());
        };
        let product = dimensions
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
            .ok_or(ArrayError::InvalidDimensions)?;
        if product == self.values.len() {
            Ok(())
        } else {
            Err(ArrayError::InvalidDimensions)
        }
    }

    /// Number of elements in the flattened array.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_array_accepts_matching_types() {
        let values = vec![Variant::Int32(1), Variant::Int32(2), Variant::Int32(3)];
        let array = Array::new(VariantScalarTypeId::Int32, values).unwrap();
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn flat_array_rejects_mismatched_types() {
        let values = vec![Variant::Int32(1), Variant::Boolean(true)];
        assert_eq!(
            Array::new(VariantScalarTypeId::Int32, values).unwrap_err(),
            ArrayError::ContentMismatch
        );
    }

    #[test]
    fn matrix_dimensions_must_multiply_to_length() {
        let values = (0..6).map(Variant::Int32).collect::<Vec<_>>();
        assert!(Array::new_multi(VariantScalarTypeId::Int32, values.clone(), vec![2, 3]).is_ok());
        assert_eq!(
            Array::new_multi(VariantScalarTypeId::Int32, values, vec![2, 2])
                .unwrap_err(),
            ArrayError::InvalidDimensions
        );
    }
}
