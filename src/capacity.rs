//! The capacity value object and the enrollment guards built on it.
//!
//! Both the [`School`](crate::School) aggregate and the selective handler path route
//! their capacity decisions through [`ensure_can_enroll`] and [`ensure_resize_allowed`].

use serde::{Deserialize, Serialize};

use crate::{DomainError, SchoolId};

/// The maximum number of students a school may hold.
///
/// A capacity is strictly positive. It is immutable; resizing a school replaces its
/// capacity with a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Capacity(i32);

impl Capacity {
    /// Creates a capacity, rejecting zero and negative values.
    pub fn new(value: i32) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::Validation(format!(
                "capacity must be positive, got {}",
                value
            )));
        }
        Ok(Capacity(value))
    }

    /// Returns the bound as an integer.
    pub fn value(&self) -> i32 {
        self.0
    }

    /// True when one more student fits next to `current` enrolled students.
    pub fn can_enroll(&self, current: i64) -> bool {
        current < i64::from(self.0)
    }

    /// The number of free seats next to `current` enrolled students.
    pub fn available_spots(&self, current: i64) -> i64 {
        i64::from(self.0) - current
    }
}

impl TryFrom<i32> for Capacity {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Capacity::new(value)
    }
}

impl From<Capacity> for i32 {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}

impl std::fmt::Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fails with `CapacityExceeded` unless one more student fits.
pub fn ensure_can_enroll(
    capacity: Capacity,
    current: i64,
    school_id: SchoolId,
) -> Result<(), DomainError> {
    if capacity.can_enroll(current) {
        Ok(())
    } else {
        Err(DomainError::CapacityExceeded { school_id })
    }
}

/// Fails with a validation error when `new_capacity` is below the current enrollment.
pub fn ensure_resize_allowed(new_capacity: Capacity, current: i64) -> Result<(), DomainError> {
    if i64::from(new_capacity.value()) < current {
        return Err(DomainError::Validation(format!(
            "capacity below current enrollment: new capacity ({}) cannot be less than current enrollment ({})",
            new_capacity, current
        )));
    }
    Ok(())
}
