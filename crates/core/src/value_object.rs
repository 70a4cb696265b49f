//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity**; they are defined entirely by their
//! attribute values. A time slot `[14:00, 15:00)` is the same slot wherever it
//! appears, while two reservations of that slot are distinct entities.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one; constructors are the place to enforce their invariants.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
