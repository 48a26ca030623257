//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity** - they are defined entirely by their
//! attribute values. `Money`, `SplitLine` and `SplitSet` are value objects: two
//! split sets with the same lines are the same ledger posting.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one (e.g. `SplitSet::reversed()` returns a fresh set).
///
/// ```ignore
/// use arledger_core::Money;
///
/// let a = Money::from_cents(2500);
/// let b: Money = "25.00".parse().unwrap();
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
