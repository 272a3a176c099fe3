//! Entity trait: a record whose key survives mutation of its other fields.

/// Keyed record.
///
/// Collections that enforce "at most one record per key" (the cart, for
/// example) look records up through this trait rather than by field name.
pub trait Entity {
    /// Strongly-typed key.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the record key.
    fn id(&self) -> &Self::Id;
}
