//! Optimistic version expectations.

/// Expectation about a monotonically increasing version counter.
///
/// Used to make a write conditional on nothing else having written since the
/// caller last looked (compare-and-set).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the counter to be at an exact value.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
