//! No-data and domain policies
//!
//! Accumulators and traversal passes are parameterized by small policy
//! values deciding when a cell counts as missing and whether input
//! combinations are in-domain. Policies are pure: they carry no identity
//! and are cheap to copy into worker tasks.

use crate::element::Element;

/// Sentinel-based no-data policy for one input or output array.
///
/// The default policy uses the element type's reserved sentinel (NaN for
/// floats, `MAX` for unsigned integers).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoData<E: Element> {
    sentinel: E,
}

impl<E: Element> Default for NoData<E> {
    fn default() -> Self {
        Self {
            sentinel: E::default_nodata(),
        }
    }
}

impl<E: Element> NoData<E> {
    /// Policy using a caller-chosen sentinel value
    pub fn with_sentinel(sentinel: E) -> Self {
        Self { sentinel }
    }

    /// Whether `value` represents missing data
    pub fn is_no_data(&self, value: E) -> bool {
        // NaN sentinels never compare equal to themselves
        value.is_default_nodata() || value == self.sentinel
    }

    /// Overwrite `value` with the sentinel
    pub fn mark_no_data(&self, value: &mut E) {
        *value = self.sentinel;
    }

    pub fn sentinel(&self) -> E {
        self.sentinel
    }
}

/// How out-of-domain inputs are handled.
///
/// `Lenient` propagates them as no-data in every output; `Strict` treats
/// them as a programming error and panics with the violated predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainMode {
    #[default]
    Lenient,
    Strict,
}

impl DomainMode {
    /// Apply the mode to the outcome of a domain predicate.
    ///
    /// Returns `true` when the inputs are usable; in strict mode an
    /// out-of-domain input aborts with `violation`.
    pub fn check(&self, within_domain: bool, violation: &str) -> bool {
        if !within_domain && *self == DomainMode::Strict {
            panic!("domain violation: {violation}");
        }
        within_domain
    }
}
