//! Element trait for generic cell values

use num_traits::{Float, NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a partitioned array cell.
///
/// Bounds the types usable as cell values, ensuring they support the
/// numeric operations and the no-data sentinel convention the policy
/// layer relies on.
pub trait Element:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data sentinel for this type
    fn default_nodata() -> Self;

    /// Check whether this value equals the default no-data sentinel
    fn is_default_nodata(&self) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_element_int {
    ($t:ty) => {
        impl Element for $t {
            fn default_nodata() -> Self {
                <$t>::MAX
            }

            fn is_default_nodata(&self) -> bool {
                *self == <$t>::MAX
            }
        }
    };
}

macro_rules! impl_element_float {
    ($t:ty) => {
        impl Element for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_default_nodata(&self) -> bool {
                self.is_nan()
            }
        }
    };
}

impl_element_int!(u8);
impl_element_int!(u16);
impl_element_int!(u32);
impl_element_int!(u64);
impl_element_float!(f32);
impl_element_float!(f64);

/// Element types that can carry material (water, sediment, ...) through an
/// accumulation. Floating point, so no-data is representable as NaN and
/// fractions/thresholds behave.
pub trait MaterialElement: Element + Float {}

impl<T: Element + Float> MaterialElement for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_nodata_is_nan() {
        let nd = f64::default_nodata();
        assert!(nd.is_nan());
        assert!(nd.is_default_nodata());
        assert!(!1.5_f64.is_default_nodata());
    }

    #[test]
    fn int_nodata_is_max() {
        assert_eq!(u8::default_nodata(), u8::MAX);
        assert!(u8::MAX.is_default_nodata());
        assert!(!0_u8.is_default_nodata());
    }

    #[test]
    fn widening_to_f64() {
        assert_eq!(42_u8.to_f64(), Some(42.0));
        assert_eq!(1.5_f32.to_f64(), Some(1.5));
    }
}
