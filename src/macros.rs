//! Internal macros.
//!
//! `zerocopy_accessors!` generates getter and setter pairs for zerocopy
//! struct fields declared with little-endian wrapper types (`U64`), so the
//! master-page header reads naturally at call sites:
//!
//! ```ignore
//! impl MasterPage {
//!     zerocopy_accessors! {
//!         root: u64,
//!         version: u64,
//!     }
//! }
//! // Generates root()/set_root(), version()/set_version(), ...
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u64) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field = ::zerocopy::little_endian::U64::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
