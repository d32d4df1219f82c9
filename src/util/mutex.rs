//! The lock guarding each list node.
//!
//! With `std`, this wraps `std::sync::Mutex` (or loom's, under the model
//! checker) and ignores poisoning. Without `std`, it is a spinlock.

feature! {
    #![feature = "std"]
    pub(crate) use self::std_impl::*;
    mod std_impl;
}

#[cfg(not(feature = "std"))]
pub(crate) use self::spin_impl::*;

#[cfg(not(feature = "std"))]
mod spin_impl;
