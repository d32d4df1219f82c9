use crate::loom;
use core::{
    fmt,
    ops::{Deref, DerefMut},
};

pub(crate) mod mutex;
pub(crate) mod panic;

/// Exponential backoff for compare-and-swap retry loops.
#[derive(Debug)]
pub(crate) struct Backoff(u8);

#[cfg_attr(any(target_arch = "x86_64", target_arch = "aarch64"), repr(align(128)))]
#[cfg_attr(
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    repr(align(64))
)]
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
pub(crate) struct CachePadded<T>(pub(crate) T);

// === impl Backoff ===

impl Backoff {
    const MAX_SPINS: u8 = 6;

    #[inline]
    pub(crate) const fn new() -> Self {
        Self(0)
    }

    /// Spins for an exponentially growing number of iterations, capped at
    /// `1 << MAX_SPINS`.
    #[inline(always)]
    pub(crate) fn spin(&mut self) {
        #[cfg(not(all(loom, test)))]
        for _ in 0..test_dbg!(1 << self.0.min(Self::MAX_SPINS)) {
            loom::hint::spin_loop();
        }

        // loom treats every spin hint as a yield point; one is enough.
        #[cfg(all(loom, test))]
        {
            test_println!("hint::spin_loop() (x{})", 1 << self.0.min(Self::MAX_SPINS));
            loom::hint::spin_loop();
        }

        if self.0 <= Self::MAX_SPINS {
            self.0 += 1;
        }
    }

    /// Like [`spin`](Self::spin), but yields to the OS scheduler once the
    /// spin budget is exhausted.
    #[cfg_attr(feature = "std", allow(dead_code))]
    #[inline(always)]
    pub(crate) fn spin_yield(&mut self) {
        if self.0 <= Self::MAX_SPINS || cfg!(not(any(feature = "std", test))) {
            self.spin();
            return;
        }

        test_println!("thread::yield_now()");
        #[cfg(any(test, feature = "std"))]
        loom::thread::yield_now();
    }
}

// === impl CachePadded ===

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CachePadded<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
