use crate::{
    loom::{
        atomic::{AtomicBool, Ordering::*},
        UnsafeCell,
    },
    util::Backoff,
};
use core::{fmt, ops};

#[derive(Debug)]
pub(crate) struct Mutex<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

pub(crate) struct MutexGuard<'lock, T> {
    lock: &'lock Mutex<T>,
}

impl<T> Mutex<T> {
    #[cfg(not(all(test, loom)))]
    pub(crate) const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[cfg(all(test, loom))]
    pub(crate) fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        test_println!("locking {}...", core::any::type_name::<T>());
        let mut backoff = Backoff::new();
        while test_dbg!(self.locked.compare_exchange(false, true, AcqRel, Acquire)).is_err() {
            while self.locked.load(Relaxed) {
                backoff.spin_yield();
            }
        }

        test_println!("-> locked {}!", core::any::type_name::<T>());
        MutexGuard { lock: self }
    }
}

impl<T> ops::Deref for MutexGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        self.lock.data.with(|data| unsafe {
            // Safety: the mutex is locked, so no one else can create a
            // mutable access, and the guard borrows the mutex, so it will not
            // be dropped while the guard exists.
            &*data
        })
    }
}

impl<T> ops::DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        self.lock.data.with_mut(|data| unsafe {
            // Safety: as above; `&mut self` makes this the only access.
            &mut *data
        })
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Release);
        test_println!("unlocked!");
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ops::Deref::deref(self).fmt(f)
    }
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}
unsafe impl<T: Sync> Sync for MutexGuard<'_, T> {}

#[cfg(test)]
mod tests {
    use super::Mutex;
    use crate::loom::{self, sync::Arc, thread};

    #[test]
    fn mutual_exclusion() {
        loom::model(|| {
            let lock = Arc::new(Mutex::new(0usize));

            let t1 = {
                let lock = lock.clone();
                thread::spawn(move || {
                    for _ in 0..2 {
                        let mut guard = lock.lock();
                        let n = *guard;
                        // a lost update would show up as a count below 4
                        thread::yield_now();
                        *guard = n + 1;
                    }
                })
            };

            for _ in 0..2 {
                *lock.lock() += 1;
            }
            t1.join().unwrap();

            assert_eq_dbg!(*lock.lock(), 4);
        })
    }

    #[test]
    #[cfg(not(loom))]
    fn panic_releases_guard() {
        use std::panic::{self, AssertUnwindSafe};

        let lock = Mutex::new(1);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.lock();
            panic!("holding the lock");
        }));
        assert_dbg!(result.is_err());

        *lock.lock() += 1;
        assert_eq_dbg!(*lock.lock(), 2);
    }
}
