use crate::{
    loom::{
        atomic::{AtomicPtr, AtomicUsize, Ordering::*},
        UnsafeCell,
    },
    util::{Backoff, CachePadded},
};
use alloc::boxed::Box;
use core::{fmt, mem::MaybeUninit, ptr};


/// A lock-free, multi-producer multi-consumer LIFO stack.
///
/// This is a [Treiber stack]: [`push`] and [`pop`] are compare-and-swap
/// loops on a single atomic head pointer, so neither operation ever blocks on
/// a lock. Under contention an individual call may retry any number of times,
/// but some call always makes progress.
///
/// # Memory reclamation
///
/// A thread in [`pop`] dereferences the head node to read its successor
/// before it knows whether its CAS will succeed. If the node were freed as
/// soon as another thread detached it, that read would be a use-after-free,
/// and a reallocation at the same address could make the CAS succeed when it
/// should not (the ABA problem).
///
/// Instead, `Stack` counts the threads currently inside `pop`. A detached
/// node is only freed by a thread that observes itself to be the *only* one
/// in `pop`; otherwise it is parked on a pending list, which the next lone
/// popper frees in one go. Under sustained concurrent `pop` traffic the
/// pending list can grow until a quiet moment; it is always freed when the
/// stack is dropped.
///
/// A lone popper that claims the pending list and then sees another thread
/// enter `pop` has to put the list back. If nothing was parked in the
/// meantime that is a single CAS; otherwise it walks the claimed list to
/// find its tail, which costs time linear in the number of pending nodes.
///
/// [Treiber stack]: https://en.wikipedia.org/wiki/Treiber_stack
/// [`push`]: Self::push
/// [`pop`]: Self::pop
pub struct Stack<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    /// Number of threads currently inside `pop`.
    poppers: CachePadded<AtomicUsize>,
    /// Detached nodes waiting to be freed. Their values have already been
    /// moved out.
    pending: AtomicPtr<Node<T>>,
}

struct Node<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    next: AtomicPtr<Node<T>>,
}

// === impl Stack ===

impl<T> Stack<T> {
    /// Returns a new, empty stack.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: CachePadded(AtomicPtr::new(ptr::null_mut())),
            poppers: CachePadded(AtomicUsize::new(0)),
            pending: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Returns a new, empty stack.
    #[cfg(all(loom, test))]
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: CachePadded(AtomicPtr::new(ptr::null_mut())),
            poppers: CachePadded(AtomicUsize::new(0)),
            pending: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Pushes `value` onto the top of the stack.
    pub fn push(&self, value: T) {
        test_println!("Stack::push");
        let node = Box::into_raw(Box::new(Node {
            value: UnsafeCell::new(MaybeUninit::new(value)),
            next: AtomicPtr::new(ptr::null_mut()),
        }));

        let mut backoff = Backoff::new();
        let mut head = self.head.load(Relaxed);
        loop {
            unsafe {
                // Safety: `node` is not yet reachable from `head`, so this
                // thread has exclusive access to it.
                (*node).next.store(head, Relaxed);
            }

            match test_dbg!(self
                .head
                .compare_exchange_weak(head, node, Release, Relaxed))
            {
                Ok(_) => {
                    test_println!("-> pushed {:p}", node);
                    return;
                }
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Pops the value on top of the stack, or returns `None` if the stack is
    /// empty.
    pub fn pop(&self) -> Option<T> {
        test_println!("Stack::pop");
        test_dbg!(self.poppers.fetch_add(1, AcqRel));

        let mut backoff = Backoff::new();
        let mut head = self.head.load(Acquire);
        loop {
            if test_dbg!(head.is_null()) {
                self.poppers.fetch_sub(1, AcqRel);
                return None;
            }

            let next = unsafe {
                // Safety: we are counted in `poppers`, so `head` cannot be
                // freed until we leave, even if another thread detaches it
                // first.
                (*head).next.load(Relaxed)
            };

            match test_dbg!(self
                .head
                .compare_exchange_weak(head, next, AcqRel, Acquire))
            {
                Ok(_) => break,
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }

        let value = unsafe {
            // Safety: the CAS detached `head`, making us its sole owner. Only
            // `next` is ever read by other poppers; the value is ours to take.
            // It was initialized by `push` and is only ever taken once.
            (*head).value.with_mut(|value| (*value).as_ptr().read())
        };
        self.reclaim(head);
        Some(value)
    }

    /// Returns `true` if the stack contained no values at the time of the
    /// call.
    ///
    /// With concurrent pushes and pops, the answer may be stale by the time
    /// it is returned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Acquire).is_null()
    }

    /// Frees `node` (whose value has been taken), or defers that if other
    /// threads may still be reading it. Must be called exactly once per
    /// successful `pop`, while still counted in `poppers`.
    fn reclaim(&self, node: *mut Node<T>) {
        // This must be a read-modify-write rather than a load: it has to
        // observe every `fetch_add` that precedes it, so that any popper not
        // counted here entered after our CAS and cannot have seen `node`.
        if test_dbg!(self.poppers.fetch_add(0, AcqRel)) == 1 {
            let pending = self.pending.swap(ptr::null_mut(), AcqRel);

            if test_dbg!(self.poppers.fetch_sub(1, AcqRel)) == 1 {
                // No one entered `pop` since the swap, and everyone who was
                // in it when those nodes were parked has left.
                unsafe {
                    // Safety: the pending nodes are unreachable from `head`
                    // and no popper can hold a pointer to them.
                    free_chain(pending);
                }
            } else if !pending.is_null() {
                // Someone new may have read one of these; put them back.
                test_println!("-> lost race to free pending nodes");
                self.park_chain(pending);
            }

            unsafe {
                // Safety: `node` was detached before we observed ourselves to
                // be the only popper, so no other thread can reach it.
                drop(Box::from_raw(node));
            }
            test_println!("-> freed {:p}", node);
        } else {
            self.park(node, node);
            self.poppers.fetch_sub(1, AcqRel);
            test_println!("-> deferred freeing {:p}", node);
        }
    }

    /// Parks a chain of detached nodes, linked by `next`, on the pending list.
    fn park_chain(&self, first: *mut Node<T>) {
        // Nothing was parked since we claimed the chain: the tail can stay
        // null-terminated.
        if test_dbg!(self
            .pending
            .compare_exchange(ptr::null_mut(), first, AcqRel, Relaxed))
        .is_ok()
        {
            return;
        }

        let mut last = first;
        unsafe {
            // Safety: we exclusively own the chain we took from `pending`.
            loop {
                let next = (*last).next.load(Relaxed);
                if next.is_null() {
                    break;
                }
                last = next;
            }
        }
        self.park(first, last);
    }

    fn park(&self, first: *mut Node<T>, last: *mut Node<T>) {
        let mut backoff = Backoff::new();
        let mut pending = self.pending.load(Relaxed);
        loop {
            unsafe {
                // Safety: the chain is detached and not yet visible through
                // `pending`. Other poppers may still load `last.next`.
                (*last).next.store(pending, Relaxed);
            }

            match self
                .pending
                .compare_exchange_weak(pending, first, AcqRel, Relaxed)
            {
                Ok(_) => return,
                Err(actual) => {
                    pending = actual;
                    backoff.spin();
                }
            }
        }
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        let mut node = self.head.load(Acquire);
        while !node.is_null() {
            let next = unsafe {
                // Safety: `&mut self` means no other thread is in `push` or
                // `pop`; every node reachable from `head` is live and still
                // holds its value.
                let node = Box::from_raw(node);
                node.value
                    .with_mut(|value| ptr::drop_in_place((*value).as_mut_ptr()));
                node.next.load(Relaxed)
            };
            node = next;
        }

        unsafe {
            // Safety: no `pop` is in flight, so nothing can be reading the
            // pending nodes.
            free_chain(self.pending.load(Acquire));
        }
    }
}

impl<T> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("head", &self.head)
            .field("poppers", &self.poppers)
            .field("pending", &self.pending)
            .finish()
    }
}

// Safety: values are moved in by `push` and out by `pop`, never shared, so
// `T: Send` is all the stack needs to be sent or shared between threads.
unsafe impl<T: Send> Send for Stack<T> {}
unsafe impl<T: Send> Sync for Stack<T> {}

/// Frees a chain of detached nodes whose values have already been taken.
///
/// # Safety
///
/// No other thread may hold a pointer to any node in the chain.
unsafe fn free_chain<T>(mut node: *mut Node<T>) {
    while !node.is_null() {
        let next = (*node).next.load(Relaxed);
        // `MaybeUninit` does not drop the (already moved-out) value.
        drop(Box::from_raw(node));
        node = next;
    }
}
