use crate::util::mutex::Mutex;
use alloc::boxed::Box;
use core::{fmt, mem, ops::ControlFlow};

#[cfg(test)]
mod tests;

/// A singly-linked list with one lock per node.
///
/// Rather than locking the whole list, every operation walks it with
/// *hand-over-hand* locking (lock coupling): the lock on a node's successor
/// is always acquired before the lock on the node itself is released, so a
/// traversal is never left standing on a node that another thread could
/// unlink. A traversal holds at most two adjacent locks at once, and locks
/// are only ever taken front to back, so operations on disjoint parts of the
/// list run in parallel and cannot deadlock with one another.
///
/// The list starts with a sentinel: the lock on the list's own head link,
/// which carries no value and can never be removed. Every operation starts
/// by taking it, so [`push_front`] contends only with operations that are
/// just starting a traversal.
///
/// Traversals do not see a consistent snapshot of the whole list. Each
/// visited value is protected for as long as it is being looked at, but
/// pushes and removals elsewhere in the list may or may not be observed.
///
/// # Callbacks
///
/// The closures passed to [`for_each`], [`find_first_if`] and
/// [`remove_if`] run while a node lock is held. They must not call back
/// into the same list (including through its [`Debug`](fmt::Debug) impl),
/// which would deadlock, and should not block for long. If a callback
/// panics, every lock held by the operation is released as the panic
/// unwinds, and the list remains usable.
///
/// [`push_front`]: Self::push_front
/// [`for_each`]: Self::for_each
/// [`find_first_if`]: Self::find_first_if
/// [`remove_if`]: Self::remove_if
pub struct List<T> {
    /// The sentinel. Guards the link to the first node.
    head: Mutex<Link<T>>,
}

struct Node<T> {
    value: T,
    /// Guards both this node and the link to its successor.
    next: Mutex<Link<T>>,
}

type Link<T> = Option<Box<Node<T>>>;

// === impl List ===

impl<T> List<T> {
    /// Returns a new, empty list.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: Mutex::new(None),
        }
    }

    /// Returns a new, empty list.
    #[cfg(all(loom, test))]
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: Mutex::new(None),
        }
    }

    /// Inserts `value` at the front of the list.
    pub fn push_front(&self, value: T) {
        test_println!("List::push_front");
        let node = Box::new(Node {
            value,
            next: Mutex::new(None),
        });

        let mut head = self.head.lock();
        // The new node is not reachable yet, so this cannot contend.
        *node.next.lock() = head.take();
        *head = Some(node);
    }

    /// Calls `visit` on each value in the list, front to back.
    ///
    /// `visit` runs while holding only the lock of the node being visited.
    pub fn for_each(&self, mut visit: impl FnMut(&T)) {
        test_println!("List::for_each");
        self.walk::<()>(|value| {
            visit(value);
            ControlFlow::Continue(())
        });
    }

    /// Returns a clone of the first value, front to back, for which
    /// `predicate` returns `true`, or `None` if there is no such value.
    pub fn find_first_if(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<T>
    where
        T: Clone,
    {
        test_println!("List::find_first_if");
        self.walk(|value| {
            if predicate(value) {
                ControlFlow::Break(value.clone())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Removes every value for which `predicate` returns `true`, preserving
    /// the order of the rest, and returns how many were removed.
    ///
    /// Each candidate is tested while holding both its own lock and its
    /// predecessor's. Removed values are dropped while the predecessor's lock
    /// is still held.
    pub fn remove_if(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        test_println!("List::remove_if");
        let mut removed = 0;
        let mut prev = self.head.lock();
        loop {
            let node: *const Node<T> = match prev.as_deref() {
                Some(node) => node,
                None => return test_dbg!(removed),
            };
            let node = unsafe {
                // Safety: unlinking a node requires holding its
                // predecessor's lock, which we hold.
                &*node
            };

            let mut next = node.next.lock();
            if test_dbg!(predicate(&node.value)) {
                let successor = next.take();
                // The node's lock must be released before the node is freed.
                drop(next);
                let unlinked = mem::replace(&mut *prev, successor);
                drop(unlinked);
                removed += 1;
                // `prev` now links to the old successor; test that next,
                // without advancing.
            } else {
                drop(prev);
                prev = next;
            }
        }
    }

    /// Returns the number of values in the list.
    ///
    /// This walks the whole list; with concurrent modifications the count
    /// may be stale by the time it is returned.
    pub fn len(&self) -> usize {
        let mut len = 0;
        self.for_each(|_| len += 1);
        len
    }

    /// Returns `true` if the list had no values at the time of the call.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.lock().is_none()
    }

    /// Hand-over-hand traversal shared by `for_each` and `find_first_if`.
    ///
    /// `f` is called with only the visited node's lock held. The walk stops at
    /// the first `Break`, returning its value.
    fn walk<B>(&self, mut f: impl FnMut(&T) -> ControlFlow<B>) -> Option<B> {
        let mut current = self.head.lock();
        loop {
            let node: *const Node<T> = current.as_deref()?;
            let node = unsafe {
                // Safety: the node cannot be unlinked while we hold its
                // predecessor's lock, and once we hold its own lock, it
                // cannot be unlinked until we release it.
                &*node
            };

            let next = node.next.lock();
            drop(current);

            if let ControlFlow::Break(found) = f(&node.value) {
                return Some(found);
            }
            current = next;
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        // Unlink iteratively; letting each `Box` drop its successor would
        // recurse once per node.
        let mut link = self.head.lock().take();
        while let Some(node) = link {
            link = node.next.lock().take();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        self.for_each(|value| {
            list.entry(value);
        });
        list.finish()
    }
}
