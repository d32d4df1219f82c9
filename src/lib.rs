//! Two concurrent collections built from nodes on the heap:
//!
//! - [`Stack`], a lock-free LIFO stack. `push` and `pop` are compare-and-swap
//!   loops on an atomic head pointer; popped nodes are only freed once no
//!   other thread can still be reading them.
//! - [`List`], a singly-linked list with one lock per node, traversed and
//!   modified with hand-over-hand locking so that threads working on
//!   different parts of the list do not contend.
//!
//! Both are `Send` and `Sync` when their element type is `Send`.
//!
//! # Feature flags
//!
//! - `std` (on by default): nodes in a [`List`] are guarded by
//!   `std::sync::Mutex`. Implies `alloc`.
//! - `alloc`: enables both collections. Without `std`, the crate is
//!   `no_std` and [`List`] nodes are guarded by a spinlock.
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(all(test, not(feature = "std")))]
extern crate std;

#[macro_use]
mod macros;

mod loom;
mod util;

feature! {
    #![feature = "alloc"]
    extern crate alloc;

    mod stack;
    pub use self::stack::Stack;

    mod list;
    pub use self::list::List;
}
