//! Index-addressed linked lists over slot storage.
//!
//! Nodes never live behind pointers. Each node sits in a slot of some
//! [`Storage`] and links to its neighbours by key, so relinking is a key
//! update and a broken link shows up as a lookup miss, not a dangling
//! pointer. Every operation checks its preconditions and reports failure as
//! a [`ListError`] instead of panicking.
//!
//! Two lists are provided:
//!
//! ```text
//! IndexedList<T>   - doubly linked, heap-backed by default, positional
//!                    access walks from the nearer end
//! BufferList<T>    - singly linked, nodes carved from a caller buffer,
//!                    never allocates
//! ```
//!
//! # Quick Start
//!
//! ```
//! use nexus_ilist::{IndexedList, ListError};
//!
//! let mut list: IndexedList<u32> = IndexedList::new();
//! list.push_back(0xAAAA_BBBB).unwrap();
//! list.push_back(0xCCCC_DDDD).unwrap();
//! list.insert(1, 0x100).unwrap();
//!
//! assert_eq!(list.get(1), Ok(&0x100));
//! assert_eq!(list.pop_back(), Ok(0xCCCC_DDDD));
//!
//! list.destroy().unwrap();
//! assert_eq!(list.push_back(1), Err(ListError::NullList));
//! ```
//!
//! # Storage
//!
//! `IndexedList` is generic over its storage. [`HeapStorage`] (the default)
//! grows through `Vec::try_reserve` and reports allocator failure as
//! [`ListError::Allocation`]. [`BufferStorage`] never allocates and reports
//! a full buffer as [`ListError::CapacityExhausted`]. With the `slab`
//! feature, `slab::Slab` works as well.
//!
//! ```
//! use nexus_ilist::{BufferStorage, IndexedList, ListError, Node, Slot};
//!
//! let mut buffer: [Slot<Node<u64>>; 2] = [const { Slot::vacant() }; 2];
//! let storage = BufferStorage::new(&mut buffer).unwrap();
//! let mut list = IndexedList::with_storage(storage);
//!
//! list.push_back(1).unwrap();
//! list.push_back(2).unwrap();
//! assert_eq!(list.push_back(3), Err(ListError::CapacityExhausted));
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber. Broken
//! invariants log at `error`, teardown and buffer setup at `debug`, heap
//! growth at `trace`.

#![warn(missing_docs)]

pub mod buffer;
pub mod error;
pub mod key;
pub mod list;
mod render;
pub mod storage;

pub use buffer::{BufNode, BufferList, BufferSlot};
pub use error::{ListError, Result};
pub use key::Key;
pub use list::{IndexedList, Node, Walk};
pub use storage::{AllocError, BufferStorage, Full, HeapStorage, Slot, Storage};
