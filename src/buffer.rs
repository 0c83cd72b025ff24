//! Singly linked list over a caller-supplied buffer.
//!
//! [`BufferList`] never allocates: its nodes are carved from a fixed slice
//! of [`BufferSlot`]s handed in at [`init`](BufferList::init). Vacant slots
//! form a free list, so removal returns a slot for reuse in O(1). When every
//! slot is taken, inserts fail with [`ListError::CapacityExhausted`].
//!
//! Only `next` links are kept, so operations at the tail end that need the
//! predecessor (`pop_back`, removing the last index) walk from the head.
//!
//! # Example
//!
//! ```
//! use nexus_ilist::{BufferList, BufferSlot, ListError};
//!
//! let mut buffer: [BufferSlot<u32>; 3] = [const { BufferSlot::vacant() }; 3];
//! let mut list = BufferList::init(&mut buffer).unwrap();
//!
//! list.push_back(2).unwrap();
//! list.push_front(1).unwrap();
//! list.insert(2, 3).unwrap();
//! assert_eq!(list.push_back(4), Err(ListError::CapacityExhausted));
//!
//! assert_eq!(list.get(1), Ok(&2));
//! assert_eq!(list.remove(1), Ok(2));
//! assert_eq!(list.to_string(), "[1, 3]");
//! ```

use core::fmt;
use core::mem;

use crate::error::{Result, internal};
use crate::storage::{BufferStorage, Slot, Storage};
use crate::{Key, ListError, render};

/// A node of a [`BufferList`]: one element plus the link to its successor.
#[derive(Debug)]
pub struct BufNode<T, K: Key = u32> {
    value: T,
    next: K,
}

/// One cell of the buffer backing a [`BufferList`].
pub type BufferSlot<T, K = u32> = Slot<BufNode<T, K>, K>;

/// A singly linked list whose nodes live in a caller-supplied buffer.
pub struct BufferList<'a, T, K: Key = u32> {
    head: K,
    tail: K,
    len: usize,
    storage: BufferStorage<'a, BufNode<T, K>, K>,
}

impl<'a, T, K: Key> BufferList<'a, T, K> {
    /// Builds an empty list over `buffer`.
    ///
    /// Any value still held in the buffer is dropped. The capacity of the
    /// list is the number of slots.
    ///
    /// # Errors
    ///
    /// [`ListError::InitFailure`] if the buffer has no slots or more than
    /// the key type can address.
    pub fn init(buffer: &'a mut [BufferSlot<T, K>]) -> Result<Self> {
        let storage = BufferStorage::new(buffer)?;
        tracing::debug!(capacity = storage.capacity(), "buffer list initialised");
        Ok(Self {
            head: K::NONE,
            tail: K::NONE,
            len: 0,
            storage,
        })
    }

    /// Number of elements.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list holds no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0 && self.head.is_none() && self.tail.is_none()
    }

    /// Number of slots in the backing buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Returns `true` if no slot is left for another element.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.storage.is_full()
    }

    /// Drops every element and returns all slots to the free list.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.head = K::NONE;
        self.tail = K::NONE;
        self.len = 0;
    }

    /// Appends an element after the tail. O(1).
    ///
    /// # Errors
    ///
    /// [`ListError::CapacityExhausted`] if the buffer is full,
    /// [`ListError::Internal`] if the ends are inconsistent.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        self.check_ends()?;
        let key = self.storage.try_insert(BufNode {
            value,
            next: K::NONE,
        })?;

        if self.tail.is_some() {
            self.node_mut(self.tail)?.next = key;
        } else {
            self.head = key;
        }
        self.tail = key;
        self.len += 1;
        Ok(())
    }

    /// Prepends an element before the head. O(1).
    ///
    /// # Errors
    ///
    /// Same as [`push_back`](Self::push_back).
    pub fn push_front(&mut self, value: T) -> Result<()> {
        if self.is_empty() {
            return self.push_back(value);
        }
        self.check_ends()?;
        let key = self.storage.try_insert(BufNode {
            value,
            next: self.head,
        })?;
        self.head = key;
        self.len += 1;
        Ok(())
    }

    /// Removes the head element and returns it. O(1).
    ///
    /// # Errors
    ///
    /// [`ListError::EmptyList`], [`ListError::Internal`].
    pub fn pop_front(&mut self) -> Result<T> {
        self.ensure_populated()?;
        self.check_ends()?;

        let node = self
            .storage
            .remove(self.head)
            .ok_or_else(|| internal("head slot is vacant"))?;
        if self.len == 1 {
            self.tail = K::NONE;
        }
        self.head = node.next;
        self.len -= 1;
        Ok(node.value)
    }

    /// Removes the tail element and returns it.
    ///
    /// O(n): the new tail is found by walking from the head.
    ///
    /// # Errors
    ///
    /// [`ListError::EmptyList`], [`ListError::Internal`].
    pub fn pop_back(&mut self) -> Result<T> {
        self.ensure_populated()?;
        if self.len == 1 {
            return self.pop_front();
        }
        self.check_ends()?;

        let prev = self.key_at(self.len - 2)?;
        if self.node(prev)?.next != self.tail {
            return Err(internal("walk to the tail predecessor missed the tail"));
        }
        let node = self
            .storage
            .remove(self.tail)
            .ok_or_else(|| internal("tail slot is vacant"))?;
        self.node_mut(prev)?.next = K::NONE;
        self.tail = prev;
        self.len -= 1;
        Ok(node.value)
    }

    /// Inserts `value` so that it ends up at `index`.
    ///
    /// Valid indices are `[0, len]`; `len` appends after the tail.
    ///
    /// # Errors
    ///
    /// [`ListError::IndexOutOfBounds`], [`ListError::CapacityExhausted`],
    /// [`ListError::Internal`].
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.ensure_index(index, self.len + 1)?;
        if index == self.len {
            return self.push_back(value);
        }
        if index == 0 {
            return self.push_front(value);
        }

        let prev = self.key_at(index - 1)?;
        let next = self.node(prev)?.next;
        if next.is_none() {
            return Err(internal("interior node has no successor"));
        }
        let key = self.storage.try_insert(BufNode { value, next })?;
        self.node_mut(prev)?.next = key;
        self.len += 1;
        Ok(())
    }

    /// The element at `index`. O(n).
    ///
    /// # Errors
    ///
    /// [`ListError::EmptyList`], [`ListError::IndexOutOfBounds`],
    /// [`ListError::Internal`].
    pub fn get(&self, index: usize) -> Result<&T> {
        let key = self.key_at(index)?;
        Ok(&self.node(key)?.value)
    }

    /// Mutable access to the element at `index`. O(n).
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let key = self.key_at(index)?;
        Ok(&mut self.node_mut(key)?.value)
    }

    /// Overwrites the element at `index`, returning the old one.
    ///
    /// # Errors
    ///
    /// [`ListError::IndexOutOfBounds`], [`ListError::Internal`].
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        self.ensure_index(index, self.len)?;
        let key = self.key_at(index)?;
        Ok(mem::replace(&mut self.node_mut(key)?.value, value))
    }

    /// Removes the element at `index` and returns it.
    ///
    /// # Errors
    ///
    /// [`ListError::EmptyList`], [`ListError::IndexOutOfBounds`],
    /// [`ListError::Internal`].
    pub fn remove(&mut self, index: usize) -> Result<T> {
        self.ensure_populated()?;
        self.ensure_index(index, self.len)?;
        if index == 0 {
            return self.pop_front();
        }
        if index == self.len - 1 {
            return self.pop_back();
        }

        let prev = self.key_at(index - 1)?;
        let target = self.node(prev)?.next;
        let node = self
            .storage
            .remove(target)
            .ok_or_else(|| internal("interior slot is vacant"))?;
        self.node_mut(prev)?.next = node.next;
        self.len -= 1;
        Ok(node.value)
    }

    /// Full O(n) structural check: the chain from the head holds exactly
    /// `len` nodes, ends at the tail, and no other slot is occupied.
    pub fn validate(&self) -> Result<()> {
        self.check_ends()?;
        let mut count = 0;
        let mut last = K::NONE;
        let mut key = self.head;
        while key.is_some() {
            if count == self.len {
                return Err(internal("chain is longer than len"));
            }
            count += 1;
            last = key;
            key = self.node(key)?.next;
        }
        if count != self.len || last != self.tail {
            return Err(internal("chain does not match len and tail"));
        }
        if self.storage.len() != self.len {
            return Err(internal("storage holds nodes outside the chain"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    fn ensure_populated(&self) -> Result<()> {
        if self.len == 0 {
            return Err(ListError::EmptyList);
        }
        Ok(())
    }

    fn ensure_index(&self, index: usize, limit: usize) -> Result<()> {
        if index >= limit {
            return Err(ListError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    fn check_ends(&self) -> Result<()> {
        match self.len {
            0 => {
                if self.head.is_some() || self.tail.is_some() {
                    return Err(internal("empty list has a head or tail"));
                }
            }
            1 => {
                if self.head != self.tail || self.node(self.head)?.next.is_some() {
                    return Err(internal("single node is not both head and tail"));
                }
            }
            _ => {
                if self.head == self.tail || self.node(self.tail)?.next.is_some() {
                    return Err(internal("tail links past the end"));
                }
                self.node(self.head)?;
            }
        }
        Ok(())
    }

    /// Forward walk; a singly linked list has only one direction.
    fn key_at(&self, index: usize) -> Result<K> {
        self.ensure_populated()?;
        self.ensure_index(index, self.len)?;
        if index == self.len - 1 {
            return Ok(self.tail);
        }
        let mut key = self.head;
        for _ in 0..index {
            key = self.node(key)?.next;
        }
        self.node(key)?;
        Ok(key)
    }

    #[inline]
    fn node(&self, key: K) -> Result<&BufNode<T, K>> {
        self.storage
            .get(key)
            .ok_or_else(|| internal("link to a vacant slot"))
    }

    #[inline]
    fn node_mut(&mut self, key: K) -> Result<&mut BufNode<T, K>> {
        self.storage
            .get_mut(key)
            .ok_or_else(|| internal("link to a vacant slot"))
    }

    fn values(&self) -> impl Iterator<Item = &T> + '_ {
        let mut key = self.head;
        (0..self.len).map_while(move |_| {
            let node = self.storage.get(key)?;
            key = node.next;
            Some(&node.value)
        })
    }
}

impl<T: fmt::Display, K: Key> BufferList<'_, T, K> {
    /// Renders the list as `[a, b, c]` into `buf`, returning the text.
    ///
    /// The whole chain is checked first, so a broken list never renders a
    /// truncated sequence.
    ///
    /// # Errors
    ///
    /// [`ListError::InsufficientSize`] if the full text does not fit,
    /// [`ListError::Internal`] if the chain is broken.
    pub fn render_into<'b>(&self, buf: &'b mut [u8]) -> Result<&'b str> {
        self.validate()?;
        render::render_into(self.values(), buf)
    }
}

impl<T: fmt::Display, K: Key> fmt::Display for BufferList<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.validate().map_err(|_| fmt::Error)?;
        render::write_sequence(f, self.values())
    }
}

impl<T: fmt::Debug, K: Key> fmt::Debug for BufferList<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}
