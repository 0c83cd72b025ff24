//! Doubly linked list with index-addressed access.
//!
//! Nodes live in slot storage and link to each other by slot key. The list
//! owns its storage, so every node belongs to exactly one list and is
//! released exactly once.
//!
//! End operations are O(1). Indexed operations walk the chain from whichever
//! end is closer to the target (see [`Walk`]), so the worst case is `len / 2`
//! hops.
//!
//! # Example
//!
//! ```
//! use nexus_ilist::IndexedList;
//!
//! let mut list: IndexedList<u32> = IndexedList::new();
//!
//! list.push_back(1).unwrap();
//! list.push_back(3).unwrap();
//! list.insert(1, 2).unwrap();
//!
//! assert_eq!(list.len(), 3);
//! assert_eq!(list.get(1), Ok(&2));
//!
//! assert_eq!(list.remove(0), Ok(1));
//! assert_eq!(list.pop_back(), Ok(3));
//! assert_eq!(list.pop_front(), Ok(2));
//! assert!(list.is_empty());
//! ```
//!
//! # Teardown
//!
//! [`IndexedList::destroy`] releases every node and invalidates the handle.
//! Any later call, including a second `destroy`, reports
//! [`ListError::NullList`] instead of touching freed state.
//!
//! ```
//! use nexus_ilist::{IndexedList, ListError};
//!
//! let mut list: IndexedList<u32> = IndexedList::new();
//! list.push_back(7).unwrap();
//!
//! list.destroy().unwrap();
//! assert_eq!(list.destroy(), Err(ListError::NullList));
//! assert_eq!(list.push_back(8), Err(ListError::NullList));
//! ```

use core::fmt;
use core::marker::PhantomData;
use core::mem;

use crate::error::{Result, internal};
use crate::storage::{HeapStorage, Storage};
use crate::{Key, ListError, render};

/// A node of an [`IndexedList`]: one element plus links to its neighbours.
#[derive(Debug)]
pub struct Node<T, K: Key = u32> {
    pub(crate) value: T,
    pub(crate) prev: K,
    pub(crate) next: K,
}

impl<T, K: Key> Node<T, K> {
    #[inline]
    fn new(value: T, prev: K, next: K) -> Self {
        Self { value, prev, next }
    }

    /// The stored element.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns `true` unless this node is the head.
    #[inline]
    pub fn has_prev(&self) -> bool {
        self.prev.is_some()
    }

    /// Returns `true` unless this node is the tail.
    #[inline]
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Which end a traversal to an index starts from, and how many hops it takes.
///
/// The forward distance is `index`, the backward distance `len - 1 - index`.
/// The walk starts at the tail only when that is strictly shorter, so ties
/// start at the head.
///
/// ```
/// use nexus_ilist::Walk;
///
/// assert_eq!(Walk::for_index(1, 10), Some(Walk::FromHead(1)));
/// assert_eq!(Walk::for_index(8, 10), Some(Walk::FromTail(1)));
/// assert_eq!(Walk::for_index(2, 5), Some(Walk::FromHead(2)));
/// assert_eq!(Walk::for_index(5, 5), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Follow `next` links this many times from the head.
    FromHead(usize),
    /// Follow `prev` links this many times from the tail.
    FromTail(usize),
}

impl Walk {
    /// Plans the walk to `index` in a list of `len` elements.
    ///
    /// Returns `None` unless `index < len`.
    #[inline]
    pub const fn for_index(index: usize, len: usize) -> Option<Self> {
        if index >= len {
            return None;
        }
        let backward = len - 1 - index;
        if backward < index {
            Some(Walk::FromTail(backward))
        } else {
            Some(Walk::FromHead(index))
        }
    }

    /// Number of links followed.
    #[inline]
    pub const fn hops(self) -> usize {
        match self {
            Walk::FromHead(hops) | Walk::FromTail(hops) => hops,
        }
    }
}

/// A doubly linked list addressed by position.
///
/// # Type Parameters
///
/// - `T`: element type, stored by value
/// - `S`: node storage, [`HeapStorage`] by default
/// - `K`: slot key type (default `u32`)
///
/// # Example
///
/// ```
/// use nexus_ilist::{BufferStorage, IndexedList, Node, Slot};
///
/// // Same list, nodes carved from a fixed buffer instead of the heap.
/// let mut buffer: [Slot<Node<u32>>; 4] = [const { Slot::vacant() }; 4];
/// let storage = BufferStorage::new(&mut buffer).unwrap();
/// let mut list = IndexedList::with_storage(storage);
///
/// list.push_back(10).unwrap();
/// list.push_front(5).unwrap();
/// assert_eq!(list.get(0), Ok(&5));
/// ```
pub struct IndexedList<T, S = HeapStorage<Node<T>>, K: Key = u32>
where
    S: Storage<Node<T, K>, Key = K>,
{
    head: K,
    tail: K,
    len: usize,
    /// `None` once the list has been destroyed.
    storage: Option<S>,
    _marker: PhantomData<T>,
}

impl<T> IndexedList<T> {
    /// Creates an empty list over heap storage. Does not allocate.
    #[inline]
    pub const fn new() -> Self {
        Self::with_storage(HeapStorage::new())
    }

    /// Creates an empty list with room for `capacity` nodes.
    ///
    /// # Errors
    ///
    /// [`ListError::Allocation`] if the nodes cannot be reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self::with_storage(HeapStorage::with_capacity(capacity)?))
    }
}

impl<T> Default for IndexedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Handle, length and invariants
// =============================================================================

impl<T, S, K: Key> IndexedList<T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    /// Creates an empty list over `storage`.
    ///
    /// The storage should be empty; the list only ever follows keys it
    /// inserted itself, so values already stored are left alone.
    #[inline]
    pub const fn with_storage(storage: S) -> Self {
        Self {
            head: K::NONE,
            tail: K::NONE,
            len: 0,
            storage: Some(storage),
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the handle is live and holds no element.
    ///
    /// A destroyed handle is invalid rather than empty, so this is `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_some() && self.len == 0 && self.head.is_none() && self.tail.is_none()
    }

    /// Returns `true` once [`destroy`](Self::destroy) has run.
    #[inline]
    pub const fn is_destroyed(&self) -> bool {
        self.storage.is_none()
    }

    /// Releases every node and invalidates the handle.
    ///
    /// Nodes are released from head to tail, each exactly once, before the
    /// storage itself is dropped.
    ///
    /// # Errors
    ///
    /// - [`ListError::NullList`] if the list was already destroyed
    /// - [`ListError::Internal`] if the chain did not hold `len` nodes; the
    ///   handle is destroyed regardless
    pub fn destroy(&mut self) -> Result<()> {
        let mut storage = self.storage.take().ok_or(ListError::NullList)?;
        let (released, intact) = Self::release_chain(&mut storage, self.head, self.len);

        self.head = K::NONE;
        self.tail = K::NONE;
        self.len = 0;
        drop(storage);

        tracing::debug!(released, "list destroyed");
        if !intact {
            return Err(internal("teardown found a chain of a different length than len"));
        }
        Ok(())
    }

    /// Removes every element, keeping the handle and its storage.
    pub fn clear(&mut self) -> Result<()> {
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;
        let (_, intact) = Self::release_chain(storage, self.head, self.len);

        self.head = K::NONE;
        self.tail = K::NONE;
        self.len = 0;

        if !intact {
            return Err(internal("clear found a chain of a different length than len"));
        }
        Ok(())
    }

    /// Walks from `head` removing nodes, never more than `len` of them.
    ///
    /// Returns how many were released and whether the chain held exactly
    /// `len` nodes.
    fn release_chain(storage: &mut S, head: K, len: usize) -> (usize, bool) {
        let mut released = 0;
        let mut key = head;
        while key.is_some() && released < len {
            let Some(node) = storage.remove(key) else {
                break;
            };
            released += 1;
            key = node.next;
        }
        (released, released == len && key.is_none())
    }

    /// O(1) check of the head/tail invariants.
    ///
    /// - empty: head and tail both unset
    /// - one element: head == tail, no neighbours
    /// - more: head has no prev, tail has no next, head != tail
    fn check_ends(&self) -> Result<()> {
        let storage = self.storage.as_ref().ok_or(ListError::NullList)?;

        match self.len {
            0 => {
                if self.head.is_some() || self.tail.is_some() {
                    return Err(internal("empty list has a head or tail"));
                }
            }
            1 => {
                if self.head != self.tail || self.head.is_none() {
                    return Err(internal("single-element list with distinct head and tail"));
                }
                let node = storage
                    .get(self.head)
                    .ok_or_else(|| internal("head slot is vacant"))?;
                if node.prev.is_some() || node.next.is_some() {
                    return Err(internal("single node has neighbours"));
                }
            }
            _ => {
                if self.head.is_none() || self.tail.is_none() || self.head == self.tail {
                    return Err(internal("multi-element list with collapsed ends"));
                }
                let head = storage
                    .get(self.head)
                    .ok_or_else(|| internal("head slot is vacant"))?;
                let tail = storage
                    .get(self.tail)
                    .ok_or_else(|| internal("tail slot is vacant"))?;
                if head.prev.is_some() || tail.next.is_some() {
                    return Err(internal("head or tail links past the end"));
                }
            }
        }
        Ok(())
    }

    /// Full O(n) structural check.
    ///
    /// Walks head to tail verifying that every `prev` link mirrors the
    /// `next` link before it, that the walk ends at the tail after exactly
    /// `len` nodes, and that the storage holds no other nodes.
    pub fn validate(&self) -> Result<()> {
        self.check_ends()?;
        let storage = self.storage.as_ref().ok_or(ListError::NullList)?;

        let mut count = 0;
        let mut prev = K::NONE;
        let mut key = self.head;
        while key.is_some() {
            if count == self.len {
                return Err(internal("chain is longer than len"));
            }
            let node = storage
                .get(key)
                .ok_or_else(|| internal("link to a vacant slot"))?;
            if node.prev != prev {
                return Err(internal("prev link does not mirror next link"));
            }
            count += 1;
            prev = key;
            key = node.next;
        }

        if count != self.len {
            return Err(internal("chain is shorter than len"));
        }
        if prev != self.tail {
            return Err(internal("chain does not end at tail"));
        }
        if storage.len() != self.len {
            return Err(internal("storage holds nodes outside the chain"));
        }
        Ok(())
    }
}

// =============================================================================
// End operations
// =============================================================================

impl<T, S, K: Key> IndexedList<T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    /// Appends an element after the tail. O(1).
    ///
    /// # Errors
    ///
    /// - [`ListError::NullList`] if destroyed
    /// - [`ListError::Allocation`] / [`ListError::CapacityExhausted`] if the
    ///   storage refuses the node
    /// - [`ListError::Internal`] if the ends are inconsistent
    pub fn push_back(&mut self, value: T) -> Result<()> {
        self.check_ends()?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;

        let key = storage
            .try_insert(Node::new(value, self.tail, K::NONE))
            .map_err(Into::<ListError>::into)?;

        if self.tail.is_some() {
            node_mut(storage, self.tail)?.next = key;
        } else {
            self.head = key;
        }
        self.tail = key;
        self.len += 1;
        Ok(())
    }

    /// Prepends an element before the head. O(1).
    ///
    /// On an empty list this is the same as [`push_back`](Self::push_back).
    ///
    /// # Errors
    ///
    /// Same as [`push_back`](Self::push_back).
    pub fn push_front(&mut self, value: T) -> Result<()> {
        if self.is_empty() {
            return self.push_back(value);
        }
        self.check_ends()?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;

        let key = storage
            .try_insert(Node::new(value, K::NONE, self.head))
            .map_err(Into::<ListError>::into)?;

        node_mut(storage, self.head)?.prev = key;
        self.head = key;
        self.len += 1;
        Ok(())
    }

    /// Removes the tail element and returns it. O(1).
    ///
    /// Drop the returned value to discard it.
    ///
    /// # Errors
    ///
    /// - [`ListError::NullList`] if destroyed
    /// - [`ListError::EmptyList`] if there is nothing to pop; the list is
    ///   untouched and the call may be repeated
    /// - [`ListError::Internal`] if the tail links are inconsistent
    pub fn pop_back(&mut self) -> Result<T> {
        self.ensure_populated()?;
        self.check_ends()?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;

        let key = self.tail;
        let prev = node_ref(storage, key)?.prev;
        if self.len > 1 {
            if prev.is_none() || prev == key {
                return Err(internal("tail predecessor is missing or the tail itself"));
            }
            node_ref(storage, prev)?;
        }

        let node = storage
            .remove(key)
            .ok_or_else(|| internal("tail slot is vacant"))?;

        if self.len == 1 {
            self.head = K::NONE;
            self.tail = K::NONE;
        } else {
            node_mut(storage, prev)?.next = K::NONE;
            self.tail = prev;
        }
        self.len -= 1;
        Ok(node.value)
    }

    /// Removes the head element and returns it. O(1).
    ///
    /// # Errors
    ///
    /// Same as [`pop_back`](Self::pop_back).
    pub fn pop_front(&mut self) -> Result<T> {
        self.ensure_populated()?;
        self.check_ends()?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;

        let key = self.head;
        let next = node_ref(storage, key)?.next;
        if self.len > 1 {
            if next.is_none() || next == key {
                return Err(internal("head successor is missing or the head itself"));
            }
            node_ref(storage, next)?;
        }

        let node = storage
            .remove(key)
            .ok_or_else(|| internal("head slot is vacant"))?;

        if self.len == 1 {
            self.head = K::NONE;
            self.tail = K::NONE;
        } else {
            node_mut(storage, next)?.prev = K::NONE;
            self.head = next;
        }
        self.len -= 1;
        Ok(node.value)
    }

    /// The head element.
    pub fn front(&self) -> Result<&T> {
        self.ensure_populated()?;
        let storage = self.storage.as_ref().ok_or(ListError::NullList)?;
        Ok(&node_ref(storage, self.head)?.value)
    }

    /// The tail element.
    pub fn back(&self) -> Result<&T> {
        self.ensure_populated()?;
        let storage = self.storage.as_ref().ok_or(ListError::NullList)?;
        Ok(&node_ref(storage, self.tail)?.value)
    }

    /// `NullList` if destroyed, `EmptyList` if there is no element.
    #[inline]
    fn ensure_populated(&self) -> Result<()> {
        if self.storage.is_none() {
            return Err(ListError::NullList);
        }
        if self.len == 0 {
            return Err(ListError::EmptyList);
        }
        Ok(())
    }

    /// `NullList` if destroyed, `IndexOutOfBounds` unless `index < limit`.
    #[inline]
    fn ensure_index(&self, index: usize, limit: usize) -> Result<()> {
        if self.storage.is_none() {
            return Err(ListError::NullList);
        }
        if index >= limit {
            return Err(ListError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Indexed operations
// =============================================================================

impl<T, S, K: Key> IndexedList<T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    /// Plans the traversal to `index` without performing it.
    ///
    /// # Errors
    ///
    /// [`ListError::NullList`], [`ListError::EmptyList`],
    /// [`ListError::IndexOutOfBounds`] outside `[0, len)`.
    pub fn walk_for(&self, index: usize) -> Result<Walk> {
        self.ensure_populated()?;
        self.ensure_index(index, self.len)?;
        Walk::for_index(index, self.len).ok_or_else(|| internal("walk planned past the end"))
    }

    /// Returns the node at `index`, walking from the nearer end.
    ///
    /// This is the traversal every indexed operation is built on. O(n).
    ///
    /// # Errors
    ///
    /// - [`ListError::NullList`], [`ListError::EmptyList`]
    /// - [`ListError::IndexOutOfBounds`] outside `[0, len)`
    /// - [`ListError::Internal`] if the walk runs off the chain
    pub fn iterate_to(&self, index: usize) -> Result<&Node<T, K>> {
        let key = self.key_at(index)?;
        let storage = self.storage.as_ref().ok_or(ListError::NullList)?;
        node_ref(storage, key)
    }

    fn key_at(&self, index: usize) -> Result<K> {
        let walk = self.walk_for(index)?;
        self.check_ends()?;
        let storage = self.storage.as_ref().ok_or(ListError::NullList)?;

        let (mut key, backward) = match walk {
            Walk::FromHead(_) => (self.head, false),
            Walk::FromTail(_) => (self.tail, true),
        };
        for _ in 0..walk.hops() {
            let node = storage
                .get(key)
                .ok_or_else(|| internal("walk ran off the chain"))?;
            key = if backward { node.prev } else { node.next };
        }

        if storage.get(key).is_none() {
            return Err(internal("walk ran off the chain"));
        }
        Ok(key)
    }

    /// Inserts `value` so that it ends up at `index`.
    ///
    /// Valid indices are `[0, len]`: `len` appends after the tail, `0`
    /// prepends, anything between is spliced in before the current
    /// occupant of `index`.
    ///
    /// # Errors
    ///
    /// - [`ListError::NullList`]
    /// - [`ListError::IndexOutOfBounds`] outside `[0, len]`
    /// - [`ListError::Allocation`] / [`ListError::CapacityExhausted`]
    /// - [`ListError::Internal`] if the traversal fails
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.ensure_index(index, self.len + 1)?;
        if index == self.len {
            return self.push_back(value);
        }
        if index == 0 {
            return self.push_front(value);
        }

        let at = self.key_at(index)?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;

        let prev = node_ref(storage, at)?.prev;
        if prev.is_none() {
            return Err(internal("interior node has no predecessor"));
        }
        node_ref(storage, prev)?;

        let key = storage
            .try_insert(Node::new(value, prev, at))
            .map_err(Into::<ListError>::into)?;
        node_mut(storage, prev)?.next = key;
        node_mut(storage, at)?.prev = key;
        self.len += 1;
        Ok(())
    }

    /// Overwrites the element at `index`, returning the old one.
    ///
    /// Valid indices are `[0, len)`; there is no append sense.
    ///
    /// # Errors
    ///
    /// [`ListError::NullList`], [`ListError::IndexOutOfBounds`],
    /// [`ListError::Internal`].
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        self.ensure_index(index, self.len)?;
        let key = self.key_at(index)?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;
        Ok(mem::replace(&mut node_mut(storage, key)?.value, value))
    }

    /// The element at `index`.
    ///
    /// O(n): every call walks from the nearer end.
    ///
    /// # Errors
    ///
    /// [`ListError::NullList`], [`ListError::EmptyList`],
    /// [`ListError::IndexOutOfBounds`], [`ListError::Internal`].
    pub fn get(&self, index: usize) -> Result<&T> {
        Ok(self.iterate_to(index)?.value())
    }

    /// Mutable access to the element at `index`. O(n).
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let key = self.key_at(index)?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;
        Ok(&mut node_mut(storage, key)?.value)
    }

    /// Removes the element at `index` and returns it.
    ///
    /// Valid indices are `[0, len)`. The last index pops the tail, `0` pops
    /// the head, anything between is spliced out.
    ///
    /// # Errors
    ///
    /// - [`ListError::NullList`], [`ListError::EmptyList`]
    /// - [`ListError::IndexOutOfBounds`] outside `[0, len)`
    /// - [`ListError::Internal`] if an interior node lacks a neighbour
    pub fn remove(&mut self, index: usize) -> Result<T> {
        self.ensure_populated()?;
        self.ensure_index(index, self.len)?;
        if index == self.len - 1 {
            return self.pop_back();
        }
        if index == 0 {
            return self.pop_front();
        }

        let key = self.key_at(index)?;
        let storage = self.storage.as_mut().ok_or(ListError::NullList)?;

        let node = node_ref(storage, key)?;
        let (prev, next) = (node.prev, node.next);
        if prev.is_none() || next.is_none() {
            return Err(internal("interior node lacks a neighbour"));
        }
        node_ref(storage, prev)?;
        node_ref(storage, next)?;

        let node = storage
            .remove(key)
            .ok_or_else(|| internal("interior slot is vacant"))?;
        node_mut(storage, prev)?.next = next;
        node_mut(storage, next)?.prev = prev;
        self.len -= 1;
        Ok(node.value)
    }
}

// =============================================================================
// Rendering
// =============================================================================

impl<T: fmt::Display, S, K: Key> IndexedList<T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    /// Renders the list as `[a, b, c]` into `buf`, returning the text.
    ///
    /// ```
    /// use nexus_ilist::{IndexedList, ListError};
    ///
    /// let mut list: IndexedList<u32> = IndexedList::new();
    /// for v in [4, 8, 15] {
    ///     list.push_back(v).unwrap();
    /// }
    ///
    /// let mut buf = [0u8; 32];
    /// assert_eq!(list.render_into(&mut buf), Ok("[4, 8, 15]"));
    ///
    /// let mut small = [0u8; 4];
    /// assert!(matches!(
    ///     list.render_into(&mut small),
    ///     Err(ListError::InsufficientSize { needed: 10, available: 4 })
    /// ));
    /// ```
    ///
    /// # Errors
    ///
    /// - [`ListError::NullList`] if destroyed
    /// - [`ListError::InsufficientSize`] if the full text does not fit; the
    ///   buffer contents are unspecified then
    /// - [`ListError::Internal`] if the chain is broken; nothing partial is
    ///   ever rendered
    pub fn render_into<'b>(&self, buf: &'b mut [u8]) -> Result<&'b str> {
        self.validate()?;
        render::render_into(self.values(), buf)
    }
}

impl<T, S, K: Key> IndexedList<T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    /// Head-to-tail walk over the elements, for formatting.
    fn values(&self) -> Values<'_, T, S, K> {
        Values {
            storage: self.storage.as_ref(),
            key: self.head,
            remaining: self.len,
            _marker: PhantomData,
        }
    }
}

struct Values<'a, T, S, K: Key> {
    storage: Option<&'a S>,
    key: K,
    remaining: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: 'a, S, K: Key + 'a> Iterator for Values<'a, T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.storage?.get(self.key)?;
        self.key = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }
}

/// A destroyed list prints `IndexedList(<destroyed>)`. A broken chain is a
/// formatting error rather than a truncated sequence.
impl<T: fmt::Display, S, K: Key> fmt::Display for IndexedList<T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_destroyed() {
            return f.write_str(DESTROYED);
        }
        self.validate().map_err(|_| fmt::Error)?;
        render::write_sequence(f, self.values())
    }
}

impl<T: fmt::Debug, S, K: Key> fmt::Debug for IndexedList<T, S, K>
where
    S: Storage<Node<T, K>, Key = K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_destroyed() {
            return f.write_str(DESTROYED);
        }
        f.debug_list().entries(self.values()).finish()
    }
}

const DESTROYED: &str = "IndexedList(<destroyed>)";

#[inline]
fn node_ref<T, S, K>(storage: &S, key: K) -> Result<&Node<T, K>>
where
    K: Key,
    S: Storage<Node<T, K>, Key = K>,
{
    storage.get(key).ok_or_else(|| internal("link to a vacant slot"))
}

#[inline]
fn node_mut<T, S, K>(storage: &mut S, key: K) -> Result<&mut Node<T, K>>
where
    K: Key,
    S: Storage<Node<T, K>, Key = K>,
{
    storage
        .get_mut(key)
        .ok_or_else(|| internal("link to a vacant slot"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{AllocError, BufferStorage, Slot};

    type TestList = IndexedList<u32>;

    fn list_of(values: &[u32]) -> TestList {
        let mut list = TestList::new();
        for &v in values {
            list.push_back(v).unwrap();
        }
        list
    }

    fn contents(list: &TestList) -> Vec<u32> {
        (0..list.len()).map(|i| *list.get(i).unwrap()).collect()
    }

    #[test]
    fn new_list_is_empty() {
        let list = TestList::new();
        assert!(list.is_empty());
        assert!(!list.is_destroyed());
        assert_eq!(list.len(), 0);
        assert!(list.head.is_none());
        assert!(list.tail.is_none());
        list.validate().unwrap();
    }

    #[test]
    fn push_back_pop_back_is_a_stack() {
        let mut list = TestList::new();
        list.push_back(0xAAAA_BBBB).unwrap();
        list.push_back(0xCCCC_DDDD).unwrap();
        list.push_back(0xEEEE_FFFF).unwrap();
        list.validate().unwrap();

        assert_eq!(list.pop_back(), Ok(0xEEEE_FFFF));
        assert_eq!(list.pop_back(), Ok(0xCCCC_DDDD));
        assert_eq!(list.pop_back(), Ok(0xAAAA_BBBB));
        assert_eq!(list.pop_back(), Err(ListError::EmptyList));
        assert!(list.is_empty());
    }

    #[test]
    fn push_front_then_pop_back_is_a_queue() {
        let mut list = TestList::new();
        for v in [1111, 2222, 3333] {
            list.push_front(v).unwrap();
        }
        assert_eq!(list.front(), Ok(&3333));
        assert_eq!(list.back(), Ok(&1111));

        assert_eq!(list.pop_back(), Ok(1111));
        assert_eq!(list.pop_back(), Ok(2222));
        assert_eq!(list.pop_back(), Ok(3333));
        assert!(list.is_empty());
    }

    #[test]
    fn push_front_then_pop_front_is_a_stack() {
        let mut list = TestList::new();
        for v in [1111, 2222, 3333] {
            list.push_front(v).unwrap();
        }
        assert_eq!(list.pop_front(), Ok(3333));
        assert_eq!(list.pop_front(), Ok(2222));
        assert_eq!(list.pop_front(), Ok(1111));
        assert_eq!(list.pop_front(), Err(ListError::EmptyList));
    }

    #[test]
    fn push_front_on_empty_collapses_ends() {
        let mut list = TestList::new();
        list.push_front(6000).unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list.head, list.tail);
        let node = list.iterate_to(0).unwrap();
        assert!(!node.has_prev());
        assert!(!node.has_next());
        assert_eq!(list.pop_front(), Ok(6000));
        assert!(list.is_empty());
    }

    #[test]
    fn popped_value_may_be_discarded() {
        let mut list = list_of(&[1]);
        let _ = list.pop_back();
        assert!(list.is_empty());
        assert_eq!(list.pop_back(), Err(ListError::EmptyList));
    }

    #[test]
    fn empty_pops_do_not_mutate() {
        let mut list = TestList::new();
        for _ in 0..3 {
            assert_eq!(list.pop_back(), Err(ListError::EmptyList));
            assert_eq!(list.pop_front(), Err(ListError::EmptyList));
            assert_eq!(list.remove(0), Err(ListError::EmptyList));
        }
        assert!(list.is_empty());
        list.validate().unwrap();
    }

    #[test]
    fn walk_plan_prefers_nearer_end() {
        // Odd length: the middle is a tie and goes from the head.
        assert_eq!(Walk::for_index(0, 5), Some(Walk::FromHead(0)));
        assert_eq!(Walk::for_index(1, 5), Some(Walk::FromHead(1)));
        assert_eq!(Walk::for_index(2, 5), Some(Walk::FromHead(2)));
        assert_eq!(Walk::for_index(3, 5), Some(Walk::FromTail(1)));
        assert_eq!(Walk::for_index(4, 5), Some(Walk::FromTail(0)));

        // Even length: no tie, the halves split cleanly.
        assert_eq!(Walk::for_index(1, 4), Some(Walk::FromHead(1)));
        assert_eq!(Walk::for_index(2, 4), Some(Walk::FromTail(1)));

        assert_eq!(Walk::for_index(0, 1), Some(Walk::FromHead(0)));
    }

    #[test]
    fn walk_past_the_end_has_no_plan() {
        assert_eq!(Walk::for_index(0, 0), None);
        assert_eq!(Walk::for_index(3, 3), None);
        assert_eq!(Walk::for_index(usize::MAX, 3), None);
        assert_eq!(Walk::for_index(usize::MAX - 1, usize::MAX), Some(Walk::FromTail(0)));
    }

    #[test]
    fn walk_never_exceeds_half_the_list() {
        for len in 1..=33 {
            for index in 0..len {
                let walk = Walk::for_index(index, len).unwrap();
                assert!(walk.hops() <= len / 2, "len {len} index {index}: {walk:?}");
                assert_eq!(walk.hops(), index.min(len - 1 - index));
            }
        }
    }

    #[test]
    fn iterate_to_agrees_in_both_directions() {
        for len in 1..=12u32 {
            let values: Vec<u32> = (0..len).map(|i| i * 10).collect();
            let list = list_of(&values);
            for (index, expected) in values.iter().enumerate() {
                assert_eq!(list.iterate_to(index).unwrap().value(), expected);
            }
        }
    }

    #[test]
    fn iterate_to_after_front_pop() {
        let mut list = list_of(&[5, 6, 7, 8]);
        assert_eq!(list.iterate_to(2).unwrap().value(), &7);
        assert_eq!(list.pop_front(), Ok(5));
        assert_eq!(list.iterate_to(0).unwrap().value(), &6);
        assert_eq!(list.walk_for(2), Ok(Walk::FromTail(0)));
    }

    #[test]
    fn iterate_to_errors() {
        let mut list = TestList::new();
        assert_eq!(list.iterate_to(0).err(), Some(ListError::EmptyList));

        list.push_back(11).unwrap();
        assert_eq!(
            list.iterate_to(1).err(),
            Some(ListError::IndexOutOfBounds { index: 1, len: 1 })
        );
        assert_eq!(
            list.iterate_to(usize::MAX).err(),
            Some(ListError::IndexOutOfBounds {
                index: usize::MAX,
                len: 1
            })
        );

        list.destroy().unwrap();
        assert_eq!(list.iterate_to(0).err(), Some(ListError::NullList));
    }

    #[test]
    fn insert_interior_relinks_both_neighbours() {
        let mut list = list_of(&[0, 1, 2, 3, 4, 5]);

        list.insert(1, 100).unwrap(); // walked from the head
        list.insert(5, 200).unwrap(); // walked from the tail
        list.validate().unwrap();

        assert_eq!(contents(&list), vec![0, 100, 1, 2, 3, 200, 4, 5]);

        // Walking backwards must see the new nodes too.
        let mut backwards = Vec::new();
        while let Ok(v) = list.pop_back() {
            backwards.push(v);
        }
        assert_eq!(backwards, vec![5, 4, 200, 3, 2, 1, 100, 0]);
    }

    #[test]
    fn insert_at_ends_delegates() {
        let mut list = TestList::new();
        list.insert(0, 2).unwrap(); // empty: push_back
        list.insert(0, 1).unwrap(); // front
        list.insert(2, 3).unwrap(); // len: push_back
        assert_eq!(contents(&list), vec![1, 2, 3]);
        list.validate().unwrap();
    }

    #[test]
    fn insert_bounds() {
        let mut list = list_of(&[0, 1, 2]);
        assert_eq!(
            list.insert(4, 0x404),
            Err(ListError::IndexOutOfBounds { index: 4, len: 3 })
        );
        assert_eq!(list.len(), 3);
        list.insert(3, 3).unwrap();
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut list = list_of(&[0, 1, 2]);
        assert_eq!(list.set(0, 0x111), Ok(0));
        assert_eq!(list.set(1, 0x222), Ok(1));
        assert_eq!(list.set(2, 0x333), Ok(2));
        assert_eq!(
            list.set(3, 0x404),
            Err(ListError::IndexOutOfBounds { index: 3, len: 3 })
        );
        assert_eq!(contents(&list), vec![0x111, 0x222, 0x333]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn set_on_empty_is_out_of_bounds() {
        let mut list = TestList::new();
        assert_eq!(
            list.set(0, 1),
            Err(ListError::IndexOutOfBounds { index: 0, len: 0 })
        );
    }

    #[test]
    fn get_mut_writes_through() {
        let mut list = list_of(&[1, 2, 3]);
        *list.get_mut(1).unwrap() += 40;
        assert_eq!(list.get(1), Ok(&42));
    }

    #[test]
    fn remove_interior_and_ends() {
        let mut list = list_of(&[0x111, 0x222, 0x333, 0x444]);

        assert_eq!(list.remove(1), Ok(0x222));
        list.validate().unwrap();
        assert_eq!(list.remove(2), Ok(0x444));
        assert_eq!(list.remove(0), Ok(0x111));
        assert_eq!(list.remove(0), Ok(0x333));
        assert_eq!(list.remove(0), Err(ListError::EmptyList));
        list.validate().unwrap();
    }

    #[test]
    fn remove_out_of_bounds() {
        let mut list = list_of(&[1, 2, 3]);
        assert_eq!(
            list.remove(3),
            Err(ListError::IndexOutOfBounds { index: 3, len: 3 })
        );
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn clear_keeps_handle() {
        let mut list = list_of(&[1, 2, 3]);
        list.clear().unwrap();
        assert!(list.is_empty());
        list.push_back(4).unwrap();
        assert_eq!(contents(&list), vec![4]);
        list.validate().unwrap();
    }

    #[test]
    fn destroy_invalidates_handle() {
        let mut list = list_of(&[1, 2, 3]);
        list.destroy().unwrap();

        assert!(list.is_destroyed());
        assert!(!list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.destroy(), Err(ListError::NullList));
        assert_eq!(list.push_back(1), Err(ListError::NullList));
        assert_eq!(list.push_front(1), Err(ListError::NullList));
        assert_eq!(list.pop_back(), Err(ListError::NullList));
        assert_eq!(list.pop_front(), Err(ListError::NullList));
        assert_eq!(list.insert(0, 1), Err(ListError::NullList));
        assert_eq!(list.set(0, 1), Err(ListError::NullList));
        assert_eq!(list.get(0), Err(ListError::NullList));
        assert_eq!(list.remove(0), Err(ListError::NullList));
        assert_eq!(list.clear(), Err(ListError::NullList));
        assert_eq!(list.validate(), Err(ListError::NullList));
    }

    #[test]
    fn destroy_releases_every_node_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug)]
        struct DropCounter;
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut list: IndexedList<DropCounter> = IndexedList::new();
        for _ in 0..5 {
            list.push_back(DropCounter).unwrap();
        }
        list.insert(2, DropCounter).unwrap();
        drop(list.remove(3).unwrap());
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);

        list.destroy().unwrap();
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 6);

        drop(list);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn self_linked_single_node_is_internal() {
        let mut list = list_of(&[9]);
        let key = list.head;
        list.storage.as_mut().unwrap().get_mut(key).unwrap().prev = key;

        assert!(matches!(list.pop_back(), Err(ListError::Internal(_))));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn self_linked_tail_is_internal() {
        let mut list = list_of(&[1, 2]);
        let tail = list.tail;
        list.storage.as_mut().unwrap().get_mut(tail).unwrap().prev = tail;

        assert!(matches!(list.pop_back(), Err(ListError::Internal(_))));
        assert_eq!(list.len(), 2);
        assert!(matches!(list.validate(), Err(ListError::Internal(_))));
    }

    #[test]
    fn broken_chain_is_not_rendered() {
        use core::fmt::Write;

        let mut list = list_of(&[1, 2, 3]);
        let head = list.head;
        list.storage.as_mut().unwrap().get_mut(head).unwrap().next = 77;

        let mut buf = [0u8; 32];
        assert!(matches!(
            list.render_into(&mut buf),
            Err(ListError::Internal(_))
        ));
        let mut text = String::new();
        assert!(write!(text, "{list}").is_err());
    }

    #[test]
    fn miscounted_len_is_internal() {
        let mut list = list_of(&[1, 2, 3]);
        list.len = 4;
        assert!(matches!(list.validate(), Err(ListError::Internal(_))));
        assert!(matches!(list.destroy(), Err(ListError::Internal(_))));
        assert!(list.is_destroyed());
    }

    #[test]
    fn broken_ends_refuse_push() {
        let mut list = list_of(&[1, 2]);
        list.tail = list.head;
        assert!(matches!(list.push_back(3), Err(ListError::Internal(_))));
        assert!(matches!(list.push_front(0), Err(ListError::Internal(_))));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn fixed_storage_exhaustion_leaves_list_intact() {
        let mut buffer: [Slot<Node<u32>>; 3] = [const { Slot::vacant() }; 3];
        let mut list = IndexedList::with_storage(BufferStorage::new(&mut buffer).unwrap());

        list.push_back(1).unwrap();
        list.push_back(3).unwrap();
        list.insert(1, 2).unwrap();

        assert_eq!(list.push_back(4), Err(ListError::CapacityExhausted));
        assert_eq!(list.push_front(0), Err(ListError::CapacityExhausted));
        assert_eq!(list.insert(1, 9), Err(ListError::CapacityExhausted));
        list.validate().unwrap();
        assert_eq!(list.len(), 3);

        assert_eq!(list.remove(1), Ok(2));
        list.push_front(0).unwrap();
        assert_eq!(list.to_string(), "[0, 1, 3]");
    }

    #[test]
    fn with_capacity_beyond_key_space() {
        let result = IndexedList::<u64>::with_capacity(usize::MAX);
        assert!(matches!(
            result,
            Err(ListError::Allocation(AllocError::KeySpace { .. }))
        ));
    }

    #[test]
    fn display_and_debug() {
        let mut list = list_of(&[1, 2, 3]);
        assert_eq!(list.to_string(), "[1, 2, 3]");
        assert_eq!(format!("{list:?}"), "[1, 2, 3]");

        list.destroy().unwrap();
        assert_eq!(format!("{list:?}"), "IndexedList(<destroyed>)");
        assert_eq!(list.to_string(), "IndexedList(<destroyed>)");
        assert_ne!(list.to_string(), TestList::new().to_string());
    }

    #[test]
    fn render_into_fixed_buffer() {
        let list = list_of(&[10, 20]);
        let mut buf = [0u8; 8];
        assert_eq!(list.render_into(&mut buf), Ok("[10, 20]"));

        let mut buf = [0u8; 7];
        assert_eq!(
            list.render_into(&mut buf),
            Err(ListError::InsufficientSize {
                needed: 8,
                available: 7
            })
        );

        let empty = TestList::new();
        let mut buf = [0u8; 2];
        assert_eq!(empty.render_into(&mut buf), Ok("[]"));
    }

    #[cfg(feature = "slab")]
    #[test]
    fn slab_backed_list() {
        let mut list: IndexedList<u32, slab::Slab<Node<u32, usize>>, usize> =
            IndexedList::with_storage(slab::Slab::new());
        for v in 0..5 {
            list.push_back(v).unwrap();
        }
        list.insert(2, 99).unwrap();
        assert_eq!(list.remove(2), Ok(99));
        list.validate().unwrap();
        assert_eq!(list.to_string(), "[0, 1, 2, 3, 4]");
    }
}
