//! Slot storage for list nodes.
//!
//! Storage hands out stable keys on insert and keeps each value in place
//! until its key is removed. Lists link nodes through these keys instead of
//! pointers, so relinking is a key update and nothing can dangle.
//!
//! Vacant slots form an intrusive free list: each one stores the key of the
//! next vacant slot. Freed slots are reused last-in first-out.

use core::fmt;
use core::mem;
use std::collections::TryReserveError;

use crate::{Key, ListError};

/// Keyed slot storage.
///
/// # Implementations
///
/// - [`HeapStorage<T>`] - growable, one heap allocation, fallible growth
/// - [`BufferStorage<'a, T>`] - fixed, carved from a caller buffer, never allocates
/// - `slab::Slab<T>` - growable (feature `slab`)
pub trait Storage<T> {
    /// Key type handed out by this storage.
    type Key: Key;

    /// Error returned when a value cannot be stored.
    ///
    /// - [`AllocError`] for heap-backed storage
    /// - [`Full<T>`] for fixed-capacity storage
    /// - `Infallible` for storage that aborts on allocation failure
    type Error: Into<ListError>;

    /// Stores a value, returning its key.
    fn try_insert(&mut self, value: T) -> Result<Self::Key, Self::Error>;

    /// Removes and returns the value at `key`, if occupied.
    fn remove(&mut self, key: Self::Key) -> Option<T>;

    /// Returns a reference to the value at `key`, if occupied.
    fn get(&self, key: Self::Key) -> Option<&T>;

    /// Returns a mutable reference to the value at `key`, if occupied.
    fn get_mut(&mut self, key: Self::Key) -> Option<&mut T>;

    /// Number of occupied slots.
    fn len(&self) -> usize;

    /// Returns `true` if no slot is occupied.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error returned when fixed-capacity storage has no vacant slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the value that was rejected.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

/// Error returned when heap storage cannot grow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The allocator refused the reservation.
    #[error("slot reservation failed: {0}")]
    Reserve(#[from] TryReserveError),
    /// The key type cannot address another slot.
    #[error("key type cannot address more than {max} slots")]
    KeySpace {
        /// Largest number of slots the key type addresses.
        max: usize,
    },
}

// =============================================================================
// Slot
// =============================================================================

/// One cell of slot storage: either a stored value or a free-list link.
///
/// Callers only build these to hand a buffer to [`BufferStorage`]:
///
/// ```
/// use nexus_ilist::Slot;
///
/// let buffer: [Slot<u64>; 8] = [const { Slot::vacant() }; 8];
/// assert!(buffer.iter().all(|slot| !slot.is_occupied()));
/// ```
pub struct Slot<T, K: Key = u32>(Entry<T, K>);

enum Entry<T, K> {
    Vacant(K),
    Occupied(T),
}

impl<T, K: Key> Slot<T, K> {
    /// Creates a vacant slot that is not yet on any free list.
    #[inline]
    pub const fn vacant() -> Self {
        Self(Entry::Vacant(K::NONE))
    }

    /// Returns `true` if the slot holds a value.
    #[inline]
    pub fn is_occupied(&self) -> bool {
        matches!(self.0, Entry::Occupied(_))
    }

    #[inline]
    fn occupied(value: T) -> Self {
        Self(Entry::Occupied(value))
    }

    #[inline]
    fn next_free(&self) -> Option<K> {
        match self.0 {
            Entry::Vacant(next) => Some(next),
            Entry::Occupied(_) => None,
        }
    }

    #[inline]
    fn value(&self) -> Option<&T> {
        match &self.0 {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant(_) => None,
        }
    }

    #[inline]
    fn value_mut(&mut self) -> Option<&mut T> {
        match &mut self.0 {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant(_) => None,
        }
    }

    /// Takes the value out, leaving the slot vacant and linked to `next_free`.
    /// A vacant slot is left untouched.
    #[inline]
    fn vacate(&mut self, next_free: K) -> Option<T> {
        if !self.is_occupied() {
            return None;
        }
        match mem::replace(&mut self.0, Entry::Vacant(next_free)) {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant(_) => None,
        }
    }
}

impl<T, K: Key> Default for Slot<T, K> {
    fn default() -> Self {
        Self::vacant()
    }
}

impl<T: fmt::Debug, K: Key> fmt::Debug for Slot<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Entry::Occupied(value) => f.debug_tuple("Occupied").field(value).finish(),
            Entry::Vacant(next) => f.debug_tuple("Vacant").field(next).finish(),
        }
    }
}

/// Pops the head of a free list threaded through `slots`.
#[inline]
fn take_free<T, K: Key>(slots: &mut [Slot<T, K>], free: &mut K, value: T) -> Result<K, T> {
    let Some(slot) = slots.get_mut(free.as_usize()) else {
        return Err(value);
    };
    let Some(next) = slot.next_free() else {
        return Err(value);
    };
    *slot = Slot::occupied(value);
    Ok(mem::replace(free, next))
}

/// Vacates `key` and pushes it onto the free list.
#[inline]
fn release<T, K: Key>(slots: &mut [Slot<T, K>], free: &mut K, key: K) -> Option<T> {
    let value = slots.get_mut(key.as_usize())?.vacate(*free)?;
    *free = key;
    Some(value)
}

// =============================================================================
// HeapStorage - growable, single Vec of slots
// =============================================================================

/// Growable slot storage backed by one heap allocation.
///
/// Growth goes through `Vec::try_reserve`, so an exhausted allocator is
/// reported as [`AllocError`] instead of aborting the process.
///
/// # Example
///
/// ```
/// use nexus_ilist::{HeapStorage, Storage};
///
/// let mut storage: HeapStorage<u64> = HeapStorage::new();
/// let key = storage.try_insert(42).unwrap();
/// assert_eq!(storage.get(key), Some(&42));
/// assert_eq!(storage.remove(key), Some(42));
/// assert!(storage.is_empty());
/// ```
pub struct HeapStorage<T, K: Key = u32> {
    slots: Vec<Slot<T, K>>,
    free: K,
    len: usize,
}

impl<T, K: Key> HeapStorage<T, K> {
    /// Creates empty storage without allocating.
    #[inline]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: K::NONE,
            len: 0,
        }
    }

    /// Creates storage with room for at least `capacity` values.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        if capacity > K::max_slots() {
            return Err(AllocError::KeySpace {
                max: K::max_slots(),
            });
        }
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        Ok(Self {
            slots,
            free: K::NONE,
            len: 0,
        })
    }

    /// Number of slots allocated so far, occupied or not.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Drops every stored value. The allocation is kept.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free = K::NONE;
        self.len = 0;
    }
}

impl<T, K: Key> Default for HeapStorage<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K: Key> Storage<T> for HeapStorage<T, K> {
    type Key = K;
    type Error = AllocError;

    fn try_insert(&mut self, value: T) -> Result<K, AllocError> {
        if self.free.is_some() {
            match take_free(&mut self.slots, &mut self.free, value) {
                Ok(key) => {
                    self.len += 1;
                    return Ok(key);
                }
                // Free list head did not name a vacant slot; fall back to growing.
                Err(value) => {
                    self.free = K::NONE;
                    return self.grow_with(value);
                }
            }
        }
        self.grow_with(value)
    }

    #[inline]
    fn remove(&mut self, key: K) -> Option<T> {
        let value = release(&mut self.slots, &mut self.free, key)?;
        self.len -= 1;
        Some(value)
    }

    #[inline]
    fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key.as_usize())?.value()
    }

    #[inline]
    fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key.as_usize())?.value_mut()
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

impl<T, K: Key> HeapStorage<T, K> {
    fn grow_with(&mut self, value: T) -> Result<K, AllocError> {
        let pos = self.slots.len();
        if pos >= K::max_slots() {
            return Err(AllocError::KeySpace {
                max: K::max_slots(),
            });
        }
        if pos == self.slots.capacity() {
            self.slots.try_reserve(1)?;
            tracing::trace!(capacity = self.slots.capacity(), "heap storage grew");
        }
        self.slots.push(Slot::occupied(value));
        self.len += 1;
        Ok(K::from_usize(pos))
    }
}

impl<T: fmt::Debug, K: Key> fmt::Debug for HeapStorage<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapStorage")
            .field("len", &self.len)
            .field("slots", &self.slots)
            .finish()
    }
}

// =============================================================================
// BufferStorage - fixed, caller-supplied slots
// =============================================================================

/// Fixed-capacity slot storage carved from a caller-supplied buffer.
///
/// Never allocates. Once every slot is occupied, inserts fail with
/// [`Full`], handing the rejected value back. Dropping the storage drops
/// every stored value and leaves the buffer vacant.
///
/// # Example
///
/// ```
/// use nexus_ilist::{BufferStorage, Slot, Storage};
///
/// let mut buffer: [Slot<u64>; 2] = [const { Slot::vacant() }; 2];
/// let mut storage = BufferStorage::new(&mut buffer).unwrap();
///
/// storage.try_insert(1).unwrap();
/// storage.try_insert(2).unwrap();
/// assert_eq!(storage.try_insert(3).unwrap_err().into_inner(), 3);
/// ```
pub struct BufferStorage<'a, T, K: Key = u32> {
    slots: &'a mut [Slot<T, K>],
    free: K,
    len: usize,
}

impl<'a, T, K: Key> BufferStorage<'a, T, K> {
    /// Takes over `slots`, vacating any value left in them.
    ///
    /// Fails with [`ListError::InitFailure`] if the buffer is empty or larger
    /// than the key type can address.
    pub fn new(slots: &'a mut [Slot<T, K>]) -> Result<Self, ListError> {
        if slots.is_empty() || slots.len() > K::max_slots() {
            return Err(ListError::InitFailure { slots: slots.len() });
        }
        let mut storage = Self {
            slots,
            free: K::NONE,
            len: 0,
        };
        storage.clear();
        Ok(storage)
    }

    /// Number of slots in the buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Drops every stored value and rebuilds the free list in buffer order.
    pub fn clear(&mut self) {
        self.free = K::NONE;
        for pos in (0..self.slots.len()).rev() {
            self.slots[pos] = Slot(Entry::Vacant(self.free));
            self.free = K::from_usize(pos);
        }
        self.len = 0;
    }
}

impl<T, K: Key> Storage<T> for BufferStorage<'_, T, K> {
    type Key = K;
    type Error = Full<T>;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<K, Full<T>> {
        if self.free.is_none() {
            return Err(Full(value));
        }
        let key = take_free(self.slots, &mut self.free, value).map_err(Full)?;
        self.len += 1;
        Ok(key)
    }

    #[inline]
    fn remove(&mut self, key: K) -> Option<T> {
        let value = release(self.slots, &mut self.free, key)?;
        self.len -= 1;
        Some(value)
    }

    #[inline]
    fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key.as_usize())?.value()
    }

    #[inline]
    fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key.as_usize())?.value_mut()
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

impl<T, K: Key> Drop for BufferStorage<'_, T, K> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::vacant();
        }
    }
}

impl<T: fmt::Debug, K: Key> fmt::Debug for BufferStorage<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferStorage")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .field("slots", &self.slots)
            .finish()
    }
}

// =============================================================================
// slab::Slab implementation
// =============================================================================

#[cfg(feature = "slab")]
impl<T> Storage<T> for slab::Slab<T> {
    type Key = usize;
    type Error = core::convert::Infallible;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<usize, Self::Error> {
        Ok(self.insert(value))
    }

    #[inline]
    fn remove(&mut self, key: usize) -> Option<T> {
        self.try_remove(key)
    }

    #[inline]
    fn get(&self, key: usize) -> Option<&T> {
        slab::Slab::get(self, key)
    }

    #[inline]
    fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        slab::Slab::get_mut(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        slab::Slab::len(self)
    }
}
