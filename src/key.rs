//! Slot keys used as node links.
//!
//! Nodes refer to their neighbours by the key of the slot that holds them.
//! A reserved sentinel (`NONE`, the type's `MAX`) stands for "no link", which
//! keeps nodes as small as the key type instead of paying for `Option<K>`.

/// A copyable slot key with a sentinel "no link" value.
///
/// # Example
///
/// ```
/// use nexus_ilist::Key;
///
/// let key: u32 = 7;
/// assert!(key.is_some());
/// assert!(u32::NONE.is_none());
/// assert_eq!(u16::max_slots(), u16::MAX as usize);
/// ```
pub trait Key: Copy + Eq + core::fmt::Debug {
    /// Sentinel meaning "no neighbour" / "no free slot".
    const NONE: Self;

    /// Creates a key from a slot position.
    fn from_usize(val: usize) -> Self;

    /// Returns the slot position this key addresses.
    fn as_usize(&self) -> usize;

    /// Returns `true` if this is the sentinel.
    #[inline]
    fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Returns `true` if this addresses a slot.
    #[inline]
    fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Number of distinct slots this key type can address.
    ///
    /// The sentinel itself is never handed out, so this is `NONE` as a count.
    #[inline]
    fn max_slots() -> usize {
        Self::NONE.as_usize()
    }
}

macro_rules! impl_key_for_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Key for $ty {
                const NONE: Self = <$ty>::MAX;

                #[inline]
                fn from_usize(val: usize) -> Self {
                    val as Self
                }

                #[inline]
                fn as_usize(&self) -> usize {
                    *self as usize
                }
            }
        )*
    };
}

impl_key_for_unsigned!(u8, u16, u32, u64, usize);
