//! World object identifiers.
//!
//! Object ids travel on the wire as signed 32-bit integers.  Ids below
//! [`FIRST_RUNTIME_ID`] are reserved for objects loaded from persistent data
//! (characters, items); anything spawned while the server runs draws from an
//! [`ObjectIdAllocator`].

use std::sync::atomic::{AtomicI32, Ordering};

/// Identifier of any object in the world, as carried in packets.
pub type ObjectId = i32;

/// First id handed out by a fresh allocator.
pub const FIRST_RUNTIME_ID: ObjectId = 0x1000_0000;

/// Lock-free, monotonically increasing object id source.
///
/// # Examples
///
/// ```rust
/// use realm_core::ObjectIdAllocator;
///
/// let ids = ObjectIdAllocator::new();
/// let a = ids.next();
/// let b = ids.next();
/// assert_eq!(b, a + 1);
/// ```
#[derive(Debug)]
pub struct ObjectIdAllocator {
    next: AtomicI32,
}

impl ObjectIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(FIRST_RUNTIME_ID)
    }

    pub fn starting_at(first: ObjectId) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    /// Returns a fresh id.
    ///
    /// `Relaxed` is enough: callers only need uniqueness, not ordering against
    /// other memory operations.
    pub fn next(&self) -> ObjectId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> ObjectId {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
