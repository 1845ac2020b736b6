//! Exact-size, zeroed storage blocks.
//!
//! Every aio object owns one [`Storage`] block whose length is exactly the
//! size its kind descriptor declares. Blocks are zeroed at allocation and are
//! never resized; engines that need to record state write fixed-width words at
//! fixed offsets.
//!
//! Handle kinds begin with a common header:
//!
//! | offset | field |
//! |--------|-------|
//! | 0      | attached loop id (0 = none) |
//! | 8      | kind-specific flags |
//!
//! Synchronization primitives record their initial count at offset 0.
//!
//! Allocation goes through the [`HostAllocator`] seam so that hosts can
//! substitute their own accounting.

use crate::kind::KindDescriptor;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Size of the common handle header.
pub const HEADER_SIZE: usize = 16;
/// Header offset of the attached loop id.
pub const LOOP_ID_OFFSET: usize = 0;
/// Header offset of the kind-specific flags word.
pub const FLAGS_OFFSET: usize = 8;
/// Offset of a synchronization primitive's initial count.
pub const COUNT_OFFSET: usize = 0;

/// A fixed-size byte block.
#[derive(Clone, PartialEq, Eq)]
pub struct Storage {
    bytes: Box<[u8]>,
}

impl Storage {
    /// Allocates `len` zeroed bytes.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0; len].into_boxed_slice(),
        }
    }

    /// Block length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for a zero-length block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns `true` if every byte is zero.
    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    /// Raw contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable raw contents. The length cannot change.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Reads a native-endian `u64` at `offset`, or `None` if out of bounds.
    #[must_use]
    pub fn read_u64(&self, offset: usize) -> Option<u64> {
        let end = offset.checked_add(8)?;
        let word = self.bytes.get(offset..end)?;
        word.try_into().ok().map(u64::from_ne_bytes)
    }

    /// Writes a native-endian `u64` at `offset`. Returns `false` if out of bounds.
    pub fn write_u64(&mut self, offset: usize, value: u64) -> bool {
        let Some(end) = offset.checked_add(8) else {
            return false;
        };
        match self.bytes.get_mut(offset..end) {
            Some(word) => {
                word.copy_from_slice(&value.to_ne_bytes());
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("len", &self.len())
            .field("zeroed", &self.is_zeroed())
            .finish()
    }
}

/// Host allocation primitive: one zeroed block of the descriptor's size.
pub trait HostAllocator: Send + Sync + fmt::Debug {
    /// Allocates storage for `descriptor`. The block must be exactly
    /// `descriptor.size` bytes and fully zeroed.
    fn allocate(&self, descriptor: &KindDescriptor) -> Storage;
}

/// Default allocator backed by the global heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl HostAllocator for SystemAllocator {
    fn allocate(&self, descriptor: &KindDescriptor) -> Storage {
        Storage::zeroed(descriptor.size)
    }
}

/// Allocator that counts blocks and bytes handed out.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    blocks: AtomicUsize,
    bytes: AtomicUsize,
}

impl CountingAllocator {
    /// Creates a counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks allocated so far.
    #[must_use]
    pub fn blocks(&self) -> usize {
        self.blocks.load(Ordering::Acquire)
    }

    /// Bytes allocated so far.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::Acquire)
    }
}

impl HostAllocator for CountingAllocator {
    fn allocate(&self, descriptor: &KindDescriptor) -> Storage {
        self.blocks.fetch_add(1, Ordering::AcqRel);
        self.bytes.fetch_add(descriptor.size, Ordering::AcqRel);
        Storage::zeroed(descriptor.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{Kind, KindRegistry};

    #[test]
    fn zeroed_block_has_exact_length() {
        for len in [1, 7, 16, 248, 848] {
            let storage = Storage::zeroed(len);
            assert_eq!(storage.len(), len);
            assert!(storage.is_zeroed());
            assert!(!storage.is_empty());
        }
    }

    #[test]
    fn word_access_is_bounds_checked() {
        let mut storage = Storage::zeroed(HEADER_SIZE);
        assert!(storage.write_u64(LOOP_ID_OFFSET, 7));
        assert!(storage.write_u64(FLAGS_OFFSET, u64::MAX));
        assert_eq!(storage.read_u64(LOOP_ID_OFFSET), Some(7));
        assert_eq!(storage.read_u64(FLAGS_OFFSET), Some(u64::MAX));
        assert!(!storage.is_zeroed());

        assert!(!storage.write_u64(9, 1));
        assert!(!storage.write_u64(usize::MAX, 1));
        assert_eq!(storage.read_u64(9), None);
        assert_eq!(storage.read_u64(usize::MAX - 3), None);
        assert_eq!(storage.len(), HEADER_SIZE);
    }

    #[test]
    fn counting_allocator_tracks_blocks_and_bytes() {
        let registry = KindRegistry::standard();
        let alloc = CountingAllocator::new();
        let tcp = registry.lookup(Kind::Tcp).expect("tcp");
        let sem = registry.lookup(Kind::Sem).expect("sem");

        let a = alloc.allocate(tcp);
        let b = alloc.allocate(sem);
        assert_eq!(a.len(), tcp.size);
        assert_eq!(b.len(), sem.size);
        assert_eq!(alloc.blocks(), 2);
        assert_eq!(alloc.bytes(), tcp.size + sem.size);
    }

    #[test]
    fn debug_hides_contents() {
        let dbg = format!("{:?}", Storage::zeroed(4));
        assert!(dbg.contains("len: 4"), "{dbg}");
        assert!(dbg.contains("zeroed: true"), "{dbg}");
    }
}
