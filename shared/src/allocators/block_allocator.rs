use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use super::error::AllocatorError;

/// A half-open range of identifiers `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub start: i32,
    pub stop: i32,
}

impl Block {
    pub fn len(&self) -> usize {
        (self.stop - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    pub fn contains(&self, index: i32) -> bool {
        self.start <= index && index < self.stop
    }
}

/// Free and used blocks, each keyed by start index
#[derive(Default)]
struct Heaps {
    free: BTreeMap<i32, i32>,
    used: BTreeMap<i32, i32>,
}

/// Hands out contiguous ranges of identifiers from a bounded heap
///
/// Used for audio buses, control buses and buffers. Allocation is first-fit
/// over the free blocks in ascending address order, so the lowest free
/// range that is large enough always wins. Freed blocks are coalesced with
/// their free neighbours.
///
/// ```
/// use synthctl_shared::BlockAllocator;
///
/// let allocator = BlockAllocator::new(0, 16);
/// assert_eq!(allocator.allocate(4), Some(0));
/// assert_eq!(allocator.allocate(4), Some(4));
/// assert_eq!(allocator.allocate(4), Some(8));
/// assert_eq!(allocator.allocate(8), None);
/// allocator.free(8).unwrap();
/// assert_eq!(allocator.allocate(8), Some(8));
/// ```
pub struct BlockAllocator {
    heap_minimum: i32,
    heap_maximum: i32,
    heaps: Mutex<Heaps>,
}

impl BlockAllocator {
    pub fn new(heap_minimum: i32, heap_maximum: i32) -> Self {
        let allocator = Self {
            heap_minimum,
            heap_maximum,
            heaps: Mutex::new(Heaps::default()),
        };
        allocator.reset();
        allocator
    }

    pub fn heap_minimum(&self) -> i32 {
        self.heap_minimum
    }

    pub fn heap_maximum(&self) -> i32 {
        self.heap_maximum
    }

    /// Reserves `size` contiguous ids and returns the first, or `None` if no
    /// free block is large enough.
    ///
    /// # Panics
    /// If `size` is zero.
    pub fn allocate(&self, size: usize) -> Option<i32> {
        assert!(size > 0, "block size must be positive");
        let size = i32::try_from(size).ok()?;
        let mut heaps = self.lock();
        let (start, stop) = heaps
            .free
            .iter()
            .find(|(start, stop)| **stop - **start >= size)
            .map(|(start, stop)| (*start, *stop))?;
        heaps.free.remove(&start);
        let used_stop = start + size;
        if used_stop < stop {
            heaps.free.insert(used_stop, stop);
        }
        heaps.used.insert(start, used_stop);
        Some(start)
    }

    /// Reserves exactly `[index, index + size)`, which must lie inside a
    /// single free block.
    ///
    /// # Panics
    /// If `size` is zero.
    pub fn allocate_at(&self, index: i32, size: usize) -> Option<i32> {
        assert!(size > 0, "block size must be positive");
        let size = i32::try_from(size).ok()?;
        let stop = index.checked_add(size)?;
        let mut heaps = self.lock();
        let (free_start, free_stop) = heaps
            .free
            .range(..=index)
            .next_back()
            .map(|(start, stop)| (*start, *stop))?;
        if free_stop < stop {
            return None;
        }
        heaps.free.remove(&free_start);
        if free_start < index {
            heaps.free.insert(free_start, index);
        }
        if stop < free_stop {
            heaps.free.insert(stop, free_stop);
        }
        heaps.used.insert(index, stop);
        Some(index)
    }

    /// Releases the used block containing `index` and merges it with any
    /// adjacent free blocks.
    pub fn free(&self, index: i32) -> Result<(), AllocatorError> {
        let mut heaps = self.lock();
        let (mut start, mut stop) = heaps
            .used
            .range(..=index)
            .next_back()
            .filter(|(_, stop)| index < **stop)
            .map(|(start, stop)| (*start, *stop))
            .ok_or(AllocatorError::BlockNotAllocated { index })?;
        heaps.used.remove(&start);

        let left = heaps
            .free
            .range(..start)
            .next_back()
            .filter(|(_, left_stop)| **left_stop == start)
            .map(|(left_start, _)| *left_start);
        if let Some(left_start) = left {
            heaps.free.remove(&left_start);
            start = left_start;
        }
        if let Some(right_stop) = heaps.free.remove(&stop) {
            stop = right_stop;
        }
        heaps.free.insert(start, stop);
        Ok(())
    }

    /// Returns every id to the free pool.
    pub fn reset(&self) {
        let mut heaps = self.lock();
        heaps.used.clear();
        heaps.free.clear();
        if self.heap_minimum < self.heap_maximum {
            heaps.free.insert(self.heap_minimum, self.heap_maximum);
        }
    }

    pub fn used_blocks(&self) -> Vec<Block> {
        Self::blocks(&self.lock().used)
    }

    pub fn free_blocks(&self) -> Vec<Block> {
        Self::blocks(&self.lock().free)
    }

    /// Number of ids currently reserved.
    pub fn used_count(&self) -> usize {
        self.lock()
            .used
            .iter()
            .map(|(start, stop)| (stop - start) as usize)
            .sum()
    }

    fn blocks(map: &BTreeMap<i32, i32>) -> Vec<Block> {
        map.iter()
            .map(|(start, stop)| Block {
                start: *start,
                stop: *stop,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Heaps> {
        self.heaps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
