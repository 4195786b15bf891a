//! Scratch buffer pooling
//!
//! Residual arrays and intermediate byte buffers are checked out of a
//! [`BufferPool`] for the duration of one encode/decode call and returned when
//! the [`PooledBuf`] guard drops. Buffers are grouped into power-of-two
//! capacity classes so a checkout never has to grow a recycled buffer.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Number of capacity classes (2^0 .. 2^31 elements)
const CAPACITY_CLASSES: usize = 32;

/// Pool of reusable `Vec<T>` buffers keyed by capacity class
pub struct BufferPool<T> {
    classes: Vec<Mutex<Vec<Vec<T>>>>,
    max_per_class: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Pool hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Checkouts served by a recycled buffer
    pub hits: u64,
    /// Checkouts that allocated
    pub misses: u64,
}

impl<T> BufferPool<T> {
    /// Create a pool retaining at most `max_per_class` idle buffers per class
    pub fn new(max_per_class: usize) -> Self {
        Self {
            classes: (0..CAPACITY_CLASSES).map(|_| Mutex::new(Vec::new())).collect(),
            max_per_class,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn class_of(capacity: usize) -> usize {
        let rounded = capacity.max(1).next_power_of_two();
        (rounded.trailing_zeros() as usize).min(CAPACITY_CLASSES - 1)
    }

    /// Check out an empty buffer with room for at least `capacity` elements
    pub fn get(&self, capacity: usize) -> PooledBuf<'_, T> {
        let class = Self::class_of(capacity);
        let recycled = self.classes[class].lock().pop();

        let buf = match recycled {
            Some(buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(class, capacity, "scratch pool miss");
                Vec::with_capacity(capacity.max(1).next_power_of_two())
            }
        };

        PooledBuf {
            pool: self,
            buf: Some(buf),
        }
    }

    fn put(&self, mut buf: Vec<T>) {
        if buf.capacity() == 0 {
            return;
        }
        buf.clear();
        // File under the largest class the buffer can fully serve
        let class = (usize::BITS - 1 - buf.capacity().leading_zeros()) as usize;
        let class = class.min(CAPACITY_CLASSES - 1);

        let mut idle = self.classes[class].lock();
        if idle.len() < self.max_per_class {
            idle.push(buf);
        }
    }

    /// Current hit/miss counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<T> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Scoped checkout of a pooled buffer
///
/// Derefs to `Vec<T>`; the buffer is cleared and returned to its pool on drop.
pub struct PooledBuf<'a, T> {
    pool: &'a BufferPool<T>,
    buf: Option<Vec<T>>,
}

impl<T> PooledBuf<'_, T> {
    /// Detach the buffer from the pool
    pub fn into_inner(mut self) -> Vec<T> {
        self.buf.take().unwrap_or_default()
    }
}

impl<T> Deref for PooledBuf<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        self.buf.as_ref().expect("pooled buffer used after release")
    }
}

impl<T> DerefMut for PooledBuf<'_, T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        self.buf.as_mut().expect("pooled buffer used after release")
    }
}

impl<T> Drop for PooledBuf<'_, T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}

/// Byte and integer scratch pools owned by one encoder
pub struct ScratchPools {
    /// Intermediate byte buffers (varint streams, decompressed payloads)
    pub bytes: BufferPool<u8>,
    /// Residual integer arrays
    pub ints: BufferPool<i64>,
}

impl ScratchPools {
    /// Create pools retaining at most `max_per_class` idle buffers per class
    pub fn new(max_per_class: usize) -> Self {
        Self {
            bytes: BufferPool::new(max_per_class),
            ints: BufferPool::new(max_per_class),
        }
    }
}

impl Default for ScratchPools {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_checkout_has_capacity() {
        let pool: BufferPool<i64> = BufferPool::new(4);
        let buf = pool.get(1000);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 1000);
    }

    #[test]
    fn test_buffer_reused_after_drop() {
        let pool: BufferPool<u8> = BufferPool::new(4);
        {
            let mut buf = pool.get(100);
            buf.extend_from_slice(&[1, 2, 3]);
        }
        let buf = pool.get(100);
        assert!(buf.is_empty(), "recycled buffer must be cleared");

        let stats = pool.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_outstanding_buffers_are_distinct() {
        let pool: BufferPool<u8> = BufferPool::new(4);
        let mut a = pool.get(16);
        let mut b = pool.get(16);
        a.push(1);
        b.push(2);
        assert_eq!(&a[..], &[1]);
        assert_eq!(&b[..], &[2]);
    }

    #[test]
    fn test_idle_buffers_bounded() {
        let pool: BufferPool<u8> = BufferPool::new(1);
        let a = pool.get(8);
        let b = pool.get(8);
        drop(a);
        drop(b);
        assert_eq!(pool.classes[3].lock().len(), 1);
    }

    #[test]
    fn test_into_inner_detaches() {
        let pool: BufferPool<u8> = BufferPool::new(4);
        let mut buf = pool.get(8);
        buf.push(7);
        let owned = buf.into_inner();
        assert_eq!(owned, vec![7]);
        assert!(pool.classes[3].lock().is_empty());
    }

    #[test]
    fn test_concurrent_checkout() {
        let pool: Arc<BufferPool<i64>> = Arc::new(BufferPool::new(8));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let mut buf = pool.get(64);
                        buf.push(t * 1000 + i);
                        assert_eq!(buf.len(), 1);
                        assert_eq!(buf[0], t * 1000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.hits + stats.misses, 4000);
    }
}
