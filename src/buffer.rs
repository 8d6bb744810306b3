//! Fixed-capacity receive buffers drawn from a bounded pool.
//!
//! Every receive task grabs one buffer per attempt and hands it, filled,
//! to the consumer. When the consumer drops it the storage goes back to
//! the pool instead of the allocator. The pool caps how many buffers can
//! be out at once; past that, `allocate` returns `None`.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

/// Largest PDU the stack moves in one buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 12756;
/// Default cap on buffers in flight.
pub const DEFAULT_POOL_SIZE: usize = 4096;

#[derive(Debug)]
struct PoolState {
	free: Vec<Box<[u8]>>,
	outstanding: usize,
}

/// Shared pool of equally sized byte buffers.
#[derive(Debug)]
pub struct BufferPool {
	capacity: usize,
	limit: usize,
	state: Mutex<PoolState>,
}

impl BufferPool {
	/// Creates a pool of buffers of `capacity` bytes, at most `limit` in flight.
	pub fn new(capacity: usize, limit: usize) -> Arc<Self> {
		Arc::new(Self {
			capacity,
			limit,
			state: Mutex::new(PoolState { free: Vec::new(), outstanding: 0 }),
		})
	}

	/// Takes a buffer out of the pool.
	///
	/// Reuses released storage when there is some. Returns `None` once
	/// `limit` buffers are outstanding.
	pub fn allocate(self: &Arc<Self>) -> Option<PooledBuffer> {
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		if state.outstanding >= self.limit {
			return None;
		}
		state.outstanding += 1;
		let storage = state.free.pop();
		drop(state);

		let storage = storage.unwrap_or_else(|| vec![0u8; self.capacity].into_boxed_slice());
		Some(PooledBuffer { storage, len: 0, pool: Arc::clone(self) })
	}

	/// Bytes per buffer.
	#[inline]
	pub fn buffer_capacity(&self) -> usize {
		self.capacity
	}

	/// Buffers currently handed out.
	pub fn outstanding(&self) -> usize {
		self.state.lock().unwrap_or_else(PoisonError::into_inner).outstanding
	}

	fn release(&self, storage: Box<[u8]>) {
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		state.outstanding -= 1;
		state.free.push(storage);
	}
}

/// An owned buffer from a `BufferPool`.
///
/// Derefs to the filled part (`len` bytes). Receive paths write through
/// `spare_mut` and then call `set_len`.
pub struct PooledBuffer {
	storage: Box<[u8]>,
	len: usize,
	pool: Arc<BufferPool>,
}

impl PooledBuffer {
	#[inline]
	pub fn len(&self) -> usize {
		self.len
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[inline]
	pub fn capacity(&self) -> usize {
		self.storage.len()
	}

	/// Sets the filled length, clamped to capacity.
	pub fn set_len(&mut self, len: usize) {
		self.len = len.min(self.capacity());
	}

	/// The whole backing storage, regardless of `len`.
	pub fn spare_mut(&mut self) -> &mut [u8] {
		&mut self.storage
	}
}

impl Deref for PooledBuffer {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		&self.storage[..self.len]
	}
}

impl DerefMut for PooledBuffer {
	fn deref_mut(&mut self) -> &mut [u8] {
		&mut self.storage[..self.len]
	}
}

impl std::fmt::Debug for PooledBuffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PooledBuffer")
			.field("len", &self.len)
			.field("capacity", &self.capacity())
			.finish()
	}
}

impl Drop for PooledBuffer {
	fn drop(&mut self) {
		let storage = std::mem::take(&mut self.storage);
		self.pool.release(storage);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_limit_bounds_outstanding_buffers() {
		let pool = BufferPool::new(64, 2);
		let a = pool.allocate().unwrap();
		let _b = pool.allocate().unwrap();
		assert!(pool.allocate().is_none());
		assert_eq!(pool.outstanding(), 2);

		drop(a);
		assert_eq!(pool.outstanding(), 1);
		assert!(pool.allocate().is_some());
	}

	#[test]
	fn released_storage_is_reused() {
		let pool = BufferPool::new(16, 1);
		let mut buf = pool.allocate().unwrap();
		buf.spare_mut()[..3].copy_from_slice(b"abc");
		buf.set_len(3);
		assert_eq!(&*buf, b"abc");
		drop(buf);

		let buf = pool.allocate().unwrap();
		assert_eq!(buf.len(), 0);
		assert_eq!(buf.capacity(), 16);
	}

	#[test]
	fn set_len_is_clamped() {
		let pool = BufferPool::new(8, 1);
		let mut buf = pool.allocate().unwrap();
		buf.set_len(100);
		assert_eq!(buf.len(), 8);
	}
}
