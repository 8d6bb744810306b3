use std::io::ErrorKind;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::Arc;
use crate::addr::SockAddr;
use crate::buffer::{BufferPool, PooledBuffer};
use crate::socket::sctp::{self, SctpSndRcvInfo};
use crate::socket::{read_some, recv_from};

/// One receive attempt on a descriptor the reactor saw readable.
///
/// Called on the reactor thread with the registry locked. Implementations
/// perform at most one receive per call and return whether the descriptor
/// should stay registered; `false` retires it.
pub trait ReceiveTask: Send {
	fn attempt(&mut self, fd: BorrowedFd<'_>) -> bool;
}

impl<F> ReceiveTask for F
where
	F: FnMut(BorrowedFd<'_>) -> bool + Send,
{
	#[inline]
	fn attempt(&mut self, fd: BorrowedFd<'_>) -> bool {
		self(fd)
	}
}

/*
Error policy shared by the built-in tasks:
  ┌──────────────────────────┬───────────┬────────────┬────────────┐
  │ outcome                  │ datagram  │ SCTP       │ stream     │
  ├──────────────────────────┼───────────┼────────────┼────────────┤
  │ pool exhausted           │ keep      │ keep       │ keep       │
  │ would-block / interrupt  │ keep      │ keep       │ keep       │
  │ hard receive error       │ keep      │ keep       │ retire     │
  │ zero-length read (EOF)   │ deliver   │ retire     │ retire     │
  └──────────────────────────┴───────────┴────────────┴────────────┘
A zero-length UDP datagram is a real (empty) message, so it is delivered.
*/

/// Receives one UDP datagram per attempt.
pub struct DatagramReceiveTask<F> {
	pool: Arc<BufferPool>,
	callback: F,
}

impl<F> DatagramReceiveTask<F>
where
	F: FnMut(PooledBuffer, Option<SockAddr>) + Send,
{
	pub fn new(pool: Arc<BufferPool>, callback: F) -> Self {
		Self { pool, callback }
	}
}

impl<F> ReceiveTask for DatagramReceiveTask<F>
where
	F: FnMut(PooledBuffer, Option<SockAddr>) + Send,
{
	fn attempt(&mut self, fd: BorrowedFd<'_>) -> bool {
		let raw = fd.as_raw_fd();
		let Some(mut buf) = self.pool.allocate() else {
			tracing::warn!(fd = raw, outstanding = self.pool.outstanding(), "receive buffer pool exhausted");
			return true;
		};

		match recv_from(&fd, buf.spare_mut()) {
			Ok(received) => {
				if received.is_truncated() {
					tracing::warn!(
						fd = raw,
						datagram_len = received.datagram_len,
						capacity = buf.capacity(),
						"datagram truncated to buffer capacity"
					);
				}
				buf.set_len(received.len);
				(self.callback)(buf, received.from);
			}
			Err(e) if is_transient(&e) => {
				tracing::debug!(fd = raw, "datagram receive timed out");
			}
			Err(e) => {
				tracing::error!(fd = raw, error = %e, "datagram receive failed");
			}
		}
		true
	}
}

/// Receives one SCTP message or notification per attempt.
///
/// The callback gets the ancillary `SctpSndRcvInfo` and the raw
/// `msg_flags`; `flags & MSG_NOTIFICATION` marks an event rather than data.
pub struct SctpMessageReceiveTask<F> {
	pool: Arc<BufferPool>,
	callback: F,
}

impl<F> SctpMessageReceiveTask<F>
where
	F: FnMut(PooledBuffer, Option<SockAddr>, SctpSndRcvInfo, i32) + Send,
{
	pub fn new(pool: Arc<BufferPool>, callback: F) -> Self {
		Self { pool, callback }
	}
}

impl<F> ReceiveTask for SctpMessageReceiveTask<F>
where
	F: FnMut(PooledBuffer, Option<SockAddr>, SctpSndRcvInfo, i32) + Send,
{
	fn attempt(&mut self, fd: BorrowedFd<'_>) -> bool {
		let raw = fd.as_raw_fd();
		let Some(mut buf) = self.pool.allocate() else {
			tracing::warn!(fd = raw, outstanding = self.pool.outstanding(), "receive buffer pool exhausted");
			return true;
		};

		match sctp::recv_msg(&fd, buf.spare_mut()) {
			Ok(received) if received.len == 0 && !received.is_notification() => {
				tracing::info!(fd = raw, "SCTP association shut down by peer");
				false
			}
			Ok(received) => {
				tracing::trace!(
					fd = raw,
					len = received.len,
					stream = received.info.stream,
					ppid = received.info.ppid,
					assoc_id = received.info.assoc_id,
					notification = received.is_notification(),
					"SCTP message received"
				);
				buf.set_len(received.len);
				(self.callback)(buf, received.from, received.info, received.flags);
				true
			}
			Err(e) if is_transient(&e) => {
				tracing::debug!(fd = raw, "SCTP receive timed out");
				true
			}
			Err(e) => {
				tracing::error!(fd = raw, error = %e, "SCTP receive failed");
				true
			}
		}
	}
}

/// Reads whatever a connected TCP stream has pending, once per attempt.
///
/// Retires the descriptor on orderly close and on hard errors. The
/// descriptor itself stays open; closing it is up to the owner.
pub struct StreamReceiveTask<F> {
	pool: Arc<BufferPool>,
	callback: F,
}

impl<F> StreamReceiveTask<F>
where
	F: FnMut(PooledBuffer) + Send,
{
	pub fn new(pool: Arc<BufferPool>, callback: F) -> Self {
		Self { pool, callback }
	}
}

impl<F> ReceiveTask for StreamReceiveTask<F>
where
	F: FnMut(PooledBuffer) + Send,
{
	fn attempt(&mut self, fd: BorrowedFd<'_>) -> bool {
		let raw = fd.as_raw_fd();
		let Some(mut buf) = self.pool.allocate() else {
			tracing::warn!(fd = raw, outstanding = self.pool.outstanding(), "receive buffer pool exhausted");
			return true;
		};

		match read_some(&fd, buf.spare_mut()) {
			Ok(0) => {
				tracing::info!(fd = raw, "stream connection closed by peer");
				false
			}
			Ok(n) => {
				buf.set_len(n);
				(self.callback)(buf);
				true
			}
			Err(e) if is_transient(&e) => true,
			Err(e) => {
				tracing::error!(fd = raw, error = %e, "stream receive failed");
				false
			}
		}
	}
}

#[inline]
fn is_transient(e: &std::io::Error) -> bool {
	matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}
