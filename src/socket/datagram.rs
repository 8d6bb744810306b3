use std::os::fd::AsRawFd;
use crate::addr::{SockAddr, ToSockAddr};
use crate::error::{SocketError, IoError, errno};

/// Outcome of a single `recv_from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvFrom {
	/// Bytes written into the caller's buffer.
	pub len: usize,
	/// Size of the datagram on the wire. Larger than `len` when truncated.
	pub datagram_len: usize,
	/// Sender address, if the kernel reported one.
	pub from: Option<SockAddr>,
}

impl RecvFrom {
	#[inline]
	pub fn is_truncated(&self) -> bool {
		self.datagram_len > self.len
	}
}

/// Receives one datagram and its source address.
///
/// Passes `MSG_TRUNC`, so the kernel reports the real datagram size even
/// when `buf` was too small to hold it.
pub fn recv_from<S: AsRawFd>(socket: &S, buf: &mut [u8]) -> std::io::Result<RecvFrom> {
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

	let n = unsafe {
		libc::recvfrom(
			socket.as_raw_fd(),
			buf.as_mut_ptr() as *mut libc::c_void,
			buf.len(),
			libc::MSG_TRUNC,
			&mut storage as *mut _ as *mut libc::sockaddr,
			&mut len,
		)
	};

	if n == -1 {
		return Err(match errno() {
			libc::EAGAIN => IoError::WouldBlock,
			libc::EINTR => IoError::Interrupted,
			e => IoError::Read { errno: e },
		}.into());
	}

	let datagram_len = n as usize;
	Ok(RecvFrom {
		len: datagram_len.min(buf.len()),
		datagram_len,
		from: SockAddr::from_storage(&storage, len),
	})
}

/// Sends one datagram to `addr`. Returns the number of bytes sent.
pub fn send_to<S: AsRawFd>(socket: &S, buf: &[u8], addr: &SockAddr) -> std::io::Result<usize> {
	let result = addr.with_raw(|ptr, len| unsafe {
		libc::sendto(
			socket.as_raw_fd(),
			buf.as_ptr() as *const libc::c_void,
			buf.len(),
			libc::MSG_NOSIGNAL,
			ptr,
			len,
		)
	});

	match result {
		Some(n) if n >= 0 => Ok(n as usize),
		Some(_) => Err(IoError::Write { errno: errno() }.into()),
		None => Err(SocketError::InvalidAddress { reason: "address too long" }.into()),
	}
}
