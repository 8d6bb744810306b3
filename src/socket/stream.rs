use std::os::fd::AsRawFd;
use crate::error::{IoError, errno};
use super::SocketHandle;

/// Performs one `read()` on a connected stream.
///
/// - `Ok(0)`: the peer closed the connection; `socket` has been closed.
/// - `Ok(n)`: `n` bytes were read into `buf`.
/// - `Err(_)`: hard error (or would-block on a non-blocking socket).
pub fn stream_read(socket: &mut SocketHandle, buf: &mut [u8]) -> std::io::Result<usize> {
	let fd = socket.owned()?.as_raw_fd();
	match read_some(&fd, buf) {
		Ok(0) => {
			tracing::info!(fd, "stream connection closed by peer");
			socket.close();
			Ok(0)
		}
		Ok(n) => Ok(n),
		Err(e) => {
			tracing::error!(fd, error = %e, "failed to read from stream socket");
			Err(e)
		}
	}
}

/// One `read()`, no logging and no ownership changes. `Ok(0)` is EOF.
pub(crate) fn read_some<S: AsRawFd>(socket: &S, buf: &mut [u8]) -> std::io::Result<usize> {
	let n = unsafe {
		libc::read(socket.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len())
	};
	if n == -1 {
		return Err(match errno() {
			libc::EAGAIN => IoError::WouldBlock,
			libc::EINTR => IoError::Interrupted,
			e => IoError::Read { errno: e },
		}.into());
	}
	Ok(n as usize)
}

/// Sends all of `buf`, looping over short writes.
///
/// Any single `send()` that moves less than one byte aborts the loop and
/// reports how far it got, so a partial write is never silently dropped.
/// Returns `buf.len()` on success.
pub fn stream_send<S: AsRawFd>(socket: &S, buf: &[u8]) -> std::io::Result<usize> {
	let mut sent = 0;
	while sent < buf.len() {
		let remaining = &buf[sent..];
		let n = unsafe {
			libc::send(
				socket.as_raw_fd(),
				remaining.as_ptr() as *const libc::c_void,
				remaining.len(),
				libc::MSG_NOSIGNAL,
			)
		};
		if n < 1 {
			let err = IoError::PartialSend {
				sent,
				remaining: remaining.len(),
				errno: if n == -1 { errno() } else { 0 },
			};
			tracing::error!(fd = socket.as_raw_fd(), error = %err, "failed to send data to stream socket");
			return Err(err.into());
		}
		sent += n as usize;
	}
	Ok(sent)
}
