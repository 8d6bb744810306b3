use std::os::fd::AsRawFd;
use std::time::Duration;
use crate::error::{SocketError, errno};

fn set_int_option<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	option: &'static str,
	val: libc::c_int,
) -> std::io::Result<()> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option }.into())
	} else {
		Ok(())
	}
}

/// Sets or clears `O_NONBLOCK`.
pub fn set_nonblocking<S: AsRawFd>(socket: &S, nonblocking: bool) -> std::io::Result<()> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" }.into());
	}
	let new_flags = if nonblocking {
		flags | libc::O_NONBLOCK
	} else {
		flags & !libc::O_NONBLOCK
	};
	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFL, new_flags) };
	if result == -1 {
		return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" }.into());
	}
	Ok(())
}

/// Sets SO_REUSEADDR on a socket.
///
/// Allows binding to an address that's in TIME_WAIT state.
/// Essential for server restarts.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, "SO_REUSEADDR", enable as libc::c_int)
}

/// Sets receive buffer size (SO_RCVBUF).
///
/// Kernel typically doubles this value internally.
pub fn set_recv_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> std::io::Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, "SO_RCVBUF", size as libc::c_int)
}

/// Sets send buffer size (SO_SNDBUF).
///
/// Controls how much outgoing data the kernel buffers before a send
/// returns short or blocks. Kernel typically doubles this value internally.
pub fn set_send_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> std::io::Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_SNDBUF, "SO_SNDBUF", size as libc::c_int)
}

/// Sets SO_RCVTIMEO.
///
/// A blocking receive that waits longer than `timeout` fails with
/// `EAGAIN`, which the receive tasks report as a timeout and retry on
/// the next wake. `Duration::ZERO` means wait forever.
pub fn set_recv_timeout<S: AsRawFd>(socket: &S, timeout: Duration) -> std::io::Result<()> {
	let val = libc::timeval {
		tv_sec: timeout.as_secs() as libc::time_t,
		tv_usec: timeout.subsec_micros() as libc::suseconds_t,
	};
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_RCVTIMEO,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::timeval>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option: "SO_RCVTIMEO" }.into())
	} else {
		Ok(())
	}
}
