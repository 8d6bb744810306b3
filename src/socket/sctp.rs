//! SCTP socket options and message receive.
//!
//! libc does not carry the `<netinet/sctp.h>` definitions, so the handful
//! of kernel structures this crate touches are declared here with the
//! kernel's layout. Receive goes through plain `recvmsg()` and picks the
//! `SCTP_SNDRCV` ancillary record out of the control buffer, which is what
//! lksctp's `sctp_recvmsg()` does internally.

use std::os::fd::AsRawFd;
use crate::addr::SockAddr;
use crate::error::{SocketError, IoError, errno};

pub const SOL_SCTP: libc::c_int = 132;
pub const SCTP_RTOINFO: libc::c_int = 0;
pub const SCTP_INITMSG: libc::c_int = 2;
pub const SCTP_EVENTS: libc::c_int = 11;
/// cmsg type carrying `SctpSndRcvInfo`.
pub const SCTP_SNDRCV: libc::c_int = 1;
/// Set in the receive flags when the message is a notification, not user data.
pub const MSG_NOTIFICATION: libc::c_int = 0x8000;

/// Upper bound on the retransmission timeout, in milliseconds.
pub const RTO_MAX_MS: u32 = 6000;
/// INIT retransmissions before `connect()` gives up.
pub const INIT_MAX_ATTEMPTS: u16 = 3;
/// Upper bound on the INIT retransmission timeout, in milliseconds.
pub const INIT_MAX_TIMEOUT_MS: u16 = 5000;

/// `struct sctp_rtoinfo`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SctpRtoInfo {
	pub assoc_id: i32,
	pub initial: u32,
	pub max: u32,
	pub min: u32,
}

/// `struct sctp_initmsg`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SctpInitMsg {
	pub num_ostreams: u16,
	pub max_instreams: u16,
	pub max_attempts: u16,
	pub max_init_timeo: u16,
}

/// `struct sctp_sndrcvinfo`, the per-message ancillary info.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SctpSndRcvInfo {
	pub stream: u16,
	pub ssn: u16,
	pub flags: u16,
	pub ppid: u32,
	pub context: u32,
	pub timetolive: u32,
	pub tsn: u32,
	pub cumtsn: u32,
	pub assoc_id: i32,
}

/// Leading fields of `struct sctp_event_subscribe`.
///
/// The kernel accepts any prefix of the structure, so only the fields that
/// have existed since the first lksctp release are declared.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct SctpEventSubscribe {
	data_io: u8,
	association: u8,
	address: u8,
	send_failure: u8,
	peer_error: u8,
	shutdown: u8,
	partial_delivery: u8,
	adaptation_layer: u8,
	authentication: u8,
	sender_dry: u8,
}

fn get_opt<S: AsRawFd, T>(socket: &S, name: libc::c_int, option: &'static str, value: &mut T) -> std::io::Result<()> {
	let mut len = std::mem::size_of::<T>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			SOL_SCTP,
			name,
			value as *mut T as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		Err(SocketError::GetOption { errno: errno(), option }.into())
	} else {
		Ok(())
	}
}

fn set_opt<S: AsRawFd, T>(socket: &S, name: libc::c_int, option: &'static str, value: &T) -> std::io::Result<()> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			SOL_SCTP,
			name,
			value as *const T as *const libc::c_void,
			std::mem::size_of::<T>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option }.into())
	} else {
		Ok(())
	}
}

/// Subscribes to data-I/O, shutdown and peer-address-change events.
///
/// Data-I/O delivers `SctpSndRcvInfo` with every message; the other two
/// arrive as notifications (`MSG_NOTIFICATION`) on the same descriptor.
pub fn subscribe_events<S: AsRawFd>(socket: &S) -> std::io::Result<()> {
	let events = SctpEventSubscribe {
		data_io: 1,
		shutdown: 1,
		address: 1,
		..Default::default()
	};
	set_opt(socket, SCTP_EVENTS, "SCTP_EVENTS", &events)
}

/// Reads the endpoint's RTO parameters (association 0).
pub fn sctp_rto_info<S: AsRawFd>(socket: &S) -> std::io::Result<SctpRtoInfo> {
	let mut info = SctpRtoInfo::default();
	get_opt(socket, SCTP_RTOINFO, "SCTP_RTOINFO", &mut info)?;
	Ok(info)
}

pub fn set_sctp_rto_info<S: AsRawFd>(socket: &S, info: &SctpRtoInfo) -> std::io::Result<()> {
	set_opt(socket, SCTP_RTOINFO, "SCTP_RTOINFO", info)
}

/// Reads the endpoint's INIT parameters.
pub fn sctp_init_msg<S: AsRawFd>(socket: &S) -> std::io::Result<SctpInitMsg> {
	let mut init = SctpInitMsg::default();
	get_opt(socket, SCTP_INITMSG, "SCTP_INITMSG", &mut init)?;
	Ok(init)
}

pub fn set_sctp_init_msg<S: AsRawFd>(socket: &S, init: &SctpInitMsg) -> std::io::Result<()> {
	set_opt(socket, SCTP_INITMSG, "SCTP_INITMSG", init)
}

/// Shortens failure detection on a fresh SCTP socket.
///
/// Caps RTO at `RTO_MAX_MS` and INIT at `INIT_MAX_ATTEMPTS` tries of up to
/// `INIT_MAX_TIMEOUT_MS` each. Other fields keep the kernel's values.
pub(crate) fn tune_failure_detection<S: AsRawFd>(socket: &S) -> std::io::Result<()> {
	let mut rto = sctp_rto_info(socket)?;
	rto.assoc_id = 0;
	rto.max = RTO_MAX_MS;
	tracing::debug!(
		assoc_id = rto.assoc_id,
		initial = rto.initial,
		min = rto.min,
		max = rto.max,
		"setting SCTP_RTOINFO"
	);
	set_sctp_rto_info(socket, &rto)?;

	let mut init = sctp_init_msg(socket)?;
	init.max_attempts = INIT_MAX_ATTEMPTS;
	init.max_init_timeo = INIT_MAX_TIMEOUT_MS;
	tracing::debug!(
		max_attempts = init.max_attempts,
		max_init_timeo = init.max_init_timeo,
		"setting SCTP_INITMSG"
	);
	set_sctp_init_msg(socket, &init)
}

/// One SCTP message (or notification) as returned by `recv_msg`.
#[derive(Debug, Clone, Copy)]
pub struct SctpRecv {
	/// Bytes written into the caller's buffer.
	pub len: usize,
	/// Source address, if the kernel reported one.
	pub from: Option<SockAddr>,
	/// Ancillary info; zeroed when the data-I/O event is not subscribed.
	pub info: SctpSndRcvInfo,
	/// `msg_flags` from `recvmsg()`; test `MSG_NOTIFICATION` and `MSG_EOR` here.
	pub flags: libc::c_int,
}

impl SctpRecv {
	pub fn is_notification(&self) -> bool {
		self.flags & MSG_NOTIFICATION != 0
	}
}

/// Receives one SCTP message into `buf`.
///
/// Equivalent of `sctp_recvmsg()`: a single `recvmsg()` whose control buffer
/// is scanned for the `SCTP_SNDRCV` record.
pub fn recv_msg<S: AsRawFd>(socket: &S, buf: &mut [u8]) -> std::io::Result<SctpRecv> {
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let cmsg_space = unsafe { libc::CMSG_SPACE(std::mem::size_of::<SctpSndRcvInfo>() as u32) } as usize;
	let mut cmsg_buf = vec![0u8; cmsg_space];

	let mut iov = libc::iovec {
		iov_base: buf.as_mut_ptr() as *mut libc::c_void,
		iov_len: buf.len(),
	};

	let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
	msg.msg_name = &mut storage as *mut _ as *mut libc::c_void;
	msg.msg_namelen = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
	msg.msg_iov = &mut iov;
	msg.msg_iovlen = 1;
	msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
	msg.msg_controllen = cmsg_space as _;

	let n = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, 0) };
	if n == -1 {
		return Err(match errno() {
			libc::EAGAIN => IoError::WouldBlock,
			libc::EINTR => IoError::Interrupted,
			e => IoError::Read { errno: e },
		}.into());
	}

	let mut info = SctpSndRcvInfo::default();
	let mut cmsg = unsafe { libc::CMSG_FIRSTHDR(&msg) };
	while !cmsg.is_null() {
		unsafe {
			if (*cmsg).cmsg_level == libc::IPPROTO_SCTP && (*cmsg).cmsg_type == SCTP_SNDRCV {
				info = std::ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const SctpSndRcvInfo);
				break;
			}
			cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
		}
	}

	Ok(SctpRecv {
		len: n as usize,
		from: SockAddr::from_storage(&storage, msg.msg_namelen),
		info,
		flags: msg.msg_flags,
	})
}
