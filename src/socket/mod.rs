mod raw;
mod bound;
mod listener;
mod stream;
mod datagram;
mod options;
mod handle;
pub mod sctp;

pub use self::raw::{open_socket, socket_kind};
pub use self::bound::{bind_addr, bound_addr, connect_to};
pub use self::listener::{listen, accept, sctp_init_socket, sctp_init_client, sctp_init_server, tcp_make_server};
pub use self::stream::{stream_read, stream_send};
pub(crate) use self::stream::read_some;
pub use self::datagram::{recv_from, send_to, RecvFrom};
pub use self::options::{set_nonblocking, set_reuse_addr, set_recv_buffer_size, set_send_buffer_size,
						set_recv_timeout};
pub use self::handle::SocketHandle;

/// Address family passed to `socket()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
	Ipv4,
	Ipv6,
}

impl AddrFamily {
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Self::Ipv4 => libc::AF_INET,
			Self::Ipv6 => libc::AF_INET6,
		}
	}
}

/// Socket kind passed to `socket()`.
///
/// - `Stream`: reliable, ordered byte stream (TCP, one-to-one SCTP)
/// - `Datagram`: unreliable, unordered packets (UDP)
/// - `SeqPacket`: reliable messages with boundaries (one-to-many SCTP)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
	Stream,
	Datagram,
	SeqPacket,
}

impl SocketKind {
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Self::Stream => libc::SOCK_STREAM,
			Self::Datagram => libc::SOCK_DGRAM,
			Self::SeqPacket => libc::SOCK_SEQPACKET,
		}
	}

	pub(crate) fn from_raw(raw: libc::c_int) -> Option<Self> {
		match raw {
			libc::SOCK_STREAM => Some(Self::Stream),
			libc::SOCK_DGRAM => Some(Self::Datagram),
			libc::SOCK_SEQPACKET => Some(Self::SeqPacket),
			_ => None,
		}
	}
}

/*
---
  ┌───────────┬────────────────┬───────────────┐
  │  Kind     │  Constant      │ Value (Linux) │
  ├───────────┼────────────────┼───────────────┤
  │ Stream    │ SOCK_STREAM    │ 1             │
  ├───────────┼────────────────┼───────────────┤
  │ Datagram  │ SOCK_DGRAM     │ 2             │
  ├───────────┼────────────────┼───────────────┤
  │ SeqPacket │ SOCK_SEQPACKET │ 5             │
  └───────────┴────────────────┴───────────────┘
---
*/

/// Transport protocol passed to `socket()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
	Tcp,
	Udp,
	Sctp,
}

impl Protocol {
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Self::Tcp => libc::IPPROTO_TCP,
			Self::Udp => libc::IPPROTO_UDP,
			Self::Sctp => libc::IPPROTO_SCTP,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Tcp => "TCP",
			Self::Udp => "UDP",
			Self::Sctp => "SCTP",
		}
	}
}

impl std::fmt::Display for Protocol {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
