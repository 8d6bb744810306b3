//! Socket addresses and their conversion to and from raw `sockaddr` storage.
//!
//! - `SocketAddrV4`: IPv4 address + port
//! - `SocketAddrV6`: IPv6 address + port + scope
//! - `SockAddr`: either of the two, as reported by the kernel for a peer

mod ipv4;
mod ipv6;
pub use self::ipv4::SocketAddrV4;
pub use self::ipv6::SocketAddrV6;

use crate::error::SocketError;

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	/// Returns None if the address cannot be represented.
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}
// The sockaddr pointer is only valid inside the closure.

/// Trait for address types that can be created from raw sockaddr.
pub trait FromSockAddr: Sized {
	/// Creates address from raw sockaddr storage.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

impl FromSockAddr for SocketAddrV4 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
		if raw.sin_family != libc::AF_INET as libc::sa_family_t {
			return None;
		}
		Some(Self::from_raw(raw))
	}
}

impl FromSockAddr for SocketAddrV6 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
		if raw.sin6_family != libc::AF_INET6 as libc::sa_family_t {
			return None;
		}
		Some(Self::from_raw(raw))
	}
}

/// An IPv4 or IPv6 socket address.
///
/// This is what receive paths hand back as the source of a datagram,
/// since the family is only known once the kernel has filled the storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockAddr {
	V4(SocketAddrV4),
	V6(SocketAddrV6),
}

impl SockAddr {
	/// Parses a textual IP (v4 first, then v6) and pairs it with `port`.
	pub fn parse(ip: &str, port: u16) -> Result<Self, SocketError> {
		if let Ok(addr) = SocketAddrV4::parse(ip, port) {
			return Ok(Self::V4(addr));
		}
		SocketAddrV6::parse(ip, port).map(Self::V6)
	}

	/// Returns the textual IP, without the port.
	pub fn ip_string(&self) -> String {
		match self {
			Self::V4(addr) => addr.ip_string(),
			Self::V6(addr) => addr.ip_string(),
		}
	}

	pub fn port(&self) -> u16 {
		match self {
			Self::V4(addr) => addr.port(),
			Self::V6(addr) => addr.port(),
		}
	}

	/// Returns the address family constant (`AF_INET` / `AF_INET6`).
	pub fn family(&self) -> libc::c_int {
		match self {
			Self::V4(_) => libc::AF_INET,
			Self::V6(_) => libc::AF_INET6,
		}
	}

	/// Reads whichever family the kernel wrote into `storage`.
	pub(crate) fn from_storage(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Option<Self> {
		let ptr = storage as *const _ as *const libc::sockaddr;
		unsafe {
			match storage.ss_family as libc::c_int {
				libc::AF_INET => SocketAddrV4::from_sockaddr(ptr, len).map(Self::V4),
				libc::AF_INET6 => SocketAddrV6::from_sockaddr(ptr, len).map(Self::V6),
				_ => None,
			}
		}
	}
}

impl ToSockAddr for SockAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		match self {
			Self::V4(addr) => addr.with_raw(f),
			Self::V6(addr) => addr.with_raw(f),
		}
	}
}

impl std::fmt::Display for SockAddr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::V4(addr) => std::fmt::Display::fmt(addr, f),
			Self::V6(addr) => std::fmt::Display::fmt(addr, f),
		}
	}
}

impl From<SocketAddrV4> for SockAddr {
	fn from(addr: SocketAddrV4) -> Self {
		Self::V4(addr)
	}
}

impl From<SocketAddrV6> for SockAddr {
	fn from(addr: SocketAddrV6) -> Self {
		Self::V6(addr)
	}
}
