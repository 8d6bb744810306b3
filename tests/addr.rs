use rxsock::{SockAddr, SocketAddrV4, SocketAddrV6, SocketHandle, AddrFamily, SocketKind, Protocol};

#[test]
fn ipv4_text_conversion() {
	let addr = SocketAddrV4::parse("192.168.10.20", 36412).unwrap();
	assert_eq!(addr.ip(), [192, 168, 10, 20]);
	assert_eq!(addr.port(), 36412);
	assert_eq!(addr.ip_string(), "192.168.10.20");
	assert_eq!(addr.to_string(), "192.168.10.20:36412");
}

#[test]
fn ipv6_text_conversion() {
	let addr = SocketAddrV6::parse("2001:db8::7", 2152).unwrap();
	assert_eq!(addr.port(), 2152);
	assert_eq!(addr.ip_string(), "2001:db8::7");
	assert_eq!(addr.to_string(), "[2001:db8::7]:2152");
}

#[test]
fn failed_assign_leaves_address_untouched() {
	let mut v4 = SocketAddrV4::new([10, 0, 0, 1], 38412);
	assert!(v4.assign("10.0.0.256", 1).is_err());
	assert!(v4.assign("::1", 1).is_err());
	assert_eq!(v4, SocketAddrV4::new([10, 0, 0, 1], 38412));

	let mut v6 = SocketAddrV6::new([0; 16], 9);
	assert!(v6.assign("10.0.0.1", 1).is_err());
	assert_eq!(v6.port(), 9);

	v4.assign("127.0.0.1", 5000).unwrap();
	assert_eq!(v4.to_string(), "127.0.0.1:5000");
}

#[test]
fn either_family_parses_into_sock_addr() {
	assert_eq!(SockAddr::parse("127.0.0.1", 80).unwrap().family(), libc::AF_INET);
	assert_eq!(SockAddr::parse("::1", 80).unwrap().family(), libc::AF_INET6);
	assert!(SockAddr::parse("localhost", 80).is_err());
	assert!(SockAddr::parse("", 80).is_err());
}

#[test]
fn bind_reports_resolved_address() {
	let mut socket = SocketHandle::new();
	socket.open(AddrFamily::Ipv4, SocketKind::Datagram, Protocol::Udp).unwrap();
	let addr = socket.bind("127.0.0.1", 0).unwrap();
	assert_eq!(addr.ip_string(), "127.0.0.1");
	assert_eq!(socket.local_addr(), Some(addr));
}

#[test]
fn socket_kind_reads_back_so_type() {
	let mut socket = SocketHandle::new();
	socket.open(AddrFamily::Ipv4, SocketKind::Datagram, Protocol::Udp).unwrap();
	assert_eq!(rxsock::socket_kind(socket.fd().unwrap()), Some(SocketKind::Datagram));
	assert_eq!(rxsock::socket_kind(-1), None);
	assert_eq!(Protocol::Sctp.to_string(), "SCTP");
}
