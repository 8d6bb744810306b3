mod common;

use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use common::{init_tracing, wait_until};
use rxsock::{AddrFamily, Protocol, ReactorConfig, ReactorError, RegistrationState, SockAddr, SocketHandle,
			 SocketKind, SocketReactor, open_socket, recv_from, send_to, stream_send, tcp_make_server};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

struct UdpPair {
	receiver: SocketHandle,
	sender: SocketHandle,
	to: SockAddr,
}

impl UdpPair {
	fn new() -> Self {
		let mut receiver = SocketHandle::new();
		receiver.open(AddrFamily::Ipv4, SocketKind::Datagram, Protocol::Udp).unwrap();
		let to = receiver.bind("127.0.0.1", 0).unwrap();

		let mut sender = SocketHandle::new();
		sender.open(AddrFamily::Ipv4, SocketKind::Datagram, Protocol::Udp).unwrap();
		sender.bind("127.0.0.1", 0).unwrap();
		Self { receiver, sender, to }
	}

	fn fd(&self) -> RawFd {
		self.receiver.fd().unwrap()
	}

	fn send(&self, payload: &[u8]) {
		let n = send_to(&self.sender.fd().unwrap(), payload, &self.to).unwrap();
		assert_eq!(n, payload.len());
	}
}

fn wait_active(reactor: &SocketReactor, fd: RawFd) {
	assert!(wait_until(WAIT, || reactor.state(fd) == Some(RegistrationState::Active)));
}

#[test]
fn one_datagram_one_callback() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::new("udp-reactor").unwrap();

	let (tx, rx) = mpsc::channel();
	reactor
		.register_datagram(udp.fd(), move |buf, from| {
			tx.send((buf.to_vec(), from)).unwrap();
		})
		.unwrap();

	let payload: Vec<u8> = (0..200u8).collect();
	udp.send(&payload);

	let (data, from) = rx.recv_timeout(WAIT).unwrap();
	assert_eq!(data, payload);
	assert_eq!(from, udp.sender.local_addr());
	assert!(rx.recv_timeout(QUIET).is_err());

	reactor.deregister(udp.fd()).unwrap();
	reactor.stop();
}

#[test]
fn registration_turns_active() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::new("state-reactor").unwrap();
	assert_eq!(reactor.state(udp.fd()), None);

	reactor.register_datagram(udp.fd(), |_, _| {}).unwrap();
	assert!(reactor.state(udp.fd()).is_some());
	wait_active(&reactor, udp.fd());

	reactor.deregister(udp.fd()).unwrap();
	assert_eq!(reactor.state(udp.fd()), None);
}

#[test]
fn duplicate_register_keeps_original_task() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::new("dup-reactor").unwrap();

	let (first_tx, first_rx) = mpsc::channel();
	let (second_tx, second_rx) = mpsc::channel::<usize>();
	reactor.register_datagram(udp.fd(), move |buf, _| first_tx.send(buf.len()).unwrap()).unwrap();

	let err = reactor
		.register_datagram(udp.fd(), move |buf, _| second_tx.send(buf.len()).unwrap())
		.unwrap_err();
	assert!(matches!(err, ReactorError::AlreadyRegistered { fd } if fd == udp.fd()));

	udp.send(b"ping");
	assert_eq!(first_rx.recv_timeout(WAIT).unwrap(), 4);
	assert!(second_rx.recv_timeout(QUIET).is_err());

	reactor.deregister(udp.fd()).unwrap();
}

#[test]
fn unknown_and_invalid_descriptors_are_rejected() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::new("reject-reactor").unwrap();

	assert!(matches!(reactor.deregister(udp.fd()), Err(ReactorError::NotRegistered { .. })));
	assert!(matches!(
		reactor.register_datagram(-1, |_, _| {}),
		Err(ReactorError::InvalidDescriptor { fd: -1 })
	));
	assert!(matches!(
		reactor.register_datagram(1_000_000, |_, _| {}),
		Err(ReactorError::InvalidDescriptor { .. })
	));
}

#[test]
fn deregistered_task_never_runs_and_descriptor_can_be_reused() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::new("rereg-reactor").unwrap();

	let (old_tx, old_rx) = mpsc::channel::<Vec<u8>>();
	reactor.register_datagram(udp.fd(), move |buf, _| old_tx.send(buf.to_vec()).unwrap()).unwrap();
	wait_active(&reactor, udp.fd());
	reactor.deregister(udp.fd()).unwrap();

	udp.send(b"after");
	// The old task was dropped by deregister, so its channel is already closed.
	assert!(matches!(old_rx.recv_timeout(QUIET), Err(mpsc::RecvTimeoutError::Disconnected)));

	let (new_tx, new_rx) = mpsc::channel();
	reactor.register_datagram(udp.fd(), move |buf, _| new_tx.send(buf.to_vec()).unwrap()).unwrap();
	assert_eq!(new_rx.recv_timeout(WAIT).unwrap(), b"after");

	reactor.deregister(udp.fd()).unwrap();
	reactor.register_datagram(udp.fd(), |_, _| {}).unwrap();
	reactor.deregister(udp.fd()).unwrap();
}

#[test]
fn task_returning_false_is_retired() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::new("retire-reactor").unwrap();

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	reactor
		.register(udp.fd(), move |fd: BorrowedFd<'_>| {
			let mut buf = [0u8; 64];
			recv_from(&fd, &mut buf).unwrap();
			counter.fetch_add(1, Ordering::SeqCst);
			false
		})
		.unwrap();

	udp.send(b"one");
	udp.send(b"two");
	assert!(wait_until(WAIT, || reactor.state(udp.fd()).is_none()));
	std::thread::sleep(QUIET);
	assert_eq!(calls.load(Ordering::SeqCst), 1);

	assert!(matches!(reactor.deregister(udp.fd()), Err(ReactorError::NotRegistered { .. })));
	reactor.register_datagram(udp.fd(), |_, _| {}).unwrap();
	reactor.deregister(udp.fd()).unwrap();
}

#[test]
fn stop_is_idempotent() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::with_config(ReactorConfig::new("stop-reactor").pool_size(4)).unwrap();
	assert!(reactor.is_running());
	reactor.register_datagram(udp.fd(), |_, _| {}).unwrap();

	reactor.stop();
	reactor.stop();
	assert!(!reactor.is_running());
	assert_eq!(reactor.state(udp.fd()), None);
	assert!(matches!(reactor.register_datagram(udp.fd(), |_, _| {}), Err(ReactorError::Stopped)));
	assert!(matches!(reactor.deregister(udp.fd()), Err(ReactorError::Stopped)));
}

#[test]
fn callbacks_cannot_reenter_the_registry() {
	init_tracing();
	let udp = UdpPair::new();
	let other = UdpPair::new();
	let reactor = Arc::new(SocketReactor::new("reentrant-reactor").unwrap());

	let (tx, rx) = mpsc::channel();
	let weak = Arc::downgrade(&reactor);
	let other_fd = other.fd();
	reactor
		.register_datagram(udp.fd(), move |_, _| {
			if let Some(reactor) = weak.upgrade() {
				let register = reactor.register_datagram(other_fd, |_, _| {});
				let deregister = reactor.deregister(other_fd);
				tx.send((register, deregister, reactor.state(other_fd))).unwrap();
			}
		})
		.unwrap();

	udp.send(b"x");
	let (register, deregister, state) = rx.recv_timeout(WAIT).unwrap();
	assert!(matches!(register, Err(ReactorError::ReentrantCall)));
	assert!(matches!(deregister, Err(ReactorError::ReentrantCall)));
	assert_eq!(state, None);

	reactor.deregister(udp.fd()).unwrap();
}

#[test]
fn stop_from_inside_a_callback() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = Arc::new(SocketReactor::new("self-stop-reactor").unwrap());

	let weak = Arc::downgrade(&reactor);
	reactor
		.register_datagram(udp.fd(), move |_, _| {
			if let Some(reactor) = weak.upgrade() {
				reactor.stop();
			}
		})
		.unwrap();

	udp.send(b"bye");
	assert!(wait_until(WAIT, || !reactor.is_running()));
	reactor.stop();
	assert_eq!(reactor.state(udp.fd()), None);
}

#[test]
fn stream_task_delivers_bytes_and_retires_on_close() {
	init_tracing();
	let mut server = SocketHandle::new();
	tcp_make_server(&mut server, "127.0.0.1", 0, 1).unwrap();
	let port = server.local_addr().unwrap().port();

	let mut client = SocketHandle::new();
	client.open(AddrFamily::Ipv4, SocketKind::Stream, Protocol::Tcp).unwrap();
	client.connect("127.0.0.1", port).unwrap();
	let (peer, _) = server.accept().unwrap();

	let reactor = SocketReactor::new("tcp-reactor").unwrap();
	let received = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&received);
	reactor
		.register_stream(peer.fd().unwrap(), move |buf| sink.lock().unwrap().extend_from_slice(&buf))
		.unwrap();

	stream_send(&client.fd().unwrap(), b"hello reactor").unwrap();
	assert!(wait_until(WAIT, || received.lock().unwrap().as_slice() == b"hello reactor"));

	client.close();
	assert!(wait_until(WAIT, || reactor.state(peer.fd().unwrap()).is_none()));
	reactor.stop();
	assert!(peer.is_open());
	assert!(peer.as_fd().map(|fd| fd.as_raw_fd()).is_some());
}

#[test]
fn register_deregister_burst_outpaces_the_reactor() {
	init_tracing();
	let udp = UdpPair::new();
	let reactor = SocketReactor::new("burst-reactor").unwrap();

	// 40000 commands against a pipe that holds a few thousand records.
	for round in 0..20_000 {
		reactor
			.register_datagram(udp.fd(), |_, _| {})
			.unwrap_or_else(|e| panic!("register failed in round {round}: {e}"));
		reactor
			.deregister(udp.fd())
			.unwrap_or_else(|e| panic!("deregister failed in round {round}: {e}"));
	}
	assert!(reactor.is_running());

	let (tx, rx) = mpsc::channel();
	reactor.register_datagram(udp.fd(), move |buf, _| tx.send(buf.to_vec()).unwrap()).unwrap();
	udp.send(b"still alive");
	assert_eq!(rx.recv_timeout(WAIT).unwrap(), b"still alive");
	reactor.stop();
}

#[test]
fn ready_data_is_dispatched_before_exit() {
	init_tracing();
	let blocker = UdpPair::new();
	let late = UdpPair::new();
	let reactor = Arc::new(SocketReactor::new("order-reactor").unwrap());

	let (entered_tx, entered_rx) = mpsc::channel();
	let (release_tx, release_rx) = mpsc::channel::<()>();
	reactor
		.register_datagram(blocker.fd(), move |_, _| {
			entered_tx.send(()).unwrap();
			let _ = release_rx.recv_timeout(WAIT);
		})
		.unwrap();
	let delivered = Arc::new(AtomicBool::new(false));
	let flag = Arc::clone(&delivered);
	reactor
		.register_datagram(late.fd(), move |_, _| flag.store(true, Ordering::SeqCst))
		.unwrap();
	wait_active(&reactor, blocker.fd());
	wait_active(&reactor, late.fd());

	// Park the reactor inside the first callback.
	blocker.send(b"hold");
	entered_rx.recv_timeout(WAIT).unwrap();

	// Data and Exit are both pending by the time the reactor wakes again.
	late.send(b"late");
	let stopper = {
		let reactor = Arc::clone(&reactor);
		std::thread::spawn(move || reactor.stop())
	};
	assert!(wait_until(WAIT, || !reactor.is_running()));
	release_tx.send(()).unwrap();

	stopper.join().unwrap();
	assert!(delivered.load(Ordering::SeqCst));
}

#[test]
fn descriptor_closed_without_deregistering_is_dropped() {
	init_tracing();
	let socket = open_socket(AddrFamily::Ipv4, SocketKind::Datagram, Protocol::Udp).unwrap();
	// A high descriptor number keeps parallel tests from reusing it once closed.
	let raw = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 512) };
	assert!(raw >= 512);
	let doomed = unsafe { OwnedFd::from_raw_fd(raw) };
	drop(socket);

	let reactor = SocketReactor::new("closed-reactor").unwrap();
	reactor.register_datagram(raw, |_, _| {}).unwrap();
	wait_active(&reactor, raw);
	drop(doomed);

	// A closed descriptor does not interrupt a wait in progress; any other
	// registration wakes the reactor, which then sees the stale slot.
	let other = UdpPair::new();
	reactor.register_datagram(other.fd(), |_, _| {}).unwrap();
	assert!(wait_until(WAIT, || reactor.state(raw).is_none()));
	assert!(matches!(reactor.deregister(raw), Err(ReactorError::NotRegistered { .. })));

	wait_active(&reactor, other.fd());
	reactor.deregister(other.fd()).unwrap();
}
