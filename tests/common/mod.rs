#![allow(dead_code)]

use std::time::{Duration, Instant};
use rxsock::{AddrFamily, Protocol, SocketKind, open_socket};

/// Routes `tracing` output through the test harness. `RUST_LOG` picks the level.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + timeout;
	while Instant::now() < deadline {
		if cond() {
			return true;
		}
		std::thread::sleep(Duration::from_millis(5));
	}
	cond()
}

/// Whether this kernel can open SCTP sockets at all (module loaded, not blocked).
pub fn sctp_supported() -> bool {
	match open_socket(AddrFamily::Ipv4, SocketKind::Stream, Protocol::Sctp) {
		Ok(_) => true,
		Err(e) => {
			eprintln!("SCTP unavailable, skipping: {e}");
			false
		}
	}
}
