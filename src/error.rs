use std::os::fd::RawFd;

/// Socket creation/configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket({protocol}) failed: {}", errno_to_str(*.errno))]
    Create { errno: i32, protocol: &'static str },

    #[error("socket is already open")]
    AlreadyOpen,

    #[error("socket is not open")]
    NotOpen,

    #[error("bind({addr}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("listen(backlog={backlog}) failed: {}", errno_to_str(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("accept() failed: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },
}

/// I/O operation errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("read() failed: {}", errno_to_str(*.errno))]
    Read { errno: i32 },

    #[error("write() failed: {}", errno_to_str(*.errno))]
    Write { errno: i32 },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("operation would block")]
    WouldBlock,

    #[error("interrupted by signal")]
    Interrupted,

    /// A stream send stopped part-way; `sent` bytes went out before the failure.
    #[error("send() stopped after {sent} bytes ({remaining} remaining): {}", errno_to_str(*.errno))]
    PartialSend { sent: usize, remaining: usize, errno: i32 },
}

/// Registration errors reported by the socket reactor.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("descriptor {fd} is not a valid open descriptor")]
    InvalidDescriptor { fd: RawFd },

    #[error("descriptor {fd} is already registered")]
    AlreadyRegistered { fd: RawFd },

    #[error("descriptor {fd} is not registered")]
    NotRegistered { fd: RawFd },

    #[error("reactor is stopped")]
    Stopped,

    #[error("registry cannot be modified from inside a receive callback")]
    ReentrantCall,

    /// The self-wake channel moved fewer bytes than one whole control message.
    #[error("control channel moved {transferred} of {expected} bytes: {}", errno_to_str(*.errno))]
    ControlChannel { transferred: usize, expected: usize, errno: i32 },

    #[error("control message carries unknown command tag {tag}")]
    UnknownCommand { tag: u32 },
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Converts errno to human-readable string.
pub(crate) fn errno_to_str(errno: i32) -> String {
    match errno {
        0 => "no error reported".into(),
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOPROTOOPT => "protocol option not available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::EPROTONOSUPPORT => "protocol not supported".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        libc::EPROTONOSUPPORT | libc::ENOPROTOOPT => std::io::ErrorKind::Unsupported,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let kind = match &err {
            SocketError::Create { errno, .. } => errno_to_kind(*errno),
            SocketError::AlreadyOpen => std::io::ErrorKind::AlreadyExists,
            SocketError::NotOpen => std::io::ErrorKind::NotConnected,
            SocketError::Bind { errno, .. } => errno_to_kind(*errno),
            SocketError::Listen { errno, .. } => errno_to_kind(*errno),
            SocketError::Connect { errno, .. } => errno_to_kind(*errno),
            SocketError::Accept { errno } => errno_to_kind(*errno),
            SocketError::SetOption { errno, .. } => errno_to_kind(*errno),
            SocketError::GetOption { errno, .. } => errno_to_kind(*errno),
            SocketError::InvalidAddress { .. } => std::io::ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, err)
    }
}

impl From<IoError> for std::io::Error {
    fn from(err: IoError) -> Self {
        let kind = match &err {
            IoError::Read { errno } => errno_to_kind(*errno),
            IoError::Write { errno } => errno_to_kind(*errno),
            IoError::ConnectionClosed => std::io::ErrorKind::ConnectionReset,
            IoError::WouldBlock => std::io::ErrorKind::WouldBlock,
            IoError::Interrupted => std::io::ErrorKind::Interrupted,
            IoError::PartialSend { errno: 0, .. } => std::io::ErrorKind::WriteZero,
            IoError::PartialSend { errno, .. } => errno_to_kind(*errno),
        };
        std::io::Error::new(kind, err)
    }
}

impl From<ReactorError> for std::io::Error {
    fn from(err: ReactorError) -> Self {
        let kind = match &err {
            ReactorError::InvalidDescriptor { .. } => std::io::ErrorKind::InvalidInput,
            ReactorError::AlreadyRegistered { .. } => std::io::ErrorKind::AlreadyExists,
            ReactorError::NotRegistered { .. } => std::io::ErrorKind::NotFound,
            ReactorError::Stopped => std::io::ErrorKind::NotConnected,
            ReactorError::ReentrantCall => std::io::ErrorKind::ResourceBusy,
            ReactorError::ControlChannel { errno, .. } => errno_to_kind(*errno),
            ReactorError::UnknownCommand { .. } => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}
