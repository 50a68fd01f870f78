//! The [`Stream`] capability trait and the [`WireStream`] socket wrapper.
//!
//! The relay is generic over any `Read + Write` stream, but two of its
//! behaviors need more than the std traits offer: recovering from a
//! corrupted header drains the stream under a short read deadline, and a
//! server codec needs a second handle to the same descriptor so reads and
//! writes can proceed from different threads. [`Stream`] names those
//! capabilities; sockets have them, in-memory test streams usually don't.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// A duplex byte stream with socket-grade capabilities.
pub trait Stream: Read + Write + Send {
    /// Install a read deadline. Returns `false` when the stream cannot
    /// support deadlines; callers must then skip deadline-dependent work.
    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> bool {
        let _ = timeout;
        false
    }

    /// Shut down both directions of the stream.
    fn shutdown(&mut self) -> std::io::Result<()>;

    /// A second handle to the same underlying stream.
    fn try_clone(&self) -> std::io::Result<Self>
    where
        Self: Sized;
}

#[cfg(unix)]
impl Stream for UnixStream {
    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> bool {
        UnixStream::set_read_timeout(self, timeout).is_ok()
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        UnixStream::shutdown(self, std::net::Shutdown::Both)
    }

    fn try_clone(&self) -> std::io::Result<Self> {
        UnixStream::try_clone(self)
    }
}

impl Stream for TcpStream {
    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> bool {
        TcpStream::set_read_timeout(self, timeout).is_ok()
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        TcpStream::shutdown(self, std::net::Shutdown::Both)
    }

    fn try_clone(&self) -> std::io::Result<Self> {
        TcpStream::try_clone(self)
    }
}

/// A connected socket stream, Unix-domain or TCP.
///
/// This is the concrete type transport listeners hand out. It erases the
/// socket family so the layers above hold a single stream type.
pub struct WireStream {
    inner: WireStreamInner,
}

enum WireStreamInner {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl WireStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: UnixStream) -> Self {
        Self {
            inner: WireStreamInner::Unix(stream),
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: WireStreamInner::Tcp(stream),
        }
    }

    /// Set a write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(s) => s.set_write_timeout(timeout),
            WireStreamInner::Tcp(s) => s.set_write_timeout(timeout),
        }
    }

    /// Credentials of the connected peer over a Unix socket.
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`. `None` for TCP streams
    /// and on platforms without peer credentials.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            WireStreamInner::Unix(s) => s.as_raw_fd(),
            WireStreamInner::Tcp(_) => return None,
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers of the
        // advertised sizes and `fd` is an open socket owned by self.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl Read for WireStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(s) => s.read(buf),
            WireStreamInner::Tcp(s) => s.read(buf),
        }
    }
}

impl Write for WireStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(s) => s.write(buf),
            WireStreamInner::Tcp(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(s) => s.flush(),
            WireStreamInner::Tcp(s) => s.flush(),
        }
    }
}

impl Stream for WireStream {
    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> bool {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(s) => s.set_read_timeout(timeout).is_ok(),
            WireStreamInner::Tcp(s) => s.set_read_timeout(timeout).is_ok(),
        }
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(s) => s.shutdown(std::net::Shutdown::Both),
            WireStreamInner::Tcp(s) => s.shutdown(std::net::Shutdown::Both),
        }
    }

    fn try_clone(&self) -> std::io::Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(s) => s.try_clone().map(Self::from_unix),
            WireStreamInner::Tcp(s) => s.try_clone().map(Self::from_tcp),
        }
    }
}

impl std::fmt::Debug for WireStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let family = match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(_) => "unix",
            WireStreamInner::Tcp(_) => "tcp",
        };
        f.debug_struct("WireStream").field("family", &family).finish()
    }
}
