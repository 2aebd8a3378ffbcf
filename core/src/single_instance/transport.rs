//! Local IPC transport: Unix domain sockets, or named pipes on Windows.
//!
//! Both sides expose the same shape: `connect` for the probe, `Listener::bind` for the
//! primary, and a cancel-safe `accept` for use inside `select!`.

pub(super) use imp::*;

#[cfg(unix)]
mod imp {
    use std::io;
    use std::path::PathBuf;
    use tokio::net::{UnixListener, UnixStream};

    use crate::single_instance::Endpoint;

    pub(crate) type Outbound = UnixStream;
    pub(crate) type Inbound = UnixStream;

    pub(crate) async fn connect(endpoint: &Endpoint) -> io::Result<Outbound> {
        UnixStream::connect(endpoint.address()).await
    }

    /// True when bind failed because the name is taken (live or stale).
    pub(crate) fn is_in_use(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::AddrInUse
    }

    pub(crate) struct Listener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl Listener {
        /// Atomic bind-or-fail: fails with `AddrInUse` if the socket file exists.
        pub(crate) fn bind(endpoint: &Endpoint) -> io::Result<Self> {
            let inner = UnixListener::bind(endpoint.address())?;
            Ok(Self {
                inner,
                path: endpoint.address().to_path_buf(),
            })
        }

        /// Removes a socket file left behind by a dead primary and binds again.
        pub(crate) fn reclaim(endpoint: &Endpoint) -> io::Result<Self> {
            match std::fs::remove_file(endpoint.address()) {
                Ok(()) => log::info!("Removed stale socket {}", endpoint),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            Self::bind(endpoint)
        }

        pub(crate) async fn accept(&mut self) -> io::Result<Inbound> {
            let (stream, _) = self.inner.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::debug!("Could not remove socket {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::io;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    use crate::single_instance::Endpoint;

    /// `ERROR_PIPE_BUSY`: every server instance is mid-handshake; retry shortly.
    const ERROR_PIPE_BUSY: i32 = 231;

    pub(crate) type Outbound = NamedPipeClient;
    pub(crate) type Inbound = NamedPipeServer;

    pub(crate) async fn connect(endpoint: &Endpoint) -> io::Result<Outbound> {
        loop {
            match ClientOptions::new().open(endpoint.address()) {
                Ok(client) => return Ok(client),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {}
                Err(e) => return Err(e),
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// `first_pipe_instance` fails with access denied when another process owns the name.
    pub(crate) fn is_in_use(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::PermissionDenied
    }

    pub(crate) struct Listener {
        next: NamedPipeServer,
        address: PathBuf,
    }

    impl Listener {
        pub(crate) fn bind(endpoint: &Endpoint) -> io::Result<Self> {
            let next = ServerOptions::new()
                .first_pipe_instance(true)
                .create(endpoint.address())?;
            Ok(Self {
                next,
                address: endpoint.address().to_path_buf(),
            })
        }

        /// Pipes disappear with their last handle, so there is nothing stale to remove.
        pub(crate) fn reclaim(endpoint: &Endpoint) -> io::Result<Self> {
            Self::bind(endpoint)
        }

        pub(crate) async fn accept(&mut self) -> io::Result<Inbound> {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.address)?;
            Ok(std::mem::replace(&mut self.next, fresh))
        }
    }
}
