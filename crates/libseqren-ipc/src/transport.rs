//! Local duplex channel primitive
//!
//! Unix uses a domain socket at the endpoint address. Windows uses a named
//! pipe with a single instance, so a client arriving while a connection is
//! being serviced sees the pipe as busy.

use crate::endpoint::Endpoint;

#[cfg(unix)]
pub(crate) use self::unix::{connect, Connection, Listener};
#[cfg(windows)]
pub(crate) use self::windows::{connect, Connection, Listener};

#[cfg(unix)]
mod unix {
    use std::path::PathBuf;

    use tokio::net::{UnixListener, UnixStream};

    use super::Endpoint;

    pub(crate) type Connection = UnixStream;

    pub(crate) struct Listener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl Listener {
        /// Bind the endpoint, replacing a socket file left by a dead leader.
        /// Only the lock holder calls this, so the file cannot be live.
        pub(crate) fn bind(endpoint: &Endpoint) -> std::io::Result<Self> {
            let path = PathBuf::from(endpoint.address());
            let _ = std::fs::remove_file(&path);
            let inner = UnixListener::bind(&path)?;
            Ok(Self { inner, path })
        }

        pub(crate) async fn accept(&mut self) -> std::io::Result<Connection> {
            let (stream, _) = self.inner.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub(crate) async fn connect(endpoint: &Endpoint) -> std::io::Result<Connection> {
        UnixStream::connect(endpoint.address()).await
    }
}

#[cfg(windows)]
mod windows {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    use super::Endpoint;

    /// Either end of a connected pipe
    pub(crate) enum Connection {
        Server(NamedPipeServer),
        Client(NamedPipeClient),
    }

    pub(crate) struct Listener {
        address: String,
        pending: Option<NamedPipeServer>,
    }

    impl Listener {
        pub(crate) fn bind(endpoint: &Endpoint) -> std::io::Result<Self> {
            let address = endpoint.address().to_string();
            let pending = Some(create_instance(&address, true)?);
            Ok(Self { address, pending })
        }

        pub(crate) async fn accept(&mut self) -> std::io::Result<Connection> {
            let server = match self.pending.take() {
                Some(server) => server,
                None => create_instance(&self.address, false)?,
            };
            server.connect().await?;
            Ok(Connection::Server(server))
        }
    }

    /// Only the first instance claims the name; later ones replace the
    /// instance consumed by the previous connection.
    fn create_instance(address: &str, first: bool) -> std::io::Result<NamedPipeServer> {
        ServerOptions::new()
            .first_pipe_instance(first)
            .max_instances(1)
            .create(address)
    }

    pub(crate) async fn connect(endpoint: &Endpoint) -> std::io::Result<Connection> {
        ClientOptions::new()
            .open(endpoint.address())
            .map(Connection::Client)
    }

    impl AsyncRead for Connection {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.get_mut() {
                Connection::Server(s) => Pin::new(s).poll_read(cx, buf),
                Connection::Client(c) => Pin::new(c).poll_read(cx, buf),
            }
        }
    }

    impl AsyncWrite for Connection {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            match self.get_mut() {
                Connection::Server(s) => Pin::new(s).poll_write(cx, buf),
                Connection::Client(c) => Pin::new(c).poll_write(cx, buf),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            match self.get_mut() {
                Connection::Server(s) => Pin::new(s).poll_flush(cx),
                Connection::Client(c) => Pin::new(c).poll_flush(cx),
            }
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.get_mut() {
                Connection::Server(s) => Pin::new(s).poll_shutdown(cx),
                Connection::Client(c) => Pin::new(c).poll_shutdown(cx),
            }
        }
    }
}
