//! TCP acceptor and per-connection protocol handler.
//!
//! The acceptor loops forever; every accepted connection is handed off to
//! its own tokio task, which owns the stream end-to-end: greet, read one
//! request line, dispatch it, close. One slow or stalled client never
//! delays new accepts or other connections.

use crate::config::Config;
use crate::protocol::{self, status, Verb, BUFFER_LEN, GREETING};
use crate::transfer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Maximum number of concurrent connections
const MAX_CONNECTIONS: usize = 10000;

/// Server instance
pub struct Server {
    listen: String,
    root: Arc<PathBuf>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: &Config) -> Self {
        Server {
            listen: format!("{}:{}", config.host, config.port),
            root: Arc::new(config.root.clone()),
            connection_limit: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        }
    }

    /// Bind the listener and begin accepting connections
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.listen).await?;
        info!(address = %self.listen, "Server listening");
        self.serve(listener).await
    }

    /// Accept connections from an already-bound listener, forever.
    ///
    /// Each connection moves into its own task along with its permit; the
    /// acceptor never touches the stream again after the handoff.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            // Wait for a connection slot
            let permit = self.connection_limit.clone().acquire_owned().await?;

            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    let root = Arc::clone(&self.root);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &root).await {
                            debug!(error = %e, "Connection error");
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Handle a single client connection: greet, read exactly one request, and
/// dispatch it. The stream closes when this returns, on every path.
async fn handle_connection(
    mut stream: TcpStream,
    root: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    stream.write_all(GREETING).await?;

    let mut buffer = [0u8; BUFFER_LEN];
    let n = stream.read(&mut buffer).await?;
    if n == 0 {
        // Client went away without sending a request.
        debug!("Connection closed by client");
        return Ok(());
    }

    dispatch(&buffer[..n], root, &mut stream).await
}

/// One-shot command dispatch: exactly one of the four branches runs, and
/// every outcome except BYE produces a status line.
async fn dispatch(
    line: &[u8],
    root: &Path,
    stream: &mut TcpStream,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let request = match protocol::parse(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejecting request");
            stream.write_all(status::COMMAND_ERROR).await?;
            return Ok(());
        }
    };

    match request.verb {
        // BYE gets no reply; the close is the whole response.
        Verb::Bye => {}

        Verb::Get => match request.argument {
            Some(name) => match resolve(root, name) {
                Some(path) => transfer::send_file(&path, stream).await?,
                None => stream.write_all(status::NOT_FOUND).await?,
            },
            None => stream.write_all(status::GET_ERROR).await?,
        },

        Verb::Put => match request.argument.and_then(|name| resolve(root, name)) {
            Some(path) => {
                let (mut reader, mut writer) = stream.split();
                transfer::receive_file(&path, &mut reader, &mut writer).await?;
            }
            None => stream.write_all(status::PUT_ERROR).await?,
        },
    }

    Ok(())
}

/// Map a raw filename argument to a path under the serve root.
///
/// An empty name or one that is not valid UTF-8 cannot name a file here and
/// resolves to nothing, which the caller reports as an unopenable target.
fn resolve(root: &Path, name: &[u8]) -> Option<PathBuf> {
    let name = std::str::from_utf8(name).ok()?;
    if name.is_empty() {
        return None;
    }
    Some(root.join(name))
}
