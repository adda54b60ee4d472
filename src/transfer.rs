//! File transfer paths: streaming a file out to a client (GET) and writing
//! an inbound body to a file (PUT).
//!
//! Both directions move data through a fixed-size buffer of
//! [`BUFFER_LEN`](crate::protocol::BUFFER_LEN) bytes, so arbitrarily large
//! files are never held in memory.

use crate::protocol::{status, TerminatorDetector, BUFFER_LEN};
use bytes::BytesMut;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Stream the named file to the client.
///
/// An unopenable file yields `404 Not Found` and nothing else. Otherwise the
/// reply is the `200 OK` status, a blank line, the raw file bytes in
/// buffer-sized chunks, and a trailing delimiter of three newlines.
pub async fn send_file<W>(path: &Path, writer: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "GET target not readable");
            writer.write_all(status::NOT_FOUND).await?;
            return Ok(());
        }
    };

    writer.write_all(status::OK).await?;
    writer.write_all(b"\n").await?;

    // Each chunk goes out as soon as it is read.
    let mut buffer = [0u8; BUFFER_LEN];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
    }

    writer.write_all(b"\n\n\n").await?;
    Ok(())
}

/// Receive a PUT body into the named file.
///
/// The target is created or truncated up front; if that fails the client
/// gets `501 Put Error` and no body bytes are consumed. Otherwise chunks are
/// appended verbatim until the terminator (two consecutive empty chunks) is
/// seen, the file is closed, and `201 Created` is sent.
///
/// The peer disappearing before the terminator is a transport failure for
/// the whole connection, surfaced as [`io::ErrorKind::UnexpectedEof`].
pub async fn receive_file<R, W>(path: &Path, reader: &mut R, writer: &mut W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut file = match File::create(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "PUT target not writable");
            writer.write_all(status::PUT_ERROR).await?;
            return Ok(());
        }
    };

    let mut buffer = [0u8; BUFFER_LEN];
    let mut detector = TerminatorDetector::new();
    let mut body = BytesMut::with_capacity(BUFFER_LEN);

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before PUT terminator",
            ));
        }

        body.clear();
        if detector.feed(&buffer[..n], &mut body) {
            break;
        }
        file.write_all(&body).await?;
    }

    file.flush().await?;
    drop(file);

    writer.write_all(status::CREATED).await?;
    Ok(())
}
