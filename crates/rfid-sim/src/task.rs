//! Virtual reader task
//!
//! Owns a [`VirtualReader`] and serves it over an async stream, usually one
//! end of a `tokio::io::duplex` pair. The task ends when the host closes its
//! end.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::VirtualReader;

/// How replies are written back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Each reply in a single write
    Whole,
    /// Replies split into `size`-byte writes with `gap` between them
    Chunked { size: usize, gap: Duration },
}

/// Run a virtual reader until the stream closes
pub async fn run_reader_task<S>(
    mut stream: S,
    mut reader: VirtualReader,
    delivery: Delivery,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];
    info!("Starting virtual {} reader", reader.family().name());

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("Virtual {} reader stream closed", reader.family().name());
            break;
        }

        for reply in reader.process(&buf[..n]) {
            write_reply(&mut stream, &reply, delivery).await?;
        }
    }

    info!(
        "Virtual {} reader ended after {} commands",
        reader.family().name(),
        reader.commands_seen()
    );
    Ok(())
}

/// Swallow everything, answer nothing
pub async fn run_silent_task<S>(mut stream: S) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 256];
    while stream.read(&mut buf).await? > 0 {}
    Ok(())
}

/// Answer every write with `noise`
pub async fn run_noise_task<S>(mut stream: S, noise: Vec<u8>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 256];
    while stream.read(&mut buf).await? > 0 {
        stream.write_all(&noise).await?;
        stream.flush().await?;
    }
    Ok(())
}

async fn write_reply<S>(stream: &mut S, reply: &[u8], delivery: Delivery) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    match delivery {
        Delivery::Whole => stream.write_all(reply).await?,
        Delivery::Chunked { size, gap } => {
            for (i, chunk) in reply.chunks(size.max(1)).enumerate() {
                if i > 0 {
                    tokio::time::sleep(gap).await;
                }
                stream.write_all(chunk).await?;
                stream.flush().await?;
            }
        }
    }
    stream.flush().await
}
