//! Line-delimited JSON command server.
//!
//! Every connection gets its own task. Each non-blank inbound line is one
//! command and produces exactly one response line. Lines that are not UTF-8
//! or exceed [`MAX_COMMAND_LINE_BYTES`] are answered with an error envelope
//! on the same connection, which stays open.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use pantilt_common::command::{ParseError, Response};
use pantilt_common::consts::MAX_COMMAND_LINE_BYTES;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::command::handle_command;
use crate::state::SharedPosition;

/// Command channel listener.
pub struct CommandServer {
    listener: TcpListener,
    shared: Arc<SharedPosition>,
}

impl CommandServer {
    /// Bind the listener.
    ///
    /// # Errors
    /// Any socket error from binding `addr`.
    pub async fn bind(addr: &str, shared: Arc<SharedPosition>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Command server listening on {}", listener.local_addr()?);
        Ok(Self { listener, shared })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves, then close every open
    /// connection before returning.
    pub async fn serve<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let shared = Arc::clone(&self.shared);
                        connections.spawn(async move {
                            info!("Client connected: {peer}");
                            match handle_connection(stream, &shared).await {
                                Ok(()) => info!("Client disconnected: {peer}"),
                                Err(e) => warn!("Client {peer} dropped: {e}"),
                            }
                        });
                    }
                    Err(e) => warn!("Accept failed: {e}"),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Connection task failed: {e}");
                    }
                }
                () = &mut shutdown => {
                    info!("Command server stopping, closing {} connections", connections.len());
                    break;
                }
            }
        }
        connections.shutdown().await;
    }
}

/// One inbound frame.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// Line contents without the line terminator.
    Line(Vec<u8>),
    /// Line longer than [`MAX_COMMAND_LINE_BYTES`]; already skipped.
    TooLong,
    /// Peer closed the connection.
    Eof,
}

/// Read the next line, holding at most `MAX_COMMAND_LINE_BYTES + 1` bytes.
async fn read_frame<R>(reader: &mut R) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_COMMAND_LINE_BYTES as u64 + 1;
    let mut buf = Vec::new();
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(Frame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if n > MAX_COMMAND_LINE_BYTES {
        discard_line(reader).await?;
        return Ok(Frame::TooLong);
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Frame::Line(buf))
}

/// Drop input up to and including the next newline.
async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, shared: &SharedPosition) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let response = match read_frame(&mut reader).await? {
            Frame::Eof => return Ok(()),
            Frame::TooLong => {
                debug!("<- line over {MAX_COMMAND_LINE_BYTES} bytes");
                Response::error(ParseError::Malformed(format!(
                    "line exceeds {MAX_COMMAND_LINE_BYTES} bytes"
                )))
            }
            Frame::Line(bytes) => match std::str::from_utf8(&bytes) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    debug!("<- {}", line.trim());
                    handle_command(shared, line)
                }
                Err(e) => {
                    debug!("<- {} bytes of invalid UTF-8", bytes.len());
                    Response::error(ParseError::Malformed(format!("invalid UTF-8: {e}")))
                }
            },
        };

        let mut out = response.to_json();
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
    }
}
