//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Each inbound line is handled on its own task so a slow relay never
//! blocks the next request. Responses go through a channel to a single
//! writer task, which keeps frames whole on stdout. Logs must never be
//! written to stdout while this is running.
//!
//! Only I/O failures on the pipes themselves end the loop. A frame that is
//! not UTF-8 or not JSON gets `-32700`, an oversized frame gets `-32600`,
//! and a request task that panics gets `-32603`.

use std::future::Future;
use std::io;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use super::server::{
    json_rpc_error, McpServer, INTERNAL_ERROR, INVALID_REQUEST, MAX_MESSAGE_BYTES, PARSE_ERROR,
};

/// Chunk size used while skipping the tail of an oversized frame.
const DISCARD_CHUNK: u64 = 64 * 1024;

/// Outcome of reading one newline-terminated frame.
#[derive(Debug, PartialEq)]
enum Frame {
    Line,
    TooLarge,
    Eof,
}

/// Serve until `reader` hits EOF, then wait for in-flight requests to
/// finish writing before returning.
pub async fn serve<R, W>(server: McpServer, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    let writer_task = tokio::spawn(write_frames(writer, rx));

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        match read_frame(&mut reader, &mut buf, MAX_MESSAGE_BYTES).await? {
            Frame::Eof => break,
            Frame::TooLarge => {
                tracing::warn!("stdio: dropped frame larger than {} bytes", MAX_MESSAGE_BYTES);
                let _ = tx.send(json_rpc_error(Value::Null, INVALID_REQUEST, "Request too large"));
                continue;
            }
            Frame::Line => {}
        }

        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!("stdio: frame is not UTF-8: {}", e.utf8_error());
                let _ = tx.send(json_rpc_error(Value::Null, PARSE_ERROR, "Parse error"));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let server = server.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = respond(async move { server.handle_line(&line).await }).await {
                // Receiver only goes away if the writer already failed.
                let _ = tx.send(response);
            }
        });
    }

    tracing::info!("stdio: input closed, draining in-flight requests");
    drop(tx);
    writer_task.await.map_err(io::Error::other)?
}

/// Run one request on its own task. A panic becomes `-32603`.
async fn respond<F>(request: F) -> Option<Value>
where
    F: Future<Output = Option<Value>> + Send + 'static,
{
    match tokio::spawn(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("stdio: request task failed: {}", e);
            Some(json_rpc_error(Value::Null, INTERNAL_ERROR, "Internal error"))
        }
    }
}

/// Read one frame into `buf`, without its line terminator. Frames longer
/// than `limit` are skipped up to the next newline and leave `buf` empty.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader).take(limit as u64 + 1).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(Frame::Line);
    }
    if buf.len() <= limit {
        // Last line of the stream, no trailing newline.
        return Ok(Frame::Line);
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(DISCARD_CHUNK).read_until(b'\n', buf).await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(Frame::TooLarge)
}

async fn write_frames<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut frame = serde_json::to_vec(&message)?;
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
