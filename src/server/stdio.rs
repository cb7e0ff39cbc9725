//! Line-delimited stdio transport
//!
//! Every non-empty input line is handled on its own task so a slow Kibo
//! call does not hold up later requests. A single writer task owns the
//! output stream; responses may therefore be written out of request order.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::McpServer;
use crate::Result;
use crate::error::rpc_codes;
use crate::protocol::JsonRpcResponse;

/// Outbound queue depth
const RESPONSE_BUFFER: usize = 64;

/// Serve on the process's stdin and stdout
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if stdin cannot be read.
pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve until `reader` reaches end of input, then wait for in-flight
/// requests and flush their responses.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if reading fails.
pub async fn serve<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(RESPONSE_BUFFER);
    let writer_task = tokio::spawn(write_responses(writer, rx));

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut in_flight = JoinSet::new();

    info!(tools = server.tools().len(), "Serving MCP over stdio");

    let read_result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }
        let line = match String::from_utf8(trim_line_ending(&buf).to_vec()) {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "Input line is not UTF-8");
                let response = JsonRpcResponse::error(
                    None,
                    rpc_codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                );
                send(&tx, &response).await;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let server = Arc::clone(&server);
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = server.handle_line(&line).await {
                send(&tx, &response).await;
            }
        });

        // Reap finished handlers so the set does not grow unbounded
        while in_flight.try_join_next().is_some() {}
    };

    while in_flight.join_next().await.is_some() {}
    drop(tx);
    if let Err(e) = writer_task.await {
        error!(error = %e, "Response writer task failed");
    }

    info!("Input closed; stdio server stopped");
    read_result.map_err(Into::into)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

async fn send(tx: &mpsc::Sender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(text) => {
            if tx.send(text).await.is_err() {
                debug!("Output closed; dropping response");
            }
        }
        Err(e) => error!(error = %e, "Failed to serialize response"),
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            error!(error = %e, "Failed to write response");
            break;
        }
    }
}
