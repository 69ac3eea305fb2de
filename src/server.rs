//! Newline-delimited JSON over TCP. One request per line, one response per line.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use crate::app::{App, Request, Response, handle_request};

const MAX_REQUEST_LEN: usize = 64 * 1024;

/// Accept connections until `shutdown` fires. Each connection is served on
/// its own task, so a client can poll status while another waits on a run.
pub async fn serve(
    app: Arc<App>,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    tracing::info!(%addr, "listening");

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    continue;
                }
            },
        };

        let app = Arc::clone(&app);
        tokio::spawn(async move {
            tracing::debug!(%peer, "connection opened");
            match handle_connection(&app, stream).await {
                Ok(()) => tracing::debug!(%peer, "connection closed"),
                Err(e) => tracing::debug!(%peer, error = %e, "connection dropped"),
            }
        });
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn handle_connection(app: &App, stream: TcpStream) -> Result<(), LinesCodecError> {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_REQUEST_LEN));
    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = respond(app, &line).await;
        lines.send(response).await?;
    }
    Ok(())
}

/// Answer one raw request line.
pub async fn respond(app: &App, line: &str) -> String {
    let response = match Request::parse(line) {
        Ok(request) => {
            tracing::debug!(?request, "request");
            handle_request(app, request).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed request");
            Response::malformed(e)
        }
    };

    serde_json::to_string(&response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode response");
        serde_json::json!({"message": {"text": e.to_string(), "status": "error"}}).to_string()
    })
}
