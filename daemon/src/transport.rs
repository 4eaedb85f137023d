//! Newline-delimited JSON transport: one [`Request`] per input line, one
//! [`Response`] per output line.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use xledger_gateway::{ChannelSink, Gateway, Request, Response, ResponseSink};

const RESPONSE_QUEUE: usize = 256;

/// Serve requests from `input` until it closes or shutdown is signalled.
///
/// When the input closes, in-flight requests (continuations included) are
/// delivered before returning. On shutdown they are abandoned.
pub async fn serve<R, W>(
    gateway: &Gateway,
    input: R,
    output: W,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Response>(RESPONSE_QUEUE);
    let writer = tokio::spawn(write_responses(rx, output));
    let sink: Arc<dyn ResponseSink> = Arc::new(ChannelSink(tx));

    let mut lines = input.lines();
    let mut deliveries = JoinSet::new();
    let mut stopping = false;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("transport stopping");
                stopping = true;
                break;
            }
            Some(_) = deliveries.join_next(), if !deliveries.is_empty() => {}
            line = lines.next_line() => match line? {
                None => {
                    tracing::info!(in_flight = deliveries.len(), "input closed");
                    break;
                }
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match serde_json::from_str::<Request>(&line) {
                    Ok(request) => {
                        let delivery = gateway.handle(request, Arc::clone(&sink));
                        deliveries.spawn(async move {
                            match delivery.await {
                                Ok(Ok(sent)) => tracing::debug!(sent, "request delivered"),
                                Ok(Err(e)) => tracing::warn!(error = %e, "delivery failed"),
                                Err(e) => tracing::warn!(error = %e, "delivery task failed"),
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed request line"),
                },
            },
        }
    }

    if !stopping {
        let drained = async { while deliveries.join_next().await.is_some() {} };
        tokio::select! {
            biased;
            _ = shutdown.recv() => stopping = true,
            _ = drained => {}
        }
    }
    if stopping {
        deliveries.abort_all();
    }
    while deliveries.join_next().await.is_some() {}

    drop(sink);
    writer.await??;
    Ok(())
}

async fn write_responses<W>(mut rx: mpsc::Receiver<Response>, mut output: W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}
