use std::time::Duration;

use async_stream::try_stream;
use futures_util::{pin_mut, StreamExt};
use nearlens_core::BlockMessage;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::{retry, Result, SourceConfig};

/// Pause before re-dialing a feed that closed cleanly, e.g. when we are
/// already at the tip and the server has nothing newer to send.
const RECONNECT_THROTTLE: Duration = Duration::from_millis(700);

pub(crate) async fn run(
    client: Client,
    endpoint: String,
    config: SourceConfig,
    sender: mpsc::Sender<BlockMessage>,
    deliver: &mut impl FnMut(BlockMessage) -> Option<BlockMessage>,
) -> Result<()> {
    let endpoint = endpoint.trim_end_matches('/').to_string();
    let mut next = config.start_height;
    let mut failed_resume: Option<u64> = None;

    loop {
        if config.end_height.is_some_and(|end| next > end) {
            return Ok(());
        }

        let url = format!("{endpoint}/v0/stream?start={next}");
        let response = retry::with_backoff("stream connect", || connect(&client, &url)).await?;
        debug!(start = next, "feed connected");

        let stream = lines(response);
        pin_mut!(stream);

        while let Some(line) = stream.next().await {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "feed body interrupted");
                    break;
                }
            };
            // A line that fails to parse once may be a truncated tail from a
            // dropped connection: reconnect and re-read it. Failing again at
            // the same resume height means the message itself is malformed,
            // which must surface as fatal, never be skipped.
            let msg: BlockMessage = match serde_json::from_str(&line) {
                Ok(msg) => msg,
                Err(err) if failed_resume == Some(next) => return Err(err.into()),
                Err(err) => {
                    warn!(resume = next, error = %err, "unparseable feed line, re-reading");
                    failed_resume = Some(next);
                    break;
                }
            };
            failed_resume = None;
            let height = msg.block.header.height;
            if config.end_height.is_some_and(|end| height > end) {
                return Ok(());
            }
            next = height + 1;
            if let Some(msg) = deliver(msg) {
                if sender.send(msg).await.is_err() {
                    return Ok(());
                }
            }
            if config.end_height == Some(height) {
                return Ok(());
            }
        }

        warn!(resume = next, "feed disconnected, reconnecting");
        tokio::time::sleep(RECONNECT_THROTTLE).await;
    }
}

async fn connect(
    client: &Client,
    url: &str,
) -> std::result::Result<reqwest::Response, reqwest::Error> {
    client.get(url).send().await?.error_for_status()
}

/// Split a streaming NDJSON body into complete lines, buffering partial
/// chunks until their terminating newline arrives.
fn lines(response: reqwest::Response) -> impl Stream<Item = Result<String>> {
    try_stream! {
        let mut buf: Vec<u8> = Vec::new();
        let bytes = response.bytes_stream();
        pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            buf.extend_from_slice(&chunk?);
            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if !line.is_empty() {
                    yield line;
                }
            }
        }
        let tail = String::from_utf8_lossy(&buf).trim().to_string();
        if !tail.is_empty() {
            yield tail;
        }
    }
}
