use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Generic watcher for streaming API responses.
///
/// Consumes a line-delimited JSON event stream and hands each decoded event
/// to the handler. The connection is re-established after it drops, so
/// long-running controllers can rely on the watch surviving apiserver
/// restarts.
pub async fn watch_stream<T, F>(url: &str, mut handle_event: F)
where
    T: DeserializeOwned,
    F: FnMut(T) + Send + 'static,
{
    let client = Client::new();
    loop {
        watch_once(&client, url, &mut handle_event).await;
        tokio::time::sleep(RECONNECT_DELAY).await;
        tracing::debug!(url=%url, "Reconnecting watch stream");
    }
}

async fn watch_once<T, F>(client: &Client, url: &str, handle_event: &mut F)
where
    T: DeserializeOwned,
    F: FnMut(T) + Send + 'static,
{
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let byte_stream = resp
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
            let stream_reader = StreamReader::new(byte_stream);
            let mut lines = BufReader::new(stream_reader).lines();

            tracing::debug!(url=%url, "Started watching stream");

            while let Ok(Some(line)) = lines.next_line().await {
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<T>(&line) {
                    Ok(event) => handle_event(event),
                    Err(e) => tracing::warn!("Failed to deserialize line: {}\nError: {}", line, e),
                }
            }

            tracing::warn!(url=%url, "Watch stream ended");
        }
        Ok(resp) => tracing::error!(status=%resp.status(), "Watch request failed: HTTP"),
        Err(err) => tracing::error!(error=%err, "Watch request error"),
    }
}
