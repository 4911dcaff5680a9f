//! Websocket feed client. Runs on its own thread with a small tokio runtime
//! and hands every frame to the render thread over a channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::Result;
use crate::ingest::Ingress;

/// Fixed delay between reconnect attempts. No backoff, no retry limit.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Default)]
struct FeedState {
    connected: AtomicBool,
    reconnects: AtomicU64,
    stop: AtomicBool,
}

/// Handle to the feed thread. Dropping it asks the thread to stop.
pub struct FeedHandle {
    state: Arc<FeedState>,
}

impl FeedHandle {
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.state.reconnects.load(Ordering::Relaxed)
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.state.stop.store(true, Ordering::Relaxed);
    }
}

/// Start the feed thread for `url`. Frames go to `tx` until it is dropped.
pub fn spawn(url: String, tx: Sender<Ingress>) -> Result<FeedHandle> {
    let state = Arc::new(FeedState::default());
    let thread_state = state.clone();

    std::thread::Builder::new()
        .name("feed".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Feed runtime failed to start: {e}");
                    return;
                }
            };
            rt.block_on(run_feed(url, tx, thread_state));
        })?;

    Ok(FeedHandle { state })
}

async fn run_feed(url: String, tx: Sender<Ingress>, state: Arc<FeedState>) {
    while !state.stop.load(Ordering::Relaxed) {
        match connect_async(url.as_str()).await {
            Ok((mut ws, _)) => {
                log::info!("Feed connected: {url}");
                state.connected.store(true, Ordering::Relaxed);

                while let Some(msg) = ws.next().await {
                    let ingress = match msg {
                        Ok(Message::Text(text)) => Ingress::Text(text.as_str().to_owned()),
                        Ok(Message::Binary(bytes)) => Ingress::Binary(bytes.to_vec()),
                        Ok(Message::Close(_)) => {
                            log::info!("Feed closed by server");
                            break;
                        }
                        Ok(_) => continue,
                        Err(e) => {
                            log::warn!("Feed error: {e}");
                            break;
                        }
                    };
                    if tx.send(ingress).is_err() {
                        log::debug!("Chart went away, feed stopping");
                        return;
                    }
                }
                state.connected.store(false, Ordering::Relaxed);
            }
            Err(e) => log::warn!("Feed connect to {url} failed: {e}"),
        }

        if state.stop.load(Ordering::Relaxed) {
            break;
        }
        log::warn!("Feed lost; reconnecting in {}s", RECONNECT_DELAY.as_secs());
        tokio::time::sleep(RECONNECT_DELAY).await;
        state.reconnects.fetch_add(1, Ordering::Relaxed);
    }
}
