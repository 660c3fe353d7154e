//! TCP/2404 accept loop: one listener per device (§4.4).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use iec104_device::Device;

use crate::session::run_session;


/// Accepts SCADA connections until `cancel` fires. When `allow_concurrent`
/// is false only one session runs at a time; further accepts are held
/// until the slot frees up, matching the single-connection default (§4.4).
pub async fn run_listener(
    bind_addr: SocketAddr,
    allow_concurrent: bool,
    device: Arc<Device>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(guid = device.guid, %bind_addr, "listening for SCADA connections");

    let max_sessions = if allow_concurrent { 64 } else { 1 };
    let slots = Arc::new(Semaphore::new(max_sessions));

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => {
                info!(guid = device.guid, "listener cancelled");
                return Ok(());
            },
            r = listener.accept() => r,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            },
        };

        let permit = match slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(%peer, "rejecting connection: a session is already active");
                drop(stream);
                continue;
            },
        };

        let device = device.clone();
        let session_cancel = cancel.child_token();
        tokio::spawn(async move {
            run_session(stream, device, session_cancel).await;
            drop(permit);
        });
    }
}
