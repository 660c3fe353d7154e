//! Per-connection IEC-104 protocol state machine (§4.4).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use iec104_codec::apci::UFrameCommand;
use iec104_codec::Apdu;
use iec104_device::Device;

/// Idle-inactivity timeout: a session that sees no traffic for this long
/// is terminated (§4.4, T1).
const T1_IDLE_TIMEOUT: Duration = Duration::from_secs(15);
/// Data pump cadence while `Started`.
const PUMP_INTERVAL: Duration = Duration::from_secs(1);
const SEQ_MODULUS: u16 = 1 << 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Stopped,
    Started,
}

/// Sequence state shared between the read loop and the data pump task.
/// The session, not the device, is authoritative for what goes out on
/// the wire — any Tx/Rx the device model assigned gets overwritten here.
struct Counters {
    tx: u16,
    rx: u16,
    peer_ack: u16,
}

impl Counters {
    fn new() -> Self {
        Counters { tx: 0, rx: 0, peer_ack: 0 }
    }

    fn stamp(&mut self, apdu: &mut Apdu) {
        if let Apdu::IFrame { tx, rx, .. } = apdu {
            *tx = self.tx;
            self.tx = (self.tx + 1) % SEQ_MODULUS;
            *rx = self.rx;
        }
    }
}

async fn send(wr: &Arc<Mutex<WriteHalf<TcpStream>>>, counters: &Arc<Mutex<Counters>>, mut apdu: Apdu) {
    apdu.restamp_now();
    counters.lock().await.stamp(&mut apdu);
    let bytes = apdu.encode();
    if let Err(e) = wr.lock().await.write_all(&bytes).await {
        warn!("session write failed: {e}");
    }
}

/// Drives one accepted SCADA connection until it closes or `cancel` fires.
pub async fn run_session(stream: TcpStream, device: Arc<Device>, cancel: CancellationToken) {
    let peer = stream.peer_addr().ok();
    info!(?peer, "session accepted");

    let (mut rd, wr) = tokio::io::split(stream);
    let wr = Arc::new(Mutex::new(wr));
    let counters = Arc::new(Mutex::new(Counters::new()));
    let mut state = SessionState::Stopped;
    let mut pump: Option<(CancellationToken, JoinHandle<()>)> = None;
    let mut buf: Vec<u8> = Vec::with_capacity(256);
    let mut chunk = [0u8; 512];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                info!(?peer, "session cancelled");
                break;
            },
            r = timeout(T1_IDLE_TIMEOUT, rd.read(&mut chunk)) => r,
        };

        let n = match read {
            Ok(Ok(0)) => {
                info!(?peer, "peer closed connection");
                break;
            },
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!(?peer, "session read error: {e}");
                break;
            },
            Err(_elapsed) => {
                info!(?peer, "T1 idle timeout, closing session");
                break;
            },
        };
        buf.extend_from_slice(&chunk[..n]);

        loop {
            match Apdu::decode(&buf) {
                Ok((apdu, consumed)) => {
                    buf.drain(..consumed);
                    handle_apdu(apdu, &mut state, &device, &wr, &counters, &mut pump, &cancel).await;
                },
                Err(iec104_codec::CodecError::ShortFrame { .. }) => break,
                Err(e) => {
                    warn!(?peer, "malformed APDU, dropping frame: {e}");
                    buf.clear();
                    break;
                },
            }
        }
    }

    if let Some((pump_cancel, handle)) = pump.take() {
        pump_cancel.cancel();
        let _ = handle.await;
    }
    info!(?peer, "session closed");
}

async fn handle_apdu(
    apdu: Apdu,
    state: &mut SessionState,
    device: &Arc<Device>,
    wr: &Arc<Mutex<WriteHalf<TcpStream>>>,
    counters: &Arc<Mutex<Counters>>,
    pump: &mut Option<(CancellationToken, JoinHandle<()>)>,
    session_cancel: &CancellationToken,
) {
    match (*state, apdu) {
        (SessionState::Stopped, Apdu::UFrame(UFrameCommand::StartDtAct)) => {
            info!(guid = device.guid, "STARTDT received, starting data pump");
            send(wr, counters, Apdu::UFrame(UFrameCommand::StartDtCon)).await;
            for startup in device.startup_apdus() {
                send(wr, counters, startup).await;
            }
            *state = SessionState::Started;
            *pump = Some(spawn_pump(device.clone(), wr.clone(), counters.clone(), session_cancel.child_token()));
        },
        (SessionState::Stopped, _) => {
            debug!(guid = device.guid, "I/S-frame or unexpected U-frame while Stopped, closing");
            session_cancel.cancel();
        },
        (SessionState::Started, Apdu::IFrame { rx, asdu, .. }) => {
            {
                let mut c = counters.lock().await;
                c.rx = (c.rx + 1) % SEQ_MODULUS;
                c.peer_ack = rx;
            }
            let incoming = Apdu::IFrame { tx: 0, rx: 0, asdu };
            for reply in device.handle_iframe(&incoming).await {
                send(wr, counters, reply).await;
            }
        },
        (SessionState::Started, Apdu::SFrame { rx }) => {
            counters.lock().await.peer_ack = rx;
        },
        (SessionState::Started, Apdu::UFrame(UFrameCommand::TestFrAct)) => {
            send(wr, counters, Apdu::UFrame(UFrameCommand::TestFrCon)).await;
        },
        (SessionState::Started, Apdu::UFrame(UFrameCommand::StopDtAct)) => {
            info!(guid = device.guid, "STOPDT received, stopping data pump");
            if let Some((pump_cancel, handle)) = pump.take() {
                pump_cancel.cancel();
                let _ = handle.await;
            }
            send(wr, counters, Apdu::UFrame(UFrameCommand::StopDtCon)).await;
            *state = SessionState::Stopped;
        },
        (SessionState::Started, other) => {
            debug!(guid = device.guid, ?other, "unexpected frame while Started, ignoring");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iec104_device::PhysicalState;
    use tokio::net::TcpListener;
    use tokio::time::Duration as StdDuration;

    async fn read_exact_timeout(rd: &mut TcpStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        timeout(StdDuration::from_secs(2), rd.read_exact(&mut buf)).await.unwrap().unwrap();
        buf
    }

    #[tokio::test]
    async fn startdt_brings_up_the_session_and_sends_end_of_initialization() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = Arc::new(Device::new(7, vec![], vec![], PhysicalState::new_source(100.0)));
        let cancel = CancellationToken::new();

        let accept_cancel = cancel.child_token();
        let accept_device = device.clone();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            run_session(stream, accept_device, accept_cancel).await;
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&Apdu::UFrame(UFrameCommand::StartDtAct).encode()).await.unwrap();

        let con = read_exact_timeout(&mut client, 6).await;
        assert_eq!(con, Apdu::UFrame(UFrameCommand::StartDtCon).encode());

        // End-of-initialization I-frame follows; just confirm a start byte
        // and non-U-frame control arrive within budget.
        let header = read_exact_timeout(&mut client, 2).await;
        assert_eq!(header[0], iec104_codec::apdu::START_BYTE);

        cancel.cancel();
        let _ = server.await;
    }

    #[tokio::test]
    async fn stopdt_returns_the_session_to_stopped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = Arc::new(Device::new(8, vec![], vec![], PhysicalState::new_source(100.0)));
        let cancel = CancellationToken::new();

        let accept_cancel = cancel.child_token();
        let accept_device = device.clone();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            run_session(stream, accept_device, accept_cancel).await;
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&Apdu::UFrame(UFrameCommand::StartDtAct).encode()).await.unwrap();
        let _startdt_con = read_exact_timeout(&mut client, 6).await;
        // drain the end-of-initialization I-frame: read its 2-byte header
        // to learn the remaining length, then the rest.
        let header = read_exact_timeout(&mut client, 2).await;
        let remaining = header[1] as usize;
        let _ = read_exact_timeout(&mut client, remaining).await;

        client.write_all(&Apdu::UFrame(UFrameCommand::StopDtAct).encode()).await.unwrap();
        let con = read_exact_timeout(&mut client, 6).await;
        assert_eq!(con, Apdu::UFrame(UFrameCommand::StopDtCon).encode());

        cancel.cancel();
        let _ = server.await;
    }
}

fn spawn_pump(
    device: Arc<Device>,
    wr: Arc<Mutex<WriteHalf<TcpStream>>>,
    counters: Arc<Mutex<Counters>>,
    cancel: CancellationToken,
) -> (CancellationToken, JoinHandle<()>) {
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(PUMP_INTERVAL) => {},
                }
                for apdu in device.poll_values().await {
                    send(&wr, &counters, apdu).await;
                }
            }
        }
    });
    (cancel, handle)
}
