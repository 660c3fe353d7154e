//! The `Device` type: a simulated field device's physical state plus
//! its IEC-104 data-point mapping and peer-bus capability set.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use iec104_bus::{BusMessage, BusRuntime, MessageId, PeerHandler};
use iec104_codec::asdu::{cot, Asdu, CauseOfTransmission};
use iec104_codec::io::{Diq, Dpi, InformationObject, IoPayload, Quality};
use iec104_codec::Apdu;

use crate::select;
use crate::state::{load_current, parallel_resistance, transmission_outputs, PhysicalState};

/// IOA assignment used by every device variant (§4.2, scenario of §8).
pub const IOA_PRIMARY: u32 = 1;
pub const IOA_SECONDARY: u32 = 2;
pub const BREAKER_IOA_BASE: u32 = 101;

const TICK_INTERVAL: Duration = Duration::from_millis(333);
const NEIGHBOR_REPLY_WAIT: Duration = Duration::from_millis(500);
/// 15-bit sequence space; counters wrap here, not at 2^16 (§9).
const SEQ_MODULUS: u16 = 1 << 15;

pub struct Device {
    pub guid: u16,
    pub inbound_neighbors: Vec<u16>,
    pub outbound_neighbors: Vec<u16>,
    state: RwLock<PhysicalState>,
    tx_seq: AtomicU16,
}

impl Device {
    pub fn new(
        guid: u16,
        inbound_neighbors: Vec<u16>,
        outbound_neighbors: Vec<u16>,
        state: PhysicalState,
    ) -> Self {
        Device {
            guid,
            inbound_neighbors,
            outbound_neighbors,
            state: RwLock::new(state),
            tx_seq: AtomicU16::new(0),
        }
    }

    pub fn guid32(&self) -> u32 {
        u32::from(self.guid)
    }

    /// Next Tx sequence number for a spontaneously-sent APDU, wrapping
    /// at 2^15. The Rx field is left at 0; the connection engine fills
    /// it in with the session's current receive count before sending,
    /// since only the session knows how many frames it has received.
    fn next_tx(&self) -> u16 {
        self.tx_seq
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some((v + 1) % SEQ_MODULUS)
            })
            .unwrap_or(0)
    }

    fn measured_float(&self, ioa: u32, value: f32, cause: u8) -> Apdu {
        let asdu = Asdu::new(
            CauseOfTransmission::new(cause),
            0,
            self.guid,
            vec![InformationObject {
                ioa,
                payload: IoPayload::MeasuredFloatTimestamped {
                    value,
                    quality: Quality::default(),
                    time: current_cp56time(),
                },
            }],
        )
        .expect("object list is never empty");
        Apdu::IFrame {
            tx: self.next_tx(),
            rx: 0,
            asdu: Some(asdu),
        }
    }

    fn breaker_state(&self, branch: usize, breakers: u32, cause: u8) -> Apdu {
        let on = breakers & (1 << branch) != 0;
        let asdu = Asdu::new(
            CauseOfTransmission::new(cause),
            0,
            self.guid,
            vec![InformationObject {
                ioa: BREAKER_IOA_BASE + branch as u32,
                payload: IoPayload::DoublePoint(Diq {
                    dpi: if on { Dpi::On } else { Dpi::Off },
                    quality: Quality::default(),
                }),
            }],
        )
        .expect("object list is never empty");
        Apdu::IFrame {
            tx: self.next_tx(),
            rx: 0,
            asdu: Some(asdu),
        }
    }

    /// Periodic values the data pump sends while the session is Started.
    pub async fn poll_values(&self) -> Vec<Apdu> {
        self.poll_values_with_cause(cot::SPONTANEOUS).await
    }

    async fn poll_values_with_cause(&self, cause: u8) -> Vec<Apdu> {
        let state = self.state.read().await;
        match &*state {
            PhysicalState::Source { voltage } => {
                vec![self.measured_float(IOA_PRIMARY, *voltage, cause)]
            },
            PhysicalState::Transmission {
                breakers,
                branch_resistance,
                vin,
                amp,
                ..
            } => {
                let mut out = vec![
                    self.measured_float(IOA_PRIMARY, *vin, cause),
                    self.measured_float(IOA_SECONDARY, *amp, cause),
                ];
                for i in 0..branch_resistance.len() {
                    out.push(self.breaker_state(i, *breakers, cause));
                }
                out
            },
            PhysicalState::Load { vin, amp, .. } => {
                vec![
                    self.measured_float(IOA_PRIMARY, *vin, cause),
                    self.measured_float(IOA_SECONDARY, *amp, cause),
                ]
            },
        }
    }

    /// One type-70 end-of-initialization APDU, sent once at startup
    /// before the first periodic poll.
    pub fn startup_apdus(&self) -> Vec<Apdu> {
        let asdu = Asdu::new(
            CauseOfTransmission::new(cot::SPONTANEOUS),
            0,
            self.guid,
            vec![InformationObject {
                ioa: 0,
                payload: IoPayload::EndOfInitialization { coi: 0 },
            }],
        )
        .expect("object list is never empty");
        vec![Apdu::IFrame {
            tx: self.next_tx(),
            rx: 0,
            asdu: Some(asdu),
        }]
    }

    /// General interrogation (type 100, QOI=20): replay current values
    /// tagged with CoT=20, terminated by an activation-termination echo.
    pub async fn handle_interrogation(&self, asdu: &Asdu) -> Vec<Apdu> {
        let qoi = match asdu.objects.first() {
            Some(InformationObject {
                payload: IoPayload::InterrogationCommand { qoi },
                ..
            }) => *qoi,
            _ => {
                return vec![self.negative_reply(asdu, cot::UNKNOWN_CAUSE)];
            },
        };
        if qoi != 20 {
            return vec![self.negative_reply(asdu, cot::UNKNOWN_CAUSE)];
        }

        let mut replies = self.poll_values_with_cause(cot::INTERROGATED_BY_STATION).await;
        let terminator = Asdu::new(
            CauseOfTransmission::new(cot::ACTIVATION_TERMINATION),
            asdu.originator_address,
            self.guid,
            vec![InformationObject {
                ioa: asdu.objects.first().map(|o| o.ioa).unwrap_or(0),
                payload: IoPayload::InterrogationCommand { qoi },
            }],
        )
        .expect("object list is never empty");
        replies.push(Apdu::IFrame {
            tx: self.next_tx(),
            rx: 0,
            asdu: Some(terminator),
        });
        replies
    }

    fn negative_reply(&self, incoming: &Asdu, cause: u8) -> Apdu {
        let asdu = Asdu {
            type_id: incoming.type_id,
            sequence: false,
            cause: CauseOfTransmission::new(cause),
            originator_address: incoming.originator_address,
            common_address: self.guid,
            objects: incoming.objects.clone(),
        };
        Apdu::IFrame {
            tx: self.next_tx(),
            rx: 0,
            asdu: Some(asdu),
        }
    }

    /// Reply APDUs for one incoming I-frame (§4.2). Empty when the frame
    /// carries no ASDU (a bare ack-only I-frame).
    pub async fn handle_iframe(&self, apdu: &Apdu) -> Vec<Apdu> {
        let Apdu::IFrame { asdu: Some(asdu), .. } = apdu else {
            return Vec::new();
        };

        if asdu.type_id == iec104_codec::io::type_id::C_IC_NA_1 {
            return self.handle_interrogation(asdu).await;
        }

        let mut state = self.state.write().await;
        match &mut *state {
            PhysicalState::Source { .. } | PhysicalState::Load { .. } => {
                drop(state);
                vec![self.negative_reply(asdu, cot::UNKNOWN_CAUSE)]
            },
            PhysicalState::Transmission {
                breakers,
                branch_resistance,
                pending_select,
                ..
            } => {
                if asdu.type_id != iec104_codec::io::type_id::C_SC_NA_1 {
                    drop(state);
                    return vec![self.negative_reply(asdu, cot::UNKNOWN_CAUSE)];
                }
                let Some(obj) = asdu.objects.first() else {
                    drop(state);
                    return vec![self.negative_reply(asdu, cot::UNKNOWN_CAUSE)];
                };
                let sco = match obj.payload {
                    IoPayload::SingleCommand(sco) => sco,
                    _ => {
                        drop(state);
                        return vec![self.negative_reply(asdu, cot::UNKNOWN_CAUSE)];
                    },
                };
                let ioa = obj.ioa;
                let branch_count = branch_resistance.len();
                let outcome = select::step(*pending_select, sco, ioa, asdu.cause.cause, |ioa| {
                    ioa >= BREAKER_IOA_BASE && ioa < BREAKER_IOA_BASE + branch_count as u32
                });
                *pending_select = outcome.next_state;
                if let Some((ioa, close)) = outcome.apply {
                    let branch = ioa - BREAKER_IOA_BASE;
                    if close {
                        *breakers |= 1 << branch;
                    } else {
                        *breakers &= !(1 << branch);
                    }
                    debug!(guid = self.guid, branch, close, "breaker command applied");
                }
                let reply_asdu = Asdu::new(
                    CauseOfTransmission::new(outcome.reply_cause),
                    asdu.originator_address,
                    self.guid,
                    vec![InformationObject {
                        ioa,
                        payload: IoPayload::SingleCommand(sco),
                    }],
                )
                .expect("object list is never empty");
                drop(state);
                vec![Apdu::IFrame {
                    tx: self.next_tx(),
                    rx: 0,
                    asdu: Some(reply_asdu),
                }]
            },
        }
    }

    /// Advances the physical simulation by one tick (§4.2.2).
    pub async fn simulation_tick(&self, bus: &BusRuntime) {
        tokio::time::sleep(TICK_INTERVAL).await;

        let needs_neighbors = matches!(
            *self.state.read().await,
            PhysicalState::Transmission { .. } | PhysicalState::Load { .. }
        );
        if !needs_neighbors {
            return; // Source has no dynamics
        }

        if let Some(&inbound) = self.inbound_neighbors.first() {
            bus.send_to_neighbor(&BusMessage::get_v(self.guid32(), u32::from(inbound)), u32::from(inbound))
                .await;
        }
        if let Some(&outbound) = self.outbound_neighbors.first() {
            bus.send_to_neighbor(
                &BusMessage::get_load(self.guid32(), u32::from(outbound)),
                u32::from(outbound),
            )
            .await;
        }

        tokio::time::sleep(NEIGHBOR_REPLY_WAIT).await;

        let mut state = self.state.write().await;
        match &mut *state {
            PhysicalState::Transmission {
                breakers,
                branch_resistance,
                vin,
                vout,
                amp,
                aggregated_resistance,
                remote_equivalent_load,
                ..
            } => {
                *aggregated_resistance = parallel_resistance(*breakers, branch_resistance);
                let (new_vout, new_amp) = transmission_outputs(*vin, *aggregated_resistance, *remote_equivalent_load);
                *vout = new_vout;
                *amp = new_amp;
                if new_amp.is_infinite() {
                    warn!(guid = self.guid, "short circuit detected on transmission branch");
                }
            },
            PhysicalState::Load { load, vin, amp } => {
                *amp = load_current(*vin, *load);
                if amp.is_infinite() {
                    warn!(guid = self.guid, "short circuit detected on load");
                }
            },
            PhysicalState::Source { .. } => {},
        }
    }
}

#[async_trait]
impl PeerHandler for Device {
    async fn handle_message(&self, msg: BusMessage, _from: SocketAddr) -> Option<BusMessage> {
        match msg.message_id {
            MessageId::GetV => {
                let state = self.state.read().await;
                match &*state {
                    PhysicalState::Source { voltage } => {
                        Some(BusMessage::volt(self.guid32(), msg.sender_id, *voltage))
                    },
                    PhysicalState::Transmission { vout, .. } => {
                        Some(BusMessage::volt(self.guid32(), msg.sender_id, *vout))
                    },
                    PhysicalState::Load { .. } => {
                        Some(BusMessage::not_ready(self.guid32(), msg.sender_id))
                    },
                }
            },
            MessageId::GetLoad => {
                let state = self.state.read().await;
                match &*state {
                    PhysicalState::Transmission {
                        aggregated_resistance,
                        ..
                    } => Some(BusMessage::load(self.guid32(), msg.sender_id, *aggregated_resistance)),
                    PhysicalState::Load { load, .. } => {
                        Some(BusMessage::load(self.guid32(), msg.sender_id, *load))
                    },
                    PhysicalState::Source { .. } => {
                        Some(BusMessage::not_ready(self.guid32(), msg.sender_id))
                    },
                }
            },
            MessageId::Volt => {
                let mut state = self.state.write().await;
                match &mut *state {
                    PhysicalState::Transmission { vin, .. } => *vin = msg.float_arg0,
                    PhysicalState::Load { vin, .. } => *vin = msg.float_arg0,
                    PhysicalState::Source { .. } => {},
                }
                None
            },
            MessageId::Load => {
                let mut state = self.state.write().await;
                if let PhysicalState::Transmission {
                    remote_equivalent_load,
                    ..
                } = &mut *state
                {
                    *remote_equivalent_load = msg.float_arg0;
                }
                None
            },
            MessageId::NotReady | MessageId::Unknown | MessageId::Whois | MessageId::IAmHere => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iec104_codec::io::{type_id, Sco};

    fn source_device() -> Device {
        Device::new(1, vec![], vec![2], PhysicalState::new_source(500.0))
    }

    fn transmission_device() -> Device {
        Device::new(2, vec![1], vec![3], PhysicalState::new_transmission(0b11, vec![12.0, 10.0]))
    }

    fn single_command_apdu(ioa: u32, sco: Sco, cause: u8) -> Apdu {
        let asdu = Asdu::new(
            CauseOfTransmission::new(cause),
            0,
            2,
            vec![InformationObject {
                ioa,
                payload: IoPayload::SingleCommand(sco),
            }],
        )
        .unwrap();
        Apdu::IFrame { tx: 0, rx: 0, asdu: Some(asdu) }
    }

    #[tokio::test]
    async fn poll_values_reports_one_point_for_source() {
        let device = source_device();
        let replies = device.poll_values().await;
        assert_eq!(replies.len(), 1);
        let Apdu::IFrame { asdu: Some(asdu), .. } = &replies[0] else { panic!("expected an I-frame") };
        assert_eq!(asdu.objects[0].ioa, IOA_PRIMARY);
    }

    #[tokio::test]
    async fn poll_values_reports_measurements_and_every_breaker_for_transmission() {
        let device = transmission_device();
        let replies = device.poll_values().await;
        // vin, amp, plus one breaker state per branch
        assert_eq!(replies.len(), 4);
        let Apdu::IFrame { asdu: Some(first), .. } = &replies[0] else { panic!("expected an I-frame") };
        assert_eq!(first.objects[0].ioa, IOA_PRIMARY);
        let Apdu::IFrame { asdu: Some(breaker0), .. } = &replies[2] else { panic!("expected an I-frame") };
        assert_eq!(breaker0.objects[0].ioa, BREAKER_IOA_BASE);
    }

    #[tokio::test]
    async fn startup_apdus_sends_a_single_end_of_initialization() {
        let device = source_device();
        let startup = device.startup_apdus();
        assert_eq!(startup.len(), 1);
        let Apdu::IFrame { asdu: Some(asdu), .. } = &startup[0] else { panic!("expected an I-frame") };
        assert_eq!(asdu.type_id, type_id::M_EI_NA_1);
    }

    #[tokio::test]
    async fn general_interrogation_replays_values_then_terminates() {
        let device = transmission_device();
        let asdu = Asdu::new(
            CauseOfTransmission::new(cot::ACTIVATION),
            0,
            2,
            vec![InformationObject {
                ioa: 0,
                payload: IoPayload::InterrogationCommand { qoi: 20 },
            }],
        )
        .unwrap();
        let replies = device.handle_interrogation(&asdu).await;
        // 4 data replies + 1 activation-termination
        assert_eq!(replies.len(), 5);
        let Apdu::IFrame { asdu: Some(last), .. } = replies.last().unwrap() else {
            panic!("expected an I-frame")
        };
        assert_eq!(last.cause.cause, cot::ACTIVATION_TERMINATION);
    }

    #[tokio::test]
    async fn unsupported_interrogation_qoi_is_rejected() {
        let device = source_device();
        let asdu = Asdu::new(
            CauseOfTransmission::new(cot::ACTIVATION),
            0,
            1,
            vec![InformationObject {
                ioa: 0,
                payload: IoPayload::InterrogationCommand { qoi: 1 },
            }],
        )
        .unwrap();
        let replies = device.handle_interrogation(&asdu).await;
        assert_eq!(replies.len(), 1);
        let Apdu::IFrame { asdu: Some(reply), .. } = &replies[0] else { panic!("expected an I-frame") };
        assert_eq!(reply.cause.cause, cot::UNKNOWN_CAUSE);
    }

    #[tokio::test]
    async fn commands_against_source_are_rejected() {
        let device = source_device();
        let apdu = single_command_apdu(
            IOA_PRIMARY,
            Sco { select: true, qualifier: 0, state: true },
            cot::ACTIVATION,
        );
        let replies = device.handle_iframe(&apdu).await;
        assert_eq!(replies.len(), 1);
        let Apdu::IFrame { asdu: Some(reply), .. } = &replies[0] else { panic!("expected an I-frame") };
        assert_eq!(reply.cause.cause, cot::UNKNOWN_CAUSE);
    }

    #[tokio::test]
    async fn select_then_execute_closes_a_breaker() {
        let device = transmission_device();
        // branch 0 starts open: clear bit 0 first via direct construction
        let select = single_command_apdu(
            BREAKER_IOA_BASE,
            Sco { select: true, qualifier: 0, state: true },
            cot::ACTIVATION,
        );
        let select_replies = device.handle_iframe(&select).await;
        assert_eq!(select_replies.len(), 1);
        let Apdu::IFrame { asdu: Some(reply), .. } = &select_replies[0] else { panic!("expected an I-frame") };
        assert_eq!(reply.cause.cause, cot::ACTIVATION_CONFIRMATION);

        let execute = single_command_apdu(
            BREAKER_IOA_BASE,
            Sco { select: false, qualifier: 0, state: false },
            cot::ACTIVATION,
        );
        let execute_replies = device.handle_iframe(&execute).await;
        assert_eq!(execute_replies.len(), 1);
        let Apdu::IFrame { asdu: Some(reply), .. } = &execute_replies[0] else { panic!("expected an I-frame") };
        assert_eq!(reply.cause.cause, cot::ACTIVATION_CONFIRMATION);

        // Branch 0's breaker should now be open (bit cleared); the next poll
        // reports the same breaker count but bit 0 off.
        let replies = device.poll_values().await;
        let Apdu::IFrame { asdu: Some(breaker0), .. } = &replies[2] else { panic!("expected an I-frame") };
        assert_eq!(
            breaker0.objects[0].payload,
            IoPayload::DoublePoint(Diq { dpi: Dpi::Off, quality: Quality::default() })
        );
    }

    #[tokio::test]
    async fn source_answers_getv_with_its_fixed_voltage() {
        let device = source_device();
        let reply = device
            .handle_message(BusMessage::get_v(9, 1), "127.0.0.1:1".parse().unwrap())
            .await;
        assert_eq!(reply, Some(BusMessage::volt(1, 9, 500.0)));
    }

    #[tokio::test]
    async fn load_is_not_ready_for_getv() {
        let device = Device::new(3, vec![2], vec![], PhysicalState::new_load(50.0));
        let reply = device
            .handle_message(BusMessage::get_v(9, 3), "127.0.0.1:1".parse().unwrap())
            .await;
        assert_eq!(reply, Some(BusMessage::not_ready(3, 9)));
    }

    #[tokio::test]
    async fn incoming_volt_updates_transmission_vin() {
        let device = transmission_device();
        device
            .handle_message(BusMessage::volt(1, 2, 230.0), "127.0.0.1:1".parse().unwrap())
            .await;
        let replies = device.poll_values().await;
        let Apdu::IFrame { asdu: Some(vin_reply), .. } = &replies[0] else { panic!("expected an I-frame") };
        assert_eq!(vin_reply.objects[0].payload, IoPayload::MeasuredFloatTimestamped {
            value: 230.0,
            quality: Quality::default(),
            time: current_cp56time(),
        });
    }
}

fn current_cp56time() -> iec104_codec::Cp56Time {
    // The codec crate is pure and has no clock; this marks every reading
    // with IV=1 until the engine's session loop re-stamps it on send with
    // a real CP56Time2a derived from wall-clock time.
    iec104_codec::Cp56Time {
        milliseconds: 0,
        minute: 0,
        invalid: true,
        hour: 0,
        summer_time: false,
        day_of_month: 1,
        day_of_week: 1,
        month: 1,
        year: 0,
    }
}
