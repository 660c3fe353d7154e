//! The 28-byte fixed UDP record exchanged between neighboring devices.
//!
//! Pure encode/decode; the socket that carries these bytes lives in
//! `runtime`.

use crate::error::{BusError, Result};

pub const ENCODED_LEN: usize = 28;

/// Reserved message identifiers (§6 of the simulation bus wire format).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Whois,
    IAmHere,
    GetV,
    Volt,
    GetLoad,
    Load,
    NotReady,
    Unknown,
}

impl MessageId {
    fn from_u32(v: u32) -> Self {
        match v {
            0x0000_0000 => MessageId::Whois,
            0x0000_0001 => MessageId::IAmHere,
            0x0000_0002 => MessageId::GetV,
            0x0000_0003 => MessageId::Volt,
            0x0000_0004 => MessageId::GetLoad,
            0x0000_0005 => MessageId::Load,
            0xFFFF_FFFE => MessageId::NotReady,
            _ => MessageId::Unknown,
        }
    }

    fn as_u32(self) -> u32 {
        match self {
            MessageId::Whois => 0x0000_0000,
            MessageId::IAmHere => 0x0000_0001,
            MessageId::GetV => 0x0000_0002,
            MessageId::Volt => 0x0000_0003,
            MessageId::GetLoad => 0x0000_0004,
            MessageId::Load => 0x0000_0005,
            MessageId::NotReady => 0xFFFF_FFFE,
            MessageId::Unknown => 0xFFFF_FFFF,
        }
    }
}

/// One simulation-bus datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusMessage {
    pub sender_id: u32,
    pub receiver_id: u32,
    pub message_id: MessageId,
    pub int_arg0: u32,
    pub int_arg1: u32,
    pub float_arg0: f32,
    pub float_arg1: f32,
}

impl BusMessage {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != ENCODED_LEN {
            return Err(BusError::WrongSize {
                expected: ENCODED_LEN,
                actual: buf.len(),
            });
        }
        let u32_at = |off: usize| u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let f32_at = |off: usize| f32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        Ok(BusMessage {
            sender_id: u32_at(0),
            receiver_id: u32_at(4),
            message_id: MessageId::from_u32(u32_at(8)),
            int_arg0: u32_at(12),
            int_arg1: u32_at(16),
            float_arg0: f32_at(20),
            float_arg1: f32_at(24),
        })
    }

    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut out = [0u8; ENCODED_LEN];
        out[0..4].copy_from_slice(&self.sender_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.receiver_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.message_id.as_u32().to_le_bytes());
        out[12..16].copy_from_slice(&self.int_arg0.to_le_bytes());
        out[16..20].copy_from_slice(&self.int_arg1.to_le_bytes());
        out[20..24].copy_from_slice(&self.float_arg0.to_le_bytes());
        out[24..28].copy_from_slice(&self.float_arg1.to_le_bytes());
        out
    }

    pub fn whois(sender: u32, target: u32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::Whois,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: 0.0,
            float_arg1: 0.0,
        }
    }

    pub fn i_am_here(sender: u32, target: u32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::IAmHere,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: 0.0,
            float_arg1: 0.0,
        }
    }

    pub fn get_v(sender: u32, target: u32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::GetV,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: 0.0,
            float_arg1: 0.0,
        }
    }

    pub fn volt(sender: u32, target: u32, voltage: f32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::Volt,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: voltage,
            float_arg1: 0.0,
        }
    }

    pub fn get_load(sender: u32, target: u32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::GetLoad,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: 0.0,
            float_arg1: 0.0,
        }
    }

    pub fn load(sender: u32, target: u32, resistance: f32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::Load,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: resistance,
            float_arg1: 0.0,
        }
    }

    pub fn not_ready(sender: u32, target: u32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::NotReady,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: 0.0,
            float_arg1: 0.0,
        }
    }

    pub fn unknown(sender: u32, target: u32) -> Self {
        BusMessage {
            sender_id: sender,
            receiver_id: target,
            message_id: MessageId::Unknown,
            int_arg0: 0,
            int_arg1: 0,
            float_arg0: 0.0,
            float_arg1: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_reserved_message_id() {
        let messages = [
            BusMessage::whois(1, 2),
            BusMessage::i_am_here(2, 1),
            BusMessage::get_v(1, 2),
            BusMessage::volt(2, 1, 500.0),
            BusMessage::get_load(1, 2),
            BusMessage::load(2, 1, 12.5),
            BusMessage::not_ready(2, 1),
            BusMessage::unknown(1, 2),
        ];
        for msg in messages {
            let bytes = msg.encode();
            assert_eq!(bytes.len(), ENCODED_LEN);
            let decoded = BusMessage::decode(&bytes).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn wrong_size_datagram_is_rejected() {
        let buf = [0u8; 10];
        assert_eq!(
            BusMessage::decode(&buf),
            Err(BusError::WrongSize {
                expected: ENCODED_LEN,
                actual: 10
            })
        );
    }
}
