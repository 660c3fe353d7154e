//! Information Object (IO) payloads.
//!
//! Every IO is a 3-byte little-endian IOA followed by a type-specific
//! payload. This module only knows the payload shapes from the §3 type
//! table; IOA handling (including SQ=1 base-IOA reuse) lives in `asdu`.

use crate::cp56time::Cp56Time;
use crate::error::{CodecError, Result};

/// Type identifiers this codec understands. Unknown identifiers are a
/// decode error (`UnknownTypeId`), never a panic.
pub mod type_id {
    pub const M_SP_NA_1: u8 = 1;
    pub const M_DP_NA_1: u8 = 3;
    pub const M_ST_NA_1: u8 = 5;
    pub const M_BO_NA_1: u8 = 7;
    pub const M_ME_NA_1: u8 = 9;
    pub const M_ME_NC_1: u8 = 13;
    pub const M_SP_TB_1: u8 = 30;
    pub const M_DP_TB_1: u8 = 31;
    pub const M_ME_TF_1: u8 = 36;
    pub const C_SC_NA_1: u8 = 45;
    pub const C_SE_NC_1: u8 = 50;
    pub const M_EI_NA_1: u8 = 70;
    pub const C_IC_NA_1: u8 = 100;
    pub const C_CS_NA_1: u8 = 103;
}

/// Double-point indication value (DIQ bits 0-1 / VTI-adjacent encodings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dpi {
    Indeterminate0 = 0,
    Off = 1,
    On = 2,
    Indeterminate3 = 3,
}

impl Dpi {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Dpi::Indeterminate0,
            1 => Dpi::Off,
            2 => Dpi::On,
            _ => Dpi::Indeterminate3,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Quality flags shared by SIQ/DIQ/QDS-shaped bytes: bits 4-7 are
/// {BL,SB,NT,IV} in every one of these quality descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quality {
    pub blocked: bool,
    pub substituted: bool,
    pub not_topical: bool,
    pub invalid: bool,
}

impl Quality {
    fn from_byte(b: u8) -> Self {
        Quality {
            blocked: b & 0x10 != 0,
            substituted: b & 0x20 != 0,
            not_topical: b & 0x40 != 0,
            invalid: b & 0x80 != 0,
        }
    }

    fn bits(self) -> u8 {
        (if self.blocked { 0x10 } else { 0 })
            | (if self.substituted { 0x20 } else { 0 })
            | (if self.not_topical { 0x40 } else { 0 })
            | (if self.invalid { 0x80 } else { 0 })
    }
}

/// SIQ — single-point information with quality (1 byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Siq {
    pub on: bool,
    pub quality: Quality,
}

impl Siq {
    fn decode(b: u8) -> Self {
        Siq {
            on: b & 0x01 != 0,
            quality: Quality::from_byte(b),
        }
    }
    fn encode(self) -> u8 {
        (if self.on { 0x01 } else { 0 }) | self.quality.bits()
    }
}

/// DIQ — double-point information with quality (1 byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diq {
    pub dpi: Dpi,
    pub quality: Quality,
}

impl Diq {
    fn decode(b: u8) -> Self {
        Diq {
            dpi: Dpi::from_bits(b),
            quality: Quality::from_byte(b),
        }
    }
    fn encode(self) -> u8 {
        self.dpi.bits() | self.quality.bits()
    }
}

/// VTI — step position value: 1-bit transient flag + 7-bit signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vti {
    pub value: i8,
    pub transient: bool,
}

impl Vti {
    fn decode(b: u8) -> Self {
        let raw = b & 0x7F;
        // sign-extend the 7-bit field
        let value = ((raw << 1) as i8) >> 1;
        Vti {
            value,
            transient: b & 0x80 != 0,
        }
    }
    fn encode(self) -> u8 {
        ((self.value as u8) & 0x7F) | if self.transient { 0x80 } else { 0 }
    }
}

/// SCO — single command: 1-bit S/E, 6-bit QU, 1-bit SCS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sco {
    /// true = select, false = execute
    pub select: bool,
    pub qualifier: u8,
    /// command state to apply: true = ON/close, false = OFF/open
    pub state: bool,
}

impl Sco {
    fn decode(b: u8) -> Self {
        Sco {
            select: b & 0x80 != 0,
            qualifier: (b >> 1) & 0x3F,
            state: b & 0x01 != 0,
        }
    }
    fn encode(self) -> u8 {
        (if self.select { 0x80 } else { 0 }) | ((self.qualifier & 0x3F) << 1) | (self.state as u8)
    }
}

/// QOS — set-point command quality (qualifier byte, S/E bit reused as in SCO).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qos {
    pub select: bool,
    pub qualifier: u8,
}

impl Qos {
    fn decode(b: u8) -> Self {
        Qos {
            select: b & 0x80 != 0,
            qualifier: b & 0x7F,
        }
    }
    fn encode(self) -> u8 {
        (if self.select { 0x80 } else { 0 }) | (self.qualifier & 0x7F)
    }
}

/// The decoded payload of an Information Object (IOA excluded).
#[derive(Debug, Clone, PartialEq)]
pub enum IoPayload {
    SinglePoint(Siq),
    DoublePoint(Diq),
    StepPosition { vti: Vti, quality: Quality },
    Bitstring32 { value: u32, quality: Quality },
    MeasuredNormalized { value: i16, quality: Quality },
    MeasuredFloat { value: f32, quality: Quality },
    SinglePointTimestamped { siq: Siq, time: Cp56Time },
    DoublePointTimestamped { diq: Diq, time: Cp56Time },
    MeasuredFloatTimestamped { value: f32, quality: Quality, time: Cp56Time },
    SingleCommand(Sco),
    SetPointFloat { value: f32, quality: Qos },
    EndOfInitialization { coi: u8 },
    InterrogationCommand { qoi: u8 },
    ClockSync { time: Cp56Time },
}

impl IoPayload {
    pub fn type_id(&self) -> u8 {
        use type_id::*;
        match self {
            IoPayload::SinglePoint(_) => M_SP_NA_1,
            IoPayload::DoublePoint(_) => M_DP_NA_1,
            IoPayload::StepPosition { .. } => M_ST_NA_1,
            IoPayload::Bitstring32 { .. } => M_BO_NA_1,
            IoPayload::MeasuredNormalized { .. } => M_ME_NA_1,
            IoPayload::MeasuredFloat { .. } => M_ME_NC_1,
            IoPayload::SinglePointTimestamped { .. } => M_SP_TB_1,
            IoPayload::DoublePointTimestamped { .. } => M_DP_TB_1,
            IoPayload::MeasuredFloatTimestamped { .. } => M_ME_TF_1,
            IoPayload::SingleCommand(_) => C_SC_NA_1,
            IoPayload::SetPointFloat { .. } => C_SE_NC_1,
            IoPayload::EndOfInitialization { .. } => M_EI_NA_1,
            IoPayload::InterrogationCommand { .. } => C_IC_NA_1,
            IoPayload::ClockSync { .. } => C_CS_NA_1,
        }
    }

    /// Byte length of this payload on the wire (IOA excluded). `None` for
    /// unknown type ids — used by `payload_len` to reject them up front.
    pub fn payload_len(type_id: u8) -> Option<usize> {
        use type_id::*;
        Some(match type_id {
            M_SP_NA_1 => 1,
            M_DP_NA_1 => 1,
            M_ST_NA_1 => 2,
            M_BO_NA_1 => 5,
            M_ME_NA_1 => 3,
            M_ME_NC_1 => 5,
            M_SP_TB_1 => 1 + 7,
            M_DP_TB_1 => 1 + 7,
            M_ME_TF_1 => 5 + 7,
            C_SC_NA_1 => 1,
            C_SE_NC_1 => 5,
            M_EI_NA_1 => 1,
            C_IC_NA_1 => 1,
            C_CS_NA_1 => 7,
            _ => return None,
        })
    }

    pub fn decode(type_id: u8, buf: &[u8]) -> Result<Self> {
        use type_id::*;
        let need = IoPayload::payload_len(type_id).ok_or(CodecError::UnknownTypeId(type_id))?;
        if buf.len() < need {
            return Err(CodecError::truncated("IO payload", need - buf.len()));
        }
        Ok(match type_id {
            M_SP_NA_1 => IoPayload::SinglePoint(Siq::decode(buf[0])),
            M_DP_NA_1 => IoPayload::DoublePoint(Diq::decode(buf[0])),
            M_ST_NA_1 => IoPayload::StepPosition {
                vti: Vti::decode(buf[0]),
                quality: Quality::from_byte(buf[1]),
            },
            M_BO_NA_1 => IoPayload::Bitstring32 {
                value: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
                quality: Quality::from_byte(buf[4]),
            },
            M_ME_NA_1 => IoPayload::MeasuredNormalized {
                value: i16::from_le_bytes([buf[0], buf[1]]),
                quality: Quality::from_byte(buf[2]),
            },
            M_ME_NC_1 => IoPayload::MeasuredFloat {
                value: f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
                quality: Quality::from_byte(buf[4]),
            },
            M_SP_TB_1 => IoPayload::SinglePointTimestamped {
                siq: Siq::decode(buf[0]),
                time: Cp56Time::decode(&buf[1..])?,
            },
            M_DP_TB_1 => IoPayload::DoublePointTimestamped {
                diq: Diq::decode(buf[0]),
                time: Cp56Time::decode(&buf[1..])?,
            },
            M_ME_TF_1 => IoPayload::MeasuredFloatTimestamped {
                value: f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
                quality: Quality::from_byte(buf[4]),
                time: Cp56Time::decode(&buf[5..])?,
            },
            C_SC_NA_1 => IoPayload::SingleCommand(Sco::decode(buf[0])),
            C_SE_NC_1 => IoPayload::SetPointFloat {
                value: f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
                quality: Qos::decode(buf[4]),
            },
            M_EI_NA_1 => IoPayload::EndOfInitialization { coi: buf[0] },
            C_IC_NA_1 => IoPayload::InterrogationCommand { qoi: buf[0] },
            C_CS_NA_1 => IoPayload::ClockSync {
                time: Cp56Time::decode(buf)?,
            },
            _ => unreachable!("payload_len already rejected unknown type ids"),
        })
    }

    /// Overwrites an embedded timestamp with the current wall-clock time.
    /// No-op for payload shapes that don't carry one.
    pub fn restamp_now(&mut self) {
        match self {
            IoPayload::SinglePointTimestamped { time, .. }
            | IoPayload::DoublePointTimestamped { time, .. }
            | IoPayload::MeasuredFloatTimestamped { time, .. } => *time = Cp56Time::now(),
            _ => {},
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            IoPayload::SinglePoint(siq) => out.push(siq.encode()),
            IoPayload::DoublePoint(diq) => out.push(diq.encode()),
            IoPayload::StepPosition { vti, quality } => {
                out.push(vti.encode());
                out.push(quality.bits());
            },
            IoPayload::Bitstring32 { value, quality } => {
                out.extend_from_slice(&value.to_le_bytes());
                out.push(quality.bits());
            },
            IoPayload::MeasuredNormalized { value, quality } => {
                out.extend_from_slice(&value.to_le_bytes());
                out.push(quality.bits());
            },
            IoPayload::MeasuredFloat { value, quality } => {
                out.extend_from_slice(&value.to_le_bytes());
                out.push(quality.bits());
            },
            IoPayload::SinglePointTimestamped { siq, time } => {
                out.push(siq.encode());
                time.encode(out);
            },
            IoPayload::DoublePointTimestamped { diq, time } => {
                out.push(diq.encode());
                time.encode(out);
            },
            IoPayload::MeasuredFloatTimestamped { value, quality, time } => {
                out.extend_from_slice(&value.to_le_bytes());
                out.push(quality.bits());
                time.encode(out);
            },
            IoPayload::SingleCommand(sco) => out.push(sco.encode()),
            IoPayload::SetPointFloat { value, quality } => {
                out.extend_from_slice(&value.to_le_bytes());
                out.push(quality.encode());
            },
            IoPayload::EndOfInitialization { coi } => out.push(*coi),
            IoPayload::InterrogationCommand { qoi } => out.push(*qoi),
            IoPayload::ClockSync { time } => time.encode(out),
        }
    }
}

/// An Information Object: a 24-bit little-endian address plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationObject {
    pub ioa: u32,
    pub payload: IoPayload,
}

pub const IOA_LEN: usize = 3;

pub fn decode_ioa(buf: &[u8]) -> Result<u32> {
    if buf.len() < IOA_LEN {
        return Err(CodecError::truncated("IOA", IOA_LEN - buf.len()));
    }
    Ok(u32::from(buf[0]) | (u32::from(buf[1]) << 8) | (u32::from(buf[2]) << 16))
}

pub fn encode_ioa(ioa: u32, out: &mut Vec<u8>) {
    out.push((ioa & 0xFF) as u8);
    out.push(((ioa >> 8) & 0xFF) as u8);
    out.push(((ioa >> 16) & 0xFF) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diq_round_trips_dpi_and_quality() {
        let diq = Diq {
            dpi: Dpi::On,
            quality: Quality {
                blocked: true,
                substituted: false,
                not_topical: false,
                invalid: true,
            },
        };
        let byte = diq.encode();
        let back = Diq::decode(byte);
        assert_eq!(back, diq);
    }

    #[test]
    fn sco_select_execute_bit_is_bit7() {
        let sco = Sco {
            select: true,
            qualifier: 0,
            state: true,
        };
        assert_eq!(sco.encode() & 0x80, 0x80);
        assert_eq!(sco.encode() & 0x01, 0x01);
    }

    #[test]
    fn vti_is_sign_extended() {
        let negative = Vti::decode(0x7F); // raw 0x7F = -1 in 7-bit two's complement
        assert_eq!(negative.value, -1);
        let positive = Vti::decode(0x01);
        assert_eq!(positive.value, 1);
    }

    #[test]
    fn type3_payload_round_trips() {
        let p = IoPayload::DoublePoint(Diq {
            dpi: Dpi::On,
            quality: Quality::default(),
        });
        let mut buf = Vec::new();
        p.encode(&mut buf);
        let back = IoPayload::decode(type_id::M_DP_NA_1, &buf).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn unknown_type_id_is_an_error() {
        assert!(matches!(
            IoPayload::decode(200, &[0u8; 8]),
            Err(CodecError::UnknownTypeId(200))
        ));
    }
}
