//! ASDU — Application Service Data Unit: the payload carried by I-frames.

use crate::error::{CodecError, Result};
use crate::io::{decode_ioa, encode_ioa, InformationObject, IoPayload};

pub const HEADER_LEN: usize = 6;

/// Cause of Transmission — 6-bit code plus the negative/test flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CauseOfTransmission {
    pub cause: u8,
    pub negative: bool,
    pub test: bool,
}

impl CauseOfTransmission {
    pub fn new(cause: u8) -> Self {
        CauseOfTransmission {
            cause,
            negative: false,
            test: false,
        }
    }

    fn decode(b: u8) -> Self {
        CauseOfTransmission {
            cause: b & 0x3F,
            negative: b & 0x40 != 0,
            test: b & 0x80 != 0,
        }
    }

    fn encode(self) -> u8 {
        (self.cause & 0x3F)
            | (if self.negative { 0x40 } else { 0 })
            | (if self.test { 0x80 } else { 0 })
    }
}

/// Well-known Cause of Transmission values used by this simulator.
pub mod cot {
    pub const SPONTANEOUS: u8 = 3;
    pub const REQUEST: u8 = 5;
    pub const ACTIVATION: u8 = 6;
    pub const ACTIVATION_CONFIRMATION: u8 = 7;
    pub const DEACTIVATION: u8 = 8;
    pub const DEACTIVATION_CONFIRMATION: u8 = 9;
    pub const ACTIVATION_TERMINATION: u8 = 10;
    pub const INTERROGATED_BY_STATION: u8 = 20;
    pub const UNKNOWN_TYPE_ID: u8 = 44;
    pub const UNKNOWN_CAUSE: u8 = 45;
    pub const UNKNOWN_COMMON_ADDRESS: u8 = 46;
    pub const UNKNOWN_IOA: u8 = 47;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    pub type_id: u8,
    /// SQ — objects share one base IOA, index-incremented
    pub sequence: bool,
    pub cause: CauseOfTransmission,
    pub originator_address: u8,
    pub common_address: u16,
    pub objects: Vec<InformationObject>,
}

impl Asdu {
    /// Construct an ASDU from already-decoded information objects. The
    /// type id is taken from the first object; callers are responsible
    /// for not mixing payload types within one ASDU (the wire format
    /// doesn't allow it either).
    pub fn new(
        cause: CauseOfTransmission,
        originator_address: u8,
        common_address: u16,
        objects: Vec<InformationObject>,
    ) -> Option<Self> {
        let type_id = objects.first()?.payload.type_id();
        Some(Asdu {
            type_id,
            sequence: false,
            cause,
            originator_address,
            common_address,
            objects,
        })
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::truncated("ASDU header", HEADER_LEN - buf.len()));
        }
        let type_id = buf[0];
        let sq_numix = buf[1];
        let sequence = sq_numix & 0x80 != 0;
        let num_ix = (sq_numix & 0x7F) as usize;
        let cause = CauseOfTransmission::decode(buf[2]);
        let originator_address = buf[3];
        let common_address = u16::from_le_bytes([buf[4], buf[5]]);

        let payload_len = IoPayload::payload_len(type_id).ok_or(CodecError::UnknownTypeId(type_id))?;
        let mut rest = &buf[HEADER_LEN..];
        let mut objects = Vec::with_capacity(num_ix);

        if sequence {
            if num_ix == 0 {
                return Ok(Asdu {
                    type_id,
                    sequence,
                    cause,
                    originator_address,
                    common_address,
                    objects,
                });
            }
            let base_ioa = decode_ioa(rest)?;
            rest = &rest[3..];
            let first = IoPayload::decode(type_id, rest)?;
            rest = &rest[payload_len..];
            objects.push(InformationObject {
                ioa: base_ioa,
                payload: first,
            });
            for i in 1..num_ix {
                let payload = IoPayload::decode(type_id, rest)?;
                rest = &rest[payload_len..];
                objects.push(InformationObject {
                    ioa: base_ioa + i as u32,
                    payload,
                });
            }
        } else {
            for _ in 0..num_ix {
                let ioa = decode_ioa(rest)?;
                rest = &rest[3..];
                let payload = IoPayload::decode(type_id, rest)?;
                rest = &rest[payload_len..];
                objects.push(InformationObject { ioa, payload });
            }
        }

        Ok(Asdu {
            type_id,
            sequence,
            cause,
            originator_address,
            common_address,
            objects,
        })
    }

    /// Overwrites every object's embedded timestamp, if any, with the
    /// current wall-clock time (§4.1's "no I/O" discipline stays in the
    /// decode step; this is invoked by the caller that actually sends).
    pub fn restamp_now(&mut self) {
        for obj in &mut self.objects {
            obj.payload.restamp_now();
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.type_id);
        let num_ix = self.objects.len() as u8 & 0x7F;
        out.push(num_ix | if self.sequence { 0x80 } else { 0 });
        out.push(self.cause.encode());
        out.push(self.originator_address);
        out.extend_from_slice(&self.common_address.to_le_bytes());

        if self.sequence {
            for (i, obj) in self.objects.iter().enumerate() {
                if i == 0 {
                    encode_ioa(obj.ioa, out);
                }
                obj.payload.encode(out);
            }
        } else {
            for obj in &self.objects {
                encode_ioa(obj.ioa, out);
                obj.payload.encode(out);
            }
        }
    }

    /// Wire length of this ASDU's encoding, without re-encoding it.
    pub fn encoded_len(&self) -> usize {
        let payload_len = IoPayload::payload_len(self.type_id).unwrap_or(0);
        let per_object = if self.sequence {
            payload_len
        } else {
            3 + payload_len
        };
        let base = if self.sequence && !self.objects.is_empty() {
            3
        } else {
            0
        };
        HEADER_LEN + base + per_object * self.objects.len()
    }
}
