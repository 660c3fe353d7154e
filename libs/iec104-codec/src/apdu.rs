//! APDU — the top-level framed unit: start byte, length, APCI, and an
//! optional ASDU for I-frames.

use crate::apci::{pack_seq, unpack_seq, UFrameCommand};
use crate::asdu::Asdu;
use crate::error::{CodecError, Result};

pub const START_BYTE: u8 = 0x68;
/// Start byte + length byte, always present before the 4-byte APCI.
const HEADER_LEN: usize = 2;
const APCI_LEN: usize = 4;
/// Smallest legal frame: start + length + 4-byte APCI, length field = 4.
const MIN_FRAME_LEN: usize = HEADER_LEN + APCI_LEN;

#[derive(Debug, Clone, PartialEq)]
pub enum Apdu {
    IFrame {
        tx: u16,
        rx: u16,
        asdu: Option<Asdu>,
    },
    SFrame {
        rx: u16,
    },
    UFrame(UFrameCommand),
}

impl Apdu {
    /// Decode one APDU from the front of `buf`. Returns the parsed APDU
    /// and the number of bytes it consumed; the caller is expected to
    /// advance its read buffer by that amount and retry with what's
    /// left over (a short remainder is not an error here).
    pub fn decode(buf: &[u8]) -> Result<(Apdu, usize)> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(CodecError::ShortFrame {
                needed: MIN_FRAME_LEN,
                have: buf.len(),
            });
        }
        if buf[0] != START_BYTE {
            return Err(CodecError::BadStart(buf[0]));
        }
        let length = buf[1] as usize;
        if length < 4 {
            return Err(CodecError::ShortFrame {
                needed: 4,
                have: length,
            });
        }
        let total_len = HEADER_LEN + length;
        if buf.len() < total_len {
            return Err(CodecError::ShortFrame {
                needed: total_len,
                have: buf.len(),
            });
        }

        let control = &buf[HEADER_LEN..HEADER_LEN + APCI_LEN];
        let apdu = match control[0] & 0x03 {
            0 => {
                let tx = unpack_seq(u16::from_le_bytes([control[0], control[1]]));
                let rx = unpack_seq(u16::from_le_bytes([control[2], control[3]]));
                let asdu = if length > 4 {
                    let asdu_bytes = &buf[HEADER_LEN + APCI_LEN..total_len];
                    if asdu_bytes.len() != length - 4 {
                        return Err(CodecError::LengthMismatch {
                            declared: length - 4,
                            actual: asdu_bytes.len(),
                        });
                    }
                    Some(Asdu::decode(asdu_bytes)?)
                } else {
                    None
                };
                Apdu::IFrame { tx, rx, asdu }
            },
            1 => {
                let rx = unpack_seq(u16::from_le_bytes([control[2], control[3]]));
                Apdu::SFrame { rx }
            },
            _ => {
                let cmd = UFrameCommand::from_control_byte(control[0]).ok_or(
                    CodecError::LengthMismatch {
                        declared: 0,
                        actual: 0,
                    },
                )?;
                Apdu::UFrame(cmd)
            },
        };

        Ok((apdu, total_len))
    }

    /// Overwrites any embedded IO timestamp with the current wall-clock
    /// time. Called by the connection engine right before a send, since
    /// only it knows when the frame is actually going out; the codec and
    /// device model stay free of a live clock.
    pub fn restamp_now(&mut self) {
        if let Apdu::IFrame { asdu: Some(asdu), .. } = self {
            asdu.restamp_now();
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.push(START_BYTE);
        out.push(0); // length placeholder, patched below

        match self {
            Apdu::IFrame { tx, rx, asdu } => {
                let tx_word = pack_seq(*tx).to_le_bytes();
                let rx_word = pack_seq(*rx).to_le_bytes();
                out.extend_from_slice(&tx_word);
                out.extend_from_slice(&rx_word);
                if let Some(asdu) = asdu {
                    asdu.encode(&mut out);
                }
            },
            Apdu::SFrame { rx } => {
                let rx_word = pack_seq(*rx).to_le_bytes();
                out.push(0x01);
                out.push(0x00);
                out.extend_from_slice(&rx_word);
            },
            Apdu::UFrame(cmd) => {
                out.push(cmd.control_byte());
                out.push(0x00);
                out.push(0x00);
                out.push(0x00);
            },
        }

        let length = out.len() - HEADER_LEN;
        out[1] = length as u8;
        out
    }
}
