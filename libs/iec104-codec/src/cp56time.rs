//! CP56Time2a — the 7-byte little-endian timestamp embedded in the
//! timestamped information object types (30, 31, 36, 103).

use crate::error::{CodecError, Result};

pub const ENCODED_LEN: usize = 7;

/// A decoded CP56Time2a timestamp.
///
/// Field widths match the wire layout exactly; callers that need a
/// `chrono` timestamp are expected to convert at the boundary where the
/// century is known, since CP56Time2a only carries a two-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cp56Time {
    pub milliseconds: u16,
    pub minute: u8,
    /// IV bit — time value is considered invalid
    pub invalid: bool,
    pub hour: u8,
    /// SU bit — summer time is in effect
    pub summer_time: bool,
    pub day_of_month: u8,
    /// 1..=7, Monday=1 per IEC-104 convention
    pub day_of_week: u8,
    pub month: u8,
    /// Two-digit year, 0..=99
    pub year: u8,
}

impl Cp56Time {
    /// The current wall-clock time, packed into CP56Time2a fields.
    /// `summer_time` is always false: distinguishing DST from the local
    /// offset alone needs a tz database this codec doesn't carry, so SU
    /// is left unset rather than guessed.
    pub fn now() -> Self {
        use chrono::{Datelike, Local, Timelike};
        let now = Local::now();
        Cp56Time {
            milliseconds: (now.second() as u16) * 1000 + (now.nanosecond() / 1_000_000) as u16,
            minute: now.minute() as u8,
            invalid: false,
            hour: now.hour() as u8,
            summer_time: false,
            day_of_month: now.day() as u8,
            day_of_week: now.weekday().number_from_monday() as u8,
            month: now.month() as u8,
            year: (now.year() % 100) as u8,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENCODED_LEN {
            return Err(CodecError::truncated("CP56Time", ENCODED_LEN - buf.len()));
        }
        let milliseconds = u16::from_le_bytes([buf[0], buf[1]]);
        let minute = buf[2] & 0x3F;
        let invalid = buf[2] & 0x80 != 0;
        let hour = buf[3] & 0x1F;
        let summer_time = buf[3] & 0x80 != 0;
        let day_of_month = buf[4] & 0x1F;
        let day_of_week = (buf[4] >> 5) & 0x07;
        let month = buf[5] & 0x0F;
        let year = buf[6] & 0x7F;
        Ok(Cp56Time {
            milliseconds,
            minute,
            invalid,
            hour,
            summer_time,
            day_of_month,
            day_of_week,
            month,
            year,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.milliseconds.to_le_bytes());
        out.push((self.minute & 0x3F) | if self.invalid { 0x80 } else { 0 });
        out.push((self.hour & 0x1F) | if self.summer_time { 0x80 } else { 0 });
        out.push((self.day_of_month & 0x1F) | ((self.day_of_week & 0x07) << 5));
        out.push(self.month & 0x0F);
        out.push(self.year & 0x7F);
    }
}
