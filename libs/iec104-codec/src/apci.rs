//! APCI — the 4-byte control header shared by every APDU, and the
//! U-frame command bitfield it carries for STARTDT/STOPDT/TESTFR.

/// The six defined U-frame commands, discriminated by which single bit
/// of the 6-bit command field (control byte 0, bits 2-7) is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UFrameCommand {
    StartDtAct,
    StartDtCon,
    StopDtAct,
    StopDtCon,
    TestFrAct,
    TestFrCon,
}

impl UFrameCommand {
    pub fn from_control_byte(b: u8) -> Option<Self> {
        match b & 0xFC {
            0x04 => Some(UFrameCommand::StartDtAct),
            0x08 => Some(UFrameCommand::StartDtCon),
            0x10 => Some(UFrameCommand::StopDtAct),
            0x20 => Some(UFrameCommand::StopDtCon),
            0x40 => Some(UFrameCommand::TestFrAct),
            0x80 => Some(UFrameCommand::TestFrCon),
            _ => None,
        }
    }

    pub fn control_byte(self) -> u8 {
        let bits = match self {
            UFrameCommand::StartDtAct => 0x04,
            UFrameCommand::StartDtCon => 0x08,
            UFrameCommand::StopDtAct => 0x10,
            UFrameCommand::StopDtCon => 0x20,
            UFrameCommand::TestFrAct => 0x40,
            UFrameCommand::TestFrCon => 0x80,
        };
        bits | 0x03
    }
}

/// Pack a 15-bit sequence number the way I/S-frames do: the value
/// occupies bits 1-15 of a little-endian 16-bit word, bit 0 is the
/// frame-type discriminator (always 0 for these words).
pub fn pack_seq(value: u16) -> u16 {
    (value & 0x7FFF) << 1
}

/// Unpack a 15-bit sequence number from its 16-bit wire word.
pub fn unpack_seq(word: u16) -> u16 {
    (word >> 1) & 0x7FFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u_frame_commands_match_byte_exact_vectors() {
        assert_eq!(UFrameCommand::StartDtAct.control_byte(), 0x07);
        assert_eq!(UFrameCommand::StartDtCon.control_byte(), 0x0B);
        assert_eq!(UFrameCommand::StopDtAct.control_byte(), 0x13);
        assert_eq!(UFrameCommand::StopDtCon.control_byte(), 0x23);
        assert_eq!(UFrameCommand::TestFrAct.control_byte(), 0x43);
        assert_eq!(UFrameCommand::TestFrCon.control_byte(), 0x83);
    }

    #[test]
    fn u_frame_commands_round_trip_through_parsing() {
        for cmd in [
            UFrameCommand::StartDtAct,
            UFrameCommand::StartDtCon,
            UFrameCommand::StopDtAct,
            UFrameCommand::StopDtCon,
            UFrameCommand::TestFrAct,
            UFrameCommand::TestFrCon,
        ] {
            let b = cmd.control_byte();
            assert_eq!(UFrameCommand::from_control_byte(b), Some(cmd));
        }
    }

    #[test]
    fn seq_pack_unpack_round_trips_at_2_15_boundary() {
        assert_eq!(unpack_seq(pack_seq(0x7FFF)), 0x7FFF);
        assert_eq!(unpack_seq(pack_seq(0)), 0);
        // wraps modulo 2^15, not 2^16
        assert_eq!(pack_seq(0x8000), pack_seq(0));
    }
}
