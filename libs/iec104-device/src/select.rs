//! Select-Before-Operate state machine for Transmission breaker commands
//! (type 45, §4.2.1).

use iec104_codec::asdu::cot;
use iec104_codec::io::Sco;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SboState {
    Idle,
    Selected(u32),
}

/// Outcome of one type-45 command against the current SBO state.
pub struct SboOutcome {
    pub next_state: SboState,
    pub reply_cause: u8,
    /// `Some((ioa, close))` when the command should actually flip a
    /// breaker bit: `close = true` sets it, `close = false` clears it.
    pub apply: Option<(u32, bool)>,
}

/// Advances the state machine for one incoming type-45 command.
///
/// `is_known_breaker` tells whether `ioa` names one of this device's
/// breakers; `cause` is the incoming ASDU's Cause of Transmission code
/// (6-bit value, already stripped of the negative/test flags).
pub fn step(
    state: SboState,
    sco: Sco,
    ioa: u32,
    cause: u8,
    is_known_breaker: impl Fn(u32) -> bool,
) -> SboOutcome {
    match (state, sco.select, cause) {
        (SboState::Idle, true, cot::ACTIVATION) if is_known_breaker(ioa) => SboOutcome {
            next_state: SboState::Selected(ioa),
            reply_cause: cot::ACTIVATION_CONFIRMATION,
            apply: None,
        },
        (SboState::Idle, true, cot::ACTIVATION) => SboOutcome {
            next_state: SboState::Idle,
            reply_cause: cot::UNKNOWN_IOA,
            apply: None,
        },
        (SboState::Selected(selected), false, cot::ACTIVATION) if selected == ioa => SboOutcome {
            next_state: SboState::Idle,
            reply_cause: cot::ACTIVATION_CONFIRMATION,
            apply: Some((ioa, sco.state)),
        },
        (SboState::Selected(selected), false, cot::ACTIVATION) => SboOutcome {
            next_state: SboState::Selected(selected),
            reply_cause: cot::UNKNOWN_IOA,
            apply: None,
        },
        (SboState::Selected(_), true, cot::DEACTIVATION) => SboOutcome {
            next_state: SboState::Idle,
            reply_cause: cot::DEACTIVATION_CONFIRMATION,
            apply: None,
        },
        (other, _, _) => SboOutcome {
            next_state: other,
            reply_cause: cot::UNKNOWN_CAUSE,
            apply: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(ioa: u32) -> bool {
        (101..104).contains(&ioa)
    }

    #[test]
    fn select_unknown_ioa_returns_unknown_ioa() {
        let out = step(
            SboState::Idle,
            Sco { select: true, qualifier: 0, state: true },
            999,
            cot::ACTIVATION,
            known,
        );
        assert_eq!(out.reply_cause, cot::UNKNOWN_IOA);
        assert_eq!(out.next_state, SboState::Idle);
    }

    #[test]
    fn execute_before_select_is_unknown_cause() {
        let out = step(
            SboState::Idle,
            Sco { select: false, qualifier: 0, state: true },
            101,
            cot::ACTIVATION,
            known,
        );
        assert_eq!(out.reply_cause, cot::UNKNOWN_CAUSE);
    }

    #[test]
    fn select_then_execute_closes_breaker() {
        let selected = step(
            SboState::Idle,
            Sco { select: true, qualifier: 0, state: true },
            101,
            cot::ACTIVATION,
            known,
        );
        assert_eq!(selected.next_state, SboState::Selected(101));

        let executed = step(
            selected.next_state,
            Sco { select: false, qualifier: 0, state: true },
            101,
            cot::ACTIVATION,
            known,
        );
        assert_eq!(executed.next_state, SboState::Idle);
        assert_eq!(executed.reply_cause, cot::ACTIVATION_CONFIRMATION);
        assert_eq!(executed.apply, Some((101, true)));
    }

    #[test]
    fn execute_with_mismatched_ioa_is_unknown_ioa() {
        let selected = SboState::Selected(101);
        let out = step(
            selected,
            Sco { select: false, qualifier: 0, state: true },
            102,
            cot::ACTIVATION,
            known,
        );
        assert_eq!(out.reply_cause, cot::UNKNOWN_IOA);
        assert_eq!(out.next_state, selected);
    }

    #[test]
    fn deact_returns_to_idle_without_applying() {
        let selected = SboState::Selected(101);
        let out = step(
            selected,
            Sco { select: true, qualifier: 0, state: false },
            101,
            cot::DEACTIVATION,
            known,
        );
        assert_eq!(out.next_state, SboState::Idle);
        assert_eq!(out.reply_cause, cot::DEACTIVATION_CONFIRMATION);
        assert!(out.apply.is_none());
    }
}
