//! Physical process state for each device variant, and the pure math
//! behind the simulation tick (§4.2.2).

use crate::select::SboState;

/// One branch of a transmission line: its per-branch resistance.
pub type BranchOhms = f32;

#[derive(Debug, Clone)]
pub enum PhysicalState {
    Source {
        voltage: f32,
    },
    Transmission {
        /// bit i set => branch i's breaker is closed (enabled)
        breakers: u32,
        branch_resistance: Vec<BranchOhms>,
        vin: f32,
        vout: f32,
        amp: f32,
        aggregated_resistance: f32,
        remote_equivalent_load: f32,
        pending_select: SboState,
    },
    Load {
        load: f32,
        vin: f32,
        amp: f32,
    },
}

impl PhysicalState {
    pub fn new_source(voltage: f32) -> Self {
        PhysicalState::Source { voltage }
    }

    pub fn new_transmission(breakers: u32, branch_resistance: Vec<BranchOhms>) -> Self {
        let aggregated_resistance = parallel_resistance(breakers, &branch_resistance);
        PhysicalState::Transmission {
            breakers,
            branch_resistance,
            vin: 0.0,
            vout: 0.0,
            amp: 0.0,
            aggregated_resistance,
            remote_equivalent_load: f32::INFINITY,
            pending_select: SboState::Idle,
        }
    }

    pub fn new_load(load: f32) -> Self {
        PhysicalState::Load {
            load,
            vin: 0.0,
            amp: 0.0,
        }
    }
}

/// Parallel combination of every branch whose breaker bit is set.
/// A zero-ohm branch short-circuits the combination to 0; an all-open
/// bitfield yields +∞ (open circuit), matching §4.2.2 and the physical
/// invariants in §8.
pub fn parallel_resistance(breakers: u32, branch_resistance: &[BranchOhms]) -> f32 {
    let mut conductance = 0.0f32;
    for (i, &r) in branch_resistance.iter().enumerate() {
        if breakers & (1 << i) == 0 {
            continue;
        }
        if r == 0.0 {
            return 0.0;
        }
        conductance += 1.0 / r;
    }
    if conductance == 0.0 {
        f32::INFINITY
    } else {
        1.0 / conductance
    }
}

/// Transmission output voltage and current from the voltage-divider
/// formed by the local aggregated resistance and the remote equivalent
/// load, guarding against open/short circuit per §4.2.2.
pub fn transmission_outputs(vin: f32, local_r: f32, remote_r: f32) -> (f32, f32) {
    if local_r.is_infinite() {
        return (0.0, 0.0);
    }
    let vout = vin * remote_r / (remote_r + local_r);
    let i = if local_r == 0.0 {
        f32::INFINITY
    } else {
        (vin - vout) / local_r
    };
    (vout, i)
}

/// Load current draw from its incoming voltage and nominal load
/// resistance, guarding division by zero the same way.
pub fn load_current(vin: f32, load: f32) -> f32 {
    if load == 0.0 {
        f32::INFINITY
    } else {
        vin / load
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_open_breakers_yield_infinite_resistance() {
        let r = parallel_resistance(0b000, &[12.0, 10.0, 13.0]);
        assert!(r.is_infinite());
    }

    #[test]
    fn all_closed_matches_parallel_resistance_law() {
        let r = parallel_resistance(0b111, &[12.0, 10.0, 13.0]);
        let expected = 1.0 / (1.0 / 12.0 + 1.0 / 10.0 + 1.0 / 13.0);
        assert!((r - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_ohm_branch_short_circuits() {
        let r = parallel_resistance(0b011, &[0.0, 10.0]);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn open_circuit_yields_zero_output() {
        let (vout, i) = transmission_outputs(500.0, f32::INFINITY, 100.0);
        assert_eq!(vout, 0.0);
        assert_eq!(i, 0.0);
    }

    #[test]
    fn short_circuit_yields_infinite_current() {
        let (_, i) = transmission_outputs(500.0, 0.0, 100.0);
        assert!(i.is_infinite());
    }

    #[test]
    fn load_current_guards_zero_load() {
        assert!(load_current(100.0, 0.0).is_infinite());
        assert!((load_current(100.0, 50.0) - 2.0).abs() < 1e-6);
    }
}
