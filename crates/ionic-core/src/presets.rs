//! Built-in channel definitions
//!
//! Hodgkin-Huxley style sodium and potassium channels plus the striatal
//! projection neuron channel family. Model files refer to these by name.

use crate::kinetics::*;

/// Potassium reversal potential (V)
pub const K_REV: f64 = -90e-3;
/// Sodium reversal potential (V)
pub const NA_REV: f64 = 50e-3;
/// Calcium reversal potential (V), for 2 mM external and 50 nM internal calcium
pub const CA_REV: f64 = 140e-3;

const Q_NAF: f64 = 2.5;
const Q_KAF: f64 = 10.0;
const Q_CAL: f64 = 2.0;
const Q_CAR: f64 = 2.0;

fn ab(alpha: SigmoidRate, beta: SigmoidRate) -> RateLaw {
    RateLaw::AlphaBeta(AlphaBetaParams { alpha, beta })
}

fn s(rate: f64, b: f64, c: f64, vhalf: f64, vslope: f64) -> SigmoidRate {
    SigmoidRate::new(rate, b, c, vhalf, vslope)
}

/// Hodgkin-Huxley sodium channel, m³h, shifted 5 mV
pub fn hh_naf() -> ChannelKineticsSpec {
    ChannelKineticsSpec::new("HHNa", NA_REV)
        .with_x(
            3,
            ab(
                s(-4500.0, -1e5, -1.0, 0.045, -0.010),
                s(4000.0, 0.0, 0.0, 0.070, 0.018),
            ),
        )
        .with_y(
            1,
            ab(
                s(70.0, 0.0, 0.0, 0.070, 0.020),
                s(1000.0, 0.0, 1.0, 0.040, -0.010),
            ),
        )
}

/// Hodgkin-Huxley delayed rectifier, n⁴
pub fn hh_kdr() -> ChannelKineticsSpec {
    ChannelKineticsSpec::new("HHK", -77e-3).with_x(
        4,
        ab(
            s(-550.0, -1e4, -1.0, 0.055, -0.010),
            s(125.0, 0.0, 0.0, 0.065, 0.080),
        ),
    )
}

/// Fast sodium channel with bell-shaped activation time constant
pub fn naf() -> ChannelKineticsSpec {
    let m = TauInfMinParams {
        ss_min: 0.0,
        ss_vdep: 1.0,
        ss_vhalf: -25e-3,
        ss_vslope: -10e-3,
        t_min: 0.1e-3 / Q_NAF,
        t_vdep: 2.1025e-3 / Q_NAF,
        t_vhalf: -62e-3,
        t_vslope: 8e-3,
        t_power: TauPower::Two,
    };
    let h = TauInfMinParams {
        ss_min: 0.0,
        ss_vdep: 1.0,
        ss_vhalf: -60e-3,
        ss_vslope: 6e-3,
        t_min: 2.0 * 0.2754e-3 / Q_NAF,
        t_vdep: 2.0 * 1.2e-3 / Q_NAF,
        t_vhalf: -42e-3,
        t_vslope: 3e-3,
        t_power: TauPower::One,
    };
    ChannelKineticsSpec::new("NaF", NA_REV)
        .with_x(3, RateLaw::TauInfMin(m))
        .with_y(1, RateLaw::TauInfMin(h))
}

/// Inward rectifier potassium channel
pub fn kir() -> ChannelKineticsSpec {
    ChannelKineticsSpec::new("Kir", K_REV).with_x(
        1,
        ab(
            s(0.008, 0.0, 0.0, 0.0, 11e-3),
            s(1000.0, 0.0, 1.0, -40e-3, -40e-3),
        ),
    )
}

/// Fast A-type potassium channel
pub fn kaf() -> ChannelKineticsSpec {
    ChannelKineticsSpec::new("KaF", K_REV)
        .with_x(
            2,
            ab(
                s(1.8e3 * Q_KAF, 0.0, 1.0, 18e-3, -13e-3),
                s(0.45e3 * Q_KAF, 0.0, 1.0, -2e-3, 11e-3),
            ),
        )
        .with_y(
            1,
            ab(
                s(0.105e3 * Q_KAF, 0.0, 1.0, 121e-3, 22e-3),
                s(0.065e3 * Q_KAF, 0.0, 1.0, 55e-3, -11e-3),
            ),
        )
}

/// Slow A-type potassium channel
pub fn kas() -> ChannelKineticsSpec {
    ChannelKineticsSpec::new("KaS", K_REV)
        .with_x(
            2,
            ab(
                s(22057.0306, 0.0, 1.0, -0.0878967558, -0.0162951634),
                s(348021313.0, 0.0, 1.0, 0.398221778, 0.0218235302),
            ),
        )
        .with_y(
            1,
            ab(
                s(25644952.0, 0.0, 1.0, 1.222, 0.0645391447),
                s(1.28951669, 0.0, 1.0, 0.000635602802, -0.0262013787),
            ),
        )
}

/// L-type Cav1.2 calcium channel
pub fn cal12() -> ChannelKineticsSpec {
    let h = TauInfMinParams {
        ss_min: 0.83,
        ss_vdep: 0.17,
        ss_vhalf: -55e-3,
        ss_vslope: 8e-3,
        t_min: 44.3e-3 / Q_CAL,
        t_vdep: 0.0,
        t_vhalf: 4.0003e-3,
        t_vslope: -7.5e-3,
        t_power: TauPower::One,
    };
    ChannelKineticsSpec::new("CaL12", CA_REV)
        .with_x(
            2,
            ab(
                s(-220e3 * 4.0003e-3 * Q_CAL, -220e3 * Q_CAL, -1.0, 4.0003e-3, -8e-3),
                s(71e3 * -4.0003e-3 * Q_CAL, 71e3 * Q_CAL, -1.0, -4.0003e-3, 5e-3),
            ),
        )
        .with_y(1, RateLaw::TauInfMin(h))
        .calcium_permeable()
}

/// L-type Cav1.3 calcium channel
pub fn cal13() -> ChannelKineticsSpec {
    let h = TauInfMinParams {
        ss_min: 0.0,
        ss_vdep: 1.0,
        ss_vhalf: -37e-3,
        ss_vslope: 5e-3,
        t_min: 44.3e-3 / Q_CAL,
        t_vdep: 0.0,
        t_vhalf: 37e-3,
        t_vslope: 5e-3,
        t_power: TauPower::One,
    };
    ChannelKineticsSpec::new("CaL13", CA_REV)
        .with_x(
            2,
            ab(
                s(1500.0 * Q_CAL, 0.0, 1.0, -5e-3, -18e-3),
                s(2000.0 * Q_CAL, 0.0, 1.0, 52e-3, 8e-3),
            ),
        )
        .with_y(1, RateLaw::TauInfMin(h))
        .calcium_permeable()
}

/// R-type calcium channel
pub fn car() -> ChannelKineticsSpec {
    ChannelKineticsSpec::new("CaR", CA_REV)
        .with_x(
            3,
            ab(
                s(240.0 * Q_CAR, 0.0, 0.0, 0.0, -28e-3),
                s(8e6 * 158e-3 * Q_CAR, 8e6 * Q_CAR, -1.0, 158e-3, 13.6e-3),
            ),
        )
        .with_y(
            1,
            ab(
                s(10000.0 * 0.11, 10000.0, -1.0, 0.11, 17e-3),
                s(20.0, 0.0, 0.0, 0.0, -30e-3),
            ),
        )
        .calcium_permeable()
}

/// Small-conductance calcium-activated potassium channel
pub fn sk() -> ChannelKineticsSpec {
    ChannelKineticsSpec::new("SK", K_REV).with_calcium_z(CalciumGate {
        power: 1,
        kd: 0.57e-3,
        hill: 5.2,
        tau: 4.9e-3,
        taumax: 0.0,
        tau_power: 0.0,
        cahalf: 0.0,
    })
}

/// Names accepted by [`channel`]
pub fn names() -> &'static [&'static str] {
    &[
        "HHNa", "HHK", "NaF", "Kir", "KaF", "KaS", "CaL12", "CaL13", "CaR", "SK",
    ]
}

/// Look up a built-in channel by name
pub fn channel(name: &str) -> Option<ChannelKineticsSpec> {
    let spec = match name {
        "HHNa" => hh_naf(),
        "HHK" => hh_kdr(),
        "NaF" => naf(),
        "Kir" => kir(),
        "KaF" => kaf(),
        "KaS" => kas(),
        "CaL12" => cal12(),
        "CaL13" => cal13(),
        "CaR" => car(),
        "SK" => sk(),
        _ => return None,
    };
    Some(spec)
}
