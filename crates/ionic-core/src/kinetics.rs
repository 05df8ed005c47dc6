//! Ion channel gating kinetics
//!
//! Every gate is described by closed-form rate functions of membrane voltage
//! (or, for the Z gate, of calcium concentration). The same functions are used
//! for direct evaluation and for tabulation in [`crate::tables`].

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Floor applied to alpha+beta before deriving tau and inf (1/s)
pub const MIN_RATE_SUM: f64 = 1e-9;
/// Floor applied to every time constant (s)
pub const MIN_TAU: f64 = 1e-9;

const SINGULARITY_TOL: f64 = 1e-6;
const SINGULARITY_OFFSET: f64 = 1e-3;

/// Rational sigmoid `(rate + b·v) / (c + exp((v + vhalf) / vslope))`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SigmoidRate {
    /// Constant numerator term (1/s, or s for tau curves)
    pub rate: f64,
    /// Voltage-proportional numerator term
    #[cfg_attr(feature = "serde", serde(default))]
    pub b: f64,
    /// Denominator offset, normally -1, 0 or +1
    #[cfg_attr(feature = "serde", serde(default))]
    pub c: f64,
    /// Half-activation shift (V)
    #[cfg_attr(feature = "serde", serde(default))]
    pub vhalf: f64,
    /// Slope factor (V), never zero
    pub vslope: f64,
}

impl SigmoidRate {
    /// Create a rational sigmoid
    pub fn new(rate: f64, b: f64, c: f64, vhalf: f64, vslope: f64) -> Self {
        Self {
            rate,
            b,
            c,
            vhalf,
            vslope,
        }
    }

    /// Evaluate at voltage `v`.
    ///
    /// A vanishing denominator with a matching numerator zero (`c < 0`) is a
    /// removable singularity; the value is taken as the mean of the two
    /// neighbouring points.
    pub fn eval(&self, v: f64) -> f64 {
        let denom = self.denominator(v);
        if self.c < 0.0 && denom.abs() < SINGULARITY_TOL {
            let dv = self.vslope.abs() * SINGULARITY_OFFSET;
            log::trace!("removable singularity at v={} (vhalf={})", v, self.vhalf);
            return 0.5 * (self.eval_raw(v - dv) + self.eval_raw(v + dv));
        }
        self.eval_raw(v)
    }

    fn denominator(&self, v: f64) -> f64 {
        let denom = self.c + ((v + self.vhalf) / self.vslope).exp();
        if self.c >= 0.0 {
            denom.max(f64::MIN_POSITIVE)
        } else {
            denom
        }
    }

    fn eval_raw(&self, v: f64) -> f64 {
        (self.rate + self.b * v) / self.denominator(v)
    }

    fn validate(&self, channel: &str, what: &str) -> Result<()> {
        let values = [self.rate, self.b, self.c, self.vhalf, self.vslope];
        if values.iter().any(|x| !x.is_finite()) {
            return Err(CoreError::invalid_channel(
                channel,
                format!("{} has non-finite coefficients", what),
            ));
        }
        if self.vslope == 0.0 {
            return Err(CoreError::invalid_channel(
                channel,
                format!("{} has vslope = 0", what),
            ));
        }
        Ok(())
    }
}

/// Forward/backward transition rates
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlphaBetaParams {
    /// Opening rate alpha(v)
    pub alpha: SigmoidRate,
    /// Closing rate beta(v)
    pub beta: SigmoidRate,
}

/// Steady state and time constant given directly as rational sigmoids
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TauInfParams {
    /// Time constant tau(v) (s)
    pub tau: SigmoidRate,
    /// Steady state inf(v)
    pub inf: SigmoidRate,
}

/// Exponent of the complementary sigmoid applied to the time constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TauPower {
    /// Monotonic sigmoid time constant
    #[default]
    One,
    /// Bell-shaped time constant (sigmoid times its complement)
    Two,
}

/// Steady state and time constant with non-zero floors
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TauInfMinParams {
    /// Steady-state floor
    pub ss_min: f64,
    /// Voltage-dependent steady-state amplitude
    pub ss_vdep: f64,
    /// Steady-state half point (V)
    pub ss_vhalf: f64,
    /// Steady-state slope (V)
    pub ss_vslope: f64,
    /// Time constant floor (s)
    pub t_min: f64,
    /// Voltage-dependent time constant amplitude (s)
    pub t_vdep: f64,
    /// Time constant half point (V)
    pub t_vhalf: f64,
    /// Time constant slope (V)
    pub t_vslope: f64,
    /// Whether the time constant is bell shaped
    #[cfg_attr(feature = "serde", serde(default))]
    pub t_power: TauPower,
}

impl TauInfMinParams {
    /// Steady state at `v`, bounded by `[ss_min, ss_min + ss_vdep]`
    pub fn inf(&self, v: f64) -> f64 {
        self.ss_min + self.ss_vdep / (1.0 + ((v + self.ss_vhalf) / self.ss_vslope).exp())
    }

    /// Time constant at `v`
    pub fn tau(&self, v: f64) -> f64 {
        let x = (v + self.t_vhalf) / self.t_vslope;
        let mut shape = 1.0 / (1.0 + x.exp());
        if self.t_power == TauPower::Two {
            shape /= 1.0 + (-x).exp();
        }
        self.t_min + self.t_vdep * shape
    }
}

/// Rate-law variant of one voltage-dependent gate
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "form", rename_all = "snake_case"))]
pub enum RateLaw {
    /// alpha/beta transition rates
    AlphaBeta(AlphaBetaParams),
    /// Independent tau and inf sigmoids
    TauInf(TauInfParams),
    /// tau and inf with floors
    TauInfMin(TauInfMinParams),
}

/// Steady state and time constant of a gate at one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateRates {
    /// Steady-state open fraction
    pub inf: f64,
    /// Time constant (s), at least [`MIN_TAU`]
    pub tau: f64,
}

impl GateRates {
    fn guarded(inf: f64, tau: f64) -> Self {
        let tau = if tau >= MIN_TAU {
            tau
        } else {
            log::trace!("time constant {} clamped to {}", tau, MIN_TAU);
            MIN_TAU
        };
        let inf = if inf.is_finite() { inf } else { 0.0 };
        Self { inf, tau }
    }

    /// Forward term `inf / tau` (1/s)
    pub fn a(&self) -> f64 {
        self.inf / self.tau
    }

    /// Total rate `1 / tau` (1/s)
    pub fn b(&self) -> f64 {
        1.0 / self.tau
    }
}

impl RateLaw {
    /// Steady state and time constant at voltage `v`
    pub fn rates(&self, v: f64) -> GateRates {
        match self {
            RateLaw::AlphaBeta(p) => {
                let alpha = p.alpha.eval(v);
                let beta = p.beta.eval(v);
                let mut sum = alpha + beta;
                if !(sum >= MIN_RATE_SUM) {
                    log::trace!("alpha+beta={} clamped to {} at v={}", sum, MIN_RATE_SUM, v);
                    sum = MIN_RATE_SUM;
                }
                GateRates::guarded(alpha / sum, 1.0 / sum)
            }
            RateLaw::TauInf(p) => GateRates::guarded(p.inf.eval(v), p.tau.eval(v)),
            RateLaw::TauInfMin(p) => GateRates::guarded(p.inf(v), p.tau(v)),
        }
    }

    /// Transition rates `(alpha, beta)` at voltage `v`.
    ///
    /// For tau/inf forms these are derived as `inf/tau` and `(1-inf)/tau`.
    pub fn alpha_beta(&self, v: f64) -> (f64, f64) {
        match self {
            RateLaw::AlphaBeta(p) => (p.alpha.eval(v), p.beta.eval(v)),
            _ => {
                let r = self.rates(v);
                (r.inf / r.tau, (1.0 - r.inf) / r.tau)
            }
        }
    }

    fn validate(&self, channel: &str, gate: &str) -> Result<()> {
        match self {
            RateLaw::AlphaBeta(p) => {
                p.alpha.validate(channel, &format!("{} alpha", gate))?;
                p.beta.validate(channel, &format!("{} beta", gate))
            }
            RateLaw::TauInf(p) => {
                p.tau.validate(channel, &format!("{} tau", gate))?;
                p.inf.validate(channel, &format!("{} inf", gate))
            }
            RateLaw::TauInfMin(p) => {
                let values = [
                    p.ss_min, p.ss_vdep, p.ss_vhalf, p.ss_vslope, p.t_min, p.t_vdep, p.t_vhalf,
                    p.t_vslope,
                ];
                if values.iter().any(|x| !x.is_finite()) {
                    return Err(CoreError::invalid_channel(
                        channel,
                        format!("{} has non-finite coefficients", gate),
                    ));
                }
                if p.ss_vslope == 0.0 || p.t_vslope == 0.0 {
                    return Err(CoreError::invalid_channel(
                        channel,
                        format!("{} has a zero slope", gate),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Voltage-dependent gate with its exponent
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoltageGate {
    /// Exponent of the gating variable in the conductance
    pub power: u32,
    /// Rate law
    pub law: RateLaw,
}

/// Calcium-dependent gate.
///
/// `inf = (ca/kd)^hill / (1 + (ca/kd)^hill)`, evaluated as `1 / (1 + (kd/ca)^hill)`; the time constant is `tau`
/// plus, when `taumax > 0`, `taumax / (1 + (ca/cahalf)^tau_power)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalciumGate {
    /// Exponent of the gating variable in the conductance
    pub power: u32,
    /// Half-activation concentration (mM)
    pub kd: f64,
    /// Hill coefficient; negative values give calcium-dependent inactivation
    pub hill: f64,
    /// Time constant floor (s)
    pub tau: f64,
    /// Calcium-dependent time constant amplitude (s)
    #[cfg_attr(feature = "serde", serde(default))]
    pub taumax: f64,
    /// Exponent of the calcium-dependent time constant term
    #[cfg_attr(feature = "serde", serde(default))]
    pub tau_power: f64,
    /// Half point of the calcium-dependent time constant term (mM)
    #[cfg_attr(feature = "serde", serde(default))]
    pub cahalf: f64,
}

impl CalciumGate {
    /// Steady state and time constant at calcium concentration `ca` (mM)
    pub fn rates(&self, ca: f64) -> GateRates {
        let ca = ca.max(f64::MIN_POSITIVE);
        // Written in kd/ca so neither sign of `hill` overflows to inf/inf
        let inf = 1.0 / (1.0 + (self.kd / ca).powf(self.hill));
        let tau = if self.taumax > 0.0 {
            self.tau + self.taumax / (1.0 + (ca / self.cahalf).powf(self.tau_power))
        } else {
            self.tau
        };
        GateRates::guarded(inf, tau)
    }

    fn validate(&self, channel: &str) -> Result<()> {
        let values = [self.kd, self.hill, self.tau, self.taumax, self.tau_power, self.cahalf];
        if values.iter().any(|x| !x.is_finite()) {
            return Err(CoreError::invalid_channel(
                channel,
                "calcium gate has non-finite coefficients",
            ));
        }
        if self.kd <= 0.0 {
            return Err(CoreError::invalid_channel(channel, "calcium gate kd must be > 0"));
        }
        if self.tau <= 0.0 {
            return Err(CoreError::invalid_channel(channel, "calcium gate tau must be > 0"));
        }
        if self.taumax > 0.0 && self.cahalf <= 0.0 {
            return Err(CoreError::invalid_channel(
                channel,
                "calcium gate with taumax > 0 needs cahalf > 0",
            ));
        }
        Ok(())
    }
}

/// Third gate: either voltage- or calcium-dependent
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "axis", rename_all = "snake_case"))]
pub enum ZGate {
    /// Voltage-dependent Z gate
    Voltage(VoltageGate),
    /// Calcium-dependent Z gate, tabulated over the calcium grid
    Calcium(CalciumGate),
}

impl ZGate {
    /// Exponent of the gate
    pub fn power(&self) -> u32 {
        match self {
            ZGate::Voltage(g) => g.power,
            ZGate::Calcium(g) => g.power,
        }
    }

    /// Whether the gate depends on calcium
    pub fn is_calcium(&self) -> bool {
        matches!(self, ZGate::Calcium(_))
    }

    /// Rates at voltage `v` and calcium `ca`; only the relevant axis is read
    pub fn rates(&self, v: f64, ca: f64) -> GateRates {
        match self {
            ZGate::Voltage(g) => g.law.rates(v),
            ZGate::Calcium(g) => g.rates(ca),
        }
    }
}

/// Gate identifier within a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GateId {
    /// Activation
    X,
    /// Inactivation
    Y,
    /// Second inactivation, often calcium gated
    Z,
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateId::X => write!(f, "X"),
            GateId::Y => write!(f, "Y"),
            GateId::Z => write!(f, "Z"),
        }
    }
}

/// Immutable description of one channel type
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelKineticsSpec {
    /// Channel name, unique within a model
    pub name: String,
    /// Reversal potential (V)
    pub reversal: f64,
    /// Activation gate
    #[cfg_attr(feature = "serde", serde(default))]
    pub x: Option<VoltageGate>,
    /// Inactivation gate
    #[cfg_attr(feature = "serde", serde(default))]
    pub y: Option<VoltageGate>,
    /// Third gate
    #[cfg_attr(feature = "serde", serde(default))]
    pub z: Option<ZGate>,
    /// Whether the current feeds the compartment's calcium pool
    #[cfg_attr(feature = "serde", serde(default))]
    pub calcium_permeable: bool,
}

impl ChannelKineticsSpec {
    /// Create a channel without gates; add them with the `with_*` methods
    pub fn new(name: impl Into<String>, reversal: f64) -> Self {
        Self {
            name: name.into(),
            reversal,
            x: None,
            y: None,
            z: None,
            calcium_permeable: false,
        }
    }

    /// Set the activation gate
    pub fn with_x(mut self, power: u32, law: RateLaw) -> Self {
        self.x = Some(VoltageGate { power, law });
        self
    }

    /// Set the inactivation gate
    pub fn with_y(mut self, power: u32, law: RateLaw) -> Self {
        self.y = Some(VoltageGate { power, law });
        self
    }

    /// Set a voltage-dependent Z gate
    pub fn with_z(mut self, power: u32, law: RateLaw) -> Self {
        self.z = Some(ZGate::Voltage(VoltageGate { power, law }));
        self
    }

    /// Set a calcium-dependent Z gate
    pub fn with_calcium_z(mut self, gate: CalciumGate) -> Self {
        self.z = Some(ZGate::Calcium(gate));
        self
    }

    /// Mark the channel as carrying calcium
    pub fn calcium_permeable(mut self) -> Self {
        self.calcium_permeable = true;
        self
    }

    /// Gate exponents `(Xpow, Ypow, Zpow)`, zero for absent gates
    pub fn powers(&self) -> (u32, u32, u32) {
        (
            self.x.map_or(0, |g| g.power),
            self.y.map_or(0, |g| g.power),
            self.z.map_or(0, |g| g.power()),
        )
    }

    /// Whether the Z gate reads calcium
    pub fn is_calcium_gated(&self) -> bool {
        self.z.map_or(false, |z| z.is_calcium())
    }

    /// Validate the specification
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_channel("<unnamed>", "channel name is empty"));
        }
        if !self.reversal.is_finite() {
            return Err(CoreError::invalid_channel(&self.name, "reversal potential is not finite"));
        }
        if self.x.is_none() && self.y.is_none() && self.z.is_none() {
            return Err(CoreError::invalid_channel(
                &self.name,
                "Xpow = Ypow = Zpow = 0, channel has no gating variables",
            ));
        }
        for (id, gate) in [(GateId::X, self.x), (GateId::Y, self.y)] {
            if let Some(gate) = gate {
                if gate.power == 0 {
                    return Err(CoreError::invalid_channel(
                        &self.name,
                        format!("gate {} is defined with power 0", id),
                    ));
                }
                gate.law.validate(&self.name, &id.to_string())?;
            }
        }
        if let Some(z) = self.z {
            if z.power() == 0 {
                return Err(CoreError::invalid_channel(&self.name, "gate Z is defined with power 0"));
            }
            match z {
                ZGate::Voltage(g) => g.law.validate(&self.name, "Z")?,
                ZGate::Calcium(g) => g.validate(&self.name)?,
            }
        }
        Ok(())
    }

    /// Steady-state gate values at voltage `v` and calcium `ca`
    pub fn steady_state(&self, v: f64, ca: f64) -> GateValues {
        GateValues {
            x: self.x.map_or(1.0, |g| g.law.rates(v).inf),
            y: self.y.map_or(1.0, |g| g.law.rates(v).inf),
            z: self.z.map_or(1.0, |g| g.rates(v, ca).inf),
        }
    }

    /// Fraction of the peak conductance that is open for `gates`
    pub fn open_fraction(&self, gates: &GateValues) -> f64 {
        let (xp, yp, zp) = self.powers();
        gates.x.powi(xp as i32) * gates.y.powi(yp as i32) * gates.z.powi(zp as i32)
    }
}

/// Current values of a channel's gating variables; absent gates hold 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateValues {
    /// Activation
    pub x: f64,
    /// Inactivation
    pub y: f64,
    /// Third gate
    pub z: f64,
}

impl Default for GateValues {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0, z: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    fn boltzmann() -> TauInfMinParams {
        TauInfMinParams {
            ss_min: 0.2,
            ss_vdep: 0.7,
            ss_vhalf: 40e-3,
            ss_vslope: -8e-3,
            t_min: 0.5e-3,
            t_vdep: 4e-3,
            t_vhalf: 50e-3,
            t_vslope: 10e-3,
            t_power: TauPower::One,
        }
    }

    #[test]
    fn test_alpha_beta_steady_state() {
        let naf = presets::hh_naf();
        let law = naf.x.unwrap().law;
        for v in [-0.09, -0.07, -0.05, -0.02, 0.0, 0.03] {
            let (alpha, beta) = law.alpha_beta(v);
            let rates = law.rates(v);
            assert!((rates.inf - alpha / (alpha + beta)).abs() < 1e-12);
            assert!((rates.tau - 1.0 / (alpha + beta)).abs() < 1e-15);
        }
    }

    #[test]
    fn test_removable_singularity_is_finite() {
        // alpha_m has 0/0 at v = -45 mV
        let law = presets::hh_naf().x.unwrap().law;
        let (alpha, _) = law.alpha_beta(-0.045);
        assert!(alpha.is_finite());
        // HH limit value: 1 ms^-1 = 1000 /s
        assert!((alpha - 1000.0).abs() < 1.0);
        let left = law.alpha_beta(-0.0451).0;
        let right = law.alpha_beta(-0.0449).0;
        assert!(alpha > left.min(right) && alpha < left.max(right));
    }

    #[test]
    fn test_degenerate_rate_sum_is_clamped() {
        let zero = SigmoidRate::new(0.0, 0.0, 1.0, 0.0, 0.01);
        let law = RateLaw::AlphaBeta(AlphaBetaParams { alpha: zero, beta: zero });
        let rates = law.rates(-0.07);
        assert!(rates.tau.is_finite());
        assert!(rates.inf.is_finite());
        assert_eq!(rates.tau, 1.0 / MIN_RATE_SUM);
    }

    #[test]
    fn test_tau_inf_min_bounds() {
        let p = boltzmann();
        for i in 0..=340 {
            let v = -0.12 + i as f64 * 0.5e-3;
            let inf = p.inf(v);
            assert!(inf >= p.ss_min - 1e-12 && inf <= p.ss_min + p.ss_vdep + 1e-12);
        }
    }

    #[test]
    fn test_tau_power_two_is_bell_shaped() {
        let mut p = boltzmann();
        p.t_power = TauPower::Two;
        let peak = p.tau(-p.t_vhalf);
        assert!(peak > p.tau(-p.t_vhalf - 0.03));
        assert!(peak > p.tau(-p.t_vhalf + 0.03));
        // both tails approach the floor
        assert!((p.tau(-0.12 - p.t_vhalf) - p.t_min).abs() < 1e-4);
    }

    #[test]
    fn test_calcium_gate() {
        let gate = CalciumGate {
            power: 1,
            kd: 0.57e-3,
            hill: 5.2,
            tau: 4.9e-3,
            taumax: 0.0,
            tau_power: 0.0,
            cahalf: 0.0,
        };
        let at_kd = gate.rates(0.57e-3);
        assert!((at_kd.inf - 0.5).abs() < 1e-12);
        assert_eq!(at_kd.tau, 4.9e-3);
        assert!(gate.rates(5e-3).inf > 0.99);

        let slowed = CalciumGate { taumax: 10e-3, tau_power: 2.0, cahalf: 1e-3, ..gate };
        let low = slowed.rates(0.01e-3).tau;
        let high = slowed.rates(10e-3).tau;
        assert!(low > high);
        assert!(high >= slowed.tau);
    }

    #[test]
    fn test_calcium_gate_extreme_concentrations() {
        let inactivating = CalciumGate {
            power: 1,
            kd: 1e-3,
            hill: -5.0,
            tau: 10e-3,
            taumax: 0.0,
            tau_power: 0.0,
            cahalf: 0.0,
        };
        for ca in [0.0, 1e-70, 1e-9] {
            let r = inactivating.rates(ca);
            assert!(r.inf > 0.99, "inf {} at ca {}", r.inf, ca);
        }
        assert!(inactivating.rates(1.0).inf < 1e-10);
        assert!((inactivating.rates(1e-3).inf - 0.5).abs() < 1e-12);

        let activating = CalciumGate { hill: 4.0, ..inactivating };
        assert_eq!(activating.rates(0.0).inf, 0.0);
        assert!(activating.rates(1e300).inf > 0.99);
    }

    #[test]
    fn test_spec_without_gates_is_rejected() {
        let spec = ChannelKineticsSpec::new("Leak", -0.07);
        let err = spec.validate().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(format!("{}", err).contains("Leak"));
    }

    #[test]
    fn test_zero_power_gate_is_rejected() {
        let law = presets::hh_naf().x.unwrap().law;
        let spec = ChannelKineticsSpec::new("Bad", 0.05).with_x(0, law);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_zero_slope_is_rejected() {
        let law = RateLaw::TauInf(TauInfParams {
            tau: SigmoidRate::new(1e-3, 0.0, 1.0, 0.0, 0.0),
            inf: SigmoidRate::new(1.0, 0.0, 1.0, 0.04, -0.01),
        });
        let spec = ChannelKineticsSpec::new("Flat", -0.09).with_x(1, law);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_open_fraction_uses_powers() {
        let spec = presets::hh_naf();
        assert_eq!(spec.powers(), (3, 1, 0));
        let gates = GateValues { x: 0.5, y: 0.8, z: 0.3 };
        assert!((spec.open_fraction(&gates) - 0.125 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_tau_inf_derived_alpha_beta() {
        let law = presets::channel("NaF").unwrap().x.unwrap().law;
        let (alpha, beta) = law.alpha_beta(-0.03);
        let rates = law.rates(-0.03);
        assert!((alpha / (alpha + beta) - rates.inf).abs() < 1e-9);
    }
}
