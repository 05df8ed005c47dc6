use ionic_core::*;
use std::sync::Arc;

#[test]
fn prox_band_wins_at_soma_in_declared_order() {
    let prox = DistanceBand::new(0.0, 20e-6);
    let dist = DistanceBand::new(1e-6, 1000e-6);
    let set = ConductanceSet::builder()
        .band("Npas", "NaF", prox, 99351.07)
        .band("Npas", "NaF", dist, 1500.0)
        .overlap_policy(OverlapPolicy::DeclaredOrder)
        .build()
        .unwrap();
    let soma = Location::new(0.0, Region::Soma);
    assert_eq!(set.lookup("Npas", "NaF", &soma).unwrap(), 99351.07);
}

#[test]
fn same_bands_rejected_by_default() {
    let result = ConductanceSet::builder()
        .band("Npas", "NaF", DistanceBand::new(0.0, 20e-6), 99351.07)
        .band("Npas", "NaF", DistanceBand::new(1e-6, 1000e-6), 1500.0)
        .build();
    match result {
        Err(CoreError::OverlappingBands { cell_type, channel, .. }) => {
            assert_eq!(cell_type, "Npas");
            assert_eq!(channel, "NaF");
        }
        other => panic!("expected overlap error, got {:?}", other),
    }
}

#[test]
fn inverted_thresholds_fail_at_construction() {
    let err = PlasticityParams::new(0.4e-3, 0.6e-3, 1.0, 1.0)
        .and_then(CalciumPlasticityRule::new)
        .unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("low=0.0006"));
}

#[test]
fn every_preset_tabulates_on_standard_grids() {
    let mut cache = TableCache::new();
    for name in presets::names() {
        let spec = Arc::new(presets::channel(name).unwrap());
        let table = cache.get_or_build(&spec, &TableGrids::standard()).unwrap();
        for id in [GateId::X, GateId::Y, GateId::Z] {
            if let Some(gate) = table.gate(id) {
                assert!(gate.a().iter().all(|a| a.is_finite()), "{} {}", name, id);
                assert!(gate.b().iter().all(|b| b.is_finite() && *b > 0.0), "{} {}", name, id);
            }
        }
    }
    assert_eq!(cache.len(), presets::names().len());
}

#[test]
fn scheduler_is_per_run() {
    // two runs in one process do not share scheduling state
    let config = ClockConfig::default();
    let mut first = ClockScheduler::new();
    first.assign(&["/cell"], &config).unwrap();
    first.begin_integration().unwrap();

    let mut second = ClockScheduler::new();
    assert_eq!(second.assign(&["/cell"], &config).unwrap(), 1);
    assert_eq!(second.state(), SchedulerState::Scheduled);
}
