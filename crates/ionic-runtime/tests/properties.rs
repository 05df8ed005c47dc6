use ionic_runtime::*;
use proptest::prelude::*;
use std::path::Path;

/// Unbranched passive cable of `n` compartments with no stimulus
fn resting_chain(n: usize, em: f64, rm: f64, diameter: f64) -> ModelDefinition {
    let compartments: Vec<String> = (0..n)
        .map(|i| {
            let parent = if i == 0 {
                String::new()
            } else {
                format!(", parent = \"c{}\"", i - 1)
            };
            format!(
                "{{ name = \"c{}\"{}, length = 10e-6, diameter = {:e} }}",
                i, parent, diameter
            )
        })
        .collect();
    let text = format!(
        r#"
name = "chain"

[clocks]
sim_dt = 25e-6
plot_dt = 50e-6

[[channels]]
preset = "HHK"

[variants.default]

[[cells]]
name = "cable"
passive = {{ cm = 0.01, rm = {:e}, ra = 2.0, em = {:e} }}
compartments = [{}]
"#,
        rm,
        em,
        compartments.join(", ")
    );
    ModelConfig::from_toml_str(&text, Path::new("chain.toml"))
        .unwrap()
        .into_definition(None)
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn resting_cable_stays_at_rest(
        n in 1usize..6,
        em in -0.09f64..-0.05,
        rm in 0.1f64..5.0,
        diameter in 1e-6f64..10e-6,
        implicit in any::<bool>(),
    ) {
        let def = resting_chain(n, em, rm, diameter);
        let opts = RunOptions::new(1e-3).unwrap().with_implicit(implicit);
        let result = setup_and_run(&def, &opts).unwrap();

        prop_assert_eq!(result.times.len(), 21);
        for i in 0..n {
            let vm = result.trace("/cable_0", &format!("c{}", i), TraceKind::Voltage).unwrap();
            for v in &vm.values {
                prop_assert!((v - em).abs() < 1e-9, "c{} drifted to {}", i, v);
            }
        }
        prop_assert_eq!(result.total_spikes(), 0);
    }

    #[test]
    fn sweep_param_sets_stay_inside_their_ranges(
        low in 0.1f64..1.0,
        width in 0.0f64..2.0,
        n in 0usize..20,
        seed in any::<u64>(),
    ) {
        let range = sweep::FactorRange {
            cell: "cable".into(),
            channel: "HHK".into(),
            low,
            high: low + width,
        };
        let sets = random_param_sets(std::slice::from_ref(&range), n, seed).unwrap();
        prop_assert_eq!(sets.len(), n);
        for (i, set) in sets.iter().enumerate() {
            prop_assert_eq!(set.index, i);
            let f = set.factors[0].factor;
            prop_assert!(f >= low && f <= low + width);
        }
        let again = random_param_sets(&[range], n, seed).unwrap();
        prop_assert_eq!(sets, again);
    }
}
