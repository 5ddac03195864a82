use assert_approx_eq::assert_approx_eq;
use xigrid::{
    frequency::{CutoffFormula, FrequencyMap, OutOfRangePolicy},
    varying::FrequencyLayer,
    BankPoint, GridError, PhysicalParams,
};

// The ISCO cutoffs of these total masses sit within a fraction of a hertz of
// 100, 200 and 400 Hz.
const HEAVY: f64 = 44.0;
const MEDIUM: f64 = 22.0;
const LIGHT: f64 = 11.0;

fn params(total_mass: f64) -> PhysicalParams {
    PhysicalParams::new(total_mass / 2.0, total_mass / 2.0, 0.0, 0.0)
}

fn template(total_mass: f64, xi: [f64; 2]) -> BankPoint {
    BankPoint::with_frames(params(total_mass), vec![xi.to_vec(); 3]).unwrap()
}

fn layer(span: usize, policy: OutOfRangePolicy) -> FrequencyLayer {
    let map = FrequencyMap::with_norms(vec![100.0, 200.0, 400.0], vec![0.8, 0.9, 1.0]).unwrap();
    let mut layer = FrequencyLayer::new(map, CutoffFormula::SchwarzIsco, 0.03).unwrap();
    layer.set_neighbor_span(span).set_out_of_range(policy);
    layer
}

#[test]
fn assigns_cutoffs() {
    let layer = layer(1, OutOfRangePolicy::Clamp);
    assert_eq!(layer.nearest_cutoff(&params(HEAVY)).unwrap(), 0);
    assert_eq!(layer.nearest_cutoff(&params(MEDIUM)).unwrap(), 1);
    assert_eq!(layer.nearest_cutoff(&params(LIGHT)).unwrap(), 2);
}

#[test]
fn stats_per_cutoff() {
    let mut layer = layer(1, OutOfRangePolicy::Clamp);
    layer
        .build(
            vec![
                template(HEAVY, [0.0, 0.0]),
                template(HEAVY, [0.5, 0.5]),
                template(MEDIUM, [0.0, 0.0]),
                template(LIGHT, [0.0, 0.0]),
                template(LIGHT, [0.01, 0.0]),
                template(LIGHT, [3.0, 0.0]),
            ],
            false,
        )
        .unwrap();
    let counts = layer
        .stats()
        .iter()
        .map(|s| s.num_points)
        .collect::<Vec<_>>();
    assert_eq!(counts, vec![2, 1, 3]);
    assert_eq!(layer.num_points(), 6);
    assert_eq!(layer.index(2).unwrap().stats().num_cells, 2);
    assert!(layer.index(3).is_none());
}

#[test]
fn cross_cutoff_penalty() {
    let mut layer = layer(1, OutOfRangePolicy::Clamp);
    layer
        .build(vec![template(MEDIUM, [0.0, 0.0])], true)
        .unwrap();

    // The query's own cutoff holds nothing; the neighbour below is compared in
    // its own frame and penalized by the ratio of normalizations.
    let query = params(LIGHT);
    let xis = vec![vec![5.0, 5.0], vec![0.05, 0.0], vec![0.05, 0.0]];
    let found = layer.query(&query, &xis).unwrap().unwrap();
    assert_approx_eq!(found.mismatch, 1.0 - (1.0 - 0.0025) * 0.9);
    assert_eq!(found.locator.frequency_index, 1);
    assert_eq!(layer.point(found.locator).unwrap().params, params(MEDIUM));

    assert!(layer.contains_within(&query, &xis, 0.2).unwrap());
    assert!(!layer.contains_within(&query, &xis, 0.1).unwrap());

    // Without neighbouring cutoffs nothing is found
    let mut narrow = self::layer(0, OutOfRangePolicy::Clamp);
    narrow
        .build(vec![template(MEDIUM, [0.0, 0.0])], false)
        .unwrap();
    assert!(narrow.query(&query, &xis).unwrap().is_none());
}

#[test]
fn own_cutoff_wins() {
    let mut layer = layer(1, OutOfRangePolicy::Clamp);
    layer
        .build(
            vec![template(MEDIUM, [0.0, 0.0]), template(LIGHT, [0.1, 0.0])],
            false,
        )
        .unwrap();

    let xis = vec![vec![0.0, 0.0]; 3];
    let found = layer.query(&params(LIGHT), &xis).unwrap().unwrap();
    assert_approx_eq!(found.mismatch, 0.01);
    assert_eq!(found.locator.frequency_index, 2);
}

#[test]
fn out_of_range() {
    // A cutoff far above the highest discretized frequency
    let tiny = params(1.0);
    let xis = vec![vec![0.0, 0.0]; 3];

    let mut clamp = layer(1, OutOfRangePolicy::Clamp);
    clamp.build(vec![template(1.0, [0.0, 0.0])], false).unwrap();
    assert_eq!(clamp.nearest_cutoff(&tiny).unwrap(), 2);
    let found = clamp.query(&tiny, &xis).unwrap().unwrap();
    assert_eq!(found.mismatch, 0.0);
    assert_eq!(found.locator.frequency_index, 2);

    let mut reject = layer(1, OutOfRangePolicy::Reject);
    reject.build(vec![template(LIGHT, [0.0, 0.0])], false).unwrap();
    assert!(matches!(
        reject.query(&tiny, &xis),
        Err(GridError::FrequencyOutOfRange { .. })
    ));
}

#[test]
fn failed_build_leaves_layer_unbuilt() {
    let mut layer = layer(1, OutOfRangePolicy::Reject);
    let result = layer.build(
        vec![template(LIGHT, [0.0, 0.0]), template(1.0, [0.0, 0.0])],
        false,
    );
    assert!(matches!(result, Err(GridError::FrequencyOutOfRange { .. })));
    assert!(!layer.is_built());

    // Every template needs a frame per cutoff
    let single = BankPoint::new(params(LIGHT), vec![0.0, 0.0]).unwrap();
    assert!(matches!(
        layer.build(vec![single], false),
        Err(GridError::Configuration { .. })
    ));
    assert!(!layer.is_built());

    layer.build(vec![template(LIGHT, [0.0, 0.0])], false).unwrap();
    assert!(matches!(
        layer.query(&params(LIGHT), &[vec![0.0, 0.0]]),
        Err(GridError::Configuration { .. })
    ));
}

#[test]
fn query_frames_must_match_the_bank() {
    let mut layer = layer(1, OutOfRangePolicy::Clamp);
    let spatial = BankPoint::with_frames(params(MEDIUM), vec![vec![0.0, 0.0, 5.0]; 3]).unwrap();
    layer.build(vec![spatial], false).unwrap();

    // The heavy query's own cutoff holds no templates; its frames still have to agree
    let heavy = params(HEAVY);
    let short_own = vec![vec![0.0, 0.0], vec![0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]];
    assert!(matches!(
        layer.query(&heavy, &short_own),
        Err(GridError::DimensionMismatch {
            expected: 2,
            found: 3
        })
    ));

    let flat = vec![vec![0.0, 0.0]; 3];
    assert!(matches!(
        layer.query(&heavy, &flat),
        Err(GridError::DimensionMismatch {
            expected: 3,
            found: 2
        })
    ));

    let unused_nan = vec![vec![0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0], vec![f64::NAN, 0.0, 0.0]];
    assert!(matches!(
        layer.contains_within(&heavy, &unused_nan, 1.0),
        Err(GridError::DegenerateInput { coordinate: 0, .. })
    ));

    // A well-formed query sees the full mismatch of the neighbouring template
    let found = layer
        .query(&heavy, &vec![vec![0.0, 0.0, 0.0]; 3])
        .unwrap()
        .unwrap();
    assert_approx_eq!(found.mismatch, 1.0 - (1.0 - 25.0) * 0.8 / 0.9);
}

#[test]
fn bank_shares_one_dimension() {
    let mut layer = layer(1, OutOfRangePolicy::Clamp);
    let wide = BankPoint::with_frames(params(LIGHT), vec![vec![0.0, 0.0, 0.0]; 3]).unwrap();
    assert!(matches!(
        layer.build(vec![template(HEAVY, [0.0, 0.0]), wide], true),
        Err(GridError::DimensionMismatch {
            expected: 2,
            found: 3
        })
    ));
    assert!(!layer.is_built());
}
