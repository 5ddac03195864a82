use rand::{rngs::StdRng, Rng, SeedableRng};
use xigrid::{BankPoint, GridIndex, LinearBank, PhysicalParams};

const MAX_MISMATCH: f64 = 0.01;

fn random_xi(rng: &mut StdRng) -> Vec<f64> {
    // Two dominant binning directions and a narrow third one
    vec![
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-0.05..0.05),
    ]
}

fn random_bank(rng: &mut StdRng, n: usize) -> Vec<BankPoint> {
    (0..n)
        .map(|_| {
            let params = PhysicalParams::new(
                rng.gen_range(1.0..3.0),
                rng.gen_range(1.0..3.0),
                rng.gen_range(-0.9..0.9),
                rng.gen_range(-0.9..0.9),
            );
            BankPoint::new(params, random_xi(rng)).unwrap()
        })
        .collect()
}

#[test]
fn test_random() {
    let mut rng = StdRng::seed_from_u64(0);
    let bank = random_bank(&mut rng, 2000);

    let index = GridIndex::build(MAX_MISMATCH, bank.clone()).unwrap();
    let mut linear = LinearBank::new();
    for point in bank {
        linear.insert(point).unwrap();
    }

    for _ in 0..1000 {
        let query = random_xi(&mut rng);
        let expected = linear.query(&query).unwrap().unwrap();
        let actual = index.query(&query).unwrap();

        // Whatever the grid reports is a real template distance
        if let Some(actual) = actual {
            assert!(actual.mismatch >= expected.mismatch);
        }

        // Anything within the threshold is always inside the searched window
        if expected.mismatch <= MAX_MISMATCH {
            let actual = actual.expect("a template within the threshold was missed");
            assert_eq!(actual.mismatch, expected.mismatch);
            assert_eq!(
                index.point(actual.locator),
                linear.point(expected.locator)
            );
        }
    }
}

#[test]
fn self_match() {
    let mut rng = StdRng::seed_from_u64(1);
    let bank = random_bank(&mut rng, 1000);
    let index = GridIndex::build(MAX_MISMATCH, bank.clone()).unwrap();

    for point in &bank {
        let found = index.query(point.xi()).unwrap().unwrap();
        assert_eq!(found.mismatch, 0.0);
    }
}

#[test]
fn deterministic() {
    let mut rng = StdRng::seed_from_u64(2);
    let bank = random_bank(&mut rng, 1000);
    let sequential = GridIndex::build(MAX_MISMATCH, bank.clone()).unwrap();
    let parallel = GridIndex::par_build(MAX_MISMATCH, bank).unwrap();

    for _ in 0..500 {
        let query = random_xi(&mut rng);
        let first = sequential.query(&query).unwrap();
        let second = sequential.query(&query).unwrap();
        assert_eq!(first, second);

        // Both builds hold the same templates, so the best mismatch agrees
        let parallel = parallel.query(&query).unwrap();
        assert_eq!(
            first.map(|m| m.mismatch.to_bits()),
            parallel.map(|m| m.mismatch.to_bits())
        );
    }
}

#[test]
fn empty_neighbourhood() {
    let mut rng = StdRng::seed_from_u64(3);
    let index = GridIndex::build(MAX_MISMATCH, random_bank(&mut rng, 500)).unwrap();
    let spacing = index.bin_spacing();

    // Two full cells beyond the edge of the bank
    for _ in 0..100 {
        let query = [
            1.0 + 2.0 * spacing + rng.gen_range(0.0..1.0),
            rng.gen_range(-1.0..1.0),
            0.0,
        ];
        assert!(index.query(&query).unwrap().is_none());
    }
}

#[test]
fn contains_within_agrees_with_linear() {
    let mut rng = StdRng::seed_from_u64(4);
    let bank = random_bank(&mut rng, 2000);
    let index = GridIndex::build(MAX_MISMATCH, bank.clone()).unwrap();
    let mut linear = LinearBank::new();
    for point in bank {
        linear.insert(point).unwrap();
    }

    let mut hits = 0;
    for _ in 0..1000 {
        let query = random_xi(&mut rng);
        for threshold in [MAX_MISMATCH / 10.0, MAX_MISMATCH] {
            let expected = !linear.query_range(&query, threshold).is_empty();
            assert_eq!(index.contains_within(&query, threshold).unwrap(), expected);
            hits += usize::from(expected);
        }
    }
    assert!(hits > 0);
}
