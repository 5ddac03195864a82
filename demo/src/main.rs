use rand::{rngs::StdRng, Rng, SeedableRng};
use xigrid::{
    config::VerifierConfig,
    loaders::load_bank,
    mapper::{Eigenbasis, LinearXiMapper},
    verify::{BankVerifier, FittingFactorSummary},
    GridResult, PhysicalParams,
};

// Usage: demo [config.yml] [bank.csv|bank.txt]
fn main() -> GridResult<()> {
    pretty_env_logger::init();
    let mut args = std::env::args().skip(1);

    let config = match args.next() {
        Some(path) => VerifierConfig::from_yaml(path)?,
        None => VerifierConfig::default(),
    };
    let mut rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // Without a bank file, lay templates on a regular mass grid
    let bank = match args.next() {
        Some(path) => load_bank(path)?,
        None => {
            let mut bank = Vec::new();
            for i in 0..60 {
                for j in 0..=i {
                    let mass1 = 1.0 + 0.05 * f64::from(i);
                    let mass2 = 1.0 + 0.05 * f64::from(j);
                    bank.push(PhysicalParams::new(mass1, mass2, 0.0, 0.0));
                }
            }
            bank
        }
    };

    let queries = (0..10000)
        .map(|_| {
            let mass1 = rng.gen_range(1.0..4.0);
            let mass2 = rng.gen_range(1.0..=mass1);
            PhysicalParams::new(mass1, mass2, rng.gen_range(-0.05..0.05), 0.0)
        })
        .collect::<Vec<_>>();

    // The same diagonal metric at every cutoff
    let num_frames = match &config.varying {
        Some(varying) => varying.frequency_map()?.len(),
        None => 1,
    };
    let basis = Eigenbasis {
        evals: vec![1.0, 1.0, 0.01, 0.01],
        evecs: (0..4)
            .map(|j| (0..4).map(|i| if i == j { 1.0 } else { 0.0 }).collect())
            .collect(),
    };
    let mapper = LinearXiMapper::new(vec![basis; num_frames])?;
    let threshold = config.fitting_factor_threshold;
    let verifier = BankVerifier::build(config, mapper, &bank)?;
    for (i, stats) in verifier.stats().iter().enumerate() {
        println!(
            "Grid {i}: {} templates in {} cells (max occupancy {})",
            stats.num_points, stats.num_cells, stats.max_cell_occupancy
        );
    }

    let report = verifier.verify(&queries)?;
    let summary = FittingFactorSummary::from_records(&report.records, threshold);
    println!("Queries: {}", summary.count);
    println!("Skipped: {}", report.skipped);
    println!("Without candidate: {}", summary.no_candidate);
    if let (Some(min), Some(mean)) = (summary.min_fitting_factor, summary.mean_fitting_factor) {
        println!("Fitting factor: min {min:.4}, mean {mean:.4}");
    }
    println!(
        "Covered at {threshold}: {:.2}%",
        summary.fraction_covered * 100.0
    );
    Ok(())
}
