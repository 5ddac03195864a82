use assert_approx_eq::assert_approx_eq;
use xigrid::{BankPoint, GridError, GridIndex, PhysicalParams};

fn template(xi: &[f64]) -> BankPoint {
    let params = PhysicalParams::new(1.4, 1.4, 0.0, 0.0);
    BankPoint::new(params, xi.to_vec()).expect("Invalid point")
}

#[test]
fn single_template() {
    let index = GridIndex::build(0.03, vec![template(&[0.0, 0.0, 0.0])]).unwrap();
    assert_approx_eq!(index.bin_spacing(), 0.1732, 1e-4);

    // The template matches itself exactly
    let found = index.query(&[0.0, 0.0, 0.0]).unwrap().unwrap();
    assert_eq!(found.mismatch, 0.0);
    assert_eq!(
        index.point(found.locator).unwrap().xi(),
        &[0.0, 0.0, 0.0][..]
    );

    // Far from every template there is no candidate at all
    assert!(index.query(&[10.0, 10.0, 0.0]).unwrap().is_none());
}

#[test]
fn neighbouring_cells() {
    // Bin spacing of 0.1
    let index = GridIndex::build(
        0.01,
        vec![template(&[0.1, 0.0, 0.0]), template(&[0.2, 0.0, 0.0])],
    )
    .unwrap();

    // The query shares a cell with the first template and neighbours the second
    let query = [0.15, 0.0, 0.0];
    assert_eq!(index.candidates(&query).unwrap().count(), 2);
    let found = index.query(&query).unwrap().unwrap();
    assert_approx_eq!(found.mismatch, 0.0025);

    // The closer template sits in the neighbouring cell
    let index = GridIndex::build(
        0.01,
        vec![template(&[0.05, 0.0, 0.0]), template(&[0.2, 0.0, 0.0])],
    )
    .unwrap();
    let found = index.query(&[0.18, 0.0, 0.0]).unwrap().unwrap();
    assert_approx_eq!(found.mismatch, 0.0004);
    assert_eq!(found.locator.cell.x, 2);
    assert_eq!(index.point(found.locator).unwrap().xi()[0], 0.2);
}

#[test]
fn full_dimension_mismatch() {
    // Identical in the binning plane, far apart in the third dimension
    let index = GridIndex::build(
        0.01,
        vec![template(&[0.0, 0.0, 0.5]), template(&[0.09, 0.0, 0.0])],
    )
    .unwrap();
    let found = index.query(&[0.0, 0.0, 0.0]).unwrap().unwrap();
    assert_approx_eq!(found.mismatch, 0.0081);
    assert_eq!(index.point(found.locator).unwrap().xi()[0], 0.09);
}

#[test]
fn contains_within() {
    let index = GridIndex::build(0.01, vec![template(&[0.0, 0.0, 0.0])]).unwrap();
    assert!(index.contains_within(&[0.05, 0.0, 0.0], 0.003).unwrap());
    assert!(!index.contains_within(&[0.05, 0.0, 0.0], 0.002).unwrap());
    assert!(!index.contains_within(&[5.0, 5.0, 0.0], 100.0).unwrap());
}

#[test]
fn fails_fast() {
    let mut index = GridIndex::new(0.01).unwrap();
    index.insert(template(&[0.0, 0.0, 0.0])).unwrap();
    index.seal();

    assert!(matches!(
        index.insert(template(&[0.0, 0.0, 0.0])),
        Err(GridError::BuildStateViolation { .. })
    ));
    assert!(matches!(
        index.query(&[f64::INFINITY, 0.0, 0.0]),
        Err(GridError::DegenerateInput { coordinate: 0, .. })
    ));
    assert!(matches!(
        index.query(&[0.0, 0.0]),
        Err(GridError::DimensionMismatch {
            expected: 3,
            found: 2
        })
    ));
}
