mod common;

use num_bigint::BigUint;
use shared_bdd::{BddConfig, BddFactory, Var};
use test_log::test;

use common::queens;

fn solutions(factory: &BddFactory, n: u32) -> BigUint {
    let f = queens(factory, n).unwrap();
    f.sat_count_max(Var::new(n * n - 1)).unwrap()
}

#[test]
fn test_queens_4() {
    let factory = BddFactory::new(1 << 12, 1 << 10);
    assert_eq!(solutions(&factory, 4), BigUint::from(2u32));
}

#[test]
fn test_queens_8() {
    let factory = BddFactory::new(1 << 16, 1 << 14);
    assert_eq!(solutions(&factory, 8), BigUint::from(92u32));
}

#[test]
fn test_queens_with_tiny_table() {
    // Forces many collections and resizes along the way.
    let factory = BddFactory::with_config(
        BddConfig::default()
            .with_table_size(64)
            .with_cache_size(64)
            .with_preallocated_vars(0)
            .with_increase_factor(1.5)
            .with_max_increase(512),
    );
    assert_eq!(solutions(&factory, 6), BigUint::from(4u32));
    assert!(factory.resize_count() > 0);
    assert!(factory.gc_count() > 0);
}

#[test]
fn test_queens_solution_is_valid() {
    let factory = BddFactory::default();
    let n = 5;
    let f = queens(&factory, n).unwrap();
    let model = f.any_sat().unwrap();
    let placed: Vec<(u32, u32)> = model
        .iter()
        .filter(|lit| lit.is_positive())
        .map(|lit| (lit.var().index() / n, lit.var().index() % n))
        .collect();
    assert_eq!(placed.len(), n as usize);
    for (a, &(i, j)) in placed.iter().enumerate() {
        for &(k, l) in &placed[a + 1..] {
            assert_ne!(i, k);
            assert_ne!(j, l);
            assert_ne!(i as i32 - k as i32, j as i32 - l as i32);
            assert_ne!(i as i32 - k as i32, l as i32 - j as i32);
        }
    }
}
