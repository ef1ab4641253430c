mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use num_bigint::BigUint;
use shared_bdd::{Bdd, BddConfig, BddFactory, Var};
use test_log::test;

use common::{queens, random_formula, XorShift};

const THREADS: u64 = 4;
const FORMULAS: usize = 25;
const NUM_VARS: u32 = 12;

type Summary = (BigUint, BigUint, usize);

fn summarize(f: &Bdd) -> Summary {
    (
        f.sat_count_max(Var::new(NUM_VARS - 1)).unwrap(),
        f.path_count().unwrap(),
        f.node_count().unwrap(),
    )
}

fn workload(factory: &BddFactory, seed: u64) -> Vec<Summary> {
    let mut rng = XorShift::new(seed);
    (0..FORMULAS)
        .map(|_| {
            let f = random_formula(factory, &mut rng, NUM_VARS, 25).unwrap();
            summarize(&f)
        })
        .collect()
}

#[test]
fn test_parallel_workload_matches_sequential() {
    let reference = BddFactory::default();
    let expected: Vec<Vec<Summary>> = (0..THREADS).map(|t| workload(&reference, 1000 + t)).collect();

    let factory = BddFactory::with_config(
        BddConfig::default()
            .with_table_size(512)
            .with_cache_size(256)
            .with_parallel_mark_threshold(8),
    );
    let stop = Arc::new(AtomicBool::new(false));

    let collector = {
        let factory = factory.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                factory.collect_garbage();
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let factory = factory.clone();
            thread::spawn(move || workload(&factory, 1000 + t))
        })
        .collect();
    let actual: Vec<Vec<Summary>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    stop.store(true, Ordering::Relaxed);
    collector.join().unwrap();

    assert_eq!(actual, expected);
    factory.check_integrity().unwrap();
}

#[test]
fn test_same_function_built_on_many_threads_is_one_node() {
    let factory = BddFactory::default();
    let handles: Vec<Bdd> = (0..THREADS)
        .map(|_| {
            let factory = factory.clone();
            thread::spawn(move || queens(&factory, 5).unwrap())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|t| t.join().unwrap())
        .collect();

    for h in &handles[1..] {
        assert_eq!(h, &handles[0]);
        assert_eq!(h.id().unwrap(), handles[0].id().unwrap());
    }
    assert_eq!(handles[0].sat_count_max(Var::new(24)).unwrap(), BigUint::from(10u32));
}

#[test]
fn test_handles_cross_threads() {
    let factory = BddFactory::new(256, 64);
    let x = factory.var(0).unwrap();
    let y = factory.var(1).unwrap();

    let worker = {
        let x = x.clone();
        thread::spawn(move || {
            let z = x.xor(&y).unwrap();
            (z, y)
        })
    };
    let (z, y) = worker.join().unwrap();

    assert_eq!(z, x.xor(&y).unwrap());
    assert_eq!(z.sat_count().unwrap(), BigUint::from(2u32));
}

#[test]
fn test_concurrent_frees_and_collections() {
    let factory = BddFactory::with_config(BddConfig::default().with_table_size(256).with_cache_size(64));
    let keep = factory.var(3).unwrap().and(&factory.var(7).unwrap()).unwrap();
    let expected = keep.sat_count_max(Var::new(NUM_VARS - 1)).unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let factory = &factory;
            s.spawn(move || {
                let mut rng = XorShift::new(77 + t);
                for i in 0..40 {
                    let f = random_formula(factory, &mut rng, NUM_VARS, 10).unwrap();
                    if i % 2 == 0 {
                        f.free();
                    }
                    if i % 8 == 0 {
                        factory.collect_garbage();
                    }
                }
            });
        }
    });

    assert_eq!(keep.sat_count_max(Var::new(NUM_VARS - 1)).unwrap(), expected);
    factory.collect_garbage();
    factory.check_integrity().unwrap();
}
