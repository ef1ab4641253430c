#![allow(dead_code)]

use shared_bdd::{Bdd, BddError, BddFactory, Operator};

/// Xorshift64 generator; deterministic across runs and threads.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// A random formula over `num_vars` variables, built from `steps` random
/// binary operations.
pub fn random_formula(
    factory: &BddFactory,
    rng: &mut XorShift,
    num_vars: u32,
    steps: usize,
) -> Result<Bdd, BddError> {
    let mut pool: Vec<Bdd> = (0..num_vars)
        .map(|i| factory.var(i))
        .collect::<Result<_, _>>()?;
    for _ in 0..steps {
        let a = rng.below(pool.len() as u64) as usize;
        let b = rng.below(pool.len() as u64) as usize;
        let op = Operator::ALL[rng.below(Operator::ALL.len() as u64) as usize];
        let f = pool[a].apply(&pool[b], op)?;
        pool.push(f);
    }
    Ok(pool.pop().unwrap_or_else(|| factory.zero()))
}

/// N-queens: variable `i*n + j` means "a queen on (i, j)".
pub fn queens(factory: &BddFactory, n: u32) -> Result<Bdd, BddError> {
    let x: Vec<Vec<Bdd>> = (0..n)
        .map(|i| (0..n).map(|j| factory.var(i * n + j)).collect::<Result<Vec<_>, _>>())
        .collect::<Result<_, _>>()?;

    let mut queen = factory.one();
    for row in &x {
        let row: Vec<&Bdd> = row.iter().collect();
        queen.and_with(factory.or_all(&row)?)?;
    }

    let n = n as isize;
    for i in 0..n {
        for j in 0..n {
            let mut others = Vec::new();
            for k in 0..n {
                for l in 0..n {
                    if (k, l) == (i, j) {
                        continue;
                    }
                    let attacks = k == i || l == j || k - i == l - j || k - i == j - l;
                    if attacks {
                        others.push(&x[k as usize][l as usize]);
                    }
                }
            }
            let none = factory.or_all(&others)?.not()?;
            queen.and_with(x[i as usize][j as usize].imp(&none)?)?;
        }
    }
    Ok(queen)
}
