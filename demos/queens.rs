use clap::Parser;

use shared_bdd::{Bdd, BddConfig, BddFactory, GcEvent, GcListener, Var};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of queens.
    #[arg(value_name = "INT", default_value = "8")]
    n: u32,

    /// Initial table size (in bits, so the actual size is `2^size` nodes).
    #[clap(long, value_name = "INT", default_value = "16")]
    size: u32,

    /// Cache size (in bits).
    #[clap(long, value_name = "INT", default_value = "14")]
    cache: u32,

    /// Run an explicit garbage collection before counting.
    #[clap(long)]
    gc: bool,
}

struct GcLogger;

impl GcListener for GcLogger {
    fn on_stop(&self, event: &GcEvent) {
        log::info!(
            "GC #{}: {}/{} free, took {:?} (total {:?})",
            event.seq,
            event.free,
            event.size,
            event.elapsed.unwrap_or_default(),
            event.total
        );
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let factory = BddFactory::with_config(
        BddConfig::default()
            .with_table_size(1 << args.size)
            .with_cache_size(1 << args.cache),
    );
    factory.add_gc_listener(std::sync::Arc::new(GcLogger));
    println!("factory = {:?}", factory);

    // Encode N-queens problem:
    // - variable `i*n + j` is "a queen stands on (i, j)"
    // - at least one queen per row
    // - a queen on (i, j) excludes every other cell of its row, column, and diagonals
    let n = args.n;
    println!("Encoding n-queens problem with n = {}", n);
    let x: Vec<Vec<Bdd>> = (0..n)
        .map(|i| (0..n).map(|j| factory.var(i * n + j)).collect::<Result<Vec<_>, _>>())
        .collect::<Result<_, _>>()?;

    let mut queen = factory.one();

    for row in &x {
        let row: Vec<&Bdd> = row.iter().collect();
        queen.and_with(factory.or_all(&row)?)?;
    }

    for i in 0..n as usize {
        for j in 0..n as usize {
            let mut others = Vec::new();
            for k in 0..n as usize {
                if k != j {
                    others.push(&x[i][k]);
                }
                if k != i {
                    others.push(&x[k][j]);
                }
                let d = k as isize - i as isize;
                if d != 0 {
                    let (l1, l2) = (j as isize + d, j as isize - d);
                    if (0..n as isize).contains(&l1) {
                        others.push(&x[k][l1 as usize]);
                    }
                    if (0..n as isize).contains(&l2) {
                        others.push(&x[k][l2 as usize]);
                    }
                }
            }
            let none = factory.or_all(&others)?.not()?;
            queen.and_with(x[i][j].imp(&none)?)?;
        }
    }
    println!("factory = {:?}", factory);

    if args.gc {
        println!("GC...");
        factory.collect_garbage();
        println!("factory = {:?}", factory);
    }

    let max_var = Var::new(n * n - 1);
    println!("res of size {}", queen.node_count()?);
    println!("solutions: {}", queen.sat_count_max(max_var)?);
    if let Ok(model) = queen.any_sat() {
        let placed: Vec<String> = model
            .iter()
            .filter(|lit| lit.is_positive())
            .map(|lit| {
                let v = lit.var().index();
                format!("({}, {})", v / n, v % n)
            })
            .collect();
        println!("one solution: {}", placed.join(" "));
    }

    println!("cache hits: {}", factory.cache_hits());
    println!("cache misses: {}", factory.cache_misses());

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
