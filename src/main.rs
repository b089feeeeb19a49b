use async_tasks::{Config, ThreadPool};
use std::time::Instant;
use tracing_subscriber::EnvFilter;


fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let now = Instant::now();
    let pool = ThreadPool::with_config(Config::cpu_bound())?;

    for i in 0..500_000u64 {
        pool.execute(move || {
            let _a = i;
        })?;
    }

    let handles = (0..1_000u64)
        .map(|i| pool.submit(move || (0..i).sum::<u64>()))
        .collect::<Result<Vec<_>, _>>()?;
    let total: u64 = handles
        .iter()
        .map(|h| h.get())
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .sum();

    pool.shutdown();
    println!("sum: {total}");
    println!("metrics: {:?}", pool.metrics());
    println!("elapsed: {:?}", now.elapsed());
    Ok(())
}
