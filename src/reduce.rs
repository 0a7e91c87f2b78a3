//! Trapezoid-rule reduction comparing mutual-exclusion strategies.
//!
//! Each thread integrates its partition of the interval locally and merges
//! the partial sum into a [`GuardedSum`] once, so the critical section stays
//! a single addition regardless of problem size.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::error::PoolError;
use crate::exclusion::{GuardedSum, LockStrategy};
use crate::partition::partition;

// Reference workload: integrate x^2 over [0, 3], exact value 9.
const LOWER: f64 = 0.0;
const UPPER: f64 = 3.0;
/// Default trapezoid count of the reference workload.
pub const DEFAULT_TRAPEZOIDS: usize = 1024;

fn f(x: f64) -> f64 {
    x * x
}

/// Trapezoid-rule estimate over `count` trapezoids of width `base`.
fn trapezoid(left: f64, right: f64, count: usize, base: f64) -> f64 {
    let mut estimate = (f(left) + f(right)) / 2.0;
    for i in 1..count {
        estimate += f(left + i as f64 * base);
    }
    estimate * base
}

/// Result of one reduction run.
#[derive(Debug)]
pub struct ReduceResult {
    pub strategy: LockStrategy,
    pub threads: usize,
    pub trapezoids: usize,
    pub total: f64,
    pub elapsed_us: u128,
}

/// Integrate the reference workload across `threads` threads, merging
/// partial sums under `strategy`.
pub fn integrate(
    strategy: LockStrategy,
    threads: usize,
    trapezoids: usize,
) -> Result<ReduceResult, PoolError> {
    debug_assert!(threads > 0, "threads must be > 0");
    let sum = Arc::new(GuardedSum::new(strategy));
    let base = (UPPER - LOWER) / trapezoids as f64;

    let start = Instant::now();
    let mut handles = Vec::with_capacity(threads);
    for index in 0..threads {
        let name = format!("reduce-{index}");
        let sum = Arc::clone(&sum);
        let range = partition(trapezoids, threads, index);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if range.is_empty() {
                    return;
                }
                let local_left = LOWER + range.start as f64 * base;
                let local_right = LOWER + range.end as f64 * base;
                let local = trapezoid(local_left, local_right, range.len(), base);
                sum.add(local);
            })
            .map_err(|source| PoolError::Spawn { name, source })?;
        handles.push(handle);
    }
    for (index, handle) in handles.into_iter().enumerate() {
        handle.join().map_err(|_| PoolError::WorkerPanicked {
            name: format!("reduce-{index}"),
        })?;
    }
    let elapsed_us = start.elapsed().as_micros();

    Ok(ReduceResult {
        strategy,
        threads,
        trapezoids,
        total: sum.value(),
        elapsed_us,
    })
}

const REDUCE_HEADER: &str = "strategy,threads,trapezoids,total,elapsed_us";

fn print_reduce_row(result: &ReduceResult) {
    println!(
        "{},{},{},{:.6},{}",
        result.strategy.name(),
        result.threads,
        result.trapezoids,
        result.total,
        result.elapsed_us
    );
}

/// Run the reduction under one strategy, or all of them with `compare`.
pub fn run_reduce(
    strategy: LockStrategy,
    threads: usize,
    trapezoids: usize,
    compare: bool,
) -> Result<(), PoolError> {
    if threads == 0 {
        eprintln!("reduce error: threads must be > 0");
        return Ok(());
    }
    if trapezoids == 0 {
        eprintln!("reduce error: trapezoids must be > 0");
        return Ok(());
    }

    println!("{REDUCE_HEADER}");
    if compare {
        for strategy in LockStrategy::ALL {
            let result = integrate(strategy, threads, trapezoids)?;
            print_reduce_row(&result);
        }
    } else {
        let result = integrate(strategy, threads, trapezoids)?;
        print_reduce_row(&result);
    }
    Ok(())
}
