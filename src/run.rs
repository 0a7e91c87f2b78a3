//! Producer/orchestrator plus benchmark and stress runners.
//!
//! The producer is the calling thread: it feeds the queue (signalling once
//! per task), sets shutdown (broadcast) after the last push, and joins the
//! pool. The last push happens-before the shutdown because both run on the
//! same thread.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::PoolError;
use crate::task_queue::WorkQueue;
use crate::types::Task;
use crate::worker::{PoolReport, WorkerConfig, WorkerPool, WorkerStatus};

/// Parameters for one pool run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub workers: usize,
    pub tasks: usize,
    pub work: Duration,
    pub record_claims: bool,
}

/// Outcome of one pool run, collected after every worker joined.
#[derive(Debug)]
pub struct RunSummary {
    pub workers: usize,
    pub submitted: usize,
    pub report: PoolReport,
    /// Tasks still queued after join; nonzero only if the pool had no workers.
    pub leftover: usize,
    pub elapsed: Duration,
}

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    use libc::{RUSAGE_SELF, getrusage, rusage};
    let mut usage = rusage {
        ru_utime: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        ru_stime: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        ru_maxrss: 0,
        ru_ixrss: 0,
        ru_idrss: 0,
        ru_isrss: 0,
        ru_minflt: 0,
        ru_majflt: 0,
        ru_nswap: 0,
        ru_inblock: 0,
        ru_oublock: 0,
        ru_msgsnd: 0,
        ru_msgrcv: 0,
        ru_nsignals: 0,
        ru_nvcsw: 0,
        ru_nivcsw: 0,
    };
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Spawn the pool, submit every task, request shutdown, join.
pub fn execute(config: &RunConfig) -> Result<RunSummary, PoolError> {
    let queue = Arc::new(WorkQueue::new());
    let worker_config = WorkerConfig {
        work: config.work,
        record_claims: config.record_claims,
    };
    let start = Instant::now();
    let pool = WorkerPool::spawn(config.workers, Arc::clone(&queue), worker_config)?;

    for id in 1..=config.tasks as u64 {
        queue
            .push(Task::new(id, format!("task-{id}")))
            .map_err(|task| PoolError::QueueClosed { id: task.id })?;
        info!("submitted task {id}");
    }
    queue.shutdown();

    let report = pool.join()?;
    let elapsed = start.elapsed();

    // Anything still queued at this point was never claimable.
    let mut leftover = 0usize;
    while queue.try_pop().is_some() {
        leftover += 1;
    }
    debug_assert!(queue.is_empty());

    Ok(RunSummary {
        workers: config.workers,
        submitted: config.tasks,
        report,
        leftover,
        elapsed,
    })
}

/// Default mode: run the pool and print a human-readable summary.
pub fn run_pool(workers: usize, tasks: usize, work_ms: u64) -> Result<(), PoolError> {
    let config = RunConfig {
        workers,
        tasks,
        work: Duration::from_millis(work_ms),
        record_claims: false,
    };
    let summary = execute(&config)?;

    println!("POOL SUMMARY");
    println!(
        "workers={} tasks_submitted={} tasks_claimed={}",
        summary.workers,
        summary.submitted,
        summary.report.total_claimed()
    );
    println!(
        "claimed_per_worker={:?}",
        summary.report.claimed_per_worker
    );
    let exited = summary
        .report
        .statuses
        .iter()
        .filter(|&&status| status == WorkerStatus::Exited)
        .count();
    println!("workers_exited={exited}");
    println!("elapsed_ms={}", summary.elapsed.as_millis());
    println!("all tasks completed");
    Ok(())
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    workers: usize,
    tasks: usize,
    total_claimed: usize,
    elapsed_ms: f64,
    throughput: f64,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    leftover: usize,
    duplicate_claims: bool,
}

fn benchmark_once(
    workers: usize,
    tasks: usize,
    work_ms: u64,
    validate: bool,
) -> Result<BenchResult, PoolError> {
    let config = RunConfig {
        workers,
        tasks,
        work: Duration::from_millis(work_ms),
        record_claims: validate,
    };
    let cpu_start = cpu_times_seconds();
    let summary = execute(&config)?;
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    let duplicate_claims = if validate {
        let unique: HashSet<_> = summary.report.claims.iter().copied().collect();
        unique.len() != summary.report.claims.len()
    } else {
        false
    };

    let elapsed_ms = summary.elapsed.as_millis() as f64;
    let throughput = if elapsed_ms > 0.0 {
        summary.report.total_claimed() as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };

    Ok(BenchResult {
        workers,
        tasks,
        total_claimed: summary.report.total_claimed(),
        elapsed_ms,
        throughput,
        cpu_user_s,
        cpu_sys_s,
        leftover: summary.leftover,
        duplicate_claims,
    })
}

const BENCH_HEADER: &str =
    "workers,tasks,total_claimed,elapsed_ms,throughput_tasks_per_s,cpu_user_s,cpu_sys_s,duplicate_claims";

fn print_bench_row(result: &BenchResult) {
    let cpu_user = result
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = result
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    println!(
        "{},{},{},{:.2},{:.2},{},{},{}",
        result.workers,
        result.tasks,
        result.total_claimed,
        result.elapsed_ms,
        result.throughput,
        cpu_user,
        cpu_sys,
        result.duplicate_claims
    );
    if result.leftover > 0 {
        eprintln!("# warning,leftover_tasks,{}", result.leftover);
    }
    if result.duplicate_claims {
        eprintln!("# violation,duplicate_claims");
    }
}

/// Run a single benchmark with optional parameter overrides, CSV output.
pub fn run_benchmark(
    workers: Option<usize>,
    tasks: Option<usize>,
    work_ms: Option<u64>,
    validate: bool,
) -> Result<(), PoolError> {
    let workers = workers.unwrap_or(4);
    let tasks = tasks.unwrap_or(20);
    let work_ms = work_ms.unwrap_or(5);
    if workers == 0 {
        eprintln!("benchmark error: workers must be > 0");
        return Ok(());
    }

    let result = benchmark_once(workers, tasks, work_ms, validate)?;
    println!("{BENCH_HEADER}");
    print_bench_row(&result);
    Ok(())
}

/// Sweep multiple configurations and print one CSV row per combination.
pub fn run_stress(
    worker_sets: Option<Vec<usize>>,
    task_sets: Option<Vec<usize>>,
    work_ms: Option<u64>,
    validate: bool,
) -> Result<(), PoolError> {
    let default_worker_sets = [1usize, 2, 4, 8];
    let default_task_sets = [20usize, 100, 500];
    let work_ms = work_ms.unwrap_or(5);

    let worker_sets = worker_sets.unwrap_or_else(|| default_worker_sets.to_vec());
    let task_sets = task_sets.unwrap_or_else(|| default_task_sets.to_vec());
    if worker_sets.iter().any(|&workers| workers == 0) {
        eprintln!("stress error: worker sets must be > 0");
        return Ok(());
    }

    println!("{BENCH_HEADER}");
    for workers in worker_sets {
        for tasks in task_sets.iter().copied() {
            let result = benchmark_once(workers, tasks, work_ms, validate)?;
            print_bench_row(&result);
        }
    }
    Ok(())
}
