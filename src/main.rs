mod error;
mod exclusion;
mod logging;
mod partition;
mod reduce;
mod run;
mod task_queue;
mod types;
mod worker;

use std::num::NonZeroUsize;
use std::process;

use clap::{Parser, Subcommand};

use crate::exclusion::LockStrategy;

/// Producer/worker-pool task queue built on a mutex and a condition variable.
#[derive(Parser)]
#[command(name = "taskmill", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Worker thread count for the default pool run.
    #[arg(value_name = "WORKERS")]
    workers: Option<NonZeroUsize>,

    /// Number of tasks to submit.
    #[arg(long, default_value_t = 20)]
    tasks: usize,

    /// Simulated per-task processing time in milliseconds.
    #[arg(long, default_value_t = 5)]
    work_ms: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Single pool benchmark with CSV output.
    Bench {
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        tasks: Option<usize>,
        #[arg(long)]
        work_ms: Option<u64>,
        /// Record claimed task ids and report duplicates.
        #[arg(long)]
        validate: bool,
    },
    /// Sweep worker/task combinations, one CSV row each.
    Stress {
        /// Comma-separated worker counts.
        #[arg(long, value_delimiter = ',')]
        worker_sets: Option<Vec<usize>>,
        /// Comma-separated task counts.
        #[arg(long, value_delimiter = ',')]
        task_sets: Option<Vec<usize>>,
        #[arg(long)]
        work_ms: Option<u64>,
        #[arg(long)]
        validate: bool,
    },
    /// Trapezoid-rule reduction under a selected exclusion strategy.
    Reduce {
        #[arg(long, value_enum, default_value_t = LockStrategy::Mutex)]
        strategy: LockStrategy,
        #[arg(long, default_value_t = 4)]
        threads: usize,
        #[arg(long, default_value_t = reduce::DEFAULT_TRAPEZOIDS)]
        trapezoids: usize,
        /// Run every strategy on the same workload.
        #[arg(long)]
        compare: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    let outcome = match cli.command {
        Some(Command::Bench {
            workers,
            tasks,
            work_ms,
            validate,
        }) => run::run_benchmark(workers, tasks, work_ms, validate),
        Some(Command::Stress {
            worker_sets,
            task_sets,
            work_ms,
            validate,
        }) => run::run_stress(worker_sets, task_sets, work_ms, validate),
        Some(Command::Reduce {
            strategy,
            threads,
            trapezoids,
            compare,
        }) => reduce::run_reduce(strategy, threads, trapezoids, compare),
        None => match cli.workers {
            Some(workers) => run::run_pool(workers.get(), cli.tasks, cli.work_ms),
            None => {
                eprintln!("error: missing worker thread count (see --help)");
                process::exit(2);
            }
        },
    };

    if let Err(err) = outcome {
        eprintln!("taskmill: {err}");
        process::exit(1);
    }
}
