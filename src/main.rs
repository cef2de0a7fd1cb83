//! QD CLI - Run MAP-Elites experiments from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use quality_diversity::{
    domains::{ExperimentConfig, run_experiment},
    schema::Discretization,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <experiment.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Run a MAP-Elites experiment from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  experiment.json  Path to experiment configuration file");
        eprintln!("  generations      Override the configured generation count");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut config: ExperimentConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Some(generations) = args.get(2).and_then(|s| s.parse().ok()) {
        config.run.generations = generations;
    }

    println!("MAP-Elites Experiment");
    println!("=====================");
    println!("Domain: {:?}", config.domain);
    match &config.run.archive.discretization {
        Discretization::Grid { resolution } => println!("Archive: grid {:?}", resolution),
        Discretization::Cvt { centroids, .. } => println!("Archive: CVT ({} cells)", centroids),
    }
    println!(
        "Emitters: {}",
        config
            .run
            .emitters
            .iter()
            .map(|e| format!("{} ({}, batch {})", e.name, e.type_tag(), e.batch_size))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Generations: {}", config.run.generations);
    if let Some(dir) = &config.run.log.output_dir {
        println!("Output: {}", dir.display());
    }
    println!();

    println!("Running...");
    let print_rate = config.run.log.print_rate;
    let result = run_experiment(&config, |progress| {
        if progress.generation % print_rate == 0 {
            let added: usize = progress.pulses.iter().map(|p| p.successes()).sum();
            println!(
                "  Gen {}/{}: elites={}, coverage={:.2}%, qd={:.4}, max={:.4}, added={}",
                progress.generation,
                progress.total_generations,
                progress.stats.num_elites,
                progress.stats.coverage * 100.0,
                progress.stats.qd_score,
                progress.stats.obj_max.unwrap_or(f64::NAN),
                added
            );
        }
    });

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("Final archive:");
    println!("  Elites: {}", stats.archive.num_elites);
    println!("  Coverage: {:.2}%", stats.archive.coverage * 100.0);
    println!("  QD score: {:.4}", stats.archive.qd_score);
    println!(
        "  Objective: mean={:.4}, max={:.4}",
        stats.archive.obj_mean.unwrap_or(f64::NAN),
        stats.archive.obj_max.unwrap_or(f64::NAN)
    );
    if stats.restarts.iter().any(|&r| r > 0) {
        println!("  Restarts: {:?}", stats.restarts);
    }
    println!();
    println!(
        "Generations: {} ({:?})",
        stats.generations, stats.stop_reason
    );
    println!(
        "Time: {:.2}s ({:.1} evals/s)",
        stats.elapsed_seconds, stats.evaluations_per_second
    );
}

fn print_example_config() {
    let config = ExperimentConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example: {}", e),
    }
}
