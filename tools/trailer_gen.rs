/// Trailer Generator — trains on a corpus and prints one generated trailer.
///
/// Usage: trailer_gen --corpus <file.json> [--scenes <5-100>] [--seed <n>]
///                    [--config <file.ron>] [--output <file>] [--json]
use std::env;
use std::process;

use trailer_engine::core::pipeline::TrailerEngine;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: trailer_gen --corpus <file.json> [--scenes <5-100>] [--seed <n>] [--config <file.ron>] [--output <file>] [--json]";

const MIN_SCENES: usize = 5;
const MAX_SCENES: usize = 100;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut corpus = None;
    let mut config = None;
    let mut output = None;
    let mut scenes = 10usize;
    let mut seed = 42u64;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--corpus" if i + 1 < args.len() => {
                i += 1;
                corpus = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config = Some(args[i].clone());
            }
            "--output" if i + 1 < args.len() => {
                i += 1;
                output = Some(args[i].clone());
            }
            "--scenes" if i + 1 < args.len() => {
                i += 1;
                scenes = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --scenes must be an integer");
                    process::exit(1);
                });
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --seed must be an unsigned integer");
                    process::exit(1);
                });
            }
            "--json" => json = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{}", USAGE);
                process::exit(1);
            }
        }
        i += 1;
    }

    let corpus_path = corpus.unwrap_or_else(|| {
        eprintln!("Error: --corpus is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    if !(MIN_SCENES..=MAX_SCENES).contains(&scenes) {
        eprintln!(
            "Error: --scenes must be between {} and {}",
            MIN_SCENES, MAX_SCENES
        );
        process::exit(1);
    }

    let mut builder = TrailerEngine::builder().seed(seed).corpus_path(&corpus_path);
    if let Some(ref path) = config {
        builder = builder.config_path(path);
    }

    let mut engine = builder.build().unwrap_or_else(|e| {
        eprintln!("Error training on '{}': {}", corpus_path, e);
        process::exit(1);
    });

    let trailer = engine.generate(scenes).unwrap_or_else(|e| {
        eprintln!("Error generating trailer: {}", e);
        process::exit(1);
    });

    if let Some(ref reason) = trailer.halted {
        eprintln!(
            "Warning: generation stopped after {} of {} scenes: {}",
            trailer.len(),
            scenes,
            reason
        );
    }

    let rendered = if json {
        serde_json::to_string_pretty(&trailer).unwrap_or_else(|e| {
            eprintln!("Error serializing trailer: {}", e);
            process::exit(1);
        })
    } else {
        trailer.lines().join("\n")
    };

    match output {
        Some(ref path) => {
            std::fs::write(path, format!("{}\n", rendered)).unwrap_or_else(|e| {
                eprintln!("Error writing '{}': {}", path, e);
                process::exit(1);
            });
            println!("Trailer saved to '{}'", path);
        }
        None => println!("{}", rendered),
    }
}
