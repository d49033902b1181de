use std::{env, fs, path::PathBuf, process::ExitCode};

use schema_typegen::{
    generate_types, load_options, parse_snapshot, render_typescript_file, GenerationOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct GenerateOptions {
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    dates_as_strings: bool,
    no_runtime_wrapper: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    if args.len() < 3 {
        return Err("not enough arguments".to_string());
    }

    let command = args[1].as_str();
    let file = PathBuf::from(&args[2]);

    match command {
        "generate" => {
            let options = parse_generate_options(&args[3..])?;
            run_generate(&file, &options)
        }
        _ => Err(format!("unknown command '{command}'")),
    }
}

fn run_generate(file: &PathBuf, options: &GenerateOptions) -> Result<(), String> {
    let generation = resolve_generation_options(options)?;

    let input = fs::read_to_string(file)
        .map_err(|e| format!("failed to read '{}': {e}", file.display()))?;
    let snapshot = parse_snapshot(&input).map_err(|e| e.to_string())?;
    let set = generate_types(&snapshot, &generation).map_err(|e| e.to_string())?;
    for warning in &set.warnings {
        eprintln!("warning: {warning}");
    }

    let previous = match &options.output {
        Some(path) if path.exists() => Some(
            fs::read_to_string(path)
                .map_err(|e| format!("failed to read '{}': {e}", path.display()))?,
        ),
        _ => None,
    };
    let rendered = render_typescript_file(&set, previous.as_deref()).map_err(|e| e.to_string())?;

    match &options.output {
        Some(path) => {
            fs::write(path, &rendered).map_err(|e| format!("failed to write output: {e}"))?;
            eprintln!("wrote: {}", path.display());
            Ok(())
        }
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

/// Config file first, then flags; a flag can only switch an option on.
fn resolve_generation_options(options: &GenerateOptions) -> Result<GenerationOptions, String> {
    let mut generation = match &options.config {
        Some(path) => load_options(path)
            .map_err(|e| format!("failed to load config '{}': {e}", path.display()))?,
        None => GenerationOptions::default(),
    };
    generation.dates_as_strings |= options.dates_as_strings;
    generation.no_runtime_wrapper |= options.no_runtime_wrapper;
    Ok(generation)
}

fn parse_generate_options(args: &[String]) -> Result<GenerateOptions, String> {
    let mut options = GenerateOptions::default();
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                if i + 1 >= args.len() {
                    return Err("missing value for --output".to_string());
                }
                options.output = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    return Err("missing value for --config".to_string());
                }
                options.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--dates-as-strings" => {
                options.dates_as_strings = true;
                i += 1;
            }
            "--no-runtime-wrapper" => {
                options.no_runtime_wrapper = true;
                i += 1;
            }
            other => return Err(format!("unknown option '{other}'")),
        }
    }
    Ok(options)
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!(
        "  schema-typegen generate <snapshot.json> [--output <file.ts>] [--config <options.json>] [--dates-as-strings] [--no-runtime-wrapper]"
    );
    eprintln!();
    eprintln!("generate options:");
    eprintln!("  --output <file>        write to <file>, keeping its custom-types region");
    eprintln!("  --config <file>        JSON options file ({{\"datesAsStrings\": true, ...}})");
    eprintln!("  --dates-as-strings     emit Date fields as string");
    eprintln!("  --no-runtime-wrapper   emit lean types only, with identifiers as string");
    eprintln!();
    eprintln!("logging: set RUST_LOG (for example RUST_LOG=schema_typegen=debug).");
}
