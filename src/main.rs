//! inferflow CLI Entry Point
//!
//! Compiles draft workflows into CWL.
//!
//! # Usage
//!
//! ```bash
//! # Compile a draft into ./autogenerated
//! inferflow pipeline.yml
//!
//! # Several drafts on 8 workers, custom output directory
//! inferflow drafts/*.yml --parallel 8 --out build/cwl
//!
//! # CI mode: classify outcomes against the inference policy
//! inferflow drafts/*.yml --ci --policy inference_policy.yml
//!
//! # Weekly tier: include workflows deferred to the weekly run
//! inferflow drafts/*.yml --ci --weekly
//!
//! # Explicit edges only, plus a labelled Graphviz drawing
//! inferflow pipeline.yml --inference_disable --graphviz --graph_label_edges
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};

use inferflow::ci::{self, Tier, Verdict};
use inferflow::compiler::{self, CompileOutcome, Compiler};
use inferflow::config::CompilerConfig;
use inferflow::error::InferenceError;
use inferflow::isomorphism::SignatureCache;
use inferflow::policy::InferencePolicy;
use inferflow::workflow::{write_to_disk, CwlEmitter, DotEmitter, SearchPathLoader};
use inferflow::{APP_NAME, VERSION};

/// Config file read when `--config` is not given.
const DEFAULT_CONFIG: &str = "global_config.json";

/// Output directory used when `--out` is not given.
const DEFAULT_OUT_DIR: &str = "autogenerated";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    drafts: Vec<PathBuf>,
    config_path: PathBuf,
    policy_path: Option<PathBuf>,
    out_dir: PathBuf,
    ci: bool,
    weekly: bool,
    parallel: Option<usize>,
    inference_disable: bool,
    graphviz: bool,
    graph_label_edges: bool,
    graph_show_inputs: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drafts: Vec::new(),
            config_path: PathBuf::from(DEFAULT_CONFIG),
            policy_path: None,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            ci: false,
            weekly: false,
            parallel: None,
            inference_disable: false,
            graphviz: false,
            graph_label_edges: false,
            graph_show_inputs: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Workflow Inference Compiler");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: inferflow [OPTIONS] <DRAFT>...");
    println!();
    println!("Arguments:");
    println!("  <DRAFT>...          Draft workflow YAML files");
    println!();
    println!("Options:");
    println!("  --config PATH       Compiler config (default: {})", DEFAULT_CONFIG);
    println!("  --policy PATH       Inference policy, overrides the config's policy_file");
    println!("  --out DIR           Output directory (default: {})", DEFAULT_OUT_DIR);
    println!("  --ci                Classify outcomes against the inference policy");
    println!("  --weekly            Include workflows of the weekly test tier");
    println!("  --parallel N        Worker threads (default: CPU count)");
    println!("  --inference_disable Use explicit edges only");
    println!("  --graphviz          Also write a Graphviz DOT drawing (<id>.gv)");
    println!("  --graph_label_edges Label drawn edges with their port names");
    println!("  --graph_show_inputs Draw top-level inputs");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  inferflow pipeline.yml");
    println!("  inferflow drafts/*.yml --parallel 8 --out build/cwl");
    println!("  inferflow drafts/*.yml --ci --policy inference_policy.yml");
}

/// Returns the value following an option.
fn option_value<'a>(args: &'a [String], i: &mut usize, name: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", name))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => config.verbose = true,
            "--ci" => config.ci = true,
            "--weekly" => config.weekly = true,
            "--inference_disable" => config.inference_disable = true,
            "--graphviz" => config.graphviz = true,
            "--graph_label_edges" => config.graph_label_edges = true,
            "--graph_show_inputs" => config.graph_show_inputs = true,
            "--config" => {
                config.config_path = PathBuf::from(option_value(args, &mut i, "--config")?);
            }
            "--policy" => {
                config.policy_path = Some(PathBuf::from(option_value(args, &mut i, "--policy")?));
            }
            "--out" => {
                config.out_dir = PathBuf::from(option_value(args, &mut i, "--out")?);
            }
            "--parallel" => {
                let value = option_value(args, &mut i, "--parallel")?;
                let workers: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid parallel value: {}", value))?;
                if workers == 0 {
                    return Err("--parallel must be at least 1".to_string());
                }
                config.parallel = Some(workers);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => config.drafts.push(PathBuf::from(arg)),
        }
        i += 1;
    }

    if config.drafts.is_empty() {
        return Err("No draft files given".to_string());
    }

    Ok(config)
}

fn print_verdict(id: &str, verdict: Verdict, detail: &str) {
    let label = match verdict {
        Verdict::Passed => verdict.to_string().green(),
        Verdict::ExpectedFailure => verdict.to_string().yellow(),
        Verdict::UnexpectedSuccess | Verdict::Failed => verdict.to_string().red().bold(),
    };
    println!("  {:<20} {} {}", label, id, detail.dimmed());
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let mut compiler_config = CompilerConfig::load_or_default(&config.config_path)?;
    if config.inference_disable {
        info!("Inference disabled: explicit edges only");
        compiler_config.disable_inference = true;
    }

    let policy = match config.policy_path.as_ref().or(compiler_config.policy_file.as_ref()) {
        Some(path) => InferencePolicy::load(path)?,
        None => InferencePolicy::default(),
    };

    let loader = SearchPathLoader::new(compiler_config.search_paths.clone());
    let mut compiler = Compiler::new(&compiler_config, &policy, SignatureCache::global(), &loader)?;
    if let Some(workers) = config.parallel {
        compiler.set_workers(workers);
    }

    let tier = if config.weekly { Tier::Weekly } else { Tier::Regular };
    if config.ci {
        info!("Mode: CI ({:?} tier)", tier);
    }

    let mut selected = Vec::new();
    for path in &config.drafts {
        let id = compiler::workflow_id(path);
        if config.ci && !ci::plan(&policy, &id, tier).compile {
            info!("Skipping '{}' (weekly tier only)", id);
            continue;
        }
        selected.push(path.clone());
    }

    info!(
        "Compiling {} drafts into {}",
        selected.len(),
        config.out_dir.display()
    );
    println!();

    let emitter = CwlEmitter::default();
    let drawing = config.graphviz.then(|| {
        DotEmitter::new()
            .with_edge_labels(config.graph_label_edges)
            .with_inputs(config.graph_show_inputs)
    });
    let results = compiler.compile_files(&selected);

    let mut verdicts = Vec::with_capacity(results.len());
    let mut failures = 0;

    for (path, result) in selected.iter().zip(results) {
        let id = match &result {
            Ok(outcome) => outcome.id.clone(),
            Err(_) => compiler::workflow_id(path),
        };
        let written: Result<(CompileOutcome, PathBuf), InferenceError> = result.and_then(|outcome| {
            let file = write_to_disk(&emitter, &outcome.graph, &config.out_dir)?;
            if let Some(drawing) = &drawing {
                write_to_disk(drawing, &outcome.graph, &config.out_dir)?;
            }
            Ok((outcome, file))
        });

        let detail = match &written {
            Ok((outcome, file)) => format!("{} ({})", file.display(), outcome.duplicate),
            Err(e) => e.to_string(),
        };

        if config.ci {
            let verdict = ci::classify_result(&policy, &id, &written);
            print_verdict(&id, verdict, &detail);
            if verdict == Verdict::UnexpectedSuccess {
                warn!("'{}' is listed as a partial failure but compiled", id);
            }
            if written.is_ok() && !ci::plan(&policy, &id, tier).execute {
                info!("'{}' is blacklisted and will not be executed", id);
            }
            verdicts.push(verdict);
        } else {
            match &written {
                Ok(_) => println!("  {} {} {}", "OK".green(), id, detail.dimmed()),
                Err(e) => {
                    error!("Failed to compile '{}': {}", id, e);
                    failures += 1;
                }
            }
        }
    }

    println!();

    if config.ci {
        let passing = verdicts.iter().filter(|v| v.is_passing()).count();
        info!("{} of {} workflows passed", passing, verdicts.len());
        if ci::exit_code(&verdicts) != 0 {
            return Err(format!("{} workflows did not pass", verdicts.len() - passing).into());
        }
    } else if failures > 0 {
        return Err(format!("{} of {} drafts failed to compile", failures, selected.len()).into());
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("inferflow")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse_arguments(&args(&["pipeline.yml"])).unwrap();
        assert_eq!(config.drafts, vec![PathBuf::from("pipeline.yml")]);
        assert_eq!(config.config_path, PathBuf::from(DEFAULT_CONFIG));
        assert_eq!(config.out_dir, PathBuf::from(DEFAULT_OUT_DIR));
        assert!(!config.ci);
        assert!(config.parallel.is_none());
        assert!(!config.inference_disable && !config.graphviz);
    }

    #[test]
    fn test_parse_all_options() {
        let config = parse_arguments(&args(&[
            "a.yml", "--ci", "--weekly", "--parallel", "3", "--policy", "p.yml", "--out", "build",
            "--config", "c.json", "b.yml", "-v",
        ]))
        .unwrap();
        assert_eq!(config.drafts.len(), 2);
        assert!(config.ci && config.weekly && config.verbose);
        assert_eq!(config.parallel, Some(3));
        assert_eq!(config.policy_path, Some(PathBuf::from("p.yml")));
        assert_eq!(config.out_dir, PathBuf::from("build"));
        assert_eq!(config.config_path, PathBuf::from("c.json"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&[])).is_err());
        assert!(parse_arguments(&args(&["a.yml", "--parallel"])).is_err());
        assert!(parse_arguments(&args(&["a.yml", "--parallel", "0"])).is_err());
        assert!(parse_arguments(&args(&["a.yml", "--frobnicate"])).is_err());
    }

    #[test]
    fn test_parse_inference_and_graph_flags() {
        let config = parse_arguments(&args(&[
            "a.yml",
            "--inference_disable",
            "--graphviz",
            "--graph_label_edges",
            "--graph_show_inputs",
        ]))
        .unwrap();
        assert!(config.inference_disable);
        assert!(config.graphviz && config.graph_label_edges && config.graph_show_inputs);
        assert_eq!(config.drafts, vec![PathBuf::from("a.yml")]);
    }

    #[test]
    fn test_policy_id_is_file_stem() {
        assert_eq!(
            compiler::workflow_id(std::path::Path::new("drafts/append_twice.yml")),
            "append_twice"
        );
    }
}
