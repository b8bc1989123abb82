use clap::Parser;
use kagami::compare::Outcome;
use kagami::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Reference interpreter for JDM decision graphs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JDM graph JSON file
    graph_path: Option<String>,
    /// Path to the records JSON file (array of objects, or one object per line)
    records_path: Option<String>,
    /// Optional path to recorded oracle outputs to compare against
    oracle_path: Option<String>,

    /// Evaluate records in parallel
    #[arg(short, long)]
    parallel: bool,

    /// Print an execution trace for the first record
    #[arg(short, long)]
    trace: bool,

    /// Save the compiled plan to this path
    #[arg(long)]
    save_plan: Option<String>,

    /// Fail when a node is reachable under conflicting switch branches
    #[arg(long)]
    strict_guards: bool,

    /// Run in interactive mode to be prompted for inputs
    #[arg(short = 'i', long, help = "Run in interactive 'human' mode")]
    human: bool,
}

struct RunOptions {
    graph_path: String,
    records_path: String,
    oracle_path: Option<String>,
    parallelism: Parallelism,
    trace: bool,
    save_plan: Option<String>,
    strict_guards: bool,
}

fn main() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("Warning: could not install log subscriber: {}", e);
    }

    let cli = Cli::parse();
    let options = if cli.human {
        interactive_options()
    } else {
        non_interactive_options(cli)
    };
    run(options);
}

fn run(options: RunOptions) {
    let total_start = Instant::now();

    // --- 1. File Loading ---
    let load_start = Instant::now();
    let records = RecordSet::from_file(&options.records_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to load records from '{}': {}",
            options.records_path, e
        ))
    });
    let load_duration = load_start.elapsed();

    // --- 2. Plan Construction ---
    let compile_start = Instant::now();
    println!("\nCompiling graph '{}'...", options.graph_path);
    let json = fs::read_to_string(&options.graph_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read graph file '{}': {}",
            options.graph_path, e
        ))
    });
    let document = JdmDocument::from_json(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse graph: {}", e)));
    let plan = Compiler::builder(document)
        .strict_guards(options.strict_guards)
        .build()
        .compile()
        .unwrap_or_else(|e| exit_with_error(&format!("Graph is not buildable: {}", e)));
    let compile_duration = compile_start.elapsed();
    println!(
        "Plan ready! {} steps over {} nodes in {:?}",
        plan.entries().len(),
        plan.node_count(),
        compile_duration
    );
    for node_id in plan.ambiguous_guards() {
        println!("  -> Warning: node '{}' is reachable under conflicting branches", node_id);
    }

    if let Some(path) = &options.save_plan {
        plan.save(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save plan: {}", e)));
        println!("Plan saved to '{}'", path);
    }

    if options.trace {
        if let Some(first) = records.records().first() {
            let (_, trace) = plan.evaluate_traced(first);
            println!("\n--- Trace (record 0) ---");
            print!("{}", TraceFormatter::format_trace(&trace));
        }
    }

    // --- 3. Evaluation ---
    println!("\nEvaluating {} records ({:?})...", records.len(), options.parallelism);
    let evaluator = Evaluator::new(plan.clone()).with_parallelism(options.parallelism);
    let eval_start = Instant::now();
    let outcomes = evaluator.eval_batch(records.records());
    let eval_duration = eval_start.elapsed();

    let failures: Vec<_> = outcomes
        .iter()
        .enumerate()
        .filter_map(|(index, outcome)| outcome.as_ref().err().map(|failure| (index, failure)))
        .collect();
    println!("\nEvaluation Finished!");
    if let Some(Ok(output)) = outcomes.first() {
        println!("  -> Record 0: {}", output);
    }
    println!("  -> Failed records: {}", failures.len());
    if let Some((index, failure)) = failures.first() {
        println!("  -> First failure (record {}): {}", index, failure);
    }

    // --- 4. Comparison ---
    let mut comparison = None;
    if let Some(path) = &options.oracle_path {
        let oracle = RecordedOracle::from_file(records.records(), path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load oracle outputs '{}': {}", path, e))
        });
        let report = compare(&plan, &oracle, records.records());
        println!("\n--- Comparison ---");
        match &report.first_mismatch {
            None => println!("  -> All {} records match", report.records),
            Some(mismatch) => {
                println!(
                    "  -> {} mismatching records, first at index {}",
                    report.mismatches, mismatch.index
                );
                println!("     interpreter: {}", describe(&mismatch.interpreter));
                println!("     oracle:      {}", describe(&mismatch.oracle));
            }
        }
        comparison = Some(report);
    }

    // --- 5. Summary ---
    let total_duration = total_start.elapsed();
    println!("\n--- Dataset Summary ---");
    println!("Records:              {}", records.len());
    println!("Planned Steps:        {}", plan.entries().len());

    println!("\n--- Performance Summary ---");
    println!("File Loading:         {:?}", load_duration);
    println!("Plan Construction:    {:?}", compile_duration);
    println!("Evaluation:           {:?}", eval_duration);
    if let Some(report) = &comparison {
        println!("Interpreter (seq):    {:?}", report.interpreter_time);
        println!("Oracle:               {:?}", report.oracle_time);
    }
    println!("-----------------------------");
    println!("Total Execution:      {:?}", total_duration);
    println!("Parallelism:          {:?}", options.parallelism);
    println!();

    if comparison.is_some_and(|report| !report.is_match()) {
        std::process::exit(2);
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Output(value) => canonical_json(value),
        Outcome::Failed(error) => format!("error: {}", error),
    }
}

/// Builds run options from command line arguments alone.
fn non_interactive_options(cli: Cli) -> RunOptions {
    let graph_path = cli.graph_path.unwrap_or_else(|| {
        exit_with_error("A graph path is required in non-interactive mode.");
    });
    let records_path = cli.records_path.unwrap_or_else(|| {
        exit_with_error("A records path is required in non-interactive mode.");
    });

    RunOptions {
        graph_path,
        records_path,
        oracle_path: cli.oracle_path,
        parallelism: if cli.parallel {
            Parallelism::Parallel
        } else {
            Parallelism::Sequential
        },
        trace: cli.trace,
        save_plan: cli.save_plan,
        strict_guards: cli.strict_guards,
    }
}

/// Prompts for every option.
fn interactive_options() -> RunOptions {
    println!("--- Kagami Interactive Mode ---");

    let graph_path = prompt_for_input("Enter graph path", Some("data/graph.json"));
    let records_path = prompt_for_input("Enter records path", Some("data/records.json"));
    let oracle_path = prompt_for_input("Enter recorded oracle outputs path (optional)", None);
    let parallel = prompt_for_input("Evaluate in parallel? (y/n)", Some("n"));
    let trace = prompt_for_input("Print a trace of the first record? (y/n)", Some("n"));

    RunOptions {
        graph_path,
        records_path,
        oracle_path: Some(oracle_path).filter(|path| !path.is_empty()),
        parallelism: if parallel.eq_ignore_ascii_case("y") {
            Parallelism::Parallel
        } else {
            Parallelism::Sequential
        },
        trace: trace.eq_ignore_ascii_case("y"),
        save_plan: None,
        strict_guards: false,
    }
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = default.map_or("".to_string(), |d| format!(" [default: {}]", d));

    print!("> {}{}: ", prompt_text, default_prompt);
    if io::stdout().flush().is_err() || io::stdin().read_line(&mut line).is_err() {
        exit_with_error("Failed to read from the terminal");
    }
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
