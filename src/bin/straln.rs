use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{env, process};

use homep_straln::{execute, plan_run, ChainInventory, PairMatching, RunPlan, RunSummary, SchedulerParams};

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() {
    let start_time = Instant::now();
    let config = Config::new();

    let default_filter = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let code = match straln(&config) {
        Ok(code) => code,
        Err(message) => {
            log::error!("{}", message);
            RunSummary::EXIT_RUN_FAILURE
        }
    };

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);
    process::exit(code);
}

fn straln(config: &Config) -> Result<i32, String> {
    let inventory = ChainInventory::scan(&config.tree_root)?;
    log::info!(
        "Found {} chains in {} groups under {}",
        inventory.chains(), inventory.groups(), config.tree_root.display()
    );

    let plan = plan_run(&inventory, &config.tree_root, &config.params).map_err(|x| x.to_string())?;
    if config.dry_run {
        print_plan(&plan).map_err(|x| x.to_string())?;
        return Ok(RunSummary::EXIT_SUCCESS);
    }

    let summary = execute(plan, &config.params).map_err(|x| x.to_string())?;
    let mut stderr = io::stderr().lock();
    summary.write_report(&mut stderr).map_err(|x| x.to_string())?;
    if let Some(err) = &summary.error {
        log::error!("Run stopped: {}", err);
    }
    Ok(summary.exit_code())
}

fn print_plan(plan: &RunPlan) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for (group, entries) in plan.recovered.iter() {
        for entry in entries.iter() {
            writeln!(stdout, "{}\trecover\t{}\t{}", group, entry.pair.query(), entry.pair.target())?;
        }
    }
    for job in plan.jobs.iter() {
        let targets: Vec<&str> = job.targets.iter().map(|target| target.code.as_str()).collect();
        writeln!(stdout, "{}\t{}\t{}", job.group, job.query.code, targets.join(","))?;
    }
    stdout.flush()?;
    eprintln!("{} jobs, {} pairs, {} recoverable ledger entries", plan.jobs.len(), plan.pending_pairs(), plan.recovered_entries());
    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    tree_root: PathBuf,
    params: SchedulerParams,
    dry_run: bool,
    verbose: bool,
}

impl Config {
    pub fn new() -> Config {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] tree_dir", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt(
            "s",
            "straln",
            &format!("structural aligner executable (default: {})", homep_straln::AlignerParams::DEFAULT_PROGRAM),
            "PROGRAM",
        );
        opts.optopt(
            "t",
            "threads",
            &format!("number of concurrent jobs (default: {})", SchedulerParams::default_threads()),
            "INT",
        );
        opts.optopt(
            "",
            "timeout",
            &format!(
                "time limit for a single alignment in seconds, 0 for none (default: {})",
                homep_straln::AlignerParams::DEFAULT_TIMEOUT
            ),
            "INT",
        );
        opts.optopt(
            "",
            "options",
            &format!("read options from this file (default: {} in the tree or its parent)", SchedulerParams::OPTIONS_FILE),
            "FILE",
        );
        opts.optopt(
            "",
            "suffix-match",
            "match ledger entries by the last INT characters of the chain codes",
            "INT",
        );
        opts.optflag("", "dry-run", "print the planned jobs without running them");
        opts.optflag("v", "verbose", "print debug information");

        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        // Parse options.
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }

        // Parse positional arguments
        if matches.free.len() != 1 {
            eprintln!("Error: Expected 1 positional argument (tree directory)\n");
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        }
        let tree_root = PathBuf::from(&matches.free[0]);
        if !tree_root.is_dir() {
            eprintln!("Error: {} is not a directory", tree_root.display());
            process::exit(1);
        }

        let mut params = SchedulerParams::default();

        // Options file
        let options_file = matches.opt_str("options").map(PathBuf::from).or_else(|| SchedulerParams::find_options_file(&tree_root));
        if let Some(filename) = options_file {
            if let Err(message) = params.apply_options_file(&filename) {
                eprintln!("Error: Failed to read options file {}: {}", filename.display(), message);
                process::exit(1);
            }
        }

        if let Some(s) = matches.opt_str("s") {
            params.aligner.program = PathBuf::from(s);
        }

        // Parse threads
        if let Some(s) = matches.opt_str("t") {
            params.threads = match s.parse::<usize>() {
                Ok(x) => x,
                Err(e) => {
                    eprintln!("Error: Failed to parse --threads: {}", e);
                    process::exit(1);
                }
            };
        }

        // Parse timeout
        if let Some(s) = matches.opt_str("timeout") {
            params.aligner.timeout = match s.parse::<u64>() {
                Ok(0) => None,
                Ok(x) => Some(Duration::from_secs(x)),
                Err(e) => {
                    eprintln!("Error: Failed to parse --timeout: {}", e);
                    process::exit(1);
                }
            };
        }

        // Parse suffix width
        if let Some(s) = matches.opt_str("suffix-match") {
            params.matching = match s.parse::<usize>() {
                Ok(x) if x > 0 => PairMatching::Suffix(x),
                Ok(_) => {
                    eprintln!("Error: --suffix-match must be positive");
                    process::exit(1);
                }
                Err(e) => {
                    eprintln!("Error: Failed to parse --suffix-match: {}", e);
                    process::exit(1);
                }
            };
        }

        // Validate options.
        if params.threads < 1 {
            eprintln!("Error: --threads must be positive");
            process::exit(1);
        }

        Config {
            tree_root,
            params,
            dry_run: matches.opt_present("dry-run"),
            verbose: matches.opt_present("v"),
        }
    }
}

//-----------------------------------------------------------------------------
