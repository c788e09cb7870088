use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use datasurgeon::{AuditPolicy, AuditSession, DatasetLoader, LoadOptions, PolicyLoader, StrategyId, StrategyParams, SurgeonError, Verdict};
use datasurgeon::repl::{format_report, ReplCommand};

#[derive(Parser)]
#[command(name = "datasurgeon")]
#[command(about = "Audit tabular datasets and apply reversible, previewed fixes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to audit policy (YAML)
    #[arg(short, long, env = "DATASURGEON_POLICY")]
    policy: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Start interactive REPL or JSON-RPC server mode
    #[arg(long)]
    repl: bool,

    /// Force server mode (JSON-RPC over stdin/stdout) even if TTY detected
    #[arg(long, requires = "repl")]
    server: bool,

    /// Dataset to load when the interactive REPL starts
    #[arg(long, requires = "repl")]
    load: Option<PathBuf>,

    /// Maximum number of concurrent sessions (server mode only)
    #[arg(long, default_value = "100", requires = "repl")]
    max_sessions: usize,

    /// Default session idle timeout in seconds (server mode only)
    #[arg(long, default_value = "300", requires = "repl")]
    idle_timeout: u64,

    /// Maximum allowed idle timeout in seconds (server mode only)
    #[arg(long, default_value = "3600", requires = "repl")]
    max_idle_timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a dataset and print the audit report
    Audit {
        /// Dataset file (.csv, .json, .jsonl, .ndjson, .yaml)
        file: PathBuf,

        /// Output format: table, yaml, json
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// List the fixes available for each issue found in a dataset
    Strategies {
        /// Dataset file
        file: PathBuf,
    },

    /// Preview a fix, and apply it with --yes
    Clean {
        /// Dataset file
        file: PathBuf,

        /// Strategy id (e.g. fill-median, drop-duplicates, auto-pilot)
        #[arg(short, long)]
        strategy: String,

        /// Target column
        #[arg(short, long)]
        column: Option<String>,

        /// Target business rule
        #[arg(short, long)]
        rule: Option<String>,

        /// Literal for fill-value / replace-with-value
        #[arg(long)]
        value: Option<String>,

        /// Apply the previewed change (without this flag nothing is written)
        #[arg(short, long)]
        yes: bool,

        /// Where to write the cleaned dataset (defaults to <name>.clean.<ext>)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Find dataset files under a directory
    Discover {
        /// Directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Validate the audit policy
    CheckPolicy,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("datasurgeon=debug,info")
    } else {
        EnvFilter::new("datasurgeon=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error(e);
            ExitCode::FAILURE
        }
    }
}

fn print_error(err: Box<dyn std::error::Error>) {
    if let Some(surgeon_err) = err.downcast_ref::<SurgeonError>() {
        eprintln!("\x1b[31m✗ Error [{}]:\x1b[0m {}", surgeon_err.code(), surgeon_err);
        return;
    }

    eprintln!("\x1b[31m✗ Error:\x1b[0m {}", err);
}

fn load_policy(path: Option<&Path>) -> Result<AuditPolicy, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            info!("Using policy {}", path.display());
            Ok(PolicyLoader::load(path)?)
        }
        None => Ok(AuditPolicy::default()),
    }
}

fn open_session(file: &Path, policy: AuditPolicy) -> Result<AuditSession, Box<dyn std::error::Error>> {
    let loader = DatasetLoader::with_options(LoadOptions {
        trim_whitespace: policy.load.trim_whitespace,
    });
    let dataset = loader.load(file)?;
    Ok(AuditSession::load(dataset, policy)?)
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if cli.repl {
        run_repl(cli).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let command = cli.command.ok_or("No command specified. Use --help for usage or --repl for interactive mode.")?;

    match command {
        Commands::Audit { file, output } => {
            let policy = load_policy(cli.policy.as_deref())?;
            cmd_audit(&file, policy, output)
        }

        Commands::Strategies { file } => {
            let policy = load_policy(cli.policy.as_deref())?;
            cmd_strategies(&file, policy)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Clean { file, strategy, column, rule, value, yes, out } => {
            let policy = load_policy(cli.policy.as_deref())?;
            let params = StrategyParams { column, rule, value };
            cmd_clean(&file, policy, &strategy, params, yes, out)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Discover { dir } => {
            cmd_discover(&dir)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::CheckPolicy => {
            let path = cli.policy.ok_or("Policy path required (--policy or DATASURGEON_POLICY)")?;
            cmd_check_policy(&path)
        }
    }
}

fn cmd_audit(file: &Path, policy: AuditPolicy, output: OutputFormat) -> Result<ExitCode, Box<dyn std::error::Error>> {
    info!("Auditing {}", file.display());

    let mut session = open_session(file, policy)?;
    let report = session.audit()?;

    match output {
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&report)?);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            println!("\nAudit Report: {}\n", file.display());
            print!("{}", format_report(&report));

            if !report.is_clean() {
                println!("\nRun 'datasurgeon strategies {}' to see available fixes.", file.display());
            }
        }
    }

    if report.verdict == Verdict::Failed {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn cmd_strategies(file: &Path, policy: AuditPolicy) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(file, policy)?;
    session.audit()?;
    let menu = session.list_strategies()?;

    if menu.by_issue.is_empty() {
        println!("✓ No open issues");
        return Ok(());
    }

    for entry in &menu.by_issue {
        let target = entry
            .rule
            .as_deref()
            .or(entry.column.as_deref())
            .unwrap_or("(dataset)");
        println!("#{} {} on {}", entry.issue, entry.kind.title(), target);
        for strategy in &entry.strategies {
            let marker = if entry.default == Some(*strategy) { "*" } else { " " };
            println!("   {} {:<24} {}", marker, strategy.as_str(), strategy.description());
        }
    }

    if menu.auto_pilot {
        println!("\n  {:<26} {}", StrategyId::AutoPilot.as_str(), StrategyId::AutoPilot.description());
    }
    println!("\n* default fix used by auto-pilot");

    Ok(())
}

fn default_output_path(file: &Path) -> PathBuf {
    let stem = file.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = file.extension().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "json".to_string());
    file.with_file_name(format!("{}.clean.{}", stem, ext))
}

fn cmd_clean(
    file: &Path,
    policy: AuditPolicy,
    strategy: &str,
    params: StrategyParams,
    yes: bool,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let strategy: StrategyId = strategy.parse()?;
    let mut session = open_session(file, policy)?;
    session.audit()?;

    let preview = session.propose(strategy, params)?;

    println!("\nPreview of {} on {}\n", preview.strategy, file.display());
    println!("{}", preview.summary());
    for step in &preview.steps {
        println!("  - {}", step);
    }
    println!("{}", preview.render_diff());

    if !yes {
        println!("Dry run: nothing was changed. Re-run with --yes to apply.");
        return Ok(());
    }

    if preview.is_noop() {
        warn!("{} changes nothing; no file written", preview.strategy);
        return Ok(());
    }

    let summary = session.commit(&preview)?;
    let out = out.unwrap_or_else(|| default_output_path(file));
    DatasetLoader::new().export(session.current(), &out)?;

    println!(
        "✓ Applied {}: {} rows x {} columns written to {}",
        preview.strategy,
        summary.rows,
        summary.columns,
        out.display()
    );

    let report = session.audit()?;
    println!("  Re-audit: {} {}", report.verdict.symbol(), report.verdict);

    Ok(())
}

fn cmd_discover(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let files = DatasetLoader::new().discover(dir)?;

    if files.is_empty() {
        println!("No dataset files found in {}", dir.display());
        return Ok(());
    }

    println!("Datasets in {}:\n", dir.display());
    for file in &files {
        println!("  {}", file.display());
    }
    println!("\n{} file(s)", files.len());

    Ok(())
}

fn cmd_check_policy(path: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    info!("Validating policy {}", path.display());

    let content = std::fs::read_to_string(path)?;
    let policy: AuditPolicy = if content.trim().is_empty() {
        AuditPolicy::default()
    } else {
        serde_yaml::from_str(&content)?
    };
    let result = PolicyLoader::validate(&policy);

    println!("{} rule(s), {} whitelist entr(ies)", policy.rules.len(), policy.whitelist.len());

    for err in &result.errors {
        println!("    {} [{}] {}", "\x1b[31m✗\x1b[0m", err.code, err.message);
    }
    for warn in &result.warnings {
        println!("    {} [{}] {}", "\x1b[33m⚠\x1b[0m", warn.code, warn.message);
    }

    println!();

    if !result.is_valid() {
        println!("✗ Policy invalid: {} errors, {} warnings", result.errors.len(), result.warnings.len());
        return Ok(ExitCode::FAILURE);
    } else if result.has_warnings() {
        println!("⚠ Policy valid with {} warnings", result.warnings.len());
    } else {
        println!("✓ Policy valid");
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_repl(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    use datasurgeon::repl::{ReplSession, InteractiveRepl, AsyncJsonRpcServer, ServerConfig};

    let policy = load_policy(cli.policy.as_deref())?;
    let is_tty = atty::is(atty::Stream::Stdin);
    let force_server = cli.server;

    if is_tty && !force_server {
        let session = ReplSession::new(policy, cli.policy.clone());
        let mut repl = InteractiveRepl::new(session)?;
        if let Some(path) = cli.load {
            repl.preload(ReplCommand::Load {
                path: path.to_string_lossy().to_string(),
                policy: None,
            });
        }
        repl.run()?;
    } else {
        let config = ServerConfig::new(policy, cli.policy)
            .with_max_sessions(cli.max_sessions)
            .with_idle_timeout(cli.idle_timeout)
            .with_max_idle_timeout(cli.max_idle_timeout);
        AsyncJsonRpcServer::run(config).await?;
    }

    Ok(())
}
