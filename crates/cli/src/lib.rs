use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use command::{
    CommandFailure, CommandHandler, DatasetConfig, PolicyPayload, PredictPayload, PreviewPayload,
    ValidateBonusPayload,
};
use flags::{BonusTypeFlag, ExamTypeFlag};
use passline_engine::Policy;
use passline_protocol::{serialize_json, CommandRequest, CommandResponse, ResponseMeta};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

mod command;
mod dataset;
mod flags;
mod report;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "passline")]
#[command(about = "Rank and pass-line prediction for exam score submissions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// JSON dataset with exams, regions, quotas and submissions
    #[arg(long, global = true, env = "PASSLINE_DATA")]
    data: Option<PathBuf>,

    /// Policy TOML file (overrides PASSLINE_POLICY and the builtin policy)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Rank submissions flagged as suspicious as well
    #[arg(long, global = true)]
    include_suspicious: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a JSON Command API request
    Command(CommandArgs),

    /// Predict the pass tier of a stored submission
    Predict(PredictArgs),

    /// Check a submission's bonus against its family cap before saving it
    Validate(ValidateArgs),

    /// Rank a hypothetical final score against a cohort
    Preview(PreviewArgs),

    /// Show the active policy and, optionally, the boundaries for a recruit count
    Policy(PolicyArgs),

    /// Print JSON schemas for the Command API
    Schema,
}

#[derive(Args)]
struct CommandArgs {
    /// Inline JSON payload (mutually exclusive with --file)
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// Path to file containing JSON payload
    #[arg(long)]
    file: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct PredictArgs {
    /// Submission to rank
    #[arg(long, conflicts_with = "user", required_unless_present = "user")]
    submission: Option<u64>,

    /// Rank this user's latest submission
    #[arg(long)]
    user: Option<u64>,

    /// Limit --user to one exam
    #[arg(long, requires = "user")]
    exam: Option<u64>,

    /// Competitor page (1-based)
    #[arg(long)]
    page: Option<i64>,

    /// Competitors per page
    #[arg(long)]
    limit: Option<i64>,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CohortArgs {
    #[arg(long)]
    exam: u64,

    #[arg(long)]
    region: u64,

    #[arg(long = "type", value_enum, default_value = "public")]
    exam_type: ExamTypeFlag,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    cohort: CohortArgs,

    /// Existing submission being edited
    #[arg(long)]
    submission: Option<u64>,

    /// Score before bonus
    #[arg(long)]
    raw: f64,

    /// Final score (defaults to raw with the bonus applied)
    #[arg(long = "final")]
    final_score: Option<f64>,

    #[arg(long, value_enum, default_value = "none")]
    bonus: BonusTypeFlag,

    /// The submission fails a subject cutoff
    #[arg(long)]
    cutoff: bool,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PreviewArgs {
    #[command(flatten)]
    cohort: CohortArgs,

    /// Hypothetical final score
    #[arg(long)]
    score: f64,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PolicyArgs {
    /// Also show rank boundaries for this recruit count
    #[arg(long)]
    recruit: Option<i64>,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,
}

pub fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // stdout carries JSON for these, keep logs down to warnings
    let json_output = match &cli.command {
        Commands::Command(_) | Commands::Schema => true,
        Commands::Predict(args) => args.json,
        Commands::Validate(args) => args.json,
        Commands::Preview(args) => args.json,
        Commands::Policy(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let dataset = cli.data.clone().map(|path| DatasetConfig {
        path,
        include_suspicious: cli.include_suspicious,
    });
    let policy = Policy::resolve(cli.policy.as_deref());

    match cli.command {
        Commands::Command(args) => run_command(args, policy, dataset),
        Commands::Schema => run_schema(),
        Commands::Predict(args) => run_predict(&load_handler(policy, dataset)?, args),
        Commands::Validate(args) => run_validate(&load_handler(policy, dataset)?, args),
        Commands::Preview(args) => run_preview(&load_handler(policy, dataset)?, args),
        Commands::Policy(args) => run_policy(&load_handler(policy, dataset)?, args),
    }
}

fn load_handler(policy: Result<Policy>, dataset: Option<DatasetConfig>) -> Result<CommandHandler> {
    let policy = policy.context("Failed to load policy")?;
    log::debug!("Using policy {}", policy.name());
    Ok(CommandHandler::new(policy, dataset))
}

fn run_command(
    args: CommandArgs,
    policy: Result<Policy>,
    dataset: Option<DatasetConfig>,
) -> Result<()> {
    let raw = read_payload(&args)?;
    let request: CommandRequest =
        serde_json::from_str(&raw).context("Invalid JSON passed to --json/--file")?;

    let response = match policy {
        Ok(policy) => CommandHandler::new(policy, dataset).execute(request),
        Err(err) => {
            log::error!("Failed to load policy: {err:#}");
            let failure = CommandFailure::policy(&err);
            let mut response = CommandResponse::error(failure.envelope, ResponseMeta::default());
            response.hints = failure.hints;
            response
        }
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serialize_json(&response)?
    };
    print_stdout(&output)?;

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_payload(args: &CommandArgs) -> Result<String> {
    if let Some(raw) = &args.json {
        return Ok(raw.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read JSON from stdin")?;

    if buffer.trim().is_empty() {
        anyhow::bail!("Command request is empty. Provide --json, --file, or pipe JSON via stdin.");
    }

    Ok(buffer)
}

fn run_predict(handler: &CommandHandler, args: PredictArgs) -> Result<()> {
    let payload = PredictPayload {
        submission_id: args.submission,
        user_id: args.user,
        exam_id: args.exam,
        page: args.page,
        limit: args.limit,
    };
    finish(handler.predict(&payload), args.json, report::render_prediction)
}

fn run_validate(handler: &CommandHandler, args: ValidateArgs) -> Result<()> {
    let payload = ValidateBonusPayload {
        exam_id: args.cohort.exam,
        region_id: args.cohort.region,
        exam_type: args.cohort.exam_type.as_domain(),
        submission_id: args.submission,
        raw_score: args.raw,
        final_score: args.final_score,
        bonus_type: args.bonus.as_domain(),
        has_cutoff: args.cutoff,
    };
    finish(
        handler.validate_bonus(&payload),
        args.json,
        report::render_bonus_check,
    )
}

fn run_preview(handler: &CommandHandler, args: PreviewArgs) -> Result<()> {
    let payload = PreviewPayload {
        exam_id: args.cohort.exam,
        region_id: args.cohort.region,
        exam_type: args.cohort.exam_type.as_domain(),
        final_score: args.score,
    };
    finish(handler.preview(&payload), args.json, report::render_preview)
}

fn run_policy(handler: &CommandHandler, args: PolicyArgs) -> Result<()> {
    let payload = PolicyPayload {
        recruit_count: args.recruit,
    };
    finish(handler.policy_view(&payload), args.json, report::render_policy)
}

fn run_schema() -> Result<()> {
    let request = schemars::schema_for!(CommandRequest);
    let response = schemars::schema_for!(CommandResponse);
    let predict = schemars::schema_for!(PredictPayload);
    let validate_bonus = schemars::schema_for!(ValidateBonusPayload);
    let preview = schemars::schema_for!(PreviewPayload);
    let policy = schemars::schema_for!(PolicyPayload);
    let schemas = serde_json::json!({
        "request": request,
        "response": response,
        "payloads": {
            "predict": predict,
            "competitors": predict,
            "validate_bonus": validate_bonus,
            "preview": preview,
            "policy": policy,
        }
    });
    print_stdout(&serde_json::to_string_pretty(&schemas)?)
}

/// Print a human-subcommand result, or its error, and exit 1 on failure.
fn finish<T: Serialize>(
    result: std::result::Result<T, CommandFailure>,
    json: bool,
    render: fn(&T) -> String,
) -> Result<()> {
    match result {
        Ok(value) => {
            let text = if json {
                serde_json::to_string_pretty(&value)?
            } else {
                render(&value)
            };
            print_stdout(text.trim_end())
        }
        Err(failure) => {
            if json {
                print_stdout(&serialize_json(&failure.envelope)?)?;
            } else {
                eprintln!(
                    "error [{}]: {}",
                    failure.envelope.code, failure.envelope.message
                );
                if let Some(hint) = &failure.envelope.hint {
                    eprintln!("hint: {hint}");
                }
            }
            std::process::exit(1);
        }
    }
}
