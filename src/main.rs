use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tuneset_tools::config::{self, Config};
use tuneset_tools::extract::OverflowPolicy;
use tuneset_tools::pipeline;
use tuneset_tools::{Result, ToolError};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build(args) => execute_build(args),
    }
}

fn execute_build(args: BuildArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let report = pipeline::build_dataset(&config)?;
    println!();
    print!("{report}");
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Build fine-tuning datasets from prompt/completion spreadsheets."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, normalise, and write the dataset.
    Build(BuildArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Dotenv file holding the run configuration.
    #[arg(long, default_value = "Secrets/.env")]
    env: PathBuf,

    /// Sheet location, overriding GSPREAD_URL.
    #[arg(long)]
    sheet_url: Option<String>,

    /// Zero-based worksheet index, overriding SHEET_INDEX.
    #[arg(long)]
    sheet_index: Option<usize>,

    /// Output directory, overriding OUTPUT_DIR.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output file name, overriding FILENAME.
    #[arg(long)]
    filename: Option<String>,

    /// Token encoder name, overriding TOKEN_ENCODING.
    #[arg(long)]
    encoding: Option<String>,

    /// Token ceiling per pair, overriding TOKEN_LIMIT.
    #[arg(long)]
    token_limit: Option<usize>,

    /// Price per 1000 tokens, overriding COST_PER_1K_TOKENS.
    #[arg(long = "cost-per-1k")]
    cost_per_1k: Option<f64>,

    /// Stop at the first row over the token limit.
    #[arg(long)]
    abort_on_overflow: bool,
}

impl BuildArgs {
    /// Reads the dotenv file and lets command line flags take precedence over
    /// its entries.
    fn resolve_config(self) -> Result<Config> {
        let mut values = config::read_env_file(&self.env)?;
        let overrides = [
            (config::SHEET_URL_KEY, self.sheet_url),
            (config::SHEET_INDEX_KEY, self.sheet_index.map(|index| index.to_string())),
            (
                config::OUTPUT_DIR_KEY,
                self.output_dir.map(|dir| dir.display().to_string()),
            ),
            (config::FILENAME_KEY, self.filename),
            (config::ENCODING_KEY, self.encoding),
            (config::TOKEN_LIMIT_KEY, self.token_limit.map(|limit| limit.to_string())),
            (config::COST_KEY, self.cost_per_1k.map(|rate| rate.to_string())),
            (
                config::OVERFLOW_POLICY_KEY,
                self.abort_on_overflow.then(|| OverflowPolicy::Abort.to_string()),
            ),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                values.insert(key.to_string(), value);
            }
        }
        Config::from_values(&values)
    }
}
