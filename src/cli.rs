use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "etl")]
#[command(
    version,
    about = "ETL Kit - rule-driven extract, transform and transfer",
    long_about = "ETL Kit\n\nEach subcommand reads one request (JSON) and runs one engine:\n- transform: {data, transformation_rules}\n- extract: {source_url | source_data, extraction_config}\n- transfer: {data, destination, transfer_config}\n\nThe response is printed as JSON. Errors print an error envelope and exit with code 2."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for browser, transfer and logging settings"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a transformation rule set to a value
    Transform(IoArgs),

    /// Extract from provided data or a rendered web page
    Extract {
        #[command(flatten)]
        io: IoArgs,

        #[arg(
            long,
            value_name = "MS",
            help = "Navigation timeout (milliseconds) for web extraction; overrides config"
        )]
        nav_timeout: Option<u64>,

        #[arg(long, help = "Show the browser window instead of running headless")]
        headed: bool,
    },

    /// Deliver a value to a webhook, api endpoint or file
    Transfer(IoArgs),
}

impl Commands {
    pub fn io(&self) -> &IoArgs {
        match self {
            Commands::Transform(io) | Commands::Transfer(io) => io,
            Commands::Extract { io, .. } => io,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    #[arg(
        long,
        short,
        default_value = "-",
        value_name = "FILE",
        help = "Request JSON file ('-' reads stdin)"
    )]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
