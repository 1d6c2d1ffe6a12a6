// SPDX-License-Identifier: MIT OR Apache-2.0
//! hs — a tool for batch, data-driven HTTP requests.

#![deny(unsafe_code)]

mod expr_cmd;
mod http_cmds;
mod input;
mod output;
mod progress;
mod signal;

use clap::{Args, Parser, Subcommand};
use input::InputFormat;
use output::OutputFormat;
use progress::ProgressMode;
use tracing_subscriber::EnvFilter;

/// Exit code for runtime errors (usage errors exit 2 via clap).
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(
    name = "hs",
    version,
    about = "a tool for batch, data-driven HTTP requests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Make GET request(s).
    #[command(name = "GET", alias = "get")]
    Get(DoArgs),
    /// Make HEAD request(s).
    #[command(name = "HEAD", alias = "head")]
    Head(DoArgs),
    /// Make POST request(s).
    #[command(name = "POST", alias = "post")]
    Post(DoArgs),
    /// Make PUT request(s).
    #[command(name = "PUT", alias = "put")]
    Put(DoArgs),
    /// Make PATCH request(s).
    #[command(name = "PATCH", alias = "patch")]
    Patch(DoArgs),
    /// Make DELETE request(s).
    #[command(name = "DELETE", alias = "delete")]
    Delete(DoArgs),
    /// Make OPTIONS request(s).
    #[command(name = "OPTIONS", alias = "options")]
    Options(DoArgs),
    /// Make TRACE request(s).
    #[command(name = "TRACE", alias = "trace")]
    Trace(DoArgs),

    /// Build request(s) but do not run; to be used later by 'run'.
    Build(BuildCmdArgs),

    /// Run pre-built requests, or failed requests from a prior run.
    Run(RunCmdArgs),

    /// Evaluate an expression on a stream of JSON records.
    Expr(ExprArgs),

    /// Create the default config file.
    Init,
}

/// Flags shared by every input-consuming command.
#[derive(Args, Debug)]
struct CommonFlags {
    /// Input mode.
    #[arg(short = 'i', long = "in", value_enum, default_value_t)]
    input: InputFormat,
}

/// Flags for commands that build requests.
#[derive(Args, Debug)]
struct BuildFlags {
    /// Add an HTTP request header; may be repeated.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Load a JSON file as a lookup table: "filename,varname,keyexpr".
    /// For each loaded value, keyexpr extracts its key; varname is bound
    /// to the resulting object in the global scope.
    #[arg(short = 'L', long = "loadjson")]
    loadjson: Vec<String>,
}

/// Flags for commands that execute requests.
#[derive(Args, Debug)]
struct RunFlags {
    /// Add an HTTP cookie; may be repeated. 'name=value' adds a bare
    /// cookie; anything else is read as a Netscape-format cookie file.
    #[arg(short = 'b', long = "cookie")]
    cookies: Vec<String>,

    /// Write fail responses (connection error or non-2xx) to this file,
    /// or stdout if '-'.
    #[arg(short = 'F', long = "fails", default_value = "-")]
    failfile: String,

    /// Number of retries on transport error or 5xx response.
    #[arg(short = 'r', long = "retry", default_value_t = 0)]
    retries: usize,

    /// Output mode.
    #[arg(short = 'o', long = "out", value_enum, default_value_t)]
    output: OutputFormat,

    /// Request parallelism (no output ordering guaranteed above 1).
    #[arg(short = 'P', long = "parallel", default_value_t = 1)]
    parallel: usize,

    /// Progress bar on stderr.
    #[arg(long, value_enum, default_value_t)]
    progress: ProgressMode,
}

#[derive(Args, Debug)]
struct DoArgs {
    /// URL template.
    url: String,
    /// Body template.
    body: Option<String>,

    #[command(flatten)]
    common: CommonFlags,
    #[command(flatten)]
    build: BuildFlags,
    #[command(flatten)]
    run: RunFlags,
}

#[derive(Args, Debug)]
struct BuildCmdArgs {
    /// HTTP method.
    method: String,
    /// URL template.
    url: String,
    /// Body template.
    body: Option<String>,

    #[command(flatten)]
    common: CommonFlags,
    #[command(flatten)]
    build: BuildFlags,
}

#[derive(Args, Debug)]
struct RunCmdArgs {
    #[command(flatten)]
    common: CommonFlags,
    #[command(flatten)]
    run: RunFlags,
}

#[derive(Args, Debug)]
struct ExprArgs {
    /// The expression to apply to each input record.
    expression: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(
            "hs=debug,hs.pipeline=debug,hs.http=debug,hs.config=debug,hs.cookie=debug,hs.signal=debug",
        )
    } else {
        EnvFilter::new("hs=info,hs.config=warn,hs.signal=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Get(args) => http_cmds::cmd_do("GET", args).await,
        Commands::Head(args) => http_cmds::cmd_do("HEAD", args).await,
        Commands::Post(args) => http_cmds::cmd_do("POST", args).await,
        Commands::Put(args) => http_cmds::cmd_do("PUT", args).await,
        Commands::Patch(args) => http_cmds::cmd_do("PATCH", args).await,
        Commands::Delete(args) => http_cmds::cmd_do("DELETE", args).await,
        Commands::Options(args) => http_cmds::cmd_do("OPTIONS", args).await,
        Commands::Trace(args) => http_cmds::cmd_do("TRACE", args).await,
        Commands::Build(args) => http_cmds::cmd_build(args).await,
        Commands::Run(args) => http_cmds::cmd_run(args).await,
        Commands::Expr(args) => expr_cmd::cmd_expr(args),
        Commands::Init => cmd_init(),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

fn cmd_init() -> anyhow::Result<()> {
    let (path, content) = hs_runtime::config::create_config_file()?;
    eprintln!("wrote {}", path.display());
    eprint!("{content}");
    Ok(())
}
