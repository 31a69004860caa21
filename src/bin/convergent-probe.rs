use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use convergent::{
    probe, Expectation, HarnessError, Method, RequestDescriptor, Session, Settings, StatusCode,
};

#[derive(Parser)]
#[command(name = "convergent-probe", version)]
#[command(about = "Resend a request until the service answers with the expected state")]
struct Args {
    /// Target URL; `{name}` placeholders are resolved from the settings variables
    #[arg(long)]
    url: String,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: Method,

    /// Status code that ends the probe
    #[arg(long, default_value_t = 200)]
    expect_status: u16,

    /// Text the response body must contain
    #[arg(long)]
    contains: Option<String>,

    /// JSON request body
    #[arg(long, value_name = "JSON")]
    body: Option<String>,

    /// Bearer token for the Authorization header
    #[arg(long, env = "CONVERGENT_TOKEN", hide_env_values = true)]
    bearer: Option<String>,

    /// Minimum spacing between attempts, overrides polling.interval_ms
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Total budget, overrides polling.timeout_ms
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Settings file (defaults to ./convergent.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let mut settings =
        Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(interval_ms) = args.interval_ms {
        settings.polling.interval_ms = interval_ms;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.polling.timeout_ms = timeout_ms;
    }
    let poll_config = settings
        .polling
        .poll_config()
        .context("Invalid polling settings")?;

    let target = settings
        .variables()
        .resolve(&args.url)
        .context("Failed to resolve --url")?;
    let expected = StatusCode::from_u16(args.expect_status).context("Invalid --expect-status")?;

    let mut request = RequestDescriptor::new(args.method, &target);
    if let Some(token) = &args.bearer {
        request = request.with_bearer(token.as_str());
    }
    if let Some(body) = &args.body {
        let payload: serde_json::Value =
            serde_json::from_str(body).context("--body must be valid JSON")?;
        request = request.with_json(&payload)?;
    }

    let session = Session::http(&settings.transport).context("Failed to build HTTP client")?;
    let expectation = Expectation {
        status: expected,
        contains: args.contains,
    };

    match probe(&session, &request, &expectation, poll_config).await {
        Ok(report) => {
            println!(
                "{} {} answered {} after {} attempt(s) in {:?}",
                request.method(),
                request.target(),
                report.status,
                report.attempts,
                report.elapsed
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(HarnessError::Verification(failure)) => {
            eprintln!("{failure}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).with_context(|| format!("{} {} failed", request.method(), request.target())),
    }
}
