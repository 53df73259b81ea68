use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use resilient_http::{diagnostics, ClientOptions, Method, RequestSpec, ResilientClient};

/// Fetch JSON from an HTTP API with retries and backoff.
#[derive(Debug, Parser)]
#[command(name = "fetch-json", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// URL to request
    url: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra header as `Name: value`; may be repeated
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// JSON request body
    #[arg(short, long)]
    data: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Attempts including the first
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Retry transient failures even for non-idempotent methods
    #[arg(long)]
    retry_non_idempotent: bool,

    /// Log attempts and retry decisions to stderr
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a Reddit path (e.g. `r/rust/top`) as JSON
    Reddit { path: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(request_err) = err.downcast_ref::<resilient_http::RequestError>() {
                if let Some(status) = request_err.status() {
                    eprintln!("status: {status}");
                }
                if let Some(body) = request_err.body_snippet() {
                    eprintln!("body: {body}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut options = ClientOptions::from_env().map_err(|err| anyhow!(err))?;
    options.debug |= cli.debug;
    if options.debug {
        diagnostics::init_stderr_logging();
    }
    let client = ResilientClient::new().with_options(options);

    let value = match cli.command {
        Some(Command::Reddit { path }) => client.get_reddit_json(&path).await?,
        None => {
            let url = cli.url.ok_or_else(|| anyhow!("a URL is required"))?;
            let spec = build_spec(
                &url,
                &cli.method,
                &cli.headers,
                cli.data.as_deref(),
                cli.timeout,
                cli.max_attempts,
                cli.retry_non_idempotent,
            )?;
            client.execute(&spec).await?
        }
    };

    serde_json::to_string_pretty(&value).context("failed to format response")
}

fn build_spec(
    url: &str,
    method: &str,
    headers: &[String],
    data: Option<&str>,
    timeout: Option<f64>,
    max_attempts: Option<u32>,
    retry_non_idempotent: bool,
) -> anyhow::Result<RequestSpec> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method '{method}'"))?;
    let mut spec = RequestSpec::new(method, url).retry_non_idempotent(retry_non_idempotent);

    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| anyhow!("header '{header}' must look like 'Name: value'"))?;
        spec = spec.header(name.trim(), value.trim());
    }

    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data must be valid JSON")?;
        spec = spec.json(&body)?;
    }

    if let Some(secs) = timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid timeout '{secs}'"))?;
        spec = spec.timeout(timeout);
    }

    if let Some(attempts) = max_attempts {
        spec = spec.max_attempts(attempts);
    }

    Ok(spec)
}
