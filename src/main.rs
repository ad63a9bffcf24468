//! R2 Uplink - chunked uploads to Cloudflare R2
//!
//! Thin command-line layer: parses arguments, builds configuration, calls the
//! library and turns failures into a diagnostic and a non-zero exit status.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use r2_uplink::config::{Config, EnvMap};
use r2_uplink::diagnostics::{self, StepOutcome};
use r2_uplink::hub::{FileRequest, HubClient, RepoType};
use r2_uplink::s3::{S3Client, S3ClientConfig};
use r2_uplink::upload::{self, TransferRequest, UploadError, Uploader};
use r2_uplink::{metrics, VERSION};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// R2 Uplink - chunked uploads to Cloudflare R2
#[derive(Parser, Debug)]
#[command(name = "r2-uplink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional YAML configuration file (supports ${VAR} expansion)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Environment file with R2_* credentials
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Print Prometheus metrics to stdout before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file to an R2 bucket
    Upload(UploadArgs),
    /// Check credentials and bucket access
    Check(CheckArgs),
    /// Check that a public object URL is reachable
    ProbeUrl {
        /// Public URL of the object
        url: String,
    },
    /// Download one file from a dataset hub repository
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Local file to upload
    file_path: PathBuf,
    /// Destination bucket
    bucket_name: String,
    /// Destination object key
    object_key: String,
    /// Files larger than this many bytes use multipart upload
    #[arg(long)]
    threshold: Option<u64>,
    /// Bytes per part in multipart mode
    #[arg(long)]
    part_size: Option<u64>,
    /// Abort the multipart session if the upload fails
    #[arg(long)]
    abort_on_failure: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Bucket to check
    bucket_name: String,
    /// How many objects to list
    #[arg(long, default_value_t = 5)]
    max_keys: i32,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Repository id, e.g. owner/name
    repo_id: String,
    /// File path inside the repository
    filename: String,
    #[arg(long, value_enum, default_value_t = RepoType::Dataset)]
    repo_type: RepoType,
    /// Branch, tag or commit
    #[arg(long, default_value = "main")]
    revision: String,
    /// Directory to download into
    #[arg(long, default_value = ".")]
    local_dir: PathBuf,
}

fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!(e))
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let env = EnvMap::from_process()
        .with_dotenv_file(&cli.env_file)
        .with_context(|| format!("failed to read {}", cli.env_file.display()))?;

    let config = match &cli.config {
        Some(path) => Config::load(path, &env)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::from_env(&env)?,
    };
    Ok(config)
}

async fn run_upload(config: Config, args: UploadArgs) -> anyhow::Result<ExitCode> {
    config.r2.validate()?;

    let mut upload_config = config.upload.clone();
    if let Some(threshold) = args.threshold {
        upload_config.multipart_threshold = threshold;
    }
    if let Some(part_size) = args.part_size {
        upload_config.part_size = part_size;
    }

    let request = TransferRequest::builder(&args.file_path, &args.bucket_name, &args.object_key)
        .with_config(&upload_config)
        .build()?;

    if let Err(e) = upload::source_size(&args.file_path).await {
        report_upload_error(&e);
        return Ok(ExitCode::FAILURE);
    }

    let client = S3Client::new(S3ClientConfig::from_r2(&config.r2)?)?;
    println!("Endpoint: {}", client.endpoint());
    println!(
        "Access Key ID: {}",
        client.credentials().masked_access_key()
    );
    println!(
        "Uploading {} to {}/{}...",
        args.file_path.display(),
        args.bucket_name,
        args.object_key
    );

    let object_url = client.object_url(&args.bucket_name, &args.object_key);
    let uploader = Uploader::new(client)
        .with_abort_on_failure(args.abort_on_failure || upload_config.abort_on_failure);

    match uploader.upload(&request).await {
        Ok(result) => {
            println!(
                "Upload complete: {:.2} MB in {} part(s), ETag {}",
                result.bytes_written as f64 / (1024.0 * 1024.0),
                result.parts.max(1),
                result.etag
            );
            println!("File available at: {}", object_url);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_upload_error(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report_upload_error(error: &UploadError) {
    eprintln!("Error uploading file: {}", error);
    if let Some(hint) = error.backend_kind().and_then(|k| k.hint()) {
        eprintln!("\n{}", hint);
    }
}

async fn run_check(config: Config, args: CheckArgs) -> anyhow::Result<ExitCode> {
    let client = S3Client::new(S3ClientConfig::from_r2(&config.r2)?)?;
    let report = diagnostics::run_preflight(&client, &args.bucket_name, args.max_keys).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Endpoint: {}", client.endpoint());
        println!("Bucket: {}", args.bucket_name);
        println!(
            "Access Key ID: {}",
            client.credentials().masked_access_key()
        );
        println!(
            "Secret Key Length: {} chars\n",
            client.credentials().secret_len()
        );

        for step in &report.steps {
            match &step.outcome {
                StepOutcome::Passed { detail } => println!("[ok]   {}: {}", step.name, detail),
                StepOutcome::Failed { error, .. } => println!("[fail] {}: {}", step.name, error),
                StepOutcome::Skipped => println!("[skip] {}", step.name),
            }
        }
        for bucket in &report.buckets {
            println!("  bucket: {}", bucket);
        }
        for object in &report.objects {
            println!("  object: {} ({} bytes)", object.key, object.size);
        }
    }

    if let Some(hint) = report
        .first_failure()
        .and_then(|s| s.kind)
        .and_then(|k| k.hint())
    {
        eprintln!("\n{}", hint);
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_probe(url: &str) -> anyhow::Result<ExitCode> {
    let client = reqwest::Client::builder().build()?;
    let probe = diagnostics::probe_url(&client, url).await?;

    println!("Status Code: {}", probe.status);
    if let Some(content_type) = &probe.content_type {
        println!("Content-Type: {}", content_type);
    }
    if let Some(len) = probe.content_length {
        println!("Content-Length: {} bytes", len);
    }
    match &probe.cors_allow_origin {
        Some(origin) => println!("CORS configured: {}", origin),
        None => println!("Warning: no CORS headers found; browser access may fail"),
    }

    let verdict = probe.verdict();
    if let Some(hint) = verdict.hint() {
        eprintln!("\n{}", hint);
    }
    Ok(if verdict == diagnostics::ProbeVerdict::Accessible {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_fetch(config: Config, args: FetchArgs) -> anyhow::Result<ExitCode> {
    let client = HubClient::new(&config.hub)?;
    let request = FileRequest::new(args.repo_id, args.filename, args.repo_type)
        .with_revision(args.revision);

    let path = client.download(&request, &args.local_dir).await?;
    println!("Downloaded to: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let print_metrics = cli.print_metrics;
    // Probing a public URL needs no credentials
    let code = if let Command::ProbeUrl { url } = &cli.command {
        run_probe(url).await?
    } else {
        let config = load_config(&cli)?;
        match cli.command {
            Command::Upload(args) => run_upload(config, args).await?,
            Command::Check(args) => run_check(config, args).await?,
            Command::Fetch(args) => run_fetch(config, args).await?,
            Command::ProbeUrl { .. } => ExitCode::SUCCESS,
        }
    };

    if print_metrics {
        print!("{}", metrics::gather_text()?);
    }
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, cli.log_format) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    info!("Starting R2 Uplink v{}", VERSION);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
