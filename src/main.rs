use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcs_bucket::bucket::{BucketConfig, BucketController, BucketState, Plan, PlanAction};
use gcs_bucket::config::ProviderConfig;
use gcs_bucket::gcp::client::{format_gcp_error, GcpClient};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Version injected at compile time via GCS_BUCKET_VERSION env var (set by
/// CI/CD), or "dev" for local builds.
pub const VERSION: &str = match option_env!("GCS_BUCKET_VERSION") {
    Some(v) => v,
    None => "dev",
};

/// Declarative Cloud Storage bucket management
#[derive(Parser, Debug)]
#[command(name = "gcs-bucket", version, about, long_about = None)]
struct Args {
    /// Provider configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    provider_config: Option<PathBuf>,

    /// Default GCP project for buckets that do not pin one
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Log file, or "-" for stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what apply would change
    Plan(ResourceArgs),
    /// Create, update or replace the bucket to match its configuration
    Apply(ResourceArgs),
    /// Refresh the state file from the remote bucket
    Refresh(StateArgs),
    /// Delete the bucket and forget its state
    Destroy(StateArgs),
    /// Adopt an existing bucket into a state file
    Import {
        /// Bucket name
        name: String,
        #[command(flatten)]
        state: StateArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ResourceArgs {
    /// Bucket configuration (YAML or JSON)
    #[arg(short, long)]
    config: PathBuf,

    #[command(flatten)]
    state: StateArgs,
}

#[derive(clap::Args, Debug)]
struct StateArgs {
    /// State file
    #[arg(short, long, default_value = "bucket.state.json")]
    state: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(tracing_level.as_str()));

    let (non_blocking, guard, log_path) = match log_file {
        Some(path) if path == Path::new("-") => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            (writer, guard, None)
        },
        _ => {
            let log_path = log_file.map(Path::to_path_buf).unwrap_or_else(get_log_path);
            if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file {:?}", log_path))?;

            let (writer, guard) = tracing_appender::non_blocking(file);
            (writer, guard, Some(log_path))
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcs-bucket {} started with log level: {:?}", VERSION, level);
    if let Some(path) = log_path {
        tracing::info!("Log file: {:?}", path);
    }

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gcs-bucket").join("gcs-bucket.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gcs-bucket").join("gcs-bucket.log");
    }
    PathBuf::from("gcs-bucket.log")
}

fn load_provider(args: &Args) -> Result<ProviderConfig> {
    let mut provider = match &args.provider_config {
        Some(path) => ProviderConfig::load_from(path)?,
        None => ProviderConfig::load(),
    };

    if let Some(project) = &args.project {
        provider.project = Some(project.clone());
    }

    Ok(provider)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        },
    };

    if let Err(e) = run(args).await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {e:#}");
        eprintln!("{}", format_gcp_error(&e));
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let provider = load_provider(&args)?;
    let client = GcpClient::new(provider.endpoints.clone()).await?;
    let controller = BucketController::new(client, provider);

    match &args.command {
        Command::Plan(resource) => {
            let config = BucketConfig::load(&resource.config)?;
            let prior = refreshed_state(&controller, &resource.state.state).await?;
            let plan = controller.plan(&config, prior.as_ref())?;
            print_plan(&plan);
        },
        Command::Apply(resource) => {
            let config = BucketConfig::load(&resource.config)?;
            let prior = refreshed_state(&controller, &resource.state.state).await?;
            let state = apply(&controller, &config, prior).await?;
            state.save(&resource.state.state)?;
            println!("Applied bucket {} ({})", state.name, state.url);
        },
        Command::Refresh(state_args) => {
            let Some(prior) = BucketState::load(&state_args.state)? else {
                println!("No bucket in state; nothing to refresh");
                return Ok(());
            };
            match controller.read(&prior).await? {
                Some(state) => {
                    state.save(&state_args.state)?;
                    println!("Refreshed bucket {}", state.name);
                },
                None => {
                    BucketState::remove(&state_args.state)?;
                    println!("Bucket no longer exists; state removed");
                },
            }
        },
        Command::Destroy(state_args) => {
            let Some(state) = BucketState::load(&state_args.state)? else {
                println!("No bucket in state; nothing to destroy");
                return Ok(());
            };
            controller.delete(&state).await?;
            BucketState::remove(&state_args.state)?;
            println!("Destroyed bucket {}", state.name);
        },
        Command::Import { name, state } => {
            let imported = controller.import(name).await?;
            imported.save(&state.state)?;
            println!("Imported bucket {}", imported.name);
        },
    }

    Ok(())
}

/// Load prior state and refresh it; a bucket deleted out of band yields None
async fn refreshed_state(
    controller: &BucketController<GcpClient>,
    path: &Path,
) -> Result<Option<BucketState>> {
    let Some(prior) = BucketState::load(path)? else {
        return Ok(None);
    };
    controller.read(&prior).await
}

async fn apply(
    controller: &BucketController<GcpClient>,
    config: &BucketConfig,
    prior: Option<BucketState>,
) -> Result<BucketState> {
    let plan = controller.plan(config, prior.as_ref())?;
    print_plan(&plan);

    match (plan.action, prior) {
        (PlanAction::NoOp, Some(prior)) => Ok(prior),
        (PlanAction::Update, Some(prior)) => controller.update(&prior, &plan).await,
        (PlanAction::Replace, Some(prior)) => {
            controller.delete(&prior).await?;
            let plan = controller.plan(config, None)?;
            controller.create(&plan).await
        },
        _ => controller.create(&plan).await,
    }
}

fn print_plan(plan: &Plan) {
    let name = &plan.spec.name;
    match plan.action {
        PlanAction::Create => println!("bucket {}: will be created", name),
        PlanAction::NoOp => println!("bucket {}: no changes", name),
        PlanAction::Update | PlanAction::Replace => {
            let verb = if plan.requires_replacement() {
                "must be replaced"
            } else {
                "will be updated in place"
            };
            println!("bucket {}: {}", name, verb);
            for field in &plan.changes {
                let marker = if field.forces_replacement() {
                    " (forces replacement)"
                } else {
                    ""
                };
                println!("  ~ {}{}", field, marker);
            }
        },
    }
}
