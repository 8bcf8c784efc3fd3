mod config;
mod plan_cmds;
mod profile_cmds;
mod resolve;
mod serve_cmd;
mod worker_cmd;

use std::time::Duration;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use stride_db::models::{FitnessLevel, SessionDuration};
use stride_db::pool;

use config::StrideConfig;

#[derive(Parser)]
#[command(name = "stride", about = "Social fitness service with generated training plans")]
struct Cli {
    /// Database URL (overrides STRIDE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a stride config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/stride")]
        db_url: String,
        /// Generation API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Concurrent generation jobs
        #[arg(long, default_value_t = config::DEFAULT_WORKERS)]
        workers: usize,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the stride database (requires config file or env vars)
    DbInit,
    /// Serve the JSON API with an embedded generation worker pool
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Run generation workers without the API
    Worker {
        /// Seconds between checks for newly requested plans
        #[arg(long, default_value_t = 30)]
        poll_interval: u64,
    },
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Profile management
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Print shell completions to stdout
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Show plan details (or list all plans)
    Show {
        /// Plan ID to show (omit to list all)
        plan_id: Option<String>,
    },
    /// Request a new two-week plan for a profile
    Request {
        /// Profile ID or username
        profile: String,
        /// Training goal, e.g. endurance or strength
        #[arg(long)]
        goal: String,
        /// Event being trained for
        #[arg(long)]
        event: Option<String>,
        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        target_date: Option<NaiveDate>,
        /// First day of the plan (defaults to today)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Free-text training preferences
        #[arg(long)]
        preferences: Option<String>,
        /// How the previous plan went
        #[arg(long)]
        progress: Option<String>,
        /// Minor injuries to work around
        #[arg(long)]
        injuries: Option<String>,
        /// Plan this one follows (defaults to the latest completed plan)
        #[arg(long, conflicts_with = "fresh")]
        previous: Option<String>,
        /// Do not link to any previous plan
        #[arg(long)]
        fresh: bool,
    },
    /// Generate a pending plan now, in this process
    Generate {
        /// Plan ID to generate
        plan_id: String,
    },
    /// Re-request a failed plan
    Retry {
        /// Failed plan ID
        plan_id: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show profile details (or list all profiles)
    Show {
        /// Profile ID or username (omit to list all)
        profile: Option<String>,
    },
    /// Create a profile
    Create {
        /// Unique username
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        /// beginner, intermediate or advanced
        #[arg(long)]
        fitness_level: Option<FitnessLevel>,
        /// Training days per week (1-7)
        #[arg(long)]
        days_per_week: Option<i32>,
        /// Session length band: 0-30, 31-60, 61-90 or 91+
        #[arg(long)]
        duration: Option<SessionDuration>,
        /// Available equipment
        #[arg(long)]
        equipment: Option<String>,
    },
}

/// Execute the `stride init` command: write config file.
fn cmd_init(db_url: &str, api_key: Option<String>, workers: usize, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        generation: config::GenerationSection {
            api_key,
            ..config::GenerationSection::default()
        },
        worker: config::WorkerSection {
            concurrency: workers.max(1),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  worker.concurrency = {}", cfg.worker.concurrency);
    if !has_key {
        println!("  generation.api_key not set; export ANTHROPIC_API_KEY before generating plans");
    }
    println!();
    println!("Next: run `stride db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `stride db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = StrideConfig::resolve(cli_db_url)?;

    println!("Initializing stride database...");

    // 1. Create the database if it does not exist.
    pool::ensure_database_exists(&resolved.db_config).await?;

    // 2. Connect to the target database.
    let db_pool = pool::create_pool(&resolved.db_config).await?;

    // 3. Run migrations.
    pool::run_migrations(&db_pool).await?;

    // 4. Print success with table counts.
    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("stride db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            workers,
            force,
        } => {
            cmd_init(&db_url, api_key, workers, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = serve_cmd::run_serve(db_pool.clone(), &resolved, &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::Worker { poll_interval } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let poll = Duration::from_secs(poll_interval.max(1));
            let result = worker_cmd::run_worker(&db_pool, &resolved, poll).await;
            db_pool.close().await;
            result?;
        }
        Commands::Plan { command } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool, &resolved).await;
            db_pool.close().await;
            result?;
        }
        Commands::Profile { command } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = profile_cmds::run_profile_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "stride", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that touch process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
