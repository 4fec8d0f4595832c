//! forensics-lab: evidence upload and tool runner client
//!
//! Uploads evidence to the forensics backend, keeps track of the resulting
//! jobs between runs and invokes `fls` / `pslist` against them.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use forensics_lab::audit::{ActivityKind, ActivityLog};
use forensics_lab::auth::{AuthError, DemoDirectory, SessionStore};
use forensics_lab::config::LabConfig;
use forensics_lab::jobs::{Job, JobStore};
use forensics_lab::lab::{ForensicsLab, LabError};
use forensics_lab::storage::{FileKeyValueStore, KeyValueStore};
use forensics_lab::tools::{EvidenceFile, ForensicTool, ToolClient};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = LabConfig::load()?;
    cli.apply_overrides(&mut config);
    tracing::debug!("Using {:?}", config);

    let port: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::open(&config.data_dir)?);
    let sessions = SessionStore::new(port.clone(), Box::new(DemoDirectory::new()));

    match cli.command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            let user = match sessions.login(&email, &password) {
                Ok(user) => user,
                Err(AuthError::InvalidCredentials) => {
                    let accounts: Vec<_> = DemoDirectory::new().emails().collect();
                    eprintln!("Invalid email or password. Lab accounts: {}", accounts.join(", "));
                    return Ok(ExitCode::FAILURE);
                }
                Err(e) => return Err(e.into()),
            };
            record(&config, ActivityKind::Session, format!("{} signed in", user.email));
            println!("Signed in as {} ({})", user.name, user.role);
        }
        Command::Logout => {
            if let Some(user) = sessions.restore() {
                record(&config, ActivityKind::Session, format!("{} signed out", user.email));
            }
            sessions.logout()?;
            println!("Signed out.");
        }
        Command::Whoami => match sessions.restore() {
            Some(user) => println!("{} <{}> ({})", user.name, user.email, user.role),
            None => println!("Not signed in."),
        },
        Command::Jobs { json } => {
            let jobs = JobStore::load(port);
            print_jobs(&jobs.all(), json)?;
        }
        Command::ClearJobs => {
            let jobs = JobStore::load(port);
            let count = jobs.len();
            jobs.clear()?;
            println!("Cleared {} job(s).", count);
        }
        Command::Upload { path } => {
            let file = EvidenceFile::from_path(&path)?;
            let lab = open_lab(&config, port)?;
            println!(
                "Uploading {} ({} bytes) to {}...",
                file.filename,
                file.len(),
                config.api_host
            );
            return Ok(match lab.upload(&file) {
                Ok(job) => {
                    println!("Job ID: {}", job.job_id);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    if let Some(alert) = lab.alert() {
                        eprintln!("{}", alert);
                    }
                    hint_on_unauthorized(&e);
                    ExitCode::FAILURE
                }
            });
        }
        Command::Fls { job_id } => {
            return run_tool(&config, port, ForensicTool::FileSystemListing, &job_id);
        }
        Command::Pslist { job_id } => {
            return run_tool(&config, port, ForensicTool::ProcessList, &job_id);
        }
        Command::Health => {
            // Health does not need a key
            let client = ToolClient::new(
                &config.api_host,
                config.api_key.clone().unwrap_or_default(),
                config.timeout,
            );
            let health = client.health()?;
            println!("Backend {}: {}", client.host(), health.status);
            if !health.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::VerifyLog { path } => {
            let path = path.unwrap_or_else(|| config.activity_log_path());
            if !path.exists() {
                bail!("No activity log at {:?}", path);
            }
            if ActivityLog::verify_log_file(&path)? {
                println!("Activity log intact: {}", path.display());
            } else {
                println!("Activity log TAMPERED or malformed: {}", path.display());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn open_lab(config: &LabConfig, port: Arc<dyn KeyValueStore>) -> Result<Arc<ForensicsLab>> {
    let client = config.tool_client()?;
    let jobs = Arc::new(JobStore::load(port));
    let mut lab = ForensicsLab::new(Arc::new(client), jobs);
    match ActivityLog::open(config.activity_log_path()) {
        Ok(log) => lab = lab.with_activity_log(Arc::new(log)),
        Err(e) => tracing::warn!("Activity log unavailable: {:#}", e),
    }
    let lab = Arc::new(lab);

    // Ctrl+C: stop the lab so an in-flight response is not written back
    {
        let lab = lab.clone();
        let _ = ctrlc::set_handler(move || {
            lab.shutdown();
            std::process::exit(130);
        });
    }

    Ok(lab)
}

fn run_tool(
    config: &LabConfig,
    port: Arc<dyn KeyValueStore>,
    tool: ForensicTool,
    job_id: &str,
) -> Result<ExitCode> {
    let lab = open_lab(config, port)?;
    if lab.jobs().get(job_id).is_none() {
        eprintln!("Note: job {} is not in the local job list", job_id);
    }

    let result = lab.run(tool, job_id);
    if let Some(output) = lab.last_output() {
        println!("{}", output);
    }
    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            hint_on_unauthorized(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn hint_on_unauthorized(err: &LabError) {
    if matches!(err, LabError::Tool(e) if e.is_unauthorized()) {
        eprintln!("The backend rejected the API key; check FORGE_API_KEY or api_key in the config file.");
    }
}

fn print_jobs(jobs: &[Job], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(jobs)?);
        return Ok(());
    }
    if jobs.is_empty() {
        println!("No jobs yet");
        return Ok(());
    }
    for job in jobs {
        let created = job
            .created()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}  {}", job.job_id, created, job.filename);
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn record(config: &LabConfig, kind: ActivityKind, message: String) {
    let result = ActivityLog::open(config.activity_log_path()).and_then(|log| log.record(kind, message));
    if let Err(e) = result {
        tracing::warn!("Failed to write activity log: {:#}", e);
    }
}

/// CLI arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Forensics lab evidence client")]
struct Cli {
    /// Forensics backend base URL (overrides FORENSICS_API)
    #[arg(long, global = true)]
    api_host: Option<String>,

    /// Data directory for jobs, session and activity log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn apply_overrides(&self, config: &mut LabConfig) {
        if let Some(host) = &self.api_host {
            config.api_host = host.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs.max(1));
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with a lab account
    Login {
        email: String,
        /// Password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Upload an evidence file and track the new job
    Upload { path: PathBuf },
    /// List tracked jobs, most recent first
    Jobs {
        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Forget all tracked jobs
    ClearJobs,
    /// Run Sleuth Kit fls against a job
    Fls { job_id: String },
    /// Run Volatility pslist against a job
    Pslist { job_id: String },
    /// Check that the backend is reachable
    Health,
    /// Verify the activity log hash chain
    VerifyLog { path: Option<PathBuf> },
}
