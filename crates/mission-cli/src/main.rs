mod config;
mod dry_run;
mod plan_cmds;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use config::MissionConfig;
use dry_run::DryRunArgs;
use plan_cmds::NormalizeArgs;

#[derive(Parser)]
#[command(name = "mission", about = "Validate and simulate phased multi-agent mission plans")]
struct Cli {
    /// Known agent id; repeatable (overrides MISSION_AGENTS and the config file)
    #[arg(long = "agent", global = true, value_name = "AGENT_ID")]
    agents: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a mission config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Parse and validate planner output (`-` reads stdin)
    Check {
        /// Path to the planner output
        file: String,
    },
    /// Print the storage rows a plan normalizes into
    Normalize {
        /// Path to the planner output
        file: String,
        /// Mission the plan belongs to
        #[arg(long)]
        mission_id: Uuid,
        /// Plan version number
        #[arg(long, default_value_t = 1)]
        version: u32,
        /// Recorded author of the plan
        #[arg(long, default_value = "planner")]
        created_by: String,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Simulate a plan running to completion in memory
    DryRun {
        /// Path to the planner output
        file: String,
        /// Treat manual-approval gates as approved
        #[arg(long)]
        approve_manual: bool,
        /// Task key that should fail instead of completing; repeatable
        #[arg(long, value_name = "TASK_KEY")]
        fail: Vec<String>,
    },
}

/// Execute the `mission init` command: write config file.
fn cmd_init(agents: &[String], force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let known = if agents.is_empty() {
        vec!["planner".to_string(), "coder".to_string(), "reviewer".to_string()]
    } else {
        agents.to_vec()
    };

    let cfg = config::ConfigFile {
        agents: config::AgentsSection { known },
        circuit_breaker: Some(Default::default()),
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  agents.known = {}", cfg.agents.known.join(", "));
    println!();
    println!("Next: run `mission check <file>` on a planner reply.");

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(&cli.agents, force)?;
        }
        Commands::Check { file } => {
            let config = MissionConfig::resolve(&cli.agents)?;
            plan_cmds::cmd_check(&config, &file)?;
        }
        Commands::Normalize {
            file,
            mission_id,
            version,
            created_by,
            output,
        } => {
            let config = MissionConfig::resolve(&cli.agents)?;
            let args = NormalizeArgs {
                file: &file,
                mission_id,
                version,
                created_by: &created_by,
                output: output.as_deref(),
            };
            plan_cmds::cmd_normalize(&config, &args)?;
        }
        Commands::DryRun {
            file,
            approve_manual,
            fail,
        } => {
            let config = MissionConfig::resolve(&cli.agents)?;
            let args = DryRunArgs {
                file: &file,
                approve_manual,
                fail: &fail,
            };
            dry_run::cmd_dry_run(&config, &args)?;
        }
    }

    Ok(())
}
