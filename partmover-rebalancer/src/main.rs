//! partmover
//!
//! Plans partition-replica reassignments for a broker cluster and drives
//! them through the cluster's admin tooling:
//! - Leader election and leader reordering
//! - Cloning, trimming and removing brokers
//! - Replication factor changes
//! - Count, size, even and leader balancing

use clap::{Parser, Subcommand};
use partmover_core::{BrokerId, RebalanceError};
use partmover_rebalancer::{
    BalanceType, DuSizeCollector, Operation, Outcome, RebalancerConfig, Runner,
    ScriptAdminClient, SnapshotFileClient,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "partmover")]
#[command(about = "Partition replica reassignment tool")]
struct Cli {
    /// Topology snapshot exported from the coordination store
    #[arg(long, global = true, env = "PARTMOVER_TOPOLOGY", default_value = "topology.json")]
    topology: PathBuf,

    /// Coordination store address
    #[arg(long, global = true)]
    zookeeper: Option<String>,

    /// Directory containing the admin tool scripts
    #[arg(long, global = true)]
    tools_path: Option<PathBuf>,

    /// Generate the plan only, submit nothing
    #[arg(long, global = true, alias = "generate")]
    dry_run: bool,

    /// Partition moves per reassignment batch
    #[arg(long, global = true)]
    moves_per_batch: Option<usize>,

    /// Maximum leader-election payload size in bytes
    #[arg(long, global = true)]
    ple_max_payload: Option<usize>,

    /// Seconds to wait between leader-election batches
    #[arg(long, global = true)]
    ple_wait: Option<u64>,

    /// Skip preferred leader election after reassignment
    #[arg(long, global = true)]
    skip_ple: bool,

    /// Seconds between reassignment verification polls
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Give up on a batch after this many verification polls
    #[arg(long, global = true)]
    max_polls: Option<u32>,

    /// Topics to leave untouched
    #[arg(long, global = true, value_delimiter = ',')]
    exclude_topics: Vec<String>,

    /// Also write the reassignment plan to this file
    #[arg(long, global = true)]
    output_json: Option<PathBuf>,

    /// Seed for randomized broker selection
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Broker data directory scanned for partition sizes
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Command used to reach broker hosts
    #[arg(long, global = true)]
    remote_shell: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trigger preferred leader election for every partition
    Elect,
    /// Reorder replica lists so leadership follows replica load
    Reorder,
    /// Add a broker as a replica wherever the source brokers are
    #[command(name = "clone")]
    CloneBrokers {
        #[arg(long, value_delimiter = ',', required = true)]
        brokers: Vec<BrokerId>,
        #[arg(long)]
        to_broker: BrokerId,
    },
    /// Drop brokers from every replica list
    Trim {
        #[arg(long, value_delimiter = ',', required = true)]
        brokers: Vec<BrokerId>,
    },
    /// Move every replica off a broker
    Remove {
        #[arg(long)]
        broker: BrokerId,
        /// Defaults to all other brokers
        #[arg(long, value_delimiter = ',')]
        to_brokers: Vec<BrokerId>,
    },
    /// Change the replication factor of topics
    SetReplicationFactor {
        #[arg(long, value_delimiter = ',', required = true)]
        topics: Vec<String>,
        #[arg(long)]
        replication_factor: usize,
    },
    /// Run balance passes in the given order
    Balance {
        #[arg(long, value_delimiter = ',', required = true)]
        types: Vec<BalanceType>,
    },
}

impl Command {
    fn into_operation(self) -> Operation {
        match self {
            Command::Elect => Operation::Elect,
            Command::Reorder => Operation::Reorder,
            Command::CloneBrokers { brokers, to_broker } => Operation::Clone {
                sources: brokers,
                target: to_broker,
            },
            Command::Trim { brokers } => Operation::Trim { brokers },
            Command::Remove { broker, to_brokers } => Operation::Remove {
                broker,
                targets: to_brokers,
            },
            Command::SetReplicationFactor {
                topics,
                replication_factor,
            } => Operation::SetReplicationFactor {
                topics,
                replication_factor,
            },
            Command::Balance { types } => Operation::Balance { types },
        }
    }
}

impl Cli {
    /// Environment configuration with command-line overrides applied
    fn config(&self) -> anyhow::Result<RebalancerConfig> {
        let mut config = RebalancerConfig::from_env()?;
        if let Some(zookeeper) = &self.zookeeper {
            config.zookeeper = zookeeper.clone();
        }
        if let Some(tools_path) = &self.tools_path {
            config.tools_path = tools_path.clone();
        }
        if let Some(n) = self.moves_per_batch {
            anyhow::ensure!(n > 0, "--moves-per-batch must be at least 1");
            config.moves_per_batch = n;
        }
        if let Some(bytes) = self.ple_max_payload {
            config.ple_max_payload_bytes = bytes;
        }
        if let Some(secs) = self.ple_wait {
            config.ple_wait_secs = secs;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if self.max_polls.is_some() {
            config.max_polls = self.max_polls;
        }
        if !self.exclude_topics.is_empty() {
            config.exclude_topics = self.exclude_topics.clone();
        }
        if self.output_json.is_some() {
            config.output_json = self.output_json.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(shell) = &self.remote_shell {
            config.remote_shell = shell.clone();
        }
        config.dry_run |= self.dry_run;
        config.skip_ple |= self.skip_ple;
        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let config = cli.config()?;
    info!(
        zookeeper = %config.zookeeper,
        topology = %cli.topology.display(),
        dry_run = config.dry_run,
        moves_per_batch = config.moves_per_batch,
        "Starting partmover"
    );

    let metadata = Arc::new(SnapshotFileClient::new(&cli.topology));
    let admin = Arc::new(ScriptAdminClient::new(&config.tools_path, &config.zookeeper));
    let sizes = Arc::new(DuSizeCollector::new(&config.remote_shell, &config.data_dir));

    let (runner, mut progress_rx) = Runner::with_progress(config, metadata, admin);
    let runner = runner.with_size_collector(sizes);

    // Spawn progress reporter
    let reporter = tokio::spawn(async move {
        while let Some(update) = progress_rx.recv().await {
            info!(
                batch = update.batch,
                total = update.total_batches,
                moves = update.moves,
                status = ?update.status,
                "Reassignment progress"
            );
        }
    });

    let operation = cli.command.into_operation();
    let outcome = runner.run(&operation).await;

    // Dropping the runner closes the progress channel so the reporter drains and exits
    drop(runner);
    if let Err(e) = reporter.await {
        warn!(error = %e, "Progress reporter stopped early");
    }
    Ok(outcome?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match run(cli).await {
        Ok(Outcome::Planned { request }) => match request.to_json_pretty() {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Failed to encode plan");
                ExitCode::FAILURE
            }
        },
        Ok(outcome) => {
            info!(?outcome, "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e
                .downcast_ref::<RebalanceError>()
                .map(RebalanceError::exit_code)
                .unwrap_or(1);
            error!(error = %e, "partmover failed");
            ExitCode::from(code as u8)
        }
    }
}
