//! Command runner
//!
//! Drives one operation end to end: load the topology, plan on a working
//! copy, diff against the original, then submit batches and elect leaders.
//! Every failure surfaces as a [`RebalanceError`] for the binary to map to
//! an exit code.

use partmover_core::{
    broker_deltas, generate_moves, BrokerId, Cluster, RebalanceError, ReassignmentRequest, Result,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::admin::AdminClient;
use crate::config::RebalancerConfig;
use crate::election::LeaderElection;
use crate::executor::{BatchExecutor, ProgressUpdate};
use crate::metadata_client::MetadataClient;
use crate::sizer::{apply_sizes, SizeCollector};
use crate::strategies::{
    Balance, BalanceType, CloneBrokers, LeaderReorder, RemoveBroker, SetReplicationFactor,
    Strategy, TrimBrokers,
};

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Preferred leader election only
    Elect,
    Reorder,
    Clone {
        sources: Vec<BrokerId>,
        target: BrokerId,
    },
    Trim {
        brokers: Vec<BrokerId>,
    },
    Remove {
        broker: BrokerId,
        /// Empty means every other broker
        targets: Vec<BrokerId>,
    },
    SetReplicationFactor {
        topics: Vec<String>,
        replication_factor: usize,
    },
    Balance {
        types: Vec<BalanceType>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Elect => "elect",
            Operation::Reorder => "reorder",
            Operation::Clone { .. } => "clone",
            Operation::Trim { .. } => "trim",
            Operation::Remove { .. } => "remove",
            Operation::SetReplicationFactor { .. } => "set-replication-factor",
            Operation::Balance { .. } => "balance",
        }
    }

    fn needs_sizes(&self) -> bool {
        match self {
            Operation::Balance { types } => types.iter().any(|t| t.needs_sizes()),
            _ => false,
        }
    }

    /// Build the transformation, validating arguments that need no topology
    fn strategy(&self, rng: StdRng) -> Result<Option<Box<dyn Strategy>>> {
        let strategy: Box<dyn Strategy> = match self {
            Operation::Elect => return Ok(None),
            Operation::Reorder => Box::new(LeaderReorder),
            Operation::Clone { sources, target } => {
                Box::new(CloneBrokers::new(sources.clone(), *target)?)
            }
            Operation::Trim { brokers } => Box::new(TrimBrokers::new(brokers.clone())?),
            Operation::Remove { broker, targets } => {
                Box::new(RemoveBroker::new(*broker, targets.clone())?)
            }
            Operation::SetReplicationFactor {
                topics,
                replication_factor,
            } => Box::new(SetReplicationFactor::new(
                topics.clone(),
                *replication_factor,
                rng,
            )?),
            Operation::Balance { types } => Box::new(Balance::new(types)?),
        };
        Ok(Some(strategy))
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The plan matched the current assignment; nothing was submitted
    NoReassignmentNeeded,
    /// Dry run: the plan that would have been submitted
    Planned { request: ReassignmentRequest },
    Executed {
        moves: usize,
        batches: usize,
        election_batches: usize,
    },
    Elected { batches: usize },
    /// Dry run of `elect`: election batches that would have been sent
    ElectionPlanned { batches: usize },
}

pub struct Runner {
    config: RebalancerConfig,
    metadata: Arc<dyn MetadataClient>,
    admin: Arc<dyn AdminClient>,
    sizes: Option<Arc<dyn SizeCollector>>,
    executor: BatchExecutor,
}

impl Runner {
    pub fn new(
        config: RebalancerConfig,
        metadata: Arc<dyn MetadataClient>,
        admin: Arc<dyn AdminClient>,
    ) -> Self {
        let executor = BatchExecutor::new(config.executor());
        Self {
            config,
            metadata,
            admin,
            sizes: None,
            executor,
        }
    }

    /// Create a runner whose batch executor reports progress
    pub fn with_progress(
        config: RebalancerConfig,
        metadata: Arc<dyn MetadataClient>,
        admin: Arc<dyn AdminClient>,
    ) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (executor, rx) = BatchExecutor::with_progress(config.executor());
        let mut runner = Self::new(config, metadata, admin);
        runner.executor = executor;
        (runner, rx)
    }

    /// Collector used when an operation balances by size
    pub fn with_size_collector(mut self, sizes: Arc<dyn SizeCollector>) -> Self {
        self.sizes = Some(sizes);
        self
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Load the current cluster, measuring sizes when `with_sizes` is set
    async fn load_cluster(&self, with_sizes: bool) -> Result<Cluster> {
        let snapshot = self.metadata.fetch_topology().await?;
        let mut cluster = snapshot.into_cluster(&self.config.exclude_topics)?;
        if let (true, Some(collector)) = (with_sizes, &self.sizes) {
            let observed = collector.collect(&cluster).await?;
            let applied = apply_sizes(&mut cluster, &observed);
            info!(partitions = applied, "Applied partition sizes");
        }
        Ok(cluster)
    }

    #[instrument(skip(self), fields(operation = operation.name()))]
    pub async fn run(&self, operation: &Operation) -> Result<Outcome> {
        let strategy = operation.strategy(self.rng())?;
        if operation.needs_sizes() && self.sizes.is_none() {
            return Err(RebalanceError::Validation(
                "size balancing needs a size collector".to_string(),
            ));
        }
        let current = self.load_cluster(operation.needs_sizes()).await?;

        let Some(mut strategy) = strategy else {
            return self.elect(&current).await;
        };

        let mut working = current.clone();
        info!(strategy = strategy.name(), "Planning reassignment");
        strategy.apply(&mut working)?;
        working.verify_indices()?;

        let moves = generate_moves(&current, &working);
        if moves.is_empty() {
            info!("No reassignment needed");
            return Ok(Outcome::NoReassignmentNeeded);
        }

        self.log_plan(&current, &working, moves.len());
        let request = ReassignmentRequest::new(moves);
        if let Some(path) = &self.config.output_json {
            tokio::fs::write(path, request.to_json_pretty()?).await?;
            info!(path = %path.display(), "Wrote reassignment plan");
        }
        if self.config.dry_run {
            info!("Dry run, skipping execution");
            return Ok(Outcome::Planned { request });
        }

        let result = self
            .executor
            .execute(self.admin.as_ref(), &request.partitions)
            .await?;

        let election_batches = if self.config.skip_ple {
            info!("Skipping preferred leader election");
            0
        } else {
            LeaderElection::new(self.config.election())
                .run(self.admin.as_ref(), &working)
                .await?
        };

        Ok(Outcome::Executed {
            moves: result.moves,
            batches: result.batches,
            election_batches,
        })
    }

    async fn elect(&self, cluster: &Cluster) -> Result<Outcome> {
        let election = LeaderElection::new(self.config.election());
        if self.config.dry_run {
            let planned = election
                .plan_batches(cluster.partition_keys().into_iter().map(Into::into).collect())?;
            info!(batches = planned.len(), "Dry run, skipping leader election");
            return Ok(Outcome::ElectionPlanned {
                batches: planned.len(),
            });
        }
        let batches = election.run(self.admin.as_ref(), cluster).await?;
        Ok(Outcome::Elected { batches })
    }

    fn log_plan(&self, current: &Cluster, working: &Cluster, moves: usize) {
        let batches = moves.div_ceil(self.executor.config().moves_per_batch.max(1));
        info!(moves, batches, "Reassignment planned");
        for delta in broker_deltas(current, working)
            .iter()
            .filter(|d| !d.is_unchanged())
        {
            info!(
                broker = delta.broker,
                partitions_before = delta.partitions_before,
                partitions_after = delta.partitions_after,
                leaders_before = delta.leaders_before,
                leaders_after = delta.leaders_after,
                "Broker load change"
            );
        }
    }
}
