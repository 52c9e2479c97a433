//! Balancing strategies and single-purpose transformations
//!
//! Every strategy mutates a working [`Cluster`] in place through the
//! cluster's replica mutators, so broker indices never drift from the
//! partition replica lists. The runner diffs the result against the
//! untouched original.

use partmover_core::{Cluster, RebalanceError, Result};
use std::fmt;
use tracing::info;

mod clone;
mod count;
mod even;
mod leader;
mod remove;
mod replication;
mod size;
mod trim;

pub use clone::CloneBrokers;
pub use count::CountBalance;
pub use even::EvenBalance;
pub use leader::LeaderReorder;
pub use remove::RemoveBroker;
pub use replication::SetReplicationFactor;
pub use size::SizeBalance;
pub use trim::TrimBrokers;

/// A transformation of a working cluster
pub trait Strategy {
    fn name(&self) -> &'static str;

    fn apply(&mut self, cluster: &mut Cluster) -> Result<()>;
}

/// Sub-types accepted by `balance --types`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BalanceType {
    Count,
    Size,
    Even,
    Leader,
}

impl BalanceType {
    pub fn strategy(self) -> Box<dyn Strategy> {
        match self {
            BalanceType::Count => Box::new(CountBalance),
            BalanceType::Size => Box::new(SizeBalance),
            BalanceType::Even => Box::new(EvenBalance),
            BalanceType::Leader => Box::new(LeaderReorder),
        }
    }

    /// Whether this balance needs measured partition sizes
    pub fn needs_sizes(self) -> bool {
        matches!(self, BalanceType::Size)
    }
}

impl fmt::Display for BalanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BalanceType::Count => "count",
            BalanceType::Size => "size",
            BalanceType::Even => "even",
            BalanceType::Leader => "leader",
        };
        f.write_str(name)
    }
}

/// Runs an ordered list of balance types against the same working cluster
pub struct Balance {
    steps: Vec<Box<dyn Strategy>>,
}

impl Balance {
    pub fn new(types: &[BalanceType]) -> Result<Self> {
        if types.is_empty() {
            return Err(RebalanceError::Validation(
                "balance needs at least one type".to_string(),
            ));
        }
        for (i, t) in types.iter().enumerate() {
            if types[..i].contains(t) {
                return Err(RebalanceError::Validation(format!(
                    "balance type {} given more than once",
                    t
                )));
            }
        }
        Ok(Self {
            steps: types.iter().map(|t| t.strategy()).collect(),
        })
    }
}

impl Strategy for Balance {
    fn name(&self) -> &'static str {
        "balance"
    }

    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        for step in &mut self.steps {
            info!(strategy = step.name(), "Running balance step");
            step.apply(cluster)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_balance_rejects_empty_and_duplicate_types() {
        assert!(Balance::new(&[]).is_err());
        assert!(Balance::new(&[BalanceType::Count, BalanceType::Count]).is_err());
        assert!(Balance::new(&[BalanceType::Count, BalanceType::Leader]).is_ok());
    }

    #[test]
    fn test_balance_runs_steps_in_order() {
        let mut cluster = cluster(
            &[1, 2],
            &[("t", vec![vec![1, 2], vec![1, 2], vec![1, 2], vec![1, 2]])],
        );
        let mut balance = Balance::new(&[BalanceType::Count, BalanceType::Leader]).unwrap();
        balance.apply(&mut cluster).unwrap();

        assert_eq!(counts_at(&cluster, 0), vec![(1, 2), (2, 2)]);
        cluster.verify_indices().unwrap();
    }

    #[test]
    fn test_balance_type_display() {
        assert_eq!(BalanceType::Size.to_string(), "size");
        assert!(BalanceType::Size.needs_sizes());
        assert!(!BalanceType::Even.needs_sizes());
    }
}
