//! External admin tooling
//!
//! The [`AdminClient`] trait is the seam to whatever physically performs
//! reassignments and preferred-leader elections. [`ScriptAdminClient`]
//! drives the stock shell tools shipped with the broker distribution.

use partmover_core::{ElectionRequest, RebalanceError, ReassignmentRequest, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Reassignment tool, relative to the tools directory
pub const REASSIGN_TOOL: &str = "kafka-reassign-partitions.sh";

/// Preferred-leader-election tool, relative to the tools directory
pub const ELECTION_TOOL: &str = "kafka-preferred-replica-election.sh";

/// Outcome of verifying a submitted reassignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyStatus {
    InProgress,
    Completed,
    /// Raw status line reported by the tool
    Failed(String),
}

/// Admin operations against the cluster
#[async_trait::async_trait]
pub trait AdminClient: Send + Sync {
    async fn submit_reassignment(&self, request: &ReassignmentRequest) -> Result<()>;

    async fn verify_reassignment(&self, request: &ReassignmentRequest) -> Result<VerifyStatus>;

    async fn elect_preferred_leaders(&self, request: &ElectionRequest) -> Result<()>;
}

/// Classify the output of a `--verify` run
///
/// Any failure line wins over in-progress lines, which win over completion.
pub fn classify_verify_output(output: &str) -> VerifyStatus {
    let lines: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if let Some(line) = lines.iter().find(|l| l.to_ascii_lowercase().contains("failed")) {
        return VerifyStatus::Failed(line.to_string());
    }
    if lines
        .iter()
        .any(|l| l.to_ascii_lowercase().contains("in progress"))
    {
        return VerifyStatus::InProgress;
    }
    VerifyStatus::Completed
}

/// Admin client that shells out to the reassignment and election scripts
pub struct ScriptAdminClient {
    tools_path: PathBuf,
    zookeeper: String,
}

impl ScriptAdminClient {
    pub fn new(tools_path: impl Into<PathBuf>, zookeeper: impl Into<String>) -> Self {
        Self {
            tools_path: tools_path.into(),
            zookeeper: zookeeper.into(),
        }
    }

    fn tool(&self, name: &str) -> PathBuf {
        self.tools_path.join(name)
    }

    /// Run `tool` with the payload written to a temporary file, returning stdout
    async fn run_with_payload(&self, tool: &Path, payload: &str, args: &[&str]) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("partmover-")
            .suffix(".json")
            .tempfile()?;
        tokio::fs::write(file.path(), payload).await?;

        let mut command = Command::new(tool);
        command.arg("--zookeeper").arg(&self.zookeeper);
        for arg in args {
            command.arg(arg);
        }
        command.arg(file.path());
        debug!(tool = %tool.display(), ?args, "Running admin tool");

        let output = command.output().await.map_err(|e| {
            RebalanceError::Admin(format!("failed to run {}: {}", tool.display(), e))
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(tool = %tool.display(), status = %output.status, "Admin tool failed");
            return Err(RebalanceError::Admin(format!(
                "{} exited with {}: {}",
                tool.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

#[async_trait::async_trait]
impl AdminClient for ScriptAdminClient {
    #[instrument(skip(self, request), fields(partitions = request.partitions.len()))]
    async fn submit_reassignment(&self, request: &ReassignmentRequest) -> Result<()> {
        let payload = request.to_json()?;
        self.run_with_payload(
            &self.tool(REASSIGN_TOOL),
            &payload,
            &["--execute", "--reassignment-json-file"],
        )
        .await?;
        Ok(())
    }

    async fn verify_reassignment(&self, request: &ReassignmentRequest) -> Result<VerifyStatus> {
        let payload = request.to_json()?;
        let stdout = self
            .run_with_payload(
                &self.tool(REASSIGN_TOOL),
                &payload,
                &["--verify", "--reassignment-json-file"],
            )
            .await?;
        Ok(classify_verify_output(&stdout))
    }

    #[instrument(skip(self, request), fields(partitions = request.partitions.len()))]
    async fn elect_preferred_leaders(&self, request: &ElectionRequest) -> Result<()> {
        let payload = request.to_json()?;
        self.run_with_payload(&self.tool(ELECTION_TOOL), &payload, &["--path-to-json-file"])
            .await?;
        Ok(())
    }
}
