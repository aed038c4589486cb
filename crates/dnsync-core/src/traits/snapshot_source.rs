// # Snapshot Source Trait
//
// Defines the interface for reading the current tasks of an application.
//
// ## Implementations
//
// - Marathon REST API: `dnsync-marathon` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskState {
    #[serde(rename = "TASK_STAGING")]
    Staging,
    #[serde(rename = "TASK_STARTING")]
    Starting,
    #[serde(rename = "TASK_RUNNING")]
    Running,
    #[serde(rename = "TASK_FINISHED")]
    Finished,
    #[serde(rename = "TASK_FAILED")]
    Failed,
    #[serde(rename = "TASK_KILLING")]
    Killing,
    #[serde(rename = "TASK_KILLED")]
    Killed,
    #[serde(rename = "TASK_LOST")]
    Lost,
    /// Any state this crate does not know about
    #[default]
    #[serde(other)]
    Unknown,
}

/// One address of a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskAddress {
    /// The address, e.g. "10.0.0.1"
    #[serde(rename = "ipAddress")]
    pub address: String,
    /// "IPv4" or "IPv6"
    pub protocol: String,
}

impl TaskAddress {
    /// Create a task address
    pub fn new(address: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            protocol: protocol.into(),
        }
    }

    /// Whether this is an IPv4 address
    pub fn is_ipv4(&self) -> bool {
        self.protocol == "IPv4"
    }
}

/// One task of the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    /// Task id
    pub id: String,
    /// Current lifecycle state
    #[serde(default)]
    pub state: TaskState,
    /// Addresses assigned to the task
    #[serde(rename = "ipAddresses", default)]
    pub addresses: Vec<TaskAddress>,
}

/// Point-in-time view of an application's tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSnapshot {
    /// All tasks, in whatever state
    pub instances: Vec<InstanceDescriptor>,
}

impl AppSnapshot {
    /// Create a snapshot from task descriptors
    pub fn new(instances: Vec<InstanceDescriptor>) -> Self {
        Self { instances }
    }

    /// IPv4 addresses of running tasks, sorted and deduplicated
    pub fn desired_addresses(&self) -> BTreeSet<String> {
        self.instances
            .iter()
            .filter(|task| task.state == TaskState::Running)
            .flat_map(|task| task.addresses.iter())
            .filter(|addr| addr.is_ipv4())
            .map(|addr| addr.address.clone())
            .collect()
    }
}

/// Trait for orchestrator snapshot implementations
///
/// Any error returned here is fatal to the driver loop; implementations should
/// report it as [`crate::Error::Snapshot`].
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current tasks of `app_id`
    async fn fetch_snapshot(&self, app_id: &str) -> Result<AppSnapshot, crate::Error>;
}
