//! Status update events emitted by Marathon

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::{TaskAddress, TaskState};

/// Event type of task status changes on the Marathon event bus
pub const STATUS_UPDATE_EVENT: &str = "status_update_event";

/// Payload of a `status_update_event`
///
/// Only `app_id` is used to decide relevance; the rest is carried along for
/// logging.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusUpdate {
    pub event_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub slave_id: String,
    pub task_id: String,
    pub task_status: TaskState,
    pub message: String,
    pub app_id: String,
    pub host: String,
    pub ip_addresses: Vec<TaskAddress>,
    pub ports: Vec<u32>,
    pub version: Option<DateTime<Utc>>,
}
