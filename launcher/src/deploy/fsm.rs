//! Finite state machine for cluster deletion

use serde::{Deserialize, Serialize};

/// Cluster deletion state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionState {
    /// Nothing attempted yet
    Pending,

    /// Delete request in flight
    Deleting,

    /// Delete refused because tasks are still running; polling
    AwaitingDrain,

    /// Cluster deleted
    Deleted,

    /// Delete or poll failed
    Failed,

    /// Gave up waiting for tasks to stop
    TimedOut,

    /// Interrupted by the user
    Cancelled,
}

/// Cluster deletion event
#[derive(Debug, Clone)]
pub enum DeletionEvent {
    /// Issue the delete request
    Delete,

    /// Delete accepted
    DeleteSucceeded,

    /// Delete refused, cluster still contains tasks
    ContainsTasks,

    /// Poll found this many tasks still running
    TasksRemaining(usize),

    /// Poll found no tasks
    Drained,

    /// Delete or poll failed
    Failed(String),

    /// Drain deadline passed
    TimedOut,

    /// Shutdown requested
    Cancel,
}

/// Cluster deletion FSM
#[derive(Debug, Clone)]
pub struct ClusterDeletionFsm {
    state: DeletionState,
    error: Option<String>,
    delete_attempts: u32,
    polls: u32,
}

impl ClusterDeletionFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeletionState::Pending,
            error: None,
            delete_attempts: 0,
            polls: 0,
        }
    }

    pub fn state(&self) -> &DeletionState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of delete requests issued
    pub fn delete_attempts(&self) -> u32 {
        self.delete_attempts
    }

    /// Number of task-list polls made while draining
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            DeletionState::Deleted
                | DeletionState::Failed
                | DeletionState::TimedOut
                | DeletionState::Cancelled
        )
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeletionEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            // From Pending
            (DeletionState::Pending, DeletionEvent::Delete) => {
                self.delete_attempts += 1;
                DeletionState::Deleting
            }

            // From Deleting
            (DeletionState::Deleting, DeletionEvent::DeleteSucceeded) => DeletionState::Deleted,
            (DeletionState::Deleting, DeletionEvent::ContainsTasks) => {
                DeletionState::AwaitingDrain
            }
            (DeletionState::Deleting, DeletionEvent::Failed(err)) => {
                self.error = Some(err.clone());
                DeletionState::Failed
            }

            // From AwaitingDrain
            (DeletionState::AwaitingDrain, DeletionEvent::TasksRemaining(_)) => {
                self.polls += 1;
                DeletionState::AwaitingDrain
            }
            (DeletionState::AwaitingDrain, DeletionEvent::Drained) => {
                self.polls += 1;
                DeletionState::AwaitingDrain
            }
            (DeletionState::AwaitingDrain, DeletionEvent::Delete) => {
                self.delete_attempts += 1;
                DeletionState::Deleting
            }
            (DeletionState::AwaitingDrain, DeletionEvent::Failed(err)) => {
                self.error = Some(err.clone());
                DeletionState::Failed
            }
            (DeletionState::AwaitingDrain, DeletionEvent::TimedOut) => DeletionState::TimedOut,
            (DeletionState::AwaitingDrain, DeletionEvent::Cancel) => DeletionState::Cancelled,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for ClusterDeletionFsm {
    fn default() -> Self {
        Self::new()
    }
}
