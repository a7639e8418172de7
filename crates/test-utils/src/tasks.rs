//! Export tasks with scripted status sequences.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use catalog::{ExportTask, TaskState};
use imagery_common::{ImageryError, ImageryResult};

/// One scripted answer to a status poll.
#[derive(Debug, Clone)]
pub enum ScriptedStatus {
    State(TaskState),
    /// The poll itself fails.
    PollError(String),
}

/// Task that replays a fixed list of statuses, repeating the last one.
#[derive(Debug)]
pub struct ScriptedTask {
    id: String,
    description: String,
    script: Mutex<VecDeque<ScriptedStatus>>,
    last: Mutex<TaskState>,
    polls: Arc<AtomicUsize>,
}

impl ScriptedTask {
    pub fn new(id: &str, statuses: Vec<ScriptedStatus>) -> Self {
        Self {
            id: id.to_string(),
            description: format!("{}_export", id),
            script: Mutex::new(statuses.into()),
            last: Mutex::new(TaskState::Pending),
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Task moving through the given states, one per poll.
    pub fn with_states(id: &str, states: Vec<TaskState>) -> Self {
        Self::new(id, states.into_iter().map(ScriptedStatus::State).collect())
    }

    /// Shared counter of status polls.
    pub fn poll_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }

    pub fn boxed(self) -> Box<dyn ExportTask> {
        Box::new(self)
    }
}

#[async_trait]
impl ExportTask for ScriptedTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn status(&self) -> ImageryResult<TaskState> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        let mut last = self.last.lock().expect("state lock");
        match next {
            Some(ScriptedStatus::State(state)) => {
                *last = state.clone();
                Ok(state)
            }
            Some(ScriptedStatus::PollError(message)) => Err(ImageryError::Export(message)),
            None => Ok(last.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_then_repeats_last() {
        let task = ScriptedTask::with_states("t1", vec![TaskState::Running, TaskState::Completed]);
        let polls = task.poll_counter();
        assert_eq!(task.status().await.unwrap(), TaskState::Running);
        assert_eq!(task.status().await.unwrap(), TaskState::Completed);
        assert_eq!(task.status().await.unwrap(), TaskState::Completed);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_error() {
        let task = ScriptedTask::new(
            "t2",
            vec![ScriptedStatus::PollError("timeout".into())],
        );
        assert!(task.status().await.is_err());
        assert_eq!(task.status().await.unwrap(), TaskState::Pending);
    }
}
