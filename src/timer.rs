use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::stack::CommissioningMode;
use crate::NodeEvent;

/// Work that can be deferred to a later turn of the node loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    StartCommissioning(CommissioningMode),
}

/// One-shot scheduler. A scheduled task cannot be cancelled.
pub trait Timer {
    fn schedule_once(&self, delay: Duration, task: DeferredTask);
}

/// Delivers due tasks back into the node event queue. Must be used from
/// within a tokio runtime.
#[derive(Clone)]
pub struct TokioTimer {
    events: mpsc::Sender<NodeEvent>,
}

impl TokioTimer {
    pub fn new(events: mpsc::Sender<NodeEvent>) -> Self {
        Self { events }
    }
}

impl Timer for TokioTimer {
    fn schedule_once(&self, delay: Duration, task: DeferredTask) {
        debug!("Scheduling {:?} in {:?}", task, delay);
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(NodeEvent::Deferred(task)).await.is_err() {
                warn!("Node loop gone, dropping deferred {:?}", task);
            }
        });
    }
}
