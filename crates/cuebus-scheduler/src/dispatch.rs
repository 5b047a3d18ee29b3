use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

use cuebus_core::{Command, Target, TargetId};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::condition::evaluate;
use crate::registry::TargetAddress;
use crate::transport::{Batch, Message, Transport};

/// A batch bound for one resolved target.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSend {
    pub target_id: TargetId,
    pub addr: TargetAddress,
    pub batch: Batch,
}

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Targets whose batch was handed to the transport successfully.
    pub sent: usize,
    /// Targets whose send failed.
    pub failed: usize,
    /// Commands dropped because the target is gone, the command is inactive,
    /// or its condition did not hold.
    pub skipped: usize,
}

/// Filter commands and build one batch per target, in target id order.
///
/// Returns the planned sends and the number of commands skipped.
pub fn plan(
    commands: &[Command],
    targets: &[Target],
    iteration: u64,
    timestamp: SystemTime,
) -> (Vec<PlannedSend>, usize) {
    let addresses: HashMap<TargetId, TargetAddress> =
        targets.iter().map(|t| (t.id, TargetAddress::from(t))).collect();

    let mut by_target: BTreeMap<TargetId, Vec<Message>> = BTreeMap::new();
    let mut skipped = 0;
    for command in commands {
        let eligible = command.active
            && addresses.contains_key(&command.target_id)
            && evaluate(&command.condition, iteration);
        if !eligible {
            skipped += 1;
            continue;
        }
        by_target.entry(command.target_id).or_default().push(Message {
            tag: command.tag.clone(),
            arguments: command.arguments.clone(),
        });
    }

    let planned = by_target
        .into_iter()
        .filter_map(|(target_id, messages)| {
            let addr = addresses.get(&target_id)?.clone();
            Some(PlannedSend {
                target_id,
                addr,
                batch: Batch { messages, timestamp },
            })
        })
        .collect();
    (planned, skipped)
}

/// Sends a group's commands, one batch per target.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send every eligible command. Targets are sent to concurrently and a
    /// failing target never prevents delivery to the others.
    pub async fn dispatch(
        &self,
        commands: &[Command],
        targets: &[Target],
        iteration: u64,
    ) -> DispatchReport {
        let (planned, skipped) = plan(commands, targets, iteration, SystemTime::now());

        let sends = planned.iter().map(|p| async move {
            let result = self.transport.send(&p.addr, &p.batch).await;
            match &result {
                Ok(()) => debug!(
                    target_id = %p.target_id,
                    addr = %p.addr,
                    commands = p.batch.messages.len(),
                    "batch sent"
                ),
                Err(e) => warn!(
                    target_id = %p.target_id,
                    addr = %p.addr,
                    error = %e,
                    "batch send failed"
                ),
            }
            result.is_ok()
        });
        let results = join_all(sends).await;

        let sent = results.iter().filter(|ok| **ok).count();
        DispatchReport {
            sent,
            failed: results.len() - sent,
            skipped,
        }
    }
}
