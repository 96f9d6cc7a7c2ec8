use std::collections::BTreeMap;

use crate::net::OscMessage;
use crate::variable::VariableDirectory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Messages read from the socket this tick.
    pub drained: usize,
    /// Distinct addresses left after coalescing.
    pub addresses: usize,
    pub applied: usize,
    pub unknown: usize,
    pub mismatched: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.drained == 0
    }
}

/// Keeps only the last drained message per stripped address.
pub fn coalesce(messages: Vec<OscMessage>) -> BTreeMap<String, OscMessage> {
    let mut latest = BTreeMap::new();
    for message in messages {
        latest.insert(message.stripped_address().to_string(), message);
    }
    latest
}

/// Applies a coalesced batch. The caller holds the directory lock for the whole call.
pub fn apply_batch(
    variables: &mut VariableDirectory,
    batch: &BTreeMap<String, OscMessage>,
) -> TickReport {
    let mut report = TickReport {
        addresses: batch.len(),
        ..Default::default()
    };

    for (address, message) in batch {
        let Some(variable) = variables.get_mut(address) else {
            report.unknown += 1;
            continue;
        };

        if variable.apply_args(&message.args) {
            report.applied += 1;
        } else {
            report.mismatched += 1;
            log::debug!(
                "Ignored {} for {} variable '{}': no matching argument",
                message,
                variable.kind(),
                address
            );
        }
    }

    report
}
