use std::collections::HashSet;

use crate::net::OscMessage;
use crate::variable::Variable;

/// Outbound subscription state of one group.
///
/// Each variable holds at most one subscription. While suppressed, mutations do not
/// produce messages; the group resends every variable when the last suppression ends.
#[derive(Debug, Default)]
pub struct Propagator {
    subscriptions: HashSet<String>,
    suppression_depth: usize,
}

impl Propagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the variable was already subscribed.
    pub fn subscribe(&mut self, name: &str) -> bool {
        self.subscriptions.insert(name.to_string())
    }

    pub fn unsubscribe(&mut self, name: &str) -> bool {
        self.subscriptions.remove(name)
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.contains(name)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn suppress(&mut self) {
        self.suppression_depth += 1;
    }

    /// Ends one suppression level. Returns true when this closes the window.
    pub fn release(&mut self) -> bool {
        if self.suppression_depth == 0 {
            return false;
        }
        self.suppression_depth -= 1;
        self.suppression_depth == 0
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppression_depth > 0
    }

    pub fn suppression_depth(&self) -> usize {
        self.suppression_depth
    }

    pub fn should_send(&self, name: &str) -> bool {
        !self.is_suppressed() && self.is_subscribed(name)
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.suppression_depth = 0;
    }
}

pub fn outbound_address(group: &str, variable: &str) -> String {
    if group == variable {
        format!("/{}", group)
    } else {
        format!("/{}/{}", group, variable)
    }
}

/// One message carrying the clamped value; vectors go out as a single message.
pub fn outbound_message(group: &str, variable: &Variable) -> OscMessage {
    OscMessage::with_args(
        outbound_address(group, variable.name()),
        variable.outbound_args(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::OscArg;
    use crate::variable::{Bounds, VariableDirectory, VariableKind, VariableSpec};

    #[test]
    fn subscription_is_unique_per_variable() {
        let mut propagator = Propagator::new();
        assert!(propagator.subscribe("gain"));
        assert!(!propagator.subscribe("gain"));
        assert_eq!(propagator.subscription_count(), 1);

        assert!(propagator.unsubscribe("gain"));
        assert!(!propagator.should_send("gain"));
    }

    #[test]
    fn nested_suppression_closes_on_last_release() {
        let mut propagator = Propagator::new();
        propagator.subscribe("a");
        propagator.suppress();
        propagator.suppress();
        assert!(!propagator.should_send("a"));

        assert!(!propagator.release());
        assert!(propagator.is_suppressed());
        assert!(propagator.release());
        assert!(propagator.should_send("a"));
        assert!(!propagator.release());
    }

    #[test]
    fn address_collapses_matching_names() {
        assert_eq!(outbound_address("synth", "cutoff"), "/synth/cutoff");
        assert_eq!(outbound_address("synth", "synth"), "/synth");
    }

    #[test]
    fn vector_message_is_clamped_and_whole() {
        let mut dir = VariableDirectory::new();
        dir.insert(
            VariableSpec::new("steps", VariableKind::IntVector)
                .with_value(vec![-1, 5, 99])
                .with_bounds(Bounds::int(0, 10)),
        )
        .unwrap();

        let msg = outbound_message("seq", dir.get("steps").unwrap());
        assert_eq!(msg.address, "/seq/steps");
        assert_eq!(
            msg.args,
            vec![OscArg::Int(0), OscArg::Int(5), OscArg::Int(10)]
        );
    }
}
