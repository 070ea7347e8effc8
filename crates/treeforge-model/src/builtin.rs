//! Built-in node models
//!
//! Models every document set starts with. They cannot be removed or renamed.

use crate::kind::NodeKind;
use crate::model::NodeModel;
use crate::port::PortModel;

/// Registration id of the document entry node
pub const ROOT_MODEL_ID: &str = "Root";

const CONTROLS: [&str; 5] = [
    "Sequence",
    "Fallback",
    "ReactiveSequence",
    "ReactiveFallback",
    "SequenceStar",
];

const DECORATORS: [&str; 3] = ["Inverter", "ForceSuccess", "ForceFailure"];

const ACTIONS: [&str; 2] = ["AlwaysSuccess", "AlwaysFailure"];

/// All built-in models, in palette order
#[must_use]
pub fn builtin_models() -> Vec<NodeModel> {
    let mut models = vec![NodeModel::new(NodeKind::Root, ROOT_MODEL_ID)];

    models.extend(CONTROLS.iter().map(|id| NodeModel::new(NodeKind::Control, *id)));
    models.push(
        NodeModel::new(NodeKind::Control, "Parallel")
            .with_port("success_threshold", PortModel::input().with_default("1"))
            .with_port("failure_threshold", PortModel::input().with_default("1")),
    );

    models.extend(DECORATORS.iter().map(|id| NodeModel::new(NodeKind::Decorator, *id)));
    models.push(
        NodeModel::new(NodeKind::Decorator, "RetryUntilSuccessful")
            .with_port("num_attempts", PortModel::input().required()),
    );
    models.push(
        NodeModel::new(NodeKind::Decorator, "Repeat")
            .with_port("num_cycles", PortModel::input().required()),
    );
    models.push(
        NodeModel::new(NodeKind::Decorator, "Timeout")
            .with_port("msec", PortModel::input().required()),
    );

    models.extend(ACTIONS.iter().map(|id| NodeModel::new(NodeKind::Action, *id)));
    models.push(
        NodeModel::new(NodeKind::Action, "SetBlackboard")
            .with_port("key", PortModel::inout())
            .with_port("value", PortModel::input()),
    );

    models
}

/// Check whether `id` names a built-in model
#[must_use]
pub fn is_builtin(id: &str) -> bool {
    id == ROOT_MODEL_ID
        || id == "Parallel"
        || id == "RetryUntilSuccessful"
        || id == "Repeat"
        || id == "Timeout"
        || id == "SetBlackboard"
        || CONTROLS.contains(&id)
        || DECORATORS.contains(&id)
        || ACTIONS.contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_ids_are_unique_and_recognized() {
        let models = builtin_models();
        let ids: HashSet<_> = models.iter().map(|m| m.registration_id.as_str()).collect();
        assert_eq!(ids.len(), models.len());
        for model in &models {
            assert!(is_builtin(&model.registration_id), "{}", model.registration_id);
        }
        assert!(!is_builtin("OpenDoor"));
    }

    #[test]
    fn exactly_one_root_model() {
        let roots = builtin_models()
            .into_iter()
            .filter(|m| m.kind == NodeKind::Root)
            .count();
        assert_eq!(roots, 1);
    }
}
