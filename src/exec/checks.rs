use std::collections::BTreeSet;

use serde_json::Value;

use registry::ContextView;

/// Decides whether the input can satisfy a module's declared requirements.
pub trait RequirementCheck {
    /// Requirements from `requirements` that `ctx` can't satisfy, in order.
    fn unmet(&self, requirements: &BTreeSet<String>, ctx: &ContextView) -> Vec<String>;
}

/// A requirement is met when the input is an object with a non-null
/// member of the same name.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputKeys;

impl RequirementCheck for InputKeys {
    fn unmet(&self, requirements: &BTreeSet<String>, ctx: &ContextView) -> Vec<String> {
        requirements
            .iter()
            .filter(|r| ctx.input().get(r.as_str()).map_or(true, Value::is_null))
            .cloned()
            .collect()
    }
}

/// Structural check on the input, run once before any module.
pub trait InputCheck {
    fn check(&self, input: &Value) -> anyhow::Result<()>;
}

impl<F> InputCheck for F
where
    F: Fn(&Value) -> anyhow::Result<()>,
{
    fn check(&self, input: &Value) -> anyhow::Result<()> {
        self(input)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use registry::{ExecutionContext, Flags};
    use serde_json::json;

    #[test]
    fn test_input_keys() {
        let ctx = ExecutionContext::new(
            json!({"segments": [1], "speaker_labels": null}),
            Flags::new(),
        );
        let reqs: BTreeSet<String> = ["audio", "segments", "speaker_labels"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            InputKeys.unmet(&reqs, &ctx.view()),
            vec!["audio", "speaker_labels"]
        );
    }
}
