//! CI Classification
//!
//! Decides which workflows a test tier compiles and executes, and maps
//! their outcomes to verdicts using the inference policy:
//!
//! | listed in              | failure          | success              |
//! |------------------------|------------------|----------------------|
//! | `run_partial_failures` | ExpectedFailure  | UnexpectedSuccess    |
//! | `run_blacklist`        | ExpectedFailure  | Passed               |
//! | neither                | Failed           | Passed               |

use std::fmt;

use crate::error::InferenceError;
use crate::policy::InferencePolicy;

/// Test tier a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    /// Every push.
    #[default]
    Regular,
    /// Low-frequency, resource-intensive runs.
    Weekly,
}

/// What a tier does with one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub compile: bool,
    pub execute: bool,
}

/// Classification of one workflow's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// Failed as the policy expects.
    ExpectedFailure,
    /// Listed as a partial failure but succeeded; anomalous.
    UnexpectedSuccess,
    Failed,
}

impl Verdict {
    pub fn is_passing(self) -> bool {
        matches!(self, Verdict::Passed | Verdict::ExpectedFailure)
    }

    pub fn exit_code(self) -> u8 {
        if self.is_passing() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::ExpectedFailure => write!(f, "EXPECTED FAILURE"),
            Verdict::UnexpectedSuccess => write!(f, "UNEXPECTED SUCCESS"),
            Verdict::Failed => write!(f, "FAILED"),
        }
    }
}

/// True when `tier` should handle `id` at all.
pub fn should_run(policy: &InferencePolicy, id: &str, tier: Tier) -> bool {
    match tier {
        Tier::Regular => !policy.is_weekly(id),
        Tier::Weekly => true,
    }
}

/// Compile/execute decision for `id` in `tier`. Blacklisted workflows are
/// still compiled, so their expected failure is checked, but never executed.
pub fn plan(policy: &InferencePolicy, id: &str, tier: Tier) -> Plan {
    let runs = should_run(policy, id, tier);
    Plan {
        compile: runs,
        execute: runs && !policy.is_blacklisted(id),
    }
}

/// Classifies an outcome of `id`.
pub fn classify(policy: &InferencePolicy, id: &str, succeeded: bool) -> Verdict {
    if policy.expects_failure(id) {
        return if succeeded {
            Verdict::UnexpectedSuccess
        } else {
            Verdict::ExpectedFailure
        };
    }
    match (succeeded, policy.is_blacklisted(id)) {
        (true, _) => Verdict::Passed,
        (false, true) => Verdict::ExpectedFailure,
        (false, false) => Verdict::Failed,
    }
}

/// Classifies a compilation result.
pub fn classify_result<T>(
    policy: &InferencePolicy,
    id: &str,
    result: &Result<T, InferenceError>,
) -> Verdict {
    classify(policy, id, result.is_ok())
}

/// Process exit code for a batch: 0 when every verdict passes.
pub fn exit_code(verdicts: &[Verdict]) -> u8 {
    verdicts
        .iter()
        .map(|verdict| verdict.exit_code())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{InferenceEngine, InferenceOptions, NamingConventions};
    use crate::types::{PortType, TypeHierarchy};
    use crate::workflow::{DraftGraph, Port, Step};

    fn policy() -> InferencePolicy {
        InferencePolicy::new()
            .with_blacklisted("append_twice")
            .with_blacklisted("test_rand_fail")
            .with_partial_failure("test_rand_fail")
            .with_weekly("gromacs")
    }

    #[test]
    fn test_blacklisted_fragment_failure_is_expected() {
        let draft = DraftGraph::new("append_twice")
            .with_step(
                Step::new("append_1", "append.cwl")
                    .with_input(Port::input("file", PortType::file()))
                    .with_output(Port::output("out", PortType::file())),
            )
            .with_step(
                Step::new("append_2", "append.cwl")
                    .with_input(Port::input("file", PortType::file()))
                    .with_output(Port::output("out", PortType::file())),
            );

        let hierarchy = TypeHierarchy::new();
        let naming = NamingConventions::default();
        let result = InferenceEngine::new(&hierarchy, &naming, InferenceOptions::default()).infer(draft);

        let err = result.as_ref().unwrap_err();
        assert!(err.is_expected_for_fragment());

        let verdict = classify_result(&policy(), "append_twice", &result);
        assert_eq!(verdict, Verdict::ExpectedFailure);
        assert!(verdict.is_passing());
        assert_eq!(exit_code(&[verdict]), 0);
    }

    #[test]
    fn test_partial_failure_success_is_anomalous() {
        let policy = policy();
        let plan = plan(&policy, "test_rand_fail", Tier::Regular);
        assert!(plan.compile);
        assert!(!plan.execute);

        for _ in 0..3 {
            assert_eq!(classify(&policy, "test_rand_fail", false), Verdict::ExpectedFailure);
        }
        let anomalous = classify(&policy, "test_rand_fail", true);
        assert_eq!(anomalous, Verdict::UnexpectedSuccess);
        assert!(!anomalous.is_passing());
        assert_eq!(exit_code(&[Verdict::Passed, anomalous]), 1);
    }

    #[test]
    fn test_unlisted_workflows() {
        let policy = policy();
        assert_eq!(classify(&policy, "hello", true), Verdict::Passed);
        assert_eq!(classify(&policy, "hello", false), Verdict::Failed);
        assert_eq!(
            plan(&policy, "hello", Tier::Regular),
            Plan {
                compile: true,
                execute: true
            }
        );
    }

    #[test]
    fn test_weekly_tier_gating() {
        let policy = policy();
        assert!(!should_run(&policy, "gromacs", Tier::Regular));
        assert!(should_run(&policy, "gromacs", Tier::Weekly));
        assert!(!plan(&policy, "gromacs", Tier::Regular).compile);
        assert!(plan(&policy, "gromacs", Tier::Weekly).execute);
    }

    #[test]
    fn test_empty_batch_passes() {
        assert_eq!(exit_code(&[]), 0);
        assert_eq!(Verdict::UnexpectedSuccess.to_string(), "UNEXPECTED SUCCESS");
    }
}
