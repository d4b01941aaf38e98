//! Stateless triple validation against a schema snapshot

mod rules;
mod verdict;

pub use rules::{Evaluation, Rule, RuleOutcome};
pub use verdict::{InvalidReason, RepairFinding, Verdict};

use crate::candidate::{DocumentCatalog, TripleCandidate};
use crate::canon::EntityRegistry;
use crate::schema::SchemaSnapshot;
use tracing::debug;

/// Read-only state a validation pass runs against.
///
/// Validation is pure over this context: safe to run across a worker
/// pool, one context per schema snapshot.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub schema: &'a SchemaSnapshot,
    pub registry: &'a EntityRegistry,
    pub documents: &'a DocumentCatalog,
    pub merge_threshold: f64,
}

/// The rule engine: an ordered, composable sequence of rules.
#[derive(Debug)]
pub struct Validator {
    rules: Vec<Rule>,
}

impl Validator {
    /// Validator with the default rule order
    pub fn new() -> Self {
        Self {
            rules: Rule::ordered(),
        }
    }

    /// Validator with an explicit rule sequence
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Produce exactly one verdict for the candidate under the context's
    /// schema snapshot.
    ///
    /// Fail-closed: the first `Invalid` short-circuits. `Repairable`
    /// findings accumulate across rules into a single verdict.
    pub fn validate(&self, candidate: &TripleCandidate, ctx: &ValidationContext<'_>) -> Verdict {
        let mut eval = Evaluation::default();
        for rule in &self.rules {
            match rule.evaluate(candidate, &mut eval, ctx) {
                RuleOutcome::Pass => {}
                RuleOutcome::Finding(finding) => eval.findings.push(finding),
                RuleOutcome::Fail(reason) => {
                    debug!(
                        candidate = %candidate.id,
                        rule = rule.name(),
                        %reason,
                        "candidate invalid"
                    );
                    return Verdict::Invalid { reason };
                }
            }
        }
        if eval.findings.is_empty() {
            Verdict::Valid
        } else {
            debug!(
                candidate = %candidate.id,
                findings = eval.findings.len(),
                "candidate repairable"
            );
            Verdict::Repairable {
                findings: eval.findings,
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
