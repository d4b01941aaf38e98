//! The ordered validation rules
//!
//! Rules are tagged variants evaluated in a fixed order: predicate
//! whitelist, grounding, domain, range. Each is a pure predicate over
//! (candidate, context). Evaluation short-circuits on the first
//! `Invalid` but accumulates `Repairable` findings.

use super::verdict::{InvalidReason, RepairFinding};
use crate::candidate::{ObjectTerm, TripleCandidate};
use crate::canon::normalize_label;
use crate::schema::RangeConstraint;

use super::ValidationContext;

/// Outcome of one rule against one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Pass,
    Finding(RepairFinding),
    Fail(InvalidReason),
}

/// State threaded through the rule sequence.
///
/// The whitelist rule may substitute a synonym; later rules check
/// domain/range against the substituted predicate so one review covers
/// the whole triple.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Canonical predicate the class rules should check against
    pub effective_predicate: Option<String>,
    pub findings: Vec<RepairFinding>,
}

/// The validation rules, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    PredicateWhitelist,
    Grounding,
    Domain,
    Range,
}

impl Rule {
    /// The default ordered rule sequence.
    ///
    /// Grounding runs before the class rules: a triple with no evidence
    /// is never worth validating further.
    pub fn ordered() -> Vec<Rule> {
        vec![
            Rule::PredicateWhitelist,
            Rule::Grounding,
            Rule::Domain,
            Rule::Range,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rule::PredicateWhitelist => "predicate_whitelist",
            Rule::Grounding => "grounding",
            Rule::Domain => "domain",
            Rule::Range => "range",
        }
    }

    pub fn evaluate(
        &self,
        candidate: &TripleCandidate,
        eval: &mut Evaluation,
        ctx: &ValidationContext<'_>,
    ) -> RuleOutcome {
        match self {
            Rule::PredicateWhitelist => whitelist(candidate, eval, ctx),
            Rule::Grounding => grounding(candidate, ctx),
            Rule::Domain => domain(candidate, eval, ctx),
            Rule::Range => range(candidate, eval, ctx),
        }
    }
}

fn whitelist(
    candidate: &TripleCandidate,
    eval: &mut Evaluation,
    ctx: &ValidationContext<'_>,
) -> RuleOutcome {
    let surface = candidate.predicate.trim();
    if ctx.schema.predicate(surface).is_some() {
        eval.effective_predicate = Some(surface.to_string());
        return RuleOutcome::Pass;
    }
    if let Some(canonical) = ctx.schema.canonical_for(surface) {
        eval.effective_predicate = Some(canonical.to_string());
        return RuleOutcome::Finding(RepairFinding::PredicateSubstitution {
            surface: surface.to_string(),
            canonical: canonical.to_string(),
        });
    }
    RuleOutcome::Fail(InvalidReason::UnknownPredicate {
        predicate: surface.to_string(),
    })
}

fn grounding(candidate: &TripleCandidate, ctx: &ValidationContext<'_>) -> RuleOutcome {
    let span = &candidate.grounding;
    if span.is_empty() {
        return RuleOutcome::Fail(InvalidReason::MissingGrounding {
            detail: format!("empty span [{}, {}]", span.start, span.end),
        });
    }
    if !ctx.documents.contains(&span.doc_id) {
        return RuleOutcome::Fail(InvalidReason::MissingGrounding {
            detail: format!("unknown document: {}", span.doc_id),
        });
    }
    if !ctx.documents.span_in_bounds(span) {
        return RuleOutcome::Fail(InvalidReason::MissingGrounding {
            detail: format!(
                "span [{}, {}] out of bounds for {}",
                span.start, span.end, span.doc_id
            ),
        });
    }
    RuleOutcome::Pass
}

fn domain(
    candidate: &TripleCandidate,
    eval: &mut Evaluation,
    ctx: &ValidationContext<'_>,
) -> RuleOutcome {
    let Some(def) = effective_def(eval, ctx) else {
        return RuleOutcome::Pass; // whitelist already failed or found nothing
    };
    if ctx
        .schema
        .is_class_or_descendant(&candidate.subject.class, &def.domain)
    {
        RuleOutcome::Pass
    } else {
        RuleOutcome::Fail(InvalidReason::DomainViolation {
            predicate: def.name.clone(),
            expected: def.domain.clone(),
            found: candidate.subject.class.clone(),
        })
    }
}

fn range(
    candidate: &TripleCandidate,
    eval: &mut Evaluation,
    ctx: &ValidationContext<'_>,
) -> RuleOutcome {
    let Some(def) = effective_def(eval, ctx) else {
        return RuleOutcome::Pass;
    };
    let (range, name) = (def.range.clone(), def.name.clone());
    match (&range, &candidate.object) {
        (RangeConstraint::Literal { literal }, ObjectTerm::Literal { literal_type, .. }) => {
            if literal_type == literal {
                RuleOutcome::Pass
            } else {
                RuleOutcome::Fail(InvalidReason::RangeViolation {
                    predicate: name,
                    expected: format!("literal:{}", literal),
                    found: format!("literal:{}", literal_type),
                })
            }
        }
        (RangeConstraint::Literal { literal }, ObjectTerm::Mention(m)) => {
            RuleOutcome::Fail(InvalidReason::RangeViolation {
                predicate: name,
                expected: format!("literal:{}", literal),
                found: m.class.clone(),
            })
        }
        (RangeConstraint::Class(expected), ObjectTerm::Literal { literal_type, .. }) => {
            RuleOutcome::Fail(InvalidReason::RangeViolation {
                predicate: name,
                expected: expected.clone(),
                found: format!("literal:{}", literal_type),
            })
        }
        (RangeConstraint::Class(expected), ObjectTerm::Mention(mention)) => {
            if !ctx.schema.is_class_or_descendant(&mention.class, expected) {
                return RuleOutcome::Fail(InvalidReason::RangeViolation {
                    predicate: name,
                    expected: expected.clone(),
                    found: mention.class.clone(),
                });
            }
            // Near-collision check: the mention matches an existing
            // entity above the merge threshold but under a different
            // surface form, so merging needs review. A form already
            // attached to the entity (its label or a recorded alias)
            // passes without re-review.
            let norm = normalize_label(&mention.text);
            if let Some((existing, score)) = ctx.registry.best_match(&mention.class, &norm) {
                if score >= ctx.merge_threshold {
                    if let Some(entity) = ctx.registry.entity(&existing) {
                        let attached = entity.normalized_label == norm
                            || entity.aliases.iter().any(|a| normalize_label(a) == norm);
                        if !attached {
                            return RuleOutcome::Finding(RepairFinding::EntityMerge {
                                mention: mention.text.clone(),
                                class: mention.class.clone(),
                                existing,
                            });
                        }
                    }
                }
            }
            RuleOutcome::Pass
        }
    }
}

fn effective_def<'a>(
    eval: &Evaluation,
    ctx: &ValidationContext<'a>,
) -> Option<&'a crate::schema::PredicateDef> {
    eval.effective_predicate
        .as_deref()
        .and_then(|p| ctx.schema.predicate(p))
}
