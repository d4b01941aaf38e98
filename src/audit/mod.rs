//! Verdict and repair audit log
//!
//! One record per candidate per schema version (payload, verdict,
//! proposed fixes) and one per repair decision (subject, acceptance,
//! outcome). Append-only: no outcome is ever silently swallowed, and
//! every discarded candidate carries its machine-readable reason.

use crate::candidate::{CandidateId, TripleCandidate};
use crate::repair::RepairAction;
use crate::schema::SchemaVersion;
use crate::store::TripleId;
use crate::validate::{RepairFinding, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// What a single audit record describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A candidate was judged under a schema version
    Verdict {
        candidate: TripleCandidate,
        schema_version: SchemaVersion,
        verdict: Verdict,
    },
    /// A candidate reached a terminal Committed state
    Committed {
        candidate: CandidateId,
        triple: TripleId,
    },
    /// A candidate reached a terminal Discarded state
    Discarded {
        candidate: CandidateId,
        reason: String,
    },
    /// A repair decision was made, with its outcome
    Repair {
        subject: RepairSubject,
        accepted: bool,
        outcome: String,
    },
}

/// What a repair decision was about: a concrete action applied to the
/// committed graph, or a queued candidate's proposed fixes decided
/// before any commit existed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum RepairSubject {
    Action { action: RepairAction },
    Proposal {
        candidate: CandidateId,
        findings: Vec<RepairFinding>,
    },
}

/// One timestamped audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Append-only audit log, safe for concurrent writers
#[derive(Debug, Default)]
pub struct AuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: AuditEvent) {
        self.records
            .write()
            .expect("audit log lock poisoned")
            .push(AuditRecord {
                at: Utc::now(),
                event,
            });
    }

    pub fn record_verdict(
        &self,
        candidate: &TripleCandidate,
        schema_version: &SchemaVersion,
        verdict: &Verdict,
    ) {
        self.push(AuditEvent::Verdict {
            candidate: candidate.clone(),
            schema_version: schema_version.clone(),
            verdict: verdict.clone(),
        });
    }

    pub fn record_commit(&self, candidate: CandidateId, triple: TripleId) {
        self.push(AuditEvent::Committed { candidate, triple });
    }

    pub fn record_discard(&self, candidate: CandidateId, reason: impl Into<String>) {
        self.push(AuditEvent::Discarded {
            candidate,
            reason: reason.into(),
        });
    }

    pub fn record_repair(&self, action: &RepairAction, accepted: bool, outcome: impl Into<String>) {
        self.push(AuditEvent::Repair {
            subject: RepairSubject::Action {
                action: action.clone(),
            },
            accepted,
            outcome: outcome.into(),
        });
    }

    /// Record a user rejection of a queued candidate's proposed fixes
    pub fn record_rejection(&self, candidate: CandidateId, findings: &[RepairFinding]) {
        self.push(AuditEvent::Repair {
            subject: RepairSubject::Proposal {
                candidate,
                findings: findings.to_vec(),
            },
            accepted: false,
            outcome: "rejected by user".to_string(),
        });
    }

    /// All records (cloned view)
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .expect("audit log lock poisoned")
            .clone()
    }

    /// The verdict recorded for a candidate under a schema version
    pub fn verdict_for(
        &self,
        candidate: CandidateId,
        schema_version: &SchemaVersion,
    ) -> Option<Verdict> {
        self.records
            .read()
            .expect("audit log lock poisoned")
            .iter()
            .find_map(|r| match &r.event {
                AuditEvent::Verdict {
                    candidate: c,
                    schema_version: v,
                    verdict,
                } if c.id == candidate && v == schema_version => Some(verdict.clone()),
                _ => None,
            })
    }

    /// Records touching one candidate, in order
    pub fn for_candidate(&self, candidate: CandidateId) -> Vec<AuditRecord> {
        self.records
            .read()
            .expect("audit log lock poisoned")
            .iter()
            .filter(|r| match &r.event {
                AuditEvent::Verdict { candidate: c, .. } => c.id == candidate,
                AuditEvent::Committed { candidate: c, .. } => *c == candidate,
                AuditEvent::Discarded { candidate: c, .. } => *c == candidate,
                AuditEvent::Repair {
                    subject: RepairSubject::Proposal { candidate: c, .. },
                    ..
                } => *c == candidate,
                AuditEvent::Repair { .. } => false,
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a previously persisted record (used by the storage layer)
    pub fn restore_record(&self, record: AuditRecord) {
        self.records
            .write()
            .expect("audit log lock poisoned")
            .push(record);
    }
}
