//! Caller-driven review of candidates.
//!
//! Every candidate starts `Pending` and moves at most once to `Accepted`,
//! `Skipped`, `Renamed` or `Aborted`. A rename only sticks when the new name
//! rechecks cleanly; otherwise the candidate stays pending so the caller can
//! try again. Aborting stops the review but keeps earlier approvals.

use crate::error::{Error, Result};
use crate::model::QualifiedName;
use crate::renamer::Renamer;
use crate::session::Unexporter;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Accepted,
    Skipped,
    Renamed(String),
    Aborted,
}

impl Decision {
    fn label(&self) -> &'static str {
        match self {
            Decision::Pending => "pending",
            Decision::Accepted => "accepted",
            Decision::Skipped => "skipped",
            Decision::Renamed(_) => "renamed",
            Decision::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Review {
    decisions: BTreeMap<QualifiedName, Decision>,
    order: Vec<QualifiedName>,
}

impl Review {
    /// A review over `ids`, visited in the given order.
    pub fn new(ids: impl IntoIterator<Item = QualifiedName>) -> Self {
        let mut review = Self::default();
        for id in ids {
            if review.decisions.insert(id.clone(), Decision::Pending).is_none() {
                review.order.push(id);
            }
        }
        review
    }

    /// A review over every candidate of `session`, in source order.
    pub fn for_session<R: Renamer>(session: &Unexporter<R>) -> Self {
        Self::new(session.candidates().into_iter().map(|c| c.id.clone()))
    }

    pub fn decision(&self, id: &QualifiedName) -> Option<&Decision> {
        self.decisions.get(id)
    }

    /// Decisions in review order.
    pub fn decisions(&self) -> impl Iterator<Item = (&QualifiedName, &Decision)> {
        self.order.iter().map(|id| (id, &self.decisions[id]))
    }

    /// The next candidate still awaiting a decision.
    pub fn pending(&self) -> Option<&QualifiedName> {
        self.order
            .iter()
            .find(|id| self.decisions[*id] == Decision::Pending)
    }

    /// Accepts `id` as proposed, without comparing it to other approvals.
    /// [`Review::approve`] does that comparison up front.
    pub fn accept(&mut self, id: &QualifiedName) -> Result<()> {
        self.decide(id, Decision::Accepted)
    }

    pub fn skip(&mut self, id: &QualifiedName) -> Result<()> {
        self.decide(id, Decision::Skipped)
    }

    /// Accepts `id` unless its plan clashes with one already approved. The
    /// clash is returned and the candidate stays pending.
    pub fn approve<R: Renamer>(
        &mut self,
        session: &Unexporter<R>,
        id: &QualifiedName,
    ) -> Result<Option<String>> {
        self.ensure_pending(id)?;
        if let Some(conflict) = session.batch_conflict(self, id)? {
            return Ok(Some(conflict));
        }
        self.decide(id, Decision::Accepted)?;
        Ok(None)
    }

    /// Rechecks `id` under `to`, against the program and against the
    /// renames already approved. A clean result records the rename; a
    /// conflict is returned and the candidate stays pending.
    pub fn rename<R: Renamer>(
        &mut self,
        session: &mut Unexporter<R>,
        id: &QualifiedName,
        to: &str,
    ) -> Result<Option<String>> {
        self.ensure_pending(id)?;
        if let Some(conflict) = session.recheck(id, to)? {
            return Ok(Some(conflict));
        }
        if let Some(conflict) = session.batch_conflict(self, id)? {
            return Ok(Some(conflict));
        }
        self.decisions
            .insert(id.clone(), Decision::Renamed(to.to_string()));
        Ok(None)
    }

    /// Accepts every candidate still pending.
    pub fn accept_remaining(&mut self) {
        for decision in self.decisions.values_mut() {
            if *decision == Decision::Pending {
                *decision = Decision::Accepted;
            }
        }
    }

    /// Marks every pending candidate aborted.
    pub fn abort(&mut self) {
        for decision in self.decisions.values_mut() {
            if *decision == Decision::Pending {
                *decision = Decision::Aborted;
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.decisions.values().any(|d| *d == Decision::Aborted)
    }

    pub fn is_complete(&self) -> bool {
        self.pending().is_none()
    }

    /// Candidates accepted or renamed.
    pub fn approved(&self) -> Vec<&QualifiedName> {
        self.decisions()
            .filter(|(_, d)| matches!(d, Decision::Accepted | Decision::Renamed(_)))
            .map(|(id, _)| id)
            .collect()
    }

    fn ensure_pending(&self, id: &QualifiedName) -> Result<()> {
        match self.decisions.get(id) {
            None => Err(Error::UnknownCandidate(id.to_string())),
            Some(Decision::Pending) => Ok(()),
            Some(other) => Err(Error::AlreadyDecided {
                id: id.to_string(),
                state: other.label(),
            }),
        }
    }

    fn decide(&mut self, id: &QualifiedName, decision: Decision) -> Result<()> {
        self.ensure_pending(id)?;
        self.decisions.insert(id.clone(), decision);
        Ok(())
    }
}
