//! Candidate safety evaluation.
//!
//! Each raw candidate is checked independently: propose the unexported
//! spelling, ask the renamer for the closure and any conflict. Checks run on
//! the rayon pool and the results are collected once every candidate has one.
//! Conflicts are also reported as [`Warning`]s on an optional channel as they
//! are found; the channel is unbounded and send errors are ignored, so an
//! observer that never reads can't hold up evaluation.

use crate::analyzer::Candidate;
use crate::model::{DeclId, Program, QualifiedName, unexported_name};
use crate::renamer::Renamer;
use crate::satisfy::Analysis;
use rayon::prelude::*;
use std::sync::mpsc::Sender;
use tracing::debug;

/// A conflict found while evaluating a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub candidate: QualifiedName,
    pub message: String,
}

/// Evaluates every raw candidate in parallel. Returns one [`Candidate`] per
/// entry of `raw`, in the same order.
pub fn evaluate<R: Renamer + ?Sized>(
    program: &Program,
    analysis: &Analysis,
    renamer: &R,
    raw: &[DeclId],
    observer: Option<&Sender<Warning>>,
) -> Vec<Candidate> {
    // Resolve constraints up front so workers only ever read them.
    let constraints = analysis.constraints(program).len();
    debug!(candidates = raw.len(), constraints, "evaluating candidates");

    raw.par_iter()
        .map_with(observer.cloned(), |observer, &decl| {
            let candidate = evaluate_candidate(program, analysis, renamer, decl, None);
            if let (Some(tx), Some(conflict)) = (observer.as_ref(), &candidate.conflict) {
                let _ = tx.send(Warning {
                    candidate: candidate.id.clone(),
                    message: conflict.clone(),
                });
            }
            candidate
        })
        .collect()
}

/// Evaluates one declaration. `to` overrides the proposed name.
pub fn evaluate_candidate<R: Renamer + ?Sized>(
    program: &Program,
    analysis: &Analysis,
    renamer: &R,
    decl: DeclId,
    to: Option<&str>,
) -> Candidate {
    let d = program.decl(decl);
    let to = to.map_or_else(|| unexported_name(&d.name), str::to_string);
    let check = renamer.check(program, analysis, decl, &to);
    let id = program.qualified_name(decl);
    if let Some(conflict) = &check.conflict {
        debug!(candidate = %id, %to, conflict, "rename conflict");
    }

    Candidate {
        id,
        decl,
        kind: d.kind,
        file: program.file(d.pos.file).path.clone(),
        line: d.pos.line,
        column: d.pos.column,
        to,
        conflict: check.conflict,
        renames: check
            .plan
            .decls()
            .filter(|&m| m != decl)
            .map(|m| program.qualified_name(m))
            .collect(),
        plan: check.plan,
        pos: d.pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeclKind, Declaration, Position};
    use crate::renamer::ModelRenamer;
    use std::sync::mpsc;

    fn program() -> (Program, Vec<DeclId>) {
        let mut b = Program::builder();
        let pkg = b.package("example.com/p");
        let file = b.file(pkg, "p.go");
        let mut ids = Vec::new();
        for (i, name) in ["Alpha", "Beta", "Gamma", "Delta"].iter().enumerate() {
            ids.push(b.declare(Declaration::new(
                *name,
                DeclKind::Var,
                pkg,
                Position::at(file, i * 20, i + 1, 5),
            )));
        }
        // `beta` is taken, so Beta can't be unexported.
        b.declare(Declaration::new(
            "beta",
            DeclKind::Var,
            pkg,
            Position::at(file, 100, 6, 5),
        ));
        (b.build().unwrap(), ids)
    }

    #[test]
    fn one_result_per_candidate_in_order() {
        let (program, ids) = program();
        let analysis = Analysis::new();
        let results = evaluate(&program, &analysis, &ModelRenamer::new(), &ids, None);

        let names: Vec<_> = results.iter().map(|c| c.to.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma", "delta"]);
        assert_eq!(results[2].line, 3);
        assert!(results[1].conflict.is_some());
        assert_eq!(results.iter().filter(|c| c.is_safe()).count(), 3);
    }

    #[test]
    fn conflicts_are_sent_to_observer() {
        let (program, ids) = program();
        let analysis = Analysis::new();
        let (tx, rx) = mpsc::channel();
        evaluate(&program, &analysis, &ModelRenamer::new(), &ids, Some(&tx));
        drop(tx);

        let warnings: Vec<Warning> = rx.iter().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].candidate.to_string(), "\"example.com/p\".Beta");
    }

    #[test]
    fn dropped_observer_does_not_stall() {
        let (program, ids) = program();
        let analysis = Analysis::new();
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let results = evaluate(&program, &analysis, &ModelRenamer::new(), &ids, Some(&tx));
        assert_eq!(results.len(), ids.len());
    }

    #[test]
    fn explicit_name_overrides_proposal() {
        let (program, ids) = program();
        let analysis = Analysis::new();
        let c = evaluate_candidate(&program, &analysis, &ModelRenamer::new(), ids[1], Some("bee"));
        assert_eq!(c.to, "bee");
        assert!(c.is_safe());
        assert!(c.renames.is_empty());
    }
}
