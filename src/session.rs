//! Analysis sessions.
//!
//! An [`Unexporter`] owns one loaded program and everything derived from it
//! for a target package: the used set, the evaluated candidates, and the
//! diagnostics. Candidates can be rechecked under other names as often as
//! needed. Applying consumes the session, since the program no longer
//! matches the files once they are rewritten.

use crate::analyzer::{self, Candidate, DetectionResult, Diagnostics, unused_exports};
use crate::checker::{Warning, evaluate, evaluate_candidate};
use crate::error::{Error, Result};
use crate::loader::Loader;
use crate::model::{DeclId, PackageId, Program, QualifiedName};
use crate::renamer::{ModelRenamer, RenamePlan, Renamer, batch_conflict};
use crate::review::{Decision, Review};
use crate::rewriter::ApplyReport;
use crate::satisfy::Analysis;
use crate::usage::{UsedSet, used_decls};
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// Detects unused exports of `target` with the default renamer.
pub fn compute_candidates(program: &Program, target: &str) -> Result<Vec<Candidate>> {
    let target_id = resolve_target(program, target)?;
    let analysis = Analysis::new();
    let used = used_decls(program, &analysis);
    let raw = unused_exports(program, target_id, &used);
    let mut candidates = evaluate(program, &analysis, &ModelRenamer::new(), &raw, None);
    candidates.sort_by_key(|c| c.pos.sort_key());
    Ok(candidates)
}

fn resolve_target(program: &Program, target: &str) -> Result<PackageId> {
    program
        .package_by_path(target)
        .ok_or_else(|| Error::UnknownPackage(target.to_string()))
}

#[derive(Debug)]
pub struct Unexporter<R: Renamer = ModelRenamer> {
    program: Program,
    target: PackageId,
    analysis: Analysis,
    renamer: R,
    used: UsedSet,
    candidates: BTreeMap<QualifiedName, Candidate>,
    diagnostics: Diagnostics,
}

impl Unexporter<ModelRenamer> {
    pub fn new(program: Program, target: &str) -> Result<Self> {
        Self::with_renamer(program, target, ModelRenamer::new())
    }

    /// Loads a program and starts a session on it.
    pub fn load(loader: &impl Loader, target: &str) -> Result<Self> {
        Self::new(loader.load()?, target)
    }
}

impl<R: Renamer> Unexporter<R> {
    pub fn with_renamer(program: Program, target: &str, renamer: R) -> Result<Self> {
        Self::with_observer(program, target, renamer, None)
    }

    /// Like [`Unexporter::with_renamer`], also reporting each conflict on
    /// `observer` as soon as it is found.
    pub fn with_observer(
        program: Program,
        target: &str,
        renamer: R,
        observer: Option<&Sender<Warning>>,
    ) -> Result<Self> {
        let target_id = resolve_target(&program, target)?;
        let analysis = Analysis::new();
        let used = used_decls(&program, &analysis);
        let raw = unused_exports(&program, target_id, &used);
        let evaluated = evaluate(&program, &analysis, &renamer, &raw, observer);

        let mut diagnostics = analyzer::diagnostics(&program, target_id, &used);
        diagnostics.candidates = evaluated.len();
        diagnostics.conflicting = evaluated.iter().filter(|c| !c.is_safe()).count();
        debug!(
            target,
            candidates = diagnostics.candidates,
            conflicting = diagnostics.conflicting,
            "detection finished"
        );

        let candidates = evaluated.into_iter().map(|c| (c.id.clone(), c)).collect();
        Ok(Self {
            program,
            target: target_id,
            analysis,
            renamer,
            used,
            candidates,
            diagnostics,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn target(&self) -> &str {
        &self.program.package(self.target).path
    }

    pub fn used(&self) -> &UsedSet {
        &self.used
    }

    /// Candidates in source order.
    pub fn candidates(&self) -> Vec<&Candidate> {
        let mut all: Vec<&Candidate> = self.candidates.values().collect();
        all.sort_by_key(|c| c.pos.sort_key());
        all
    }

    pub fn candidate(&self, id: &QualifiedName) -> Option<&Candidate> {
        self.candidates.get(id)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn detection(&self) -> DetectionResult {
        DetectionResult {
            candidates: self.candidates().into_iter().cloned().collect(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    /// Re-evaluates a candidate under the name `to`, replacing its proposal.
    /// Returns the conflict, if any.
    pub fn recheck(&mut self, id: &QualifiedName, to: &str) -> Result<Option<String>> {
        let decl = self.lookup(id)?.decl;
        let candidate = self.evaluate_as(decl, to);
        let conflict = candidate.conflict.clone();
        self.candidates.insert(id.clone(), candidate);
        self.diagnostics.conflicting = self.candidates.values().filter(|c| !c.is_safe()).count();
        Ok(conflict)
    }

    /// Applies one candidate's plan, conflicting or not.
    pub fn apply_one(self, id: &QualifiedName) -> Result<ApplyReport> {
        let candidate = self.lookup(id)?;
        if let Some(conflict) = &candidate.conflict {
            warn!(candidate = %id, conflict, "applying a conflicting rename");
        }
        let plan = candidate.plan.clone();
        self.apply(plan)
    }

    /// Applies every candidate without a conflict. Conflicting candidates are
    /// skipped, as is any candidate whose new name is already taken by one
    /// merged before it.
    pub fn apply_all(self) -> Result<ApplyReport> {
        let mut plan = RenamePlan::new();
        for candidate in self.candidates() {
            let conflict = candidate
                .conflict
                .clone()
                .or_else(|| batch_conflict(&self.program, &plan, &candidate.plan));
            match conflict {
                Some(conflict) => {
                    warn!(candidate = %candidate.id, conflict, "skipping conflicting candidate")
                }
                None => plan.merge(&candidate.plan),
            }
        }
        self.apply(plan)
    }

    /// Applies the candidates `review` approved. Renamed entries are merged
    /// before accepted ones. Fails without writing anything if two approved
    /// plans clash with each other.
    pub fn apply_approved(self, review: &Review) -> Result<ApplyReport> {
        let mut plan = RenamePlan::new();
        for (id, approved) in self.approved_plans(review)? {
            if let Some(conflict) = batch_conflict(&self.program, &plan, &approved) {
                return Err(Error::BatchConflict {
                    id: id.to_string(),
                    conflict,
                });
            }
            plan.merge(&approved);
        }
        self.apply(plan)
    }

    /// Checks the current plan of `id` against the plans `review` has
    /// already approved, so two approvals never hand out one name twice.
    pub fn batch_conflict(&self, review: &Review, id: &QualifiedName) -> Result<Option<String>> {
        let candidate = self.lookup(id)?;
        let mut claimed = RenamePlan::new();
        for (other, plan) in self.approved_plans(review)? {
            if other != *id {
                claimed.merge(&plan);
            }
        }
        Ok(batch_conflict(&self.program, &claimed, &candidate.plan))
    }

    fn approved_plans(&self, review: &Review) -> Result<Vec<(QualifiedName, RenamePlan)>> {
        let mut renamed = Vec::new();
        let mut accepted = Vec::new();
        for (id, decision) in review.decisions() {
            match decision {
                Decision::Renamed(to) => {
                    let decl = self.lookup(id)?.decl;
                    renamed.push((id.clone(), self.evaluate_as(decl, to).plan));
                }
                Decision::Accepted => accepted.push((id.clone(), self.lookup(id)?.plan.clone())),
                _ => {}
            }
        }
        renamed.extend(accepted);
        Ok(renamed)
    }

    fn lookup(&self, id: &QualifiedName) -> Result<&Candidate> {
        self.candidates
            .get(id)
            .ok_or_else(|| Error::UnknownCandidate(id.to_string()))
    }

    fn evaluate_as(&self, decl: DeclId, to: &str) -> Candidate {
        evaluate_candidate(&self.program, &self.analysis, &self.renamer, decl, Some(to))
    }

    fn apply(self, plan: RenamePlan) -> Result<ApplyReport> {
        if plan.is_empty() {
            info!("Nothing to rename.");
            return Ok(ApplyReport::default());
        }
        debug!(declarations = plan.len(), "applying rename plan");
        self.renamer.apply(self.program, &plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeclKind, Declaration, Position, Shape, TypeRef};

    /// Package a with an interface satisfied from b, a locally satisfied
    /// interface, a struct with a field, and lone declarations.
    fn program() -> Program {
        let mut b = Program::builder();
        let a = b.package("example.com/a");
        let other = b.package("example.com/b");
        let fa = b.file(a, "a/a.go");
        let fb = b.file(other, "b/b.go");
        let mut offset = 0;
        let mut at = |file| {
            offset += 10;
            Position::new(file, offset)
        };

        b.declare(Declaration::new("Unused", DeclKind::Var, a, at(fa)));
        b.declare(Declaration::new("Limit", DeclKind::Const, a, at(fa)));
        b.declare(Declaration::new("Helper", DeclKind::Func, a, at(fa)));
        let used = b.declare(Declaration::new("Used", DeclKind::Func, a, at(fa)));
        b.use_at(used, at(fb));

        let s = b.declare(
            Declaration::new("S", DeclKind::Type, a, at(fa)).with_shape(Shape::Struct),
        );
        b.use_at(s, at(fb));
        b.declare(Declaration::new("Field", DeclKind::Field, a, at(fa)).with_owner(s));

        // Counter (a) is satisfied by T (b): both Count methods stay exported.
        let counter = b.declare(
            Declaration::new("Counter", DeclKind::Type, a, at(fa))
                .with_shape(Shape::Interface { embeds: vec![] }),
        );
        b.use_at(counter, at(fb));
        b.declare(Declaration::new("Count", DeclKind::Method, a, at(fa)).with_owner(counter));
        let t = b.declare(
            Declaration::new("T", DeclKind::Type, other, at(fb)).with_shape(Shape::Struct),
        );
        b.declare(Declaration::new("Count", DeclKind::Method, other, at(fb)).with_owner(t));
        b.assign(TypeRef::value(t), TypeRef::value(counter));

        // Sizer is only satisfied by S, in a.
        let sizer = b.declare(
            Declaration::new("Sizer", DeclKind::Type, a, at(fa))
                .with_shape(Shape::Interface { embeds: vec![] }),
        );
        b.use_at(sizer, at(fb));
        b.declare(Declaration::new("Size", DeclKind::Method, a, at(fa)).with_owner(sizer));
        b.declare(Declaration::new("Size", DeclKind::Method, a, at(fa)).with_owner(s));
        b.assign(TypeRef::value(s), TypeRef::value(sizer));

        // `limit` already exists, so Limit can't be unexported as proposed.
        b.declare(Declaration::new("limit", DeclKind::Var, a, at(fa)));
        b.build().unwrap()
    }

    fn ids(session: &Unexporter) -> Vec<String> {
        session
            .candidates()
            .iter()
            .map(|c| format!("{} -> {}", c.id, c.to))
            .collect()
    }

    #[test]
    fn detects_unused_exports_in_source_order() {
        let session = Unexporter::new(program(), "example.com/a").unwrap();
        insta::assert_debug_snapshot!(ids(&session), @r#"
        [
            "\"example.com/a\".Unused -> unused",
            "\"example.com/a\".Limit -> limit",
            "\"example.com/a\".Helper -> helper",
            "(\"example.com/a\".S).Field -> field",
            "(\"example.com/a\".Sizer).Size -> size",
            "(\"example.com/a\".S).Size -> size",
        ]
        "#);
    }

    #[test]
    fn diagnostics_count_target_declarations() {
        let session = Unexporter::new(program(), "example.com/a").unwrap();
        let d = session.diagnostics();
        assert_eq!(d.packages_loaded, 2);
        assert_eq!(d.exported, 11);
        assert_eq!(d.used_externally, 5);
        assert_eq!(d.candidates, 6);
        assert_eq!(d.conflicting, 1);
    }

    #[test]
    fn locally_satisfied_methods_rename_together() {
        let session = Unexporter::new(program(), "example.com/a").unwrap();
        let id: QualifiedName = "(\"example.com/a\".Sizer).Size".parse().unwrap();
        let candidate = session.candidate(&id).unwrap();
        assert!(candidate.is_safe());
        assert_eq!(
            candidate.renames,
            vec!["(\"example.com/a\".S).Size".parse::<QualifiedName>().unwrap()]
        );
    }

    #[test]
    fn recheck_with_another_name_clears_conflict() {
        let mut session = Unexporter::new(program(), "example.com/a").unwrap();
        let id: QualifiedName = "\"example.com/a\".Limit".parse().unwrap();
        assert!(session.candidate(&id).unwrap().conflict.is_some());

        assert_eq!(session.recheck(&id, "maxLimit").unwrap(), None);
        assert_eq!(session.candidate(&id).unwrap().to, "maxLimit");
        assert_eq!(session.diagnostics().conflicting, 0);

        // Rechecking again is fine, and can bring the conflict back.
        assert!(session.recheck(&id, "limit").unwrap().is_some());
    }

    #[test]
    fn review_refuses_a_name_already_approved_for_another_candidate() {
        let mut session = Unexporter::new(program(), "example.com/a").unwrap();
        let mut review = Review::for_session(&session);
        let unused: QualifiedName = "\"example.com/a\".Unused".parse().unwrap();
        let helper: QualifiedName = "\"example.com/a\".Helper".parse().unwrap();

        assert_eq!(review.rename(&mut session, &unused, "shared").unwrap(), None);
        let conflict = review.rename(&mut session, &helper, "shared").unwrap().unwrap();
        assert!(conflict.contains("shared is already planned for \"example.com/a\".Unused"));
        assert_eq!(review.decision(&helper), Some(&Decision::Pending));

        // Accepting the proposal instead is refused the same way.
        session.recheck(&helper, "shared").unwrap();
        assert!(review.approve(&session, &helper).unwrap().is_some());
        assert_eq!(review.rename(&mut session, &helper, "helper").unwrap(), None);
    }

    #[test]
    fn apply_approved_rejects_a_clashing_batch() {
        let mut session = Unexporter::new(program(), "example.com/a").unwrap();
        let mut review = Review::for_session(&session);
        let unused: QualifiedName = "\"example.com/a\".Unused".parse().unwrap();
        let helper: QualifiedName = "\"example.com/a\".Helper".parse().unwrap();
        assert_eq!(session.recheck(&unused, "shared").unwrap(), None);
        assert_eq!(session.recheck(&helper, "shared").unwrap(), None);
        review.accept(&unused).unwrap();
        review.accept(&helper).unwrap();

        match session.apply_approved(&review).unwrap_err() {
            Error::BatchConflict { id, conflict } => {
                assert_eq!(id, helper.to_string());
                assert!(conflict.contains("already planned"), "{conflict}");
            }
            other => panic!("expected a batch conflict, got {other:?}"),
        }
    }

    #[test]
    fn unknown_target_and_candidate() {
        let err = Unexporter::new(program(), "example.com/missing").unwrap_err();
        assert!(matches!(err, Error::UnknownPackage(_)));

        let mut session = Unexporter::new(program(), "example.com/a").unwrap();
        let id: QualifiedName = "\"example.com/a\".Used".parse().unwrap();
        assert!(matches!(
            session.recheck(&id, "used"),
            Err(Error::UnknownCandidate(_))
        ));
    }

    #[test]
    fn compute_candidates_matches_session() {
        let program = program();
        let candidates = compute_candidates(&program, "example.com/a").unwrap();
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0].to, "unused");
    }

    mod workspace {
        use super::*;
        use crate::loader::JsonLoader;
        use crate::model::{ProgramData, unexported_name};
        use std::collections::HashSet;
        use std::path::{Path, PathBuf};

        const SHAPES: &str = "example.com/shapes";

        /// Copies the fixture workspace into a temporary directory.
        fn workspace() -> (tempfile::TempDir, PathBuf) {
            let fixture =
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/workspace");
            let dir = tempfile::tempdir().unwrap();
            for file in ["model.json", "shapes/shapes.go", "render/render.go"] {
                let dest = dir.path().join(file);
                std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
                std::fs::copy(fixture.join(file), &dest).unwrap();
            }
            let model = dir.path().join("model.json");
            (dir, model)
        }

        fn session(model: &Path) -> Unexporter {
            Unexporter::load(&JsonLoader::new(model), SHAPES).unwrap()
        }

        fn read(dir: &tempfile::TempDir, file: &str) -> String {
            std::fs::read_to_string(dir.path().join(file)).unwrap()
        }

        fn summary(session: &Unexporter) -> Vec<String> {
            session
                .candidates()
                .iter()
                .map(|c| {
                    let status = if c.is_safe() { "ok" } else { "conflict" };
                    format!("{}:{} {} -> {} ({})", c.line, c.column, c.id, c.to, status)
                })
                .collect()
        }

        #[test]
        fn finds_unused_exports() {
            let (_dir, model) = workspace();
            let session = session(&model);
            insta::assert_debug_snapshot!(summary(&session), @r#"
            [
                "4:6 \"example.com/shapes\".Area -> area (ok)",
                "5:2 (\"example.com/shapes\".Area).Measure -> measure (ok)",
                "10:2 (\"example.com/shapes\".Square).Side -> side (ok)",
                "19:18 (\"example.com/shapes\".Square).Measure -> measure (ok)",
                "24:6 \"example.com/shapes\".Describe -> describe (ok)",
                "33:7 \"example.com/shapes\".Sides -> sides (conflict)",
            ]
            "#);

            let d = session.diagnostics();
            assert_eq!(d.packages_loaded, 2);
            assert_eq!(d.target_declarations, 12);
            assert_eq!(d.exported, 8);
            assert_eq!(d.used_externally, 2);

            let sides: QualifiedName = "\"example.com/shapes\".Sides".parse().unwrap();
            let conflict = session.candidate(&sides).unwrap().conflict.clone().unwrap();
            assert!(
                conflict.contains("shadowed by the local sides declared at"),
                "{conflict}"
            );
        }

        #[test]
        fn reviewed_renames_rewrite_definitions_and_uses() {
            let (dir, model) = workspace();
            let render_before = read(&dir, "render/render.go");
            let mut session = session(&model);
            let mut review = Review::for_session(&session);

            let sides: QualifiedName = "\"example.com/shapes\".Sides".parse().unwrap();
            let describe: QualifiedName = "\"example.com/shapes\".Describe".parse().unwrap();
            assert!(review.rename(&mut session, &sides, "sides").unwrap().is_some());
            assert_eq!(review.decision(&sides), Some(&Decision::Pending));
            assert_eq!(review.rename(&mut session, &sides, "numSides").unwrap(), None);
            review.accept(&describe).unwrap();
            review.abort();

            let report = session.apply_approved(&review).unwrap();
            assert_eq!((report.occurrences, report.files, report.packages), (3, 1, 1));
            assert!(report.failures.is_empty());

            // Comments and the unrelated local `sides` keep their spelling.
            insta::assert_snapshot!(read(&dir, "shapes/shapes.go").trim_end(), @r#"
            package shapes

            // Area is implemented by every shape.
            type Area interface {
            	Measure() float64
            }

            // Square is a square with a side length.
            type Square struct {
            	Side float64
            }

            // NewSquare returns a square.
            func NewSquare(side float64) *Square {
            	return &Square{Side: side}
            }

            // Measure returns the area of the square.
            func (s *Square) Measure() float64 {
            	return s.Side * s.Side
            }

            // Describe names the shape by its number of sides.
            func describe(a Area) string {
            	sides := "many"
            	if a.Measure() > 0 && numSides == 4 {
            		sides = "four"
            	}
            	return sides
            }

            // Sides is the number of sides of a square.
            const numSides = 4

            var _ Area = &Square{}
            "#);
            assert_eq!(read(&dir, "render/render.go"), render_before);
        }

        #[test]
        fn apply_all_skips_conflicts_and_reanalysis_finds_nothing_new() {
            let (dir, model) = workspace();
            let session = session(&model);
            let renamed: HashSet<_> = session
                .candidates()
                .iter()
                .filter(|c| c.is_safe())
                .flat_map(|c| c.plan.decls())
                .collect();
            assert_eq!(renamed.len(), 5);

            let report = session.apply_all().unwrap();
            assert_eq!((report.occurrences, report.files, report.packages), (11, 1, 1));

            let shapes = read(&dir, "shapes/shapes.go");
            assert!(shapes.contains("type area interface {\n\tmeasure() float64"));
            assert!(shapes.contains("func (s *Square) measure() float64"));
            assert!(shapes.contains("return s.side * s.side"));
            assert!(shapes.contains("const Sides = 4"));

            // What a front end would report for the rewritten sources: the
            // renames keep every identifier's length, so positions still hold.
            let bytes = std::fs::read(&model).unwrap();
            let mut data: ProgramData = serde_json::from_slice(&bytes).unwrap();
            for id in &renamed {
                let decl = &mut data.decls[id.0];
                decl.name = unexported_name(&decl.name);
            }
            for occ in &mut data.occurrences {
                let hit = occ.decl.iter().chain(occ.embeds.iter()).any(|d| renamed.contains(d));
                if hit {
                    occ.name = unexported_name(&occ.name);
                }
            }
            Program::resolve_paths(&mut data, dir.path());
            let program = Program::new(data).unwrap();

            let candidates = compute_candidates(&program, SHAPES).unwrap();
            let ids: Vec<String> = candidates.iter().map(|c| c.id.to_string()).collect();
            assert_eq!(ids, vec!["\"example.com/shapes\".Sides"]);
        }

        #[test]
        fn apply_all_skips_a_name_taken_earlier_in_the_batch() {
            let (dir, model) = workspace();
            let before = read(&dir, "shapes/shapes.go");
            let program = JsonLoader::new(&model).load().unwrap();
            let renamer = ModelRenamer::new().dry_run(true);
            let mut session = Unexporter::with_renamer(program, SHAPES, renamer).unwrap();
            let describe: QualifiedName = "\"example.com/shapes\".Describe".parse().unwrap();
            let sides: QualifiedName = "\"example.com/shapes\".Sides".parse().unwrap();
            assert_eq!(session.recheck(&describe, "shape").unwrap(), None);
            assert_eq!(session.recheck(&sides, "shape").unwrap(), None);

            // Describe comes first in source order and keeps the name.
            let report = session.apply_all().unwrap();
            assert_eq!(report.occurrences, 11);
            assert_eq!(read(&dir, "shapes/shapes.go"), before);
        }

        #[test]
        fn stale_file_is_reported_and_left_untouched() {
            let (dir, model) = workspace();
            let session = session(&model);
            let path = dir.path().join("shapes/shapes.go");
            let edited = format!("// edited\n{}", read(&dir, "shapes/shapes.go"));
            std::fs::write(&path, &edited).unwrap();

            let describe: QualifiedName = "\"example.com/shapes\".Describe".parse().unwrap();
            match session.apply_one(&describe).unwrap_err() {
                Error::Rewrite { failed, report } => {
                    assert_eq!(failed, 1);
                    assert_eq!(report.failures[0].path, path);
                    assert_eq!(report.occurrences, 1);
                }
                other => panic!("expected a rewrite error, got {other:?}"),
            }
            assert_eq!(read(&dir, "shapes/shapes.go"), edited);
        }

        #[test]
        fn dry_run_reports_without_writing() {
            let (dir, model) = workspace();
            let before = read(&dir, "shapes/shapes.go");
            let program = JsonLoader::new(&model).load().unwrap();
            let renamer = ModelRenamer::new().dry_run(true);
            let session = Unexporter::with_renamer(program, SHAPES, renamer).unwrap();

            let report = session.apply_all().unwrap();
            assert!(report.dry_run);
            assert_eq!(report.occurrences, 11);
            assert_eq!(read(&dir, "shapes/shapes.go"), before);
        }
    }
}
