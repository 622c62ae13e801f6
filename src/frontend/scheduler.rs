//! Validation scheduler.
//!
//! Every declaration is a unit. Workers pull ready units from a shared queue and validate a fresh
//! copy of the declaration; a unit that returns `Wait` is parked with its [`WaitReason`]. After each
//! run, parked units whose fact has been published move back to the ready queue. Once nothing is
//! ready or running, the units still parked fail with `UnresolvedDependency`.
//!
//! ## Notes
//!
//! - Availability is checked under the queue lock when a unit parks, and every unit completion
//!   rescans the parked list under the same lock, so a publication can never be missed.
//! - Results are reported in input order whatever the number of workers.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use super::ast::{Declaration, SourceFile};
use super::diagnostics::{Diagnostic, errors};
use super::module::{ModuleId, ModuleTable};
use super::suspension::{ValidationResult, WaitReason};
use super::types::TypeRegistry;
use super::validator::{CollectedUnit, UnitEntity, Validator, collect};
use crate::config::CompileConfig;

/// Final state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Validated,
    Failed,
}

/// Outcome of one declaration.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub file: usize,
    pub module: ModuleId,
    /// Index of the declaration in its file.
    pub declaration: usize,
    pub name: String,
    /// Registry entry the unit published, if it was registered.
    pub entity: Option<UnitEntity>,
    pub state: UnitState,
    pub diagnostics: Vec<Diagnostic>,
}

/// Annotated program and everything needed to lower it.
#[derive(Debug)]
pub struct ValidatedProgram {
    pub registry: TypeRegistry,
    pub modules: ModuleTable,
    /// Input files; declarations of validated units carry their annotations.
    pub files: Vec<SourceFile>,
    pub units: Vec<UnitReport>,
    /// File-level problems found while collecting (duplicate modules, bad imports or exports).
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidatedProgram {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty() || self.units.iter().any(|u| u.state == UnitState::Failed)
    }

    /// Every diagnostic: file-level ones first, then per unit in input order.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .chain(self.units.iter().flat_map(|u| u.diagnostics.iter()))
            .collect()
    }

    /// Validated declarations in input order, with their report.
    pub fn validated(&self) -> impl Iterator<Item = (&UnitReport, &Declaration)> + '_ {
        self.units
            .iter()
            .filter(|u| u.state == UnitState::Validated)
            .filter_map(|u| {
                self.files
                    .get(u.file)
                    .and_then(|f| f.declarations.get(u.declaration))
                    .map(|d| (u, d))
            })
    }
}

enum Outcome {
    Validated(Declaration),
    Failed(Diagnostic),
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<usize>,
    parked: Vec<(usize, WaitReason)>,
    running: usize,
    finished: bool,
    outcomes: Vec<Option<Outcome>>,
}

struct Shared<'a> {
    queue: Mutex<Queue>,
    wake: Condvar,
    files: &'a [SourceFile],
    units: &'a [CollectedUnit],
    registry: &'a TypeRegistry,
    modules: &'a ModuleTable,
    config: &'a CompileConfig,
}

/// Collect and validate `files`.
#[tracing::instrument(skip_all, fields(files = files.len(), workers = config.workers))]
pub fn validate(mut files: Vec<SourceFile>, config: &CompileConfig) -> ValidatedProgram {
    let registry = TypeRegistry::new();
    let modules = ModuleTable::new();
    let (units, problems) = collect(&files, &registry, &modules);

    let mut queue = Queue {
        outcomes: (0..units.len()).map(|_| None).collect(),
        ..Queue::default()
    };
    for (index, unit) in units.iter().enumerate() {
        match &unit.failure {
            Some(diagnostic) => queue.outcomes[index] = Some(Outcome::Failed(diagnostic.clone())),
            None => queue.ready.push_back(index),
        }
    }

    let shared = Shared {
        queue: Mutex::new(queue),
        wake: Condvar::new(),
        files: &files,
        units: &units,
        registry: &registry,
        modules: &modules,
        config,
    };
    let workers = config.workers.max(1);
    if workers == 1 {
        worker(&shared);
    } else {
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| worker(&shared));
            }
        });
    }

    let queue = shared.queue.into_inner();
    let mut outcomes = queue.outcomes;
    for (index, reason) in queue.parked {
        let unit = &units[index];
        let declaration = declaration_of(&files, unit);
        let name = declaration.map(|d| d.name().text.clone()).unwrap_or_default();
        let span = declaration.map(|d| d.name().span).unwrap_or_default();
        let waiting_on = reason.describe(&modules);
        tracing::warn!(unit = %name, waiting_on = %waiting_on, "unit never resumed");
        outcomes[index] = Some(Outcome::Failed(errors::unresolved_dependency(&name, &waiting_on, span)));
    }

    let mut reports = Vec::with_capacity(units.len());
    for (unit, outcome) in units.iter().zip(outcomes) {
        let file = &files[unit.file];
        let (path, source) = (file.path.clone(), file.source.clone());
        let name = file
            .declarations
            .get(unit.index)
            .map(|d| d.name().text.clone())
            .unwrap_or_default();
        let (state, diagnostics) = match outcome {
            Some(Outcome::Validated(annotated)) => {
                if let Some(slot) = files[unit.file].declarations.get_mut(unit.index) {
                    *slot = annotated;
                }
                (UnitState::Validated, Vec::new())
            }
            Some(Outcome::Failed(diagnostic)) => (UnitState::Failed, vec![diagnostic.anchor(&path, &source)]),
            None => (UnitState::Failed, Vec::new()),
        };
        reports.push(UnitReport {
            file: unit.file,
            module: unit.module,
            declaration: unit.index,
            name,
            entity: unit.entity,
            state,
            diagnostics,
        });
    }

    let diagnostics = problems
        .into_iter()
        .map(|(file, diagnostic)| {
            let file = &files[file];
            diagnostic.anchor(&file.path, &file.source)
        })
        .collect();

    let failed = reports.iter().filter(|r| r.state == UnitState::Failed).count();
    tracing::info!(units = reports.len(), failed, "validation finished");
    ValidatedProgram {
        registry,
        modules,
        files,
        units: reports,
        diagnostics,
    }
}

fn declaration_of<'f>(files: &'f [SourceFile], unit: &CollectedUnit) -> Option<&'f Declaration> {
    files.get(unit.file).and_then(|f| f.declarations.get(unit.index))
}

fn worker(shared: &Shared<'_>) {
    while let Some(index) = next_unit(shared) {
        let unit = &shared.units[index];
        let outcome = run_unit(shared, unit);

        let mut queue = shared.queue.lock();
        queue.running -= 1;
        match outcome {
            Ok(annotated) => queue.outcomes[index] = Some(Outcome::Validated(annotated)),
            Err(UnitHalt::Failed(diagnostic)) => queue.outcomes[index] = Some(Outcome::Failed(diagnostic)),
            Err(UnitHalt::Wait(reason)) => {
                if reason.is_available(shared.modules) {
                    queue.ready.push_back(index);
                } else {
                    tracing::debug!(unit = index, waiting_on = %reason, "unit parked");
                    queue.parked.push((index, reason));
                }
            }
        }

        let parked = std::mem::take(&mut queue.parked);
        let (woken, still): (Vec<_>, Vec<_>) = parked
            .into_iter()
            .partition(|(_, reason)| reason.is_available(shared.modules));
        queue.parked = still;
        for (woken, reason) in woken {
            tracing::debug!(unit = woken, published = %reason, "unit resumed");
            queue.ready.push_back(woken);
        }
        shared.wake.notify_all();
    }
}

/// Block until a unit is ready, or return `None` once the queue is quiescent.
fn next_unit(shared: &Shared<'_>) -> Option<usize> {
    let mut queue = shared.queue.lock();
    loop {
        if queue.finished {
            return None;
        }
        if let Some(index) = queue.ready.pop_front() {
            queue.running += 1;
            return Some(index);
        }
        if queue.running == 0 {
            queue.finished = true;
            shared.wake.notify_all();
            return None;
        }
        shared.wake.wait(&mut queue);
    }
}

enum UnitHalt {
    Failed(Diagnostic),
    Wait(WaitReason),
}

fn run_unit(shared: &Shared<'_>, unit: &CollectedUnit) -> Result<Declaration, UnitHalt> {
    let Some(original) = declaration_of(shared.files, unit) else {
        return Err(UnitHalt::Failed(errors::type_mismatch("missing declaration", Default::default())));
    };
    let Some(entity) = unit.entity else {
        return Err(UnitHalt::Failed(errors::type_mismatch(
            format!("`{}` was not registered", original.name().text),
            original.name().span,
        )));
    };
    let _span = tracing::debug_span!("unit", name = %original.name().text).entered();

    let mut declaration = original.clone();
    let mut validator = Validator::new(
        shared.registry,
        shared.modules,
        unit.module,
        &shared.config.entry_point,
    );
    match ValidationResult::from(validator.validate_declaration(&mut declaration, entity)) {
        ValidationResult::Ok => Ok(declaration),
        ValidationResult::Error(diagnostic) => Err(UnitHalt::Failed(*diagnostic)),
        ValidationResult::Wait(reason) => Err(UnitHalt::Wait(reason)),
    }
}
