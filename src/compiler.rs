//! Workflow Compiler
//!
//! Ties the pipeline together: draft → edge inference → duplicate check.
//!
//! A workflow is known to the inference policy by one identifier,
//! [`workflow_id`]: the file stem for drafts loaded from disk, the draft's
//! own id otherwise. The duplicate filter and the CI classification both
//! use it.
//!
//! # Parallelism
//!
//! [`Compiler::compile_all`] and [`Compiler::compile_files`] spread drafts
//! over a bounded set of worker threads that report back through a channel.
//! Results come back in input order. Which of two isomorphic drafts compiled
//! concurrently is reported as the duplicate is not fixed.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread;

use log::{debug, info, warn};

use crate::config::CompilerConfig;
use crate::error::Result;
use crate::inference::{InferenceEngine, InferenceOptions, NamingConventions};
use crate::isomorphism::{DuplicateCheck, IsomorphismBudget, IsomorphismFilter, SignatureCache};
use crate::policy::InferencePolicy;
use crate::types::TypeHierarchy;
use crate::workflow::{load_draft, CompiledGraph, DefinitionLoader, DraftGraph};

/// Policy identifier of a draft file: its file stem.
pub fn workflow_id(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A compiled workflow and the result of its duplicate check.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// Identifier the policy knows this workflow by
    pub id: String,
    pub graph: CompiledGraph,
    pub duplicate: DuplicateCheck,
}

/// Compiles drafts against a fixed configuration and policy.
///
/// # Example
///
/// ```no_run
/// use inferflow::compiler::Compiler;
/// use inferflow::config::CompilerConfig;
/// use inferflow::isomorphism::SignatureCache;
/// use inferflow::policy::InferencePolicy;
/// use inferflow::workflow::SearchPathLoader;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = CompilerConfig::load_or_default("global_config.json")?;
///     let policy = InferencePolicy::new();
///     let loader = SearchPathLoader::new(config.search_paths.clone());
///     let compiler = Compiler::new(&config, &policy, SignatureCache::global(), &loader)?;
///
///     let outcome = compiler.compile_file("pipeline.yml")?;
///     println!("{}: {}", outcome.graph.id(), outcome.duplicate);
///     Ok(())
/// }
/// ```
pub struct Compiler<'a> {
    hierarchy: TypeHierarchy,
    naming: NamingConventions,
    options: InferenceOptions,
    budget: IsomorphismBudget,
    detect_subgraphs: bool,
    workers: usize,
    policy: &'a InferencePolicy,
    cache: &'a SignatureCache,
    loader: &'a dyn DefinitionLoader,
}

impl<'a> Compiler<'a> {
    /// Fails when the configured format hierarchy is invalid.
    pub fn new(
        config: &CompilerConfig,
        policy: &'a InferencePolicy,
        cache: &'a SignatureCache,
        loader: &'a dyn DefinitionLoader,
    ) -> Result<Self> {
        Ok(Self {
            hierarchy: config.hierarchy()?,
            naming: config.naming(),
            options: config.inference_options(),
            budget: config.budget(),
            detect_subgraphs: config.isomorphism.detect_subgraphs,
            workers: config.workers(),
            policy,
            cache,
            loader,
        })
    }

    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Infers the draft's edges and checks the result for duplicates,
    /// using the draft's id as policy identifier.
    pub fn compile(&self, draft: DraftGraph) -> Result<CompileOutcome> {
        let id = draft.id.clone();
        self.compile_as(id, draft)
    }

    fn compile_as(&self, id: String, draft: DraftGraph) -> Result<CompileOutcome> {
        debug!("Compiling '{}' ({} steps)", id, draft.steps.len());

        let graph = InferenceEngine::new(&self.hierarchy, &self.naming, self.options)
            .infer(draft)?;

        let duplicate = IsomorphismFilter::new(self.policy, self.cache)
            .with_budget(self.budget)
            .with_subgraph_detection(self.detect_subgraphs)
            .check(&id, &graph);

        if duplicate.is_duplicate() {
            warn!("'{}' is {}", id, duplicate);
        }
        info!(
            "Compiled '{}': {} edges, {}",
            id,
            graph.edges().len(),
            duplicate
        );

        Ok(CompileOutcome {
            id,
            graph,
            duplicate,
        })
    }

    /// Loads a draft file through the configured loader and compiles it
    /// under [`workflow_id`] of the path.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompileOutcome> {
        let path = path.as_ref();
        let id = workflow_id(path);
        let draft = load_draft(path, self.loader)?;
        if draft.id != id {
            debug!("Draft '{}' is tracked by the policy as '{}'", draft.id, id);
        }
        self.compile_as(id, draft)
    }

    /// Compiles drafts in parallel, returning results in input order.
    pub fn compile_all(&self, drafts: Vec<DraftGraph>) -> Vec<Result<CompileOutcome>> {
        self.run_parallel(drafts, |draft| self.compile(draft))
    }

    /// Compiles draft files in parallel, returning results in input order.
    pub fn compile_files(&self, paths: &[PathBuf]) -> Vec<Result<CompileOutcome>> {
        self.run_parallel(paths.iter().collect(), |path| self.compile_file(path))
    }

    fn run_parallel<T, F>(&self, jobs: Vec<T>, job: F) -> Vec<Result<CompileOutcome>>
    where
        T: Send,
        F: Fn(T) -> Result<CompileOutcome> + Sync,
    {
        let total = jobs.len();
        let workers = self.workers.min(total);
        if workers <= 1 {
            return jobs.into_iter().map(job).collect();
        }

        info!("Compiling {} drafts on {} workers", total, workers);

        let queue = Mutex::new(jobs.into_iter().enumerate());
        let (tx, rx): (
            Sender<(usize, Result<CompileOutcome>)>,
            Receiver<(usize, Result<CompileOutcome>)>,
        ) = channel();

        thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let job = &job;
                scope.spawn(move || loop {
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .next();
                    let Some((index, item)) = next else {
                        debug!("Worker {} finished", worker);
                        break;
                    };
                    if tx.send((index, job(item))).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            let mut results: Vec<Option<Result<CompileOutcome>>> =
                (0..total).map(|_| None).collect();
            for (index, result) in rx {
                results[index] = Some(result);
            }
            results.into_iter().flatten().collect()
        })
    }
}
