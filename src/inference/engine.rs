//! Edge Inference Engine
//!
//! Turns a draft into a fully wired, acyclic graph.
//!
//! Every sink port (step inputs, then top-level outputs) moves through
//!
//! ```text
//! Unresolved -> CandidatesFound -> Resolved
//! Unresolved -> Ambiguous | Unsatisfiable
//! ```
//!
//! Explicit bindings are committed first and fix step positions. Each
//! remaining sink then depends only on those positions, so the result does
//! not depend on the order sinks are visited. Failures are collected and
//! the first one in canonical sink order is reported.

use std::collections::HashMap;

use log::{debug, info, warn};

use super::naming::NamingConventions;
use super::resolver::{Candidate, CandidateResolver};
use crate::error::{InferenceError, Result};
use crate::types::{EdgeContext, TypeHierarchy};
use crate::workflow::validator::{validate_draft, verify_acyclic, INPUTS_SCOPE, OUTPUTS_SCOPE};
use crate::workflow::{
    Binding, CompiledGraph, DraftGraph, Edge, Endpoint, NodeRef, Port, Provenance, Resolution,
    ResolutionState,
};

/// Separator of a top-level input id that binds a specific step port:
/// `<step>___<port>`.
pub const STEP_INPUT_SEPARATOR: &str = "___";

/// Behaviour switches for inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Break specificity ties by port-name match.
    pub use_naming_conventions: bool,
    /// Commit explicit edges only. Unbound sinks fall back to their default
    /// or optionality and otherwise fail as missing inputs.
    pub disable_inference: bool,
}

/// Per-sink resolution state, summarised in the debug log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Unresolved,
    CandidatesFound,
    Resolved,
    Ambiguous,
    Unsatisfiable,
}

impl SinkState {
    fn is_terminal_failure(self) -> bool {
        matches!(self, SinkState::Ambiguous | SinkState::Unsatisfiable)
    }
}

/// Outcome of resolving one sink.
enum SinkOutcome {
    Commit(Candidate),
    Satisfied(ResolutionState),
    Failed(InferenceError),
}

pub struct InferenceEngine<'a> {
    hierarchy: &'a TypeHierarchy,
    naming: &'a NamingConventions,
    options: InferenceOptions,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(
        hierarchy: &'a TypeHierarchy,
        naming: &'a NamingConventions,
        options: InferenceOptions,
    ) -> Self {
        Self {
            hierarchy,
            naming,
            options,
        }
    }

    /// All sink ports of a draft in canonical order: step inputs by step
    /// and port declaration order, then top-level outputs.
    pub fn sinks(draft: &DraftGraph) -> Vec<Endpoint> {
        let mut sinks: Vec<Endpoint> = draft
            .steps
            .iter()
            .flat_map(|step| {
                step.inputs
                    .iter()
                    .map(move |port| Endpoint::step(&step.id, &port.id))
            })
            .collect();
        sinks.extend(draft.outputs.iter().map(|port| Endpoint::output(&port.id)));
        sinks
    }

    /// Infers the missing edges of `draft`.
    pub fn infer(&self, draft: DraftGraph) -> Result<CompiledGraph> {
        self.infer_in_order(draft, &[])
    }

    /// Infers the missing edges, visiting unresolved sinks in `visit_order`
    /// first and any sinks it omits afterwards in canonical order.
    pub fn infer_in_order(&self, draft: DraftGraph, visit_order: &[Endpoint]) -> Result<CompiledGraph> {
        validate_draft(&draft)?;

        let canonical = Self::sinks(&draft);
        let (mut edges, mut states) = self.commit_explicit(&draft)?;
        let explicit_count = edges.len();

        // Positions follow the explicit edges only.
        let positions = verify_acyclic(&draft, &edges)?;
        debug!("Step positions: {:?}", positions);

        let mut resolver = CandidateResolver::new(&draft, self.hierarchy, self.naming, &positions);
        for edge in &edges {
            resolver.commit(edge);
        }

        let mut visits: Vec<&Endpoint> = visit_order
            .iter()
            .filter(|sink| canonical.contains(sink))
            .collect();
        for sink in &canonical {
            if !visits.contains(&sink) {
                visits.push(sink);
            }
        }

        let mut sink_states: HashMap<Endpoint, SinkState> = HashMap::new();
        let mut failures: HashMap<Endpoint, InferenceError> = HashMap::new();

        for sink in visits {
            if states.contains_key(sink) || failures.contains_key(sink) {
                continue;
            }
            let Some(port) = draft.sink_port(sink) else {
                continue;
            };

            sink_states.insert(sink.clone(), SinkState::Unresolved);
            match self.resolve_sink(&resolver, sink, port, &mut sink_states) {
                SinkOutcome::Commit(candidate) => {
                    debug!(
                        "Inferred {} -> {} ({})",
                        candidate.source, sink, candidate.compatibility.kind
                    );
                    let edge = Edge {
                        source: candidate.source.clone(),
                        sink: sink.clone(),
                        kind: candidate.compatibility.kind,
                        provenance: Provenance::Inferred,
                    };
                    resolver.commit(&edge);
                    states.insert(
                        sink.clone(),
                        ResolutionState::Resolved {
                            source: candidate.source,
                            provenance: Provenance::Inferred,
                        },
                    );
                    edges.push(edge);
                }
                SinkOutcome::Satisfied(state) => {
                    states.insert(sink.clone(), state);
                }
                SinkOutcome::Failed(err) => {
                    failures.insert(sink.clone(), err);
                }
            }
        }

        let failed = sink_states
            .values()
            .filter(|state| state.is_terminal_failure())
            .count();
        debug!(
            "Visited {} sinks: {} resolved, {} failed",
            sink_states.len(),
            sink_states.len() - failed,
            failed
        );

        if !failures.is_empty() {
            for err in failures.values() {
                debug!("Unresolved sink: {}", err);
            }
            if let Some(first) = canonical.iter().find_map(|sink| failures.remove(sink)) {
                warn!(
                    "Inference failed for '{}' ({} unresolved sinks)",
                    draft.id,
                    failures.len() + 1
                );
                return Err(first);
            }
        }

        let order = verify_acyclic(&draft, &edges)?;

        edges.sort_by_key(|edge| sink_key(&draft, &edge.sink));

        let resolutions: Vec<Resolution> = canonical
            .iter()
            .filter_map(|sink| {
                states.remove(sink).map(|state| Resolution {
                    sink: sink.clone(),
                    state,
                })
            })
            .collect();

        info!(
            "Compiled '{}': {} edges ({} explicit, {} inferred)",
            draft.id,
            edges.len(),
            explicit_count,
            edges.len() - explicit_count
        );

        Ok(CompiledGraph::new(draft, edges, order, resolutions))
    }

    /// Commits explicit bindings, `<step>___<port>` inputs and declared
    /// output sources.
    fn commit_explicit(
        &self,
        draft: &DraftGraph,
    ) -> Result<(Vec<Edge>, HashMap<Endpoint, ResolutionState>)> {
        let mut edges = Vec::new();
        let mut states = HashMap::new();

        for step in &draft.steps {
            for port in &step.inputs {
                let sink = Endpoint::step(&step.id, &port.id);
                let reference = match step.bindings.get(&port.id) {
                    Some(Binding::Literal(_)) => {
                        states.insert(sink, ResolutionState::Literal);
                        continue;
                    }
                    Some(Binding::Source(reference)) => reference.clone(),
                    None => {
                        let qualified =
                            format!("{}{}{}", step.id, STEP_INPUT_SEPARATOR, port.id);
                        if draft.input(&qualified).is_none() {
                            continue;
                        }
                        qualified
                    }
                };

                let edge = self.explicit_edge(draft, sink.clone(), port, &reference)?;
                states.insert(
                    sink,
                    ResolutionState::Resolved {
                        source: edge.source.clone(),
                        provenance: Provenance::Explicit,
                    },
                );
                edges.push(edge);
            }
        }

        for port in &draft.outputs {
            if let Some(reference) = draft.output_sources.get(&port.id) {
                let sink = Endpoint::output(&port.id);
                let edge = self.explicit_edge(draft, sink.clone(), port, reference)?;
                states.insert(
                    sink,
                    ResolutionState::Resolved {
                        source: edge.source.clone(),
                        provenance: Provenance::Explicit,
                    },
                );
                edges.push(edge);
            }
        }

        debug!("Committed {} explicit edges", edges.len());
        Ok((edges, states))
    }

    fn explicit_edge(
        &self,
        draft: &DraftGraph,
        sink: Endpoint,
        sink_port: &Port,
        reference: &str,
    ) -> Result<Edge> {
        let scope = scope_of(&sink);
        let source = Endpoint::parse_source(reference);

        let source_port =
            draft
                .source_port(&source)
                .ok_or_else(|| InferenceError::UnknownSource {
                    step: scope.clone(),
                    port: sink.port.clone(),
                    reference: reference.to_string(),
                })?;

        let context = EdgeContext {
            sink_scattered: sink
                .step_id()
                .and_then(|id| draft.step(id))
                .map(|step| step.scatters(&sink.port))
                .unwrap_or(false),
            source_scattered: source
                .step_id()
                .and_then(|id| draft.step(id))
                .map(|step| step.is_scattered())
                .unwrap_or(false),
        };

        let compatibility = self
            .hierarchy
            .assess(&source_port.port_type, &sink_port.port_type, context)
            .ok_or_else(|| InferenceError::IncompatibleBinding {
                step: scope,
                port: sink.port.clone(),
                reference: reference.to_string(),
                source_type: source_port.port_type.label(),
                sink_type: sink_port.port_type.label(),
            })?;

        Ok(Edge {
            source,
            sink,
            kind: compatibility.kind,
            provenance: Provenance::Explicit,
        })
    }

    fn resolve_sink(
        &self,
        resolver: &CandidateResolver<'_>,
        sink: &Endpoint,
        port: &Port,
        sink_states: &mut HashMap<Endpoint, SinkState>,
    ) -> SinkOutcome {
        let candidates = if self.options.disable_inference {
            Vec::new()
        } else {
            resolver.candidates(sink)
        };

        if candidates.is_empty() {
            if port.default.is_some() {
                sink_states.insert(sink.clone(), SinkState::Resolved);
                return SinkOutcome::Satisfied(ResolutionState::Defaulted);
            }
            if port.optional {
                sink_states.insert(sink.clone(), SinkState::Resolved);
                return SinkOutcome::Satisfied(ResolutionState::Unbound);
            }
            sink_states.insert(sink.clone(), SinkState::Unsatisfiable);
            return SinkOutcome::Failed(InferenceError::MissingRequiredInput {
                step: scope_of(sink),
                port: sink.port.clone(),
            });
        }

        debug!("{} candidates for {}", candidates.len(), sink);
        sink_states.insert(sink.clone(), SinkState::CandidatesFound);

        let best = candidates
            .iter()
            .map(|c| c.compatibility.specificity())
            .min()
            .unwrap_or_default();
        let mut tied: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.compatibility.specificity() == best)
            .collect();

        if tied.len() > 1 && self.options.use_naming_conventions {
            let named: Vec<&Candidate> = tied.iter().filter(|c| c.name_match).collect();
            if named.len() == 1 {
                let chosen = named[0].clone();
                debug!("Naming convention picks {} for {}", chosen.source, sink);
                tied = vec![chosen];
            }
        }

        if tied.len() == 1 {
            sink_states.insert(sink.clone(), SinkState::Resolved);
            return SinkOutcome::Commit(tied.remove(0));
        }

        sink_states.insert(sink.clone(), SinkState::Ambiguous);
        SinkOutcome::Failed(InferenceError::AmbiguousBinding {
            step: scope_of(sink),
            port: sink.port.clone(),
            candidates: tied.iter().map(|c| c.source.to_string()).collect(),
        })
    }
}

/// Step id or top-level scope name used in error reports.
fn scope_of(endpoint: &Endpoint) -> String {
    match &endpoint.node {
        NodeRef::Step(id) => id.clone(),
        NodeRef::Outputs => OUTPUTS_SCOPE.to_string(),
        NodeRef::Inputs => INPUTS_SCOPE.to_string(),
    }
}

/// Sort key of a sink: step declaration index, then port index. Top-level
/// outputs sort after every step.
fn sink_key(draft: &DraftGraph, sink: &Endpoint) -> (usize, usize) {
    match &sink.node {
        NodeRef::Step(id) => {
            let index = draft.step_index(id).unwrap_or(usize::MAX);
            let port = draft
                .step(id)
                .and_then(|step| step.inputs.iter().position(|p| p.id == sink.port))
                .unwrap_or(usize::MAX);
            (index, port)
        }
        NodeRef::Outputs => (
            draft.steps.len(),
            draft
                .outputs
                .iter()
                .position(|p| p.id == sink.port)
                .unwrap_or(usize::MAX),
        ),
        NodeRef::Inputs => (usize::MAX, usize::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeKind, PortType};
    use crate::workflow::Step;
    use serde_json::json;

    fn engine_with<'a>(
        hierarchy: &'a TypeHierarchy,
        naming: &'a NamingConventions,
        use_naming_conventions: bool,
    ) -> InferenceEngine<'a> {
        InferenceEngine::new(
            hierarchy,
            naming,
            InferenceOptions {
                use_naming_conventions,
                ..InferenceOptions::default()
            },
        )
    }

    fn infer(draft: DraftGraph) -> Result<CompiledGraph> {
        let hierarchy = TypeHierarchy::new();
        let naming = NamingConventions::default();
        engine_with(&hierarchy, &naming, false).infer(draft)
    }

    fn producer(id: &str, port: &str) -> Step {
        Step::new(id, format!("{}.cwl", id)).with_output(Port::output(port, PortType::file()))
    }

    fn edge_strings(graph: &CompiledGraph) -> Vec<String> {
        graph
            .edges()
            .iter()
            .map(|e| format!("{} -> {}", e.source, e.sink))
            .collect()
    }

    /// A mid-sized draft mixing explicit, inferred, literal and defaulted
    /// sinks, used by the determinism tests.
    fn pipeline() -> DraftGraph {
        DraftGraph::new("pipeline")
            .with_input(Port::input("reads", PortType::file_with_format("edam:format_1930")))
            .with_input(Port::input("label", PortType::String))
            .with_output(Port::output("summary", PortType::file()))
            .with_output_source("summary", "report/html")
            .with_step(
                Step::new("trim", "trim.cwl")
                    .with_input(Port::input("reads", PortType::file()))
                    .with_input(Port::input("quality", PortType::Int).with_default(json!(20)))
                    .with_output(Port::output("trimmed", PortType::array(PortType::file()))),
            )
            .with_step(
                Step::new("align", "align.cwl")
                    .with_input(Port::input("fastq", PortType::array(PortType::file())))
                    .with_input(Port::input("threads", PortType::Int))
                    .with_output(Port::output("bam", PortType::Directory))
                    .bind_literal("threads", json!(4)),
            )
            .with_step(
                Step::new("report", "report.cwl")
                    .with_input(Port::input("alignments", PortType::Directory))
                    .with_input(Port::input("title", PortType::String))
                    .with_input(Port::input("notes", PortType::Boolean).optional())
                    .with_output(Port::output("html", PortType::file())),
            )
    }

    #[test]
    fn test_infers_single_candidate_edge() {
        let draft = DraftGraph::new("scenario")
            .with_step(producer("A", "f1"))
            .with_step(Step::new("B", "B.cwl").with_input(Port::input("f2", PortType::file())));

        let graph = infer(draft).unwrap();
        assert_eq!(edge_strings(&graph), vec!["A/f1 -> B/f2"]);
        assert_eq!(graph.edges()[0].provenance, Provenance::Inferred);
        assert_eq!(graph.edges()[0].kind, EdgeKind::Direct);
        assert_eq!(graph.order(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_equally_specific_candidates_are_ambiguous() {
        let draft = DraftGraph::new("scenario")
            .with_step(producer("A", "f1"))
            .with_step(producer("C", "f1b"))
            .with_step(Step::new("B", "B.cwl").with_input(Port::input("f2", PortType::file())));

        match infer(draft).unwrap_err() {
            InferenceError::AmbiguousBinding {
                step,
                port,
                candidates,
            } => {
                assert_eq!(step, "B");
                assert_eq!(port, "f2");
                assert_eq!(candidates, vec!["A/f1", "C/f1b"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_naming_conventions_break_ties_when_enabled() {
        let draft = || {
            DraftGraph::new("named")
                .with_step(producer("A", "f1"))
                .with_step(producer("C", "f1b"))
                .with_step(
                    Step::new("B", "B.cwl").with_input(Port::input("f1b", PortType::file())),
                )
        };

        let hierarchy = TypeHierarchy::new();
        let naming = NamingConventions::default();
        let graph = engine_with(&hierarchy, &naming, true).infer(draft()).unwrap();
        assert_eq!(edge_strings(&graph), vec!["C/f1b -> B/f1b"]);

        assert!(matches!(
            engine_with(&hierarchy, &naming, false).infer(draft()),
            Err(InferenceError::AmbiguousBinding { .. })
        ));
    }

    #[test]
    fn test_most_specific_candidate_wins() {
        let hierarchy = TypeHierarchy::from_pairs([("edam:format_1929", "edam:format_1919")]).unwrap();
        let naming = NamingConventions::default();
        let draft = DraftGraph::new("specific")
            .with_step(
                Step::new("fasta", "fasta.cwl").with_output(Port::output(
                    "seq",
                    PortType::file_with_format("edam:format_1929"),
                )),
            )
            .with_step(
                Step::new("plain", "plain.cwl")
                    .with_output(Port::output("seq", PortType::file_with_format("edam:format_1919"))),
            )
            .with_step(Step::new("consume", "consume.cwl").with_input(Port::input(
                "input",
                PortType::file_with_format("edam:format_1919"),
            )));

        let graph = engine_with(&hierarchy, &naming, false).infer(draft).unwrap();
        assert_eq!(edge_strings(&graph), vec!["plain/seq -> consume/input"]);
    }

    #[test]
    fn test_direct_beats_scatter() {
        let draft = DraftGraph::new("scatter")
            .with_step(
                Step::new("many", "many.cwl")
                    .with_output(Port::output("files", PortType::array(PortType::file()))),
            )
            .with_step(producer("one", "file"))
            .with_step(
                Step::new("count", "wc.cwl")
                    .with_input(Port::input("files", PortType::array(PortType::file())))
                    .with_scatter("files"),
            );

        let graph = infer(draft).unwrap();
        assert_eq!(edge_strings(&graph), vec!["many/files -> count/files"]);
        assert_eq!(graph.edges()[0].kind, EdgeKind::Direct);
    }

    #[test]
    fn test_scatter_and_gather_edges() {
        let draft = DraftGraph::new("scatter_gather")
            .with_step(producer("split", "chunk"))
            .with_step(
                Step::new("count", "wc.cwl")
                    .with_input(Port::input("files", PortType::array(PortType::file())))
                    .with_output(Port::output("lines", PortType::Int))
                    .with_scatter("files"),
            )
            .with_step(
                Step::new("sum", "sum.cwl")
                    .with_input(Port::input("counts", PortType::array(PortType::Int))),
            );

        let graph = infer(draft).unwrap();
        let kinds: Vec<EdgeKind> = graph.edges().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Scatter, EdgeKind::Gather]);
        assert_eq!(
            edge_strings(&graph),
            vec!["split/chunk -> count/files", "count/lines -> sum/counts"]
        );
    }

    #[test]
    fn test_scattered_outputs_only_gather() {
        let draft = DraftGraph::new("no_direct")
            .with_step(
                Step::new("count", "wc.cwl")
                    .with_input(Port::input("files", PortType::array(PortType::file())).optional())
                    .with_output(Port::output("lines", PortType::Int))
                    .with_scatter("files"),
            )
            .with_step(Step::new("print", "print.cwl").with_input(Port::input("n", PortType::Int)));

        assert!(matches!(
            infer(draft),
            Err(InferenceError::MissingRequiredInput { step, port }) if step == "print" && port == "n"
        ));
    }

    #[test]
    fn test_missing_default_and_optional_sinks() {
        let draft = DraftGraph::new("fragment").with_step(
            Step::new("append", "append.cwl")
                .with_input(Port::input("file", PortType::file()))
                .with_input(Port::input("str", PortType::String)),
        );
        match infer(draft).unwrap_err() {
            InferenceError::MissingRequiredInput { step, port } => {
                assert_eq!(step, "append");
                assert_eq!(port, "file");
            }
            other => panic!("unexpected error: {}", other),
        }

        let draft = DraftGraph::new("satisfied").with_step(
            Step::new("append", "append.cwl")
                .with_input(Port::input("str", PortType::String).with_default(json!("x")))
                .with_input(Port::input("file", PortType::file()).optional()),
        );
        let graph = infer(draft).unwrap();
        let states: Vec<&ResolutionState> = graph.resolutions().iter().map(|r| &r.state).collect();
        assert_eq!(
            states,
            vec![&ResolutionState::Defaulted, &ResolutionState::Unbound]
        );
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_step_qualified_top_level_input_binds_port() {
        let draft = DraftGraph::new("qualified")
            .with_input(Port::input("append___file", PortType::file()))
            .with_input(Port::input("other", PortType::file()))
            .with_step(Step::new("append", "append.cwl").with_input(Port::input("file", PortType::file())));

        let graph = infer(draft).unwrap();
        assert_eq!(edge_strings(&graph), vec!["append___file -> append/file"]);
        assert_eq!(graph.edges()[0].provenance, Provenance::Explicit);
    }

    #[test]
    fn test_step_qualified_input_is_not_a_general_candidate() {
        let draft = DraftGraph::new("dedicated")
            .with_input(Port::input("x___in", PortType::file()))
            .with_step(
                Step::new("x", "x.cwl")
                    .with_input(Port::input("in", PortType::file()))
                    .with_output(Port::output("out", PortType::file())),
            )
            .with_step(Step::new("y", "y.cwl").with_input(Port::input("in", PortType::file())));

        let graph = infer(draft).unwrap();
        assert_eq!(
            edge_strings(&graph),
            vec!["x___in -> x/in", "x/out -> y/in"]
        );
        assert_eq!(graph.edges()[1].provenance, Provenance::Inferred);
    }

    #[test]
    fn test_disabled_inference_keeps_explicit_edges_only() {
        let draft = || {
            DraftGraph::new("explicit_only")
                .with_input(Port::input("reads", PortType::file()))
                .with_step(
                    Step::new("trim", "trim.cwl")
                        .with_input(Port::input("in", PortType::file()))
                        .with_input(Port::input("quality", PortType::Int).with_default(json!(20)))
                        .with_output(Port::output("out", PortType::file()))
                        .bind("in", "reads"),
                )
                .with_step(
                    Step::new("count", "wc.cwl")
                        .with_input(Port::input("file", PortType::file()))
                        .with_input(Port::input("label", PortType::String).optional()),
                )
        };
        let hierarchy = TypeHierarchy::new();
        let naming = NamingConventions::default();
        let options = InferenceOptions {
            disable_inference: true,
            ..InferenceOptions::default()
        };
        let engine = InferenceEngine::new(&hierarchy, &naming, options);

        match engine.infer(draft()).unwrap_err() {
            InferenceError::MissingRequiredInput { step, port } => {
                assert_eq!(step, "count");
                assert_eq!(port, "file");
            }
            other => panic!("unexpected error: {}", other),
        }

        let mut bound = draft();
        bound.steps[1] = bound.steps[1].clone().bind("file", "trim/out");
        let graph = engine.infer(bound).unwrap();
        assert_eq!(
            edge_strings(&graph),
            vec!["reads -> trim/in", "trim/out -> count/file"]
        );
        assert!(graph
            .edges()
            .iter()
            .all(|edge| edge.provenance == Provenance::Explicit));
    }

    #[test]
    fn test_explicit_binding_fixes_positions() {
        // The consumer is declared first but explicitly reads from the
        // producer, which makes the producer visible to its other inputs.
        let draft = DraftGraph::new("positions")
            .with_step(
                Step::new("consumer", "consumer.cwl")
                    .with_input(Port::input("first", PortType::String))
                    .with_input(Port::input("second", PortType::file()))
                    .bind("first", "producer/name"),
            )
            .with_step(
                Step::new("producer", "producer.cwl")
                    .with_output(Port::output("name", PortType::String))
                    .with_output(Port::output("data", PortType::file())),
            );

        let graph = infer(draft).unwrap();
        assert_eq!(
            edge_strings(&graph),
            vec!["producer/name -> consumer/first", "producer/data -> consumer/second"]
        );
        assert_eq!(graph.order(), &["producer".to_string(), "consumer".to_string()]);
    }

    #[test]
    fn test_explicit_binding_errors() {
        let draft = DraftGraph::new("unknown")
            .with_step(Step::new("a", "a.cwl").with_input(Port::input("in", PortType::file())).bind("in", "ghost/out"));
        assert!(matches!(
            infer(draft),
            Err(InferenceError::UnknownSource { reference, .. }) if reference == "ghost/out"
        ));

        let draft = DraftGraph::new("incompatible")
            .with_step(Step::new("a", "a.cwl").with_output(Port::output("out", PortType::String)))
            .with_step(
                Step::new("b", "b.cwl")
                    .with_input(Port::input("in", PortType::file()))
                    .bind("in", "a/out"),
            );
        match infer(draft).unwrap_err() {
            InferenceError::IncompatibleBinding {
                source_type,
                sink_type,
                ..
            } => {
                assert_eq!(source_type, "string");
                assert_eq!(sink_type, "File");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_explicit_cycle_is_rejected() {
        let step = |id: &str, from: &str| {
            Step::new(id, "tool.cwl")
                .with_input(Port::input("in", PortType::file()))
                .with_output(Port::output("out", PortType::file()))
                .bind("in", format!("{}/out", from))
        };
        let draft = DraftGraph::new("loop")
            .with_step(step("a", "b"))
            .with_step(step("b", "a"));

        match infer(draft).unwrap_err() {
            InferenceError::CyclicDependency { steps } => assert_eq!(steps, vec!["a", "b"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_top_level_outputs_are_inferred() {
        let draft = DraftGraph::new("outputs")
            .with_output(Port::output("count", PortType::Int))
            .with_step(producer("a", "file"))
            .with_step(
                Step::new("wc", "wc.cwl")
                    .with_input(Port::input("file", PortType::file()))
                    .with_output(Port::output("lines", PortType::Int)),
            );

        let graph = infer(draft).unwrap();
        assert_eq!(
            edge_strings(&graph),
            vec!["a/file -> wc/file", "wc/lines -> outputs/count"]
        );
    }

    #[test]
    fn test_first_failure_in_canonical_order_is_reported() {
        let draft = DraftGraph::new("failures")
            .with_step(Step::new("a", "a.cwl").with_input(Port::input("x", PortType::Boolean)))
            .with_step(Step::new("b", "b.cwl").with_input(Port::input("y", PortType::Boolean)));

        let hierarchy = TypeHierarchy::new();
        let naming = NamingConventions::default();
        let engine = engine_with(&hierarchy, &naming, false);

        let mut reversed = InferenceEngine::sinks(&draft);
        reversed.reverse();
        match engine.infer_in_order(draft, &reversed).unwrap_err() {
            InferenceError::MissingRequiredInput { step, .. } => assert_eq!(step, "a"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_pipeline_resolutions() {
        let graph = infer(pipeline()).unwrap();
        assert_eq!(
            edge_strings(&graph),
            vec![
                "reads -> trim/reads",
                "trim/trimmed -> align/fastq",
                "align/bam -> report/alignments",
                "label -> report/title",
                "report/html -> outputs/summary",
            ]
        );

        let literal = graph
            .resolutions()
            .iter()
            .find(|r| r.sink == Endpoint::step("align", "threads"))
            .unwrap();
        assert_eq!(literal.state, ResolutionState::Literal);
        assert_eq!(graph.resolutions().len(), 8);
    }

    #[test]
    fn test_compiling_twice_is_deterministic() {
        let first = infer(pipeline()).unwrap();
        let second = infer(pipeline()).unwrap();
        assert_eq!(first.edges(), second.edges());
        assert_eq!(first.order(), second.order());
    }

    #[test]
    fn test_visiting_order_does_not_matter() {
        let hierarchy = TypeHierarchy::new();
        let naming = NamingConventions::default();
        let engine = engine_with(&hierarchy, &naming, false);
        let baseline = engine.infer(pipeline()).unwrap();

        let sinks = InferenceEngine::sinks(&pipeline());
        let mut reversed = sinks.clone();
        reversed.reverse();

        let mut orders = vec![reversed];
        for shift in 1..sinks.len() {
            let mut rotated = sinks.clone();
            rotated.rotate_left(shift);
            orders.push(rotated);
        }

        for order in orders {
            let graph = engine.infer_in_order(pipeline(), &order).unwrap();
            assert_eq!(graph.edges(), baseline.edges());
        }
    }

    #[test]
    fn test_committed_edges_are_type_sound_and_acyclic() {
        let hierarchy = TypeHierarchy::new();
        let draft = pipeline();
        let graph = infer(draft.clone()).unwrap();

        for edge in graph.edges() {
            let source = draft.source_port(&edge.source).unwrap();
            let sink = draft.sink_port(&edge.sink).unwrap();
            let sink_scattered = edge
                .sink
                .step_id()
                .and_then(|id| draft.step(id))
                .map(|s| s.scatters(&edge.sink.port))
                .unwrap_or(false);
            let source_scattered = edge
                .source
                .step_id()
                .and_then(|id| draft.step(id))
                .map(|s| s.is_scattered())
                .unwrap_or(false);
            let assessed = hierarchy.assess(
                &source.port_type,
                &sink.port_type,
                EdgeContext {
                    sink_scattered,
                    source_scattered,
                },
            );
            assert_eq!(assessed.map(|c| c.kind), Some(edge.kind));
        }

        let position: HashMap<&str, usize> = graph
            .order()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for edge in graph.edges() {
            if let (Some(from), Some(to)) = (edge.source.step_id(), edge.sink.step_id()) {
                assert!(position[from] < position[to]);
            }
        }
    }

    #[test]
    fn test_sink_state_failures() {
        assert!(SinkState::Ambiguous.is_terminal_failure());
        assert!(SinkState::Unsatisfiable.is_terminal_failure());
        assert!(!SinkState::CandidatesFound.is_terminal_failure());
        assert!(!SinkState::Unresolved.is_terminal_failure());
    }
}
