//! Workflow Emitter
//!
//! Renders a compiled graph into a declarative workflow document.
//!
//! [`CwlEmitter`] produces CWL YAML with keys in a fixed order so that the
//! same graph always yields the same bytes.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use log::info;
use serde_yaml::{Mapping, Value as YamlValue};

use super::model::{Binding, CompiledGraph, Endpoint, Port};
use crate::error::{InferenceError, Result};
use crate::types::PortType;

/// Header written below the shebang of every generated file.
pub const AUTO_GEN_HEADER: &str =
    "# This file was generated by inferflow. Edit the draft it was compiled from instead.\n";

/// Renders compiled graphs.
pub trait WorkflowEmitter {
    /// Renders the workflow document.
    fn emit(&self, graph: &CompiledGraph) -> Result<String>;

    /// Renders a job file of top-level input values, if the format has one.
    fn emit_inputs(&self, _graph: &CompiledGraph) -> Result<Option<String>> {
        Ok(None)
    }

    /// File extension of emitted documents, without the dot.
    fn extension(&self) -> &str;
}

/// Emits CWL `Workflow` documents.
#[derive(Debug, Clone)]
pub struct CwlEmitter {
    cwl_version: String,
}

impl Default for CwlEmitter {
    fn default() -> Self {
        Self {
            cwl_version: "v1.2".to_string(),
        }
    }
}

fn key(name: &str) -> YamlValue {
    YamlValue::String(name.to_string())
}

fn emit_error(graph: &CompiledGraph, message: impl ToString) -> InferenceError {
    InferenceError::Emit {
        workflow: graph.id().to_string(),
        message: message.to_string(),
    }
}

/// CWL type expression; nested arrays need the expanded form.
fn type_value(port_type: &PortType, optional: bool) -> YamlValue {
    let value = match port_type {
        PortType::Array(inner) if inner.is_array() => {
            let mut expanded = Mapping::new();
            expanded.insert(key("type"), key("array"));
            expanded.insert(key("items"), type_value(inner, false));
            YamlValue::Mapping(expanded)
        }
        other => YamlValue::String(other.to_string()),
    };

    match (value, optional) {
        (YamlValue::String(text), true) => YamlValue::String(format!("{}?", text)),
        (expanded @ YamlValue::Mapping(_), true) => {
            YamlValue::Sequence(vec![key("null"), expanded])
        }
        (value, false) => value,
        (value, true) => value,
    }
}

impl CwlEmitter {
    pub fn new(cwl_version: impl Into<String>) -> Self {
        Self {
            cwl_version: cwl_version.into(),
        }
    }

    fn port_entry(&self, graph: &CompiledGraph, port: &Port) -> Result<Mapping> {
        let mut entry = Mapping::new();
        entry.insert(key("type"), type_value(&port.port_type, port.optional));
        if let Some(format) = port.port_type.format() {
            entry.insert(key("format"), key(format));
        }
        if let Some(default) = &port.default {
            let value = serde_yaml::to_value(default).map_err(|e| emit_error(graph, e))?;
            entry.insert(key("default"), value);
        }
        Ok(entry)
    }

    fn inputs(&self, graph: &CompiledGraph) -> Result<Mapping> {
        let mut inputs = Mapping::new();
        for port in graph.inputs() {
            inputs.insert(
                key(&port.id),
                YamlValue::Mapping(self.port_entry(graph, port)?),
            );
        }
        Ok(inputs)
    }

    fn outputs(&self, graph: &CompiledGraph) -> Result<Mapping> {
        let mut outputs = Mapping::new();
        for port in graph.outputs() {
            let mut entry = self.port_entry(graph, port)?;
            if let Some(edge) = graph.edge_into(&Endpoint::output(&port.id)) {
                entry.insert(key("outputSource"), key(&edge.source.to_string()));
            }
            outputs.insert(key(&port.id), YamlValue::Mapping(entry));
        }
        Ok(outputs)
    }

    fn steps(&self, graph: &CompiledGraph) -> Result<Mapping> {
        let mut steps = Mapping::new();
        for step in graph.steps() {
            let mut bindings = Mapping::new();
            for port in &step.inputs {
                let sink = Endpoint::step(&step.id, &port.id);
                if let Some(edge) = graph.edge_into(&sink) {
                    bindings.insert(key(&port.id), key(&edge.source.to_string()));
                } else if let Some(Binding::Literal(value)) = step.bindings.get(&port.id) {
                    let mut literal = Mapping::new();
                    let value = serde_yaml::to_value(value).map_err(|e| emit_error(graph, e))?;
                    literal.insert(key("default"), value);
                    bindings.insert(key(&port.id), YamlValue::Mapping(literal));
                }
            }

            let mut entry = Mapping::new();
            entry.insert(key("run"), key(&step.run));
            entry.insert(key("in"), YamlValue::Mapping(bindings));
            entry.insert(
                key("out"),
                YamlValue::Sequence(step.outputs.iter().map(|p| key(&p.id)).collect()),
            );
            match step.scatter.as_slice() {
                [] => {}
                [single] => {
                    entry.insert(key("scatter"), key(single));
                }
                many => {
                    entry.insert(
                        key("scatter"),
                        YamlValue::Sequence(many.iter().map(|p| key(p)).collect()),
                    );
                    entry.insert(key("scatterMethod"), key("dotproduct"));
                }
            }

            steps.insert(key(&step.id), YamlValue::Mapping(entry));
        }
        Ok(steps)
    }
}

impl WorkflowEmitter for CwlEmitter {
    fn emit(&self, graph: &CompiledGraph) -> Result<String> {
        let mut document = Mapping::new();
        document.insert(key("cwlVersion"), key(&self.cwl_version));
        document.insert(key("class"), key("Workflow"));

        if graph.steps().iter().any(|s| s.is_scattered()) {
            let mut requirements = Mapping::new();
            requirements.insert(
                key("ScatterFeatureRequirement"),
                YamlValue::Mapping(Mapping::new()),
            );
            document.insert(key("requirements"), YamlValue::Mapping(requirements));
        }

        document.insert(key("inputs"), YamlValue::Mapping(self.inputs(graph)?));
        document.insert(key("outputs"), YamlValue::Mapping(self.outputs(graph)?));
        document.insert(key("steps"), YamlValue::Mapping(self.steps(graph)?));

        let body = serde_yaml::to_string(&YamlValue::Mapping(document))
            .map_err(|e| emit_error(graph, e))?;

        Ok(format!(
            "#!/usr/bin/env cwl-runner\n{}# Compiled at {}\n{}",
            AUTO_GEN_HEADER,
            graph
                .compiled_at()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            body
        ))
    }

    fn emit_inputs(&self, graph: &CompiledGraph) -> Result<Option<String>> {
        let mut values = Mapping::new();
        for port in graph.inputs() {
            if let Some(default) = &port.default {
                let value = serde_yaml::to_value(default).map_err(|e| emit_error(graph, e))?;
                values.insert(key(&port.id), value);
            }
        }
        let body = serde_yaml::to_string(&YamlValue::Mapping(values))
            .map_err(|e| emit_error(graph, e))?;
        Ok(Some(format!("{}{}", AUTO_GEN_HEADER, body)))
    }

    fn extension(&self) -> &str {
        "cwl"
    }
}

/// Writes `<id>.<ext>` (and `<id>_inputs.yml` when the emitter produces a
/// job file) into `dir`, creating it if needed.
///
/// Returns the path of the workflow document.
pub fn write_to_disk(
    emitter: &dyn WorkflowEmitter,
    graph: &CompiledGraph,
    dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| InferenceError::io(dir, e))?;

    let path = dir.join(format!("{}.{}", graph.id(), emitter.extension()));
    let content = emitter.emit(graph)?;
    fs::write(&path, content).map_err(|e| InferenceError::io(&path, e))?;

    if let Some(inputs) = emitter.emit_inputs(graph)? {
        let inputs_path = dir.join(format!("{}_inputs.yml", graph.id()));
        fs::write(&inputs_path, inputs).map_err(|e| InferenceError::io(&inputs_path, e))?;
    }

    info!("Wrote {}", path.display());
    Ok(path)
}
