//! Draft Parser
//!
//! Loads draft workflows and tool descriptors from YAML.
//!
//! Ports, steps and `in` bindings may be written in either of the two
//! forms CWL allows: a map keyed by id, or a list of entries carrying an
//! `id` field. Port types accept the shorthand (`File[]?`), the expanded
//! array form (`{type: array, items: File}`) and optional unions
//! (`["null", File]`).
//!
//! Steps that declare no ports inline get their signature from a
//! [`DefinitionLoader`].

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use serde_yaml::Value as YamlValue;

use super::loader::{DefinitionLoader, ToolDefinition};
use super::model::{Binding, DraftGraph, Port, Step};
use crate::error::{InferenceError, Result};
use crate::types::{PortType, TypeParseError, MAX_ARRAY_DEPTH};

#[derive(Deserialize, Debug)]
struct DraftDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    inputs: YamlValue,
    #[serde(default)]
    outputs: YamlValue,
    #[serde(default)]
    steps: YamlValue,
}

#[derive(Deserialize, Debug)]
struct StepSpec {
    #[serde(default)]
    id: Option<String>,
    run: String,
    #[serde(default, rename = "in")]
    bindings: YamlValue,
    #[serde(default, deserialize_with = "single_or_vec")]
    scatter: Vec<String>,
    #[serde(default)]
    inputs: YamlValue,
    #[serde(default)]
    outputs: YamlValue,
}

#[derive(Deserialize, Debug, Default)]
struct PortSpec {
    #[serde(rename = "type", default)]
    port_type: YamlValue,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    multiple: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default, alias = "outputSource")]
    source: Option<String>,
}

/// Deserializes either a single string or array of strings into Vec<String>
fn single_or_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Array(arr) => arr
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(de::Error::custom("Expected string in array")),
            })
            .collect(),
        _ => Err(de::Error::custom("Expected string or array of strings")),
    }
}

/// Flattens a map-or-list section into `(id, body)` pairs, keeping order.
fn keyed_entries(section: YamlValue, what: &str) -> std::result::Result<Vec<(String, YamlValue)>, String> {
    match section {
        YamlValue::Null => Ok(Vec::new()),
        YamlValue::Mapping(map) => map
            .into_iter()
            .map(|(key, body)| match key {
                YamlValue::String(id) => Ok((id, body)),
                other => Err(format!("{} keys must be strings, found {:?}", what, other)),
            })
            .collect(),
        YamlValue::Sequence(items) => items
            .into_iter()
            .map(|item| {
                let id = item
                    .get("id")
                    .and_then(YamlValue::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| format!("every entry in {} needs a string 'id'", what))?;
                Ok((id, item))
            })
            .collect(),
        _ => Err(format!("{} must be a map or a list", what)),
    }
}

/// Parses a YAML type expression into a type and an optional flag.
fn parse_type(value: &YamlValue) -> std::result::Result<(PortType, bool), String> {
    parse_nested_type(value, 0)
}

/// `depth` counts the array mappings enclosing `value`.
fn parse_nested_type(
    value: &YamlValue,
    depth: usize,
) -> std::result::Result<(PortType, bool), String> {
    match value {
        YamlValue::String(text) => PortType::parse(text).map_err(|e| e.to_string()),
        YamlValue::Sequence(members) => {
            let mut optional = false;
            let mut concrete = Vec::new();
            for member in members {
                if member.as_str() == Some("null") {
                    optional = true;
                } else {
                    concrete.push(member);
                }
            }
            match concrete.as_slice() {
                [single] => {
                    let (ty, inner_optional) = parse_nested_type(single, depth)?;
                    Ok((ty, optional || inner_optional))
                }
                _ => Err(format!("unsupported union type {:?}", members)),
            }
        }
        YamlValue::Mapping(_) => match value.get("type").and_then(YamlValue::as_str) {
            Some("array") => {
                let items = value
                    .get("items")
                    .ok_or_else(|| "array type is missing 'items'".to_string())?;
                if depth >= MAX_ARRAY_DEPTH {
                    return Err(TypeParseError::TooDeep(depth + 1).to_string());
                }
                let (element, _) = parse_nested_type(items, depth + 1)?;
                let array = PortType::array(element);
                if array.array_depth() + depth > MAX_ARRAY_DEPTH {
                    return Err(TypeParseError::TooDeep(array.array_depth() + depth).to_string());
                }
                Ok((array, false))
            }
            _ => Err(format!("unsupported type expression {:?}", value)),
        },
        YamlValue::Null => Err("missing type".to_string()),
        other => Err(format!("unsupported type expression {:?}", other)),
    }
}

/// Parses one port entry; returns the port and its `source`, if any.
fn parse_port(
    id: &str,
    body: YamlValue,
    make: fn(String, PortType) -> Port,
) -> std::result::Result<(Port, Option<String>), String> {
    let spec = match body {
        YamlValue::String(_) | YamlValue::Sequence(_) => PortSpec {
            port_type: body,
            ..PortSpec::default()
        },
        other => serde_yaml::from_value::<PortSpec>(other).map_err(|e| e.to_string())?,
    };

    let (mut port_type, optional) =
        parse_type(&spec.port_type).map_err(|e| format!("port '{}': {}", id, e))?;
    if spec.multiple && !port_type.is_array() {
        port_type = PortType::array(port_type);
    }
    if let Some(format) = spec.format {
        port_type = port_type.with_format(format);
    }

    let mut port = make(id.to_string(), port_type);
    port.optional = optional || spec.optional;
    port.default = spec.default;
    Ok((port, spec.source))
}

fn parse_ports(
    section: YamlValue,
    what: &str,
    make: fn(String, PortType) -> Port,
) -> std::result::Result<Vec<(Port, Option<String>)>, String> {
    keyed_entries(section, what)?
        .into_iter()
        .map(|(id, body)| parse_port(&id, body, make))
        .collect()
}

fn parse_binding(port: &str, body: YamlValue) -> std::result::Result<Binding, String> {
    match body {
        YamlValue::String(source) => Ok(Binding::Source(source)),
        YamlValue::Mapping(_) => {
            if let Some(source) = body.get("source").and_then(YamlValue::as_str) {
                return Ok(Binding::Source(source.to_string()));
            }
            match body.get("default") {
                Some(value) => to_json(value).map(Binding::Literal),
                None => Err(format!(
                    "binding for '{}' needs a 'source' or a 'default'",
                    port
                )),
            }
        }
        other => to_json(&other).map(Binding::Literal),
    }
}

fn to_json(value: &YamlValue) -> std::result::Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn input_port(id: String, ty: PortType) -> Port {
    Port::input(id, ty)
}

fn output_port(id: String, ty: PortType) -> Port {
    Port::output(id, ty)
}

fn parse_step(
    id: String,
    body: YamlValue,
    loader: &dyn DefinitionLoader,
    origin: &str,
) -> Result<Step> {
    let spec: StepSpec = serde_yaml::from_value(body)
        .map_err(|e| InferenceError::parse(origin, format!("step '{}': {}", id, e)))?;
    let id = spec.id.unwrap_or(id);
    let mut step = Step::new(id, spec.run);

    let has_inline_ports = !spec.inputs.is_null() || !spec.outputs.is_null();
    if has_inline_ports {
        let inputs = parse_ports(spec.inputs, "step inputs", input_port)
            .map_err(|e| InferenceError::parse(origin, format!("step '{}': {}", step.id, e)))?;
        let outputs = parse_ports(spec.outputs, "step outputs", output_port)
            .map_err(|e| InferenceError::parse(origin, format!("step '{}': {}", step.id, e)))?;
        step.inputs = inputs.into_iter().map(|(port, _)| port).collect();
        step.outputs = outputs.into_iter().map(|(port, _)| port).collect();
    } else {
        let definition = loader.load(&step.run)?.ok_or_else(|| {
            InferenceError::DefinitionNotFound {
                step: step.id.clone(),
                run: step.run.clone(),
            }
        })?;
        debug!(
            "Step '{}' uses definition '{}' ({} in, {} out)",
            step.id,
            definition.id,
            definition.inputs.len(),
            definition.outputs.len()
        );
        step.inputs = definition.inputs;
        step.outputs = definition.outputs;
    }

    step.scatter = spec.scatter;

    let bindings = keyed_entries(spec.bindings, "step bindings")
        .map_err(|e| InferenceError::parse(origin, format!("step '{}': {}", step.id, e)))?;
    for (port, body) in bindings {
        let binding = parse_binding(&port, body)
            .map_err(|e| InferenceError::parse(origin, format!("step '{}': {}", step.id, e)))?;
        step.bindings.insert(port, binding);
    }

    Ok(step)
}

/// Parses a draft workflow from YAML text.
///
/// `fallback_id` is used when the document carries no `id`.
pub fn parse_draft(
    yaml: &str,
    fallback_id: &str,
    loader: &dyn DefinitionLoader,
) -> Result<DraftGraph> {
    let document: DraftDocument =
        serde_yaml::from_str(yaml).map_err(|e| InferenceError::parse(fallback_id, e))?;
    let id = document.id.unwrap_or_else(|| fallback_id.to_string());
    let origin = id.clone();

    let mut draft = DraftGraph::new(id);

    for (port, _) in parse_ports(document.inputs, "inputs", output_port)
        .map_err(|e| InferenceError::parse(&origin, e))?
    {
        draft = draft.with_input(port);
    }

    for (port, source) in parse_ports(document.outputs, "outputs", input_port)
        .map_err(|e| InferenceError::parse(&origin, e))?
    {
        if let Some(source) = source {
            draft = draft.with_output_source(port.id.clone(), source);
        }
        draft = draft.with_output(port);
    }

    let steps = keyed_entries(document.steps, "steps").map_err(|e| InferenceError::parse(&origin, e))?;
    for (step_id, body) in steps {
        let step = parse_step(step_id, body, loader, &origin)?;
        draft = draft.with_step(step);
    }

    info!(
        "Parsed draft '{}': {} steps, {} inputs, {} outputs",
        draft.id,
        draft.steps.len(),
        draft.inputs.len(),
        draft.outputs.len()
    );

    Ok(draft)
}

/// Loads a draft workflow from a YAML file.
///
/// The file stem is used as the workflow id when the document has none.
///
/// # Example
///
/// ```rust,no_run
/// use inferflow::workflow::{load_draft, SearchPathLoader};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let loader = SearchPathLoader::new(vec!["tools".into()]);
///     let draft = load_draft("pipeline.yml", &loader)?;
///     println!("Loaded {} steps", draft.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_draft(path: impl AsRef<Path>, loader: &dyn DefinitionLoader) -> Result<DraftGraph> {
    let path = path.as_ref();
    info!("Loading draft from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|e| InferenceError::io(path, e))?;
    debug!("YAML content loaded ({} bytes)", content.len());

    let fallback_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    parse_draft(&content, &fallback_id, loader)
}

/// Parses a CWL-style tool descriptor into its port signature.
pub fn parse_tool_definition(yaml: &str, fallback_id: &str, origin: &str) -> Result<ToolDefinition> {
    let document: DraftDocument =
        serde_yaml::from_str(yaml).map_err(|e| InferenceError::parse(origin, e))?;

    let inputs = parse_ports(document.inputs, "inputs", input_port)
        .map_err(|e| InferenceError::parse(origin, e))?;
    let outputs = parse_ports(document.outputs, "outputs", output_port)
        .map_err(|e| InferenceError::parse(origin, e))?;

    Ok(ToolDefinition {
        id: document.id.unwrap_or_else(|| fallback_id.to_string()),
        inputs: inputs.into_iter().map(|(port, _)| port).collect(),
        outputs: outputs.into_iter().map(|(port, _)| port).collect(),
    })
}
