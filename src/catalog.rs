//! Tool and prompt catalog.
//!
//! The catalog is a data table, not code: `catalog/workspace.json` is
//! compiled into the binary and parsed once at startup (or replaced by a
//! file named in `RELAY_CATALOG_PATH`). Every entry is bound to the relay
//! with a fixed remote operation name and RPC method; the router looks
//! entries up by name and never mutates them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const BUILTIN_CATALOG: &str = include_str!("../catalog/workspace.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read catalog file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{namespace} entry #{index} has an empty name")]
    EmptyName { namespace: &'static str, index: usize },

    #[error("duplicate {namespace} name '{name}'")]
    Duplicate { namespace: &'static str, name: String },
}

// ── Bindings ────────────────────────────────────────────────────────────────

/// Protocol method tag sent to the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "tools/call")]
    ToolsCall,
    #[serde(rename = "prompts/get")]
    PromptsGet,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::ToolsCall => "tools/call",
            RpcMethod::PromptsGet => "prompts/get",
        }
    }
}

/// What a catalog entry relays to: `(remote operation name, rpc method)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub remote_name: String,
    pub method: RpcMethod,
}

// ── Parameter schema ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    /// Element type for `array` parameters.
    #[serde(default)]
    pub items: Option<ParamType>,
    /// Allowed values for `string` parameters.
    #[serde(default, rename = "enum")]
    pub allowed: Option<Vec<String>>,
}

impl ParamSpec {
    fn json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.kind));
        if !self.description.is_empty() {
            schema.insert("description".into(), json!(self.description));
        }
        if self.kind == ParamType::Array {
            let item_type = self.items.unwrap_or(ParamType::String);
            schema.insert("items".into(), json!({ "type": item_type }));
        }
        if let Some(allowed) = &self.allowed {
            schema.insert("enum".into(), json!(allowed));
        }
        Value::Object(schema)
    }
}

// ── Descriptors ─────────────────────────────────────────────────────────────

/// Raw catalog record as it appears in the data file.
#[derive(Debug, Deserialize)]
struct EntryRecord {
    name: String,
    #[serde(default)]
    description: String,
    /// Remote operation name when it differs from `name`.
    #[serde(default)]
    remote: Option<String>,
    #[serde(default)]
    params: BTreeMap<String, ParamSpec>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tools: Vec<EntryRecord>,
    #[serde(default)]
    prompts: Vec<EntryRecord>,
}

/// One registered tool or prompt. Immutable after startup.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    pub description: String,
    pub params: BTreeMap<String, ParamSpec>,
    pub binding: Binding,
}

impl Descriptor {
    fn from_record(record: EntryRecord, method: RpcMethod) -> Self {
        let remote_name = record
            .remote
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| record.name.clone());
        Self {
            name: record.name,
            description: record.description,
            params: record.params,
            binding: Binding { remote_name, method },
        }
    }

    /// Names of required parameters, sorted.
    pub fn required_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(_, p)| p.required)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// MCP `inputSchema` for `tools/list`.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, spec)| (name.clone(), spec.json_schema()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_params(),
        })
    }

    /// MCP tool object.
    pub fn to_mcp_tool(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// MCP prompt object. Prompt arguments are untyped in MCP, so only
    /// name, description and optionality survive.
    pub fn to_mcp_prompt(&self) -> Value {
        let arguments: Vec<Value> = self
            .params
            .iter()
            .map(|(name, spec)| {
                json!({
                    "name": name,
                    "description": spec.description,
                    "required": spec.required,
                })
            })
            .collect();
        json!({
            "name": self.name,
            "description": self.description,
            "arguments": arguments,
        })
    }
}

// ── Catalog ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Catalog {
    tools: Vec<Descriptor>,
    prompts: Vec<Descriptor>,
    tool_index: HashMap<String, usize>,
    prompt_index: HashMap<String, usize>,
}

impl Catalog {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Built-in table, or the file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            None => Self::builtin(),
            Some(path) => {
                let src = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&src)
            }
        }
    }

    pub fn from_json(src: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(src)?;
        let (tools, tool_index) = register("tool", file.tools, RpcMethod::ToolsCall)?;
        let (prompts, prompt_index) = register("prompt", file.prompts, RpcMethod::PromptsGet)?;
        Ok(Self { tools, prompts, tool_index, prompt_index })
    }

    pub fn tool(&self, name: &str) -> Option<&Descriptor> {
        self.tool_index.get(name).map(|&i| &self.tools[i])
    }

    pub fn prompt(&self, name: &str) -> Option<&Descriptor> {
        self.prompt_index.get(name).map(|&i| &self.prompts[i])
    }

    pub fn tools(&self) -> &[Descriptor] {
        &self.tools
    }

    pub fn prompts(&self) -> &[Descriptor] {
        &self.prompts
    }

    /// `tools/list` payload, in catalog order.
    pub fn tool_list(&self) -> Vec<Value> {
        self.tools.iter().map(Descriptor::to_mcp_tool).collect()
    }

    /// `prompts/list` payload, in catalog order.
    pub fn prompt_list(&self) -> Vec<Value> {
        self.prompts.iter().map(Descriptor::to_mcp_prompt).collect()
    }
}

fn register(
    namespace: &'static str,
    records: Vec<EntryRecord>,
    method: RpcMethod,
) -> Result<(Vec<Descriptor>, HashMap<String, usize>), CatalogError> {
    let mut entries = Vec::with_capacity(records.len());
    let mut index = HashMap::with_capacity(records.len());

    for (i, record) in records.into_iter().enumerate() {
        if record.name.trim().is_empty() {
            return Err(CatalogError::EmptyName { namespace, index: i });
        }
        if index.contains_key(&record.name) {
            return Err(CatalogError::Duplicate { namespace, name: record.name });
        }
        index.insert(record.name.clone(), entries.len());
        entries.push(Descriptor::from_record(record, method));
    }

    Ok((entries, index))
}
