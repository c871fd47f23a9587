//! The sb3 project container: parsing, installation, and saving.
//!
//! A [`Project`] holds the container close to its file shape (block and
//! comment entries stay as ordered raw JSON so an id-compression pass can
//! rewrite them losslessly). [`Project::install`] turns it into live runtime
//! state: it validates everything first, so a rejected project never leaves
//! a partially-installed runtime behind.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::blocks::{Block, BlockId, Blocks, Field, Input, Mutation};
use crate::extensions::ExtensionRegistry;
use crate::runtime::{Monitor, Runtime};
use crate::target::{Costume, List, RotationStyle, Sound, Target, Variable};
use crate::util;
use crate::value::Value;
use crate::vecmap::VecMap;

/// Why a project could not be loaded. Loading is all-or-nothing: any of
/// these leaves the runtime exactly as it was.
#[derive(Debug)]
pub enum ProjectError {
    Json(serde_json::Error),
    /// No target in the file is marked as the stage.
    NoStage,
    /// The security manager refused one of the project's extensions.
    ExtensionDenied { id: CompactString },
}
impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProjectError::Json(e) => write!(f, "malformed project json: {e}"),
            ProjectError::NoStage => write!(f, "project has no stage"),
            ProjectError::ExtensionDenied { id } => write!(f, "extension not allowed: {id}"),
        }
    }
}
impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::Json(e) => Some(e),
            _ => None,
        }
    }
}
impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        ProjectError::Json(e)
    }
}

fn default_direction() -> f64 {
    90.0
}
fn default_hundred() -> f64 {
    100.0
}
fn default_true() -> bool {
    true
}

/// One target as stored in the file. Blocks and comments stay raw so their
/// entry order and unknown fields survive a round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTarget {
    #[serde(default, rename = "isStage")]
    pub is_stage: bool,
    pub name: CompactString,
    /// Variable id to `[name, value]` (a third element marks cloud
    /// variables, which load as plain ones).
    #[serde(default)]
    pub variables: VecMap<CompactString, Json>,
    /// List id to `[name, [items...]]`.
    #[serde(default)]
    pub lists: VecMap<CompactString, Json>,
    /// Broadcast id to name.
    #[serde(default)]
    pub broadcasts: VecMap<CompactString, CompactString>,
    #[serde(default)]
    pub blocks: VecMap<CompactString, Json>,
    #[serde(default)]
    pub comments: VecMap<CompactString, Json>,
    #[serde(default, rename = "currentCostume")]
    pub current_costume: usize,
    #[serde(default)]
    pub costumes: Vec<Json>,
    #[serde(default)]
    pub sounds: Vec<Json>,
    #[serde(default = "default_hundred")]
    pub volume: f64,
    #[serde(default, rename = "layerOrder")]
    pub layer_order: u64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_hundred")]
    pub size: f64,
    #[serde(default = "default_direction")]
    pub direction: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub draggable: bool,
    #[serde(default, rename = "rotationStyle")]
    pub rotation_style: Option<CompactString>,
    /// Anything else the file carried (tempo, video state, ...), kept for
    /// saving.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMonitor {
    pub id: CompactString,
    pub opcode: CompactString,
    #[serde(default, rename = "spriteName")]
    pub sprite_name: Option<CompactString>,
    #[serde(default)]
    pub value: Json,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Json>,
}

/// A parsed sb3 project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub targets: Vec<ProjectTarget>,
    #[serde(default)]
    pub monitors: Vec<ProjectMonitor>,
    #[serde(default)]
    pub extensions: Vec<CompactString>,
    #[serde(default, rename = "extensionURLs", skip_serializing_if = "VecMap::is_empty")]
    pub extension_urls: VecMap<CompactString, String>,
    #[serde(default)]
    pub meta: Json,
}

impl Project {
    pub fn parse(text: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string(&self)?)
    }

    /// Installs the project's targets and monitors into `runtime`, replacing
    /// whatever was loaded before. All validation (including the security
    /// check on every non-builtin extension) happens before the runtime is
    /// touched.
    pub fn install(&self, runtime: &mut Runtime) -> Result<(), ProjectError> {
        for id in &self.extensions {
            if ExtensionRegistry::is_builtin(id) {
                continue;
            }
            let allowed = self
                .extension_urls
                .get(id.as_str())
                .map(|url| runtime.security.can_load_extension(url))
                .unwrap_or(false);
            if !allowed {
                return Err(ProjectError::ExtensionDenied { id: id.clone() });
            }
        }
        if !self.targets.iter().any(|t| t.is_stage) {
            return Err(ProjectError::NoStage);
        }

        let mut installed = vec![];
        for t in &self.targets {
            let blocks = Rc::new(Blocks::new(parse_blocks(&t.blocks)));
            let mut target = Target::new(t.name.clone(), t.is_stage, blocks);
            for (id, entry) in t.variables.iter() {
                let arr = entry.as_array();
                let name = arr
                    .and_then(|a| a.first())
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let value = arr
                    .and_then(|a| a.get(1))
                    .map(Value::try_from)
                    .and_then(Result::ok)
                    .unwrap_or_else(|| Value::from(0.0));
                target.variables.insert(id.clone(), Variable { name: name.into(), value });
            }
            for (id, entry) in t.lists.iter() {
                let arr = entry.as_array();
                let name = arr
                    .and_then(|a| a.first())
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let values = arr
                    .and_then(|a| a.get(1))
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .map(|v| Value::try_from(v).unwrap_or_else(|_| Value::from("")))
                            .collect()
                    })
                    .unwrap_or_default();
                target.lists.insert(id.clone(), List { name: name.into(), values });
            }
            for (id, name) in t.broadcasts.iter() {
                target.broadcasts.insert(id.clone(), name.clone());
            }
            target.x = t.x;
            target.y = t.y;
            target.size = t.size;
            target.direction = t.direction;
            target.visible = t.visible;
            target.draggable = t.draggable;
            target.volume = t.volume;
            target.layer_order = t.layer_order;
            target.current_costume = t.current_costume;
            target.rotation_style = t
                .rotation_style
                .as_deref()
                .and_then(RotationStyle::from_name)
                .unwrap_or_default();
            target.costumes = t.costumes.iter().filter_map(parse_costume).collect();
            target.sounds = t.sounds.iter().filter_map(parse_sound).collect();
            installed.push(Rc::new(RefCell::new(target)));
        }

        runtime.threads.clear();
        runtime.targets = installed;
        for m in &self.monitors {
            runtime.request_add_monitor(Monitor {
                id: m.id.clone(),
                opcode: m.opcode.clone(),
                sprite_name: m.sprite_name.clone(),
                value: Value::try_from(&m.value).unwrap_or_else(|_| Value::from(0.0)),
                visible: m.visible,
            });
        }
        Ok(())
    }
}

/// Parses and installs a project in one step.
pub fn load_str(runtime: &mut Runtime, text: &str) -> Result<Project, ProjectError> {
    let project = Project::parse(text)?;
    project.install(runtime)?;
    Ok(project)
}

fn parse_costume(json: &Json) -> Option<Costume> {
    Some(Costume {
        name: json.get("name")?.as_str()?.into(),
        asset_id: json.get("assetId")?.as_str()?.into(),
    })
}

fn parse_sound(json: &Json) -> Option<Sound> {
    Some(Sound {
        name: json.get("name")?.as_str()?.into(),
        asset_id: json.get("assetId")?.as_str()?.into(),
    })
}

/// Builds the block graph of one target. Entries that are bare primitive
/// arrays (loose top-level reporters some editors leave behind) are dropped.
fn parse_blocks(raw: &VecMap<CompactString, Json>) -> VecMap<BlockId, Block> {
    let mut out = VecMap::with_capacity(raw.len());
    let mut synthesized: Vec<(BlockId, Block)> = vec![];
    for (id, json) in raw.iter() {
        let Some(obj) = json.as_object() else { continue };
        let mut block = Block {
            opcode: obj.get("opcode").and_then(|v| v.as_str()).unwrap_or_default().into(),
            next: obj.get("next").and_then(|v| v.as_str()).map(CompactString::from),
            inputs: VecMap::new(),
            fields: VecMap::new(),
            shadow: obj.get("shadow").and_then(|v| v.as_bool()).unwrap_or(false),
            top_level: obj.get("topLevel").and_then(|v| v.as_bool()).unwrap_or(false),
            mutation: obj.get("mutation").map(parse_mutation),
        };
        if let Some(inputs) = obj.get("inputs").and_then(|v| v.as_object()) {
            for (name, value) in inputs {
                block.inputs.insert(name.as_str().into(), parse_input(value, &mut synthesized));
            }
        }
        if let Some(fields) = obj.get("fields").and_then(|v| v.as_object()) {
            for (name, value) in fields {
                let arr = value.as_array();
                let field_value = arr
                    .and_then(|a| a.first())
                    .map(Value::try_from)
                    .and_then(Result::ok)
                    .unwrap_or_else(|| Value::from(""));
                let field_id = arr
                    .and_then(|a| a.get(1))
                    .and_then(|v| v.as_str())
                    .map(CompactString::from);
                block.fields.insert(name.as_str().into(), Field { value: field_value, id: field_id });
            }
        }
        out.insert(id.clone(), block);
    }
    for (id, block) in synthesized {
        out.insert(id, block);
    }
    out
}

/// Decodes one input slot array: `[shadow_state, value, obscured_shadow?]`.
fn parse_input(json: &Json, synthesized: &mut Vec<(BlockId, Block)>) -> Input {
    let Some(arr) = json.as_array() else { return Input::Empty };
    let state = arr.first().and_then(|v| v.as_u64()).unwrap_or(0);
    match arr.get(1) {
        Some(Json::String(id)) => {
            let id: BlockId = id.as_str().into();
            match (state, arr.get(2).and_then(|v| v.as_str())) {
                (3, Some(shadow)) => Input::BlockWithShadow(id, shadow.into()),
                (1, _) => Input::Shadow(id),
                _ => Input::Block(id),
            }
        }
        Some(Json::Array(prim)) => parse_primitive(prim, synthesized),
        _ => Input::Empty,
    }
}

/// Decodes a compressed primitive array. Number, color, and text forms
/// become literals; variable and list forms become synthesized reporter
/// blocks so execution has one representation for them.
fn parse_primitive(prim: &[Json], synthesized: &mut Vec<(BlockId, Block)>) -> Input {
    let code = prim.first().and_then(|v| v.as_u64()).unwrap_or(0);
    match code {
        // broadcast: the name is the useful part
        11 => Input::Literal(Value::from(prim.get(1).and_then(|v| v.as_str()).unwrap_or_default())),
        12 | 13 => {
            let name = prim.get(1).and_then(|v| v.as_str()).unwrap_or_default();
            let entity_id = prim.get(2).and_then(|v| v.as_str()).map(CompactString::from);
            let (opcode, field_name) = if code == 12 {
                ("data_variable", "VARIABLE")
            } else {
                ("data_listcontents", "LIST")
            };
            let id: BlockId = util::uid().into();
            let mut fields = VecMap::new();
            fields.insert(field_name.into(), Field { value: Value::from(name), id: entity_id });
            synthesized.push((
                id.clone(),
                Block {
                    opcode: opcode.into(),
                    next: None,
                    inputs: VecMap::new(),
                    fields,
                    shadow: false,
                    top_level: false,
                    mutation: None,
                },
            ));
            Input::Block(id)
        }
        _ => match prim.get(1).map(Value::try_from) {
            Some(Ok(value)) => Input::Literal(value),
            _ => Input::Empty,
        },
    }
}

fn parse_mutation(json: &Json) -> Mutation {
    let get_str = |key: &str| json.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    // argument lists are nested json strings
    let parse_names = |key: &str| serde_json::from_str::<Vec<CompactString>>(get_str(key)).unwrap_or_default();
    let argument_defaults = serde_json::from_str::<Vec<Json>>(get_str("argumentdefaults"))
        .unwrap_or_default()
        .iter()
        .map(|v| Value::try_from(v).unwrap_or_else(|_| Value::from("")))
        .collect();
    let warp = match json.get("warp") {
        Some(Json::Bool(b)) => *b,
        Some(Json::String(s)) => s == "true",
        _ => false,
    };
    Mutation {
        proccode: get_str("proccode").into(),
        argument_ids: parse_names("argumentids"),
        argument_names: parse_names("argumentnames"),
        argument_defaults,
        warp,
    }
}
