//! Runtime-registered block extensions.
//!
//! An extension describes its blocks with an [`ExtensionInfo`], the same
//! shape extension authors are used to: an id, a display name, a block list
//! with types and texts, and dropdown menus. Registering it installs every
//! executable block into the owning runtime's primitive table under
//! namespaced opcodes (`<id>_<opcode>`). Registration is runtime state, so
//! separate runtimes never see each other's extensions.

use std::rc::Rc;

use compact_str::{format_compact, CompactString};

use crate::primitives::{BlockInfo, BlockResult, BlockType, HandlerFn, PrimitiveTable};

/// Categories built into every runtime, plus the first-party extensions
/// every player ships. Projects may reference these without consulting the
/// security manager.
const BUILTIN_IDS: &[&str] = &[
    "motion", "looks", "sound", "event", "control", "sensing", "operator", "data", "procedures",
    "pen", "music", "videoSensing", "text2speech", "translate", "makeymakey", "microbit", "ev3",
    "boost", "wedo2", "gdxfor",
];

/// The shape of one extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionBlockType {
    Command,
    Reporter,
    Boolean,
    /// A predicate hat. Edge-activated unless the block says otherwise.
    Hat,
    /// An event hat; it has no handler and is fired with
    /// [`crate::runtime::Runtime::start_hats`].
    Event,
    Conditional,
    Loop,
    /// UI-only entries: they appear in palettes but never execute.
    Button,
    Label,
    Xml,
}
impl ExtensionBlockType {
    fn executable(self) -> Option<BlockType> {
        Some(match self {
            ExtensionBlockType::Command => BlockType::Command,
            ExtensionBlockType::Reporter => BlockType::Reporter,
            ExtensionBlockType::Boolean => BlockType::Boolean,
            ExtensionBlockType::Hat => BlockType::Hat,
            ExtensionBlockType::Event => BlockType::Event,
            ExtensionBlockType::Conditional => BlockType::Conditional,
            ExtensionBlockType::Loop => BlockType::Loop,
            ExtensionBlockType::Button | ExtensionBlockType::Label | ExtensionBlockType::Xml => return None,
        })
    }
}

/// One block provided by an extension.
pub struct ExtensionBlock {
    /// Opcode within the extension's namespace.
    pub opcode: CompactString,
    pub block_type: ExtensionBlockType,
    /// Palette text with argument placeholders, kept for editors.
    pub text: String,
    /// Hats only. Extension hats poll every tick by default.
    pub edge_activated: bool,
    /// Hats only: whether firing restarts a script that is already running.
    pub restart_existing_threads: bool,
    /// The handler. `None` for event hats and UI-only entries.
    pub func: Option<HandlerFn>,
}
impl ExtensionBlock {
    pub fn new(opcode: &str, block_type: ExtensionBlockType, func: HandlerFn) -> Self {
        Self {
            opcode: opcode.into(),
            block_type,
            text: String::new(),
            edge_activated: block_type == ExtensionBlockType::Hat,
            restart_existing_threads: false,
            func: Some(func),
        }
    }
    /// An event hat, which never has a handler.
    pub fn event(opcode: &str) -> Self {
        Self {
            opcode: opcode.into(),
            block_type: ExtensionBlockType::Event,
            text: String::new(),
            edge_activated: false,
            restart_existing_threads: false,
            func: None,
        }
    }
}

/// A dropdown menu declared by an extension. Menu shadows in projects
/// evaluate to their field value, so menus need no handlers.
#[derive(Debug, Clone)]
pub struct ExtensionMenu {
    pub name: CompactString,
    pub accept_reporters: bool,
    pub items: Vec<CompactString>,
}

/// Everything an extension declares about itself, mirroring the usual
/// `getInfo()` shape.
pub struct ExtensionInfo {
    pub id: CompactString,
    pub name: CompactString,
    pub blocks: Vec<ExtensionBlock>,
    pub menus: Vec<ExtensionMenu>,
}

/// Per-runtime record of what extensions are installed.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    loaded: Vec<CompactString>,
    opcodes: Vec<CompactString>,
}
impl ExtensionRegistry {
    /// Whether the id names a built-in category rather than a real
    /// extension.
    pub fn is_builtin(id: &str) -> bool {
        BUILTIN_IDS.contains(&id)
    }
    pub fn is_loaded(&self, id: &str) -> bool {
        Self::is_builtin(id) || self.loaded.iter().any(|x| x == id)
    }
    pub fn loaded_ids(&self) -> &[CompactString] {
        &self.loaded
    }
    /// Whether an opcode was provided by a registered extension. The
    /// compiled path sends these through the interpreter.
    pub(crate) fn is_extension_opcode(&self, opcode: &str) -> bool {
        self.opcodes.iter().any(|x| x == opcode)
    }

    pub(crate) fn install(&mut self, info: ExtensionInfo, table: &mut PrimitiveTable) {
        for block in info.blocks {
            let Some(block_type) = block.block_type.executable() else {
                continue;
            };
            let opcode = format_compact!("{}_{}", info.id, block.opcode);
            let func = block.func.unwrap_or_else(|| Rc::new(|_, _| Ok(BlockResult::Nothing)));
            table.register(BlockInfo {
                opcode: opcode.clone(),
                block_type,
                edge_activated: block_type == BlockType::Hat && block.edge_activated,
                restart_existing_threads: block.restart_existing_threads,
                func,
            });
            self.opcodes.push(opcode);
        }
        if !self.loaded.iter().any(|x| *x == info.id) {
            self.loaded.push(info.id);
        }
    }
}
