//! Sprites and the stage.
//!
//! A target owns its variables, lists, and render state, and shares an
//! immutable block graph. Targets are held behind `Rc<RefCell>` so threads,
//! the sequencer, and primitives can all reach them; borrows are kept short.

use std::rc::Rc;

use compact_str::CompactString;

use crate::blocks::Blocks;
use crate::util;
use crate::value::Value;
use crate::vecmap::VecMap;

/// How a sprite's costume responds to its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStyle {
    #[default]
    AllAround,
    LeftRight,
    DontRotate,
}
impl RotationStyle {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "all around" => RotationStyle::AllAround,
            "left-right" => RotationStyle::LeftRight,
            "don't rotate" => RotationStyle::DontRotate,
            _ => return None,
        })
    }
    pub fn name(self) -> &'static str {
        match self {
            RotationStyle::AllAround => "all around",
            RotationStyle::LeftRight => "left-right",
            RotationStyle::DontRotate => "don't rotate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: CompactString,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub name: CompactString,
    pub values: Vec<Value>,
}

/// A costume's metadata. Pixel data stays with the storage collaborator and
/// is referenced by asset id.
#[derive(Debug, Clone, PartialEq)]
pub struct Costume {
    pub name: CompactString,
    pub asset_id: CompactString,
}

/// A sound's metadata, referenced by asset id like costumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub name: CompactString,
    pub asset_id: CompactString,
}

/// A sprite or the stage.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: CompactString,
    pub is_stage: bool,
    /// False for clones made at runtime.
    pub is_original: bool,
    pub blocks: Rc<Blocks>,
    /// Scalar variables, keyed by variable id.
    pub variables: VecMap<CompactString, Variable>,
    /// Lists, keyed by list id.
    pub lists: VecMap<CompactString, List>,
    /// Broadcast id to name, populated on the stage only.
    pub broadcasts: VecMap<CompactString, CompactString>,

    pub x: f64,
    pub y: f64,
    pub direction: f64,
    pub size: f64,
    pub visible: bool,
    pub draggable: bool,
    pub rotation_style: RotationStyle,
    pub volume: f64,
    pub current_costume: usize,
    pub costumes: Vec<Costume>,
    pub sounds: Vec<Sound>,
    pub layer_order: u64,
    /// Graphic effect name to current amount (ghost, brightness, ...).
    pub effects: VecMap<CompactString, f64>,
}
impl Target {
    pub fn new(name: CompactString, is_stage: bool, blocks: Rc<Blocks>) -> Self {
        Self {
            name,
            is_stage,
            is_original: true,
            blocks,
            variables: VecMap::new(),
            lists: VecMap::new(),
            broadcasts: VecMap::new(),
            x: 0.0,
            y: 0.0,
            direction: 90.0,
            size: 100.0,
            visible: true,
            draggable: false,
            rotation_style: RotationStyle::AllAround,
            volume: 100.0,
            current_costume: 0,
            costumes: vec![],
            sounds: vec![],
            layer_order: 0,
            effects: VecMap::new(),
        }
    }
    /// Looks up a variable by id, falling back to a name match the way
    /// dropped or remixed fields resolve.
    pub fn variable(&self, id: &str, name: &str) -> Option<&Variable> {
        if self.variables.contains_key(id) {
            return self.variables.get(id);
        }
        self.variables.values().find(|v| v.name == name)
    }
    pub fn variable_mut(&mut self, id: &str, name: &str) -> Option<&mut Variable> {
        if self.variables.contains_key(id) {
            return self.variables.get_mut(id);
        }
        self.variables.iter_mut().map(|x| x.1).find(|v| v.name == name)
    }
    pub fn list(&self, id: &str, name: &str) -> Option<&List> {
        if self.lists.contains_key(id) {
            return self.lists.get(id);
        }
        self.lists.values().find(|v| v.name == name)
    }
    pub fn list_mut(&mut self, id: &str, name: &str) -> Option<&mut List> {
        if self.lists.contains_key(id) {
            return self.lists.get_mut(id);
        }
        self.lists.iter_mut().map(|x| x.1).find(|v| v.name == name)
    }
    /// Makes a runtime clone of this sprite: same block graph, copied
    /// variable and visual state.
    pub fn make_clone(&self) -> Target {
        let mut clone = self.clone();
        clone.is_original = false;
        clone
    }
    /// Moves the sprite to the given stage position. The stage itself never
    /// moves.
    pub fn set_xy(&mut self, x: f64, y: f64) {
        if self.is_stage {
            return;
        }
        self.x = x;
        self.y = y;
    }
    /// Points the sprite in the given direction, wrapped into `(-180, 180]`.
    pub fn set_direction(&mut self, direction: f64) {
        if self.is_stage || !direction.is_finite() {
            return;
        }
        self.direction = util::wrap_clamp(direction, -179.0, 180.0);
    }
}
