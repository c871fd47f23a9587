//! The static block graph of a single target.
//!
//! Blocks are parsed from the project file once and never change while the
//! program runs, so each target shares its graph behind an `Rc` and threads
//! walk it by block id. Enumeration order of the underlying map matches the
//! order blocks appear in the project file, which fixes script start order.

use compact_str::{format_compact, CompactString};

use crate::value::Value;
use crate::vecmap::VecMap;

/// The key used to identify a block within its target's block graph.
pub type BlockId = CompactString;

/// One input slot on a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A reporter or substack plugged into the slot.
    Block(BlockId),
    /// A plugged block obscuring a shadow that would be restored if the
    /// block were dragged away. Execution only ever sees the first id.
    BlockWithShadow(BlockId, BlockId),
    /// An unobscured shadow block (an editable literal or dropdown menu).
    Shadow(BlockId),
    /// A bare literal stored directly in the slot.
    Literal(Value),
    /// An empty slot (a substack with nothing in it).
    Empty,
}
impl Input {
    /// Gets the id of the block occupying the slot, if any.
    pub fn block(&self) -> Option<&BlockId> {
        match self {
            Input::Block(id) | Input::BlockWithShadow(id, _) | Input::Shadow(id) => Some(id),
            Input::Literal(_) | Input::Empty => None,
        }
    }
}

/// One dropdown field on a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub value: Value,
    /// For variable, list, and broadcast fields, the id of the named entity.
    pub id: Option<CompactString>,
}

/// Extra data attached to procedure definition/call blocks (and to return
/// blocks, which carry an edited flag this vm does not use).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    pub proccode: CompactString,
    pub argument_ids: Vec<CompactString>,
    pub argument_names: Vec<CompactString>,
    pub argument_defaults: Vec<Value>,
    pub warp: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub opcode: CompactString,
    pub next: Option<BlockId>,
    pub inputs: VecMap<CompactString, Input>,
    pub fields: VecMap<CompactString, Field>,
    pub shadow: bool,
    pub top_level: bool,
    pub mutation: Option<Mutation>,
}
impl Block {
    /// Gets the single field of a dropdown menu shadow block, which is what
    /// the block evaluates to.
    pub fn menu_field(&self) -> Option<&Field> {
        if self.shadow && self.inputs.is_empty() && self.fields.len() == 1 {
            self.fields.iter().next().map(|x| x.1)
        } else {
            None
        }
    }
}

/// The immutable block graph of one target.
#[derive(Debug, Clone, Default)]
pub struct Blocks {
    blocks: VecMap<BlockId, Block>,
}
impl Blocks {
    pub fn new(blocks: VecMap<BlockId, Block>) -> Self {
        Self { blocks }
    }
    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }
    pub fn opcode(&self, id: &str) -> Option<&str> {
        self.blocks.get(id).map(|x| x.opcode.as_str())
    }
    pub fn next(&self, id: &str) -> Option<&BlockId> {
        self.blocks.get(id).and_then(|x| x.next.as_ref())
    }
    /// The top-level non-shadow blocks, in the order they appear in the
    /// project file. Scripts start from these.
    pub fn script_roots(&self) -> impl Iterator<Item = (&BlockId, &Block)> {
        self.blocks.iter().filter(|(_, b)| b.top_level && !b.shadow)
    }
    /// Resolves the substack input for branch `branch_num` (1-based) of a
    /// C-shaped block. Branch 1 is `SUBSTACK`, branch 2 is `SUBSTACK2`, etc.
    pub fn branch(&self, id: &str, branch_num: usize) -> Option<&BlockId> {
        let block = self.blocks.get(id)?;
        let input = if branch_num == 1 {
            block.inputs.get("SUBSTACK")?
        } else {
            block.inputs.get(format_compact!("SUBSTACK{branch_num}").as_str())?
        };
        input.block()
    }
    /// Finds the definition block for a custom procedure by its proccode.
    pub fn procedure_definition(&self, proccode: &str) -> Option<&BlockId> {
        for (id, block) in self.blocks.iter() {
            if block.opcode != "procedures_definition" {
                continue;
            }
            if let Some(proto) = self.procedure_prototype(id) {
                if proto.proccode == proccode {
                    return Some(id);
                }
            }
        }
        None
    }
    /// Gets the prototype mutation of a procedure definition block.
    pub fn procedure_prototype(&self, definition_id: &str) -> Option<&Mutation> {
        let definition = self.blocks.get(definition_id)?;
        let proto_id = definition.inputs.get("custom_block")?.block()?;
        self.blocks.get(proto_id.as_str())?.mutation.as_ref()
    }
}
