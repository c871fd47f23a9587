//! The ahead-of-time direct-call path.
//!
//! When a thread is created with compilation enabled, the first block it
//! executes triggers a walk of its whole script (including reachable
//! procedure definitions). Every block is translated into a slot: either a
//! direct-call node with the handler already resolved and all literal
//! arguments pre-parsed, or a marker sending that one block through the
//! interpreter (blocks on the compatibility list, and all extension-provided
//! opcodes). An opcode nobody implements fails the whole script, which is
//! reported as a compile-error event and demotes the thread to the
//! interpreter. Both paths drive the same thread state machine, so a stack
//! can interleave compiled and interpreted frames freely.

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;

use crate::blocks::{Block, BlockId, Blocks, Input, Mutation};
use crate::primitives::{Arguments, BlockInfo};
use crate::runtime::Runtime;
use crate::thread::Thread;
use crate::value::Value;
use crate::vecmap::VecMap;

/// Native blocks that always execute through the interpreter, even in
/// compiled threads. These either keep private per-frame state across
/// re-entries or touch runtime services in ways the direct path does not
/// pre-resolve.
const COMPAT_STACKED: &[&str] = &[
    "looks_changestretchby",
    "looks_hideallsprites",
    "looks_say",
    "looks_sayforsecs",
    "looks_setstretchto",
    "looks_switchbackdroptoandwait",
    "looks_think",
    "looks_thinkforsecs",
    "motion_align_scene",
    "motion_glidesecstoxy",
    "motion_glideto",
    "motion_goto",
    "motion_pointtowards",
    "motion_scroll_right",
    "motion_scroll_up",
    "sensing_askandwait",
    "sensing_setdragmode",
    "sound_changeeffectby",
    "sound_changevolumeby",
    "sound_cleareffects",
    "sound_play",
    "sound_playuntildone",
    "sound_seteffectto",
    "sound_setvolumeto",
    "sound_stopallsounds",
    "motion_moveupdownsteps",
    "motion_move_sprite_to_scene_side",
    "data_listforeachnum",
    "data_listforeachitem",
];
const COMPAT_INPUTS: &[&str] = &[
    "motion_xscroll",
    "motion_yscroll",
    "sensing_loud",
    "sensing_loudness",
    "sensing_userid",
    "sound_volume",
    "sensing_mousescrolling",
];

#[derive(Debug)]
pub enum CompileError {
    UnknownOpcode { opcode: CompactString },
}
impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::UnknownOpcode { opcode } => write!(f, "unknown opcode: {opcode}"),
        }
    }
}
impl std::error::Error for CompileError {}

/// Arguments known at compile time: field values, field entity ids, literal
/// inputs, and the mutation. Dynamic inputs are filled in at execution.
#[derive(Debug, Default)]
pub struct ConstArgs {
    values: VecMap<CompactString, Value>,
    field_ids: VecMap<CompactString, CompactString>,
    mutation: Option<Mutation>,
}
impl ConstArgs {
    pub(crate) fn to_arguments(&self) -> Arguments {
        Arguments {
            values: self.values.clone(),
            field_ids: self.field_ids.clone(),
            mutation: self.mutation.clone(),
        }
    }
    fn of(block: &Block) -> Self {
        let mut args = Self { mutation: block.mutation.clone(), ..Default::default() };
        for (name, field) in block.fields.iter() {
            args.values.insert(name.clone(), field.value.clone());
            if let Some(id) = &field.id {
                args.field_ids.insert(name.clone(), id.clone());
            }
        }
        for (name, input) in block.inputs.iter() {
            if let Input::Literal(v) = input {
                args.values.insert(name.clone(), v.clone());
            }
        }
        args
    }
}

#[derive(Debug)]
enum Slot {
    Direct { info: Rc<BlockInfo>, args: Rc<ConstArgs> },
    Compat,
}

#[derive(Debug)]
pub(crate) struct CompiledScript {
    slots: VecMap<BlockId, Slot>,
}

pub(crate) struct CompiledEntry {
    pub info: Rc<BlockInfo>,
    pub args: Rc<ConstArgs>,
}

/// Per-runtime cache of compiled scripts, keyed by block graph identity and
/// top block. Clones share their original's graph and therefore its cache
/// entries.
#[derive(Debug, Default)]
pub(crate) struct CompileCache {
    scripts: VecMap<(usize, BlockId), Rc<CompiledScript>>,
}

/// Resolves the direct-call slot for one block of a compiled thread,
/// compiling the script on first use. `Ok(None)` sends the block through
/// the interpreter.
pub(crate) fn lookup(
    runtime: &mut Runtime,
    thread: &Thread,
    block_id: &BlockId,
) -> Result<Option<CompiledEntry>, CompileError> {
    let key = (Rc::as_ptr(&thread.blocks) as usize, thread.top_block.clone());
    let script = match runtime.compile_cache.scripts.get(&key) {
        Some(script) => script.clone(),
        None => {
            let script = Rc::new(compile_script(runtime, &thread.blocks, &thread.top_block)?);
            runtime.compile_cache.scripts.insert(key, script.clone());
            script
        }
    };
    match script.slots.get(block_id.as_str()) {
        Some(Slot::Direct { info, args }) => Ok(Some(CompiledEntry {
            info: info.clone(),
            args: args.clone(),
        })),
        Some(Slot::Compat) | None => Ok(None),
    }
}

fn compile_script(runtime: &Runtime, blocks: &Blocks, top_block: &BlockId) -> Result<CompiledScript, CompileError> {
    let mut slots = VecMap::new();
    let mut worklist = vec![top_block.clone()];
    while let Some(id) = worklist.pop() {
        if slots.contains_key(id.as_str()) {
            continue;
        }
        let Some(block) = blocks.get(&id) else {
            continue;
        };
        if block.menu_field().is_some() {
            continue;
        }
        if let Some(next) = &block.next {
            worklist.push(next.clone());
        }
        for (name, input) in block.inputs.iter() {
            // prototype blocks have no handler and never execute
            if name == "custom_block" {
                continue;
            }
            if let Some(child) = input.block() {
                worklist.push(child.clone());
            }
        }
        if block.opcode == "procedures_call" {
            if let Some(mutation) = &block.mutation {
                if runtime.addon_block(&mutation.proccode).is_none() {
                    if let Some(def) = blocks.procedure_definition(&mutation.proccode) {
                        worklist.push(def.clone());
                    }
                }
            }
        }
        let opcode = block.opcode.as_str();
        let slot = if COMPAT_STACKED.contains(&opcode)
            || COMPAT_INPUTS.contains(&opcode)
            || runtime.extensions.is_extension_opcode(opcode)
        {
            Slot::Compat
        } else if let Some(info) = runtime.primitives.get(opcode) {
            Slot::Direct { info: info.clone(), args: Rc::new(ConstArgs::of(block)) }
        } else {
            return Err(CompileError::UnknownOpcode { opcode: block.opcode.clone() });
        };
        slots.insert(id, slot);
    }
    Ok(CompiledScript { slots })
}
