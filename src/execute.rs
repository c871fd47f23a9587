//! Block execution: argument evaluation, handler dispatch, and the
//! return-value protocol.
//!
//! One call to [`execute_block`] runs exactly one block of a thread. Inputs
//! are evaluated depth-first and synchronously; when a reporter suspends on a
//! promise, every value computed so far is already parked in the frame's
//! `reported` cache, so re-executing the block after resolution picks up
//! where evaluation left off. The handler's return value is then interpreted
//! according to the block's type: a report, a hat predicate, a branch number,
//! or a loop-continue flag.

use crate::blocks::{Block, BlockId, Input};
use crate::compiler::{self, ConstArgs};
use crate::primitives::{Arguments, BlockInfo, BlockResult, BlockType, BlockUtility};
use crate::runtime::{ErrorCause, Runtime, RuntimeEvent};
use crate::thread::{PendingKind, PendingWait, Thread, ThreadStatus};
use crate::value::Value;

/// Executes the block at `block_id` on `thread`, updating the thread's stack
/// and status. The caller (the sequencer, or hat dispatch) decides what the
/// resulting status means for scheduling.
pub(crate) fn execute_block(runtime: &mut Runtime, thread: &mut Thread, block_id: &BlockId) {
    let blocks = thread.blocks.clone();
    let Some(block) = blocks.get(block_id) else {
        log::warn!("thread reached missing block {block_id}");
        thread.retire();
        return;
    };

    // the direct-call path resolves the handler and literal arguments ahead
    // of time; compat-listed and extension blocks drop through per-block
    let mut const_args = None;
    let mut resolved = None;
    if thread.compiled {
        match compiler::lookup(runtime, thread, block_id) {
            Ok(Some(entry)) => {
                resolved = Some(entry.info);
                const_args = Some(entry.args);
            }
            Ok(None) => {}
            Err(err) => {
                let target = thread.target.borrow().name.clone();
                log::warn!("script failed to compile on {target}: {err}");
                runtime.post_event(RuntimeEvent::CompileError { target, message: err.to_string() });
                thread.compiled = false;
            }
        }
    }
    let info = match resolved.or_else(|| runtime.primitives.get(&block.opcode).cloned()) {
        Some(info) => info,
        None => {
            log::warn!("no implementation for opcode {}", block.opcode);
            return;
        }
    };

    // event hats have no behavior of their own; scripts under them are
    // started by the runtime firing the event
    if info.block_type == BlockType::Event {
        return;
    }

    // a hat whose inputs contain reporter blocks splits across a tick: the
    // first visit evaluates and caches the inputs, and the hat itself (plus
    // the script under it) runs when the thread resumes on the next tick
    let inputs_only_this_tick = info.block_type == BlockType::Hat
        && thread.stack_depth() == 1
        && !has_only_immediate_inputs(block, &blocks)
        && thread.top_frame().map(|f| f.reported.is_empty()).unwrap_or(false);

    let args = match evaluate_arguments(runtime, thread, block, const_args.as_deref()) {
        Ok(Some(args)) => args,
        Ok(None) => return, // suspended on an input
        Err(cause) => return fail_thread(runtime, thread, block_id, cause),
    };
    if inputs_only_this_tick {
        thread.status = ThreadStatus::YieldTick;
        return;
    }
    if let Some(frame) = thread.top_frame_mut() {
        frame.reported.clear();
    }

    let result = {
        let mut util = BlockUtility { runtime, thread, current_block: block_id.clone() };
        (info.func)(&args, &mut util)
    };
    match result {
        Ok(result) => apply_result(runtime, thread, block_id, &info, result),
        Err(cause) => fail_thread(runtime, thread, block_id, cause),
    }
}

/// Interprets a handler's return value per the block's type.
fn apply_result(runtime: &mut Runtime, thread: &mut Thread, block_id: &BlockId, info: &BlockInfo, result: BlockResult) {
    if let BlockResult::Promise(promise) = result {
        let kind = match info.block_type {
            BlockType::Hat => PendingKind::HatPredicate,
            _ => PendingKind::Block,
        };
        thread.status = ThreadStatus::PromiseWait;
        thread.pending = Some(PendingWait { promise: Some(promise), kind });
        return;
    }
    match info.block_type {
        BlockType::Event => {}
        BlockType::Command | BlockType::Reporter | BlockType::Boolean => {
            if let BlockResult::Value(value) = result {
                if thread.stack_click && thread.stack_depth() == 1 {
                    runtime.post_event(RuntimeEvent::VisualReport { block_id: block_id.clone(), value });
                }
            }
        }
        BlockType::Hat => {
            let reported = match &result {
                BlockResult::Value(v) => v.as_bool(),
                _ => false,
            };
            let fire = if info.edge_activated {
                let old = runtime.edge_update(&thread.target, block_id, reported);
                reported && !old
            } else {
                reported
            };
            if !fire && !thread.stack_click {
                thread.retire();
            }
        }
        BlockType::Conditional => {
            if let BlockResult::Value(v) = result {
                let branch = v.as_number();
                if branch >= 1.0 {
                    enter_branch(thread, block_id, branch as usize, false);
                }
            }
        }
        BlockType::Loop => {
            if let BlockResult::Value(v) = result {
                if v.as_bool() {
                    enter_branch(thread, block_id, 1, true);
                }
            }
        }
    }
    // a handler may park the thread by writing the waiting status directly;
    // record a wait that only an external status change can end
    if thread.status == ThreadStatus::PromiseWait && thread.pending.is_none() {
        thread.pending = Some(PendingWait { promise: None, kind: PendingKind::Block });
    }
}

/// Enters a branch of a C-shaped block. A missing loop branch yields instead
/// of pushing, so empty loops still spin one iteration per pass.
pub(crate) fn enter_branch(thread: &mut Thread, block_id: &BlockId, branch_num: usize, is_loop: bool) {
    let branch = thread.blocks.branch(block_id, branch_num).cloned();
    if let Some(frame) = thread.top_frame_mut() {
        frame.is_loop = is_loop;
    }
    match branch {
        Some(branch) => thread.push_stack(branch),
        None => {
            if is_loop && thread.status == ThreadStatus::Running {
                thread.status = ThreadStatus::Yield;
            }
        }
    }
}

fn fail_thread(runtime: &mut Runtime, thread: &mut Thread, block_id: &BlockId, cause: ErrorCause) {
    log::warn!("block {block_id} failed: {cause}");
    runtime.post_event(RuntimeEvent::ScriptError { block_id: block_id.clone(), message: cause.to_string() });
    thread.retire();
}

/// Builds the argument set for a block, evaluating reporter inputs.
/// `Ok(None)` means evaluation suspended on a promise; the thread is already
/// parked and the block must be re-executed after resolution.
fn evaluate_arguments(
    runtime: &mut Runtime,
    thread: &mut Thread,
    block: &Block,
    base: Option<&ConstArgs>,
) -> Result<Option<Arguments>, ErrorCause> {
    let mut args = match base {
        Some(base) => base.to_arguments(),
        None => {
            let mut args = Arguments { mutation: block.mutation.clone(), ..Default::default() };
            for (name, field) in block.fields.iter() {
                args.values.insert(name.clone(), field.value.clone());
                if let Some(id) = &field.id {
                    args.field_ids.insert(name.clone(), id.clone());
                }
            }
            args
        }
    };
    for (name, input) in block.inputs.iter() {
        if name.starts_with("SUBSTACK") || name == "custom_block" {
            continue;
        }
        match input {
            Input::Literal(v) => {
                if base.is_none() {
                    args.values.insert(name.clone(), v.clone());
                }
            }
            Input::Empty => {}
            Input::Block(id) | Input::BlockWithShadow(id, _) | Input::Shadow(id) => {
                match evaluate_reporter(runtime, thread, id)? {
                    Some(v) => {
                        args.values.insert(name.clone(), v);
                    }
                    None => return Ok(None),
                }
            }
        }
    }
    Ok(Some(args))
}

/// Evaluates one reporter block inline. Completed results are cached in the
/// current frame keyed by block id, which is both the memo for repeated
/// inputs and the resume point after a suspension.
fn evaluate_reporter(
    runtime: &mut Runtime,
    thread: &mut Thread,
    block_id: &BlockId,
) -> Result<Option<Value>, ErrorCause> {
    if let Some(v) = thread.top_frame().and_then(|f| f.reported.get(block_id.as_str())) {
        return Ok(Some(v.clone()));
    }
    let blocks = thread.blocks.clone();
    let Some(block) = blocks.get(block_id) else {
        let v = Value::from("");
        cache_report(thread, block_id, v.clone());
        return Ok(Some(v));
    };
    // dropdown menu shadows evaluate to their single field
    if let Some(field) = block.menu_field() {
        let v = field.value.clone();
        cache_report(thread, block_id, v.clone());
        return Ok(Some(v));
    }
    let Some(info) = runtime.primitives.get(&block.opcode).cloned() else {
        log::warn!("no implementation for opcode {}", block.opcode);
        let v = Value::from("");
        cache_report(thread, block_id, v.clone());
        return Ok(Some(v));
    };
    let args = match evaluate_arguments(runtime, thread, block, None)? {
        Some(args) => args,
        None => return Ok(None),
    };
    let result = {
        let mut util = BlockUtility { runtime, thread, current_block: block_id.clone() };
        (info.func)(&args, &mut util)?
    };
    match result {
        BlockResult::Value(v) => {
            cache_report(thread, block_id, v.clone());
            Ok(Some(v))
        }
        BlockResult::Nothing => {
            let v = Value::from("");
            cache_report(thread, block_id, v.clone());
            Ok(Some(v))
        }
        BlockResult::Promise(promise) => {
            thread.status = ThreadStatus::PromiseWait;
            thread.pending = Some(PendingWait {
                promise: Some(promise),
                kind: PendingKind::Input(block_id.clone()),
            });
            Ok(None)
        }
    }
}

fn cache_report(thread: &mut Thread, block_id: &BlockId, value: Value) {
    if let Some(frame) = thread.top_frame_mut() {
        frame.reported.insert(block_id.clone(), value);
    }
}

// used by hat dispatch to decide whether a predicate can run synchronously
pub(crate) fn has_only_immediate_inputs(block: &Block, blocks: &crate::blocks::Blocks) -> bool {
    block.inputs.iter().all(|(name, input)| {
        if name.starts_with("SUBSTACK") {
            return true;
        }
        match input {
            Input::Literal(_) | Input::Empty => true,
            Input::Shadow(id) => blocks.get(id).map(|b| b.menu_field().is_some()).unwrap_or(false),
            Input::Block(_) | Input::BlockWithShadow(_, _) => false,
        }
    })
}
