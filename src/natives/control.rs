//! Control blocks: timing, branching, loops, and script lifetime.

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;
use crate::sequencer;
use crate::util::Timer;

use super::{command, event_hat};

pub(crate) fn register(table: &mut PrimitiveTable) {
    command(table, "control_wait", wait);
    command(table, "control_repeat", repeat);
    command(table, "control_forever", forever);
    command(table, "control_if", if_then);
    command(table, "control_if_else", if_else);
    command(table, "control_wait_until", wait_until);
    command(table, "control_repeat_until", repeat_until);
    command(table, "control_while", while_true);
    command(table, "control_stop", stop);
    command(table, "control_create_clone_of", create_clone_of);
    command(table, "control_delete_this_clone", delete_this_clone);
    event_hat(table, "control_start_as_clone", false);
}

struct WaitState {
    timer: Timer,
    duration_ms: f64,
}

fn wait(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let in_flight = util
        .stack_frame()
        .state
        .as_ref()
        .and_then(|s| s.downcast_ref::<WaitState>())
        .map(|s| (s.timer, s.duration_ms));
    match in_flight {
        None => {
            let duration_ms = (args.number("DURATION") * 1000.0).max(0.0);
            util.stack_frame().state = Some(Box::new(WaitState { timer: Timer::start(), duration_ms }));
            util.request_redraw();
            util.yield_();
        }
        Some((timer, duration_ms)) => {
            if timer.elapsed_ms() < duration_ms {
                util.yield_();
            }
        }
    }
    Ok(BlockResult::Nothing)
}

fn repeat(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let times = args.number("TIMES").round();
    let run = {
        let counter = util.stack_frame().state_or_init(|| times);
        *counter -= 1.0;
        *counter >= 0.0
    };
    if run {
        util.start_branch(1, true);
    }
    Ok(BlockResult::Nothing)
}

fn forever(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    util.start_branch(1, true);
    Ok(BlockResult::Nothing)
}

fn if_then(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if args.bool("CONDITION") {
        util.start_branch(1, false);
    }
    Ok(BlockResult::Nothing)
}

fn if_else(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if args.bool("CONDITION") {
        util.start_branch(1, false);
    } else {
        util.start_branch(2, false);
    }
    Ok(BlockResult::Nothing)
}

fn wait_until(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if !args.bool("CONDITION") {
        util.yield_();
    }
    Ok(BlockResult::Nothing)
}

fn repeat_until(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if !args.bool("CONDITION") {
        util.start_branch(1, true);
    }
    Ok(BlockResult::Nothing)
}

fn while_true(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if args.bool("CONDITION") {
        util.start_branch(1, true);
    }
    Ok(BlockResult::Nothing)
}

fn stop(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    match args.text("STOP_OPTION").as_str() {
        "all" => {
            util.runtime.stop_all();
            util.thread.retire();
        }
        "other scripts in sprite" | "other scripts in stage" => {
            let target = util.target();
            util.runtime.stop_target_threads(&target);
        }
        _ => stop_this_script(util),
    }
    Ok(BlockResult::Nothing)
}

/// Unwinds the current script. Inside a procedure this returns to the
/// caller, advancing past the call block; at the top level it retires the
/// thread.
fn stop_this_script(util: &mut BlockUtility) {
    loop {
        let Some(top) = util.thread.peek_stack().cloned() else {
            util.thread.retire();
            return;
        };
        if top != util.current_block && util.thread.blocks.opcode(&top) == Some("procedures_call") {
            sequencer::proceed(util.thread);
            return;
        }
        util.thread.pop_stack();
    }
}

fn create_clone_of(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let option = args.text("CLONE_OPTION");
    let source = if option == "_myself_" {
        Some(util.target())
    } else {
        util.runtime.sprite_by_name(&option)
    };
    if let Some(source) = source {
        if !source.borrow().is_stage {
            util.runtime.spawn_clone(&source);
        }
    }
    Ok(BlockResult::Nothing)
}

fn delete_this_clone(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let target = util.target();
    if !target.borrow().is_original {
        util.runtime.remove_clone(&target);
        util.thread.retire();
    }
    Ok(BlockResult::Nothing)
}
