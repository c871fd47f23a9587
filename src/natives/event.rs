//! Event blocks: the standard hats and broadcasting.

use std::cell::RefCell;
use std::rc::Rc;

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;
use crate::thread::{Thread, ThreadStatus};
use crate::value::Value;

use super::{command, edge_hat, event_hat};

pub(crate) fn register(table: &mut PrimitiveTable) {
    event_hat(table, "event_whenflagclicked", true);
    event_hat(table, "event_whenbroadcastreceived", true);
    event_hat(table, "event_whenkeypressed", false);
    edge_hat(table, "event_whengreaterthan", when_greater_than);
    command(table, "event_broadcast", broadcast);
    command(table, "event_broadcastandwait", broadcast_and_wait);
}

fn when_greater_than(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let value = args.number("VALUE");
    let current = match args.text("WHENGREATERTHANMENU").to_lowercase().as_str() {
        "timer" => util.io().timer.elapsed_ms() / 1000.0,
        _ => util.io().loudness,
    };
    Ok((current > value).into())
}

fn broadcast(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let name = Value::from(args.text("BROADCAST_INPUT"));
    util.runtime
        .start_hats("event_whenbroadcastreceived", &[("BROADCAST_OPTION", &name)], None);
    Ok(BlockResult::Nothing)
}

struct BroadcastWait {
    threads: Vec<Rc<RefCell<Thread>>>,
}

fn broadcast_and_wait(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if util
        .stack_frame()
        .state
        .as_ref()
        .and_then(|s| s.downcast_ref::<BroadcastWait>())
        .is_none()
    {
        let name = Value::from(args.text("BROADCAST_INPUT"));
        let threads =
            util.runtime
                .start_hats("event_whenbroadcastreceived", &[("BROADCAST_OPTION", &name)], None);
        util.stack_frame().state = Some(Box::new(BroadcastWait { threads }));
    }
    let (any_live, all_parked) = {
        let frame = util.stack_frame();
        let state = frame.state.as_ref().and_then(|s| s.downcast_ref::<BroadcastWait>());
        let mut any_live = false;
        let mut all_parked = true;
        if let Some(state) = state {
            for t in &state.threads {
                match t.try_borrow() {
                    Ok(thread) if thread.is_done() => {}
                    Ok(thread) => {
                        any_live = true;
                        if !matches!(thread.status, ThreadStatus::YieldTick | ThreadStatus::PromiseWait) {
                            all_parked = false;
                        }
                    }
                    // borrowed means it is being stepped right now
                    Err(_) => {
                        any_live = true;
                        all_parked = false;
                    }
                }
            }
        }
        (any_live, all_parked)
    };
    if any_live {
        // when every receiver is itself parked across the tick there is no
        // point re-polling this pass
        if all_parked {
            util.yield_tick();
        } else {
            util.yield_();
        }
    }
    Ok(BlockResult::Nothing)
}
