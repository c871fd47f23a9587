//! Looks blocks: say and think bubbles, surfaced to the embedder as events.

use compact_str::CompactString;

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::{ErrorCause, RuntimeEvent};
use crate::util::Timer;

use super::command;

pub(crate) fn register(table: &mut PrimitiveTable) {
    command(table, "looks_say", |args, util| say(args, util, false));
    command(table, "looks_think", |args, util| say(args, util, true));
    command(table, "looks_sayforsecs", |args, util| say_for_secs(args, util, false));
    command(table, "looks_thinkforsecs", |args, util| say_for_secs(args, util, true));
}

fn post_bubble(util: &mut BlockUtility, think: bool, message: CompactString) {
    let target = util.target().borrow().name.clone();
    util.runtime.post_event(RuntimeEvent::Say { target, think, message });
    util.request_redraw();
}

fn say(args: &Arguments, util: &mut BlockUtility, think: bool) -> Result<BlockResult, ErrorCause> {
    post_bubble(util, think, args.text("MESSAGE"));
    Ok(BlockResult::Nothing)
}

struct BubbleWait {
    timer: Timer,
    duration_ms: f64,
}

fn say_for_secs(args: &Arguments, util: &mut BlockUtility, think: bool) -> Result<BlockResult, ErrorCause> {
    let in_flight = util
        .stack_frame()
        .state
        .as_ref()
        .and_then(|s| s.downcast_ref::<BubbleWait>())
        .map(|s| (s.timer, s.duration_ms));
    match in_flight {
        None => {
            post_bubble(util, think, args.text("MESSAGE"));
            let duration_ms = (args.number("SECS") * 1000.0).max(0.0);
            util.stack_frame().state = Some(Box::new(BubbleWait { timer: Timer::start(), duration_ms }));
            util.yield_();
        }
        Some((timer, duration_ms)) => {
            if timer.elapsed_ms() < duration_ms {
                util.yield_();
            } else {
                // time is up: clear the bubble
                post_bubble(util, think, "".into());
            }
        }
    }
    Ok(BlockResult::Nothing)
}
