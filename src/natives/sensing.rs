//! Sensing blocks backed by the io devices.

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;

use super::{boolean, command, reporter};

pub(crate) fn register(table: &mut PrimitiveTable) {
    reporter(table, "sensing_timer", |_, util| Ok((util.io().timer.elapsed_ms() / 1000.0).into()));
    command(table, "sensing_resettimer", reset_timer);
    reporter(table, "sensing_mousex", |_, util| Ok(util.io().mouse.x.into()));
    reporter(table, "sensing_mousey", |_, util| Ok(util.io().mouse.y.into()));
    boolean(table, "sensing_mousedown", |_, util| Ok(util.io().mouse.down.into()));
    boolean(table, "sensing_keypressed", key_pressed);
    reporter(table, "sensing_loudness", |_, util| Ok(util.io().loudness.into()));
    boolean(table, "sensing_loud", |_, util| Ok((util.io().loudness > 10.0).into()));
}

fn reset_timer(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    util.runtime.io.timer.reset();
    Ok(BlockResult::Nothing)
}

fn key_pressed(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    Ok(util.io().keyboard.is_down(&args.text("KEY_OPTION")).into())
}
