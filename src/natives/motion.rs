//! Motion blocks: sprite position and heading.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;
use crate::system::Bounds;
use crate::target::{RotationStyle, Target};
use crate::util::Timer;
use crate::value::Value;

use super::{command, reporter};

pub(crate) fn register(table: &mut PrimitiveTable) {
    command(table, "motion_movesteps", move_steps);
    command(table, "motion_movebacksteps", move_back_steps);
    command(table, "motion_moveupdownsteps", move_up_down_steps);
    command(table, "motion_gotoxy", go_to_xy);
    command(table, "motion_goto", go_to);
    command(table, "motion_turnright", turn_right);
    command(table, "motion_turnleft", turn_left);
    command(table, "motion_turnaround", turn_around);
    command(table, "motion_turnrightaroundxy", turn_right_around_xy);
    command(table, "motion_turnleftaroundxy", turn_left_around_xy);
    command(table, "motion_pointindirection", point_in_direction);
    command(table, "motion_pointinrandomdirection", point_in_random_direction);
    command(table, "motion_pointtowards", point_towards);
    command(table, "motion_pointtowardsxy", point_towards_xy);
    command(table, "motion_glidesecstoxy", glide_secs_to_xy);
    command(table, "motion_glideto", glide_to);
    command(table, "motion_ifonedgebounce", if_on_edge_bounce);
    command(table, "motion_setrotationstyle", set_rotation_style);
    command(table, "motion_changexby", change_x);
    command(table, "motion_setx", set_x);
    command(table, "motion_changeyby", change_y);
    command(table, "motion_sety", set_y);
    command(table, "motion_changebyxy", change_xy);
    command(table, "motion_move_sprite_to_scene_side", move_to_stage_side);
    reporter(table, "motion_xposition", x_position);
    reporter(table, "motion_yposition", y_position);
    reporter(table, "motion_direction", direction);
    // legacy scrolling blocks load but do nothing
    command(table, "motion_scroll_right", |_, _| Ok(BlockResult::Nothing));
    command(table, "motion_scroll_up", |_, _| Ok(BlockResult::Nothing));
    command(table, "motion_align_scene", |_, _| Ok(BlockResult::Nothing));
    reporter(table, "motion_xscroll", |_, _| Ok(0.0.into()));
    reporter(table, "motion_yscroll", |_, _| Ok(0.0.into()));
}

/// Coordinates close enough to an integer report as that integer, matching
/// how stage positions have always been displayed.
fn limit_precision(coordinate: f64) -> f64 {
    let rounded = coordinate.round();
    if (coordinate - rounded).abs() < 1e-9 { rounded } else { coordinate }
}

/// The current value of a motion reporter backing a stage monitor.
pub(crate) fn monitor_value(opcode: &str, target: &Target) -> Option<Value> {
    Some(match opcode {
        "motion_xposition" => limit_precision(target.x).into(),
        "motion_yposition" => limit_precision(target.y).into(),
        "motion_direction" => target.direction.into(),
        _ => return None,
    })
}

fn apply_steps(util: &mut BlockUtility, steps: f64) {
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let radians = (90.0 - target.direction).to_radians();
        let (x, y) = (target.x + steps * radians.cos(), target.y + steps * radians.sin());
        target.set_xy(x, y);
    }
    util.target_updated();
}

fn move_steps(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    apply_steps(util, args.number("STEPS"));
    Ok(BlockResult::Nothing)
}

fn move_back_steps(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    apply_steps(util, -args.number("STEPS"));
    Ok(BlockResult::Nothing)
}

fn move_up_down_steps(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let steps = match args.text("DIRECTION").as_str() {
        "up" => args.number("STEPS"),
        "down" => -args.number("STEPS"),
        _ => return Ok(BlockResult::Nothing),
    };
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        // as if turned 90 degrees left, stepped, and turned back
        let radians = (180.0 - target.direction).to_radians();
        let (x, y) = (target.x + steps * radians.cos(), target.y + steps * radians.sin());
        target.set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

/// Resolves the `go to` style destination menus: the mouse pointer, a random
/// stage position, or another sprite by name.
fn target_xy(name: &str, util: &BlockUtility) -> Option<(f64, f64)> {
    match name {
        "_mouse_" => Some((util.io().mouse.x, util.io().mouse.y)),
        "_random_" => {
            let mut rng = rand::thread_rng();
            Some((
                (util.runtime.stage_width * (rng.gen::<f64>() - 0.5)).round(),
                (util.runtime.stage_height * (rng.gen::<f64>() - 0.5)).round(),
            ))
        }
        _ => {
            let sprite = util.runtime.sprite_by_name(name)?;
            let sprite = sprite.borrow();
            Some((sprite.x, sprite.y))
        }
    }
}

fn go_to_xy(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (x, y) = (args.number("X"), args.number("Y"));
    util.target().borrow_mut().set_xy(x, y);
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn go_to(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if let Some((x, y)) = target_xy(&args.text("TO"), util) {
        util.target().borrow_mut().set_xy(x, y);
        util.target_updated();
    }
    Ok(BlockResult::Nothing)
}

fn apply_turn(util: &mut BlockUtility, degrees: f64) {
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let direction = target.direction + degrees;
        target.set_direction(direction);
    }
    util.target_updated();
}

fn turn_right(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    apply_turn(util, args.number("DEGREES"));
    Ok(BlockResult::Nothing)
}

fn turn_left(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    apply_turn(util, -args.number("DEGREES"));
    Ok(BlockResult::Nothing)
}

fn turn_around(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    apply_turn(util, 180.0);
    Ok(BlockResult::Nothing)
}

fn rotate_around(util: &mut BlockUtility, degrees: f64, center_x: f64, center_y: f64) {
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let radians = degrees.to_radians();
        let (cos, sin) = (radians.cos(), radians.sin());
        let dx = target.x - center_x;
        let dy = target.y - center_y;
        target.set_xy(cos * dx - sin * dy + center_x, cos * dy + sin * dx + center_y);
    }
    util.target_updated();
}

fn turn_right_around_xy(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    rotate_around(util, -args.number("DEGREES"), args.number("X"), args.number("Y"));
    Ok(BlockResult::Nothing)
}

fn turn_left_around_xy(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    rotate_around(util, args.number("DEGREES"), args.number("X"), args.number("Y"));
    Ok(BlockResult::Nothing)
}

fn point_in_direction(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    util.target().borrow_mut().set_direction(args.number("DIRECTION"));
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn point_in_random_direction(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let direction = (rand::thread_rng().gen::<f64>() * 360.0).round() - 180.0;
    util.target().borrow_mut().set_direction(direction);
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn apply_point_towards(util: &mut BlockUtility, target_x: f64, target_y: f64) {
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let dx = target_x - target.x;
        let dy = target_y - target.y;
        target.set_direction(90.0 - dy.atan2(dx).to_degrees());
    }
    util.target_updated();
}

fn point_towards(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let towards = args.text("TOWARDS");
    if towards == "_random_" {
        return point_in_random_direction(args, util);
    }
    if let Some((x, y)) = target_xy(&towards, util) {
        apply_point_towards(util, x, y);
    }
    Ok(BlockResult::Nothing)
}

fn point_towards_xy(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    apply_point_towards(util, args.number("X"), args.number("Y"));
    Ok(BlockResult::Nothing)
}

#[derive(Clone, Copy)]
struct GlideState {
    timer: Timer,
    duration_ms: f64,
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
}

fn glide_step(util: &mut BlockUtility, secs: f64, end_x: f64, end_y: f64) {
    let in_flight = util
        .stack_frame()
        .state
        .as_ref()
        .and_then(|s| s.downcast_ref::<GlideState>())
        .copied();
    let target = util.target();
    match in_flight {
        None => {
            if secs <= 0.0 {
                // too short to animate: jump without yielding
                target.borrow_mut().set_xy(end_x, end_y);
                util.target_updated();
                return;
            }
            let (start_x, start_y) = {
                let target = target.borrow();
                (target.x, target.y)
            };
            util.stack_frame().state = Some(Box::new(GlideState {
                timer: Timer::start(),
                duration_ms: secs * 1000.0,
                start_x,
                start_y,
                end_x,
                end_y,
            }));
            util.yield_();
        }
        Some(state) => {
            let elapsed = state.timer.elapsed_ms();
            if elapsed < state.duration_ms {
                let frac = elapsed / state.duration_ms;
                target.borrow_mut().set_xy(
                    state.start_x + frac * (state.end_x - state.start_x),
                    state.start_y + frac * (state.end_y - state.start_y),
                );
                util.target_updated();
                util.yield_();
            } else {
                target.borrow_mut().set_xy(state.end_x, state.end_y);
                util.target_updated();
            }
        }
    }
}

fn glide_secs_to_xy(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    glide_step(util, args.number("SECS"), args.number("X"), args.number("Y"));
    Ok(BlockResult::Nothing)
}

fn glide_to(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    // the destination is only read on the first entry; a glide in flight
    // keeps the endpoint recorded in its frame
    if let Some((x, y)) = target_xy(&args.text("TO"), util) {
        glide_step(util, args.number("SECS"), x, y);
    }
    Ok(BlockResult::Nothing)
}

/// Nudges `(new_x, new_y)` back inside the stage so the sprite's rendered
/// bounds stay visible. `None` without a renderer.
fn keep_in_fence(util: &BlockUtility, target: &Rc<RefCell<Target>>, new_x: f64, new_y: f64) -> Option<(f64, f64)> {
    let target = target.borrow();
    let bounds = util.runtime.renderer.sprite_bounds(&target)?;
    let fence = Bounds {
        left: -util.runtime.stage_width / 2.0,
        right: util.runtime.stage_width / 2.0,
        top: util.runtime.stage_height / 2.0,
        bottom: -util.runtime.stage_height / 2.0,
    };
    let left = bounds.left + (new_x - target.x);
    let right = bounds.right + (new_x - target.x);
    let top = bounds.top + (new_y - target.y);
    let bottom = bounds.bottom + (new_y - target.y);
    let mut dx = 0.0;
    let mut dy = 0.0;
    if left < fence.left {
        dx += fence.left - left;
    }
    if right > fence.right {
        dx += fence.right - right;
    }
    if top > fence.top {
        dy += fence.top - top;
    }
    if bottom < fence.bottom {
        dy += fence.bottom - bottom;
    }
    Some((new_x + dx, new_y + dy))
}

fn if_on_edge_bounce(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let target = util.target();
    let Some(bounds) = util.runtime.renderer.sprite_bounds(&target.borrow()) else {
        return Ok(BlockResult::Nothing);
    };
    let half_width = util.runtime.stage_width / 2.0;
    let half_height = util.runtime.stage_height / 2.0;
    // distance to each edge, clamped to zero once the sprite is beyond it
    let distances = [
        (half_width + bounds.left).max(0.0),
        (half_height - bounds.top).max(0.0),
        (half_width - bounds.right).max(0.0),
        (half_height + bounds.bottom).max(0.0),
    ];
    let mut nearest = 0;
    for (i, dist) in distances.iter().enumerate() {
        if *dist < distances[nearest] {
            nearest = i;
        }
    }
    if distances[nearest] > 0.0 {
        return Ok(BlockResult::Nothing);
    }
    {
        let mut target = target.borrow_mut();
        // point away from the nearest edge
        let radians = (90.0 - target.direction).to_radians();
        let mut dx = radians.cos();
        let mut dy = -radians.sin();
        match nearest {
            0 => dx = dx.abs().max(0.2),
            1 => dy = dy.abs().max(0.2),
            2 => dx = -dx.abs().max(0.2),
            _ => dy = -dy.abs().max(0.2),
        }
        let new_direction = dy.atan2(dx).to_degrees() + 90.0;
        target.set_direction(new_direction);
    }
    let (x, y) = {
        let target = target.borrow();
        (target.x, target.y)
    };
    if let Some((x, y)) = keep_in_fence(util, &target, x, y) {
        target.borrow_mut().set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn move_to_stage_side(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let target = util.target();
    if util.runtime.renderer.sprite_bounds(&target.borrow()).is_none() {
        return Ok(BlockResult::Nothing);
    }
    let half_width = util.runtime.stage_width / 2.0;
    let half_height = util.runtime.stage_height / 2.0;
    let (x, y, snap_x, snap_y) = match args.text("ALIGNMENT").as_str() {
        "top" => (0.0, half_height, 0.0, -1.0),
        "left" => (-half_width, 0.0, 1.0, 0.0),
        "middle" => (0.0, 0.0, 0.0, 0.0),
        "right" => (half_width, 0.0, -1.0, 0.0),
        "bottom" => (0.0, -half_height, 0.0, 1.0),
        "top-left" => (-half_width, half_height, 1.0, -1.0),
        "top-right" => (half_width, half_height, -1.0, -1.0),
        "bottom-left" => (-half_width, -half_height, 1.0, 1.0),
        "bottom-right" => (half_width, -half_height, -1.0, 1.0),
        _ => return Ok(BlockResult::Nothing),
    };
    target.borrow_mut().set_xy(x, y);
    // snap the sprite's bounding box flush with the chosen edges
    if let Some(bounds) = util.runtime.renderer.sprite_bounds(&target.borrow()) {
        let mut target = target.borrow_mut();
        let (mut x, mut y) = (target.x, target.y);
        if snap_x > 0.0 {
            x = bounds.right;
        } else if snap_x < 0.0 {
            x = bounds.left;
        }
        if snap_y > 0.0 {
            y = bounds.top;
        } else if snap_y < 0.0 {
            y = bounds.bottom;
        }
        target.set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn set_rotation_style(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    if let Some(style) = RotationStyle::from_name(&args.text("STYLE")) {
        util.target().borrow_mut().rotation_style = style;
        util.target_updated();
    }
    Ok(BlockResult::Nothing)
}

fn change_x(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let dx = args.number("DX");
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let (x, y) = (target.x + dx, target.y);
        target.set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn set_x(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let x = args.number("X");
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let y = target.y;
        target.set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn change_y(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let dy = args.number("DY");
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let (x, y) = (target.x, target.y + dy);
        target.set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn set_y(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let y = args.number("Y");
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let x = target.x;
        target.set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn change_xy(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (dx, dy) = (args.number("DX"), args.number("DY"));
    let target = util.target();
    {
        let mut target = target.borrow_mut();
        let (x, y) = (target.x + dx, target.y + dy);
        target.set_xy(x, y);
    }
    util.target_updated();
    Ok(BlockResult::Nothing)
}

fn x_position(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    Ok(limit_precision(util.target().borrow().x).into())
}

fn y_position(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    Ok(limit_precision(util.target().borrow().y).into())
}

fn direction(_args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    Ok(util.target().borrow().direction.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_precision() {
        assert_eq!(limit_precision(10.0 + 1e-12), 10.0);
        assert_eq!(limit_precision(10.0 - 1e-12), 10.0);
        assert_eq!(limit_precision(10.5), 10.5);
        assert_eq!(limit_precision(-3.0000000001), -3.0);
        assert_eq!(limit_precision(-3.000001), -3.000001);
    }
}
