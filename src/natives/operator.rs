//! Operator blocks: arithmetic, comparison, logic, and text.

use std::cmp::Ordering;

use compact_str::{format_compact, CompactString};
use rand::Rng;
use unicode_segmentation::UnicodeSegmentation;

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;
use crate::util;
use crate::value::Value;

use super::{boolean, reporter};

pub(crate) fn register(table: &mut PrimitiveTable) {
    reporter(table, "operator_add", |args, _| Ok((args.number("NUM1") + args.number("NUM2")).into()));
    reporter(table, "operator_subtract", |args, _| Ok((args.number("NUM1") - args.number("NUM2")).into()));
    reporter(table, "operator_multiply", |args, _| Ok((args.number("NUM1") * args.number("NUM2")).into()));
    reporter(table, "operator_divide", |args, _| Ok((args.number("NUM1") / args.number("NUM2")).into()));
    boolean(table, "operator_lt", |args, _| Ok((compare_args(args) == Ordering::Less).into()));
    boolean(table, "operator_equals", |args, _| Ok((compare_args(args) == Ordering::Equal).into()));
    boolean(table, "operator_gt", |args, _| Ok((compare_args(args) == Ordering::Greater).into()));
    boolean(table, "operator_and", |args, _| Ok((args.bool("OPERAND1") && args.bool("OPERAND2")).into()));
    boolean(table, "operator_or", |args, _| Ok((args.bool("OPERAND1") || args.bool("OPERAND2")).into()));
    boolean(table, "operator_not", |args, _| Ok((!args.bool("OPERAND")).into()));
    reporter(table, "operator_random", random);
    reporter(table, "operator_join", join);
    reporter(table, "operator_letter_of", letter_of);
    reporter(table, "operator_length", length);
    boolean(table, "operator_contains", contains);
    reporter(table, "operator_mod", |args, _| {
        Ok(util::modulus(args.number("NUM1"), args.number("NUM2")).into())
    });
    reporter(table, "operator_round", |args, _| Ok((args.number("NUM") + 0.5).floor().into()));
    reporter(table, "operator_mathop", mathop);
}

fn compare_args(args: &Arguments) -> Ordering {
    let default = Value::from("");
    let a = args.get("OPERAND1").unwrap_or(&default);
    let b = args.get("OPERAND2").unwrap_or(&default);
    a.compare(b)
}

/// Whether a raw argument should be treated as an integer for `pick random`,
/// making the result an integer too.
fn is_int(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => n.is_nan() || n.fract() == 0.0,
        Value::Str(s) => !s.contains('.'),
    }
}

fn random(args: &Arguments, _util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let from = args.number("FROM");
    let to = args.number("TO");
    let (low, high) = if from <= to { (from, to) } else { (to, from) };
    if low == high {
        return Ok(low.into());
    }
    let mut rng = rand::thread_rng();
    let int_range = args.get("FROM").map(is_int).unwrap_or(true) && args.get("TO").map(is_int).unwrap_or(true);
    let picked = if int_range {
        low + (rng.gen::<f64>() * (high + 1.0 - low)).floor()
    } else {
        rng.gen::<f64>() * (high - low) + low
    };
    Ok(picked.into())
}

fn join(args: &Arguments, _util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    Ok(format_compact!("{}{}", args.text("STRING1"), args.text("STRING2")).into())
}

fn letter_of(args: &Arguments, _util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let index = args.index("LETTER");
    let text = args.text("STRING");
    if index < 1.0 {
        return Ok(CompactString::default().into());
    }
    let letter = text.graphemes(true).nth(index as usize - 1).unwrap_or("");
    Ok(CompactString::from(letter).into())
}

fn length(args: &Arguments, _util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    Ok((args.text("STRING").graphemes(true).count() as f64).into())
}

fn contains(args: &Arguments, _util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let haystack = args.text("STRING1").to_lowercase();
    let needle = args.text("STRING2").to_lowercase();
    Ok(haystack.contains(needle.as_str()).into())
}

/// Rounds trig results to ten decimal places so angles like `sin 180` report
/// an exact zero.
fn fix_trig(v: f64) -> f64 {
    (v * 1e10).round() / 1e10
}

fn tangent(degrees: f64) -> f64 {
    match util::modulus(degrees, 360.0) {
        90.0 => f64::INFINITY,
        270.0 => f64::NEG_INFINITY,
        angle => fix_trig(angle.to_radians().tan()),
    }
}

fn mathop(args: &Arguments, _util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let n = args.number("NUM");
    let result = match args.text("OPERATOR").to_lowercase().as_str() {
        "abs" => n.abs(),
        "floor" => n.floor(),
        "ceiling" => n.ceil(),
        "sqrt" => n.sqrt(),
        "sin" => fix_trig((n % 360.0).to_radians().sin()),
        "cos" => fix_trig((n % 360.0).to_radians().cos()),
        "tan" => tangent(n),
        "asin" => n.asin().to_degrees(),
        "acos" => n.acos().to_degrees(),
        "atan" => n.atan().to_degrees(),
        "ln" => n.ln(),
        "log" => n.ln() / std::f64::consts::LN_10,
        "e ^" => n.exp(),
        "10 ^" => 10f64.powf(n),
        _ => 0.0,
    };
    Ok(result.into())
}
