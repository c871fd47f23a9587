//! Custom procedures: definition, call, and argument reporters.

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;
use crate::sequencer;
use crate::value::Value;
use crate::vecmap::VecMap;

use super::{boolean, command, reporter};

pub(crate) fn register(table: &mut PrimitiveTable) {
    // the definition itself does nothing; execution falls through into the
    // body it anchors
    command(table, "procedures_definition", |_, _| Ok(BlockResult::Nothing));
    command(table, "procedures_call", call);
    reporter(table, "argument_reporter_string_number", argument_reporter);
    boolean(table, "argument_reporter_boolean", argument_reporter);
}

fn call(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let Some(mutation) = &args.mutation else {
        return Ok(BlockResult::Nothing);
    };

    // an addon registered for this proccode replaces the project's own
    // definition entirely
    if let Some(addon) = util.runtime.addon_block(&mutation.proccode) {
        let func = addon.func.clone();
        let mut remapped = Arguments::default();
        for (name, id) in addon.arguments.iter().zip(mutation.argument_ids.iter()) {
            if let Some(value) = args.get(id) {
                remapped.values.insert(name.clone(), value.clone());
            }
        }
        return func(&remapped, util);
    }

    let Some(definition_id) = util.thread.blocks.procedure_definition(&mutation.proccode).cloned() else {
        return Ok(BlockResult::Nothing);
    };
    let (param_names, param_ids, param_defaults, warp) =
        match util.thread.blocks.procedure_prototype(&definition_id) {
            Some(proto) => (
                proto.argument_names.clone(),
                proto.argument_ids.clone(),
                proto.argument_defaults.clone(),
                proto.warp,
            ),
            None => (vec![], vec![], vec![], false),
        };
    let mut params = VecMap::new();
    for (i, name) in param_names.iter().enumerate() {
        let value = param_ids
            .get(i)
            .and_then(|id| args.get(id))
            .cloned()
            .or_else(|| param_defaults.get(i).cloned())
            .unwrap_or_else(|| Value::from(""));
        params.insert(name.clone(), value);
    }

    let recursive = util.thread.is_recursive_call(&definition_id);
    util.start_procedure(definition_id, params, warp);
    if util.warp_mode() {
        let expired = util
            .thread
            .warp_timer
            .as_ref()
            .map(|t| t.elapsed_ms() >= sequencer::WARP_TIME_MS)
            .unwrap_or(false);
        if expired {
            util.yield_();
        }
    } else if recursive {
        // un-warped recursion yields between activations
        util.yield_();
    }
    Ok(BlockResult::Nothing)
}

fn argument_reporter(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let name = args.text("VALUE");
    match util.thread.param(&name) {
        Some(value) => Ok(value.clone().into()),
        // outside any procedure the reporter reads as zero
        None => Ok(0.0.into()),
    }
}
