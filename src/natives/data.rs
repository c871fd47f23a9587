//! Data blocks: variables and lists.
//!
//! Variables and lists resolve against the running target first and the
//! stage second, falling back to creating a local one, so remixed scripts
//! that reference a dropped variable keep working.

use std::cmp::Ordering;
use std::rc::Rc;

use compact_str::CompactString;
use rand::Rng;

use crate::primitives::{Arguments, BlockResult, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;
use crate::target::{List, Variable};
use crate::value::Value;

use super::{boolean, command, reporter};

/// Most items one list may hold; additions beyond this are dropped.
const LIST_ITEM_LIMIT: usize = 200_000;

pub(crate) fn register(table: &mut PrimitiveTable) {
    reporter(table, "data_variable", get_variable);
    command(table, "data_setvariableto", set_variable_to);
    command(table, "data_changevariableby", change_variable_by);
    reporter(table, "data_listcontents", list_contents);
    command(table, "data_addtolist", add_to_list);
    command(table, "data_deleteoflist", delete_of_list);
    command(table, "data_deletealloflist", delete_all_of_list);
    command(table, "data_insertatlist", insert_at_list);
    command(table, "data_replaceitemoflist", replace_item_of_list);
    reporter(table, "data_itemoflist", item_of_list);
    reporter(table, "data_itemnumoflist", item_num_of_list);
    reporter(table, "data_lengthoflist", length_of_list);
    boolean(table, "data_listcontainsitem", list_contains_item);
}

fn variable_ref(args: &Arguments) -> (CompactString, CompactString) {
    let name = args.text("VARIABLE");
    let id = args.field_id("VARIABLE").map(CompactString::from).unwrap_or_else(|| name.clone());
    (id, name)
}

fn list_ref(args: &Arguments) -> (CompactString, CompactString) {
    let name = args.text("LIST");
    let id = args.field_id("LIST").map(CompactString::from).unwrap_or_else(|| name.clone());
    (id, name)
}

fn with_variable<R>(util: &BlockUtility, id: &str, name: &str, f: impl FnOnce(&mut Variable) -> R) -> R {
    {
        let target = util.target();
        let mut target = target.borrow_mut();
        if let Some(var) = target.variable_mut(id, name) {
            return f(var);
        }
    }
    if let Some(stage) = util.stage() {
        if !Rc::ptr_eq(&stage, &util.thread.target) {
            let mut stage = stage.borrow_mut();
            if let Some(var) = stage.variable_mut(id, name) {
                return f(var);
            }
        }
    }
    let target = util.target();
    let mut target = target.borrow_mut();
    target.variables.insert(id.into(), Variable { name: name.into(), value: Value::from(0.0) });
    f(target.variables.get_mut(id).unwrap())
}

fn with_list<R>(util: &BlockUtility, id: &str, name: &str, f: impl FnOnce(&mut List) -> R) -> R {
    {
        let target = util.target();
        let mut target = target.borrow_mut();
        if let Some(list) = target.list_mut(id, name) {
            return f(list);
        }
    }
    if let Some(stage) = util.stage() {
        if !Rc::ptr_eq(&stage, &util.thread.target) {
            let mut stage = stage.borrow_mut();
            if let Some(list) = stage.list_mut(id, name) {
                return f(list);
            }
        }
    }
    let target = util.target();
    let mut target = target.borrow_mut();
    target.lists.insert(id.into(), List { name: name.into(), values: vec![] });
    f(target.lists.get_mut(id).unwrap())
}

/// Resolution of a 1-based list index argument, which may also be one of the
/// special menu words.
enum ListIndex {
    Invalid,
    All,
    Index(usize),
}

fn to_list_index(value: &Value, length: usize, accept_all: bool) -> ListIndex {
    if let Value::Str(s) = value {
        match s.as_str() {
            "all" => return if accept_all { ListIndex::All } else { ListIndex::Invalid },
            "last" => {
                return if length > 0 { ListIndex::Index(length) } else { ListIndex::Invalid };
            }
            "random" | "any" => {
                if length > 0 {
                    return ListIndex::Index(rand::thread_rng().gen_range(1..=length));
                }
                return ListIndex::Invalid;
            }
            _ => {}
        }
    }
    let index = value.as_number().floor();
    if index < 1.0 || index > length as f64 {
        return ListIndex::Invalid;
    }
    ListIndex::Index(index as usize)
}

fn get_variable(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = variable_ref(args);
    Ok(with_variable(util, &id, &name, |var| var.value.clone()).into())
}

fn set_variable_to(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = variable_ref(args);
    let value = args.get("VALUE").cloned().unwrap_or_else(|| Value::from(""));
    with_variable(util, &id, &name, |var| var.value = value);
    Ok(BlockResult::Nothing)
}

fn change_variable_by(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = variable_ref(args);
    let delta = args.number("VALUE");
    with_variable(util, &id, &name, |var| {
        var.value = Value::from(var.value.as_number() + delta);
    });
    Ok(BlockResult::Nothing)
}

fn list_contents(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let contents = with_list(util, &id, &name, |list| {
        let texts: Vec<CompactString> = list.values.iter().map(Value::as_text).collect();
        // single-character items read as one word, anything else as a
        // space-separated listing
        if texts.iter().all(|t| t.chars().count() == 1) {
            texts.concat()
        } else {
            texts.join(" ")
        }
    });
    Ok(CompactString::from(contents).into())
}

fn add_to_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let item = args.get("ITEM").cloned().unwrap_or_else(|| Value::from(""));
    with_list(util, &id, &name, |list| {
        if list.values.len() < LIST_ITEM_LIMIT {
            list.values.push(item);
        }
    });
    Ok(BlockResult::Nothing)
}

fn delete_of_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let index = args.get("INDEX").cloned().unwrap_or_else(|| Value::from(""));
    with_list(util, &id, &name, |list| match to_list_index(&index, list.values.len(), true) {
        ListIndex::All => list.values.clear(),
        ListIndex::Index(i) => {
            list.values.remove(i - 1);
        }
        ListIndex::Invalid => {}
    });
    Ok(BlockResult::Nothing)
}

fn delete_all_of_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    with_list(util, &id, &name, |list| list.values.clear());
    Ok(BlockResult::Nothing)
}

fn insert_at_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let item = args.get("ITEM").cloned().unwrap_or_else(|| Value::from(""));
    let index = args.get("INDEX").cloned().unwrap_or_else(|| Value::from(""));
    with_list(util, &id, &name, |list| {
        // insertion may extend the list by one
        if let ListIndex::Index(i) = to_list_index(&index, list.values.len() + 1, false) {
            if list.values.len() < LIST_ITEM_LIMIT {
                list.values.insert(i - 1, item);
            }
        }
    });
    Ok(BlockResult::Nothing)
}

fn replace_item_of_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let item = args.get("ITEM").cloned().unwrap_or_else(|| Value::from(""));
    let index = args.get("INDEX").cloned().unwrap_or_else(|| Value::from(""));
    with_list(util, &id, &name, |list| {
        if let ListIndex::Index(i) = to_list_index(&index, list.values.len(), false) {
            list.values[i - 1] = item;
        }
    });
    Ok(BlockResult::Nothing)
}

fn item_of_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let index = args.get("INDEX").cloned().unwrap_or_else(|| Value::from(""));
    let item = with_list(util, &id, &name, |list| {
        match to_list_index(&index, list.values.len(), false) {
            ListIndex::Index(i) => list.values[i - 1].clone(),
            _ => Value::from(""),
        }
    });
    Ok(item.into())
}

fn item_num_of_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let item = args.get("ITEM").cloned().unwrap_or_else(|| Value::from(""));
    let position = with_list(util, &id, &name, |list| {
        list.values
            .iter()
            .position(|v| v.compare(&item) == Ordering::Equal)
            .map(|i| i + 1)
            .unwrap_or(0)
    });
    Ok((position as f64).into())
}

fn length_of_list(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let length = with_list(util, &id, &name, |list| list.values.len());
    Ok((length as f64).into())
}

fn list_contains_item(args: &Arguments, util: &mut BlockUtility) -> Result<BlockResult, ErrorCause> {
    let (id, name) = list_ref(args);
    let item = args.get("ITEM").cloned().unwrap_or_else(|| Value::from(""));
    let contains = with_list(util, &id, &name, |list| {
        list.values.iter().any(|v| v.compare(&item) == Ordering::Equal)
    });
    Ok(contains.into())
}
