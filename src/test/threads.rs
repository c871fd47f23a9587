//! Control flow, procedures, clones, and data blocks driven through whole
//! scripts.

use serde_json::json;

use crate::runtime::MAX_CLONES;
use crate::value::Value;

use super::*;

#[test]
fn test_repeat() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "loop", "topLevel": true },
        "loop": {
            "opcode": "control_repeat", "next": null, "parent": "flag",
            "inputs": { "TIMES": [1, [6, 10]], "SUBSTACK": [2, "inc"] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": null, "parent": "loop",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(10.0));
}

#[test]
fn test_repeat_zero_skips_body() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "loop", "topLevel": true },
        "loop": {
            "opcode": "control_repeat", "next": "after", "parent": "flag",
            "inputs": { "TIMES": [1, [6, 0]], "SUBSTACK": [2, "inc"] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": null, "parent": "loop",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "after": {
            "opcode": "data_setvariableto", "next": null, "parent": "loop",
            "inputs": { "VALUE": [1, [10, "done"]] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(0.0));
    assert_eq!(stage_var(&runtime, "w"), Value::from("done"));
}

#[test]
fn test_if_else_branches() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "if1", "topLevel": true },
        "if1": {
            "opcode": "control_if_else", "next": "if2", "parent": "flag",
            "inputs": {
                "CONDITION": [2, "gt"],
                "SUBSTACK": [2, "then1"],
                "SUBSTACK2": [2, "else1"],
            },
        },
        "gt": {
            "opcode": "operator_gt", "parent": "if1",
            "inputs": { "OPERAND1": [1, [4, 10]], "OPERAND2": [1, [4, 5]] },
        },
        "then1": {
            "opcode": "data_setvariableto", "next": null, "parent": "if1",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "else1": {
            "opcode": "data_setvariableto", "next": null, "parent": "if1",
            "inputs": { "VALUE": [1, [4, 2]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "if2": {
            "opcode": "control_if_else", "next": null, "parent": "if1",
            "inputs": {
                "CONDITION": [2, "lt"],
                "SUBSTACK": [2, "then2"],
                "SUBSTACK2": [2, "else2"],
            },
        },
        "lt": {
            "opcode": "operator_lt", "parent": "if2",
            "inputs": { "OPERAND1": [1, [4, 10]], "OPERAND2": [1, [4, 5]] },
        },
        "then2": {
            "opcode": "data_setvariableto", "next": null, "parent": "if2",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
        "else2": {
            "opcode": "data_setvariableto", "next": null, "parent": "if2",
            "inputs": { "VALUE": [1, [4, 2]] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert_eq!(stage_var(&runtime, "w"), Value::from(2.0));
}

#[test]
fn test_wait_spans_ticks() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "a", "topLevel": true },
        "a": {
            "opcode": "data_setvariableto", "next": "wait", "parent": "flag",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "wait": {
            "opcode": "control_wait", "next": "b", "parent": "a",
            "inputs": { "DURATION": [1, [5, 0]] },
        },
        "b": {
            "opcode": "data_setvariableto", "next": null, "parent": "wait",
            "inputs": { "VALUE": [1, [4, 2]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.green_flag();
    runtime.step();
    // wait always parks across at least one tick, even for zero seconds
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert_eq!(runtime.threads.len(), 1);
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(2.0));
    assert!(runtime.threads.is_empty());
}

#[test]
fn test_forever_paced_one_iteration_per_tick() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "loop", "topLevel": true },
        "loop": {
            "opcode": "control_forever", "next": null, "parent": "flag",
            "inputs": { "SUBSTACK": [2, "inc"] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": "wait", "parent": "loop",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "wait": {
            "opcode": "control_wait", "next": null, "parent": "inc",
            "inputs": { "DURATION": [1, [5, 0]] },
        },
    }));
    runtime.green_flag();
    for tick in 1..=3 {
        runtime.step();
        assert_eq!(stage_var(&runtime, "v"), Value::from(tick as f64));
    }
    assert_eq!(runtime.threads.len(), 1);
}

#[test]
fn test_wait_until() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "wu", "topLevel": true },
        "wu": {
            "opcode": "control_wait_until", "next": "a", "parent": "flag",
            "inputs": { "CONDITION": [2, "kp"] },
        },
        "kp": {
            "opcode": "sensing_keypressed", "parent": "wu",
            "inputs": { "KEY_OPTION": [1, [10, "space"]] },
        },
        "a": {
            "opcode": "data_setvariableto", "next": null, "parent": "wu",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.green_flag();
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(0.0));
    assert_eq!(runtime.threads.len(), 1);
    runtime.post_key_down("space");
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert!(runtime.threads.is_empty());
}

fn bump_procedure_blocks(calls: serde_json::Value) -> serde_json::Value {
    let mut blocks = json!({
        "def": {
            "opcode": "procedures_definition", "next": "body", "topLevel": true,
            "inputs": { "custom_block": [1, "proto"] },
        },
        "proto": {
            "opcode": "procedures_prototype", "shadow": true, "parent": "def",
            "mutation": {
                "proccode": "bump %s",
                "argumentids": "[\"a1\"]",
                "argumentnames": "[\"N\"]",
                "argumentdefaults": "[\"3\"]",
                "warp": false,
            },
        },
        "body": {
            "opcode": "data_changevariableby", "next": null, "parent": "def",
            "inputs": { "VALUE": [2, "argrep"] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "argrep": {
            "opcode": "argument_reporter_string_number", "parent": "body",
            "fields": { "VALUE": ["N", null] },
        },
    });
    for (id, block) in calls.as_object().unwrap() {
        blocks[id] = block.clone();
    }
    blocks
}

#[test]
fn test_procedure_parameters() {
    let mut runtime = setup(bump_procedure_blocks(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "call1", "topLevel": true },
        "call1": {
            "opcode": "procedures_call", "next": "call2", "parent": "flag",
            "inputs": { "a1": [1, [4, 5]] },
            "mutation": { "proccode": "bump %s", "argumentids": "[\"a1\"]", "warp": false },
        },
        "call2": {
            "opcode": "procedures_call", "next": null, "parent": "call1",
            "inputs": { "a1": [1, [4, 7]] },
            "mutation": { "proccode": "bump %s", "argumentids": "[\"a1\"]", "warp": false },
        },
    })));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(12.0));
}

#[test]
fn test_procedure_default_argument() {
    let mut runtime = setup(bump_procedure_blocks(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "call1", "topLevel": true },
        "call1": {
            "opcode": "procedures_call", "next": null, "parent": "flag",
            "inputs": {},
            "mutation": { "proccode": "bump %s", "argumentids": "[\"a1\"]", "warp": false },
        },
    })));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(3.0));
}

#[test]
fn test_recursive_procedure() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "call", "topLevel": true },
        "call": {
            "opcode": "procedures_call", "next": null, "parent": "flag",
            "inputs": {},
            "mutation": { "proccode": "count", "argumentids": "[]", "warp": false },
        },
        "def": {
            "opcode": "procedures_definition", "next": "inc", "topLevel": true,
            "inputs": { "custom_block": [1, "proto"] },
        },
        "proto": {
            "opcode": "procedures_prototype", "shadow": true, "parent": "def",
            "mutation": {
                "proccode": "count",
                "argumentids": "[]",
                "argumentnames": "[]",
                "argumentdefaults": "[]",
                "warp": false,
            },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": "ifb", "parent": "def",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "ifb": {
            "opcode": "control_if", "next": null, "parent": "inc",
            "inputs": { "CONDITION": [2, "lt"], "SUBSTACK": [2, "rec"] },
        },
        "lt": {
            "opcode": "operator_lt", "parent": "ifb",
            "inputs": { "OPERAND1": [3, [12, "v", "v"], [10, ""]], "OPERAND2": [1, [4, 3]] },
        },
        "rec": {
            "opcode": "procedures_call", "next": null, "parent": "ifb",
            "inputs": {},
            "mutation": { "proccode": "count", "argumentids": "[]", "warp": false },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(3.0));
}

#[test]
fn test_warp_procedure_finishes_in_one_tick() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "call", "topLevel": true },
        "call": {
            "opcode": "procedures_call", "next": null, "parent": "flag",
            "inputs": {},
            "mutation": { "proccode": "spin", "argumentids": "[]", "warp": true },
        },
        "def": {
            "opcode": "procedures_definition", "next": "loop", "topLevel": true,
            "inputs": { "custom_block": [1, "proto"] },
        },
        "proto": {
            "opcode": "procedures_prototype", "shadow": true, "parent": "def",
            "mutation": {
                "proccode": "spin",
                "argumentids": "[]",
                "argumentnames": "[]",
                "argumentdefaults": "[]",
                "warp": true,
            },
        },
        "loop": {
            "opcode": "control_repeat", "next": null, "parent": "def",
            "inputs": { "TIMES": [1, [6, 100]], "SUBSTACK": [2, "inc"] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": null, "parent": "loop",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.green_flag();
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(100.0));
    assert!(runtime.threads.is_empty());
}

#[test]
fn test_stop_this_script_returns_from_procedure() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "call", "topLevel": true },
        "call": {
            "opcode": "procedures_call", "next": "after", "parent": "flag",
            "inputs": {},
            "mutation": { "proccode": "halt", "argumentids": "[]", "warp": false },
        },
        "after": {
            "opcode": "data_setvariableto", "next": null, "parent": "call",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
        "def": {
            "opcode": "procedures_definition", "next": "inc", "topLevel": true,
            "inputs": { "custom_block": [1, "proto"] },
        },
        "proto": {
            "opcode": "procedures_prototype", "shadow": true, "parent": "def",
            "mutation": {
                "proccode": "halt",
                "argumentids": "[]",
                "argumentnames": "[]",
                "argumentdefaults": "[]",
                "warp": false,
            },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": "stopb", "parent": "def",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "stopb": {
            "opcode": "control_stop", "next": "unreached", "parent": "inc",
            "fields": { "STOP_OPTION": ["this script", null] },
        },
        "unreached": {
            "opcode": "data_changevariableby", "next": null, "parent": "stopb",
            "inputs": { "VALUE": [1, [4, 100]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert_eq!(stage_var(&runtime, "w"), Value::from(1.0));
}

#[test]
fn test_stop_all() {
    let mut runtime = setup(json!({
        "flag1": { "opcode": "event_whenflagclicked", "next": "a", "topLevel": true },
        "a": {
            "opcode": "data_setvariableto", "next": "stopb", "parent": "flag1",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "stopb": {
            "opcode": "control_stop", "next": "unreached", "parent": "a",
            "fields": { "STOP_OPTION": ["all", null] },
        },
        "unreached": {
            "opcode": "data_setvariableto", "next": null, "parent": "stopb",
            "inputs": { "VALUE": [1, [4, 99]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "flag2": { "opcode": "event_whenflagclicked", "next": "park", "topLevel": true },
        "park": {
            "opcode": "control_wait", "next": "never", "parent": "flag2",
            "inputs": { "DURATION": [1, [5, 9999]] },
        },
        "never": {
            "opcode": "data_setvariableto", "next": null, "parent": "park",
            "inputs": { "VALUE": [1, [4, 98]] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 3);
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert_eq!(stage_var(&runtime, "w"), Value::from(0.0));
}

#[test]
fn test_stop_other_scripts() {
    let mut runtime = setup(json!({
        "flag1": { "opcode": "event_whenflagclicked", "next": "park", "topLevel": true },
        "park": {
            "opcode": "control_wait", "next": "never", "parent": "flag1",
            "inputs": { "DURATION": [1, [5, 0]] },
        },
        "never": {
            "opcode": "data_setvariableto", "next": null, "parent": "park",
            "inputs": { "VALUE": [1, [4, 99]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "flag2": { "opcode": "event_whenflagclicked", "next": "stopb", "topLevel": true },
        "stopb": {
            "opcode": "control_stop", "next": "b", "parent": "flag2",
            "fields": { "STOP_OPTION": ["other scripts in stage", null] },
        },
        "b": {
            "opcode": "data_setvariableto", "next": null, "parent": "stopb",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 3);
    assert_eq!(stage_var(&runtime, "v"), Value::from(0.0));
    assert_eq!(stage_var(&runtime, "w"), Value::from(1.0));
}

#[test]
fn test_clone_lifecycle() {
    let sprite = json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "mk", "topLevel": true },
        "mk": {
            "opcode": "control_create_clone_of", "next": null, "parent": "flag",
            "inputs": { "CLONE_OPTION": [1, "menu"] },
        },
        "menu": {
            "opcode": "control_create_clone_of_menu", "shadow": true, "parent": "mk",
            "fields": { "CLONE_OPTION": ["_myself_", null] },
        },
        "ash": { "opcode": "control_start_as_clone", "next": "cv", "topLevel": true },
        "cv": {
            "opcode": "data_changevariableby", "next": "del", "parent": "ash",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "del": { "opcode": "control_delete_this_clone", "next": null, "parent": "cv" },
    });
    let mut runtime = setup_sprites(json!({}), &[("Sprite1", sprite)]);
    assert_eq!(runtime.targets.len(), 2);
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    // the clone incremented the global and then disposed of itself
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert_eq!(runtime.targets.len(), 2);
}

#[test]
fn test_clone_cap() {
    let mut runtime = setup_sprites(json!({}), &[("Sprite1", json!({}))]);
    let sprite = runtime.sprite_by_name("Sprite1").unwrap();
    for _ in 0..MAX_CLONES {
        assert!(runtime.spawn_clone(&sprite).is_some());
    }
    assert!(runtime.spawn_clone(&sprite).is_none());
    assert_eq!(runtime.targets.len(), 2 + MAX_CLONES);
    runtime.stop_all();
    assert_eq!(runtime.targets.len(), 2);
}

#[test]
fn test_list_blocks() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "add1", "topLevel": true },
        "add1": {
            "opcode": "data_addtolist", "next": "add2", "parent": "flag",
            "inputs": { "ITEM": [1, [10, "apple"]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "add2": {
            "opcode": "data_addtolist", "next": "ins", "parent": "add1",
            "inputs": { "ITEM": [1, [10, "banana"]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "ins": {
            "opcode": "data_insertatlist", "next": "rep", "parent": "add2",
            "inputs": { "ITEM": [1, [10, "cherry"]], "INDEX": [1, [7, 1]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "rep": {
            "opcode": "data_replaceitemoflist", "next": "delb", "parent": "ins",
            "inputs": { "ITEM": [1, [10, "x"]], "INDEX": [1, [7, 2]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "delb": {
            "opcode": "data_deleteoflist", "next": "getv", "parent": "rep",
            "inputs": { "INDEX": [1, [7, 3]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "getv": {
            "opcode": "data_setvariableto", "next": "getw", "parent": "delb",
            "inputs": { "VALUE": [2, "item1"] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "item1": {
            "opcode": "data_itemoflist", "parent": "getv",
            "inputs": { "INDEX": [1, [7, 1]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "getw": {
            "opcode": "data_setvariableto", "next": null, "parent": "getv",
            "inputs": { "VALUE": [2, "numx"] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
        "numx": {
            "opcode": "data_itemnumoflist", "parent": "getw",
            "inputs": { "ITEM": [1, [10, "x"]] },
            "fields": { "LIST": ["order", "order"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_list(&runtime, "order"), ["cherry", "x"]);
    assert_eq!(stage_var(&runtime, "v"), Value::from("cherry"));
    assert_eq!(stage_var(&runtime, "w"), Value::from(2.0));
}

#[test]
fn test_list_special_indices() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "add1", "topLevel": true },
        "add1": {
            "opcode": "data_addtolist", "next": "add2", "parent": "flag",
            "inputs": { "ITEM": [1, [10, "a"]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "add2": {
            "opcode": "data_addtolist", "next": "add3", "parent": "add1",
            "inputs": { "ITEM": [1, [10, "b"]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "add3": {
            "opcode": "data_addtolist", "next": "dellast", "parent": "add2",
            "inputs": { "ITEM": [1, [10, "c"]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "dellast": {
            "opcode": "data_deleteoflist", "next": "getv", "parent": "add3",
            "inputs": { "INDEX": [1, [10, "last"]] },
            "fields": { "LIST": ["order", "order"] },
        },
        "getv": {
            "opcode": "data_setvariableto", "next": "delall", "parent": "dellast",
            "inputs": { "VALUE": [2, "len"] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "len": {
            "opcode": "data_lengthoflist", "parent": "getv",
            "fields": { "LIST": ["order", "order"] },
        },
        "delall": {
            "opcode": "data_deleteoflist", "next": null, "parent": "getv",
            "inputs": { "INDEX": [1, [10, "all"]] },
            "fields": { "LIST": ["order", "order"] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(2.0));
    assert!(stage_list(&runtime, "order").is_empty());
}

#[test]
fn test_text_contains_ignores_case() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "a", "topLevel": true },
        "a": {
            "opcode": "data_setvariableto", "next": "b", "parent": "flag",
            "inputs": { "VALUE": [2, "hit"] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "hit": {
            "opcode": "operator_contains", "parent": "a",
            "inputs": { "STRING1": [1, [10, "Hello World"]], "STRING2": [1, [10, "WORLD"]] },
        },
        "b": {
            "opcode": "data_setvariableto", "next": null, "parent": "a",
            "inputs": { "VALUE": [2, "miss"] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
        "miss": {
            "opcode": "operator_contains", "parent": "b",
            "inputs": { "STRING1": [1, [10, "Hello World"]], "STRING2": [1, [10, "planet"]] },
        },
    }));
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(true));
    assert_eq!(stage_var(&runtime, "w"), Value::from(false));
}

fn arithmetic_result(compiler_enabled: bool) -> Value {
    let blocks = json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "call", "topLevel": true },
        "call": {
            "opcode": "procedures_call", "next": "fin", "parent": "flag",
            "inputs": { "a1": [1, [4, 4]] },
            "mutation": { "proccode": "accumulate %s", "argumentids": "[\"a1\"]", "warp": false },
        },
        "fin": {
            "opcode": "data_setvariableto", "next": null, "parent": "call",
            "inputs": { "VALUE": [2, "joined"] },
            "fields": { "VARIABLE": ["w", "w"] },
        },
        "joined": {
            "opcode": "operator_join", "parent": "fin",
            "inputs": { "STRING1": [1, [10, "v="]], "STRING2": [3, [12, "v", "v"], [10, ""]] },
        },
        "def": {
            "opcode": "procedures_definition", "next": "loop", "topLevel": true,
            "inputs": { "custom_block": [1, "proto"] },
        },
        "proto": {
            "opcode": "procedures_prototype", "shadow": true, "parent": "def",
            "mutation": {
                "proccode": "accumulate %s",
                "argumentids": "[\"a1\"]",
                "argumentnames": "[\"N\"]",
                "argumentdefaults": "[\"0\"]",
                "warp": false,
            },
        },
        "loop": {
            "opcode": "control_repeat", "next": null, "parent": "def",
            "inputs": { "TIMES": [2, "argrep"], "SUBSTACK": [2, "inc"] },
        },
        "argrep": {
            "opcode": "argument_reporter_string_number", "parent": "loop",
            "fields": { "VALUE": ["N", null] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": null, "parent": "loop",
            "inputs": { "VALUE": [2, "rounded"] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "rounded": {
            "opcode": "operator_round", "parent": "inc",
            "inputs": { "NUM": [1, [4, 2.5]] },
        },
    });
    let mut runtime = setup(blocks);
    runtime.set_compiler_enabled(compiler_enabled);
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert!(runtime
        .take_events()
        .iter()
        .all(|e| !matches!(e, crate::runtime::RuntimeEvent::CompileError { .. })));
    stage_var(&runtime, "w")
}

#[test]
fn test_compiled_matches_interpreted() {
    let compiled = arithmetic_result(true);
    let interpreted = arithmetic_result(false);
    assert_eq!(compiled, Value::from("v=12"));
    assert_eq!(interpreted, compiled);
}
