//! Hat dispatch: start order, broadcasts, key events, edge activation, and
//! the per-tick event bracketing.

use serde_json::json;

use crate::extensions::{ExtensionBlock, ExtensionInfo};
use crate::runtime::RuntimeEvent;
use crate::value::Value;

use super::*;

fn log_name_script(name: &str) -> serde_json::Value {
    json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "add", "topLevel": true },
        "add": {
            "opcode": "data_addtolist", "next": null, "parent": "flag",
            "inputs": { "ITEM": [1, [10, name]] },
            "fields": { "LIST": ["order", "order"] },
        },
    })
}

#[test]
fn test_hat_start_order_scans_targets_in_reverse() {
    let mut runtime = setup_sprites(
        log_name_script("stage"),
        &[
            ("1", log_name_script("1")),
            ("2", log_name_script("2")),
            ("3", log_name_script("3")),
        ],
    );
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_list(&runtime, "order"), ["3", "2", "1", "stage"]);
}

#[test]
fn test_broadcast_starts_receivers_in_same_tick() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "cast", "topLevel": true },
        "cast": {
            "opcode": "event_broadcast", "next": null, "parent": "flag",
            "inputs": { "BROADCAST_INPUT": [1, [11, "go", "go-id"]] },
        },
        "recv": {
            "opcode": "event_whenbroadcastreceived", "next": "a", "topLevel": true,
            "fields": { "BROADCAST_OPTION": ["go", "go-id"] },
        },
        "a": {
            "opcode": "data_setvariableto", "next": null, "parent": "recv",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.green_flag();
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert!(runtime.threads.is_empty());
}

#[test]
fn test_broadcast_and_wait_blocks_until_receivers_finish() {
    let receiver = json!({
        "recv": {
            "opcode": "event_whenbroadcastreceived", "next": "i1", "topLevel": true,
            "fields": { "BROADCAST_OPTION": ["go", "go-id"] },
        },
        "i1": {
            "opcode": "data_changevariableby", "next": "wait", "parent": "recv",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "wait": {
            "opcode": "control_wait", "next": "i2", "parent": "i1",
            "inputs": { "DURATION": [1, [5, 0]] },
        },
        "i2": {
            "opcode": "data_changevariableby", "next": null, "parent": "wait",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    });
    let mut runtime = setup_sprites(
        json!({
            "flag": { "opcode": "event_whenflagclicked", "next": "bw", "topLevel": true },
            "bw": {
                "opcode": "event_broadcastandwait", "next": "fin", "parent": "flag",
                "inputs": { "BROADCAST_INPUT": [1, [11, "go", "go-id"]] },
            },
            "fin": {
                "opcode": "data_setvariableto", "next": null, "parent": "bw",
                "inputs": { "VALUE": [3, [12, "v", "v"], [10, ""]] },
                "fields": { "VARIABLE": ["w", "w"] },
            },
        }),
        &[("Sprite1", receiver)],
    );
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    // the waiter only advanced once the receiver had run to completion
    assert_eq!(stage_var(&runtime, "v"), Value::from(2.0));
    assert_eq!(stage_var(&runtime, "w"), Value::from(2.0));
}

#[test]
fn test_broadcast_restarts_running_receiver() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "cast1", "topLevel": true },
        "cast1": {
            "opcode": "event_broadcast", "next": "cast2", "parent": "flag",
            "inputs": { "BROADCAST_INPUT": [1, [11, "go", "go-id"]] },
        },
        "cast2": {
            "opcode": "event_broadcast", "next": null, "parent": "cast1",
            "inputs": { "BROADCAST_INPUT": [1, [11, "go", "go-id"]] },
        },
        "recv": {
            "opcode": "event_whenbroadcastreceived", "next": "i1", "topLevel": true,
            "fields": { "BROADCAST_OPTION": ["go", "go-id"] },
        },
        "i1": {
            "opcode": "data_changevariableby", "next": "park", "parent": "recv",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "park": {
            "opcode": "control_wait", "next": null, "parent": "i1",
            "inputs": { "DURATION": [1, [5, 9999]] },
        },
    }));
    runtime.green_flag();
    runtime.step();
    // the second broadcast restarted the existing thread instead of piling
    // up a duplicate
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert_eq!(runtime.threads.len(), 1);
}

#[test]
fn test_key_hat_does_not_restart_running_script() {
    let mut runtime = setup(json!({
        "hat": {
            "opcode": "event_whenkeypressed", "next": "i1", "topLevel": true,
            "fields": { "KEY_OPTION": ["space", null] },
        },
        "i1": {
            "opcode": "data_changevariableby", "next": "park", "parent": "hat",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "park": {
            "opcode": "control_wait", "next": null, "parent": "i1",
            "inputs": { "DURATION": [1, [5, 9999]] },
        },
    }));
    runtime.post_key_down("space");
    runtime.post_key_down("space");
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
    assert_eq!(runtime.threads.len(), 1);
    assert!(runtime.io.keyboard.is_down("space"));
    runtime.post_key_up("space");
    assert!(!runtime.io.keyboard.is_down("space"));
}

#[test]
fn test_edge_activated_hat_fires_on_rising_edge_only() {
    let mut runtime = setup(json!({
        "hat": {
            "opcode": "event_whengreaterthan", "next": "inc", "topLevel": true,
            "inputs": { "VALUE": [1, [4, 50]] },
            "fields": { "WHENGREATERTHANMENU": ["LOUDNESS", null] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": null, "parent": "hat",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.io.loudness = 0.0;
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(0.0));

    runtime.io.loudness = 60.0;
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));

    // still above the threshold: no new edge, no new run
    runtime.step();
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));

    runtime.io.loudness = 0.0;
    runtime.step();
    runtime.io.loudness = 60.0;
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(2.0));
}

#[test]
fn test_start_hats_matches_every_given_field() {
    let mut runtime = setup(json!({
        "hat": {
            "opcode": "sig_onsignal", "next": "inc", "topLevel": true,
            "fields": { "CHANNEL": ["Alpha", null], "KIND": ["major", null] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": null, "parent": "hat",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.register_extension(ExtensionInfo {
        id: "sig".into(),
        name: "Signals".into(),
        blocks: vec![ExtensionBlock::event("onsignal")],
        menus: vec![],
    });

    // field values compare case-insensitively
    let channel = Value::from("alpha");
    let kind = Value::from("major");
    let wrong = Value::from("minor");
    assert!(runtime
        .start_hats("sig_onsignal", &[("CHANNEL", &channel), ("KIND", &wrong)], None)
        .is_empty());
    assert_eq!(
        runtime
            .start_hats("sig_onsignal", &[("CHANNEL", &channel), ("KIND", &kind)], None)
            .len(),
        1
    );
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
}

#[test]
fn test_step_brackets_with_execute_events() {
    let mut runtime = setup(json!({}));
    runtime.take_events();
    runtime.step();
    assert_eq!(
        runtime.take_events(),
        [RuntimeEvent::BeforeExecute, RuntimeEvent::AfterExecute]
    );
}

#[test]
fn test_stack_click_reports_visually() {
    let mut runtime = setup(json!({
        "sum": {
            "opcode": "operator_add", "next": null, "topLevel": true,
            "inputs": { "NUM1": [1, [4, 3]], "NUM2": [1, [4, 4]] },
        },
    }));
    let stage = runtime.stage().unwrap();
    runtime.push_thread(stage, "sum".into(), true);
    runtime.step();
    let events = runtime.take_events();
    assert!(events.contains(&RuntimeEvent::VisualReport {
        block_id: "sum".into(),
        value: Value::from(7.0),
    }));
    assert!(runtime.threads.is_empty());
}

#[test]
fn test_green_flag_resets_timer_and_restarts() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "park", "topLevel": true },
        "park": {
            "opcode": "control_wait", "next": null, "parent": "flag",
            "inputs": { "DURATION": [1, [5, 9999]] },
        },
    }));
    runtime.green_flag();
    runtime.step();
    assert_eq!(runtime.threads.len(), 1);
    // a second flag press stops everything and starts the scripts fresh
    runtime.green_flag();
    assert_eq!(runtime.threads.len(), 1);
    assert!(runtime.io.timer.elapsed_ms() < 1000.0);
}

#[test]
fn test_mouse_wheel_acts_as_arrow_keys() {
    let mut runtime = setup(json!({
        "hat": {
            "opcode": "event_whenkeypressed", "next": "inc", "topLevel": true,
            "fields": { "KEY_OPTION": ["up arrow", null] },
        },
        "inc": {
            "opcode": "data_changevariableby", "next": null, "parent": "hat",
            "inputs": { "VALUE": [1, [4, 1]] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
    }));
    runtime.post_mouse_wheel(-3.0);
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));

    // scrolling the other way presses the down arrow, which no hat watches
    runtime.post_mouse_wheel(3.0);
    runtime.step();
    assert_eq!(stage_var(&runtime, "v"), Value::from(1.0));
}

#[test]
fn test_mouse_input_feeds_sensing() {
    let mut runtime = setup(json!({
        "flag": { "opcode": "event_whenflagclicked", "next": "a", "topLevel": true },
        "a": {
            "opcode": "data_setvariableto", "next": null, "parent": "flag",
            "inputs": { "VALUE": [2, "mx"] },
            "fields": { "VARIABLE": ["v", "v"] },
        },
        "mx": { "opcode": "sensing_mousex", "parent": "a" },
    }));
    runtime.post_mouse_move(42.0, -17.0);
    runtime.post_mouse_down(true);
    assert!(runtime.io.mouse.down);
    runtime.green_flag();
    run_until_done(&mut runtime, 10);
    assert_eq!(stage_var(&runtime, "v"), Value::from(42.0));
}
