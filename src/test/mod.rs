use compact_str::CompactString;
use serde_json::{json, Value as Json};

use crate::runtime::Runtime;
use crate::value::Value;

mod hats;
mod threads;

/// Builds a project file with a stage (carrying the variables `v` and `w`
/// and the list `order` every test shares) plus any extra sprites.
fn project_json(stage_blocks: Json, sprites: &[(&str, Json)]) -> String {
    let mut targets = vec![json!({
        "isStage": true,
        "name": "Stage",
        "variables": { "v": ["v", 0], "w": ["w", 0] },
        "lists": { "order": ["order", []] },
        "broadcasts": { "go-id": "go" },
        "blocks": stage_blocks,
    })];
    for (name, blocks) in sprites {
        targets.push(json!({
            "isStage": false,
            "name": name,
            "blocks": blocks,
        }));
    }
    json!({
        "targets": targets,
        "monitors": [],
        "extensions": [],
        "meta": {},
    })
    .to_string()
}

fn setup_sprites(stage_blocks: Json, sprites: &[(&str, Json)]) -> Runtime {
    let mut runtime = Runtime::new();
    crate::project::load_str(&mut runtime, &project_json(stage_blocks, sprites)).unwrap();
    runtime
}

fn setup(stage_blocks: Json) -> Runtime {
    setup_sprites(stage_blocks, &[])
}

/// Steps the runtime until every thread has finished.
fn run_until_done(runtime: &mut Runtime, max_ticks: usize) {
    for _ in 0..max_ticks {
        runtime.step();
        if runtime.threads.is_empty() {
            return;
        }
    }
    panic!("threads did not finish within {max_ticks} ticks");
}

fn stage_var(runtime: &Runtime, id: &str) -> Value {
    let stage = runtime.stage().unwrap();
    let value = stage.borrow().variables.get(id).map(|x| x.value.clone());
    value.unwrap_or_else(|| panic!("no variable {id} on the stage"))
}

fn stage_list(runtime: &Runtime, id: &str) -> Vec<CompactString> {
    let stage = runtime.stage().unwrap();
    let values = stage.borrow().lists.get(id).map(|x| x.values.clone());
    values
        .unwrap_or_else(|| panic!("no list {id} on the stage"))
        .iter()
        .map(Value::as_text)
        .collect()
}
