//! Id compression for saved projects.
//!
//! Block and comment ids in project files are long random strings. This pass
//! rewrites them to short dense ids, preserving entry order and fixing every
//! cross-reference (`next`, `parent`, input arrays, and comment links).
//! Generated ids use letters only, so no tool downstream can mistake one for
//! an array index, and candidates already taken by a variable, list, or
//! broadcast id in the same target are skipped.

use compact_str::CompactString;
use serde_json::Value as Json;

use crate::project::{Project, ProjectTarget};
use crate::vecmap::VecMap;

const SOUP: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// The `i`th id in the dense sequence: a, b, ..., Z, aa, ab, ...
fn generate_id(mut i: i64) -> CompactString {
    let mut id = CompactString::default();
    let len = SOUP.len() as i64;
    while i >= 0 {
        id.insert(0, SOUP[(i % len) as usize] as char);
        i = i / len - 1;
    }
    id
}

/// Rewrites every block and comment id in the project.
pub fn compress(project: &mut Project) {
    for target in &mut project.targets {
        compress_target(target);
    }
}

fn compress_target(target: &mut ProjectTarget) {
    let mut reserved: Vec<CompactString> = vec![];
    reserved.extend(target.variables.keys().cloned());
    reserved.extend(target.lists.keys().cloned());
    reserved.extend(target.broadcasts.keys().cloned());

    let mut next = 0i64;
    let mut new_ids: VecMap<CompactString, CompactString> = VecMap::new();
    let old_ids: Vec<CompactString> =
        target.blocks.keys().cloned().chain(target.comments.keys().cloned()).collect();
    for old in old_ids {
        let id = loop {
            let candidate = generate_id(next);
            next += 1;
            if !reserved.iter().any(|r| *r == candidate) {
                break candidate;
            }
        };
        new_ids.insert(old, id);
    }

    let blocks = std::mem::take(&mut target.blocks);
    for (old, mut json) in blocks {
        rewrite_block(&mut json, &new_ids);
        let id = new_ids.get(&old).cloned().unwrap_or(old);
        target.blocks.insert(id, json);
    }

    let comments = std::mem::take(&mut target.comments);
    for (old, mut json) in comments {
        if let Some(Json::String(block_id)) = json.get_mut("blockId") {
            if let Some(new) = new_ids.get(block_id.as_str()) {
                *block_id = new.to_string();
            }
        }
        let id = new_ids.get(&old).cloned().unwrap_or(old);
        target.comments.insert(id, json);
    }
}

fn rewrite_block(json: &mut Json, new_ids: &VecMap<CompactString, CompactString>) {
    let Some(obj) = json.as_object_mut() else {
        // loose top-level primitives have no references to fix
        return;
    };
    for key in ["next", "parent", "comment"] {
        if let Some(Json::String(id)) = obj.get_mut(key) {
            if let Some(new) = new_ids.get(id.as_str()) {
                *id = new.to_string();
            }
        }
    }
    if let Some(inputs) = obj.get_mut("inputs").and_then(|v| v.as_object_mut()) {
        for (_, input) in inputs.iter_mut() {
            let Some(arr) = input.as_array_mut() else { continue };
            // [shadow_state, block or primitive, obscured shadow?]
            for element in arr.iter_mut().skip(1) {
                if let Json::String(id) = element {
                    if let Some(new) = new_ids.get(id.as_str()) {
                        *id = new.to_string();
                    }
                }
            }
        }
    }
}
