//! The built-in block libraries, one module per palette category.

use std::rc::Rc;

use crate::primitives::{Arguments, BlockInfo, BlockResult, BlockType, BlockUtility, PrimitiveTable};
use crate::runtime::ErrorCause;

mod control;
mod data;
mod event;
mod looks;
pub(crate) mod motion;
mod operator;
mod procedures;
mod sensing;

pub(crate) fn register_all(table: &mut PrimitiveTable) {
    motion::register(table);
    looks::register(table);
    sensing::register(table);
    event::register(table);
    control::register(table);
    operator::register(table);
    data::register(table);
    procedures::register(table);
}

type Handler = fn(&Arguments, &mut BlockUtility) -> Result<BlockResult, ErrorCause>;

fn command(table: &mut PrimitiveTable, opcode: &str, func: Handler) {
    table.register(BlockInfo::new(opcode, BlockType::Command, Rc::new(func)));
}
fn reporter(table: &mut PrimitiveTable, opcode: &str, func: Handler) {
    table.register(BlockInfo::new(opcode, BlockType::Reporter, Rc::new(func)));
}
fn boolean(table: &mut PrimitiveTable, opcode: &str, func: Handler) {
    table.register(BlockInfo::new(opcode, BlockType::Boolean, Rc::new(func)));
}
fn event_hat(table: &mut PrimitiveTable, opcode: &str, restart_existing_threads: bool) {
    table.register(BlockInfo {
        opcode: opcode.into(),
        block_type: BlockType::Event,
        edge_activated: false,
        restart_existing_threads,
        func: Rc::new(|_, _| Ok(BlockResult::Nothing)),
    });
}
fn edge_hat(table: &mut PrimitiveTable, opcode: &str, func: Handler) {
    table.register(BlockInfo {
        opcode: opcode.into(),
        block_type: BlockType::Hat,
        edge_activated: true,
        restart_existing_threads: false,
        func: Rc::new(func),
    });
}
