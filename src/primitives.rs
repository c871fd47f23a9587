//! The primitive table: opcode to handler dispatch.
//!
//! Every executable opcode resolves through a [`PrimitiveTable`] owned by its
//! runtime. The native block libraries fill the table at construction and
//! runtime-registered extensions add to it afterwards, so two runtimes in one
//! process never share handler state. A handler receives its evaluated
//! arguments and a [`BlockUtility`] giving it controlled access to the thread
//! and runtime it is running under.

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;

use crate::blocks::{BlockId, Mutation};
use crate::natives;
use crate::runtime::{ErrorCause, Runtime};
use crate::target::Target;
use crate::thread::{Promise, Thread, ThreadStatus};
use crate::value::Value;
use crate::vecmap::VecMap;

/// The shape of a block, which determines how the executor interprets the
/// handler's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// A stack block. Return values are ignored (except for stack clicks,
    /// which surface them visually).
    Command,
    /// Reports a value into an input slot.
    Reporter,
    /// A reporter constrained to booleans.
    Boolean,
    /// A predicate hat. The handler runs when scripts under it are started
    /// and its truthiness decides whether the body runs.
    Hat,
    /// An event hat. The handler is never invoked; scripts start when the
    /// runtime fires the event.
    Event,
    /// A C-shaped block whose returned number picks which branch to enter.
    Conditional,
    /// A C-shaped block that re-enters branch 1 as long as it returns truthy.
    Loop,
}

/// What a handler produced.
pub enum BlockResult {
    /// Nothing to report.
    Nothing,
    /// A report value. Its meaning depends on the block type: the reported
    /// value for reporters, the predicate result for hats, the branch number
    /// for conditionals, and the continue flag for loops.
    Value(Value),
    /// The block is asynchronous. The thread parks until the promise
    /// resolves, and the resolved value is treated like `Value` would be.
    Promise(Promise),
}
impl From<Value> for BlockResult {
    fn from(v: Value) -> Self { BlockResult::Value(v) }
}
impl From<f64> for BlockResult {
    fn from(v: f64) -> Self { BlockResult::Value(v.into()) }
}
impl From<bool> for BlockResult {
    fn from(v: bool) -> Self { BlockResult::Value(v.into()) }
}
impl From<CompactString> for BlockResult {
    fn from(v: CompactString) -> Self { BlockResult::Value(v.into()) }
}

pub type HandlerFn = Rc<dyn Fn(&Arguments, &mut BlockUtility) -> Result<BlockResult, ErrorCause>>;

/// One entry of the primitive table.
#[derive(Clone)]
pub struct BlockInfo {
    pub opcode: CompactString,
    pub block_type: BlockType,
    /// For hats: scanned every tick against stored per-script values, firing
    /// on a rising edge instead of waiting for an explicit event.
    pub edge_activated: bool,
    /// For hats: whether firing the event restarts a script that is already
    /// running, rather than leaving it alone.
    pub restart_existing_threads: bool,
    pub func: HandlerFn,
}
impl fmt::Debug for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BlockInfo")
            .field("opcode", &self.opcode)
            .field("block_type", &self.block_type)
            .field("edge_activated", &self.edge_activated)
            .field("restart_existing_threads", &self.restart_existing_threads)
            .finish_non_exhaustive()
    }
}
impl BlockInfo {
    pub fn new(opcode: &str, block_type: BlockType, func: HandlerFn) -> Self {
        Self {
            opcode: opcode.into(),
            block_type,
            edge_activated: false,
            restart_existing_threads: true,
            func,
        }
    }
}

/// The evaluated arguments handed to a handler: input reports and field
/// values merged into one namespace, plus the block's mutation if it has one.
#[derive(Debug, Default)]
pub struct Arguments {
    pub values: VecMap<CompactString, Value>,
    /// Entity ids for fields that reference variables, lists, or broadcasts.
    pub field_ids: VecMap<CompactString, CompactString>,
    pub mutation: Option<Mutation>,
}
impl Arguments {
    /// Gets the referenced entity id of a field, if the field has one.
    pub fn field_id(&self, name: &str) -> Option<&str> {
        self.field_ids.get(name).map(|x| x.as_str())
    }
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
    /// Gets an argument as a number, treating a missing argument as `0`.
    pub fn number(&self, name: &str) -> f64 {
        self.values.get(name).map(Value::as_number).unwrap_or(0.0)
    }
    /// Gets an argument as text, treating a missing argument as empty.
    pub fn text(&self, name: &str) -> CompactString {
        self.values.get(name).map(Value::as_text).unwrap_or_default()
    }
    /// Gets an argument as a bool, treating a missing argument as false.
    /// Empty boolean input slots evaluate to false.
    pub fn bool(&self, name: &str) -> bool {
        self.values.get(name).map(Value::as_bool).unwrap_or(false)
    }
    /// Gets a 1-based index argument, truncated.
    pub fn index(&self, name: &str) -> f64 {
        self.values.get(name).map(Value::as_index).unwrap_or(0.0)
    }
}

/// The dispatch table mapping opcodes to handlers. Owned per runtime.
#[derive(Debug, Default)]
pub struct PrimitiveTable {
    entries: VecMap<CompactString, Rc<BlockInfo>>,
}
impl PrimitiveTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }
    /// A table populated with the native block libraries.
    pub fn with_natives() -> Self {
        let mut table = Self::new();
        natives::register_all(&mut table);
        table
    }
    /// Registers a handler. A later registration for the same opcode
    /// replaces the earlier one.
    pub fn register(&mut self, info: BlockInfo) {
        self.entries.insert(info.opcode.clone(), Rc::new(info));
    }
    pub fn get(&self, opcode: &str) -> Option<&Rc<BlockInfo>> {
        self.entries.get(opcode)
    }
    pub fn contains(&self, opcode: &str) -> bool {
        self.entries.contains_key(opcode)
    }
}

/// The execution context handed to block handlers: the thread being stepped,
/// the runtime it belongs to, and the id of the block being executed.
pub struct BlockUtility<'a> {
    pub runtime: &'a mut Runtime,
    pub thread: &'a mut Thread,
    pub current_block: BlockId,
}
impl<'a> BlockUtility<'a> {
    /// The target this thread runs on.
    pub fn target(&self) -> Rc<std::cell::RefCell<Target>> {
        self.thread.target.clone()
    }
    /// The stage target, if a project is loaded.
    pub fn stage(&self) -> Option<Rc<std::cell::RefCell<Target>>> {
        self.runtime.stage()
    }
    /// Read access to the input devices.
    pub fn io(&self) -> &crate::io::Io {
        &self.runtime.io
    }
    /// Notifies the renderer that the thread's target changed visually and
    /// requests a redraw.
    pub fn target_updated(&mut self) {
        let target = self.thread.target.clone();
        self.runtime.renderer.target_updated(&target.borrow());
        self.runtime.request_redraw();
    }
    /// The frame of the block being executed, for private block state.
    pub fn stack_frame(&mut self) -> &mut crate::thread::StackFrame {
        // a thread mid-execution always has a frame for the current block
        self.thread.top_frame_mut().unwrap()
    }
    /// True when any enclosing frame runs without screen refresh.
    pub fn warp_mode(&self) -> bool {
        self.thread.top_frame().map(|f| f.warp_mode).unwrap_or(false)
    }
    /// Gives up the rest of this pass; the thread stays eligible for later
    /// passes of the same tick.
    pub fn yield_(&mut self) {
        if self.thread.status == ThreadStatus::Running {
            self.thread.status = ThreadStatus::Yield;
        }
    }
    /// Parks the thread until the first pass of the next tick.
    pub fn yield_tick(&mut self) {
        if self.thread.status == ThreadStatus::Running {
            self.thread.status = ThreadStatus::YieldTick;
        }
    }
    /// Enters a branch of the current block. With `is_loop` the current
    /// frame is marked so the block re-executes when the branch finishes.
    /// Entering a missing loop branch yields instead, so empty loops still
    /// spin cooperatively.
    pub fn start_branch(&mut self, branch_num: usize, is_loop: bool) {
        let branch = self.thread.blocks.branch(&self.current_block, branch_num).cloned();
        if let Some(frame) = self.thread.top_frame_mut() {
            frame.is_loop = is_loop;
        }
        match branch {
            Some(branch) => self.thread.push_stack(branch),
            None => {
                if is_loop {
                    self.yield_();
                }
            }
        }
    }
    /// Calls a custom procedure by pushing its definition onto the stack.
    /// The parameters are recorded on the calling block's frame, which
    /// outlives every frame of the procedure body.
    pub fn start_procedure(&mut self, definition_id: BlockId, params: VecMap<CompactString, Value>, warp: bool) {
        if let Some(frame) = self.thread.top_frame_mut() {
            frame.params = Some(params);
        }
        self.thread.push_stack(definition_id);
        if warp {
            if let Some(frame) = self.thread.top_frame_mut() {
                frame.warp_mode = true;
            }
            if self.thread.warp_timer.is_none() {
                self.thread.warp_timer = Some(crate::util::Timer::start());
            }
        }
    }
    /// Asks the embedder to redraw before the next tick. This also ends the
    /// current tick's multi-pass loop, which is what paces frame-locked
    /// loops to one iteration per tick.
    pub fn request_redraw(&mut self) {
        self.runtime.request_redraw();
    }
}
