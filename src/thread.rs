//! Threads: one live activation of a script.
//!
//! A thread is an explicit stack of block ids plus a parallel stack of
//! frames holding per-activation state (loop membership, warp mode,
//! procedure parameters, cached reporter results, and private block state).
//! The sequencer advances threads cooperatively; a thread never runs past a
//! yield point within one pass.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;

use crate::blocks::{BlockId, Blocks};
use crate::target::Target;
use crate::util::Timer;
use crate::value::Value;
use crate::vecmap::VecMap;

/// The scheduling state of a thread, inspected by the sequencer between
/// block executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Eligible to run.
    Running,
    /// Gave up the rest of this pass but may run again later in the same
    /// tick (on a subsequent pass).
    Yield,
    /// Parked until the first pass of the next tick.
    YieldTick,
    /// Blocked on an asynchronous completion.
    PromiseWait,
    /// Finished; will be removed from the scheduler.
    Done,
}

/// A one-shot completion slot handed to asynchronous block implementations.
/// The sequencer polls outstanding promises at the start of each tick, so a
/// resolution is always observed on a later tick than the one it happened in.
#[derive(Debug, Clone, Default)]
pub struct Promise(Rc<RefCell<Option<Value>>>);
impl Promise {
    pub fn new() -> Self {
        Self::default()
    }
    /// Resolves the promise with the given report value. Later resolutions
    /// of an already-resolved promise are ignored.
    pub fn resolve(&self, value: Value) {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    /// Takes the resolved value, if any.
    pub fn poll(&self) -> Option<Value> {
        self.0.borrow_mut().take()
    }
    pub fn is_resolved(&self) -> bool {
        self.0.borrow().is_some()
    }
}

/// What a suspended thread was doing when its block returned a promise,
/// which determines where the resolved value is delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingKind {
    /// A reporter feeding the named input slot of the block at the top of
    /// the stack; the resolved value lands in the frame's reported cache.
    Input(BlockId),
    /// A stack block; the resolved value is discarded (or surfaced as a
    /// visual report for stack clicks) and the thread advances past it.
    Block,
    /// A hat predicate; a truthy resolution starts the body on the next
    /// tick and a falsy one retires the thread.
    HatPredicate,
}

/// An outstanding asynchronous wait. `promise` is `None` when a block set
/// the thread's status to the waiting state without handing back a promise,
/// in which case only an external status change can resume it.
#[derive(Debug, Clone)]
pub struct PendingWait {
    pub promise: Option<Promise>,
    pub kind: PendingKind,
}

/// Per-activation state paired with one entry of the block-id stack.
#[derive(Default)]
pub struct StackFrame {
    /// Set when the frame belongs to a loop block, which re-enters itself
    /// instead of popping when its branch finishes.
    pub is_loop: bool,
    /// Run-without-screen-refresh mode, inherited by nested frames.
    pub warp_mode: bool,
    /// Procedure call parameters, present on procedure call frames.
    pub params: Option<VecMap<CompactString, Value>>,
    /// Reporter results already computed for the current block's inputs.
    /// Lets argument evaluation resume after a suspension without
    /// re-running completed reporters.
    pub reported: VecMap<BlockId, Value>,
    /// Private state a block implementation keeps across re-entries
    /// (loop counters, glide trajectories, wait deadlines).
    pub state: Option<Box<dyn Any>>,
}
impl StackFrame {
    /// Gets the frame's private state, initializing it with `init` on first
    /// access. Re-entry with a different type resets the state.
    pub fn state_or_init<T: Any>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        let fresh = !matches!(&self.state, Some(s) if s.is::<T>());
        if fresh {
            self.state = Some(Box::new(init()));
        }
        self.state.as_mut().unwrap().downcast_mut::<T>().unwrap()
    }
    /// Resets everything except warp mode, for reusing the frame when
    /// stepping to the next block in sequence.
    pub fn reuse(&mut self) {
        self.is_loop = false;
        self.params = None;
        self.reported.clear();
        self.state = None;
    }
}

/// One live activation of a script.
pub struct Thread {
    pub target: Rc<RefCell<Target>>,
    /// The target's block graph, shared so the sequencer can walk it without
    /// borrowing the target.
    pub blocks: Rc<Blocks>,
    /// The hat or top block this thread started from.
    pub top_block: BlockId,
    pub status: ThreadStatus,
    stack: Vec<BlockId>,
    frames: Vec<StackFrame>,
    /// The outstanding asynchronous wait while status is the waiting state.
    pub pending: Option<PendingWait>,
    /// Running while any enclosing frame is in warp mode; checked against
    /// the warp time limit to force a periodic yield.
    pub warp_timer: Option<Timer>,
    /// Started by clicking a script in the editor. Hat return values are
    /// ignored and stack reporters surface their report visually.
    pub stack_click: bool,
    /// Runs through the pre-resolved direct-call path when set. Cleared for
    /// the rest of the thread's life if its script fails to compile.
    pub compiled: bool,
}
impl Thread {
    pub fn new(target: Rc<RefCell<Target>>, top_block: BlockId) -> Self {
        let blocks = target.borrow().blocks.clone();
        let mut thread = Self {
            target,
            blocks,
            top_block: top_block.clone(),
            status: ThreadStatus::Running,
            stack: vec![],
            frames: vec![],
            pending: None,
            warp_timer: None,
            stack_click: false,
            compiled: false,
        };
        thread.push_stack(top_block);
        thread
    }

    pub fn push_stack(&mut self, block_id: BlockId) {
        let warp_mode = self.frames.last().map(|f| f.warp_mode).unwrap_or(false);
        self.stack.push(block_id);
        self.frames.push(StackFrame { warp_mode, ..Default::default() });
    }
    pub fn pop_stack(&mut self) -> Option<BlockId> {
        self.frames.pop();
        self.stack.pop()
    }
    /// Replaces the block at the top of the stack, keeping the frame but
    /// clearing its per-block state.
    pub fn reuse_stack(&mut self, block_id: BlockId) {
        match (self.stack.last_mut(), self.frames.last_mut()) {
            (Some(top), Some(frame)) => {
                *top = block_id;
                frame.reuse();
            }
            _ => self.push_stack(block_id),
        }
    }
    pub fn peek_stack(&self) -> Option<&BlockId> {
        self.stack.last()
    }
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }
    pub fn top_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }
    pub fn top_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Resolves a procedure parameter by walking call frames outward.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.params.as_ref()?.get(name))
    }
    /// True if a frame for the given procedure call block is already on the
    /// stack, which is how recursion is detected for yield insertion.
    pub fn is_recursive_call(&self, definition_id: &str) -> bool {
        // skip the frame currently being pushed for this call
        self.stack.iter().rev().skip(1).any(|id| id == definition_id)
    }

    /// Rewinds the thread to its top block, discarding all in-flight state.
    pub fn restart(&mut self) {
        let top = self.top_block.clone();
        self.stack.clear();
        self.frames.clear();
        self.pending = None;
        self.warp_timer = None;
        self.status = ThreadStatus::Running;
        self.push_stack(top);
    }

    /// Marks the thread finished. The scheduler drops it at the next sweep.
    pub fn retire(&mut self) {
        self.status = ThreadStatus::Done;
        self.stack.clear();
        self.frames.clear();
        self.pending = None;
    }
    pub fn is_done(&self) -> bool {
        self.status == ThreadStatus::Done
    }
}
