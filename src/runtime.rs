//! The runtime: targets, threads, dispatch table, io devices, and the
//! per-tick driver.
//!
//! A [`Runtime`] is the root object an embedder holds. It owns everything a
//! running program needs, so two runtimes in one process are fully isolated,
//! including their primitive tables and any extensions registered on them.
//! The embedder calls [`Runtime::step`] once per frame; everything else
//! (events, input, hats) is fed in between steps or from inside handlers.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;

use crate::blocks::BlockId;
use crate::compiler::CompileCache;
use crate::execute;
use crate::extensions::{ExtensionInfo, ExtensionRegistry};
use crate::io::{normalize_key, Io};
use crate::natives;
use crate::primitives::{BlockType, HandlerFn, PrimitiveTable};
use crate::sequencer::{self, Sequencer};
use crate::system::{DefaultSecurityManager, MemoryStorage, NullRenderer, Renderer, SecurityManager, Storage};
use crate::target::Target;
use crate::thread::{PendingKind, Thread, ThreadStatus};
use crate::value::Value;
use crate::vecmap::VecMap;

/// Default stage dimensions, in stage units.
pub const STAGE_WIDTH: f64 = 480.0;
pub const STAGE_HEIGHT: f64 = 360.0;

/// The most clones that may exist at once across all sprites.
pub const MAX_CLONES: usize = 300;

/// A runtime fault raised by a block handler. Faults kill the reporting
/// thread only; the rest of the program keeps running.
#[derive(Debug)]
pub enum ErrorCause {
    /// A failure reported by an extension or addon block handler.
    Custom { description: String },
}
impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorCause::Custom { description } => write!(f, "{description}"),
        }
    }
}
impl std::error::Error for ErrorCause {}
impl From<String> for ErrorCause {
    fn from(description: String) -> Self {
        ErrorCause::Custom { description }
    }
}
impl From<&str> for ErrorCause {
    fn from(description: &str) -> Self {
        ErrorCause::Custom { description: description.into() }
    }
}

/// Observable happenings, queued on the runtime and drained by the embedder
/// with [`Runtime::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// Fired just before the threads of a tick are stepped.
    BeforeExecute,
    /// Fired after the threads of a tick were stepped.
    AfterExecute,
    /// A say or think bubble changed.
    Say { target: CompactString, think: bool, message: CompactString },
    /// A stack-clicked reporter produced a value.
    VisualReport { block_id: BlockId, value: Value },
    /// A script could not be compiled and fell back to the interpreter.
    CompileError { target: CompactString, message: String },
    /// A block handler faulted and its thread was stopped.
    ScriptError { block_id: BlockId, message: String },
}

/// A stage monitor for a reporter block.
#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    pub id: CompactString,
    pub opcode: CompactString,
    /// `None` for global monitors.
    pub sprite_name: Option<CompactString>,
    pub value: Value,
    pub visible: bool,
}

/// A runtime-supplied override for custom procedure calls matching a
/// proccode, used by embedder addons to hook project-defined procedures.
pub struct AddonBlock {
    pub proccode: CompactString,
    /// Declared argument names, positionally matched to the procedure's
    /// argument ids.
    pub arguments: Vec<CompactString>,
    pub hidden: bool,
    pub func: HandlerFn,
}

pub struct Runtime {
    /// All targets, stage first, in project file order. Clones are inserted
    /// directly after their original.
    pub targets: Vec<Rc<RefCell<Target>>>,
    /// Live threads in creation order.
    pub threads: Vec<Rc<RefCell<Thread>>>,
    pub primitives: PrimitiveTable,
    pub extensions: ExtensionRegistry,
    pub io: Io,
    pub renderer: Box<dyn Renderer>,
    pub storage: Box<dyn Storage>,
    pub security: Box<dyn SecurityManager>,
    pub turbo_mode: bool,
    pub stage_width: f64,
    pub stage_height: f64,

    addon_blocks: VecMap<CompactString, AddonBlock>,
    monitors: VecMap<CompactString, Monitor>,
    events: Vec<RuntimeEvent>,
    redraw_requested: bool,
    frame_interval_ms: f64,
    compiler_enabled: bool,
    /// Stored predicate values for edge-activated hats, keyed by target
    /// identity and hat block id.
    edge_memory: VecMap<(usize, BlockId), bool>,

    pub(crate) compile_cache: CompileCache,
    /// The thread currently being stepped; its cell is mutably borrowed, so
    /// thread-list walks must skip it and interact through the flags below.
    pub(crate) active_thread: Option<Rc<RefCell<Thread>>>,
    /// Identity of the active thread's script, readable while the thread
    /// cell is borrowed.
    pub(crate) active_script: Option<(usize, BlockId)>,
    restart_active: bool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A runtime with the native block libraries, no targets, and do-nothing
    /// collaborators.
    pub fn new() -> Self {
        Self {
            targets: vec![],
            threads: vec![],
            primitives: PrimitiveTable::with_natives(),
            extensions: ExtensionRegistry::default(),
            io: Io::default(),
            renderer: Box::new(NullRenderer),
            storage: Box::new(MemoryStorage::default()),
            security: Box::new(DefaultSecurityManager),
            turbo_mode: false,
            stage_width: STAGE_WIDTH,
            stage_height: STAGE_HEIGHT,
            addon_blocks: VecMap::new(),
            monitors: VecMap::new(),
            events: vec![],
            redraw_requested: false,
            frame_interval_ms: 1000.0 / 30.0,
            compiler_enabled: true,
            edge_memory: VecMap::new(),
            compile_cache: CompileCache::default(),
            active_thread: None,
            active_script: None,
            restart_active: false,
        }
    }

    pub fn stage(&self) -> Option<Rc<RefCell<Target>>> {
        self.targets.iter().find(|t| t.borrow().is_stage).cloned()
    }
    /// Finds an original (non-clone) sprite by name.
    pub fn sprite_by_name(&self, name: &str) -> Option<Rc<RefCell<Target>>> {
        self.targets
            .iter()
            .find(|t| {
                let t = t.borrow();
                !t.is_stage && t.is_original && t.name == name
            })
            .cloned()
    }

    /// Sets the target framerate; the tick work budget derives from it.
    pub fn set_framerate(&mut self, fps: f64) {
        if fps > 0.0 {
            self.frame_interval_ms = 1000.0 / fps;
        }
    }
    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_interval_ms
    }
    pub fn set_turbo_mode(&mut self, on: bool) {
        self.turbo_mode = on;
    }
    /// Selects the execution path for threads started from now on.
    pub fn set_compiler_enabled(&mut self, on: bool) {
        self.compiler_enabled = on;
    }
    pub fn compiler_enabled(&self) -> bool {
        self.compiler_enabled
    }

    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }
    pub fn redraw_requested(&self) -> bool {
        self.redraw_requested
    }

    pub fn post_event(&mut self, event: RuntimeEvent) {
        self.events.push(event);
    }
    /// Drains the queued events in posting order.
    pub fn take_events(&mut self) -> Vec<RuntimeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Adds a monitor if none with the same id exists yet.
    pub fn request_add_monitor(&mut self, monitor: Monitor) {
        if !self.monitors.contains_key(monitor.id.as_str()) {
            self.monitors.insert(monitor.id.clone(), monitor);
        }
    }
    pub fn monitors(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.values()
    }

    /// Registers an extension's blocks into this runtime's dispatch table
    /// under namespaced opcodes.
    pub fn register_extension(&mut self, info: ExtensionInfo) {
        self.extensions.install(info, &mut self.primitives);
    }
    /// Installs a procedure override. All `procedures_call` blocks whose
    /// proccode matches run the addon's handler instead of the project's
    /// definition, on both execution paths.
    pub fn add_addon_block(&mut self, block: AddonBlock) {
        self.addon_blocks.insert(block.proccode.clone(), block);
    }
    pub(crate) fn addon_block(&self, proccode: &str) -> Option<&AddonBlock> {
        self.addon_blocks.get(proccode)
    }

    pub(crate) fn edge_update(&mut self, target: &Rc<RefCell<Target>>, block_id: &BlockId, value: bool) -> bool {
        let key = (Rc::as_ptr(target) as usize, block_id.clone());
        self.edge_memory.insert(key, value).unwrap_or(false)
    }

    pub(crate) fn restart_active(&self) -> bool {
        self.restart_active
    }
    pub(crate) fn take_restart_active(&mut self) -> bool {
        std::mem::replace(&mut self.restart_active, false)
    }

    /// Creates a thread at `top_block` and queues it for stepping.
    pub fn push_thread(&mut self, target: Rc<RefCell<Target>>, top_block: BlockId, stack_click: bool) -> Rc<RefCell<Thread>> {
        let mut thread = Thread::new(target, top_block);
        thread.stack_click = stack_click;
        thread.compiled = self.compiler_enabled;
        let rc = Rc::new(RefCell::new(thread));
        self.threads.push(rc.clone());
        rc
    }

    fn find_existing(&self, target: &Rc<RefCell<Target>>, top_block: &BlockId) -> Option<ExistingThread> {
        if let Some((ptr, block)) = &self.active_script {
            if *ptr == Rc::as_ptr(target) as usize && block == top_block {
                return Some(ExistingThread::Active);
            }
        }
        for t in &self.threads {
            if let Ok(thread) = t.try_borrow() {
                if !thread.is_done()
                    && !thread.stack_click
                    && thread.top_block == *top_block
                    && Rc::ptr_eq(&thread.target, target)
                {
                    return Some(ExistingThread::Other(t.clone()));
                }
            }
        }
        None
    }

    /// Starts the scripts under every matching hat block, scanning targets
    /// in reverse order. `match_fields` filters scripts by hat field values;
    /// every given field must match (case-insensitively). Returns the
    /// threads started or restarted.
    pub fn start_hats(
        &mut self,
        opcode: &str,
        match_fields: &[(&str, &Value)],
        target_filter: Option<&Rc<RefCell<Target>>>,
    ) -> Vec<Rc<RefCell<Thread>>> {
        let Some(info) = self.primitives.get(opcode).cloned() else {
            return vec![];
        };
        if !matches!(info.block_type, BlockType::Hat | BlockType::Event) {
            return vec![];
        }
        let mut started = vec![];
        let targets: Vec<_> = self.targets.iter().rev().cloned().collect();
        for target in targets {
            if let Some(filter) = target_filter {
                if !Rc::ptr_eq(filter, &target) {
                    continue;
                }
            }
            let blocks = target.borrow().blocks.clone();
            let mut roots = vec![];
            for (id, block) in blocks.script_roots() {
                if block.opcode != opcode {
                    continue;
                }
                let matched = match_fields.iter().all(|&(field_name, field_value)| {
                    block
                        .fields
                        .get(field_name)
                        .map(|f| f.value.compare(field_value) == Ordering::Equal)
                        .unwrap_or(false)
                });
                if !matched {
                    continue;
                }
                roots.push(id.clone());
            }
            for root in roots {
                match self.find_existing(&target, &root) {
                    Some(ExistingThread::Active) => {
                        if info.restart_existing_threads {
                            self.restart_active = true;
                        }
                        continue;
                    }
                    Some(ExistingThread::Other(existing)) => {
                        if info.restart_existing_threads {
                            existing.borrow_mut().restart();
                            started.push(existing);
                        }
                        continue;
                    }
                    None => {}
                }
                let run_predicate_now = info.block_type == BlockType::Hat
                    && !info.edge_activated
                    && blocks
                        .get(&root)
                        .map(|b| execute::has_only_immediate_inputs(b, &blocks))
                        .unwrap_or(false);
                let thread_rc = self.push_thread(target.clone(), root.clone(), false);
                if run_predicate_now {
                    // predicates over constant inputs are decided on the
                    // spot; the body still waits for the next tick
                    let keep = {
                        let mut thread = thread_rc.borrow_mut();
                        execute::execute_block(self, &mut thread, &root);
                        if thread.status == ThreadStatus::Running && thread.peek_stack() == Some(&root) {
                            sequencer::proceed(&mut thread);
                        }
                        !thread.is_done()
                    };
                    if keep {
                        started.push(thread_rc);
                    } else {
                        self.threads.retain(|t| !Rc::ptr_eq(t, &thread_rc));
                    }
                } else {
                    started.push(thread_rc);
                }
            }
        }
        started
    }

    /// Stops everything and fires the flag-clicked hats.
    pub fn green_flag(&mut self) {
        self.stop_all();
        self.io.timer.reset();
        self.start_hats("event_whenflagclicked", &[], None);
    }

    /// Retires every thread and disposes all clones. The currently active
    /// thread (when called from inside a block) must stop itself.
    pub fn stop_all(&mut self) {
        for t in &self.threads {
            if let Ok(mut thread) = t.try_borrow_mut() {
                thread.retire();
            }
        }
        self.threads.retain(|t| match t.try_borrow() {
            Ok(thread) => !thread.is_done(),
            Err(_) => true,
        });
        self.targets.retain(|t| t.borrow().is_original);
    }

    /// Retires all threads running on `target`, except the active one.
    pub fn stop_target_threads(&mut self, target: &Rc<RefCell<Target>>) {
        for t in &self.threads {
            if let Ok(mut thread) = t.try_borrow_mut() {
                if Rc::ptr_eq(&thread.target, target) {
                    thread.retire();
                }
            }
        }
    }

    /// Makes a clone of `source`, inserts it behind the original, and fires
    /// its start-as-clone hats. Returns `None` once the clone cap is hit.
    pub fn spawn_clone(&mut self, source: &Rc<RefCell<Target>>) -> Option<Rc<RefCell<Target>>> {
        let clone_count = self.targets.iter().filter(|t| !t.borrow().is_original).count();
        if clone_count >= MAX_CLONES {
            return None;
        }
        let clone = Rc::new(RefCell::new(source.borrow().make_clone()));
        let index = self
            .targets
            .iter()
            .position(|t| Rc::ptr_eq(t, source))
            .map(|i| i + 1)
            .unwrap_or(self.targets.len());
        self.targets.insert(index, clone.clone());
        self.start_hats("control_start_as_clone", &[], Some(&clone));
        Some(clone)
    }

    /// Removes a clone and stops its threads. Originals are never removed.
    pub fn remove_clone(&mut self, target: &Rc<RefCell<Target>>) {
        if target.borrow().is_original {
            return;
        }
        self.stop_target_threads(target);
        self.targets.retain(|t| !Rc::ptr_eq(t, target));
    }

    /// Feeds a key press and fires the matching key hats.
    pub fn post_key_down(&mut self, raw_key: &str) {
        let key = normalize_key(raw_key);
        self.io.keyboard.press(key.clone());
        self.start_hats("event_whenkeypressed", &[("KEY_OPTION", &Value::from(key))], None);
        self.start_hats("event_whenkeypressed", &[("KEY_OPTION", &Value::from("any"))], None);
    }
    pub fn post_key_up(&mut self, raw_key: &str) {
        let key = normalize_key(raw_key);
        self.io.keyboard.release(&key);
    }
    pub fn post_mouse_move(&mut self, x: f64, y: f64) {
        self.io.mouse.x = x;
        self.io.mouse.y = y;
    }
    pub fn post_mouse_down(&mut self, down: bool) {
        self.io.mouse.down = down;
    }
    /// Wheel scrolling acts as presses of the up and down arrow keys.
    pub fn post_mouse_wheel(&mut self, delta_y: f64) {
        let key = if delta_y < 0.0 { "up arrow" } else { "down arrow" };
        self.start_hats("event_whenkeypressed", &[("KEY_OPTION", &Value::from(key))], None);
    }

    /// Runs one tick: resolve finished waits, scan edge hats, then step all
    /// threads between the before/after events.
    pub fn step(&mut self) {
        self.redraw_requested = false;
        self.resolve_pending();
        self.scan_edge_hats();
        self.post_event(RuntimeEvent::BeforeExecute);
        let mut sequencer = Sequencer::new();
        sequencer.step_threads(self);
        self.refresh_monitors();
        self.post_event(RuntimeEvent::AfterExecute);
    }

    /// Re-reads the value behind every visible monitor.
    fn refresh_monitors(&mut self) {
        let mut updates = vec![];
        for (id, monitor) in self.monitors.iter() {
            if !monitor.visible {
                continue;
            }
            let target = match &monitor.sprite_name {
                Some(name) => self.sprite_by_name(name),
                None => self.stage(),
            };
            let Some(target) = target else { continue };
            let target = target.borrow();
            let value = if monitor.opcode == "data_variable" {
                target.variables.get(id.as_str()).map(|v| v.value.clone())
            } else {
                natives::motion::monitor_value(&monitor.opcode, &target)
            };
            if let Some(value) = value {
                updates.push((id.clone(), value));
            }
        }
        for (id, value) in updates {
            if let Some(monitor) = self.monitors.get_mut(&id) {
                monitor.value = value;
            }
        }
    }

    /// Observes promise resolutions and manual resumptions. Runs at the top
    /// of a tick only, so a resolution is never acted on in the tick that
    /// produced it.
    fn resolve_pending(&mut self) {
        let threads: Vec<_> = self.threads.clone();
        for thread_rc in threads {
            let mut thread = thread_rc.borrow_mut();
            match thread.status {
                ThreadStatus::PromiseWait => {
                    let Some(pending) = thread.pending.clone() else { continue };
                    // no promise recorded: resumable only by an external
                    // status write
                    let Some(promise) = pending.promise else { continue };
                    let Some(value) = promise.poll() else { continue };
                    thread.pending = None;
                    self.deliver(&mut thread, pending.kind, value);
                }
                ThreadStatus::Running if thread.pending.is_some() => {
                    thread.pending = None;
                    sequencer::proceed(&mut thread);
                }
                _ => {}
            }
        }
    }

    fn deliver(&mut self, thread: &mut Thread, kind: PendingKind, value: Value) {
        match kind {
            PendingKind::Input(block_id) => {
                if let Some(frame) = thread.top_frame_mut() {
                    frame.reported.insert(block_id, value);
                }
                thread.status = ThreadStatus::Running;
            }
            PendingKind::Block => {
                thread.status = ThreadStatus::Running;
                let Some(current) = thread.peek_stack().cloned() else {
                    thread.retire();
                    return;
                };
                let block_type = thread
                    .blocks
                    .get(&current)
                    .and_then(|b| self.primitives.get(&b.opcode))
                    .map(|i| i.block_type);
                match block_type {
                    Some(BlockType::Conditional) => {
                        let branch = value.as_number();
                        if branch >= 1.0 {
                            execute::enter_branch(thread, &current, branch as usize, false);
                            return;
                        }
                    }
                    Some(BlockType::Loop) => {
                        if value.as_bool() {
                            execute::enter_branch(thread, &current, 1, true);
                            return;
                        }
                    }
                    _ => {
                        if thread.stack_click && thread.stack_depth() == 1 {
                            self.post_event(RuntimeEvent::VisualReport {
                                block_id: current.clone(),
                                value,
                            });
                        }
                    }
                }
                sequencer::proceed(thread);
            }
            PendingKind::HatPredicate => {
                if value.as_bool() || thread.stack_click {
                    thread.status = ThreadStatus::Running;
                    sequencer::proceed(thread);
                } else {
                    thread.retire();
                }
            }
        }
    }

    /// Starts threads for edge-activated hat scripts that are not already
    /// running; the predicate itself runs as the thread's first block and
    /// retires the thread unless it sees a rising edge.
    fn scan_edge_hats(&mut self) {
        let targets: Vec<_> = self.targets.iter().rev().cloned().collect();
        for target in targets {
            let blocks = target.borrow().blocks.clone();
            let mut roots = vec![];
            for (id, block) in blocks.script_roots() {
                let is_edge_hat = self
                    .primitives
                    .get(&block.opcode)
                    .map(|i| i.block_type == BlockType::Hat && i.edge_activated)
                    .unwrap_or(false);
                if is_edge_hat {
                    roots.push(id.clone());
                }
            }
            for root in roots {
                if self.find_existing(&target, &root).is_some() {
                    continue;
                }
                self.push_thread(target.clone(), root, false);
            }
        }
    }
}

enum ExistingThread {
    /// The thread currently being stepped (its cell is borrowed).
    Active,
    Other(Rc<RefCell<Thread>>),
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("targets", &self.targets.len())
            .field("threads", &self.threads.len())
            .field("turbo_mode", &self.turbo_mode)
            .field("frame_interval_ms", &self.frame_interval_ms)
            .field("compiler_enabled", &self.compiler_enabled)
            .finish_non_exhaustive()
    }
}
