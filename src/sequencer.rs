//! The cooperative scheduler.
//!
//! One call to [`Sequencer::step_threads`] is one tick. Within a tick the
//! sequencer makes repeated passes over the live thread list, stepping each
//! eligible thread up to its next yield point, until no thread is still
//! eligible, the work-time budget (a fraction of the frame interval) runs
//! out, or a redraw has been requested (ignored in turbo mode). Threads
//! parked across ticks resume on the first pass only, so a tick boundary is
//! observable to them exactly once.

use std::cell::RefCell;
use std::rc::Rc;

use crate::execute;
use crate::runtime::Runtime;
use crate::thread::{Thread, ThreadStatus};
use crate::util::Timer;

/// Portion of the frame interval a tick may spend stepping threads.
pub const WORK_TIME_FRACTION: f64 = 0.75;
/// How long a warp-mode frame may run before being forced to yield.
pub const WARP_TIME_MS: f64 = 500.0;

/// Per-tick stepping state. A fresh sequencer is made for every tick.
pub struct Sequencer {
    timer: Timer,
}
impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}
impl Sequencer {
    pub fn new() -> Self {
        Self { timer: Timer::start() }
    }

    /// Runs one tick over the runtime's threads. Returns the threads that
    /// finished during the tick.
    pub fn step_threads(&mut self, runtime: &mut Runtime) -> Vec<Rc<RefCell<Thread>>> {
        let work_time = WORK_TIME_FRACTION * runtime.frame_interval_ms();
        self.timer.reset();
        let mut ran_first_pass = false;
        let mut done_threads = vec![];
        loop {
            let mut num_active = 0;
            // index-based so threads spawned mid-pass run in the same pass
            let mut i = 0;
            while i < runtime.threads.len() {
                let thread_rc = runtime.threads[i].clone();
                i += 1;
                let mut thread = thread_rc.borrow_mut();
                if thread.is_done() {
                    continue;
                }
                if thread.status == ThreadStatus::YieldTick && !ran_first_pass {
                    thread.status = ThreadStatus::Running;
                }
                if matches!(thread.status, ThreadStatus::Running | ThreadStatus::Yield) {
                    runtime.active_thread = Some(thread_rc.clone());
                    runtime.active_script =
                        Some((Rc::as_ptr(&thread.target) as usize, thread.top_block.clone()));
                    self.step_thread(runtime, &mut thread);
                    runtime.active_thread = None;
                    runtime.active_script = None;
                    if runtime.take_restart_active() {
                        thread.restart();
                    }
                }
                if thread.status == ThreadStatus::Running {
                    num_active += 1;
                }
            }
            runtime.threads.retain(|t| {
                let done = t.borrow().is_done();
                if done {
                    done_threads.push(t.clone());
                }
                !done
            });
            ran_first_pass = true;
            if runtime.threads.is_empty() || num_active == 0 {
                break;
            }
            if self.timer.elapsed_ms() >= work_time {
                break;
            }
            if runtime.redraw_requested() && !runtime.turbo_mode {
                break;
            }
        }
        done_threads
    }

    /// Steps one thread up to its next yield point.
    fn step_thread(&mut self, runtime: &mut Runtime, thread: &mut Thread) {
        if thread.top_frame().map(|f| f.warp_mode).unwrap_or(false) {
            thread.warp_timer = Some(Timer::start());
        }
        loop {
            let Some(current) = thread.peek_stack().cloned() else {
                thread.retire();
                return;
            };
            execute::execute_block(runtime, thread, &current);
            if runtime.restart_active() {
                return;
            }
            match thread.status {
                ThreadStatus::Yield => {
                    thread.status = ThreadStatus::Running;
                    if thread.top_frame().map(|f| f.warp_mode).unwrap_or(false) {
                        let timer = thread.warp_timer.get_or_insert_with(Timer::start);
                        if timer.elapsed_ms() < WARP_TIME_MS {
                            continue;
                        }
                    }
                    return;
                }
                ThreadStatus::PromiseWait | ThreadStatus::YieldTick | ThreadStatus::Done => return,
                ThreadStatus::Running => {}
            }
            // advance if the block left the stack where it was
            if thread.peek_stack() == Some(&current) {
                match proceed(thread) {
                    Advance::Continue => {}
                    Advance::EndPass => return,
                }
            }
        }
    }
}

pub(crate) enum Advance {
    /// The stack top changed and stepping may continue in this pass.
    Continue,
    /// The thread is at a pass boundary (loop re-entry or retirement).
    EndPass,
}

/// Moves the thread past the block at the top of its stack: to the next
/// block in sequence, or up through finished substacks. A loop frame is a
/// pass boundary: the loop block re-executes next pass (immediately when
/// warping and the warp timer has time left).
pub(crate) fn proceed(thread: &mut Thread) -> Advance {
    let Some(current) = thread.peek_stack().cloned() else {
        thread.retire();
        return Advance::EndPass;
    };
    if let Some(next) = thread.blocks.next(&current).cloned() {
        thread.reuse_stack(next);
        return Advance::Continue;
    }
    loop {
        thread.pop_stack();
        let Some(top) = thread.peek_stack().cloned() else {
            thread.retire();
            return Advance::EndPass;
        };
        let frame = thread.top_frame().unwrap();
        if frame.is_loop {
            if frame.warp_mode {
                let expired = thread
                    .warp_timer
                    .as_ref()
                    .map(|t| t.elapsed_ms() >= WARP_TIME_MS)
                    .unwrap_or(false);
                if !expired {
                    return Advance::Continue;
                }
            }
            return Advance::EndPass;
        }
        if let Some(next) = thread.blocks.next(&top).cloned() {
            thread.reuse_stack(next);
            return Advance::Continue;
        }
    }
}
