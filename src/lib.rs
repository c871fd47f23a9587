//! A virtual machine for running block-based visual programs stored in the
//! sb3 container format.
//!
//! The execution model is cooperative: every script is a [`thread::Thread`]
//! (an explicit stack of block ids plus per-activation scratch state) and a
//! [`sequencer::Sequencer`] advances all active threads once per tick under a
//! time budget. Blocks are dispatched through a [`primitives::PrimitiveTable`]
//! which native block libraries and runtime-registered extensions both feed.
//! Scripts can run through the tree-walking interpreter ([`execute`]) or a
//! pre-resolved direct-call fast path ([`compiler`]); both drive the same
//! thread state machine and may interleave within one stack.
//!
//! Rendering, asset storage, and extension transport are external
//! collaborators behind the narrow traits in [`system`].
#![forbid(unsafe_code)]

pub mod blocks;
pub mod compiler;
pub mod compress;
pub mod execute;
pub mod extensions;
pub mod io;
pub mod primitives;
pub mod project;
pub mod runtime;
pub mod sequencer;
pub mod system;
pub mod target;
pub mod thread;
pub mod util;
pub mod value;
pub mod vecmap;

mod natives;

#[cfg(test)]
mod test;
