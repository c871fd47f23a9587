//! Traits for the external collaborators a runtime is embedded with.
//!
//! The vm itself never touches pixels, disks, or the network. Rendering,
//! asset storage, and permission decisions all go through these seams, and
//! each has a do-nothing implementation so a headless runtime (like the one
//! the tests use) needs no setup.

use compact_str::CompactString;

use crate::target::Target;

/// An axis-aligned bounding box in stage coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// The drawing collaborator. The runtime pushes visual state changes through
/// this; the embedder decides when to actually draw (the redraw-requested
/// flag on the runtime says whether anything changed this tick).
pub trait Renderer {
    /// Called after a motion or looks block changes a sprite's visual state.
    fn target_updated(&mut self, target: &Target) {
        let _ = target;
    }
    /// Gets the on-stage bounding box of a sprite's current costume, used by
    /// edge bouncing and touching queries. Returning `None` makes the vm
    /// treat the sprite as a point.
    fn sprite_bounds(&self, target: &Target) -> Option<Bounds> {
        let _ = target;
        None
    }
}

/// A renderer that ignores everything, for headless execution.
#[derive(Debug, Default)]
pub struct NullRenderer;
impl Renderer for NullRenderer {}

/// The asset store. Costume and sound payloads live here, referenced from
/// targets by asset id.
pub trait Storage {
    fn load(&self, asset_id: &str) -> Option<Vec<u8>>;
    fn store(&mut self, asset_id: &str, data: Vec<u8>);
}

/// An in-memory asset store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    assets: Vec<(CompactString, Vec<u8>)>,
}
impl Storage for MemoryStorage {
    fn load(&self, asset_id: &str) -> Option<Vec<u8>> {
        self.assets.iter().find(|(id, _)| id == asset_id).map(|(_, data)| data.clone())
    }
    fn store(&mut self, asset_id: &str, data: Vec<u8>) {
        match self.assets.iter_mut().find(|(id, _)| id == asset_id) {
            Some((_, slot)) => *slot = data,
            None => self.assets.push((asset_id.into(), data)),
        }
    }
}

/// Permission decisions for operations a loaded project requests. The
/// defaults match what an embedder can safely allow without asking anyone:
/// plain fetches are fine, loading code and opening windows are not.
pub trait SecurityManager {
    /// Whether an extension at the given url may be registered when a
    /// project asks for it during load.
    fn can_load_extension(&self, url: &str) -> bool {
        let _ = url;
        false
    }
    fn can_fetch(&self, url: &str) -> bool {
        let _ = url;
        true
    }
    fn can_open_window(&self, url: &str) -> bool {
        let _ = url;
        false
    }
    fn can_redirect(&self, url: &str) -> bool {
        let _ = url;
        false
    }
}

/// The default permission policy (see the trait's default methods).
#[derive(Debug, Default)]
pub struct DefaultSecurityManager;
impl SecurityManager for DefaultSecurityManager {}
