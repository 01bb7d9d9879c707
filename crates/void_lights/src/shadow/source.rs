//! Shadow Sources
//!
//! A shadow source is one shadow-casting view of a light, such as one cube
//! face of a point light. It is owned by its light and referenced weakly by
//! the storage's shadow slot table.

use alloc::sync::Arc;
use glam::{Mat4, Vec3};
use parking_lot::RwLock;

use super::atlas::AtlasRegion;

/// Shared handle to a shadow source owned by a light
pub type ShadowSourceHandle = Arc<RwLock<ShadowSource>>;

/// Default shadow map resolution for new sources
pub const DEFAULT_SHADOW_RESOLUTION: u32 = 512;

/// One shadow-casting view
#[derive(Clone, Debug)]
pub struct ShadowSource {
    slot: Option<usize>,
    resolution: u32,
    view: Mat4,
    projection: Mat4,
    near_plane: f32,
    far_plane: f32,
    region: Option<AtlasRegion>,
    needs_update: bool,
    /// Set once the shadow slot table had no room for this source
    slot_refused: bool,
}

impl Default for ShadowSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowSource {
    /// Create an unslotted source that needs an update
    pub fn new() -> Self {
        Self {
            slot: None,
            resolution: DEFAULT_SHADOW_RESOLUTION,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            near_plane: 0.1,
            far_plane: 100.0,
            region: None,
            needs_update: true,
            slot_refused: false,
        }
    }

    /// Wrap into a shared handle
    pub fn into_handle(self) -> ShadowSourceHandle {
        Arc::new(RwLock::new(self))
    }

    /// Shadow slot, if registered
    #[inline]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Check if the source holds a shadow slot
    #[inline]
    pub fn has_slot(&self) -> bool {
        self.slot.is_some()
    }

    pub(crate) fn assign_slot(&mut self, slot: usize) {
        self.slot = Some(slot);
        self.slot_refused = false;
    }

    /// Record that no shadow slot was free, returning true the first time
    pub(crate) fn refuse_slot(&mut self) -> bool {
        !core::mem::replace(&mut self.slot_refused, true)
    }

    pub(crate) fn remove_slot(&mut self) {
        self.slot = None;
    }

    /// Shadow map resolution in texels
    #[inline]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Set the shadow map resolution
    pub fn set_resolution(&mut self, resolution: u32) {
        if self.resolution != resolution {
            self.resolution = resolution;
            self.needs_update = true;
        }
    }

    /// Configure a perspective lens looking from `position` along `direction`
    pub fn set_perspective_lens(
        &mut self,
        fov_degrees: f32,
        near_plane: f32,
        far_plane: f32,
        position: Vec3,
        direction: Vec3,
    ) {
        self.near_plane = near_plane;
        self.far_plane = far_plane;
        self.view = look_to(position, direction);
        self.projection = Mat4::perspective_rh(fov_degrees.to_radians(), 1.0, near_plane, far_plane);
        self.needs_update = true;
    }

    /// Configure an orthographic lens covering `extent` units on each side
    pub fn set_orthographic_lens(
        &mut self,
        extent: f32,
        near_plane: f32,
        far_plane: f32,
        position: Vec3,
        direction: Vec3,
    ) {
        let half = extent * 0.5;
        self.near_plane = near_plane;
        self.far_plane = far_plane;
        self.view = look_to(position, direction);
        self.projection = Mat4::orthographic_rh(-half, half, -half, half, near_plane, far_plane);
        self.needs_update = true;
    }

    /// View matrix
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Projection matrix
    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Combined view-projection matrix
    #[inline]
    pub fn mvp(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Near plane distance
    #[inline]
    pub fn near_plane(&self) -> f32 {
        self.near_plane
    }

    /// Far plane distance
    #[inline]
    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    /// Atlas region, None when the source contributes no shadow this frame
    #[inline]
    pub fn region(&self) -> Option<AtlasRegion> {
        self.region
    }

    /// Check if the source holds an atlas region
    #[inline]
    pub fn has_region(&self) -> bool {
        self.region.is_some()
    }

    /// Assign the atlas region computed for the current lens
    pub(crate) fn set_region(&mut self, region: AtlasRegion) {
        self.region = Some(region);
        self.needs_update = false;
    }

    /// Drop the atlas region, returning it so it can be freed
    pub(crate) fn clear_region(&mut self) -> Option<AtlasRegion> {
        self.region.take()
    }

    /// Check if the region must be recomputed
    #[inline]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Request a new atlas placement on the next update
    pub fn mark_needs_update(&mut self) {
        self.needs_update = true;
    }
}

/// View matrix with an up vector that is never parallel to the direction
fn look_to(position: Vec3, direction: Vec3) -> Mat4 {
    let direction = direction.normalize_or_zero();
    let direction = if direction == Vec3::ZERO { Vec3::NEG_Z } else { direction };
    let up = if direction.z.abs() > 0.99 { Vec3::Y } else { Vec3::Z };
    Mat4::look_to_rh(position, direction, up)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_needs_update() {
        let source = ShadowSource::new();
        assert!(source.needs_update());
        assert!(!source.has_slot());
        assert!(!source.has_region());
        assert_eq!(source.resolution(), DEFAULT_SHADOW_RESOLUTION);
    }

    #[test]
    fn test_resolution_change_marks_update() {
        let mut source = ShadowSource::new();
        source.set_region(AtlasRegion::new(0, 0, 1, 1));
        assert!(!source.needs_update());

        source.set_resolution(DEFAULT_SHADOW_RESOLUTION);
        assert!(!source.needs_update());

        source.set_resolution(1024);
        assert!(source.needs_update());
    }

    #[test]
    fn test_perspective_lens() {
        let mut source = ShadowSource::new();
        source.set_region(AtlasRegion::new(0, 0, 1, 1));
        source.set_perspective_lens(90.0, 0.5, 10.0, Vec3::ZERO, Vec3::X);

        assert!(source.needs_update());
        assert_eq!(source.far_plane(), 10.0);

        // A point in front of the lens lands inside clip space
        let clip = source.mvp() * glam::Vec4::new(5.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_orthographic_lens() {
        let mut source = ShadowSource::new();
        source.set_orthographic_lens(20.0, 0.1, 50.0, Vec3::new(0.0, 0.0, 25.0), Vec3::NEG_Z);

        let clip = source.mvp() * glam::Vec4::new(5.0, 0.0, 0.0, 1.0);
        assert!((clip.w - 1.0).abs() < 1e-5);
        assert!(clip.x.abs() <= 1.0 && clip.y.abs() <= 1.0);
    }

    #[test]
    fn test_clear_region() {
        let mut source = ShadowSource::new();
        let region = AtlasRegion::new(1, 2, 3, 3);
        source.set_region(region);
        assert_eq!(source.clear_region(), Some(region));
        assert!(!source.has_region());
    }
}
