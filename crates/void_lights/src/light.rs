//! Lights
//!
//! A light is created by the scene, shared with [`LightStorage`] while it is
//! registered, and serialized into the command stream whenever it is dirty.
//!
//! Variants share the common data on [`Light`] and keep their own parameters
//! in [`LightKind`]. Each variant decides how many shadow sources it owns and
//! which lens they use:
//!
//! | variant     | sources | lens                         |
//! |-------------|---------|------------------------------|
//! | point       | 6       | perspective, one per axis    |
//! | spot        | 1       | perspective, cone fov        |
//! | directional | 1       | orthographic                 |
//!
//! [`LightStorage`]: crate::storage::LightStorage

use alloc::sync::Arc;
use alloc::vec::Vec;
use glam::Vec3;
use parking_lot::RwLock;

use crate::command::GpuCommand;
use crate::shadow::{ShadowSource, ShadowSourceHandle, DEFAULT_SHADOW_RESOLUTION};

/// Shared handle to a light
pub type LightHandle = Arc<RwLock<Light>>;

/// Field of view of a point light cube face, widened past 90 degrees to hide
/// seams between faces
pub const POINT_LIGHT_FACE_FOV: f32 = 90.0 + 3.0;

/// Cube face directions of a point light, in source order
pub const POINT_LIGHT_FACE_DIRECTIONS: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];

/// Light type tag written to the command stream
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Omnidirectional point light
    Point = 1,
    /// Cone-shaped spot light
    Spot = 2,
    /// Infinitely distant directional light
    Directional = 3,
}

/// Variant-specific light parameters
#[derive(Clone, Debug, PartialEq)]
pub enum LightKind {
    /// Point light
    Point {
        /// Maximum range
        radius: f32,
        /// Radius of the emitting sphere, 0 for an infinitely small point
        inner_radius: f32,
    },
    /// Spot light
    Spot {
        /// Maximum range
        radius: f32,
        /// Full cone angle in degrees
        fov: f32,
        /// Cone direction (normalized)
        direction: Vec3,
    },
    /// Directional light
    Directional {
        /// Light direction (normalized)
        direction: Vec3,
        /// Side length of the area covered by the shadow
        extent: f32,
    },
}

impl LightKind {
    /// Type tag for this variant
    pub fn light_type(&self) -> LightType {
        match self {
            LightKind::Point { .. } => LightType::Point,
            LightKind::Spot { .. } => LightType::Spot,
            LightKind::Directional { .. } => LightType::Directional,
        }
    }

    /// Number of shadow sources this variant owns when casting shadows
    pub fn shadow_source_count(&self) -> usize {
        match self {
            LightKind::Point { .. } => POINT_LIGHT_FACE_DIRECTIONS.len(),
            LightKind::Spot { .. } | LightKind::Directional { .. } => 1,
        }
    }
}

/// A light and the shadow sources it owns
#[derive(Debug)]
pub struct Light {
    kind: LightKind,
    position: Vec3,
    color: Vec3,
    ies_profile: Option<u32>,
    casts_shadows: bool,
    shadow_map_resolution: u32,
    near_plane: f32,
    dirty: bool,
    slot: Option<usize>,
    shadow_sources: Vec<ShadowSourceHandle>,
}

impl Light {
    /// Create a light of the given kind at the origin
    ///
    /// New lights start dirty so the first update always serializes them.
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            position: Vec3::ZERO,
            color: Vec3::ONE,
            ies_profile: None,
            casts_shadows: false,
            shadow_map_resolution: DEFAULT_SHADOW_RESOLUTION,
            near_plane: 0.5,
            dirty: true,
            slot: None,
            shadow_sources: Vec::new(),
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, radius: f32) -> Self {
        Self::new(LightKind::Point { radius, inner_radius: 0.0 }).with_position(position)
    }

    /// Create a spot light
    pub fn spot(position: Vec3, direction: Vec3, radius: f32, fov: f32) -> Self {
        Self::new(LightKind::Spot {
            radius,
            fov,
            direction: direction.normalize_or_zero(),
        })
        .with_position(position)
    }

    /// Create a directional light whose shadow covers `extent` units
    /// around the light position
    pub fn directional(direction: Vec3, extent: f32) -> Self {
        Self::new(LightKind::Directional {
            direction: direction.normalize_or_zero(),
            extent,
        })
    }

    /// Set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Set color (linear RGB)
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Enable or disable shadow casting
    pub fn with_casts_shadows(mut self, casts_shadows: bool) -> Self {
        self.casts_shadows = casts_shadows;
        self
    }

    /// Set shadow map resolution per source
    pub fn with_shadow_map_resolution(mut self, resolution: u32) -> Self {
        self.shadow_map_resolution = resolution;
        self
    }

    /// Set the IES profile index
    pub fn with_ies_profile(mut self, profile: u32) -> Self {
        self.ies_profile = Some(profile);
        self
    }

    /// Wrap into a shared handle
    pub fn into_handle(self) -> LightHandle {
        Arc::new(RwLock::new(self))
    }

    // ---- Accessors ----

    /// Variant parameters
    #[inline]
    pub fn kind(&self) -> &LightKind {
        &self.kind
    }

    /// Type tag
    #[inline]
    pub fn light_type(&self) -> LightType {
        self.kind.light_type()
    }

    /// World position
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Color (linear RGB)
    #[inline]
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// IES profile index
    #[inline]
    pub fn ies_profile(&self) -> Option<u32> {
        self.ies_profile
    }

    /// Check if the light casts shadows
    #[inline]
    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    /// Shadow map resolution per source
    #[inline]
    pub fn shadow_map_resolution(&self) -> u32 {
        self.shadow_map_resolution
    }

    /// Near plane of the shadow lenses
    #[inline]
    pub fn near_plane(&self) -> f32 {
        self.near_plane
    }

    // ---- Setters (all mark the light dirty) ----

    /// Move the light
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mark_dirty();
    }

    /// Change the color
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.mark_dirty();
    }

    /// Assign or clear the IES profile
    pub fn set_ies_profile(&mut self, profile: Option<u32>) {
        self.ies_profile = profile;
        self.mark_dirty();
    }

    /// Toggle shadow casting
    ///
    /// Shadow sources are created or released by the storage on its next
    /// update.
    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        self.casts_shadows = casts_shadows;
        self.mark_dirty();
    }

    /// Change the shadow map resolution
    pub fn set_shadow_map_resolution(&mut self, resolution: u32) {
        self.shadow_map_resolution = resolution;
        self.mark_dirty();
    }

    /// Change the near plane of the shadow lenses
    pub fn set_near_plane(&mut self, near_plane: f32) {
        self.near_plane = near_plane;
        self.mark_dirty();
    }

    /// Change the range of a point or spot light
    pub fn set_radius(&mut self, value: f32) {
        match &mut self.kind {
            LightKind::Point { radius, .. } | LightKind::Spot { radius, .. } => *radius = value,
            LightKind::Directional { .. } => {
                log::warn!("Ignoring radius on a directional light");
                return;
            }
        }
        self.mark_dirty();
    }

    /// Change the emitter size of a point light
    pub fn set_inner_radius(&mut self, value: f32) {
        match &mut self.kind {
            LightKind::Point { inner_radius, .. } => *inner_radius = value,
            other => {
                log::warn!("Ignoring inner radius on a {:?} light", other.light_type());
                return;
            }
        }
        self.mark_dirty();
    }

    /// Change the direction of a spot or directional light
    pub fn set_direction(&mut self, value: Vec3) {
        match &mut self.kind {
            LightKind::Spot { direction, .. } | LightKind::Directional { direction, .. } => {
                *direction = value.normalize_or_zero();
            }
            LightKind::Point { .. } => {
                log::warn!("Ignoring direction on a point light");
                return;
            }
        }
        self.mark_dirty();
    }

    /// Change the cone angle of a spot light
    pub fn set_fov(&mut self, value: f32) {
        match &mut self.kind {
            LightKind::Spot { fov, .. } => *fov = value,
            other => {
                log::warn!("Ignoring fov on a {:?} light", other.light_type());
                return;
            }
        }
        self.mark_dirty();
    }

    /// Change the shadow coverage of a directional light
    pub fn set_extent(&mut self, value: f32) {
        match &mut self.kind {
            LightKind::Directional { extent, .. } => *extent = value,
            other => {
                log::warn!("Ignoring extent on a {:?} light", other.light_type());
                return;
            }
        }
        self.mark_dirty();
    }

    // ---- Dirty state ----

    /// Check if the light changed since it was last serialized
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Schedule the light for serialization on the next update
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub(crate) fn unset_dirty_flag(&mut self) {
        self.dirty = false;
    }

    // ---- Slot ----

    /// Light slot, if registered
    #[inline]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Check if the light is registered
    #[inline]
    pub fn has_slot(&self) -> bool {
        self.slot.is_some()
    }

    pub(crate) fn assign_slot(&mut self, slot: usize) {
        self.slot = Some(slot);
    }

    pub(crate) fn remove_slot(&mut self) {
        self.slot = None;
    }

    // ---- Shadow sources ----

    /// Number of owned shadow sources
    #[inline]
    pub fn num_shadow_sources(&self) -> usize {
        self.shadow_sources.len()
    }

    /// Get a shadow source by index
    #[inline]
    pub fn shadow_source(&self, index: usize) -> Option<&ShadowSourceHandle> {
        self.shadow_sources.get(index)
    }

    /// All owned shadow sources
    #[inline]
    pub fn shadow_sources(&self) -> &[ShadowSourceHandle] {
        &self.shadow_sources
    }

    /// Create the variant's shadow sources
    ///
    /// Does nothing if the light already owns sources.
    pub fn init_shadow_sources(&mut self) {
        if !self.shadow_sources.is_empty() {
            log::warn!(
                "{:?} light already owns {} shadow sources",
                self.light_type(),
                self.shadow_sources.len()
            );
            return;
        }

        let resolution = self.shadow_map_resolution;
        self.shadow_sources = (0..self.kind.shadow_source_count())
            .map(|_| {
                let mut source = ShadowSource::new();
                source.set_resolution(resolution);
                source.into_handle()
            })
            .collect();
    }

    /// Release all shadow sources, returning them to the caller
    pub(crate) fn clear_shadow_sources(&mut self) -> Vec<ShadowSourceHandle> {
        core::mem::take(&mut self.shadow_sources)
    }

    /// Recompute every shadow source lens from the current light state
    pub fn update_shadow_sources(&mut self) {
        let resolution = self.shadow_map_resolution;
        let near = self.near_plane;
        let position = self.position;

        for (index, handle) in self.shadow_sources.iter().enumerate() {
            let mut source = handle.write();
            source.set_resolution(resolution);
            match self.kind {
                LightKind::Point { radius, .. } => {
                    source.set_perspective_lens(
                        POINT_LIGHT_FACE_FOV,
                        near,
                        radius,
                        position,
                        POINT_LIGHT_FACE_DIRECTIONS[index % POINT_LIGHT_FACE_DIRECTIONS.len()],
                    );
                }
                LightKind::Spot { radius, fov, direction } => {
                    source.set_perspective_lens(fov, near, radius, position, direction);
                }
                LightKind::Directional { direction, extent } => {
                    // Eye sits `extent` units behind the covered area
                    source.set_orthographic_lens(
                        extent,
                        near,
                        2.0 * extent,
                        position - direction * extent,
                        direction,
                    );
                }
            }
        }
    }

    // ---- Serialization ----

    /// Write the light into a store command
    ///
    /// Field order is part of the wire contract: slot, type, IES profile,
    /// position, color, then the variant fields.
    pub fn write_to_command(&self, cmd: &mut GpuCommand) {
        cmd.push_int(self.slot.map_or(-1, |slot| slot as i32));
        cmd.push_int(self.light_type() as i32);
        cmd.push_int(self.ies_profile.map_or(-1, |profile| profile as i32));
        cmd.push_vec3(self.position);
        cmd.push_vec3(self.color);

        match self.kind {
            LightKind::Point { radius, inner_radius } => {
                cmd.push_float(radius);
                cmd.push_float(inner_radius);
            }
            LightKind::Spot { radius, fov, direction } => {
                cmd.push_float(radius);
                cmd.push_float(fov);
                cmd.push_vec3(direction);
            }
            LightKind::Directional { direction, extent } => {
                cmd.push_vec3(direction);
                cmd.push_float(extent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    #[test]
    fn test_new_light_is_dirty_and_unslotted() {
        let light = Light::point(Vec3::ZERO, 10.0);
        assert!(light.is_dirty());
        assert!(!light.has_slot());
        assert!(!light.casts_shadows());
        assert_eq!(light.num_shadow_sources(), 0);
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut light = Light::spot(Vec3::ZERO, Vec3::NEG_Z, 10.0, 45.0);
        light.unset_dirty_flag();

        light.set_position(Vec3::ONE);
        assert!(light.is_dirty());

        light.unset_dirty_flag();
        light.set_fov(60.0);
        assert!(light.is_dirty());
        assert!(matches!(light.kind(), LightKind::Spot { fov, .. } if *fov == 60.0));
    }

    #[test]
    fn test_inapplicable_setter_ignored() {
        let mut light = Light::point(Vec3::ZERO, 10.0);
        light.unset_dirty_flag();

        light.set_fov(30.0);
        light.set_direction(Vec3::X);
        assert!(!light.is_dirty());
    }

    #[test]
    fn test_shadow_source_counts() {
        let mut point = Light::point(Vec3::ZERO, 10.0);
        point.init_shadow_sources();
        assert_eq!(point.num_shadow_sources(), 6);

        let mut spot = Light::spot(Vec3::ZERO, Vec3::X, 10.0, 45.0);
        spot.init_shadow_sources();
        assert_eq!(spot.num_shadow_sources(), 1);

        let mut sun = Light::directional(Vec3::NEG_Z, 100.0);
        sun.init_shadow_sources();
        assert_eq!(sun.num_shadow_sources(), 1);

        // Second init keeps the existing sources
        let first = point.shadow_source(0).cloned().unwrap();
        point.init_shadow_sources();
        assert_eq!(point.num_shadow_sources(), 6);
        assert!(Arc::ptr_eq(&first, point.shadow_source(0).unwrap()));
    }

    #[test]
    fn test_point_light_updates_sources() {
        let mut light = Light::point(Vec3::new(1.0, 2.0, 3.0), 25.0).with_shadow_map_resolution(256);
        light.init_shadow_sources();
        light.update_shadow_sources();

        for handle in light.shadow_sources() {
            let source = handle.read();
            assert_eq!(source.resolution(), 256);
            assert_eq!(source.far_plane(), 25.0);
            assert!(source.needs_update());
        }

        // Face 0 looks down +X
        let source = light.shadow_source(0).unwrap().read();
        let clip = source.mvp() * glam::Vec4::new(11.0, 2.0, 3.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
    }

    #[test]
    fn test_write_point_light() {
        let mut light = Light::point(Vec3::new(1.0, 2.0, 3.0), 10.0)
            .with_color(Vec3::new(0.5, 0.25, 1.0))
            .with_ies_profile(4);
        light.assign_slot(7);
        light.set_inner_radius(0.5);

        let mut cmd = GpuCommand::new(CommandKind::StoreLight);
        light.write_to_command(&mut cmd);

        assert_eq!(
            cmd.payload(),
            &[7.0, 1.0, 4.0, 1.0, 2.0, 3.0, 0.5, 0.25, 1.0, 10.0, 0.5]
        );
    }

    #[test]
    fn test_write_spot_and_directional() {
        let spot = Light::spot(Vec3::ZERO, Vec3::new(0.0, 0.0, -2.0), 15.0, 40.0);
        let mut cmd = GpuCommand::new(CommandKind::StoreLight);
        spot.write_to_command(&mut cmd);

        assert_eq!(cmd.read_int(0), Some(-1));
        assert_eq!(cmd.read_int(1), Some(LightType::Spot as i32));
        assert_eq!(cmd.read_int(2), Some(-1));
        assert_eq!(cmd.read_float(9), Some(15.0));
        assert_eq!(cmd.read_float(10), Some(40.0));
        assert_eq!(cmd.read_vec3(11), Some(Vec3::NEG_Z));
        assert_eq!(cmd.len(), 14);

        let sun = Light::directional(Vec3::NEG_Z, 80.0);
        let mut cmd = GpuCommand::new(CommandKind::StoreLight);
        sun.write_to_command(&mut cmd);
        assert_eq!(cmd.read_int(1), Some(LightType::Directional as i32));
        assert_eq!(cmd.read_vec3(9), Some(Vec3::NEG_Z));
        assert_eq!(cmd.read_float(12), Some(80.0));
    }
}
