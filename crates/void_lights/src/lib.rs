//! # void_lights - Light and Shadow Source Management
//!
//! Backend-agnostic bookkeeping for the lights a renderer can see:
//! - Fixed-capacity light slots with stable indices
//! - Fixed-capacity shadow source slots
//! - Dirty tracking with one store command per changed light
//! - Tiled shadow atlas packing
//!
//! ## Architecture
//!
//! The system is built on four concepts:
//!
//! 1. **Light**: shared entity with variant parameters and owned shadow sources
//! 2. **ShadowSource**: one shadow view of a light with its atlas region
//! 3. **ShadowAtlas**: tile grid allocation for the shared shadow map
//! 4. **LightStorage**: slot tables, atlas and command stream, driven once
//!    per frame
//!
//! ## Example
//!
//! ```ignore
//! use void_lights::prelude::*;
//!
//! let mut storage = LightStorage::new(LightStorageConfig::default())?;
//!
//! let lamp = Light::point(Vec3::new(0.0, 0.0, 3.0), 10.0)
//!     .with_casts_shadows(true)
//!     .into_handle();
//! storage.add_light(&lamp)?;
//!
//! // Per frame
//! lamp.write().set_position(Vec3::new(1.0, 0.0, 3.0));
//! storage.update();
//! renderer.apply(storage.take_commands());
//!
//! storage.remove_light(&lamp)?;
//! ```

extern crate alloc;

pub mod error;
pub mod config;
pub mod slot_table;
pub mod command;
pub mod shadow;
pub mod light;
pub mod storage;

pub use error::{LightError, LightResult, SlotTableKind};
pub use config::{LightStorageConfig, SourceOrdering};
pub use slot_table::SlotTable;

// Command Stream
pub use command::{
    CommandKind, CommandList, GpuCommand,
    GPU_COMMAND_ENTRIES, GPU_COMMAND_PAYLOAD,
};

// Shadow Atlas & Sources
pub use shadow::{
    AtlasRegion, AtlasStats, ShadowAtlas,
    ShadowSource, ShadowSourceHandle,
};

// Lights
pub use light::{Light, LightHandle, LightKind, LightType};

// Storage
pub use storage::{
    LightStorage, SharedLightStorage, StorageDiagnostics, UpdateStats,
};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::command::{CommandKind, GpuCommand};
    pub use crate::config::{LightStorageConfig, SourceOrdering};
    pub use crate::error::{LightError, LightResult};
    pub use crate::light::{Light, LightHandle, LightKind, LightType};
    pub use crate::shadow::{AtlasRegion, ShadowAtlas, ShadowSource};
    pub use crate::storage::{LightStorage, UpdateStats};
    pub use glam::Vec3;
}
