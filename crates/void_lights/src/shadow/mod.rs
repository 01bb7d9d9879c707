//! Shadow Source Management
//!
//! Backend-agnostic bookkeeping for shadow-casting views and the shared
//! shadow atlas they render into.
//!
//! # Architecture
//!
//! - **Source**: one shadow view of a light (lens, resolution, atlas region)
//! - **Atlas**: tile grid allocation for the shared shadow map texture
//!
//! # Usage
//!
//! ```ignore
//! use void_lights::shadow::*;
//!
//! let mut atlas = ShadowAtlas::new(4096, 32);
//! let tiles = atlas.get_required_tiles(512);
//!
//! if let Some(region) = atlas.find_and_reserve_region(tiles, tiles) {
//!     let uv = atlas.region_to_uv(&region);
//!     // ...
//!     atlas.free_region(&region);
//! }
//! ```

pub mod atlas;
pub mod source;

pub use atlas::{
    ShadowAtlas,
    AtlasRegion,
    AtlasStats,
    MAX_ATLAS_TILES_PER_SIDE,
};

pub use source::{
    ShadowSource,
    ShadowSourceHandle,
    DEFAULT_SHADOW_RESOLUTION,
};
