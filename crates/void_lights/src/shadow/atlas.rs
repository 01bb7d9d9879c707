//! Shadow Atlas Tile Packing
//!
//! The atlas is a single square texture split into a grid of equally sized
//! tiles. Shadow sources reserve square blocks of tiles; this module only
//! tracks tile occupancy and does not create GPU resources.
//!
//! # Placement
//!
//! Regions are placed first-fit in row-major order: rows top to bottom, and
//! within a row left to right. The scan is deterministic, so the same
//! sequence of requests always produces the same layout.

use alloc::vec::Vec;
use glam::Vec4;
use serde::{Serialize, Deserialize};

use crate::error::{LightError, LightResult};

/// Largest tile grid side; keeps the tile count addressable in `u32`
pub const MAX_ATLAS_TILES_PER_SIDE: u32 = 4096;

/// Rectangle of atlas tiles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtlasRegion {
    /// First tile column
    pub x: u32,
    /// First tile row
    pub y: u32,
    /// Width in tiles
    pub width: u32,
    /// Height in tiles
    pub height: u32,
}

impl AtlasRegion {
    /// Create a region
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Number of tiles covered
    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.width * self.height
    }

    /// Check if two regions share at least one tile
    pub fn overlaps(&self, other: &AtlasRegion) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Atlas statistics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AtlasStats {
    /// Regions reserved this frame
    pub allocations_this_frame: u32,

    /// Regions freed this frame
    pub deallocations_this_frame: u32,

    /// Requests that found no free region this frame
    pub failed_this_frame: u32,

    /// Total regions ever reserved
    pub total_allocations: u64,
}

/// Tile occupancy for the shared shadow map texture
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "AtlasState")]
pub struct ShadowAtlas {
    /// Atlas resolution (width = height = size)
    size: u32,

    /// Tile resolution (width = height = tile_size)
    tile_size: u32,

    /// Tiles per side
    num_tiles: u32,

    /// Row-major occupancy, true = reserved
    tiles: Vec<bool>,

    /// Number of reserved tiles
    used_tiles: u32,

    /// Statistics
    stats: AtlasStats,
}

impl ShadowAtlas {
    /// Create an empty atlas
    ///
    /// `size` should be a multiple of `tile_size`; leftover texels at the
    /// border are not addressable. The grid is capped at
    /// [`MAX_ATLAS_TILES_PER_SIDE`] tiles per side.
    pub fn new(size: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        let mut num_tiles = size / tile_size;
        if num_tiles > MAX_ATLAS_TILES_PER_SIDE {
            log::warn!(
                "Atlas of {}x{} tiles exceeds the {} tile limit, clamping",
                num_tiles,
                num_tiles,
                MAX_ATLAS_TILES_PER_SIDE
            );
            num_tiles = MAX_ATLAS_TILES_PER_SIDE;
        }
        Self {
            size,
            tile_size,
            num_tiles,
            tiles: vec![false; num_tiles as usize * num_tiles as usize],
            used_tiles: 0,
            stats: AtlasStats::default(),
        }
    }

    /// Atlas resolution in texels
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Tile resolution in texels
    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Tiles per atlas side
    #[inline]
    pub fn num_tiles(&self) -> u32 {
        self.num_tiles
    }

    /// Number of reserved tiles
    #[inline]
    pub fn num_used_tiles(&self) -> u32 {
        self.used_tiles
    }

    /// Number of free tiles
    #[inline]
    pub fn num_free_tiles(&self) -> u32 {
        self.num_tiles * self.num_tiles - self.used_tiles
    }

    /// Get utilization ratio (0-1)
    pub fn utilization(&self) -> f32 {
        let total = self.num_tiles * self.num_tiles;
        if total == 0 {
            return 0.0;
        }
        self.used_tiles as f32 / total as f32
    }

    /// Get atlas statistics
    pub fn stats(&self) -> &AtlasStats {
        &self.stats
    }

    /// Begin a new frame (resets per-frame statistics)
    pub fn begin_frame(&mut self) {
        self.stats.allocations_this_frame = 0;
        self.stats.deallocations_this_frame = 0;
        self.stats.failed_this_frame = 0;
    }

    /// Tiles per side needed for a shadow map of the given resolution
    ///
    /// Always at least one tile.
    pub fn get_required_tiles(&self, resolution: u32) -> u32 {
        resolution.div_ceil(self.tile_size).max(1)
    }

    /// Check whether a tile is reserved
    #[inline]
    pub fn is_tile_used(&self, x: u32, y: u32) -> bool {
        x < self.num_tiles && y < self.num_tiles && self.tiles[self.tile_index(x, y)]
    }

    /// Check whether every tile of a region is inside the atlas and free
    pub fn is_region_free(&self, region: &AtlasRegion) -> bool {
        if !self.in_bounds(region) {
            return false;
        }
        (region.y..region.y + region.height).all(|y| {
            (region.x..region.x + region.width).all(|x| !self.tiles[self.tile_index(x, y)])
        })
    }

    /// Find a free block of `width` x `height` tiles and reserve it
    ///
    /// Returns `None` when no block fits; occupancy is left unchanged in
    /// that case.
    pub fn find_and_reserve_region(&mut self, width: u32, height: u32) -> Option<AtlasRegion> {
        if width == 0 || height == 0 || width > self.num_tiles || height > self.num_tiles {
            self.stats.failed_this_frame += 1;
            return None;
        }

        for y in 0..=(self.num_tiles - height) {
            let mut x = 0;
            while x <= self.num_tiles - width {
                match self.first_used_in(x, y, width, height) {
                    None => {
                        let region = AtlasRegion::new(x, y, width, height);
                        self.set_region_state(&region, true);
                        self.used_tiles += region.tile_count();
                        self.stats.allocations_this_frame += 1;
                        self.stats.total_allocations += 1;
                        return Some(region);
                    }
                    // No candidate starting at or before the blocking column fits
                    Some(blocked_x) => x = blocked_x + 1,
                }
            }
        }

        self.stats.failed_this_frame += 1;
        None
    }

    /// Reserve a region, reporting failure as an error
    pub fn reserve_region(&mut self, width: u32, height: u32) -> LightResult<AtlasRegion> {
        self.find_and_reserve_region(width, height)
            .ok_or(LightError::RegionNotFound { width, height })
    }

    /// Free all tiles of a region
    ///
    /// The region must have been returned by this atlas and not freed since.
    /// Tiles outside the atlas or already free are skipped.
    pub fn free_region(&mut self, region: &AtlasRegion) {
        if !self.in_bounds(region) {
            log::debug!("Ignoring free of out-of-bounds atlas region {:?}", region);
            return;
        }

        let mut freed = 0;
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                let index = self.tile_index(x, y);
                if self.tiles[index] {
                    self.tiles[index] = false;
                    freed += 1;
                }
            }
        }

        if freed != region.tile_count() {
            log::debug!(
                "Atlas region {:?} was partially free ({} of {} tiles reserved)",
                region,
                freed,
                region.tile_count()
            );
        }

        self.used_tiles -= freed;
        self.stats.deallocations_this_frame += 1;
    }

    /// Region in normalized atlas coordinates: (x, y, width, height)
    pub fn region_to_uv(&self, region: &AtlasRegion) -> Vec4 {
        if self.num_tiles == 0 {
            return Vec4::ZERO;
        }
        let scale = 1.0 / self.num_tiles as f32;
        Vec4::new(
            region.x as f32 * scale,
            region.y as f32 * scale,
            region.width as f32 * scale,
            region.height as f32 * scale,
        )
    }

    /// Free every tile
    pub fn reset(&mut self) {
        self.tiles.iter_mut().for_each(|tile| *tile = false);
        self.used_tiles = 0;
        self.stats = AtlasStats::default();
    }

    #[inline]
    fn tile_index(&self, x: u32, y: u32) -> usize {
        (y * self.num_tiles + x) as usize
    }

    fn in_bounds(&self, region: &AtlasRegion) -> bool {
        let fits = |start: u32, extent: u32| {
            start.checked_add(extent).is_some_and(|end| end <= self.num_tiles)
        };
        fits(region.x, region.width) && fits(region.y, region.height)
    }

    /// Rightmost reserved column inside the candidate block, if any
    fn first_used_in(&self, x: u32, y: u32, width: u32, height: u32) -> Option<u32> {
        (x..x + width)
            .rev()
            .find(|&tx| (y..y + height).any(|ty| self.tiles[self.tile_index(tx, ty)]))
    }

    fn set_region_state(&mut self, region: &AtlasRegion, used: bool) {
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                let index = self.tile_index(x, y);
                self.tiles[index] = used;
            }
        }
    }
}

/// Serialized atlas, checked before it becomes a [`ShadowAtlas`]
#[derive(Deserialize)]
struct AtlasState {
    size: u32,
    tile_size: u32,
    num_tiles: u32,
    tiles: Vec<bool>,
    used_tiles: u32,
    #[serde(default)]
    stats: AtlasStats,
}

impl TryFrom<AtlasState> for ShadowAtlas {
    type Error = LightError;

    fn try_from(state: AtlasState) -> LightResult<Self> {
        let grid = state
            .size
            .checked_div(state.tile_size)
            .map(|tiles| tiles.min(MAX_ATLAS_TILES_PER_SIDE));
        if grid != Some(state.num_tiles) {
            return Err(LightError::InvalidAtlasState(format!(
                "{} tiles per side does not match size {} and tile size {}",
                state.num_tiles, state.size, state.tile_size
            )));
        }

        let expected = state.num_tiles as usize * state.num_tiles as usize;
        if state.tiles.len() != expected {
            return Err(LightError::InvalidAtlasState(format!(
                "{} tile entries for a grid of {}",
                state.tiles.len(),
                expected
            )));
        }

        let reserved = state.tiles.iter().filter(|&&used| used).count();
        if reserved != state.used_tiles as usize {
            return Err(LightError::InvalidAtlasState(format!(
                "{} reserved tiles recorded, {} found",
                state.used_tiles, reserved
            )));
        }

        Ok(Self {
            size: state.size,
            tile_size: state.tile_size,
            num_tiles: state.num_tiles,
            tiles: state.tiles,
            used_tiles: state.used_tiles,
            stats: state.stats,
        })
    }
}

impl Default for ShadowAtlas {
    fn default() -> Self {
        Self::new(4096, 32)
    }
}
