//! Light Storage Configuration
//!
//! Capacity limits and atlas layout, fixed for the lifetime of a
//! [`LightStorage`](crate::storage::LightStorage). Serde support allows the
//! configuration to live in engine settings files.

use serde::{Serialize, Deserialize};

use crate::error::{LightError, LightResult};
use crate::shadow::atlas::MAX_ATLAS_TILES_PER_SIDE;

/// Default maximum number of lights
pub const DEFAULT_MAX_LIGHTS: usize = 1024;
/// Default maximum number of shadow sources
pub const DEFAULT_MAX_SHADOW_SOURCES: usize = 2048;
/// Default shadow atlas resolution (texels per side)
pub const DEFAULT_ATLAS_SIZE: u32 = 4096;
/// Default atlas tile size (texels per side)
pub const DEFAULT_ATLAS_TILE_SIZE: u32 = 32;

/// Order in which pending shadow sources are placed into the atlas
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOrdering {
    /// Place sources in shadow slot order
    SlotOrder,
    /// Place higher resolution sources first, ties in slot order
    LargestFirst,
}

impl Default for SourceOrdering {
    fn default() -> Self {
        Self::LargestFirst
    }
}

/// Light storage configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightStorageConfig {
    /// Light slot table capacity
    pub max_lights: usize,

    /// Shadow source slot table capacity
    pub max_shadow_sources: usize,

    /// Shadow atlas resolution (width = height = size)
    pub atlas_size: u32,

    /// Size of a single atlas tile
    pub atlas_tile_size: u32,

    /// Placement order for shadow sources during an update
    pub source_ordering: SourceOrdering,
}

impl Default for LightStorageConfig {
    fn default() -> Self {
        Self {
            max_lights: DEFAULT_MAX_LIGHTS,
            max_shadow_sources: DEFAULT_MAX_SHADOW_SOURCES,
            atlas_size: DEFAULT_ATLAS_SIZE,
            atlas_tile_size: DEFAULT_ATLAS_TILE_SIZE,
            source_ordering: SourceOrdering::default(),
        }
    }
}

impl LightStorageConfig {
    /// Parse a configuration from JSON and validate it
    pub fn from_json(json: &str) -> LightResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LightError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the light capacity
    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Set the shadow source capacity
    pub fn with_max_shadow_sources(mut self, max_shadow_sources: usize) -> Self {
        self.max_shadow_sources = max_shadow_sources;
        self
    }

    /// Set atlas resolution and tile size
    pub fn with_atlas(mut self, atlas_size: u32, atlas_tile_size: u32) -> Self {
        self.atlas_size = atlas_size;
        self.atlas_tile_size = atlas_tile_size;
        self
    }

    /// Set the shadow source placement order
    pub fn with_source_ordering(mut self, ordering: SourceOrdering) -> Self {
        self.source_ordering = ordering;
        self
    }

    /// Number of tiles per atlas side
    pub fn atlas_tiles_per_side(&self) -> u32 {
        self.atlas_size / self.atlas_tile_size.max(1)
    }

    /// Validate configuration
    ///
    /// All capacities must be positive and the atlas must divide evenly into
    /// at most [`MAX_ATLAS_TILES_PER_SIDE`] tiles per side.
    pub fn validate(&self) -> LightResult<()> {
        if self.max_lights == 0 {
            return Err(LightError::InvalidConfig("max_lights must be positive".into()));
        }
        if self.max_shadow_sources == 0 {
            return Err(LightError::InvalidConfig(
                "max_shadow_sources must be positive".into(),
            ));
        }
        if self.atlas_size == 0 || self.atlas_tile_size == 0 {
            return Err(LightError::InvalidConfig(
                "atlas_size and atlas_tile_size must be positive".into(),
            ));
        }
        if self.atlas_tile_size > self.atlas_size {
            return Err(LightError::InvalidConfig(format!(
                "atlas_tile_size {} exceeds atlas_size {}",
                self.atlas_tile_size, self.atlas_size
            )));
        }
        if self.atlas_size % self.atlas_tile_size != 0 {
            return Err(LightError::InvalidConfig(format!(
                "atlas_size {} is not a multiple of atlas_tile_size {}",
                self.atlas_size, self.atlas_tile_size
            )));
        }
        if self.atlas_tiles_per_side() > MAX_ATLAS_TILES_PER_SIDE {
            return Err(LightError::InvalidConfig(format!(
                "atlas of {} tiles per side exceeds the limit of {}",
                self.atlas_tiles_per_side(),
                MAX_ATLAS_TILES_PER_SIDE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LightStorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.atlas_tiles_per_side(), 128);
        assert_eq!(config.source_ordering, SourceOrdering::LargestFirst);
    }

    #[test]
    fn test_config_validate_rejects_zero() {
        assert!(LightStorageConfig::default().with_max_lights(0).validate().is_err());
        assert!(LightStorageConfig::default().with_max_shadow_sources(0).validate().is_err());
        assert!(LightStorageConfig::default().with_atlas(0, 32).validate().is_err());
        assert!(LightStorageConfig::default().with_atlas(1024, 0).validate().is_err());
    }

    #[test]
    fn test_config_validate_tile_layout() {
        let err = LightStorageConfig::default().with_atlas(1000, 64).validate();
        assert!(matches!(err, Err(LightError::InvalidConfig(_))));

        let err = LightStorageConfig::default().with_atlas(64, 128).validate();
        assert!(matches!(err, Err(LightError::InvalidConfig(_))));

        assert!(LightStorageConfig::default().with_atlas(512, 512).validate().is_ok());
    }

    #[test]
    fn test_config_validate_tile_grid_limit() {
        let limit = MAX_ATLAS_TILES_PER_SIDE;
        assert!(LightStorageConfig::default().with_atlas(limit, 1).validate().is_ok());

        let err = LightStorageConfig::default().with_atlas(limit * 2, 1).validate();
        assert!(matches!(err, Err(LightError::InvalidConfig(_))));

        let err = LightStorageConfig::default().with_atlas(u32::MAX, 1).validate();
        assert!(matches!(err, Err(LightError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_from_json() {
        let config = LightStorageConfig::from_json(
            r#"{ "max_lights": 8, "atlas_size": 1024, "source_ordering": "SlotOrder" }"#,
        )
        .unwrap();

        assert_eq!(config.max_lights, 8);
        assert_eq!(config.atlas_size, 1024);
        assert_eq!(config.atlas_tile_size, DEFAULT_ATLAS_TILE_SIZE);
        assert_eq!(config.source_ordering, SourceOrdering::SlotOrder);

        assert!(LightStorageConfig::from_json(r#"{ "max_lights": 0 }"#).is_err());
        assert!(LightStorageConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = LightStorageConfig::default().with_max_lights(4).with_atlas(256, 16);
        let json = serde_json::to_string(&config).unwrap();
        let restored: LightStorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
