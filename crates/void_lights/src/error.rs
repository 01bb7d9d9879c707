//! Error types for light and shadow source management

use core::fmt;

use thiserror::Error;

/// Which fixed-capacity table a request ran out of
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotTableKind {
    /// The light slot table
    Lights,
    /// The shadow source slot table
    ShadowSources,
}

impl fmt::Display for SlotTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotTableKind::Lights => write!(f, "light"),
            SlotTableKind::ShadowSources => write!(f, "shadow source"),
        }
    }
}

/// Light storage errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LightError {
    #[error("Light already holds slot {slot}")]
    AlreadySlotted { slot: usize },

    #[error("Light holds no slot")]
    NotSlotted,

    #[error("All {capacity} {table} slots are in use")]
    CapacityExhausted { table: SlotTableKind, capacity: usize },

    #[error("No free {width}x{height} tile region in the shadow atlas")]
    RegionNotFound { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid shadow atlas state: {0}")]
    InvalidAtlasState(String),
}

/// Light storage result
pub type LightResult<T> = Result<T, LightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LightError::CapacityExhausted {
            table: SlotTableKind::ShadowSources,
            capacity: 12,
        };
        assert_eq!(err.to_string(), "All 12 shadow source slots are in use");

        let err = LightError::RegionNotFound { width: 4, height: 4 };
        assert_eq!(err.to_string(), "No free 4x4 tile region in the shadow atlas");
    }
}
