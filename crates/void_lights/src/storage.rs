//! Light Storage
//!
//! Owns the light and shadow source slot tables plus the shadow atlas, and
//! turns changes to registered lights into commands for the renderer.
//!
//! # Frame Update
//!
//! [`LightStorage::update`] runs two stages in a fixed order:
//!
//! 1. Every dirty light refreshes its shadow lenses and is written as a
//!    store command.
//! 2. Lights that stopped casting shadows release their sources, then every
//!    shadow source that needs an update gives back its atlas region.
//!    Only after all regions are freed are new regions reserved, so sources
//!    processed later in the pass can reuse tiles vacated earlier.
//!
//! # Threading
//!
//! The storage is driven from a single thread. Hosts that share it across
//! threads wrap the whole instance in [`SharedLightStorage`]; the slot
//! tables and atlas are not synchronized individually.

use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::cmp::Reverse;
use parking_lot::{Mutex, RwLock};

use crate::command::{CommandKind, CommandList, GpuCommand};
use crate::config::{LightStorageConfig, SourceOrdering};
use crate::error::{LightError, LightResult, SlotTableKind};
use crate::light::{Light, LightHandle};
use crate::shadow::{ShadowAtlas, ShadowSource, ShadowSourceHandle};
use crate::slot_table::SlotTable;

/// Light storage behind a lock, for hosts that drive it from several threads
pub type SharedLightStorage = Arc<Mutex<LightStorage>>;

/// Counters for a single update cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Dirty lights written to the command stream
    pub lights_updated: u32,
    /// Shadow sources that received a new atlas region
    pub sources_updated: u32,
    /// Shadow sources left without a region this cycle
    pub regions_failed: u32,
}

/// Requests dropped since the storage was created
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageDiagnostics {
    /// Lights rejected because the light table was full
    pub dropped_lights: u64,
    /// Shadow sources left unslotted because the shadow table was full,
    /// counted once per source however often the slot is retried
    pub dropped_shadow_sources: u64,
    /// Atlas requests that found no free region
    pub failed_regions: u64,
    /// Shadow slots whose source no longer existed
    pub reclaimed_dead_sources: u64,
}

/// Fixed-capacity light and shadow source registry
#[derive(Debug)]
pub struct LightStorage {
    config: LightStorageConfig,
    lights: SlotTable<LightHandle>,
    shadow_sources: SlotTable<Weak<RwLock<ShadowSource>>>,
    atlas: ShadowAtlas,
    commands: CommandList,
    diagnostics: StorageDiagnostics,
}

impl LightStorage {
    /// Create a storage with the given capacities
    pub fn new(config: LightStorageConfig) -> LightResult<Self> {
        config.validate()?;

        log::info!(
            "Creating light storage: {} lights, {} shadow sources, {}px atlas ({}x{} tiles)",
            config.max_lights,
            config.max_shadow_sources,
            config.atlas_size,
            config.atlas_tiles_per_side(),
            config.atlas_tiles_per_side()
        );

        Ok(Self {
            lights: SlotTable::new(config.max_lights),
            shadow_sources: SlotTable::new(config.max_shadow_sources),
            atlas: ShadowAtlas::new(config.atlas_size, config.atlas_tile_size),
            commands: CommandList::new(),
            diagnostics: StorageDiagnostics::default(),
            config,
        })
    }

    /// Wrap into a lock for multi-threaded hosts
    pub fn into_shared(self) -> SharedLightStorage {
        Arc::new(Mutex::new(self))
    }

    // ---- Registration ----

    /// Register a light and return its slot
    ///
    /// The light is written to the command stream on the next update. If it
    /// casts shadows, its shadow sources are created and slotted right away;
    /// running out of shadow slots is logged but does not fail the call.
    pub fn add_light(&mut self, light: &LightHandle) -> LightResult<usize> {
        let mut guard = light.write();

        if let Some(slot) = guard.slot() {
            log::error!("Cannot add light, it already holds slot {}", slot);
            return Err(LightError::AlreadySlotted { slot });
        }

        let slot = match self.lights.insert(Arc::clone(light)) {
            Ok(slot) => slot,
            Err(_) => {
                self.diagnostics.dropped_lights += 1;
                log::warn!("All {} light slots used", self.lights.capacity());
                return Err(LightError::CapacityExhausted {
                    table: SlotTableKind::Lights,
                    capacity: self.lights.capacity(),
                });
            }
        };

        guard.assign_slot(slot);
        guard.mark_dirty();
        log::debug!("Added {:?} light in slot {}", guard.light_type(), slot);

        if guard.casts_shadows() {
            self.setup_shadows(&mut guard);
        }

        Ok(slot)
    }

    /// Unregister a light and return the slot it held
    ///
    /// A remove command is emitted immediately. The light's shadow sources
    /// give back their slots and atlas regions.
    pub fn remove_light(&mut self, light: &LightHandle) -> LightResult<usize> {
        let mut guard = light.write();

        let Some(slot) = guard.slot() else {
            log::error!("Cannot remove light, it holds no slot");
            return Err(LightError::NotSlotted);
        };

        if !self.lights.get(slot).is_some_and(|stored| Arc::ptr_eq(stored, light)) {
            log::error!("Light claims slot {} but the slot holds a different light", slot);
            return Err(LightError::NotSlotted);
        }

        let stored = self.lights.remove(slot);

        let mut cmd = GpuCommand::new(CommandKind::RemoveLight);
        cmd.push_int(slot as i32);
        self.commands.add_command(cmd);

        self.release_shadows(&mut guard);
        guard.remove_slot();
        drop(guard);

        log::debug!("Removed light from slot {}", slot);

        // Our claim goes last, the light may be destroyed here
        drop(stored);
        Ok(slot)
    }

    /// Create the light's shadow sources if needed and slot every unslotted one
    ///
    /// Stops at the first source that finds no free slot, leaving the rest
    /// unslotted. They are retried the next time the light is updated; each
    /// source is counted as dropped only once.
    fn setup_shadows(&mut self, light: &mut Light) {
        if light.num_shadow_sources() == 0 {
            log::debug!("Setting up shadows for {:?} light", light.light_type());
            light.init_shadow_sources();
        }

        let sources = light.shadow_sources();
        for (index, handle) in sources.iter().enumerate() {
            let mut source = handle.write();
            if source.has_slot() {
                continue;
            }

            match self.shadow_sources.insert(Arc::downgrade(handle)) {
                Ok(slot) => {
                    source.assign_slot(slot);
                    source.mark_needs_update();
                }
                Err(_) => {
                    drop(source);
                    let newly_refused = sources[index..]
                        .iter()
                        .filter(|handle| handle.write().refuse_slot())
                        .count();
                    self.diagnostics.dropped_shadow_sources += newly_refused as u64;
                    log::warn!(
                        "Could not attach {} shadow sources, all {} shadow slots used",
                        sources.len() - index,
                        self.shadow_sources.capacity()
                    );
                    return;
                }
            }
        }
    }

    /// Drop the light's shadow sources, freeing their slots and regions
    fn release_shadows(&mut self, light: &mut Light) {
        for handle in light.clear_shadow_sources() {
            let mut source = handle.write();

            if let Some(region) = source.clear_region() {
                self.atlas.free_region(&region);
            }

            if let Some(slot) = source.slot() {
                let owned = self
                    .shadow_sources
                    .get(slot)
                    .is_some_and(|weak| weak.as_ptr() == Arc::as_ptr(&handle));
                if owned {
                    self.shadow_sources.remove(slot);
                } else {
                    log::error!("Shadow slot {} does not reference its source", slot);
                }
                source.remove_slot();
            }
        }
    }

    /// Slot any missing shadow sources of a casting light
    ///
    /// Returns true when the light has stopped casting shadows and still owns
    /// sources, which must then be released.
    fn sync_shadow_sources(&mut self, light: &mut Light) -> bool {
        if !light.casts_shadows() {
            return light.num_shadow_sources() > 0;
        }

        let complete = light.num_shadow_sources() > 0
            && light.shadow_sources().iter().all(|source| source.read().has_slot());
        if !complete {
            self.setup_shadows(light);
        }
        false
    }

    // ---- Frame update ----

    /// Write dirty lights to the command stream and place pending shadow
    /// sources into the atlas
    pub fn update(&mut self) -> UpdateStats {
        let mut stats = UpdateStats::default();
        self.atlas.begin_frame();

        // Stage A: lights
        let dirty: Vec<LightHandle> = self
            .lights
            .iter_occupied()
            .filter(|(_, light)| light.read().is_dirty())
            .map(|(_, light)| Arc::clone(light))
            .collect();

        // Shadows to release once every store is appended
        let mut shadows_off: Vec<LightHandle> = Vec::new();

        for handle in dirty {
            let mut light = handle.write();
            if self.sync_shadow_sources(&mut light) {
                shadows_off.push(Arc::clone(&handle));
            } else {
                light.update_shadow_sources();
            }

            let mut cmd = GpuCommand::new(CommandKind::StoreLight);
            light.write_to_command(&mut cmd);
            self.commands.add_command(cmd);

            light.unset_dirty_flag();
            stats.lights_updated += 1;
        }

        // Stage B: shadow sources
        for handle in shadows_off {
            let mut light = handle.write();
            log::debug!("Releasing shadows of {:?} light", light.light_type());
            self.release_shadows(&mut light);
        }

        let mut pending: Vec<ShadowSourceHandle> = Vec::new();
        let mut dead: Vec<usize> = Vec::new();
        for (slot, weak) in self.shadow_sources.iter_occupied() {
            match weak.upgrade() {
                Some(handle) => {
                    if handle.read().needs_update() {
                        pending.push(handle);
                    }
                }
                None => dead.push(slot),
            }
        }

        for slot in dead {
            log::warn!("Reclaiming shadow slot {}, its source was dropped", slot);
            self.shadow_sources.remove(slot);
            self.diagnostics.reclaimed_dead_sources += 1;
        }

        // Free every stale region before reserving any new one
        for handle in &pending {
            if let Some(region) = handle.write().clear_region() {
                self.atlas.free_region(&region);
            }
        }

        if self.config.source_ordering == SourceOrdering::LargestFirst {
            pending.sort_by_key(|handle| Reverse(handle.read().resolution()));
        }

        for handle in &pending {
            let mut source = handle.write();
            let tiles = self.atlas.get_required_tiles(source.resolution());
            match self.atlas.find_and_reserve_region(tiles, tiles) {
                Some(region) => {
                    source.set_region(region);
                    stats.sources_updated += 1;
                }
                None => {
                    stats.regions_failed += 1;
                    self.diagnostics.failed_regions += 1;
                    log::warn!(
                        "No {}x{} atlas region for shadow source in slot {:?}",
                        tiles,
                        tiles,
                        source.slot()
                    );
                }
            }
        }

        if stats != UpdateStats::default() {
            log::debug!("Light storage update: {:?}", stats);
        }

        stats
    }

    // ---- Accessors ----

    /// Configuration the storage was created with
    pub fn config(&self) -> &LightStorageConfig {
        &self.config
    }

    /// Number of registered lights
    pub fn num_stored_lights(&self) -> usize {
        self.lights.num_stored()
    }

    /// Highest occupied light slot, 0 when empty
    pub fn max_light_index(&self) -> usize {
        self.lights.max_index()
    }

    /// Number of slotted shadow sources
    pub fn num_stored_sources(&self) -> usize {
        self.shadow_sources.num_stored()
    }

    /// Highest occupied shadow slot, 0 when empty
    pub fn max_source_index(&self) -> usize {
        self.shadow_sources.max_index()
    }

    /// Light in a slot
    pub fn light(&self, slot: usize) -> Option<&LightHandle> {
        self.lights.get(slot)
    }

    /// Shadow source in a slot
    pub fn shadow_source(&self, slot: usize) -> Option<ShadowSourceHandle> {
        self.shadow_sources.get(slot)?.upgrade()
    }

    /// All slotted shadow sources in slot order
    pub fn shadow_sources(&self) -> impl Iterator<Item = (usize, ShadowSourceHandle)> + '_ {
        self.shadow_sources
            .iter_occupied()
            .filter_map(|(slot, weak)| weak.upgrade().map(|handle| (slot, handle)))
    }

    /// The shadow atlas
    pub fn atlas(&self) -> &ShadowAtlas {
        &self.atlas
    }

    /// Pending commands
    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    /// Take all pending commands for the renderer
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        self.commands.drain()
    }

    /// Dropped-request counters
    pub fn diagnostics(&self) -> &StorageDiagnostics {
        &self.diagnostics
    }
}
