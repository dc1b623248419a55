/**
 *  Profile persistence. The quick settings word, the manager record and the
 *  profile records sit back to back in one region of non-volatile storage.
 *  The copies held here are a cache of that region: hydrated in `init`,
 *  flushed on save.
 */
pub mod record;

use embedded_storage::Storage;
use packed_struct::{PackedStructSlice, PackingError};

use crate::{
    combo::ComboId,
    config::{DeviceSettings, AUTO_SAVE_QUIESCENCE_MS, CONFIG_VERSION, MAX_PROFILES},
    helpers::elapsed_ms,
};

pub use record::{
    ManagerRecord, ProfileRecord, QuickSettings, MANAGER_RECORD_LEN, PROFILE_RECORD_LEN,
    QUICK_SETTINGS_LEN,
};

pub const QUICK_SETTINGS_OFFSET: u32 = 0;
pub const MANAGER_OFFSET: u32 = QUICK_SETTINGS_OFFSET + QUICK_SETTINGS_LEN as u32;
pub const PROFILES_OFFSET: u32 = MANAGER_OFFSET + MANAGER_RECORD_LEN as u32;
/// Bytes the store occupies from its base offset.
pub const REGION_LEN: u32 = PROFILES_OFFSET + (PROFILE_RECORD_LEN * MAX_PROFILES) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError<E> {
    Storage(E),
    Packing,
}

impl<E> From<PackingError> for StoreError<E> {
    fn from(_: PackingError) -> Self {
        StoreError::Packing
    }
}

fn profile_offset(id: usize) -> u32 {
    PROFILES_OFFSET + (id * PROFILE_RECORD_LEN) as u32
}

pub struct ProfileStore<S> {
    storage: S,
    base: u32,
    quick: QuickSettings,
    manager: ManagerRecord,
    profiles: [ProfileRecord; MAX_PROFILES],
    dirty: bool,
    last_change_ms: u32,
}

impl<S: Storage> ProfileStore<S> {
    /// `base` is where the region starts inside `storage`. Nothing is read
    /// until `init`.
    pub fn new(storage: S, base: u32) -> Self {
        Self {
            storage,
            base,
            quick: QuickSettings::default(),
            manager: ManagerRecord::default(),
            profiles: core::array::from_fn(ProfileRecord::template),
            dirty: false,
            last_change_ms: 0,
        }
    }

    /// Loads the region and applies it to `settings`. An unreadable region,
    /// an out of range active profile, a version mismatch or a damaged
    /// manager record all reset the whole region to defaults and persist
    /// them. A single damaged profile only resets that slot.
    pub fn init(&mut self, settings: &mut DeviceSettings, now: u32) {
        match self.load() {
            Ok(true) => info!("Profile store loaded, active profile {}", self.manager.active_profile),
            Ok(false) => {
                warn!("Stored profile configuration invalid, restoring defaults.");
                self.restore_defaults(now);
            }
            Err(_) => {
                warn!("Profile store unreadable, restoring defaults.");
                self.restore_defaults(now);
            }
        }

        self.quick.active_profile = self.manager.active_profile;
        if self.manager.auto_load_on_boot {
            self.apply_boot(settings);
        } else {
            debug!("Auto load disabled, booting profile 0.");
            self.manager.active_profile = 0;
            self.manager.seal();
            self.profiles[0].apply(settings);
            settings.current_profile = 0;
            self.quick.capture(settings);
        }

        self.dirty = false;
        self.last_change_ms = now;
    }

    fn load(&mut self) -> Result<bool, StoreError<S::Error>> {
        let manager: ManagerRecord = self.read_record(MANAGER_OFFSET)?;
        if usize::from(manager.active_profile) >= MAX_PROFILES
            || manager.config_version != CONFIG_VERSION
            || !manager.is_intact()
        {
            return Ok(false);
        }

        self.quick = self.read_record(QUICK_SETTINGS_OFFSET)?;
        self.manager = manager;

        for id in 0..MAX_PROFILES {
            let profile: ProfileRecord = self.read_record(profile_offset(id))?;
            if profile.is_intact() {
                self.profiles[id] = profile;
            } else {
                warn!("Profile {} failed its checksum, restoring template.", id);
                self.profiles[id] = ProfileRecord::template(id);
                self.write_profile(id)?;
            }
        }

        Ok(true)
    }

    fn restore_defaults(&mut self, now: u32) {
        self.quick = QuickSettings::default();
        self.manager = ManagerRecord::default();
        self.manager.last_save_time = now;
        self.manager.seal();
        self.profiles = core::array::from_fn(ProfileRecord::template);

        if self.write_all().is_err() {
            error!("Failed to persist default profiles.");
        }
    }

    /// The quick word carries modes, sensitivities, deadzones and the
    /// feature toggles, the active profile supplies the rest.
    fn apply_boot(&self, settings: &mut DeviceSettings) {
        self.quick.apply(settings);
        self.profiles[usize::from(self.manager.active_profile)].apply_extended(settings);
    }

    /// Makes `id` the active profile and loads it into `settings`. Unsaved
    /// edits to the previous profile are flushed first. Fails for an id past
    /// the last slot, and while switching is turned off in the manager record.
    pub fn switch_profile(&mut self, id: u8, settings: &mut DeviceSettings) -> bool {
        if usize::from(id) >= MAX_PROFILES {
            warn!("Profile {} out of range.", id);
            return false;
        }
        if !self.manager.switching_enabled {
            debug!("Profile switching disabled.");
            return false;
        }

        if self.dirty {
            self.save_current(settings, self.last_change_ms);
        }

        self.profiles[usize::from(id)].apply(settings);
        settings.current_profile = id;
        self.quick.capture(settings);
        self.manager.active_profile = id;
        self.manager.seal();

        let persisted = self
            .write_quick()
            .and_then(|_| self.write_manager());
        if persisted.is_err() {
            error!("Failed to persist profile switch.");
        }

        info!("Switched to profile {}", id);
        true
    }

    /// Snapshots `settings` into the quick word and the active profile and
    /// writes both along with the manager record.
    pub fn save_current(&mut self, settings: &DeviceSettings, now: u32) -> bool {
        let active = usize::from(self.manager.active_profile);

        self.quick.capture(settings);
        self.quick.active_profile = self.manager.active_profile;
        self.profiles[active].capture(settings);
        self.manager.last_save_time = now;
        self.manager.seal();

        let result = self
            .write_quick()
            .and_then(|_| self.write_manager())
            .and_then(|_| self.write_profile(active));

        match result {
            Ok(()) => {
                debug!("Saved profile {}", active);
                self.dirty = false;
                true
            }
            Err(_) => {
                // stays dirty, the auto-save retries after another quiet window
                error!("Failed to save profile {}", active);
                self.mark_dirty(now);
                false
            }
        }
    }

    /// Records a change to be written once things have been quiet for a while.
    pub fn mark_dirty(&mut self, now: u32) {
        self.dirty = true;
        self.last_change_ms = now;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Periodic check. Saves once the quiescence window has passed since
    /// the last change, if both the manager and the active profile allow it.
    pub fn task(&mut self, settings: &DeviceSettings, now: u32) {
        if !self.dirty || !self.auto_save_enabled() {
            return;
        }

        if elapsed_ms(self.last_change_ms, now) >= AUTO_SAVE_QUIESCENCE_MS {
            info!("Auto-saving profile {}", self.manager.active_profile);
            self.save_current(settings, now);
        }
    }

    fn auto_save_enabled(&self) -> bool {
        self.manager.auto_save && self.active_record().features.auto_save
    }

    /// Overwrites the whole region with compiled-in defaults and reloads
    /// `settings` from them.
    pub fn factory_reset(&mut self, settings: &mut DeviceSettings, now: u32) {
        warn!("Factory reset.");
        self.restore_defaults(now);
        self.dirty = false;
        self.last_change_ms = now;

        *settings = DeviceSettings::default();
        self.apply_boot(settings);
    }

    /// Same as `factory_reset`, calibration included.
    pub fn emergency_reset(&mut self, settings: &mut DeviceSettings, now: u32) {
        warn!("Emergency reset.");
        self.factory_reset(settings, now);
    }

    /// Puts one slot back to its template. The live settings are not touched.
    pub fn reset_profile(&mut self, id: u8) -> bool {
        let index = usize::from(id);
        if index >= MAX_PROFILES {
            return false;
        }

        self.profiles[index] = ProfileRecord::template(index);
        self.write_profile(index).is_ok()
    }

    /// Resets the active slot and reloads it into `settings`. Other slots
    /// are kept, `factory_reset` wipes everything.
    pub fn reset_current(&mut self, settings: &mut DeviceSettings) -> bool {
        let active = self.manager.active_profile;
        info!("Resetting profile {}", active);

        let reset = self.reset_profile(active);
        self.profiles[usize::from(active)].apply(settings);
        self.quick.capture(settings);
        self.dirty = false;

        reset && self.write_quick().is_ok()
    }

    pub fn active_profile(&self) -> u8 {
        self.manager.active_profile
    }

    pub fn active_record(&self) -> &ProfileRecord {
        &self.profiles[usize::from(self.manager.active_profile)]
    }

    pub fn profile(&self, id: u8) -> Option<&ProfileRecord> {
        self.profiles.get(usize::from(id))
    }

    /// Direct access to a cached record. Call `save_profile` to seal and
    /// persist the edit.
    pub fn profile_mut(&mut self, id: u8) -> Option<&mut ProfileRecord> {
        self.profiles.get_mut(usize::from(id))
    }

    pub fn quick_settings(&self) -> &QuickSettings {
        &self.quick
    }

    pub fn manager(&self) -> &ManagerRecord {
        &self.manager
    }

    pub fn profile_name(&self, id: u8) -> Option<&str> {
        self.profile(id).map(ProfileRecord::name)
    }

    pub fn set_profile_name(&mut self, id: u8, name: &str) -> bool {
        match self.profile_mut(id) {
            Some(profile) => profile.set_name(name),
            None => return false,
        }
        self.save_profile(id)
    }

    /// Copies every setting of `from` into `to`. The destination keeps its name.
    pub fn copy_profile(&mut self, from: u8, to: u8) -> bool {
        let (from, to) = (usize::from(from), usize::from(to));
        if from >= MAX_PROFILES || to >= MAX_PROFILES {
            return false;
        }
        if from == to {
            return true;
        }

        let name = self.profiles[to].name;
        self.profiles[to] = self.profiles[from];
        self.profiles[to].name = name;
        self.profiles[to].seal();

        self.write_profile(to).is_ok()
    }

    pub fn is_combo_enabled(&self, combo: ComboId) -> bool {
        self.active_record().combo.enabled_mask & combo.mask_bit() != 0
    }

    pub fn enable_combo(&mut self, combo: ComboId) -> bool {
        self.update_combo_mask(|mask| mask | combo.mask_bit())
    }

    pub fn disable_combo(&mut self, combo: ComboId) -> bool {
        self.update_combo_mask(|mask| mask & !combo.mask_bit())
    }

    fn update_combo_mask(&mut self, f: impl FnOnce(u16) -> u16) -> bool {
        let active = usize::from(self.manager.active_profile);
        let combo = &mut self.profiles[active].combo;
        combo.enabled_mask = f(combo.enabled_mask);
        self.profiles[active].seal();

        self.write_profile(active).is_ok()
    }

    pub fn set_auto_save(&mut self, enabled: bool) -> bool {
        self.manager.auto_save = enabled;
        self.persist_manager()
    }

    pub fn set_auto_load(&mut self, enabled: bool) -> bool {
        self.manager.auto_load_on_boot = enabled;
        self.persist_manager()
    }

    pub fn set_switching_enabled(&mut self, enabled: bool) -> bool {
        self.manager.switching_enabled = enabled;
        self.persist_manager()
    }

    fn persist_manager(&mut self) -> bool {
        self.manager.seal();
        self.write_manager().is_ok()
    }

    pub fn last_save_time(&self) -> u32 {
        self.manager.last_save_time
    }

    /// The packed record of a slot, checksum included.
    pub fn export_profile(&self, id: u8) -> Option<[u8; PROFILE_RECORD_LEN]> {
        let mut bytes = [0u8; PROFILE_RECORD_LEN];
        self.profile(id)?.pack_to_slice(&mut bytes).ok()?;
        Some(bytes)
    }

    /// Replaces a slot with a packed record. Rejected unless the record's
    /// checksum matches.
    pub fn import_profile(&mut self, id: u8, bytes: &[u8]) -> bool {
        let index = usize::from(id);
        if index >= MAX_PROFILES {
            return false;
        }

        match ProfileRecord::unpack_from_slice(bytes) {
            Ok(profile) if profile.is_intact() => {
                self.profiles[index] = profile;
                self.write_profile(index).is_ok()
            }
            _ => {
                warn!("Rejected profile import for slot {}", id);
                false
            }
        }
    }

    /// Seals and writes one cached record.
    pub fn save_profile(&mut self, id: u8) -> bool {
        let index = usize::from(id);
        if index >= MAX_PROFILES {
            return false;
        }

        self.profiles[index].seal();
        self.write_profile(index).is_ok()
    }

    pub fn save_all(&mut self) -> bool {
        self.manager.seal();
        for profile in self.profiles.iter_mut() {
            profile.seal();
        }
        self.write_all().is_ok()
    }

    /// Reads the persisted records back and checks every checksum.
    pub fn verify_integrity(&mut self) -> bool {
        let manager = self.read_record::<ManagerRecord>(MANAGER_OFFSET);
        if !matches!(manager, Ok(ref m) if m.is_intact()) {
            return false;
        }

        (0..MAX_PROFILES).all(|id| {
            matches!(
                self.read_record::<ProfileRecord>(profile_offset(id)),
                Ok(ref p) if p.is_intact()
            )
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn write_all(&mut self) -> Result<(), StoreError<S::Error>> {
        self.write_quick()?;
        self.write_manager()?;
        for id in 0..MAX_PROFILES {
            self.write_profile(id)?;
        }
        Ok(())
    }

    fn write_quick(&mut self) -> Result<(), StoreError<S::Error>> {
        let quick = self.quick;
        self.write_record(QUICK_SETTINGS_OFFSET, &quick)
    }

    fn write_manager(&mut self) -> Result<(), StoreError<S::Error>> {
        let manager = self.manager;
        self.write_record(MANAGER_OFFSET, &manager)
    }

    fn write_profile(&mut self, id: usize) -> Result<(), StoreError<S::Error>> {
        let profile = self.profiles[id];
        self.write_record(profile_offset(id), &profile)
    }

    fn read_record<R: PackedStructSlice>(&mut self, offset: u32) -> Result<R, StoreError<S::Error>> {
        let len = R::packed_bytes_size(None)?;
        let mut buffer = [0u8; PROFILE_RECORD_LEN];
        let bytes = buffer.get_mut(..len).ok_or(StoreError::Packing)?;

        self.storage
            .read(self.base + offset, bytes)
            .map_err(StoreError::Storage)?;
        Ok(R::unpack_from_slice(bytes)?)
    }

    fn write_record<R: PackedStructSlice>(&mut self, offset: u32, record: &R) -> Result<(), StoreError<S::Error>> {
        let len = R::packed_bytes_size(Some(record))?;
        let mut buffer = [0u8; PROFILE_RECORD_LEN];
        let bytes = buffer.get_mut(..len).ok_or(StoreError::Packing)?;
        record.pack_to_slice(bytes)?;

        self.storage
            .write(self.base + offset, bytes)
            .map_err(StoreError::Storage)
    }
}
