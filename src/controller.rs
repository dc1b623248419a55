/**
 *  Top level housekeeping. Owns the device context and every input
 *  component, and turns combo completions, custom keycodes and the mode
 *  switches into profile and mode changes. `tick` never blocks.
 */
use core::fmt;

use embedded_storage::Storage;

use crate::{
    analog::AnalogSampler,
    combo::{ComboAction, ComboId},
    config::{
        DeviceSettings, SamplerConfig, ScannerConfig, CALIBRATION_SAMPLES, JOYSTICK_COUNT,
        MATRIX_COLS, MATRIX_ROWS, MAX_LAYERS, MODE_SWITCH_POLL_MS,
    },
    hal::{Board, JoystickId},
    helpers::Cadence,
    host::{CustomKeycode, HostLink, KeyDisposition},
    joystick::{AxisReport, JoystickEngine, JoystickMode},
    matrix::MatrixScanner,
    profile::ProfileStore,
    touch::{self, Touchscreen},
    tracker::{InputKind, InputSnapshot, InputTracker},
};

const DIAGNOSTIC_LINE_LEN: usize = 64;

pub struct Controller<B, H, S, T> {
    board: B,
    host: H,
    touch: T,
    store: ProfileStore<S>,
    settings: DeviceSettings,
    scanner: MatrixScanner<MATRIX_ROWS, MATRIX_COLS>,
    sampler: AnalogSampler,
    tracker: InputTracker,
    engines: [JoystickEngine; JOYSTICK_COUNT],
    report: AxisReport,
    mode_switch_cadence: Cadence,
    /// Last raw level of each mode switch, high while released.
    mode_switch_levels: [bool; JOYSTICK_COUNT],
    touch_cadence: Cadence,
    touch_ready: bool,
}

impl<B: Board, H: HostLink, S: Storage, T: Touchscreen> Controller<B, H, S, T> {
    /// `store_base` is the offset of the profile region inside `storage`.
    pub fn new(board: B, host: H, touch: T, storage: S, store_base: u32) -> Self {
        let settings = DeviceSettings::default();
        let scanner_config = ScannerConfig::default();

        Self {
            board,
            host,
            touch,
            store: ProfileStore::new(storage, store_base),
            scanner: MatrixScanner::new(scanner_config),
            sampler: AnalogSampler::new(SamplerConfig::default()),
            tracker: InputTracker::new(&scanner_config),
            engines: [
                JoystickEngine::new(JoystickId::One),
                JoystickEngine::new(JoystickId::Two),
            ],
            report: AxisReport::default(),
            mode_switch_cadence: Cadence::new(MODE_SWITCH_POLL_MS),
            mode_switch_levels: [true; JOYSTICK_COUNT],
            touch_cadence: Cadence::new(u32::from(settings.touch_poll_ms)),
            touch_ready: false,
            settings,
        }
    }

    /// Loads the stored configuration, brings up the touchscreen and
    /// registers the default tracked inputs.
    pub fn init(&mut self) {
        info!("Initializing controller.");
        let now = self.board.now_ms();

        self.store.init(&mut self.settings, now);

        if self.settings.touchscreen_enabled {
            self.start_touchscreen();
        }

        self.sync_subsystems();

        self.tracker.clear();
        for id in 0..(MATRIX_ROWS * MATRIX_COLS) as u8 {
            self.tracker.track(InputKind::Button, id);
        }
        for joystick in JoystickId::ALL {
            self.tracker.track(InputKind::JoystickAnalog, joystick.index() as u8);
        }

        info!("Controller ready, profile {}", self.settings.current_profile);
    }

    fn start_touchscreen(&mut self) {
        match touch::power_up(&mut self.touch, &mut self.board) {
            Ok(()) => {
                debug!("Touchscreen up.");
                self.touch_ready = true;
            }
            Err(e) => {
                warn!("Touchscreen init failed: {}", e);
                self.touch_ready = false;
                self.diagnostic(format_args!("Touchscreen init failed"));
            }
        }
    }

    /// One pass of the housekeeping loop.
    pub fn tick(&mut self) {
        let now = self.board.now_ms();

        let scanned = self.scanner.scan(&mut self.board, now);

        let sampled = self.sampler.tick(&mut self.board, now);
        if sampled {
            for engine in self.engines.iter_mut() {
                let axes = engine.process(self.sampler.state(engine.id()), &mut self.host);
                self.report.set(engine.id(), axes);
            }
            self.host.send_axes(&self.report);
        }

        if scanned || sampled {
            let snapshot = InputSnapshot {
                matrix: &self.scanner,
                sampler: &self.sampler,
                touching: self.touch_ready && self.touch.is_touching(),
            };
            self.tracker.update_all(&snapshot, now);
        }

        if self.mode_switch_cadence.poll(now) {
            self.poll_mode_switches(now);
        }

        if self.touch_active() && self.touch_cadence.poll(now) && self.touch.interrupt_pending() {
            self.touch.handle_touch();
        }

        self.store.task(&self.settings, now);
    }

    fn touch_active(&self) -> bool {
        self.settings.touchscreen_enabled && self.touch_ready
    }

    fn poll_mode_switches(&mut self, now: u32) {
        for joystick in JoystickId::ALL {
            let level = self.board.mode_switch_level(joystick);
            let previous = core::mem::replace(&mut self.mode_switch_levels[joystick.index()], level);

            // active low, act on the press only
            if previous && !level {
                self.toggle_joystick_mode(joystick, now);
            }
        }
    }

    /// Combo completion from the keyboard framework's combo detector.
    pub fn process_combo_event(&mut self, index: u16, pressed: bool) {
        if !pressed {
            return;
        }

        let Some(combo) = ComboId::from_index(index) else {
            warn!("Unknown combo {}", index);
            return;
        };

        if !self.settings.combo_enabled || !self.store.is_combo_enabled(combo) {
            debug!("Combo {} ignored, disabled.", index);
            return;
        }

        debug!("Combo {} fired.", combo);
        let now = self.board.now_ms();

        match combo.action() {
            ComboAction::SwitchProfile(id) => {
                self.switch_profile(id);
            }
            ComboAction::ToggleJoystickMode(joystick) => self.toggle_joystick_mode(joystick, now),
            ComboAction::Calibrate => self.calibrate(now),
            ComboAction::ResetSettings => self.reset_current(),
            ComboAction::MoveToLayer(layer) => {
                if layer < MAX_LAYERS {
                    self.host.move_to_layer(layer);
                    self.diagnostic(format_args!("Layer {}", layer));
                }
            }
            ComboAction::EmergencyReset => self.emergency_reset(now),
            ComboAction::ToggleTouchscreen => self.toggle_touchscreen(now),
            ComboAction::ToggleDebug => self.toggle_debug(),
            ComboAction::FactoryReset => self.factory_reset(now),
        }
    }

    /// Per-key callback. Custom keycodes act on press and are always
    /// consumed, anything else is left to the framework.
    pub fn process_key(&mut self, keycode: u16, pressed: bool) -> KeyDisposition {
        let Some(custom) = CustomKeycode::from_keycode(keycode) else {
            return KeyDisposition::PassThrough;
        };

        if pressed {
            let now = self.board.now_ms();
            match custom {
                CustomKeycode::Profile(id) => {
                    self.switch_profile(id);
                }
                CustomKeycode::Joystick1Mode => self.toggle_joystick_mode(JoystickId::One, now),
                CustomKeycode::Joystick2Mode => self.toggle_joystick_mode(JoystickId::Two, now),
                CustomKeycode::TouchCalibrate => self.calibrate_touchscreen(),
                CustomKeycode::ComboToggle => self.toggle_combos(now),
            }
        }

        KeyDisposition::Consumed
    }

    pub fn switch_profile(&mut self, id: u8) -> bool {
        if !self.store.switch_profile(id, &mut self.settings) {
            return false;
        }

        self.sync_subsystems();

        let record = *self.store.active_record();
        self.diagnostic(format_args!("Profile {}: {}", id + 1, record.name()));
        true
    }

    pub fn toggle_joystick_mode(&mut self, joystick: JoystickId, now: u32) {
        let mode = self.engines[joystick.index()].toggle_mode(&mut self.host);
        self.settings.joystick_mut(joystick).mode = mode;
        self.store.save_current(&self.settings, now);

        let name = match mode {
            JoystickMode::Analog => "analog",
            JoystickMode::Digital => "digital",
        };
        self.diagnostic(format_args!("Joystick {} {}", joystick.number(), name));
    }

    /// Touch panel first, then both sticks. The new centers are saved.
    pub fn calibrate(&mut self, now: u32) {
        info!("Calibrating.");
        self.calibrate_touchscreen();

        for joystick in JoystickId::ALL {
            let center = self.sampler.calibrate(&mut self.board, joystick, CALIBRATION_SAMPLES);
            self.settings.joystick_mut(joystick).center = center;
        }

        self.store.save_current(&self.settings, now);
        self.diagnostic(format_args!("Calibration complete"));
    }

    fn calibrate_touchscreen(&mut self) {
        if !self.touch_active() {
            return;
        }
        if !self.touch.calibrate() {
            warn!("Touchscreen calibration failed.");
            self.diagnostic(format_args!("Touch calibration failed"));
        }
    }

    pub fn toggle_touchscreen(&mut self, now: u32) {
        self.settings.touchscreen_enabled = !self.settings.touchscreen_enabled;
        if self.settings.touchscreen_enabled && !self.touch_ready {
            self.start_touchscreen();
        }
        self.store.mark_dirty(now);

        let state = on_off(self.settings.touchscreen_enabled);
        self.diagnostic(format_args!("Touchscreen {}", state));
    }

    pub fn toggle_combos(&mut self, now: u32) {
        self.settings.combo_enabled = !self.settings.combo_enabled;
        self.host.set_combos_enabled(self.settings.combo_enabled);
        self.store.mark_dirty(now);

        let state = on_off(self.settings.combo_enabled);
        self.diagnostic(format_args!("Combos {}", state));
    }

    pub fn toggle_debug(&mut self) {
        if self.settings.debug_mode {
            self.diagnostic(format_args!("Debug mode OFF"));
            self.settings.debug_mode = false;
        } else {
            self.settings.debug_mode = true;
            self.diagnostic(format_args!("Debug mode ON"));
        }
    }

    pub fn reset_current(&mut self) {
        self.store.reset_current(&mut self.settings);
        self.sync_subsystems();
        let slot = self.settings.current_profile + 1;
        self.diagnostic(format_args!("Profile {} reset", slot));
    }

    pub fn factory_reset(&mut self, now: u32) {
        self.diagnostic(format_args!("Factory reset"));
        self.store.factory_reset(&mut self.settings, now);
        self.sync_subsystems();
    }

    pub fn emergency_reset(&mut self, now: u32) {
        self.diagnostic(format_args!("Emergency reset"));
        self.store.emergency_reset(&mut self.settings, now);
        self.sync_subsystems();
    }

    /// Edits the live settings, pushes them down and schedules a save.
    pub fn update_settings(&mut self, f: impl FnOnce(&mut DeviceSettings)) {
        f(&mut self.settings);
        self.sync_subsystems();
        let now = self.board.now_ms();
        self.store.mark_dirty(now);
    }

    /// Pushes the device context into every component that keeps its own copy.
    fn sync_subsystems(&mut self) {
        let settings = self.settings;

        let mut scanner = *self.scanner.config();
        scanner.debounce_time_ms = u32::from(settings.debounce_ms);
        self.scanner.set_config(scanner);
        self.tracker.set_config(&scanner);

        let mut sampler = *self.sampler.config();
        sampler.sample_interval_ms = u32::from(settings.joystick_poll_ms);
        self.sampler.set_config(sampler);

        for joystick in JoystickId::ALL {
            let joystick_settings = settings.joystick(joystick);
            self.sampler.set_center(joystick, joystick_settings.center);
            self.sampler.set_deadzone(joystick, joystick_settings.deadzone);
            self.engines[joystick.index()].apply_settings(joystick_settings, &mut self.host);
        }

        self.host.set_combos_enabled(settings.combo_enabled);
        self.host.set_default_layer(settings.default_layer);
        self.touch_cadence.set_period_ms(u32::from(settings.touch_poll_ms));
    }

    /// One console line, only while debug mode is on. Lines that don't fit
    /// the buffer are dropped.
    fn diagnostic(&mut self, args: fmt::Arguments) {
        if !self.settings.debug_mode {
            return;
        }

        let mut buffer = [0u8; DIAGNOSTIC_LINE_LEN];
        match format_no_std::show(&mut buffer, format_args!("KIBOARD: {}", args)) {
            Ok(line) => self.host.print_line(line),
            Err(_) => debug!("Diagnostic line dropped."),
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn store(&self) -> &ProfileStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ProfileStore<S> {
        &mut self.store
    }

    pub fn scanner(&self) -> &MatrixScanner<MATRIX_ROWS, MATRIX_COLS> {
        &self.scanner
    }

    pub fn sampler(&self) -> &AnalogSampler {
        &self.sampler
    }

    pub fn tracker(&self) -> &InputTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut InputTracker {
        &mut self.tracker
    }

    pub fn engine(&self, joystick: JoystickId) -> &JoystickEngine {
        &self.engines[joystick.index()]
    }

    pub fn report(&self) -> &AxisReport {
        &self.report
    }

    pub fn touch_ready(&self) -> bool {
        self.touch_ready
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn touch(&self) -> &T {
        &self.touch
    }

    pub fn touch_mut(&mut self) -> &mut T {
        &mut self.touch
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}
