/**
 *  Executor setup and the glue between the controller and the rest of the
 *  keyboard firmware. The keyboard framework feeds combo completions and
 *  custom key presses in through channels, and picks up axis reports,
 *  joystick keys, layer requests and the combo enable state from the
 *  channels and signals below.
 */
use combo_kiboard::{
    controller::Controller,
    host::{HostLink, KeyDisposition},
    joystick::{AxisReport, JoystickKey},
    profile::REGION_LEN,
    touch::Detached,
};
use defmt::{info, warn, Format};
use embassy_executor::Executor;
use embassy_futures::select::{select3, Either3};
use embassy_rp::{
    adc::{self, Adc},
    flash::{Blocking, Flash, ERASE_SIZE},
    gpio::{AnyPin, Input, Pull},
    peripherals::FLASH,
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use embassy_time::{Duration, Ticker};
use embedded_storage::nor_flash::RmwNorFlashStorage;
use static_cell::StaticCell;

use crate::board::RpBoard;

use {defmt_rtt as _, panic_probe as _};

const FLASH_SIZE: usize = 2 * 1024 * 1024;
/// Start of the sector holding the profile region. Well clear of the image.
const ADDR_OFFSET: u32 = 0x100000;

const _: () = assert!(REGION_LEN as usize <= ERASE_SIZE);

const HOUSEKEEPING_PERIOD_MS: u64 = 1;

#[derive(Debug, Clone, Copy, Format)]
pub struct ComboEvent {
    pub index: u16,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, Format)]
pub struct KeyRecord {
    pub keycode: u16,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, Format)]
pub enum JoystickKeyEvent {
    Down(JoystickKey),
    Up(JoystickKey),
}

#[derive(Debug, Clone, Copy, Format)]
pub enum LayerRequest {
    Move(u8),
    SetDefault(u8),
}

pub static CHANNEL_COMBO_EVENTS: Channel<CriticalSectionRawMutex, ComboEvent, 8> = Channel::new();
pub static CHANNEL_KEY_RECORDS: Channel<CriticalSectionRawMutex, KeyRecord, 16> = Channel::new();

/// Answer for each record taken from `CHANNEL_KEY_RECORDS`, in order.
pub static CHANNEL_KEY_DISPOSITIONS: Channel<CriticalSectionRawMutex, KeyDisposition, 16> =
    Channel::new();
pub static CHANNEL_JOYSTICK_KEYS: Channel<CriticalSectionRawMutex, JoystickKeyEvent, 16> =
    Channel::new();
pub static CHANNEL_LAYER_REQUESTS: Channel<CriticalSectionRawMutex, LayerRequest, 4> = Channel::new();

pub static SIGNAL_AXIS_REPORT: Signal<CriticalSectionRawMutex, AxisReport> = Signal::new();
pub static SIGNAL_COMBOS_ENABLED: Signal<CriticalSectionRawMutex, bool> = Signal::new();

static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static FLASH_MERGE_BUFFER: StaticCell<[u8; ERASE_SIZE]> = StaticCell::new();

type ProfileFlash = RmwNorFlashStorage<'static, Flash<'static, FLASH, Blocking, FLASH_SIZE>>;
type FirmwareController = Controller<RpBoard, ChannelHost, ProfileFlash, Detached>;

/// Host link backed by the channels and signals above. Nothing here
/// blocks, a full channel drops the event.
struct ChannelHost;

impl HostLink for ChannelHost {
    fn register_key(&mut self, key: JoystickKey) {
        if CHANNEL_JOYSTICK_KEYS.try_send(JoystickKeyEvent::Down(key)).is_err() {
            warn!("Joystick key queue full, dropped press {}", key);
        }
    }

    fn unregister_key(&mut self, key: JoystickKey) {
        if CHANNEL_JOYSTICK_KEYS.try_send(JoystickKeyEvent::Up(key)).is_err() {
            warn!("Joystick key queue full, dropped release {}", key);
        }
    }

    fn send_axes(&mut self, report: &AxisReport) {
        SIGNAL_AXIS_REPORT.signal(*report);
    }

    fn set_combos_enabled(&mut self, enabled: bool) {
        SIGNAL_COMBOS_ENABLED.signal(enabled);
    }

    fn move_to_layer(&mut self, layer: u8) {
        if CHANNEL_LAYER_REQUESTS.try_send(LayerRequest::Move(layer)).is_err() {
            warn!("Layer request queue full.");
        }
    }

    fn set_default_layer(&mut self, layer: u8) {
        if CHANNEL_LAYER_REQUESTS.try_send(LayerRequest::SetDefault(layer)).is_err() {
            warn!("Layer request queue full.");
        }
    }

    fn print_line(&mut self, line: &str) {
        info!("{}", line);
    }
}

#[embassy_executor::task]
async fn housekeeping_task(mut controller: FirmwareController) {
    info!("Housekeeping task is running.");

    controller.init();

    let mut ticker = Ticker::every(Duration::from_millis(HOUSEKEEPING_PERIOD_MS));

    loop {
        match select3(
            ticker.next(),
            CHANNEL_COMBO_EVENTS.receive(),
            CHANNEL_KEY_RECORDS.receive(),
        )
        .await
        {
            Either3::First(()) => controller.tick(),
            Either3::Second(ComboEvent { index, pressed }) => {
                controller.process_combo_event(index, pressed)
            }
            Either3::Third(KeyRecord { keycode, pressed }) => {
                let disposition = controller.process_key(keycode, pressed);
                if CHANNEL_KEY_DISPOSITIONS.try_send(disposition).is_err() {
                    warn!("Key disposition queue full.");
                }
            }
        }
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    info!("Initializing");

    let p = embassy_rp::init(Default::default());

    let key = |pin: AnyPin| Input::new(pin, Pull::Up);
    let keys = [
        [
            key(p.PIN_2.into()),
            key(p.PIN_3.into()),
            key(p.PIN_4.into()),
            key(p.PIN_5.into()),
        ],
        [
            key(p.PIN_6.into()),
            key(p.PIN_7.into()),
            key(p.PIN_8.into()),
            key(p.PIN_9.into()),
        ],
    ];
    let mode_switches = [key(p.PIN_10.into()), key(p.PIN_11.into())];

    let adc = Adc::new_blocking(p.ADC, adc::Config::default());
    let axes = [
        adc::Channel::new_pin(p.PIN_26, Pull::None),
        adc::Channel::new_pin(p.PIN_27, Pull::None),
        adc::Channel::new_pin(p.PIN_28, Pull::None),
        adc::Channel::new_pin(p.PIN_29, Pull::None),
    ];

    let board = RpBoard::new(keys, adc, axes, mode_switches);

    // flash access stays on this core, the executor below is the only one
    let flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(p.FLASH);
    let storage = RmwNorFlashStorage::new(flash, FLASH_MERGE_BUFFER.init([0u8; ERASE_SIZE]));

    let controller = Controller::new(board, ChannelHost, Detached, storage, ADDR_OFFSET);

    let executor = EXECUTOR.init(Executor::new());
    info!("Initialized.");

    executor.run(|spawner| {
        spawner.spawn(housekeeping_task(controller)).unwrap();
    });
}
