//! sensenode firmware entry point (ESP32-C3).
//!
//! Brings up the peripherals, spawns the radio, network and button tasks,
//! runs one lifecycle pass, then executes its halt: deep sleep or restart.
//! Every boot is a fresh wake cycle.

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::net::Ipv4Addr;

use defmt::{error, info};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_net::{Ipv4Cidr, Runner, Stack, StackResources, StaticConfigV4};
use embassy_time::{Instant, Timer};
use embedded_hal_bus::i2c::RefCellDevice;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Blocking;
use esp_radio::wifi::{WifiController, WifiDevice};
use esp_storage::FlashStorage;
use static_cell::StaticCell;

use sensenode::config::{
    DISAMBIGUATION_TIMEOUT_MS, I2C_FREQUENCY_KHZ, PORTAL_AP_ADDRESS, PORTAL_AP_PREFIX_LEN,
};
use sensenode::lifecycle::{Board, Clock, Devices, Halt, Lifecycle};
use sensenode::net::api::HttpApi;
use sensenode::net::wifi::{self, RadioControl, WifiLink};
use sensenode::portal::captive;
use sensenode::portal::server::SetupPortal;
use sensenode::power::{self, Rails};
use sensenode::sensor::{BatteryAdc, BatteryPin, NodeSensors};
use sensenode::storage::flash::{BlockingFlash, FlashConfigStore};
use sensenode::ui::buttons::{self, ButtonChannel, QueuedButtons};
use sensenode::ui::clicks::ClickDisambiguator;
use sensenode::ui::display::Oled;
use sensenode::ui::gesture::GestureTiming;

esp_bootloader_esp_idf::esp_app_desc!();

// ═══════════════════════════════════════════════════════════════════════════
// Static Resources
// ═══════════════════════════════════════════════════════════════════════════

static BUTTON_EVENTS: ButtonChannel = ButtonChannel::new();
static RADIO: RadioControl = RadioControl::new();

static RADIO_CTRL: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static STA_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static AP_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static I2C_BUS: StaticCell<RefCell<I2c<'static, Blocking>>> = StaticCell::new();

type SharedI2c = RefCellDevice<'static, I2c<'static, Blocking>>;

// ═══════════════════════════════════════════════════════════════════════════
// Board
// ═══════════════════════════════════════════════════════════════════════════

struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn delay_ms(&mut self, ms: u64) {
        Timer::after_millis(ms).await;
    }
}

struct Esp32c3Node;

impl Board for Esp32c3Node {
    type Clock = EmbassyClock;
    type Buttons = QueuedButtons;
    type Store = FlashConfigStore<BlockingFlash<FlashStorage<'static>>>;
    type Network = WifiLink;
    type Api = HttpApi;
    type Sensor = NodeSensors<SharedI2c>;
    type Display = Oled<SharedI2c>;
    type Power = Rails;
    type Portal = SetupPortal;
}

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task(pool_size = 2)]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[embassy_executor::task]
async fn radio_task(controller: WifiController<'static>, sta: Stack<'static>) {
    wifi::radio_task(controller, sta, &RADIO).await
}

#[embassy_executor::task]
async fn dhcp_task(ap: Stack<'static>, address: Ipv4Addr) {
    captive::dhcp_task(ap, address).await
}

#[embassy_executor::task]
async fn dns_task(ap: Stack<'static>, address: Ipv4Addr) {
    captive::dns_task(ap, address).await
}

#[embassy_executor::task]
async fn button_task(pin: Input<'static>) {
    buttons::button_task(pin, GestureTiming::DEFAULT, BUTTON_EVENTS.sender()).await
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("panic: {}", defmt::Display2Format(info));
    esp_hal::system::software_reset()
}

/// Log an unrecoverable bring-up failure and start over.
fn boot_failure<E: core::fmt::Debug>(what: &str, e: E) -> ! {
    error!("{} failed: {:?}", what, defmt::Debug2Format(&e));
    esp_hal::system::software_reset()
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry Point
// ═══════════════════════════════════════════════════════════════════════════

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));
    let wake = power::wake_cause();
    info!("sensenode v{} starting", env!("CARGO_PKG_VERSION"));

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    let lpwr = peripherals.LPWR;

    // ─── Power rails ─────────────────────────────────────────────────────
    // Switched on by the lifecycle before the first draw or sensor read.
    let rails = Rails::new(
        Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO7, Level::Low, OutputConfig::default()),
    );

    // ─── Shared I²C: OLED + AHT10 ────────────────────────────────────────
    let i2c = match I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(I2C_FREQUENCY_KHZ)),
    ) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO8).with_scl(peripherals.GPIO9),
        Err(e) => boot_failure("i2c config", e),
    };
    let bus = I2C_BUS.init(RefCell::new(i2c));
    let display = Oled::new(RefCellDevice::new(bus));

    // ─── Battery sense ───────────────────────────────────────────────────
    let mut adc_config = AdcConfig::new();
    let battery_pin: BatteryPin = adc_config.enable_pin(peripherals.GPIO4, Attenuation::_11dB);
    let adc: BatteryAdc = Adc::new(peripherals.ADC1, adc_config);
    let sensor = NodeSensors::new(RefCellDevice::new(bus), adc, battery_pin);

    // ─── Button ──────────────────────────────────────────────────────────
    let button = Input::new(peripherals.GPIO3, InputConfig::default().with_pull(Pull::Up));
    spawner.must_spawn(button_task(button));

    // ─── Radio + network stacks ──────────────────────────────────────────
    let radio = match esp_radio::init() {
        Ok(radio) => RADIO_CTRL.init(radio),
        Err(e) => boot_failure("radio init", e),
    };
    let (controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()) {
            Ok(parts) => parts,
            Err(e) => boot_failure("wifi init", e),
        };

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());

    let (sta, sta_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STA_RESOURCES.init(StackResources::new()),
        seed,
    );

    let [a, b, c, d] = PORTAL_AP_ADDRESS;
    let ap_address = Ipv4Addr::new(a, b, c, d);
    let (ap, ap_runner) = embassy_net::new(
        interfaces.ap,
        embassy_net::Config::ipv4_static(StaticConfigV4 {
            address: Ipv4Cidr::new(ap_address, PORTAL_AP_PREFIX_LEN),
            gateway: Some(ap_address),
            dns_servers: heapless::Vec::new(),
        }),
        AP_RESOURCES.init(StackResources::new()),
        seed.rotate_left(32),
    );

    spawner.must_spawn(net_task(sta_runner));
    spawner.must_spawn(net_task(ap_runner));
    spawner.must_spawn(radio_task(controller, sta));
    spawner.must_spawn(dhcp_task(ap, ap_address));
    spawner.must_spawn(dns_task(ap, ap_address));

    // ─── Lifecycle ───────────────────────────────────────────────────────
    let devices: Devices<Esp32c3Node> = Devices {
        clock: EmbassyClock,
        buttons: QueuedButtons::new(&BUTTON_EVENTS),
        store: FlashConfigStore::new(BlockingFlash::new(FlashStorage::new(peripherals.FLASH))),
        network: WifiLink::new(&RADIO, sta),
        api: HttpApi::new(sta),
        sensor,
        display,
        power: rails,
        portal: SetupPortal::new(&RADIO, ap),
    };

    let mut lifecycle = Lifecycle::new(devices, wake);
    match ClickDisambiguator::with_timing(&GestureTiming::DEFAULT, DISAMBIGUATION_TIMEOUT_MS) {
        Ok(clicks) => lifecycle = lifecycle.with_clicks(clicks),
        Err(e) => error!("click timing rejected: {:?}", e),
    }

    match lifecycle.run().await {
        Halt::Restart => {
            info!("restarting");
            esp_hal::system::software_reset()
        }
        Halt::DeepSleep { seconds } => power::enter_deep_sleep(lpwr, seconds),
    }
}
