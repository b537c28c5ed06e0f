mod app;
mod config;
mod input;
mod layout;
mod leds;
mod machine;
mod network;
mod selection;
mod submit;

use std::env::var;
use std::thread;
use std::time::{Duration, Instant};
use dotenv::dotenv;
use log::{debug, error, info, warn};
use presence_gpio::GpioBias::PullUp;
use presence_gpio::GpioDriver;
use presence_gpio::gpiod::GpiodDriver;
use presence_gpio::keypad::{ScanMode, Ttp229Keypad};
use presence_gpio::shift_register::Gpio595Chain;
use crate::app::App;
use crate::config::Config;
use crate::input::EdgeDetector;
use crate::leds::LedBank;
use crate::machine::SelectionMachine;
use crate::network::NmcliLink;
use crate::submit::{HttpTransport, SubmissionClient};

fn pin_from_env(name: &str) -> eyre::Result<usize> {
    let value = var(name).map_err(|_| eyre::eyre!("{} is not set", name))?;
    value
        .trim()
        .parse()
        .map_err(|e| eyre::eyre!("{} is not a pin number: {}", name, e))
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("Presence panel starting...");

    let chip = var("PRESENCE_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let keypad_scl_no = pin_from_env("PRESENCE_KEYPAD_PIN_SCL")?;
    let keypad_sdo_no = pin_from_env("PRESENCE_KEYPAD_PIN_SDO")?;
    let sr_data_no = pin_from_env("PRESENCE_SR_PIN_DATA")?;
    let sr_clock_no = pin_from_env("PRESENCE_SR_PIN_CLOCK")?;
    let sr_latch_no = pin_from_env("PRESENCE_SR_PIN_LATCH")?;
    let status_no = pin_from_env("PRESENCE_STATUS_PIN")?;

    info!("Keypad @ SCL: {}, SDO: {}", keypad_scl_no, keypad_sdo_no);
    info!("Shift registers @ Data: {}, Clock: {}, Latch: {}", sr_data_no, sr_clock_no, sr_latch_no);
    info!("Status @ {}", status_no);

    debug!("Loading config from {}...", Config::path().display());
    let config = Config::load_or_default(&Config::path());
    config.validate()?;
    if config.network.is_none() {
        warn!("No network configured, submissions will fail.");
    }

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip)?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing keypad driver...");
    let mut keypad_scl_pin = gpio.get_pin(keypad_scl_no)?;
    let keypad_scl_out = keypad_scl_pin.as_output()?;
    let mut keypad_sdo_pin = gpio.get_pin(keypad_sdo_no)?;
    keypad_sdo_pin.set_bias(PullUp)?;
    let keypad_sdo_in = keypad_sdo_pin.as_input()?;

    let mode = if config.keypad.multi { ScanMode::Multi } else { ScanMode::Single };
    let keypad = Ttp229Keypad::new(&*keypad_scl_out, &*keypad_sdo_in, config.keypad.inputs)
        .with_mode(mode)
        .with_settle(Duration::from_micros(config.keypad.settle_us));
    debug!("{:?} initialized.", keypad);

    debug!("Initializing shift registers...");
    let mut sr_data_pin = gpio.get_pin(sr_data_no)?;
    let sr_data_out = sr_data_pin.as_output()?;
    let mut sr_clock_pin = gpio.get_pin(sr_clock_no)?;
    let sr_clock_out = sr_clock_pin.as_output()?;
    let mut sr_latch_pin = gpio.get_pin(sr_latch_no)?;
    let sr_latch_out = sr_latch_pin.as_output()?;
    let chain = Gpio595Chain::new(&*sr_data_out, &*sr_clock_out, &*sr_latch_out);
    debug!("{:?} initialized.", chain);

    let mut status_pin = gpio.get_pin(status_no)?;
    let status_out = status_pin.as_output()?;

    let link = NmcliLink::new(var("PRESENCE_WIFI_IFACE").ok());
    let transport = HttpTransport::new(config.timing.request_timeout())?;
    let mut client = SubmissionClient::new(
        config.network.clone(),
        Box::new(link),
        Box::new(transport),
        config.leds.network,
        &config.timing,
    );

    let leds = LedBank::new(&chain, config.leds.registers);
    let mut machine = SelectionMachine::new(config.keys.clone(), config.leds.clone(), leds, &config.timing);
    machine.reset()?;

    if let Err(e) = client.check_connectivity(machine.leds_mut()) {
        warn!("Connectivity check failed: {}", e);
    }

    let edges = EdgeDetector::new(config.keypad.inputs)
        .with_min_press_interval(config.timing.min_press_interval_ticks);

    let mut app = App::new(
        &keypad,
        edges,
        machine,
        &mut client,
        &*status_out,
        config.timing.inactivity_timeout(),
    );
    app.start()?;

    info!("Presence panel initialized.");
    info!("Starting main loop...");

    let tick = config.timing.tick();
    loop {
        if let Err(e) = app.update(Instant::now()) {
            error!("Update failed: {}", e);
        }
        thread::sleep(tick);
    }
}
