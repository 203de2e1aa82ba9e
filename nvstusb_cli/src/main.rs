use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use nvstusb::emitter::firmware::FirmwareSource;
use nvstusb::emitter::loader::ReconnectPolicy;
use nvstusb::{Eye, LibusbBus, Session, UsbHandle};

const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drive an Nvidia 3D Vision USB emitter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Refresh rate in Hz (60 to 120)
    #[arg(short, long, default_value_t = nvstusb::DEFAULT_RATE)]
    rate: f64,

    /// Configure the emitter, then watch its buttons instead of toggling eyes
    #[arg(short, long)]
    daemon: bool,

    /// Firmware image to upload when the emitter has none running
    #[arg(short, long, env = "NVSTUSB_FIRMWARE")]
    firmware: Option<PathBuf>,

    /// Swap left and right
    #[arg(long)]
    invert_eyes: bool,

    /// Discovery attempts after the post-upload reset
    #[arg(long, default_value_t = 1)]
    reconnect_attempts: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let context = match rusb::Context::new() {
        Ok(context) => context,
        Err(err) => {
            error!("could not initialize libusb: {}", err);
            process::exit(1);
        }
    };

    let firmware = match &args.firmware {
        Some(path) => FirmwareSource::File(path.clone()),
        None => FirmwareSource::Embedded,
    };

    let policy = ReconnectPolicy {
        attempts: args.reconnect_attempts,
        ..ReconnectPolicy::default()
    };

    let mut bus = LibusbBus::new(context);
    let mut session = match Session::connect(&mut bus, &firmware, &policy) {
        Ok(session) => session,
        Err(err) => {
            error!("could not bring up the emitter: {}", err);
            process::exit(1);
        }
    };

    session.set_invert_eyes(args.invert_eyes);

    if let Err(err) = session.set_rate(args.rate) {
        error!("could not set rate: {}", err);
        process::exit(1);
    }

    info!("Emitter running at {} Hz", session.rate());

    if args.daemon {
        watch_keys(&mut session);
    } else {
        toggle_eyes(&mut session);
    }
}

fn toggle_eyes<H: UsbHandle>(session: &mut Session<H>) -> ! {
    let half_period = Duration::from_secs_f64(1.0 / session.rate());

    loop {
        for eye in [Eye::Left, Eye::Right] {
            if let Err(err) = session.set_eye(eye) {
                warn!("dropped {} eye: {}", eye, err);
            }
            thread::sleep(half_period);
        }
    }
}

fn watch_keys<H: UsbHandle>(session: &mut Session<H>) -> ! {
    loop {
        match session.read_keys() {
            Ok(keys) => {
                if keys.toggled_3d {
                    let invert = !session.invert_eyes();
                    session.set_invert_eyes(invert);
                    info!("3D button pressed, eyes inverted: {}", invert);
                }
                if keys.delta_wheel != 0 || keys.pressed_delta_wheel != 0 {
                    info!(
                        "Wheel moved {} ({} while pressed)",
                        keys.delta_wheel, keys.pressed_delta_wheel
                    );
                }
            }
            Err(err) => warn!("could not read keys: {}", err),
        }

        thread::sleep(KEY_POLL_INTERVAL);
    }
}
