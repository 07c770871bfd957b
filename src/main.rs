use color_eyre::Result;
use joypoll::config::Config;
use joypoll::joystick::JoystickHandle;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = Config::load_or_default();
    info!(
        "Watching joystick {} (deadzones: locomotion {:.2}, ptu {:.2})",
        config.device.display(),
        config.deadzone_locomotion,
        config.deadzone_ptu
    );

    let handle = JoystickHandle::spawn(config.joystick_settings());
    let mut output = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            changed = output.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = output.borrow_and_update().clone();
                if snapshot.connected {
                    info!(
                        name = snapshot.device_name.as_deref().unwrap_or("?"),
                        axes = ?snapshot.axes,
                        buttons = ?snapshot.buttons,
                        "state"
                    );
                } else {
                    info!("joystick disconnected");
                }
            }
        }
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
