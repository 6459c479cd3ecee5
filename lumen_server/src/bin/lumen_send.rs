use anyhow::Result;
use lumen_common::{Color, Command};
use lumen_server::net::send_command;
use structopt::StructOpt;

/// Send a single command to a running lumen_server.
#[derive(Debug, StructOpt)]
struct Opt {
    /// Host running the server.
    #[structopt(long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the server.
    #[structopt(short, long, default_value = "20200")]
    port: u16,

    #[structopt(subcommand)]
    action: Action,
}

#[derive(Debug, StructOpt)]
enum Action {
    /// Flash the colors one after the other.
    Blink {
        /// Delay between colors in milliseconds.
        delay: u64,
    },
    /// Wipe the colors across the strip.
    Trailing {
        /// Delay between pixels in milliseconds.
        delay: u64,
    },
    Off,
    /// Resume whatever was running before off.
    On,
    /// Alternate a single color with black.
    Color { color: Color },
    /// Cycle through a list of colors.
    Array {
        #[structopt(required = true)]
        colors: Vec<Color>,
    },
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::Blink { delay } => Command::Blink(delay),
            Action::Trailing { delay } => Command::Trailing(delay),
            Action::Off => Command::Off,
            Action::On => Command::On,
            Action::Color { color } => Command::SetColor(color),
            Action::Array { colors } => Command::SetArray(colors),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let command = Command::from(opt.action);
    send_command((opt.host.as_str(), opt.port), &command)?;
    log::info!("Sent {:?}", command);

    Ok(())
}
