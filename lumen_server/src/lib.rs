use anyhow::anyhow;
use std::{str::FromStr, time::Duration};
use structopt::StructOpt;

pub mod app;
pub mod led_controllers;
pub mod net;
pub mod runners;
pub mod state;

#[derive(Clone, Debug, StructOpt)]
pub struct Opt {
    /// UDP port to listen on for commands, unused when a broker is set.
    #[structopt(short, long, default_value = "20200")]
    pub port: u16,

    /// MQTT broker host. Commands are taken from `--topic` instead of UDP.
    #[structopt(long)]
    pub broker: Option<String>,

    #[structopt(long, default_value = "1883")]
    pub mqtt_port: u16,

    /// Topic carrying the commands.
    #[structopt(long, default_value = "lumen/commands")]
    pub topic: String,

    #[structopt(long, default_value = "lumen_server")]
    pub client_id: String,

    /// Set overall brightness.
    #[structopt(short, long, default_value = "255")]
    pub brightness: u8,

    /// Reset the LED strip and exit.
    #[structopt(short, long)]
    pub reset: bool,

    /// Led strip type: ws2811, gpio or dry-run.
    #[structopt(short, long, default_value = "ws2811")]
    pub led_type: LedStripType,

    /// Amount of LEDs on the strip.
    #[structopt(short = "c", long, default_value = "40")]
    pub led_count: usize,

    /// Data pin of the WS2811 strip.
    #[structopt(long, default_value = "18")]
    pub led_pin: i32,

    /// PWM frequency of the GPIO controller.
    #[structopt(long, default_value = "100.0")]
    pub pwm_freq: f64,

    #[structopt(long, default_value = "17")]
    pub pin_red: u8,

    #[structopt(long, default_value = "27")]
    pub pin_green: u8,

    #[structopt(long, default_value = "22")]
    pub pin_blue: u8,

    /// Period of the render loop in milliseconds.
    #[structopt(long, default_value = "100")]
    pub tick_period: u64,

    /// Delay used by blink and trailing until a command sets one, in milliseconds.
    #[structopt(long, default_value = "500")]
    pub default_interval: u64,

    /// Let incoming commands cut a running blink hold or wipe short.
    #[structopt(long)]
    pub interruptible: bool,
}

impl Opt {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period)
    }

    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LedStripType {
    Ws2811,
    Gpio,
    DryRun,
}

impl FromStr for LedStripType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ws2811" => Ok(Self::Ws2811),
            "gpio" => Ok(Self::Gpio),
            "dry-run" | "dryrun" => Ok(Self::DryRun),
            _ => Err(anyhow!("Unknown led strip type !")),
        }
    }
}
