use anyhow::Result;
use log::{debug, info};
#[cfg(feature = "controller_gpio")]
use lumen_server::led_controllers::ControllerGpio;
#[cfg(feature = "controller_ws2811")]
use lumen_server::led_controllers::ControllerWs2811;
use lumen_server::{
    app::App,
    led_controllers::{ControllerDryRun, LedController},
    net::{CommandSource, MqttHandler, NetHandler},
    LedStripType, Opt,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use structopt::StructOpt;

fn main() -> Result<()> {
    env_logger::init();
    info!("Starting...");

    // Parse cmdline
    let opt: Opt = Opt::from_args();

    match opt.led_type {
        LedStripType::Ws2811 => start_ws2811(opt),
        LedStripType::Gpio => start_gpio(opt),
        LedStripType::DryRun => {
            info!("Choosed led type dry run");
            let controller = ControllerDryRun::new(opt.led_count);
            run_app(opt, controller)
        }
    }
}

#[cfg(feature = "controller_ws2811")]
fn start_ws2811(opt: Opt) -> Result<()> {
    info!("Choosed led type WS2811");
    let controller = ControllerWs2811::new(opt.led_pin, opt.led_count, opt.brightness)?;
    run_app(opt, controller)
}

#[cfg(not(feature = "controller_ws2811"))]
fn start_ws2811(_: Opt) -> Result<()> {
    anyhow::bail!("LED type WS2811 is not supported by this build !")
}

#[cfg(feature = "controller_gpio")]
fn start_gpio(opt: Opt) -> Result<()> {
    info!("Choosed led type GPIO");
    let controller = ControllerGpio::new(opt.pwm_freq, opt.pin_red, opt.pin_green, opt.pin_blue)?;
    run_app(opt, controller)
}

#[cfg(not(feature = "controller_gpio"))]
fn start_gpio(_: Opt) -> Result<()> {
    anyhow::bail!("LED type GPIO is not supported by this build !")
}

fn run_app<C: LedController + Send + 'static>(opt: Opt, mut controller: C) -> Result<()> {
    if opt.reset {
        debug!("Reset and exit");
        controller.reset()?;
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Release))?;
    }

    match &opt.broker {
        Some(broker) => {
            let source = MqttHandler::new(&opt.client_id, broker, opt.mqtt_port, &opt.topic);
            serve(&opt, controller, source, &stop)
        }
        None => {
            let source = NetHandler::new(opt.port)?;
            serve(&opt, controller, source, &stop)
        }
    }
}

fn serve<C, S>(opt: &Opt, controller: C, mut source: S, stop: &AtomicBool) -> Result<()>
where
    C: LedController + Send + 'static,
    S: CommandSource,
{
    let app = App::new(opt, controller)?;
    let res = app.run(&mut source, stop);

    info!("Stopping...");
    app.stop()?;
    res
}
