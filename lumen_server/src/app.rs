use crate::{
    led_controllers::LedController,
    net::{CommandSource, Incoming},
    runners::{Delay, Interrupts, Renderer, ThreadDelay, Tick},
    state::{AnimationState, DisplayMode},
    Opt,
};
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use lumen_common::Command;
use parking_lot::{Mutex, MutexGuard};
use single_value_channel::Updater;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RendererMessage {
    Run,
    Exit,
}

/// Everything a command or a render tick touches, always locked as a whole.
pub struct Shared<C> {
    pub state: AnimationState,
    pub controller: C,
}

pub struct App<C: LedController + Send + 'static> {
    shared: Arc<Mutex<Shared<C>>>,
    interrupts: Interrupts,
    /// Last mode written by a command, readable without waiting for a tick.
    is_off: AtomicBool,

    runner_thread: JoinHandle<()>,
    messenger: Updater<RendererMessage>,
}

impl<C: LedController + Send + 'static> App<C> {
    pub fn new(opt: &Opt, controller: C) -> Result<Self> {
        let interrupts = Interrupts::new();
        let delay = if opt.interruptible {
            ThreadDelay::interruptible(interrupts.clone())
        } else {
            ThreadDelay::blocking(interrupts.clone())
        };

        Self::with_delay(
            opt.tick_period(),
            AnimationState::new(opt.default_interval()),
            controller,
            delay,
            interrupts,
        )
    }

    /// `interrupts` are raised while a command waits for the lock and on
    /// stop, hand them to `delay` so it can cut renders short.
    pub fn with_delay<D: Delay + Send + 'static>(
        period: Duration,
        state: AnimationState,
        controller: C,
        delay: D,
        interrupts: Interrupts,
    ) -> Result<Self> {
        let is_off = AtomicBool::new(state.mode() == DisplayMode::Off);
        let shared = Arc::new(Mutex::new(Shared { state, controller }));
        let (runner_thread, messenger) =
            Self::make_renderer_thread(period, shared.clone(), Renderer::new(delay))?;

        Ok(Self {
            shared,
            interrupts,
            is_off,
            runner_thread,
            messenger,
        })
    }

    fn make_renderer_thread<D: Delay + Send + 'static>(
        period: Duration,
        shared: Arc<Mutex<Shared<C>>>,
        renderer: Renderer<D>,
    ) -> Result<(JoinHandle<()>, Updater<RendererMessage>)> {
        let (mut receiver, updater) =
            single_value_channel::channel_starting_with(RendererMessage::Run);

        let handle = std::thread::Builder::new()
            .name("Led Renderer Thread".into())
            .spawn(move || {
                loop {
                    let start = Instant::now();
                    if *receiver.latest() == RendererMessage::Exit {
                        break;
                    }

                    let mut guard = shared.lock();
                    let Shared { state, controller } = &mut *guard;
                    match renderer.tick(state, controller) {
                        Ok(Tick::Interrupted) => debug!("Render interrupted"),
                        Ok(_) => {}
                        Err(err) => error!("Render failed: {}", err),
                    }
                    // Let a waiting command in before the next tick
                    MutexGuard::unlock_fair(guard);

                    // Wait for the rest of the period
                    if let Some(rest) = period.checked_sub(start.elapsed()) {
                        std::thread::sleep(rest);
                    }
                }

                info!("Renderer thread exit");
            })?;
        debug!("Spawned renderer thread !");

        Ok((handle, updater))
    }

    /// Pull payloads from `source` until it closes or `stop` is raised.
    pub fn run<S: CommandSource>(&self, source: &mut S, stop: &AtomicBool) -> Result<()> {
        while !stop.load(Ordering::Acquire) {
            match source.next_payload()? {
                Incoming::Payload(payload) => self.handle_payload(&payload),
                Incoming::Timeout => {}
                Incoming::Closed => {
                    info!("Command channel closed");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Decode and apply one message. Bad input is logged and dropped.
    pub fn handle_payload(&self, payload: &[u8]) {
        match Command::from_payload(payload) {
            Ok(command) => {
                debug!("Command: {:?}", command);
                if let Err(err) = self.apply(command) {
                    error!("Failed to apply command: {}", err);
                }
            }
            Err(err) => warn!("Dropping message: {}", err),
        }
    }

    pub fn apply(&self, command: Command) -> Result<()> {
        if !self.changes_state(&command) {
            debug!("{:?} has nothing to change, ignored", command);
            return Ok(());
        }

        self.interrupts.set_command_pending(true);
        let mut guard = self.shared.lock();
        self.interrupts.set_command_pending(false);

        let Shared { state, controller } = &mut *guard;
        let res = state.apply(command, controller);
        self.is_off
            .store(state.mode() == DisplayMode::Off, Ordering::Release);
        res
    }

    /// Commands that would leave the state untouched must not interrupt a
    /// running render.
    fn changes_state(&self, command: &Command) -> bool {
        match command {
            Command::NoOp => false,
            Command::On => self.is_off.load(Ordering::Acquire),
            _ => true,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.shared.lock().state.clone()
    }

    pub fn with_controller<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.shared.lock().controller)
    }

    /// Stop rendering and blank the strip.
    pub fn stop(self) -> Result<()> {
        self.messenger.update(RendererMessage::Exit)?;
        // Don't wait for a long wipe to finish
        self.interrupts.stop();
        self.runner_thread
            .join()
            .map_err(|_| anyhow!("Renderer thread panicked !"))?;

        let mut shared = self.shared.lock();
        shared.controller.reset()
    }
}
