use crate::{
    led_controllers::{to_rgb, LedController},
    state::{AnimationState, DisplayMode},
};
use anyhow::Result;
use enum_dispatch::enum_dispatch;
use lumen_common::Color;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Outcome of a single render tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tick {
    /// No colors to show.
    Skipped,
    /// Strip is off, nothing written.
    Idle,
    Rendered,
    /// A pause was cut short by a command or by shutdown.
    Interrupted,
}

/// Pauses between frames and pixels.
pub trait Delay {
    /// Returns `false` when the wait was cut short.
    fn delay(&self, duration: Duration) -> bool;
}

/// Flags a running render checks between pixels and inside holds.
#[derive(Clone, Default)]
pub struct Interrupts {
    command: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raised while a command waits for the shared state.
    pub fn set_command_pending(&self, pending: bool) {
        self.command.store(pending, Ordering::Release);
    }

    /// Raised once, when the app shuts down.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn is_command_pending(&self) -> bool {
        self.command.load(Ordering::Acquire)
    }
}

pub struct ThreadDelay {
    interrupts: Interrupts,
    yield_to_commands: bool,
}

impl ThreadDelay {
    const SLICE: Duration = Duration::from_millis(10);

    /// Only shutdown cuts a wait short, commands wait for the render.
    pub fn blocking(interrupts: Interrupts) -> Self {
        Self {
            interrupts,
            yield_to_commands: false,
        }
    }

    /// Also gives up as soon as a command is pending.
    pub fn interruptible(interrupts: Interrupts) -> Self {
        Self {
            interrupts,
            yield_to_commands: true,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupts.is_stopping()
            || (self.yield_to_commands && self.interrupts.is_command_pending())
    }
}

impl Delay for ThreadDelay {
    fn delay(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_interrupted() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(Self::SLICE));
        }
    }
}

#[enum_dispatch]
pub enum RunnerEnum {
    OffRunner,
    BlinkRunner,
    TrailingRunner,
}

#[enum_dispatch(RunnerEnum)]
pub trait Runner {
    fn display<C: LedController, D: Delay>(
        &self,
        color: Color,
        controller: &mut C,
        delay: &D,
    ) -> Result<Tick>;
}

impl From<&AnimationState> for RunnerEnum {
    fn from(state: &AnimationState) -> Self {
        let interval = state.interval();
        match state.mode() {
            DisplayMode::Off => OffRunner.into(),
            DisplayMode::Blink => BlinkRunner { interval }.into(),
            DisplayMode::Trailing => TrailingRunner { interval }.into(),
        }
    }
}

// Off runner
// <editor-fold>
pub struct OffRunner;

impl Runner for OffRunner {
    fn display<C: LedController, D: Delay>(&self, _: Color, _: &mut C, _: &D) -> Result<Tick> {
        // The off command already blanked the strip
        Ok(Tick::Idle)
    }
}
// </editor-fold>

// Blink runner
// <editor-fold>
pub struct BlinkRunner {
    interval: Duration,
}

impl Runner for BlinkRunner {
    fn display<C: LedController, D: Delay>(
        &self,
        color: Color,
        controller: &mut C,
        delay: &D,
    ) -> Result<Tick> {
        controller.set_all(to_rgb(color));
        controller.commit()?;

        if delay.delay(self.interval) {
            Ok(Tick::Rendered)
        } else {
            Ok(Tick::Interrupted)
        }
    }
}
// </editor-fold>

// Trailing runner
// <editor-fold>
pub struct TrailingRunner {
    interval: Duration,
}

impl Runner for TrailingRunner {
    fn display<C: LedController, D: Delay>(
        &self,
        color: Color,
        controller: &mut C,
        delay: &D,
    ) -> Result<Tick> {
        let color = to_rgb(color);
        for i in 0..controller.led_amount() {
            controller.set_individual(i, color);
            controller.commit()?;

            if !delay.delay(self.interval) {
                return Ok(Tick::Interrupted);
            }
        }

        Ok(Tick::Rendered)
    }
}
// </editor-fold>

pub struct Renderer<D: Delay> {
    delay: D,
}

impl<D: Delay> Renderer<D> {
    pub fn new(delay: D) -> Self {
        Self { delay }
    }

    /// Run one tick against the state. The caller must hold the state for
    /// the whole call.
    pub fn tick<C: LedController>(
        &self,
        state: &mut AnimationState,
        controller: &mut C,
    ) -> Result<Tick> {
        let color = match state.current_color() {
            Some(color) => color,
            None => return Ok(Tick::Skipped),
        };

        let runner = RunnerEnum::from(&*state);
        let tick = runner.display(color, controller, &self.delay)?;

        if tick != Tick::Interrupted {
            state.advance();
        }

        Ok(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led_controllers::ControllerDryRun;
    use lumen_common::Command;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingDelay {
        waits: RefCell<Vec<Duration>>,
        cut_after: Option<usize>,
    }

    impl Delay for RecordingDelay {
        fn delay(&self, duration: Duration) -> bool {
            let mut waits = self.waits.borrow_mut();
            waits.push(duration);
            self.cut_after.map_or(true, |n| waits.len() < n)
        }
    }

    fn rgb(controller: &ControllerDryRun) -> Vec<(u8, u8, u8)> {
        controller.leds().iter().map(|c| (c.r, c.g, c.b)).collect()
    }

    #[test]
    fn empty_colors_skip_the_tick() {
        let renderer = Renderer::new(RecordingDelay::default());
        let mut state = AnimationState::new(Duration::from_millis(10));
        let mut controller = ControllerDryRun::new(3);
        state.apply(Command::Blink(10), &mut controller).unwrap();

        assert_eq!(renderer.tick(&mut state, &mut controller).unwrap(), Tick::Skipped);
        assert_eq!(controller.frames(), 0);
        assert!(renderer.delay.waits.borrow().is_empty());
    }

    #[test]
    fn blink_fills_then_holds() {
        let renderer = Renderer::new(RecordingDelay::default());
        let mut state = AnimationState::new(Duration::from_millis(10));
        let mut controller = ControllerDryRun::new(3);
        state
            .apply(Command::SetColor(Color::new(255, 0, 0)), &mut controller)
            .unwrap();
        state.apply(Command::Blink(300), &mut controller).unwrap();

        assert_eq!(renderer.tick(&mut state, &mut controller).unwrap(), Tick::Rendered);
        assert_eq!(rgb(&controller), vec![(255, 0, 0); 3]);
        assert_eq!(controller.frames(), 1);
        assert_eq!(*renderer.delay.waits.borrow(), vec![Duration::from_millis(300)]);
        assert_eq!(state.cursor(), 1);
    }

    #[test]
    fn trailing_wipes_pixel_by_pixel() {
        let renderer = Renderer::new(RecordingDelay::default());
        let mut state = AnimationState::new(Duration::from_millis(10));
        let mut controller = ControllerDryRun::new(4);
        state
            .apply(Command::SetArray(vec![Color::new(0, 255, 0)]), &mut controller)
            .unwrap();
        state.apply(Command::Trailing(5), &mut controller).unwrap();

        assert_eq!(renderer.tick(&mut state, &mut controller).unwrap(), Tick::Rendered);
        assert_eq!(rgb(&controller), vec![(0, 255, 0); 4]);
        assert_eq!(controller.frames(), 4);
        assert_eq!(*renderer.delay.waits.borrow(), vec![Duration::from_millis(5); 4]);
        // Single color never moves the cursor
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn off_mode_writes_nothing_but_still_cycles() {
        let renderer = Renderer::new(RecordingDelay::default());
        let mut state = AnimationState::new(Duration::from_millis(10));
        let mut controller = ControllerDryRun::new(2);
        state
            .apply(Command::SetColor(Color::new(1, 1, 1)), &mut controller)
            .unwrap();

        assert_eq!(renderer.tick(&mut state, &mut controller).unwrap(), Tick::Idle);
        assert_eq!(controller.frames(), 0);
        assert_eq!(state.cursor(), 1);
    }

    #[test]
    fn interrupted_wipe_keeps_the_cursor() {
        let renderer = Renderer::new(RecordingDelay {
            cut_after: Some(2),
            ..Default::default()
        });
        let mut state = AnimationState::new(Duration::from_millis(10));
        let mut controller = ControllerDryRun::new(5);
        state
            .apply(
                Command::SetArray(vec![Color::new(9, 0, 0), Color::new(0, 9, 0)]),
                &mut controller,
            )
            .unwrap();
        state.apply(Command::Trailing(50), &mut controller).unwrap();

        assert_eq!(renderer.tick(&mut state, &mut controller).unwrap(), Tick::Interrupted);
        assert_eq!(controller.frames(), 2);
        assert_eq!(
            rgb(&controller),
            vec![(9, 0, 0), (9, 0, 0), (0, 0, 0), (0, 0, 0), (0, 0, 0)]
        );
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn thread_delay_gives_up_when_interrupted() {
        let interrupts = Interrupts::new();
        let delay = ThreadDelay::interruptible(interrupts.clone());
        interrupts.set_command_pending(true);
        let start = Instant::now();
        assert!(!delay.delay(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));

        interrupts.set_command_pending(false);
        assert!(delay.delay(Duration::from_millis(20)));
    }

    #[test]
    fn blocking_delay_ignores_commands_but_not_stop() {
        let interrupts = Interrupts::new();
        let delay = ThreadDelay::blocking(interrupts.clone());
        interrupts.set_command_pending(true);
        assert!(delay.delay(Duration::from_millis(20)));

        interrupts.stop();
        let start = Instant::now();
        assert!(!delay.delay(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
