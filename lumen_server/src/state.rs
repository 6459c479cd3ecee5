use crate::led_controllers::{to_rgb, LedController};
use anyhow::Result;
use log::{debug, info, warn};
use lumen_common::{Color, Command};
use std::time::Duration;

/// What the render loop is currently showing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisplayMode {
    Off,
    Blink,
    Trailing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationState {
    mode: DisplayMode,
    /// Mode restored by `on`, only written when switching off.
    previous_mode: DisplayMode,
    colors: Vec<Color>,
    cursor: usize,
    interval: Duration,
}

impl AnimationState {
    pub fn new(interval: Duration) -> Self {
        Self {
            mode: DisplayMode::Off,
            previous_mode: DisplayMode::Off,
            colors: Vec::new(),
            cursor: 0,
            interval,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn previous_mode(&self) -> DisplayMode {
        self.previous_mode
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn current_color(&self) -> Option<Color> {
        self.colors.get(self.cursor).copied()
    }

    /// Step to the next color, wrapping around.
    pub fn advance(&mut self) {
        if self.colors.len() > 1 {
            self.cursor = (self.cursor + 1) % self.colors.len();
        }
    }

    /// Apply a decoded command. `off` writes its black frame right away
    /// instead of waiting for the next tick.
    pub fn apply<C: LedController>(&mut self, command: Command, controller: &mut C) -> Result<()> {
        match command {
            Command::NoOp => {
                debug!("Unknown operation, ignored");
            }
            Command::Blink(delay) => self.set_mode(DisplayMode::Blink, Duration::from_millis(delay)),
            Command::Trailing(delay) => {
                self.set_mode(DisplayMode::Trailing, Duration::from_millis(delay))
            }
            Command::Off => {
                info!("Setting off");
                self.previous_mode = self.mode;
                self.mode = DisplayMode::Off;
                controller.set_all(to_rgb(Color::BLACK));
                controller.commit()?;
            }
            Command::On => {
                if self.mode != DisplayMode::Off {
                    debug!("Already on ({:?}), ignored", self.mode);
                    return Ok(());
                }

                // Two `off` in a row leave nothing to resume
                if self.previous_mode == DisplayMode::Off {
                    warn!("Nothing to resume, previous mode is off too");
                    return Ok(());
                }
                self.set_mode(self.previous_mode, self.interval);
            }
            Command::SetColor(color) => {
                info!("Setting color #{}", color);
                self.replace_colors(vec![color, Color::BLACK]);
            }
            Command::SetArray(colors) => {
                info!("Setting {} colors", colors.len());
                self.replace_colors(colors);
            }
        }

        Ok(())
    }

    fn set_mode(&mut self, mode: DisplayMode, interval: Duration) {
        info!("Setting {:?} every {}ms", mode, interval.as_millis());
        self.mode = mode;
        self.interval = interval;
    }

    fn replace_colors(&mut self, colors: Vec<Color>) {
        self.colors = colors;
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led_controllers::ControllerDryRun;

    const RED: Color = Color::new(255, 0, 0);
    const GREEN: Color = Color::new(0, 255, 0);
    const BLUE: Color = Color::new(0, 0, 255);

    fn state() -> (AnimationState, ControllerDryRun) {
        (AnimationState::new(Duration::from_millis(500)), ControllerDryRun::new(4))
    }

    #[test]
    fn initial_state() {
        let (state, _) = state();
        assert_eq!(state.mode(), DisplayMode::Off);
        assert!(state.colors().is_empty());
        assert_eq!(state.current_color(), None);
        assert_eq!(state.interval(), Duration::from_millis(500));
    }

    #[test]
    fn blink_and_trailing_set_mode_and_interval() {
        let (mut state, mut controller) = state();
        state.apply(Command::Blink(300), &mut controller).unwrap();
        assert_eq!(state.mode(), DisplayMode::Blink);
        assert_eq!(state.interval(), Duration::from_millis(300));

        state.apply(Command::Trailing(20), &mut controller).unwrap();
        assert_eq!(state.mode(), DisplayMode::Trailing);
        assert_eq!(state.interval(), Duration::from_millis(20));
        assert_eq!(controller.frames(), 0);
    }

    #[test]
    fn set_color_pairs_with_black() {
        let (mut state, mut controller) = state();
        state.apply(Command::SetColor(RED), &mut controller).unwrap();
        assert_eq!(state.colors(), &[RED, Color::BLACK]);
        // Colors never change the mode
        assert_eq!(state.mode(), DisplayMode::Off);
    }

    #[test]
    fn replacing_colors_resets_cursor() {
        let (mut state, mut controller) = state();
        state
            .apply(Command::SetArray(vec![RED, GREEN, BLUE]), &mut controller)
            .unwrap();
        state.advance();
        state.advance();
        assert_eq!(state.cursor(), 2);

        state.apply(Command::SetColor(GREEN), &mut controller).unwrap();
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.current_color(), Some(GREEN));

        state.apply(Command::SetArray(vec![]), &mut controller).unwrap();
        assert_eq!(state.current_color(), None);
    }

    #[test]
    fn advance_wraps_and_ignores_single_color() {
        let (mut state, mut controller) = state();
        state.apply(Command::SetArray(vec![RED]), &mut controller).unwrap();
        state.advance();
        assert_eq!(state.cursor(), 0);

        state.apply(Command::SetArray(vec![RED, GREEN]), &mut controller).unwrap();
        let seen: Vec<usize> = (0..5)
            .map(|_| {
                state.advance();
                state.cursor()
            })
            .collect();
        assert_eq!(seen, vec![1, 0, 1, 0, 1]);
    }

    #[test]
    fn off_blanks_immediately() {
        let (mut state, mut controller) = state();
        controller.set_all(to_rgb(RED));
        state.apply(Command::Blink(100), &mut controller).unwrap();
        state.apply(Command::Off, &mut controller).unwrap();

        assert_eq!(state.mode(), DisplayMode::Off);
        assert_eq!(state.previous_mode(), DisplayMode::Blink);
        assert_eq!(controller.frames(), 1);
        assert!(controller.leds().iter().all(|c| (c.r, c.g, c.b) == (0, 0, 0)));
    }

    #[test]
    fn off_then_on_restores_mode_and_interval() {
        let (mut state, mut controller) = state();
        state.apply(Command::Trailing(42), &mut controller).unwrap();
        let before = state.clone();

        state.apply(Command::Off, &mut controller).unwrap();
        state.apply(Command::On, &mut controller).unwrap();
        assert_eq!(state.mode(), before.mode());
        assert_eq!(state.interval(), before.interval());
    }

    #[test]
    fn on_while_running_is_a_noop() {
        let (mut state, mut controller) = state();
        state.apply(Command::SetColor(BLUE), &mut controller).unwrap();
        state.apply(Command::Blink(250), &mut controller).unwrap();
        let before = state.clone();

        state.apply(Command::On, &mut controller).unwrap();
        assert_eq!(state, before);
        assert_eq!(controller.frames(), 0);
    }

    #[test]
    fn double_off_leaves_nothing_to_resume() {
        let (mut state, mut controller) = state();
        state.apply(Command::Blink(250), &mut controller).unwrap();
        state.apply(Command::Off, &mut controller).unwrap();
        state.apply(Command::Off, &mut controller).unwrap();
        assert_eq!(state.previous_mode(), DisplayMode::Off);
        let before = state.clone();

        state.apply(Command::On, &mut controller).unwrap();
        assert_eq!(state, before);
        // Only the two off frames, resuming nothing writes nothing
        assert_eq!(controller.frames(), 2);
    }

    #[test]
    fn noop_changes_nothing() {
        let (mut state, mut controller) = state();
        state.apply(Command::SetColor(RED), &mut controller).unwrap();
        let before = state.clone();
        state.apply(Command::NoOp, &mut controller).unwrap();
        assert_eq!(state, before);
    }
}
