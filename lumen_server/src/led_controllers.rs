use anyhow::Result;
use cichlid::ColorRGB;
use log::debug;
use lumen_common::Color;
#[cfg(feature = "controller_gpio")]
use rppal::gpio::{Gpio, OutputPin};
#[cfg(feature = "controller_ws2811")]
use rs_ws281x::{ChannelBuilder, ControllerBuilder, RawColor, StripType};

/// Frame sink. Nothing reaches the LEDs before `commit`.
pub trait LedController {
    fn led_amount(&self) -> usize;
    fn set_all(&mut self, color: ColorRGB);
    fn set_individual(&mut self, i: usize, color: ColorRGB);
    fn commit(&mut self) -> Result<()>;

    fn reset(&mut self) -> Result<()>;
}

pub fn to_rgb(color: Color) -> ColorRGB {
    ColorRGB::new(color.r, color.g, color.b)
}

// Controller WS2811
// <editor-fold>
#[cfg(feature = "controller_ws2811")]
pub struct ControllerWs2811 {
    inner: rs_ws281x::Controller,
}

#[cfg(feature = "controller_ws2811")]
unsafe impl Send for ControllerWs2811 {}

#[cfg(feature = "controller_ws2811")]
impl ControllerWs2811 {
    // Default: 800kHz
    const LED_FREQ: u32 = 800_000;
    // DO NOT USE 5 on RPi
    const LED_DMA: i32 = 10;
    // Don't change
    const LED_CHANNEL: usize = 0;

    pub const COLOR_OFF: RawColor = [0, 0, 0, 0];

    pub fn new(pin: i32, led_count: usize, brightness: u8) -> Result<Self> {
        let inner = ControllerBuilder::new()
            .freq(Self::LED_FREQ)
            .dma(Self::LED_DMA)
            .channel(
                Self::LED_CHANNEL,
                ChannelBuilder::new()
                    .pin(pin)
                    .count(led_count as i32)
                    .strip_type(StripType::Ws2811Gbr)
                    .invert(false)
                    .brightness(brightness)
                    .build(),
            )
            .build()?;

        Ok(Self { inner })
    }
}

#[cfg(feature = "controller_ws2811")]
impl LedController for ControllerWs2811 {
    fn led_amount(&self) -> usize {
        self.inner.leds(Self::LED_CHANNEL).len()
    }

    fn set_all(&mut self, color: ColorRGB) {
        let raw = [color.r, color.g, color.b, 0];
        for led in self.inner.leds_mut(Self::LED_CHANNEL) {
            *led = raw;
        }
    }

    fn set_individual(&mut self, i: usize, color: ColorRGB) {
        if let Some(led) = self.inner.leds_mut(Self::LED_CHANNEL).get_mut(i) {
            *led = [color.r, color.g, color.b, 0];
        }
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.render()?;
        self.inner.wait()?;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        for led in self.inner.leds_mut(Self::LED_CHANNEL) {
            *led = Self::COLOR_OFF;
        }
        self.commit()
    }
}
// </editor-fold>

// GPIO Controller
// A plain RGB strip, every LED shows the same color.
// <editor-fold>
#[cfg(feature = "controller_gpio")]
pub struct ControllerGpio {
    _gpio: Gpio,
    freq: f64,
    pins: [OutputPin; 3],
    pending: ColorRGB,
}

#[cfg(feature = "controller_gpio")]
impl ControllerGpio {
    pub fn new(freq: f64, red: u8, green: u8, blue: u8) -> Result<Self> {
        let gpio = Gpio::new()?;
        let red = gpio.get(red)?.into_output();
        let green = gpio.get(green)?.into_output();
        let blue = gpio.get(blue)?.into_output();
        let pins = [red, green, blue];

        let mut controller = Self {
            _gpio: gpio,
            freq,
            pins,
            pending: ColorRGB::Black,
        };
        controller.reset()?;
        Ok(controller)
    }
}

#[cfg(feature = "controller_gpio")]
impl LedController for ControllerGpio {
    fn led_amount(&self) -> usize {
        1
    }

    fn set_all(&mut self, color: ColorRGB) {
        self.pending = color;
    }

    fn set_individual(&mut self, _: usize, color: ColorRGB) {
        self.set_all(color);
    }

    fn commit(&mut self) -> Result<()> {
        let values = [self.pending.r, self.pending.g, self.pending.b];
        for (pin, value) in self.pins.iter_mut().zip(values.iter()) {
            pin.set_pwm_frequency(self.freq, *value as f64 / 255.0)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.pending = ColorRGB::Black;
        for pin in self.pins.iter_mut() {
            pin.clear_pwm()?;
            pin.set_low();
        }
        Ok(())
    }
}
// </editor-fold>

// Dry run controller
// Keeps the pixels in memory and logs every committed frame.
// <editor-fold>
pub struct ControllerDryRun {
    leds: Vec<ColorRGB>,
    frames: usize,
}

impl ControllerDryRun {
    pub fn new(led_count: usize) -> Self {
        Self {
            leds: vec![ColorRGB::Black; led_count],
            frames: 0,
        }
    }

    pub fn leds(&self) -> &[ColorRGB] {
        &self.leds
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl LedController for ControllerDryRun {
    fn led_amount(&self) -> usize {
        self.leds.len()
    }

    fn set_all(&mut self, color: ColorRGB) {
        for led in self.leds.iter_mut() {
            *led = color;
        }
    }

    fn set_individual(&mut self, i: usize, color: ColorRGB) {
        if let Some(led) = self.leds.get_mut(i) {
            *led = color;
        }
    }

    fn commit(&mut self) -> Result<()> {
        self.frames += 1;
        if log::log_enabled!(log::Level::Debug) {
            let pixels: Vec<String> = self
                .leds
                .iter()
                .map(|c| Color::new(c.r, c.g, c.b).to_string())
                .collect();
            debug!("Frame #{}: [{}]", self.frames, pixels.join(" "));
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.set_all(ColorRGB::Black);
        self.commit()
    }
}
// </editor-fold>
