//! Pin bank: a GPIO line manager generalizing fixed per-panel
//! RST/DC/BUSY/PWR wiring into named-line setup, read/write, and
//! edge-subscription over arbitrary BCM line numbers.
//!
//! `rppal` doesn't expose the raw edge-event file descriptor a `select()`
//! loop could poll directly; the event thread below instead polls every
//! subscribed line's level once per tick and synthesizes a transition when
//! it differs from the previous tick. Functionally equivalent delivery, at
//! the cost of up to one tick of added latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rppal::gpio::{Gpio as RppalGpio, InputPin, OutputPin};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Error)]
pub enum PinError {
    #[error(transparent)]
    Rppal(#[from] rppal::gpio::Error),
    #[error("line {0} is not configured")]
    Unconfigured(u8),
    #[error("line {0} is configured as {1:?}, not valid for this operation")]
    InvalidState(u8, LineMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBias {
    Off,
    PullDown,
    PullUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTransition {
    Rising,
    Falling,
}

type Handler = Arc<dyn Fn(u8, LineTransition, u128) + Send + Sync>;

enum LineIo {
    Input(InputPin),
    Output(OutputPin),
}

struct Line {
    mode: LineMode,
    bias: LineBias,
    io: LineIo,
    last_level: Option<bool>,
    handlers: Vec<Handler>,
}

/// A handle returned by [`PinBank::subscribe`]. Dropping it does not cancel
/// the subscription; the bank has no unsubscribe operation.
#[derive(Debug, Clone, Copy)]
pub struct Subscription {
    pub line: u8,
}

/// Single mutex guards the whole `line -> Line` map; acquired by every
/// public operation and by the event thread on each poll tick.
pub struct PinBank {
    gpio: RppalGpio,
    lines: Arc<Mutex<HashMap<u8, Line>>>,
    stop: Arc<AtomicBool>,
    event_thread: Option<JoinHandle<()>>,
}

impl PinBank {
    pub fn new() -> Result<Self, PinError> {
        let gpio = RppalGpio::new()?;
        let lines: Arc<Mutex<HashMap<u8, Line>>> = Arc::new(Mutex::new(HashMap::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let event_thread = {
            let lines = Arc::clone(&lines);
            let stop = Arc::clone(&stop);
            let start = Instant::now();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    {
                        let mut lines = lines.lock().expect("pin bank mutex poisoned");
                        for (&line_no, line) in lines.iter_mut() {
                            if line.handlers.is_empty() {
                                continue;
                            }
                            let LineIo::Input(pin) = &line.io else { continue };
                            let level = pin.is_high();
                            if let Some(prev) = line.last_level {
                                if prev != level {
                                    let transition =
                                        if level { LineTransition::Rising } else { LineTransition::Falling };
                                    let timestamp = start.elapsed().as_nanos();
                                    for handler in &line.handlers {
                                        handler(line_no, transition, timestamp);
                                    }
                                }
                            }
                            line.last_level = Some(level);
                        }
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
        };

        Ok(Self { gpio, lines, stop, event_thread: Some(event_thread) })
    }

    /// Idempotent in `(mode, bias)`; re-calling reconfigures the line
    /// atomically, dropping any existing subscription handlers.
    pub fn setup_line(&self, line: u8, mode: LineMode, bias: LineBias) -> Result<(), PinError> {
        let io = match mode {
            LineMode::Output => {
                let pin = self.gpio.get(line)?.into_output();
                LineIo::Output(pin)
            }
            LineMode::Input => {
                let pin = match bias {
                    LineBias::Off => self.gpio.get(line)?.into_input(),
                    LineBias::PullDown => self.gpio.get(line)?.into_input_pulldown(),
                    LineBias::PullUp => self.gpio.get(line)?.into_input_pullup(),
                };
                LineIo::Input(pin)
            }
        };

        let mut lines = self.lines.lock().expect("pin bank mutex poisoned");
        lines.insert(line, Line { mode, bias, io, last_level: None, handlers: Vec::new() });
        Ok(())
    }

    pub fn release_line(&self, line: u8) {
        let mut lines = self.lines.lock().expect("pin bank mutex poisoned");
        lines.remove(&line);
    }

    pub fn read(&self, line: u8) -> Result<bool, PinError> {
        let lines = self.lines.lock().expect("pin bank mutex poisoned");
        let l = lines.get(&line).ok_or(PinError::Unconfigured(line))?;
        match &l.io {
            LineIo::Input(pin) => Ok(pin.is_high()),
            LineIo::Output(_) => Err(PinError::InvalidState(line, LineMode::Output)),
        }
    }

    pub fn write(&self, line: u8, high: bool) -> Result<(), PinError> {
        let mut lines = self.lines.lock().expect("pin bank mutex poisoned");
        let l = lines.get_mut(&line).ok_or(PinError::Unconfigured(line))?;
        match &mut l.io {
            LineIo::Output(pin) => {
                if high {
                    pin.set_high();
                } else {
                    pin.set_low();
                }
                Ok(())
            }
            LineIo::Input(_) => Err(PinError::InvalidState(line, LineMode::Input)),
        }
    }

    /// Registers `handler` to run on the bank's event thread for every edge
    /// of `line`. `handler` must not block and must not call back into
    /// `setup_line`/`release_line` (it would deadlock on this bank's mutex).
    pub fn subscribe(
        &self,
        line: u8,
        handler: impl Fn(u8, LineTransition, u128) + Send + Sync + 'static,
    ) -> Result<Subscription, PinError> {
        let mut lines = self.lines.lock().expect("pin bank mutex poisoned");
        let l = lines.get_mut(&line).ok_or(PinError::Unconfigured(line))?;
        if l.mode != LineMode::Input {
            return Err(PinError::InvalidState(line, l.mode));
        }
        l.handlers.push(Arc::new(handler));
        Ok(Subscription { line })
    }

    pub fn mode_of(&self, line: u8) -> Option<LineMode> {
        self.lines.lock().expect("pin bank mutex poisoned").get(&line).map(|l| l.mode)
    }
}

impl Drop for PinBank {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.event_thread.take() {
            let _ = handle.join();
        }
    }
}
