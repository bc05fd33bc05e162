//! Simulated keybed.
//!
//! Virtual switches sit behind the same `embedded-hal` pin traits the
//! scanner drives on hardware, so a simulation run exercises the real scan
//! path: row drives, settle delays, bank addressing and all. The settle
//! delay advances a virtual microsecond clock, which makes the scan's own
//! duration visible in event timestamps, exactly as on a target.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use keybed_core::config::{KeybedConfig, PedalConfig, ScanConfig};
use keybed_core::debounce::ScanTimer;
use keybed_core::event::{Event, EventSink};
use keybed_core::key::Keybed;
use keybed_core::matrix::{KeySwitches, Matrix, MatrixPins, KEY_COUNT, LOW_BANK_COLS, ROWS};
use keybed_core::pedal::{PedalInput, Pedals};

use crate::script::{Action, Step};

/// Electrical state shared by every simulated pin, plus the virtual clock.
#[derive(Default)]
struct Bus {
    driven_low: [bool; ROWS],
    driven_high: [bool; ROWS],
    switches: [KeySwitches; KEY_COUNT],
    now_us: u32,
}

#[derive(Clone, Copy)]
enum Bank {
    Low,
    High,
}

struct RowPin {
    bus: Rc<RefCell<Bus>>,
    bank: Bank,
    row: usize,
}

impl OutputPin for RowPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut bus = self.bus.borrow_mut();
        match self.bank {
            Bank::Low => bus.driven_low[self.row] = false,
            Bank::High => bus.driven_high[self.row] = false,
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut bus = self.bus.borrow_mut();
        match self.bank {
            Bank::Low => bus.driven_low[self.row] = true,
            Bank::High => bus.driven_high[self.row] = true,
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Line {
    Br,
    Mk,
}

struct ColPin {
    bus: Rc<RefCell<Bus>>,
    bank: Bank,
    col: usize,
    line: Line,
}

impl InputPin for ColPin {
    type Error = Infallible;

    /// A column line reads high when any driven row has the matching
    /// switch closed in this column.
    fn is_high(&self) -> Result<bool, Infallible> {
        let bus = self.bus.borrow();
        let (driven, base) = match self.bank {
            Bank::Low => (&bus.driven_low, 0),
            Bank::High => (&bus.driven_high, LOW_BANK_COLS * ROWS),
        };
        Ok((0..ROWS).any(|row| {
            let key = base + self.col * ROWS + row;
            driven[row]
                && match self.line {
                    Line::Br => bus.switches[key].br,
                    Line::Mk => bus.switches[key].mk,
                }
        }))
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(!self.is_high()?)
    }
}

/// Settle delay that advances the virtual clock instead of sleeping.
struct VirtualDelay {
    bus: Rc<RefCell<Bus>>,
}

impl DelayUs<u32> for VirtualDelay {
    fn delay_us(&mut self, us: u32) {
        let mut bus = self.bus.borrow_mut();
        bus.now_us = bus.now_us.wrapping_add(us);
    }
}

/// Switch-level edge, expanded from a gesture step.
#[derive(Clone, Copy, Debug)]
enum Edge {
    Br { key: usize, closed: bool },
    Mk { key: usize, closed: bool },
    Pedal { down: bool },
    Expression { value: f32 },
}

/// A gesture expands to its individual contacts: a press closes BR, then
/// MK after the travel time; a release opens MK, then BR.
fn expand(steps: &[Step]) -> Vec<(u64, Edge)> {
    let mut edges = Vec::with_capacity(steps.len() * 2);
    for step in steps {
        let at = step.at_us as u64;
        match step.action {
            Action::Press { key, travel_us } => {
                edges.push((at, Edge::Br { key, closed: true }));
                edges.push((at + travel_us as u64, Edge::Mk { key, closed: true }));
            }
            Action::Release { key, travel_us } => {
                edges.push((at, Edge::Mk { key, closed: false }));
                edges.push((at + travel_us as u64, Edge::Br { key, closed: false }));
            }
            Action::PedalDown => edges.push((at, Edge::Pedal { down: true })),
            Action::PedalUp => edges.push((at, Edge::Pedal { down: false })),
            Action::Expression { value } => edges.push((at, Edge::Expression { value })),
        }
    }
    edges.sort_by_key(|(at, _)| *at);
    edges
}

#[derive(Default)]
struct Recorder {
    now: u32,
    events: Vec<(u32, Event)>,
}

impl EventSink for Recorder {
    fn emit(&mut self, event: Event) {
        self.events.push((self.now, event));
    }
}

pub struct SimOptions {
    pub scan: ScanConfig,
    pub keybed: KeybedConfig,
    pub pedal: PedalConfig,
}

/// Replay a gesture script through the full scan pipeline and collect the
/// emitted events with their virtual timestamps.
pub fn run(steps: &[Step], options: &SimOptions) -> Vec<(u32, Event)> {
    let bus = Rc::new(RefCell::new(Bus::default()));
    let bus_ref = &bus;
    let rows = |bank| std::array::from_fn(|row| RowPin { bus: bus_ref.clone(), bank, row });
    let cols = |bank, line| move |col| ColPin { bus: bus_ref.clone(), bank, col, line };
    let pins = MatrixPins {
        rows_low: rows(Bank::Low),
        rows_high: rows(Bank::High),
        br_low: std::array::from_fn(cols(Bank::Low, Line::Br)),
        mk_low: std::array::from_fn(cols(Bank::Low, Line::Mk)),
        br_high: std::array::from_fn(cols(Bank::High, Line::Br)),
        mk_high: std::array::from_fn(cols(Bank::High, Line::Mk)),
    };
    let delay = VirtualDelay { bus: bus.clone() };
    let mut matrix = Matrix::new(pins, delay, options.scan.settle_us)
        .unwrap_or_else(|never| match never {});

    let mut keybed = Keybed::new(options.keybed);
    let mut pedals = Pedals::new();
    let mut timer = ScanTimer::new(options.scan.tick_us);
    let mut sink = Recorder::default();

    let edges = expand(steps);
    let mut next = 0;
    let mut pedal_down = false;
    let mut expression = 0.0f32;

    // Run past the last edge long enough for the final transitions and
    // lockouts to play out.
    let end = edges.last().map(|(at, _)| *at).unwrap_or(0)
        + options.keybed.debounce_us as u64
        + 5 * options.scan.tick_us as u64;

    // Poll the clock faster than the tick period, like a firmware main
    // loop polling micros(); the timer decides when a scan actually runs.
    let poll_us = (options.scan.tick_us / 4).max(1) as u64;
    let mut master: u64 = 0;

    while master <= end {
        master += poll_us;
        if !timer.due(master as u32) {
            continue;
        }

        while next < edges.len() && edges[next].0 <= master {
            match edges[next].1 {
                Edge::Br { key, closed } => bus.borrow_mut().switches[key].br = closed,
                Edge::Mk { key, closed } => bus.borrow_mut().switches[key].mk = closed,
                Edge::Pedal { down } => pedal_down = down,
                Edge::Expression { value } => expression = value,
            }
            next += 1;
        }

        bus.borrow_mut().now_us = master as u32;
        let samples = matrix.scan().unwrap_or_else(|never| match never {});
        let now = bus.borrow().now_us;

        sink.now = now;
        keybed.tick(&samples, now, &mut sink);
        pedals.tick(
            PedalInput { damper: pedal_down, ring: false, expression },
            now,
            &options.pedal,
            &mut sink,
        );
    }

    sink.events
}
