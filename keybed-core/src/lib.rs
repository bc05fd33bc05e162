//! Sensing core for a dual-switch ("MK/BR") piano keybed.
//!
//! Converts raw switch transitions from an 8-row key matrix (88 keys, two
//! contacts each) and a sustain pedal into note and pedal events with
//! velocity, for a transport layer to put on the wire. Velocity comes from
//! the time between the two contacts of a key closing (or opening), measured
//! on a free-running 32-bit microsecond clock that is allowed to wrap.
//!
//! The crate is `no_std`; hardware access goes through `embedded-hal` pin
//! and delay traits, so the same scan path runs on a target MCU and against
//! simulated pins on a host. A driver is expected to run, once per fixed
//! tick period:
//!
//! 1. [`matrix::Matrix::scan`] — sample every key's switch pair
//! 2. [`key::Keybed::tick`] — advance the per-key state machines
//! 3. [`pedal::Pedals::tick`] — advance the pedal state machine
//!
//! handing emitted events to an [`event::EventSink`]. The sink is a
//! hand-off boundary: delivery and wire encoding are not this crate's
//! concern, and a sink must never block the tick.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod debounce;
pub mod event;
pub mod key;
pub mod matrix;
pub mod pedal;
pub mod velocity;

pub use config::{KeybedConfig, PedalConfig, ScanConfig, VelocityConfig};
pub use event::{Event, EventSink};
pub use key::{Keybed, KeyState};
pub use matrix::{KeySwitches, Matrix, MatrixPins, ScanState, KEY_COUNT};
pub use pedal::{PedalInput, Pedals};
