//! Per-key state machine.
//!
//! Each key reports two switch contacts: the upper "BR" line closes early
//! in the downward travel, the lower "MK" line at the bottom. A key walks
//! UP → GOING_DOWN → DOWN → GOING_UP → UP; the time between the two
//! contacts in each direction feeds the velocity model. Each line carries
//! its own debounce lockout, and a gesture abandoned mid-travel rolls back
//! to its last stable state without emitting anything.

use log::debug;

use crate::config::KeybedConfig;
use crate::debounce::{elapsed_micros, Debounce};
use crate::event::{Event, EventSink};
use crate::matrix::{KeySwitches, ScanState, KEY_COUNT};
use crate::velocity;

/// Travel phase of one key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyState {
    /// At rest.
    #[default]
    Up,
    /// BR closed, MK not yet reached.
    GoingDown,
    /// Both contacts closed, note sounding.
    Down,
    /// BR reopened during release, MK still closed.
    GoingUp,
}

/// One switch line: the level sampled this scan, the level as of the last
/// accepted transition, and the line's debounce lockout.
///
/// Edges are detected against the accepted level rather than the previous
/// scan, so an edge that lands inside a live lockout window is taken once
/// the window clears instead of being lost.
#[derive(Clone, Copy, Debug, Default)]
struct TriggerLine {
    level: bool,
    accepted: bool,
    debounce: Debounce,
}

impl TriggerLine {
    /// Closed now, open as of the last accepted transition.
    fn rose(&self) -> bool {
        self.level && !self.accepted
    }

    /// Open now, closed as of the last accepted transition.
    fn fell(&self) -> bool {
        !self.level && self.accepted
    }

    /// Take the current level as the new reference and start a lockout.
    fn accept(&mut self, now: u32) {
        self.accepted = self.level;
        self.debounce.arm(now);
    }
}

/// State for one physical key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Key {
    state: KeyState,
    br: TriggerLine,
    mk: TriggerLine,
    /// Timestamp of the edge that started the traversal in progress.
    started_at: u32,
}

impl Key {
    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Advance the state machine by one scan tick.
    ///
    /// At most one transition per tick. Main transitions run first, then
    /// the per-line lockouts expire, then the abort checks — so an abort
    /// can fire on the very tick its lockout clears.
    fn update<S: EventSink>(
        &mut self,
        sample: KeySwitches,
        now: u32,
        note: u8,
        config: &KeybedConfig,
        sink: &mut S,
    ) {
        self.br.level = sample.br;
        self.mk.level = sample.mk;

        match self.state {
            KeyState::Up if self.br.rose() && self.br.debounce.is_idle() => {
                self.br.accept(now);
                self.state = KeyState::GoingDown;
                self.started_at = now;
            }
            KeyState::GoingDown if self.mk.rose() && self.mk.debounce.is_idle() => {
                self.mk.accept(now);
                self.state = KeyState::Down;

                let window = config.velocity.note_on;
                let travel = window.normalize(elapsed_micros(self.started_at, now));
                let velocity = velocity::note_on(travel, &window, config.velocity.note_on_bias);
                debug!("note {note} on: travel {travel}us, velocity {velocity:.3}");
                sink.emit(Event::NoteOn { note, velocity });
            }
            KeyState::Down if self.mk.fell() && self.mk.debounce.is_idle() => {
                self.mk.accept(now);
                self.state = KeyState::GoingUp;
                self.started_at = now;
            }
            KeyState::GoingUp if self.br.fell() && self.br.debounce.is_idle() => {
                self.br.accept(now);
                self.state = KeyState::Up;

                let window = config.velocity.note_off;
                let travel = window.normalize(elapsed_micros(self.started_at, now));
                let velocity = velocity::note_off(travel, &window);
                debug!("note {note} off: travel {travel}us, velocity {velocity:.3}");
                sink.emit(Event::NoteOff { note, velocity });
            }
            _ => {}
        }

        self.br.debounce.expire(now, config.debounce_us);
        self.mk.debounce.expire(now, config.debounce_us);

        // Abandoned gestures roll back without an event: a key released
        // before MK ever closed was never a note, and a key pressed again
        // before BR reopened never stopped being one.
        match self.state {
            KeyState::GoingDown if !self.br.level && self.br.debounce.is_idle() => {
                self.br.accepted = false;
                self.state = KeyState::Up;
            }
            KeyState::GoingUp if self.mk.level && self.mk.debounce.is_idle() => {
                self.mk.accepted = true;
                self.state = KeyState::Down;
            }
            _ => {}
        }
    }
}

/// All 88 keys plus the tunables, owned as one unit by the scan driver.
pub struct Keybed {
    keys: [Key; KEY_COUNT],
    config: KeybedConfig,
}

impl Keybed {
    pub fn new(config: KeybedConfig) -> Self {
        Self { keys: [Key::default(); KEY_COUNT], config }
    }

    /// Run one scan tick over every key, emitting events into `sink`.
    pub fn tick<S: EventSink>(&mut self, samples: &ScanState, now: u32, sink: &mut S) {
        for (index, (key, sample)) in self.keys.iter_mut().zip(samples.iter()).enumerate() {
            let note = self.config.note_offset + index as u8;
            key.update(*sample, now, note, &self.config, sink);
        }
    }

    pub fn key_state(&self, index: usize) -> KeyState {
        self.keys[index].state()
    }
}
