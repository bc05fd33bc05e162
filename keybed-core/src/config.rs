//! Timing and curve tunables.
//!
//! Defaults are the values tuned against the development keybed. Everything
//! here is meant to be adjusted per instrument; nothing is persisted.

use crate::velocity::Window;

/// Debounce window shared by the key and pedal switch lines, microseconds.
pub const DEBOUNCE_US: u32 = 1500;

/// MIDI note of the lowest key (A0).
pub const NOTE_OFFSET: u8 = 21;

/// Velocity timing tunables, one window per travel direction.
#[derive(Clone, Copy, Debug)]
pub struct VelocityConfig {
    /// Inter-switch window for the downward travel.
    pub note_on: Window,
    /// Concavity of the note-on curve, in (0, 1). Tuned by feel; 0.042875
    /// is the other value seen in the field.
    pub note_on_bias: f32,
    /// Inter-switch window for the upward travel.
    pub note_off: Window,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            note_on: Window { min_us: 3000, max_us: 120_000 },
            note_on_bias: 0.1,
            note_off: Window { min_us: 4000, max_us: 80_000 },
        }
    }
}

/// Key state machine tunables.
#[derive(Clone, Copy, Debug)]
pub struct KeybedConfig {
    /// MIDI note emitted for key index 0.
    pub note_offset: u8,
    /// Per-line debounce window, microseconds.
    pub debounce_us: u32,
    pub velocity: VelocityConfig,
}

impl Default for KeybedConfig {
    fn default() -> Self {
        Self {
            note_offset: NOTE_OFFSET,
            debounce_us: DEBOUNCE_US,
            velocity: VelocityConfig::default(),
        }
    }
}

/// Matrix scan pacing.
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    /// Settle delay after driving a row pair, microseconds.
    pub settle_us: u32,
    /// Scan tick period, microseconds. Must cover the scan's own blocking
    /// duration (rows × settle plus processing).
    pub tick_us: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { settle_us: 8, tick_us: 600 }
    }
}

/// Pedal tunables.
#[derive(Clone, Copy, Debug)]
pub struct PedalConfig {
    /// Press debounce window, microseconds.
    pub debounce_us: u32,
}

impl Default for PedalConfig {
    fn default() -> Self {
        Self { debounce_us: DEBOUNCE_US }
    }
}
