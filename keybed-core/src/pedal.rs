//! Sustain pedal input.
//!
//! The damper switch arrives on the tip contact of the pedal jack. The
//! physical switch is active-low; callers hand in the already-inverted
//! logical level (`true` = pedal down). Press is debounced; release fires
//! immediately once a press has been registered, gated only by the pressed
//! flag. The ring contact and the analog expression level are sampled and
//! retained every tick but produce no events here.

use log::debug;

use crate::config::PedalConfig;
use crate::debounce::Debounce;
use crate::event::{Event, EventSink};

/// Levels sampled from the pedal jack during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PedalInput {
    /// Damper switch on the tip contact, `true` = pedal down.
    pub damper: bool,
    /// Ring contact, sampled but not interpreted.
    pub ring: bool,
    /// Expression pedal level, normalized to `[0, 1]`.
    pub expression: f32,
}

/// Debounced damper state machine plus raw retention of the other inputs.
#[derive(Debug, Default)]
pub struct Pedals {
    damper: bool,
    damper_prev: bool,
    debounce: Debounce,
    pressed: bool,
    ring: bool,
    expression: f32,
}

impl Pedals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the pedal state by one scan tick.
    pub fn tick<S: EventSink>(
        &mut self,
        input: PedalInput,
        now: u32,
        config: &PedalConfig,
        sink: &mut S,
    ) {
        self.damper = input.damper;
        self.ring = input.ring;
        self.expression = input.expression;

        if self.damper && !self.damper_prev && !self.pressed && self.debounce.is_idle() {
            self.debounce.arm(now);
            self.pressed = true;
            debug!("damper pedal down");
            sink.emit(Event::PedalDamper { pressed: true });
        }

        self.debounce.expire(now, config.debounce_us);

        if !self.damper && self.pressed {
            // Release is not gated on the lockout; the pressed flag alone
            // guards against duplicates.
            self.debounce = Debounce::new();
            self.pressed = false;
            debug!("damper pedal up");
            sink.emit(Event::PedalDamper { pressed: false });
        }

        self.damper_prev = self.damper;
    }

    /// Debounced damper state.
    pub fn damper_pressed(&self) -> bool {
        self.pressed
    }

    /// Most recent expression pedal level.
    pub fn expression(&self) -> f32 {
        self.expression
    }

    /// Most recent ring contact level.
    pub fn ring(&self) -> bool {
        self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<Event>);

    impl EventSink for Recorder {
        fn emit(&mut self, event: Event) {
            self.0.push(event);
        }
    }

    fn down() -> PedalInput {
        PedalInput { damper: true, ..Default::default() }
    }

    fn up() -> PedalInput {
        PedalInput::default()
    }

    #[test]
    fn press_then_release_emits_one_pair() {
        let mut pedals = Pedals::new();
        let mut sink = Recorder::default();
        let config = PedalConfig::default();

        pedals.tick(up(), 0, &config, &mut sink);
        pedals.tick(down(), 1000, &config, &mut sink);
        assert!(pedals.damper_pressed());

        // Held: no further events.
        pedals.tick(down(), 2000, &config, &mut sink);
        pedals.tick(down(), 10_000, &config, &mut sink);

        pedals.tick(up(), 20_000, &config, &mut sink);
        assert!(!pedals.damper_pressed());

        assert_eq!(
            sink.0,
            vec![
                Event::PedalDamper { pressed: true },
                Event::PedalDamper { pressed: false },
            ]
        );
    }

    #[test]
    fn chatter_while_pressed_emits_nothing() {
        let mut pedals = Pedals::new();
        let mut sink = Recorder::default();
        let config = PedalConfig::default();

        pedals.tick(down(), 1000, &config, &mut sink);
        assert_eq!(sink.0.len(), 1);

        // Rising edges while the pressed flag is set are ignored; the
        // level never dropping means no release either.
        pedals.tick(down(), 1600, &config, &mut sink);
        pedals.tick(down(), 3200, &config, &mut sink);
        assert_eq!(sink.0.len(), 1);
    }

    #[test]
    fn release_is_immediate_even_inside_lockout() {
        let mut pedals = Pedals::new();
        let mut sink = Recorder::default();
        let config = PedalConfig::default();

        pedals.tick(down(), 1000, &config, &mut sink);

        // 400us later, well inside the 1500us press lockout.
        pedals.tick(up(), 1400, &config, &mut sink);
        assert_eq!(
            sink.0,
            vec![
                Event::PedalDamper { pressed: true },
                Event::PedalDamper { pressed: false },
            ]
        );

        // The release reset the lockout, so the next press is accepted at
        // once.
        pedals.tick(down(), 1600, &config, &mut sink);
        assert_eq!(sink.0.len(), 3);
        assert!(pedals.damper_pressed());
    }

    #[test]
    fn ring_and_expression_are_retained_without_events() {
        let mut pedals = Pedals::new();
        let mut sink = Recorder::default();
        let config = PedalConfig::default();

        let input = PedalInput { damper: false, ring: true, expression: 0.75 };
        pedals.tick(input, 1000, &config, &mut sink);

        assert!(pedals.ring());
        assert_eq!(pedals.expression(), 0.75);
        assert!(sink.0.is_empty());
    }
}
