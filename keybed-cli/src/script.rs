//! Gesture script parsing.
//!
//! One timed action per line: `<time_us> <action> <args...>`. Blank lines
//! and `#` comments are skipped. Keys are named by MIDI note number
//! (21..=108).
//!
//! ```text
//! 0       press 60 5000      # strike note 60, 5000us between contacts
//! 500000  release 60 20000
//! 700000  pedal down
//! 800000  expression 0.5
//! 900000  pedal up
//! ```

use anyhow::{bail, ensure, Context, Result};

use keybed_core::config::NOTE_OFFSET;
use keybed_core::matrix::KEY_COUNT;

/// One scripted action.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// BR contact closes now; MK follows after the travel time.
    Press { key: usize, travel_us: u32 },
    /// MK contact opens now; BR follows after the travel time.
    Release { key: usize, travel_us: u32 },
    PedalDown,
    PedalUp,
    /// Set the expression pedal level.
    Expression { value: f32 },
}

/// An action with its start time on the virtual clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    pub at_us: u32,
    pub action: Action,
}

/// Parse a whole script, sorted by start time.
pub fn parse(contents: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let step = parse_line(line).with_context(|| format!("line {}", lineno + 1))?;
        steps.push(step);
    }
    steps.sort_by_key(|step| step.at_us);
    Ok(steps)
}

fn parse_line(line: &str) -> Result<Step> {
    let mut fields = line.split_whitespace();
    let at_us = fields
        .next()
        .context("missing time field")?
        .parse()
        .context("bad time field")?;

    let action = match fields.next().context("missing action field")? {
        verb @ ("press" | "release") => {
            let note: u8 = fields
                .next()
                .context("missing note number")?
                .parse()
                .context("bad note number")?;
            let key = key_index(note)?;
            let travel_us = fields
                .next()
                .context("missing travel time")?
                .parse()
                .context("bad travel time")?;
            if verb == "press" {
                Action::Press { key, travel_us }
            } else {
                Action::Release { key, travel_us }
            }
        }
        "pedal" => match fields.next().context("missing pedal direction")? {
            "down" => Action::PedalDown,
            "up" => Action::PedalUp,
            other => bail!("unknown pedal direction {other:?}"),
        },
        "expression" => {
            let value: f32 = fields
                .next()
                .context("missing expression value")?
                .parse()
                .context("bad expression value")?;
            ensure!((0.0..=1.0).contains(&value), "expression value out of 0..1");
            Action::Expression { value }
        }
        other => bail!("unknown action {other:?}"),
    };

    if fields.next().is_some() {
        bail!("trailing fields");
    }
    Ok(Step { at_us, action })
}

fn key_index(note: u8) -> Result<usize> {
    let top = NOTE_OFFSET as usize + KEY_COUNT - 1;
    ensure!(
        (NOTE_OFFSET..=top as u8).contains(&note),
        "note {} out of range {}..={}",
        note,
        NOTE_OFFSET,
        top
    );
    Ok((note - NOTE_OFFSET) as usize)
}
