//! Bench tools for the keybed scanner core.
//!
//! Nothing here talks to hardware: `curve` and `budget` print tuning
//! tables for the timing constants, and `simulate` replays a gesture
//! script through a fully simulated switch matrix.

mod script;
mod sim;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;

use keybed_core::config::{KeybedConfig, PedalConfig, ScanConfig};
use keybed_core::event::{velocity_to_midi, Event};
use keybed_core::matrix::ROWS;
use keybed_core::velocity;

#[derive(Parser)]
#[command(name = "keybed-cli")]
#[command(about = "Bench tools for the keybed scanner core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a velocity table for tuning the curve constants
    Curve {
        /// Note-on curve bias, in (0, 1)
        #[arg(long, default_value_t = 0.1)]
        bias: f32,
        /// Number of table rows
        #[arg(long, default_value_t = 24)]
        steps: u32,
        /// Tabulate the release curve instead of the strike curve
        #[arg(long)]
        release: bool,
    },
    /// Report the scan timing budget
    Budget {
        /// Row settle delay in microseconds
        #[arg(long, default_value_t = 8)]
        settle_us: u32,
        /// Scan tick period in microseconds
        #[arg(long, default_value_t = 600)]
        tick_us: u32,
    },
    /// Replay a gesture script through a simulated keybed
    Simulate {
        /// Path to the gesture script
        script: String,
        /// Scan tick period in microseconds
        #[arg(long, default_value_t = 600)]
        tick_us: u32,
        /// Note-on curve bias override
        #[arg(long)]
        bias: Option<f32>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Curve { bias, steps, release } => curve(bias, steps, release),
        Command::Budget { settle_us, tick_us } => {
            budget(settle_us, tick_us);
            Ok(())
        }
        Command::Simulate { script, tick_us, bias } => {
            let contents =
                fs::read_to_string(&script).with_context(|| format!("reading {}", script))?;
            let steps = script::parse(&contents).context("parsing gesture script")?;
            simulate(&steps, tick_us, bias)
        }
    }
}

fn curve(bias: f32, steps: u32, release: bool) -> Result<()> {
    ensure!(bias > 0.0 && bias < 1.0, "bias must be in (0, 1)");
    ensure!(steps > 0, "steps must be at least 1");

    let config = KeybedConfig::default().velocity;
    let window = if release { config.note_off } else { config.note_on };

    if release {
        println!("release curve, window {}..{}us (linear)", window.min_us, window.max_us);
    } else {
        println!(
            "strike curve, window {}..{}us, bias {}",
            window.min_us, window.max_us, bias
        );
    }
    println!("{:>10}  {:>8}  {:>4}", "travel_us", "velocity", "midi");

    let span = (window.max_us - window.min_us) as u64;
    for i in 0..=steps {
        let travel = window.min_us + (span * i as u64 / steps as u64) as u32;
        let time = window.normalize(travel);
        let v = if release {
            velocity::note_off(time, &window)
        } else {
            velocity::note_on(time, &window, bias)
        };
        println!("{:>10}  {:>8.4}  {:>4}", travel, v, velocity_to_midi(v));
    }
    Ok(())
}

fn budget(settle_us: u32, tick_us: u32) {
    let scan_floor = ROWS as u32 * settle_us;
    let headroom = tick_us as i64 - scan_floor as i64;

    println!("rows per scan:  {:>6}", ROWS);
    println!("row settle:     {:>6} us", settle_us);
    println!("scan floor:     {:>6} us", scan_floor);
    println!("tick period:    {:>6} us", tick_us);
    println!("headroom:       {:>6} us", headroom);
    if headroom <= 0 {
        println!("tick period does not cover the scan; raise tick_us or lower settle_us");
    }
}

fn simulate(steps: &[script::Step], tick_us: u32, bias: Option<f32>) -> Result<()> {
    let mut keybed = KeybedConfig::default();
    if let Some(bias) = bias {
        ensure!(bias > 0.0 && bias < 1.0, "bias must be in (0, 1)");
        keybed.velocity.note_on_bias = bias;
    }
    let options = sim::SimOptions {
        scan: ScanConfig { tick_us, ..Default::default() },
        keybed,
        pedal: PedalConfig::default(),
    };

    log::info!("replaying {} steps at a {}us tick", steps.len(), tick_us);
    let events = sim::run(steps, &options);

    for (at, event) in &events {
        match *event {
            Event::NoteOn { note, velocity } => println!(
                "{:>10}us  note on   {:>3}  velocity {:.3}  midi {:>3}",
                at,
                note,
                velocity,
                velocity_to_midi(velocity)
            ),
            Event::NoteOff { note, velocity } => println!(
                "{:>10}us  note off  {:>3}  velocity {:.3}  midi {:>3}",
                at,
                note,
                velocity,
                velocity_to_midi(velocity)
            ),
            Event::PedalDamper { pressed } => println!(
                "{:>10}us  damper    {}",
                at,
                if pressed { "down" } else { "up" }
            ),
            Event::PedalExpression { value } => {
                println!("{:>10}us  expression {:.3}", at, value)
            }
        }
    }
    println!("{} events", events.len());
    Ok(())
}
