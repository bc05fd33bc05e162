//! Keybed matrix scanning.
//!
//! The 88 keys sit on an 8-row matrix split into two column banks, an
//! artifact of the keybed's two flat cables: a low bank of 5 column pairs
//! (keys 0..40) and a high bank of 6 (keys 40..88). Each bank has its own
//! set of 8 row ("T") drive lines; row `r` of both banks is driven
//! together, so one settle delay covers both. Every column position
//! carries two switch lines per key: the upper "BR" contact closes first on
//! the way down, the lower "MK" contact closes at the bottom of the travel.
//!
//! Only one row is active at a time during sampling, so cross-talk between
//! keys is structurally impossible.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

/// Number of row drive lines per bank.
pub const ROWS: usize = 8;
/// Column pairs in the low bank (keys 0..40).
pub const LOW_BANK_COLS: usize = 5;
/// Column pairs in the high bank (keys 40..88).
pub const HIGH_BANK_COLS: usize = 6;
/// Total number of keys.
pub const KEY_COUNT: usize = (LOW_BANK_COLS + HIGH_BANK_COLS) * ROWS;

/// Switch levels sampled for one key during one scan pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeySwitches {
    /// Upper ("BR") contact, closes first when the key goes down.
    pub br: bool,
    /// Lower ("MK") contact, closes at the bottom of the travel.
    pub mk: bool,
}

/// One scan pass worth of switch samples, indexed by key number.
pub type ScanState = [KeySwitches; KEY_COUNT];

/// The scanner's pin assignment: row drivers and BR/MK column inputs for
/// both banks.
pub struct MatrixPins<R, C> {
    pub rows_low: [R; ROWS],
    pub rows_high: [R; ROWS],
    pub br_low: [C; LOW_BANK_COLS],
    pub mk_low: [C; LOW_BANK_COLS],
    pub br_high: [C; HIGH_BANK_COLS],
    pub mk_high: [C; HIGH_BANK_COLS],
}

/// Drives the rows and samples every key's switch pair once per call.
pub struct Matrix<R, C, D> {
    pins: MatrixPins<R, C>,
    delay: D,
    settle_us: u32,
}

impl<R, C, D, E> Matrix<R, C, D>
where
    R: OutputPin<Error = E>,
    C: InputPin<Error = E>,
    D: DelayUs<u32>,
{
    /// Take ownership of the pins and release every row driver.
    pub fn new(pins: MatrixPins<R, C>, delay: D, settle_us: u32) -> Result<Self, E> {
        let mut matrix = Self { pins, delay, settle_us };
        matrix.release_rows()?;
        Ok(matrix)
    }

    fn release_rows(&mut self) -> Result<(), E> {
        for row in self
            .pins
            .rows_low
            .iter_mut()
            .chain(self.pins.rows_high.iter_mut())
        {
            row.set_low()?;
        }
        Ok(())
    }

    /// Drive each row once and sample both switch lines of all 88 keys.
    ///
    /// Blocking: the call busy-waits the settle delay per row, so one pass
    /// takes at least [`Matrix::min_scan_us`] microseconds. The driver's
    /// tick period has to budget for that.
    pub fn scan(&mut self) -> Result<ScanState, E> {
        let mut state = [KeySwitches::default(); KEY_COUNT];

        for row in 0..ROWS {
            self.pins.rows_low[row].set_high()?;
            self.pins.rows_high[row].set_high()?;
            self.delay.delay_us(self.settle_us);

            for bank in 0..LOW_BANK_COLS {
                let key = bank * ROWS + row;
                state[key].br = self.pins.br_low[bank].is_high()?;
                state[key].mk = self.pins.mk_low[bank].is_high()?;
            }
            for bank in 0..HIGH_BANK_COLS {
                let key = LOW_BANK_COLS * ROWS + bank * ROWS + row;
                state[key].br = self.pins.br_high[bank].is_high()?;
                state[key].mk = self.pins.mk_high[bank].is_high()?;
            }

            self.pins.rows_low[row].set_low()?;
            self.pins.rows_high[row].set_low()?;
        }

        Ok(state)
    }

    /// Lower bound on one scan pass: rows × settle delay.
    pub fn min_scan_us(&self) -> u32 {
        ROWS as u32 * self.settle_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Default)]
    struct Bus {
        driven_low: [bool; ROWS],
        driven_high: [bool; ROWS],
        closed: [KeySwitches; KEY_COUNT],
        settles: u32,
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
                        Line::Br => bus.closed[key].br,
                        Line::Mk => bus.closed[key].mk,
                    }
            }))
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(!self.is_high()?)
        }
    }

    struct CountingDelay {
        bus: Rc<RefCell<Bus>>,
    }

    impl DelayUs<u32> for CountingDelay {
        fn delay_us(&mut self, _us: u32) {
            self.bus.borrow_mut().settles += 1;
        }
    }

    fn matrix(bus: &Rc<RefCell<Bus>>) -> Matrix<RowPin, ColPin, CountingDelay> {
        let rows = |bank| std::array::from_fn(|row| RowPin { bus: bus.clone(), bank, row });
        let cols = |bank, line| move |col| ColPin { bus: bus.clone(), bank, col, line };
        let pins = MatrixPins {
            rows_low: rows(Bank::Low),
            rows_high: rows(Bank::High),
            br_low: std::array::from_fn(cols(Bank::Low, Line::Br)),
            mk_low: std::array::from_fn(cols(Bank::Low, Line::Mk)),
            br_high: std::array::from_fn(cols(Bank::High, Line::Br)),
            mk_high: std::array::from_fn(cols(Bank::High, Line::Mk)),
        };
        Matrix::new(pins, CountingDelay { bus: bus.clone() }, 8).unwrap()
    }

    #[test]
    fn scan_reads_every_bank_position() {
        let bus = Rc::new(RefCell::new(Bus::default()));
        let mut matrix = matrix(&bus);

        // Key 0: low bank, column 0, row 0. Key 87: high bank, column 5,
        // row 7. Key 43: high bank, column 0, row 3.
        bus.borrow_mut().closed[0] = KeySwitches { br: true, mk: false };
        bus.borrow_mut().closed[87] = KeySwitches { br: true, mk: true };
        bus.borrow_mut().closed[43] = KeySwitches { br: false, mk: true };

        let state = matrix.scan().unwrap();
        assert_eq!(state[0], KeySwitches { br: true, mk: false });
        assert_eq!(state[87], KeySwitches { br: true, mk: true });
        assert_eq!(state[43], KeySwitches { br: false, mk: true });

        let open = state
            .iter()
            .enumerate()
            .filter(|(i, _)| ![0, 43, 87].contains(i))
            .all(|(_, s)| *s == KeySwitches::default());
        assert!(open);
    }

    #[test]
    fn scan_settles_once_per_row_and_releases_rows() {
        let bus = Rc::new(RefCell::new(Bus::default()));
        let mut matrix = matrix(&bus);

        matrix.scan().unwrap();

        let bus = bus.borrow();
        assert_eq!(bus.settles, ROWS as u32);
        assert!(bus.driven_low.iter().all(|d| !d));
        assert!(bus.driven_high.iter().all(|d| !d));
    }

    #[test]
    fn scan_floor_accounts_for_settle() {
        let bus = Rc::new(RefCell::new(Bus::default()));
        let matrix = matrix(&bus);
        assert_eq!(matrix.min_scan_us(), 64);
    }
}
