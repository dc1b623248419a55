use crate::{
    config::ScannerConfig,
    hal::MatrixInput,
    helpers::{elapsed_ms, Cadence},
};

/// State of one switch, as of the last completed sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct KeyCell {
    pub current: bool,
    pub previous: bool,
    /// Held continuously for at least the debounce time. Cleared on release.
    pub debounced: bool,
    /// `debounced` went high during the last sweep.
    pub newly_debounced: bool,
    pub press_time: u32,
    pub release_time: u32,
}

pub struct MatrixScanner<const R: usize, const C: usize> {
    cells: [[KeyCell; C]; R],
    config: ScannerConfig,
    cadence: Cadence,
}

impl<const R: usize, const C: usize> MatrixScanner<R, C> {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            cells: [[KeyCell::default(); C]; R],
            cadence: Cadence::new(config.scan_interval_ms),
            config,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ScannerConfig) {
        self.cadence.set_period_ms(config.scan_interval_ms);
        self.config = config;
    }

    /// Sweeps the whole matrix if `scan_interval_ms` has passed since the
    /// last sweep. Returns whether a sweep happened.
    pub fn scan<M: MatrixInput>(&mut self, input: &mut M, now: u32) -> bool {
        if !self.cadence.poll(now) {
            return false;
        }

        let debounce_time_ms = self.config.debounce_time_ms;

        for (row, cells) in self.cells.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                let closed = input.key_closed(row, col);

                cell.previous = cell.current;
                cell.current = closed;
                cell.newly_debounced = false;

                match (closed, cell.previous) {
                    (true, false) => {
                        cell.press_time = now;
                        cell.debounced = false;
                    }
                    (false, true) => {
                        cell.release_time = now;
                        cell.debounced = false;
                    }
                    _ => {}
                }

                if closed
                    && !cell.debounced
                    && elapsed_ms(cell.press_time, now) >= debounce_time_ms
                {
                    cell.debounced = true;
                    cell.newly_debounced = true;
                }
            }
        }

        true
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&KeyCell> {
        self.cells.get(row).and_then(|r| r.get(col))
    }

    pub fn is_pressed(&self, row: usize, col: usize) -> bool {
        self.cell(row, col)
            .map(|c| c.current && c.debounced)
            .unwrap_or(false)
    }

    pub fn is_just_pressed(&self, row: usize, col: usize) -> bool {
        self.cell(row, col)
            .map(|c| c.current && c.newly_debounced)
            .unwrap_or(false)
    }

    pub fn is_just_released(&self, row: usize, col: usize) -> bool {
        self.cell(row, col)
            .map(|c| !c.current && c.previous)
            .unwrap_or(false)
    }

    /// How long the switch has been held, 0 if it isn't.
    pub fn press_duration(&self, row: usize, col: usize, now: u32) -> u32 {
        match self.cell(row, col) {
            Some(c) if c.current => elapsed_ms(c.press_time, now),
            _ => 0,
        }
    }

    pub fn rows(&self) -> usize {
        R
    }

    pub fn cols(&self) -> usize {
        C
    }
}
