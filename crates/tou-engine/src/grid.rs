//! The fixed-resolution daily slot grid.
//!
//! A day is 48 half-hour cells, each holding exactly one [`Category`]. Every
//! cell starts as [`Category::OnPeak`]; painting overwrites unconditionally, so
//! the order intervals are painted in decides the result.

use crate::category::Category;
use crate::encoder::ScheduleBlock;
use chrono::Timelike;
use std::ops::Range;

/// Minutes covered by one cell.
pub const SLOT_MINUTES: u32 = 30;

/// Cells in one day.
pub const SLOTS_PER_DAY: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGrid {
    cells: [Category; SLOTS_PER_DAY],
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotGrid {
    /// A grid with every cell on-peak.
    pub fn new() -> Self {
        Self {
            cells: [Category::OnPeak; SLOTS_PER_DAY],
        }
    }

    pub fn cells(&self) -> &[Category] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Category {
        self.cells[index]
    }

    /// Paint the cells touched by the local time-of-day span `start..end`.
    ///
    /// Only the clock time of `start` and `end` matters. A span whose start is
    /// later in the day than its end wraps past midnight.
    pub fn fill_slots<T: Timelike>(&mut self, category: Category, start: &T, end: &T) {
        let start_minutes = start.hour() * 60 + start.minute();
        let end_minutes = end.hour() * 60 + end.minute();
        self.fill_minutes(category, start_minutes, end_minutes);
    }

    /// Paint by minute-of-day offsets.
    ///
    /// The first cell is `floor(start / 30)`, the end cell `ceil(end / 30)`, so a
    /// partially covered cell is painted in full. When `start > end` the span is
    /// painted as `[first, 48)` and `[0, end_cell)`.
    pub fn fill_minutes(&mut self, category: Category, start_minutes: u32, end_minutes: u32) {
        let first = (start_minutes / SLOT_MINUTES) as usize;
        let last = end_minutes.div_ceil(SLOT_MINUTES) as usize;

        if start_minutes > end_minutes {
            self.paint_range(category, first..SLOTS_PER_DAY);
            self.paint_range(category, 0..last);
        } else {
            self.paint_range(category, first..last);
        }
    }

    /// Overwrite every cell in `range` (clamped to the grid) with `category`.
    pub fn paint_range(&mut self, category: Category, range: Range<usize>) {
        let end = range.end.min(SLOTS_PER_DAY);
        let start = range.start.min(end);
        for cell in &mut self.cells[start..end] {
            *cell = category;
        }
    }

    /// Rebuild a grid from encoded blocks.
    ///
    /// A block whose end index is not after its start wraps past midnight; a
    /// block starting and ending at the same index covers the whole day.
    pub fn from_blocks(blocks: &[ScheduleBlock]) -> Self {
        let mut grid = Self::new();
        for block in blocks {
            let (start, end) = (block.start_index(), block.end_index());
            if end > start {
                grid.paint_range(block.category, start..end);
            } else {
                grid.paint_range(block.category, start..SLOTS_PER_DAY);
                grid.paint_range(block.category, 0..end);
            }
        }
        grid
    }
}

impl From<[Category; SLOTS_PER_DAY]> for SlotGrid {
    fn from(cells: [Category; SLOTS_PER_DAY]) -> Self {
        Self { cells }
    }
}
