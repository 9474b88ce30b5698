//! Block encoding -- run-length encode the slot grid into contiguous schedule blocks.
//!
//! The grid is scanned left to right. A block closes whenever a cell differs from
//! the cell the block started on; the last block closes at midnight, expressed as
//! cell index 0 rather than 48. Because the schedule repeats daily, a run at the
//! end of the day and a run at the start of the day with the same category are
//! a single block spanning midnight.

use crate::category::{Category, RateTable};
use crate::grid::{SlotGrid, SLOTS_PER_DAY};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A maximal run of same-category cells, as local clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleBlock {
    pub category: Category,
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,
}

impl ScheduleBlock {
    /// Block covering cells `start_index..end_index`. An `end_index` of 0 or 48
    /// means midnight.
    pub fn from_cells(category: Category, start_index: usize, end_index: usize) -> Self {
        let (start_hour, start_minute) = cell_to_clock(start_index);
        let (end_hour, end_minute) = cell_to_clock(end_index % SLOTS_PER_DAY);
        Self {
            category,
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        }
    }

    pub fn start_index(&self) -> usize {
        clock_to_cell(self.start_hour, self.start_minute)
    }

    pub fn end_index(&self) -> usize {
        clock_to_cell(self.end_hour, self.end_minute)
    }

    /// Number of cells the block covers, counting wrap past midnight.
    pub fn cell_count(&self) -> usize {
        let (start, end) = (self.start_index(), self.end_index());
        if end > start {
            end - start
        } else {
            SLOTS_PER_DAY - start + end
        }
    }
}

impl fmt::Display for ScheduleBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -- {:02}:{:02} -> {:02}:{:02}",
            self.category, self.start_hour, self.start_minute, self.end_hour, self.end_minute
        )
    }
}

fn cell_to_clock(index: usize) -> (u32, u32) {
    let hour = (index / 2) as u32;
    let minute = if index % 2 == 1 { 30 } else { 0 };
    (hour, minute)
}

fn clock_to_cell(hour: u32, minute: u32) -> usize {
    (hour * 2 + u32::from(minute >= 30)) as usize
}

/// Run-length encode the grid into blocks that partition all 48 cells.
///
/// Blocks come out in grid order, except that a run wrapping midnight is
/// reported first and starts at its evening cell.
pub fn encode_blocks(grid: &SlotGrid) -> Vec<ScheduleBlock> {
    let cells = grid.cells();
    let mut runs: Vec<(Category, usize, usize)> = Vec::new();
    let mut block_start = 0;

    for (i, &category) in cells.iter().enumerate().skip(1) {
        if category != cells[block_start] {
            runs.push((cells[block_start], block_start, i));
            block_start = i;
        }
    }
    runs.push((cells[block_start], block_start, 0));

    if runs.len() > 1 && runs[0].0 == runs[runs.len() - 1].0 {
        if let Some((_, evening_start, _)) = runs.pop() {
            runs[0].1 = evening_start;
        }
    }

    runs.into_iter()
        .map(|(category, start, end)| ScheduleBlock::from_cells(category, start, end))
        .collect()
}

/// The schedule for one day: rates plus the blocks of every category in use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleDocument {
    pub rates: RateTable,
    periods: BTreeMap<Category, Vec<ScheduleBlock>>,
}

impl ScheduleDocument {
    /// Group blocks by category. Categories without blocks are omitted.
    pub fn from_blocks(blocks: &[ScheduleBlock], rates: RateTable) -> Self {
        let mut periods: BTreeMap<Category, Vec<ScheduleBlock>> = BTreeMap::new();
        for block in blocks {
            periods.entry(block.category).or_default().push(*block);
        }
        Self { rates, periods }
    }

    /// Blocks for `category`, empty if the category is not in use.
    pub fn blocks(&self, category: Category) -> &[ScheduleBlock] {
        self.periods.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Categories with at least one block, in document order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.periods.keys().copied()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.periods.contains_key(&category)
    }
}
