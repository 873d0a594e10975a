#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use std::collections::HashMap;

/// Global pool of CPU threads shared by every tool tab.
///
/// Each tool holds a selection; the sum of selections never exceeds the pool.
/// The budget only gates new selections, it does not schedule anything.
#[derive(Debug, Clone)]
pub struct CpuBudget {
    total: usize,
    selections: HashMap<String, usize>,
}

impl CpuBudget {
    pub fn new(total: usize) -> Self {
        CpuBudget {
            total,
            selections: HashMap::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn allocated(&self) -> usize {
        self.selections.values().sum()
    }

    pub fn available(&self) -> usize {
        self.total.saturating_sub(self.allocated())
    }

    pub fn selection(&self, tool: &str) -> usize {
        self.selections.get(tool).copied().unwrap_or(0)
    }

    /// Largest selection `tool` could switch to right now.
    pub fn max_selection(&self, tool: &str) -> usize {
        self.available() + self.selection(tool)
    }

    /// Replace the selection of `tool`.
    pub fn select(&mut self, tool: &str, cpus: usize) -> Result<(), AppError> {
        let ceiling = self.max_selection(tool);
        if cpus > ceiling {
            return Err(AppError::user_entry(format!(
                "Only {} cpu thread(s) available for tasking; requested {}.",
                ceiling, cpus
            ))
            .with_code("CPU-001"));
        }
        if cpus == 0 {
            self.selections.remove(tool);
        } else {
            self.selections.insert(tool.to_string(), cpus);
        }
        Ok(())
    }

    pub fn release(&mut self, tool: &str) {
        self.selections.remove(tool);
    }
}
