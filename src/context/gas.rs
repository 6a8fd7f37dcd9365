use std::cell::Cell;
use std::rc::Rc;

use crate::errors::{ScriptError, ScriptResult};

/// Remaining-gas counter. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct GasMeter {
    budget: u64,
    remaining: Rc<Cell<u64>>,
}

impl GasMeter {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            remaining: Rc::new(Cell::new(budget)),
        }
    }

    /// Deduct `amount`. Asking for more than remains drains the meter and
    /// fails, so every later charge in the chain fails too.
    pub fn consume(&self, amount: u64) -> ScriptResult<()> {
        let remaining = self.remaining.get();
        if amount > remaining {
            self.remaining.set(0);
            return Err(ScriptError::GasExhausted {
                budget: self.budget,
            });
        }
        self.remaining.set(remaining - amount);
        Ok(())
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.get()
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn used(&self) -> u64 {
        self.budget - self.remaining.get()
    }
}
