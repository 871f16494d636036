//! Lot pool - the working set of purchase lots still available to dispose

use super::transaction::Purchase;
use std::collections::VecDeque;

/// Open lots ordered by date (ties by txn_id, then exchange), plus the lots
/// that have been fully consumed.
#[derive(Debug, Clone, Default)]
pub struct LotPool {
    open: VecDeque<Purchase>,
    disposed: Vec<Purchase>,
}

impl LotPool {
    pub fn new() -> Self {
        LotPool::default()
    }

    /// Add lots to the pool and restore date ordering.
    /// Lots that are already fully disposed go straight to the disposed set.
    pub fn seed<I>(&mut self, lots: I)
    where
        I: IntoIterator<Item = Purchase>,
    {
        for mut lot in lots {
            lot.refresh_full_disposal();
            if lot.full_disposal {
                log::debug!(
                    "Pool SEED {} {} already fully disposed",
                    lot.symbol(),
                    lot.common.txn_id
                );
                self.disposed.push(lot);
            } else {
                self.open.push_back(lot);
            }
        }
        self.resort();
        log::debug!("Pool seeded: {} open lots", self.open.len());
    }

    /// Remove and return the earliest open lot
    pub fn take_earliest(&mut self) -> Option<Purchase> {
        self.open.pop_front()
    }

    /// Put a lot back as if it were still the earliest
    pub fn return_to_front(&mut self, lot: Purchase) {
        self.open.push_front(lot);
    }

    /// Put lots back and restore strict ordering across the whole pool.
    pub fn return_and_resort<I>(&mut self, lots: I)
    where
        I: IntoIterator<Item = Purchase>,
    {
        self.open.extend(lots);
        self.resort();
    }

    /// Move a fully disposed lot out of circulation for good
    pub fn retire(&mut self, lot: Purchase) {
        log::debug!(
            "Pool RETIRE {} {} qty={}",
            lot.symbol(),
            lot.common.txn_id,
            lot.common.quantity
        );
        self.disposed.push(lot);
    }

    fn resort(&mut self) {
        // stable, so lots with an identical key keep their insertion order
        self.open
            .make_contiguous()
            .sort_by(|a, b| a.common.fifo_cmp(&b.common));
    }

    pub fn open_lots(&self) -> impl Iterator<Item = &Purchase> {
        self.open.iter()
    }

    pub fn disposed_lots(&self) -> &[Purchase] {
        &self.disposed
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Consume the pool, returning `(open, disposed)`
    pub fn into_parts(self) -> (Vec<Purchase>, Vec<Purchase>) {
        (self.open.into(), self.disposed)
    }
}
