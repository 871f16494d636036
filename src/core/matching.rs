use super::pool::LotPool;
use super::transaction::{AssociatedPurchase, Disposal, DisposalStatus, Purchase};

/// Match a disposal against the pool, oldest lot first.
///
/// Each iteration draws the globally earliest lot and either:
/// - sets it aside when its symbol differs (it is never mutated),
/// - stops with `ReviewRequired` when it is dated after the disposal,
/// - or consumes as much of it as the disposal still needs.
///
/// Matching ends `Reconciled` once the disposal is covered, or `Underfunded`
/// when the pool runs dry first. Set-aside lots go back in their original
/// order and the pool is resorted before returning. A disposal that is
/// already in a terminal state is left untouched.
pub fn match_disposal(disposal: &mut Disposal, pool: &mut LotPool) -> DisposalStatus {
    if disposal.status.is_terminal() {
        return disposal.status;
    }

    let mut set_aside: Vec<Purchase> = Vec::new();

    let status = loop {
        if disposal.refresh_reconciled() {
            break DisposalStatus::Reconciled;
        }

        let Some(mut lot) = pool.take_earliest() else {
            break DisposalStatus::Underfunded;
        };

        if lot.symbol() != disposal.symbol() {
            set_aside.push(lot);
            continue;
        }

        if lot.date() > disposal.date() {
            log::debug!(
                "Disposal {} {} blocked by later lot {} dated {}",
                disposal.symbol(),
                disposal.common.txn_id,
                lot.common.txn_id,
                lot.date()
            );
            pool.return_to_front(lot);
            disposal.review_required = true;
            break DisposalStatus::ReviewRequired;
        }

        let consumed = lot.remaining().min(disposal.remaining());
        lot.qty_disposed += consumed;
        disposal.quantity_reconciled += consumed;

        let contribution = lot.common.cost_basis * consumed / disposal.common.quantity;
        disposal.common.cost_basis += contribution;

        lot.refresh_full_disposal();
        log::debug!(
            "Disposal {} {} MATCH lot {}: consumed={}, cost={}. Reconciled {}/{}",
            disposal.symbol(),
            disposal.common.txn_id,
            lot.common.txn_id,
            consumed,
            contribution,
            disposal.quantity_reconciled,
            disposal.common.quantity
        );

        disposal.associated_purchases.push(AssociatedPurchase {
            purchase: lot.clone(),
            qty_consumed: consumed,
            cost_contribution: contribution,
        });
        disposal.status = DisposalStatus::Partial;

        if lot.full_disposal {
            pool.retire(lot);
        } else {
            pool.return_to_front(lot);
        }
    };

    pool.return_and_resort(set_aside);
    disposal.status = status;
    status
}
