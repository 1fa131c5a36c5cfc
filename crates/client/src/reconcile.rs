//! Merge a guest cart and wishlist into the account after login.
//!
//! Each guest cart line is added to the server cart (quantities sum with
//! what is already there) and each wishlist entry is added to the server
//! wishlist (already-present entries stay single). The guest store is cleared
//! only when every call succeeded; the first failure stops the merge and
//! leaves the guest store as it was.
//!
//! Replaying a partly applied merge adds the applied lines a second time.
//! [`ReconcileMode::Journaled`] avoids that by recording, for the account
//! being merged into, how much of each cart line the server already has.
//! A retry sends only the remainder, so quantity the guest added after the
//! failure still arrives. A journal written for another account is ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use cartwheel_core::{ProductId, Quantity, UserId};

use crate::api::StorefrontApi;
use crate::error::ClientError;
use crate::guest::{GuestStore, JOURNAL_KEY};

/// How a retried reconciliation treats lines applied by an earlier attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Add every guest line again.
    #[default]
    Replay,
    /// Send only the quantity not yet recorded as applied.
    Journaled,
}

/// What a reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Cart lines sent to the server, in full or as a remainder.
    pub cart_lines_merged: usize,
    pub wishlist_entries_merged: usize,
    /// Cart lines not sent because the journal had all of their quantity.
    pub skipped_from_journal: usize,
}

/// A reconciliation that stopped at the first failing call.
#[derive(Debug, Error)]
#[error("guest state not merged: {source}")]
pub struct ReconcileError {
    /// Work done before the failure.
    pub partial: ReconcileReport,
    #[source]
    pub source: ClientError,
}

/// Cart quantity already sent to one account's server cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileJournal {
    account: UserId,
    applied: Vec<AppliedLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppliedLine {
    product_id: ProductId,
    quantity: u32,
}

impl ReconcileJournal {
    const fn new(account: UserId) -> Self {
        Self {
            account,
            applied: Vec::new(),
        }
    }

    /// The stored journal, if it was written for `account`.
    fn load(guest: &GuestStore, account: UserId) -> Self {
        match guest.load::<Self>(JOURNAL_KEY) {
            Some(journal) if journal.account == account => journal,
            Some(journal) => {
                tracing::debug!(journal_account = %journal.account, "ignoring journal from another account");
                Self::new(account)
            }
            None => Self::new(account),
        }
    }

    fn applied(&self, product_id: ProductId) -> u32 {
        self.applied
            .iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.quantity)
    }

    fn record(&mut self, product_id: ProductId, quantity: u32) {
        match self.applied.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = quantity,
            None => self.applied.push(AppliedLine {
                product_id,
                quantity,
            }),
        }
    }
}

/// Merge `guest` into `account`, reached through `token`.
///
/// Does nothing and returns an empty report when the guest store is empty.
///
/// # Errors
///
/// Returns `ReconcileError` on the first failed call; the guest store is
/// left intact (plus journal entries in journaled mode).
#[instrument(skip(api, token, guest))]
pub async fn reconcile(
    api: &dyn StorefrontApi,
    token: &str,
    account: UserId,
    guest: &GuestStore,
    mode: ReconcileMode,
) -> Result<ReconcileReport, ReconcileError> {
    let cart = guest.cart();
    let wishlist = guest.wishlist();
    let mut report = ReconcileReport::default();

    if cart.is_empty() && wishlist.is_empty() {
        return Ok(report);
    }

    let mut journal = match mode {
        ReconcileMode::Journaled => ReconcileJournal::load(guest, account),
        ReconcileMode::Replay => ReconcileJournal::new(account),
    };

    for line in &cart {
        let wanted = line.quantity.get();
        let applied = journal.applied(line.product_id);
        let Ok(remainder) = Quantity::new(wanted.saturating_sub(applied)) else {
            report.skipped_from_journal += 1;
            continue;
        };

        if let Err(source) = api.add_to_cart(token, line.product_id, remainder).await {
            tracing::warn!(product_id = %line.product_id, error = %source, "guest cart merge failed");
            return Err(ReconcileError {
                partial: report,
                source,
            });
        }
        report.cart_lines_merged += 1;

        if mode == ReconcileMode::Journaled {
            journal.record(line.product_id, wanted);
            guest.save(JOURNAL_KEY, &journal);
        }
    }

    for entry in &wishlist {
        if let Err(source) = api.add_to_wishlist(token, entry.product_id).await {
            tracing::warn!(product_id = %entry.product_id, error = %source, "guest wishlist merge failed");
            return Err(ReconcileError {
                partial: report,
                source,
            });
        }
        report.wishlist_entries_merged += 1;
    }

    guest.clear();
    tracing::info!(
        cart_lines = report.cart_lines_merged,
        wishlist_entries = report.wishlist_entries_merged,
        skipped = report.skipped_from_journal,
        "guest state merged"
    );

    Ok(report)
}
