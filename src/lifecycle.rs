//! The lifecycle engine: moves elections through `DRAFT -> ACTIVE -> CLOSED`
//! as the clock passes their voting window, and deactivates the member
//! accounts of elections it closes.
//!
//! There is no scheduler. Every read path runs a reconciliation pass first,
//! so stale statuses are corrected lazily. A failed pass never blocks the read
//! that triggered it.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{ElectionDetails, ElectionInclude, ElectionQuery, ElectionStatus, Id};
use crate::store::{load_details, SharedStore, Transaction};

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Elections moved from `DRAFT` to `ACTIVE`.
    pub activated: u64,
    /// Elections moved from `ACTIVE` to `CLOSED`.
    pub closed: u64,
    /// Member accounts deactivated because their election closed.
    pub deactivated_members: u64,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.activated == 0 && self.closed == 0 && self.deactivated_members == 0
    }
}

/// Data read after a reconciliation attempt, together with that attempt's outcome.
/// If reconciliation failed, statuses in `data` may be stale.
#[derive(Debug)]
pub struct Reconciled<T> {
    pub data: T,
    pub reconciliation: Result<ReconcileReport>,
}

impl<T> Reconciled<T> {
    pub fn is_stale(&self) -> bool {
        self.reconciliation.is_err()
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reconciled<U> {
        Reconciled {
            data: f(self.data),
            reconciliation: self.reconciliation,
        }
    }
}

#[derive(Clone)]
pub struct LifecycleEngine {
    store: SharedStore,
}

impl LifecycleEngine {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Bring every election's status in line with `now`.
    ///
    /// Runs as a single unit of work. On an atomic store any failure leaves
    /// nothing committed. On a best-effort store a failure after some writes
    /// landed is reported as [`Error::PartialReconciliation`]; re-running the
    /// pass finishes the job.
    pub async fn reconcile_statuses(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut txn = self.store.begin().await?;
        let atomic = txn.is_atomic();
        let mut report = ReconcileReport::default();

        if let Err(e) = Self::apply(txn.as_mut(), now, &mut report).await {
            return Err(Self::failure(atomic, report, e));
        }
        if let Err(e) = txn.commit().await {
            return Err(Self::failure(atomic, report, e));
        }

        if report.is_noop() {
            debug!("Reconciliation at {now} had nothing to do");
        } else {
            info!(
                "Reconciled election statuses at {now}: {} activated, {} closed, \
                 {} members deactivated",
                report.activated, report.closed, report.deactivated_members
            );
        }
        Ok(report)
    }

    async fn apply(
        txn: &mut (dyn Transaction + '_),
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        // Activation first, so a draft already past its end closes in this same pass.
        let due = ids(txn.find_elections(&ElectionQuery::due_for_activation(now)).await?);
        if !due.is_empty() {
            report.activated = txn
                .update_status(&due, ElectionStatus::Draft, ElectionStatus::Active)
                .await?;
        }

        let expired = ids(txn.find_elections(&ElectionQuery::due_for_closing(now)).await?);
        if !expired.is_empty() {
            // The cascade uses exactly the elections selected above, and runs
            // before the status flip: if the flip is lost, the next pass selects
            // the same elections again.
            report.deactivated_members = txn.deactivate_members(&expired).await?;
            report.closed = txn
                .update_status(&expired, ElectionStatus::Active, ElectionStatus::Closed)
                .await?;
        }
        Ok(())
    }

    fn failure(atomic: bool, report: ReconcileReport, cause: Error) -> Error {
        if atomic || report.is_noop() {
            return cause;
        }
        warn!("Reconciliation stopped part way through, will be resumed by the next pass: {cause}");
        Error::PartialReconciliation {
            activated: report.activated,
            closed: report.closed,
            deactivated_members: report.deactivated_members,
            cause: Box::new(cause),
        }
    }

    /// Reconcile, logging rather than propagating a failure.
    pub(crate) async fn reconcile_for_read(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let result = self.reconcile_statuses(now).await;
        if let Err(ref e) = result {
            error!("Election status reconciliation failed, serving possibly stale data: {e}");
        }
        result
    }

    /// Reconcile, then read all elections matching `query`.
    pub async fn fetch_elections_reconciled(
        &self,
        query: &ElectionQuery,
        include: ElectionInclude,
        now: DateTime<Utc>,
    ) -> Result<Reconciled<Vec<ElectionDetails>>> {
        let reconciliation = self.reconcile_for_read(now).await;
        let elections = self.store.find_elections(query).await?;
        let data = load_details(self.store.as_ref(), elections, include).await?;
        Ok(Reconciled {
            data,
            reconciliation,
        })
    }

    /// Reconcile, then read the first election matching `query`.
    pub async fn fetch_election_reconciled(
        &self,
        query: &ElectionQuery,
        include: ElectionInclude,
        now: DateTime<Utc>,
    ) -> Result<Reconciled<Option<ElectionDetails>>> {
        let reconciled = self.fetch_elections_reconciled(query, include, now).await?;
        Ok(reconciled.map(|elections| elections.into_iter().next()))
    }
}

fn ids(elections: Vec<crate::model::Election>) -> Vec<Id> {
    elections.into_iter().map(|election| election.id).collect()
}
