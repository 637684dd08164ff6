use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::RosterView;
use crate::error::RosterError;
use crate::model::{EmployeeId, EmployeeStatus};
use crate::store::{RecordStore, SnapshotEvent, Subscription};

/// A [`RosterView`] bound to a record store.
///
/// The view lock is only ever taken for synchronous state changes and is never
/// held while a store call is pending, so snapshots keep flowing during writes.
pub struct Roster {
    store: Arc<dyn RecordStore>,
    view: Mutex<RosterView>,
    mounted: AtomicBool,
    revision: watch::Sender<u64>,
}

/// Live subscription feeding a mounted [`Roster`].
///
/// Dropping the handle tears the subscription down as well; `unmount` also
/// waits for the teardown to finish.
#[derive(Debug)]
pub struct MountHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MountHandle {
    pub async fn unmount(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Snapshot listener task ended abnormally");
        }
    }
}

impl Roster {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store,
            view: Mutex::new(RosterView::new()),
            mounted: AtomicBool::new(false),
            revision,
        }
    }

    pub fn view(&self) -> MutexGuard<'_, RosterView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bumped after every snapshot or subscription error applied to the view.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Open the single live subscription for this roster.
    pub fn mount(self: &Arc<Self>) -> Result<MountHandle, RosterError> {
        if self.mounted.swap(true, Ordering::AcqRel) {
            return Err(RosterError::AlreadyMounted);
        }

        let subscription = self.store.subscribe();
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(listen(Arc::clone(self), subscription, stop_rx));
        info!("Roster mounted");

        Ok(MountHandle { stop, task })
    }

    fn apply(&self, event: SnapshotEvent) {
        match event {
            SnapshotEvent::Snapshot(snapshot) => {
                let mut view = self.view();
                view.apply_snapshot(&snapshot);
                debug!(
                    documents = snapshot.documents.len(),
                    employees = view.employees().len(),
                    "Snapshot applied"
                );
            }
            SnapshotEvent::Error(err) => {
                error!(error = %err, "Error loading employees");
                self.view().apply_subscription_error(err);
            }
        }
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub async fn add_employee(&self) -> Result<EmployeeId, RosterError> {
        let (submitted, record) = self.view().prepare_add(Utc::now())?;

        match self.store.create(&record).await {
            Ok(id) => {
                self.view().add_succeeded(&submitted);
                info!(employee_id = %id, "Employee added");
                Ok(id)
            }
            Err(e) => {
                error!(error = %e, "Error adding employee");
                self.view().add_failed(&e);
                Err(e.into())
            }
        }
    }

    pub async fn save_edit(&self) -> Result<EmployeeId, RosterError> {
        let (id, patch) = self.view().prepare_save_edit()?;

        match self.store.update(&id, &patch).await {
            Ok(()) => {
                self.view().edit_saved(&id);
                info!(employee_id = %id, "Employee updated");
                Ok(id)
            }
            Err(e) => {
                error!(error = %e, employee_id = %id, "Error updating employee");
                self.view().edit_failed(&e);
                Err(e.into())
            }
        }
    }

    pub async fn confirm_delete(&self) -> Result<EmployeeId, RosterError> {
        let (id, patch) = self.view().confirm_delete(Utc::now())?;

        let result = self.store.update(&id, &patch).await;
        self.view().delete_settled(&id, result.as_ref().map(|_| ()));
        match result {
            Ok(()) => {
                info!(employee_id = %id, "Employee marked as deleted");
                Ok(id)
            }
            Err(e) => {
                error!(error = %e, employee_id = %id, "Error deleting employee");
                Err(e.into())
            }
        }
    }

    pub async fn toggle_status(&self, id: &EmployeeId) -> Result<EmployeeStatus, RosterError> {
        let (status, patch) = self.view().prepare_toggle(id)?;

        match self.store.update(id, &patch).await {
            Ok(()) => {
                info!(employee_id = %id, status = %status, "Employee status changed");
                Ok(status)
            }
            Err(e) => {
                error!(error = %e, employee_id = %id, "Error updating employee status");
                self.view().toggle_failed(&e);
                Err(e.into())
            }
        }
    }
}

async fn listen(roster: Arc<Roster>, mut subscription: Subscription, mut stop: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            event = subscription.next() => match event {
                Some(event) => roster.apply(event),
                None => {
                    warn!("Snapshot listener closed by the store");
                    break;
                }
            },
        }
    }

    subscription.unsubscribe();
    roster.mounted.store(false, Ordering::Release);
    info!("Roster unmounted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmployeeDraft, EmployeePatch, EmployeeRecord};
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use crate::view::{DeleteConfirmation, StatusFilter};
    use assert_matches::assert_matches;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    /// Holds every create until `gate` is notified.
    struct GatedStore {
        inner: MemoryStore,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl RecordStore for GatedStore {
        fn subscribe(&self) -> Subscription {
            self.inner.subscribe()
        }

        async fn create(&self, record: &EmployeeRecord) -> Result<EmployeeId, StoreError> {
            self.gate.notified().await;
            self.inner.create(record).await
        }

        async fn update(&self, id: &EmployeeId, patch: &EmployeePatch) -> Result<(), StoreError> {
            self.inner.update(id, patch).await
        }
    }

    fn roster() -> (MemoryStore, Arc<Roster>) {
        let store = MemoryStore::new();
        let roster = Arc::new(Roster::new(Arc::new(store.clone())));
        (store, roster)
    }

    async fn settle(roster: &Roster, ready: impl Fn(&RosterView) -> bool) {
        let mut changes = roster.changes();
        timeout(Duration::from_secs(2), async {
            loop {
                if ready(&roster.view()) {
                    break;
                }
                changes.changed().await.expect("roster dropped");
            }
        })
        .await
        .expect("roster view did not settle");
    }

    fn visible_names(view: &RosterView) -> Vec<String> {
        view.visible().iter().map(|e| e.name.clone()).collect()
    }

    fn draft(name: &str, position: &str) -> EmployeeDraft {
        EmployeeDraft {
            name: name.into(),
            position: position.into(),
            ..EmployeeDraft::default()
        }
    }

    #[tokio::test]
    async fn mount_delivers_initial_snapshot() {
        let (store, roster) = roster();
        let handle = roster.mount().unwrap();
        settle(&roster, |view| !view.loading()).await;

        assert!(roster.is_mounted());
        assert_eq!(store.listener_count(), 1);
        handle.unmount().await;
    }

    #[tokio::test]
    async fn only_one_mount_at_a_time() {
        let (store, roster) = roster();
        let handle = roster.mount().unwrap();
        assert_matches!(roster.mount(), Err(RosterError::AlreadyMounted));

        handle.unmount().await;
        assert!(!roster.is_mounted());
        assert_eq!(store.listener_count(), 0);

        let again = roster.mount().unwrap();
        again.unmount().await;
    }

    #[tokio::test]
    async fn dropping_mount_handle_releases_listener() {
        let (store, roster) = roster();
        let handle = roster.mount().unwrap();
        settle(&roster, |view| !view.loading()).await;
        drop(handle);

        timeout(Duration::from_secs(2), async {
            while store.listener_count() > 0 || roster.is_mounted() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("listener was not released");
    }

    #[tokio::test]
    async fn added_employee_appears_after_snapshot() {
        let (_store, roster) = roster();
        let handle = roster.mount().unwrap();
        {
            let mut view = roster.view();
            view.open_add_form();
            view.set_add_draft(draft("Ana Cruz", "Analyst"));
        }

        let id = roster.add_employee().await.unwrap();
        settle(&roster, |view| view.employee(&id).is_some()).await;

        let mut view = roster.view();
        assert!(!view.add_form().open);
        for (filter, expected) in [
            (StatusFilter::All, true),
            (StatusFilter::Active, true),
            (StatusFilter::Inactive, false),
            (StatusFilter::OnLeave, false),
        ] {
            view.set_filter(filter);
            assert_eq!(visible_names(&view).contains(&"Ana Cruz".to_string()), expected);
        }
        drop(view);
        handle.unmount().await;
    }

    #[tokio::test]
    async fn pending_add_keeps_newer_draft_and_blocks_resubmit() {
        let store = MemoryStore::new();
        let gate = Arc::new(Notify::new());
        let roster = Arc::new(Roster::new(Arc::new(GatedStore {
            inner: store.clone(),
            gate: Arc::clone(&gate),
        })));
        {
            let mut view = roster.view();
            view.open_add_form();
            view.set_add_draft(draft("First", "Analyst"));
        }

        let pending = tokio::spawn({
            let roster = Arc::clone(&roster);
            async move { roster.add_employee().await }
        });
        timeout(Duration::from_secs(2), async {
            while !roster.view().add_form().submitting {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("add was not submitted");

        assert_matches!(roster.add_employee().await, Err(RosterError::AddInFlight));
        roster.view().set_add_draft(draft("Second", "Analyst"));

        gate.notify_one();
        pending.await.unwrap().unwrap();

        let view = roster.view();
        assert!(view.add_form().open);
        assert!(!view.add_form().submitting);
        assert_eq!(view.add_form().draft.name, "Second");
        assert!(view.notice().is_none());
        drop(view);
        assert_eq!(store.create_calls(), 1);
        assert_eq!(store.documents()[0].data["name"], "First");
    }

    #[tokio::test]
    async fn blank_draft_never_reaches_store() {
        let (store, roster) = roster();
        roster.view().set_add_draft(draft("Ana Cruz", "   "));

        assert_matches!(roster.add_employee().await, Err(RosterError::Validation(_)));
        assert_eq!(store.create_calls(), 0);
    }

    #[tokio::test]
    async fn failed_add_keeps_draft_and_notifies() {
        let (store, roster) = roster();
        {
            let mut view = roster.view();
            view.open_add_form();
            view.set_add_draft(draft("Ana Cruz", "Analyst"));
        }
        store.fail_next_write(StoreError::Transport("offline".into()));

        assert_matches!(
            roster.add_employee().await,
            Err(RosterError::Store(StoreError::Transport(_)))
        );
        let view = roster.view();
        assert!(view.add_form().open);
        assert_eq!(view.add_form().draft.name, "Ana Cruz");
        assert!(view.notice().is_some());
    }

    #[tokio::test]
    async fn toggle_moves_employee_between_filters() {
        let (store, roster) = roster();
        let handle = roster.mount().unwrap();
        roster.view().set_add_draft(draft("Ana Cruz", "Analyst"));
        let id = roster.add_employee().await.unwrap();
        settle(&roster, |view| view.employee(&id).is_some()).await;

        let status = roster.toggle_status(&id).await.unwrap();
        assert_eq!(status, EmployeeStatus::Inactive);

        let (updated, fields) = store.last_update().unwrap();
        assert_eq!(updated, id);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["status"], "inactive");

        settle(&roster, |view| {
            view.employee(&id).map(|e| e.status) == Some(EmployeeStatus::Inactive)
        })
        .await;
        let mut view = roster.view();
        view.set_filter(StatusFilter::Active);
        assert!(visible_names(&view).is_empty());
        view.set_filter(StatusFilter::Inactive);
        assert_eq!(visible_names(&view), vec!["Ana Cruz"]);
        drop(view);
        handle.unmount().await;
    }

    #[tokio::test]
    async fn confirmed_delete_hides_record_but_keeps_document() {
        let (store, roster) = roster();
        let handle = roster.mount().unwrap();
        roster.view().set_add_draft(draft("Ana Cruz", "Analyst"));
        let id = roster.add_employee().await.unwrap();
        settle(&roster, |view| view.employee(&id).is_some()).await;

        assert_matches!(roster.confirm_delete().await, Err(RosterError::NoPendingDelete));
        assert_eq!(store.update_calls(), 0);

        roster.view().request_delete(&id).unwrap();
        roster.confirm_delete().await.unwrap();
        settle(&roster, |view| view.employee(&id).is_none()).await;

        let view = roster.view();
        assert_eq!(view.delete_confirmation(), &DeleteConfirmation::Idle);
        assert_eq!(view.stats().total, 0);
        drop(view);

        let stored = store.document(&id).unwrap();
        assert_eq!(stored.data["deleted"], true);
        assert!(stored.data["deletedAt"].is_string());
        handle.unmount().await;
    }

    #[tokio::test]
    async fn failed_delete_can_be_retried() {
        let (store, roster) = roster();
        let handle = roster.mount().unwrap();
        roster.view().set_add_draft(draft("Ana Cruz", "Analyst"));
        let id = roster.add_employee().await.unwrap();
        settle(&roster, |view| view.employee(&id).is_some()).await;

        roster.view().request_delete(&id).unwrap();
        store.fail_next_write(StoreError::Transport("offline".into()));
        assert!(roster.confirm_delete().await.is_err());
        assert_eq!(
            roster.view().delete_confirmation(),
            &DeleteConfirmation::Pending(id.clone())
        );

        roster.confirm_delete().await.unwrap();
        settle(&roster, |view| view.employee(&id).is_none()).await;
        handle.unmount().await;
    }

    #[tokio::test]
    async fn edit_save_writes_draft_and_clears_edit_mode() {
        let (store, roster) = roster();
        let handle = roster.mount().unwrap();
        roster.view().set_add_draft(draft("Ana Cruz", "Analyst"));
        let id = roster.add_employee().await.unwrap();
        settle(&roster, |view| view.employee(&id).is_some()).await;

        {
            let mut view = roster.view();
            view.start_edit(&id).unwrap();
            let mut fields = view.editing().unwrap().fields.clone();
            fields.position = "Lead Analyst".into();
            fields.status = EmployeeStatus::OnLeave;
            view.set_edit_fields(fields).unwrap();
        }
        store.fail_next_write(StoreError::Transport("offline".into()));
        assert!(roster.save_edit().await.is_err());
        assert!(roster.view().editing().is_some());

        roster.save_edit().await.unwrap();
        assert!(roster.view().editing().is_none());
        settle(&roster, |view| {
            view.employee(&id).map(|e| e.position.as_str()) == Some("Lead Analyst")
        })
        .await;

        let stored = store.document(&id).unwrap();
        assert_eq!(stored.data["status"], "on-leave");
        assert_eq!(stored.data["deleted"], false);
        handle.unmount().await;
    }

    #[tokio::test]
    async fn subscription_failure_is_not_retried() {
        let (store, roster) = roster();
        roster.view().set_add_draft(draft("Ana Cruz", "Analyst"));
        roster.add_employee().await.unwrap();

        let handle = roster.mount().unwrap();
        settle(&roster, |view| view.employees().len() == 1).await;

        store.break_subscriptions(StoreError::Transport("connection reset".into()));
        settle(&roster, |view| view.sync_error().is_some()).await;

        let view = roster.view();
        assert!(!view.loading());
        assert_eq!(view.employees().len(), 1);
        drop(view);
        handle.unmount().await;
        assert_eq!(store.listener_count(), 0);
    }
}
