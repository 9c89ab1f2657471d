use parking_lot::{ Mutex, RwLock };
use std::collections::{ HashMap, HashSet };
use std::sync::Arc;
use log::{ debug, info, warn };

use super::RequestSequence;
use crate::backend::ConsoleBackend;
use crate::error::ConsoleError;
use crate::notification::NotificationCenter;
use crate::point::{ group_by_collection, CollectionGroup, EditingPoint, Point, PointMetadata };
use crate::schema::Confidentiality;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The backend accepted the update. `refreshed` is false when the follow-up
    /// listing failed or was superseded by a newer load.
    Saved { refreshed: bool },
    /// There was no draft for that id.
    Skipped,
}

#[derive(Default)]
struct EditPointsState {
    points: Vec<Point>,
    drafts: HashMap<String, EditingPoint>,
    expanded_collections: HashSet<String>,
    expanded_points: HashSet<String>,
    saving: HashSet<String>,
    loading: bool,
}

/// Page that lists stored points by collection and edits their field metadata.
pub struct EditPointsPage {
    backend: RwLock<Arc<dyn ConsoleBackend>>,
    state: Mutex<EditPointsState>,
    load_requests: RequestSequence,
    notifications: Arc<NotificationCenter>,
}

impl EditPointsPage {
    pub fn new(backend: Arc<dyn ConsoleBackend>, notifications: Arc<NotificationCenter>) -> Self {
        Self {
            backend: RwLock::new(backend),
            state: Mutex::new(EditPointsState::default()),
            load_requests: RequestSequence::new(),
            notifications,
        }
    }

    pub fn set_backend(&self, backend: Arc<dyn ConsoleBackend>) {
        *self.backend.write() = backend;
    }

    fn backend(&self) -> Arc<dyn ConsoleBackend> {
        self.backend.read().clone()
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn points(&self) -> Vec<Point> {
        self.state.lock().points.clone()
    }

    pub fn groups(&self) -> Vec<CollectionGroup> {
        group_by_collection(&self.state.lock().points)
    }

    pub fn draft(&self, id: &str) -> Option<EditingPoint> {
        self.state.lock().drafts.get(id).cloned()
    }

    pub fn has_changes(&self, id: &str) -> bool {
        self.state.lock().drafts.get(id).is_some_and(|draft| draft.has_changes)
    }

    pub fn is_saving(&self, id: &str) -> bool {
        self.state.lock().saving.contains(id)
    }

    /// Fetches every point and rebuilds all drafts from it.
    ///
    /// Returns `Ok(false)` when a newer load was issued before this one
    /// finished; its response is dropped.
    pub async fn load_points(&self) -> Result<bool, ConsoleError> {
        let ticket = self.load_requests.issue();
        self.state.lock().loading = true;

        let result = self.backend().list_points().await;

        if !self.load_requests.is_latest(ticket) {
            debug!("Discarding point listing {} superseded by a newer request.", ticket);
            return Ok(false);
        }

        let mut state = self.state.lock();
        state.loading = false;
        match result {
            Ok(points) => {
                info!("Loaded {} points.", points.len());
                state.drafts = points
                    .iter()
                    .map(|point| (point.id.clone(), EditingPoint::from_point(point)))
                    .collect();
                state.points = points;
                Ok(true)
            }
            Err(e) => {
                drop(state);
                let message = format!("Failed to load points: {}", e.notification_message());
                warn!("{}", message);
                self.notifications.error(message);
                Err(e)
            }
        }
    }

    pub fn toggle_collection(&self, collection: &str) {
        let mut state = self.state.lock();
        if !state.expanded_collections.remove(collection) {
            state.expanded_collections.insert(collection.to_string());
        }
    }

    pub fn is_collection_expanded(&self, collection: &str) -> bool {
        self.state.lock().expanded_collections.contains(collection)
    }

    pub fn toggle_point(&self, id: &str) {
        let mut state = self.state.lock();
        if !state.expanded_points.remove(id) {
            state.expanded_points.insert(id.to_string());
        }
    }

    pub fn is_point_expanded(&self, id: &str) -> bool {
        self.state.lock().expanded_points.contains(id)
    }

    /// Edits one field of one draft. Allowed while that point is being saved.
    pub fn update_description(&self, id: &str, field: &str, description: &str) -> bool {
        let mut state = self.state.lock();
        state.drafts.get_mut(id).is_some_and(|draft| draft.set_description(field, description))
    }

    pub fn update_confidentiality(&self, id: &str, field: &str, value: Confidentiality) -> bool {
        let mut state = self.state.lock();
        state.drafts.get_mut(id).is_some_and(|draft| draft.set_confidentiality(field, value))
    }

    /// Throws the draft away and rebuilds it from the last fetched point.
    pub fn cancel_changes(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let Some(original) = state.points.iter().find(|point| point.id == id) else {
            return false;
        };
        let draft = EditingPoint::from_point(original);
        state.drafts.insert(id.to_string(), draft);
        true
    }

    /// Persists one point's draft.
    ///
    /// Only one save per point may be in flight; saves of different points
    /// run independently. After a successful save the listing is refetched
    /// and merged so unsaved drafts of other points survive.
    pub async fn save_point(&self, id: &str) -> Result<SaveOutcome, ConsoleError> {
        let request = {
            let mut state = self.state.lock();
            let Some(draft) = state.drafts.get(id) else {
                debug!("No draft for point '{}'; nothing to save.", id);
                return Ok(SaveOutcome::Skipped);
            };
            let request = draft.to_update_request();
            if !state.saving.insert(id.to_string()) {
                return Err(ConsoleError::Busy(format!("save of point '{}'", id)));
            }
            request
        };

        let result = self.backend().update_point(&request).await;
        self.state.lock().saving.remove(id);

        if let Err(e) = result {
            warn!("Saving point '{}' failed: {}", id, e);
            self.notifications.error(e.notification_message());
            return Err(e);
        }

        {
            let mut state = self.state.lock();
            // Edits typed while the request was in flight stay pending.
            if let Some(draft) = state.drafts.get_mut(id) {
                if draft.fields == request.point.value {
                    draft.has_changes = false;
                }
            }
            let saved = Point {
                id: request.point.id.clone(),
                collection: request.collection_name.vector_database.clone(),
                metadata: PointMetadata {
                    table_name: request.point.table_name.clone(),
                    value: request.point.value.clone(),
                },
            };
            if let Some(baseline) = state.points.iter_mut().find(|point| point.id == id) {
                *baseline = saved;
            }
        }
        self.notifications.success(format!("Point {} updated", request.point.table_name));

        let refreshed = self.refresh_after_save(id).await;
        Ok(SaveOutcome::Saved { refreshed })
    }

    async fn refresh_after_save(&self, saved_id: &str) -> bool {
        let ticket = self.load_requests.issue();
        self.state.lock().loading = true;

        let result = self.backend().list_points().await;

        if !self.load_requests.is_latest(ticket) {
            debug!("Refresh after saving '{}' superseded by a newer load.", saved_id);
            return false;
        }

        let mut state = self.state.lock();
        state.loading = false;
        match result {
            Ok(fresh) => {
                merge_listing(&mut state, fresh, saved_id);
                true
            }
            Err(e) => {
                drop(state);
                let message = format!(
                    "Point saved, but refreshing the list failed: {}",
                    e.notification_message()
                );
                warn!("{}", message);
                self.notifications.error(message);
                false
            }
        }
    }
}

/// Folds a fresh listing into the page without losing unsaved work: points
/// with pending edits keep their draft and baseline, everything else follows
/// the backend. The saved point always takes the backend's copy as baseline.
fn merge_listing(state: &mut EditPointsState, fresh: Vec<Point>, saved_id: &str) {
    let mut old_drafts = std::mem::take(&mut state.drafts);
    let mut old_points: HashMap<String, Point> = std::mem::take(&mut state.points)
        .into_iter()
        .map(|point| (point.id.clone(), point))
        .collect();

    let mut points = Vec::with_capacity(fresh.len());
    let mut drafts = HashMap::with_capacity(fresh.len());

    for point in fresh {
        let id = point.id.clone();
        match old_drafts.remove(&id) {
            Some(draft) if draft.has_changes => {
                let baseline = if id == saved_id {
                    point
                } else {
                    old_points.remove(&id).unwrap_or(point)
                };
                points.push(baseline);
                drafts.insert(id, draft);
            }
            _ => {
                drafts.insert(id, EditingPoint::from_point(&point));
                points.push(point);
            }
        }
    }

    // Pending edits on points the backend no longer lists are kept for the operator to resolve.
    let mut orphaned: Vec<(String, EditingPoint)> = old_drafts
        .into_iter()
        .filter(|(_, draft)| draft.has_changes)
        .collect();
    orphaned.sort_by(|a, b| a.0.cmp(&b.0));
    for (id, draft) in orphaned {
        if let Some(baseline) = old_points.remove(&id) {
            points.push(baseline);
            drafts.insert(id, draft);
        }
    }

    debug!(
        "Merged listing: {} points, {} with pending edits.",
        points.len(),
        drafts.values().filter(|draft| draft.has_changes).count()
    );
    state.points = points;
    state.drafts = drafts;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::testing::FakeBackend;
    use serde_json::{ json, Value };

    fn listing() -> Value {
        json!([
            {
                "id": "a",
                "collection": "docs",
                "matadata": {
                    "table_name": "users",
                    "value": { "email": { "description": "contact address", "confidentiality": 7 } }
                }
            },
            {
                "id": "b",
                "collection": "docs",
                "matadata": {
                    "table_name": "orders",
                    "value": { "total": { "description": "order sum", "confidentiality": 3 } }
                }
            },
            {
                "id": "c",
                "collection": "images",
                "matadata": {
                    "table_name": "photos",
                    "value": { "url": { "description": "", "confidentiality": 5 } }
                }
            }
        ])
    }

    async fn loaded_page() -> (Arc<EditPointsPage>, Arc<FakeBackend>) {
        let fake = FakeBackend::with_points(listing());
        let page = EditPointsPage::new(fake.clone(), Arc::new(NotificationCenter::default()));
        assert!(page.load_points().await.unwrap());
        (Arc::new(page), fake)
    }

    #[tokio::test]
    async fn groups_by_collection() {
        let (page, _) = loaded_page().await;
        let groups = page.groups();
        let summary: Vec<_> = groups.iter().map(|g| (g.name.as_str(), g.count())).collect();
        assert_eq!(summary, vec![("docs", 2), ("images", 1)]);
    }

    #[tokio::test]
    async fn drafts_start_clean() {
        let (page, _) = loaded_page().await;
        for id in ["a", "b", "c"] {
            assert!(!page.has_changes(id));
        }
        assert!(!page.is_loading());
    }

    #[tokio::test]
    async fn edit_touches_only_one_point() {
        let (page, _) = loaded_page().await;
        assert!(page.update_description("a", "email", "work email"));
        assert!(page.has_changes("a"));
        assert!(!page.has_changes("b"));
        assert_eq!(page.points()[0].metadata.value["email"].description, "contact address");
        assert!(!page.update_description("a", "missing", "x"));
        assert!(!page.update_description("zzz", "email", "x"));
    }

    #[tokio::test]
    async fn cancel_restores_fetched_fields() {
        let (page, _) = loaded_page().await;
        let original = page.draft("a").unwrap().fields;
        page.update_description("a", "email", "work email");
        page.update_confidentiality("a", "email", Confidentiality::new(1));

        assert!(page.cancel_changes("a"));
        let draft = page.draft("a").unwrap();
        assert!(!draft.has_changes);
        assert_eq!(draft.fields, original);
        assert!(!page.cancel_changes("zzz"));
    }

    #[tokio::test]
    async fn successful_save_clears_flag_and_sends_shape() {
        let (page, fake) = loaded_page().await;
        page.update_confidentiality("a", "email", Confidentiality::new(9));

        let outcome = page.save_point("a").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { refreshed: true });
        assert!(!page.has_changes("a"));
        assert_eq!(page.draft("a").unwrap().fields["email"].confidentiality.get(), 9);
        assert_eq!(page.notifications().current().unwrap().message, "Point users updated");

        let sent = serde_json::to_value(&fake.updates.lock()[0]).unwrap();
        assert_eq!(
            sent,
            json!({
                "point": {
                    "id": "a",
                    "table_name": "users",
                    "value": { "email": { "description": "contact address", "confidentiality": 9 } }
                },
                "collection_name": { "vector_database": "docs" }
            })
        );
    }

    #[tokio::test]
    async fn failed_save_keeps_draft_dirty() {
        let (page, fake) = loaded_page().await;
        *fake.update_failure.lock() = Some((422, r#"{"detail":"bad field"}"#.to_string()));
        page.update_description("a", "email", "work email");

        let err = page.save_point("a").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Status { status: 422, .. }));
        assert!(page.has_changes("a"));
        assert_eq!(page.draft("a").unwrap().fields["email"].description, "work email");
        assert!(!page.is_saving("a"));

        let shown = page.notifications().current().unwrap();
        assert!(shown.is_error());
        assert_eq!(shown.message, serde_json::to_string_pretty(&json!({ "detail": "bad field" })).unwrap());
    }

    #[tokio::test]
    async fn saving_one_point_keeps_other_drafts() {
        let (page, _) = loaded_page().await;
        page.update_description("a", "email", "work email");
        page.update_description("b", "total", "gross order sum");

        page.save_point("a").await.unwrap();

        assert!(!page.has_changes("a"));
        assert!(page.has_changes("b"));
        assert_eq!(page.draft("b").unwrap().fields["total"].description, "gross order sum");

        assert!(page.cancel_changes("b"));
        assert_eq!(page.draft("b").unwrap().fields["total"].description, "order sum");
    }

    #[tokio::test]
    async fn refresh_picks_up_backend_changes_for_clean_points() {
        let (page, fake) = loaded_page().await;
        fake.points.lock()[2].metadata.value["url"].description = "image location".into();
        page.update_description("a", "email", "work email");

        page.save_point("a").await.unwrap();
        assert_eq!(page.draft("c").unwrap().fields["url"].description, "image location");
    }

    #[tokio::test]
    async fn missing_draft_is_skipped() {
        let (page, fake) = loaded_page().await;
        assert_eq!(page.save_point("nope").await.unwrap(), SaveOutcome::Skipped);
        assert!(fake.updates.lock().is_empty());
    }

    #[tokio::test]
    async fn one_save_in_flight_per_point() {
        let (page, fake) = loaded_page().await;
        page.update_description("a", "email", "work email");
        let gate = fake.gate_next_update();

        let first = {
            let page = page.clone();
            tokio::spawn(async move { page.save_point("a").await })
        };
        fake.update_entered.notified().await;
        assert!(page.is_saving("a"));

        assert!(matches!(page.save_point("a").await, Err(ConsoleError::Busy(_))));

        // Other points save while "a" is still pending, and "a" stays editable.
        page.update_description("b", "total", "gross order sum");
        assert_eq!(page.save_point("b").await.unwrap(), SaveOutcome::Saved { refreshed: true });
        assert!(page.update_description("a", "email", "typed during save"));

        gate.notify_one();
        assert!(matches!(first.await.unwrap(), Ok(SaveOutcome::Saved { .. })));

        // The edit made during the save was not part of it and remains pending.
        assert!(page.has_changes("a"));
        assert_eq!(page.draft("a").unwrap().fields["email"].description, "typed during save");
        assert!(!page.has_changes("b"));
        assert!(!page.is_saving("a"));
    }

    #[tokio::test]
    async fn saves_of_different_points_can_be_joined() {
        let (page, fake) = loaded_page().await;
        page.update_description("a", "email", "work email");
        page.update_confidentiality("b", "total", Confidentiality::new(6));

        let (a, b) = futures::future::join(page.save_point("a"), page.save_point("b")).await;
        assert!(matches!(a, Ok(SaveOutcome::Saved { .. })));
        assert!(matches!(b, Ok(SaveOutcome::Saved { .. })));

        assert_eq!(fake.updates.lock().len(), 2);
        assert!(!page.has_changes("a"));
        assert!(!page.has_changes("b"));
        assert_eq!(page.draft("b").unwrap().fields["total"].confidentiality.get(), 6);
    }

    #[tokio::test]
    async fn stale_listing_is_dropped() {
        let (page, fake) = loaded_page().await;
        let gate = fake.gate_next_list();

        let slow = {
            let page = page.clone();
            tokio::spawn(async move { page.load_points().await })
        };
        fake.list_entered.notified().await;

        fake.points.lock().truncate(1);
        assert!(page.load_points().await.unwrap());
        gate.notify_one();

        assert!(!slow.await.unwrap().unwrap());
        assert_eq!(page.points().len(), 1);
        assert!(!page.is_loading());
    }

    #[tokio::test]
    async fn failed_listing_reports_error() {
        let fake = FakeBackend::new();
        *fake.list_failure.lock() = Some((500, "boom".to_string()));
        let page = EditPointsPage::new(fake, Arc::new(NotificationCenter::default()));

        assert!(page.load_points().await.is_err());
        assert!(!page.is_loading());
        assert_eq!(page.notifications().current().unwrap().message, "Failed to load points: boom");
    }

    #[tokio::test(start_paused = true)]
    async fn error_notification_closes_itself() {
        let fake = FakeBackend::new();
        *fake.list_failure.lock() = Some((500, "boom".to_string()));
        let page = EditPointsPage::new(fake, Arc::new(NotificationCenter::default()));

        assert!(page.load_points().await.is_err());
        assert!(page.notifications().current().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(3001)).await;
        assert!(page.notifications().current().is_none());
    }

    #[tokio::test]
    async fn failed_refresh_still_counts_as_saved() {
        let (page, fake) = loaded_page().await;
        page.update_description("a", "email", "y");
        *fake.list_failure.lock() = Some((500, "down".to_string()));

        let outcome = page.save_point("a").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { refreshed: false });
        assert!(!page.has_changes("a"));
        assert!(!page.is_loading());
        assert_eq!(page.points()[0].metadata.value["email"].description, "y");

        let shown = page.notifications().current().unwrap();
        assert!(shown.is_error());
        assert_eq!(shown.message, "Point saved, but refreshing the list failed: down");

        // The draft now matches its new baseline, so cancelling changes nothing.
        assert!(page.cancel_changes("a"));
        assert_eq!(page.draft("a").unwrap().fields["email"].description, "y");
    }

    #[tokio::test]
    async fn refresh_merge_keeps_dirty_orphans_and_adds_new_points() {
        let (page, fake) = loaded_page().await;
        page.update_description("b", "total", "gross order sum");
        let added: Point = serde_json::from_value(
            json!({
                "id": "d",
                "collection": "audio",
                "matadata": { "table_name": "tracks", "value": {} }
            })
        ).unwrap();
        {
            let mut points = fake.points.lock();
            points.retain(|point| point.id == "a");
            points.push(added);
        }
        page.update_description("a", "email", "work email");

        assert_eq!(page.save_point("a").await.unwrap(), SaveOutcome::Saved { refreshed: true });

        let ids: Vec<_> = page.points().into_iter().map(|point| point.id).collect();
        assert_eq!(ids, vec!["a", "d", "b"]);
        assert!(page.draft("c").is_none());
        assert!(page.draft("d").is_some_and(|draft| !draft.has_changes));
        assert!(page.has_changes("b"));
        assert_eq!(page.draft("b").unwrap().fields["total"].description, "gross order sum");
    }

    #[tokio::test]
    async fn expansion_is_independent() {
        let (page, _) = loaded_page().await;
        page.toggle_collection("docs");
        page.toggle_point("c");
        assert!(page.is_collection_expanded("docs"));
        assert!(!page.is_collection_expanded("images"));
        assert!(page.is_point_expanded("c"));
        assert!(!page.is_point_expanded("a"));
        page.toggle_collection("docs");
        assert!(!page.is_collection_expanded("docs"));
    }
}
