//! End-to-end flows over the issue service: offline submission and
//! replay, vote toggling, and the demo-record guarantees. Everything
//! runs against the in-memory store; no network required.

use std::sync::Arc;

use civicmap_common::{CivicMapError, GeoPoint, IssueCategory, IssueStatus, Reporter};
use civicmap_sync::{
    IssueFilter, IssueService, IssueStore, MemoryIssueStore, NewIssue, SortKey, VoteChoice,
    VoteLedger,
};

fn reporter() -> Reporter {
    Reporter {
        user_id: "u-citizen".to_string(),
        display_name: "Citizen".to_string(),
    }
}

fn pothole_submission() -> NewIssue {
    NewIssue {
        reporter: reporter(),
        title: "Pothole on Main St".to_string(),
        category: IssueCategory::Pothole,
        description: "Deep pothole near the crossing".to_string(),
        location: GeoPoint { lat: 28.70, lng: 77.10 },
        address: None,
        photos: Vec::new(),
    }
}

async fn service(store: Arc<MemoryIssueStore>, dir: &tempfile::TempDir) -> IssueService {
    let mut service = IssueService::new(store, dir.path()).unwrap();
    service.refresh().await;
    service
}

#[tokio::test]
async fn offline_submission_syncs_when_back_online() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    store.set_offline(true);
    service.set_online(false).await;

    let issue = service.submit(pothole_submission()).await.unwrap();

    // Immediately visible with fresh-report defaults.
    let held = service.get(&issue.id).unwrap();
    assert_eq!(held.status, IssueStatus::Reported);
    assert_eq!(held.upvotes, 0);
    assert_eq!(service.pending(), 1);
    assert!(store.list().await.is_err());

    // Back online: the queue drains and the store now has the issue.
    store.set_offline(false);
    assert!(store.list().await.unwrap().is_empty());
    service.set_online(true).await;
    assert_eq!(service.pending(), 0);

    let remote = store.list().await.unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].title, "Pothole on Main St");
    assert!(service.get(&issue.id).is_some());
}

#[tokio::test]
async fn unreachable_store_at_submit_demotes_to_offline_and_queues() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    // The service still believes it is online; the store has gone away.
    store.set_offline(true);
    assert!(service.is_online());

    let issue = service.submit(pothole_submission()).await.unwrap();
    assert!(!service.is_online());
    assert_eq!(service.pending(), 1);
    assert!(service.get(&issue.id).is_some());

    store.set_offline(false);
    service.set_online(true).await;
    assert_eq!(service.pending(), 0);
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn vote_toggle_returns_counters_to_zero() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let issue = service.submit(pothole_submission()).await.unwrap();
    let mut ledger = VoteLedger::open(dir.path(), "u-voter").unwrap();

    let after_up = service
        .set_vote(&mut ledger, &issue.id, Some(VoteChoice::Up))
        .await
        .unwrap();
    assert_eq!((after_up.upvotes, after_up.downvotes), (1, 0));

    let after_toggle = service.set_vote(&mut ledger, &issue.id, None).await.unwrap();
    assert_eq!((after_toggle.upvotes, after_toggle.downvotes), (0, 0));

    // Confirmed remotely as well.
    let remote = store.list().await.unwrap();
    assert_eq!((remote[0].upvotes, remote[0].downvotes), (0, 0));
}

#[tokio::test]
async fn anonymous_vote_changes_nothing() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let issue = service.submit(pothole_submission()).await.unwrap();
    let mut ledger = VoteLedger::anonymous();

    let err = service
        .set_vote(&mut ledger, &issue.id, Some(VoteChoice::Up))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicMapError::AuthRequired));
    assert_eq!(service.get(&issue.id).unwrap().upvotes, 0);
}

#[tokio::test]
async fn remote_vote_failure_rolls_back_ledger() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let issue = service.submit(pothole_submission()).await.unwrap();
    let mut ledger = VoteLedger::open(dir.path(), "u-voter").unwrap();

    // Store down but connectivity not yet noticed: the mutation fails
    // loudly and the ledger stays consistent with the counters.
    store.set_offline(true);
    let err = service
        .set_vote(&mut ledger, &issue.id, Some(VoteChoice::Up))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicMapError::Store(_)));
    assert_eq!(ledger.get(&issue.id), None);
    assert_eq!(service.get(&issue.id).unwrap().upvotes, 0);
}

#[tokio::test]
async fn demo_issues_cannot_be_deleted_by_anyone() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let demo_id = service.issues()[0].id.clone();
    assert!(demo_id.starts_with("demo-"));

    for (caller, admin) in [("demo", false), ("someone-else", false), ("admin", true)] {
        let err = service.delete(caller, admin, &demo_id).await.unwrap_err();
        assert!(matches!(err, CivicMapError::Forbidden(_)));
    }
    assert!(service.get(&demo_id).is_some());
}

#[tokio::test]
async fn demo_mutations_never_touch_the_store() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let demo_id = service.issues()[0].id.clone();
    let mut ledger = VoteLedger::open(dir.path(), "u-voter").unwrap();

    service
        .set_vote(&mut ledger, &demo_id, Some(VoteChoice::Up))
        .await
        .unwrap();
    service
        .add_suggestion(&reporter(), &demo_id, "escalate to the ward office")
        .await
        .unwrap();

    assert!(store.list().await.unwrap().is_empty());
    let demo = service.get(&demo_id).unwrap();
    assert_eq!(demo.upvotes, 13);
    assert_eq!(demo.suggestions.len(), 1);
}

#[tokio::test]
async fn delete_requires_owner_or_admin() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let issue = service.submit(pothole_submission()).await.unwrap();

    let err = service
        .delete("u-stranger", false, &issue.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CivicMapError::Forbidden(_)));

    service.delete("u-citizen", false, &issue.id).await.unwrap();
    assert!(service.get(&issue.id).is_none());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn status_update_confirms_from_remote() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let issue = service.submit(pothole_submission()).await.unwrap();
    let updated = service
        .set_status(&issue.id, IssueStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(updated.status, IssueStatus::InProgress);
    assert_eq!(
        store.list().await.unwrap()[0].status,
        IssueStatus::InProgress
    );
}

#[tokio::test]
async fn filtered_view_over_service_state() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    service.submit(pothole_submission()).await.unwrap();

    let filter = IssueFilter {
        status: Some(IssueStatus::Reported),
        search: "pothole".to_string(),
        sort: SortKey::MostUpvoted,
        ..Default::default()
    };
    let view = service.filtered(&filter);
    // The demo Connaught Place pothole report plus the new submission.
    assert_eq!(view.len(), 2);
    assert!(view.iter().all(|i| i.status == IssueStatus::Reported));
}

#[tokio::test]
async fn validation_rejects_blank_fields_and_bad_coordinates() {
    let store = Arc::new(MemoryIssueStore::new());
    let dir = tempfile::tempdir().unwrap();
    let mut service = service(store.clone(), &dir).await;

    let mut blank_title = pothole_submission();
    blank_title.title = "  ".to_string();
    assert!(matches!(
        service.submit(blank_title).await.unwrap_err(),
        CivicMapError::Validation(_)
    ));

    let mut bad_location = pothole_submission();
    bad_location.location = GeoPoint { lat: 99.0, lng: 77.1 };
    assert!(matches!(
        service.submit(bad_location).await.unwrap_err(),
        CivicMapError::Validation(_)
    ));

    assert!(store.list().await.unwrap().is_empty());
}
