use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

use sportswap::db::{init_db, FavoritesStore};
use sportswap::models::{GeoPoint, Item, ItemResponse};
use sportswap::remote::{
    DocumentStore, EmulatorBackend, Fields, IdentityProvider, MemoryDocumentStore,
    MemoryIdentity, MemoryObjectStorage, StoreOp, ITEMS_COLLECTION, USERS_COLLECTION,
};
use sportswap::repository::{AuthGateway, ItemRepository};
use sportswap::resource::settle;
use sportswap::service::{FavoritesService, ListingService};
use sportswap::{Resource, SwapError};

struct MemoryBackend {
    documents: Arc<MemoryDocumentStore>,
    storage: Arc<MemoryObjectStorage>,
    identity: Arc<MemoryIdentity>,
    items: ItemRepository,
}

fn memory_backend(identity: MemoryIdentity) -> MemoryBackend {
    let documents = Arc::new(MemoryDocumentStore::new());
    let storage = Arc::new(MemoryObjectStorage::default());
    let identity = Arc::new(identity);
    let items = ItemRepository::new(documents.clone(), storage.clone(), identity.clone());
    MemoryBackend {
        documents,
        storage,
        identity,
        items,
    }
}

fn profile(name: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".into(), json!(name));
    fields.insert("email".into(), json!("u1@example.com"));
    fields.insert("address".into(), json!("York"));
    fields
}

fn tennis_racket() -> Item {
    Item::new("Tennis Racket")
        .with_description("Carbon frame, new grip")
        .with_type("Racquet Sports")
        .with_condition("Used")
        .with_price("25")
        .with_location(GeoPoint::new(53.96, -1.08), "York, UK")
        .with_images(vec![vec![0xFF, 0xD8], vec![0x89, 0x50]])
}

async fn terminal<T: Clone>(receiver: &mut broadcast::Receiver<Resource<T>>) -> Resource<T> {
    loop {
        let state = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        if state.is_terminal() {
            return state;
        }
    }
}

#[tokio::test]
async fn test_listing_submitted_by_user_round_trips() {
    let backend = memory_backend(MemoryIdentity::signed_in("U1"));
    backend.documents.insert(USERS_COLLECTION, "U1", profile("Uma"));
    let listing = ListingService::new(backend.items.clone(), backend.identity.clone());
    let mut states = listing.subscribe();

    listing.update_draft(tennis_racket());
    listing.submit();

    let id = match terminal(&mut states).await {
        Resource::Success(id) => id,
        other => panic!("expected success, got {:?}", other),
    };
    let stored = backend.documents.snapshot(ITEMS_COLLECTION, &id).unwrap();
    assert_eq!(stored.get("listedByKey"), Some(&json!("U1")));

    let item = settle(backend.items.fetch_item_by_id(&id)).await.unwrap();
    assert_eq!(item.status, "Listed");
    assert_eq!(item.name, "Tennis Racket");
    assert_eq!(item.description, "Carbon frame, new grip");
    assert_eq!(item.item_type, "Racquet Sports");
    assert_eq!(item.condition, "Used");
    assert_eq!(item.price, "25");
    assert_eq!(item.images.len(), 2);
    assert_eq!(item.listed_by.as_ref().map(|u| u.name.as_str()), Some("Uma"));
    assert_eq!(backend.storage.keys().len(), 2);

    backend.items.flush().await;
    let user = backend.documents.snapshot(USERS_COLLECTION, "U1").unwrap();
    assert_eq!(user.get("listedItems"), Some(&json!([id])));
}

#[tokio::test]
async fn test_missing_item_is_not_found() {
    let backend = memory_backend(MemoryIdentity::new());

    let err = settle(backend.items.fetch_item_by_id("nonexistent"))
        .await
        .unwrap_err();
    assert_eq!(err, SwapError::NotFound("Item not found".to_string()));
    assert_eq!(err.to_string(), "Item not found");
}

#[tokio::test]
async fn test_empty_id_batch_makes_no_remote_call() {
    let backend = memory_backend(MemoryIdentity::new());

    let items = settle(backend.items.fetch_items_by_ids(vec![])).await.unwrap();
    assert!(items.is_empty());
    assert_eq!(backend.documents.call_count(StoreOp::Get), 0);
}

#[tokio::test]
async fn test_favorites_hide_items_gone_from_remote() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_db(&temp_dir.path().join("favorites.db")).await.unwrap();
    let store = Arc::new(FavoritesStore::open(pool).await.unwrap());
    let backend = memory_backend(MemoryIdentity::signed_in("U1"));

    let id_a = settle(backend.items.upload_item(tennis_racket()))
        .await
        .unwrap();
    let favorites = FavoritesService::new(store.clone(), backend.items.clone());
    favorites.like_item(&id_a).await.unwrap();
    favorites.like_item("B").await.unwrap();
    favorites.like_item("B").await.unwrap();
    assert_eq!(store.ids().len(), 2);

    let mut states = favorites.subscribe();
    favorites.activate();
    let state = terminal(&mut states).await;
    let ids: Vec<&str> = state
        .success()
        .unwrap()
        .iter()
        .map(|item: &ItemResponse| item.id.as_str())
        .collect();
    assert_eq!(ids, vec![id_a.as_str()]);

    let ghost = ItemResponse {
        id: "C".to_string(),
        ..state.success().unwrap()[0].clone()
    };
    assert!(!favorites.unlike_item(&ghost).await.unwrap());
    assert_eq!(store.ids().len(), 2);
}

#[tokio::test]
async fn test_emulator_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let id = {
        let backend = Arc::new(EmulatorBackend::open(temp_dir.path()).await.unwrap());
        let auth = AuthGateway::new(backend.clone(), backend.clone());
        settle(auth.register("uma@example.com", "secret", "Uma"))
            .await
            .unwrap();

        let items = ItemRepository::new(backend.clone(), backend.clone(), backend.clone());
        let id = settle(items.upload_item(tennis_racket())).await.unwrap();
        items.flush().await;
        id
    };

    let backend = Arc::new(EmulatorBackend::open(temp_dir.path()).await.unwrap());
    let session = backend.current_session().unwrap();
    assert_eq!(session.email.as_deref(), Some("uma@example.com"));

    let items = ItemRepository::new(backend.clone(), backend.clone(), backend.clone());
    let mine = settle(items.fetch_my_listed_items()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, id);

    let detail = settle(items.fetch_item_by_id(&id)).await.unwrap();
    let owner = detail.listed_by.unwrap();
    assert_eq!(owner.name, "Uma");
    assert_eq!(owner.listed_items, vec![id.clone()]);
    assert!(detail.images.iter().all(|url| url.starts_with("file://")));
}

/// `sportswap item add` returns right after the listing is confirmed and
/// the runtime goes away with it.
#[test]
fn test_listing_reaches_profile_before_runtime_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let runtime = || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    };

    let (user_id, id) = runtime().block_on(async {
        let backend = Arc::new(EmulatorBackend::open(temp_dir.path()).await.unwrap());
        let auth = AuthGateway::new(backend.clone(), backend.clone());
        let session = settle(auth.register("uma@example.com", "secret", "Uma"))
            .await
            .unwrap();

        let items = ItemRepository::new(backend.clone(), backend.clone(), backend.clone());
        let listing = ListingService::new(items.clone(), backend.clone());
        let mut states = listing.subscribe();
        listing.update_draft(tennis_racket());
        listing.submit();

        let id = match terminal(&mut states).await {
            Resource::Success(id) => id,
            other => panic!("expected success, got {:?}", other),
        };
        items.flush().await;
        (session.user_id, id)
    });

    let listed = runtime().block_on(async {
        let backend = EmulatorBackend::open(temp_dir.path()).await.unwrap();
        backend
            .get(USERS_COLLECTION, &user_id)
            .await
            .unwrap()
            .and_then(|doc| doc.fields.get("listedItems").cloned())
    });
    assert_eq!(listed, Some(json!([id])));
}

#[tokio::test]
async fn test_signed_out_user_cannot_list_own_items() {
    let backend = memory_backend(MemoryIdentity::signed_in("U1"));
    backend.identity.sign_out().await.unwrap();

    let err = settle(backend.items.fetch_my_listed_items())
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());
}
