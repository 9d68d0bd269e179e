//! Client caches converge with the store by applying events.

use sample_depot_core::cache::{Applied, ClientCache, Snapshot};
use sample_depot_core::events::ServerEvent;
use sample_depot_core::{Role, Sample, Size, SizeId};
use sample_depot_integration_tests::{TestDepot, placement};
use sample_depot_server::db::InventoryStore;
use sample_depot_server::services::SizeUpdate;

fn size(id: i32, box_number: &str, shelf: &str, section: i32) -> Size {
    Size {
        id: SizeId::new(id),
        sample_code: "A123".to_owned(),
        box_number: Some(box_number.to_owned()),
        size_label: format!("L{id}"),
        quantity: 1,
        placement: Some(placement(shelf, section, 1)),
    }
}

#[test]
fn test_replayed_added_event_is_a_no_op() {
    let sample = Sample {
        code: "A123".to_owned(),
        description: None,
        image: sample_depot_core::MISSING_IMAGE.to_owned(),
    };
    let mut cache = ClientCache::from_snapshot(Snapshot::default());

    let added = ServerEvent::SampleAdded(sample);
    assert_eq!(cache.apply(&added), Applied::Changed);
    let before = cache.clone();
    assert_eq!(cache.apply(&added), Applied::Unchanged);
    assert_eq!(cache, before);

    let size_added = ServerEvent::SizeAdded(size(1, "B7", "S1", 1));
    assert_eq!(cache.apply(&size_added), Applied::Changed);
    assert_eq!(cache.apply(&size_added), Applied::Unchanged);
    assert_eq!(cache.sizes_of("A123").len(), 1);
}

#[test]
fn test_box_updates_converge_to_one_placement() {
    let mut cache = ClientCache::from_snapshot(Snapshot {
        sizes: vec![size(1, "B7", "S1", 1), size(2, "B7", "S1", 1)],
        ..Snapshot::default()
    });

    for event in [
        size(1, "B7", "S2", 3),
        size(2, "B7", "S2", 3),
        size(2, "B7", "S4", 8),
        size(1, "B7", "S4", 8),
    ]
    .map(ServerEvent::SizeUpdated)
    {
        cache.apply(&event);
    }

    let placements: Vec<_> = cache
        .sizes_of("A123")
        .iter()
        .map(|s| s.placement.clone())
        .collect();
    assert_eq!(placements, vec![Some(placement("S4", 8, 1)); 2]);
}

#[tokio::test]
async fn test_clients_track_store_through_mixed_mutations() {
    let depot = TestDepot::new();
    let admin = depot.user("admin", Role::Admin).await;
    depot.sample("A123").await;
    let m = depot.size("A123", "M", "B7", 3, &placement("S1", 2, 1)).await;

    let mut client = depot.client(&admin).await;

    depot.sample("B456").await;
    depot.size("B456", "S", "B7", 1, &placement("S1", 2, 1)).await;
    let moved = depot
        .inventory()
        .update_size(
            m,
            SizeUpdate {
                box_number: Some("B7".to_owned()),
                size_label: Some("M".to_owned()),
                quantity: Some(2),
                shelf_id: Some("S3".to_owned()),
                section: Some(4),
                level: Some(2),
            },
        )
        .await;
    assert!(moved.is_ok());
    assert!(depot.inventory().rename_sample("A123", Some("A124")).await.is_ok());

    client.sync();

    let store_sizes = depot.store.list_sizes().await.unwrap_or_default();
    let mut cached: Vec<Size> = ["A124", "B456"]
        .iter()
        .flat_map(|code| client.cache.sizes_of(code).to_vec())
        .collect();
    cached.sort_by_key(|s| (s.sample_code.clone(), s.id.as_i32()));
    assert_eq!(cached, store_sizes);

    let store_samples = depot.store.list_samples().await.unwrap_or_default();
    let mut cached_codes: Vec<_> = client.cache.samples().iter().map(|s| s.code.clone()).collect();
    cached_codes.sort();
    let mut store_codes: Vec<_> = store_samples.into_iter().map(|s| s.code).collect();
    store_codes.sort();
    assert_eq!(cached_codes, store_codes);
}

#[tokio::test]
async fn test_db_status_flag_follows_events() {
    let depot = TestDepot::new();
    let admin = depot.user("admin", Role::Admin).await;
    let mut client = depot.client(&admin).await;
    assert!(client.cache.db_connected());

    depot.hub.broadcast(ServerEvent::DbStatus { connected: false });
    client.sync();
    assert!(!client.cache.db_connected());

    depot.hub.broadcast(ServerEvent::DbStatus { connected: true });
    client.sync();
    assert!(client.cache.db_connected());
}
