//! User-specific events reach exactly the affected user's newest connection.

use sample_depot_core::{Role, ShipmentLineRequest, ShipmentRequest};
use sample_depot_core::cache::Applied;
use sample_depot_core::events::ServerEvent;
use sample_depot_integration_tests::{TestDepot, names, placement};
use sample_depot_server::services::users::ACCOUNT_DELETED;

#[tokio::test]
async fn test_deleted_user_is_logged_out_and_everyone_told() {
    let depot = TestDepot::new();
    let admin = depot.user("admin", Role::Admin).await;
    let anna = depot.user("anna", Role::User).await;

    let mut admin_client = depot.client(&admin).await;
    let mut anna_client = depot.client(&anna).await;

    assert!(depot.users().delete_user(admin.id, anna.id).await.is_ok());

    let anna_sees = anna_client.sync();
    assert_eq!(
        anna_sees.first(),
        Some(&(
            ServerEvent::ForceLogout {
                reason: ACCOUNT_DELETED.to_owned()
            },
            Applied::LoggedOut {
                reason: ACCOUNT_DELETED.to_owned()
            }
        ))
    );
    assert!(anna_client.cache.current_user().is_none());

    let admin_sees = admin_client.sync();
    let admin_events: Vec<_> = admin_sees.into_iter().map(|(e, _)| e).collect();
    assert_eq!(names(&admin_events), vec!["user-deleted"]);
    assert!(admin_client.cache.users().iter().all(|u| u.id != anna.id));
}

#[tokio::test]
async fn test_reregistering_moves_targeted_events_to_newest_connection() {
    let depot = TestDepot::new();
    let anna = depot.user("anna", Role::User).await;

    let mut old_tab = depot.client(&anna).await;
    let mut new_tab = depot.client(&anna).await;
    assert_eq!(depot.hub.connection_of(anna.id), Some(new_tab.subscription.id()));

    assert!(depot.users().set_role(anna.id, Some("admin")).await.is_ok());

    let old_events: Vec<_> = old_tab.sync().into_iter().map(|(e, _)| e).collect();
    let new_events: Vec<_> = new_tab.sync().into_iter().map(|(e, _)| e).collect();
    assert_eq!(names(&old_events), vec!["role-updated"]);
    assert_eq!(names(&new_events), vec!["role-updated", "role-changed"]);
    assert_eq!(new_tab.cache.current_user().map(|u| u.role), Some(Role::Admin));
    // the older tab still sees the broadcast in its user list
    assert_eq!(
        old_tab
            .cache
            .users()
            .iter()
            .find(|u| u.id == anna.id)
            .map(|u| u.role),
        Some(Role::Admin)
    );
}

#[tokio::test]
async fn test_closing_old_connection_keeps_newer_binding() {
    let depot = TestDepot::new();
    let anna = depot.user("anna", Role::User).await;

    let old_tab = depot.client(&anna).await;
    let mut new_tab = depot.client(&anna).await;
    drop(old_tab);

    assert_eq!(depot.hub.connection_of(anna.id), Some(new_tab.subscription.id()));
    assert!(depot.users().set_role(anna.id, Some("super")).await.is_ok());
    let outcomes: Vec<_> = new_tab.sync().into_iter().map(|(_, a)| a).collect();
    assert!(outcomes.contains(&Applied::RoleChanged(Role::Super)));
}

#[tokio::test]
async fn test_events_for_disconnected_user_are_dropped() {
    let depot = TestDepot::new();
    let admin = depot.user("admin", Role::Admin).await;
    let anna = depot.user("anna", Role::User).await;
    let mut admin_client = depot.client(&admin).await;

    assert!(depot.users().set_role(anna.id, Some("admin")).await.is_ok());
    let events: Vec<_> = admin_client.sync().into_iter().map(|(e, _)| e).collect();
    assert_eq!(names(&events), vec!["role-updated"]);
}

#[tokio::test]
async fn test_rename_updates_shipment_history_in_caches() {
    let depot = TestDepot::new();
    let anna = depot.user("anna", Role::User).await;
    depot.sample("A123").await;
    depot
        .size("A123", "M", "B7", 2, &placement("S1", 1, 1))
        .await;
    let shipped = depot
        .inventory()
        .create_shipment(
            anna.id,
            &anna.name,
            ShipmentRequest {
                recipient: "Studio Rossi".to_owned(),
                courier: "DHL".to_owned(),
                lines: vec![ShipmentLineRequest {
                    sample_code: "A123".to_owned(),
                    size_label: "M".to_owned(),
                    box_number: "B7".to_owned(),
                    quantity: 1,
                }],
            },
        )
        .await;
    assert!(shipped.is_ok());

    let mut client = depot.client(&anna).await;
    assert!(depot.users().rename(anna.id, Some("anna.b")).await.is_ok());
    client.sync();

    assert_eq!(client.cache.current_user().map(|u| u.name.as_str()), Some("anna.b"));
    assert!(
        client
            .cache
            .shipments()
            .iter()
            .all(|s| s.user_name == "anna.b")
    );

    // a client starting now sees the same history
    let fresh = depot.snapshot(None).await;
    assert_eq!(fresh.shipments, client.cache.shipments());
}
