use chrono::{Duration, Utc};

use crate::common::*;

crate::both_stores!(
    unknown_key_is_key_not_found,
    status_reports_seats_and_instance,
    unmatched_instance_is_not_activated,
    status_never_creates_activations,
    expired_license_reports_invalid,
);

fn unknown_key_is_key_not_found<S: Store>(store: &S) {
    acme_widget(store, Some(3));
    assert_code(
        StatusService::new(store).get_status("ACME-UNKNOWN", "widget", None),
        ErrorCode::KeyNotFound,
    );
}

fn status_reports_seats_and_instance<S: Store>(store: &S) {
    let (_, _, details) = acme_widget(store, Some(3));
    let key = &details.license_key.key;
    let activations = ActivationService::new(store);
    activations
        .activate(&activate_request(key, "widget", "laptop"))
        .unwrap();
    activations
        .activate(&activate_request(key, "widget", "desktop"))
        .unwrap();

    let snapshot = StatusService::new(store)
        .get_status(key, "widget", Some("laptop"))
        .unwrap();
    assert_eq!(snapshot.license_key, *key);
    assert_eq!(snapshot.customer_email, "user@example.com");
    assert_eq!(snapshot.product_slug, "widget");
    assert_eq!(snapshot.status, LicenseStatus::Valid);
    assert!(snapshot.is_valid);
    assert_eq!(snapshot.expires_at, None);
    assert_eq!(snapshot.max_seats, Some(3));
    assert_eq!(snapshot.used_seats, 2);
    assert_eq!(snapshot.remaining_seats, Some(1));
    assert!(snapshot.instance_activated);
}

fn unmatched_instance_is_not_activated<S: Store>(store: &S) {
    let (_, _, details) = acme_widget(store, Some(3));
    let key = &details.license_key.key;
    let service = StatusService::new(store);

    let snapshot = service.get_status(key, "widget", Some("other")).unwrap();
    assert!(!snapshot.instance_activated);

    let snapshot = service.get_status(key, "widget", None).unwrap();
    assert!(!snapshot.instance_activated);

    // A released seat no longer counts as activated
    let activations = ActivationService::new(store);
    activations
        .activate(&activate_request(key, "widget", "laptop"))
        .unwrap();
    activations
        .deactivate(&deactivate_request(key, "widget", "laptop"))
        .unwrap();
    let snapshot = service.get_status(key, "widget", Some("laptop")).unwrap();
    assert!(!snapshot.instance_activated);
    assert_eq!(snapshot.used_seats, 0);
}

fn status_never_creates_activations<S: Store>(store: &S) {
    let (_, _, details) = acme_widget(store, Some(3));
    let service = StatusService::new(store);

    for _ in 0..3 {
        service
            .get_status(&details.license_key.key, "widget", Some("probe"))
            .unwrap();
    }
    assert!(
        store
            .list_activations_for_license(&details.licenses[0].id)
            .unwrap()
            .is_empty()
    );
}

fn expired_license_reports_invalid<S: Store>(store: &S) {
    let brand = store.seed_brand("acme");
    let product = store.seed_product(&brand, "widget", None);
    let expires_at = Utc::now() + Duration::days(1);
    let details = ProvisioningService::new(store)
        .provision(
            &brand.id,
            &provision_request(
                "user@example.com",
                vec![ProductEntry {
                    product_id: product.id.clone(),
                    expires_at: Some(expires_at),
                    max_seats: Some(2),
                }],
            ),
        )
        .unwrap();
    let service = StatusService::new(store);
    let key = &details.license_key.key;

    let now = service.get_status(key, "widget", None).unwrap();
    assert!(now.is_valid);

    let later = service
        .get_status_at(key, "widget", None, expires_at + Duration::days(1))
        .unwrap();
    // Status stays valid; validity is derived from the expiration
    assert_eq!(later.status, LicenseStatus::Valid);
    assert!(!later.is_valid);
    assert_eq!(later.remaining_seats, Some(2));
}
