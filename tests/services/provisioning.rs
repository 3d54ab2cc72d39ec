use crate::common::*;

crate::both_stores!(
    provisions_acme_widget_key,
    explicit_key_is_used_verbatim,
    explicit_key_collision_is_key_exists,
    seat_cap_falls_back_to_product_default,
    rejects_product_of_other_brand_without_writing,
    rejects_inactive_product_and_brand,
    rejects_unknown_brand_and_product,
    rejects_empty_and_duplicate_products,
    add_license_enforces_one_per_product,
    duplicate_inserts_are_conflicts,
    add_license_scoped_to_brand,
    get_details_lists_all_licenses,
    provisioning_writes_audit_trail,
);

fn provisions_acme_widget_key<S: Store>(store: &S) {
    let (brand, product, details) = acme_widget(store, Some(3));

    let key = &details.license_key;
    assert!(key.key.starts_with("ACME-"));
    assert_eq!(key.key.len(), "ACME-".len() + 35);
    assert_eq!(key.brand_id, brand.id);
    assert_eq!(key.brand_slug, "acme");
    assert_eq!(key.customer_email, "user@example.com");

    assert_eq!(details.licenses.len(), 1);
    let license = &details.licenses[0];
    assert_eq!(license.product_id, product.id);
    assert_eq!(license.product_slug, "widget");
    assert_eq!(license.status, LicenseStatus::Valid);
    assert_eq!(license.max_seats, Some(3));
    assert_eq!(license.used_seats, 0);
    assert_eq!(license.remaining_seats(), Some(3));
    assert!(license.is_valid_at(chrono::Utc::now()));
}

fn explicit_key_is_used_verbatim<S: Store>(store: &S) {
    let brand = store.seed_brand("acme");
    let product = store.seed_product(&brand, "widget", None);

    let mut req = provision_request("user@example.com", vec![entry(&product, None)]);
    req.license_key = Some("CUSTOM-KEY-1".into());
    req.external_reference = Some("order-42".into());

    let details = ProvisioningService::new(store)
        .provision(&brand.id, &req)
        .unwrap();
    assert_eq!(details.license_key.key, "CUSTOM-KEY-1");
    assert_eq!(
        details.license_key.external_reference.as_deref(),
        Some("order-42")
    );
    assert_eq!(details.licenses[0].max_seats, None);
    assert_eq!(details.licenses[0].remaining_seats(), None);
}

fn explicit_key_collision_is_key_exists<S: Store>(store: &S) {
    let acme = store.seed_brand("acme");
    let globex = store.seed_brand("globex");
    let widget = store.seed_product(&acme, "widget", None);
    let gadget = store.seed_product(&globex, "gadget", None);
    let service = ProvisioningService::new(store);

    let mut req = provision_request("a@example.com", vec![entry(&widget, None)]);
    req.license_key = Some("SHARED-KEY".into());
    service.provision(&acme.id, &req).unwrap();

    // Keys are unique across brands, not just within one
    let mut other = provision_request("b@example.com", vec![entry(&gadget, None)]);
    other.license_key = Some("SHARED-KEY".into());
    assert_code(service.provision(&globex.id, &other), ErrorCode::KeyExists);
}

fn seat_cap_falls_back_to_product_default<S: Store>(store: &S) {
    let brand = store.seed_brand("acme");
    let capped = store.seed_product(&brand, "capped", Some(5));
    let other = store.seed_product(&brand, "other", Some(5));

    let details = ProvisioningService::new(store)
        .provision(
            &brand.id,
            &provision_request(
                "user@example.com",
                vec![entry(&capped, None), entry(&other, Some(2))],
            ),
        )
        .unwrap();

    let seats: Vec<_> = details.licenses.iter().map(|l| l.max_seats).collect();
    assert_eq!(seats, vec![Some(5), Some(2)]);
}

fn rejects_product_of_other_brand_without_writing<S: Store>(store: &S) {
    let acme = store.seed_brand("acme");
    let globex = store.seed_brand("globex");
    let widget = store.seed_product(&acme, "widget", None);
    let foreign = store.seed_product(&globex, "gadget", None);

    let result = ProvisioningService::new(store).provision(
        &acme.id,
        &provision_request(
            "user@example.com",
            vec![entry(&widget, None), entry(&foreign, None)],
        ),
    );
    assert_code(result, ErrorCode::ProductBrandMismatch);

    let keys = store
        .list_license_keys_by_email("user@example.com", None)
        .unwrap();
    assert!(keys.is_empty());
}

fn rejects_inactive_product_and_brand<S: Store>(store: &S) {
    let brand = store.seed_brand("acme");
    let widget = store.seed_product(&brand, "widget", None);
    let retired = store.seed_product(&brand, "retired", None);
    store.deactivate_product(&retired);
    let service = ProvisioningService::new(store);

    assert_code(
        service.provision(
            &brand.id,
            &provision_request("user@example.com", vec![entry(&retired, None)]),
        ),
        ErrorCode::ProductInactive,
    );

    store.deactivate_brand(&brand);
    assert_code(
        service.provision(
            &brand.id,
            &provision_request("user@example.com", vec![entry(&widget, None)]),
        ),
        ErrorCode::BrandInactive,
    );
}

fn rejects_unknown_brand_and_product<S: Store>(store: &S) {
    let brand = store.seed_brand("acme");
    let widget = store.seed_product(&brand, "widget", None);
    let service = ProvisioningService::new(store);

    assert_code(
        service.provision(
            "no-such-brand",
            &provision_request("user@example.com", vec![entry(&widget, None)]),
        ),
        ErrorCode::BrandNotFound,
    );

    let missing = ProductEntry {
        product_id: "no-such-product".into(),
        expires_at: None,
        max_seats: None,
    };
    assert_code(
        service.provision(
            &brand.id,
            &provision_request("user@example.com", vec![missing]),
        ),
        ErrorCode::ProductNotFound,
    );
}

fn rejects_empty_and_duplicate_products<S: Store>(store: &S) {
    let brand = store.seed_brand("acme");
    let widget = store.seed_product(&brand, "widget", None);
    let service = ProvisioningService::new(store);

    assert_code(
        service.provision(&brand.id, &provision_request("user@example.com", vec![])),
        ErrorCode::NoProducts,
    );
    assert_code(
        service.provision(
            &brand.id,
            &provision_request(
                "user@example.com",
                vec![entry(&widget, Some(1)), entry(&widget, Some(2))],
            ),
        ),
        ErrorCode::LicenseExists,
    );
    assert!(
        store
            .list_license_keys_by_email("user@example.com", None)
            .unwrap()
            .is_empty()
    );
}

fn add_license_enforces_one_per_product<S: Store>(store: &S) {
    let (brand, widget, details) = acme_widget(store, Some(3));
    let gizmo = store.seed_product(&brand, "gizmo", Some(2));
    let service = ProvisioningService::new(store);
    let key = &details.license_key.key;

    let added = service
        .add_license(
            &brand.id,
            key,
            &AddLicenseRequest {
                product_id: gizmo.id.clone(),
                expires_at: None,
                max_seats: None,
            },
        )
        .unwrap();
    assert_eq!(added.product_slug, "gizmo");
    assert_eq!(added.max_seats, Some(2));
    assert_eq!(added.license_key_id, details.license_key.id);

    let again = service.add_license(
        &brand.id,
        key,
        &AddLicenseRequest {
            product_id: widget.id.clone(),
            expires_at: None,
            max_seats: Some(10),
        },
    );
    assert_code(again, ErrorCode::LicenseExists);

    let licenses = store
        .list_licenses_by_license_key(&details.license_key.id)
        .unwrap();
    assert_eq!(licenses.len(), 2);
}

/// A racing writer can get past the service's existence checks; the store
/// itself must still answer with the domain conflict.
fn duplicate_inserts_are_conflicts<S: Store>(store: &S) {
    let (_, _, details) = acme_widget(store, Some(1));
    let license = &details.licenses[0];

    let key = store.create_license_key(&NewLicenseKey {
        key: details.license_key.key.clone(),
        brand_id: details.license_key.brand_id.clone(),
        customer_email: "late@example.com".into(),
        external_reference: None,
    });
    assert_code(key, ErrorCode::KeyExists);

    let dup = store.create_license(&NewLicense {
        license_key_id: license.license_key_id.clone(),
        product_id: license.product_id.clone(),
        expires_at: None,
        max_seats: Some(5),
    });
    assert_code(dup, ErrorCode::LicenseExists);

    assert_eq!(
        store
            .list_licenses_by_license_key(&details.license_key.id)
            .unwrap()
            .len(),
        1
    );
}

fn add_license_scoped_to_brand<S: Store>(store: &S) {
    let (_acme, _widget, details) = acme_widget(store, None);
    let globex = store.seed_brand("globex");
    let gadget = store.seed_product(&globex, "gadget", None);
    let service = ProvisioningService::new(store);

    // Another brand cannot see acme's key
    let result = service.add_license(
        &globex.id,
        &details.license_key.key,
        &AddLicenseRequest {
            product_id: gadget.id.clone(),
            expires_at: None,
            max_seats: None,
        },
    );
    assert_code(result, ErrorCode::KeyNotFound);
    assert_code(
        service.get_details(&globex.id, &details.license_key.key),
        ErrorCode::KeyNotFound,
    );
}

fn get_details_lists_all_licenses<S: Store>(store: &S) {
    let brand = store.seed_brand("acme");
    let a = store.seed_product(&brand, "a", None);
    let b = store.seed_product(&brand, "b", None);
    let service = ProvisioningService::new(store);

    let created = service
        .provision(
            &brand.id,
            &provision_request("user@example.com", vec![entry(&a, None), entry(&b, Some(1))]),
        )
        .unwrap();

    let fetched = service
        .get_details(&brand.id, &created.license_key.key)
        .unwrap();
    assert_eq!(fetched.license_key.id, created.license_key.id);
    let mut slugs: Vec<_> = fetched
        .licenses
        .iter()
        .map(|l| l.product_slug.as_str())
        .collect();
    slugs.sort();
    assert_eq!(slugs, vec!["a", "b"]);

    assert_code(
        service.get_details(&brand.id, "NOPE"),
        ErrorCode::KeyNotFound,
    );
}

fn provisioning_writes_audit_trail<S: Store>(store: &S) {
    let (brand, _product, details) = acme_widget(store, Some(1));

    let logs = ProvisioningService::new(store)
        .audit_trail(&brand.id, &details.license_key.key)
        .unwrap();
    let actions: Vec<_> = logs.iter().map(|l| l.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::LicenseKeyCreated, AuditAction::LicenseCreated]
    );
    assert!(logs.iter().all(|l| l.actor_type == ActorType::Brand));
    assert!(logs.iter().all(|l| l.actor_id == brand.id));
    assert_eq!(
        logs[1].license_id.as_deref(),
        Some(details.licenses[0].id.as_str())
    );
}

#[test]
fn rejected_provision_leaves_no_rows_in_memory_store() {
    let store = memory_store();
    let acme = store.seed_brand("acme");
    let globex = store.seed_brand("globex");
    let widget = store.seed_product(&acme, "widget", None);
    let foreign = store.seed_product(&globex, "gadget", None);

    let result = ProvisioningService::new(&store).provision(
        &acme.id,
        &provision_request(
            "user@example.com",
            vec![entry(&widget, Some(1)), entry(&foreign, None)],
        ),
    );
    assert_code(result, ErrorCode::ProductBrandMismatch);
    assert_eq!(store.license_key_count().unwrap(), 0);
    assert_eq!(store.license_count().unwrap(), 0);
    assert_eq!(store.activation_count().unwrap(), 0);
}
