mod common;

use common::{Ems, Host, SecurityGroup, Vm, find, registry, store, vm_names};
use preload::prelude::*;
use preload::QueryKind;

#[test]
fn scope_is_deferred_until_counted() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses: Vec<Ems> = find(&store, &[1, 2]);

    let vms = preloader.preload_and_scope::<Ems, Vm>(&emses, "vms").unwrap();
    assert_eq!(store.query_count(), 0);
    assert!(!emses[0].vms.is_loaded());

    assert_eq!(vms.count(&store).unwrap(), 3);
    assert_eq!(store.query_count(), 1);
    assert_eq!(store.queries()[0].kind, QueryKind::Count);
}

#[test]
fn relationship_scope_is_part_of_the_query() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses: Vec<Ems> = find(&store, &[1]);

    let vms = preloader.preload_and_scope::<Ems, Vm>(&emses, "vms").unwrap();
    let all = preloader
        .preload_and_scope::<Ems, Vm>(&emses, "vms_and_templates")
        .unwrap();

    assert_eq!(vms.count(&store).unwrap(), 2);
    assert_eq!(all.count(&store).unwrap(), 3);
    assert_eq!(store.query_count(), 2);
}

#[test]
fn further_filters_intersect_in_one_query() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses: Vec<Ems> = find(&store, &[1, 2]);

    let vms = preloader
        .preload_and_scope::<Ems, Vm>(&emses, "vms_and_templates")
        .unwrap()
        .filter(Expr::col("template").eq(false))
        .filter(Expr::col("name").like("vm%"))
        .filter(Expr::col("ems_id").eq(1_i64));
    assert_eq!(store.query_count(), 0);

    let records = vms.load(&store).unwrap();
    assert_eq!(vm_names(records), vec!["vm1", "vm2"]);
    assert_eq!(vms.size(&store).unwrap(), 2);
    assert_eq!(store.query_count(), 1);
}

#[test]
fn chained_scopes_stay_deferred() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses: Vec<Ems> = find(&store, &[1]);

    let vms = preloader.preload_and_scope::<Ems, Vm>(&emses, "vms").unwrap();
    let hosts = preloader.preload_and_scope::<Vm, Host>(&vms, "host").unwrap();
    assert_eq!(store.query_count(), 0);
    assert!(!vms.is_loaded());

    assert_eq!(hosts.count(&store).unwrap(), 2);
    assert_eq!(store.query_count(), 1);
    assert!(store.queries()[0].sql.contains("IN (SELECT"));
}

#[test]
fn chained_belongs_to_then_has_many() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let vms: Vec<Vm> = find(&store, &[1, 2]);

    let hosts = preloader.preload_and_scope::<Vm, Host>(&vms, "host").unwrap();
    let siblings = preloader.preload_and_scope::<Host, Vm>(&hosts, "vms").unwrap();
    assert_eq!(store.query_count(), 0);

    // host1 also carries tpl1.
    assert_eq!(siblings.count(&store).unwrap(), 3);
    assert_eq!(store.query_count(), 1);
}

#[test]
fn deferred_owner_set_becomes_a_subquery() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses = Scope::<Ems>::all().filter(Expr::col("name").eq("ems2"));

    let vms = preloader.preload_and_scope::<Ems, Vm>(&emses, "vms").unwrap();
    assert_eq!(store.query_count(), 0);
    assert!(!emses.is_loaded());

    assert_eq!(vm_names(vms.load(&store).unwrap()), vec!["vm4"]);
    assert_eq!(store.query_count(), 1);
}

#[test]
fn loaded_deferred_owner_set_uses_its_records() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses = Scope::<Ems>::all().filter(Expr::col("id").eq(1_i64));
    emses.load(&store).unwrap();
    store.reset();

    let vms = preloader.preload_and_scope::<Ems, Vm>(&emses, "vms").unwrap();
    assert_eq!(store.query_count(), 0);
    assert_eq!(vms.count(&store).unwrap(), 2);
    assert!(!store.queries()[0].sql.contains("SELECT DISTINCT"));
}

#[test]
fn link_table_scope_is_a_single_query() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let vms: Vec<Vm> = find(&store, &[1, 2, 4]);

    let groups = preloader
        .preload_and_scope::<Vm, SecurityGroup>(&vms, "security_groups")
        .unwrap();
    assert_eq!(store.query_count(), 0);

    let records = groups.load(&store).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(store.query_count(), 1);
}

#[test]
fn owners_without_keys_count_zero_in_one_query() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let orphans: Vec<Vm> = find(&store, &[5]);

    let hosts = preloader.preload_and_scope::<Vm, Host>(&orphans, "host").unwrap();
    assert_eq!(store.query_count(), 0);
    assert_eq!(hosts.count(&store).unwrap(), 0);
    assert_eq!(store.query_count(), 1);
}

#[test]
fn scope_needs_no_owner_slots() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let groups: Vec<SecurityGroup> = find(&store, &[1]);

    // SecurityGroup is not an Owner; scoping only reads its key.
    let mut extended = registry.clone();
    extended
        .register(
            "security_groups",
            RelationshipInfo::many_to_many(
                "vms",
                "vms",
                LinkTableInfo::new("security_groups_vms", "security_group_id", "vm_id"),
            ),
        )
        .unwrap();
    let preloader_with_back_link = Preloader::new(&store, &extended);
    let vms = preloader_with_back_link
        .preload_and_scope::<SecurityGroup, Vm>(&groups, "vms")
        .unwrap();
    assert_eq!(vm_names(vms.load(&store).unwrap()), vec!["vm1", "vm2"]);

    assert!(matches!(
        preloader.preload_and_scope::<SecurityGroup, Vm>(&groups, "vms"),
        Err(Error::UnknownRelationship(_))
    ));
}
