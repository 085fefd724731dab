mod common;

use common::{Ems, Host, SecurityGroup, Vm, find, registry, store, vm_names};
use preload::prelude::*;
use preload::QueryKind;

#[test]
fn maps_materialized_owners_with_one_query() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses: Vec<Ems> = find(&store, &[1, 2]);

    let vms = preloader.preload_and_map::<Ems, Vm>(&emses, "vms").unwrap();
    assert_eq!(store.query_count(), 1);
    assert_eq!(vm_names(&vms), vec!["vm1", "vm2", "vm4"]);

    // Owners are marked loaded along the way.
    assert_eq!(emses[0].vms.len(), 2);
    let again = preloader.preload_and_map::<Ems, Vm>(&emses, "vms").unwrap();
    assert_eq!(again.len(), 3);
    assert_eq!(store.query_count(), 1);
}

#[test]
fn maps_deferred_owners_with_two_queries() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses = Scope::<Ems>::all();

    let vms = preloader
        .preload_and_map::<Ems, Vm>(&emses, "vms_and_templates")
        .unwrap();
    assert_eq!(store.query_count(), 2);
    assert_eq!(vms.len(), 4);

    let kinds: Vec<QueryKind> = store.queries().iter().map(|q| q.kind).collect();
    assert_eq!(kinds, vec![QueryKind::Rows, QueryKind::Rows]);

    // The scope's own records now carry the loaded markers.
    assert!(emses.is_loaded());
    let records = emses.records().unwrap();
    assert!(records.iter().all(|ems| ems.vms_and_templates.is_loaded()));
    assert_eq!(records[0].vms_and_templates.len(), 3);

    let newly_loaded = preloader
        .preload::<Ems, Vm>(&emses, "vms_and_templates")
        .unwrap();
    assert_eq!(newly_loaded, 0);
    assert_eq!(store.query_count(), 2);
}

#[test]
fn union_drops_duplicate_targets() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses: Vec<Ems> = find(&store, &[1]);

    let vms = preloader
        .preload_and_map::<Ems, Vm>(&emses, "vms_and_templates")
        .unwrap();
    assert_eq!(vms.len(), 3);
    store.reset();

    // vm1 and tpl1 share host1.
    let hosts = preloader.preload_and_map::<Vm, Host>(&vms, "host").unwrap();
    assert_eq!(store.query_count(), 1);
    let names: Vec<&str> = hosts.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["host1", "host2"]);
}

#[test]
fn repeated_owners_share_one_key() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let emses: Vec<Ems> = find(&store, &[1]);
    let twice = vec![emses[0].clone(), emses[0].clone()];

    let vms = preloader.preload_and_map::<Ems, Vm>(&twice, "vms").unwrap();
    assert_eq!(store.query_count(), 1);
    assert_eq!(store.queries()[0].params.len(), 2);
    assert_eq!(vm_names(&vms), vec!["vm1", "vm2"]);
    assert_eq!(twice[1].vms.len(), 2);
}

#[test]
fn maps_belongs_to_then_has_many() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let hosts: Vec<Host> = find(&store, &[1, 2]);

    let vms = preloader.preload_and_map::<Host, Vm>(&hosts, "vms").unwrap();
    assert_eq!(store.query_count(), 1);
    assert_eq!(vm_names(&vms), vec!["vm1", "tpl1", "vm2"]);
}

#[test]
fn maps_through_link_table() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let vms: Vec<Vm> = find(&store, &[1, 2]);

    let groups = preloader
        .preload_and_map::<Vm, SecurityGroup>(&vms, "security_groups")
        .unwrap();
    assert_eq!(store.query_count(), 2);
    assert_eq!(
        groups,
        vec![
            SecurityGroup { id: 1, name: "sg-web".into() },
            SecurityGroup { id: 2, name: "sg-db".into() },
        ]
    );
}

#[test]
fn empty_owner_set_maps_to_nothing() {
    let store = store();
    let registry = registry();
    let preloader = Preloader::new(&store, &registry);
    let nobody: Vec<Ems> = Vec::new();

    let vms = preloader.preload_and_map::<Ems, Vm>(&nobody, "vms").unwrap();
    assert!(vms.is_empty());
    assert_eq!(store.query_count(), 0);
}
