//! Shared fixtures: a small inventory of providers, hosts, vms and security
//! groups, seeded into a recording in-memory store.
//!
//! | ems | vms (template)              | hosts        |
//! |-----|-----------------------------|--------------|
//! | 1   | vm1, vm2, tpl1 (template)   | host1, host2 |
//! | 2   | vm4                         | host3        |
//! | 3   | -                           | -            |
//! | 4   | -                           | -            |
//!
//! `orphan` (id 5) has no provider and no host. Security groups are linked
//! through `security_groups_vms`: vm1 -> {sg-web, sg-db}, vm2 -> {sg-web},
//! vm4 -> a group that does not exist.

#![allow(dead_code)]

use preload::prelude::*;
use std::any::Any;

pub type Store = RecordingStorage<MemoryStorage>;

#[derive(Debug, Clone)]
pub struct Ems {
    pub id: i64,
    pub name: String,
    pub vms: RelatedMany<Vm>,
    pub vms_and_templates: RelatedMany<Vm>,
    pub hosts: RelatedMany<Host>,
}

impl Model for Ems {
    const TABLE_NAME: &'static str = "ext_management_systems";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            vms: RelatedMany::new(),
            vms_and_templates: RelatedMany::new(),
            hosts: RelatedMany::new(),
        })
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            _ => None,
        }
    }
}

impl Owner for Ems {
    fn association(&self, name: &str) -> Option<&dyn Any> {
        match name {
            "vms" => Some(&self.vms),
            "vms_and_templates" => Some(&self.vms_and_templates),
            "hosts" => Some(&self.hosts),
            _ => None,
        }
    }
}

/// A provider subtype sharing the providers table.
#[derive(Debug, Clone)]
pub struct CloudManager(pub Ems);

impl Model for CloudManager {
    const TABLE_NAME: &'static str = "ext_management_systems";
    const ENTITY_NAME: &'static str = "cloud_managers";

    fn from_row(row: &Row) -> Result<Self> {
        Ems::from_row(row).map(CloudManager)
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        self.0.column_value(column)
    }
}

impl Owner for CloudManager {
    fn association(&self, name: &str) -> Option<&dyn Any> {
        self.0.association(name)
    }
}

#[derive(Debug, Clone)]
pub struct Vm {
    pub id: i64,
    pub name: String,
    pub template: bool,
    pub ems_id: Option<i64>,
    pub host_id: Option<i64>,
    pub host: Related<Host>,
    pub ext_management_system: Related<Ems>,
    pub security_groups: RelatedMany<SecurityGroup>,
}

impl Model for Vm {
    const TABLE_NAME: &'static str = "vms";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            template: row.get_named("template")?,
            ems_id: row.get_named("ems_id")?,
            host_id: row.get_named("host_id")?,
            host: Related::new(),
            ext_management_system: Related::new(),
            security_groups: RelatedMany::new(),
        })
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            "template" => Some(Value::Bool(self.template)),
            "ems_id" => Some(self.ems_id.into()),
            "host_id" => Some(self.host_id.into()),
            _ => None,
        }
    }
}

impl Owner for Vm {
    fn association(&self, name: &str) -> Option<&dyn Any> {
        match name {
            "host" => Some(&self.host),
            "ext_management_system" => Some(&self.ext_management_system),
            "security_groups" => Some(&self.security_groups),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Host {
    pub id: i64,
    pub name: String,
    pub ems_id: Option<i64>,
    pub vms: RelatedMany<Vm>,
}

impl Model for Host {
    const TABLE_NAME: &'static str = "hosts";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            ems_id: row.get_named("ems_id")?,
            vms: RelatedMany::new(),
        })
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            "ems_id" => Some(self.ems_id.into()),
            _ => None,
        }
    }
}

impl Owner for Host {
    fn association(&self, name: &str) -> Option<&dyn Any> {
        match name {
            "vms" => Some(&self.vms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroup {
    pub id: i64,
    pub name: String,
}

impl Model for SecurityGroup {
    const TABLE_NAME: &'static str = "security_groups";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
        })
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            _ => None,
        }
    }
}

pub fn registry() -> RelationshipRegistry {
    let mut registry = RelationshipRegistry::new();
    registry
        .register(
            "ext_management_systems",
            RelationshipInfo::has_many("vms", "vms", "ems_id")
                .scope(Expr::col("template").eq(false)),
        )
        .unwrap()
        .register(
            "ext_management_systems",
            RelationshipInfo::has_many("vms_and_templates", "vms", "ems_id"),
        )
        .unwrap()
        .register(
            "ext_management_systems",
            RelationshipInfo::has_many("hosts", "hosts", "ems_id"),
        )
        .unwrap()
        .register("vms", RelationshipInfo::belongs_to("host", "hosts", "host_id"))
        .unwrap()
        .register(
            "vms",
            RelationshipInfo::belongs_to("ext_management_system", "ext_management_systems", "ems_id"),
        )
        .unwrap()
        .register(
            "vms",
            RelationshipInfo::many_to_many(
                "security_groups",
                "security_groups",
                LinkTableInfo::new("security_groups_vms", "vm_id", "security_group_id"),
            ),
        )
        .unwrap()
        .register("hosts", RelationshipInfo::has_many("vms", "vms", "host_id"))
        .unwrap()
        .inherit("cloud_managers", "ext_management_systems")
        .unwrap();
    registry
}

pub fn seed() -> MemoryStorage {
    let mut db = MemoryStorage::new();
    db.create_table("ext_management_systems", &["id", "name"])
        .create_table("hosts", &["id", "name", "ems_id"])
        .create_table("vms", &["id", "name", "template", "ems_id", "host_id"])
        .create_table("security_groups", &["id", "name"])
        .create_table("security_groups_vms", &["vm_id", "security_group_id"]);

    for (id, name) in [(1_i64, "ems1"), (2, "ems2"), (3, "ems3"), (4, "ems4")] {
        db.insert(
            "ext_management_systems",
            [("id", Value::BigInt(id)), ("name", name.into())],
        )
        .unwrap();
    }

    for (id, name, ems_id) in [(1_i64, "host1", 1_i64), (2, "host2", 1), (3, "host3", 2)] {
        db.insert(
            "hosts",
            [
                ("id", Value::BigInt(id)),
                ("name", name.into()),
                ("ems_id", Value::BigInt(ems_id)),
            ],
        )
        .unwrap();
    }

    let vms: [(i64, &str, bool, Option<i64>, Option<i64>); 5] = [
        (1, "vm1", false, Some(1), Some(1)),
        (2, "vm2", false, Some(1), Some(2)),
        (3, "tpl1", true, Some(1), Some(1)),
        (4, "vm4", false, Some(2), Some(3)),
        (5, "orphan", false, None, None),
    ];
    for (id, name, template, ems_id, host_id) in vms {
        db.insert(
            "vms",
            [
                ("id", Value::BigInt(id)),
                ("name", name.into()),
                ("template", template.into()),
                ("ems_id", ems_id.into()),
                ("host_id", host_id.into()),
            ],
        )
        .unwrap();
    }

    for (id, name) in [(1_i64, "sg-web"), (2, "sg-db")] {
        db.insert(
            "security_groups",
            [("id", Value::BigInt(id)), ("name", name.into())],
        )
        .unwrap();
    }

    for (vm_id, sg_id) in [(1_i64, 1_i64), (1, 2), (2, 1), (4, 99)] {
        db.insert(
            "security_groups_vms",
            [
                ("vm_id", Value::BigInt(vm_id)),
                ("security_group_id", Value::BigInt(sg_id)),
            ],
        )
        .unwrap();
    }
    db
}

pub fn store() -> Store {
    RecordingStorage::new(seed()).with_threshold(3)
}

/// Load `M` rows with the given ids, then clear the query log.
pub fn find<M: Model>(store: &Store, ids: &[i64]) -> Vec<M> {
    let records = Scope::<M>::all()
        .filter(Expr::col("id").in_list(ids.iter().copied()))
        .all_records(store)
        .unwrap();
    store.reset();
    records
}

pub fn vm_names<'a>(vms: impl IntoIterator<Item = &'a Vm>) -> Vec<&'a str> {
    vms.into_iter().map(|vm| vm.name.as_str()).collect()
}
