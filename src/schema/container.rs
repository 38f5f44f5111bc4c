//! Indexes of the Kubernetes resource collections.

use mongodb::bson::Document;

use crate::models::Index;
use crate::models::index::{INDEX_PREFIX, UNIQUE_INDEX_PREFIX};
use crate::models::tables::{
    TABLE_CLUSTER_BASE, TABLE_CONTAINER_BASE, TABLE_NAMESPACE_BASE, TABLE_NODE_BASE,
    TABLE_POD_BASE, WORKLOAD_TABLES,
};

const ID: &str = "id";
const BIZ_ID: &str = "bk_biz_id";
const SUPPLIER_ACCOUNT: &str = "bk_supplier_account";
const NAME: &str = "name";
const CLUSTER_UID: &str = "cluster_uid";
const CLUSTER_ID: &str = "bk_cluster_id";
const HOST_ID: &str = "bk_host_id";

fn keys(fields: &[&str]) -> Document {
    fields.iter().map(|field| (field.to_string(), 1_i32.into())).collect()
}

/// Unique index named after its fields, e.g. `bkcc_unique_bk_cluster_idname`.
fn unique(fields: &[&str]) -> Index {
    Index::new(format!("{UNIQUE_INDEX_PREFIX}{}", fields.concat()), keys(fields)).unique()
}

/// Lookup index named after its fields, e.g. `bkcc_idx_cluster_uid`.
fn lookup(fields: &[&str]) -> Index {
    Index::new(format!("{INDEX_PREFIX}{}", fields.concat()), keys(fields))
}

fn cluster_indexes() -> Vec<Index> {
    vec![
        unique(&[ID]),
        unique(&[BIZ_ID, SUPPLIER_ACCOUNT, "uid"]),
        unique(&[BIZ_ID, SUPPLIER_ACCOUNT, NAME]),
        lookup(&[BIZ_ID]),
        lookup(&["xid"]),
    ]
}

fn node_indexes() -> Vec<Index> {
    vec![
        unique(&[ID]),
        // Deployed under this name although it covers the node id.
        Index::new(
            format!("{UNIQUE_INDEX_PREFIX}{BIZ_ID}{SUPPLIER_ACCOUNT}{CLUSTER_UID}{NAME}"),
            keys(&[BIZ_ID, SUPPLIER_ACCOUNT, CLUSTER_UID, ID]),
        )
        .unique(),
        unique(&[CLUSTER_ID, ID]),
        lookup(&[CLUSTER_UID]),
        lookup(&[CLUSTER_ID]),
        lookup(&[HOST_ID]),
    ]
}

fn namespace_indexes() -> Vec<Index> {
    vec![
        unique(&[ID]),
        unique(&[CLUSTER_ID, NAME]),
        unique(&[BIZ_ID, SUPPLIER_ACCOUNT, CLUSTER_UID, NAME]),
        lookup(&[CLUSTER_UID]),
        lookup(&[CLUSTER_ID]),
    ]
}

fn pod_indexes() -> Vec<Index> {
    vec![
        unique(&[ID]),
        unique(&["bk_reference_id", "reference_kind", NAME]),
        unique(&[
            BIZ_ID,
            SUPPLIER_ACCOUNT,
            CLUSTER_UID,
            "namespace",
            "reference_kind",
            "reference_name",
            NAME,
        ]),
        lookup(&["node_name"]),
        lookup(&[BIZ_ID, SUPPLIER_ACCOUNT, "reference_name", "reference_kind"]),
        lookup(&["bk_reference_id", "reference_kind"]),
        lookup(&[HOST_ID]),
    ]
}

fn container_indexes() -> Vec<Index> {
    vec![unique(&[ID]), unique(&["bk_pod_id", "container_uid"])]
}

fn workload_indexes() -> Vec<Index> {
    vec![
        unique(&[ID]),
        unique(&["bk_namespace_id", NAME]),
        unique(&[BIZ_ID, SUPPLIER_ACCOUNT, CLUSTER_UID, "namespace", NAME]),
        lookup(&[CLUSTER_UID]),
        lookup(&[CLUSTER_ID]),
        lookup(&[NAME]),
    ]
}

/// Every container collection with its declared indexes.
pub fn container_tables() -> Vec<(&'static str, Vec<Index>)> {
    let mut tables = vec![
        (TABLE_CLUSTER_BASE, cluster_indexes()),
        (TABLE_NODE_BASE, node_indexes()),
        (TABLE_NAMESPACE_BASE, namespace_indexes()),
        (TABLE_POD_BASE, pod_indexes()),
        (TABLE_CONTAINER_BASE, container_indexes()),
    ];
    tables.extend(WORKLOAD_TABLES.iter().map(|table| (*table, workload_indexes())));
    tables
}
