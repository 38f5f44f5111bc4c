//! Test fixtures for integration tests.

#![allow(dead_code)]

use mongodb::bson::{Document, doc};

/// Host documents as the host service stores them: addresses and operators
/// are arrays.
pub fn host_documents(count: i64) -> Vec<Document> {
    (1..=count)
        .map(|id| {
            doc! {
                "bk_host_id": id,
                "bk_host_name": format!("host-{id}"),
                "bk_host_innerip": [format!("10.0.0.{id}"), format!("10.0.1.{id}")],
                "bk_host_outerip": [],
                "operator": ["admin"],
                "bk_bak_operator": ["ops", "dba"],
                "bk_supplier_account": "0",
            }
        })
        .collect()
}

/// Set documents for the archived `cc_SetBase` table.
pub fn set_documents(biz_id: i64, count: i64) -> Vec<Document> {
    (1..=count)
        .map(|id| {
            doc! {
                "bk_set_id": id,
                "bk_set_name": format!("set-{id}"),
                "bk_biz_id": biz_id,
            }
        })
        .collect()
}
