//! Well-known collection names and the static policies keyed by them.

pub const TABLE_ID_GENERATOR: &str = "cc_idgenerator";
pub const TABLE_DEL_ARCHIVE: &str = "cc_DelArchive";

pub const TABLE_HOST_BASE: &str = "cc_HostBase";
pub const TABLE_MODULE_HOST_CONFIG: &str = "cc_ModuleHostConfig";
pub const TABLE_APP_BASE: &str = "cc_ApplicationBase";
pub const TABLE_SET_BASE: &str = "cc_SetBase";
pub const TABLE_MODULE_BASE: &str = "cc_ModuleBase";
pub const TABLE_SET_TEMPLATE: &str = "cc_SetTemplate";
pub const TABLE_PROCESS: &str = "cc_Process";
pub const TABLE_PROCESS_INSTANCE_RELATION: &str = "cc_ProcessInstanceRelation";
pub const TABLE_BIZ_SET_BASE: &str = "cc_BizSetBase";
pub const TABLE_OBJECT_BASE: &str = "cc_ObjectBase";
pub const TABLE_INST_ASST: &str = "cc_InstAsst";

pub const TABLE_CLUSTER_BASE: &str = "cc_ClusterBase";
pub const TABLE_NODE_BASE: &str = "cc_NodeBase";
pub const TABLE_NAMESPACE_BASE: &str = "cc_NamespaceBase";
pub const TABLE_POD_BASE: &str = "cc_PodBase";
pub const TABLE_CONTAINER_BASE: &str = "cc_ContainerBase";

/// Workload kinds share one index layout, one collection each.
pub const WORKLOAD_TABLES: &[&str] = &[
    "cc_DeploymentBase",
    "cc_StatefulSetBase",
    "cc_DaemonSetBase",
    "cc_GameDeploymentBase",
    "cc_GameStatefulSetBase",
    "cc_CronJobBase",
    "cc_JobBase",
    "cc_PodWorkloadBase",
    "cc_CustomBase",
];

const OBJECT_INST_SHARDING_PREFIX: &str = "cc_ObjectBase_";
const OBJECT_INST_ASST_SHARDING_PREFIX: &str = "cc_InstAsst_";

/// Host fields stored as arrays but read back as comma-joined strings.
pub const HOST_SPECIAL_FIELDS: &[&str] = &[
    "bk_host_innerip",
    "bk_host_outerip",
    "operator",
    "bk_bak_operator",
    "bk_host_innerip_v6",
    "bk_host_outerip_v6",
];

/// Tables whose deleted documents are copied to the archive first.
const ARCHIVED_TABLES: &[&str] = &[
    TABLE_MODULE_HOST_CONFIG,
    TABLE_HOST_BASE,
    TABLE_APP_BASE,
    TABLE_SET_BASE,
    TABLE_MODULE_BASE,
    TABLE_SET_TEMPLATE,
    TABLE_PROCESS,
    TABLE_PROCESS_INSTANCE_RELATION,
    TABLE_BIZ_SET_BASE,
    // Instances live in sharding tables; the base names stay listed so a
    // delete routed to them by mistake still leaves an archive trail.
    TABLE_OBJECT_BASE,
    TABLE_INST_ASST,
];

pub fn is_object_inst_sharding_table(name: &str) -> bool {
    name.starts_with(OBJECT_INST_SHARDING_PREFIX)
}

pub fn is_object_inst_asst_sharding_table(name: &str) -> bool {
    name.starts_with(OBJECT_INST_ASST_SHARDING_PREFIX)
}

pub fn is_object_sharding_table(name: &str) -> bool {
    is_object_inst_sharding_table(name) || is_object_inst_asst_sharding_table(name)
}

/// Whether deletes against `name` must archive the removed documents.
/// An exact table name is matched before the sharding-table rule.
pub fn should_archive(name: &str) -> bool {
    ARCHIVED_TABLES.contains(&name) || is_object_sharding_table(name)
}

/// Sharding tables draw their ids from the sequence of their base table.
pub fn sequence_name(name: &str) -> &str {
    if is_object_inst_sharding_table(name) {
        TABLE_OBJECT_BASE
    } else if is_object_inst_asst_sharding_table(name) {
        TABLE_INST_ASST
    } else {
        name
    }
}

pub fn is_host_special_field(field: &str) -> bool {
    HOST_SPECIAL_FIELDS.contains(&field)
}
