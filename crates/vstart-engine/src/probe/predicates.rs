//! Readiness predicates over decoded status documents.

use serde_json::Value;

/// Consul leader status endpoint.
pub const CONSUL_LEADER_URL: &str = "http://localhost:8500/v1/status/leader";

/// Leader address a single-node dev agent reports.
pub const CONSUL_EXPECTED_LEADER: &str = "127.0.0.1:8300";

/// Status endpoint of the first clustermgr replica.
pub const CLUSTERMGR_STAT_URL: &str = "http://127.0.0.1:9998/stat";

/// Raft states that mean a replica has joined the quorum.
pub const RAFT_READY_STATES: [&str; 3] = ["StateLeader", "StateReplicate", "StateFollower"];

/// Disk entries a blobnode reports once every disk is registered.
pub const BLOBNODE_MIN_STAT_ENTRIES: usize = 8;

/// Fields the shardnode delete stats carry once the node is serving.
pub const SHARDNODE_STAT_KEYS: [&str; 2] = ["success_per_min", "failed_per_min"];

/// Fields a running scheduler exposes on `/stats`.
pub const SCHEDULER_MIN_STAT_FIELDS: usize = 2;

/// The body is the JSON string naming the expected leader.
#[must_use]
pub fn consul_has_leader(body: &Value) -> bool {
    body.as_str() == Some(CONSUL_EXPECTED_LEADER)
}

/// `raft_status.raftState` names a quorum member.
#[must_use]
pub fn raft_member_ready(body: &Value) -> bool {
    body.get("raft_status")
        .and_then(|status| status.get("raftState"))
        .and_then(Value::as_str)
        .is_some_and(|state| RAFT_READY_STATES.contains(&state))
}

/// `/stat` lists at least [`BLOBNODE_MIN_STAT_ENTRIES`] disks.
#[must_use]
pub fn blobnode_ready(body: &Value) -> bool {
    body.as_array()
        .is_some_and(|disks| disks.len() >= BLOBNODE_MIN_STAT_ENTRIES)
}

/// Both delete-rate counters are present.
#[must_use]
pub fn shardnode_ready(body: &Value) -> bool {
    body.as_object()
        .is_some_and(|stats| SHARDNODE_STAT_KEYS.iter().all(|key| stats.contains_key(*key)))
}

/// The proxy lists at least one volume id.
#[must_use]
pub fn proxy_ready(body: &Value) -> bool {
    body.get("vids")
        .and_then(Value::as_array)
        .is_some_and(|vids| !vids.is_empty())
}

/// `/stats` carries at least [`SCHEDULER_MIN_STAT_FIELDS`] fields.
#[must_use]
pub fn scheduler_ready(body: &Value) -> bool {
    body.as_object()
        .is_some_and(|stats| stats.len() >= SCHEDULER_MIN_STAT_FIELDS)
}
