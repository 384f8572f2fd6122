//! Parsers for the textual output of ipfs subcommands.

use crate::error::{ContentError, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Peer ids from `ipfs swarm peers`.
///
/// Each line is a multiaddr such as `/ip4/10.0.0.2/tcp/4001/p2p/<peer_id>`;
/// the peer id is the last path segment. Duplicates (several transports to one
/// peer) collapse.
pub fn swarm_peers(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(|line| line.trim().trim_end_matches('/'))
        .filter_map(|addr| addr.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// `{name: pointer}` from `ipfs key list -l`, whose lines read `<pointer> <name>`.
pub fn key_list(output: &str) -> BTreeMap<String, String> {
    let mut keys = BTreeMap::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(pointer), Some(name)) = (parts.next(), parts.next()) {
            keys.insert(name.to_string(), pointer.to_string());
        }
    }
    keys
}

/// Content ids from `ipfs pin ls -q`.
pub fn pin_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Content id out of a resolved path.
///
/// `ipfs name resolve --recursive` must yield exactly `/ipfs/<cid>`. Any other
/// shape (a sub-path, another namespace, an empty id) is rejected instead of
/// guessing which segment is the id.
pub fn resolved_path(output: &str) -> Result<String> {
    let path = output.trim();
    let mut segments = path.split('/');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(""), Some("ipfs"), Some(cid), None) if is_content_id(cid) => Ok(cid.to_string()),
        _ => Err(ContentError::ParseFailure(format!(
            "expected /ipfs/<cid>, got {path:?}"
        ))),
    }
}

/// Content id printed by `ipfs add -Q`.
pub fn added_content_id(output: &str) -> Result<String> {
    let cid = output.trim();
    if is_content_id(cid) {
        Ok(cid.to_string())
    } else {
        Err(ContentError::ParseFailure(format!(
            "expected a content id, got {cid:?}"
        )))
    }
}

fn is_content_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}
