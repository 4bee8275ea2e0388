//! Serving STH selection.
//!
//! Pure and deterministic: no time, I/O, or shared state. The controller
//! re-runs [`select_serving_sth`] after every input change (peer view,
//! config, local state, observed Serving STH) and publishes the result
//! only when it is the current master.

use std::collections::BTreeMap;

use super::error::InsufficientCoverageSnafu;
use super::error::InsufficientNodesSnafu;
use super::error::SelectionError;
use super::types::ClusterConfig;
use super::types::ClusterNodeState;
use super::types::SignedTreeHead;

/// Pick the Serving STH for the cluster from a snapshot of peer states.
///
/// `serving` is the Serving STH most recently observed in the
/// coordination store; `last_selected` is this selector's previous
/// output. Either may be absent on a fresh node.
///
/// The candidate is the newest STH at the largest tree size covered by at
/// least `max(minimum_serving_nodes, ceil(minimum_serving_fraction × N))`
/// of the `N` reporting nodes, where a node covers a size when its own
/// tree is at least that large. Two gates may then hold the selection
/// back:
///
/// - against the published `serving` STH, the candidate must not regress
///   in size or timestamp and must not reuse its timestamp with
///   different content; clients may never observe two trees at one
///   nominal time;
/// - against `last_selected`, size and timestamp must not decrease, so
///   the sequence of selections is monotone even while nothing has been
///   published yet. A candidate sharing the previous timestamp with a
///   larger tree is allowed here; it replaces the previous selection.
///
/// When a gate holds the candidate back the previous selection (or,
/// lacking one, the published STH) is returned unchanged.
pub fn select_serving_sth(
    peers: &[ClusterNodeState],
    config: &ClusterConfig,
    serving: Option<&SignedTreeHead>,
    last_selected: Option<&SignedTreeHead>,
) -> Result<SignedTreeHead, SelectionError> {
    // Newest STH per tree size, and how many nodes sit at exactly each size.
    let mut newest_by_size: BTreeMap<u64, &SignedTreeHead> = BTreeMap::new();
    let mut nodes_by_size: BTreeMap<u64, usize> = BTreeMap::new();
    let mut reporting = 0usize;

    for peer in peers {
        let Some(sth) = peer.newest_sth.as_ref() else {
            continue;
        };
        reporting += 1;
        *nodes_by_size.entry(sth.tree_size).or_default() += 1;
        newest_by_size
            .entry(sth.tree_size)
            .and_modify(|current| {
                if prefer(sth, *current) {
                    *current = sth;
                }
            })
            .or_insert(sth);
    }

    let minimum = config.minimum_serving_nodes as usize;
    if reporting < minimum {
        return InsufficientNodesSnafu {
            have: reporting,
            need: minimum,
        }
        .fail();
    }

    let required = config.required_nodes(reporting);

    // Walk from the largest tree size down; the running total counts the
    // nodes whose tree is at least the current size.
    let mut covering = 0usize;
    let mut candidate: Option<&SignedTreeHead> = None;
    for (size, count) in nodes_by_size.iter().rev() {
        covering += count;
        if covering >= required {
            candidate = Some(newest_by_size[size]);
            break;
        }
    }
    let Some(candidate) = candidate else {
        return InsufficientCoverageSnafu {
            required,
            nodes: reporting,
        }
        .fail();
    };

    let previous = last_selected.or(serving);

    if let Some(serving) = serving {
        let regresses = candidate.tree_size < serving.tree_size || candidate.timestamp < serving.timestamp;
        let reuses_timestamp = candidate.timestamp == serving.timestamp && candidate != serving;
        if regresses || reuses_timestamp {
            return Ok(previous.unwrap_or(serving).clone());
        }
    }

    if let Some(last) = last_selected {
        if candidate.tree_size < last.tree_size || candidate.timestamp < last.timestamp {
            return Ok(last.clone());
        }
    }

    Ok(candidate.clone())
}

/// Whether `a` should replace `b` as the representative STH for one tree
/// size: newer timestamp wins, signature bytes break exact ties so the
/// choice is deterministic.
fn prefer(a: &SignedTreeHead, b: &SignedTreeHead) -> bool {
    a.timestamp > b.timestamp
        || (a.timestamp == b.timestamp && a.tree_head_signature > b.tree_head_signature)
}
