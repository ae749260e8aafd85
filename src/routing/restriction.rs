use std::net::IpAddr;

use ipnet::IpNet;

use crate::pattern::Pattern;

/// One clause of a route's access-control list.
///
/// Enabled predicates are ORed within the clause, each negated first when
/// `invert` is set. `and_after` chains this clause with the next into an AND
/// group; a clause without it terminates the group. A terminated group that
/// evaluates true denies the request, so the whole list reads as an
/// any-of-ANDed-groups formula: `(c1 AND c2) OR (c3) OR (c4 AND c5)`.
#[derive(Clone, Debug)]
pub struct Restriction {
    /// Matches when the peer address falls inside this network.
    pub network: Option<IpNet>,
    /// Matches when the request path matches this pattern.
    pub path: Option<Pattern>,
    /// Negate each enabled predicate before it contributes.
    pub invert: bool,
    /// Chain this clause with the next one into an AND group.
    pub and_after: bool,
}

/// Evaluate a restriction list against the peer address and the lowercased
/// request path. Returns true when the request must be denied.
///
/// A peer without an IP address never satisfies the network predicate, and a
/// clause with no enabled predicates cannot deny on its own.
pub(crate) fn denies(
    restrictions: &[Restriction],
    remote_ip: Option<IpAddr>,
    path: &str,
) -> bool {
    let mut and_ok = true;
    for clause in restrictions {
        let mut clause_ok = false;
        if let Some(network) = &clause.network {
            if let Some(ip) = remote_ip {
                clause_ok |= network.contains(&ip) != clause.invert;
            }
        }
        if let Some(pattern) = &clause.path {
            clause_ok |= pattern.matches_path(path) != clause.invert;
        }
        if clause.and_after {
            and_ok = and_ok && clause_ok;
            continue;
        }
        if and_ok && clause_ok {
            return true;
        }
        and_ok = true;
    }
    false
}
