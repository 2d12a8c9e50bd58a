//! Filter semantics.
//!
//! A filter is a resource value used as a query template. Fields left at
//! their zero value do not constrain the candidate. A populated parent
//! recurses with the parent kind's own rules; an absent parent in the filter
//! matches anything, including an absent parent in the candidate.
//!
//! Repeated fields constrain by containment: every element listed in the
//! filter must be present in the candidate.

use std::collections::HashSet;

use crate::proto::target::Status;
use crate::proto::Attractor;
use crate::proto::Conduit;
use crate::proto::Flow;
use crate::proto::Gateway;
use crate::proto::Stream;
use crate::proto::Target;
use crate::proto::Trench;
use crate::proto::Vip;

/// Unset filter fields are wildcards.
#[inline]
fn field<T: Default + PartialEq>(
    filter: &T,
    candidate: &T,
) -> bool {
    *filter == T::default() || filter == candidate
}

#[inline]
fn contains_all(
    filter: &[String],
    candidate: &[String],
) -> bool {
    filter.iter().all(|f| candidate.contains(f))
}

fn contains_all_named<'a, T: 'a>(
    filter: &'a [T],
    candidate: &'a [T],
    name: impl Fn(&T) -> &str,
) -> bool {
    filter
        .iter()
        .all(|f| candidate.iter().any(|c| name(c) == name(f)))
}

/// Pairs up filter and candidate, or returns the verdict when one side being
/// absent already decides the match.
#[inline]
fn pair<'a, T>(
    filter: Option<&'a T>,
    candidate: Option<&'a T>,
) -> Result<(&'a T, &'a T), bool> {
    match (filter, candidate) {
        (None, _) => Err(true),
        (Some(_), None) => Err(false),
        (Some(f), Some(c)) => Ok((f, c)),
    }
}

pub fn trench_matches(
    filter: Option<&Trench>,
    candidate: Option<&Trench>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    field(&f.name, &c.name)
}

pub fn conduit_matches(
    filter: Option<&Conduit>,
    candidate: Option<&Conduit>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    field(&f.name, &c.name) && trench_matches(f.trench.as_ref(), c.trench.as_ref())
}

pub fn stream_matches(
    filter: Option<&Stream>,
    candidate: Option<&Stream>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    field(&f.name, &c.name) && conduit_matches(f.conduit.as_ref(), c.conduit.as_ref())
}

pub fn flow_matches(
    filter: Option<&Flow>,
    candidate: Option<&Flow>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    field(&f.name, &c.name)
        && field(&f.priority, &c.priority)
        && contains_all(&f.source_subnets, &c.source_subnets)
        && contains_all(&f.destination_port_ranges, &c.destination_port_ranges)
        && contains_all(&f.source_port_ranges, &c.source_port_ranges)
        && contains_all(&f.protocols, &c.protocols)
        && contains_all_named(&f.vips, &c.vips, |v| v.name.as_str())
        && stream_matches(f.stream.as_ref(), c.stream.as_ref())
}

pub fn vip_matches(
    filter: Option<&Vip>,
    candidate: Option<&Vip>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    field(&f.name, &c.name)
        && field(&f.address, &c.address)
        && trench_matches(f.trench.as_ref(), c.trench.as_ref())
}

pub fn attractor_matches(
    filter: Option<&Attractor>,
    candidate: Option<&Attractor>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    field(&f.name, &c.name)
        && contains_all_named(&f.vips, &c.vips, |v| v.name.as_str())
        && contains_all_named(&f.gateways, &c.gateways, |g| g.name.as_str())
        && trench_matches(f.trench.as_ref(), c.trench.as_ref())
}

pub fn gateway_matches(
    filter: Option<&Gateway>,
    candidate: Option<&Gateway>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    field(&f.name, &c.name)
        && field(&f.address, &c.address)
        && field(&f.remote_asn, &c.remote_asn)
        && field(&f.local_asn, &c.local_asn)
        && field(&f.remote_port, &c.remote_port)
        && field(&f.local_port, &c.local_port)
        && field(&f.ip_family, &c.ip_family)
        && field(&f.bfd, &c.bfd)
        && field(&f.protocol, &c.protocol)
        && field(&f.hold_time, &c.hold_time)
        && trench_matches(f.trench.as_ref(), c.trench.as_ref())
}

/// Status `ANY` is a wildcard. Type is compared exactly since `DEFAULT` is a
/// real type. Context never takes part in matching.
pub fn target_matches(
    filter: Option<&Target>,
    candidate: Option<&Target>,
) -> bool {
    let (f, c) = match pair(filter, candidate) {
        Ok(p) => p,
        Err(decided) => return decided,
    };
    if f.status() != Status::Any && f.status != c.status {
        return false;
    }
    if f.r#type != c.r#type {
        return false;
    }
    if !f.ips.is_empty() {
        let wanted: HashSet<&String> = f.ips.iter().collect();
        let got: HashSet<&String> = c.ips.iter().collect();
        if wanted != got {
            return false;
        }
    }
    stream_matches(f.stream.as_ref(), c.stream.as_ref())
}
