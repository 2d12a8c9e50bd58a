//! Composite identities.
//!
//! Topology identities are `/`-separated paths from the trench down to the
//! resource. Object names cannot contain `/`, so the path is unambiguous.
//! A missing parent contributes an empty segment.
//!
//! Target identities use the persistent row key layout:
//! `<ips>-<type>-<stream>.<conduit>.<trench>`.

use crate::proto::Attractor;
use crate::proto::Conduit;
use crate::proto::Flow;
use crate::proto::Gateway;
use crate::proto::Stream;
use crate::proto::Target;
use crate::proto::Trench;
use crate::proto::Vip;

pub(crate) const IP_SEPARATOR: &str = ";";

pub fn trench_identity(trench: Option<&Trench>) -> String {
    trench.map(|t| t.name.clone()).unwrap_or_default()
}

pub fn conduit_identity(conduit: Option<&Conduit>) -> String {
    match conduit {
        Some(c) => format!("{}/{}", trench_identity(c.trench.as_ref()), c.name),
        None => String::from("/"),
    }
}

pub fn stream_identity(stream: Option<&Stream>) -> String {
    match stream {
        Some(s) => format!("{}/{}", conduit_identity(s.conduit.as_ref()), s.name),
        None => String::from("//"),
    }
}

pub fn flow_identity(flow: &Flow) -> String {
    format!("{}/{}", stream_identity(flow.stream.as_ref()), flow.name)
}

pub fn vip_identity(vip: &Vip) -> String {
    format!("{}/vip/{}", trench_identity(vip.trench.as_ref()), vip.name)
}

pub fn attractor_identity(attractor: &Attractor) -> String {
    format!("{}/attractor/{}", trench_identity(attractor.trench.as_ref()), attractor.name)
}

pub fn gateway_identity(gateway: &Gateway) -> String {
    format!("{}/gateway/{}", trench_identity(gateway.trench.as_ref()), gateway.name)
}

/// Names of the stream, conduit and trench a target belongs to. Missing links
/// yield empty names.
pub fn target_parent_names(target: &Target) -> (&str, &str, &str) {
    let stream = target.stream.as_ref();
    let conduit = stream.and_then(|s| s.conduit.as_ref());
    let trench = conduit.and_then(|c| c.trench.as_ref());
    (
        stream.map(|s| s.name.as_str()).unwrap_or_default(),
        conduit.map(|c| c.name.as_str()).unwrap_or_default(),
        trench.map(|t| t.name.as_str()).unwrap_or_default(),
    )
}

/// IPs are sorted so the key depends on the address set, not the order the
/// owner listed them in.
pub fn target_identity(target: &Target) -> String {
    let mut ips: Vec<&str> = target.ips.iter().map(String::as_str).collect();
    ips.sort_unstable();
    ips.dedup();
    let (stream, conduit, trench) = target_parent_names(target);
    format!(
        "{}-{}-{}.{}.{}",
        ips.join(IP_SEPARATOR),
        target.r#type,
        stream,
        conduit,
        trench
    )
}
