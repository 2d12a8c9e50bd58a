use std::collections::HashMap;

use crate::proto::target::Status;
use crate::proto::target::Type;
use crate::proto::Conduit;
use crate::proto::Flow;
use crate::proto::Stream;
use crate::proto::Target;
use crate::proto::Trench;

pub(crate) fn trench(name: &str) -> Trench {
    Trench { name: name.into() }
}

pub(crate) fn conduit(
    name: &str,
    trench_name: &str,
) -> Conduit {
    Conduit {
        name: name.into(),
        trench: Some(trench(trench_name)),
    }
}

pub(crate) fn stream(
    name: &str,
    conduit_name: &str,
    trench_name: &str,
) -> Stream {
    Stream {
        name: name.into(),
        conduit: Some(conduit(conduit_name, trench_name)),
    }
}

pub(crate) fn flow(
    name: &str,
    priority: i32,
    stream: Stream,
) -> Flow {
    Flow {
        name: name.into(),
        priority,
        stream: Some(stream),
        ..Default::default()
    }
}

pub(crate) fn target(
    ips: &[&str],
    status: Status,
    target_type: Type,
    stream: Option<Stream>,
) -> Target {
    Target {
        ips: ips.iter().map(|ip| ip.to_string()).collect(),
        context: HashMap::new(),
        status: status as i32,
        r#type: target_type as i32,
        stream,
    }
}

pub(crate) fn target_with_context(
    ips: &[&str],
    status: Status,
    stream: Option<Stream>,
    context: &[(&str, &str)],
) -> Target {
    let mut t = target(ips, status, Type::Default, stream);
    t.context = context
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    t
}

/// Filter selecting every target of the given type regardless of status.
pub(crate) fn any_status(target_type: Type) -> Target {
    Target {
        status: Status::Any as i32,
        r#type: target_type as i32,
        ..Default::default()
    }
}
