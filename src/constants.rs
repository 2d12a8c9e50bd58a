// -
// Database namespaces

/// Sled database tree namespaces, one per normalized table
pub(crate) const TARGET_TREE: &str = "_targets";
pub(crate) const STREAM_TREE: &str = "_streams";
pub(crate) const CONDUIT_TREE: &str = "_conduits";
pub(crate) const TRENCH_TREE: &str = "_trenches";
pub(crate) const META_TREE: &str = "_registry_metadata";

/// Sled entry key namespaces
pub(crate) const META_KEY_SCHEMA_VERSION: &str = "_schema_version";

/// On-disk layout version written by this build
pub(crate) const SCHEMA_VERSION: u32 = 1;
