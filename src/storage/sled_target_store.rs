//! Persistent target store on sled.
//!
//! Targets are stored normalized across four trees linked by name:
//!
//! ```text
//! _targets   id          -> TargetRow  { ips, context, status, type, stream_name }
//! _streams   stream name -> StreamRow  { conduit_name }
//! _conduits  conduit     -> ConduitRow { trench_name }
//! _trenches  trench      -> TrenchRow
//! ```
//!
//! Every read joins a target back to its full parent chain. Writes spanning
//! several trees run in one sled transaction.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use sled::transaction::ConflictableTransactionError;
use sled::transaction::TransactionalTree;
use sled::Transactional;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::constants::CONDUIT_TREE;
use crate::constants::META_KEY_SCHEMA_VERSION;
use crate::constants::META_TREE;
use crate::constants::SCHEMA_VERSION;
use crate::constants::STREAM_TREE;
use crate::constants::TARGET_TREE;
use crate::constants::TRENCH_TREE;
use crate::metrics::STORED_RESOURCES;
use crate::proto::Conduit;
use crate::proto::Stream;
use crate::proto::Target;
use crate::proto::Trench;
use crate::resource::target_identity;
use crate::resource::ChangeEvent;
use crate::resource::Resource;
use crate::resource::ResourceKind;
use crate::resource::IP_SEPARATOR;
use crate::storage::ResourceStore;
use crate::watch::Dispatcher;
use crate::watch::SlotSender;
use crate::watch::WatcherGuard;
use crate::Error;
use crate::Result;
use crate::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(super) struct TargetRow {
    pub(super) id: String,
    pub(super) ips: String,
    pub(super) context: String,
    pub(super) status: i32,
    pub(super) target_type: i32,
    pub(super) stream_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StreamRow {
    name: String,
    conduit_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ConduitRow {
    name: String,
    trench_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TrenchRow {
    name: String,
}

/// Parent rows a target write upserts.
#[derive(Debug, Default)]
struct ParentRows {
    stream: Option<StreamRow>,
    conduit: Option<ConduitRow>,
    trench: Option<TrenchRow>,
}

/// Parent tables loaded in memory for joining a batch of target rows.
#[derive(Debug, Default)]
struct ParentTables {
    streams: HashMap<String, StreamRow>,
    conduits: HashMap<String, ConduitRow>,
    trenches: HashMap<String, TrenchRow>,
}

impl ParentTables {
    fn overlay(
        &mut self,
        rows: &ParentRows,
    ) {
        if let Some(s) = &rows.stream {
            self.streams.insert(s.name.clone(), s.clone());
        }
        if let Some(c) = &rows.conduit {
            self.conduits.insert(c.name.clone(), c.clone());
        }
        if let Some(t) = &rows.trench {
            self.trenches.insert(t.name.clone(), t.clone());
        }
    }

    fn join_trench(
        &self,
        name: &Option<String>,
    ) -> Result<Option<Trench>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let row = self.trenches.get(name).ok_or_else(|| missing_parent(TRENCH_TREE, name))?;
        Ok(Some(Trench { name: row.name.clone() }))
    }

    fn join_conduit(
        &self,
        name: &Option<String>,
    ) -> Result<Option<Conduit>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let row = self.conduits.get(name).ok_or_else(|| missing_parent(CONDUIT_TREE, name))?;
        Ok(Some(Conduit {
            name: row.name.clone(),
            trench: self.join_trench(&row.trench_name)?,
        }))
    }

    fn join_stream(
        &self,
        name: &Option<String>,
    ) -> Result<Option<Stream>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let row = self.streams.get(name).ok_or_else(|| missing_parent(STREAM_TREE, name))?;
        Ok(Some(Stream {
            name: row.name.clone(),
            conduit: self.join_conduit(&row.conduit_name)?,
        }))
    }

    fn join(
        &self,
        row: TargetRow,
    ) -> Result<Target> {
        let context: HashMap<String, String> = if row.context.is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&row.context).map_err(StorageError::JsonError)?
        };
        Ok(Target {
            ips: row
                .ips
                .split(IP_SEPARATOR)
                .filter(|ip| !ip.is_empty())
                .map(String::from)
                .collect(),
            context,
            status: row.status,
            r#type: row.target_type,
            stream: self.join_stream(&row.stream_name)?,
        })
    }
}

fn missing_parent(
    tree: &str,
    name: &str,
) -> Error {
    StorageError::DataCorruption {
        location: format!("{tree}/{name}"),
    }
    .into()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value).map_err(StorageError::BincodeError)?)
}

fn decode<T: for<'de> Deserialize<'de>>(
    tree: &str,
    key: &[u8],
    bytes: &[u8],
) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| {
        warn!("Undecodable row in {}: {:?}", tree, e);
        StorageError::DataCorruption {
            location: format!("{}/{}", tree, String::from_utf8_lossy(key)),
        }
        .into()
    })
}

pub(super) fn target_row(target: &Target) -> Result<TargetRow> {
    let context = if target.context.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&target.context).map_err(StorageError::JsonError)?
    };
    Ok(TargetRow {
        id: target_identity(target),
        ips: target.ips.join(IP_SEPARATOR),
        context,
        status: target.status,
        target_type: target.r#type,
        stream_name: target.stream.as_ref().map(|s| s.name.clone()),
    })
}

fn parent_rows(target: &Target) -> ParentRows {
    let stream = target.stream.as_ref();
    let conduit = stream.and_then(|s| s.conduit.as_ref());
    let trench = conduit.and_then(|c| c.trench.as_ref());
    ParentRows {
        stream: stream.map(|s| StreamRow {
            name: s.name.clone(),
            conduit_name: s.conduit.as_ref().map(|c| c.name.clone()),
        }),
        conduit: conduit.map(|c| ConduitRow {
            name: c.name.clone(),
            trench_name: c.trench.as_ref().map(|t| t.name.clone()),
        }),
        trench: trench.map(|t| TrenchRow { name: t.name.clone() }),
    }
}

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<StorageError>>;

fn tx_insert<T: Serialize>(
    tree: &TransactionalTree,
    key: &str,
    value: &T,
) -> TxResult<()> {
    let bytes = bincode::serialize(value)
        .map_err(|e| ConflictableTransactionError::Abort(StorageError::BincodeError(e)))?;
    tree.insert(key.as_bytes(), bytes)?;
    Ok(())
}

#[doc(hidden)]
pub fn init_sled_registry_db(path: impl AsRef<Path> + std::fmt::Debug) -> Result<sled::Db> {
    debug!("init_sled_registry_db from path: {:?}", &path);

    sled::Config::default()
        .path(path.as_ref())
        .cache_capacity(16 * 1024 * 1024)
        .flush_every_ms(Some(100))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            warn!("Try to open DB at this location: {:?} and failed: {:?}", path, e);
            e.into()
        })
}

/// Disk-backed target store.
pub struct SledTargetStore {
    db: sled::Db,
    targets: sled::Tree,
    streams: sled::Tree,
    conduits: sled::Tree,
    trenches: sled::Tree,
    /// Mutations hold it for writing, reads for reading, so no reader ever
    /// joins a half-written composite row.
    lock: RwLock<()>,
    dispatcher: Dispatcher<Target>,
}

impl std::fmt::Debug for SledTargetStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledTargetStore")
            .field("targets", &self.targets.len())
            .finish()
    }
}

impl SledTargetStore {
    pub fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let db = init_sled_registry_db(path)?;
        Self::from_db(db)
    }

    /// Opens the trees, checks the schema version and verifies every stored
    /// row joins cleanly. Any failure here is fatal for the store.
    pub fn from_db(db: sled::Db) -> Result<Self> {
        let meta = db.open_tree(META_TREE)?;
        match meta.get(META_KEY_SCHEMA_VERSION)? {
            Some(bytes) => {
                let found: u32 = decode(META_TREE, META_KEY_SCHEMA_VERSION.as_bytes(), &bytes)?;
                if found != SCHEMA_VERSION {
                    error!(expected = SCHEMA_VERSION, found, "Registry schema version mismatch");
                    return Err(StorageError::SchemaMismatch {
                        expected: SCHEMA_VERSION,
                        found,
                    }
                    .into());
                }
            }
            None => {
                meta.insert(META_KEY_SCHEMA_VERSION, encode(&SCHEMA_VERSION)?)?;
                info!(version = SCHEMA_VERSION, "Initialized registry schema");
            }
        }

        let store = Self {
            targets: db.open_tree(TARGET_TREE)?,
            streams: db.open_tree(STREAM_TREE)?,
            conduits: db.open_tree(CONDUIT_TREE)?,
            trenches: db.open_tree(TRENCH_TREE)?,
            db,
            lock: RwLock::new(()),
            dispatcher: Dispatcher::new(),
        };

        let restored = store.load_all()?;
        STORED_RESOURCES
            .with_label_values(&[ResourceKind::Target.as_str()])
            .set(restored.len() as i64);
        info!(targets = restored.len(), "Opened persistent target store");
        Ok(store)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn watcher_count(&self) -> usize {
        self.dispatcher.len()
    }

    fn load_parents(&self) -> Result<ParentTables> {
        let mut tables = ParentTables::default();
        for item in self.streams.iter() {
            let (key, value) = item?;
            let row: StreamRow = decode(STREAM_TREE, &key, &value)?;
            tables.streams.insert(row.name.clone(), row);
        }
        for item in self.conduits.iter() {
            let (key, value) = item?;
            let row: ConduitRow = decode(CONDUIT_TREE, &key, &value)?;
            tables.conduits.insert(row.name.clone(), row);
        }
        for item in self.trenches.iter() {
            let (key, value) = item?;
            let row: TrenchRow = decode(TRENCH_TREE, &key, &value)?;
            tables.trenches.insert(row.name.clone(), row);
        }
        Ok(tables)
    }

    fn load_rows(&self) -> Result<Vec<TargetRow>> {
        let mut rows = Vec::with_capacity(self.targets.len());
        for item in self.targets.iter() {
            let (key, value) = item?;
            rows.push(decode(TARGET_TREE, &key, &value)?);
        }
        Ok(rows)
    }

    fn load_all(&self) -> Result<Vec<Target>> {
        let parents = self.load_parents()?;
        self.load_rows()?.into_iter().map(|row| parents.join(row)).collect()
    }

    fn load_one(
        &self,
        id: &str,
    ) -> Result<Option<Target>> {
        let Some(bytes) = self.targets.get(id.as_bytes())? else {
            return Ok(None);
        };
        let row: TargetRow = decode(TARGET_TREE, id.as_bytes(), &bytes)?;
        let parents = self.load_parents()?;
        parents.join(row).map(Some)
    }

    /// Whether writing `rows` would relink a stream or conduit row that is
    /// already stored under the same name.
    fn relinks_parents(
        &self,
        rows: &ParentRows,
    ) -> Result<bool> {
        if let Some(stream) = &rows.stream {
            if let Some(bytes) = self.streams.get(stream.name.as_bytes())? {
                let stored: StreamRow = decode(STREAM_TREE, stream.name.as_bytes(), &bytes)?;
                if stored != *stream {
                    return Ok(true);
                }
            }
        }
        if let Some(conduit) = &rows.conduit {
            if let Some(bytes) = self.conduits.get(conduit.name.as_bytes())? {
                let stored: ConduitRow = decode(CONDUIT_TREE, conduit.name.as_bytes(), &bytes)?;
                if stored != *conduit {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Identities of stored targets whose parent chain would change under
    /// `rows`, making their stored identity stale.
    fn conflicts(
        &self,
        rows: &ParentRows,
        written_id: &str,
    ) -> Result<Vec<String>> {
        if !self.relinks_parents(rows)? {
            return Ok(Vec::new());
        }
        let mut parents = self.load_parents()?;
        parents.overlay(rows);

        let mut stale = Vec::new();
        for row in self.load_rows()? {
            if row.id == written_id {
                continue;
            }
            let id = row.id.clone();
            let joined = parents.join(row)?;
            if target_identity(&joined) != id {
                stale.push(id);
            }
        }
        Ok(stale)
    }

    fn commit(
        &self,
        row: &TargetRow,
        parents: &ParentRows,
        stale: &[String],
    ) -> Result<()> {
        (&self.targets, &self.streams, &self.conduits, &self.trenches).transaction(
            |(targets, streams, conduits, trenches)| {
                if let Some(trench) = &parents.trench {
                    tx_insert(trenches, &trench.name, trench)?;
                }
                if let Some(conduit) = &parents.conduit {
                    tx_insert(conduits, &conduit.name, conduit)?;
                }
                if let Some(stream) = &parents.stream {
                    tx_insert(streams, &stream.name, stream)?;
                }
                tx_insert(targets, &row.id, row)?;
                for id in stale {
                    targets.remove(id.as_bytes())?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Redelivers after a committed mutation. A failed read is logged; the
    /// mutation itself already committed.
    fn emit(&self) {
        match self.load_all() {
            Ok(snapshot) => {
                STORED_RESOURCES
                    .with_label_values(&[ResourceKind::Target.as_str()])
                    .set(snapshot.len() as i64);
                self.dispatcher.dispatch(ChangeEvent::new(ResourceKind::Target), &snapshot);
            }
            Err(e) => {
                error!("Failed to read targets for dispatch: {:?}", e);
            }
        }
    }
}

impl ResourceStore<Target> for SledTargetStore {
    fn set(
        &self,
        value: Target,
    ) -> Result<()> {
        let _guard = self.lock.write();
        let id = value.identity();

        let target = match self.load_one(&id)? {
            Some(mut existing) => {
                let before = existing.clone();
                existing.merge(value);
                if existing == before {
                    trace!(id = %id, "Set without changes");
                    return Ok(());
                }
                existing
            }
            None => value,
        };

        let row = target_row(&target)?;
        let parents = parent_rows(&target);
        let stale = self.conflicts(&parents, &row.id)?;
        if !stale.is_empty() {
            warn!(id = %id, stale = ?stale, "Removing targets whose parent chain was relinked");
        }

        self.commit(&row, &parents, &stale)?;
        debug!(id = %id, "Stored target");
        self.emit();
        Ok(())
    }

    fn remove(
        &self,
        value: &Target,
    ) -> Result<()> {
        let _guard = self.lock.write();
        let id = value.identity();
        if self.targets.remove(id.as_bytes())?.is_none() {
            trace!(id = %id, "Remove of unknown target");
            return Ok(());
        }
        debug!(id = %id, "Removed target");
        self.emit();
        Ok(())
    }

    fn get(
        &self,
        filter: Option<Target>,
    ) -> Result<Vec<Target>> {
        let _guard = self.lock.read();
        let all = self.load_all()?;
        Ok(all
            .into_iter()
            .filter(|candidate| Target::matches(filter.as_ref(), candidate))
            .collect())
    }

    fn subscribe(
        &self,
        filter: Option<Target>,
        slot: SlotSender<Target>,
    ) -> Result<WatcherGuard> {
        let _guard = self.lock.read();
        let initial: Vec<Target> = self
            .load_all()?
            .into_iter()
            .filter(|candidate| Target::matches(filter.as_ref(), candidate))
            .collect();
        Ok(self.dispatcher.register(filter, slot, initial))
    }
}
