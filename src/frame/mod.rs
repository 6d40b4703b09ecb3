//! Persistent columnar frame store over redb.
//!
//! One store file per schema binding. The schema's stored features map
//! onto typed column tables (one row per analysis frame), plus a raw
//! `audio` column holding each frame's window; a directory table maps
//! pattern ids to their contiguous row-group extents. Indexed columns get
//! a multimap side table keyed by an order-preserving encoding of the
//! frame value, serving equality and range lookups without a scan.
//!
//! Appends are buffered on the handle and reach durable storage on
//! `flush`/`close`. Single writer; reads and index lookups on the same
//! handle see buffered rows as well as durable ones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use redb::{
    Database, MultimapTableDefinition, ReadableTable, TableDefinition,
};
use serde::{Deserialize, Serialize};

use crate::array::{ArrayData, DType, DimArray};
use crate::config::AudioConfig;
use crate::dimension::Dimension;
use crate::error::{AudiolithResult, StoreError};
use crate::feature::FrameSchema;
use crate::spectral::FrequencyAdaptive;

/// Name of the raw-audio column present in every store.
pub const AUDIO_COLUMN: &str = "audio";

const FORMAT_VERSION: u32 = 1;

/// Store metadata: manifest and bookkeeping.
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
/// Pattern id → bincode `(start_row, n_rows)` extent.
const PATTERNS: TableDefinition<&str, &[u8]> = TableDefinition::new("patterns");

fn column_table(name: &str) -> TableDefinition<'_, u64, &'static [u8]> {
    TableDefinition::new(name)
}

fn index_table(name: &str) -> MultimapTableDefinition<'_, &'static [u8], u64> {
    MultimapTableDefinition::new(name)
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        message: e.to_string(),
    }
}

fn ser_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization {
        message: e.to_string(),
    }
}

/// Structural description of one column, persisted in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnManifest {
    pub name: String,
    /// Per-frame element shape (empty for scalars).
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub indexed: bool,
}

/// Persisted structural identity of a store file.
///
/// Compared on reopen: a store is bound to one schema layout for its
/// lifetime, so any structural difference is a [`StoreError::SchemaMismatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    schema_name: String,
    config: AudioConfig,
    columns: Vec<ColumnManifest>,
}

/// In-memory column descriptor: manifest entry plus reconstruction
/// dimensions (rebuilt from the live schema, never persisted).
struct ColumnSpec {
    manifest: ColumnManifest,
    dims: Vec<Dimension>,
}

impl ColumnSpec {
    fn per_frame_len(&self) -> usize {
        self.manifest.shape.iter().product()
    }

    fn table_name(&self) -> String {
        format!("col:{}", self.manifest.name)
    }

    fn index_name(&self) -> String {
        format!("idx:{}", self.manifest.name)
    }
}

/// One buffered, not-yet-durable row group.
#[derive(Clone)]
struct PendingRow {
    pattern: String,
    start: u64,
    audio: DimArray,
    features: Vec<(String, DimArray)>,
}

/// A pattern's row group as returned by reads: raw audio plus every
/// stored feature, each carrying its dimension metadata.
#[derive(Debug, Clone)]
pub struct RowGroup {
    pub pattern_id: String,
    pub audio: DimArray,
    features: Vec<(String, DimArray)>,
}

impl RowGroup {
    pub fn feature(&self, name: &str) -> Option<&DimArray> {
        self.features
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, arr)| arr)
    }

    pub fn features(&self) -> &[(String, DimArray)] {
        &self.features
    }

    /// Rebuild a stored feature whose frequency axis is ragged into its
    /// frequency-adaptive representation.
    pub fn frequency_adaptive(&self, name: &str) -> AudiolithResult<FrequencyAdaptive> {
        let arr = self.feature(name).ok_or_else(|| StoreError::ColumnNotFound {
            column: name.to_string(),
        })?;
        FrequencyAdaptive::from_dim_array(arr.clone())
    }
}

/// Summary of a store file, readable without the originating schema.
#[derive(Debug, Clone)]
pub struct StoreInfo {
    pub schema_name: String,
    pub sample_rate: u32,
    pub window_size: usize,
    pub step_size: usize,
    pub rows: u64,
    pub columns: Vec<ColumnManifest>,
    pub patterns: Vec<(String, u64)>,
}

/// Persistent, append-only feature store bound to one [`FrameSchema`].
pub struct FrameStore {
    db: Database,
    path: PathBuf,
    schema: FrameSchema,
    config: AudioConfig,
    columns: Vec<ColumnSpec>,
    pattern_dir: HashMap<String, (u64, u64)>,
    buffered: Vec<PendingRow>,
    next_row: u64,
    closed: bool,
}

impl FrameStore {
    /// Open or create a store file bound to the given schema and
    /// configuration.
    ///
    /// On first open the column layout is derived from the schema and
    /// persisted; on reopen the persisted layout must match exactly.
    pub fn open(
        path: impl AsRef<Path>,
        schema: FrameSchema,
        config: AudioConfig,
    ) -> AudiolithResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io { source: e })?;
        }

        let columns = derive_columns(&schema, &config)?;
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            schema_name: schema.name().to_string(),
            config,
            columns: columns.iter().map(|c| c.manifest.clone()).collect(),
        };

        let db = Database::create(&path).map_err(backend)?;

        let txn = db.begin_write().map_err(backend)?;
        let mut pattern_dir = HashMap::new();
        let mut next_row = 0;
        {
            let mut meta = txn.open_table(META).map_err(backend)?;
            let existing = meta
                .get("manifest")
                .map_err(backend)?
                .map(|guard| guard.value().to_vec());
            match existing {
                Some(existing) => {
                    let stored: Manifest =
                        serde_json::from_slice(&existing).map_err(ser_err)?;
                    if stored != manifest {
                        return Err(StoreError::SchemaMismatch {
                            message: format!(
                                "store holds schema '{}' with {} column(s), \
                                 opened with schema '{}' with {} column(s)",
                                stored.schema_name,
                                stored.columns.len(),
                                manifest.schema_name,
                                manifest.columns.len()
                            ),
                        }
                        .into());
                    }
                }
                None => {
                    let encoded = serde_json::to_vec(&manifest).map_err(ser_err)?;
                    meta.insert("manifest", encoded.as_slice()).map_err(backend)?;
                }
            }

            // Materialize every table up front so later read transactions
            // never race table creation.
            let patterns = txn.open_table(PATTERNS).map_err(backend)?;
            for item in patterns.iter().map_err(backend)? {
                let (key, value) = item.map_err(backend)?;
                let (start, n): (u64, u64) =
                    bincode::deserialize(value.value()).map_err(ser_err)?;
                next_row = next_row.max(start + n);
                pattern_dir.insert(key.value().to_string(), (start, n));
            }
            for spec in &columns {
                txn.open_table(column_table(&spec.table_name()))
                    .map_err(backend)?;
                if spec.manifest.indexed {
                    txn.open_multimap_table(index_table(&spec.index_name()))
                        .map_err(backend)?;
                }
            }
        }
        txn.commit().map_err(backend)?;

        tracing::info!(
            path = %path.display(),
            schema = schema.name(),
            columns = columns.len(),
            rows = next_row,
            "opened frame store"
        );

        Ok(Self {
            db,
            path,
            schema,
            config,
            columns,
            pattern_dir,
            buffered: Vec::new(),
            next_row,
            closed: false,
        })
    }

    /// Summarize a store file without its originating schema.
    pub fn peek(path: impl AsRef<Path>) -> AudiolithResult<StoreInfo> {
        let db = Database::open(path.as_ref()).map_err(backend)?;
        let txn = db.begin_read().map_err(backend)?;
        let meta = txn.open_table(META).map_err(backend)?;
        let manifest_bytes = meta
            .get("manifest")
            .map_err(backend)?
            .ok_or_else(|| StoreError::SchemaMismatch {
                message: "store file has no manifest".into(),
            })?;
        let manifest: Manifest =
            serde_json::from_slice(manifest_bytes.value()).map_err(ser_err)?;

        let mut patterns = Vec::new();
        let mut rows = 0;
        let dir = txn.open_table(PATTERNS).map_err(backend)?;
        for item in dir.iter().map_err(backend)? {
            let (key, value) = item.map_err(backend)?;
            let (start, n): (u64, u64) = bincode::deserialize(value.value()).map_err(ser_err)?;
            rows = rows.max(start + n);
            patterns.push((key.value().to_string(), n));
        }

        Ok(StoreInfo {
            schema_name: manifest.schema_name,
            sample_rate: manifest.config.sample_rate,
            window_size: manifest.config.window_size,
            step_size: manifest.config.step_size,
            rows,
            columns: manifest.columns,
            patterns,
        })
    }

    pub fn schema(&self) -> &FrameSchema {
        &self.schema
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total frame rows, buffered rows included.
    pub fn rows(&self) -> u64 {
        self.next_row
    }

    /// Column names: raw audio first, then stored features in compiled
    /// insertion order. Compute-only features never appear.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.manifest.name.clone()).collect()
    }

    /// Current shape of a column: `(rows, *per_frame_shape)`.
    pub fn column_shape(&self, column: &str) -> AudiolithResult<Vec<usize>> {
        let spec = self.column_spec(column)?;
        let mut shape = vec![self.next_row as usize];
        shape.extend_from_slice(&spec.manifest.shape);
        Ok(shape)
    }

    /// Stored pattern ids, buffered appends included.
    pub fn patterns(&self) -> Vec<String> {
        self.pattern_dir.keys().cloned().collect()
    }

    /// Run the feature graph over `audio` and buffer one row group under
    /// `pattern_id`.
    ///
    /// Any extraction failure (including a `ContractViolation`) aborts
    /// before anything is buffered; nothing partial survives.
    pub fn append(&mut self, pattern_id: &str, audio: &[f32]) -> AudiolithResult<()> {
        if self.pattern_dir.contains_key(pattern_id) {
            return Err(StoreError::DuplicatePattern {
                pattern_id: pattern_id.to_string(),
            }
            .into());
        }

        let result = self.schema.execute(&self.config, audio)?;
        let n = result.audio.shape()[0] as u64;
        let start = self.next_row;

        let features: Vec<(String, DimArray)> = result
            .features
            .into_iter()
            .filter(|(name, _)| {
                self.schema.feature(name).is_some_and(|node| node.store)
            })
            .collect();

        self.next_row += n;
        self.pattern_dir.insert(pattern_id.to_string(), (start, n));
        self.buffered.push(PendingRow {
            pattern: pattern_id.to_string(),
            start,
            audio: result.audio,
            features,
        });

        tracing::debug!(pattern = pattern_id, frames = n, "buffered row group");
        Ok(())
    }

    /// Read a pattern's row group, buffered or durable.
    pub fn read(&self, pattern_id: &str) -> AudiolithResult<RowGroup> {
        if let Some(pending) = self.buffered.iter().find(|p| p.pattern == pattern_id) {
            return Ok(RowGroup {
                pattern_id: pending.pattern.clone(),
                audio: pending.audio.clone(),
                features: pending.features.clone(),
            });
        }

        let &(start, n) = self.pattern_dir.get(pattern_id).ok_or_else(|| {
            StoreError::PatternNotFound {
                pattern_id: pattern_id.to_string(),
            }
        })?;

        let txn = self.db.begin_read().map_err(backend)?;
        let mut audio = None;
        let mut features = Vec::new();
        for spec in &self.columns {
            let arr = self.read_column_rows(&txn, spec, start, n)?;
            if spec.manifest.name == AUDIO_COLUMN {
                audio = Some(arr);
            } else {
                features.push((spec.manifest.name.clone(), arr));
            }
        }

        Ok(RowGroup {
            pattern_id: pattern_id.to_string(),
            // The audio column spec always exists.
            audio: audio.ok_or_else(|| StoreError::ColumnNotFound {
                column: AUDIO_COLUMN.to_string(),
            })?,
            features,
        })
    }

    /// Equality lookup on an indexed column: the frame rows whose stored
    /// value matches exactly. Buffered appends on this handle are probed
    /// alongside the durable index, so a row is findable as soon as it is
    /// appended.
    pub fn find_equal(&self, column: &str, value: &DimArray) -> AudiolithResult<Vec<u64>> {
        let spec = self.indexed_spec(column)?;
        let key = order_key(value.data());
        let txn = self.db.begin_read().map_err(backend)?;
        let index = txn
            .open_multimap_table(index_table(&spec.index_name()))
            .map_err(backend)?;
        let mut rows = Vec::new();
        for item in index.get(key.as_slice()).map_err(backend)? {
            rows.push(item.map_err(backend)?.value());
        }
        self.probe_buffered(spec, &mut rows, |frame_key| frame_key == key.as_slice())?;
        rows.sort_unstable();
        Ok(rows)
    }

    /// Range lookup on an indexed column: frame rows whose stored value
    /// falls in `[lo, hi]` under the order-preserving encoding (numeric
    /// order for scalar columns). Buffered appends on this handle are
    /// probed alongside the durable index.
    pub fn find_range(
        &self,
        column: &str,
        lo: &DimArray,
        hi: &DimArray,
    ) -> AudiolithResult<Vec<u64>> {
        let spec = self.indexed_spec(column)?;
        let lo_key = order_key(lo.data());
        let mut hi_key = order_key(hi.data());
        hi_key.push(0xff); // inclusive upper bound
        let txn = self.db.begin_read().map_err(backend)?;
        let index = txn
            .open_multimap_table(index_table(&spec.index_name()))
            .map_err(backend)?;
        let mut rows = Vec::new();
        for item in index
            .range(lo_key.as_slice()..hi_key.as_slice())
            .map_err(backend)?
        {
            let (_, values) = item.map_err(backend)?;
            for row in values {
                rows.push(row.map_err(backend)?.value());
            }
        }
        self.probe_buffered(spec, &mut rows, |frame_key| {
            frame_key >= lo_key.as_slice() && frame_key < hi_key.as_slice()
        })?;
        rows.sort_unstable();
        Ok(rows)
    }

    /// Scan buffered row groups for frames whose encoded value satisfies
    /// the key predicate, collecting their row ids.
    fn probe_buffered(
        &self,
        spec: &ColumnSpec,
        rows: &mut Vec<u64>,
        matches: impl Fn(&[u8]) -> bool,
    ) -> AudiolithResult<()> {
        for pending in &self.buffered {
            let arr = pending_column(pending, &spec.manifest.name)?;
            for frame in 0..arr.shape()[0] {
                let payload = frame_payload(arr, frame, spec.per_frame_len());
                if matches(&order_key(&payload)) {
                    rows.push(pending.start + frame as u64);
                }
            }
        }
        Ok(())
    }

    /// Sequential scan of any column: every frame row's value, buffered
    /// rows included.
    pub fn scan(&self, column: &str) -> AudiolithResult<Vec<(u64, DimArray)>> {
        let spec = self.column_spec(column)?;
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn
            .open_table(column_table(&spec.table_name()))
            .map_err(backend)?;
        let mut out = Vec::new();
        for item in table.iter().map_err(backend)? {
            let (row, bytes) = item.map_err(backend)?;
            let data: ArrayData = bincode::deserialize(bytes.value()).map_err(ser_err)?;
            out.push((row.value(), per_frame_array(spec, data)?));
        }
        for pending in &self.buffered {
            let arr = pending_column(pending, &spec.manifest.name)?;
            for frame in 0..arr.shape()[0] {
                out.push((
                    pending.start + frame as u64,
                    per_frame_array(spec, frame_payload(arr, frame, spec.per_frame_len()))?,
                ));
            }
        }
        Ok(out)
    }

    /// Write buffered row groups to durable storage.
    pub fn flush(&mut self) -> AudiolithResult<()> {
        if self.buffered.is_empty() {
            return Ok(());
        }
        let n_groups = self.buffered.len();

        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut patterns = txn.open_table(PATTERNS).map_err(backend)?;
            for pending in &self.buffered {
                let n = pending.audio.shape()[0] as u64;
                let extent =
                    bincode::serialize(&(pending.start, n)).map_err(ser_err)?;
                patterns
                    .insert(pending.pattern.as_str(), extent.as_slice())
                    .map_err(backend)?;
            }

            for spec in &self.columns {
                let mut table = txn
                    .open_table(column_table(&spec.table_name()))
                    .map_err(backend)?;
                let mut index = if spec.manifest.indexed {
                    Some(
                        txn.open_multimap_table(index_table(&spec.index_name()))
                            .map_err(backend)?,
                    )
                } else {
                    None
                };

                for pending in &self.buffered {
                    let arr = pending_column(pending, &spec.manifest.name)?;
                    for frame in 0..arr.shape()[0] {
                        let row = pending.start + frame as u64;
                        let payload = frame_payload(arr, frame, spec.per_frame_len());
                        let bytes = bincode::serialize(&payload).map_err(ser_err)?;
                        table.insert(row, bytes.as_slice()).map_err(backend)?;
                        if let Some(index) = index.as_mut() {
                            let key = order_key(&payload);
                            index.insert(key.as_slice(), row).map_err(backend)?;
                        }
                    }
                }
            }
        }
        txn.commit().map_err(backend)?;

        self.buffered.clear();
        tracing::info!(
            row_groups = n_groups,
            rows = self.next_row,
            "flushed frame store"
        );
        Ok(())
    }

    /// Flush and release the store.
    ///
    /// A failure here is reported, never swallowed: the buffered row
    /// groups did not reach durable storage.
    pub fn close(mut self) -> AudiolithResult<()> {
        self.flush()?;
        self.closed = true;
        tracing::info!(path = %self.path.display(), rows = self.next_row, "closed frame store");
        Ok(())
    }

    fn column_spec(&self, column: &str) -> AudiolithResult<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.manifest.name == column)
            .ok_or_else(|| {
                StoreError::ColumnNotFound {
                    column: column.to_string(),
                }
                .into()
            })
    }

    fn indexed_spec(&self, column: &str) -> AudiolithResult<&ColumnSpec> {
        let spec = self.column_spec(column)?;
        if !spec.manifest.indexed {
            return Err(StoreError::NotIndexed {
                column: column.to_string(),
            }
            .into());
        }
        Ok(spec)
    }

    fn read_column_rows(
        &self,
        txn: &redb::ReadTransaction,
        spec: &ColumnSpec,
        start: u64,
        n: u64,
    ) -> AudiolithResult<DimArray> {
        let table = txn
            .open_table(column_table(&spec.table_name()))
            .map_err(backend)?;
        let mut data = ArrayData::zeros(spec.manifest.dtype, 0);
        for row in start..start + n {
            let bytes = table
                .get(row)
                .map_err(backend)?
                .ok_or_else(|| StoreError::Backend {
                    message: format!(
                        "row {row} missing from column '{}'",
                        spec.manifest.name
                    ),
                })?;
            let frame: ArrayData =
                bincode::deserialize(bytes.value()).map_err(ser_err)?;
            match (&mut data, frame) {
                (ArrayData::F32(acc), ArrayData::F32(v)) => acc.extend_from_slice(&v),
                (ArrayData::F64(acc), ArrayData::F64(v)) => acc.extend_from_slice(&v),
                _ => {
                    return Err(StoreError::Serialization {
                        message: format!(
                            "column '{}' holds a mixed element type",
                            spec.manifest.name
                        ),
                    }
                    .into());
                }
            }
        }

        let mut shape = vec![n as usize];
        shape.extend_from_slice(&spec.manifest.shape);
        let mut dims = vec![Dimension::Time(self.config.frame_time_dimension())];
        dims.extend(spec.dims.iter().cloned());
        DimArray::new(data, shape, dims)
    }
}

impl Drop for FrameStore {
    fn drop(&mut self) {
        // Drop cannot propagate; `close()` is the reporting path. This
        // fallback only salvages row groups on handles dropped without it.
        if !self.closed && !self.buffered.is_empty() {
            if let Err(e) = self.flush() {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    buffered = self.buffered.len(),
                    "dropping frame store with unflushed row groups"
                );
            }
        }
    }
}

/// Derive the column layout: the raw audio column plus one column per
/// stored feature, in compiled insertion order.
fn derive_columns(
    schema: &FrameSchema,
    config: &AudioConfig,
) -> AudiolithResult<Vec<ColumnSpec>> {
    let mut columns = vec![ColumnSpec {
        manifest: ColumnManifest {
            name: AUDIO_COLUMN.to_string(),
            shape: vec![config.window_size],
            dtype: DType::F32,
            indexed: false,
        },
        dims: vec![Dimension::Time(config.sample_time_dimension())],
    }];

    for node in schema.stored_features() {
        if node.name == AUDIO_COLUMN {
            return Err(StoreError::SchemaMismatch {
                message: format!("feature name '{AUDIO_COLUMN}' is reserved"),
            }
            .into());
        }
        columns.push(ColumnSpec {
            manifest: ColumnManifest {
                name: node.name.clone(),
                shape: node.extractor().dim(config),
                dtype: node.extractor().dtype(),
                indexed: node.indexed,
            },
            dims: node.extractor().feature_dims(config),
        });
    }
    Ok(columns)
}

/// A pending row group's column array by name.
fn pending_column<'a>(pending: &'a PendingRow, name: &str) -> AudiolithResult<&'a DimArray> {
    if name == AUDIO_COLUMN {
        return Ok(&pending.audio);
    }
    pending
        .features
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, arr)| arr)
        .ok_or_else(|| {
            StoreError::ColumnNotFound {
                column: name.to_string(),
            }
            .into()
        })
}

/// Flat payload of one frame row out of a stacked `(n, *dim)` array.
fn frame_payload(arr: &DimArray, frame: usize, per_frame_len: usize) -> ArrayData {
    let start = frame * per_frame_len;
    match arr.data() {
        ArrayData::F32(v) => ArrayData::F32(v[start..start + per_frame_len].to_vec()),
        ArrayData::F64(v) => ArrayData::F64(v[start..start + per_frame_len].to_vec()),
    }
}

/// Rebuild one frame row as a dimensioned array with the column's
/// declared axis semantics.
fn per_frame_array(spec: &ColumnSpec, data: ArrayData) -> AudiolithResult<DimArray> {
    DimArray::new(data, spec.manifest.shape.clone(), spec.dims.clone())
}

/// Order-preserving byte encoding of a frame value: per element, flip
/// negative floats and set the sign bit of positives, so unsigned
/// byte-wise order matches numeric order. Arrays compare
/// lexicographically, which preserves equality and gives scalar columns
/// true numeric range semantics.
fn order_key(data: &ArrayData) -> Vec<u8> {
    let mut key = Vec::new();
    match data {
        ArrayData::F32(values) => {
            for &x in values {
                let bits = x.to_bits();
                let ordered = if bits & 0x8000_0000 != 0 {
                    !bits
                } else {
                    bits | 0x8000_0000
                };
                key.extend_from_slice(&ordered.to_be_bytes());
            }
        }
        ArrayData::F64(values) => {
            for &x in values {
                let bits = x.to_bits();
                let ordered = if bits & 0x8000_0000_0000_0000 != 0 {
                    !bits
                } else {
                    bits | 0x8000_0000_0000_0000
                };
                key.extend_from_slice(&ordered.to_be_bytes());
            }
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::extractors::{FftExtractor, LoudnessExtractor};
    use crate::feature::SchemaBuilder;
    use tempfile::TempDir;

    fn config() -> AudioConfig {
        AudioConfig::new(44_100, 4096, 2048).unwrap()
    }

    fn fft_loudness_schema() -> FrameSchema {
        SchemaBuilder::new("frames")
            .feature("fft", FftExtractor::new(), &[], true)
            .indexed_feature("loudness", LoudnessExtractor, &["fft"])
            .compile()
            .unwrap()
    }

    fn tone(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (std::f32::consts::TAU * 440.0 * i as f32 / 44_100.0).sin())
            .collect()
    }

    #[test]
    fn store_file_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frames.redb");
        let store = FrameStore::open(&path, fft_loudness_schema(), config()).unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("frames.redb");
        let store = FrameStore::open(&path, fft_loudness_schema(), config()).unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn columns_follow_the_schema() {
        let dir = TempDir::new().unwrap();
        let store = FrameStore::open(
            dir.path().join("frames.redb"),
            fft_loudness_schema(),
            config(),
        )
        .unwrap();
        assert_eq!(store.column_names(), vec!["audio", "fft", "loudness"]);
        // FFT over a 4096 window: 2048 coefficients, no rows yet.
        assert_eq!(store.column_shape("fft").unwrap(), vec![0, 2048]);
        assert_eq!(store.column_shape("loudness").unwrap(), vec![0]);
        store.close().unwrap();
    }

    #[test]
    fn unstored_features_never_become_columns() {
        let schema = SchemaBuilder::new("frames")
            .feature("fft", FftExtractor::new(), &[], true)
            .feature("loudness", LoudnessExtractor, &["fft"], false)
            .compile()
            .unwrap();
        let dir = TempDir::new().unwrap();
        let store = FrameStore::open(dir.path().join("frames.redb"), schema, config()).unwrap();
        assert!(!store.column_names().contains(&"loudness".to_string()));
        store.close().unwrap();
    }

    #[test]
    fn append_updates_row_count_and_column_shapes() {
        let dir = TempDir::new().unwrap();
        let mut store = FrameStore::open(
            dir.path().join("frames.redb"),
            fft_loudness_schema(),
            config(),
        )
        .unwrap();
        // 8192 samples, window 4096, step 2048: 3 frames.
        store.append("pattern-0", &tone(8192)).unwrap();
        assert_eq!(store.rows(), 3);
        assert_eq!(store.column_shape("fft").unwrap(), vec![3, 2048]);
        store.close().unwrap();
    }

    #[test]
    fn duplicate_pattern_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = FrameStore::open(
            dir.path().join("frames.redb"),
            fft_loudness_schema(),
            config(),
        )
        .unwrap();
        store.append("pattern-0", &tone(4096)).unwrap();
        let err = store.append("pattern-0", &tone(4096));
        assert!(matches!(
            err,
            Err(crate::error::AudiolithError::Store(
                StoreError::DuplicatePattern { .. }
            ))
        ));
        store.close().unwrap();
    }

    #[test]
    fn buffered_row_groups_are_readable_before_flush() {
        let dir = TempDir::new().unwrap();
        let mut store = FrameStore::open(
            dir.path().join("frames.redb"),
            fft_loudness_schema(),
            config(),
        )
        .unwrap();
        store.append("pattern-0", &tone(4096)).unwrap();
        let group = store.read("pattern-0").unwrap();
        assert_eq!(group.audio.shape(), &[1, 4096]);
        assert_eq!(group.feature("fft").unwrap().shape(), &[1, 2048]);
        store.close().unwrap();
    }

    #[test]
    fn reopen_with_a_different_schema_layout_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frames.redb");
        FrameStore::open(&path, fft_loudness_schema(), config())
            .unwrap()
            .close()
            .unwrap();

        // Structurally different: loudness not stored.
        let other = SchemaBuilder::new("frames")
            .feature("fft", FftExtractor::new(), &[], true)
            .feature("loudness", LoudnessExtractor, &["fft"], false)
            .compile()
            .unwrap();
        let err = FrameStore::open(&path, other, config());
        assert!(matches!(
            err,
            Err(crate::error::AudiolithError::Store(
                StoreError::SchemaMismatch { .. }
            ))
        ));
    }

    #[test]
    fn reopen_with_the_same_layout_preserves_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frames.redb");
        {
            let mut store = FrameStore::open(&path, fft_loudness_schema(), config()).unwrap();
            store.append("pattern-0", &tone(8192)).unwrap();
            store.close().unwrap();
        }
        let store = FrameStore::open(&path, fft_loudness_schema(), config()).unwrap();
        assert_eq!(store.rows(), 3);
        let group = store.read("pattern-0").unwrap();
        assert_eq!(group.feature("fft").unwrap().shape(), &[3, 2048]);
        store.close().unwrap();
    }

    #[test]
    fn reserved_audio_name_is_rejected() {
        struct Null;
        impl crate::feature::Extractor for Null {
            fn dim(&self, _config: &AudioConfig) -> Vec<usize> {
                vec![]
            }
            fn dtype(&self) -> DType {
                DType::F32
            }
        }
        let schema = SchemaBuilder::new("frames")
            .feature("audio", Null, &[], true)
            .compile()
            .unwrap();
        let dir = TempDir::new().unwrap();
        let err = FrameStore::open(dir.path().join("frames.redb"), schema, config());
        assert!(matches!(
            err,
            Err(crate::error::AudiolithError::Store(
                StoreError::SchemaMismatch { .. }
            ))
        ));
    }

    #[test]
    fn index_lookup_sees_buffered_rows() {
        let dir = TempDir::new().unwrap();
        let mut store = FrameStore::open(
            dir.path().join("frames.redb"),
            fft_loudness_schema(),
            config(),
        )
        .unwrap();
        store.append("flushed", &tone(4096)).unwrap();
        store.flush().unwrap();
        let quiet: Vec<f32> = tone(4096).iter().map(|x| x * 0.01).collect();
        store.append("buffered", &quiet).unwrap();

        // The buffered frame is findable by its exact loudness before any
        // flush, alongside the durable one in range queries.
        let buffered_loudness = store
            .read("buffered")
            .unwrap()
            .feature("loudness")
            .unwrap()
            .as_f32()
            .unwrap()[0];
        let value = DimArray::scalar_f32(buffered_loudness);
        assert_eq!(store.find_equal("loudness", &value).unwrap(), vec![1]);

        let lo = DimArray::scalar_f32(0.0);
        let hi = DimArray::scalar_f32(f32::MAX);
        assert_eq!(store.find_range("loudness", &lo, &hi).unwrap(), vec![0, 1]);
        store.close().unwrap();
    }

    #[test]
    fn order_key_preserves_numeric_order() {
        let values = [-10.5f32, -0.0, 0.0, 0.25, 3.0, 1e6];
        let keys: Vec<Vec<u8>> = values
            .iter()
            .map(|&v| order_key(&ArrayData::F32(vec![v])))
            .collect();
        for pair in keys.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }
}
