mod data;
pub mod error;
pub mod navigation;
pub mod preview;
#[cfg(feature = "web")]
pub mod web;

pub use data::fold_key;
pub use error::{Error, Result};
pub use navigation::{
    ASSETS_PREFIX, BrowserEffects, Effect, NavigationState, Navigator, PageLoadOutcome,
    RecordingEffects,
};
pub use preview::{Preview, PreviewEncoder, PreviewError, PreviewImage, QrSvgEncoder};

use data::{LinkRow, LinkTable};
use fst::Map;
use once_cell::sync::Lazy;
use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use zstd::stream::decode_all;

static LINKS_FST_BYTES: &[u8] = include_bytes!(env!("LINKS_FST"));
static LINKS_DATA_BYTES: &[u8] = include_bytes!(env!("LINKS_DATA"));

static EMBEDDED_STORE: Lazy<RecordStore> = Lazy::new(|| {
    let decompressed = decode_all(Cursor::new(LINKS_DATA_BYTES)).expect("decompress link table");
    let mut aligned = AlignedVec::<16>::with_capacity(decompressed.len());
    aligned.extend_from_slice(&decompressed);
    let table = rkyv::from_bytes::<LinkTable, RkyvError>(&aligned).expect("valid link table");
    let index = Map::new(LINKS_FST_BYTES.to_vec()).expect("valid link fst");
    RecordStore {
        records: table.rows.into_iter().map(Record::from).collect(),
        index,
    }
});

/// One immutable `(key, link, description)` entry of the link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "nama")]
    key: String,
    link: String,
    #[serde(alias = "deskripsi", default)]
    description: String,
}

impl Record {
    pub fn new(
        key: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            link: link.into(),
            description: description.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Target URL exactly as stored; never validated or normalized.
    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<LinkRow> for Record {
    fn from(row: LinkRow) -> Self {
        Self {
            key: row.key,
            link: row.link,
            description: row.description,
        }
    }
}

/// Ordered, read-only link table with a folded-key index for exact lookups.
pub struct RecordStore {
    records: Vec<Record>,
    index: Map<Vec<u8>>,
}

impl RecordStore {
    /// The table compiled into the binary from `data/links.jsonl`.
    pub fn embedded() -> &'static RecordStore {
        &EMBEDDED_STORE
    }

    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let mut first_by_key: BTreeMap<String, u64> = BTreeMap::new();
        for (idx, record) in records.iter().enumerate() {
            first_by_key
                .entry(fold_key(&record.key))
                .or_insert(idx as u64);
        }
        let index = Map::from_iter(first_by_key)?;
        Ok(Self { records, index })
    }

    /// Reads one JSON record per line; blank lines are skipped.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::DataFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut records = Vec::new();
        for (idx, line_res) in BufReader::new(file).lines().enumerate() {
            let line = line_res.map_err(|source| Error::DataFile {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| Error::DataFormat {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })?;
            records.push(record);
        }
        Self::from_records(records)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the first record, in table order, whose key equals `key`
    /// ignoring case.
    pub fn find_exact(&self, key: &str) -> Option<&Record> {
        self.index
            .get(fold_key(key))
            .and_then(|idx| self.records.get(idx as usize))
    }

    /// Returns every record whose key or description contains `query`
    /// ignoring case, in table order.
    ///
    /// A query that is empty after trimming is "not searched" and yields
    /// nothing. Containment itself uses the untrimmed query.
    pub fn search(&self, query: &str) -> Vec<&Record> {
        if is_blank_query(query) {
            return Vec::new();
        }
        let needle = fold_key(query);
        self.records
            .iter()
            .filter(|record| {
                fold_key(&record.key).contains(&needle)
                    || fold_key(&record.description).contains(&needle)
            })
            .collect()
    }
}

pub fn is_blank_query(query: &str) -> bool {
    query.trim().is_empty()
}
