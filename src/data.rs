use rkyv::{Archive, Deserialize, Serialize};

/// Row layout of the archived link table.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    pub key: String,
    pub link: String,
    pub description: String,
}

#[derive(Archive, Serialize, Deserialize, Debug, Default)]
pub struct LinkTable {
    pub rows: Vec<LinkRow>,
}

/// Case folding shared by the build-time index, exact lookup and search.
///
/// `str::to_lowercase` applies the Unicode default case mapping, which does
/// not depend on the process locale.
pub fn fold_key(value: &str) -> String {
    value.to_lowercase()
}
