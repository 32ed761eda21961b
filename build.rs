use std::collections::BTreeMap;
use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use fst::MapBuilder;
use rkyv::{rancor::Error as RkyvError, to_bytes};
use serde::Deserialize;
use zstd::bulk::compress as zstd_compress;

#[path = "src/data.rs"]
mod data_model;
use data_model::{LinkRow, LinkTable, fold_key};

const ARCHIVE_COMPRESSION_LEVEL: i32 = 4;

#[derive(Deserialize)]
struct LinkJson {
    #[serde(alias = "nama")]
    key: String,
    link: String,
    #[serde(alias = "deskripsi", default)]
    description: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    println!(
        "cargo:rerun-if-changed={}",
        manifest_dir.join("assets").display()
    );

    let rows = load_links(&manifest_dir)?;
    build_fst(&rows, &out_dir)?;
    build_table(rows, &out_dir)?;
    Ok(())
}

fn load_links(manifest_dir: &Path) -> Result<Vec<LinkRow>, Box<dyn Error>> {
    let links_file = manifest_dir.join("data/links.jsonl");
    println!("cargo:rerun-if-changed={}", links_file.display());
    if !links_file.exists() {
        panic!("Missing {}.", links_file.display());
    }
    let file = BufReader::new(File::open(&links_file)?);
    let mut rows = Vec::new();
    for (idx, line_res) in file.lines().enumerate() {
        let line = line_res?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: LinkJson = serde_json::from_str(&line)
            .map_err(|err| format!("Invalid link record on line {}: {err}", idx + 1))?;
        rows.push(LinkRow {
            key: parsed.key,
            link: parsed.link,
            description: parsed.description,
        });
    }
    Ok(rows)
}

fn build_fst(rows: &[LinkRow], out_dir: &Path) -> Result<(), Box<dyn Error>> {
    // Keys are unique only by convention; the first row in table order keeps the slot.
    let mut first_by_key: BTreeMap<String, u64> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        let folded = fold_key(&row.key);
        if first_by_key.contains_key(&folded) {
            println!(
                "cargo:warning=duplicate link key {:?} on row {}; the earlier row wins",
                row.key,
                idx + 1
            );
            continue;
        }
        first_by_key.insert(folded, idx as u64);
    }

    let fst_path = out_dir.join("links.fst");
    let writer = BufWriter::new(File::create(&fst_path)?);
    let mut builder = MapBuilder::new(writer)?;
    for (key, idx) in &first_by_key {
        builder.insert(key, *idx)?;
    }
    builder.finish()?;
    println!("cargo:rustc-env=LINKS_FST={}", fst_path.display());
    Ok(())
}

fn build_table(rows: Vec<LinkRow>, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let table = LinkTable { rows };
    let bytes = to_bytes::<RkyvError>(&table).expect("serialize link table with rkyv");
    let compressed = zstd_compress(&bytes, ARCHIVE_COMPRESSION_LEVEL)
        .expect("compress archived link table with zstd");

    let data_path = out_dir.join("links.bin.zst");
    fs::write(&data_path, compressed)?;
    println!("cargo:rustc-env=LINKS_DATA={}", data_path.display());
    Ok(())
}
