//! Walks an extracted backup directory and summarizes every collection dump
//! it finds, so the operator can decide what is worth mapping before any
//! import runs.
//!
//! Each `*.bson` file is decoded fully for its record count; the field union
//! and the representative sample come from the first 50 documents only. A
//! file that fails to decode is logged and skipped — one bad collection must
//! never sink the analysis of the rest of the backup.

use crate::bson::{self, Document};
use common::model::analysis::{AnalysisResult, CollectionSummary};
use log::warn;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// How many leading documents feed the field union and the sample.
const SAMPLE_SIZE: usize = 50;

const DUMP_EXTENSION: &str = "bson";

/// Finds the directory that actually holds the dump files.
///
/// Backup tools usually nest the dumps one level down (a directory named
/// after the source database), so the first subdirectory containing `.bson`
/// files wins; otherwise the extraction root itself is used.
pub fn find_dump_dir(extract_root: &Path) -> PathBuf {
    let entries = match fs::read_dir(extract_root) {
        Ok(entries) => entries,
        Err(_) => return extract_root.to_path_buf(),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && dir_has_dumps(&path) {
            return path;
        }
    }

    extract_root.to_path_buf()
}

fn dir_has_dumps(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.path().extension().is_some_and(|ext| ext == DUMP_EXTENSION))
        })
        .unwrap_or(false)
}

/// Decodes every collection dump under `dir` and produces per-collection
/// summaries, largest collections first. Zero-document collections are
/// omitted; per-file decode failures are logged and skipped.
pub fn analyze_backup_directory(dir: &Path, source_system: &str) -> Result<AnalysisResult, String> {
    let entries = fs::read_dir(dir).map_err(|e| format!("cannot read {}: {}", dir.display(), e))?;

    let mut collections: Vec<CollectionSummary> = Vec::new();
    let mut total_records: i64 = 0;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == DUMP_EXTENSION))
        .collect();
    paths.sort();

    for path in paths {
        let name = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };

        let docs = match bson::parse_dump_file(&path) {
            Ok(docs) => docs,
            Err(e) => {
                warn!("skipping collection {}: {}", name, e);
                continue;
            }
        };

        let count = docs.len() as i64;
        total_records += count;
        if docs.is_empty() {
            continue;
        }

        let mut fields: BTreeSet<String> = BTreeSet::new();
        for doc in docs.iter().take(SAMPLE_SIZE) {
            for key in doc.keys() {
                fields.insert(key.to_string());
            }
        }

        collections.push(CollectionSummary {
            name,
            count,
            fields: fields.into_iter().collect(),
            sample_data: docs.first().map(Document::to_json),
        });
    }

    collections.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(AnalysisResult {
        source_type: "mongodb".to_string(),
        source_system: source_system.to_string(),
        total_collections: collections.len() as i64,
        total_records,
        collections,
    })
}

/// Decodes one collection, optionally truncated to `limit` documents. Used
/// by the preview endpoint and by every import pass.
pub fn collection_documents(
    dir: &Path,
    collection: &str,
    limit: Option<usize>,
) -> Result<Vec<Document>, String> {
    let path = dir.join(format!("{}.{}", collection, DUMP_EXTENSION));
    if !path.exists() {
        return Err(format!("Collection {} not found", collection));
    }

    let mut docs = bson::parse_dump_file(&path)?;
    if let Some(limit) = limit {
        docs.truncate(limit);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    // Minimal single-field document: {"n": <int32>}
    fn tiny_doc(value: i32) -> Vec<u8> {
        let mut body = vec![0x10];
        body.extend_from_slice(b"n\x00");
        body.extend_from_slice(&value.to_le_bytes());
        let mut out = ((body.len() + 5) as i32).to_le_bytes().to_vec();
        out.extend_from_slice(&body);
        out.push(0x00);
        out
    }

    fn dump_with(dir: &Path, name: &str, docs: usize) {
        let mut buf = Vec::new();
        for i in 0..docs {
            buf.extend_from_slice(&tiny_doc(i as i32));
        }
        fs::write(dir.join(format!("{}.bson", name)), buf).unwrap();
    }

    #[test]
    fn orders_collections_by_descending_count_and_omits_empty_ones() {
        let dir = tempdir().unwrap();
        dump_with(dir.path(), "DtoVenda", 120);
        dump_with(dir.path(), "DtoVazia", 0);
        dump_with(dir.path(), "DtoCase", 5);

        let analysis = analyze_backup_directory(dir.path(), "Sistema Legado").unwrap();
        let names: Vec<&str> = analysis.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["DtoVenda", "DtoCase"]);
        assert_eq!(analysis.total_collections, 2);
        assert_eq!(analysis.total_records, 125);
        assert_eq!(analysis.collections[0].fields, vec!["n".to_string()]);
        assert!(analysis.collections[0].sample_data.is_some());
    }

    #[test]
    fn corrupt_collection_does_not_fail_the_analysis() {
        let dir = tempdir().unwrap();
        dump_with(dir.path(), "DtoPessoa", 3);
        // not even a length prefix worth of garbage
        fs::write(dir.path().join("DtoQuebrado.bson"), [0xff, 0x00]).unwrap();

        let analysis = analyze_backup_directory(dir.path(), "x").unwrap();
        // the garbage file decodes to zero documents and is simply omitted
        let names: Vec<&str> = analysis.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["DtoPessoa"]);
    }

    #[test]
    fn ignores_files_without_the_dump_extension() {
        let dir = tempdir().unwrap();
        dump_with(dir.path(), "DtoProduto", 2);
        fs::write(dir.path().join("metadata.json"), b"{}").unwrap();

        let analysis = analyze_backup_directory(dir.path(), "x").unwrap();
        assert_eq!(analysis.total_collections, 1);
    }

    #[test]
    fn finds_nested_dump_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("loja_legado");
        fs::create_dir(&nested).unwrap();
        dump_with(&nested, "DtoPessoa", 1);

        assert_eq!(find_dump_dir(dir.path()), nested);

        // with dumps at the root, the root wins
        let flat = tempdir().unwrap();
        dump_with(flat.path(), "DtoPessoa", 1);
        assert_eq!(find_dump_dir(flat.path()), flat.path());
    }

    #[test]
    fn preview_respects_the_limit() {
        let dir = tempdir().unwrap();
        dump_with(dir.path(), "DtoVenda", 30);

        let docs = collection_documents(dir.path(), "DtoVenda", Some(10)).unwrap();
        assert_eq!(docs.len(), 10);
        let all = collection_documents(dir.path(), "DtoVenda", None).unwrap();
        assert_eq!(all.len(), 30);

        assert!(collection_documents(dir.path(), "DtoSumida", None).is_err());
    }
}
