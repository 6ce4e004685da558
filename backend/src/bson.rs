//! Byte-by-byte decoder for the binary collection dumps found inside a
//! vendor backup archive.
//!
//! The format is self-describing: a dump file is a plain concatenation of
//! documents, each one prefixed with its own little-endian 4-byte length and
//! terminated by a NUL byte. Elements inside a document carry a type tag, a
//! NUL-terminated key and a tag-dependent payload. No schema is needed to
//! read it, which is exactly why the analyzer can propose mappings for
//! collections nobody documented.
//!
//! The decoder is deliberately total: every read is bounds-checked and any
//! structural problem (truncated trailing bytes, a corrupt length, an
//! unknown type tag) ends the current document or stream gracefully instead
//! of returning an error. Callers always get back the documents that were
//! fully contained in the buffer.
//!
//! Large binary payloads, internal timestamps and 128-bit decimals are not
//! materialized; they decode to sentinel values that render as `<binary>`,
//! `<timestamp>` and `<decimal128>`.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// A single decoded value. Exhaustive over every tag the dumps are known to
/// contain; anything else lands in `Unknown` with the raw tag byte.
#[derive(Debug, Clone, PartialEq)]
pub enum BsonValue {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<BsonValue>),
    /// Opaque binary payload, skipped over and not materialized.
    Binary,
    /// 12-byte object reference, rendered as a lowercase hex string.
    ObjectId(String),
    Bool(bool),
    /// Epoch-millis datetime, already rendered to an ISO-8601 string, or a
    /// `timestamp:<n>` fallback when out of representable range.
    DateTime(String),
    Null,
    Int32(i32),
    Int64(i64),
    /// Internal replication timestamp, skipped over.
    Timestamp,
    /// 128-bit decimal, skipped over.
    Decimal128,
    /// Unrecognized type tag. The element width is unknowable, so decoding
    /// of the enclosing document stops after recording this value.
    Unknown(u8),
}

impl BsonValue {
    /// Numeric view used by the importer for amount fields.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BsonValue::Double(v) => Some(*v),
            BsonValue::Int32(v) => Some(*v as f64),
            BsonValue::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BsonValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// True for values the decoder intentionally does not materialize.
    pub fn is_elided(&self) -> bool {
        matches!(
            self,
            BsonValue::Binary | BsonValue::Timestamp | BsonValue::Decimal128 | BsonValue::Unknown(_)
        )
    }

    /// JSON rendering used for analysis samples, previews and log payloads.
    /// Elided values keep their sentinel spelling so an operator can tell
    /// what was in the source.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            BsonValue::Double(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            BsonValue::String(s) => serde_json::Value::String(s.clone()),
            BsonValue::Document(doc) => doc.to_json(),
            BsonValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(BsonValue::to_json).collect())
            }
            BsonValue::Binary => serde_json::Value::String("<binary>".to_string()),
            BsonValue::ObjectId(hex) => serde_json::Value::String(hex.clone()),
            BsonValue::Bool(v) => serde_json::Value::Bool(*v),
            BsonValue::DateTime(s) => serde_json::Value::String(s.clone()),
            BsonValue::Null => serde_json::Value::Null,
            BsonValue::Int32(v) => serde_json::Value::Number((*v).into()),
            BsonValue::Int64(v) => serde_json::Value::Number((*v).into()),
            BsonValue::Timestamp => serde_json::Value::String("<timestamp>".to_string()),
            BsonValue::Decimal128 => serde_json::Value::String("<decimal128>".to_string()),
            BsonValue::Unknown(tag) => serde_json::Value::String(format!("<type:{:x}>", tag)),
        }
    }
}

/// One decoded document: field name -> value, in the order the fields appear
/// in the dump. Insertion order matters because arrays are encoded as
/// documents keyed "0", "1", ... and are re-sequenced from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, BsonValue)>,
}

impl Document {
    pub fn push(&mut self, key: String, value: BsonValue) {
        self.fields.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&BsonValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_values(self) -> Vec<BsonValue> {
        self.fields.into_iter().map(|(_, v)| v).collect()
    }

    /// The record's original identifier, if present. Object references come
    /// back as their hex string form.
    pub fn source_id(&self) -> Option<String> {
        match self.get("_id") {
            Some(BsonValue::ObjectId(hex)) => Some(hex.clone()),
            Some(BsonValue::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_json().to_string()),
            None => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

fn read_i32(data: &[u8], offset: usize) -> Option<i32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(i32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_i64(data: &[u8], offset: usize) -> Option<i64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(i64::from_le_bytes(bytes.try_into().ok()?))
}

fn read_f64(data: &[u8], offset: usize) -> Option<f64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(f64::from_le_bytes(bytes.try_into().ok()?))
}

/// Epoch millis to ISO-8601, or `timestamp:<n>` when the value does not fit
/// in a calendar date.
fn datetime_string(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => format!("timestamp:{}", millis),
    }
}

/// Decodes one element at `offset`: type tag, NUL-terminated key, payload.
///
/// Returns the key, the value and the offset of the next element, or `None`
/// when the bytes are truncated mid-element. A `None` next-offset means the
/// value was recorded but scanning cannot continue (unknown tag width).
fn decode_element(data: &[u8], mut offset: usize) -> Option<(String, BsonValue, Option<usize>)> {
    let tag = *data.get(offset)?;
    offset += 1;

    let key_len = data.get(offset..)?.iter().position(|&b| b == 0)?;
    let key = String::from_utf8_lossy(&data[offset..offset + key_len]).into_owned();
    offset += key_len + 1;

    let (value, next) = match tag {
        0x01 => (BsonValue::Double(read_f64(data, offset)?), offset + 8),
        0x02 => {
            // Length includes the trailing NUL, which is trimmed.
            let len = read_i32(data, offset)?;
            if len < 1 {
                return None;
            }
            let len = len as usize;
            let end = offset + 4 + len;
            if end > data.len() {
                return None;
            }
            let text = String::from_utf8_lossy(&data[offset + 4..end - 1]).into_owned();
            (BsonValue::String(text), end)
        }
        0x03 => {
            let (doc, next) = decode_document(data, offset)?;
            (BsonValue::Document(doc), next)
        }
        0x04 => {
            // Arrays are documents keyed "0", "1", ... re-sequenced into an
            // ordered list.
            let (doc, next) = decode_document(data, offset)?;
            (BsonValue::Array(doc.into_values()), next)
        }
        0x05 => {
            let len = read_i32(data, offset)?;
            if len < 0 {
                return None;
            }
            // 4-byte length + 1 subtype byte + payload, all skipped.
            let end = offset + 5 + len as usize;
            if end > data.len() {
                return None;
            }
            (BsonValue::Binary, end)
        }
        0x07 => {
            let bytes = data.get(offset..offset + 12)?;
            (BsonValue::ObjectId(hex::encode(bytes)), offset + 12)
        }
        0x08 => {
            let byte = *data.get(offset)?;
            (BsonValue::Bool(byte != 0), offset + 1)
        }
        0x09 => (
            BsonValue::DateTime(datetime_string(read_i64(data, offset)?)),
            offset + 8,
        ),
        0x0A => (BsonValue::Null, offset),
        0x10 => (BsonValue::Int32(read_i32(data, offset)?), offset + 4),
        0x11 => {
            data.get(offset..offset + 8)?;
            (BsonValue::Timestamp, offset + 8)
        }
        0x12 => (BsonValue::Int64(read_i64(data, offset)?), offset + 8),
        0x13 => {
            data.get(offset..offset + 16)?;
            (BsonValue::Decimal128, offset + 16)
        }
        other => return Some((key, BsonValue::Unknown(other), None)),
    };

    Some((key, value, Some(next)))
}

/// Decodes the document starting at `start`.
///
/// Reads the 4-byte length prefix and walks the element records up to the
/// terminator byte. Returns the document and the offset just past it, or
/// `None` when the length prefix is missing, nonsensical (`<= 4`) or runs
/// past the end of the buffer — truncated trailing bytes are end-of-stream,
/// not an error.
pub fn decode_document(data: &[u8], start: usize) -> Option<(Document, usize)> {
    if start + 4 > data.len() {
        return None;
    }
    let len = read_i32(data, start)?;
    if len <= 4 {
        return None;
    }
    let len = len as usize;
    if start + len > data.len() {
        return None;
    }

    let mut doc = Document::default();
    let end = start + len - 1; // final byte is the document terminator
    let mut offset = start + 4;

    while offset < end {
        match decode_element(data, offset) {
            Some((key, value, Some(next))) => {
                doc.push(key, value);
                offset = next;
            }
            Some((key, value, None)) => {
                // Unknown tag: keep what we saw, stop scanning this document.
                doc.push(key, value);
                break;
            }
            None => break,
        }
    }

    Some((doc, start + len))
}

/// Decodes a whole dump buffer: zero or more self-delimited documents, no
/// outer framing. Stops when the remaining bytes cannot hold another length
/// prefix or when a decode attempt makes no forward progress.
pub fn decode_stream(data: &[u8]) -> Vec<Document> {
    let mut docs = Vec::new();
    let mut offset = 0;

    while offset + 4 <= data.len() {
        match decode_document(data, offset) {
            Some((doc, next)) if next > offset => {
                docs.push(doc);
                offset = next;
            }
            _ => break,
        }
    }

    docs
}

/// Reads and decodes one collection dump file. An empty file is an empty
/// collection, not an error.
pub fn parse_dump_file(path: &Path) -> Result<Vec<Document>, String> {
    let data = fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(decode_stream(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hand-rolled element encoders. There is no production encoder; these
    // exist only to build fixtures.

    fn doc_bytes(elements: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = elements.concat();
        let len = (body.len() + 5) as i32;
        let mut out = len.to_le_bytes().to_vec();
        out.extend_from_slice(&body);
        out.push(0x00);
        out
    }

    fn elem(tag: u8, key: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(key.as_bytes());
        out.push(0x00);
        out.extend_from_slice(payload);
        out
    }

    fn elem_string(key: &str, value: &str) -> Vec<u8> {
        let mut payload = ((value.len() + 1) as i32).to_le_bytes().to_vec();
        payload.extend_from_slice(value.as_bytes());
        payload.push(0x00);
        elem(0x02, key, &payload)
    }

    fn elem_i32(key: &str, value: i32) -> Vec<u8> {
        elem(0x10, key, &value.to_le_bytes())
    }

    fn elem_i64(key: &str, value: i64) -> Vec<u8> {
        elem(0x12, key, &value.to_le_bytes())
    }

    fn elem_f64(key: &str, value: f64) -> Vec<u8> {
        elem(0x01, key, &value.to_le_bytes())
    }

    fn elem_bool(key: &str, value: bool) -> Vec<u8> {
        elem(0x08, key, &[value as u8])
    }

    fn elem_datetime(key: &str, millis: i64) -> Vec<u8> {
        elem(0x09, key, &millis.to_le_bytes())
    }

    #[test]
    fn decodes_scalar_fields_in_order() {
        let buf = doc_bytes(&[
            elem_string("Nome", "Oficina Central"),
            elem_i32("Codigo", 42),
            elem_f64("PrecoVenda", 19.9),
            elem_bool("Ativo", true),
            elem(0x0A, "Observacoes", &[]),
            elem_i64("Contador", 7_000_000_000),
        ]);

        let docs = decode_stream(&buf);
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(
            keys,
            ["Nome", "Codigo", "PrecoVenda", "Ativo", "Observacoes", "Contador"]
        );
        assert_eq!(doc.get("Nome"), Some(&BsonValue::String("Oficina Central".into())));
        assert_eq!(doc.get("Codigo"), Some(&BsonValue::Int32(42)));
        assert_eq!(doc.get("PrecoVenda"), Some(&BsonValue::Double(19.9)));
        assert_eq!(doc.get("Ativo"), Some(&BsonValue::Bool(true)));
        assert_eq!(doc.get("Observacoes"), Some(&BsonValue::Null));
        assert_eq!(doc.get("Contador"), Some(&BsonValue::Int64(7_000_000_000)));
    }

    #[test]
    fn decodes_nested_document_and_array() {
        let inner = doc_bytes(&[elem_string("Cidade", "Lisboa")]);
        let arr = doc_bytes(&[
            elem_string("0", "primeiro"),
            elem_string("1", "segundo"),
            elem_string("2", "terceiro"),
        ]);
        let buf = doc_bytes(&[elem(0x03, "Endereco", &inner), elem(0x04, "Tags", &arr)]);

        let docs = decode_stream(&buf);
        assert_eq!(docs.len(), 1);
        match docs[0].get("Endereco") {
            Some(BsonValue::Document(doc)) => {
                assert_eq!(doc.get("Cidade"), Some(&BsonValue::String("Lisboa".into())));
            }
            other => panic!("expected nested document, got {:?}", other),
        }
        // array order must come from insertion order, not key sorting
        assert_eq!(
            docs[0].get("Tags"),
            Some(&BsonValue::Array(vec![
                BsonValue::String("primeiro".into()),
                BsonValue::String("segundo".into()),
                BsonValue::String("terceiro".into()),
            ]))
        );
    }

    #[test]
    fn renders_object_reference_as_hex() {
        let oid: [u8; 12] = [
            0x5f, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e, 0x6f, 0x70, 0x81, 0x92, 0xa3, 0xb4,
        ];
        let buf = doc_bytes(&[elem(0x07, "_id", &oid)]);
        let docs = decode_stream(&buf);
        assert_eq!(
            docs[0].get("_id"),
            Some(&BsonValue::ObjectId("5f1a2b3c4d5e6f708192a3b4".into()))
        );
        assert_eq!(docs[0].source_id().as_deref(), Some("5f1a2b3c4d5e6f708192a3b4"));
    }

    #[test]
    fn renders_datetime_as_iso_string() {
        let buf = doc_bytes(&[elem_datetime("DataCadastro", 1_577_836_800_000)]);
        let docs = decode_stream(&buf);
        assert_eq!(
            docs[0].get("DataCadastro"),
            Some(&BsonValue::DateTime("2020-01-01T00:00:00.000Z".into()))
        );
    }

    #[test]
    fn datetime_out_of_range_falls_back_to_raw_counter() {
        let buf = doc_bytes(&[elem_datetime("Data", i64::MAX)]);
        let docs = decode_stream(&buf);
        assert_eq!(
            docs[0].get("Data"),
            Some(&BsonValue::DateTime(format!("timestamp:{}", i64::MAX)))
        );
    }

    #[test]
    fn elides_binary_timestamp_and_decimal() {
        let mut bin_payload = 3i32.to_le_bytes().to_vec();
        bin_payload.push(0x00); // subtype
        bin_payload.extend_from_slice(&[0xde, 0xad, 0xbe]);

        let buf = doc_bytes(&[
            elem(0x05, "Foto", &bin_payload),
            elem(0x11, "Sync", &[0u8; 8]),
            elem(0x13, "Saldo", &[0u8; 16]),
            elem_string("Nome", "ainda legivel"),
        ]);

        let docs = decode_stream(&buf);
        assert_eq!(docs[0].get("Foto"), Some(&BsonValue::Binary));
        assert_eq!(docs[0].get("Sync"), Some(&BsonValue::Timestamp));
        assert_eq!(docs[0].get("Saldo"), Some(&BsonValue::Decimal128));
        // elision must not derail the fields after it
        assert_eq!(docs[0].get("Nome"), Some(&BsonValue::String("ainda legivel".into())));
        assert!(docs[0].get("Foto").unwrap().is_elided());
    }

    #[test]
    fn unknown_tag_is_recorded_and_stops_the_document() {
        let buf = doc_bytes(&[
            elem_string("Nome", "ok"),
            elem(0x7f, "Misterio", &[0x01, 0x02]),
            elem_string("Depois", "nunca lido"),
        ]);

        let docs = decode_stream(&buf);
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.get("Nome"), Some(&BsonValue::String("ok".into())));
        assert_eq!(doc.get("Misterio"), Some(&BsonValue::Unknown(0x7f)));
        // width of the unknown payload is unknowable, so the scan stopped
        assert!(doc.get("Depois").is_none());
        assert_eq!(
            doc.get("Misterio").unwrap().to_json(),
            serde_json::Value::String("<type:7f>".into())
        );
    }

    #[test]
    fn truncated_stream_keeps_complete_documents() {
        let first = doc_bytes(&[elem_i32("a", 1)]);
        let second = doc_bytes(&[elem_i32("b", 2)]);
        let mut buf = first.clone();
        buf.extend_from_slice(&second);
        // chop the second document in half
        buf.truncate(first.len() + second.len() / 2);

        let docs = decode_stream(&buf);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("a"), Some(&BsonValue::Int32(1)));
    }

    #[test]
    fn decoding_twice_yields_identical_output() {
        let mut buf = doc_bytes(&[elem_string("x", "um")]);
        buf.extend_from_slice(&doc_bytes(&[elem_i32("y", 2)]));
        buf.extend_from_slice(&[0x03, 0x00]); // trailing garbage too short for a prefix

        let once = decode_stream(&buf);
        let twice = decode_stream(&buf);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn rejects_nonsense_length_prefixes() {
        // declared length <= 4
        let buf = 3i32.to_le_bytes().to_vec();
        assert!(decode_stream(&buf).is_empty());

        // declared length larger than the buffer
        let buf = 1000i32.to_le_bytes().to_vec();
        assert!(decode_stream(&buf).is_empty());

        assert!(decode_stream(&[]).is_empty());
    }

    #[test]
    fn string_length_includes_trimmed_nul() {
        let buf = doc_bytes(&[elem_string("s", "abc")]);
        let docs = decode_stream(&buf);
        assert_eq!(docs[0].get("s"), Some(&BsonValue::String("abc".into())));
    }
}
