//! Segments and the object keys they own in deep storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::KillError;

const BUCKET: &str = "bucket";
const KEY: &str = "key";
const DESCRIPTOR_FILE: &str = "descriptor.json";

/// A segment as published by the metadata layer.
///
/// Only the `bucket` and `key` entries of the load spec are read here; the
/// rest is carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub load_spec: Map<String, Value>,
}

impl Segment {
    /// Build a segment stored as a zip at `bucket`/`key`.
    pub fn new(id: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let mut load_spec = Map::new();
        load_spec.insert("type".to_string(), Value::from("s3_zip"));
        load_spec.insert(BUCKET.to_string(), Value::String(bucket.into()));
        load_spec.insert(KEY.to_string(), Value::String(key.into()));
        Self {
            id: id.into(),
            load_spec,
        }
    }

    fn load_spec_str(&self, name: &str) -> Result<&str, KillError> {
        self.load_spec
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| KillError::LoadSpec {
                segment_id: self.id.clone(),
                reason: format!("missing string entry `{name}`"),
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentList {
    Many(Vec<Segment>),
    One(Segment),
}

/// Parse a JSON array of segments, or a single segment object.
pub fn parse_segments(json: &str) -> serde_json::Result<Vec<Segment>> {
    Ok(match serde_json::from_str(json)? {
        SegmentList::Many(segments) => segments,
        SegmentList::One(segment) => vec![segment],
    })
}

/// Everything a segment owns in one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentKeys {
    pub bucket: String,
    pub primary: String,
    /// Legacy metadata sidecar. No longer written, still cleaned up.
    pub descriptor: String,
}

/// Path of the descriptor file that sits next to `path`.
///
/// `a/b/index.zip` becomes `a/b/descriptor.json`. Returns `None` when `path`
/// has no parent directory.
pub fn descriptor_path(path: &str) -> Option<String> {
    let (parent, _) = path.rsplit_once('/')?;
    Some(format!("{parent}/{DESCRIPTOR_FILE}"))
}

/// Resolve the bucket and keys owned by `segment`.
pub fn resolve(segment: &Segment) -> Result<SegmentKeys, KillError> {
    let bucket = segment.load_spec_str(BUCKET)?;
    let primary = segment.load_spec_str(KEY)?;
    let descriptor = descriptor_path(primary).ok_or_else(|| KillError::LoadSpec {
        segment_id: segment.id.clone(),
        reason: format!("bad path [{primary}]"),
    })?;

    Ok(SegmentKeys {
        bucket: bucket.to_string(),
        primary: primary.to_string(),
        descriptor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_path() {
        assert_eq!(
            descriptor_path("druid/wiki/2024-01-01/0/index.zip").as_deref(),
            Some("druid/wiki/2024-01-01/0/descriptor.json")
        );
        assert_eq!(descriptor_path("/index.zip").as_deref(), Some("/descriptor.json"));
        assert_eq!(descriptor_path("index.zip"), None);
    }

    #[test]
    fn test_descriptor_path_is_deterministic() {
        let key = "segments/ds/v1/3/index.zip";
        assert_eq!(descriptor_path(key), descriptor_path(key));
    }

    #[test]
    fn test_resolve() {
        let segment = Segment::new("seg-1", "deep", "ds/2024/0/index.zip");
        let keys = resolve(&segment).unwrap();

        assert_eq!(
            keys,
            SegmentKeys {
                bucket: "deep".to_string(),
                primary: "ds/2024/0/index.zip".to_string(),
                descriptor: "ds/2024/0/descriptor.json".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_missing_bucket() {
        let mut segment = Segment::new("seg-1", "deep", "ds/0/index.zip");
        segment.load_spec.remove("bucket");

        let err = resolve(&segment).unwrap_err();
        assert!(matches!(err, KillError::LoadSpec { ref segment_id, .. } if segment_id == "seg-1"));
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn test_resolve_non_string_key() {
        let mut segment = Segment::new("seg-2", "deep", "ds/0/index.zip");
        segment.load_spec.insert("key".to_string(), Value::from(42));

        assert!(matches!(
            resolve(&segment),
            Err(KillError::LoadSpec { .. })
        ));
    }

    #[test]
    fn test_resolve_key_without_directory() {
        let segment = Segment::new("seg-3", "deep", "index.zip");
        let err = resolve(&segment).unwrap_err();
        assert!(err.to_string().contains("bad path [index.zip]"));
    }

    #[test]
    fn test_parse_segments_accepts_array_or_object() {
        let one = r#"{"id": "a", "loadSpec": {"bucket": "deep", "key": "a/0/index.zip"}}"#;
        let many = format!("[{one}, {}]", one.replace("\"a", "\"b"));

        let parsed = parse_segments(one).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "a");

        let parsed = parse_segments(&many).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].id, "b");

        assert!(parse_segments(r#"{"id": "missing load spec"}"#).is_err());
    }

    #[test]
    fn test_deserialize_from_metadata_json() {
        let json = r#"{
            "id": "wiki_2024-01-01T00:00:00.000Z_2024-01-02T00:00:00.000Z_v1",
            "loadSpec": {"type": "s3_zip", "bucket": "deep", "key": "wiki/v1/0/index.zip", "S3Schema": "s3n"}
        }"#;

        let segment: Segment = serde_json::from_str(json).unwrap();
        let keys = resolve(&segment).unwrap();
        assert_eq!(keys.bucket, "deep");
        assert_eq!(keys.descriptor, "wiki/v1/0/descriptor.json");
        assert_eq!(segment.load_spec["S3Schema"], "s3n");
    }
}
