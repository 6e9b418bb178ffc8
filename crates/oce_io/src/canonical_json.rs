//! Canonical JSON: objects get lexicographically key-sorted, arrays keep
//! caller order, output is compact, LF-terminated. Used everywhere a `Run`
//! artifact is hashed (to mint a `RunId`) or written to disk, so the same
//! logical document always produces the same bytes regardless of map
//! iteration order.

use crate::IoError;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Recursively sort object keys; arrays and scalars pass through unchanged.
pub fn canonicalize_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize_value(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize_value).collect()),
        other => other.clone(),
    }
}

/// Serialize `value`, canonicalize key order, and append a trailing `\n`.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, IoError> {
    let v = serde_json::to_value(value)?;
    let canon = canonicalize_value(&v);
    let mut s = serde_json::to_string(&canon)?;
    s.push('\n');
    Ok(s.into_bytes())
}

/// Write `bytes` to `path` atomically: write to `path.tmp`, fsync, rename
/// over the destination. Creates parent directories as needed.
pub fn write_bytes_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path_for(path);
    {
        let mut f = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(bytes)?;
        if !bytes.ends_with(b"\n") {
            f.write_all(b"\n")?;
        }
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}

/// Serialize, canonicalize, and write `value` to `path` atomically.
pub fn write_canonical_file<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let bytes = to_canonical_bytes(value)?;
    write_bytes_atomically(path, &bytes).map_err(IoError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_sorted_arrays_preserved() {
        let v = json!({ "b": 1, "a": { "y": 1, "x": 2 }, "arr": [3, 1, 2] });
        let canon = canonicalize_value(&v);
        let s = serde_json::to_string(&canon).unwrap();
        assert_eq!(s, r#"{"a":{"x":2,"y":1},"arr":[3,1,2],"b":1}"#);
    }

    #[test]
    fn to_canonical_bytes_ends_with_newline() {
        #[derive(Serialize)]
        struct S {
            b: u8,
            a: u8,
        }
        let bytes = to_canonical_bytes(&S { b: 2, a: 1 }).unwrap();
        assert!(bytes.ends_with(b"\n"));
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\"a\":1,\"b\":2}\n");
    }

    #[test]
    fn atomic_write_then_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_bytes_atomically(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
        assert!(!tmp_path_for(&path).exists());
    }
}
