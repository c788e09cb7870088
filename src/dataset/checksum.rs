use sha2::{Digest, Sha256};

use super::frame::Dataset;

/// sha256 over a canonical rendering: header line of `name:type`, then one
/// line per row with type-tagged cells, so `Int(1)` and `Text("1")` differ.
pub(crate) fn fingerprint(dataset: &Dataset) -> String {
    let mut hasher = Sha256::new();

    let header: Vec<String> = dataset
        .columns()
        .iter()
        .map(|c| format!("{}:{}", c.name(), c.dtype()))
        .collect();
    hasher.update(header.join("\x1f").as_bytes());
    hasher.update(b"\n");

    for row in 0..dataset.row_count() {
        for column in dataset.columns() {
            if let Some(value) = column.get(row) {
                let tag = value.data_type().map(|t| t.as_str()).unwrap_or("null");
                hasher.update(tag.as_bytes());
                hasher.update(b"=");
                hasher.update(value.to_string().as_bytes());
                hasher.update(b"\x1f");
            }
        }
        hasher.update(b"\n");
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    #[test]
    fn test_type_tag_distinguishes_values() {
        let ints = Dataset::from_rows(&["a"], vec![vec![Value::Int(1)]]).unwrap();
        let text = Dataset::from_rows(&["a"], vec![vec![Value::text("1")]]).unwrap();
        assert_ne!(fingerprint(&ints), fingerprint(&text));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let ds = Dataset::from_rows(&["a"], vec![vec![Value::Int(1)]]).unwrap();
        let fp = fingerprint(&ds);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
