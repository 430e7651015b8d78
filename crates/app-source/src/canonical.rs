/// Rewrite every snake_case object key in the payload to camelCase, in
/// place. The object-store backend serves snake_case JSON while the feed is
/// camelCase; both must leave the source in one canonical shape.
///
/// Values are never touched: account ids, hashes, and base64 payloads pass
/// through untouched, as do keys that are already camelCase.
pub fn canonicalize_keys(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            let entries: Vec<(String, serde_json::Value)> = std::mem::take(map)
                .into_iter()
                .map(|(key, mut val)| {
                    canonicalize_keys(&mut val);
                    (snake_to_camel(&key), val)
                })
                .collect();
            map.extend(entries);
        }
        serde_json::Value::Array(values) => {
            for element in values.iter_mut() {
                canonicalize_keys(element)
            }
        }
        _ => {}
    }
}

fn snake_to_camel(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_nested_snake_case_keys() {
        let mut value = serde_json::json!({
            "prev_hash": "h",
            "timestamp_nanosec": "1",
            "chunks": [{"chunk_hash": "c", "shard_id": 0}],
            "receipt": {"Action": {"output_data_receivers": [{"data_id": "d"}]}}
        });
        canonicalize_keys(&mut value);
        assert_eq!(
            value,
            serde_json::json!({
                "prevHash": "h",
                "timestampNanosec": "1",
                "chunks": [{"chunkHash": "c", "shardId": 0}],
                "receipt": {"Action": {"outputDataReceivers": [{"dataId": "d"}]}}
            })
        );
    }

    #[test]
    fn leaves_values_and_camel_case_keys_alone() {
        let mut value = serde_json::json!({
            "receiptId": "abc_def",
            "predecessorId": "my_account.near"
        });
        let expected = value.clone();
        canonicalize_keys(&mut value);
        assert_eq!(value, expected);
    }

    #[test]
    fn converts_variant_keys_untouched() {
        // Enum variant keys are PascalCase with no underscores.
        assert_eq!(snake_to_camel("SuccessValue"), "SuccessValue");
        assert_eq!(snake_to_camel("gas_burnt"), "gasBurnt");
    }
}
