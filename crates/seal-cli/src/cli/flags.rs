//! `key=value` flag parsing.

use std::collections::BTreeMap;

use anyhow::bail;

pub const PLUGIN_CONFIG_FLAG: &str = "--plugin-config";
pub const USER_METADATA_FLAG: &str = "--user-metadata";

/// Parse repeated `key=value` flag values into a map.
///
/// Values may contain `=`; the first one separates the key. Duplicate keys
/// are rejected.
pub fn parse_flag_map(values: &[String], flag_name: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for value in values {
        let Some((key, val)) = value.trim().split_once('=') else {
            bail!(
                "could not parse flag {}: key-value pair requires \"=\" as separator",
                flag_name
            );
        };
        if map.contains_key(key) {
            bail!("could not parse flag {}: key {:?} duplicates", flag_name, key);
        }
        map.insert(key.to_string(), val.to_string());
    }
    Ok(map)
}
