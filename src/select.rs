// merakictl - CLI for the Meraki Dashboard API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Client-side filtering, sorting and partial-update helpers applied to
//! Dashboard responses before they are rendered or sent back.

use crate::types::{DeviceModel, ProductType};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

pub fn bool_field(item: &Value, key: &str) -> bool {
    item.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

pub fn string_list(item: &Value, key: &str) -> Vec<String> {
    match item.get(key) {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        // Older endpoints return tags as one space separated string.
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

pub fn tags(item: &Value) -> Vec<String> {
    string_list(item, "tags")
}

pub fn filter_by_product_type(networks: Vec<Value>, product: ProductType) -> Vec<Value> {
    networks
        .into_iter()
        .filter(|net| has_product_type(net, product))
        .collect()
}

pub fn has_product_type(network: &Value, product: ProductType) -> bool {
    string_list(network, "productTypes")
        .iter()
        .any(|p| p == product.as_str())
}

pub fn filter_by_model(devices: Vec<Value>, model: DeviceModel) -> Vec<Value> {
    devices
        .into_iter()
        .filter(|dev| is_model(dev, model))
        .collect()
}

pub fn is_model(device: &Value, model: DeviceModel) -> bool {
    str_field(device, "model").contains(model.as_str())
}

pub fn has_any_tag(item: &Value, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return false;
    }
    let tags = tags(item);
    wanted.iter().any(|w| tags.contains(w))
}

pub fn without_tags(items: Vec<Value>, ignored: &[String]) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| !has_any_tag(item, ignored))
        .collect()
}

/// Substring match; a missing needle matches everything.
pub fn matches_text(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|n| haystack.contains(n))
}

/// Stable sort on `key`. Missing keys order first; ties keep input order
/// in both directions.
pub fn sort_by_key(items: &mut [Value], key: &str, reverse: bool) {
    items.sort_by(|a, b| {
        let ord = compare_values(a.get(key), b.get(key));
        if reverse { ord.reverse() } else { ord }
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    Added(String),
    Removed(String),
}

/// Apply additions then removals, keeping the existing order and never
/// duplicating a tag.
pub fn apply_tag_changes(
    current: &[String],
    add: &[String],
    remove: &[String],
) -> (Vec<String>, Vec<TagChange>) {
    let mut tags = current.to_vec();
    let mut changes = Vec::new();

    for tag in add {
        if !tags.contains(tag) {
            tags.push(tag.clone());
            changes.push(TagChange::Added(tag.clone()));
        }
    }
    for tag in remove {
        if let Some(idx) = tags.iter().position(|t| t == tag) {
            tags.remove(idx);
            changes.push(TagChange::Removed(tag.clone()));
        }
    }

    (tags, changes)
}

/// Build a partial update containing only the provided fields whose value
/// differs from `current`.
pub fn changed_fields(current: &Value, desired: Vec<(&str, Option<Value>)>) -> Map<String, Value> {
    let mut update = Map::new();
    for (key, value) in desired {
        if let Some(value) = value
            && current.get(key) != Some(&value)
        {
            update.insert(key.to_string(), value);
        }
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(items: &[Value]) -> Vec<&str> {
        items.iter().map(|i| str_field(i, "name")).collect()
    }

    fn network_fixture() -> Vec<Value> {
        vec![
            json!({"name": "HQ", "productTypes": ["appliance", "switch", "wireless"]}),
            json!({"name": "Warehouse", "productTypes": ["wireless"]}),
            json!({"name": "Cameras", "productTypes": ["camera"]}),
            json!({"name": "Broken"}),
        ]
    }

    fn device_fixture() -> Vec<Value> {
        vec![
            json!({"name": "core-sw", "model": "MS425-32", "tags": ["core"]}),
            json!({"name": "lobby-ap", "model": "MR46", "tags": ["lobby", "guest"]}),
            json!({"name": "edge", "model": "MX68", "tags": []}),
            json!({"name": "idf-sw", "model": "MS120-8", "tags": " idf  spare "}),
            json!({"name": "mystery"}),
        ]
    }

    #[test]
    fn filters_networks_by_product_type() {
        let wireless = filter_by_product_type(network_fixture(), ProductType::Wireless);
        assert_eq!(names(&wireless), vec!["HQ", "Warehouse"]);

        let sensors = filter_by_product_type(network_fixture(), ProductType::Sensor);
        assert!(sensors.is_empty());
    }

    #[test]
    fn filters_devices_by_model_family() {
        let switches = filter_by_model(device_fixture(), DeviceModel::Ms);
        assert_eq!(names(&switches), vec!["core-sw", "idf-sw"]);

        let appliances = filter_by_model(device_fixture(), DeviceModel::Mx);
        assert_eq!(names(&appliances), vec!["edge"]);
    }

    #[test]
    fn tag_filters_handle_lists_and_strings() {
        let ignored = vec!["spare".to_string(), "guest".to_string()];
        let kept = without_tags(device_fixture(), &ignored);
        assert_eq!(names(&kept), vec!["core-sw", "edge", "mystery"]);

        assert!(!has_any_tag(&device_fixture()[0], &[]));
        assert_eq!(tags(&device_fixture()[3]), vec!["idf", "spare"]);
    }

    #[test]
    fn sort_is_stable_and_reversible() {
        let mut items = vec![
            json!({"name": "b", "model": "MS"}),
            json!({"name": "a", "model": "MR"}),
            json!({"name": "c", "model": "MS"}),
            json!({"name": "d"}),
            json!({"name": "e", "model": "MR"}),
        ];

        sort_by_key(&mut items, "model", false);
        assert_eq!(names(&items), vec!["d", "a", "e", "b", "c"]);

        sort_by_key(&mut items, "model", true);
        assert_eq!(names(&items), vec!["b", "c", "a", "e", "d"]);
    }

    #[test]
    fn sort_orders_numbers_numerically() {
        let mut items = vec![
            json!({"name": "ten", "v": 10}),
            json!({"name": "two", "v": 2}),
            json!({"name": "half", "v": 0.5}),
        ];
        sort_by_key(&mut items, "v", true);
        assert_eq!(names(&items), vec!["ten", "two", "half"]);
    }

    #[test]
    fn tag_changes_preserve_order_without_duplicates() {
        let current = vec!["a".to_string(), "b".to_string()];
        let (tags, changes) = apply_tag_changes(
            &current,
            &["b".to_string(), "c".to_string()],
            &["a".to_string(), "zzz".to_string()],
        );
        assert_eq!(tags, vec!["b", "c"]);
        assert_eq!(
            changes,
            vec![
                TagChange::Added("c".into()),
                TagChange::Removed("a".into())
            ]
        );
    }

    #[test]
    fn changed_fields_skips_unset_and_unchanged() {
        let current = json!({"name": "Corp", "enabled": true, "minBitrate": 11});
        let update = changed_fields(
            &current,
            vec![
                ("name", Some(json!("Corp"))),
                ("enabled", Some(json!(false))),
                ("minBitrate", None),
                ("psk", Some(json!("secret"))),
            ],
        );
        assert_eq!(
            Value::Object(update),
            json!({"enabled": false, "psk": "secret"})
        );
    }

    #[test]
    fn text_match_with_optional_needle() {
        assert!(matches_text("Default route", None));
        assert!(matches_text("Default route", Some("route")));
        assert!(!matches_text("Default route", Some("Route")));
    }
}
