//! DynamoDB document store over the AWS SDK

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::{Client, Config};
use tracing::{debug, info, instrument};

use databridge_common::{BridgeError, Result, Row, Value};

use super::DocumentStore;
use crate::descriptor::KeyValueCredentials;

pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    /// Build a client from explicit credentials. No request is sent.
    pub fn new(creds: &KeyValueCredentials) -> Self {
        let credentials = Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            None,
            None,
            "databridge",
        );
        let mut builder = Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(creds.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &creds.endpoint_url {
            builder = builder.endpoint_url(endpoint.clone());
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl DocumentStore for DynamoStore {
    #[instrument(skip(self))]
    async fn list_tables(&self) -> Result<Vec<String>> {
        let start = Instant::now();
        let mut names = Vec::new();
        let mut next: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_tables()
                .set_exclusive_start_table_name(next.take())
                .send()
                .await
                .map_err(|e| BridgeError::connection(DisplayErrorContext(&e).to_string()))?;

            names.extend(resp.table_names().iter().cloned());
            match resp.last_evaluated_table_name() {
                Some(name) => next = Some(name.to_string()),
                None => break,
            }
        }

        info!(tables = names.len(), "ListTables completed in {:?}", start.elapsed());
        Ok(names)
    }

    #[instrument(skip(self))]
    async fn scan(&self, table: &str, limit: Option<usize>) -> Result<Vec<Row>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let remaining = limit.map(|l| i32::try_from(l - rows.len()).unwrap_or(i32::MAX));
            let resp = self
                .client
                .scan()
                .table_name(table)
                .set_limit(remaining)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    let missing = e
                        .as_service_error()
                        .map_or(false, |se| se.is_resource_not_found_exception());
                    if missing {
                        BridgeError::TableNotFound(table.to_string())
                    } else {
                        BridgeError::query(DisplayErrorContext(&e).to_string())
                    }
                })?;

            rows.extend(resp.items().iter().map(item_to_row));
            let more_wanted = limit.map_or(true, |l| rows.len() < l);
            match resp.last_evaluated_key() {
                Some(key) if more_wanted => start_key = Some(key.clone()),
                _ => break,
            }
            debug!(table, rows = rows.len(), "Following scan page");
        }

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn key_attributes(&self, table: &str) -> Result<Vec<String>> {
        let resp = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map_or(false, |se| se.is_resource_not_found_exception());
                if missing {
                    BridgeError::TableNotFound(table.to_string())
                } else {
                    BridgeError::query(DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(resp
            .table()
            .map(|t| {
                t.key_schema()
                    .iter()
                    .map(|k| k.attribute_name().to_string())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Convert one item, ordering attributes by name
pub fn item_to_row(item: &HashMap<String, AttributeValue>) -> Row {
    let mut names: Vec<&String> = item.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| (name.clone(), attribute_to_value(&item[name])))
        .collect()
}

/// Convert a DynamoDB attribute value to the shared value model
pub fn attribute_to_value(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::B(blob) => Value::Bytes(blob.as_ref().to_vec()),
        AttributeValue::L(list) => Value::Array(list.iter().map(attribute_to_value).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), attribute_to_value(v)))
                .collect(),
        ),
        AttributeValue::Ss(set) => Value::Array(set.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(set) => Value::Array(set.iter().map(|n| parse_number(n)).collect()),
        AttributeValue::Bs(set) => Value::Array(
            set.iter()
                .map(|b| Value::Bytes(b.as_ref().to_vec()))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// Integer first, then float; numbers neither can hold keep their text
fn parse_number(n: &str) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = n.parse::<f64>() {
        Value::Float(f)
    } else {
        Value::String(n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::primitives::Blob;

    #[test]
    fn test_attribute_conversion() {
        assert_eq!(attribute_to_value(&AttributeValue::S("x".into())), Value::from("x"));
        assert_eq!(attribute_to_value(&AttributeValue::N("42".into())), Value::Integer(42));
        assert_eq!(attribute_to_value(&AttributeValue::N("1.25".into())), Value::Float(1.25));
        assert_eq!(attribute_to_value(&AttributeValue::Null(true)), Value::Null);
        assert_eq!(
            attribute_to_value(&AttributeValue::B(Blob::new(vec![1, 2]))),
            Value::Bytes(vec![1, 2])
        );
        assert_eq!(
            attribute_to_value(&AttributeValue::Ss(vec!["a".into(), "b".into()])),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_nested_map() {
        let inner = HashMap::from([("n".to_string(), AttributeValue::N("1".into()))]);
        let value = attribute_to_value(&AttributeValue::M(inner));
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(map.get("n"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_item_attributes_are_sorted() {
        let item = HashMap::from([
            ("zip".to_string(), AttributeValue::S("z".into())),
            ("age".to_string(), AttributeValue::N("3".into())),
            ("id".to_string(), AttributeValue::S("i".into())),
        ]);
        let row = item_to_row(&item);
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["age", "id", "zip"]);
    }

    #[tokio::test]
    async fn test_client_construction_sends_nothing() {
        let creds = KeyValueCredentials {
            region: "us-east-1".into(),
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            endpoint_url: Some("http://127.0.0.1:1".into()),
        };
        let _store = DynamoStore::new(&creds);
    }
}
