use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use serde_json::Value;

use super::{namespace_of, KvStore, StoreError};

/// Single-table layout:
/// PK = namespace ("report", "user")
/// SK = full key ("report:1700000000000-abc123def")
/// value = JSON document as a string
#[derive(Clone)]
pub struct DynamoKvStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoKvStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

fn map_sdk_error<E, R>(op: &str, e: SdkError<E, R>) -> StoreError {
    match e {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StoreError::Unavailable(format!("DynamoDB {} error: {}", op, e))
        }
        other => StoreError::Backend(format!("DynamoDB {} error: {}", op, other)),
    }
}

fn decode_value(item: &HashMap<String, AttributeValue>) -> Result<Option<Value>, StoreError> {
    match item.get("value").and_then(|v| v.as_s().ok()) {
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl KvStore for DynamoKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(namespace_of(key).to_string()))
            .key("SK", AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| map_sdk_error("get_item", e))?;

        match result.item() {
            Some(item) => decode_value(item),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", AttributeValue::S(namespace_of(key).to_string()))
            .item("SK", AttributeValue::S(key.to_string()))
            .item("value", AttributeValue::S(serde_json::to_string(&value)?))
            .item("updated_at", AttributeValue::S(now))
            .send()
            .await
            .map_err(|e| map_sdk_error("put_item", e))?;

        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(namespace_of(key).to_string()))
            .key("SK", AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| map_sdk_error("delete_item", e))?;

        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let pk = namespace_of(prefix).to_string();
        let mut entries = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(pk.clone()))
                .expression_attribute_values(":sk_prefix", AttributeValue::S(prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| map_sdk_error("query", e))?;

            for item in result.items() {
                let Some(sk) = item.get("SK").and_then(|v| v.as_s().ok()) else {
                    continue;
                };
                match decode_value(item) {
                    Ok(Some(value)) => entries.push((sk.to_string(), value)),
                    Ok(None) => tracing::warn!("Item {} has no value attribute, skipping", sk),
                    Err(e) => tracing::warn!("Item {} has an unreadable value, skipping: {}", sk, e),
                }
            }

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(entries)
    }
}
