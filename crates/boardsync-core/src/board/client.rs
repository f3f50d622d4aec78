// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GraphQL client for the monday.com board API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{BoardApi, ColumnInput, PAGE_SIZE};
use crate::config::BoardApiConfig;
use crate::error::{Result, SyncError};
use crate::models::{Account, BoardItem, WebhookSubscription};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BoardsData {
    boards: Vec<BoardPage>,
}

#[derive(Debug, Deserialize)]
struct BoardPage {
    items_page: ItemsPage,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    cursor: Option<String>,
    #[serde(default)]
    items: Vec<BoardItem>,
}

#[derive(Debug, Deserialize)]
struct ItemsData {
    items: Vec<BoardItem>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    #[serde(deserialize_with = "id_string")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateItemData {
    create_item: IdOnly,
}

#[derive(Debug, Deserialize)]
struct MeData {
    me: RawAccount,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    #[serde(default, deserialize_with = "opt_id_string")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWebhook {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(deserialize_with = "id_string")]
    board_id: String,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    config: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhooksData {
    webhooks: Vec<RawWebhook>,
}

#[derive(Debug, Deserialize)]
struct CreateWebhookData {
    create_webhook: RawWebhook,
}

/// The API serializes IDs as strings, but some fields come back as numbers.
fn id_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    match Option::<serde_json::Value>::deserialize(d)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// monday.com GraphQL client.
///
/// Every request waits `request_delay` first. HTTP 429 responses are retried
/// after `rate_limit_backoff`, up to `max_rate_limit_retries` times.
#[derive(Clone)]
pub struct MondayClient {
    http: Client,
    config: BoardApiConfig,
}

impl MondayClient {
    /// Create a client from API settings.
    pub fn new(config: BoardApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Transient(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// API endpoint this client talks to.
    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    /// Execute one GraphQL document and decode its `data`.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let mut rate_limited = 0u32;

        loop {
            if !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }

            let response = self
                .http
                .post(&self.config.api_url)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                if rate_limited > self.config.max_rate_limit_retries {
                    return Err(SyncError::Transient(format!(
                        "rate limited {} times in a row, giving up",
                        rate_limited
                    )));
                }
                warn!(
                    attempt = rate_limited,
                    backoff_secs = self.config.rate_limit_backoff.as_secs(),
                    "Board API rate limit hit, backing off"
                );
                tokio::time::sleep(self.config.rate_limit_backoff).await;
                continue;
            }

            if status.is_server_error() {
                return Err(SyncError::Transient(format!(
                    "board API returned HTTP {}",
                    status
                )));
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(SyncError::Payload(format!(
                    "board API returned HTTP {}: {}",
                    status,
                    truncate(&text, 300)
                )));
            }

            let parsed: GraphqlResponse<T> = response.json().await?;
            if !parsed.errors.is_empty() {
                let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
                return Err(SyncError::Payload(format!(
                    "GraphQL error: {}",
                    messages.join("; ")
                )));
            }

            return parsed
                .data
                .ok_or_else(|| SyncError::Payload("response contained no data".to_string()));
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn items_page_query(with_columns: bool) -> String {
    let (columns_var, columns_arg) = if with_columns {
        (", $columns: [String!]", "(ids: $columns)")
    } else {
        ("", "")
    };
    format!(
        "query ($board: [ID!], $limit: Int!, $cursor: String{columns_var}) {{ \
           boards(ids: $board) {{ \
             items_page(limit: $limit, cursor: $cursor) {{ \
               cursor \
               items {{ id name column_values{columns_arg} {{ id text value }} }} \
             }} \
           }} \
         }}"
    )
}

const GET_ITEM: &str = "query ($ids: [ID!]) { items(ids: $ids) { id name column_values { id text value } } }";

const CREATE_ITEM: &str = "mutation ($board: ID!, $name: String!, $values: JSON) { \
    create_item(board_id: $board, item_name: $name, column_values: $values) { id } }";

const CHANGE_COLUMN_VALUE: &str = "mutation ($board: ID!, $item: ID!, $column: String!, $value: JSON!) { \
    change_column_value(board_id: $board, item_id: $item, column_id: $column, value: $value) { id } }";

const ME: &str = "query { me { id name email } }";

const LIST_WEBHOOKS: &str =
    "query ($board: ID!) { webhooks(board_id: $board) { id board_id event config } }";

const CREATE_WEBHOOK: &str = "mutation ($board: ID!, $event: WebhookEventType!, $url: String!) { \
    create_webhook(board_id: $board, event: $event, url: $url) { id board_id } }";

#[async_trait]
impl BoardApi for MondayClient {
    async fn fetch_items(
        &self,
        board_id: &str,
        column_ids: &[String],
        max_pages: Option<u32>,
    ) -> Result<Vec<BoardItem>> {
        let query = items_page_query(!column_ids.is_empty());
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            if max_pages.is_some_and(|max| pages >= max) {
                info!(board_id, pages, "Reached page limit");
                break;
            }
            pages += 1;

            let mut variables = json!({
                "board": [board_id],
                "limit": PAGE_SIZE,
                "cursor": cursor,
            });
            if !column_ids.is_empty() {
                variables["columns"] = json!(column_ids);
            }

            let data: BoardsData = self.execute(&query, variables).await?;
            let page = data
                .boards
                .into_iter()
                .next()
                .ok_or_else(|| SyncError::Payload(format!("board {} not found", board_id)))?
                .items_page;

            let received = page.items.len();
            for item in page.items {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                } else {
                    debug!(board_id, item_id = %item.id, "Dropping duplicate item from later page");
                }
            }
            debug!(board_id, page = pages, received, "Fetched items page");

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        info!(board_id, items = items.len(), pages, "Fetched board items");
        Ok(items)
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<BoardItem>> {
        let data: ItemsData = self.execute(GET_ITEM, json!({ "ids": [item_id] })).await?;
        Ok(data.items.into_iter().next())
    }

    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        columns: &[(String, ColumnInput)],
    ) -> Result<String> {
        let values: serde_json::Map<String, serde_json::Value> = columns
            .iter()
            .map(|(id, value)| (id.clone(), value.to_value()))
            .collect();
        let values = serde_json::Value::Object(values).to_string();

        let data: CreateItemData = self
            .execute(
                CREATE_ITEM,
                json!({ "board": board_id, "name": name, "values": values }),
            )
            .await?;
        Ok(data.create_item.id)
    }

    async fn change_column_value(
        &self,
        board_id: &str,
        item_id: &str,
        column_id: &str,
        value: &ColumnInput,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .execute(
                CHANGE_COLUMN_VALUE,
                json!({
                    "board": board_id,
                    "item": item_id,
                    "column": column_id,
                    "value": value.to_json(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn me(&self) -> Result<Account> {
        let data: MeData = self.execute(ME, json!({})).await?;
        Ok(Account {
            id: data.me.id,
            name: data.me.name,
            email: data.me.email,
        })
    }

    async fn list_webhooks(&self, board_id: &str) -> Result<Vec<WebhookSubscription>> {
        let data: WebhooksData = self.execute(LIST_WEBHOOKS, json!({ "board": board_id })).await?;
        Ok(data
            .webhooks
            .into_iter()
            .map(|w| WebhookSubscription {
                id: w.id,
                board_id: w.board_id,
                event: w.event.unwrap_or_default(),
                url: w.config,
            })
            .collect())
    }

    async fn create_webhook(
        &self,
        board_id: &str,
        event: &str,
        url: &str,
    ) -> Result<WebhookSubscription> {
        let data: CreateWebhookData = self
            .execute(
                CREATE_WEBHOOK,
                json!({ "board": board_id, "event": event, "url": url }),
            )
            .await?;
        Ok(WebhookSubscription {
            id: data.create_webhook.id,
            board_id: data.create_webhook.board_id,
            event: event.to_string(),
            url: Some(url.to_string()),
        })
    }
}
