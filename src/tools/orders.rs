//! Order tools: search, details, status update

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::query::{Filter, collection_fields, fields, paginated, present, segment};
use super::{
    ToolGroup, ToolOutcome, default_page_size, default_true, page_size_schema, parse_args,
    start_index_schema,
};
use crate::api::{ApiRequest, KiboClient};
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

const ORDER_SEARCH: &str = "kibo_order_search";
const ORDER_DETAILS: &str = "kibo_order_details";
const ORDER_STATUS_UPDATE: &str = "kibo_order_status_update";

pub(crate) const ORDERS_PATH: &str = "/api/commerce/orders";

/// Recorded as the author of audit entries and notes
const UPDATED_BY: &str = "mcp-server";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderSearch {
    customer_email_address: Option<String>,
    status: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    order_number: Option<String>,
    #[serde(default)]
    start_index: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
    sort_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderDetails {
    order_number: String,
    #[serde(default = "default_true")]
    include_items: bool,
    #[serde(default = "default_true")]
    include_payments: bool,
    #[serde(default = "default_true")]
    include_fulfillment: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate {
    order_number: String,
    status: String,
    note: Option<String>,
}

/// Order management tools
pub struct OrderTools {
    client: KiboClient,
}

impl OrderTools {
    /// Tools backed by `client`
    #[must_use]
    pub fn new(client: KiboClient) -> Self {
        Self { client }
    }

    /// Tool definitions, available without a client
    #[must_use]
    pub fn definitions() -> Vec<Tool> {
        vec![
            Tool {
                name: ORDER_SEARCH.to_string(),
                title: Some("Search orders".to_string()),
                description: Some(
                    "Search for orders with filtering options including customer email, status, and date range"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "customerEmailAddress": {
                            "type": "string",
                            "description": "Customer email address to filter orders"
                        },
                        "status": {
                            "type": "string",
                            "description": "Order status (e.g., \"Pending\", \"Submitted\", \"Processing\", \"Completed\", \"Cancelled\")"
                        },
                        "startDate": {
                            "type": "string",
                            "description": "Start date for order search (ISO 8601 format)"
                        },
                        "endDate": {
                            "type": "string",
                            "description": "End date for order search (ISO 8601 format)"
                        },
                        "orderNumber": {
                            "type": "string",
                            "description": "Specific order number to search for"
                        },
                        "startIndex": start_index_schema(),
                        "pageSize": page_size_schema(20, "orders"),
                        "sortBy": {
                            "type": "string",
                            "description": "Sort field (e.g., \"submittedDate desc\", \"orderNumber asc\")"
                        }
                    }
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: ORDER_DETAILS.to_string(),
                title: Some("Order details".to_string()),
                description: Some(
                    "Get detailed information about a specific order including items, payments, and fulfillment"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "orderNumber": {
                            "type": "string",
                            "minLength": 1,
                            "description": "Order number to retrieve"
                        },
                        "includeItems": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include order line items"
                        },
                        "includePayments": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include payment information"
                        },
                        "includeFulfillment": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include fulfillment information"
                        }
                    },
                    "required": ["orderNumber"]
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: ORDER_STATUS_UPDATE.to_string(),
                title: Some("Update order status".to_string()),
                description: Some("Update the status of an order with optional notes".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "orderNumber": {
                            "type": "string",
                            "minLength": 1,
                            "description": "Order number to update"
                        },
                        "status": {
                            "type": "string",
                            "minLength": 1,
                            "description": "New order status"
                        },
                        "note": {
                            "type": "string",
                            "description": "Optional note explaining the status change"
                        }
                    },
                    "required": ["orderNumber", "status"]
                }),
                annotations: Some(ToolAnnotations::mutating()),
            },
        ]
    }

    async fn search(&self, p: OrderSearch) -> ToolOutcome {
        let filter = Filter::new()
            .eq(
                "customerAccount.emailAddress",
                present(p.customer_email_address.as_ref()),
            )
            .eq("status", present(p.status.as_ref()))
            .since("submittedDate", present(p.start_date.as_ref()))
            .until("submittedDate", present(p.end_date.as_ref()))
            .eq("orderNumber", present(p.order_number.as_ref()))
            .build();

        let request = ApiRequest::get(ORDERS_PATH)
            .query("startIndex", p.start_index)
            .query("pageSize", p.page_size)
            .query_opt("filter", filter)
            .query_opt("sortBy", present(p.sort_by.as_ref()))
            .query(
                "responseFields",
                collection_fields(&[
                    "orderNumber",
                    "status",
                    "submittedDate",
                    "total",
                    "customerAccount",
                    "billingInfo",
                    "fulfillmentInfo",
                ]),
            );

        let result = self
            .client
            .execute(request)
            .await
            .map(|response| paginated(&response, "orders"));
        ToolOutcome::from_result(result, || "Failed to search orders".to_string())
    }

    async fn details(&self, p: OrderDetails) -> ToolOutcome {
        let mut names = vec![
            "orderNumber",
            "status",
            "submittedDate",
            "total",
            "subtotal",
            "taxTotal",
            "shippingTotal",
            "discountTotal",
            "customerAccount",
            "billingInfo",
            "fulfillmentInfo",
            "notes",
        ];
        if p.include_items {
            names.push("items");
        }
        if p.include_payments {
            names.push("payments");
        }
        if p.include_fulfillment {
            names.extend(["packages", "shipments"]);
        }

        let request = ApiRequest::get(order_path(&p.order_number))
            .query("responseFields", fields(&names));
        let result = self.client.execute(request).await;
        ToolOutcome::from_result(result, || {
            format!("Failed to retrieve order details for: {}", p.order_number)
        })
    }

    async fn update_status(&self, p: StatusUpdate) -> ToolOutcome {
        match self.read_modify_write(&p).await {
            Ok((old_status, updated)) => {
                let new_status = updated.get("status").cloned().unwrap_or(Value::Null);
                let message = format!(
                    "Order {} status updated from {} to {}",
                    p.order_number,
                    display(&old_status),
                    display(&new_status)
                );
                ToolOutcome::success(json!({
                    "orderNumber": updated.get("orderNumber").cloned().unwrap_or(Value::Null),
                    "oldStatus": old_status,
                    "newStatus": new_status,
                    "note": p.note,
                    "updatedDate": updated
                        .pointer("/auditInfo/updateDate")
                        .cloned()
                        .unwrap_or(Value::Null),
                }))
                .with_message(message)
            }
            Err(e) => ToolOutcome::from_error(
                &e,
                format!("Failed to update status for order: {}", p.order_number),
            ),
        }
    }

    /// Fetch the order, write it back with the new status, and return the
    /// previous status with the updated order.
    async fn read_modify_write(&self, p: &StatusUpdate) -> Result<(Value, Value)> {
        let path = order_path(&p.order_number);
        let current = self.client.execute(ApiRequest::get(path.clone())).await?;
        let Value::Object(mut order) = current else {
            return Err(Error::Protocol(format!(
                "Order {} response is not an object",
                p.order_number
            )));
        };

        let old_status = order.get("status").cloned().unwrap_or(Value::Null);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        order.insert("status".to_string(), Value::String(p.status.clone()));

        let mut audit = match order.remove("auditInfo") {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        audit.insert("updateDate".to_string(), Value::String(now.clone()));
        audit.insert("updateBy".to_string(), Value::String(UPDATED_BY.to_string()));
        order.insert("auditInfo".to_string(), Value::Object(audit));

        if let Some(note) = present(p.note.as_ref()) {
            let mut notes = match order.remove("notes") {
                Some(Value::Array(existing)) => existing,
                _ => Vec::new(),
            };
            notes.push(json!({
                "text": note,
                "noteDate": now,
                "noteBy": UPDATED_BY,
            }));
            order.insert("notes".to_string(), Value::Array(notes));
        }

        let updated = self
            .client
            .execute(ApiRequest::put(path, Value::Object(order)))
            .await?;
        Ok((old_status, updated))
    }
}

fn order_path(order_number: &str) -> String {
    format!("{ORDERS_PATH}/{}", segment(order_number))
}

/// Status text for messages; strings without their JSON quotes
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ToolGroup for OrderTools {
    fn name(&self) -> &'static str {
        "orders"
    }

    fn tools(&self) -> Vec<Tool> {
        Self::definitions()
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutcome> {
        match tool {
            ORDER_SEARCH => Ok(self.search(parse_args(arguments)?).await),
            ORDER_DETAILS => Ok(self.details(parse_args(arguments)?).await),
            ORDER_STATUS_UPDATE => Ok(self.update_status(parse_args(arguments)?).await),
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{Scripted, query};
    use pretty_assertions::assert_eq;
    use reqwest::Method;

    const ORDER_1001: &str = "/api/commerce/orders/1001";

    #[tokio::test]
    async fn search_combines_filters() {
        let (client, script) = Scripted::new()
            .reply(Method::GET, ORDERS_PATH, 200, r#"{"items":[],"totalCount":0}"#)
            .client();
        let outcome = OrderTools::new(client)
            .call(
                ORDER_SEARCH,
                json!({
                    "customerEmailAddress": "a@b.com",
                    "status": "Completed",
                    "startDate": "2024-01-01T00:00:00Z",
                    "sortBy": "submittedDate desc"
                }),
            )
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.data().unwrap()["orders"], json!([]));

        let sent = &script.requests()[0];
        assert_eq!(
            query(sent, "filter"),
            Some(
                "customerAccount.emailAddress eq 'a@b.com' and status eq 'Completed' \
                 and submittedDate ge datetime'2024-01-01T00:00:00Z'"
            )
        );
        assert_eq!(query(sent, "pageSize"), Some("20"));
        assert_eq!(query(sent, "sortBy"), Some("submittedDate desc"));
    }

    #[tokio::test]
    async fn search_without_criteria_sends_no_filter() {
        let (client, script) = Scripted::new()
            .reply(Method::GET, ORDERS_PATH, 200, "{}")
            .client();
        OrderTools::new(client)
            .call(ORDER_SEARCH, json!({}))
            .await
            .unwrap();
        assert_eq!(query(&script.requests()[0], "filter"), None);
    }

    #[tokio::test]
    async fn details_projection_follows_flags() {
        let (client, script) = Scripted::new()
            .reply(Method::GET, ORDER_1001, 200, r#"{"orderNumber":1001}"#)
            .client();
        let outcome = OrderTools::new(client)
            .call(
                ORDER_DETAILS,
                json!({"orderNumber": "1001", "includePayments": false}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.data(), Some(&json!({"orderNumber": 1001})));
        assert_eq!(
            query(&script.requests()[0], "responseFields"),
            Some(
                "orderNumber,status,submittedDate,total,subtotal,taxTotal,shippingTotal,\
                 discountTotal,customerAccount,billingInfo,fulfillmentInfo,notes,items,\
                 packages,shipments"
            )
        );
    }

    #[tokio::test]
    async fn status_update_writes_back_full_order() {
        let (client, script) = Scripted::new()
            .reply(
                Method::GET,
                ORDER_1001,
                200,
                r#"{"orderNumber":1001,"status":"Submitted","total":5,"notes":[{"text":"old"}],"auditInfo":{"createBy":"web"}}"#,
            )
            .reply(
                Method::PUT,
                ORDER_1001,
                200,
                r#"{"orderNumber":1001,"status":"Processing","auditInfo":{"updateDate":"2024-05-01T10:00:00.000Z"}}"#,
            )
            .client();

        let outcome = OrderTools::new(client)
            .call(
                ORDER_STATUS_UPDATE,
                json!({"orderNumber": "1001", "status": "Processing", "note": "picked"}),
            )
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(
            outcome.message(),
            Some("Order 1001 status updated from Submitted to Processing")
        );
        assert_eq!(
            outcome.data(),
            Some(&json!({
                "orderNumber": 1001,
                "oldStatus": "Submitted",
                "newStatus": "Processing",
                "note": "picked",
                "updatedDate": "2024-05-01T10:00:00.000Z"
            }))
        );

        let requests = script.requests();
        assert_eq!(requests.len(), 2);
        let body = requests[1].body.as_ref().unwrap();
        assert_eq!(body["status"], "Processing");
        assert_eq!(body["total"], 5);
        assert_eq!(body["auditInfo"]["createBy"], "web");
        assert_eq!(body["auditInfo"]["updateBy"], UPDATED_BY);
        assert_eq!(body["notes"].as_array().unwrap().len(), 2);
        assert_eq!(body["notes"][1]["text"], "picked");
        assert_eq!(body["notes"][1]["noteBy"], UPDATED_BY);
    }

    #[tokio::test]
    async fn status_update_without_note_keeps_notes() {
        let (client, script) = Scripted::new()
            .reply(Method::GET, ORDER_1001, 200, r#"{"status":"Submitted"}"#)
            .reply(Method::PUT, ORDER_1001, 200, r#"{"status":"Closed"}"#)
            .client();
        let outcome = OrderTools::new(client)
            .call(
                ORDER_STATUS_UPDATE,
                json!({"orderNumber": "1001", "status": "Closed"}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.data().unwrap()["note"], Value::Null);
        assert!(script.requests()[1].body.as_ref().unwrap().get("notes").is_none());
    }

    #[tokio::test]
    async fn status_update_of_missing_order_never_writes() {
        let (client, script) = Scripted::new().client();
        let outcome = OrderTools::new(client)
            .call(
                ORDER_STATUS_UPDATE,
                json!({"orderNumber": "404", "status": "Closed"}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.error(), Some("Resource not found"));
        assert_eq!(script.requests().len(), 1);
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid_params() {
        let (client, _) = Scripted::new().client();
        let err = OrderTools::new(client)
            .call(ORDER_STATUS_UPDATE, json!({"orderNumber": "1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }
}
