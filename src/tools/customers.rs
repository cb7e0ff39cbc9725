//! Customer tools: search, details, order history

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::orders::ORDERS_PATH;
use super::query::{Filter, collection_fields, fields, paginated, present};
use super::{
    ToolGroup, ToolOutcome, default_page_size, default_true, page_size_schema, parse_args,
    start_index_schema,
};
use crate::api::{ApiRequest, KiboClient};
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

const CUSTOMER_SEARCH: &str = "kibo_customer_search";
const CUSTOMER_DETAILS: &str = "kibo_customer_details";
const CUSTOMER_ORDER_HISTORY: &str = "kibo_customer_order_history";

const ACCOUNTS_PATH: &str = "/api/commerce/customer/accounts";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerSearch {
    email_address: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    customer_number: Option<String>,
    is_active: Option<bool>,
    #[serde(default)]
    start_index: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
    sort_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerDetails {
    customer_account_id: u64,
    #[serde(default = "default_true")]
    include_attributes: bool,
    #[serde(default = "default_true")]
    include_contacts: bool,
    #[serde(default)]
    include_cards: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderHistory {
    customer_account_id: u64,
    start_date: Option<String>,
    end_date: Option<String>,
    status: Option<String>,
    #[serde(default)]
    start_index: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

/// Customer account tools
pub struct CustomerTools {
    client: KiboClient,
}

impl CustomerTools {
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
                name: CUSTOMER_SEARCH.to_string(),
                title: Some("Search customers".to_string()),
                description: Some(
                    "Search for customers by email, name, or other criteria with pagination"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "emailAddress": {
                            "type": "string",
                            "description": "Customer email address"
                        },
                        "firstName": {
                            "type": "string",
                            "description": "Customer first name"
                        },
                        "lastName": {
                            "type": "string",
                            "description": "Customer last name"
                        },
                        "customerNumber": {
                            "type": "string",
                            "description": "Customer number"
                        },
                        "isActive": {
                            "type": "boolean",
                            "description": "Filter by active status"
                        },
                        "startIndex": start_index_schema(),
                        "pageSize": page_size_schema(20, "customers"),
                        "sortBy": {
                            "type": "string",
                            "description": "Sort field (e.g., \"emailAddress asc\", \"lastName desc\")"
                        }
                    }
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: CUSTOMER_DETAILS.to_string(),
                title: Some("Customer details".to_string()),
                description: Some(
                    "Get detailed information about a specific customer including attributes and contacts"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "customerAccountId": {
                            "type": "integer",
                            "minimum": 1,
                            "description": "Customer account ID"
                        },
                        "includeAttributes": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include customer attributes"
                        },
                        "includeContacts": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include customer contacts and addresses"
                        },
                        "includeCards": {
                            "type": "boolean",
                            "default": false,
                            "description": "Include saved payment cards (sensitive)"
                        }
                    },
                    "required": ["customerAccountId"]
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: CUSTOMER_ORDER_HISTORY.to_string(),
                title: Some("Customer order history".to_string()),
                description: Some(
                    "Get order history for a specific customer with filtering options".to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "customerAccountId": {
                            "type": "integer",
                            "minimum": 1,
                            "description": "Customer account ID"
                        },
                        "startDate": {
                            "type": "string",
                            "description": "Start date for order history (ISO 8601 format)"
                        },
                        "endDate": {
                            "type": "string",
                            "description": "End date for order history (ISO 8601 format)"
                        },
                        "status": {
                            "type": "string",
                            "description": "Filter by order status"
                        },
                        "startIndex": start_index_schema(),
                        "pageSize": page_size_schema(20, "orders")
                    },
                    "required": ["customerAccountId"]
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
        ]
    }

    async fn search(&self, p: CustomerSearch) -> ToolOutcome {
        let filter = Filter::new()
            .eq("emailAddress", present(p.email_address.as_ref()))
            .eq("firstName", present(p.first_name.as_ref()))
            .eq("lastName", present(p.last_name.as_ref()))
            .eq("customerNumber", present(p.customer_number.as_ref()))
            .eq_bare("isActive", p.is_active)
            .build();

        let request = ApiRequest::get(ACCOUNTS_PATH)
            .query("startIndex", p.start_index)
            .query("pageSize", p.page_size)
            .query_opt("filter", filter)
            .query_opt("sortBy", present(p.sort_by.as_ref()))
            .query(
                "responseFields",
                collection_fields(&[
                    "id",
                    "customerNumber",
                    "emailAddress",
                    "firstName",
                    "lastName",
                    "isActive",
                    "customerType",
                    "auditInfo",
                ]),
            );

        let result = self
            .client
            .execute(request)
            .await
            .map(|response| paginated(&response, "customers"));
        ToolOutcome::from_result(result, || "Failed to search customers".to_string())
    }

    async fn details(&self, p: CustomerDetails) -> ToolOutcome {
        let mut names = vec![
            "id",
            "customerNumber",
            "emailAddress",
            "firstName",
            "lastName",
            "middleNameOrInitial",
            "companyOrOrganization",
            "customerType",
            "isActive",
            "acceptsMarketing",
            "hasExternalPassword",
            "isAnonymous",
            "auditInfo",
        ];
        if p.include_attributes {
            names.push("attributes");
        }
        if p.include_contacts {
            names.push("contacts");
        }
        if p.include_cards {
            names.push("cards");
        }

        let request = ApiRequest::get(format!("{ACCOUNTS_PATH}/{}", p.customer_account_id))
            .query("responseFields", fields(&names));
        let result = self.client.execute(request).await;
        ToolOutcome::from_result(result, || {
            format!(
                "Failed to retrieve customer details for ID: {}",
                p.customer_account_id
            )
        })
    }

    async fn order_history(&self, p: OrderHistory) -> ToolOutcome {
        let filter = Filter::new()
            .eq_bare("customerAccountId", Some(p.customer_account_id))
            .eq("status", present(p.status.as_ref()))
            .since("submittedDate", present(p.start_date.as_ref()))
            .until("submittedDate", present(p.end_date.as_ref()))
            .build();

        let request = ApiRequest::get(ORDERS_PATH)
            .query("startIndex", p.start_index)
            .query("pageSize", p.page_size)
            .query_opt("filter", filter)
            .query("sortBy", "submittedDate desc")
            .query(
                "responseFields",
                collection_fields(&[
                    "orderNumber",
                    "status",
                    "submittedDate",
                    "total",
                    "subtotal",
                    "taxTotal",
                    "shippingTotal",
                    "items",
                ]),
            );

        let result = self
            .client
            .execute(request)
            .await
            .map(|response| paginated(&response, "orders"));
        ToolOutcome::from_result(result, || {
            format!(
                "Failed to retrieve order history for customer ID: {}",
                p.customer_account_id
            )
        })
    }
}

#[async_trait]
impl ToolGroup for CustomerTools {
    fn name(&self) -> &'static str {
        "customers"
    }

    fn tools(&self) -> Vec<Tool> {
        Self::definitions()
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutcome> {
        match tool {
            CUSTOMER_SEARCH => Ok(self.search(parse_args(arguments)?).await),
            CUSTOMER_DETAILS => Ok(self.details(parse_args(arguments)?).await),
            CUSTOMER_ORDER_HISTORY => Ok(self.order_history(parse_args(arguments)?).await),
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }
}
