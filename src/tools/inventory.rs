//! Inventory tools: search, details, multi-product stock availability

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{Value, json};

use super::query::{Filter, collection_fields, fields, paginated, present, segment};
use super::{
    ToolGroup, ToolOutcome, default_true, page_size_schema, parse_args, start_index_schema,
};
use crate::api::{ApiRequest, KiboClient};
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

const INVENTORY_SEARCH: &str = "kibo_inventory_search";
const INVENTORY_DETAILS: &str = "kibo_inventory_details";
const STOCK_AVAILABILITY: &str = "kibo_stock_availability";

const INVENTORY_PATH: &str = "/api/commerce/inventory";
const STOREFRONT_PRODUCTS_PATH: &str = "/api/commerce/catalog/storefront/products";

/// Reported when no location was given
const DEFAULT_LOCATION: &str = "default";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventorySearch {
    product_code: Option<String>,
    location_code: Option<String>,
    #[serde(default = "default_true")]
    include_reserved: bool,
    #[serde(default = "default_true")]
    include_allocated: bool,
    #[serde(default)]
    start_index: u32,
    #[serde(default = "default_inventory_page_size")]
    page_size: u32,
}

fn default_inventory_page_size() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryDetails {
    product_code: String,
    location_code: Option<String>,
    #[serde(default)]
    include_history: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockAvailability {
    product_codes: Vec<String>,
    location_code: Option<String>,
    #[serde(default = "default_quantity")]
    quantity: u64,
}

fn default_quantity() -> u64 {
    1
}

/// Inventory tools
pub struct InventoryTools {
    client: KiboClient,
}

impl InventoryTools {
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
                name: INVENTORY_SEARCH.to_string(),
                title: Some("Search inventory".to_string()),
                description: Some(
                    "Search inventory levels across products and locations with filtering options"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "productCode": {
                            "type": "string",
                            "description": "Product code to filter inventory"
                        },
                        "locationCode": {
                            "type": "string",
                            "description": "Location code to filter inventory"
                        },
                        "includeReserved": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include reserved inventory quantities"
                        },
                        "includeAllocated": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include allocated inventory quantities"
                        },
                        "startIndex": start_index_schema(),
                        "pageSize": page_size_schema(50, "inventory records")
                    }
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: INVENTORY_DETAILS.to_string(),
                title: Some("Inventory details".to_string()),
                description: Some(
                    "Get detailed inventory information for a specific product across all or specific locations"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "productCode": {
                            "type": "string",
                            "minLength": 1,
                            "description": "Product code to get inventory for"
                        },
                        "locationCode": {
                            "type": "string",
                            "description": "Specific location code (optional)"
                        },
                        "includeHistory": {
                            "type": "boolean",
                            "default": false,
                            "description": "Include inventory transaction history"
                        }
                    },
                    "required": ["productCode"]
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: STOCK_AVAILABILITY.to_string(),
                title: Some("Check stock availability".to_string()),
                description: Some(
                    "Check stock availability for multiple products at a specific location"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "productCodes": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Array of product codes to check"
                        },
                        "locationCode": {
                            "type": "string",
                            "description": "Location code to check availability"
                        },
                        "quantity": {
                            "type": "integer",
                            "minimum": 1,
                            "default": 1,
                            "description": "Required quantity to check availability for"
                        }
                    },
                    "required": ["productCodes"]
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
        ]
    }

    async fn search(&self, p: InventorySearch) -> ToolOutcome {
        let filter = Filter::new()
            .eq("productCode", present(p.product_code.as_ref()))
            .eq("locationCode", present(p.location_code.as_ref()))
            .build();

        let mut names = vec!["productCode", "locationCode", "stockOnHand", "available"];
        if p.include_allocated {
            names.push("allocated");
        }
        names.push("pending");
        if p.include_reserved {
            names.push("reserved");
        }

        let request = ApiRequest::get(INVENTORY_PATH)
            .query("startIndex", p.start_index)
            .query("pageSize", p.page_size)
            .query_opt("filter", filter)
            .query("responseFields", collection_fields(&names));

        let result = self
            .client
            .execute(request)
            .await
            .map(|response| paginated(&response, "inventory"));
        ToolOutcome::from_result(result, || "Failed to search inventory".to_string())
    }

    async fn details(&self, p: InventoryDetails) -> ToolOutcome {
        let mut path = format!("{INVENTORY_PATH}/{}", segment(&p.product_code));
        if let Some(location) = present(p.location_code.as_ref()) {
            path.push('/');
            path.push_str(&segment(location));
        }

        let mut names = vec![
            "productCode",
            "locationCode",
            "stockOnHand",
            "available",
            "allocated",
            "pending",
            "reserved",
            "lastUpdated",
        ];
        if p.include_history {
            names.push("transactions");
        }

        let request = ApiRequest::get(path).query("responseFields", fields(&names));
        let result = self.client.execute(request).await;
        ToolOutcome::from_result(result, || {
            format!(
                "Failed to retrieve inventory details for product: {}",
                p.product_code
            )
        })
    }

    async fn availability(&self, p: StockAvailability) -> ToolOutcome {
        let location = present(p.location_code.as_ref());
        let checks = p
            .product_codes
            .iter()
            .map(|code| self.check_product(code, location, p.quantity));
        let results: Vec<Value> = join_all(checks).await;

        let available = results
            .iter()
            .filter(|r| r.get("isAvailable").and_then(Value::as_bool) == Some(true))
            .count();

        ToolOutcome::success(json!({
            "availabilityCheck": {
                "locationCode": location.unwrap_or(DEFAULT_LOCATION),
                "requestedQuantity": p.quantity,
                "summary": {
                    "totalProductsChecked": results.len(),
                    "availableProducts": available,
                    "unavailableProducts": results.len() - available,
                },
                "results": results,
            }
        }))
    }

    /// One product's availability; failures are reported in the entry
    /// instead of failing the whole check.
    async fn check_product(&self, code: &str, location: Option<&str>, quantity: u64) -> Value {
        let request = ApiRequest::get(format!(
            "{STOREFRONT_PRODUCTS_PATH}/{}/inventoryinfo",
            segment(code)
        ))
        .query("quantity", quantity)
        .query_opt("locationCode", location);

        match self.client.execute(request).await {
            Ok(info) => {
                let on_hand = info
                    .get("onlineStockAvailable")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                json!({
                    "productCode": code,
                    "isAvailable": on_hand >= quantity,
                    "stockOnHand": on_hand,
                    "requestedQuantity": quantity,
                    "locationCode": location.unwrap_or(DEFAULT_LOCATION),
                })
            }
            Err(e) => json!({
                "productCode": code,
                "isAvailable": false,
                "error": e.to_string(),
                "requestedQuantity": quantity,
                "locationCode": location.unwrap_or(DEFAULT_LOCATION),
            }),
        }
    }
}

#[async_trait]
impl ToolGroup for InventoryTools {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn tools(&self) -> Vec<Tool> {
        Self::definitions()
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutcome> {
        match tool {
            INVENTORY_SEARCH => Ok(self.search(parse_args(arguments)?).await),
            INVENTORY_DETAILS => Ok(self.details(parse_args(arguments)?).await),
            STOCK_AVAILABILITY => Ok(self.availability(parse_args(arguments)?).await),
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

    fn inventory_info(code: &str) -> String {
        format!("{STOREFRONT_PRODUCTS_PATH}/{code}/inventoryinfo")
    }

    #[tokio::test]
    async fn search_defaults_to_fifty_records() {
        let (client, script) = Scripted::new()
            .reply(Method::GET, INVENTORY_PATH, 200, r#"{"items":[{"productCode":"A"}]}"#)
            .client();
        let outcome = InventoryTools::new(client)
            .call(INVENTORY_SEARCH, json!({"locationCode": "WH1"}))
            .await
            .unwrap();

        assert_eq!(outcome.data().unwrap()["inventory"], json!([{"productCode": "A"}]));
        let sent = &script.requests()[0];
        assert_eq!(query(sent, "pageSize"), Some("50"));
        assert_eq!(query(sent, "filter"), Some("locationCode eq 'WH1'"));
        assert_eq!(
            query(sent, "responseFields"),
            Some(
                "items(productCode,locationCode,stockOnHand,available,allocated,pending,reserved),\
                 totalCount,pageCount,pageSize,startIndex"
            )
        );
    }

    #[tokio::test]
    async fn details_append_location_segment() {
        let (client, script) = Scripted::new()
            .reply(
                Method::GET,
                "/api/commerce/inventory/SKU-1/WH1",
                200,
                r#"{"productCode":"SKU-1","available":4}"#,
            )
            .client();
        let outcome = InventoryTools::new(client)
            .call(
                INVENTORY_DETAILS,
                json!({"productCode": "SKU-1", "locationCode": "WH1", "includeHistory": true}),
            )
            .await
            .unwrap();

        assert_eq!(outcome.data().unwrap()["available"], 4);
        assert!(
            query(&script.requests()[0], "responseFields")
                .unwrap()
                .ends_with("lastUpdated,transactions")
        );
    }

    #[tokio::test]
    async fn availability_counts_each_product() {
        let (client, script) = Scripted::new()
            .reply(Method::GET, &inventory_info("A"), 200, r#"{"onlineStockAvailable":10}"#)
            .reply(Method::GET, &inventory_info("B"), 200, r#"{"onlineStockAvailable":1}"#)
            .reply(Method::GET, &inventory_info("C"), 500, "{}")
            .client();

        let outcome = InventoryTools::new(client)
            .call(
                STOCK_AVAILABILITY,
                json!({"productCodes": ["A", "B", "C"], "quantity": 2}),
            )
            .await
            .unwrap();

        assert!(outcome.is_success());
        let check = &outcome.data().unwrap()["availabilityCheck"];
        assert_eq!(check["locationCode"], "default");
        assert_eq!(check["requestedQuantity"], 2);
        assert_eq!(
            check["summary"],
            json!({"totalProductsChecked": 3, "availableProducts": 1, "unavailableProducts": 2})
        );
        assert_eq!(
            check["results"][0],
            json!({
                "productCode": "A",
                "isAvailable": true,
                "stockOnHand": 10,
                "requestedQuantity": 2,
                "locationCode": "default"
            })
        );
        assert_eq!(check["results"][1]["isAvailable"], false);
        assert_eq!(check["results"][2]["isAvailable"], false);
        assert_eq!(check["results"][2]["error"], "HTTP 500: {}");

        let requests = script.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| query(r, "quantity") == Some("2")));
        assert!(requests.iter().all(|r| query(r, "locationCode").is_none()));
    }

    #[tokio::test]
    async fn availability_without_stock_info_is_unavailable() {
        let (client, _) = Scripted::new()
            .reply(Method::GET, &inventory_info("A"), 200, "{}")
            .client();
        let outcome = InventoryTools::new(client)
            .call(
                STOCK_AVAILABILITY,
                json!({"productCodes": ["A"], "locationCode": "WH1"}),
            )
            .await
            .unwrap();
        let result = &outcome.data().unwrap()["availabilityCheck"]["results"][0];
        assert_eq!(result["stockOnHand"], 0);
        assert_eq!(result["isAvailable"], false);
        assert_eq!(result["locationCode"], "WH1");
    }

    #[tokio::test]
    async fn empty_product_list_checks_nothing() {
        let (client, script) = Scripted::new().client();
        let outcome = InventoryTools::new(client)
            .call(STOCK_AVAILABILITY, json!({"productCodes": []}))
            .await
            .unwrap();
        assert_eq!(
            outcome.data().unwrap()["availabilityCheck"]["summary"]["totalProductsChecked"],
            0
        );
        assert!(script.requests().is_empty());
    }
}
