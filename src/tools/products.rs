//! Catalog tools: product search, product details, category list

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::query::{Filter, collection_fields, counter, fields, items, paginated, present, segment};
use super::{
    ToolGroup, ToolOutcome, default_page_size, default_true, page_size_schema, parse_args,
    start_index_schema,
};
use crate::api::{ApiRequest, KiboClient};
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

const PRODUCT_SEARCH: &str = "kibo_product_search";
const PRODUCT_DETAILS: &str = "kibo_product_details";
const CATEGORY_LIST: &str = "kibo_category_list";

const PRODUCTS_PATH: &str = "/api/commerce/catalog/storefront/products";
const CATEGORIES_PATH: &str = "/api/commerce/catalog/storefront/categories";

const SUMMARY_FIELDS: &[&str] = &[
    "productCode",
    "productName",
    "price",
    "salePrice",
    "imageUrl",
    "categoryId",
];

const DETAILED_FIELDS: &[&str] = &[
    "productCode",
    "productName",
    "description",
    "price",
    "salePrice",
    "imageUrl",
    "categoryId",
    "variations",
    "inventoryInfo",
    "options",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSearch {
    query: Option<String>,
    category_code: Option<String>,
    #[serde(default)]
    start_index: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
    sort_by: Option<String>,
    #[serde(default)]
    include_details: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetails {
    product_code: String,
    #[serde(default = "default_true")]
    include_variations: bool,
    #[serde(default = "default_true")]
    include_pricing: bool,
    #[serde(default = "default_true")]
    include_inventory: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryList {
    parent_category_code: Option<String>,
    #[serde(default)]
    include_products: bool,
    #[serde(default = "default_max_depth")]
    max_depth: u32,
}

fn default_max_depth() -> u32 {
    3
}

/// Product catalog tools
pub struct ProductTools {
    client: KiboClient,
}

impl ProductTools {
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
                name: PRODUCT_SEARCH.to_string(),
                title: Some("Search products".to_string()),
                description: Some(
                    "Search for products in the Kibo Commerce catalog with filtering and pagination options"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query for product name, description, or SKU"
                        },
                        "categoryCode": {
                            "type": "string",
                            "description": "Category code to filter products"
                        },
                        "startIndex": start_index_schema(),
                        "pageSize": page_size_schema(20, "products"),
                        "sortBy": {
                            "type": "string",
                            "description": "Sort field (e.g., \"createDate desc\", \"productName asc\")"
                        },
                        "includeDetails": {
                            "type": "boolean",
                            "default": false,
                            "description": "Include detailed product information"
                        }
                    }
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: PRODUCT_DETAILS.to_string(),
                title: Some("Product details".to_string()),
                description: Some(
                    "Get detailed information about a specific product including variations, pricing, and inventory"
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "productCode": {
                            "type": "string",
                            "minLength": 1,
                            "description": "Product code or SKU to retrieve"
                        },
                        "includeVariations": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include product variations"
                        },
                        "includePricing": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include pricing information"
                        },
                        "includeInventory": {
                            "type": "boolean",
                            "default": true,
                            "description": "Include inventory levels"
                        }
                    },
                    "required": ["productCode"]
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
            Tool {
                name: CATEGORY_LIST.to_string(),
                title: Some("List categories".to_string()),
                description: Some(
                    "Retrieve product categories and category tree structure".to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "parentCategoryCode": {
                            "type": "string",
                            "description": "Parent category code to filter subcategories"
                        },
                        "includeProducts": {
                            "type": "boolean",
                            "default": false,
                            "description": "Include products in each category"
                        },
                        "maxDepth": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 5,
                            "default": 3,
                            "description": "Maximum depth of category tree"
                        }
                    }
                }),
                annotations: Some(ToolAnnotations::read_only()),
            },
        ]
    }

    async fn search(&self, p: ProductSearch) -> ToolOutcome {
        let filter = Filter::new()
            .eq_bare("categoryCode", present(p.category_code.as_ref()))
            .build();
        let projection = if p.include_details {
            DETAILED_FIELDS
        } else {
            SUMMARY_FIELDS
        };

        let request = ApiRequest::get(PRODUCTS_PATH)
            .query("startIndex", p.start_index)
            .query("pageSize", p.page_size)
            .query_opt("q", present(p.query.as_ref()))
            .query_opt("filter", filter)
            .query_opt("sortBy", present(p.sort_by.as_ref()))
            .query("responseFields", collection_fields(projection));

        let result = self
            .client
            .execute(request)
            .await
            .map(|response| paginated(&response, "products"));
        ToolOutcome::from_result(result, || "Failed to search products".to_string())
    }

    async fn details(&self, p: ProductDetails) -> ToolOutcome {
        let mut names = vec![
            "productCode",
            "productName",
            "description",
            "content",
            "price",
            "salePrice",
            "imageUrl",
            "images",
            "categoryId",
            "productUsage",
            "fulfillmentTypesSupported",
            "isPackagedStandAlone",
        ];
        if p.include_variations {
            names.extend(["variations", "options", "properties"]);
        }
        if p.include_pricing {
            names.extend(["priceRange", "priceListEntries"]);
        }
        if p.include_inventory {
            names.push("inventoryInfo");
        }

        let request = ApiRequest::get(format!("{PRODUCTS_PATH}/{}", segment(&p.product_code)))
            .query("responseFields", fields(&names));

        let result = self.client.execute(request).await;
        ToolOutcome::from_result(result, || {
            format!("Failed to retrieve product details for: {}", p.product_code)
        })
    }

    async fn categories(&self, p: CategoryList) -> ToolOutcome {
        let filter = Filter::new()
            .eq_bare("parentCategoryCode", present(p.parent_category_code.as_ref()))
            .build();

        let mut names = vec![
            "categoryCode",
            "categoryId",
            "content",
            "parentCategoryCode",
            "isDisplayed",
            "count",
            "childrenCategories",
        ];
        if p.include_products {
            names.push("products");
        }

        let request = ApiRequest::get(CATEGORIES_PATH)
            .query_opt("filter", filter)
            .query("responseFields", fields(&names));

        let result = self.client.execute(request).await.map(|response| {
            let mut categories = items(&response);
            limit_depth(&mut categories, p.max_depth);
            json!({
                "categories": categories,
                "totalCount": counter(&response, "totalCount"),
            })
        });
        ToolOutcome::from_result(result, || "Failed to retrieve categories".to_string())
    }
}

/// Drop `childrenCategories` below `depth` levels; depth 1 keeps only the
/// listed categories themselves.
fn limit_depth(categories: &mut Value, depth: u32) {
    let Some(list) = categories.as_array_mut() else {
        return;
    };
    for category in list {
        let Some(obj) = category.as_object_mut() else {
            continue;
        };
        if depth <= 1 {
            obj.remove("childrenCategories");
        } else if let Some(children) = obj.get_mut("childrenCategories") {
            limit_depth(children, depth - 1);
        }
    }
}

#[async_trait]
impl ToolGroup for ProductTools {
    fn name(&self) -> &'static str {
        "products"
    }

    fn tools(&self) -> Vec<Tool> {
        Self::definitions()
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutcome> {
        match tool {
            PRODUCT_SEARCH => Ok(self.search(parse_args(arguments)?).await),
            PRODUCT_DETAILS => Ok(self.details(parse_args(arguments)?).await),
            CATEGORY_LIST => Ok(self.categories(parse_args(arguments)?).await),
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }
}
