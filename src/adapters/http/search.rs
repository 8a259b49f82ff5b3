use crate::domain::model::{CatalogPage, ProductDescriptor};
use crate::domain::ports::{CatalogSearch, Credentials};
use crate::utils::error::{PatrolError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

/// 市集商品搜尋 API 客戶端
pub struct MarketplaceSearchClient {
    client: Client,
    endpoint: String,
    hits_per_page: u32,
}

impl MarketplaceSearchClient {
    pub fn new(endpoint: impl Into<String>, hits_per_page: u32) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            hits_per_page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Items", default)]
    items: Vec<ItemWrapper>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemWrapper {
    #[serde(rename = "Item")]
    item: Item,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    item_name: String,
    item_price: i64,
    item_url: String,
    #[serde(default)]
    medium_image_urls: Vec<ImageUrl>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageUrl {
    image_url: String,
}

impl From<Item> for ProductDescriptor {
    fn from(item: Item) -> Self {
        let image_url = item
            .medium_image_urls
            .into_iter()
            .next()
            .map(|img| strip_query(&img.image_url))
            .filter(|url| !url.is_empty());

        ProductDescriptor {
            name: item.item_name,
            price_minor: item.item_price,
            page_url: item.item_url,
            image_url,
        }
    }
}

/// 從商店網址取出商店識別碼：路徑的第一段
///
/// `https://www.rakuten.co.jp/example-shop/` → `example-shop`
pub fn extract_shop_identifier(source_url: &str) -> Option<String> {
    let url = Url::parse(source_url.trim()).ok()?;
    url.path_segments()?
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// 去掉圖片網址的快取參數
pub fn strip_query(image_url: &str) -> String {
    image_url
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl CatalogSearch for MarketplaceSearchClient {
    async fn search(
        &self,
        source_url: &str,
        credentials: &Credentials,
        page: u32,
    ) -> Result<CatalogPage> {
        let shop_identifier =
            extract_shop_identifier(source_url).ok_or_else(|| PatrolError::ScanStartError {
                message: format!("could not determine shop identifier from {}", source_url),
            })?;

        tracing::debug!(
            "Searching catalog for shop {} (page {}) at {}",
            shop_identifier,
            page,
            self.endpoint
        );

        let hits = self.hits_per_page.to_string();
        let page = page.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json"),
                ("shopCode", shop_identifier.as_str()),
                ("applicationId", credentials.marketplace_app_id.as_str()),
                ("hits", hits.as_str()),
                ("page", page.as_str()),
                ("imageFlag", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Search API response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PatrolError::RateLimited);
        }

        let body = response.text().await?;
        let parsed: Option<SearchResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.error_description.or(p.error))
                .unwrap_or_else(|| "marketplace API error".to_string());
            return Err(PatrolError::SearchError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = match parsed {
            Some(parsed) => parsed,
            None => serde_json::from_str::<SearchResponse>(&body)?,
        };

        if let Some(error) = parsed.error {
            return Err(PatrolError::SearchError {
                status: status.as_u16(),
                message: parsed.error_description.unwrap_or(error),
            });
        }

        let products: Vec<ProductDescriptor> = parsed
            .items
            .into_iter()
            .map(|wrapper| wrapper.item.into())
            .collect();

        tracing::info!(
            "🔎 Found {} products for shop {}",
            products.len(),
            shop_identifier
        );

        Ok(CatalogPage {
            shop_identifier,
            products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn credentials() -> Credentials {
        Credentials {
            marketplace_app_id: "app-1".to_string(),
            ai_api_key: "key-1".to_string(),
        }
    }

    #[test]
    fn test_extract_shop_identifier() {
        assert_eq!(
            extract_shop_identifier("https://www.rakuten.co.jp/example-shop/"),
            Some("example-shop".to_string())
        );
        assert_eq!(
            extract_shop_identifier("https://www.rakuten.co.jp/example-shop/item/123?x=1"),
            Some("example-shop".to_string())
        );
        assert_eq!(extract_shop_identifier("https://www.rakuten.co.jp/"), None);
        assert_eq!(extract_shop_identifier("not a url"), None);
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(
            strip_query("https://thumbnail.example.com/a.jpg?_ex=128x128"),
            "https://thumbnail.example.com/a.jpg"
        );
        assert_eq!(strip_query("https://x/b.png"), "https://x/b.png");
    }

    #[tokio::test]
    async fn test_search_maps_products() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/search")
                .query_param("shopCode", "example-shop")
                .query_param("applicationId", "app-1")
                .query_param("page", "2")
                .query_param("imageFlag", "1");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "Items": [
                        {"Item": {
                            "itemName": "Logo T-shirt",
                            "itemPrice": 2980,
                            "itemUrl": "https://item.example.com/1",
                            "mediumImageUrls": [{"imageUrl": "https://img.example.com/1.jpg?_ex=128x128"}]
                        }},
                        {"Item": {
                            "itemName": "Plain mug",
                            "itemPrice": 800,
                            "itemUrl": "https://item.example.com/2",
                            "mediumImageUrls": []
                        }}
                    ]
                }));
        });

        let client = MarketplaceSearchClient::new(server.url("/search"), 30);
        let page = client
            .search("https://www.rakuten.co.jp/example-shop/", &credentials(), 2)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(page.shop_identifier, "example-shop");
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.products[0].name, "Logo T-shirt");
        assert_eq!(page.products[0].price_minor, 2980);
        assert_eq!(
            page.products[0].image_url.as_deref(),
            Some("https://img.example.com/1.jpg")
        );
        assert_eq!(page.products[1].image_url, None);
    }

    #[tokio::test]
    async fn test_search_rate_limited() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(429);
        });

        let client = MarketplaceSearchClient::new(server.url("/search"), 30);
        let err = client
            .search("https://www.rakuten.co.jp/example-shop/", &credentials(), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, PatrolError::RateLimited));
    }

    #[tokio::test]
    async fn test_search_error_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(400).json_body(serde_json::json!({
                "error": "wrong_parameter",
                "error_description": "specify valid applicationId"
            }));
        });

        let client = MarketplaceSearchClient::new(server.url("/search"), 30);
        let err = client
            .search("https://www.rakuten.co.jp/example-shop/", &credentials(), 1)
            .await
            .unwrap_err();

        match err {
            PatrolError::SearchError { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "specify valid applicationId");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unresolvable_shop_url_does_not_call_api() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(serde_json::json!({"Items": []}));
        });

        let client = MarketplaceSearchClient::new(server.url("/search"), 30);
        let err = client
            .search("https://www.rakuten.co.jp/", &credentials(), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, PatrolError::ScanStartError { .. }));
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_application_id() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = MarketplaceSearchClient::new(format!("http://127.0.0.1:{}/search", port), 30);
        let credentials = Credentials {
            marketplace_app_id: "SECRET-APP-ID".to_string(),
            ai_api_key: "key-1".to_string(),
        };

        let err = client
            .search("https://www.rakuten.co.jp/shop/", &credentials, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, PatrolError::ApiError(_)));
        assert!(!err.to_string().contains("SECRET-APP-ID"));
        assert!(!err.user_friendly_message().contains("SECRET-APP-ID"));
    }
}
