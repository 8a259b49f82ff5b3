use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 商品描述，由目錄搜尋產生後不再變動
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDescriptor {
    pub name: String,
    /// 價格（最小貨幣單位）
    pub price_minor: i64,
    pub page_url: String,
    pub image_url: Option<String>,
}

/// 搜尋回應：商店識別碼與商品列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub shop_identifier: String,
    pub products: Vec<ProductDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    /// 分類失敗，並非風險判斷
    Error,
}

impl RiskLevel {
    /// 解析模型回傳的標籤，接受英文與日文標示
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "高" => Some(RiskLevel::High),
            "中" => Some(RiskLevel::Medium),
            "低" => Some(RiskLevel::Low),
            "エラー" => Some(RiskLevel::Error),
            other => match other.to_ascii_lowercase().as_str() {
                "high" => Some(RiskLevel::High),
                "medium" => Some(RiskLevel::Medium),
                "low" => Some(RiskLevel::Low),
                "error" => Some(RiskLevel::Error),
                _ => None,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::Error => "Error",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationOutcome {
    pub risk_level: RiskLevel,
    pub reason: String,
}

impl ClassificationOutcome {
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Error,
            reason: reason.into(),
        }
    }
}

/// 單一商品的掃描結果，附加到結果紀錄後不可變
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    #[serde(flatten)]
    pub product: ProductDescriptor,
    #[serde(flatten)]
    pub outcome: ClassificationOutcome,
    pub observed_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn new(product: ProductDescriptor, outcome: ClassificationOutcome) -> Self {
        Self {
            product,
            outcome,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScanStats {
    /// Error 結果只計入 total
    pub fn errors(&self) -> usize {
        self.total - (self.high + self.medium + self.low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSession {
    pub session_id: String,
    pub shop_identifier: String,
    pub source_url: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub item_count: usize,
}

/// 持久化的結果文件，以 session_id 關聯到 ScanSession
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    pub session_id: String,
    #[serde(flatten)]
    pub result: ScanResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_labels() {
        assert_eq!(RiskLevel::from_label("高"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::from_label(" medium "), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::from_label("LOW"), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::from_label("unknown"), None);
    }

    #[test]
    fn test_scan_result_json_shape() {
        let result = ScanResult::new(
            ProductDescriptor {
                name: "Tote bag".to_string(),
                price_minor: 1980,
                page_url: "https://item.example.com/shop/1".to_string(),
                image_url: None,
            },
            ClassificationOutcome {
                risk_level: RiskLevel::Medium,
                reason: "parody logo".to_string(),
            },
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["name"], "Tote bag");
        assert_eq!(json["priceMinor"], 1980);
        assert_eq!(json["riskLevel"], "Medium");
        assert!(json.get("observedAt").is_some());

        let back: ScanResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_stats_error_count() {
        let stats = ScanStats {
            total: 5,
            high: 1,
            medium: 1,
            low: 1,
        };
        assert_eq!(stats.errors(), 2);
    }
}
