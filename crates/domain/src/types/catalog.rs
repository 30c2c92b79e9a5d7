//! Reference data: companies, products, markings, roles

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Counterparty of an income or outcome document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub inn: Option<String>,
}

/// Payload for creating a company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub phone: String,
    pub inn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub kpi: f64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for creating a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub kpi: f64,
    pub quantity: i64,
}

/// A unique marking code attached to one unit of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMarking {
    pub id: i64,
    pub marking: String,
    #[serde(default)]
    pub product: Option<i64>,
    #[serde(default)]
    pub income: Option<i64>,
    #[serde(default)]
    pub outcome: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for registering a marking code outside an income document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMarking {
    pub marking: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<i64>,
}

/// Permission group as exposed by the admin API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
}
