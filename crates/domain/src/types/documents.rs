//! Income and outcome documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::catalog::{Company, ProductMarking};

/// Goods received from a supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: i64,
    pub from_company: Company,
    #[serde(default)]
    pub contract_date: Option<String>,
    #[serde(default)]
    pub contract_number: String,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub unit_of_measure: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub is_archive: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Goods shipped to a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: i64,
    pub to_company: Company,
    #[serde(default)]
    pub contract_date: Option<String>,
    #[serde(default)]
    pub contract_number: String,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub unit_of_measure: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub is_archive: bool,
    #[serde(default)]
    pub product_markings: Vec<ProductMarking>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
