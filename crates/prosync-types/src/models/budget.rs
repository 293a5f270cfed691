use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Record, nullable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub amount: f64,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub currency: String,
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Record for Budget {
    const TABLE: &'static str = "budgets";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBudget {
    pub owner_id: Uuid,
    pub name: String,
    pub amount: f64,
    pub currency: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub budget_id: Uuid,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub amount: f64,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub category: String,
    #[serde(default)]
    pub spent_on: Option<NaiveDate>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Record for Expense {
    const TABLE: &'static str = "expenses";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewExpense {
    pub budget_id: Uuid,
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub spent_on: Option<NaiveDate>,
    pub created_by: Uuid,
}
