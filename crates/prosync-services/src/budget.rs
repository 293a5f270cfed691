use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info};
use uuid::Uuid;

use prosync_remote::RemoteClient;
use prosync_types::Query;
use prosync_types::models::budget::{Budget, Expense, NewBudget, NewExpense};

use crate::ServiceError;
use crate::rows::{self, current_user, required};

/// Spending against one budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Utilization {
    pub budgeted: f64,
    pub spent: f64,
    /// Negative when over budget.
    pub remaining: f64,
    /// Share of the budget spent, in percent. 0 for a zero budget with no
    /// spending, 100 for a zero budget with any spending.
    pub percent_used: f64,
}

impl Utilization {
    pub fn is_over_budget(&self) -> bool {
        self.spent > self.budgeted
    }
}

pub fn utilization(budget: &Budget, expenses: &[Expense]) -> Utilization {
    let spent: f64 = expenses
        .iter()
        .filter(|e| e.budget_id == budget.id)
        .map(|e| e.amount)
        .sum();
    let percent_used = if budget.amount > 0.0 {
        spent / budget.amount * 100.0
    } else if spent > 0.0 {
        100.0
    } else {
        0.0
    };
    Utilization {
        budgeted: budget.amount,
        spent,
        remaining: budget.amount - spent,
        percent_used,
    }
}

pub struct BudgetService<R> {
    remote: Arc<R>,
}

impl<R> Clone for BudgetService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
        }
    }
}

impl<R: RemoteClient> BudgetService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// The current user's budgets.
    pub async fn list_budgets(&self) -> Result<Vec<Budget>, ServiceError> {
        let owner_id = current_user(&*self.remote)?;
        let query = Query::table("budgets")
            .eq("owner_id", owner_id.to_string())
            .order_by("created_at", true);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to list budgets: {}", e))
    }

    pub async fn create_budget(
        &self,
        name: &str,
        amount: f64,
        currency: &str,
        period: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Budget, ServiceError> {
        let owner_id = current_user(&*self.remote)?;
        let name = required("Budget name", name)?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(ServiceError::validation("Amount must be zero or more"));
        }
        if let Some((start, end)) = period {
            if end < start {
                return Err(ServiceError::validation("Period ends before it starts"));
            }
        }

        let payload = NewBudget {
            owner_id,
            name,
            amount,
            currency: currency.trim().to_uppercase(),
            period_start: period.map(|(start, _)| start),
            period_end: period.map(|(_, end)| end),
        };
        let budget: Budget = rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to create budget: {}", e))?;
        info!("Created budget '{}'", budget.name);
        Ok(budget)
    }

    pub async fn add_expense(
        &self,
        budget_id: Uuid,
        description: &str,
        amount: f64,
        category: &str,
        spent_on: Option<NaiveDate>,
    ) -> Result<Expense, ServiceError> {
        let created_by = current_user(&*self.remote)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ServiceError::validation("Amount must be positive"));
        }

        let result: Result<Expense, ServiceError> = async {
            let budget: Budget = rows::fetch_one(&*self.remote, budget_id).await?;
            let payload = NewExpense {
                budget_id: budget.id,
                description: description.trim().to_string(),
                amount,
                category: category.trim().to_string(),
                spent_on,
                created_by,
            };
            rows::insert(&*self.remote, &payload).await
        }
        .await;
        result.inspect_err(|e| error!("Failed to add expense to budget {}: {}", budget_id, e))
    }

    /// Expenses of a budget, oldest first.
    pub async fn list_expenses(&self, budget_id: Uuid) -> Result<Vec<Expense>, ServiceError> {
        let query = Query::table("expenses")
            .eq("budget_id", budget_id.to_string())
            .order_by("created_at", true);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to list expenses of budget {}: {}", budget_id, e))
    }

    pub async fn delete_expense(&self, id: Uuid) -> Result<(), ServiceError> {
        rows::delete::<Expense, _>(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to delete expense {}: {}", id, e))
    }
}
