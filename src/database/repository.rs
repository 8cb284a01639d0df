use crate::database::error::DatabaseError;
use async_trait::async_trait;
use bigdecimal::BigDecimal;

/// A settled payment as it is written to the `transactions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub transaction_id: String,
    /// Major units
    pub amount: BigDecimal,
    pub payni_user_id: Option<String>,
    pub currency_id: Option<String>,
    pub is_found: bool,
}

/// Write side of transaction persistence.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Returns `false` when a row with the same `transaction_id` already exists.
    async fn record_transaction(&self, transaction: &NewTransaction) -> Result<bool, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}
