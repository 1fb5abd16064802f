use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::CONFIG;
use crate::database::models::{Loan, LoanPatch, LoanRow, LoanStatus, LOAN_TYPE};
use crate::database::{DatabaseError, DatabaseManager, Repository};
use crate::filter::filter::is_identifier;
use crate::filter::{FilterData, FilterError};

/// Persistence collaborator of the reconciler, already scoped to one tenant
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// All loans with `type = 'loan'` and `status = 'active'`
    async fn fetch_active(&self) -> Result<Vec<Loan>, DatabaseError>;

    /// Point update of `paid_installments` (and `status` when set) by id
    async fn apply(&self, loan_id: Uuid, patch: &LoanPatch) -> Result<(), DatabaseError>;
}

/// Resolves the loan store of a tenant database
#[async_trait]
pub trait LoanStoreProvider: Send + Sync {
    async fn store_for(&self, tenant_db: &str) -> Result<Arc<dyn LoanStore>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

pub struct PgLoanStore {
    repository: Repository<LoanRow>,
}

impl PgLoanStore {
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Result<Self, DatabaseError> {
        let table_name = table_name.into();
        if !is_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(table_name).into());
        }
        Ok(Self {
            repository: Repository::new(table_name, pool),
        })
    }

    pub async fn for_tenant(tenant_db: &str) -> Result<Self, DatabaseError> {
        let pool = DatabaseManager::tenant_pool(tenant_db).await?;
        Self::new(CONFIG.loans.table.clone(), pool)
    }
}

#[async_trait]
impl LoanStore for PgLoanStore {
    async fn fetch_active(&self) -> Result<Vec<Loan>, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(json!({ "type": LOAN_TYPE, "status": LoanStatus::Active.as_str() })),
            order: Some(json!("created_at asc")),
            ..Default::default()
        };
        let rows = self.repository.select_any(filter).await?;
        Ok(rows.into_iter().map(Loan::from).collect())
    }

    async fn apply(&self, loan_id: Uuid, patch: &LoanPatch) -> Result<(), DatabaseError> {
        // Table name was checked in `new`
        let sql = format!(
            "UPDATE \"{}\" SET \"paid_installments\" = $1, \"status\" = COALESCE($2, \"status\") WHERE \"id\" = $3",
            self.repository.table_name()
        );

        let result = sqlx::query(&sql)
            .bind(patch.paid_installments)
            .bind(patch.status.as_ref().map(LoanStatus::as_str))
            .bind(loan_id)
            .execute(self.repository.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("loan {}", loan_id)));
        }
        Ok(())
    }
}

/// Tenant stores backed by the shared `DatabaseManager` pools
#[derive(Debug, Default, Clone, Copy)]
pub struct PgStoreProvider;

#[async_trait]
impl LoanStoreProvider for PgStoreProvider {
    async fn store_for(&self, tenant_db: &str) -> Result<Arc<dyn LoanStore>, DatabaseError> {
        Ok(Arc::new(PgLoanStore::for_tenant(tenant_db).await?))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check().await
    }
}

/// In-process loan store with failure injection
#[derive(Default)]
pub struct MemoryLoanStore {
    loans: RwLock<HashMap<Uuid, Loan>>,
    failing_updates: RwLock<HashSet<Uuid>>,
    fail_fetch: AtomicBool,
    fetches: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_loans(loans: impl IntoIterator<Item = Loan>) -> Self {
        let store = Self::new();
        for loan in loans {
            store.insert(loan).await;
        }
        store
    }

    pub async fn insert(&self, loan: Loan) {
        self.loans.write().await.insert(loan.id, loan);
    }

    pub async fn get(&self, loan_id: Uuid) -> Option<Loan> {
        self.loans.read().await.get(&loan_id).cloned()
    }

    /// Make `fetch_active` fail until switched back off
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make every `apply` for this loan fail
    pub async fn fail_updates_for(&self, loan_id: Uuid) {
        self.failing_updates.write().await.insert(loan_id);
    }

    pub async fn clear_failures(&self) {
        self.failing_updates.write().await.clear();
        self.set_fail_fetch(false);
    }

    /// `fetch_active` calls so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Successful `apply` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoanStore for MemoryLoanStore {
    async fn fetch_active(&self) -> Result<Vec<Loan>, DatabaseError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("loan fetch unavailable".to_string()));
        }
        let mut active: Vec<Loan> = self
            .loans
            .read()
            .await
            .values()
            .filter(|loan| loan.status == LoanStatus::Active)
            .cloned()
            .collect();
        active.sort_by_key(|loan| (loan.created_at, loan.id));
        Ok(active)
    }

    async fn apply(&self, loan_id: Uuid, patch: &LoanPatch) -> Result<(), DatabaseError> {
        if self.failing_updates.read().await.contains(&loan_id) {
            return Err(DatabaseError::QueryError(format!("update of loan {} rejected", loan_id)));
        }

        let mut loans = self.loans.write().await;
        let loan = loans
            .get_mut(&loan_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("loan {}", loan_id)))?;
        loan.paid_installments = patch.paid_installments;
        if let Some(status) = &patch.status {
            loan.status = status.clone();
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves one store for every valid tenant name
pub struct SingleStoreProvider {
    store: Arc<dyn LoanStore>,
}

impl SingleStoreProvider {
    pub fn new(store: Arc<dyn LoanStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LoanStoreProvider for SingleStoreProvider {
    async fn store_for(&self, tenant_db: &str) -> Result<Arc<dyn LoanStore>, DatabaseError> {
        if !DatabaseManager::is_valid_db_name(tenant_db) {
            return Err(DatabaseError::InvalidTenantName(tenant_db.to_string()));
        }
        Ok(Arc::clone(&self.store))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
