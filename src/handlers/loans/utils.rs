use crate::config::CONFIG;
use crate::database::DatabaseManager;
use crate::error::ApiError;

/// Resolve tenant database from query parameter or the configured default
pub fn resolve_tenant_db(param: &Option<String>) -> Result<String, ApiError> {
    let tenant_db = param
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| CONFIG.loans.default_tenant.clone())
        .ok_or_else(|| {
            ApiError::bad_request(
                "tenant database not specified; provide ?tenant=tenant_<name> or set KEEPER_TENANT_DB",
            )
        })?;

    if !DatabaseManager::is_valid_db_name(&tenant_db) {
        return Err(ApiError::bad_request(format!(
            "Invalid tenant database name: {}",
            tenant_db
        )));
    }
    Ok(tenant_db)
}
