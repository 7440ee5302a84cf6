use serde_json::Value;
use uuid::Uuid;

use crate::{repository::AuditEntry, state::AppState};

/// Records an audit entry. A failing audit store only warns.
pub async fn log_audit(
    state: &AppState,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    let entry = AuditEntry {
        user_id,
        action: action.to_string(),
        resource: resource.map(str::to_string),
        metadata,
    };
    if let Err(err) = state.store.audit.record(entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
