use sqlx::PgPool;

/// Create the rule and action tables and their indexes if they do not
/// already exist.
pub async fn run_migrations(pool: &PgPool, prefix: &str) -> Result<(), sqlx::Error> {
    let rules = format!("{prefix}rules");
    let actions = format!("{prefix}actions");

    let statements = [
        format!(
            "
            CREATE TABLE IF NOT EXISTS {rules} (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                enabled     BOOLEAN NOT NULL,
                priority    INTEGER NOT NULL DEFAULT 0,
                document    JSONB NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL
            )
            "
        ),
        format!(
            "
            CREATE TABLE IF NOT EXISTS {actions} (
                id           TEXT PRIMARY KEY,
                rule_id      TEXT NOT NULL,
                cluster_id   TEXT NOT NULL,
                namespace    TEXT NOT NULL,
                status       TEXT NOT NULL,
                action_type  TEXT NOT NULL,
                created_at   TIMESTAMPTZ NOT NULL,
                document     JSONB NOT NULL
            )
            "
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{prefix}rules_enabled ON {rules} (enabled)"),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}actions_rule_time ON {actions} (rule_id, created_at DESC)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}actions_status_time ON {actions} (status, created_at DESC)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}actions_cluster_ns ON {actions} (cluster_id, namespace, created_at DESC)"
        ),
    ];

    for stmt in &statements {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
