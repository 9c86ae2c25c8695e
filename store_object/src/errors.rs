use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error in {table}.{operation}: {source}")]
    DatabaseError {
        table: &'static str,
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn database_operation(table: &'static str, operation: &'static str, source: sqlx::Error) -> Self {
        tracing::warn!(table, operation, error = %source, "database lookup failed");
        Self::DatabaseError {
            table,
            operation,
            source,
        }
    }
}
