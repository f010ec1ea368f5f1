use std::fmt;

#[derive(Debug)]
pub enum GatewayError {
    /// The database connection could not be established at startup. Fatal.
    Connection(sqlx::Error),
    /// Malformed tool invocation: unknown tool, missing or wrong-typed
    /// argument, non-SELECT read-query, invalid identifier.
    Validation(String),
    /// A mutating tool was invoked while the server is read-only.
    Policy(String),
    /// The database rejected or failed to execute a statement.
    Query(sqlx::Error),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Connection(e) => write!(f, "Database connection failed: {e}"),
            GatewayError::Validation(msg) => write!(f, "{msg}"),
            GatewayError::Policy(msg) => write!(f, "{msg}"),
            GatewayError::Query(e) => write!(f, "Query execution failed: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Connection(e) | GatewayError::Query(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        GatewayError::Query(e)
    }
}
