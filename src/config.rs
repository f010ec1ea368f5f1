use clap::Parser;

/// Command-line configuration, parsed once at startup and immutable for the
/// process lifetime.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-server-starrocks", about = "MCP server for StarRocks")]
pub struct Args {
    /// StarRocks server host
    #[arg(long)]
    pub host: String,

    /// StarRocks server port
    #[arg(long, default_value_t = 9030)]
    pub port: u16,

    /// StarRocks user
    #[arg(long)]
    pub user: String,

    /// StarRocks database
    #[arg(long)]
    pub database: String,

    /// StarRocks password (if required)
    #[arg(long)]
    pub password: Option<String>,

    /// Run in read-only mode
    #[arg(long)]
    pub readonly: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Connection URL for the driver. StarRocks speaks the MySQL wire
    /// protocol, so this is a mysql:// URL.
    pub fn database_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, password, self.host, self.port, self.database
            ),
            None => format!(
                "mysql://{}:@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
        }
    }

    /// Same URL with the password masked, safe for logging.
    pub fn redacted_url(&self) -> String {
        match &self.password {
            Some(_) => format!(
                "mysql://{}:***@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
            None => format!(
                "mysql://{}:@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(
            std::iter::once("mcp-server-starrocks").chain(argv.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["--host", "sr", "--user", "root", "--database", "demo"]);
        assert_eq!(args.port, 9030);
        assert_eq!(args.password, None);
        assert!(!args.readonly);
        assert!(!args.debug);
    }

    #[test]
    fn missing_required_flags_fail() {
        let result = Args::try_parse_from(["mcp-server-starrocks", "--host", "sr"]);
        assert!(result.is_err());
    }

    #[test]
    fn url_without_password() {
        let args = parse(&["--host", "sr", "--user", "root", "--database", "demo"]);
        assert_eq!(args.database_url(), "mysql://root:@sr:9030/demo");
        assert_eq!(args.redacted_url(), "mysql://root:@sr:9030/demo");
    }

    #[test]
    fn url_with_password() {
        let args = parse(&[
            "--host", "sr", "--port", "9131", "--user", "root", "--database", "demo",
            "--password", "hunter2",
        ]);
        assert_eq!(args.database_url(), "mysql://root:hunter2@sr:9131/demo");
        assert_eq!(args.redacted_url(), "mysql://root:***@sr:9131/demo");
    }

    #[test]
    fn readonly_and_debug_flags() {
        let args = parse(&[
            "--host", "sr", "--user", "root", "--database", "demo", "--readonly", "--debug",
        ]);
        assert!(args.readonly);
        assert!(args.debug);
    }
}
