//! Minimal CLI parsing for the schema tool.

use std::env;

#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    /// Create missing tables, columns and indexes
    pub push: bool,
    /// Print the DDL for every model and exit
    pub print_schema: bool,
    pub database_url: Option<String>,
    pub help: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--push" => options.push = true,
                "--print-schema" => options.print_schema = true,
                "-h" | "--help" => options.help = true,
                "--database-url" => {
                    if let Some(value) = args.next() {
                        options.database_url = Some(value);
                    }
                }
                _ if arg.starts_with("--database-url=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.database_url = Some(value.to_string());
                    }
                }
                _ => {}
            }
        }
        options
    }

    pub fn usage() -> &'static str {
        "Usage: roadmap-client [--push] [--print-schema] [--database-url <url>]"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_flags() {
        let options = parse(&["--push", "--print-schema"]);
        assert!(options.push);
        assert!(options.print_schema);
        assert_eq!(options.database_url, None);
    }

    #[test]
    fn test_database_url_forms() {
        assert_eq!(
            parse(&["--database-url", "sqlite:a.db"]).database_url.as_deref(),
            Some("sqlite:a.db")
        );
        assert_eq!(
            parse(&["--database-url=sqlite:b.db"]).database_url.as_deref(),
            Some("sqlite:b.db")
        );
    }

    #[test]
    fn test_unknown_args_are_ignored() {
        assert_eq!(parse(&["--verbose"]), CliOptions::default());
    }
}
