use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "shop-patrol")]
#[command(about = "Scan a marketplace shop and classify IP risk of each product")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "patrol.toml", global = true)]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output", global = true)]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Scan one storefront and classify its products
    Scan {
        /// Storefront URL, e.g. https://www.rakuten.co.jp/<shop>/
        url: String,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Marketplace application id (overrides config)
        #[arg(long)]
        app_id: Option<String>,

        /// AI API key (overrides config)
        #[arg(long)]
        api_key: Option<String>,

        /// Write the results to a CSV file
        #[arg(long)]
        export: Option<String>,
    },

    /// List the most recent scan sessions
    History,

    /// Show the stored results of one session
    Show {
        session_id: String,

        /// Write the results to a CSV file
        #[arg(long)]
        export: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_command() {
        let cli = CliConfig::parse_from([
            "shop-patrol",
            "--verbose",
            "scan",
            "https://www.rakuten.co.jp/example-shop/",
            "--api-key",
            "k",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.config, "patrol.toml");
        match cli.command {
            Command::Scan {
                url, page, api_key, ..
            } => {
                assert_eq!(url, "https://www.rakuten.co.jp/example-shop/");
                assert_eq!(page, 1);
                assert_eq!(api_key.as_deref(), Some("k"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_show_command() {
        let cli = CliConfig::parse_from(["shop-patrol", "show", "abc", "--export", "out.csv"]);
        match cli.command {
            Command::Show { session_id, export } => {
                assert_eq!(session_id, "abc");
                assert_eq!(export.as_deref(), Some("out.csv"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
