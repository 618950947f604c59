use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dex")]
#[command(about = "Generation-I species list with a cache that survives restarts.")]
#[command(version)]
pub struct Cli {
    /// Refetch even if the cached list is fresh
    #[arg(short = 'r', long)]
    pub refetch: bool,

    /// Print every state change (loading, background refresh) instead of only the final one
    #[arg(short = 'l', long)]
    pub live: bool,

    /// Output the cache entry as JSON
    #[arg(long)]
    pub json: bool,

    /// Choose color theme
    #[arg(short = 'T', long)]
    pub theme: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Show cache status
    #[arg(long)]
    pub status: bool,

    /// Drop the cache and its stored snapshot
    #[arg(long)]
    pub clear_cache: bool,

    /// Generate config sample
    #[arg(long)]
    pub generate_config: bool,

    /// Edit configuration file
    #[arg(long)]
    pub edit_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["dex", "-r", "--live", "-T", "wudao"]);
        assert!(cli.refetch);
        assert!(cli.live);
        assert_eq!(cli.theme.as_deref(), Some("wudao"));
        assert!(!cli.json);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["dex"]);
        assert!(!cli.refetch && !cli.live && !cli.status && !cli.clear_cache);
        assert!(cli.theme.is_none());
    }
}
