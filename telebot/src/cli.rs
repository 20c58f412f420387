//! Minimal hand-rolled argument parsing. The CLI surface is small enough
//! (`-h`, `--config PATH`, `--verbose`) that pulling in an argument parsing
//! crate would be more machinery than the job needs.

const DEFAULT_SETTINGS_PATH: &str = "telebot.yaml";

#[derive(Debug, Clone)]
pub struct Cli {
    pub show_help: bool,
    pub settings_path: String,
    pub verbose: bool,
}

impl Cli {
    #[must_use]
    pub fn parse_from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    #[must_use]
    pub fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut cli = Self {
            show_help: false,
            settings_path: DEFAULT_SETTINGS_PATH.to_string(),
            verbose: false,
        };

        let mut args = args.peekable();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => cli.show_help = true,
                "--verbose" => cli.verbose = true,
                "--config" => {
                    if let Some(path) = args.next() {
                        cli.settings_path = path;
                    } else {
                        log::error!("--config requires a path argument");
                    }
                }
                other => log::warn!("ignoring unrecognized argument '{other}'"),
            }
        }

        cli
    }
}

pub fn print_help() {
    println!("telebot [-h] [--config PATH] [--verbose]");
    println!();
    println!("  -h, --help      print this message and exit");
    println!("  --config PATH   path to the settings file (default: {DEFAULT_SETTINGS_PATH})");
    println!("  --verbose       equivalent to RUST_LOG=debug");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_default_settings_path() {
        let cli = Cli::parse(std::iter::empty());
        assert_eq!(cli.settings_path, DEFAULT_SETTINGS_PATH);
        assert!(!cli.show_help);
    }

    #[test]
    fn parses_config_path() {
        let cli = Cli::parse(vec!["--config".to_string(), "other.yaml".to_string()].into_iter());
        assert_eq!(cli.settings_path, "other.yaml");
    }

    #[test]
    fn help_flag_is_recognized() {
        let cli = Cli::parse(vec!["-h".to_string()].into_iter());
        assert!(cli.show_help);
    }
}
