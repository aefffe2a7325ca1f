use clap::{Parser, ValueEnum};

use crate::zip::{ArchiveOptions, Utf8Policy};

#[derive(Parser, Debug)]
#[command(name = "zipstream")]
#[command(version)]
#[command(about = "Stream a ZIP archive from local files and HTTP URLs", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipstream out.zip -r photos notes.txt       archive a directory tree and a file\n  \
  zipstream - https://example.com/a.csv > a.zip   stream a download into an archive\n  \
  zipstream -v out.zip -r photos               show members and the exact archive size\n  \
  tar c src | zipstream --stdin-name src.tar - -   wrap stdin as a single member")]
pub struct Cli {
    /// Archive to write, or - for stdout
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Files, directories, HTTP URLs, or - for stdin
    #[arg(value_name = "INPUTS", required = true)]
    pub inputs: Vec<String>,

    /// List members and the predicted archive size, don't write anything
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely (sizes and dates)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Recurse into directories
    #[arg(short = 'r')]
    pub recurse: bool,

    /// Junk paths (store just the file names)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Do not add directory entries
    #[arg(short = 'D')]
    pub no_dir_entries: bool,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Fail instead of writing Zip64 records
    #[arg(long)]
    pub no_zip64: bool,

    /// UTF-8 flag for file names that are not valid text
    #[arg(long, value_enum, default_value_t = Utf8Mode::Auto)]
    pub utf8: Utf8Mode,

    /// Member name for data read from stdin
    #[arg(long, value_name = "NAME", default_value = "-")]
    pub stdin_name: String,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Utf8Mode {
    Auto,
    Always,
    Never,
}

impl From<Utf8Mode> for Utf8Policy {
    fn from(value: Utf8Mode) -> Self {
        match value {
            Utf8Mode::Auto => Utf8Policy::Auto,
            Utf8Mode::Always => Utf8Policy::Always,
            Utf8Mode::Never => Utf8Policy::Never,
        }
    }
}

impl Cli {
    pub fn is_http_url(input: &str) -> bool {
        input.starts_with("http://") || input.starts_with("https://")
    }

    pub fn is_stdout(&self) -> bool {
        self.archive == "-"
    }

    pub fn is_list(&self) -> bool {
        self.list || self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.quiet {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Warn,
            _ => log::LevelFilter::Error,
        }
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            utf8_policy: self.utf8.into(),
            allow_zip64: !self.no_zip64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_into_options() {
        let cli = Cli::try_parse_from([
            "zipstream", "--no-zip64", "--utf8", "never", "-qq", "out.zip", "a", "b",
        ])
        .unwrap();
        assert_eq!(cli.archive, "out.zip");
        assert_eq!(cli.inputs, vec!["a", "b"]);
        assert!(cli.is_very_quiet());
        assert_eq!(cli.log_level(), log::LevelFilter::Error);

        let options = cli.archive_options();
        assert!(!options.allow_zip64);
        assert_eq!(options.utf8_policy, Utf8Policy::Never);
    }

    #[test]
    fn requires_inputs() {
        assert!(Cli::try_parse_from(["zipstream", "out.zip"]).is_err());
    }

    #[test]
    fn recognises_urls_and_stdout() {
        let cli = Cli::try_parse_from(["zipstream", "-", "https://example.com/x"]).unwrap();
        assert!(cli.is_stdout());
        assert!(Cli::is_http_url(&cli.inputs[0]));
        assert!(!Cli::is_http_url("photos/http.txt"));
    }
}
