//! Main entry point for the zipstream CLI application.
//!
//! This binary builds a ZIP archive from local files, directories, HTTP URLs and
//! stdin, streaming it to a file or stdout without holding it in memory.

use anyhow::Result;
use clap::Parser;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use zipstream::{
    ArchiveOptions, Cli, EntryMetadata, EntryName, HttpSource, Input, ReaderSource, ZipError,
    ZipStream, predict_length,
};

/// One member to add, as found on the command line
#[derive(Debug, Clone)]
enum InputSpec {
    /// A file or directory and its name inside the archive
    Path { path: PathBuf, name: EntryName },
    Url(String),
    Stdin,
}

/// Application entry point.
///
/// Parses command-line arguments, collects the members and either lists them
/// with the predicted archive size or writes the archive.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .format_timestamp(None)
        .format_target(false)
        .init();

    let options = cli.archive_options();
    let specs = collect_inputs(&cli)?;

    // List mode: describe the archive and exit
    if cli.is_list() {
        return list_members(&specs, &cli, &options).await;
    }

    write_archive(specs, &cli, options).await
}

/// Expand command-line inputs into archive members.
///
/// Directories contribute a directory entry (unless `-D`) and, with `-r`, their
/// whole tree in name order. Members matching an `-x` pattern are skipped.
///
/// # Arguments
///
/// * `cli` - Parsed command-line arguments
///
/// # Returns
///
/// The members in archive order.
fn collect_inputs(cli: &Cli) -> Result<Vec<InputSpec>> {
    let mut specs = Vec::new();

    for input in &cli.inputs {
        if input == "-" {
            specs.push(InputSpec::Stdin);
        } else if Cli::is_http_url(input) {
            specs.push(InputSpec::Url(input.clone()));
        } else {
            collect_path(Path::new(input), cli, &mut specs)?;
        }
    }

    Ok(specs)
}

/// Add a local path, descending into directories when recursing.
fn collect_path(path: &Path, cli: &Cli, specs: &mut Vec<InputSpec>) -> Result<()> {
    let name = archive_name(path, cli.junk_paths);

    if let Some(name) = &name {
        let display = String::from_utf8_lossy(match name {
            EntryName::Text(s) => s.as_bytes(),
            EntryName::Raw(b) => b.as_slice(),
        })
        .into_owned();
        if is_excluded(&display, cli) {
            log::debug!("Excluded: {}", display);
            return Ok(());
        }
    }

    let metadata = std::fs::metadata(path)?;
    if !metadata.is_dir() {
        let Some(name) = name else {
            log::warn!("Skipping: {} (no usable name)", path.display());
            return Ok(());
        };
        specs.push(InputSpec::Path {
            path: path.to_path_buf(),
            name,
        });
        return Ok(());
    }

    // `.` and `/` have no name of their own, only their contents are added.
    // Junked paths have no directory structure to record.
    if let Some(name) = name
        && !cli.no_dir_entries
        && !cli.junk_paths
    {
        specs.push(InputSpec::Path {
            path: path.to_path_buf(),
            name,
        });
    }

    if cli.recurse {
        let mut children: Vec<PathBuf> = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        children.sort();
        for child in children {
            collect_path(&child, cli, specs)?;
        }
    }

    Ok(())
}

/// Name of a path inside the archive: its normal components joined by `/`.
///
/// Root, `.` and `..` components are dropped so members can't escape the
/// extraction directory.
fn archive_name(path: &Path, junk_paths: bool) -> Option<EntryName> {
    let components: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();

    let parts = if junk_paths {
        &components[components.len().checked_sub(1)?..]
    } else {
        &components[..]
    };
    if parts.is_empty() {
        return None;
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        let bytes: Vec<&[u8]> = parts.iter().map(|p| p.as_bytes()).collect();
        Some(EntryName::Raw(bytes.join(&b'/')))
    }

    #[cfg(not(unix))]
    {
        let parts: Vec<_> = parts.iter().map(|p| p.to_string_lossy()).collect();
        Some(EntryName::Text(parts.join("/")))
    }
}

/// Check a member name against the `-x` patterns.
///
/// A pattern matches the full name or just its last component.
fn is_excluded(name: &str, cli: &Cli) -> bool {
    let basename = name.rsplit('/').next().unwrap_or(name);
    cli.exclude
        .iter()
        .any(|x| glob_match(x, name) || glob_match(x, basename))
}

/// Turn a member into an input for the encoder.
async fn open_input(spec: InputSpec, stdin_name: &str) -> Result<Input> {
    Ok(match spec {
        InputSpec::Path { path, name } => Input::File {
            path,
            name: Some(name),
        },
        InputSpec::Url(url) => HttpSource::open(&url).await?,
        InputSpec::Stdin => Input::stream(stdin_name, None, ReaderSource::stdin()),
    })
}

/// Describe a member without reading its data.
async fn describe(spec: &InputSpec, cli: &Cli, options: &ArchiveOptions) -> Result<EntryMetadata> {
    let input = match spec {
        InputSpec::Path { path, name } => Input::File {
            path: path.clone(),
            name: Some(name.clone()),
        },
        InputSpec::Url(url) => HttpSource::probe(url).await?,
        InputSpec::Stdin => Input::Meta {
            name: cli.stdin_name.as_str().into(),
            size: None,
            modified: None,
            crc32: None,
        },
    };
    Ok(input.metadata(options).await?)
}

/// List the members and the predicted archive size.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just member names, one per line
/// - Verbose format (`-v`): Table with size and timestamp of each member
///
/// # Arguments
///
/// * `specs` - The members to describe
/// * `cli` - Parsed command-line arguments
/// * `options` - Archive options, which affect the predicted size
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if a member can't be described.
async fn list_members(specs: &[InputSpec], cli: &Cli, options: &ArchiveOptions) -> Result<()> {
    let mut members = Vec::with_capacity(specs.len());
    for spec in specs {
        members.push(describe(spec, cli, options).await?);
    }

    if cli.verbose {
        println!("{:>10}  {:>10}  {:>5}  Name", "Length", "Date", "Time");
        println!("{}", "-".repeat(50));
    }

    for member in &members {
        if cli.verbose {
            let (year, month, day) = member.modified.dos.ymd();
            let (hour, minute, _second) = member.modified.dos.hms();
            let length = match member.size {
                zipstream::DeclaredSize::Known(n) => n.to_string(),
                zipstream::DeclaredSize::Unknown => "?".to_string(),
            };
            println!(
                "{:>10}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                length,
                year,
                month,
                day,
                hour,
                minute,
                member.display_name()
            );
        } else {
            println!("{}", member.display_name());
        }
    }

    if cli.verbose {
        println!("{}", "-".repeat(50));
    }

    match predict_length(&members, options) {
        Ok(length) => println!(
            "{} members, archive size {} ({})",
            members.len(),
            length,
            format_size(length)
        ),
        Err(ZipError::UnknownSize { name }) => println!(
            "{} members, archive size unknown ('{}' has no declared size)",
            members.len(),
            name
        ),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Write the archive to the output file or stdout.
///
/// Members are opened one at a time by a producer task, so large trees don't hold
/// a file handle per member. When every size is known up front the exact archive
/// size is announced before the first byte is written.
///
/// # Arguments
///
/// * `specs` - The members to add, in order
/// * `cli` - Parsed command-line arguments
/// * `options` - Archive options
///
/// # Returns
///
/// Returns `Ok(())` on success. On failure a partially written output file is
/// removed, since a truncated archive is not a valid one.
async fn write_archive(specs: Vec<InputSpec>, cli: &Cli, options: ArchiveOptions) -> Result<()> {
    let predicted = predict_size(&specs, cli, &options).await;
    match predicted {
        Some(length) => log::info!("Archive size: {} ({})", length, format_size(length)),
        None => log::info!("Archive size: unknown until written"),
    }

    let result = if cli.is_stdout() {
        stream_archive(specs, cli, options, &mut tokio::io::stdout()).await
    } else {
        let path = Path::new(&cli.archive);
        let mut file = tokio::fs::File::create(path).await?;
        let result = stream_archive(specs, cli, options, &mut file).await;
        if result.is_err() {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(path).await {
                log::warn!("Could not remove partial archive {}: {}", path.display(), e);
            }
        }
        result
    };

    let written = result?;
    // inputs changed between the size check and the read
    if let Some(length) = predicted
        && length != written
    {
        log::warn!("Archive is {} bytes, {} were announced", written, length);
    }
    if !cli.is_very_quiet() && !cli.is_stdout() {
        log::info!("Wrote {} ({})", cli.archive, format_size(written));
    }

    Ok(())
}

/// Predict the archive size, or `None` when some member's size is unknown.
async fn predict_size(specs: &[InputSpec], cli: &Cli, options: &ArchiveOptions) -> Option<u64> {
    let mut members = Vec::with_capacity(specs.len());
    for spec in specs {
        match describe(spec, cli, options).await {
            Ok(member) => members.push(member),
            Err(e) => {
                log::debug!("Cannot describe member: {}", e);
                return None;
            }
        }
    }

    match predict_length(&members, options) {
        Ok(length) => Some(length),
        Err(e) => {
            log::debug!("Cannot predict archive size: {}", e);
            None
        }
    }
}

/// Feed members to the encoder from a separate task and drain it into `out`.
async fn stream_archive<W: AsyncWrite + Unpin>(
    specs: Vec<InputSpec>,
    cli: &Cli,
    options: ArchiveOptions,
    out: &mut W,
) -> Result<u64> {
    let (tx, rx) = mpsc::channel(1);
    let stdin_name = cli.stdin_name.clone();
    let show_progress = !cli.is_quiet() && !cli.is_stdout();

    let producer = tokio::spawn(async move {
        for spec in specs {
            let entry = match open_input(spec, &stdin_name).await {
                Ok(input) => input.into_entry(&options).await,
                Err(e) => Err(ZipError::Io(std::io::Error::other(e))),
            };
            if show_progress
                && let Ok(entry) = &entry
            {
                log::info!("  adding: {}", entry.metadata.display_name());
            }
            // the encoder is gone once it failed or finished
            if tx.send(entry).await.is_err() {
                break;
            }
        }
    });

    let mut stream = ZipStream::from_channel(rx, options);
    let result = stream.write_to(out).await;
    drop(stream);
    producer.await?;

    let written = result?;
    out.flush().await?;
    Ok(written)
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// This is a basic implementation for file matching:
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
///
/// # Arguments
///
/// * `pattern` - The glob pattern to match against
/// * `text` - The text to check for a match
///
/// # Returns
///
/// Returns `true` if the text matches the pattern, `false` otherwise.
///
/// # Examples
///
/// ```ignore
/// assert!(glob_match("*.o", "main.o"));
/// assert!(glob_match("photo?.jpg", "photo1.jpg"));
/// assert!(!glob_match("*.o", "main.rs"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    /// Recursive helper function for glob matching.
    ///
    /// Uses a simple backtracking algorithm to handle `*` wildcards.
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            // Both exhausted: match successful
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                // Try matching zero characters (skip the star)
                // OR matching one character (keep the star for more)
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            // Question mark matches exactly one character
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            // Literal character match
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            // No match
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
///
/// # Arguments
///
/// * `size` - The size in bytes to format
///
/// # Returns
///
/// A formatted string with the size and appropriate unit.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_patterns() {
        assert!(glob_match("*.txt", "readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(!glob_match("*.txt", "readme.md"));
    }

    #[test]
    fn archive_names_drop_roots_and_parents() {
        let name = archive_name(Path::new("/tmp/../photos/./a.jpg"), false).unwrap();
        let bytes = match name {
            EntryName::Text(s) => s.into_bytes(),
            EntryName::Raw(b) => b,
        };
        assert_eq!(bytes, b"tmp/photos/a.jpg");

        let junked = archive_name(Path::new("photos/a.jpg"), true).unwrap();
        assert!(matches!(junked, EntryName::Raw(ref b) if b == b"a.jpg")
            || matches!(junked, EntryName::Text(ref s) if s == "a.jpg"));

        assert!(archive_name(Path::new("/"), false).is_none());
        assert!(archive_name(Path::new(".."), true).is_none());
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }
}
