//! Append-only JSONL file per session

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::entry::JsonLogEntry;

/// Appends entries to `<logs_dir>/<date>_<session>.jsonl`
pub struct SessionLogWriter {
    session: String,
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionLogWriter {
    /// Open (or create) today's file for `session`, creating `logs_dir` if
    /// needed.
    pub fn new(logs_dir: impl AsRef<Path>, session: impl Into<String>) -> io::Result<Self> {
        let session = session.into();
        let logs_dir = logs_dir.as_ref();
        fs::create_dir_all(logs_dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = logs_dir.join(format!("{}_{}.jsonl", date, file_component(&session)));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            session,
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry as a single line and flush.
    pub fn write(&self, entry: &JsonLogEntry) -> io::Result<()> {
        let line = entry
            .to_json_line()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

impl Drop for SessionLogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// `session` reduced to a single file name component
///
/// Anything other than ASCII alphanumerics, `-` and `_` becomes `_`, so
/// separators and dots can never leave `logs_dir`.
fn file_component(session: &str) -> String {
    session
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Read every entry under `logs_dir`, sorted by timestamp.
///
/// Lines that fail to parse are skipped.
#[cfg(test)]
pub(crate) fn read_entries(logs_dir: impl AsRef<Path>) -> io::Result<Vec<JsonLogEntry>> {
    let logs_dir = logs_dir.as_ref();
    if !logs_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(logs_dir)? {
        let path = dir_entry?.path();
        if path.extension().map_or(true, |ext| ext != "jsonl") {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        entries.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .filter_map(|line| JsonLogEntry::from_json_line(line).ok()),
        );
    }

    entries.sort_by(|a, b| a.ts.cmp(&b.ts));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_creates_dated_file() {
        let temp = TempDir::new().unwrap();
        let logs_dir = temp.path().join("logs");

        let writer = SessionLogWriter::new(&logs_dir, "alice").unwrap();
        assert!(writer.path().exists());
        assert!(writer.path().to_string_lossy().ends_with("_alice.jsonl"));
        assert_eq!(writer.session(), "alice");
    }

    #[test]
    fn test_session_with_separators_stays_in_logs_dir() {
        let temp = TempDir::new().unwrap();
        let logs_dir = temp.path().join("logs");

        let team = SessionLogWriter::new(&logs_dir, "team/alice").unwrap();
        assert_eq!(team.path().parent().unwrap(), logs_dir.as_path());
        assert!(team.path().to_string_lossy().ends_with("_team_alice.jsonl"));
        assert_eq!(team.session(), "team/alice");

        let climbing = SessionLogWriter::new(&logs_dir, "x/../../escaped").unwrap();
        assert_eq!(climbing.path().parent().unwrap(), logs_dir.as_path());
        assert!(!temp.path().join("escaped.jsonl").exists());

        team.write(&JsonLogEntry::new("info", "team/alice", "t", "kept"))
            .unwrap();
        drop(team);
        let entries = read_entries(&logs_dir).unwrap();
        assert_eq!(entries[0].session, "team/alice");
    }

    #[test]
    fn test_read_entries_merges_sessions_and_skips_garbage() {
        let temp = TempDir::new().unwrap();
        let logs_dir = temp.path();

        let alice = SessionLogWriter::new(logs_dir, "alice").unwrap();
        let local = SessionLogWriter::new(logs_dir, "local").unwrap();
        alice
            .write(&JsonLogEntry::new("info", "alice", "t", "first"))
            .unwrap();
        local
            .write(&JsonLogEntry::new("info", "local", "t", "second"))
            .unwrap();
        drop(alice);
        drop(local);
        fs::write(logs_dir.join("broken.jsonl"), "not json\n\n").unwrap();
        fs::write(logs_dir.join("notes.txt"), "ignored").unwrap();

        let entries = read_entries(logs_dir).unwrap();
        let sessions: Vec<_> = entries.iter().map(|e| e.session.as_str()).collect();
        assert_eq!(entries.len(), 2);
        assert!(sessions.contains(&"alice"));
        assert!(sessions.contains(&"local"));
    }

    #[test]
    fn test_read_entries_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(read_entries(temp.path().join("nope")).unwrap().is_empty());
    }
}
