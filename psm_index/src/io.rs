//! Reads and writes record line files, and names/enumerates the per-charge partition files of
//! a persisted directory.
//!

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};

use crate::data::Psm;
use crate::error::{Error, Result};

pub const PARTITION_EXTENSION: &str = "txt";

/// Writes one record per line, truncating any existing file.
pub fn write_psms<'a, I>(path: &Path, psms: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Psm>,
{
    let fd = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let mut writer = BufWriter::new(fd);
    let mut count = 0;
    for psm in psms {
        writeln!(writer, "{}", psm)?;
        count += 1;
    }
    writer.flush()?;

    Ok(count)
}

/// Reads every non-blank line of `path` as a record; the first bad line aborts the read.
pub fn read_psms(path: &Path) -> Result<Vec<Psm>> {
    let reader = BufReader::new(File::open(path)?);

    let mut psms = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        psms.push(Psm::deserialize(&line)?);
    }

    Ok(psms)
}

pub fn partition_path(directory: &Path, charge: i32) -> PathBuf {
    directory.join(format!("{}.{}", charge, PARTITION_EXTENSION))
}

/// Parses the charge out of a `<charge>.txt` file name.
pub fn charge_from_path(path: &Path) -> Result<i32> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<i32>().ok())
        .ok_or_else(|| Error::InvalidPartitionFile(path.to_path_buf()))
}

/// Lists `(charge, path)` for every partition file in `directory`, sorted by charge.
pub fn partition_files(directory: &Path) -> Result<Vec<(i32, PathBuf)>> {
    if !directory.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a directory: {}", directory.display()),
        )));
    }

    let escaped = Pattern::escape(&directory.to_string_lossy());
    let pattern = format!("{}/*.{}", escaped, PARTITION_EXTENSION);

    let entries = glob(&pattern).map_err(|e| Error::Configuration(e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::Io(e.into()))?;
        if !path.is_file() {
            continue;
        }
        files.push((charge_from_path(&path)?, path));
    }
    files.sort_by_key(|(charge, _)| *charge);

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::fixture;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.txt");

        let psms = fixture();
        let written = write_psms(&path, &psms).unwrap();
        assert_eq!(written, psms.len());

        let read = read_psms(&path).unwrap();
        assert_eq!(read, psms);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.txt");
        let record = &fixture()[0];
        std::fs::write(&path, format!("\n{}\n\n", record)).unwrap();

        assert_eq!(read_psms(&path).unwrap(), vec![record.clone()]);
    }

    #[test]
    fn malformed_line_fails_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.txt");
        std::fs::write(&path, "1,1005.0,250.0\n").unwrap();

        assert!(matches!(read_psms(&path), Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_psms(&dir.path().join("nope.txt")), Err(Error::Io(_))));
    }

    #[test]
    fn partition_names() {
        let dir = Path::new("/tmp/psms");
        assert_eq!(partition_path(dir, -2), PathBuf::from("/tmp/psms/-2.txt"));
        assert_eq!(charge_from_path(&partition_path(dir, 3)).unwrap(), 3);
        assert!(matches!(
            charge_from_path(Path::new("/tmp/psms/three.txt")),
            Err(Error::InvalidPartitionFile(_))
        ));
    }

    #[test]
    fn partition_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for charge in [3, -1, 2] {
            std::fs::write(partition_path(dir.path(), charge), "").unwrap();
        }
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let charges: Vec<i32> = partition_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|(charge, _)| charge)
            .collect();
        assert_eq!(charges, vec![-1, 2, 3]);
    }

    #[test]
    fn partition_files_in_bracketed_directory() {
        let parent = tempfile::tempdir().unwrap();
        let dir = parent.path().join("run[1]");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(partition_path(&dir, 1), "").unwrap();

        assert_eq!(partition_files(&dir).unwrap().len(), 1);
    }
}
