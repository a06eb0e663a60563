//! Utility functions for working with files.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

use flate2::read::MultiGzDecoder;

//-----------------------------------------------------------------------------

/// Returns `true` if the file exists.
pub fn file_exists<P: AsRef<Path>>(filename: P) -> bool {
    fs::metadata(filename).is_ok()
}

/// Returns `true` if the file appears to be gzip-compressed.
pub fn is_gzipped<P: AsRef<Path>>(filename: P) -> bool {
    let file = match File::open(filename) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut reader = BufReader::new(file);
    let mut magic = [0; 2];
    let len = reader.read(&mut magic).ok();
    len == Some(2) && magic == [0x1F, 0x8B]
}

/// Returns a buffered reader for the file, which may be gzip-compressed.
pub fn open_file<P: AsRef<Path>>(filename: P) -> Result<Box<dyn BufRead>, String> {
    let file = File::open(&filename).map_err(|x| x.to_string())?;
    let inner = BufReader::new(file);
    if is_gzipped(&filename) {
        let inner = MultiGzDecoder::new(inner);
        Ok(Box::new(BufReader::new(inner)))
    } else {
        Ok(Box::new(inner))
    }
}

//-----------------------------------------------------------------------------

/// Removes all regular files in the directory and returns their number.
///
/// Subdirectories are left untouched.
pub fn remove_files_in<P: AsRef<Path>>(dir: P) -> Result<usize, String> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|x| format!("Failed to list {}: {}", dir.display(), x))?;
    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|x| x.to_string())?.path();
        if path.is_file() {
            fs::remove_file(&path).map_err(|x| format!("Failed to remove {}: {}", path.display(), x))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Returns `true` if the directory has no entries.
pub fn dir_is_empty<P: AsRef<Path>>(dir: P) -> Result<bool, String> {
    let mut entries = fs::read_dir(&dir).map_err(|x| x.to_string())?;
    Ok(entries.next().is_none())
}

/// Removes the directory once it is empty.
///
/// The directory is polled up to `attempts` times with `interval` between the polls, as deletions of its files may not
/// be visible immediately.
/// Returns `Ok(true)` if the directory was removed or did not exist and `Ok(false)` if it remained non-empty.
pub fn remove_dir_when_empty<P: AsRef<Path>>(dir: P, attempts: usize, interval: Duration) -> Result<bool, String> {
    let dir = dir.as_ref();
    for attempt in 0..attempts.max(1) {
        if !dir.exists() {
            return Ok(true);
        }
        if dir_is_empty(dir)? {
            fs::remove_dir(dir).map_err(|x| format!("Failed to remove {}: {}", dir.display(), x))?;
            return Ok(true);
        }
        if attempt + 1 < attempts {
            thread::sleep(interval);
        }
    }
    Ok(false)
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tests as fixtures;

    #[test]
    fn remove_files() {
        let dir = fixtures::temp_dir("homep-utils");
        fs::write(dir.join("a.tmp"), "a").unwrap();
        fs::write(dir.join("b.tmp"), "b").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();

        assert_eq!(remove_files_in(&dir), Ok(2), "Wrong number of removed files");
        assert_eq!(dir_is_empty(&dir), Ok(false), "The subdirectory was removed");
        fs::remove_dir(dir.join("nested")).unwrap();
        assert_eq!(dir_is_empty(&dir), Ok(true), "The directory is not empty");

        fixtures::remove_dir(&dir);
    }

    #[test]
    fn remove_empty_dir() {
        let dir = fixtures::temp_dir("homep-utils");
        let result = remove_dir_when_empty(&dir, 3, Duration::from_millis(1));
        assert_eq!(result, Ok(true), "Failed to remove an empty directory");
        assert!(!dir.exists(), "The directory still exists");

        let result = remove_dir_when_empty(&dir, 3, Duration::from_millis(1));
        assert_eq!(result, Ok(true), "A missing directory was not treated as removed");
    }

    #[test]
    fn keep_non_empty_dir() {
        let dir = fixtures::temp_dir("homep-utils");
        fs::write(dir.join("leftover.tmp"), "x").unwrap();
        let result = remove_dir_when_empty(&dir, 3, Duration::from_millis(1));
        assert_eq!(result, Ok(false), "A non-empty directory was reported as removed");
        assert!(dir.exists(), "A non-empty directory was removed");
        fixtures::remove_dir(&dir);
    }
}

//-----------------------------------------------------------------------------
