use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replaces the file at `path` with `contents`. The contents are written to a
/// sibling temporary file which is then renamed over `path`, so readers see
/// either the old file or the new one. Missing parent directories are created.
pub fn overwrite(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = temporary_sibling(path);
    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overwrite_creates_and_replaces() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("out.json");

        overwrite(&path, b"first")?;
        assert_eq!("first", fs::read_to_string(&path)?);

        overwrite(&path, b"second")?;
        assert_eq!("second", fs::read_to_string(&path)?);
        assert!(!path.with_file_name(".out.json.tmp").exists());
        Ok(())
    }
}
