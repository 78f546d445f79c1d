use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Unpack every regular file of the zip at `archive` under `dest`.
///
/// Returns the extracted paths, sorted. Entries whose names would escape
/// `dest` are skipped.
pub fn extract(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file =
        File::open(archive).with_context(|| format!("failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a zip archive", archive.display()))?;

    let mut extracted = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping archive entry outside target dir");
            continue;
        };

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("failed to extract {}", target.display()))?;
        extracted.push(target);
    }

    extracted.sort();
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extracts_files_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("a.zip");
        let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("docs/", options).unwrap();
        zip.start_file("docs/readme.txt", options).unwrap();
        zip.write_all(b"hello").unwrap();
        zip.start_file("data.csv", options).unwrap();
        zip.write_all(b"a,b").unwrap();
        zip.finish().unwrap();

        let out = dir.path().join("out");
        let files = extract(&zip_path, &out).unwrap();
        assert_eq!(files, vec![out.join("data.csv"), out.join("docs/readme.txt")]);
        assert_eq!(fs::read_to_string(out.join("docs/readme.txt")).unwrap(), "hello");
    }

    #[test]
    fn rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake.zip");
        fs::write(&fake, "not a zip").unwrap();
        let err = extract(&fake, dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a zip archive"));
    }
}
