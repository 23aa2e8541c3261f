/*
Copyright 2021 Jakub Lewandowski

This file is part of JAXA Rainfall Field Generator (jaxa-rfield).

JAXA Rainfall Field Generator (jaxa-rfield) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

JAXA Rainfall Field Generator (jaxa-rfield) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with JAXA Rainfall Field Generator (jaxa-rfield). If not, see https://www.gnu.org/licenses/.
*/

//! Module unpacking product archives.

use crate::{constants::ARCHIVE_SUFFIX, errors::ExtractError};
use log::debug;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use zip::ZipArchive;

/// Files written while unpacking an archive.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Extraction {
    /// The tabular file named after the archive.
    pub table: PathBuf,

    /// Every extracted file, the table included.
    pub files: Vec<PathBuf>,
}

/// Name of the table inside an archive: the archive name minus compression suffix.
pub fn table_name(archive_path: &Path) -> String {
    let name = archive_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    name.strip_suffix(ARCHIVE_SUFFIX)
        .map(str::to_string)
        .unwrap_or(name)
}

/// Extracts all entries of the archive into `dest_dir`
/// and checks that the expected non-empty table is among them.
///
/// Entries with names escaping `dest_dir` are skipped.
pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<Extraction, ExtractError> {
    let expected = table_name(archive_path);
    let mut archive = ZipArchive::new(fs::File::open(archive_path)?)?;

    if archive.is_empty() {
        return Err(ExtractError::Empty(archive_path.display().to_string()));
    }

    let mut files = Vec::with_capacity(archive.len());
    let mut table = None;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;

        let relative = match entry.enclosed_name() {
            Some(name) => name.to_path_buf(),
            None => {
                debug!("Skipping unsafe archive entry {}", entry.name());
                continue;
            }
        };

        let out_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = fs::File::create(&out_path)?;
        files.push(out_path.clone());
        io::copy(&mut entry, &mut out_file)?;

        if relative.as_os_str() == expected.as_str() {
            table = Some(out_path);
        }
    }

    let table = table.ok_or(ExtractError::MissingEntry(expected))?;

    if fs::metadata(&table)?.len() == 0 {
        return Err(ExtractError::EmptyEntry(table.display().to_string()));
    }

    debug!("Extracted {} file(s) into {}", files.len(), dest_dir.display());

    Ok(Extraction { table, files })
}

#[cfg(test)]
mod tests {
    use super::{extract, table_name};
    use crate::errors::ExtractError;
    use std::{fs, io::Write, path::Path};
    use zip::{write::FileOptions, ZipWriter};

    const NAME: &str = "gsmap_now.20190326.0430_0529.05_AsiaSS.csv";

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(fs::File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn table_name_strips_suffix() {
        assert_eq!(table_name(Path::new(&format!("/tmp/{}.zip", NAME))), NAME);
    }

    #[test]
    fn expected_entry_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join(format!("{}.zip", NAME));
        write_archive(&archive, &[(NAME, " Lat,  Lon,  RainRate\n6.0, 71.0, 0.5\n")]);

        let extraction = extract(&archive, dir.path()).unwrap();

        assert_eq!(extraction.table, dir.path().join(NAME));
        assert_eq!(extraction.files, vec![dir.path().join(NAME)]);
        assert!(fs::read_to_string(extraction.table).unwrap().starts_with(" Lat"));
    }

    #[test]
    fn missing_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join(format!("{}.zip", NAME));
        write_archive(&archive, &[("other.csv", "Lat,Lon,RainRate\n")]);

        let result = extract(&archive, dir.path());

        assert!(matches!(result, Err(ExtractError::MissingEntry(name)) if name == NAME));
    }

    #[test]
    fn empty_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join(format!("{}.zip", NAME));
        write_archive(&archive, &[(NAME, "")]);

        assert!(matches!(
            extract(&archive, dir.path()),
            Err(ExtractError::EmptyEntry(_))
        ));
    }

    #[test]
    fn corrupt_archive_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join(format!("{}.zip", NAME));
        fs::write(&archive, b"this is not a zip archive").unwrap();

        assert!(matches!(
            extract(&archive, dir.path()),
            Err(ExtractError::Corrupt(_))
        ));
    }

    #[test]
    fn archive_without_entries_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join(format!("{}.zip", NAME));
        write_archive(&archive, &[]);

        assert!(matches!(
            extract(&archive, dir.path()),
            Err(ExtractError::Empty(_))
        ));
    }
}
