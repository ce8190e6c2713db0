// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! The filesystem index: a tree of symlinks under a shared path pointing
//! back into per-package prefixes, mirroring a fixed FHS subset.

use std::io;
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};

/// Prefix subtrees mirrored into the index, in walk order.
pub const INDEX_SUBDIRS: [&str; 8] = [
    "bin", "sbin", "etc", "share", "libexec", "var", "lib", "include",
];

/// One symlink to materialize: `dest_file` will point at `src_file`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxEntry {
    pub src_file: PathBuf,
    pub dest_file: PathBuf,
}

/// Walks the package prefix and pairs every entry of each known subtree
/// with its location under `idx_path`. Subtrees the package does not ship
/// are skipped silently.
pub fn collect_entries(prefix: &Path, idx_path: &Path) -> Result<Vec<IdxEntry>> {
    let mut entries = Vec::new();
    for sub in &INDEX_SUBDIRS {
        let src_dir = prefix.join(sub);
        let dir = match src_dir.read_dir() {
            Ok(dir) => dir,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(Error::Sys(err)),
        };
        let dest_dir = idx_path.join(sub);
        for entry in dir {
            let entry = entry.map_err(Error::Sys)?;
            entries.push(IdxEntry {
                src_file: src_dir.join(entry.file_name()),
                dest_file: dest_dir.join(entry.file_name()),
            });
        }
    }
    debug!("collected {} index entries under {}", entries.len(), prefix.display());
    Ok(entries)
}

/// Creates the collected symlinks in insertion order. Links that already
/// exist are left alone.
pub fn write_index(entries: &[IdxEntry]) -> Result<()> {
    for entry in entries {
        match unix_fs::symlink(&entry.src_file, &entry.dest_file) {
            Ok(()) => {}
            Err(ref err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(Error::Sys(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    fn touch(path: &Path) {
        fs::File::create(path).unwrap();
    }

    #[test]
    fn collects_only_known_subtrees() {
        let dir = TempDir::new("index").unwrap();
        let prefix = dir.path().join("pkg");
        fs::create_dir_all(prefix.join("bin")).unwrap();
        fs::create_dir_all(prefix.join("lib")).unwrap();
        fs::create_dir_all(prefix.join("doc")).unwrap();
        touch(&prefix.join("bin/tool"));
        touch(&prefix.join("lib/libtool.so"));
        touch(&prefix.join("doc/manual.txt"));

        let idx = dir.path().join("index");
        let mut entries = collect_entries(&prefix, &idx).unwrap();
        entries.sort_by(|a, b| a.src_file.cmp(&b.src_file));
        assert_eq!(
            entries,
            [
                IdxEntry {
                    src_file: prefix.join("bin/tool"),
                    dest_file: idx.join("bin/tool"),
                },
                IdxEntry {
                    src_file: prefix.join("lib/libtool.so"),
                    dest_file: idx.join("lib/libtool.so"),
                },
            ]
        );
    }

    #[test]
    fn empty_prefix_collects_nothing() {
        let dir = TempDir::new("index").unwrap();
        let prefix = dir.path().join("pkg");
        fs::create_dir_all(&prefix).unwrap();
        assert!(collect_entries(&prefix, Path::new("/idx")).unwrap().is_empty());
    }

    #[test]
    fn writes_symlinks_and_tolerates_existing_ones() {
        let dir = TempDir::new("index").unwrap();
        let prefix = dir.path().join("pkg");
        fs::create_dir_all(prefix.join("bin")).unwrap();
        touch(&prefix.join("bin/tool"));
        let idx = dir.path().join("index");
        fs::create_dir_all(idx.join("bin")).unwrap();

        let entries = collect_entries(&prefix, &idx).unwrap();
        write_index(&entries).unwrap();
        let link = idx.join("bin/tool");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), prefix.join("bin/tool"));

        // Second write over the same tree is a no-op.
        write_index(&entries).unwrap();
    }

    #[test]
    fn missing_index_directory_is_a_sys_error() {
        let dir = TempDir::new("index").unwrap();
        let prefix = dir.path().join("pkg");
        fs::create_dir_all(prefix.join("bin")).unwrap();
        touch(&prefix.join("bin/tool"));
        let idx = dir.path().join("index-that-does-not-exist");

        let entries = collect_entries(&prefix, &idx).unwrap();
        assert!(write_index(&entries).is_err());
    }
}
