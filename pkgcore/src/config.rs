// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! Main configuration: the `settings` block naming the database files and
//! the index tree.

use std::fs;
use std::path::{Path, PathBuf};

use conf::{Property, Value};
use propdb::DbLocation;

use crate::error::{Error, Result};

/// Parsed global configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MainConf {
    /// Paths of the property database and its string table.
    pub db_loc: DbLocation,
    /// Root of the symlink index tree.
    pub idx_path: PathBuf,
}

fn syntax<T>(path: &Path, line: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::Syntax(conf::Error {
        path: path.to_owned(),
        line,
        msg: msg.into(),
    }))
}

/// The single string value of `prop`, rejecting identifier values and value
/// counts other than one.
pub(crate) fn one_string(path: &Path, prop: &Property) -> Result<String> {
    if prop.vals.len() != 1 {
        return syntax(
            path,
            prop.line,
            format!("property \"{}\" requires exactly one value", prop.name),
        );
    }
    match &prop.vals[0].value {
        Value::Str(text) => Ok(text.clone()),
        Value::Ident(_) => syntax(
            path,
            prop.line,
            format!("property \"{}\" requires a string value", prop.name),
        ),
    }
}

impl MainConf {
    /// Parses the main configuration file at `path`. The `settings` block
    /// must name `packageDb`, `strtab` and `indexPath`; unknown properties
    /// are ignored.
    pub fn parse(path: &Path) -> Result<MainConf> {
        let source = fs::read_to_string(path)?;
        let blocks = conf::parse(path, &source)?;
        let block = match blocks.iter().find(|block| block.block_type == "settings") {
            Some(block) => block,
            None => return syntax(path, 1, "missing settings block"),
        };
        let mut package_db = None;
        let mut strtab = None;
        let mut idx_path = None;
        for prop in &block.props {
            match prop.name.as_str() {
                "packageDb" => package_db = Some(one_string(path, prop)?),
                "strtab" => strtab = Some(one_string(path, prop)?),
                "indexPath" => idx_path = Some(one_string(path, prop)?),
                _ => {}
            }
        }
        let missing = |name: &str| -> Result<MainConf> {
            syntax(
                path,
                block.line,
                format!("settings block is missing required property \"{}\"", name),
            )
        };
        let package_db = match package_db {
            Some(value) => value,
            None => return missing("packageDb"),
        };
        let strtab = match strtab {
            Some(value) => value,
            None => return missing("strtab"),
        };
        let idx_path = match idx_path {
            Some(value) => value,
            None => return missing("indexPath"),
        };
        Ok(MainConf {
            db_loc: DbLocation {
                db_path: PathBuf::from(package_db),
                strtab_path: PathBuf::from(strtab),
            },
            idx_path: PathBuf::from(idx_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;
    use tempdir::TempDir;

    fn write_conf(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("nnpkg.conf");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_a_full_settings_block() {
        let dir = TempDir::new("config").unwrap();
        let path = write_conf(
            &dir,
            "settings {\n\
             \tpackageDb \"/var/lib/nnpkg/nnpkgdb\";\n\
             \tstrtab \"/var/lib/nnpkg/nnpkgstr\";\n\
             \tindexPath \"/usr/local\";\n\
             }\n",
        );
        let conf = MainConf::parse(&path).unwrap();
        assert_eq!(conf.db_loc.db_path, PathBuf::from("/var/lib/nnpkg/nnpkgdb"));
        assert_eq!(conf.db_loc.strtab_path, PathBuf::from("/var/lib/nnpkg/nnpkgstr"));
        assert_eq!(conf.idx_path, PathBuf::from("/usr/local"));
    }

    #[test]
    fn unknown_properties_are_ignored() {
        let dir = TempDir::new("config").unwrap();
        let path = write_conf(
            &dir,
            "settings {\n\
             \tpackageDb \"/db\"; strtab \"/str\"; indexPath \"/idx\";\n\
             \tfutureKnob \"whatever\";\n\
             }\n",
        );
        assert!(MainConf::parse(&path).is_ok());
    }

    #[test]
    fn missing_required_property_is_a_syntax_error() {
        let dir = TempDir::new("config").unwrap();
        let path = write_conf(&dir, "settings { packageDb \"/db\"; indexPath \"/idx\"; }");
        let err = MainConf::parse(&path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Syntax);
        assert!(format!("{}", err).contains("strtab"));
    }

    #[test]
    fn identifier_value_is_rejected() {
        let dir = TempDir::new("config").unwrap();
        let path = write_conf(
            &dir,
            "settings { packageDb bare; strtab \"/str\"; indexPath \"/idx\"; }",
        );
        let err = MainConf::parse(&path).unwrap_err();
        assert!(format!("{}", err).contains("string value"));
    }

    #[test]
    fn unreadable_file_is_a_sys_error() {
        let err = MainConf::parse(Path::new("/nonexistent/nnpkg.conf")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Sys);
    }
}
