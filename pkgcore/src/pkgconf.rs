// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! Package description files: a single `package NAME` block turned into a
//! logical package, with every declared dependency resolved against the
//! databases that are already open.

use std::fs;
use std::path::Path;

use conf::{Property, Value};

use crate::config::one_string;
use crate::error::{Error, Result};
use crate::package::{Package, PkgArena, PkgHandle, PKG_TYPE_PACKAGE};
use crate::registry::Registry;

fn syntax<T>(path: &Path, line: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::Syntax(conf::Error {
        path: path.to_owned(),
        line,
        msg: msg.into(),
    }))
}

fn one_bool(path: &Path, prop: &Property) -> Result<bool> {
    let reject = || {
        syntax(
            path,
            prop.line,
            format!("property \"{}\" requires a boolean value", prop.name),
        )
    };
    if prop.vals.len() != 1 {
        return reject();
    }
    match &prop.vals[0].value {
        Value::Ident(word) if word == "true" => Ok(true),
        Value::Ident(word) if word == "false" => Ok(false),
        _ => reject(),
    }
}

/// Parses the package description at `path` into the arena. Dependencies
/// are resolved by name at parse time; a name that no open database can
/// satisfy fails with `BrokenDep` naming the package being parsed and the
/// missing dependency.
pub fn read_pkg_conf(registry: &Registry, arena: &mut PkgArena, path: &Path) -> Result<PkgHandle> {
    let source = fs::read_to_string(path)?;
    let blocks = conf::parse(path, &source)?;
    if blocks.is_empty() {
        return syntax(path, 1, "empty package configuration file");
    }
    if blocks.len() > 1 {
        return syntax(
            path,
            blocks[1].line,
            "only one package block supported in a configuration file",
        );
    }
    let block = &blocks[0];
    if block.block_type != "package" {
        return syntax(
            path,
            block.line,
            format!("unrecognized block type \"{}\"", block.block_type),
        );
    }
    let id = match &block.block_name {
        Some(name) => name.clone(),
        None => {
            return syntax(
                path,
                block.line,
                "block name required for block type \"package\"",
            )
        }
    };

    let mut description = String::new();
    let mut prefix = String::new();
    let mut is_dependency = false;
    let mut deps = Vec::new();
    for prop in &block.props {
        match prop.name.as_str() {
            "description" => description = one_string(path, prop)?,
            "prefix" => prefix = one_string(path, prop)?,
            "isDependency" => is_dependency = one_bool(path, prop)?,
            "dependencies" => {
                for val in &prop.vals {
                    let dep_name = match &val.value {
                        Value::Ident(name) => name,
                        Value::Str(_) => {
                            return syntax(
                                path,
                                val.line,
                                format!(
                                    "property \"{}\" requires identifier values",
                                    prop.name
                                ),
                            )
                        }
                    };
                    match registry.find_package(arena, dep_name)? {
                        Some(handle) => deps.push(handle),
                        None => {
                            return Err(Error::BrokenDep {
                                pkg: id,
                                dep: dep_name.clone(),
                            })
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(arena.insert(Package {
        id,
        description,
        prefix,
        is_dependency,
        pkg_type: PKG_TYPE_PACKAGE,
        deps,
        record: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::pkgdb;
    use crate::registry::{DbLocality, DbRole};
    use propdb::{DbLocation, PropDb};
    use std::io::Write;
    use std::path::PathBuf;
    use tempdir::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn open_empty_db(dir: &TempDir) -> Registry {
        let loc = DbLocation {
            db_path: dir.path().join("nnpkgdb"),
            strtab_path: dir.path().join("nnpkgstr"),
        };
        PropDb::create(&loc).unwrap();
        let mut registry = Registry::new();
        registry
            .open(&loc, DbRole::Destination, DbLocality::Local)
            .unwrap();
        registry
    }

    #[test]
    fn parses_a_package_block() {
        let dir = TempDir::new("pkgconf").unwrap();
        let registry = open_empty_db(&dir);
        let path = write_file(
            &dir,
            "test.conf",
            "package test {\n\
             \tdescription \"A test package\";\n\
             \tprefix \"/test\";\n\
             \tisDependency true;\n\
             }\n",
        );
        let mut arena = PkgArena::new();
        let handle = read_pkg_conf(&registry, &mut arena, &path).unwrap();
        let pkg = arena.get(handle);
        assert_eq!(pkg.id, "test");
        assert_eq!(pkg.description, "A test package");
        assert_eq!(pkg.prefix, "/test");
        assert!(pkg.is_dependency);
        assert_eq!(pkg.pkg_type, PKG_TYPE_PACKAGE);
        assert!(pkg.deps.is_empty());
    }

    #[test]
    fn resolves_declared_dependencies() {
        let dir = TempDir::new("pkgconf").unwrap();
        let mut registry = open_empty_db(&dir);
        let mut arena = PkgArena::new();
        let dep = arena.insert(Package {
            id: "base".to_owned(),
            description: "base files".to_owned(),
            prefix: "/base".to_owned(),
            is_dependency: true,
            pkg_type: PKG_TYPE_PACKAGE,
            deps: Vec::new(),
            record: None,
        });
        pkgdb::add_package(registry.dest(), &arena, dep).unwrap();
        registry.close_all().unwrap();

        let loc = DbLocation {
            db_path: dir.path().join("nnpkgdb"),
            strtab_path: dir.path().join("nnpkgstr"),
        };
        let mut registry = Registry::new();
        registry
            .open(&loc, DbRole::Destination, DbLocality::Local)
            .unwrap();
        let path = write_file(
            &dir,
            "tool.conf",
            "package tool { prefix \"/tool\"; dependencies base; }",
        );
        let mut arena = PkgArena::new();
        let handle = read_pkg_conf(&registry, &mut arena, &path).unwrap();
        let deps = &arena.get(handle).deps;
        assert_eq!(deps.len(), 1);
        assert_eq!(arena.get(deps[0]).id, "base");
    }

    #[test]
    fn missing_dependency_is_a_broken_dep_with_hints() {
        let dir = TempDir::new("pkgconf").unwrap();
        let registry = open_empty_db(&dir);
        let path = write_file(
            &dir,
            "broken.conf",
            "package broken { prefix \"/broken\"; dependencies nonesuch; }",
        );
        let mut arena = PkgArena::new();
        let err = read_pkg_conf(&registry, &mut arena, &path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BrokenDep);
        assert_eq!(err.hints(), ["broken", "nonesuch"]);
    }

    #[test]
    fn rejects_wrong_block_type() {
        let dir = TempDir::new("pkgconf").unwrap();
        let registry = open_empty_db(&dir);
        let path = write_file(&dir, "bad.conf", "settings { prefix \"/x\"; }");
        let mut arena = PkgArena::new();
        let err = read_pkg_conf(&registry, &mut arena, &path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Syntax);
        assert!(format!("{}", err).contains("unrecognized block type"));
    }

    #[test]
    fn rejects_missing_block_name() {
        let dir = TempDir::new("pkgconf").unwrap();
        let registry = open_empty_db(&dir);
        let path = write_file(&dir, "anon.conf", "package { prefix \"/x\"; }");
        let mut arena = PkgArena::new();
        let err = read_pkg_conf(&registry, &mut arena, &path).unwrap_err();
        assert!(format!("{}", err).contains("block name required"));
    }

    #[test]
    fn rejects_second_block() {
        let dir = TempDir::new("pkgconf").unwrap();
        let registry = open_empty_db(&dir);
        let path = write_file(
            &dir,
            "two.conf",
            "package a { prefix \"/a\"; }\npackage b { prefix \"/b\"; }\n",
        );
        let mut arena = PkgArena::new();
        let err = read_pkg_conf(&registry, &mut arena, &path).unwrap_err();
        assert!(format!("{}", err).contains("only one package block"));
    }

    #[test]
    fn rejects_non_boolean_is_dependency() {
        let dir = TempDir::new("pkgconf").unwrap();
        let registry = open_empty_db(&dir);
        let path = write_file(&dir, "bool.conf", "package p { isDependency maybe; }");
        let mut arena = PkgArena::new();
        let err = read_pkg_conf(&registry, &mut arena, &path).unwrap_err();
        assert!(format!("{}", err).contains("boolean"));
    }
}
