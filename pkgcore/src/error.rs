// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

use std::{error, fmt, io, path::PathBuf};

/// Package system error. Variants carry the diagnostic strings surfaced to
/// the transaction's progress callback as hints.
#[derive(Debug)]
pub enum Error {
    /// Syscall failure.
    Sys(io::Error),
    /// The destination database is held by another process.
    DbLocked,
    /// `init` found an existing property database.
    DbExists(PathBuf),
    /// `init` found an existing string table.
    StrtabExists(PathBuf),
    /// The named package is in no open database.
    PkgNotFound(String),
    /// An add was attempted for an id already present, committed or queued.
    PkgExists(String),
    /// A declared or transitively required dependency is absent.
    BrokenDep {
        /// Package owning the unsatisfied dependency.
        pkg: String,
        /// Name of the missing dependency.
        dep: String,
    },
    /// The record format holds at most 60 dependencies.
    TooManyDeps { pkg: String, count: usize },
    /// Configuration parse failure.
    Syntax(conf::Error),
    /// On-disk state that cannot be interpreted.
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant-only view of [`Error`], kept on the control block and
/// convenient to match on in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Sys,
    DbLocked,
    DbExists,
    StrtabExists,
    PkgNotFound,
    PkgExists,
    BrokenDep,
    TooManyDeps,
    Syntax,
    Corrupt,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Sys(_) => ErrorCode::Sys,
            Error::DbLocked => ErrorCode::DbLocked,
            Error::DbExists(_) => ErrorCode::DbExists,
            Error::StrtabExists(_) => ErrorCode::StrtabExists,
            Error::PkgNotFound(_) => ErrorCode::PkgNotFound,
            Error::PkgExists(_) => ErrorCode::PkgExists,
            Error::BrokenDep { .. } => ErrorCode::BrokenDep,
            Error::TooManyDeps { .. } => ErrorCode::TooManyDeps,
            Error::Syntax(_) => ErrorCode::Syntax,
            Error::Corrupt(_) => ErrorCode::Corrupt,
        }
    }

    /// Diagnostic strings for progress callbacks, most significant first.
    /// At most five entries.
    pub fn hints(&self) -> Vec<String> {
        match self {
            Error::PkgNotFound(id) | Error::PkgExists(id) => vec![id.clone()],
            Error::BrokenDep { pkg, dep } => vec![pkg.clone(), dep.clone()],
            Error::TooManyDeps { pkg, .. } => vec![pkg.clone()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Sys(err) => write!(f, "{}", err),
            Error::DbLocked => write!(f, "failed to acquire package database lock"),
            Error::DbExists(path) => {
                write!(f, "package database already exists: {}", path.display())
            }
            Error::StrtabExists(path) => {
                write!(f, "string table already exists: {}", path.display())
            }
            Error::PkgNotFound(id) => {
                write!(f, "package \"{}\" does not exist in database", id)
            }
            Error::PkgExists(id) => {
                write!(f, "package \"{}\" already exists in database", id)
            }
            Error::BrokenDep { pkg, dep } => write!(
                f,
                "package \"{}\" depends on \"{}\", which cannot be found",
                pkg, dep
            ),
            Error::TooManyDeps { pkg, count } => write!(
                f,
                "package \"{}\" declares {} dependencies; at most 60 are supported",
                pkg, count
            ),
            Error::Syntax(err) => write!(f, "{}", err),
            Error::Corrupt(msg) => write!(f, "corrupt database: {}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Sys(err) => Some(err),
            Error::Syntax(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Sys(err)
    }
}

impl From<conf::Error> for Error {
    fn from(err: conf::Error) -> Error {
        Error::Syntax(err)
    }
}

impl From<propdb::Error> for Error {
    fn from(err: propdb::Error) -> Error {
        match err {
            propdb::Error::Io(err) => Error::Sys(err),
            propdb::Error::Locked => Error::DbLocked,
            propdb::Error::DbExists(path) => Error::DbExists(path),
            propdb::Error::StrtabExists(path) => Error::StrtabExists(path),
            propdb::Error::Corrupt(msg) => Error::Corrupt(msg),
            propdb::Error::BadOffset(offset) => {
                Error::Corrupt(format!("string table offset {} out of bounds", offset))
            }
        }
    }
}
