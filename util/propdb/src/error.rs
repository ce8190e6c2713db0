// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

use std::{error, fmt, io, path::PathBuf};

/// Storage layer error.
#[derive(Debug)]
pub enum Error {
	/// `create` refused to clobber an existing property database.
	DbExists(PathBuf),
	/// `create` refused to clobber an existing string table.
	StrtabExists(PathBuf),
	/// Another process holds the exclusive database lock.
	Locked,
	/// On-disk state that cannot be interpreted.
	Corrupt(String),
	/// String table offset outside the table.
	BadOffset(u32),
	/// Underlying I/O failure.
	Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::DbExists(path) => write!(f, "package database already exists: {}", path.display()),
			Error::StrtabExists(path) => write!(f, "string table already exists: {}", path.display()),
			Error::Locked => write!(f, "failed to acquire package database lock"),
			Error::Corrupt(msg) => write!(f, "corrupt database: {}", msg),
			Error::BadOffset(offset) => write!(f, "string table offset {} out of bounds", offset),
			Error::Io(err) => write!(f, "{}", err),
		}
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<io::Error> for Error {
	fn from(err: io::Error) -> Error {
		Error::Io(err)
	}
}
