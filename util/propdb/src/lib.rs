// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! Storage engine for the package database: a property file of fixed-size,
//! CRC-protected records plus an append-only string table, both memory
//! mapped. All cross-references between the two files are absolute byte
//! offsets into the string table.

mod db;
mod error;
mod strtab;

pub use db::{
	DbLocation, Prop, PropDb, HEADER_SIZE, PROP_DATA_SIZE, PROP_HEADER_SIZE, PROP_SIZE,
	PROP_TYPE_INVALID, PROP_TYPE_PKG, PROP_TYPE_STRING,
};
pub use error::{Error, Result};
pub use strtab::{StringTable, STRTAB_HEADER_SIZE};

/// On-disk signature shared by the property file and the string table.
pub const SIGNATURE: u64 = 0x7878_8075_7168_6600;

/// Current major format version.
pub const VERSION: u8 = 0;

/// Current format revision.
pub const REVISION: u8 = 1;
