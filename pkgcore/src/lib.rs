// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! The package system core: logical packages and their dependency graph,
//! the codec mapping them onto property records, the filesystem index, the
//! configuration layers, and the transaction engine that sequences an
//! operation from parse to commit.

pub mod config;
pub mod error;
pub mod index;
pub mod package;
pub mod pkgconf;
pub mod pkgdb;
pub mod registry;
pub mod transaction;

pub use config::MainConf;
pub use error::{Error, ErrorCode, Result};
pub use package::{Package, PkgArena, PkgHandle, PKG_TYPE_PACKAGE};
pub use registry::{DbLocality, DbRole, Registry};
pub use transaction::{AddData, TransCb, TransState, TransType};
