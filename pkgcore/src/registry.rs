// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! Registry of the databases a transaction has open, each tagged with its
//! role and locality. The registry is owned by the transaction's control
//! block; there is no process-wide state.

use log::debug;
use propdb::{DbLocation, PropDb};

use crate::error::Result;
use crate::package::{PkgArena, PkgHandle};
use crate::pkgdb;

/// Whether a database is read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbRole {
    /// Packages may be looked up here.
    Source,
    /// The single database new packages are added to.
    Destination,
}

/// Where a database lives. Only local semantics are implemented; the tag
/// exists because the schema reserves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbLocality {
    Local,
    Remote,
}

/// One registered database.
pub struct OpenDb {
    pub db: PropDb,
    pub role: DbRole,
    pub locality: DbLocality,
}

/// Ordered set of open databases. At most one destination may be
/// registered at a time.
#[derive(Default)]
pub struct Registry {
    dbs: Vec<OpenDb>,
    dest: Option<usize>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Opens the database at `loc` and registers it. Registering a second
    /// destination is a programmer error.
    pub fn open(&mut self, loc: &DbLocation, role: DbRole, locality: DbLocality) -> Result<()> {
        let db = PropDb::open(loc)?;
        if role == DbRole::Destination {
            assert!(
                self.dest.is_none(),
                "a destination database is already registered"
            );
            self.dest = Some(self.dbs.len());
        }
        debug!("registered {} as {:?}/{:?}", loc.db_path.display(), role, locality);
        self.dbs.push(OpenDb { db, role, locality });
        Ok(())
    }

    /// The destination database all mutations go to.
    pub fn dest(&mut self) -> &mut PropDb {
        let index = self.dest.expect("no destination database registered; qed");
        &mut self.dbs[index].db
    }

    pub fn len(&self) -> usize {
        self.dbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dbs.is_empty()
    }

    /// Looks `name` up across all registered databases in registration
    /// order; the first hit wins.
    pub fn find_package(&self, arena: &mut PkgArena, name: &str) -> Result<Option<PkgHandle>> {
        for open in &self.dbs {
            if let Some(handle) = pkgdb::find_package(&open.db, arena, name)? {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    /// Commits and closes every registered database, emptying the registry.
    pub fn close_all(&mut self) -> Result<()> {
        self.dest = None;
        for open in self.dbs.drain(..) {
            open.db.close()?;
        }
        Ok(())
    }
}
