// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! The transaction engine: a deterministic state machine driving one
//! operation end to end. Every resource the transaction touches — the open
//! databases, the package arena, the parsed configurations — is owned by
//! the control block, so the whole transaction unwinds when the block is
//! dropped.

use std::path::{Path, PathBuf};

use log::trace;

use crate::config::MainConf;
use crate::error::{Error, ErrorCode, Result};
use crate::index::{self, IdxEntry};
use crate::package::{PkgArena, PkgHandle};
use crate::pkgconf;
use crate::pkgdb;
use crate::registry::{DbLocality, DbRole, Registry};

/// Transaction states. `Accept` and `Err` are terminal and sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransState {
    /// Parse the main configuration and open the destination database.
    InitPkgSys,
    /// Parse the package description, resolving its dependencies.
    ReadPkgConf,
    /// Walk the package prefix for index entries.
    CollectIndex,
    /// Materialize the index symlinks.
    WriteIndex,
    /// Queue the package for insertion.
    AddPkg,
    /// Commit and release everything.
    CleanupPkgSys,
    Accept,
    Err,
}

/// Operations the engine can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransType {
    Add,
}

/// Payload of an add transaction.
pub struct AddData {
    /// Package description file to ingest.
    pub pkg_conf: PathBuf,
    /// Parsed package, present once `ReadPkgConf` has run.
    pub pkg: Option<PkgHandle>,
    /// Collected index entries, present once `CollectIndex` has run.
    pub index: Vec<IdxEntry>,
}

/// Advisory callback invoked on every state transition. It must not fail
/// the transaction.
pub type ProgressFn = Box<dyn Fn(&TransCb, TransState)>;

/// Control block: the carrier of state, error, diagnostic hints, and every
/// resource of one transaction.
pub struct TransCb {
    pub state: TransState,
    pub trans_type: TransType,
    progress: ProgressFn,
    error: Option<Error>,
    /// Diagnostic hints; doubles as the progress hint of the current state.
    pub hints: Vec<String>,
    pub registry: Registry,
    pub arena: PkgArena,
    pub conf_file: PathBuf,
    pub conf: Option<MainConf>,
    pub add: Option<AddData>,
}

const MAX_HINTS: usize = 5;

impl TransCb {
    /// Builds a control block for an add transaction reading `pkg_conf`.
    pub fn new_add(conf_file: &Path, pkg_conf: &Path) -> TransCb {
        TransCb {
            state: TransState::InitPkgSys,
            trans_type: TransType::Add,
            progress: Box::new(|_, _| {}),
            error: None,
            hints: Vec::new(),
            registry: Registry::new(),
            arena: PkgArena::new(),
            conf_file: conf_file.to_owned(),
            conf: None,
            add: Some(AddData {
                pkg_conf: pkg_conf.to_owned(),
                pkg: None,
                index: Vec::new(),
            }),
        }
    }

    /// Installs the progress callback.
    pub fn on_progress(&mut self, progress: ProgressFn) {
        self.progress = progress;
    }

    /// The error that drove the block into `Err`, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Records the new state, seeds the progress hints it advertises, and
    /// notifies the callback.
    pub fn set_state(&mut self, state: TransState) {
        trace!("transaction state -> {:?}", state);
        self.state = state;
        if state == TransState::AddPkg {
            if let Some(handle) = self.add.as_ref().and_then(|add| add.pkg) {
                self.hints.clear();
                self.hints.push(self.arena.get(handle).id.clone());
            }
        }
        (self.progress)(self, state);
    }

    /// Runs the transaction to a terminal state. On success the block ends
    /// in `Accept`; on failure the error is recorded on the block, the
    /// callback sees `Err` once, and the error's code is returned.
    pub fn execute(&mut self) -> std::result::Result<(), ErrorCode> {
        self.set_state(TransState::InitPkgSys);
        while self.state != TransState::Accept {
            if let Err(err) = self.run_state() {
                let code = err.code();
                self.hints = err.hints();
                self.hints.truncate(MAX_HINTS);
                self.error = Some(err);
                self.set_state(TransState::Err);
                return Err(code);
            }
            let next = self.next_state();
            self.set_state(next);
        }
        Ok(())
    }

    fn next_state(&self) -> TransState {
        match self.state {
            TransState::Err => TransState::Err,
            TransState::Accept => TransState::Accept,
            state => match self.trans_type {
                TransType::Add => match state {
                    TransState::InitPkgSys => TransState::ReadPkgConf,
                    TransState::ReadPkgConf => TransState::CollectIndex,
                    TransState::CollectIndex => TransState::WriteIndex,
                    TransState::WriteIndex => TransState::AddPkg,
                    TransState::AddPkg => TransState::CleanupPkgSys,
                    TransState::CleanupPkgSys => TransState::Accept,
                    TransState::Accept | TransState::Err => state,
                },
            },
        }
    }

    fn run_state(&mut self) -> Result<()> {
        match self.state {
            TransState::InitPkgSys => self.run_init(),
            TransState::ReadPkgConf => self.run_read_pkgconf().map_err(|err| {
                let _ = self.registry.close_all();
                err
            }),
            TransState::CollectIndex => self.run_collect_index(),
            TransState::WriteIndex => self.run_write_index(),
            TransState::AddPkg => self.run_add_pkg().map_err(|err| {
                let _ = self.registry.close_all();
                err
            }),
            TransState::CleanupPkgSys => self.run_cleanup(),
            TransState::Accept | TransState::Err => Ok(()),
        }
    }

    fn run_init(&mut self) -> Result<()> {
        let conf = MainConf::parse(&self.conf_file)?;
        self.registry
            .open(&conf.db_loc, DbRole::Destination, DbLocality::Local)?;
        self.conf = Some(conf);
        Ok(())
    }

    fn add_data(&self) -> &AddData {
        self.add
            .as_ref()
            .expect("add transactions carry add data; qed")
    }

    fn run_read_pkgconf(&mut self) -> Result<()> {
        let path = self.add_data().pkg_conf.clone();
        let pkg = pkgconf::read_pkg_conf(&self.registry, &mut self.arena, &path)?;
        if let Some(add) = self.add.as_mut() {
            add.pkg = Some(pkg);
        }
        Ok(())
    }

    fn run_collect_index(&mut self) -> Result<()> {
        let conf = self.conf.as_ref().expect("InitPkgSys ran first; qed");
        let pkg = self
            .add_data()
            .pkg
            .expect("ReadPkgConf ran first; qed");
        let prefix = PathBuf::from(&self.arena.get(pkg).prefix);
        let entries = index::collect_entries(&prefix, &conf.idx_path)?;
        if let Some(add) = self.add.as_mut() {
            add.index = entries;
        }
        Ok(())
    }

    fn run_write_index(&mut self) -> Result<()> {
        index::write_index(&self.add_data().index)
    }

    fn run_add_pkg(&mut self) -> Result<()> {
        let pkg = self
            .add_data()
            .pkg
            .expect("ReadPkgConf ran first; qed");
        pkgdb::add_package(self.registry.dest(), &self.arena, pkg)
    }

    fn run_cleanup(&mut self) -> Result<()> {
        self.registry.close_all()?;
        self.conf = None;
        self.add = None;
        Ok(())
    }
}
