// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

use std::path::Path;

use log::debug;
use pkgcore::{Error, TransCb, TransState};

/// Runs the add transaction for the package described by `pkg_conf`.
pub fn run(conf: &Path, pkg_conf: &Path) -> bool {
    debug!("add transaction: conf {}, package {}", conf.display(), pkg_conf.display());
    let mut cb = TransCb::new_add(conf, pkg_conf);
    cb.on_progress(Box::new(progress));
    cb.execute().is_ok()
}

/// Renders one line per state transition, and for `Err` the saved error with
/// its diagnostic hints. Dependency errors print the owning package and the
/// missing name on separate lines.
fn progress(cb: &TransCb, state: TransState) {
    match state {
        TransState::InitPkgSys => println!("Opening package database..."),
        TransState::ReadPkgConf => println!("Reading package configuration..."),
        TransState::CollectIndex => println!("Collecting index entries..."),
        TransState::WriteIndex => println!("Writing index..."),
        TransState::AddPkg => {
            if let Some(id) = cb.hints.first() {
                println!("Adding package {} to database...", id);
            }
        }
        TransState::CleanupPkgSys => println!("Committing..."),
        TransState::Accept => println!("done"),
        TransState::Err => match cb.error() {
            Some(Error::BrokenDep { pkg, dep }) => {
                eprintln!("nnpkg: package \"{}\" has a broken dependency", pkg);
                eprintln!("nnpkg: dependency \"{}\" cannot be found", dep);
            }
            Some(err) => eprintln!("nnpkg: {}", err),
            None => eprintln!("nnpkg: transaction failed"),
        },
    }
}
