// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

use std::path::Path;

use pkgcore::MainConf;
use propdb::PropDb;

/// Creates the property database and string table named by the main
/// configuration.
pub fn run(conf: &Path) -> bool {
    let main_conf = match MainConf::parse(conf) {
        Ok(conf) => conf,
        Err(err) => {
            eprintln!("nnpkg: {}", err);
            return false;
        }
    };
    if let Err(err) = PropDb::create(&main_conf.db_loc) {
        eprintln!("nnpkg: unable to create package database: {}", err);
        return false;
    }
    println!(
        "Initialized empty package database in {}",
        main_conf.db_loc.db_path.display()
    );
    true
}
