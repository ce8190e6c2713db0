// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "nnpkg",
    about = "an efficient, user-friendly package manager",
    rename_all = "kebab-case"
)]
pub struct Options {
    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Initializes a new package database.
    Init {
        /// Main configuration file.
        #[structopt(short, long, default_value = "/etc/nnpkg/nnpkg.conf")]
        conf: PathBuf,
    },
    /// Adds a package that has already been unpacked into the filesystem.
    Add {
        /// Main configuration file.
        #[structopt(short, long, default_value = "/etc/nnpkg/nnpkg.conf")]
        conf: PathBuf,
        /// Package description file.
        pkg_conf: PathBuf,
    },
    /// Prints version information.
    Version,
}
