// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! nnpkg command line frontend.

mod add;
mod cli;
mod init;

use structopt::StructOpt;

use crate::cli::{Command, Options};

fn main() {
    env_logger::init();
    let options = Options::from_args();
    let ok = match options.command {
        Command::Init { conf } => init::run(&conf),
        Command::Add { conf, pkg_conf } => add::run(&conf, &pkg_conf),
        Command::Version => {
            println!(
                "nnpkg version {}\n\
                 nnpkg is open source software, licensed under the Apache 2.0 License.",
                env!("CARGO_PKG_VERSION")
            );
            true
        }
    };
    std::process::exit(if ok { 0 } else { 1 });
}
