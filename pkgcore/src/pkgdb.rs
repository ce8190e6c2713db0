// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! Package record codec. A package is one property of type `PKG` whose
//! 500-byte payload lays out as:
//!
//! ```text
//! [description: 4][prefix: 4][pkg_type: 2][is_dependency: 1][reserved: 9]
//! [deps: 60 x ([idx: 4][ver_op: 1][ver: 3])]
//! ```
//!
//! `description`, `prefix` and every `idx` are string table offsets; a zero
//! `idx` terminates the dependency list. The version fields are reserved:
//! encoders write zero, decoders tolerate anything.

use byteorder::{ByteOrder, LittleEndian};
use propdb::{Prop, PropDb, PROP_DATA_SIZE, PROP_TYPE_PKG};

use crate::error::{Error, Result};
use crate::package::{Package, PkgArena, PkgHandle};

/// Hard cap the record format imposes on dependencies per package.
pub const MAX_DEPS: usize = 60;

const DEP_SIZE: usize = 8;
const OFF_DESCRIPTION: usize = 0;
const OFF_PREFIX: usize = 4;
const OFF_PKG_TYPE: usize = 8;
const OFF_IS_DEPENDENCY: usize = 10;
const OFF_DEPS: usize = 20;

/// Serializes `pkg` into a record payload, appending its strings to the
/// database's string table.
fn encode_package(db: &mut PropDb, arena: &PkgArena, pkg: &Package) -> Result<Vec<u8>> {
    if pkg.deps.len() > MAX_DEPS {
        return Err(Error::TooManyDeps {
            pkg: pkg.id.clone(),
            count: pkg.deps.len(),
        });
    }
    let mut data = vec![0u8; PROP_DATA_SIZE];
    let description = db.strtab_mut().add(&pkg.description)?;
    let prefix = db.strtab_mut().add(&pkg.prefix)?;
    LittleEndian::write_u32(&mut data[OFF_DESCRIPTION..OFF_DESCRIPTION + 4], description);
    LittleEndian::write_u32(&mut data[OFF_PREFIX..OFF_PREFIX + 4], prefix);
    LittleEndian::write_u16(&mut data[OFF_PKG_TYPE..OFF_PKG_TYPE + 2], pkg.pkg_type);
    data[OFF_IS_DEPENDENCY] = pkg.is_dependency as u8;
    for (i, dep) in pkg.deps.iter().enumerate() {
        let idx = db.strtab_mut().add(&arena.get(*dep).id)?;
        let off = OFF_DEPS + i * DEP_SIZE;
        LittleEndian::write_u32(&mut data[off..off + 4], idx);
        // ver_op and ver stay zero.
    }
    Ok(data)
}

/// Stages the package behind `handle` for insertion into `db`. Fails with
/// `PkgExists` when the id is already present in the committed store or the
/// pending queue. Dependencies are referenced by name only; they are not
/// added implicitly.
pub fn add_package(db: &mut PropDb, arena: &PkgArena, handle: PkgHandle) -> Result<()> {
    let pkg = arena.get(handle);
    if db.pending(&pkg.id) || db.find(&pkg.id)?.is_some() {
        return Err(Error::PkgExists(pkg.id.clone()));
    }
    let data = encode_package(db, arena, pkg)?;
    db.queue_add(Prop {
        id: pkg.id.clone(),
        prop_type: PROP_TYPE_PKG,
        data,
        record: None,
    });
    Ok(())
}

/// Reconstructs the package named `name` from `db`, recursively resolving
/// its dependencies within the same database. `Ok(None)` means the name is
/// simply absent; a dependency that cannot be located is a hard
/// `BrokenDep` carrying the owning package and the missing name, preserved
/// unchanged through the recursion.
pub fn find_package(db: &PropDb, arena: &mut PkgArena, name: &str) -> Result<Option<PkgHandle>> {
    let prop = match db.find(name)? {
        Some(prop) => prop,
        None => return Ok(None),
    };
    decode_package(db, arena, name, &prop).map(Some)
}

fn decode_package(db: &PropDb, arena: &mut PkgArena, name: &str, prop: &Prop) -> Result<PkgHandle> {
    let data = &prop.data;
    let description = db
        .strtab()
        .get(LittleEndian::read_u32(&data[OFF_DESCRIPTION..OFF_DESCRIPTION + 4]))?;
    let prefix = db
        .strtab()
        .get(LittleEndian::read_u32(&data[OFF_PREFIX..OFF_PREFIX + 4]))?;
    let pkg_type = LittleEndian::read_u16(&data[OFF_PKG_TYPE..OFF_PKG_TYPE + 2]);
    let is_dependency = data[OFF_IS_DEPENDENCY] != 0;
    let mut deps = Vec::new();
    for i in 0..MAX_DEPS {
        let off = OFF_DEPS + i * DEP_SIZE;
        let idx = LittleEndian::read_u32(&data[off..off + 4]);
        if idx == 0 {
            break;
        }
        let dep_name = db.strtab().get(idx)?;
        let dep = match arena.lookup(&dep_name) {
            Some(handle) => handle,
            None => match find_package(db, arena, &dep_name)? {
                Some(handle) => handle,
                None => {
                    return Err(Error::BrokenDep {
                        pkg: name.to_owned(),
                        dep: dep_name,
                    })
                }
            },
        };
        deps.push(dep);
    }
    Ok(arena.insert(Package {
        id: name.to_owned(),
        description,
        prefix,
        is_dependency,
        pkg_type,
        deps,
        record: prop.record,
    }))
}

/// Stages the package behind `handle` for removal. The package must have
/// been read out of the database.
pub fn remove_package(db: &mut PropDb, arena: &PkgArena, handle: PkgHandle) -> Result<()> {
    let pkg = arena.get(handle);
    let record = pkg
        .record
        .expect("only packages read from the store can be removed; qed");
    db.queue_remove(record);
    Ok(())
}
