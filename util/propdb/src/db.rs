// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! The property file: a 28-byte header followed by fixed 512-byte records.
//! Mutations are queued in memory and flushed on `close`; the header's record
//! count is the single authority on how far readers may scan, so a crash
//! between an append and the header rewrite leaves only ignorable garbage
//! past the counted region.
//!
//! On-disk layout, all little endian:
//!
//! ```text
//! header:  [sig: 8][version: 1][revision: 1][size: 2][crc32: 4]
//!          [num_props: 4][num_free_props: 4][prop_size: 4]
//! record:  [id: 4][crc32: 4][type: 2][reserved: 2][payload: 500]
//! ```
//!
//! `id` is a string table offset. Both checksums cover their whole structure
//! with the crc32 field zeroed. Free records have type `INVALID` and are
//! reused by a forward first-fit scan before the file is extended.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::PathBuf;

use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt as LockExt;
use log::debug;
use memmap::MmapMut;

use crate::strtab::StringTable;
use crate::{Error, Result, REVISION, SIGNATURE, VERSION};

/// Property file header length.
pub const HEADER_SIZE: usize = 28;

/// Size of one property record.
pub const PROP_SIZE: usize = 512;

/// Length of the record prefix (id, crc32, type, reserved).
pub const PROP_HEADER_SIZE: usize = 12;

/// Payload bytes available in one record.
pub const PROP_DATA_SIZE: usize = PROP_SIZE - PROP_HEADER_SIZE;

/// Record type of a free slot.
pub const PROP_TYPE_INVALID: u16 = 0;
/// Record type of a package property.
pub const PROP_TYPE_PKG: u16 = 1;
/// Record type of a string property.
pub const PROP_TYPE_STRING: u16 = 2;

/// Host paths of the property file and its companion string table.
#[derive(Debug, Clone, PartialEq)]
pub struct DbLocation {
	pub db_path: PathBuf,
	pub strtab_path: PathBuf,
}

/// A property staged for insertion or copied out of the store.
#[derive(Debug, Clone)]
pub struct Prop {
	/// Property id.
	pub id: String,
	/// Property type tag.
	pub prop_type: u16,
	/// Type-specific payload, at most [`PROP_DATA_SIZE`] bytes.
	pub data: Vec<u8>,
	/// Backing record index for properties read out of the store.
	pub record: Option<usize>,
}

fn crc32(bytes: &[u8]) -> u32 {
	let mut hasher = crc32fast::Hasher::new();
	hasher.update(bytes);
	hasher.finalize()
}

#[derive(Clone, Copy)]
struct Header([u8; HEADER_SIZE]);

impl Header {
	fn new() -> Header {
		let mut header = Header([0u8; HEADER_SIZE]);
		LittleEndian::write_u64(&mut header.0[0..8], SIGNATURE);
		header.0[8] = VERSION;
		header.0[9] = REVISION;
		LittleEndian::write_u16(&mut header.0[10..12], HEADER_SIZE as u16);
		LittleEndian::write_u32(&mut header.0[24..28], PROP_SIZE as u32);
		header
	}

	fn from_slice(slice: &[u8]) -> Header {
		let mut header = Header([0u8; HEADER_SIZE]);
		header.0.copy_from_slice(&slice[..HEADER_SIZE]);
		header
	}

	fn signature(&self) -> u64 {
		LittleEndian::read_u64(&self.0[0..8])
	}

	fn set_crc32(&mut self, crc: u32) {
		LittleEndian::write_u32(&mut self.0[12..16], crc);
	}

	fn num_props(&self) -> u32 {
		LittleEndian::read_u32(&self.0[16..20])
	}

	fn set_num_props(&mut self, num: u32) {
		LittleEndian::write_u32(&mut self.0[16..20], num);
	}

	fn num_free_props(&self) -> u32 {
		LittleEndian::read_u32(&self.0[20..24])
	}

	fn set_num_free_props(&mut self, num: u32) {
		LittleEndian::write_u32(&mut self.0[20..24], num);
	}

	fn prop_size(&self) -> u32 {
		LittleEndian::read_u32(&self.0[24..28])
	}

	/// CRC over the header with its own crc32 field zeroed.
	fn checksum(&self) -> u32 {
		let mut zeroed = self.0;
		zeroed[12..16].copy_from_slice(&[0u8; 4]);
		crc32(&zeroed)
	}
}

/// Serializes `prop` into a 512-byte slot. The id is appended to the string
/// table; the record checksum is computed last, over the slot with the crc32
/// field still zero.
fn serialize_record(strtab: &mut StringTable, prop: &Prop, slot: &mut [u8; PROP_SIZE]) -> Result<()> {
	assert!(prop.data.len() <= PROP_DATA_SIZE, "property payload exceeds a record");
	let id = strtab.add(&prop.id)?;
	LittleEndian::write_u32(&mut slot[0..4], id);
	LittleEndian::write_u32(&mut slot[4..8], 0);
	LittleEndian::write_u16(&mut slot[8..10], prop.prop_type);
	slot[10] = 0;
	slot[11] = 0;
	slot[PROP_HEADER_SIZE..PROP_HEADER_SIZE + prop.data.len()].copy_from_slice(&prop.data);
	for byte in &mut slot[PROP_HEADER_SIZE + prop.data.len()..] {
		*byte = 0;
	}
	let crc = crc32(&slot[..]);
	LittleEndian::write_u32(&mut slot[4..8], crc);
	Ok(())
}

/// An open, exclusively locked property database. Staged additions and
/// removals are committed by [`PropDb::close`]; dropping the database
/// without closing releases the lock and discards the queues.
pub struct PropDb {
	file: File,
	map: MmapMut,
	size: u64,
	path: PathBuf,
	strtab: StringTable,
	props_to_add: Vec<Prop>,
	props_to_rm: Vec<usize>,
	alloc_mark: Option<usize>,
	props_left: usize,
	num_free_props: u32,
}

impl PropDb {
	/// Creates the property database and its companion string table. Fails
	/// if either file already exists.
	pub fn create(loc: &DbLocation) -> Result<()> {
		if loc.db_path.exists() {
			return Err(Error::DbExists(loc.db_path.clone()));
		}
		if let Some(dir) = loc.db_path.parent() {
			fs::create_dir_all(dir)?;
		}
		let mut file = OpenOptions::new()
			.write(true)
			.create_new(true)
			.mode(0o644)
			.open(&loc.db_path)?;
		let mut header = Header::new();
		header.set_crc32(header.checksum());
		file.write_all(&header.0)?;
		StringTable::create(&loc.strtab_path)
	}

	/// Opens and locks the database at `loc`. A second opener fails with
	/// [`Error::Locked`] while the first is live; the lock is released when
	/// the database is closed or dropped.
	pub fn open(loc: &DbLocation) -> Result<PropDb> {
		let file = OpenOptions::new().read(true).write(true).open(&loc.db_path)?;
		let size = file.metadata()?.len();
		if size < HEADER_SIZE as u64 {
			return Err(Error::Corrupt("property file shorter than its header".into()));
		}
		if let Err(err) = file.try_lock_exclusive() {
			if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
				return Err(Error::Locked);
			}
			return Err(err.into());
		}
		let map = unsafe { MmapMut::map_mut(&file)? };
		let header = Header::from_slice(&map[..HEADER_SIZE]);
		if header.signature() != SIGNATURE {
			return Err(Error::Corrupt("bad property file signature".into()));
		}
		if header.prop_size() != PROP_SIZE as u32 {
			return Err(Error::Corrupt(format!(
				"unsupported record size {}",
				header.prop_size()
			)));
		}
		let num_free_props = header.num_free_props();
		let strtab = StringTable::open(&loc.strtab_path)?;
		debug!(
			"opened {} ({} records, {} free)",
			loc.db_path.display(),
			header.num_props(),
			num_free_props
		);
		Ok(PropDb {
			file,
			map,
			size,
			path: loc.db_path.clone(),
			strtab,
			props_to_add: Vec::new(),
			props_to_rm: Vec::new(),
			alloc_mark: None,
			props_left: 0,
			num_free_props,
		})
	}

	fn header(&self) -> Header {
		Header::from_slice(&self.map[..HEADER_SIZE])
	}

	/// Number of record slots the header admits readers to scan.
	pub fn num_props(&self) -> u32 {
		self.header().num_props()
	}

	/// Number of free record slots.
	pub fn num_free_props(&self) -> u32 {
		self.num_free_props
	}

	/// The string table backing this database.
	pub fn strtab(&self) -> &StringTable {
		&self.strtab
	}

	/// Mutable access to the string table, for callers serializing payloads
	/// that reference strings of their own.
	pub fn strtab_mut(&mut self) -> &mut StringTable {
		&mut self.strtab
	}

	fn record_slice(&self, index: usize) -> &[u8] {
		let start = HEADER_SIZE + index * PROP_SIZE;
		&self.map[start..start + PROP_SIZE]
	}

	/// Linear scan of the live store for a property named `name`.
	/// O(num_props); callers must not assume sublinear behavior.
	pub fn find(&self, name: &str) -> Result<Option<Prop>> {
		let count = self.num_props() as usize;
		for index in 0..count {
			let record = self.record_slice(index);
			let prop_type = LittleEndian::read_u16(&record[8..10]);
			if prop_type == PROP_TYPE_INVALID {
				continue;
			}
			let id = LittleEndian::read_u32(&record[0..4]);
			if self.strtab.get(id)? == name {
				return Ok(Some(Prop {
					id: name.to_owned(),
					prop_type,
					data: record[PROP_HEADER_SIZE..].to_vec(),
					record: Some(index),
				}));
			}
		}
		Ok(None)
	}

	/// Stages a property for insertion at commit time. No I/O happens here;
	/// duplicate-id checks are the caller's responsibility.
	pub fn queue_add(&mut self, prop: Prop) {
		self.props_to_add.push(prop);
	}

	/// True when a property with `id` is already staged for insertion.
	pub fn pending(&self, id: &str) -> bool {
		self.props_to_add.iter().any(|prop| prop.id == id)
	}

	/// Stages the record at `index` for removal at commit time.
	pub fn queue_remove(&mut self, index: usize) {
		assert!(
			index < self.num_props() as usize,
			"record index outside the live store"
		);
		self.props_to_rm.push(index);
	}

	/// First-fit forward scan for a free slot, starting at the allocation
	/// mark left by the previous call. Returns `None` when the store is full
	/// or the remaining range holds no free slot.
	fn alloc_slot(&mut self) -> Option<usize> {
		if self.num_free_props == 0 {
			return None;
		}
		let (start, left) = match self.alloc_mark {
			Some(mark) => (mark, self.props_left),
			None => (0, self.num_props() as usize),
		};
		for i in 0..left {
			let index = start + i;
			let record = self.record_slice(index);
			if LittleEndian::read_u16(&record[8..10]) == PROP_TYPE_INVALID {
				self.num_free_props -= 1;
				self.props_left = left - i - 1;
				self.alloc_mark = Some(index + 1);
				return Some(index);
			}
		}
		None
	}

	/// Commits staged changes and closes the database: removed slots are
	/// zeroed, additions fill free slots before the file is extended, and
	/// the header counters and checksum are rewritten last.
	pub fn close(mut self) -> Result<()> {
		let props_to_rm = std::mem::replace(&mut self.props_to_rm, Vec::new());
		let props_to_add = std::mem::replace(&mut self.props_to_add, Vec::new());
		let removed = props_to_rm.len();
		let added = props_to_add.len();

		for index in props_to_rm {
			let start = HEADER_SIZE + index * PROP_SIZE;
			for byte in &mut self.map[start..start + PROP_SIZE] {
				*byte = 0;
			}
			self.num_free_props += 1;
		}

		let mut header = self.header();
		let mut num_props = header.num_props();
		let mut cur_end = self.size;
		for prop in props_to_add {
			let mut slot = [0u8; PROP_SIZE];
			serialize_record(&mut self.strtab, &prop, &mut slot)?;
			match self.alloc_slot() {
				Some(index) => {
					let start = HEADER_SIZE + index * PROP_SIZE;
					self.map[start..start + PROP_SIZE].copy_from_slice(&slot);
				}
				None => {
					self.file.write_all_at(&slot, cur_end)?;
					cur_end += PROP_SIZE as u64;
					num_props += 1;
				}
			}
		}

		header.set_num_props(num_props);
		header.set_num_free_props(self.num_free_props);
		header.set_crc32(header.checksum());
		self.map[..HEADER_SIZE].copy_from_slice(&header.0);
		self.map.flush()?;
		debug!(
			"committed {} ({} added, {} removed, {} records)",
			self.path.display(),
			added,
			removed,
			num_props
		);
		Ok(())
	}
}
