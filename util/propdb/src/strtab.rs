// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! Append-only pool of zero-terminated UTF-32 strings. Strings are addressed
//! by absolute byte offset and are immutable once written; identical strings
//! written twice occupy two offsets.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use memmap::Mmap;

use crate::{Error, Result, REVISION, SIGNATURE, VERSION};

/// String table file header length.
pub const STRTAB_HEADER_SIZE: usize = 12;

const CHAR_SIZE: usize = 4;

fn align4(val: u64) -> u64 {
	(val + 3) & !3
}

/// An open string table. Appends go through the file descriptor; reads go
/// through the map, which is refreshed after every append so that every
/// offset ever handed out stays readable.
pub struct StringTable {
	file: File,
	map: Mmap,
	size: u64,
	append_off: u64,
}

impl StringTable {
	/// Creates an empty string table at `path`. Refuses to overwrite an
	/// existing one.
	pub fn create(path: &Path) -> Result<()> {
		if path.exists() {
			return Err(Error::StrtabExists(path.to_owned()));
		}
		let mut file = OpenOptions::new()
			.write(true)
			.create_new(true)
			.mode(0o644)
			.open(path)?;
		let mut header = [0u8; STRTAB_HEADER_SIZE];
		LittleEndian::write_u64(&mut header[0..8], SIGNATURE);
		header[8] = VERSION;
		header[9] = REVISION;
		file.write_all(&header)?;
		Ok(())
	}

	/// Opens the string table at `path` read+write and maps it.
	pub fn open(path: &Path) -> Result<StringTable> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let size = file.metadata()?.len();
		if size < STRTAB_HEADER_SIZE as u64 {
			return Err(Error::Corrupt("string table shorter than its header".into()));
		}
		let map = unsafe { Mmap::map(&file)? };
		if LittleEndian::read_u64(&map[0..8]) != SIGNATURE {
			return Err(Error::Corrupt("bad string table signature".into()));
		}
		Ok(StringTable { file, map, size, append_off: size })
	}

	/// Appends `s` as zero-terminated UTF-32 and returns the offset it was
	/// written at. The next append starts at a 4-byte boundary.
	pub fn add(&mut self, s: &str) -> Result<u32> {
		let chars: Vec<char> = s.chars().collect();
		let mut buf = vec![0u8; (chars.len() + 1) * CHAR_SIZE];
		for (i, c) in chars.iter().enumerate() {
			LittleEndian::write_u32(&mut buf[i * CHAR_SIZE..(i + 1) * CHAR_SIZE], *c as u32);
		}
		self.file.write_all_at(&buf, self.append_off)?;
		let offset = self.append_off;
		let advance = align4(buf.len() as u64);
		self.append_off += advance;
		self.size += advance;
		// The map was sized before the append; refresh it so `get` covers
		// the new tail.
		self.map = unsafe { Mmap::map(&self.file)? };
		trace!("strtab: wrote {} chars at offset {}", chars.len(), offset);
		Ok(offset as u32)
	}

	/// Reads the zero-terminated UTF-32 string starting at `offset`.
	pub fn get(&self, offset: u32) -> Result<String> {
		if (offset as u64) < STRTAB_HEADER_SIZE as u64 || offset as u64 >= self.size {
			return Err(Error::BadOffset(offset));
		}
		let bytes = &self.map[offset as usize..];
		let mut out = String::new();
		for unit in bytes.chunks_exact(CHAR_SIZE) {
			let cp = LittleEndian::read_u32(unit);
			if cp == 0 {
				return Ok(out);
			}
			match std::char::from_u32(cp) {
				Some(c) => out.push(c),
				None => {
					return Err(Error::Corrupt(format!(
						"invalid code point {:#x} at string table offset {}",
						cp, offset
					)))
				}
			}
		}
		Err(Error::Corrupt(format!("unterminated string at offset {}", offset)))
	}

	/// Readable extent of the table in bytes.
	pub fn size(&self) -> u64 {
		self.size
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempdir::TempDir;

	fn new_table(dir: &TempDir) -> StringTable {
		let path = dir.path().join("strtab");
		StringTable::create(&path).unwrap();
		StringTable::open(&path).unwrap()
	}

	#[test]
	fn create_refuses_existing_table() {
		let dir = TempDir::new("strtab").unwrap();
		let path = dir.path().join("strtab");
		StringTable::create(&path).unwrap();
		match StringTable::create(&path) {
			Err(Error::StrtabExists(existing)) => assert_eq!(existing, path),
			other => panic!("expected StrtabExists, got {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn written_strings_read_back() {
		let dir = TempDir::new("strtab").unwrap();
		let mut table = new_table(&dir);
		let idx = table.add("Test string").unwrap();
		assert_eq!(table.get(idx).unwrap(), "Test string");
		let idx2 = table.add("Test string 2").unwrap();
		assert_eq!(table.get(idx2).unwrap(), "Test string 2");
		// First read still valid after the table grew.
		assert_eq!(table.get(idx).unwrap(), "Test string");
	}

	#[test]
	fn offsets_are_unique_and_aligned() {
		let dir = TempDir::new("strtab").unwrap();
		let mut table = new_table(&dir);
		let mut offsets = Vec::new();
		for s in &["a", "bb", "ccc", "a"] {
			offsets.push(table.add(s).unwrap());
		}
		// "a" written twice occupies two offsets; there is no deduplication.
		let mut sorted = offsets.clone();
		sorted.sort_unstable();
		sorted.dedup();
		assert_eq!(sorted.len(), offsets.len());
		for offset in offsets {
			assert_eq!(offset % 4, 0);
		}
	}

	#[test]
	fn first_string_lands_after_header() {
		let dir = TempDir::new("strtab").unwrap();
		let mut table = new_table(&dir);
		assert_eq!(table.add("x").unwrap(), STRTAB_HEADER_SIZE as u32);
	}

	#[test]
	fn out_of_bounds_offset_is_rejected() {
		let dir = TempDir::new("strtab").unwrap();
		let mut table = new_table(&dir);
		table.add("only").unwrap();
		let end = table.size() as u32;
		assert!(matches!(table.get(end), Err(Error::BadOffset(_))));
		assert!(matches!(table.get(0), Err(Error::BadOffset(0))));
	}

	#[test]
	fn survives_reopen() {
		let dir = TempDir::new("strtab").unwrap();
		let path = dir.path().join("strtab");
		StringTable::create(&path).unwrap();
		let idx = {
			let mut table = StringTable::open(&path).unwrap();
			table.add("persistent").unwrap()
		};
		let table = StringTable::open(&path).unwrap();
		assert_eq!(table.get(idx).unwrap(), "persistent");
	}
}
