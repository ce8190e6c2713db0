// Copyright 2022 The Nnpkg Developers.
// Licensed under the Apache License, Version 2.0.

//! Parser for the block/property configuration grammar shared by the main
//! configuration file and package description files:
//!
//! ```text
//! block_type [block_name] {
//!     property value ...;          # values are quoted strings or identifiers
//! }
//! ```
//!
//! The parser produces a plain tree of [`Block`]s; interpretation of block
//! and property names is left entirely to the consumer.

use std::{error, fmt, path::Path, path::PathBuf};

/// A parse error, rendered as `path:line: message`.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
	pub path: PathBuf,
	pub line: usize,
	pub msg: String,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}:{}: {}", self.path.display(), self.line, self.msg)
	}
}

impl error::Error for Error {}

fn err<T>(path: &Path, line: usize, msg: impl Into<String>) -> Result<T> {
	Err(Error { path: path.to_owned(), line, msg: msg.into() })
}

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// Quoted string literal.
	Str(String),
	/// Bare identifier.
	Ident(String),
}

/// A property value with the line it appeared on.
#[derive(Debug, Clone, PartialEq)]
pub struct PropVal {
	pub value: Value,
	pub line: usize,
}

/// One `name value...;` property inside a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
	pub name: String,
	pub vals: Vec<PropVal>,
	pub line: usize,
}

/// One `type [name] { ... }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
	pub block_type: String,
	pub block_name: Option<String>,
	pub props: Vec<Property>,
	pub line: usize,
}

#[derive(Debug, PartialEq)]
enum Token {
	Ident(String),
	Str(String),
	LBrace,
	RBrace,
	Semi,
}

fn is_ident_char(c: char) -> bool {
	c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')
}

fn lex(path: &Path, source: &str) -> Result<Vec<(Token, usize)>> {
	let mut tokens = Vec::new();
	let mut chars = source.chars().peekable();
	let mut line = 1;
	while let Some(c) = chars.next() {
		match c {
			'\n' => line += 1,
			c if c.is_whitespace() => {}
			'#' => {
				// Comment runs to end of line.
				while let Some(&next) = chars.peek() {
					if next == '\n' {
						break;
					}
					chars.next();
				}
			}
			'{' => tokens.push((Token::LBrace, line)),
			'}' => tokens.push((Token::RBrace, line)),
			';' => tokens.push((Token::Semi, line)),
			quote @ '"' | quote @ '\'' => {
				let start = line;
				let mut text = String::new();
				loop {
					match chars.next() {
						Some(c) if c == quote => break,
						Some('\n') => {
							line += 1;
							text.push('\n');
						}
						Some(c) => text.push(c),
						None => return err(path, start, "unterminated string"),
					}
				}
				tokens.push((Token::Str(text), start));
			}
			c if is_ident_char(c) => {
				let mut ident = String::new();
				ident.push(c);
				while let Some(&next) = chars.peek() {
					if !is_ident_char(next) {
						break;
					}
					ident.push(next);
					chars.next();
				}
				tokens.push((Token::Ident(ident), line));
			}
			other => return err(path, line, format!("unexpected character '{}'", other)),
		}
	}
	Ok(tokens)
}

/// Parses `source` into its blocks. `path` is used only for error messages.
pub fn parse(path: &Path, source: &str) -> Result<Vec<Block>> {
	let tokens = lex(path, source)?;
	let mut pos = 0;
	let mut blocks = Vec::new();
	while pos < tokens.len() {
		let (block, next) = parse_block(path, &tokens, pos)?;
		blocks.push(block);
		pos = next;
	}
	Ok(blocks)
}

fn parse_block(path: &Path, tokens: &[(Token, usize)], mut pos: usize) -> Result<(Block, usize)> {
	let (block_type, line) = match &tokens[pos] {
		(Token::Ident(name), line) => (name.clone(), *line),
		(_, line) => return err(path, *line, "expected block type"),
	};
	pos += 1;
	let mut block_name = None;
	if let Some((Token::Ident(name), _)) = tokens.get(pos) {
		block_name = Some(name.clone());
		pos += 1;
	}
	match tokens.get(pos) {
		Some((Token::LBrace, _)) => pos += 1,
		_ => return err(path, line, format!("expected '{{' after block \"{}\"", block_type)),
	}
	let mut props = Vec::new();
	loop {
		match tokens.get(pos) {
			Some((Token::RBrace, _)) => {
				pos += 1;
				break;
			}
			Some((Token::Ident(_), _)) => {
				let (prop, next) = parse_property(path, tokens, pos)?;
				props.push(prop);
				pos = next;
			}
			Some((_, line)) => return err(path, *line, "expected property or '}'"),
			None => return err(path, line, format!("unterminated block \"{}\"", block_type)),
		}
	}
	Ok((Block { block_type, block_name, props, line }, pos))
}

fn parse_property(path: &Path, tokens: &[(Token, usize)], mut pos: usize) -> Result<(Property, usize)> {
	let (name, line) = match &tokens[pos] {
		(Token::Ident(name), line) => (name.clone(), *line),
		(_, line) => return err(path, *line, "expected property name"),
	};
	pos += 1;
	let mut vals = Vec::new();
	loop {
		match tokens.get(pos) {
			Some((Token::Semi, _)) => {
				pos += 1;
				break;
			}
			Some((Token::Str(text), val_line)) => {
				vals.push(PropVal { value: Value::Str(text.clone()), line: *val_line });
				pos += 1;
			}
			Some((Token::Ident(text), val_line)) => {
				vals.push(PropVal { value: Value::Ident(text.clone()), line: *val_line });
				pos += 1;
			}
			Some((_, line)) => {
				return err(path, *line, format!("expected value or ';' in property \"{}\"", name))
			}
			None => return err(path, line, format!("property \"{}\" is missing its ';'", name)),
		}
	}
	if vals.is_empty() {
		return err(path, line, format!("property \"{}\" requires at least one value", name));
	}
	Ok((Property { name, vals, line }, pos))
}
