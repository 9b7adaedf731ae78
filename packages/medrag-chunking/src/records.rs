//! JSON Lines persistence for paragraphs and chunks.
//!
//! The chunk file is the only contract between chunking and indexing, so records are
//! written with every field present: `null` for an absent page range, `[]` for empty
//! label lists.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;

use medrag_domain::{Chunk, Paragraph};

use crate::{Error, Result};

pub fn read_paragraphs<R>(reader: R) -> impl Iterator<Item = Result<Paragraph>>
where
	R: BufRead,
{
	read_json_lines(reader)
}

pub fn read_chunks<R>(reader: R) -> impl Iterator<Item = Result<Chunk>>
where
	R: BufRead,
{
	read_json_lines(reader)
}

/// Writes one chunk per line and returns how many were written.
pub fn write_chunks<W, I>(chunks: I, mut writer: W) -> Result<usize>
where
	W: Write,
	I: IntoIterator<Item = Result<Chunk>>,
{
	let mut count = 0;

	for chunk in chunks {
		serde_json::to_writer(&mut writer, &chunk?)?;
		writer.write_all(b"\n")?;

		count += 1;
	}

	writer.flush()?;

	Ok(count)
}

fn read_json_lines<T, R>(reader: R) -> impl Iterator<Item = Result<T>>
where
	T: DeserializeOwned,
	R: BufRead,
{
	reader.lines().enumerate().filter_map(|(idx, line)| {
		let line = match line {
			Ok(line) => line,
			Err(err) => return Some(Err(Error::Io(err))),
		};

		if line.trim().is_empty() {
			return None;
		}

		Some(serde_json::from_str(&line).map_err(|source| Error::Record { line: idx + 1, source }))
	})
}
