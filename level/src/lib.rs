#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Level definitions for Cube Roll and the line-oriented text format they are
//! authored in.
//!
//! A level file holds a playfield depth marker and one or more parts:
//!
//! ```text
//! //2
//! $1
//! XGX
//! XXX
//! $2
//! BGB
//! ```
//!
//! Within a part the last line is row `z = 0`.

mod source;

use std::path::PathBuf;

use cube_roll_core::{CubeSpawn, CubeType, GridPos};
use serde::Serialize;
use thiserror::Error;

pub use source::{level_name, DirectorySource, InMemorySource, LevelSource};

const DEPTH_MARKER: &str = "//";
const PART_MARKER: char = '$';

/// Errors raised while locating or parsing a level part.
#[derive(Debug, Error)]
pub enum LevelError {
    /// The named level resource does not exist.
    #[error("level `{level}` not found")]
    LevelNotFound {
        /// Name of the level that was requested.
        level: String,
    },
    /// The level exists but holds no lines for the requested part.
    #[error("part ${part} not found in level `{level}`")]
    PartNotFound {
        /// Name of the level that was searched.
        level: String,
        /// Part index that was requested.
        part: u32,
    },
    /// The level resource exists but could not be read.
    #[error("failed to read level file {}", .path.display())]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Kind of cube authored in a level cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CellKind {
    /// Neutral cube, also used for unrecognised glyphs.
    Gray,
    /// Chain reaction cube.
    Green,
    /// Heavy cube.
    Black,
}

impl CellKind {
    /// Maps a level glyph to its cell kind.
    #[must_use]
    pub const fn from_glyph(glyph: char) -> Self {
        match glyph {
            'G' => Self::Green,
            'X' => Self::Gray,
            'B' => Self::Black,
            _ => Self::Gray,
        }
    }

    /// Cube identity spawned for the cell.
    #[must_use]
    pub const fn cube_type(self) -> CubeType {
        match self {
            Self::Gray => CubeType::Gray,
            Self::Green => CubeType::Green,
            Self::Black => CubeType::Black,
        }
    }
}

/// Typed grid of a single level part plus its layout metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelDefinition {
    width: u32,
    depth: u32,
    playfield_depth: u32,
    part_index: u32,
    cells: Vec<CellKind>,
}

impl LevelDefinition {
    /// Number of columns of the part.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of authored rows of the part.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Extra empty rows appended beyond the authored rows.
    #[must_use]
    pub const fn playfield_depth(&self) -> u32 {
        self.playfield_depth
    }

    /// Index of the part inside its level file.
    #[must_use]
    pub const fn part_index(&self) -> u32 {
        self.part_index
    }

    /// Number of ground rows needed to host the part and its staging rows.
    #[must_use]
    pub const fn ground_depth(&self) -> u32 {
        self.depth.saturating_add(self.playfield_depth)
    }

    /// Returns the kind authored at column `x`, row `z`.
    #[must_use]
    pub fn cell(&self, x: u32, z: u32) -> Option<CellKind> {
        if x >= self.width || z >= self.depth {
            return None;
        }
        let index = usize::try_from(u64::from(z) * u64::from(self.width) + u64::from(x)).ok()?;
        self.cells.get(index).copied()
    }

    /// Iterates over every authored cell, row by row from `z = 0`.
    pub fn cells(&self) -> impl Iterator<Item = (GridPos, CellKind)> + '_ {
        let width = self.width.max(1);
        self.cells.iter().enumerate().map(move |(index, kind)| {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            let cell = GridPos::new(
                i32::try_from(index % width).unwrap_or(i32::MAX),
                i32::try_from(index / width).unwrap_or(i32::MAX),
            );
            (cell, *kind)
        })
    }

    /// Playing cubes to spawn for the part, one per authored cell.
    #[must_use]
    pub fn cube_spawns(&self) -> Vec<CubeSpawn> {
        self.cells()
            .map(|(cell, kind)| CubeSpawn::new(cell, kind.cube_type()))
            .collect()
    }

    /// Renders the part back into glyph rows, top row first.
    #[must_use]
    pub fn to_glyph_rows(&self) -> Vec<String> {
        (0..self.depth)
            .rev()
            .map(|z| {
                (0..self.width)
                    .map(|x| match self.cell(x, z) {
                        Some(CellKind::Green) => 'G',
                        Some(CellKind::Black) => 'B',
                        Some(CellKind::Gray) | None => 'X',
                    })
                    .collect::<String>()
            })
            .collect()
    }
}

/// Parses part `part` out of the text of level `level`.
///
/// Only the lines of the requested part contribute to its grid, so parts of
/// a file may have different widths.
pub fn parse_part(level: &str, text: &str, part: u32) -> Result<LevelDefinition, LevelError> {
    let mut playfield_depth = 0;
    let mut reading = false;
    let mut part_lines: Vec<&str> = Vec::new();

    for raw in text.split('\n') {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(DEPTH_MARKER) {
            playfield_depth = rest.trim().parse().unwrap_or(0);
            continue;
        }

        if let Some(rest) = line.strip_prefix(PART_MARKER) {
            if reading {
                break;
            }
            reading = rest.trim().parse::<u32>().ok() == Some(part);
            continue;
        }

        if reading {
            part_lines.push(line);
        }
    }

    if part_lines.is_empty() {
        tracing::debug!(name = level, part, "no lines collected for part");
        return Err(LevelError::PartNotFound {
            level: level.to_owned(),
            part,
        });
    }

    let rows: Vec<Vec<char>> = part_lines
        .iter()
        .rev()
        .map(|line| line.chars().collect())
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut cells = Vec::with_capacity(width * rows.len());
    for row in &rows {
        for x in 0..width {
            cells.push(row.get(x).copied().map_or(CellKind::Gray, CellKind::from_glyph));
        }
    }

    Ok(LevelDefinition {
        width: u32::try_from(width).unwrap_or(u32::MAX),
        depth: u32::try_from(rows.len()).unwrap_or(u32::MAX),
        playfield_depth,
        part_index: part,
        cells,
    })
}

/// Reads level `level` from the source and parses part `part` out of it.
pub fn load<S>(source: &S, level: &str, part: u32) -> Result<LevelDefinition, LevelError>
where
    S: LevelSource + ?Sized,
{
    let text = source.read(level)?;
    let definition = parse_part(level, &text, part)?;
    tracing::info!(
        name = level,
        part,
        width = definition.width(),
        depth = definition.depth(),
        playfield_depth = definition.playfield_depth(),
        "level part loaded"
    );
    Ok(definition)
}
