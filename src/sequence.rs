//! Chord sequences used as training targets.

use crate::error::{Error, Result};
use crate::matrix::{self, Mat};

use serde_derive::{Deserialize, Serialize};

/// An ordered sequence of fixed-width chord rows, with a header row ("infos")
/// describing the piece as a whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChordSequence {
    infos: Mat,
    chords: Vec<Mat>,
}

impl ChordSequence {
    /// Creates a new sequence. `infos` must be a row vector and every chord a
    /// row vector of the same width as the first.
    pub fn new(infos: Mat, chords: Vec<Mat>) -> Result<Self> {
        if infos.nrows() != 1 {
            return Err(Error::width("sequence infos", infos.ncols(), infos.nrows(), infos.ncols()));
        }
        if let Some(first) = chords.first() {
            let width = first.ncols();
            for chord in &chords {
                matrix::expect_row(chord, width, "sequence chord")?;
            }
        }
        Ok(ChordSequence { infos, chords })
    }

    /// Builds a sequence from plain slices.
    pub fn from_rows<C: AsRef<[f64]>>(infos: &[f64], chords: &[C]) -> Result<Self> {
        ChordSequence::new(
            matrix::row(infos),
            chords.iter().map(|c| matrix::row(c.as_ref())).collect(),
        )
    }

    pub fn infos(&self) -> &Mat {
        &self.infos
    }

    pub fn chords(&self) -> &[Mat] {
        &self.chords
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// Width shared by every chord, `None` for an empty sequence.
    pub fn chord_len(&self) -> Option<usize> {
        self.chords.first().map(|c| c.ncols())
    }

    /// Keeps only the loudest note of every chord: its largest entry becomes
    /// 1 and every other entry 0. The first maximum wins ties.
    pub fn normalize_one_hot(&mut self) {
        for chord in &mut self.chords {
            let mut loudest = 0;
            for (i, &v) in chord.iter().enumerate() {
                if v > chord[[0, loudest]] {
                    loudest = i;
                }
            }
            chord.fill(0.0);
            if chord.ncols() > 0 {
                chord[[0, loudest]] = 1.0;
            }
        }
    }
}
