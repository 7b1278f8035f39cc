// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur during mesh construction, solver setup, I/O, or
/// traveltime computation.
#[derive(Debug)]
pub enum EikonalError {
    /// A source or receiver point is neither on a mesh vertex nor inside
    /// any cell.
    PointOutsideMesh {
        /// Index of the offending point in its input slice.
        index: usize,
        /// Coordinates of the offending point.
        coord: Vec<f64>,
    },
    /// A cell references a vertex index past the end of the vertex list.
    InvalidVertexIndex {
        /// The cell containing the bad reference.
        cell: usize,
        /// The out-of-range vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },
    /// A cell repeats a vertex or has (numerically) zero area.
    DegenerateCell {
        /// The offending cell.
        cell: usize,
    },
    /// Slowness vector length does not match the number of cells.
    SlownessSizeMismatch {
        /// Number of cells in the mesh.
        expected: usize,
        /// Length of the slowness vector provided.
        got: usize,
    },
    /// Slowness value is not positive and finite.
    InvalidSlowness {
        /// The cell index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f64,
    },
    /// Velocity value is not positive and finite.
    InvalidVelocity {
        /// The cell index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f64,
    },
    /// Solver tolerance is not positive and finite.
    InvalidTolerance(f64),
    /// Worker id is outside the configured worker count.
    InvalidWorker {
        /// The worker id passed in.
        worker: usize,
        /// The number of workers the grid was built with.
        num_workers: usize,
    },
    /// Number of emission times differs from the number of sources.
    SourceCountMismatch {
        /// Number of source points.
        sources: usize,
        /// Number of emission times.
        times: usize,
    },
    /// A positive source radius was configured but contains no mesh nodes.
    NoSourceNodes {
        /// The configured radius.
        radius: f64,
    },
    /// Array shape in a file does not match the expected shape.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The shape encountered.
        got: Vec<usize>,
    },
    /// Unsupported data type in a file.
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// Expected MAT variable not found in file.
    MatVariableNotFound {
        /// The variable name that was requested.
        expected: String,
        /// The variable names that are available.
        available: Vec<String>,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for EikonalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EikonalError::PointOutsideMesh { index, coord } => {
                write!(f, "point {} at {:?} is outside the mesh", index, coord)
            }
            EikonalError::InvalidVertexIndex {
                cell,
                index,
                num_vertices,
            } => {
                write!(
                    f,
                    "cell {} references vertex {} but the mesh has {} vertices",
                    cell, index, num_vertices
                )
            }
            EikonalError::DegenerateCell { cell } => {
                write!(f, "cell {} is degenerate (repeated vertex or zero area)", cell)
            }
            EikonalError::SlownessSizeMismatch { expected, got } => {
                write!(
                    f,
                    "slowness vector has {} entries but the mesh has {} cells",
                    got, expected
                )
            }
            EikonalError::InvalidSlowness { index, value } => {
                write!(
                    f,
                    "invalid slowness in cell {}: {} (must be positive and finite)",
                    index, value
                )
            }
            EikonalError::InvalidVelocity { index, value } => {
                write!(
                    f,
                    "invalid velocity in cell {}: {} (must be positive and finite)",
                    index, value
                )
            }
            EikonalError::InvalidTolerance(tol) => {
                write!(
                    f,
                    "invalid tolerance: {} (must be positive and finite)",
                    tol
                )
            }
            EikonalError::InvalidWorker {
                worker,
                num_workers,
            } => {
                write!(
                    f,
                    "worker id {} out of range: grid was built for {} workers",
                    worker, num_workers
                )
            }
            EikonalError::SourceCountMismatch { sources, times } => {
                write!(f, "{} sources given but {} emission times", sources, times)
            }
            EikonalError::NoSourceNodes { radius } => {
                write!(f, "no mesh nodes found within source radius {}", radius)
            }
            EikonalError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            EikonalError::UnsupportedDtype(dtype) => {
                write!(f, "unsupported dtype: {}", dtype)
            }
            EikonalError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            EikonalError::MatVariableNotFound {
                expected,
                available,
            } => {
                write!(
                    f,
                    "MAT variable '{}' not found; available variables: {:?}",
                    expected, available
                )
            }
            EikonalError::IoError(e) => write!(f, "I/O error: {}", e),
            EikonalError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EikonalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EikonalError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EikonalError {
    fn from(e: std::io::Error) -> Self {
        EikonalError::IoError(e)
    }
}

/// Convenience type alias for Results with EikonalError.
pub type Result<T> = std::result::Result<T, EikonalError>;
