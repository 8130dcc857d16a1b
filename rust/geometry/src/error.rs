// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building facets and blocks
#[derive(Error, Debug)]
pub enum Error {
    #[error("Insufficient data: need at least {required} points, got {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Hull construction failed: {0}")]
    HullConstruction(String),

    #[error("Degenerate block: {0}")]
    DegenerateBlock(String),

    #[error("Triangulation failed: {0}")]
    Triangulation(String),

    #[error("Allocation failure: {0}")]
    AllocationFailure(#[from] TryReserveError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unresolved reference to unique id {0}")]
    UnresolvedReference(u32),

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

impl Error {
    /// Shorthand for the "fewer than N points" case
    #[inline]
    pub fn insufficient(required: usize, found: usize) -> Self {
        Error::InsufficientData { required, found }
    }

    #[inline]
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Error::DegenerateGeometry(msg.into())
    }
}
