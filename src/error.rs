// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

//! Error types for each stage of the focus computation. Each stage has its
//! own enum; the outer stages wrap the inner ones via `From` so that `?`
//! propagates them unchanged.

use thiserror::Error;

/// Flat classification of every failure the crate can report, independent of
/// which stage produced it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    InvalidSigma,
    KernelTooWide,
    WindowOutOfBounds,
    ZeroFlux,
    TooCloseToEdge,
    EdgeDuringSearch,
    TooManySearchIterations,
    FlatPeak,
    MomentOutOfRange,
    TooManyIterations,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum KernelError {
    #[error("sigma must be in the range (0, {max_sigma}]; got {sigma}")]
    InvalidSigma { sigma: f64, max_sigma: f64 },

    #[error("kernel cutoff {cutoff} for sigma {sigma} exceeds capacity {capacity}")]
    KernelTooWide { sigma: f64, cutoff: usize, capacity: usize },
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::InvalidSigma { .. } => ErrorKind::InvalidSigma,
            KernelError::KernelTooWide { .. } => ErrorKind::KernelTooWide,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum MomentError {
    /// The kernel window centered at (x, y) extends past the image.
    #[error("window of half-width {cutoff} at ({x}, {y}) exceeds {width}x{height} image")]
    WindowOutOfBounds { x: i32, y: i32, cutoff: usize, width: u32, height: u32 },

    /// The sky-subtracted, kernel-weighted flux summed to zero, so the
    /// normalized moments are undefined. Usually means the sky value is wrong.
    #[error("zero weighted flux at ({x}, {y}); check sky value")]
    ZeroFlux { x: i32, y: i32 },
}

impl MomentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MomentError::WindowOutOfBounds { .. } => ErrorKind::WindowOutOfBounds,
            MomentError::ZeroFlux { .. } => ErrorKind::ZeroFlux,
        }
    }
}

/// Axis of the 3x3 sample grid along which a parabola is fit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GridAxis {
    Horizontal,
    Vertical,
    /// Upper-left to lower-right.
    PlusDiagonal,
    /// Upper-right to lower-left.
    MinusDiagonal,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LocateError {
    #[error("position ({x}, {y}) is within {cutoff} pixels of the image edge")]
    TooCloseToEdge { x: i32, y: i32, cutoff: usize },

    #[error("peak search walked to ({x}, {y}), within {cutoff} pixels of the \
             image edge, after {retries} retries")]
    EdgeDuringSearch { x: i32, y: i32, cutoff: usize, retries: u32 },

    #[error("no local maximum found after {retries} retries; last center ({x}, {y})")]
    TooManySearchIterations { x: i32, y: i32, retries: u32 },

    #[error("flat peak at ({x}, {y}): {axis:?} curvature {curvature}")]
    FlatPeak { x: i32, y: i32, axis: GridAxis, curvature: f64 },

    #[error(transparent)]
    Moments(#[from] MomentError),
}

impl LocateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocateError::TooCloseToEdge { .. } => ErrorKind::TooCloseToEdge,
            LocateError::EdgeDuringSearch { .. } => ErrorKind::EdgeDuringSearch,
            LocateError::TooManySearchIterations { .. } =>
                ErrorKind::TooManySearchIterations,
            LocateError::FlatPeak { .. } => ErrorKind::FlatPeak,
            LocateError::Moments(e) => e.kind(),
        }
    }
}

/// Names one of the four normalized moments.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MomentName {
    X,
    Y,
    Plus,
    Minus,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SigmaError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    /// An interpolated moment left (-1, 1); the local quadratic model does not
    /// hold at this sigma.
    #[error("{moment:?} moment {value} out of range at sigma {sigma}")]
    MomentOutOfRange { sigma: f64, moment: MomentName, value: f64 },

    #[error("sigma did not converge in {iterations} iterations; last sigma {sigma}, \
             focus moment {focus_moment}")]
    TooManyIterations { sigma: f64, focus_moment: f64, iterations: u32 },
}

impl SigmaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SigmaError::Kernel(e) => e.kind(),
            SigmaError::Locate(e) => e.kind(),
            SigmaError::MomentOutOfRange { .. } => ErrorKind::MomentOutOfRange,
            SigmaError::TooManyIterations { .. } => ErrorKind::TooManyIterations,
        }
    }
}

// mod tests.
