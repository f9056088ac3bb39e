// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

//! CedarFocus measures the width of a star image, along with its sub-pixel
//! position, as a figure of merit for focusing a camera or telescope.
//!
//! Given a 16-bit grayscale image, the sky background level, and a pixel near
//! a star, CedarFocus finds the width parameter sigma of the circular
//! Gaussian that best matches the star. Smaller is better focused.
//!
//! Features:
//!
//! * Works on real, non-Gaussian star profiles: the reported sigma is the
//!   width of the Gaussian filter that is matched to the star, which is also
//!   near optimum for detecting and centroiding that star.
//! * Position and moments are interpolated to second order, so the result
//!   varies smoothly as the star moves across pixel boundaries.
//! * Integer arithmetic in the inner loops. Bright stars in 16-bit images are
//!   handled without overflow.
//! * Converges in a handful of iterations from a rough initial sigma.
//!
//! # Method
//!
//! The image is multiplied by a Gaussian kernel centered on each pixel of a
//! 3x3 grid around the star's peak. For each grid pixel this yields the
//! smoothed flux and four normalized second moments: along x, along y, and
//! along both diagonals. See [moments::evaluate_moments()].
//!
//! If the center of the grid is not the brightest, the grid moves toward the
//! brighter neighbor. Once it is, parabolas through the grid locate the
//! smoothed maximum to a fraction of a pixel and the moments are interpolated
//! there. See [algorithm::locate_focus_moments()].
//!
//! The sum of the x and y moments vanishes when the kernel's sigma matches
//! the star. [algorithm::find_sigma()] iterates sigma until it does.
//!
//! # Coordinates
//!
//! By default, positions are reported with (0, 0) at the upper left corner of
//! the upper left pixel, so the center of that pixel is (0.5, 0.5). Use
//! [algorithm::FocusParams::pixel_centered()] to have (0, 0) at the center of
//! the upper left pixel instead.
//!
//! # Caveats
//!
//! * The sky level must be supplied by the caller. A sky value that is too high
//!   can drive the weighted flux to zero or negative, in which case no moments
//!   can be computed.
//! * The star must be at least a kernel half-width (about 4 sigma) from all
//!   image edges.
//! * A star much narrower than one pixel, such as a hot pixel, has moments at
//!   the edge of their valid range and is rejected.
//! * Moment errors grow if neighboring stars fall within the kernel window.

pub mod algorithm;
pub mod error;
pub mod image_funcs;
pub mod kernel;
pub mod moments;
