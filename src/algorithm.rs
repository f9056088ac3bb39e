// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Instant;

use log::debug;

use crate::error::{GridAxis, LocateError, MomentError, MomentName, SigmaError};
use crate::image_funcs::Gray16Image;
use crate::kernel::{Kernel, KernelCache};
use crate::moments::{evaluate_moments, MomentSample};

// Converts the interpolated peak filter value to an estimate of the star's
// peak value above sky.
const PEAK_VALUE_SCALE: f64 = 1.0 / 32.0;

/// Tunable constants for [locate_focus_moments()] and [find_sigma()].
#[derive(Clone, Debug)]
pub struct FocusParams {
    /// Added to the interpolated pixel position to form the reported
    /// position. With the default of 0.5, a star centered on pixel (i, j) is
    /// reported at (i + 0.5, j + 0.5), i.e. (0, 0) is the upper left corner
    /// of the upper left pixel. Use 0 for pixel-center coordinates.
    pub offset_x: f64,
    pub offset_y: f64,

    /// Number of times the peak search may move its 3x3 grid before giving
    /// up.
    pub max_search_retries: u32,

    pub max_sigma_iterations: u32,

    /// The sigma iteration stops when |xmom + ymom| is below this, or when
    /// twice the change in sigma is below this.
    pub sigma_tolerance: f64,

    /// Parabola fits with curvature below this are deemed flat.
    pub flat_peak_epsilon: f64,

    /// Starting sigma when the caller does not supply one.
    pub default_sigma: f64,
}

impl Default for FocusParams {
    fn default() -> Self {
        FocusParams{offset_x: 0.5,
                    offset_y: 0.5,
                    max_search_retries: 15,
                    max_sigma_iterations: 10,
                    sigma_tolerance: 0.01,
                    flat_peak_epsilon: 1e-10,
                    default_sigma: 1.2}
    }
}

impl FocusParams {
    /// Default parameters, but reporting positions with (0, 0) at the center
    /// of the upper left pixel.
    pub fn pixel_centered() -> Self {
        FocusParams{offset_x: 0.0, offset_y: 0.0, ..Default::default()}
    }
}

/// Position and moments of a star, interpolated to the smoothed image's
/// maximum. Produced by [locate_focus_moments()].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FocusResult {
    /// Interpolated position of the maximum; see [FocusParams::offset_x].
    pub xf: f64,
    pub yf: f64,

    /// The four normalized moments, interpolated to (xf, yf). See
    /// [MomentSample].
    pub xmom: f64,
    pub ymom: f64,
    pub pmom: f64,
    pub mmom: f64,

    /// Estimated peak value of the star above sky, in pixel units.
    pub peak_value: f64,

    /// The pixel at which the smoothed image is maximum.
    pub peak_x: i32,
    pub peak_y: i32,

    /// How many times the search moved away from the initial guess. Zero when
    /// the guess was already the maximum.
    pub retries: u32,
}

impl FocusResult {
    /// The moment that vanishes when sigma matches the star's width. Grows
    /// roughly quadratically with focus error.
    pub fn focus_moment(&self) -> f64 {
        self.xmom + self.ymom
    }
}

// Moment samples at the 3x3 pixels around a center. Indexed [row][column];
// row 0 is y - 1 and column 0 is x - 1.
type SampleGrid = [[MomentSample; 3]; 3];

// Grid cells at the (minus, plus) ends of each axis, as (row, column).
fn axis_ends(axis: GridAxis) -> ((usize, usize), (usize, usize)) {
    match axis {
        GridAxis::Horizontal => ((1, 0), (1, 2)),
        GridAxis::Vertical => ((0, 1), (2, 1)),
        GridAxis::PlusDiagonal => ((0, 0), (2, 2)),
        GridAxis::MinusDiagonal => ((0, 2), (2, 0)),
    }
}

// A parabola through the grid center and the two ends of an axis, expressed
// as f(d) = f(0) + slope * d - curvature * d^2 / 2.
#[derive(Copy, Clone, Debug)]
struct Parabola {
    curvature: f64,
    slope: f64,
}

impl Parabola {
    fn fit(grid: &SampleGrid, axis: GridAxis,
           value: fn(&MomentSample) -> f64) -> Parabola {
        let ((mr, mc), (pr, pc)) = axis_ends(axis);
        let center = value(&grid[1][1]);
        let minus = value(&grid[mr][mc]);
        let plus = value(&grid[pr][pc]);
        Parabola{curvature: 2.0 * center - minus - plus,
                 slope: 0.5 * (plus - minus)}
    }

    // Position of the extremum along the axis, in grid steps.
    fn offset(&self) -> f64 {
        self.slope / self.curvature
    }
}

// Evaluates `value` at offsets `da` and `db` along two axes using the separate
// parabolas along each.
fn interpolate(grid: &SampleGrid, value: fn(&MomentSample) -> f64,
               (axis_a, da): (GridAxis, f64), (axis_b, db): (GridAxis, f64)) -> f64 {
    let a = Parabola::fit(grid, axis_a, value);
    let b = Parabola::fit(grid, axis_b, value);
    value(&grid[1][1]) + a.slope * da + b.slope * db
        - 0.5 * (da * da * a.curvature + db * db * b.curvature)
}

enum Neighborhood {
    // The center is at least as bright as all of its neighbors.
    Peak(SampleGrid),
    // Direction of the first neighbor found to be brighter than the center.
    Brighter{dx: i32, dy: i32},
}

// Samples the 3x3 grid centered at (x, y), stopping at the first neighbor
// (in raster order) whose filter value exceeds the center's.
fn sample_neighborhood(image: &Gray16Image, x: i32, y: i32, sky: i32,
                       kernel: &Kernel) -> Result<Neighborhood, MomentError> {
    let center = evaluate_moments(image, x, y, sky, kernel)?;
    let mut grid: SampleGrid = [[center; 3]; 3];
    for i in 0..3 {
        let dy = i as i32 - 1;
        for j in 0..3 {
            let dx = j as i32 - 1;
            if dx == 0 && dy == 0 {
                continue;
            }
            let sample = evaluate_moments(image, x + dx, y + dy, sky, kernel)?;
            if sample.filval > center.filval {
                return Ok(Neighborhood::Brighter{dx, dy});
            }
            grid[i][j] = sample;
        }
    }
    Ok(Neighborhood::Peak(grid))
}

/// Finds the star near pixel (x, y) and returns its position and moments
/// interpolated to second order.
///
/// The guess need not be exactly the maximum of the smoothed image. If a
/// neighboring pixel is brighter under the kernel, the search moves one pixel
/// toward it and starts over; for a reasonably bright star whose guess is
/// the brightest raw pixel this rarely takes more than one move.
///
/// # Arguments
///   `image` - The image containing the star.
///
///   `x`, `y` - Pixel near the star's peak.
///
///   `sky` - Background level, subtracted from all pixels.
///
///   `kernel` - Gaussian kernel, as from [crate::kernel::generate_kernel()].
///
///   `params` - Search limits and coordinate convention.
///
/// # Errors
/// [LocateError::TooCloseToEdge] if the guess is within the kernel cutoff of
/// the image edge and [LocateError::EdgeDuringSearch] if the search moves
/// there. [LocateError::TooManySearchIterations] if no maximum is found
/// within `params.max_search_retries` moves. [LocateError::FlatPeak] if the
/// maximum cannot be interpolated. Errors from [evaluate_moments()] are passed
/// through.
pub fn locate_focus_moments(image: &Gray16Image, x: i32, y: i32, sky: i32,
                            kernel: &Kernel, params: &FocusParams)
                            -> Result<FocusResult, LocateError> {
    let (width, height) = image.dimensions();
    let ncut = kernel.cutoff();
    let margin = ncut as i32;
    let (mut x, mut y) = (x, y);
    let mut retries = 0_u32;
    let grid = loop {
        if retries >= params.max_search_retries {
            return Err(LocateError::TooManySearchIterations{x, y, retries});
        }
        // We bail if the star is too close to an edge.
        if x < margin || y < margin ||
            x > width as i32 - margin - 1 || y > height as i32 - margin - 1
        {
            if retries == 0 {
                return Err(LocateError::TooCloseToEdge{x, y, cutoff: ncut});
            }
            return Err(LocateError::EdgeDuringSearch{x, y, cutoff: ncut, retries});
        }
        match sample_neighborhood(image, x, y, sky, kernel)? {
            Neighborhood::Peak(grid) => break grid,
            Neighborhood::Brighter{dx, dy} => {
                // The maximum of the smoothed image is not where the guess
                // was. Move and resample everything.
                debug!("Smoothed maximum is not at ({}, {}); moving by ({}, {})",
                       x, y, dx, dy);
                x += dx;
                y += dy;
                retries += 1;
            },
        }
    };

    let mut fits = [Parabola{curvature: 0.0, slope: 0.0}; 4];
    let axes = [GridAxis::Horizontal, GridAxis::Vertical,
                GridAxis::PlusDiagonal, GridAxis::MinusDiagonal];
    for (fit, axis) in fits.iter_mut().zip(axes) {
        *fit = Parabola::fit(&grid, axis, |s| s.filval);
        if fit.curvature < params.flat_peak_epsilon {
            return Err(LocateError::FlatPeak{x, y, axis, curvature: fit.curvature});
        }
    }
    let [fx, fy, fp, fm] = fits;
    let dx = fx.offset();
    let dy = fy.offset();
    let dp = fp.offset();
    let dm = fm.offset();

    // Parabolic peak value along the central cross.
    let center = grid[1][1].filval;
    let v0 = center + 0.5 * (fx.slope * fx.slope / fx.curvature +
                             fy.slope * fy.slope / fy.curvature);

    let horizontal = (GridAxis::Horizontal, dx);
    let vertical = (GridAxis::Vertical, dy);
    let plus = (GridAxis::PlusDiagonal, dp);
    let minus = (GridAxis::MinusDiagonal, dm);
    Ok(FocusResult{
        xf: x as f64 + dx + params.offset_x,
        yf: y as f64 + dy + params.offset_y,
        xmom: interpolate(&grid, |s| s.xmom, horizontal, vertical),
        ymom: interpolate(&grid, |s| s.ymom, horizontal, vertical),
        pmom: interpolate(&grid, |s| s.pmom, plus, minus),
        mmom: interpolate(&grid, |s| s.mmom, plus, minus),
        peak_value: v0 * PEAK_VALUE_SCALE,
        peak_x: x,
        peak_y: y,
        retries,
    })
}

/// Why [find_sigma()] stopped iterating.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Convergence {
    /// The focus moment fell within tolerance.
    FocusMoment,
    /// Sigma stopped changing, although the focus moment was not quite
    /// within tolerance.
    SigmaStable,
}

/// Result of [find_sigma()].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SigmaEstimate {
    /// Width parameter of the Gaussian that best matches the star.
    pub sigma: f64,

    /// Star position and moments from the final iteration. When
    /// `convergence` is [Convergence::SigmaStable] these were computed at the
    /// previous value of `sigma`.
    pub focus: FocusResult,

    pub iterations: u32,
    pub convergence: Convergence,
}

/// Finds the Gaussian width for which the focus moment of the star near
/// pixel (x, y) vanishes.
///
/// Multiplying a Gaussian star of width sigma by a Gaussian of the same width
/// times 2(r/sigma)^2 - 2 integrates to zero. Real stars are not Gaussians, but
/// the sigma for which the normalized moment
///
///   Sum(star * gaussian * (2(r/sigma)^2 - 2)) / Sum(star * gaussian)
///
/// vanishes is an equivalent width that is close to optimum as a detection
/// filter and for centroiding. Each iteration measures that moment with the
/// current sigma and rescales sigma by sqrt((2 + m) / (2 - m)).
///
/// `initial_sigma` of None (or a negative value) starts from
/// `params.default_sigma`.
///
/// # Errors
/// Errors from kernel generation and from [locate_focus_moments()] are passed
/// through. [SigmaError::MomentOutOfRange] if any interpolated moment leaves
/// (-1, 1), which happens when the star is much wider or narrower than the
/// trial sigma. [SigmaError::TooManyIterations] if sigma does not settle
/// within `params.max_sigma_iterations`.
pub fn find_sigma(image: &Gray16Image, x: i32, y: i32, sky: i32,
                  initial_sigma: Option<f64>, params: &FocusParams)
                  -> Result<SigmaEstimate, SigmaError> {
    let mut cache = KernelCache::new();
    find_sigma_with_cache(&mut cache, image, x, y, sky, initial_sigma, params)
}

/// Same as [find_sigma()], but reuses kernels from `cache` when a trial sigma
/// repeats. Useful when repeatedly processing a star whose width is stable.
pub fn find_sigma_with_cache(cache: &mut KernelCache, image: &Gray16Image,
                             x: i32, y: i32, sky: i32,
                             initial_sigma: Option<f64>, params: &FocusParams)
                             -> Result<SigmaEstimate, SigmaError> {
    let find_start = Instant::now();
    let mut sigma = match initial_sigma {
        Some(s) if s < 0.0 => params.default_sigma,
        Some(s) => s,
        None => params.default_sigma,
    };
    let mut focus_moment = f64::NAN;
    for iteration in 1..=params.max_sigma_iterations {
        let kernel = cache.get(sigma)?;
        let prev_sigma = sigma;
        let focus = locate_focus_moments(image, x, y, sky, kernel, params)?;
        for (moment, value) in [(MomentName::X, focus.xmom),
                                (MomentName::Y, focus.ymom),
                                (MomentName::Plus, focus.pmom),
                                (MomentName::Minus, focus.mmom)] {
            if !(value > -1.0 && value < 1.0) {
                return Err(SigmaError::MomentOutOfRange{sigma, moment, value});
            }
        }
        focus_moment = focus.focus_moment();
        debug!("Iteration {}: sigma {} focus moment {} at ({}, {})",
               iteration, sigma, focus_moment, focus.xf, focus.yf);

        let mut convergence = None;
        if focus_moment.abs() < params.sigma_tolerance {
            convergence = Some(Convergence::FocusMoment);
        } else {
            sigma *= ((2.0 + focus_moment) / (2.0 - focus_moment)).sqrt();
            if 2.0 * (prev_sigma - sigma).abs() < params.sigma_tolerance {
                convergence = Some(Convergence::SigmaStable);
            }
        }
        if let Some(convergence) = convergence {
            debug!("Found sigma {} ({:?}) in {} iterations, {:?}",
                   sigma, convergence, iteration, find_start.elapsed());
            return Ok(SigmaEstimate{sigma, focus, iterations: iteration,
                                    convergence});
        }
    }
    Err(SigmaError::TooManyIterations{sigma, focus_moment,
                                      iterations: params.max_sigma_iterations})
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use imageproc::noise::gaussian_noise;
    use super::*;
    use crate::error::ErrorKind;
    use crate::image_funcs::{add_gaussian_star, uniform_image};
    use crate::kernel::generate_kernel;

    fn star_image(width: u32, height: u32, sky: u16, amplitude: f64, sigma: f64,
                  center_x: f64, center_y: f64) -> Gray16Image {
        let mut image = uniform_image(width, height, sky);
        add_gaussian_star(&mut image, amplitude, sigma, center_x, center_y);
        image
    }

    #[test]
    fn test_locate_focus_moments_centered() {
        // Circularly symmetric star centered on pixel (10, 10).
        let image = star_image(21, 21, 100, 5000.0, 1.5, 10.5, 10.5);
        let kernel = generate_kernel(1.5).unwrap();
        let result = locate_focus_moments(&image, 10, 10, 100, &kernel,
                                          &FocusParams::default()).unwrap();
        assert_eq!(result.retries, 0);
        assert_eq!((result.peak_x, result.peak_y), (10, 10));
        // No sub-pixel offset.
        assert_eq!(result.xf, 10.5);
        assert_eq!(result.yf, 10.5);
        assert_abs_diff_eq!(result.xmom, result.ymom, epsilon = 5e-4);
        assert_abs_diff_eq!(result.pmom, result.mmom, epsilon = 1e-9);
        assert_abs_diff_eq!(result.focus_moment(), 0.0, epsilon = 0.01);

        let result = locate_focus_moments(&image, 10, 10, 100, &kernel,
                                          &FocusParams::pixel_centered()).unwrap();
        assert_eq!(result.xf, 10.0);
        assert_eq!(result.yf, 10.0);
    }

    #[test]
    fn test_locate_focus_moments_recenters() {
        let image = star_image(21, 21, 100, 5000.0, 1.5, 10.3, 9.7);
        let kernel = generate_kernel(1.5).unwrap();
        // Smoothed maximum is at pixel (10, 9).
        let result = locate_focus_moments(&image, 10, 10, 100, &kernel,
                                          &FocusParams::default()).unwrap();
        assert_eq!(result.retries, 1);
        assert_eq!((result.peak_x, result.peak_y), (10, 9));
        assert_abs_diff_eq!(result.xf, 10.3, epsilon = 0.02);
        assert_abs_diff_eq!(result.yf, 9.7, epsilon = 0.02);

        // A more distant guess walks further but lands in the same place.
        let far = locate_focus_moments(&image, 12, 12, 100, &kernel,
                                       &FocusParams::default()).unwrap();
        assert_eq!(far.retries, 3);
        assert_eq!((far.peak_x, far.peak_y), (10, 9));
        assert_eq!(far.xf, result.xf);
        assert_eq!(far.yf, result.yf);
        assert_eq!(far.xmom, result.xmom);
    }

    #[test]
    fn test_locate_focus_moments_too_close_to_edge() {
        let image = star_image(41, 41, 100, 5000.0, 2.0, 20.5, 20.5);
        for sigma in [0.5, 1.0, 1.5, 2.0, 3.0, 4.5] {
            let kernel = generate_kernel(sigma).unwrap();
            let cutoff = kernel.cutoff() as i32;
            for (x, y) in [(cutoff - 1, 20), (20, cutoff - 1),
                           (41 - cutoff, 20), (20, 41 - cutoff)] {
                let err = locate_focus_moments(&image, x, y, 100, &kernel,
                                               &FocusParams::default()).unwrap_err();
                assert_eq!(err, LocateError::TooCloseToEdge{
                    x, y, cutoff: kernel.cutoff()}, "sigma {}", sigma);
            }
        }
    }

    #[test]
    fn test_locate_focus_moments_edge_during_search() {
        // Star is centered on pixel (3, 10), inside the margin of a sigma 1
        // kernel (cutoff 4). The search starts legally at (5, 10). Neighbors
        // are visited in raster order, so the first move is diagonal to
        // (4, 9) and the second is left to (3, 9).
        let image = star_image(21, 21, 100, 5000.0, 1.0, 3.5, 10.5);
        let kernel = generate_kernel(1.0).unwrap();
        assert_eq!(kernel.cutoff(), 4);
        let err = locate_focus_moments(&image, 5, 10, 100, &kernel,
                                       &FocusParams::default()).unwrap_err();
        assert_eq!(err, LocateError::EdgeDuringSearch{
            x: 3, y: 9, cutoff: 4, retries: 2});
    }

    #[test]
    fn test_locate_focus_moments_too_many_retries() {
        // Brightness increases steadily to the right; there is no maximum
        // within reach of the search.
        let mut image = uniform_image(60, 60, 0);
        for (x, _y, pixel) in image.enumerate_pixels_mut() {
            pixel.0[0] = 100 + 50 * x as u16;
        }
        let kernel = generate_kernel(1.0).unwrap();
        let err = locate_focus_moments(&image, 10, 30, 100, &kernel,
                                       &FocusParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManySearchIterations);
        match err {
            LocateError::TooManySearchIterations{x, retries, ..} => {
                assert_eq!(retries, 15);
                assert_eq!(x, 25);
            },
            _ => panic!("Unexpected error {:?}", err),
        }
    }

    #[test]
    fn test_locate_focus_moments_flat_peak() {
        let image = uniform_image(21, 21, 200);
        let kernel = generate_kernel(1.5).unwrap();
        let err = locate_focus_moments(&image, 10, 10, 100, &kernel,
                                       &FocusParams::default()).unwrap_err();
        assert_eq!(err, LocateError::FlatPeak{x: 10, y: 10,
                                              axis: GridAxis::Horizontal,
                                              curvature: 0.0});
    }

    #[test]
    fn test_locate_focus_moments_zero_flux() {
        let image = uniform_image(21, 21, 100);
        let kernel = generate_kernel(1.5).unwrap();
        let err = locate_focus_moments(&image, 10, 10, 100, &kernel,
                                       &FocusParams::default()).unwrap_err();
        assert_eq!(err, LocateError::Moments(MomentError::ZeroFlux{x: 10, y: 10}));
        assert_eq!(err.kind(), ErrorKind::ZeroFlux);
    }

    #[test]
    fn test_find_sigma() {
        let image = star_image(21, 21, 100, 5000.0, 1.5, 10.3, 9.7);
        let estimate = find_sigma(&image, 10, 10, 100, /*initial_sigma=*/None,
                                  &FocusParams::default()).unwrap();
        assert_abs_diff_eq!(estimate.sigma, 1.5, epsilon = 0.05);
        assert_abs_diff_eq!(estimate.focus.xf, 10.3, epsilon = 0.02);
        assert_abs_diff_eq!(estimate.focus.yf, 9.7, epsilon = 0.02);
        assert!(estimate.focus.focus_moment().abs() < 0.01);
        assert_eq!(estimate.convergence, Convergence::FocusMoment);
        assert_eq!(estimate.iterations, 2);

        // A negative initial sigma means the same as none.
        let same = find_sigma(&image, 10, 10, 100, Some(-1.0),
                              &FocusParams::default()).unwrap();
        assert_eq!(same, estimate);
    }

    #[test]
    fn test_find_sigma_from_above() {
        let image = star_image(41, 41, 100, 5000.0, 2.5, 20.2, 20.9);
        let estimate = find_sigma(&image, 20, 20, 100, Some(4.0),
                                  &FocusParams::default()).unwrap();
        assert_abs_diff_eq!(estimate.sigma, 2.5, epsilon = 0.05);
        assert_abs_diff_eq!(estimate.focus.xf, 20.2, epsilon = 0.02);
        assert_abs_diff_eq!(estimate.focus.yf, 20.9, epsilon = 0.02);
    }

    #[test]
    fn test_find_sigma_sigma_stable() {
        // With a looser tolerance, sigma settles before the focus moment does.
        let image = star_image(41, 41, 100, 20000.0, 0.8, 20.5, 20.5);
        let params = FocusParams{sigma_tolerance: 0.025, ..Default::default()};
        let estimate = find_sigma(&image, 20, 20, 100, None, &params).unwrap();
        assert_eq!(estimate.convergence, Convergence::SigmaStable);
        assert_eq!(estimate.iterations, 3);
        assert_abs_diff_eq!(estimate.sigma, 0.752, epsilon = 0.005);
        assert!(estimate.focus.focus_moment().abs() >= 0.025);
    }

    #[test]
    fn test_find_sigma_noisy_star() {
        let clean = star_image(41, 41, 1000, 8000.0, 2.0, 20.3, 19.6);
        let image = gaussian_noise(&clean, 0.0, 5.0, 42);
        let estimate = find_sigma(&image, 20, 19, 1000, None,
                                  &FocusParams::default()).unwrap();
        assert_abs_diff_eq!(estimate.sigma, 2.0, epsilon = 0.1);
        assert_abs_diff_eq!(estimate.focus.xf, 20.3, epsilon = 0.05);
        assert_abs_diff_eq!(estimate.focus.yf, 19.6, epsilon = 0.05);
    }

    #[test]
    fn test_find_sigma_near_edge() {
        // Same star, but in the corner. Kernel for the default sigma is
        // 5 pixels wide.
        let image = star_image(21, 21, 100, 5000.0, 1.5, 2.5, 2.5);
        let err = find_sigma(&image, 2, 2, 100, None,
                             &FocusParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooCloseToEdge);
        assert_eq!(err, SigmaError::Locate(
            LocateError::TooCloseToEdge{x: 2, y: 2, cutoff: 5}));
    }

    #[test]
    fn test_find_sigma_invalid_sigma() {
        let image = star_image(21, 21, 100, 5000.0, 1.5, 10.3, 9.7);
        for sigma in [0.0, 12.5] {
            let err = find_sigma(&image, 10, 10, 100, Some(sigma),
                                 &FocusParams::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSigma);
        }
    }

    #[test]
    fn test_find_sigma_moment_out_of_range() {
        // A single hot pixel is far narrower than any kernel; all of its
        // flux sits where the moment polynomials are -1.
        let mut image = uniform_image(41, 41, 100);
        image.put_pixel(20, 20, image::Luma([5000]));
        let err = find_sigma(&image, 20, 20, 100, Some(3.0),
                             &FocusParams::default()).unwrap_err();
        assert_eq!(err, SigmaError::MomentOutOfRange{sigma: 3.0,
                                                     moment: MomentName::X,
                                                     value: -1.0});
    }

    #[test]
    fn test_find_sigma_too_many_iterations() {
        let image = star_image(21, 21, 100, 5000.0, 1.5, 10.3, 9.7);
        let params = FocusParams{max_sigma_iterations: 1, ..Default::default()};
        let err = find_sigma(&image, 10, 10, 100, None, &params).unwrap_err();
        match err {
            SigmaError::TooManyIterations{sigma, focus_moment, iterations} => {
                assert_eq!(iterations, 1);
                // Sigma was updated once from 1.2.
                assert_abs_diff_eq!(sigma, 1.5, epsilon = 0.05);
                assert!(focus_moment > 0.4);
            },
            _ => panic!("Unexpected error {:?}", err),
        }
    }

    #[test]
    fn test_find_sigma_with_cache() {
        let image = star_image(21, 21, 100, 5000.0, 1.5, 10.3, 9.7);
        let mut cache = KernelCache::new();
        let first = find_sigma_with_cache(&mut cache, &image, 10, 10, 100, None,
                                          &FocusParams::default()).unwrap();
        // The cache holds the kernel of the final iteration.
        assert_eq!(cache.cached_sigma(), Some(first.sigma));
        let second = find_sigma_with_cache(&mut cache, &image, 10, 10, 100,
                                           Some(first.sigma),
                                           &FocusParams::default()).unwrap();
        assert_eq!(second.iterations, 1);
        assert_eq!(second.sigma, first.sigma);
        assert_eq!(second.focus, first.focus);
    }
}  // mod tests.
