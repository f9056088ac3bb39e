// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use crate::error::MomentError;
use crate::image_funcs::Gray16Image;
use crate::kernel::Kernel;

/// Row partial sums larger than this are shifted down before being multiplied
/// by a kernel weight.
pub const ROW_SUM_LIMIT: i64 = 0xfffff;

// Both branches of scaled_accumulate() end up divided by 2^ROW_SHIFT.
const ROW_SHIFT: u32 = 8;

// Final scaling of the accumulated sums.
const FINAL_SHIFT: u32 = 5;

/// Gaussian weighted moments of the image about one integer pixel position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MomentSample {
    /// Normalized moment of the 2x^2 - 1 polynomial (x in sigma units).
    pub xmom: f64,
    /// Same, in y.
    pub ymom: f64,
    /// Moment along the x = y diagonal.
    pub pmom: f64,
    /// Moment along the x = -y diagonal.
    pub mmom: f64,

    /// Kernel weighted, sky subtracted flux. Relative brightness only; the
    /// scale depends on the kernel.
    pub filval: f64,
}

// One row's (pair of rows') 1-D moments: plain, x-weighted and x^2-weighted.
#[derive(Debug, Default)]
struct RowSums {
    sum: i64,
    xsum: i64,
    x2sum: i64,
}

#[derive(Debug, Default)]
struct MomentSums {
    sum: i64,
    xysum: i64,
    x2sum: i64,
    y2sum: i64,
}

/// Returns `partial * weight / 2^8`. When `shift_first` the partial is scaled
/// down before the multiplication, otherwise after. Both give the same result
/// up to rounding, differing by less than `weight`.
pub fn scaled_accumulate(partial: i64, weight: i16, shift_first: bool) -> i64 {
    if shift_first {
        (partial >> ROW_SHIFT) * weight as i64
    } else {
        (partial * weight as i64) >> ROW_SHIFT
    }
}

impl MomentSums {
    // Folds in the row at offset i, applying that row's y-direction weights.
    // The shift decision is made once per row from its plain sum so that all
    // four accumulators stay on the same scale.
    fn add_row(&mut self, row: &RowSums, weight: i16, xweight: i16, x2weight: i16) {
        let big = row.sum > ROW_SUM_LIMIT;
        self.sum += scaled_accumulate(row.sum, weight, big);
        self.y2sum += scaled_accumulate(row.sum, x2weight, big);
        self.x2sum += scaled_accumulate(row.x2sum, weight, big);
        self.xysum += scaled_accumulate(row.xsum, xweight, big);
    }
}

/// Computes the moments of `image` multiplied by the Gaussian `kernel`
/// centered on pixel (x, y), after subtracting `sky` from every pixel. The
/// moments are of the polynomials 2x^2 - 1, 2y^2 - 1 and their diagonal
/// counterparts, normalized by the weighted flux.
///
/// Moments at a fractional position are obtained later by interpolation; see
/// [crate::algorithm::locate_focus_moments()].
///
/// # Errors
/// [MomentError::WindowOutOfBounds] if the kernel window does not fit in the
/// image; [MomentError::ZeroFlux] if the weighted flux is zero.
pub fn evaluate_moments(image: &Gray16Image, x: i32, y: i32, sky: i32,
                        kernel: &Kernel) -> Result<MomentSample, MomentError> {
    let (width, height) = image.dimensions();
    let ncut = kernel.cutoff();
    let reach = ncut as i32 - 1;
    if x - reach < 0 || x + reach >= width as i32 ||
        y - reach < 0 || y + reach >= height as i32
    {
        return Err(MomentError::WindowOutOfBounds{x, y, cutoff: ncut,
                                                  width, height});
    }
    let weight = kernel.weight();
    let xweight = kernel.xweight();
    let x2weight = kernel.x2weight();

    let pixels: &[u16] = image.as_raw();
    let row_len = width as usize;
    let row = |rownum: i32| {
        let start = rownum as usize * row_len;
        &pixels[start .. start + row_len]
    };
    let xc = x as usize;
    let sky = sky as i64;
    let sky2 = 2 * sky;
    let sky4 = 4 * sky;

    let mut sums = MomentSums::default();
    for i in 0..ncut {
        let mut rs = RowSums::default();
        let below = row(y + i as i32);
        if i == 0 {
            // Central row is not doubled.
            rs.sum = (below[xc] as i64 - sky) * weight[0] as i64;
            for n in 1..ncut {
                let r = below[xc + n] as i64;
                let l = below[xc - n] as i64;
                let pair = r + l - sky2;
                rs.sum += pair * weight[n] as i64;
                rs.xsum += (r - l) * xweight[n] as i64;
                rs.x2sum += pair * x2weight[n] as i64;
            }
        } else {
            let above = row(y - i as i32);
            rs.sum = (below[xc] as i64 + above[xc] as i64 - sky2) * weight[0] as i64;
            for n in 1..ncut {
                let br = below[xc + n] as i64;
                let bl = below[xc - n] as i64;
                let ar = above[xc + n] as i64;
                let al = above[xc - n] as i64;
                let quad = br + bl + ar + al - sky4;
                rs.sum += quad * weight[n] as i64;
                // Sky cancels in the antisymmetric combination.
                rs.xsum += (br - bl - ar + al) * xweight[n] as i64;
                rs.x2sum += quad * x2weight[n] as i64;
            }
        }
        sums.add_row(&rs, weight[i], xweight[i], x2weight[i]);
    }
    let sum = sums.sum >> FINAL_SHIFT;
    let x2sum = sums.x2sum >> FINAL_SHIFT;
    let y2sum = sums.y2sum >> FINAL_SHIFT;
    let xysum = sums.xysum >> FINAL_SHIFT;

    if sum == 0 {
        return Err(MomentError::ZeroFlux{x, y});
    }
    let fsum = sum as f64;
    Ok(MomentSample{
        xmom: (2 * x2sum - sum) as f64 / fsum,
        ymom: (2 * y2sum - sum) as f64 / fsum,
        pmom: (x2sum - 2 * xysum + y2sum - sum) as f64 / fsum,
        mmom: (x2sum + 2 * xysum + y2sum - sum) as f64 / fsum,
        filval: fsum,
    })
}

// mod tests.
