// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use log::debug;

use crate::error::KernelError;

/// Capacity of each kernel array. Bounds the kernel half-width.
pub const MAX_KERNEL_SIZE: usize = 50;

/// Largest sigma for which a kernel can be generated. At this sigma the cutoff
/// is floor(4 * 12 + 1.5) = 49, which fits within [MAX_KERNEL_SIZE].
pub const MAX_SIGMA: f64 = 12.0;

/// The kernel's central weight. Downstream fixed point scaling (see
/// moments.rs) assumes this value.
pub const KERNEL_SCALE: f64 = 512.0;

/// A discretized, one-sided Gaussian kernel along with its first and second
/// moment companions. The 2-D weighting is separable: the weight of pixel
/// offset (i, j) is weight[|i|] * weight[|j|].
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    sigma: f64,
    cutoff: usize,

    // Entries at and beyond `cutoff` are zero.
    weight: [i16; MAX_KERNEL_SIZE],
    xweight: [i16; MAX_KERNEL_SIZE],
    x2weight: [i16; MAX_KERNEL_SIZE],
}

impl Kernel {
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Half-width of the kernel. A window centered at pixel x spans
    /// x - (cutoff - 1) through x + (cutoff - 1).
    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    /// Gaussian smoothing weights, 512 at the center.
    pub fn weight(&self) -> &[i16] {
        &self.weight[..self.cutoff]
    }

    /// Gaussian weights times i/sigma.
    pub fn xweight(&self) -> &[i16] {
        &self.xweight[..self.cutoff]
    }

    /// Gaussian weights times (i/sigma)^2.
    pub fn x2weight(&self) -> &[i16] {
        &self.x2weight[..self.cutoff]
    }

    // Full-capacity views, including the zero tail.
    #[cfg(test)]
    fn raw_weights(&self) -> (&[i16; MAX_KERNEL_SIZE],
                                         &[i16; MAX_KERNEL_SIZE],
                                         &[i16; MAX_KERNEL_SIZE]) {
        (&self.weight, &self.xweight, &self.x2weight)
    }
}

fn round_to_i16(value: f64) -> i16 {
    (value + 0.5).floor() as i16
}

/// Computes the smoothing and moment kernels for the given Gaussian width.
///
/// The smoothing kernel is normalized to 512 at its center and has a constant
/// offset subtracted so that it falls to zero at the cutoff radius of
/// about 4 * `sigma`. The cutoff is then trimmed to the first index whose
/// second moment weight rounds to zero.
///
/// # Errors
/// [KernelError::InvalidSigma] unless 0 < `sigma` <= [MAX_SIGMA].
pub fn generate_kernel(sigma: f64) -> Result<Kernel, KernelError> {
    if !(sigma > 0.0 && sigma <= MAX_SIGMA) {
        return Err(KernelError::InvalidSigma{sigma, max_sigma: MAX_SIGMA});
    }
    let ncut = (4.0 * sigma + 1.5) as usize;  // round(4*sigma) + 1
    if ncut > MAX_KERNEL_SIZE {
        return Err(KernelError::KernelTooWide{sigma, cutoff: ncut,
                                              capacity: MAX_KERNEL_SIZE});
    }
    let sig2inv = 0.5 / (sigma * sigma);
    let edge = KERNEL_SCALE * (-((ncut * ncut) as f64) * sig2inv).exp();

    let mut kernel = Kernel{sigma, cutoff: ncut,
                            weight: [0; MAX_KERNEL_SIZE],
                            xweight: [0; MAX_KERNEL_SIZE],
                            x2weight: [0; MAX_KERNEL_SIZE]};
    for i in 0..ncut {
        let isig2 = (i * i) as f64 * sig2inv;
        let gau = round_to_i16(KERNEL_SCALE * (-isig2).exp() - edge);
        let x2 = round_to_i16(2.0 * gau as f64 * isig2);
        if i > 0 && x2 == 0 {
            // Rest of the kernel rounds to zero.
            kernel.cutoff = i;
            break;
        }
        kernel.weight[i] = gau;
        kernel.xweight[i] = round_to_i16(i as f64 * gau as f64 / sigma);
        kernel.x2weight[i] = x2;
    }
    debug!("Kernel for sigma {}: cutoff {} weights {:?}",
           sigma, kernel.cutoff, kernel.weight());
    Ok(kernel)
}

/// Remembers the most recently generated kernel, so that asking again for the
/// same sigma skips regeneration. Holds at most one kernel. Each pipeline that
/// wants this should own its own cache.
#[derive(Debug, Default)]
pub struct KernelCache {
    kernel: Option<Kernel>,
}

impl KernelCache {
    pub fn new() -> Self {
        KernelCache{kernel: None}
    }

    /// Returns the kernel for `sigma`, generating it unless the cached kernel
    /// was made for exactly this sigma.
    pub fn get(&mut self, sigma: f64) -> Result<&Kernel, KernelError> {
        let kernel = match self.kernel.take() {
            Some(kernel) if kernel.sigma == sigma => kernel,
            previous => match generate_kernel(sigma) {
                Ok(kernel) => kernel,
                Err(e) => {
                    // Keep the previous kernel.
                    self.kernel = previous;
                    return Err(e);
                },
            },
        };
        Ok(&*self.kernel.insert(kernel))
    }

    /// The sigma of the cached kernel, if any.
    pub fn cached_sigma(&self) -> Option<f64> {
        self.kernel.as_ref().map(|k| k.sigma)
    }
}

// mod tests.
