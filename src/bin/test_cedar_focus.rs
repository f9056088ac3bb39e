// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Instant;

use clap::Parser;
use env_logger;
use image::{DynamicImage, ImageReader, Rgb};
use imageproc::drawing;
use imageproc::rect::Rect;
use log::{error, info};

use cedar_focus::algorithm::{find_sigma, Convergence, FocusParams};
use cedar_focus::image_funcs::{add_gaussian_star, brightest_pixel,
                               uniform_image, Gray16Image};
use cedar_focus::kernel::generate_kernel;

/// Example program for running the CedarFocus sigma finder on a star in a
/// test image.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Path of the image to process. If omitted, a synthetic star is used.
    #[arg(short, long)]
    input: Option<String>,

    /// Sky background level, in 16-bit pixel units.
    #[arg(long, default_value_t = 0)]
    sky: i32,

    /// Pixel near the star. If omitted, the brightest pixel away from the
    /// image edges is used.
    #[arg(short)]
    x: Option<i32>,
    #[arg(short)]
    y: Option<i32>,

    /// Initial sigma. If omitted, a default is used.
    #[arg(short, long)]
    sigma: Option<f64>,

    /// Path where a copy of the image, marked with the star's position and
    /// width, is written.
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, default_value_t = 15)]
    max_search_retries: u32,

    #[arg(long, default_value_t = 10)]
    max_sigma_iterations: u32,

    #[arg(long, default_value_t = 0.01)]
    sigma_tolerance: f64,

    /// Report positions with (0, 0) at the center of the upper left pixel,
    /// rather than at its corner.
    #[arg(long, default_value_t = false)]
    rational_coords: std::primitive::bool,
}

fn synthetic_image() -> Gray16Image {
    let mut image = uniform_image(64, 64, 1000);
    add_gaussian_star(&mut image, 8000.0, 2.0, 31.7, 32.2);
    image
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let (image, sky, rgb_source) = match &args.input {
        Some(input) => {
            info!("Processing {}", input);
            let img = ImageReader::open(input).unwrap_or_else(|e| {
                panic!("Could not open '{}': {:?}", input, e);
            }).decode().unwrap_or_else(|e| {
                panic!("Could not decode '{}': {:?}", input, e);
            });
            (img.to_luma16(), args.sky, img)
        },
        None => {
            info!("No input given; using synthetic star of sigma 2 at (31.7, 32.2)");
            let img = synthetic_image();
            (img.clone(), 1000, DynamicImage::ImageLuma16(img))
        },
    };
    let (width, height) = image.dimensions();

    let params = FocusParams{
        max_search_retries: args.max_search_retries,
        max_sigma_iterations: args.max_sigma_iterations,
        sigma_tolerance: args.sigma_tolerance,
        ..if args.rational_coords {
            FocusParams::pixel_centered()
        } else {
            FocusParams::default()
        }
    };

    let (x, y) = match (args.x, args.y) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            // Stay clear of the edges by the initial kernel's half-width.
            let border = match generate_kernel(args.sigma.unwrap_or(params.default_sigma)) {
                Ok(kernel) => kernel.cutoff() as u32,
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                },
            };
            assert!(width > 2 * border && height > 2 * border,
                    "Image {}x{} too small to search for a star; give -x and -y",
                    width, height);
            let roi = Rect::at(border as i32, border as i32)
                .of_size(width - 2 * border, height - 2 * border);
            let (x, y, value) = brightest_pixel(&image, &roi);
            info!("Brightest pixel {} at ({}, {})", value, x, y);
            (x, y)
        },
    };

    let find_start = Instant::now();
    let estimate = match find_sigma(&image, x, y, sky, args.sigma, &params) {
        Ok(estimate) => estimate,
        Err(e) => {
            error!("No sigma for star near ({}, {}): {} ({:?})", x, y, e, e.kind());
            std::process::exit(1);
        },
    };
    let elapsed = find_start.elapsed();
    let focus = &estimate.focus;
    info!("WxH: {}x{}; sky {}", width, height, sky);
    info!("Sigma {:.4} after {} iterations in {:?}{}",
          estimate.sigma, estimate.iterations, elapsed,
          if estimate.convergence == Convergence::SigmaStable {
              " (sigma stable)"
          } else {
              ""
          });
    info!("Position ({:.3}, {:.3}); peak {:.1} above sky; search moved {} times",
          focus.xf, focus.yf, focus.peak_value, focus.retries);
    info!("Moments x {:.4} y {:.4} plus {:.4} minus {:.4}",
          focus.xmom, focus.ymom, focus.pmom, focus.mmom);

    if let Some(output) = &args.output {
        // Scribble a circle of radius 2 sigma around the star.
        let mut img_color = rgb_source.into_rgb8();
        let offset_x = params.offset_x;
        let offset_y = params.offset_y;
        drawing::draw_hollow_circle_mut(
            &mut img_color,
            ((focus.xf - offset_x + 0.5) as i32, (focus.yf - offset_y + 0.5) as i32),
            (2.0 * estimate.sigma).ceil() as i32,
            Rgb::<u8>([255, 0, 0]));
        img_color.save(output).unwrap_or_else(|e| {
            panic!("Could not write '{}': {:?}", output, e);
        });
        info!("Wrote {}", output);
    }
}
