//! Frame buffer averaging splats over iterations.

use parking_lot::Mutex;

use super::scene::SplatSink;
use crate::util::Rgb;

/// Image accumulator with one lock per row.
///
/// Splats of the running iteration are summed into `current`; `end_iteration`
/// folds them into the running average.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    current: Vec<Mutex<Vec<Rgb>>>,
    average: Vec<Rgb>,
    num_iterations: u32,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            current: (0..height).map(|_| Mutex::new(vec![Rgb::ZERO; width as usize])).collect(),
            average: vec![Rgb::ZERO; width as usize * height as usize],
            num_iterations: 0,
        }
    }

    /// Averaged value of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.average.get((y * self.width + x) as usize).copied()
    }

    /// Averaged image, row-major.
    pub fn pixels(&self) -> &[Rgb] {
        &self.average
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn num_iterations(&self) -> u32 {
        self.num_iterations
    }
}

impl SplatSink for FrameBuffer {
    fn splat(&self, x: u32, y: u32, color: Rgb) {
        if x >= self.width {
            return;
        }
        if let Some(row) = self.current.get(y as usize) {
            row.lock()[x as usize] += color;
        }
    }

    /// Reset the per-iteration accumulator.
    fn start_iteration(&mut self) {
        for row in &mut self.current {
            row.get_mut().fill(Rgb::ZERO);
        }
    }

    /// Merge the finished iteration into the average.
    fn end_iteration(&mut self) {
        self.num_iterations += 1;
        let n = self.num_iterations as f32;
        let width = self.width as usize;
        for (y, row) in self.current.iter_mut().enumerate() {
            let avg = &mut self.average[y * width..(y + 1) * width];
            for (a, c) in avg.iter_mut().zip(row.get_mut().iter()) {
                *a += (*c - *a) / n;
            }
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("num_iterations", &self.num_iterations)
            .finish()
    }
}
