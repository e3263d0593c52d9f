//! Bitmap silhouettes and the overlap test used for pixel-accurate collisions.

use crate::config::SpriteConfig;

const WORD_BITS: usize = u64::BITS as usize;

/// Number of distinct bird animation frames.
pub const N_BIRD_FRAMES: usize = 3;

/// Binary silhouette of a sprite.
///
/// Bits are stored row-major, each row padded to whole `u64` words.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: usize,
    height: usize,
    words_per_row: usize,
    bits: Vec<u64>,
}

impl Mask {
    /// Create an empty mask.
    pub fn new(width: usize, height: usize) -> Self {
        let words_per_row = width.div_ceil(WORD_BITS);
        Self {
            width,
            height,
            words_per_row,
            bits: vec![0; words_per_row * height],
        }
    }

    /// Create a mask whose set pixels are those for which `pred(x, y)` holds.
    pub fn from_fn<F: Fn(usize, usize) -> bool>(width: usize, height: usize, pred: F) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if pred(x, y) {
                    mask.set(x, y);
                }
            }
        }
        mask
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the pixel at `(x, y)`; out of range pixels are unset.
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let word = self.bits[y * self.words_per_row + x / WORD_BITS];
        (word >> (x % WORD_BITS)) & 1 == 1
    }

    fn set(&mut self, x: usize, y: usize) {
        self.bits[y * self.words_per_row + x / WORD_BITS] |= 1 << (x % WORD_BITS);
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Mirror the mask upside down.
    pub fn flip_vertical(&self) -> Self {
        let mut bits = Vec::with_capacity(self.bits.len());
        for row in self.bits.chunks_exact(self.words_per_row).rev() {
            bits.extend_from_slice(row);
        }
        Self { bits, ..*self }
    }

    /// Find the first pixel where `self` and `other` both have a set bit.
    ///
    /// `offset` is the position of `other`'s top-left corner in `self`'s
    /// coordinates. The returned point is in `self`'s coordinates.
    pub fn overlap(&self, other: &Mask, offset: (i64, i64)) -> Option<(usize, usize)> {
        let (dx, dy) = offset;
        let x_beg = dx.max(0);
        let y_beg = dy.max(0);
        let x_end = (self.width as i64).min(dx + other.width as i64);
        let y_end = (self.height as i64).min(dy + other.height as i64);
        if x_beg >= x_end || y_beg >= y_end {
            return None;
        }

        for y in y_beg..y_end {
            let other_y = (y - dy) as usize;
            for x in x_beg..x_end {
                let other_x = (x - dx) as usize;
                if self.get(x as usize, y as usize) && other.get(other_x, other_y) {
                    return Some((x as usize, y as usize));
                }
            }
        }
        None
    }
}

/// Cache of every distinct silhouette used by a simulation.
///
/// Masks are built once from [`SpriteConfig`] and shared by all agents and
/// obstacles, so collision tests never rebuild them.
#[derive(Debug, Clone)]
pub struct SpriteMasks {
    bird: [Mask; N_BIRD_FRAMES],
    pipe_top: Mask,
    pipe_bottom: Mask,
}

impl SpriteMasks {
    pub fn new(cfg: &SpriteConfig) -> Self {
        let bird = [0, 1, 2].map(|frame| bird_mask(cfg, frame));
        let pipe_bottom = pipe_mask(cfg);
        let pipe_top = pipe_bottom.flip_vertical();
        for (frame, mask) in bird.iter().enumerate() {
            log::debug!(
                "bird frame {frame}: {}x{} with {} set pixels",
                mask.width(),
                mask.height(),
                mask.count()
            );
        }
        log::debug!(
            "pipe: {}x{} with {} set pixels",
            pipe_bottom.width(),
            pipe_bottom.height(),
            pipe_bottom.count()
        );
        Self {
            bird,
            pipe_top,
            pipe_bottom,
        }
    }

    /// Bird silhouette for an animation frame.
    pub fn bird(&self, frame: usize) -> &Mask {
        &self.bird[frame % N_BIRD_FRAMES]
    }

    pub fn pipe_top(&self) -> &Mask {
        &self.pipe_top
    }

    pub fn pipe_bottom(&self) -> &Mask {
        &self.pipe_bottom
    }
}

// Elliptic body, a beak on the right and a wing whose height depends on the frame.
fn bird_mask(cfg: &SpriteConfig, frame: usize) -> Mask {
    let w = cfg.bird_width as f64;
    let h = cfg.bird_height as f64;
    let (cx, cy) = (0.45 * w, 0.5 * h);
    let (rx, ry) = (0.42 * w, 0.42 * h);

    let beak_x = (0.8 * w, w);
    let beak_y = (0.45 * h, 0.7 * h);

    let wing_x = (0.05 * w, 0.4 * w);
    let wing_y = match frame {
        0 => (0.15 * h, 0.45 * h),
        1 => (0.4 * h, 0.65 * h),
        _ => (0.55 * h, 0.9 * h),
    };

    let inside = |(lo, hi): (f64, f64), v: f64| lo <= v && v < hi;
    Mask::from_fn(cfg.bird_width, cfg.bird_height, |x, y| {
        let px = x as f64 + 0.5;
        let py = y as f64 + 0.5;
        let body = ((px - cx) / rx).powi(2) + ((py - cy) / ry).powi(2) <= 1.0;
        let beak = inside(beak_x, px) && inside(beak_y, py);
        let wing = inside(wing_x, px) && inside(wing_y, py);
        body || beak || wing
    })
}

// Pipe opening upward: a full-width lip on top of a narrower body.
fn pipe_mask(cfg: &SpriteConfig) -> Mask {
    let lip = cfg.pipe_lip_height;
    let overhang = cfg.pipe_lip_overhang;
    let body_end = cfg.pipe_width - overhang;
    Mask::from_fn(cfg.pipe_width, cfg.pipe_height, |x, y| {
        y < lip || (overhang..body_end).contains(&x)
    })
}
