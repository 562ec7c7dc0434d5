//! Class colours for multi-class overlays.
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `(r, g, b, alpha)`.
pub type Rgba = (u8, u8, u8, u8);

/// Classes 0–5: transparent, blue, green, red, yellow, pink.
pub const CLASS_COLORS: [Rgba; 6] = [
    (255, 255, 255, 0),
    (50, 95, 168, 50),
    (50, 168, 82, 50),
    (168, 52, 50, 50),
    (164, 168, 50, 50),
    (168, 50, 150, 50),
];

/// Overlay colour for binary predictions.
pub const BINARY_COLOR: Rgba = (38, 233, 254, 50);

const SEED: u64 = 0x5EED_C01_0125;

/// Colour lookup with a per-session cache for classes past the fixed
/// palette.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    extra: HashMap<usize, Rgba>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Colour for `class`.
    ///
    /// Classes past the fixed palette get a pseudo-random RGB seeded by the
    /// class index, distinct from the fixed palette, with alpha 50. The
    /// colour depends on the index alone, never on lookup order.
    pub fn get_color(&mut self, class: usize) -> Rgba {
        if let Some(&c) = CLASS_COLORS.get(class) {
            return c;
        }
        if let Some(&c) = self.extra.get(&class) {
            return c;
        }
        let mut rng = StdRng::seed_from_u64(SEED ^ class as u64);
        let color = loop {
            let (r, g, b) = (rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>());
            let taken = CLASS_COLORS.iter().any(|&(pr, pg, pb, _)| (pr, pg, pb) == (r, g, b));
            if !taken {
                break (r, g, b, 50);
            }
        };
        self.extra.insert(class, color);
        color
    }
}
