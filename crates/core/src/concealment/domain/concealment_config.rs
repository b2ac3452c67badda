use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_STRENGTH: u32 = 50;
pub const DEFAULT_FEATHER_RADIUS: u32 = 8;
pub const DEFAULT_OPACITY: f32 = 0.95;
pub const DEFAULT_BLOCK_SIZE: u32 = 15;

/// Smallest blur kernel ever produced, whatever the requested strength.
const MIN_KERNEL_SIZE: usize = 3;

/// Which concealment a face receives. The first three blur inside a
/// geometric mask; mosaic and pixelate use the circular mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConcealmentShape {
    #[default]
    Circle,
    Ellipse,
    Rectangle,
    Mosaic,
    Pixelate,
}

impl ConcealmentShape {
    pub const ALL: [ConcealmentShape; 5] = [
        ConcealmentShape::Circle,
        ConcealmentShape::Ellipse,
        ConcealmentShape::Rectangle,
        ConcealmentShape::Mosaic,
        ConcealmentShape::Pixelate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConcealmentShape::Circle => "circle",
            ConcealmentShape::Ellipse => "ellipse",
            ConcealmentShape::Rectangle => "rectangle",
            ConcealmentShape::Mosaic => "mosaic",
            ConcealmentShape::Pixelate => "pixelate",
        }
    }
}

impl fmt::Display for ConcealmentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConcealmentShape {
    type Err = ConcealmentConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|shape| shape.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConcealmentConfigError::UnknownShape(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConcealmentConfigError {
    #[error("opacity must be between 0.0 and 1.0, got {0}")]
    Opacity(f32),
    #[error("block size must be at least 1, got {0}")]
    BlockSize(u32),
    #[error("unknown concealment shape '{0}' (expected circle, ellipse, rectangle, mosaic or pixelate)")]
    UnknownShape(String),
}

/// Per-job concealment parameters, validated and derived once.
///
/// Shared read-only by every worker; there is no setter.
#[derive(Clone, Debug, PartialEq)]
pub struct ConcealmentConfig {
    shape: ConcealmentShape,
    kernel_size: usize,
    feather_radius: usize,
    opacity: f32,
    block_size: usize,
}

impl ConcealmentConfig {
    /// Kernel size is `strength / 2 * 2 + 1`, floored at 3, so it is always odd.
    pub fn new(
        shape: ConcealmentShape,
        strength: u32,
        feather_radius: u32,
        opacity: f32,
        block_size: u32,
    ) -> Result<Self, ConcealmentConfigError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(ConcealmentConfigError::Opacity(opacity));
        }
        if block_size == 0 {
            return Err(ConcealmentConfigError::BlockSize(block_size));
        }
        let kernel_size = ((strength as usize) / 2 * 2 + 1).max(MIN_KERNEL_SIZE);
        Ok(Self {
            shape,
            kernel_size,
            feather_radius: feather_radius as usize,
            opacity,
            block_size: block_size as usize,
        })
    }

    pub fn shape(&self) -> ConcealmentShape {
        self.shape
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Gaussian spread for the blur effect: `kernel_size / 2`.
    pub fn blur_sigma(&self) -> f64 {
        (self.kernel_size / 2) as f64
    }

    pub fn feather_radius(&self) -> usize {
        self.feather_radius
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Default for ConcealmentConfig {
    fn default() -> Self {
        Self {
            shape: ConcealmentShape::Circle,
            kernel_size: (DEFAULT_STRENGTH as usize) / 2 * 2 + 1,
            feather_radius: DEFAULT_FEATHER_RADIUS as usize,
            opacity: DEFAULT_OPACITY,
            block_size: DEFAULT_BLOCK_SIZE as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn config(strength: u32) -> ConcealmentConfig {
        ConcealmentConfig::new(ConcealmentShape::Circle, strength, 0, 1.0, 1).unwrap()
    }

    #[rstest]
    #[case::zero(0, 3)]
    #[case::one(1, 3)]
    #[case::two(2, 3)]
    #[case::four(4, 5)]
    #[case::odd(7, 7)]
    #[case::even(50, 51)]
    #[case::large(201, 201)]
    fn test_kernel_size_is_odd_and_at_least_three(#[case] strength: u32, #[case] expected: usize) {
        let k = config(strength).kernel_size();
        assert_eq!(k, expected);
        assert_eq!(k % 2, 1);
    }

    #[test]
    fn test_blur_sigma_is_half_kernel() {
        assert_relative_eq!(config(50).blur_sigma(), 25.0);
        assert_relative_eq!(config(4).blur_sigma(), 2.0);
    }

    #[rstest]
    #[case::negative(-0.1)]
    #[case::above_one(1.01)]
    #[case::nan(f32::NAN)]
    fn test_invalid_opacity_is_rejected(#[case] opacity: f32) {
        let result = ConcealmentConfig::new(ConcealmentShape::Ellipse, 10, 0, opacity, 1);
        assert!(matches!(result, Err(ConcealmentConfigError::Opacity(_))));
    }

    #[test]
    fn test_opacity_bounds_are_inclusive() {
        assert!(ConcealmentConfig::new(ConcealmentShape::Circle, 10, 0, 0.0, 1).is_ok());
        assert!(ConcealmentConfig::new(ConcealmentShape::Circle, 10, 0, 1.0, 1).is_ok());
    }

    #[test]
    fn test_zero_block_size_is_rejected() {
        let result = ConcealmentConfig::new(ConcealmentShape::Mosaic, 10, 0, 1.0, 0);
        assert_eq!(result, Err(ConcealmentConfigError::BlockSize(0)));
    }

    #[test]
    fn test_default_matches_documented_defaults() {
        let c = ConcealmentConfig::default();
        assert_eq!(c.shape(), ConcealmentShape::Circle);
        assert_eq!(c.kernel_size(), 51);
        assert_eq!(c.feather_radius(), 8);
        assert_relative_eq!(c.opacity(), 0.95);
        assert_eq!(c.block_size(), 15);
    }

    #[test]
    fn test_shape_parses_case_insensitively() {
        assert_eq!("Mosaic".parse::<ConcealmentShape>(), Ok(ConcealmentShape::Mosaic));
        assert_eq!(" pixelate ".parse::<ConcealmentShape>(), Ok(ConcealmentShape::Pixelate));
        assert!("hexagon".parse::<ConcealmentShape>().is_err());
    }

    #[test]
    fn test_shape_display_roundtrips_through_parse() {
        for shape in ConcealmentShape::ALL {
            assert_eq!(shape.to_string().parse::<ConcealmentShape>(), Ok(shape));
        }
    }
}
