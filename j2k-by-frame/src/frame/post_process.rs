use super::{Image, PixelFormat};
use crate::error::{Error, Result};

/// A single named filter from a post-process string such as `lb/al`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessFilter {
    /// Linear blend deinterlacer: every line becomes (above + 2*self + below) / 4.
    LinearBlend,
    /// Linear interpolating deinterlacer: odd lines are replaced by the
    /// average of their neighbours.
    LinearInterpolate,
    /// Median deinterlacer: odd lines become the median of themselves and
    /// their neighbours.
    Median,
    /// Stretch luma (or all channels, for RGB) to the full 0-255 range.
    AutoLevels,
}

impl PostProcessFilter {
    fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "lb" | "linblenddeint" => PostProcessFilter::LinearBlend,
            "li" | "linipoldeint" => PostProcessFilter::LinearInterpolate,
            "md" | "mediandeint" => PostProcessFilter::Median,
            "al" | "autolevels" => PostProcessFilter::AutoLevels,
            _ => return Err(Error::UnknownPostProcess(name.to_string())),
        })
    }
}

/// Parse a filter chain. Filters are separated by `/` or `,`; anything
/// after a `:` is an option and is ignored.
pub fn parse_post_process(chain: &str) -> Result<Vec<PostProcessFilter>> {
    chain
        .split(&['/', ','][..])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| PostProcessFilter::from_name(part.split(':').next().unwrap_or(part)))
        .collect()
}

impl Image {
    /// Apply a post-process filter chain, returning a new image in the same
    /// pixel format.
    pub fn post_process(&self, chain: &str) -> Result<Image> {
        let filters = parse_post_process(chain)?;
        let mut out = self.clone();
        for filter in filters {
            match filter {
                PostProcessFilter::LinearBlend => out.vertical_filter(false, |a, b, c| {
                    ((u16::from(a) + 2 * u16::from(b) + u16::from(c) + 2) / 4) as u8
                }),
                PostProcessFilter::LinearInterpolate => out.vertical_filter(true, |a, _, c| {
                    ((u16::from(a) + u16::from(c) + 1) / 2) as u8
                }),
                PostProcessFilter::Median => out.vertical_filter(true, median3),
                PostProcessFilter::AutoLevels => out.auto_levels(),
            }
        }
        Ok(out)
    }

    /// Run `f(above, current, below)` down every byte column of every plane.
    /// Edge lines reuse themselves as the missing neighbour.
    fn vertical_filter<F: Fn(u8, u8, u8) -> u8>(&mut self, odd_lines_only: bool, f: F) {
        for plane in 0..self.components() {
            let lines = self.lines(plane);
            let source: Vec<Vec<u8>> = (0..lines).map(|y| self.line(plane, y).to_vec()).collect();
            for y in 0..lines {
                if odd_lines_only && y % 2 == 0 {
                    continue;
                }
                let above = &source[y.saturating_sub(1)];
                let below = &source[(y + 1).min(lines - 1)];
                let current = &source[y];
                for (x, dst) in self.line_mut(plane, y).iter_mut().enumerate() {
                    *dst = f(above[x], current[x], below[x]);
                }
            }
        }
    }

    /// Plane 0 is luma for YUV and the whole picture for packed RGB.
    fn auto_levels(&mut self) {
        let lines = self.lines(0);
        let (mut lo, mut hi) = (u8::MAX, u8::MIN);
        for y in 0..lines {
            for &v in self.line(0, y) {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if hi <= lo {
            return;
        }
        let (out_lo, out_hi) = match self.pixel_format() {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => (0u32, 255u32),
            _ => (16, 235),
        };
        let range = u32::from(hi - lo);
        for y in 0..lines {
            for v in self.line_mut(0, y).iter_mut() {
                let scaled = (u32::from(*v - lo) * (out_hi - out_lo) + range / 2) / range;
                *v = (out_lo + scaled) as u8;
            }
        }
    }
}

fn median3(a: u8, b: u8, c: u8) -> u8 {
    a.max(b).min(a.min(b).max(c))
}
