//! Linear fixed-point iteration `X ← X·A + G` shared by Landweber, Van Cittert and
//! Tikhonov-Miller, optionally followed by a projection in the spatial domain.

use crate::algorithms::Solver;
use crate::error::Result;
use crate::signal::{ComplexBuffer, RealBuffer};
use crate::spectral::{algebra, Workspace};

/// Slack above one tolerated in the operator gain, for rounding at
/// coefficients where `A` is exactly one.
const GAIN_TOLERANCE: f32 = 1e-4;

/// Largest magnitude `max |A|` of the iteration operator. The error at a
/// frequency is multiplied by `|A|` every step, so the iteration diverges
/// when the gain exceeds one.
pub(crate) fn operator_gain(a: &ComplexBuffer) -> f32 {
    algebra::max_power(a).sqrt()
}

/// Logs a warning when `a` makes the iteration diverge and returns its gain.
pub(crate) fn warn_if_divergent(algorithm: &str, a: &ComplexBuffer) -> f32 {
    let gain = operator_gain(a);
    if gain > 1.0 + GAIN_TOLERANCE {
        log::warn!(
            "{algorithm}: iteration operator amplifies some frequencies by {gain:.3} per step, \
             the estimate will diverge; lower gamma or lambda"
        );
    }
    gain
}

/// Projection applied after every iteration by the constrained variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    None,
    NonNegative,
    Bounded { min: f32, max: f32 },
}

impl Projection {
    fn apply(&self, x: &mut RealBuffer) {
        match *self {
            Projection::None => {}
            Projection::NonNegative => x.clamp_min(0.0),
            Projection::Bounded { min, max } => x.clamp(min, max),
        }
    }
}

/// `A` and `G` are computed once in `prepare`; a step costs one multiply-add
/// per coefficient, plus a transform pair when a projection is active.
#[derive(Debug)]
pub struct FixedPoint {
    a: ComplexBuffer,
    g: ComplexBuffer,
    x: ComplexBuffer,
    projection: Projection,
}

impl FixedPoint {
    pub fn new(a: ComplexBuffer, g: ComplexBuffer, x: ComplexBuffer, projection: Projection) -> Self {
        FixedPoint {
            a,
            g,
            x,
            projection,
        }
    }
}

impl Solver for FixedPoint {
    fn step(&mut self, ws: &mut Workspace) -> Result<()> {
        algebra::fixed_point_assign(&mut self.x, &self.a, &self.g)?;
        if self.projection != Projection::None {
            let mut spatial = ws.inverse(&self.x, "x")?;
            self.projection.apply(&mut spatial);
            ws.forward_into(&spatial, &mut self.x)?;
            ws.release_real(spatial);
        }
        Ok(())
    }

    fn estimate(&mut self, ws: &mut Workspace) -> Result<RealBuffer> {
        ws.inverse(&self.x, "x")
    }

    fn restore(&mut self, ws: &mut Workspace, x: &RealBuffer) -> Result<()> {
        ws.forward_into(x, &mut self.x)
    }

    fn finish(self: Box<Self>, ws: &mut Workspace) -> Result<RealBuffer> {
        let FixedPoint { a, g, x, .. } = *self;
        ws.release_complex(a);
        ws.release_complex(g);
        ws.inverse_consume(x, "x")
    }
}
