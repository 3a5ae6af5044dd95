//! Shortest Dubins paths between oriented waypoints.
//!
//! Classical six-family enumeration (LSL, LSR, RSL, RSR, RLR, LRL). Lengths
//! and sampling are exact for a vehicle with minimum turn radius `rho` and
//! constant forward motion.

use crate::Waypoint;

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

fn mod2pi(theta: f64) -> f64 {
    theta.rem_euclid(TWO_PI)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    Lsl,
    Lsr,
    Rsl,
    Rsr,
    Rlr,
    Lrl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SegKind {
    Left,
    Straight,
    Right,
}

impl PathKind {
    fn segments(&self) -> [SegKind; 3] {
        use SegKind::*;
        match self {
            PathKind::Lsl => [Left, Straight, Left],
            PathKind::Lsr => [Left, Straight, Right],
            PathKind::Rsl => [Right, Straight, Left],
            PathKind::Rsr => [Right, Straight, Right],
            PathKind::Rlr => [Right, Left, Right],
            PathKind::Lrl => [Left, Right, Left],
        }
    }
}

const ALL_KINDS: [PathKind; 6] =
    [PathKind::Lsl, PathKind::Lsr, PathKind::Rsl, PathKind::Rsr, PathKind::Rlr, PathKind::Lrl];

/// A shortest path of one family, with normalized segment parameters
/// `(t, p, q)` (arc lengths divided by `rho`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DubinsPath {
    qi: [f64; 3],
    rho: f64,
    pub params: [f64; 3],
    pub kind: PathKind,
}

fn word_params(kind: PathKind, alpha: f64, beta: f64, d: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let c_ab = (alpha - beta).cos();
    match kind {
        PathKind::Lsl => {
            let p_sq = 2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sa - sb);
            if p_sq < 0.0 {
                return None;
            }
            let tmp = (cb - ca).atan2(d + sa - sb);
            Some([mod2pi(-alpha + tmp), p_sq.sqrt(), mod2pi(beta - tmp)])
        }
        PathKind::Rsr => {
            let p_sq = 2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sb - sa);
            if p_sq < 0.0 {
                return None;
            }
            let tmp = (ca - cb).atan2(d - sa + sb);
            Some([mod2pi(alpha - tmp), p_sq.sqrt(), mod2pi(-beta + tmp)])
        }
        PathKind::Lsr => {
            let p_sq = -2.0 + d * d + 2.0 * c_ab + 2.0 * d * (sa + sb);
            if p_sq < 0.0 {
                return None;
            }
            let p = p_sq.sqrt();
            let tmp = (-ca - cb).atan2(d + sa + sb) - (-2.0f64).atan2(p);
            Some([mod2pi(-alpha + tmp), p, mod2pi(-mod2pi(beta) + tmp)])
        }
        PathKind::Rsl => {
            let p_sq = d * d - 2.0 + 2.0 * c_ab - 2.0 * d * (sa + sb);
            if p_sq < 0.0 {
                return None;
            }
            let p = p_sq.sqrt();
            let tmp = (ca + cb).atan2(d - sa - sb) - 2.0f64.atan2(p);
            Some([mod2pi(alpha - tmp), p, mod2pi(beta - tmp)])
        }
        PathKind::Rlr => {
            let c = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sa - sb)) / 8.0;
            if c.abs() > 1.0 {
                return None;
            }
            let p = mod2pi(TWO_PI - c.acos());
            let t = mod2pi(alpha - (ca - cb).atan2(d - sa + sb) + mod2pi(p / 2.0));
            Some([t, p, mod2pi(alpha - beta - t + mod2pi(p))])
        }
        PathKind::Lrl => {
            let c = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sb - sa)) / 8.0;
            if c.abs() > 1.0 {
                return None;
            }
            let p = mod2pi(TWO_PI - c.acos());
            let t = mod2pi(-alpha - (ca - cb).atan2(d + sa - sb) + p / 2.0);
            Some([t, p, mod2pi(mod2pi(beta) - alpha - t + mod2pi(p))])
        }
    }
}

impl DubinsPath {
    /// Shortest path from `q0` to `q1` for minimum turn radius `rho`.
    /// Length ties between families are broken by the lexicographically
    /// smaller `(t, p, q)` parameter triple.
    pub fn shortest(q0: &Waypoint, q1: &Waypoint, rho: f64) -> DubinsPath {
        assert!(rho > 0.0);
        let dx = q1.x - q0.x;
        let dy = q1.y - q0.y;
        let big_d = (dx * dx + dy * dy).sqrt();
        let d = big_d / rho;
        let theta = if big_d > 0.0 { mod2pi(dy.atan2(dx)) } else { 0.0 };
        let alpha = mod2pi(q0.dir - theta);
        let beta = mod2pi(q1.dir - theta);

        let qi = [q0.x, q0.y, q0.dir];
        let mut best: Option<DubinsPath> = None;
        for kind in ALL_KINDS {
            if let Some(params) = word_params(kind, alpha, beta, d) {
                let candidate = DubinsPath { qi, rho, params, kind };
                let better = match &best {
                    None => true,
                    Some(b) => {
                        let (lc, lb) = (candidate.length(), b.length());
                        lc < lb - 1e-9 || ((lc - lb).abs() <= 1e-9 && params < b.params)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        // at least one family is always feasible; numerical noise may still
        // reject all of them, in which case a straight word is the floor
        best.unwrap_or(DubinsPath { qi, rho, params: [0.0, d, 0.0], kind: PathKind::Lsl })
    }

    pub fn length(&self) -> f64 {
        (self.params[0] + self.params[1] + self.params[2]) * self.rho
    }

    /// Configuration `(x, y, theta)` after arc length `s` along the path.
    pub fn at(&self, s: f64) -> (f64, f64, f64) {
        let s = s.clamp(0.0, self.length()) / self.rho;
        // normalized frame: start at the origin, headed along qi[2]
        let mut q = (0.0, 0.0, self.qi[2]);
        let mut remaining = s;
        for (seg, len) in self.kind.segments().into_iter().zip(self.params) {
            let step = remaining.min(len);
            q = advance(q, step, seg);
            remaining -= step;
            if remaining <= 0.0 {
                break;
            }
        }
        (q.0 * self.rho + self.qi[0], q.1 * self.rho + self.qi[1], mod2pi(q.2))
    }

    pub fn endpoint(&self) -> (f64, f64, f64) {
        self.at(self.length())
    }

    /// Sample the path every `step` meters, always including both endpoints.
    /// Each entry is `(x, y, theta, s)`.
    pub fn sample(&self, step: f64) -> Vec<(f64, f64, f64, f64)> {
        assert!(step > 0.0);
        let total = self.length();
        let mut out = Vec::new();
        let mut s = 0.0;
        while s < total {
            let (x, y, theta) = self.at(s);
            out.push((x, y, theta, s));
            s += step;
        }
        let (x, y, theta) = self.at(total);
        out.push((x, y, theta, total));
        out
    }
}

fn advance(q: (f64, f64, f64), t: f64, seg: SegKind) -> (f64, f64, f64) {
    let (x, y, theta) = q;
    match seg {
        SegKind::Left => (
            x + (theta + t).sin() - theta.sin(),
            y - (theta + t).cos() + theta.cos(),
            theta + t,
        ),
        SegKind::Right => (
            x - (theta - t).sin() + theta.sin(),
            y + (theta - t).cos() - theta.cos(),
            theta - t,
        ),
        SegKind::Straight => (x + theta.cos() * t, y + theta.sin() * t, theta),
    }
}

/// Length of the shortest Dubins path between two oriented waypoints.
pub fn shortest_length(q0: &Waypoint, q1: &Waypoint, rho: f64) -> f64 {
    DubinsPath::shortest(q0, q1, rho).length()
}
