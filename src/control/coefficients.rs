//! Variable-step BDF coefficients for orders 1 and 2.

/// Coefficient set of the Gear12 method.
///
/// `psi[0]` is the step being attempted, `psi[1]` and `psi[2]` the two
/// previously accepted steps. `beta` weights the predictor, `alpha` the
/// corrector's charge derivative and `ck` scales the correction norm into a
/// local truncation error estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gear12Coefficients {
    /// Corrector weights
    pub alpha: [f64; 3],
    /// Predictor weights
    pub beta: [f64; 3],
    /// Step size history
    pub psi: [f64; 3],
    /// Fixed leading coefficient, kept at -1 for this method
    pub alphas: f64,
    /// Error constant
    pub ck: f64,
}

impl Default for Gear12Coefficients {
    fn default() -> Self {
        Self {
            alpha: [1.0, -1.0, 0.0],
            beta: [1.0, 0.0, 0.0],
            psi: [0.0; 3],
            alphas: -1.0,
            ck: 1.0,
        }
    }
}

impl Gear12Coefficients {
    /// Forget the step history and start over with step `h`.
    pub fn reset(&mut self, h: f64) {
        *self = Self::default();
        self.psi[0] = h;
    }

    /// Shift the step history and recompute the coefficients for a new
    /// attempt with step `h` at `order`.
    pub fn update(&mut self, h: f64, order: usize) {
        if order == 2 {
            self.psi[2] = self.psi[1];
        }
        self.psi[1] = self.psi[0];
        self.psi[0] = h;

        self.ck = 1.0;
        self.alphas = -1.0;

        let psi1 = self.psi[1];
        if order == 2 {
            let psi2 = self.psi[2];
            self.beta[2] = h / psi2 * (h + psi1) / (psi1 + psi2);
            self.beta[1] = -h / psi1 - self.beta[2] * (psi1 + psi2) / psi1;
            self.beta[0] = 1.0 - self.beta[2] - self.beta[1];

            let a2 = -h / psi1 * h / (2.0 * h + psi1);
            let a1 = 1.0 - a2;
            let a0 = -a1 - a2 * (1.0 + psi1 / h);
            self.alpha[2] = a2 / a0;
            self.alpha[1] = a1 / a0;
            self.alpha[0] = -1.0 / a0;

            self.ck = h / (h + psi1 + psi2);
        } else {
            self.beta[0] = 1.0 + h / psi1;
            self.beta[1] = -h / psi1;
            self.beta[2] = 0.0;
            self.alpha[0] = 1.0;
            self.alpha[1] = -1.0;
            self.alpha[2] = 0.0;
            self.ck = h / (h + psi1);
        }
        log::trace!(
            "coefficients h={:.6e} order={} alpha={:?} beta={:?} psi={:?} ck={:.6e}",
            h,
            order,
            self.alpha,
            self.beta,
            self.psi,
            self.ck
        );
    }

    /// Undo the shift made by [`update`](Self::update) after a rejected
    /// attempt at `order`.
    pub fn restore_psi(&mut self, order: usize) {
        for i in 1..=order {
            self.psi[i - 1] = self.psi[i];
        }
    }

    /// Weights `gamma` such that `x(t_n + dt) ~ sum_j gamma[j] * x_hist[j]`.
    ///
    /// Uses the divided-difference polynomial through the last `order + 1`
    /// accepted points, with `psi[0]` the last accepted step.
    pub fn interpolation_weights(&self, dt: f64, order: usize) -> [f64; 3] {
        let psi0 = self.psi[0];
        let g1 = dt / psi0;
        if order < 2 {
            return [1.0 + g1, -g1, 0.0];
        }
        let psi1 = self.psi[1];
        let g2 = dt * (dt + psi0) / (psi0 + psi1);
        [
            1.0 + g1 + g2 / psi0,
            -g1 - g2 / psi0 - g2 / psi1,
            g2 / psi1,
        ]
    }
}
