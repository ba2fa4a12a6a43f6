//! Time-dependent source values.

/// Value of an independent source over time.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Constant value
    Dc(f64),
    /// Trapezoidal pulse train
    Pulse {
        /// Initial value
        v1: f64,
        /// Pulsed value
        v2: f64,
        delay: f64,
        rise: f64,
        fall: f64,
        /// Time spent at `v2`
        width: f64,
        /// Repetition period; zero or less means a single pulse
        period: f64,
    },
    /// `offset + amplitude * sin(2 pi freq (t - delay))` after `delay`
    Sine {
        offset: f64,
        amplitude: f64,
        freq: f64,
        delay: f64,
    },
}

impl Waveform {
    /// Single pulse from `v1` to `v2` starting at `delay`.
    pub fn step(v1: f64, v2: f64, delay: f64, rise: f64) -> Self {
        Waveform::Pulse {
            v1,
            v2,
            delay,
            rise,
            fall: rise,
            width: f64::INFINITY,
            period: 0.0,
        }
    }

    /// Value at `time`.
    pub fn value(&self, time: f64) -> f64 {
        match *self {
            Waveform::Dc(v) => v,
            Waveform::Pulse {
                v1,
                v2,
                delay,
                rise,
                fall,
                width,
                period,
            } => {
                if time < delay {
                    return v1;
                }
                let mut t = time - delay;
                if period > 0.0 {
                    t %= period;
                }
                if t < rise {
                    if rise > 0.0 {
                        v1 + (v2 - v1) * t / rise
                    } else {
                        v2
                    }
                } else if t < rise + width {
                    v2
                } else if t < rise + width + fall {
                    v2 + (v1 - v2) * (t - rise - width) / fall
                } else {
                    v1
                }
            }
            Waveform::Sine {
                offset,
                amplitude,
                freq,
                delay,
            } => {
                if time < delay {
                    offset
                } else {
                    offset + amplitude * (2.0 * std::f64::consts::PI * freq * (time - delay)).sin()
                }
            }
        }
    }

    /// Corners of the waveform inside `(t0, tf)`.
    pub fn breakpoints(&self, t0: f64, tf: f64) -> Vec<f64> {
        let mut points = Vec::new();
        match *self {
            Waveform::Dc(_) => {}
            Waveform::Pulse {
                delay,
                rise,
                fall,
                width,
                period,
                ..
            } => {
                let corners = [0.0, rise, rise + width, rise + width + fall];
                let mut start = delay;
                while start < tf {
                    for c in corners {
                        let t = start + c;
                        if t > t0 && t < tf && t.is_finite() {
                            points.push(t);
                        }
                    }
                    if !(period > 0.0) {
                        break;
                    }
                    start += period;
                }
            }
            Waveform::Sine { delay, .. } => {
                if delay > t0 && delay < tf {
                    points.push(delay);
                }
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pulse() -> Waveform {
        Waveform::Pulse {
            v1: 0.0,
            v2: 1.0,
            delay: 1.0,
            rise: 0.5,
            fall: 0.5,
            width: 1.0,
            period: 4.0,
        }
    }

    #[test]
    fn test_pulse_values() {
        let p = pulse();
        assert_eq!(p.value(0.5), 0.0);
        assert_relative_eq!(p.value(1.25), 0.5);
        assert_eq!(p.value(2.0), 1.0);
        assert_relative_eq!(p.value(2.75), 0.5);
        assert_eq!(p.value(3.5), 0.0);
        // Second period.
        assert_eq!(p.value(6.0), 1.0);
    }

    #[test]
    fn test_pulse_breakpoints() {
        let bps = pulse().breakpoints(0.0, 6.0);
        assert_eq!(bps, vec![1.0, 1.5, 2.5, 3.0, 5.0, 5.5]);
    }

    #[test]
    fn test_step_has_two_corners() {
        let s = Waveform::step(0.0, 5.0, 1e-3, 1e-6);
        assert_eq!(s.breakpoints(0.0, 1.0), vec![1e-3, 1e-3 + 1e-6]);
        assert_eq!(s.value(1.0), 5.0);
    }

    #[test]
    fn test_sine() {
        let s = Waveform::Sine {
            offset: 1.0,
            amplitude: 2.0,
            freq: 1.0,
            delay: 0.0,
        };
        assert_relative_eq!(s.value(0.25), 3.0, epsilon = 1e-12);
        assert!(s.breakpoints(0.0, 1.0).is_empty());
        assert_eq!(Waveform::Dc(3.0).value(10.0), 3.0);
    }
}
