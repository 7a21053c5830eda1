use std::collections::VecDeque;

use crate::config::SmoothingConfig;

use super::sample::AngleSample;

/// Mean of the last `window` values
#[derive(Debug, Clone)]
struct MovingAverage {
    window: usize,
    values: VecDeque<f32>,
}

impl MovingAverage {
    fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            values: VecDeque::with_capacity(window),
        }
    }

    fn push(&mut self, value: f32) -> f32 {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    fn reset(&mut self) {
        self.values.clear();
    }
}

/// Per-angle moving average. Empty angles pass through without touching
/// the history, so dropped frames don't drag the average.
#[derive(Debug, Clone)]
pub struct AngleSmoother {
    knee: MovingAverage,
    back: MovingAverage,
}

impl AngleSmoother {
    pub fn new(window: usize) -> Self {
        Self {
            knee: MovingAverage::new(window),
            back: MovingAverage::new(window),
        }
    }

    pub fn from_config(config: &SmoothingConfig) -> Self {
        Self::new(config.window)
    }

    pub fn apply(&mut self, sample: AngleSample) -> AngleSample {
        AngleSample {
            knee: sample.knee.map(|v| self.knee.push(v)),
            back: sample.back.map(|v| self.back.push(v)),
        }
    }

    pub fn reset(&mut self) {
        self.knee.reset();
        self.back.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_one_is_passthrough() {
        let mut s = AngleSmoother::new(1);
        s.apply(AngleSample::new(Some(170.0), Some(175.0)));
        let out = s.apply(AngleSample::new(Some(90.0), Some(140.0)));
        assert_eq!(out, AngleSample::new(Some(90.0), Some(140.0)));
    }

    #[test]
    fn test_average_over_window() {
        let mut s = AngleSmoother::new(3);
        s.apply(AngleSample::new(Some(90.0), None));
        s.apply(AngleSample::new(Some(120.0), None));
        let out = s.apply(AngleSample::new(Some(150.0), None));
        assert!((out.knee.unwrap() - 120.0).abs() < 1e-4);
        // oldest value leaves the window
        let out = s.apply(AngleSample::new(Some(180.0), None));
        assert!((out.knee.unwrap() - 150.0).abs() < 1e-4);
    }

    #[test]
    fn test_none_does_not_touch_history() {
        let mut s = AngleSmoother::new(2);
        s.apply(AngleSample::new(Some(100.0), Some(160.0)));
        let out = s.apply(AngleSample::EMPTY);
        assert!(out.is_empty());
        let out = s.apply(AngleSample::new(Some(120.0), None));
        assert!((out.knee.unwrap() - 110.0).abs() < 1e-4);
        assert!(out.back.is_none());
    }

    #[test]
    fn test_reset() {
        let mut s = AngleSmoother::new(5);
        s.apply(AngleSample::new(Some(10.0), None));
        s.reset();
        let out = s.apply(AngleSample::new(Some(170.0), None));
        assert_eq!(out.knee, Some(170.0));
    }

    #[test]
    fn test_zero_window_treated_as_one() {
        let mut s = AngleSmoother::new(0);
        s.apply(AngleSample::new(Some(10.0), None));
        let out = s.apply(AngleSample::new(Some(20.0), None));
        assert_eq!(out.knee, Some(20.0));
    }
}
