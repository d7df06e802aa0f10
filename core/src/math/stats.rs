pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    pub fn argmax<'a, I>(samples: I) -> Option<(usize, f64)>
    where
        I: IntoIterator<Item = &'a f64>,
    {
        samples
            .into_iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .fold(None, |best, (idx, v)| match best {
                Some((_, top)) if top >= v => best,
                _ => Some((idx, v)),
            })
    }
}
