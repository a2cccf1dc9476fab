use rand::distributions::Distribution;
use rand::prelude::*;
use statrs::distribution::Normal;

use crate::table::{RawTable, Value};

/// Generate a deterministic synthetic two-sensor series with injected
/// anomalies.
///
/// Both sensors follow a gentle trend plus a sinusoid with Gaussian noise;
/// `n_anom` distinct rows get a large offset added to `sensor_1` and
/// subtracted from `sensor_2`. Returns the table and the injected row
/// indices, sorted ascending.
pub fn generate_synthetic(n_normal: usize, n_anom: usize, seed: u64) -> (RawTable, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise_1 = Normal::new(0.0, 0.3).unwrap();
    let noise_2 = Normal::new(0.0, 0.25).unwrap();
    let offset_1 = Normal::new(5.0, 1.0).unwrap();
    let offset_2 = Normal::new(4.0, 1.2).unwrap();

    let mut sensor_1 = Vec::with_capacity(n_normal);
    let mut sensor_2 = Vec::with_capacity(n_normal);
    for i in 0..n_normal {
        let t = i as f64;
        sensor_1.push(0.02 * t + 2.0 * (t / 25.0).sin() + noise_1.sample(&mut rng));
        sensor_2.push(0.01 * t + 0.7 * (t / 33.0).cos() + noise_2.sample(&mut rng));
    }

    let mut injected =
        rand::seq::index::sample(&mut rng, n_normal, n_anom.min(n_normal)).into_vec();
    injected.sort_unstable();
    for &i in &injected {
        sensor_1[i] += offset_1.sample(&mut rng);
        sensor_2[i] -= offset_2.sample(&mut rng);
    }

    let time: Vec<Value> = (0..n_normal).map(|i| Value::Number(i as f64)).collect();
    let table = RawTable::from_columns(vec![
        ("time", time),
        (
            "sensor_1",
            sensor_1.into_iter().map(Value::Number).collect(),
        ),
        (
            "sensor_2",
            sensor_2.into_iter().map(Value::Number).collect(),
        ),
    ]);
    (table, injected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_a_fixed_seed() {
        let (a, ia) = generate_synthetic(200, 10, 7);
        let (b, ib) = generate_synthetic(200, 10, 7);
        assert_eq!(a.rows(), b.rows());
        assert_eq!(ia, ib);
    }

    #[test]
    fn injects_distinct_indices_in_range() {
        let (table, injected) = generate_synthetic(150, 12, 3);
        assert_eq!(table.n_rows(), 150);
        assert_eq!(table.columns(), &["time", "sensor_1", "sensor_2"]);
        assert_eq!(injected.len(), 12);
        assert!(injected.windows(2).all(|w| w[0] < w[1]));
        assert!(injected.iter().all(|&i| i < 150));
    }

    #[test]
    fn caps_injection_at_row_count() {
        let (_, injected) = generate_synthetic(5, 10, 1);
        assert_eq!(injected.len(), 5);
    }
}
