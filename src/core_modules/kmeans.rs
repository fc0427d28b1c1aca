// THEORY:
// Plain Lloyd iteration over RGB points with random restarts. Each attempt
// seeds `k` centres from randomly chosen data points, then alternates
// assignment and centre update until no centre moves more than `epsilon` or
// `max_iterations` is reached. The attempt with the lowest compactness (sum of
// squared distances to the assigned centre) wins.
//
// The RNG is seeded from configuration, so the same pixels always give the same
// centres. A cluster that loses all its points is reseeded with the point that
// is farthest from its own centre.

use crate::config::ToneConfig;
use crate::core_modules::pixel::Pixel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// One centre per cluster, each channel truncated to 8 bits.
    pub centers: Vec<Pixel>,
    /// Number of points assigned to each centre.
    pub sizes: Vec<usize>,
    pub compactness: f64,
}

impl Clustering {
    /// The centre of the most populated cluster.
    pub fn dominant(&self) -> Option<Pixel> {
        self.sizes
            .iter()
            .enumerate()
            .max_by_key(|(_, size)| **size)
            .map(|(index, _)| self.centers[index])
    }
}

pub struct KMeans {
    k: usize,
    max_iterations: usize,
    epsilon: f64,
    attempts: usize,
    seed: u64,
}

type Center = [f64; 3];

fn squared_distance(point: &Center, center: &Center) -> f64 {
    point.iter().zip(center).map(|(a, b)| (a - b) * (a - b)).sum()
}

fn nearest(point: &Center, centers: &[Center]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (index, center) in centers.iter().enumerate() {
        let distance = squared_distance(point, center);
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best
}

/// The point farthest from the centre it is assigned to.
fn farthest_point(points: &[Center], labels: &[usize], centers: &[Center]) -> Center {
    let mut best = (0, -1.0);
    for (index, (point, label)) in points.iter().zip(labels).enumerate() {
        let distance = squared_distance(point, &centers[*label]);
        if distance > best.1 {
            best = (index, distance);
        }
    }
    points[best.0]
}

impl KMeans {
    pub fn new(k: usize, config: &ToneConfig) -> Self {
        Self {
            k: k.max(1),
            max_iterations: config.max_iterations.max(1),
            epsilon: config.epsilon,
            attempts: config.attempts.max(1),
            seed: config.seed,
        }
    }

    /// Clusters the points; `None` when there are none.
    pub fn fit(&self, pixels: &[Pixel]) -> Option<Clustering> {
        if pixels.is_empty() {
            return None;
        }
        let points: Vec<Center> = pixels
            .iter()
            .map(|p| [p.red as f64, p.green as f64, p.blue as f64])
            .collect();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut best: Option<(Vec<Center>, Vec<usize>, f64)> = None;
        for _ in 0..self.attempts {
            let attempt = self.run_attempt(&points, &mut rng);
            if best.as_ref().is_none_or(|b| attempt.2 < b.2) {
                best = Some(attempt);
            }
        }

        best.map(|(centers, sizes, compactness)| Clustering {
            centers: centers
                .iter()
                .map(|c| {
                    let channel = |v: f64| v.clamp(0.0, 255.0) as u8;
                    Pixel::new(channel(c[0]), channel(c[1]), channel(c[2]))
                })
                .collect(),
            sizes,
            compactness,
        })
    }

    fn run_attempt(&self, points: &[Center], rng: &mut StdRng) -> (Vec<Center>, Vec<usize>, f64) {
        let mut centers: Vec<Center> = (0..self.k)
            .map(|_| points[rng.random_range(0..points.len())])
            .collect();
        let mut labels = vec![0usize; points.len()];

        for _ in 0..self.max_iterations {
            for (label, point) in labels.iter_mut().zip(points) {
                *label = nearest(point, &centers).0;
            }

            let mut sums = vec![[0.0f64; 3]; self.k];
            let mut counts = vec![0usize; self.k];
            for (label, point) in labels.iter().zip(points) {
                counts[*label] += 1;
                for channel in 0..3 {
                    sums[*label][channel] += point[channel];
                }
            }

            let mut max_shift = 0.0f64;
            for cluster in 0..self.k {
                let updated = if counts[cluster] == 0 {
                    farthest_point(points, &labels, &centers)
                } else {
                    let n = counts[cluster] as f64;
                    [sums[cluster][0] / n, sums[cluster][1] / n, sums[cluster][2] / n]
                };
                max_shift = max_shift.max(squared_distance(&updated, &centers[cluster]).sqrt());
                centers[cluster] = updated;
            }

            if max_shift <= self.epsilon {
                break;
            }
        }

        let mut sizes = vec![0usize; self.k];
        let mut compactness = 0.0;
        for point in points {
            let (label, distance) = nearest(point, &centers);
            sizes[label] += 1;
            compactness += distance;
        }
        (centers, sizes, compactness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kmeans(k: usize) -> KMeans {
        KMeans::new(k, &ToneConfig::default())
    }

    #[test]
    fn no_points_no_clustering() {
        assert_eq!(kmeans(1).fit(&[]), None);
    }

    #[test]
    fn single_cluster_centre_is_the_truncated_mean() {
        let pixels = [
            Pixel::new(10, 20, 30),
            Pixel::new(20, 30, 40),
            Pixel::new(32, 42, 52),
        ];
        let clustering = kmeans(1).fit(&pixels).expect("points");
        // Mean is (20.67, 30.67, 40.67).
        assert_eq!(clustering.centers, vec![Pixel::new(20, 30, 40)]);
        assert_eq!(clustering.sizes, vec![3]);
        assert_eq!(clustering.dominant(), Some(Pixel::new(20, 30, 40)));
    }

    #[test]
    fn two_well_separated_groups_are_found() {
        let mut pixels = vec![Pixel::new(250, 250, 250); 30];
        pixels.extend(vec![Pixel::new(5, 5, 5); 10]);
        let clustering = kmeans(2).fit(&pixels).expect("points");
        assert_eq!(clustering.dominant(), Some(Pixel::new(250, 250, 250)));
        assert!(clustering.compactness < 1e-9);
        let mut sizes = clustering.sizes.clone();
        sizes.sort();
        assert_eq!(sizes, vec![10, 30]);
    }

    #[test]
    fn same_seed_same_result() {
        let pixels: Vec<Pixel> = (0..200u32)
            .map(|i| Pixel::new((i * 7 % 256) as u8, (i * 13 % 256) as u8, (i * 29 % 256) as u8))
            .collect();
        assert_eq!(kmeans(3).fit(&pixels), kmeans(3).fit(&pixels));
    }
}
