//! Vector quantization of detail vectors.

use std::f64::consts::{E, PI};

use cgmath::{InnerSpace, Matrix3, SquareMatrix};
use num_traits::Zero;

use crate::math::{Real, Vec3};


/// Result of quantizing a sequence of vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantization {
    /// One replacement per input vector, in input order.
    pub vectors: Vec<Vec3>,
    /// Differential entropy (bits) of a Gaussian fitted to the input.
    pub differential_entropy: Real,
    /// Entropy (bits per vector) of the codeword usage.
    pub discrete_entropy: Real,
}

/// Compresses detail vectors by replacing them with representatives from a
/// small codebook.
pub trait Quantizer {
    /// Uses at most `nb_classes` distinct vectors.
    fn quantize_classes(&self, vectors: &[Vec3], nb_classes: usize) -> Quantization;

    /// Uses as few distinct vectors as needed to get the mean squared error
    /// below `max_distortion`.
    fn quantize_distortion(&self, vectors: &[Vec3], max_distortion: Real) -> Quantization;
}


/// Linde-Buzo-Gray quantizer: the codebook is grown by splitting the cell
/// with the largest error, each growth step followed by k-means iterations.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorQuantizer {
    /// Maximum number of k-means iterations per growth step.
    pub max_iterations: usize,
    /// k-means stops when the relative improvement of the distortion drops
    /// below this.
    pub tolerance: Real,
}

impl Default for VectorQuantizer {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
        }
    }
}

/// State of the LBG iteration: codebook and assignment of the vectors.
struct Codebook<'a> {
    vectors: &'a [Vec3],
    codewords: Vec<Vec3>,
    assignment: Vec<usize>,
}

impl<'a> Codebook<'a> {
    fn new(vectors: &'a [Vec3]) -> Self {
        let mut out = Self {
            vectors,
            codewords: vec![mean(vectors)],
            assignment: vec![0; vectors.len()],
        };
        out.assign();
        out
    }

    fn len(&self) -> usize {
        self.codewords.len()
    }

    /// Mean squared error.
    fn distortion(&self) -> Real {
        if self.vectors.is_empty() {
            return 0.0;
        }
        let sum: Real = self.vectors.iter()
            .zip(&self.assignment)
            .map(|(v, &c)| (v - self.codewords[c]).magnitude2())
            .sum();
        sum / self.vectors.len() as Real
    }

    fn assign(&mut self) {
        for (v, slot) in self.vectors.iter().zip(&mut self.assignment) {
            let mut best = (Real::INFINITY, 0);
            for (i, c) in self.codewords.iter().enumerate() {
                let dist = (v - c).magnitude2();
                if dist < best.0 {
                    best = (dist, i);
                }
            }
            *slot = best.1;
        }
    }

    /// Moves every codeword to the centroid of its cell and drops codewords
    /// without vectors.
    fn update_codewords(&mut self) {
        let mut sums = vec![(Vec3::new(0.0, 0.0, 0.0), 0usize); self.codewords.len()];
        for (v, &c) in self.vectors.iter().zip(&self.assignment) {
            sums[c].0 += *v;
            sums[c].1 += 1;
        }

        let mut remap = vec![0; self.codewords.len()];
        let mut kept = Vec::with_capacity(self.codewords.len());
        for (i, (sum, count)) in sums.into_iter().enumerate() {
            if count > 0 {
                remap[i] = kept.len();
                kept.push(sum / count as Real);
            }
        }
        for c in &mut self.assignment {
            *c = remap[*c];
        }
        self.codewords = kept;
    }

    fn kmeans(&mut self, max_iterations: usize, tolerance: Real) {
        let mut last = self.distortion();
        for _ in 0..max_iterations {
            self.update_codewords();
            self.assign();
            let current = self.distortion();
            if last - current <= tolerance * last {
                break;
            }
            last = current;
        }
        self.update_codewords();
    }

    /// Adds the vector worst represented by its codeword as a new codeword.
    /// Returns `false` if every vector is represented exactly.
    fn split_worst(&mut self) -> bool {
        let worst = self.vectors.iter()
            .zip(&self.assignment)
            .map(|(v, &c)| (v - self.codewords[c]).magnitude2())
            .enumerate()
            .fold((0.0, None), |best, (i, dist)| if dist > best.0 { (dist, Some(i)) } else { best });

        match worst {
            (_, Some(i)) => {
                self.codewords.push(self.vectors[i]);
                self.assign();
                true
            }
            _ => false,
        }
    }

    fn into_quantization(self) -> Quantization {
        let mut usage = vec![0usize; self.codewords.len()];
        for &c in &self.assignment {
            usage[c] += 1;
        }
        let n = self.vectors.len() as Real;
        let discrete_entropy = usage.iter()
            .filter(|&&u| u > 0)
            .map(|&u| {
                let p = u as Real / n;
                -p * p.log2()
            })
            .sum();

        Quantization {
            vectors: self.assignment.iter().map(|&c| self.codewords[c]).collect(),
            differential_entropy: differential_entropy(self.vectors),
            discrete_entropy,
        }
    }
}

impl VectorQuantizer {
    fn run(&self, vectors: &[Vec3], mut done: impl FnMut(&Codebook<'_>) -> bool) -> Quantization {
        if vectors.is_empty() {
            return Quantization {
                vectors: Vec::new(),
                differential_entropy: differential_entropy(vectors),
                discrete_entropy: 0.0,
            };
        }

        // k-means may drop codewords again, so the growth steps are bounded.
        let mut book = Codebook::new(vectors);
        for _ in 0..2 * vectors.len() {
            if done(&book) {
                break;
            }
            if !book.split_worst() {
                break;
            }
            book.kmeans(self.max_iterations, self.tolerance);
        }
        book.into_quantization()
    }
}

impl Quantizer for VectorQuantizer {
    fn quantize_classes(&self, vectors: &[Vec3], nb_classes: usize) -> Quantization {
        let nb_classes = nb_classes.max(1);
        self.run(vectors, |book| book.len() >= nb_classes)
    }

    fn quantize_distortion(&self, vectors: &[Vec3], max_distortion: Real) -> Quantization {
        self.run(vectors, |book| book.distortion() <= max_distortion)
    }
}

fn mean(vectors: &[Vec3]) -> Vec3 {
    if vectors.is_empty() {
        return Vec3::new(0.0, 0.0, 0.0);
    }
    vectors.iter().fold(Vec3::new(0.0, 0.0, 0.0), |acc, v| acc + v) / vectors.len() as Real
}

/// `0.5 * log2((2 pi e)^3 det C)` with `C` the covariance of the vectors.
/// Minus infinity if the covariance is singular.
fn differential_entropy(vectors: &[Vec3]) -> Real {
    if vectors.len() < 2 {
        return Real::NEG_INFINITY;
    }
    let m = mean(vectors);
    let mut cov: Matrix3<Real> = Matrix3::zero();
    for v in vectors {
        let c = v - m;
        cov += Matrix3::from_cols(c * c.x, c * c.y, c * c.z);
    }
    let det = (cov / vectors.len() as Real).determinant();
    if det <= 0.0 {
        return Real::NEG_INFINITY;
    }
    0.5 * ((2.0 * PI * E).powi(3) * det).log2()
}
