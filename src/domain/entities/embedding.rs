use serde::{Deserialize, Serialize};

/// A dense vector produced by an embedding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(vec: Vec<f32>) -> Self {
        Self(vec)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Cosine similarity; 0.0 when dimensions differ or either side has no magnitude.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dimension() != other.dimension() || self.is_empty() {
            return 0.0;
        }

        let (norm_a, norm_b) = (self.norm(), other.norm());
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        let dot: f32 = self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum();
        dot / (norm_a * norm_b)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vec: Vec<f32>) -> Self {
        Self(vec)
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(vec: Vec<f64>) -> Self {
        Self(vec.into_iter().map(|x| x as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 2.0]);

        assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-6);
        assert!(a.cosine_similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        let a = Embedding::new(vec![1.0, 0.0]);

        assert_eq!(a.cosine_similarity(&Embedding::new(vec![1.0])), 0.0);
        assert_eq!(a.cosine_similarity(&Embedding::new(vec![0.0, 0.0])), 0.0);
        assert_eq!(Embedding::new(vec![]).cosine_similarity(&Embedding::new(vec![])), 0.0);
    }
}
