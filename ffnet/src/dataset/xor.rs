//! Synthetic exclusive-or samples for smoke-testing training.

use rand::{prelude::SliceRandom, Rng};

use super::Samples;

fn sample(a: bool, b: bool) -> (Vec<f64>, Vec<f64>) {
    let bit = |v: bool| if v { 1.0 } else { 0.0 };
    (vec![bit(a), bit(b)], vec![bit(a != b)])
}

/// The four input pairs in the order `00, 01, 10, 11`.
pub fn truth_table() -> Samples {
    [(false, false), (false, true), (true, false), (true, true)]
        .into_iter()
        .map(|(a, b)| sample(a, b))
        .unzip()
}

/// `copies` copies of the truth table, shuffled together.
pub fn replicated<R: Rng + ?Sized>(copies: usize, rng: &mut R) -> Samples {
    let (inputs, targets) = truth_table();
    let mut pairs: Vec<_> = inputs
        .into_iter()
        .zip(targets)
        .cycle()
        .take(copies * 4)
        .collect();
    pairs.shuffle(rng);

    pairs.into_iter().unzip()
}

/// `count` samples with independently drawn input bits.
pub fn random_samples<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Samples {
    (0..count).map(|_| sample(rng.gen(), rng.gen())).unzip()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{random_samples, replicated, truth_table};

    fn is_xor(x: &[f64], y: &[f64]) -> bool {
        (x[0] != x[1]) == (y[0] == 1.0)
    }

    #[test]
    fn truth_table_is_exact() {
        let (inputs, targets) = truth_table();

        assert_eq!(
            inputs,
            vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]]
        );
        assert_eq!(targets, vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]]);
    }

    #[test]
    fn replicated_keeps_every_pair_balanced() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (inputs, targets) = replicated(25, &mut rng);

        assert_eq!(inputs.len(), 100);
        assert_eq!(targets.len(), 100);
        assert!(inputs.iter().zip(&targets).all(|(x, y)| is_xor(x, y)));

        let ones = targets.iter().filter(|y| y[0] == 1.0).count();
        assert_eq!(ones, 50);
    }

    #[test]
    fn random_samples_are_consistent() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (inputs, targets) = random_samples(200, &mut rng);

        assert_eq!(inputs.len(), 200);
        assert!(inputs.iter().zip(&targets).all(|(x, y)| is_xor(x, y)));
        assert!(inputs
            .iter()
            .all(|x| x.iter().all(|&b| b == 0.0 || b == 1.0)));
    }
}
