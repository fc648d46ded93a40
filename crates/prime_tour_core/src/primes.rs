/// Every prime up to a fixed bound, built once per dataset.
#[derive(Clone, Debug, Default)]
pub struct PrimeSet {
    is_prime: Vec<bool>,
    count: usize,
}

impl PrimeSet {
    /// Incremental trial division against the primes found so far, stopping
    /// once the divisor passes `sqrt(n)`.
    pub fn up_to(max: usize) -> Self {
        let mut is_prime = vec![false; max + 1];
        if max < 2 {
            return Self { is_prime, count: 0 };
        }

        let mut found: Vec<usize> = vec![2];
        is_prime[2] = true;
        for n in (3..=max).step_by(2) {
            if not_divisible_by_any(n, &found) {
                found.push(n);
                is_prime[n] = true;
            }
        }

        log::debug!("primes: max={max} count={}", found.len());
        Self {
            is_prime,
            count: found.len(),
        }
    }

    pub fn contains(&self, n: usize) -> bool {
        self.is_prime.get(n).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Largest number this set can answer for.
    pub fn max(&self) -> usize {
        self.is_prime.len().saturating_sub(1)
    }
}

fn not_divisible_by_any(n: usize, primes: &[usize]) -> bool {
    for &p in primes {
        if p * p > n {
            break;
        }
        if n % p == 0 {
            return false;
        }
    }
    true
}
