//! Simulated annealing over adjacent-position swaps.
//!
//! A candidate move exchanges the cities at positions `fst` and `fst + 1`.
//! Only the three edges around the pair change, so the cost delta is O(1).
//! Acceptance is Metropolis on the relative cost change:
//! improving moves are always taken, a worsening move is taken with
//! probability `exp(-(new - old) / old / temperature)`.

use std::fmt;

use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::{DistanceModel, Error, Result, Tour};

pub const INITIAL_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_COOLING: f64 = 0.9;
pub const DEFAULT_EPOCHS: usize = 100;
pub const DEFAULT_SEED: u64 = 12_345;

/// Shortest tour (depot, a, b, depot) that still has an adjacent interior pair.
pub(crate) const MIN_SWAP_TOUR_LEN: usize = 4;

const ERR_INVALID_COOLING: &str = "cooling must be in (0, 1)";
const ERR_INVALID_EPOCHS: &str = "epochs must be > 0";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnealConfig {
    /// Geometric cooling factor applied once per epoch.
    pub cooling: f64,
    pub epochs: usize,
    /// Candidate swaps per epoch; 0 means one per interior adjacent pair.
    pub moves_per_epoch: usize,
    pub seed: u64,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            cooling: DEFAULT_COOLING,
            epochs: DEFAULT_EPOCHS,
            moves_per_epoch: 0,
            seed: DEFAULT_SEED,
        }
    }
}

impl AnnealConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.cooling > 0.0 && self.cooling < 1.0) {
            return Err(Error::invalid_input(ERR_INVALID_COOLING));
        }
        if self.epochs == 0 {
            return Err(Error::invalid_input(ERR_INVALID_EPOCHS));
        }
        Ok(())
    }

    pub(crate) fn moves_for(&self, tour_len: usize) -> usize {
        if self.moves_per_epoch > 0 {
            self.moves_per_epoch
        } else {
            swap_positions(tour_len)
        }
    }
}

/// Number of adjacent interior pairs in a tour of `tour_len` entries.
pub(crate) fn swap_positions(tour_len: usize) -> usize {
    tour_len.saturating_sub(MIN_SWAP_TOUR_LEN - 1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acceptance {
    Improved,
    /// Worse (or equal) move let through by the Metropolis draw.
    Probabilistic,
    Rejected,
}

impl Acceptance {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Metropolis test for a move from `old_cost` to `new_cost`; `draw` is uniform
/// in `[0, 1)`.
pub fn metropolis(old_cost: f64, new_cost: f64, temperature: f64, draw: f64) -> Acceptance {
    if new_cost < old_cost {
        return Acceptance::Improved;
    }
    let relative_improvement = (old_cost - new_cost) / old_cost;
    let probability = (relative_improvement / temperature).exp();
    if draw < probability {
        Acceptance::Probabilistic
    } else {
        Acceptance::Rejected
    }
}

/// Cost change from swapping `a` (at `fst`) and `b` (at `fst + 1`), where
/// `prev` precedes `a` and `next` follows `b`.
pub(crate) fn adjacent_swap_delta<D: DistanceModel + ?Sized>(
    model: &D,
    [prev, a, b, next]: [usize; 4],
    fst: usize,
) -> f64 {
    let snd = fst + 1;
    let before =
        model.edge_cost(prev, a, fst) + model.edge_cost(a, b, snd) + model.edge_cost(b, next, snd + 1);
    let after =
        model.edge_cost(prev, b, fst) + model.edge_cost(b, a, snd) + model.edge_cost(a, next, snd + 1);
    after - before
}

/// Move counters for one or more epochs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpochStats {
    pub candidates: usize,
    pub improved: usize,
    pub probabilistic: usize,
    pub rejected: usize,
    /// Net cost change from accepted moves.
    pub delta: f64,
}

impl EpochStats {
    pub(crate) fn record(&mut self, acceptance: Acceptance, delta: f64) {
        self.candidates += 1;
        match acceptance {
            Acceptance::Improved => self.improved += 1,
            Acceptance::Probabilistic => self.probabilistic += 1,
            Acceptance::Rejected => {
                self.rejected += 1;
                return;
            }
        }
        self.delta += delta;
    }

    pub fn merge(&mut self, other: &Self) {
        self.candidates += other.candidates;
        self.improved += other.improved;
        self.probabilistic += other.probabilistic;
        self.rejected += other.rejected;
        self.delta += other.delta;
    }

    pub fn accepted(&self) -> usize {
        self.improved + self.probabilistic
    }
}

impl fmt::Display for EpochStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "moves={} improved={} probabilistic={} rejected={} delta={:.4}",
            self.candidates, self.improved, self.probabilistic, self.rejected, self.delta
        )
    }
}

/// A tour together with its incrementally maintained cost and temperature.
pub struct LocalSearch<'a, D: DistanceModel + ?Sized> {
    model: &'a D,
    tour: Tour,
    cost: f64,
    temperature: f64,
}

impl<'a, D: DistanceModel + ?Sized> LocalSearch<'a, D> {
    pub fn new(model: &'a D, tour: Tour) -> Self {
        let cost = tour.cost(model);
        Self {
            model,
            tour,
            cost,
            temperature: INITIAL_TEMPERATURE,
        }
    }

    pub fn tour(&self) -> &Tour {
        &self.tour
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn into_parts(self) -> (Tour, f64) {
        (self.tour, self.cost)
    }

    /// Cost change of swapping positions `fst` and `snd`.
    ///
    /// Equal positions are a no-op (`Some(0.0)`). Only adjacent interior
    /// positions have an incremental formula; anything else is an unsupported
    /// move and yields `None`.
    pub fn swap_delta(&self, fst: usize, snd: usize) -> Option<f64> {
        let (fst, snd) = if fst <= snd { (fst, snd) } else { (snd, fst) };
        if fst == snd {
            return Some(0.0);
        }
        if snd - fst != 1 || fst == 0 || snd + 1 >= self.tour.len() {
            return None;
        }
        Some(adjacent_swap_delta(self.model, self.window(fst), fst))
    }

    /// Evaluates the adjacent swap at `(fst, fst + 1)` and commits it if the
    /// Metropolis test passes. Returns the decision and the applied delta.
    pub fn try_swap(&mut self, fst: usize, draw: f64) -> (Acceptance, f64) {
        let delta = adjacent_swap_delta(self.model, self.window(fst), fst);
        let new_cost = self.cost + delta;
        let acceptance = metropolis(self.cost, new_cost, self.temperature, draw);

        match acceptance {
            Acceptance::Rejected => return (acceptance, 0.0),
            Acceptance::Probabilistic => log::trace!(
                "anneal.accept: probabilistic pos={fst} delta={delta:.6} temp={:.6}",
                self.temperature
            ),
            Acceptance::Improved => {}
        }

        self.tour.swap(fst, fst + 1);
        self.cost = new_cost;
        (acceptance, delta)
    }

    /// Runs `moves` uniformly drawn candidate swaps at the current temperature.
    pub fn epoch<R: Rng + ?Sized>(&mut self, moves: usize, rng: &mut R) -> EpochStats {
        let mut stats = EpochStats::default();
        let len = self.tour.len();
        if len < MIN_SWAP_TOUR_LEN {
            return stats;
        }

        for _ in 0..moves {
            let fst = rng.random_range(1..len - 2);
            let draw = rng.random::<f64>();
            let (acceptance, delta) = self.try_swap(fst, draw);
            stats.record(acceptance, delta);
        }
        stats
    }

    pub fn cool(&mut self, cooling: f64) {
        self.temperature *= cooling;
    }

    fn window(&self, fst: usize) -> [usize; 4] {
        [
            self.tour.get(fst - 1),
            self.tour.get(fst),
            self.tour.get(fst + 1),
            self.tour.get(fst + 2),
        ]
    }
}

/// Best tour seen at epoch boundaries.
pub(crate) struct Incumbent {
    tour: Tour,
    cost: f64,
}

impl Incumbent {
    pub(crate) fn new(tour: Tour, cost: f64) -> Self {
        Self { tour, cost }
    }

    /// Keeps the candidate if it is strictly cheaper; `snapshot` only runs then.
    pub(crate) fn offer(&mut self, cost: f64, snapshot: impl FnOnce() -> Tour) -> bool {
        if cost < self.cost {
            self.tour = snapshot();
            self.cost = cost;
            true
        } else {
            false
        }
    }

    pub(crate) fn into_parts(self) -> (Tour, f64) {
        (self.tour, self.cost)
    }
}

#[derive(Clone, Debug)]
pub struct AnnealOutcome {
    /// Best tour seen at any epoch boundary.
    pub tour: Tour,
    /// Exact cost of `tour`.
    pub cost: f64,
    /// Exact cost minus the incrementally tracked cost.
    pub drift: f64,
    pub stats: EpochStats,
    pub final_temperature: f64,
}

/// Single-threaded annealing run.
#[prime_tour_derive::timer("anneal")]
pub fn anneal<D: DistanceModel + ?Sized>(
    model: &D,
    tour: Tour,
    config: &AnnealConfig,
) -> Result<AnnealOutcome> {
    config.validate()?;

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut search = LocalSearch::new(model, tour);
    let moves = config.moves_for(search.tour().len());
    let mut best = Incumbent::new(search.tour().clone(), search.cost());
    let mut totals = EpochStats::default();

    log::info!(
        "anneal: start len={} cost={:.2} epochs={} moves={moves} cooling={}",
        search.tour().len(),
        search.cost(),
        config.epochs,
        config.cooling
    );

    for epoch in 0..config.epochs {
        let stats = search.epoch(moves, &mut rng);
        log::debug!(
            "anneal.epoch: epoch={epoch} temp={:.6} cost={:.2} {stats}",
            search.temperature(),
            search.cost()
        );
        totals.merge(&stats);
        best.offer(search.cost(), || search.tour().clone());
        search.cool(config.cooling);
    }

    let final_temperature = search.temperature();
    let (tour, tracked) = best.into_parts();
    let cost = tour.cost(model);
    let drift = cost - tracked;
    log::info!("anneal: complete cost={cost:.2} drift={drift:.3e} {totals}");

    Ok(AnnealOutcome {
        tour,
        cost,
        drift,
        stats: totals,
        final_temperature,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, sync::Once};

    use rand::{Rng, SeedableRng, rngs::SmallRng};

    use super::{
        Acceptance, AnnealConfig, EpochStats, Incumbent, LocalSearch, anneal, metropolis,
    };
    use crate::{City, DistanceModel, Instance, Tour, algo::construct::random_tour};

    fn scattered(n: usize, seed: u64) -> Instance {
        let mut rng = SmallRng::seed_from_u64(seed);
        Instance::new(
            (0..n)
                .map(|_| City::new(rng.random::<f64>() * 500.0, rng.random::<f64>() * 500.0))
                .collect(),
        )
    }

    thread_local! {
        static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
    }

    /// Collects records emitted on threads that opted in via [`capture_logs`].
    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            CAPTURED.with(|captured| captured.borrow().is_some())
        }

        fn log(&self, record: &log::Record<'_>) {
            CAPTURED.with(|captured| {
                if let Some(lines) = captured.borrow_mut().as_mut() {
                    lines.push(format!("{} {}", record.level(), record.args()));
                }
            });
        }

        fn flush(&self) {}
    }

    static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;

    fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            log::set_logger(&CAPTURE_LOGGER).expect("no other logger in tests");
            log::set_max_level(log::LevelFilter::Trace);
        });

        CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
        let value = f();
        let lines = CAPTURED.with(|captured| captured.borrow_mut().take().unwrap_or_default());
        (value, lines)
    }

    fn assert_close(tracked: f64, exact: f64) {
        let tolerance = 1e-9 * exact.abs().max(1.0);
        assert!(
            (tracked - exact).abs() <= tolerance,
            "tracked={tracked} exact={exact}"
        );
    }

    #[test]
    fn adjacent_delta_matches_full_recomputation() {
        let instance = scattered(40, 1);
        let tour = random_tour(&instance, 2).expect("tour");
        let search = LocalSearch::new(&instance, tour.clone());

        for fst in 1..tour.len() - 2 {
            let delta = search.swap_delta(fst, fst + 1).expect("adjacent");
            let mut swapped = tour.clone();
            swapped.swap(fst, fst + 1);
            assert_close(
                search.cost() + delta,
                swapped.cost(&instance),
            );
        }
    }

    #[test]
    fn swap_delta_normalizes_and_handles_degenerate_moves() {
        let instance = scattered(12, 4);
        let search = LocalSearch::new(&instance, random_tour(&instance, 5).expect("tour"));

        assert_eq!(search.swap_delta(3, 3), Some(0.0));
        assert_eq!(search.swap_delta(5, 4), search.swap_delta(4, 5));
        assert_eq!(search.swap_delta(2, 6), None);
        assert_eq!(search.swap_delta(0, 1), None);
        assert_eq!(search.swap_delta(11, 12), None);
    }

    #[test]
    fn tracked_cost_survives_many_accepted_swaps() {
        let instance = scattered(200, 9);
        let mut search = LocalSearch::new(&instance, random_tour(&instance, 3).expect("tour"));
        let mut rng = SmallRng::seed_from_u64(17);

        let mut totals = EpochStats::default();
        for _ in 0..20 {
            let stats = search.epoch(500, &mut rng);
            totals.merge(&stats);
            search.cool(0.5);
            assert_close(search.cost(), search.tour().cost(&instance));
        }
        assert!(totals.improved > 0);
        assert!(totals.probabilistic > 0);
        search.tour().validate(instance.len()).expect("valid");
    }

    #[test]
    fn improving_swap_strictly_decreases_cost() {
        let instance = scattered(60, 21);
        let mut search = LocalSearch::new(&instance, random_tour(&instance, 8).expect("tour"));

        let fst = (1..search.tour().len() - 2)
            .find(|&p| search.swap_delta(p, p + 1).is_some_and(|d| d < 0.0))
            .expect("a random tour has an improving adjacent swap");
        let before = search.cost();
        let (acceptance, delta) = search.try_swap(fst, 0.999);

        assert_eq!(acceptance, Acceptance::Improved);
        assert!(delta < 0.0);
        assert!(search.cost() < before);
        assert_close(search.cost(), search.tour().cost(&instance));
    }

    #[test]
    fn probabilistic_swap_may_raise_cost_but_keeps_tour_valid() {
        let instance = scattered(60, 22);
        let mut search = LocalSearch::new(&instance, random_tour(&instance, 9).expect("tour"));

        let fst = (1..search.tour().len() - 2)
            .find(|&p| search.swap_delta(p, p + 1).is_some_and(|d| d > 0.0))
            .expect("a random tour has a worsening adjacent swap");
        let before = search.cost();
        let (acceptance, delta) = search.try_swap(fst, 0.0);

        assert_eq!(acceptance, Acceptance::Probabilistic);
        assert!(delta > 0.0);
        assert!(search.cost() > before);
        search.tour().validate(instance.len()).expect("valid");
    }

    #[test]
    fn probabilistic_accept_is_logged_at_trace() {
        let instance = scattered(60, 24);
        let mut search = LocalSearch::new(&instance, random_tour(&instance, 11).expect("tour"));
        let fst = (1..search.tour().len() - 2)
            .find(|&p| search.swap_delta(p, p + 1).is_some_and(|d| d > 0.0))
            .expect("worsening swap");

        let ((acceptance, _), lines) = capture_logs(|| search.try_swap(fst, 0.0));
        assert_eq!(acceptance, Acceptance::Probabilistic);
        let expected = format!("TRACE anneal.accept: probabilistic pos={fst} ");
        assert!(
            lines.iter().any(|line| line.starts_with(&expected)),
            "missing {expected:?} in {lines:?}"
        );
    }

    #[test]
    fn rejected_swap_leaves_tour_unchanged() {
        let instance = scattered(60, 23);
        let mut search = LocalSearch::new(&instance, random_tour(&instance, 10).expect("tour"));
        let tour_before = search.tour().clone();
        let cost_before = search.cost();

        let fst = (1..tour_before.len() - 2)
            .find(|&p| search.swap_delta(p, p + 1).is_some_and(|d| d > 0.0))
            .expect("worsening swap");
        let (acceptance, delta) = search.try_swap(fst, 1.0);

        assert_eq!(acceptance, Acceptance::Rejected);
        assert_eq!(delta, 0.0);
        assert_eq!(search.tour(), &tour_before);
        assert_eq!(search.cost(), cost_before);
    }

    #[test]
    fn metropolis_follows_relative_change_and_temperature() {
        assert_eq!(metropolis(100.0, 99.0, 1.0, 0.99), Acceptance::Improved);

        // exp(-0.01 / 1.0) ~= 0.990
        assert_eq!(metropolis(100.0, 101.0, 1.0, 0.98), Acceptance::Probabilistic);
        assert_eq!(metropolis(100.0, 101.0, 1.0, 0.995), Acceptance::Rejected);

        // exp(-0.01 / 0.001) ~= 4.5e-5
        assert_eq!(metropolis(100.0, 101.0, 0.001, 0.001), Acceptance::Rejected);
        assert_eq!(metropolis(100.0, 101.0, 0.001, 0.0), Acceptance::Probabilistic);
    }

    #[test]
    fn epoch_on_tiny_tour_is_a_no_op() {
        let instance = scattered(2, 1);
        let mut search = LocalSearch::new(&instance, Tour::closed([1]));
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(search.epoch(100, &mut rng), EpochStats::default());
    }

    #[test]
    fn anneal_returns_valid_tour_no_worse_than_start() {
        let instance = scattered(150, 31);
        let start = random_tour(&instance, 4).expect("tour");
        let start_cost = start.cost(&instance);
        let config = AnnealConfig {
            cooling: 0.5,
            epochs: 30,
            moves_per_epoch: 2_000,
            seed: 77,
        };

        let outcome = anneal(&instance, start, &config).expect("anneal");

        outcome.tour.validate(instance.len()).expect("valid");
        assert!(outcome.cost <= start_cost);
        assert_close(outcome.cost, instance.path_cost(outcome.tour.as_slice()));
        assert_close(outcome.cost - outcome.drift, outcome.cost);
        assert_eq!(outcome.stats.candidates, 30 * 2_000);
        assert!((outcome.final_temperature - 0.5_f64.powi(30)).abs() < 1e-18);
    }

    #[test]
    fn anneal_is_reproducible_for_a_seed() {
        let instance = scattered(80, 5);
        let config = AnnealConfig {
            epochs: 5,
            ..AnnealConfig::default()
        };
        let a = anneal(&instance, random_tour(&instance, 1).expect("tour"), &config).expect("a");
        let b = anneal(&instance, random_tour(&instance, 1).expect("tour"), &config).expect("b");
        assert_eq!(a.tour, b.tour);
    }

    #[test]
    fn anneal_rejects_bad_cooling() {
        let instance = scattered(10, 5);
        let tour = random_tour(&instance, 1).expect("tour");
        for cooling in [0.0, 1.0, 1.5, -0.2, f64::NAN] {
            let config = AnnealConfig {
                cooling,
                ..AnnealConfig::default()
            };
            assert!(anneal(&instance, tour.clone(), &config).is_err(), "cooling={cooling}");
        }
    }

    #[test]
    fn incumbent_only_snapshots_on_improvement() {
        let mut best = Incumbent::new(Tour::closed([1, 2]), 10.0);
        assert!(!best.offer(10.0, || panic!("must not snapshot")));
        assert!(best.offer(9.0, || Tour::closed([2, 1])));
        let (tour, cost) = best.into_parts();
        assert_eq!(tour.as_slice(), &[0, 2, 1, 0]);
        assert_eq!(cost, 9.0);
    }
}
