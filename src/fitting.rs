//! Fitting policy.
//!
//! Chooses which pending logical worker a granted allocation should bind
//! to. Pure function, no I/O, no locking — the caller (the coordinator)
//! supplies the candidate set and holds whatever lock it needs around the
//! call.

use crate::worker::LogicalWorker;

/// What a granted allocation actually offers.
#[derive(Debug, Clone, Copy)]
pub struct Granted {
    pub mem: u64,
    pub cores: u32,
}

/// Returns `true` if `candidate` dominates `current`: `A` replaces `B`
/// unless `A` is strictly smaller than `B` on some dimension. This is
/// deliberately not a total order — two candidates can each dominate the
/// other's weak point, in which case whichever is iterated first is kept.
fn beats(candidate: &LogicalWorker, current: &LogicalWorker) -> bool {
    let smaller_on_some_dimension = candidate.required_mem < current.required_mem
        || candidate.required_cores < current.required_cores;
    !smaller_on_some_dimension
}

/// Picks the largest candidate that fits `granted`.
///
/// Only candidates with `required_mem <= granted.mem` (and, unless
/// `ignore_cpu`, `required_cores <= granted.cores`) are considered. Among
/// survivors the first encountered wins ties: since `beats` only replaces
/// on a strict improvement, two candidates that are incomparable (each
/// ahead on a different dimension) leave the earlier-iterated one standing.
pub fn fit<'a, I>(granted: Granted, candidates: I, ignore_cpu: bool) -> Option<LogicalWorker>
where
    I: IntoIterator<Item = &'a LogicalWorker>,
{
    let mut winner: Option<&LogicalWorker> = None;
    for candidate in candidates {
        let mem_ok = candidate.required_mem <= granted.mem;
        let cores_ok = ignore_cpu || candidate.required_cores <= granted.cores;
        if !mem_ok || !cores_ok {
            continue;
        }
        winner = match winner {
            None => Some(candidate),
            Some(current) if beats(candidate, current) => Some(candidate),
            Some(current) => Some(current),
        };
    }
    winner.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RequiredResource;

    fn worker(id: u32, mem: u64, cores: f64) -> LogicalWorker {
        LogicalWorker::requested(id, RequiredResource::new(mem, cores))
    }

    #[test]
    fn exact_fit_picks_the_only_candidate() {
        let candidates = vec![worker(1, 1 << 30, 1.0)];
        let winner = fit(
            Granted {
                mem: 1 << 30,
                cores: 1,
            },
            &candidates,
            false,
        );
        assert_eq!(winner.unwrap().id, 1);
    }

    #[test]
    fn overallocation_prefers_the_largest_fit() {
        let candidates = vec![worker(1, 1 << 30, 1.0), worker(2, 2 << 30, 2.0)];
        let winner = fit(
            Granted {
                mem: 2 << 30,
                cores: 2,
            },
            &candidates,
            false,
        );
        assert_eq!(winner.unwrap().id, 2);
    }

    #[test]
    fn no_fit_returns_none() {
        let candidates = vec![worker(1, 4 << 30, 1.0)];
        let winner = fit(
            Granted {
                mem: 2 << 30,
                cores: 1,
            },
            &candidates,
            false,
        );
        assert!(winner.is_none());
    }

    #[test]
    fn ignore_cpu_admits_candidates_the_cpu_bound_would_reject() {
        let candidates = vec![worker(1, 1 << 20, 8.0)];
        let winner = fit(
            Granted {
                mem: 1 << 20,
                cores: 0,
            },
            &candidates,
            true,
        );
        assert!(winner.is_some());

        let winner_strict = fit(
            Granted {
                mem: 1 << 20,
                cores: 0,
            },
            &candidates,
            false,
        );
        assert!(winner_strict.is_none());
    }

    #[test]
    fn incomparable_candidates_first_survivor_wins_on_tie() {
        // high-mem-low-core vs low-mem-high-core: neither dominates the
        // other once both already fit, so the first one iterated is kept.
        let high_mem = worker(1, 4 << 30, 1.0);
        let high_core = worker(2, 1 << 30, 4.0);
        let candidates = vec![high_mem.clone(), high_core.clone()];
        let winner = fit(
            Granted {
                mem: 4 << 30,
                cores: 4,
            },
            &candidates,
            false,
        );
        assert_eq!(winner.unwrap().id, 1);

        let candidates_reversed = vec![high_core, high_mem];
        let winner_reversed = fit(
            Granted {
                mem: 4 << 30,
                cores: 4,
            },
            &candidates_reversed,
            false,
        );
        assert_eq!(winner_reversed.unwrap().id, 2);
    }
}
