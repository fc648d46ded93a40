use std::any::Any;

pub(crate) fn build_pool(workers: usize, name: &'static str) -> crate::Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(move |idx| format!("{name}-{idx}"))
        .build()
        .map_err(|e| crate::Error::other(format!("rayon pool: {e}")))
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Derives an independent RNG seed for one worker in one round.
pub(crate) fn worker_seed(base: u64, round: usize, worker: usize) -> u64 {
    base.wrapping_add((round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .rotate_left(17)
        ^ (worker as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}
