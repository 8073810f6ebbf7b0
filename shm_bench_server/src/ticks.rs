//! Hardware cycle counter.
//!
//! The timing engine only needs a monotonic tick source whose value does not
//! wrap within one trial; elapsed ticks are computed as `stop - start`.

/// Monotonic tick source sampled around every trial.
pub trait TickSource: Clone + Send + 'static {
    /// Current counter value.
    fn now(&self) -> u64;
}

/// The CPU cycle counter (`rdtsc` on x86_64, `cntvct_el0` on aarch64).
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleCounter;

impl TickSource for CycleCounter {
    #[inline(always)]
    fn now(&self) -> u64 {
        read_cycle_counter()
    }
}

/// Read the time stamp counter.
///
/// Not serializing: callers fence around the measured region.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn read_cycle_counter() -> u64 {
    // SAFETY: RDTSC is available on all x86_64 processors and has no side effects.
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// Read the virtual counter register.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn read_cycle_counter() -> u64 {
    let ticks: u64;
    // SAFETY: CNTVCT_EL0 is readable from EL0 on every aarch64 Linux system.
    unsafe {
        core::arch::asm!(
            "mrs {}, cntvct_el0",
            out(reg) ticks,
            options(nomem, nostack, preserves_flags),
        );
    }
    ticks
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("shm_bench_server needs a hardware cycle counter (x86_64 or aarch64)");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_counter_advances() {
        let counter = CycleCounter;
        let start = counter.now();
        let mut acc = 0u64;
        for i in 0..10_000u64 {
            acc = std::hint::black_box(acc.wrapping_add(i));
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert_ne!(counter.now(), start, "{acc}");
    }
}
