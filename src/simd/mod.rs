// SIMD mask kernels (component D).
//
// Everything here operates on a single 64-byte block. `eq_mask` is the only
// primitive whose implementation actually varies by ISA (it's the one that
// benefits from wide compares); `quote_mask`/`escape_mask`/`line_ending_mask`
// /`write_bits` are width-independent bit arithmetic once the per-byte
// equality masks exist, so they live in `mask.rs` and are shared by every
// backend.
//
// Dispatch is a small vtable of function pointers selected once per process
// (spec.md §9), unless `VROOM_DISABLE_SIMD` forces the portable path.

mod mask;
mod scalar;
#[cfg(target_arch = "x86_64")]
mod x86;

pub use mask::{escape_mask, line_ending_mask, prefix_xor, quote_mask, write_bits};

use std::sync::OnceLock;

pub type EqMaskFn = fn(&[u8; 64], u8) -> u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Avx2,
    Sse2,
    Neon,
    Portable,
}

#[derive(Clone, Copy)]
pub struct Dispatch {
    pub backend: Backend,
    pub eq_mask: EqMaskFn,
}

fn detect() -> Dispatch {
    if std::env::var_os("VROOM_DISABLE_SIMD").is_some() {
        return Dispatch {
            backend: Backend::Portable,
            eq_mask: scalar::eq_mask,
        };
    }

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return Dispatch {
                backend: Backend::Avx2,
                eq_mask: x86::eq_mask_avx2,
            };
        }
        return Dispatch {
            backend: Backend::Sse2,
            eq_mask: x86::eq_mask_sse2,
        };
    }

    #[cfg(target_arch = "aarch64")]
    {
        return Dispatch {
            backend: Backend::Neon,
            eq_mask: scalar::eq_mask,
        };
    }

    #[allow(unreachable_code)]
    Dispatch {
        backend: Backend::Portable,
        eq_mask: scalar::eq_mask,
    }
}

static DISPATCH: OnceLock<Dispatch> = OnceLock::new();

/// The process-wide dispatch table, selected once at first use.
pub fn dispatch() -> Dispatch {
    *DISPATCH.get_or_init(detect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portable_and_dispatched_eq_mask_agree() {
        let mut block = [0u8; 64];
        block[3] = b',';
        block[40] = b',';
        let portable = scalar::eq_mask(&block, b',');
        let dispatched = (dispatch().eq_mask)(&block, b',');
        assert_eq!(portable, dispatched);
        assert_eq!(portable, (1u64 << 3) | (1u64 << 40));
    }
}
