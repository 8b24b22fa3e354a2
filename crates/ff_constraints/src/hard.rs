//! Hard constraints (C3): per-(i,j) decomposition-context admissibility, plus
//! per-position, per-context admissibility of leaving a nucleotide unpaired.

use std::collections::HashMap;
use std::rc::Rc;

/// Decomposition context bits. A plain `u8` bitmask, matching the donor
/// workspace's preference for small copyable PODs over an external bitflags
/// crate (no `bitflags` dependency appears anywhere in the donor workspace).
pub const CTX_EXT: u8 = 1 << 0;
pub const CTX_HP: u8 = 1 << 1;
pub const CTX_INT_CLOSE: u8 = 1 << 2;
pub const CTX_INT_ENC: u8 = 1 << 3;
pub const CTX_ML_CLOSE: u8 = 1 << 4;
pub const CTX_ML_BRANCH: u8 = 1 << 5;
pub const CTX_ALL: u8 = CTX_EXT | CTX_HP | CTX_INT_CLOSE | CTX_INT_ENC | CTX_ML_CLOSE | CTX_ML_BRANCH;

/// Which of the four "unpaired run" contexts a position's admissibility is
/// tracked under; hairpin- and interior-enclosed loops share exterior-style
/// unpaired bookkeeping in this model (spec.md only distinguishes four).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpairedContext {
    Exterior = 0,
    Hairpin = 1,
    Interior = 2,
    Multibranch = 3,
}
pub const UNPAIRED_CONTEXTS: usize = 4;

pub type DecompositionCallback = Rc<dyn Fn(usize, usize, Option<(usize, usize)>, u8) -> bool>;

#[derive(Clone)]
pub struct HardConstraints {
    n: usize,
    /// Sparse overrides of the default `CTX_ALL` admissibility mask for a pair.
    pair_mask: HashMap<(usize, usize), u8>,
    /// Per-position, per-context: may this position be left unpaired?
    unpaired_ok: [Vec<bool>; UNPAIRED_CONTEXTS],
    callback: Option<DecompositionCallback>,
}

impl HardConstraints {
    pub fn new(n: usize) -> Self {
        HardConstraints {
            n,
            pair_mask: HashMap::new(),
            unpaired_ok: std::array::from_fn(|_| vec![true; n]),
            callback: None,
        }
    }

    /// Number of nucleotides these constraints were built for.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn set_callback(&mut self, f: DecompositionCallback) {
        self.callback = Some(f);
    }

    pub fn forbid_pair(&mut self, i: usize, j: usize) {
        self.pair_mask.insert((i, j), 0);
    }

    pub fn restrict_pair(&mut self, i: usize, j: usize, ctx: u8) {
        self.pair_mask.insert((i, j), ctx);
    }

    pub fn forbid_unpaired(&mut self, i: usize, ctx: UnpairedContext) {
        self.unpaired_ok[ctx as usize][i] = false;
    }

    /// Forbid position `i` from being unpaired in *any* context (a forced pair).
    pub fn force_paired(&mut self, i: usize) {
        for ctx in 0..UNPAIRED_CONTEXTS {
            self.unpaired_ok[ctx][i] = false;
        }
    }

    /// Mask of contexts admissible for the pair `(i,j)` (before the optional
    /// user callback is consulted).
    pub fn pair_mask(&self, i: usize, j: usize) -> u8 {
        *self.pair_mask.get(&(i, j)).unwrap_or(&CTX_ALL)
    }

    /// Is the decomposition event (closing pair `(i,j)`, enclosed pair or
    /// branch point `inner`, in context `ctx`) admissible?
    pub fn admits(&self, i: usize, j: usize, inner: Option<(usize, usize)>, ctx: u8) -> bool {
        if self.pair_mask(i, j) & ctx == 0 {
            return false;
        }
        match &self.callback {
            Some(f) => f(i, j, inner, ctx),
            None => true,
        }
    }

    pub fn unpaired_ok(&self, i: usize, ctx: UnpairedContext) -> bool {
        self.unpaired_ok[ctx as usize][i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_admits_everything() {
        let hc = HardConstraints::new(10);
        assert!(hc.admits(0, 9, None, CTX_EXT));
        assert!(hc.unpaired_ok(0, UnpairedContext::Exterior));
    }

    #[test]
    fn test_forbid_pair() {
        let mut hc = HardConstraints::new(10);
        hc.forbid_pair(2, 7);
        assert!(!hc.admits(2, 7, None, CTX_HP));
        assert!(hc.admits(2, 6, None, CTX_HP));
    }

    #[test]
    fn test_forced_paired_forbids_every_context() {
        let mut hc = HardConstraints::new(10);
        hc.force_paired(4);
        assert!(!hc.unpaired_ok(4, UnpairedContext::Exterior));
        assert!(!hc.unpaired_ok(4, UnpairedContext::Hairpin));
        assert!(!hc.unpaired_ok(4, UnpairedContext::Interior));
        assert!(!hc.unpaired_ok(4, UnpairedContext::Multibranch));
        assert!(hc.unpaired_ok(3, UnpairedContext::Exterior));
        assert!(hc.unpaired_ok(5, UnpairedContext::Exterior));
    }

    #[test]
    fn test_callback_veto() {
        let mut hc = HardConstraints::new(10);
        hc.set_callback(Rc::new(|_i, j, _inner, _ctx| j < 5));
        assert!(hc.admits(0, 4, None, CTX_HP));
        assert!(!hc.admits(0, 6, None, CTX_HP));
    }
}
