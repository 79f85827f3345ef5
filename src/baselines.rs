//! Packed baseline ordering and array topology.
//!
//! The correlator X engine emits baseline data in a fixed order that every
//! consumer must reproduce exactly: the index into [`baseline_order`] is the
//! baseline axis index used throughout the visibility arrays.

use lazy_static::lazy_static;

lazy_static! {
    /// The cached baseline ordering for the standard 16-antenna correlator.
    pub static ref BL_ORDER_16: Vec<(usize, usize)> = baseline_order(16);
}

/// Return the order of baseline data output by a CASPER correlator X engine.
///
/// For each antenna `i`, offsets `j` count down from `num_ants / 2` to zero
/// and `k = (i - j) mod num_ants`; pairs with `i >= k` are collected ahead of
/// the remainder, and duplicates are removed from the remainder. For 16
/// antennas this yields exactly 136 distinct pairs covering every auto- and
/// cross-baseline.
pub fn baseline_order(num_ants: usize) -> Vec<(usize, usize)> {
    let mut order1: Vec<(usize, usize)> = vec![];
    let mut order2: Vec<(usize, usize)> = vec![];
    for i in 0..num_ants {
        for j in (0..=num_ants / 2).rev() {
            let k = (i + num_ants - j) % num_ants;
            if i >= k {
                order1.push((k, i));
            } else {
                order2.push((i, k));
            }
        }
    }
    order2.retain(|pair| !order1.contains(pair));
    order1.extend(order2);
    order1
}

/// The fixed antenna and baseline layout the correctors operate over.
///
/// The default configuration describes the deployed 16-antenna array: 15
/// physical antennas with attenuator records, 13 on azimuth-elevation mounts
/// and 5 on equatorial mounts, plus non-physical correlator slots used for
/// reference and test channels. Injecting a different topology lets the same
/// correction algebra serve other array generations.
#[derive(Debug, Clone)]
pub struct ArrayTopology {
    /// Number of antenna slots in the correlator, including non-physical
    /// reference/test slots.
    pub num_ants: usize,
    /// Number of physical antennas with attenuator gain records. Baselines
    /// involving higher slots keep a neutral gain factor.
    pub num_gain_ants: usize,
    /// Number of antennas subject to delay-phase and feed-rotation
    /// corrections. Higher slots are exempt.
    pub num_pol_ants: usize,
    /// Antennas on equatorial mounts, which do not track alt-az rotation.
    pub equatorial_ants: Vec<usize>,
    /// Reference antenna for the equatorial-mount parallactic angle
    /// correction.
    pub ref_ant: usize,
    /// Number of attenuator bands (two bands per GHz).
    pub num_bands: usize,
    /// Number of frequency slots per antenna in the packed power arrays.
    pub power_slots: usize,
    /// Number of power moments per slot: power, power squared, and a third
    /// moment that calibration leaves untouched.
    pub num_moments: usize,
    baselines: Vec<(usize, usize)>,
}

impl ArrayTopology {
    /// Construct a topology for `num_ants` antenna slots, computing its
    /// baseline ordering once.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_ants: usize,
        num_gain_ants: usize,
        num_pol_ants: usize,
        equatorial_ants: Vec<usize>,
        ref_ant: usize,
        num_bands: usize,
        power_slots: usize,
        num_moments: usize,
    ) -> Self {
        let baselines = if num_ants == 16 {
            BL_ORDER_16.clone()
        } else {
            baseline_order(num_ants)
        };
        Self {
            num_ants,
            num_gain_ants,
            num_pol_ants,
            equatorial_ants,
            ref_ant,
            num_bands,
            power_slots,
            num_moments,
            baselines,
        }
    }

    /// The ordered antenna-index pairs for every packed baseline.
    pub fn baselines(&self) -> &[(usize, usize)] {
        &self.baselines
    }

    /// The length of the baseline axis (136 for 16 antennas).
    pub fn num_baselines(&self) -> usize {
        self.baselines.len()
    }
}

impl Default for ArrayTopology {
    fn default() -> Self {
        Self::new(16, 15, 14, vec![8, 9, 10, 12, 13], 13, 34, 134, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::{baseline_order, ArrayTopology, BL_ORDER_16};
    use std::collections::HashSet;

    #[test]
    fn test_baseline_order_16_has_136_distinct_pairs() {
        let order = baseline_order(16);
        assert_eq!(order.len(), 136);
        let distinct: HashSet<_> = order.iter().copied().collect();
        assert_eq!(distinct.len(), 136);
    }

    #[test]
    fn test_baseline_order_16_covers_all_pairs() {
        let order = baseline_order(16);
        for i in 0..16 {
            for j in i..16 {
                assert!(
                    order.contains(&(i, j)) || order.contains(&(j, i)),
                    "pair ({i}, {j}) missing"
                );
            }
        }
    }

    #[test]
    fn test_baseline_order_16_prefix_matches_correlator() {
        let order = baseline_order(16);
        assert_eq!(
            &order[..6],
            &[(0, 0), (0, 1), (1, 1), (0, 2), (1, 2), (2, 2)]
        );
    }

    #[test]
    fn test_baseline_order_is_deterministic() {
        assert_eq!(baseline_order(16), baseline_order(16));
        assert_eq!(baseline_order(16), *BL_ORDER_16);
    }

    #[test]
    fn test_default_topology() {
        let topo = ArrayTopology::default();
        assert_eq!(topo.num_baselines(), 136);
        assert_eq!(topo.baselines(), &BL_ORDER_16[..]);
        assert_eq!(topo.num_ants, 16);
        assert_eq!(topo.ref_ant, 13);
    }
}
