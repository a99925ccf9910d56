#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{DMatrix, DVector};
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::error::VmcError;
    use crate::hamiltonian::{FlipSet, Hamiltonian, Heisenberg1d, Heisenberg2d, Ising1d, SquareLattice};
    use crate::sampling::{local_energy, MonteCarloSampler, Proposal, RunParams};
    use crate::wavefunction::{ln_cosh, ln_cosh_real, Rbm, SpinState, SpinWfn};

    fn random_spins(rng: &mut StdRng, n: usize) -> Vec<i8> {
        (0..n).map(|_| if rng.gen::<bool>() { 1 } else { -1 }).collect()
    }

    fn uniform_rbm(n_visible: usize, n_hidden: usize) -> Rbm {
        Rbm::new(
            DVector::zeros(n_visible),
            DVector::zeros(n_hidden),
            DMatrix::zeros(n_visible, n_hidden),
        )
        .unwrap()
    }

    fn assert_complex_eq(a: Complex64, b: Complex64, tol: f64) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = tol);
        assert_abs_diff_eq!(a.im, b.im, epsilon = tol);
    }

    #[test]
    fn test_ln_cosh_continuous_at_cutoff() {
        let below = 12.0_f64.cosh().ln();
        let above = 12.0 - std::f64::consts::LN_2;
        assert_abs_diff_eq!(below, above, epsilon = 1e-9);
        assert_abs_diff_eq!(ln_cosh_real(12.0 - 1e-9), ln_cosh_real(12.0 + 1e-9), epsilon = 1e-8);
        assert_eq!(ln_cosh_real(-3.0), ln_cosh_real(3.0));
    }

    #[test]
    fn test_ln_cosh_complex() {
        for &(x, y) in &[(0.7, 0.3), (-1.3, 2.5), (0.0, -1.0), (4.0, 0.05)] {
            let z = Complex64::new(x, y);
            assert_complex_eq(ln_cosh(z), z.cosh().ln(), 1e-12);
        }
        // cosh itself would overflow here
        let big = ln_cosh(Complex64::new(800.0, 0.2));
        assert!(big.re.is_finite() && big.im.is_finite());
        assert_relative_eq!(big.re, 800.0 - std::f64::consts::LN_2, epsilon = 1e-9);
        assert_abs_diff_eq!(big.im, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_random_rbm_is_reproducible() {
        let a = Rbm::random(5, 3, 0.1, &mut StdRng::seed_from_u64(13)).unwrap();
        let b = Rbm::random(5, 3, 0.1, &mut StdRng::seed_from_u64(13)).unwrap();
        assert_eq!(a.weights(), b.weights());
        assert_eq!(a.visible_bias(), b.visible_bias());
        assert_eq!((a.weights().nrows(), a.weights().ncols()), (5, 3));
        assert!(a.weights().iter().all(|w| w.re != 0.0 && w.im != 0.0));
        assert!(matches!(
            Rbm::random(5, 3, -1.0, &mut StdRng::seed_from_u64(13)),
            Err(VmcError::Configuration(_))
        ));
    }

    #[test]
    fn test_log_pop_empty_flips() {
        let mut rng = StdRng::seed_from_u64(1);
        let rbm = Rbm::random(6, 4, 0.1, &mut rng).unwrap();
        let spins = random_spins(&mut rng, 6);
        let lookup = rbm.init_lookup(&spins);
        assert_eq!(rbm.log_pop(&spins, &lookup, &[]), Complex64::new(0.0, 0.0));
        assert_eq!(rbm.pop(&spins, &lookup, &[]), Complex64::new(1.0, 0.0));
    }

    #[test]
    fn test_log_pop_matches_full_evaluation() {
        let mut rng = StdRng::seed_from_u64(2);
        let rbm = Rbm::random(10, 7, 0.1, &mut rng).unwrap();
        for _ in 0..20 {
            let spins = random_spins(&mut rng, 10);
            let lookup = rbm.init_lookup(&spins);
            let i = rng.gen_range(0..10);
            let j = (i + 1 + rng.gen_range(0..9)) % 10;
            for flips in [FlipSet::single(i), FlipSet::pair(i, j).unwrap()] {
                let fast = rbm.log_pop(&spins, &lookup, flips.as_slice());
                let exact = rbm.log_pop_exact(&spins, flips.as_slice());
                assert_complex_eq(fast, exact, 1e-10);
            }
        }
    }

    #[test]
    fn test_lookup_stays_consistent() {
        let mut rng = StdRng::seed_from_u64(3);
        let rbm = Rbm::random(8, 5, 0.2, &mut rng).unwrap();
        let spins = random_spins(&mut rng, 8);
        let mut state = SpinState::new(&rbm, spins).unwrap();
        for step in 0..500 {
            let i = rng.gen_range(0..8);
            if step % 2 == 0 {
                state.apply(FlipSet::single(i)).unwrap();
            } else {
                state.apply(FlipSet::pair(i, (i + 3) % 8).unwrap()).unwrap();
            }
        }
        state.verify_lookup(1e-10).unwrap();
        let fresh = rbm.init_lookup(state.spins());
        assert!(rbm.lookup_distance(&fresh, state.lookup()) < 1e-10);
        assert_complex_eq(
            state.log_pop(FlipSet::single(2)).unwrap(),
            rbm.log_pop_exact(state.spins(), &[2]),
            1e-10,
        );
    }

    /// Wavefunction whose look-up update is deliberately a no-op.
    struct StaleLookup(Rbm);

    impl SpinWfn for StaleLookup {
        type Lookup = DVector<Complex64>;

        fn n_spins(&self) -> usize {
            self.0.n_spins()
        }
        fn log_value(&self, spins: &[i8]) -> Complex64 {
            self.0.log_value(spins)
        }
        fn init_lookup(&self, spins: &[i8]) -> Self::Lookup {
            self.0.init_lookup(spins)
        }
        fn log_pop(&self, spins: &[i8], lookup: &Self::Lookup, flips: &[usize]) -> Complex64 {
            self.0.log_pop(spins, lookup, flips)
        }
        fn update_lookup(&self, _lookup: &mut Self::Lookup, _spins: &[i8], _flips: &[usize]) {}
        fn lookup_distance(&self, a: &Self::Lookup, b: &Self::Lookup) -> f64 {
            self.0.lookup_distance(a, b)
        }
    }

    #[test]
    fn test_stale_lookup_is_detected() {
        let mut rng = StdRng::seed_from_u64(4);
        let wfn = StaleLookup(Rbm::random(4, 3, 0.5, &mut rng).unwrap());
        let mut state = SpinState::new(&wfn, vec![1, 1, -1, -1]).unwrap();
        state.verify_lookup(1e-10).unwrap();
        state.apply(FlipSet::single(0)).unwrap();
        assert!(matches!(state.verify_lookup(1e-10), Err(VmcError::InvariantViolation(_))));
    }

    #[test]
    fn test_flip_pair_needs_distinct_sites() {
        assert_eq!(FlipSet::pair(1, 1), None);
        assert_eq!(FlipSet::pair(3, 1).unwrap().as_slice(), &[3, 1]);
    }

    #[test]
    fn test_out_of_range_flip_leaves_state_untouched() {
        let mut rng = StdRng::seed_from_u64(9);
        let rbm = Rbm::random(4, 3, 0.5, &mut rng).unwrap();
        let mut state = SpinState::new(&rbm, vec![1, -1, 1, -1]).unwrap();

        for flips in [FlipSet::single(4), FlipSet::pair(0, 7).unwrap()] {
            assert!(matches!(state.apply(flips), Err(VmcError::Precondition(_))));
            assert!(matches!(state.log_pop(flips), Err(VmcError::Precondition(_))));
        }
        assert_eq!(state.spins(), &[1, -1, 1, -1]);
        state.verify_lookup(1e-12).unwrap();

        state.apply(FlipSet::pair(1, 2).unwrap()).unwrap();
        assert_eq!(state.spins(), &[1, 1, -1, -1]);
        state.verify_lookup(1e-10).unwrap();
    }

    #[test]
    fn test_spin_state_rejects_bad_input() {
        let rbm = uniform_rbm(4, 2);
        assert!(matches!(SpinState::new(&rbm, vec![1, -1]), Err(VmcError::Load(_))));
        assert!(SpinState::new(&rbm, vec![1, -1, 0, 1]).is_err());
    }

    #[test]
    fn test_ising_matrix_elements() {
        let ising = Ising1d::new(4, 1.0, true);
        let elements = ising.enumerate(&[1, 1, 1, 1]);
        assert_eq!(elements.diagonal(), Complex64::new(-4.0, 0.0));
        assert!(elements.iter().next().unwrap().flips.is_empty());

        let off = elements.off_diagonal();
        assert_eq!(off.len(), 4);
        for (site, e) in off.iter().enumerate() {
            assert_eq!(e.value, Complex64::new(-1.0, 0.0));
            assert_eq!(e.flips.as_slice(), &[site]);
        }
        assert_eq!(ising.min_flips(), 1);
    }

    #[test]
    fn test_ising_open_chain() {
        let ising = Ising1d::new(4, 0.5, false);
        let elements = ising.enumerate(&[1, -1, -1, 1]);
        // bonds: -1, +1, -1 with the overall minus sign
        assert_eq!(elements.diagonal(), Complex64::new(1.0, 0.0));
        assert!(elements.off_diagonal().iter().all(|e| e.value.re == -0.5));
    }

    #[test]
    fn test_heisenberg1d_matrix_elements() {
        let heisenberg = Heisenberg1d::new(4, 1.0, true);
        let elements = heisenberg.enumerate(&[1, -1, 1, -1]);
        assert_eq!(elements.diagonal(), Complex64::new(-4.0, 0.0));

        let off = elements.off_diagonal();
        assert_eq!(off.len(), 4);
        let mut pairs: Vec<(usize, usize)> = off
            .iter()
            .map(|e| {
                assert_eq!(e.value, Complex64::new(-2.0, 0.0));
                let s = e.flips.as_slice();
                assert_eq!(s.len(), 2);
                assert_eq!((s[0] + 1) % 4, s[1]);
                (s[0], s[1])
            })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        assert_eq!(pairs.len(), 4);
        assert_eq!(heisenberg.min_flips(), 2);
    }

    #[test]
    fn test_heisenberg1d_exchange_ignores_jz() {
        let heisenberg = Heisenberg1d::new(4, 0.25, true);
        let elements = heisenberg.enumerate(&[1, 1, -1, -1]);
        // two aligned and two anti-aligned bonds
        assert_eq!(elements.diagonal(), Complex64::new(0.0, 0.0));
        assert_eq!(elements.off_diagonal().len(), 2);
        assert!(elements.off_diagonal().iter().all(|e| e.value.re == -2.0));

        let ferro = heisenberg.enumerate(&[1, 1, 1, 1]);
        assert_eq!(ferro.diagonal(), Complex64::new(1.0, 0.0));
        assert!(ferro.off_diagonal().is_empty());
    }

    #[test]
    fn test_square_lattice_bonds() {
        let periodic = SquareLattice::from_sites(16, true).unwrap();
        assert_eq!(periodic.length, 4);
        assert_eq!(periodic.bonds().len(), 32);
        let open = SquareLattice::from_sites(9, false).unwrap();
        assert_eq!(open.bonds().len(), 12);
        assert!(matches!(SquareLattice::from_sites(8, true), Err(VmcError::Configuration(_))));
    }

    #[test]
    fn test_heisenberg2d_neel_state() {
        let heisenberg = Heisenberg2d::new(16, 1.0, true).unwrap();
        let neel: Vec<i8> = (0..16)
            .map(|site| if (site / 4 + site % 4) % 2 == 0 { 1 } else { -1 })
            .collect();
        let elements = heisenberg.enumerate(&neel);
        assert_eq!(elements.diagonal(), Complex64::new(-32.0, 0.0));
        assert_eq!(elements.off_diagonal().len(), 32);
        assert_eq!(heisenberg.min_flips(), 2);
    }

    #[test]
    fn test_local_energy_matches_direct_sum() {
        let mut rng = StdRng::seed_from_u64(5);
        let rbm = Rbm::random(6, 6, 0.3, &mut rng).unwrap();
        let heisenberg = Heisenberg1d::new(6, 1.0, true);
        let spins: Vec<i8> = vec![1, -1, -1, 1, 1, -1];
        let state = SpinState::new(&rbm, spins.clone()).unwrap();

        let elements = heisenberg.enumerate(&spins);
        let fast = local_energy(&state, &elements).unwrap();
        let direct: Complex64 = elements
            .iter()
            .map(|e| e.value * rbm.log_pop_exact(&spins, e.flips.as_slice()).exp())
            .sum();
        assert_complex_eq(fast, direct, 1e-10);
    }

    #[test]
    fn test_zero_magnetization_on_odd_chain() {
        let rbm = uniform_rbm(5, 2);
        let ising = Ising1d::new(5, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &ising, Some(11)).unwrap();
        assert!(matches!(
            sampler.init_random_state(true),
            Err(VmcError::Precondition(_))
        ));
        sampler.init_random_state(false).unwrap();
        assert_eq!(sampler.state().unwrap().len(), 5);
    }

    #[test]
    fn test_zero_magnetization_initial_state() {
        let rbm = uniform_rbm(12, 2);
        let heisenberg = Heisenberg1d::new(12, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &heisenberg, Some(12)).unwrap();
        for _ in 0..20 {
            sampler.init_random_state(true).unwrap();
            assert_eq!(sampler.state().unwrap().magnetization(), 0);
        }
    }

    #[test]
    fn test_moves_need_a_state() {
        let rbm = uniform_rbm(4, 2);
        let ising = Ising1d::new(4, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &ising, Some(1)).unwrap();
        let proposal = Proposal { n_flips: 1, zero_magnetization: false };
        assert!(matches!(sampler.propose_and_move(proposal), Err(VmcError::Precondition(_))));

        sampler.init_random_state(false).unwrap();
        // a uniform wavefunction accepts every single flip
        assert!(sampler.propose_and_move(proposal).unwrap());
        assert_eq!(sampler.stats().attempted, 1);
        assert_eq!(sampler.stats().accepted, 1);

        let bad = Proposal { n_flips: 3, zero_magnetization: false };
        assert!(matches!(sampler.propose_and_move(bad), Err(VmcError::Configuration(_))));
    }

    fn changed_sites(before: &[i8], after: &[i8]) -> usize {
        before.iter().zip(after).filter(|(a, b)| a != b).count()
    }

    #[test]
    fn test_zero_magnetization_rejects_equal_spins() {
        // a uniform wavefunction accepts every allowed move, so a move is
        // accepted exactly when the two drawn spins are opposite
        let rbm = uniform_rbm(6, 2);
        let heisenberg = Heisenberg1d::new(6, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &heisenberg, Some(21)).unwrap();
        sampler.init_random_state(true).unwrap();
        let proposal = Proposal { n_flips: 2, zero_magnetization: true };

        let mut rejected = 0;
        for call in 1..=300u64 {
            let before = sampler.state().unwrap().spins().to_vec();
            let accepted = sampler.propose_and_move(proposal).unwrap();
            let after = sampler.state().unwrap().spins().to_vec();

            assert_eq!(sampler.stats().attempted, call);
            if accepted {
                assert_eq!(changed_sites(&before, &after), 2);
            } else {
                assert_eq!(before, after);
                rejected += 1;
            }
            assert_eq!(sampler.state().unwrap().magnetization(), 0);
        }
        assert_eq!(sampler.stats().accepted, 300 - rejected);
        assert!(rejected > 0);
        assert!(sampler.stats().accepted > 0);
        sampler.state().unwrap().verify_lookup(1e-10).unwrap();
    }

    #[test]
    fn test_two_flips_reject_same_site() {
        // without zero magnetization only a repeated site is refused
        let rbm = uniform_rbm(4, 2);
        let ising = Ising1d::new(4, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &ising, Some(22)).unwrap();
        sampler.init_random_state(false).unwrap();
        let proposal = Proposal { n_flips: 2, zero_magnetization: false };

        let mut rejected = 0;
        for _ in 0..200 {
            let before = sampler.state().unwrap().spins().to_vec();
            let accepted = sampler.propose_and_move(proposal).unwrap();
            let after = sampler.state().unwrap().spins().to_vec();
            if accepted {
                assert_eq!(changed_sites(&before, &after), 2);
            } else {
                assert_eq!(before, after);
                rejected += 1;
            }
        }
        assert_eq!(sampler.stats().attempted, 200);
        assert_eq!(sampler.stats().accepted, 200 - rejected);
        assert!(rejected > 0);
        sampler.state().unwrap().verify_lookup(1e-10).unwrap();
    }

    #[test]
    fn test_sampler_rejects_mismatched_sizes() {
        let rbm = uniform_rbm(4, 2);
        let ising = Ising1d::new(6, 1.0, true);
        assert!(matches!(
            MonteCarloSampler::new(&rbm, &ising, None),
            Err(VmcError::Load(_))
        ));
    }

    #[test]
    fn test_run_rejects_bad_params() {
        let rbm = uniform_rbm(4, 2);
        let ising = Ising1d::new(4, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &ising, Some(0)).unwrap();
        let base = RunParams::default().with_n_sweeps(100).with_n_blocks(10);

        for params in [
            base.with_n_sweeps(49),
            base.with_therm_factor(1.5),
            base.with_therm_factor(-0.1),
            base.with_n_flips(3),
            base.with_n_flips(0),
            base.with_n_blocks(1),
        ] {
            assert!(matches!(sampler.run(&params), Err(VmcError::Configuration(_))));
        }
        assert_eq!(sampler.stats().attempted, 0);
    }

    #[test]
    fn test_uniform_wavefunction_ising_run() {
        let rbm = uniform_rbm(4, 2);
        let ising = Ising1d::new(4, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &ising, Some(2024)).unwrap();
        let results = sampler.run(&RunParams::default().with_n_sweeps(2000)).unwrap();

        assert_eq!(results.acceptance, 1.0);
        assert_eq!(results.energies.len(), 2000);
        assert_eq!(results.report.n_blocks, 50);
        assert_eq!(results.report.block_size, 40);
        // uncorrelated spins: <s_i s_j> = 0, so E/N = -h
        assert_abs_diff_eq!(results.report.energy_per_site, -1.0, epsilon = 0.1);
        for e in &results.energies {
            assert_eq!(e.im, 0.0);
        }
    }

    #[test]
    fn test_heisenberg_run_keeps_magnetization() {
        let mut rng = StdRng::seed_from_u64(6);
        let rbm = Rbm::random(8, 8, 0.1, &mut rng).unwrap();
        let heisenberg = Heisenberg1d::new(8, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &heisenberg, Some(99)).unwrap();
        let results = sampler.run(&RunParams::default().with_n_sweeps(200)).unwrap();

        assert!((0.0..=1.0).contains(&results.acceptance));
        assert!((0.0..=1.0).contains(&sampler.acceptance()));
        assert!(sampler.stats().attempted > 0);
        assert_eq!(results.final_spins.iter().map(|&s| i32::from(s)).sum::<i32>(), 0);
        assert!(results.report.energy_per_site.is_finite());
        assert!(results.report.error.is_finite());
        assert!(results.report.autocorrelation_time >= 0.0);
        assert_eq!(results.seed, 99);
    }

    #[test]
    fn test_same_seed_same_chain() {
        let mut rng = StdRng::seed_from_u64(7);
        let rbm = Rbm::random(6, 4, 0.2, &mut rng).unwrap();
        let ising = Ising1d::new(6, 0.5, true);
        let params = RunParams::default().with_n_sweeps(100);

        let mut first = MonteCarloSampler::new(&rbm, &ising, Some(31)).unwrap();
        let mut second = MonteCarloSampler::new(&rbm, &ising, Some(31)).unwrap();
        let a = first.run(&params).unwrap();
        let b = second.run(&params).unwrap();
        assert_eq!(a.energies, b.energies);
        assert_eq!(a.final_spins, b.final_spins);

        // a second run of the same sampler starts the stream over
        let c = first.run(&params).unwrap();
        assert_eq!(a.energies, c.energies);
    }

    #[test]
    fn test_state_writer_gets_one_line_per_sweep() {
        let rbm = uniform_rbm(4, 2);
        let heisenberg = Heisenberg1d::new(4, 1.0, true);
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut sampler = MonteCarloSampler::new(&rbm, &heisenberg, Some(5)).unwrap();
            sampler.set_state_writer(Box::new(&mut buf));
            sampler.run(&RunParams::default().with_n_sweeps(60)).unwrap();
        }

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 60);
        for line in lines {
            let spins: Vec<i32> = line.split_whitespace().map(|t| t.parse().unwrap()).collect();
            assert_eq!(spins.len(), 4);
            assert!(spins.iter().all(|&s| s == 1 || s == -1));
            assert_eq!(spins.iter().sum::<i32>(), 0);
        }
    }

    #[test]
    fn test_report_display() {
        let rbm = uniform_rbm(4, 2);
        let ising = Ising1d::new(4, 1.0, true);
        let mut sampler = MonteCarloSampler::new(&rbm, &ising, Some(8)).unwrap();
        let results = sampler.run(&RunParams::default().with_n_sweeps(500)).unwrap();
        let text = results.report.to_string();
        assert!(text.contains("Estimated average energy per spin"));
        assert!(text.contains("consisting of 50 bins"));
        assert!(text.contains("Block size is 10"));
    }
}
