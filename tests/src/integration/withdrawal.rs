//! # Logout and Withdrawal
//!
//! A finalizer logs out, keeps voting while it is still in a validator
//! set, and withdraws once its end dynasty has started and the withdrawal
//! delay has passed. A slashed finalizer gets back only what is left after
//! the recently slashed fraction.

#[cfg(test)]
mod tests {
    use crate::fixtures::{network_with_finalizer, test_params, Finalizer, Network};
    use ffg_finalization::adapters::{MemoryCoinView, MemoryMempool};
    use ffg_finalization::{
        AdminParams, CommitError, FinalizationApi, FinalizationError, FinalizationParams,
        ProcessorError, Ufp64, Vote, VoteRecorder,
    };
    use shared_types::{Address, Amount, OutPoint, Script, TxOut, TxType};
    use tracing::info;

    /// Vote at height 22, log out at height 23.
    fn logged_out() -> (Network, Finalizer) {
        let (network, mut finalizer) = network_with_finalizer(1);
        let vote = finalizer.recommended_vote(&network).unwrap();
        network.mine(vec![vote]).unwrap();
        network.mine(vec![finalizer.logout()]).unwrap();
        (network, finalizer)
    }

    /// Mine blocks until `address` can withdraw, each of `voters` voting
    /// whenever the tip state accepts its vote.
    fn mine_until_withdrawable_by(network: &Network, address: &Address, voters: &mut [Finalizer]) {
        while network.height() < 150 {
            let state = network.tip_state();
            if state.calculate_withdraw_amount(address).is_ok() {
                return;
            }
            let mut transactions = Vec::new();
            for voter in voters.iter_mut() {
                let vote = state.recommended_vote(&voter.address());
                if state.validate_vote(&vote).is_ok() {
                    transactions.push(voter.vote(vote));
                }
            }
            network.mine(transactions).unwrap();
        }
        panic!("deposit never became withdrawable");
    }

    fn mine_until_withdrawable(network: &Network, finalizer: &mut Finalizer) {
        let address = finalizer.address();
        mine_until_withdrawable_by(network, &address, std::slice::from_mut(finalizer));
    }

    /// Four finalizers deposit at height 2 and vote at height 22. The first
    /// one then double votes and is slashed at height 23.
    ///
    /// Returns the honest three, the slashed one and its deposit size at
    /// the time of the slash.
    fn slashed_among_four(params: FinalizationParams) -> (Network, Vec<Finalizer>, Finalizer, Amount) {
        let network = Network::new(params, AdminParams::default());
        let mut finalizers: Vec<Finalizer> = (1..=4).map(Finalizer::new).collect();
        network.mine(vec![]).unwrap();
        network
            .mine(finalizers.iter().map(Finalizer::deposit).collect())
            .unwrap();
        network.mine_until(21);

        let state = network.tip_state();
        let honest = state.recommended_vote(&finalizers[0].address());
        let votes = finalizers
            .iter_mut()
            .map(|finalizer| {
                let vote = state.recommended_vote(&finalizer.address());
                finalizer.vote(vote)
            })
            .collect();
        network.mine(votes).unwrap();

        let culprit = finalizers.remove(0);
        let mut recorder = VoteRecorder::new();
        recorder.record(culprit.signer.sign_vote(honest));
        let evidence = recorder
            .record(culprit.signer.sign_vote(Vote {
                target_hash: [0xee; 32],
                ..honest
            }))
            .unwrap();
        let deposit_size = network.tip_state().deposit_size(&culprit.address());
        network
            .mine(vec![evidence.to_transaction(
                OutPoint::new([0x51; 32], 0),
                TxOut::new(0, Script::pay_to_pubkey_hash(&[0x52; 20])),
            )])
            .unwrap();
        assert!(network.tip_state().validator(&culprit.address()).unwrap().is_slashed);

        (network, finalizers, culprit, deposit_size)
    }

    /// The slashed window has to reach back past the slash epoch.
    fn slashing_params(slash_fraction_multiplier: u64) -> FinalizationParams {
        FinalizationParams {
            withdrawal_epoch_delay: 4,
            slash_fraction_multiplier,
            ..test_params()
        }
    }

    #[test]
    fn test_logout_sets_end_dynasty() {
        let (network, finalizer) = logged_out();
        let state = network.tip_state();
        let validator = state.validator(&finalizer.address()).unwrap();
        assert!(validator.has_logged_out());
        assert_eq!(validator.end_dynasty, state.current_dynasty() + 2);
        assert_eq!(validator.deposits_at_logout, state.cur_dyn_deposits());
    }

    #[test]
    fn test_logout_twice_rejected() {
        let (network, mut finalizer) = logged_out();
        assert!(matches!(
            network.try_mine(vec![finalizer.logout()]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidState {
                    kind: TxType::Logout,
                    source: FinalizationError::LogoutAlreadyDone,
                },
                ..
            })
        ));
    }

    #[test]
    fn test_early_withdraw_rejected() {
        let (network, finalizer) = logged_out();
        assert!(matches!(
            network.try_mine(vec![finalizer.withdraw(1)]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidState {
                    kind: TxType::Withdraw,
                    source: FinalizationError::WithdrawTooEarly,
                },
                ..
            })
        ));
    }

    #[test]
    fn test_relayed_withdraw_must_spend_logout_or_vote() {
        let (network, finalizer) = logged_out();
        // Spends the deposit directly
        let fresh = Finalizer::new(1);
        let tx = fresh.withdraw(1);

        let mempool = MemoryMempool::new();
        mempool.insert(fresh.deposit());
        assert!(matches!(
            network.service.check_commit(&tx, &mempool, &MemoryCoinView::new()),
            Err(ProcessorError::Commit {
                source: CommitError::PrevTxWrongType {
                    kind: TxType::Withdraw,
                    found: TxType::Deposit,
                },
                ..
            })
        ));
    }

    #[test]
    fn test_withdraw_after_delay() {
        let (network, mut finalizer) = logged_out();
        mine_until_withdrawable(&network, &mut finalizer);

        let state = network.tip_state();
        let validator = state.validator(&finalizer.address()).unwrap();
        let end_epoch = state.dynasty_start_epoch(validator.end_dynasty + 1).unwrap();
        let withdrawal_epoch = end_epoch + network.service.params().withdrawal_epoch_delay;
        assert!(state.current_epoch() >= withdrawal_epoch);

        let amount = state.calculate_withdraw_amount(&finalizer.address()).unwrap();
        info!(amount, epoch = state.current_epoch(), "Withdrawing");
        assert!(amount > 0);

        assert!(matches!(
            network.try_mine(vec![finalizer.withdraw(amount + 1)]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidState {
                    source: FinalizationError::WithdrawWrongAmount { .. },
                    ..
                },
                ..
            })
        ));

        network.mine(vec![finalizer.withdraw(amount)]).unwrap();
        assert!(network.tip_state().validator(&finalizer.address()).is_none());
    }

    #[test]
    fn test_withdraw_relayed_after_delay() {
        let (network, mut finalizer) = logged_out();
        mine_until_withdrawable(&network, &mut finalizer);
        let amount = network
            .tip_state()
            .calculate_withdraw_amount(&finalizer.address())
            .unwrap();

        let mempool = MemoryMempool::new();
        mempool.insert(finalizer.last_commit.clone());
        let tx = finalizer.withdraw(amount);
        assert!(network
            .service
            .check_commit(&tx, &mempool, &MemoryCoinView::new())
            .is_ok());
    }

    #[test]
    fn test_slashed_withdraw_keeps_unslashed_fraction() {
        let (network, mut honest, culprit, deposit_size) = slashed_among_four(slashing_params(3));
        let address = culprit.address();
        mine_until_withdrawable_by(&network, &address, &mut honest);

        let state = network.tip_state();
        let validator = state.validator(&address).unwrap();
        let delay = network.service.params().withdrawal_epoch_delay;
        let withdrawal_epoch = state.dynasty_start_epoch(validator.end_dynasty + 1).unwrap() + delay;
        let base_epoch = withdrawal_epoch.saturating_sub(2 * delay);
        let recently_slashed = state.total_slashed_at(withdrawal_epoch).unwrap()
            - state.total_slashed_at(base_epoch).unwrap();
        assert_eq!(recently_slashed, deposit_size);

        // Three quarters of the deposits were recently slashed, times three
        let fraction = Ufp64::from_ratio(3 * deposit_size, validator.deposits_at_logout);
        assert!(fraction < Ufp64::ONE);
        let scaled = state
            .deposit_scale_factor_at(withdrawal_epoch)
            .unwrap()
            .mul_to_uint(validator.deposit);
        let expected = Ufp64::ONE.sub(fraction).mul_to_uint(scaled);

        let amount = state.calculate_withdraw_amount(&address).unwrap();
        info!(amount, deposit_size, "Slashed withdraw");
        assert_eq!(amount, expected);
        assert!(amount > 0);
        assert!(amount < deposit_size / 2);

        assert!(matches!(
            network.try_mine(vec![culprit.withdraw(amount + 1)]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidState {
                    source: FinalizationError::WithdrawWrongAmount { .. },
                    ..
                },
                ..
            })
        ));
        network.mine(vec![culprit.withdraw(amount)]).unwrap();
        assert!(network.tip_state().validator(&address).is_none());
    }

    #[test]
    fn test_slashed_withdraw_clamps_to_nothing() {
        let (network, mut honest, culprit, deposit_size) = slashed_among_four(slashing_params(10));
        let address = culprit.address();
        mine_until_withdrawable_by(&network, &address, &mut honest);

        let state = network.tip_state();
        let validator = state.validator(&address).unwrap();
        assert!(Ufp64::from_ratio(10 * deposit_size, validator.deposits_at_logout) >= Ufp64::ONE);
        assert_eq!(state.calculate_withdraw_amount(&address), Ok(0));

        assert!(network.try_mine(vec![culprit.withdraw(1)]).is_err());
        network.mine(vec![culprit.withdraw(0)]).unwrap();
        assert!(network.tip_state().validator(&address).is_none());
    }
}
