//! # Finality Flow
//!
//! Bootstrap finalization without finalizers, then a single finalizer
//! taking over: deposit, dynasty start, votes, justification and
//! finalization, and the stall when it stops voting.

#[cfg(test)]
mod tests {
    use crate::fixtures::{deposit_tx, network_with_finalizer, vote_tx, Finalizer, Network, DEPOSIT};
    use ffg_finalization::adapters::{MemoryCoinView, MemoryMempool, VoteSigner};
    use ffg_finalization::ports::ChainView;
    use ffg_finalization::{CommitError, CommitPayload, FinalizationApi, ProcessorError, Vote};
    use shared_types::TxType;

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    #[test]
    fn test_empty_chain_finalizes_by_itself() {
        let network = Network::permissionless();

        network.mine_until(1);
        let state = network.tip_state();
        assert!(state.is_justified_checkpoint(0));
        assert!(!state.is_finalized_checkpoint(0));

        network.mine_until(6);
        let state = network.tip_state();
        assert!(state.is_finalized_checkpoint(0));
        assert!(state.is_justified_checkpoint(5));
        assert_eq!(state.last_finalized_epoch(), 0);
        assert_eq!(state.last_justified_epoch(), 1);

        network.mine_until(16);
        let state = network.tip_state();
        assert_eq!(state.current_epoch(), 4);
        assert_eq!(state.last_finalized_epoch(), 2);
        assert_eq!(state.current_dynasty(), 2);
    }

    #[test]
    fn test_deposit_enters_validator_set_two_dynasties_later() {
        let (network, finalizer) = network_with_finalizer(1);
        let state = network.tip_state();

        let validator = state.validator(&finalizer.address()).unwrap();
        assert_eq!(validator.start_dynasty, 2);
        assert_eq!(validator.deposit, DEPOSIT);
        assert_eq!(state.current_dynasty(), 2);
        assert_eq!(state.cur_dyn_deposits(), DEPOSIT);
        assert_eq!(state.active_finalizers().len(), 1);
        assert_eq!(state.last_tx_hash(&finalizer.address()), Some(finalizer.deposit().hash()));
    }

    // =========================================================================
    // VOTING
    // =========================================================================

    #[test]
    fn test_single_finalizer_justifies_and_finalizes() {
        let (network, mut finalizer) = network_with_finalizer(1);
        let checkpoint = network.chain.ancestor(network.tip().handle, 20).unwrap();

        let vote = network.service.recommended_vote(&finalizer.address()).unwrap();
        assert_eq!(vote, Vote::new(finalizer.address(), checkpoint.hash, 3, 4));

        let tx = finalizer.vote(vote);
        let index = network.mine(vec![tx.clone()]).unwrap();
        let state = network.service.state(index.handle).unwrap();
        assert_eq!(state.last_justified_epoch(), 4);
        assert_eq!(state.last_finalized_epoch(), 4);
        assert!(state.is_finalized_checkpoint(20));
        assert_eq!(state.last_tx_hash(&finalizer.address()), Some(tx.hash()));
    }

    #[test]
    fn test_repeated_vote_is_rejected() {
        let (network, mut finalizer) = network_with_finalizer(1);
        let vote = network.service.recommended_vote(&finalizer.address()).unwrap();
        network.mine(vec![finalizer.vote(vote)]).unwrap();

        let err = network.try_mine(vec![finalizer.vote(vote)]).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Commit {
                source: CommitError::InvalidState {
                    kind: TxType::Vote,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn test_mined_vote_must_spend_the_latest_commit() {
        let (network, mut finalizer) = network_with_finalizer(1);
        let vote = network.service.recommended_vote(&finalizer.address()).unwrap();

        // Same key and a valid signature, but chained to a coin the
        // finalizer never committed with
        let unrelated = deposit_tx(&finalizer.signer, DEPOSIT, 0x77);
        let detached = vote_tx(&finalizer.signer, &unrelated, vote);
        assert!(matches!(
            network.try_mine(vec![detached]),
            Err(ProcessorError::Commit {
                source: CommitError::PrevTxNotFound { kind: TxType::Vote },
                ..
            })
        ));

        network.mine(vec![finalizer.vote(vote)]).unwrap();
        assert_eq!(network.tip_state().last_finalized_epoch(), 4);
    }

    #[test]
    fn test_voting_every_epoch_earns_rewards() {
        let (network, mut finalizer) = network_with_finalizer(1);

        for _ in 0..3 {
            let tx = finalizer.recommended_vote(&network).unwrap();
            network.mine(vec![tx]).unwrap();
            network.mine_until(network.next_epoch_start());
        }

        let state = network.tip_state();
        assert_eq!(state.current_epoch(), 8);
        assert_eq!(state.last_finalized_epoch(), 6);
        assert_eq!(state.current_dynasty(), 5);
        assert!(state.validator(&finalizer.address()).unwrap().deposit > DEPOSIT);
        assert!(!state.reward_factor().is_zero());
    }

    #[test]
    fn test_finalization_stalls_then_resumes() {
        let (network, mut finalizer) = network_with_finalizer(1);

        // No votes in epochs 5 and 6
        network.mine_until(31);
        let state = network.tip_state();
        assert_eq!(state.current_epoch(), 7);
        assert_eq!(state.last_justified_epoch(), 3);
        assert_eq!(state.last_finalized_epoch(), 2);
        assert_eq!(state.current_dynasty(), 2);

        // A long link from the last justified checkpoint only justifies
        let vote = network.service.recommended_vote(&finalizer.address()).unwrap();
        assert_eq!((vote.source_epoch, vote.target_epoch), (3, 6));
        network.mine(vec![finalizer.vote(vote)]).unwrap();
        let state = network.tip_state();
        assert_eq!(state.last_justified_epoch(), 6);
        assert_eq!(state.last_finalized_epoch(), 2);

        network.mine_until(36);
        let vote = network.service.recommended_vote(&finalizer.address()).unwrap();
        assert_eq!((vote.source_epoch, vote.target_epoch), (6, 7));
        network.mine(vec![finalizer.vote(vote)]).unwrap();
        assert_eq!(network.tip_state().last_finalized_epoch(), 7);
    }

    #[test]
    fn test_two_thirds_of_deposits_needed() {
        let network = Network::permissionless();
        let mut rng = rand::thread_rng();
        let mut finalizers: Vec<Finalizer> = (0..3)
            .map(|n| Finalizer::from_signer(VoteSigner::generate(&mut rng), 0x10 + n))
            .collect();
        network.mine_until(1);
        network
            .mine(finalizers.iter().map(Finalizer::deposit).collect())
            .unwrap();
        network.mine_until(21);
        assert_eq!(network.tip_state().cur_dyn_deposits(), 3 * DEPOSIT);

        let first = finalizers[0].recommended_vote(&network).unwrap();
        network.mine(vec![first]).unwrap();
        assert_eq!(network.tip_state().last_justified_epoch(), 3);

        // Second vote reaches exactly two thirds
        let second = finalizers[1].recommended_vote(&network).unwrap();
        network.mine(vec![second]).unwrap();
        let state = network.tip_state();
        assert_eq!(state.last_justified_epoch(), 4);
        assert_eq!(state.last_finalized_epoch(), 4);
        assert_eq!(state.checkpoint(4).unwrap().voter_count(), 2);
    }

    // =========================================================================
    // RELAY CHECKS
    // =========================================================================

    #[test]
    fn test_relayed_vote_is_checked_against_its_predecessor() {
        let (network, mut finalizer) = network_with_finalizer(1);
        let vote = network.service.recommended_vote(&finalizer.address()).unwrap();
        let tx = finalizer.vote(vote);

        let mempool = MemoryMempool::new();
        let coins = MemoryCoinView::new();
        assert_eq!(
            network.service.check_commit(&tx, &mempool, &coins),
            Err(ProcessorError::Commit {
                txid: hex::encode(tx.hash()),
                source: CommitError::PrevTxNotFound { kind: TxType::Vote },
            })
        );

        coins.add_transaction(&finalizer.deposit(), 2);
        let payload = network.service.check_commit(&tx, &mempool, &coins).unwrap();
        assert!(matches!(payload, CommitPayload::Vote { record, .. } if record.vote == vote));
    }

    #[test]
    fn test_relayed_vote_must_keep_the_commitment_key() {
        let (network, finalizer) = network_with_finalizer(1);
        let mut other = Finalizer::new(2);
        let vote = Vote::new(other.address(), [0; 32], 3, 4);
        other.last_commit = finalizer.deposit();
        let tx = other.vote(vote);

        let mempool = MemoryMempool::new();
        mempool.insert(finalizer.deposit());
        let err = network
            .service
            .check_commit(&tx, &mempool, &MemoryCoinView::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Commit {
                source: CommitError::PrevScriptMismatch { kind: TxType::Vote },
                ..
            }
        ));
    }
}
