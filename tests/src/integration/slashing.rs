//! # Slashing
//!
//! Conflicting signed votes are turned into slash commits by the
//! [`VoteRecorder`](ffg_finalization::VoteRecorder) and then judged by the
//! chain: relay checks verify both signatures against the finalizer's
//! commitment key, block processing burns the deposit.

#[cfg(test)]
mod tests {
    use crate::fixtures::{network_with_finalizer, signer, Finalizer, Network};
    use ffg_finalization::adapters::{MemoryCoinView, MemoryMempool};
    use ffg_finalization::{
        CommitError, CommitPayload, FinalizationApi, FinalizationError, ProcessorError,
        SlashingCondition, SlashingEvidence, Vote, VoteRecord, VoteRecorder,
    };
    use shared_types::{OutPoint, Script, Transaction, TxOut, TxType};

    fn slash(evidence: &SlashingEvidence) -> Transaction {
        evidence.to_transaction(
            OutPoint::new([0x51; 32], 0),
            TxOut::new(0, Script::pay_to_pubkey_hash(&[0x52; 20])),
        )
    }

    /// The finalizer's honest vote is mined at height 22; returns the
    /// evidence of a second vote for another epoch 4 target.
    fn double_vote() -> (Network, Finalizer, Transaction, SlashingEvidence) {
        let (network, mut finalizer) = network_with_finalizer(1);
        let honest = network.service.recommended_vote(&finalizer.address()).unwrap();
        let vote_tx = finalizer.vote(honest);
        network.mine(vec![vote_tx.clone()]).unwrap();

        let mut recorder = VoteRecorder::new();
        assert!(recorder.record(finalizer.signer.sign_vote(honest)).is_none());
        let conflicting = Vote {
            target_hash: [0xee; 32],
            ..honest
        };
        let evidence = recorder
            .record(finalizer.signer.sign_vote(conflicting))
            .unwrap();
        (network, finalizer, vote_tx, evidence)
    }

    #[test]
    fn test_double_vote_detected() {
        let (_network, finalizer, _vote_tx, evidence) = double_vote();
        assert_eq!(evidence.condition, SlashingCondition::DoubleVote);
        assert_eq!(evidence.validator(), finalizer.address());
    }

    #[test]
    fn test_relayed_slash_needs_the_validator_key() {
        let (network, _finalizer, vote_tx, evidence) = double_vote();
        let tx = slash(&evidence);
        let mempool = MemoryMempool::new();
        let coins = MemoryCoinView::new();

        let err = network.service.check_commit(&tx, &mempool, &coins).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Commit {
                source: CommitError::PrevTxNotFound { kind: TxType::Slash },
                ..
            }
        ));

        coins.add_transaction(&vote_tx, 22);
        let payload = network.service.check_commit(&tx, &mempool, &coins).unwrap();
        assert!(matches!(payload, CommitPayload::Slash { .. }));
    }

    #[test]
    fn test_relayed_slash_with_forged_vote_rejected() {
        let (network, _finalizer, vote_tx, evidence) = double_vote();
        // Second vote signed by someone else
        let forged = SlashingEvidence {
            second: signer(9).sign_vote(evidence.second.vote),
            ..evidence
        };
        let mempool = MemoryMempool::new();
        mempool.insert(vote_tx);

        let err = network
            .service
            .check_commit(&slash(&forged), &mempool, &MemoryCoinView::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Commit {
                source: CommitError::InvalidVoteSignature,
                ..
            }
        ));
    }

    #[test]
    fn test_mined_slash_with_forged_signatures_rejected() {
        let (network, finalizer, _vote_tx, evidence) = double_vote();
        let forged = SlashingEvidence {
            condition: evidence.condition,
            first: VoteRecord::new(evidence.first.vote, vec![0x30; 8]),
            second: signer(9).sign_vote(evidence.second.vote),
        };
        let tx = forged.to_transaction(
            OutPoint::new([0x99; 32], 7),
            TxOut::new(0, Script::pay_to_pubkey_hash(&[0x52; 20])),
        );

        assert!(matches!(
            network.try_mine(vec![tx]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidVoteSignature,
                ..
            })
        ));
        assert!(!network.tip_state().validator(&finalizer.address()).unwrap().is_slashed);

        // The genuine evidence still goes through
        network.mine(vec![slash(&evidence)]).unwrap();
        assert!(network.tip_state().validator(&finalizer.address()).unwrap().is_slashed);
    }

    #[test]
    fn test_slash_burns_deposit_and_ends_dynasty() {
        let (network, finalizer, _vote_tx, evidence) = double_vote();
        let before = network.tip_state();
        let deposit_size = before.deposit_size(&finalizer.address());
        let epoch = before.current_epoch();

        network.mine(vec![slash(&evidence)]).unwrap();
        let state = network.tip_state();
        let validator = state.validator(&finalizer.address()).unwrap();
        assert!(validator.is_slashed);
        assert_eq!(validator.end_dynasty, state.current_dynasty() + 1);
        assert_eq!(validator.deposits_at_logout, before.cur_dyn_deposits());
        assert_eq!(
            state.total_slashed_at(epoch),
            Some(before.total_slashed_at(epoch).unwrap() + deposit_size)
        );
    }

    #[test]
    fn test_slash_twice_rejected() {
        let (network, _finalizer, _vote_tx, evidence) = double_vote();
        network.mine(vec![slash(&evidence)]).unwrap();

        assert!(matches!(
            network.try_mine(vec![slash(&evidence)]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidState {
                    kind: TxType::Slash,
                    source: FinalizationError::SlashAlreadySlashed,
                },
                ..
            })
        ));
    }

    #[test]
    fn test_surround_vote_slashed() {
        let (network, mut finalizer) = network_with_finalizer(1);
        let honest = network.service.recommended_vote(&finalizer.address()).unwrap();
        network.mine(vec![finalizer.vote(honest)]).unwrap();

        let mut recorder = VoteRecorder::new();
        recorder.record(finalizer.signer.sign_vote(honest));
        let surrounding = Vote::new(finalizer.address(), [0x77; 32], 2, 5);
        let evidence = recorder
            .record(finalizer.signer.sign_vote(surrounding))
            .unwrap();
        assert_eq!(evidence.condition, SlashingCondition::SurroundVote);

        network.mine(vec![slash(&evidence)]).unwrap();
        assert!(network.tip_state().validator(&finalizer.address()).unwrap().is_slashed);
    }

    #[test]
    fn test_same_vote_twice_is_not_evidence() {
        let (network, finalizer) = network_with_finalizer(1);
        let vote = network.service.recommended_vote(&finalizer.address()).unwrap();
        let mut recorder = VoteRecorder::new();
        recorder.record(finalizer.signer.sign_vote(vote));
        assert!(recorder.record(finalizer.signer.sign_vote(vote)).is_none());

        // Hand-built pair of identical votes
        let record = finalizer.signer.sign_vote(vote);
        let evidence = SlashingEvidence {
            condition: SlashingCondition::DoubleVote,
            first: record.clone(),
            second: record,
        };
        assert!(matches!(
            network.try_mine(vec![slash(&evidence)]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidState {
                    source: FinalizationError::SlashSameVote,
                    ..
                },
                ..
            })
        ));
    }
}
