//! # State Repository
//!
//! Per-block state tracking across the two derivation paths (commits
//! first, full block second), forks, trimming below finality and replay
//! after a restart.

#[cfg(test)]
mod tests {
    use crate::fixtures::{Finalizer, Network};
    use ffg_finalization::{FinalizationApi, InitStatus, ProcessorError, TipOutcome};
    use ffg_finalization::ports::ChainView;

    #[test]
    fn test_commits_then_block_confirms() {
        let network = Network::permissionless();
        let finalizer = Finalizer::new(1);
        let block = network.block_on(&network.tip(), vec![finalizer.deposit()], 0);
        let index = network.chain.extend_tip(block.clone()).unwrap();

        network
            .service
            .process_new_commits(index.handle, &block.transactions)
            .unwrap();
        // Idempotent
        network
            .service
            .process_new_commits(index.handle, &block.transactions)
            .unwrap();
        let state = network.service.state(index.handle).unwrap();
        assert_eq!(state.status(), InitStatus::FromCommits);
        assert!(state.validator(&finalizer.address()).is_some());

        assert_eq!(
            network.service.process_new_tip(index.handle, &block),
            Ok(TipOutcome::Confirmed)
        );
        assert_eq!(
            network.service.state(index.handle).unwrap().status(),
            InitStatus::Completed
        );
    }

    #[test]
    fn test_block_contradicting_commits_replaces_state() {
        let network = Network::permissionless();
        let finalizer = Finalizer::new(1);
        let block = network.block_on(&network.tip(), vec![], 0);
        let index = network.chain.extend_tip(block.clone()).unwrap();

        network
            .service
            .process_new_commits(index.handle, &[finalizer.deposit()])
            .unwrap();
        assert_eq!(
            network.service.process_new_tip(index.handle, &block),
            Ok(TipOutcome::Mismatch)
        );
        let state = network.service.state(index.handle).unwrap();
        assert_eq!(state.status(), InitStatus::Completed);
        assert!(state.validator(&finalizer.address()).is_none());
    }

    #[test]
    fn test_commits_chain_ahead_of_blocks() {
        let network = Network::permissionless();
        let first = network.block_on(&network.tip(), vec![], 0);
        let first_index = network.chain.extend_tip(first.clone()).unwrap();
        let second = network.block_on(&first_index, vec![], 0);
        let second_index = network.chain.extend_tip(second.clone()).unwrap();

        network.service.process_new_commits(first_index.handle, &[]).unwrap();
        network.service.process_new_commits(second_index.handle, &[]).unwrap();

        // The parent has not been fully validated yet
        assert_eq!(
            network.service.process_new_tip(second_index.handle, &second),
            Err(ProcessorError::ParentNotReady {
                height: 2,
                required: InitStatus::Completed
            })
        );

        assert_eq!(
            network.service.process_new_tip(first_index.handle, &first),
            Ok(TipOutcome::Confirmed)
        );
        assert_eq!(
            network.service.process_new_tip(second_index.handle, &second),
            Ok(TipOutcome::Confirmed)
        );
    }

    #[test]
    fn test_forks_keep_separate_states() {
        let network = Network::permissionless();
        network.mine_until(3);
        let fork_point = network.tip();
        let finalizer = Finalizer::new(1);

        let with_deposit = network.block_on(&fork_point, vec![finalizer.deposit()], 1);
        let without = network.block_on(&fork_point, vec![], 2);
        let a = network.chain.add_block(fork_point.handle, with_deposit.clone()).unwrap();
        let b = network.chain.add_block(fork_point.handle, without.clone()).unwrap();

        network.service.process_new_tip_candidate(a.handle, &with_deposit).unwrap();
        network.service.process_new_tip_candidate(b.handle, &without).unwrap();

        let state_a = network.service.state(a.handle).unwrap();
        let state_b = network.service.state(b.handle).unwrap();
        assert!(state_a.validator(&finalizer.address()).is_some());
        assert!(state_b.validator(&finalizer.address()).is_none());
        assert_ne!(state_a, state_b);

        assert!(network.chain.set_tip(b.handle));
        assert_eq!(network.service.tip_state(), Some(state_b));
    }

    #[test]
    fn test_fork_below_finality_has_no_parent_state() {
        let network = Network::permissionless();
        network.mine_until(16);
        assert_eq!(network.tip_state().last_finalized_epoch(), 2);

        let stale = network.chain.ancestor(network.tip().handle, 3).unwrap();
        let block = network.block_on(&stale, vec![], 7);
        let index = network.chain.add_block(stale.handle, block.clone()).unwrap();
        assert_eq!(
            network.service.process_new_tip_candidate(index.handle, &block),
            Err(ProcessorError::ParentStateNotFound { height: 4 })
        );
    }

    #[test]
    fn test_replay_after_reset_reproduces_state() {
        let network = Network::permissionless();
        let finalizer = Finalizer::new(1);
        network.mine_until(1);
        network.mine(vec![finalizer.deposit()]).unwrap();
        network.mine_until(12);
        let expected = network.tip_state();

        network.service.reset();
        assert_eq!(network.service.repository_len(), 0);
        assert_eq!(network.service.restore_from_disk(network.chain.as_ref()), Ok(12));
        assert_eq!(network.tip_state(), expected);
    }

    #[test]
    fn test_pinned_tip_follows_epochs() {
        let network = Network::permissionless();
        network.mine_until(8);
        network.service.reset_to_tip().unwrap();

        let state = network.tip_state();
        assert_eq!(state.current_epoch(), 2);
        assert_eq!(network.service.repository_len(), 1);

        network.mine_until(11);
        assert_eq!(network.tip_state().current_epoch(), 3);
    }
}
