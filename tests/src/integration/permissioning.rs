//! # Admin Permissioning
//!
//! A network started with an admin key set only accepts deposits and votes
//! from whitelisted finalizers until the admins end permissioning.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        admin_keys, admin_signers, admin_tx, admin_tx_signed_by, finalizer_key, key_set, signer,
        test_params, Finalizer, Network,
    };
    use ffg_finalization::{
        AdminCommand, AdminCommandType, AdminParams, CommitError, FinalizationError,
        ProcessorError,
    };

    fn permissioned() -> Network {
        Network::new(test_params(), AdminParams::with_keys(admin_keys()))
    }

    fn whitelist(n: u8) -> AdminCommand {
        AdminCommand::new(AdminCommandType::AddToWhitelist, vec![finalizer_key(n)])
    }

    fn state_error(err: ProcessorError) -> Option<FinalizationError> {
        match err {
            ProcessorError::Commit {
                source: CommitError::InvalidState { source, .. },
                ..
            } => Some(source),
            _ => None,
        }
    }

    #[test]
    fn test_permissioning_active_from_genesis() {
        let network = permissioned();
        network.mine_until(1);
        let state = network.tip_state();
        assert!(state.is_permissioning_active());
        assert_eq!(state.admin_state().admin_keys(), Some(&admin_keys()));
    }

    #[test]
    fn test_deposit_requires_whitelist() {
        let network = permissioned();
        network.mine_until(1);
        let finalizer = Finalizer::new(1);

        let err = network.try_mine(vec![finalizer.deposit()]).unwrap_err();
        assert_eq!(state_error(err), Some(FinalizationError::AdminBlacklisted));

        network.mine(vec![admin_tx(&admin_signers(), &[whitelist(1)])]).unwrap();
        network.mine(vec![finalizer.deposit()]).unwrap();
        assert!(network.tip_state().validator(&finalizer.address()).is_some());
    }

    #[test]
    fn test_admin_commit_with_unknown_keys_rejected() {
        let network = permissioned();
        let impostors = [signer(7), signer(8), signer(9)];

        let err = network.try_mine(vec![admin_tx(&impostors, &[whitelist(1)])]).unwrap_err();
        assert_eq!(state_error(err), Some(FinalizationError::AdminNotAuthorized));
    }

    #[test]
    fn test_admin_commit_with_forged_signature_rejected() {
        let network = permissioned();
        let mut signers = admin_signers();
        signers[2] = signer(9);

        assert!(matches!(
            network.try_mine(vec![admin_tx_signed_by(&admin_keys(), &signers, &[whitelist(1)])]),
            Err(ProcessorError::Commit {
                source: CommitError::InvalidAdminSignature { index: 2 },
                ..
            })
        ));
    }

    #[test]
    fn test_double_end_permissioning_rejected() {
        let network = permissioned();
        let commands = [AdminCommand::end_permissioning(), AdminCommand::end_permissioning()];

        assert!(matches!(
            network.try_mine(vec![admin_tx(&admin_signers(), &commands)]),
            Err(ProcessorError::Commit {
                source: CommitError::AdminDoubleDisable,
                ..
            })
        ));
    }

    #[test]
    fn test_command_after_end_rejected() {
        let network = permissioned();
        let commands = [AdminCommand::end_permissioning(), whitelist(1)];

        assert!(matches!(
            network.try_mine(vec![admin_tx(&admin_signers(), &commands)]),
            Err(ProcessorError::Commit {
                source: CommitError::AdminCommandAfterDisable,
                ..
            })
        ));
    }

    #[test]
    fn test_end_permissioning_opens_deposits_and_retires_admins() {
        let network = permissioned();
        network
            .mine(vec![admin_tx(&admin_signers(), &[AdminCommand::end_permissioning()])])
            .unwrap();
        assert!(!network.tip_state().is_permissioning_active());

        let finalizer = Finalizer::new(4);
        network.mine(vec![finalizer.deposit()]).unwrap();

        let err = network.try_mine(vec![admin_tx(&admin_signers(), &[whitelist(5)])]).unwrap_err();
        assert_eq!(state_error(err), Some(FinalizationError::AdminNotAuthorized));
    }

    #[test]
    fn test_reset_admins_replaces_key_set() {
        let network = permissioned();
        let successors = [signer(111), signer(112), signer(113)];
        let reset = AdminCommand::new(AdminCommandType::ResetAdmins, key_set(&successors).to_vec());
        network.mine(vec![admin_tx(&admin_signers(), &[reset])]).unwrap();

        let err = network.try_mine(vec![admin_tx(&admin_signers(), &[whitelist(1)])]).unwrap_err();
        assert_eq!(state_error(err), Some(FinalizationError::AdminNotAuthorized));
        network.mine(vec![admin_tx(&successors, &[whitelist(1)])]).unwrap();
    }

    #[test]
    fn test_removed_finalizer_cannot_vote() {
        let network = permissioned();
        let mut finalizer = Finalizer::new(1);
        network.mine(vec![admin_tx(&admin_signers(), &[whitelist(1)])]).unwrap();
        network.mine(vec![finalizer.deposit()]).unwrap();
        network.mine_until(20);

        let remove = AdminCommand::new(AdminCommandType::RemoveFromWhitelist, vec![finalizer_key(1)]);
        network.mine(vec![admin_tx(&admin_signers(), &[remove])]).unwrap();

        let vote = network.tip_state().recommended_vote(&finalizer.address());
        let err = network.try_mine(vec![finalizer.vote(vote)]).unwrap_err();
        assert_eq!(state_error(err), Some(FinalizationError::AdminBlacklisted));
    }
}
