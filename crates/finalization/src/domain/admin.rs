//! # Admin Permissioning
//!
//! While permissioning is active only whitelisted addresses may deposit or
//! vote. A fixed-size multisig key set authorizes admin transactions; each
//! carries one or more [`AdminCommand`]s. `EndPermissioning` is one-way.

use super::payload;
use serde::{Deserialize, Serialize};
use shared_types::{Address, PublicKey, Script};
use std::collections::HashSet;

/// Keys in the admin multisig.
pub const ADMIN_MULTISIG_KEYS: usize = 3;

/// Signatures required by the admin multisig.
pub const ADMIN_MULTISIG_SIGNATURES: usize = 3;

/// The admin key set.
pub type AdminKeySet = [PublicKey; ADMIN_MULTISIG_KEYS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminCommandType {
    AddToWhitelist,
    RemoveFromWhitelist,
    ResetAdmins,
    EndPermissioning,
}

/// A single admin command.
///
/// Whitelist commands carry the keys whose addresses are affected;
/// `ResetAdmins` carries the new key set; `EndPermissioning` carries nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCommand {
    pub command_type: AdminCommandType,
    pub payload: Vec<PublicKey>,
}

impl AdminCommand {
    pub fn new(command_type: AdminCommandType, payload: Vec<PublicKey>) -> Self {
        Self {
            command_type,
            payload,
        }
    }

    pub fn end_permissioning() -> Self {
        Self::new(AdminCommandType::EndPermissioning, Vec::new())
    }

    /// Whether the payload fits the command type.
    pub fn is_valid(&self) -> bool {
        match self.command_type {
            AdminCommandType::AddToWhitelist | AdminCommandType::RemoveFromWhitelist => {
                !self.payload.is_empty()
            }
            AdminCommandType::ResetAdmins => self.payload.len() == ADMIN_MULTISIG_KEYS,
            AdminCommandType::EndPermissioning => self.payload.is_empty(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        payload::encode(self)
    }

    /// Decode a command, rejecting payloads that do not fit the type.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        payload::decode::<Self>(bytes)
            .ok()
            .filter(AdminCommand::is_valid)
    }

    /// Output script carrying this command.
    pub fn to_script(&self) -> Result<Script, bincode::Error> {
        Ok(Script::admin_command(&self.encode()?))
    }

    /// New key set of a `ResetAdmins` command.
    pub fn key_set(&self) -> Option<AdminKeySet> {
        match self.command_type {
            AdminCommandType::ResetAdmins => self.payload.clone().try_into().ok(),
            _ => None,
        }
    }
}

/// Permissioning state carried by each finalization state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminState {
    admin_keys: Option<AdminKeySet>,
    whitelist: HashSet<Address>,
    permissioning_active: bool,
}

impl AdminState {
    /// Permissioning is active exactly when an initial key set is given.
    pub fn new(admin_keys: Option<AdminKeySet>) -> Self {
        Self {
            permissioning_active: admin_keys.is_some(),
            admin_keys,
            whitelist: HashSet::new(),
        }
    }

    pub fn is_permissioning_active(&self) -> bool {
        self.permissioning_active
    }

    pub fn admin_keys(&self) -> Option<&AdminKeySet> {
        self.admin_keys.as_ref()
    }

    /// Whitelisted, or permissioning has ended.
    pub fn is_validator_authorized(&self, address: &Address) -> bool {
        !self.permissioning_active || self.whitelist.contains(address)
    }

    /// `keys` equal the current admin set and permissioning is active.
    pub fn is_admin_authorized(&self, keys: &AdminKeySet) -> bool {
        self.permissioning_active && self.admin_keys.as_ref() == Some(keys)
    }

    pub fn add_validator(&mut self, address: Address) {
        self.whitelist.insert(address);
    }

    pub fn remove_validator(&mut self, address: &Address) {
        self.whitelist.remove(address);
    }

    pub fn reset_admin(&mut self, keys: AdminKeySet) {
        self.admin_keys = Some(keys);
    }

    pub fn end_permissioning(&mut self) {
        self.permissioning_active = false;
    }

    /// Apply one command. The command must be valid.
    pub fn apply(&mut self, command: &AdminCommand) {
        match command.command_type {
            AdminCommandType::AddToWhitelist => {
                for key in &command.payload {
                    self.add_validator(key.address());
                }
            }
            AdminCommandType::RemoveFromWhitelist => {
                for key in &command.payload {
                    self.remove_validator(&key.address());
                }
            }
            AdminCommandType::ResetAdmins => {
                if let Some(keys) = command.key_set() {
                    self.reset_admin(keys);
                }
            }
            AdminCommandType::EndPermissioning => self.end_permissioning(),
        }
    }
}
