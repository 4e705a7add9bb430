//! # Scripts
//!
//! Byte-level script container plus the standard templates finalizer commits
//! use. Evaluation belongs to the script interpreter; this module only builds
//! and recognises templates.
//!
//! ## Templates
//!
//! ```text
//! pay-to-pubkey-hash   OP_DUP OP_HASH160 <address> OP_EQUALVERIFY OP_CHECKSIG
//! finalizer commit     <pubkey> OP_CHECKVOTESIG OP_IF OP_1 OP_ELSE
//!                      OP_DUP OP_HASH160 <address> OP_EQUALVERIFY OP_CHECKSIG OP_ENDIF
//! admin command        OP_RETURN <payload>
//! admin multisig       OP_<m> <pubkey>... OP_<n> OP_CHECKMULTISIG
//! ```

use crate::entities::{Address, PublicKey};
use crate::errors::ScriptError;
use serde::{Deserialize, Serialize};

/// Opcodes recognised by the templates.
pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_IF: u8 = 0x63;
    pub const OP_ELSE: u8 = 0x67;
    pub const OP_ENDIF: u8 = 0x68;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
    pub const OP_CHECKVOTESIG: u8 = 0xb3;
}

use opcodes::*;

/// A single decoded script element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    Op(u8),
    Push(&'a [u8]),
}

/// Raw script bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a bare opcode.
    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.0.push(opcode);
        self
    }

    /// Append a data push using the smallest encoding.
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.0.push(len as u8);
        } else if len <= u8::MAX as usize {
            self.0.push(OP_PUSHDATA1);
            self.0.push(len as u8);
        } else {
            let len = u16::try_from(len).unwrap_or(u16::MAX);
            self.0.push(OP_PUSHDATA2);
            self.0.extend_from_slice(&len.to_le_bytes());
        }
        self.0.extend_from_slice(data);
        self
    }

    /// Append a small integer opcode (`OP_0`, `OP_1`..`OP_16`).
    pub fn push_small_int(self, n: u8) -> Self {
        match n {
            0 => self.push_opcode(OP_0),
            1..=16 => self.push_opcode(OP_1 + n - 1),
            _ => self.push_slice(&[n]),
        }
    }

    /// Iterate over decoded instructions.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            bytes: &self.0,
            offset: 0,
        }
    }

    /// Decode every instruction, failing on truncated pushes.
    pub fn parse(&self) -> Result<Vec<Instruction<'_>>, ScriptError> {
        self.instructions().collect()
    }

    /// Data pushed by a push-only script, in order.
    pub fn push_data(&self) -> Result<Vec<&[u8]>, ScriptError> {
        self.instructions()
            .map(|instruction| match instruction? {
                Instruction::Push(data) => Ok(data),
                Instruction::Op(OP_0) => Ok(&[][..]),
                Instruction::Op(opcode) => Err(ScriptError::NotPushOnly { opcode }),
            })
            .collect()
    }

    // =========================================================================
    // TEMPLATE BUILDERS
    // =========================================================================

    /// `OP_DUP OP_HASH160 <address> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn pay_to_pubkey_hash(address: &Address) -> Self {
        Self::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(address)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
    }

    /// Commitment output locking a finalizer's deposit.
    ///
    /// Spendable either by a vote signed with `pubkey` or by a regular
    /// signature from the key's address.
    pub fn finalizer_commit(pubkey: &PublicKey) -> Self {
        Self::new()
            .push_slice(pubkey.as_bytes())
            .push_opcode(OP_CHECKVOTESIG)
            .push_opcode(OP_IF)
            .push_opcode(OP_1)
            .push_opcode(OP_ELSE)
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(&pubkey.address())
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_ENDIF)
    }

    /// `OP_RETURN <payload>` carrying an encoded admin command.
    pub fn admin_command(payload: &[u8]) -> Self {
        Self::new().push_opcode(OP_RETURN).push_slice(payload)
    }

    /// `OP_<m> <pubkey>... OP_<n> OP_CHECKMULTISIG`
    pub fn multisig(required: u8, keys: &[PublicKey]) -> Self {
        let script = keys
            .iter()
            .fold(Self::new().push_small_int(required), |script, key| {
                script.push_slice(key.as_bytes())
            });
        script
            .push_small_int(keys.len() as u8)
            .push_opcode(OP_CHECKMULTISIG)
    }

    // =========================================================================
    // TEMPLATE MATCHERS
    // =========================================================================

    /// Address locked by a pay-to-pubkey-hash script.
    pub fn extract_pubkey_hash(&self) -> Option<Address> {
        match self.parse().ok()?.as_slice() {
            [Instruction::Op(OP_DUP), Instruction::Op(OP_HASH160), Instruction::Push(hash), Instruction::Op(OP_EQUALVERIFY), Instruction::Op(OP_CHECKSIG)] => {
                (*hash).try_into().ok()
            }
            _ => None,
        }
    }

    pub fn is_pay_to_pubkey_hash(&self) -> bool {
        self.extract_pubkey_hash().is_some()
    }

    /// Public key of a finalizer commitment script.
    ///
    /// The embedded address must match the key.
    pub fn extract_finalizer_pubkey(&self) -> Option<PublicKey> {
        match self.parse().ok()?.as_slice() {
            [Instruction::Push(key), Instruction::Op(OP_CHECKVOTESIG), Instruction::Op(OP_IF), Instruction::Op(OP_1), Instruction::Op(OP_ELSE), Instruction::Op(OP_DUP), Instruction::Op(OP_HASH160), Instruction::Push(hash), Instruction::Op(OP_EQUALVERIFY), Instruction::Op(OP_CHECKSIG), Instruction::Op(OP_ENDIF)] =>
            {
                let pubkey = PublicKey::from_slice(key)?;
                (pubkey.address().as_slice() == *hash).then_some(pubkey)
            }
            _ => None,
        }
    }

    pub fn is_finalizer_commit(&self) -> bool {
        self.extract_finalizer_pubkey().is_some()
    }

    /// Payload of an `OP_RETURN <payload>` script.
    pub fn admin_command_payload(&self) -> Option<&[u8]> {
        match self.parse().ok()?.as_slice() {
            [Instruction::Op(OP_RETURN), Instruction::Push(payload)] => Some(payload),
            _ => None,
        }
    }

    /// Required signature count and keys of a bare multisig script.
    pub fn extract_multisig(&self) -> Option<(usize, Vec<PublicKey>)> {
        let instructions = self.parse().ok()?;
        let (first, rest) = instructions.split_first()?;
        let (last, rest) = rest.split_last()?;
        let (count, keys) = rest.split_last()?;
        if *last != Instruction::Op(OP_CHECKMULTISIG) {
            return None;
        }
        let required = small_int_value(first)?;
        let total = small_int_value(count)?;
        let keys = keys
            .iter()
            .map(|instruction| match instruction {
                Instruction::Push(bytes) => PublicKey::from_slice(bytes),
                Instruction::Op(_) => None,
            })
            .collect::<Option<Vec<_>>>()?;
        if keys.len() != total || required == 0 || required > total {
            return None;
        }
        Some((required, keys))
    }
}

fn small_int_value(instruction: &Instruction<'_>) -> Option<usize> {
    match *instruction {
        Instruction::Op(op) if (OP_1..=OP_16).contains(&op) => Some((op - OP_1 + 1) as usize),
        _ => None,
    }
}

/// Iterator over script instructions.
pub struct Instructions<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Instructions<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], ScriptError> {
        let available = self.bytes.len() - self.offset;
        if len > available {
            let offset = self.offset;
            self.offset = self.bytes.len();
            return Err(ScriptError::TruncatedPush {
                offset,
                needed: len,
                available,
            });
        }
        let data = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(data)
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        let opcode = *self.bytes.get(self.offset)?;
        self.offset += 1;
        let result = match opcode {
            1..=0x4b => self.take(opcode as usize).map(Instruction::Push),
            OP_PUSHDATA1 => self
                .take(1)
                .and_then(|len| self.take(len[0] as usize))
                .map(Instruction::Push),
            OP_PUSHDATA2 => self
                .take(2)
                .and_then(|len| self.take(u16::from_le_bytes([len[0], len[1]]) as usize))
                .map(Instruction::Push),
            _ => Ok(Instruction::Op(opcode)),
        };
        Some(result)
    }
}
