//! Typed inputs for the deposit, withdraw and transfer circuits.
//!
//! Each variant carries exactly the fields its circuit consumes and is
//! validated when it is built, so a malformed request is rejected here
//! rather than deep inside proof generation.

use serde::{Deserialize, Serialize};

use crate::crypto::{NodeHasher, Sha256Hasher};
use crate::error::InputError;
use crate::types::{Commitment, Hash, ProofInputPackage};

/// Inputs for a new deposit note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositInputs {
    /// Commitment to the new note.
    pub commitment: Commitment,
    /// Deposited amount in base units.
    pub amount: u128,
}

/// Inputs for spending one note to an external recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawInputs {
    /// Membership package for the spent note.
    pub package: ProofInputPackage,
    /// Nullifier hash published with the withdrawal.
    pub nullifier_hash: Hash,
    /// Destination account on the target chain.
    pub recipient: String,
    /// Withdrawn amount in base units.
    pub amount: u128,
}

/// Inputs for spending notes into new shielded outputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInputs {
    /// Membership packages for the spent notes.
    pub inputs: Vec<ProofInputPackage>,
    /// One nullifier hash per input, in the same order.
    pub nullifier_hashes: Vec<Hash>,
    /// Commitments to the newly created notes.
    pub output_commitments: Vec<Commitment>,
}

/// Proof inputs, tagged by transaction kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofInputs {
    /// Shielding deposit.
    Deposit(DepositInputs),
    /// Unshielding withdrawal.
    Withdraw(WithdrawInputs),
    /// Shielded transfer.
    Transfer(TransferInputs),
}

impl ProofInputs {
    /// Build deposit inputs.
    pub fn deposit(commitment: Commitment, amount: u128) -> Result<Self, InputError> {
        if amount == 0 {
            return Err(InputError::ZeroAmount);
        }
        Ok(Self::Deposit(DepositInputs { commitment, amount }))
    }

    /// Build withdrawal inputs, checking the proof with the SHA-256 node
    /// hasher.
    pub fn withdraw(
        package: ProofInputPackage,
        nullifier_hash: Hash,
        recipient: impl Into<String>,
        amount: u128,
    ) -> Result<Self, InputError> {
        Self::withdraw_with::<Sha256Hasher>(package, nullifier_hash, recipient, amount)
    }

    /// Build withdrawal inputs. The package's proof must verify under `H`.
    pub fn withdraw_with<H: NodeHasher>(
        package: ProofInputPackage,
        nullifier_hash: Hash,
        recipient: impl Into<String>,
        amount: u128,
    ) -> Result<Self, InputError> {
        let recipient = recipient.into();
        if amount == 0 {
            return Err(InputError::ZeroAmount);
        }
        if recipient.trim().is_empty() {
            return Err(InputError::EmptyRecipient);
        }
        check_package::<H>(&package)?;
        Ok(Self::Withdraw(WithdrawInputs {
            package,
            nullifier_hash,
            recipient,
            amount,
        }))
    }

    /// Build transfer inputs, checking proofs with the SHA-256 node hasher.
    pub fn transfer(
        inputs: Vec<ProofInputPackage>,
        nullifier_hashes: Vec<Hash>,
        output_commitments: Vec<Commitment>,
    ) -> Result<Self, InputError> {
        Self::transfer_with::<Sha256Hasher>(inputs, nullifier_hashes, output_commitments)
    }

    /// Build transfer inputs. Every input proof must verify under `H`.
    pub fn transfer_with<H: NodeHasher>(
        inputs: Vec<ProofInputPackage>,
        nullifier_hashes: Vec<Hash>,
        output_commitments: Vec<Commitment>,
    ) -> Result<Self, InputError> {
        if inputs.is_empty() {
            return Err(InputError::NoInputs);
        }
        if output_commitments.is_empty() {
            return Err(InputError::NoOutputs);
        }
        if nullifier_hashes.len() != inputs.len() {
            return Err(InputError::NullifierCountMismatch {
                inputs: inputs.len(),
                nullifiers: nullifier_hashes.len(),
            });
        }

        for package in &inputs {
            check_package::<H>(package)?;
        }

        Ok(Self::Transfer(TransferInputs {
            inputs,
            nullifier_hashes,
            output_commitments,
        }))
    }

    /// Short name of the transaction kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ProofInputs::Deposit(_) => "deposit",
            ProofInputs::Withdraw(_) => "withdraw",
            ProofInputs::Transfer(_) => "transfer",
        }
    }
}

fn check_package<H: NodeHasher>(package: &ProofInputPackage) -> Result<(), InputError> {
    let proof = &package.merkle_proof;
    if proof.leaf != package.commitment
        || proof.leaf_index != package.leaf_index
        || !proof.verify_with::<H>()
    {
        return Err(InputError::InvalidProof {
            leaf_index: package.leaf_index,
        });
    }
    Ok(())
}
