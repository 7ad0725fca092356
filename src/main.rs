//! Privacy Pool Withdrawals - Examples
//!
//! This demonstrates the withdraw relation end to end:
//! 1. Partial withdrawal - take part of a deposit, leave the rest unspent
//! 2. Split withdrawal - take part of a deposit, re-commit the remainder
//! 3. Double spend - the ledger refuses a second withdrawal of the same coin
//!
//! Set `RUST_LOG=privacy_pool_circuit=debug` for the relation's trace.

use anyhow::{bail, Context};
use halo2_proofs::{dev::MockProver, pasta::Fp};
use rand::rngs::OsRng;

use privacy_pool_circuit::{
    build_withdrawal, Coin, CommitmentRecord, Hasher, Ledger, LedgerError, RelationParams,
    SplitOutput, StateFile, WithdrawCircuit, WithdrawInstance, CIRCUIT_K,
};

const SCOPE: &[u8] = b"demo_pool";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "privacy_pool_circuit=info".into()),
        )
        .init();

    println!("==============================================");
    println!("  Privacy Pool Withdrawal Demonstration");
    println!("==============================================\n");

    let hasher = Hasher::new();
    let params = RelationParams::default();
    let mut ledger = Ledger::new(hasher, params.max_depth);
    let mut state = StateFile::new(String::from_utf8_lossy(SCOPE));

    // ===== Deposits =====
    println!("Depositing three coins of 1000 units...");
    let mut coins = Vec::new();
    for _ in 0..3 {
        let coin = Coin::generate(&hasher, SCOPE, Fp::from(1000u64), &mut OsRng);
        let index = ledger.deposit(coin.commitment)?;
        state.push(&coin.commitment);
        println!("   Leaf {}: {}", index, coin.commitment.to_hex());
        coins.push(coin);
    }

    example_partial_withdrawal(&mut ledger, &state, &params, &coins[1])?;
    println!("\n{}\n", "=".repeat(46));
    example_split_withdrawal(&mut ledger, &mut state, &params, &coins[2])?;
    println!("\n{}\n", "=".repeat(46));
    example_double_spend(&mut ledger, &state, &params, &coins[1])?;

    Ok(())
}

/// Prove a withdrawal with `MockProver` and hand it to the ledger
fn submit(
    ledger: &mut Ledger<Hasher>,
    circuit: &WithdrawCircuit,
    instance: &WithdrawInstance,
) -> Result<Option<u64>, LedgerError> {
    ledger.accept_withdrawal(instance, |instance| {
        MockProver::run(CIRCUIT_K, circuit, instance.to_instance())
            .map(|prover| prover.verify().is_ok())
            .unwrap_or(false)
    })
}

/// Example 1: withdraw 400 of 1000 without re-committing the remainder
fn example_partial_withdrawal(
    ledger: &mut Ledger<Hasher>,
    state: &StateFile,
    params: &RelationParams,
    coin: &Coin,
) -> anyhow::Result<()> {
    println!("Example 1: Partial Withdrawal");
    println!("-----------------------------\n");
    let hasher = Hasher::new();

    println!("1. Building withdrawal inputs (400 units)...");
    let inputs = build_withdrawal(&hasher, params, coin, state, Fp::from(400u64))?;
    println!("   Leaf index: {}, tree depth: {}", inputs.state_index, inputs.state_depth);
    println!("   Inputs JSON: {} bytes", serde_json::to_string(&inputs)?.len());

    println!("\n2. Evaluating the relation...");
    let witness = inputs.to_witness()?;
    let instance = WithdrawInstance::from_witness(&hasher, params, &witness)?;
    println!("   Nullifier hash: {:?}", instance.nullifier_hash);

    println!("\n3. Checking the circuit and submitting...");
    let circuit = WithdrawCircuit::new(*params, witness)?;
    submit(ledger, &circuit, &instance).context("partial withdrawal rejected")?;
    println!("   Withdrawal ACCEPTED");

    Ok(())
}

/// Example 2: withdraw 250 of 1000 and re-commit the remaining 750
fn example_split_withdrawal(
    ledger: &mut Ledger<Hasher>,
    state: &mut StateFile,
    params: &RelationParams,
    coin: &Coin,
) -> anyhow::Result<()> {
    println!("Example 2: Split Withdrawal");
    println!("---------------------------\n");
    let hasher = Hasher::new();

    println!("1. Building withdrawal inputs (250 units, remainder re-committed)...");
    let remainder = Coin::from_record(
        &hasher,
        CommitmentRecord::random(Fp::from(750u64), coin.record.label, &mut OsRng),
    );
    let split = SplitOutput {
        new_nullifier: remainder.record.nullifier,
        new_secret: remainder.record.secret,
    };
    let inputs =
        build_withdrawal(&hasher, params, coin, state, Fp::from(250u64))?.with_split(split);

    println!("\n2. Evaluating the relation...");
    let witness = inputs.to_witness()?;
    let instance = WithdrawInstance::from_witness(&hasher, params, &witness)?;
    if instance.new_commitment != Some(remainder.commitment) {
        bail!("remainder commitment does not match the new coin");
    }
    println!("   Remainder commitment: {}", remainder.commitment.to_hex());

    println!("\n3. Checking the circuit and submitting...");
    let circuit = WithdrawCircuit::new(*params, witness)?;
    let index = submit(ledger, &circuit, &instance).context("split withdrawal rejected")?;
    state.push(&remainder.commitment);
    println!("   Withdrawal ACCEPTED, remainder stored at leaf {:?}", index);

    Ok(())
}

/// Example 3: the first coin's nullifier hash is already recorded
fn example_double_spend(
    ledger: &mut Ledger<Hasher>,
    state: &StateFile,
    params: &RelationParams,
    coin: &Coin,
) -> anyhow::Result<()> {
    println!("Example 3: Double Spend");
    println!("-----------------------\n");
    let hasher = Hasher::new();

    println!("1. Re-using the coin from Example 1 against the latest root...");
    let inputs = build_withdrawal(&hasher, params, coin, state, Fp::from(100u64))?;
    let witness = inputs.to_witness()?;
    let instance = WithdrawInstance::from_witness(&hasher, params, &witness)?;
    let circuit = WithdrawCircuit::new(*params, witness)?;

    match submit(ledger, &circuit, &instance) {
        Err(LedgerError::NullifierSpent) => {
            println!("   Withdrawal REJECTED: nullifier already spent")
        }
        Err(e) => bail!("unexpected rejection: {}", e),
        Ok(_) => bail!("double spend was accepted"),
    }

    Ok(())
}
