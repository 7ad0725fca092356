//! The circuit and the plain evaluator agree: a witness the evaluator accepts
//! satisfies the circuit with exactly the evaluator's public inputs, and any
//! public inputs that differ in a bound row are rejected.

use halo2_proofs::{dev::MockProver, pasta::Fp};
use rand::rngs::OsRng;

use privacy_pool_circuit::circuit::withdraw::DECLARED_DEPTH;
use privacy_pool_circuit::withdraw::derive_outputs;
use privacy_pool_circuit::{
    build_withdrawal, Coin, CommitmentRecord, Compressor, Hasher, LeanImt, RelationError,
    RelationParams, SplitOutput, StateFile, WithdrawCircuit, WithdrawInstance, WithdrawPrivate,
    WithdrawPublic, WithdrawWitness, CIRCUIT_K,
};

const MAX_DEPTH: usize = 4;

fn params() -> RelationParams {
    RelationParams::with_max_depth(MAX_DEPTH).unwrap()
}

/// `size` random deposits, returning the state and the coin at `target`
fn pool(size: usize, target: usize) -> (StateFile, Coin) {
    let h = Hasher::new();
    let mut state = StateFile::new("cross");
    let coins: Vec<Coin> = (0..size)
        .map(|_| Coin::generate(&h, b"cross", Fp::from(1000u64), &mut OsRng))
        .collect();
    for coin in &coins {
        state.push(&coin.commitment);
    }
    (state, coins[target])
}

fn witness(size: usize, target: usize, withdrawn: u64, split: bool) -> WithdrawWitness<Fp> {
    let h = Hasher::new();
    let (state, coin) = pool(size, target);
    let mut inputs = build_withdrawal(&h, &params(), &coin, &state, Fp::from(withdrawn)).unwrap();
    if split {
        inputs = inputs.with_split(SplitOutput {
            new_nullifier: Fp::from(7u64),
            new_secret: Fp::from(8u64),
        });
    }
    inputs.to_witness().unwrap()
}

fn verify(witness: &WithdrawWitness<Fp>, public_inputs: Vec<Fp>) -> bool {
    let circuit = WithdrawCircuit::new(params(), witness.clone()).unwrap();
    MockProver::run(CIRCUIT_K, &circuit, vec![public_inputs])
        .unwrap()
        .verify()
        .is_ok()
}

#[test]
fn test_evaluator_inputs_satisfy_circuit() {
    let h = Hasher::new();
    let cases = [
        (1, 0, 1000, false),
        (2, 1, 0, false),
        (3, 2, 400, true),
        (7, 4, 999, true),
        (16, 15, 1, false),
    ];

    for (size, target, withdrawn, split) in cases {
        let w = witness(size, target, withdrawn, split);
        let inputs = w.public_inputs(&h, &params()).unwrap();
        let instance = WithdrawInstance::from_witness(&h, &params(), &w).unwrap();

        assert_eq!(instance.to_instance(), vec![inputs.clone()]);
        assert_eq!(inputs.len(), if split { 5 } else { 4 });
        assert!(verify(&w, inputs), "size {} target {}", size, target);
    }
}

#[test]
fn test_perturbed_inputs_rejected() {
    let h = Hasher::new();
    let w = witness(5, 3, 300, true);
    let inputs = w.public_inputs(&h, &params()).unwrap();

    for row in 0..inputs.len() {
        let mut perturbed = inputs.clone();
        if row == DECLARED_DEPTH {
            // The declared depth is bounded, not bound to the witness
            perturbed[row] = Fp::from(MAX_DEPTH as u64 + 1);
        } else {
            perturbed[row] += Fp::one();
        }
        assert!(!verify(&w, perturbed), "row {} accepted after perturbation", row);
    }
}

#[test]
fn test_stray_padding_sibling_changes_root() {
    let h = Hasher::new();
    let record = CommitmentRecord::new(
        Fp::from(500u64),
        Fp::from(9u64),
        Fp::from(11u64),
        Fp::from(12u64),
    );
    let leaf = record.commitment(&h);
    let tree = LeanImt::from_leaves(h, MAX_DEPTH, &[leaf]).unwrap();
    assert_eq!(tree.root(), leaf);

    // A single-leaf proof is all zero sentinels; plant a value at level 1
    let mut siblings = tree.generate_proof(0).unwrap().siblings;
    assert!(siblings.iter().all(|s| *s == Fp::zero()));
    siblings[1] = Fp::from(7u64);

    let mut w = WithdrawWitness {
        public: WithdrawPublic {
            withdrawn_value: Fp::from(100u64),
            state_root: tree.root(),
            declared_depth: 0,
        },
        private: WithdrawPrivate {
            label: record.label,
            existing_value: record.value,
            existing_nullifier: record.nullifier,
            existing_secret: record.secret,
            siblings,
            state_index: Fp::zero(),
            split: None,
        },
    };

    // Both sides fold the stray sibling into the root
    let outputs = derive_outputs(&h, &params(), &w.public, &w.private).unwrap();
    assert_eq!(outputs.computed_root, h.hash2(leaf, Fp::from(7u64)));

    // Against the real root the evaluator reports a mismatch and the circuit fails
    assert_eq!(w.evaluate(&h, &params()), Err(RelationError::RootMismatch));
    let real_root_inputs = outputs.public_inputs(&w.public);
    assert!(!verify(&w, real_root_inputs));

    // Against the root the stray sibling implies, both accept
    w.public.state_root = outputs.computed_root;
    let inputs = w.public_inputs(&h, &params()).unwrap();
    assert_eq!(inputs[1], outputs.computed_root);
    assert!(verify(&w, inputs));
}
