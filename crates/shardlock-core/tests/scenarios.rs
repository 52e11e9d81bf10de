use shardlock_core::definition::BuildDefinition;
use shardlock_core::identifier::Coordinate;
use shardlock_core::{
    BuildPipeline, Primitives, Proof, Reconstruction, ReconstructionEngine, SolvedProof,
};

const DEFINITION: &str = r#"{
    "test": {
        "threshold": 2,
        "resolution": 8,
        "costParam": 1,
        "memoryCost": 256,
        "secret": "idek{test}",
        "puzzles": [
            {"name": "lighthouse", "lat": 43.6843, "lng": 7.3281},
            {"name": "market", "lat": 35.6595, "lng": 139.7005},
            {"name": "canal", "lat": 52.3731, "lng": 4.8922}
        ]
    }
}"#;

fn setup() -> (BuildDefinition, ReconstructionEngine) {
    let def: BuildDefinition = serde_json::from_str(DEFINITION).expect("definition");
    let pipeline = BuildPipeline::new(Primitives::standard(), 0).expect("pool");
    let out = pipeline.build_verified(&def).expect("build");
    let engine = ReconstructionEngine::new(out.published, Primitives::standard());
    (def, engine)
}

fn solved(def: &BuildDefinition, index: u8) -> SolvedProof {
    SolvedProof {
        index,
        proof: Proof::Location(def.tiers["test"].puzzles[index as usize - 1].solution),
    }
}

#[test]
fn any_two_of_three_recover_the_secret() {
    let (def, engine) = setup();
    for pair in [[1u8, 3], [1, 2], [2, 3], [3, 1]] {
        let proofs = [solved(&def, pair[0]), solved(&def, pair[1])];
        assert_eq!(
            engine.reconstruct("test", &proofs),
            Reconstruction::Recovered("idek{test}".into()),
            "pair {pair:?}"
        );
    }
}

#[test]
fn a_single_proof_stays_pending() {
    let (def, engine) = setup();
    assert_eq!(
        engine.reconstruct("test", &[solved(&def, 2)]),
        Reconstruction::Pending
    );
    assert_eq!(engine.reconstruct("test", &[]), Reconstruction::Pending);
}

#[test]
fn wrong_proofs_do_not_reveal_the_secret() {
    let (_, engine) = setup();
    let wrong = |index: u8, lat: f64, lng: f64| SolvedProof {
        index,
        proof: Proof::Location(Coordinate::new(lat, lng).expect("coordinate")),
    };
    let proofs = [wrong(1, -12.0464, -77.0428), wrong(2, 64.1466, -21.9426)];
    let result = engine.reconstruct("test", &proofs);
    assert_ne!(result.secret(), Some("idek{test}"));

    let identifiers = [
        SolvedProof {
            index: 1,
            proof: Proof::Identifier {
                identifier: "not-a-cell".into(),
            },
        },
        wrong(3, 0.0, 0.0),
    ];
    assert_ne!(
        engine.reconstruct("test", &identifiers).secret(),
        Some("idek{test}")
    );
}

#[test]
fn one_right_and_one_wrong_proof_is_not_enough() {
    let (def, engine) = setup();
    let proofs = [
        solved(&def, 1),
        SolvedProof {
            index: 2,
            proof: Proof::Location(Coordinate::new(35.0, 139.0).expect("coordinate")),
        },
    ];
    assert_ne!(
        engine.reconstruct("test", &proofs).secret(),
        Some("idek{test}")
    );
}

#[test]
fn reconstruction_is_idempotent() {
    let (def, engine) = setup();
    let proofs = [solved(&def, 3), solved(&def, 2)];
    let first = engine.reconstruct("test", &proofs);
    let second = engine.reconstruct("test", &proofs);
    assert_eq!(first, second);
    assert!(first.is_recovered());

    let partial = [solved(&def, 1)];
    assert_eq!(
        engine.reconstruct("test", &partial),
        engine.reconstruct("test", &partial)
    );
}

#[test]
fn commitments_are_listed_in_puzzle_order() {
    let (_, engine) = setup();
    let commitments = engine.commitments("test").expect("tier");
    let names: Vec<&str> = commitments.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["lighthouse", "market", "canal"]);
    assert!(engine.commitments("other").is_none());
}
