use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use super::Generator;

#[test]
fn ids_have_the_configured_length() {
    let generator = Generator::with_seed(b"salt".to_vec(), 1).with_min_len(14);
    let id = generator.new_id().unwrap();
    assert_eq!(id.len(), 14);
}

#[test]
fn ids_longer_than_one_digest_are_extended() {
    let generator = Generator::with_seed(b"salt".to_vec(), 1).with_min_len(60);
    let id = generator.new_id().unwrap();
    assert_eq!(id.len(), 60);
}

#[test]
fn ids_are_unique_under_concurrency() {
    let generator = Arc::new(Generator::new().unwrap());

    // 100 workers generating 100 ids each
    let mut workers = Vec::new();
    for _ in 0..100 {
        let generator = generator.clone();
        workers.push(thread::spawn(move || {
            (0..100)
                .map(|_| generator.new_id().unwrap())
                .collect::<Vec<_>>()
        }));
    }

    let mut seen = HashSet::new();
    for worker in workers {
        for id in worker.join().unwrap() {
            assert_eq!(id.len(), generator.min_len());
            assert!(seen.insert(id), "duplicate id generated");
        }
    }
    assert_eq!(seen.len(), 10_000);
}

#[test]
fn seeded_generators_are_deterministic() {
    let a = Generator::with_seed(b"pepper".to_vec(), 42);
    let b = Generator::with_seed(b"pepper".to_vec(), 42);

    assert_eq!(a.new_id().unwrap(), b.new_id().unwrap());
    assert_eq!(a.new_id().unwrap(), b.new_id().unwrap());
}

#[test]
fn the_salt_keys_the_encoding() {
    let a = Generator::with_seed(b"salt-a".to_vec(), 42);
    let b = Generator::with_seed(b"salt-b".to_vec(), 42);

    // identical randomness, different salts, different ids
    assert_ne!(a.new_id().unwrap(), b.new_id().unwrap());
}
