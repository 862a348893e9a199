use hopset::{SimpleHasher, StringSet};
use rand::{thread_rng, Rng};
use std::collections::HashSet;
use std::hash::{BuildHasher, BuildHasherDefault};

/// Distinct random 8-byte keys.
fn generate_keys(count: usize) -> Vec<Vec<u8>> {
    let mut rng = thread_rng();
    let mut keys = HashSet::new();
    while keys.len() < count {
        keys.insert(rng.gen::<u64>().to_le_bytes().to_vec());
    }
    keys.into_iter().collect()
}

fn scan_to_end<H: BuildHasher>(set: &StringSet<H>, mut cursor: u32, seen: &mut HashSet<Vec<u8>>) {
    loop {
        cursor = set.scan(cursor, |key| {
            seen.insert(key.to_vec());
        });
        if cursor == 0 {
            return;
        }
    }
}

#[test]
fn scan_of_empty_set_completes_immediately() {
    let set = StringSet::new();
    let next = set.scan(0, |_| panic!("empty set yielded a key"));
    assert_eq!(next, 0);
}

#[test]
fn scan_batches_cover_long_keys() {
    let mut set = StringSet::new();

    // 128-byte keys: a constant prefix suffixed by a decimal index.
    let keys: Vec<Vec<u8>> = (0..100)
        .map(|i| {
            let mut key = vec![b'a'; 125];
            key.extend_from_slice(format!("{:03}", i).as_bytes());
            key
        })
        .collect();
    for key in &keys {
        assert!(set.insert(key));
    }

    let mut seen = HashSet::new();
    let mut batches = 0usize;
    let mut cursor = 0u32;
    loop {
        cursor = set.scan(cursor, |key| {
            seen.insert(key.to_vec());
        });
        batches += 1;
        if cursor == 0 {
            break;
        }
    }

    assert_eq!(batches, set.bucket_count(), "one batch per bucket");
    let expected: HashSet<Vec<u8>> = keys.into_iter().collect();
    assert_eq!(seen, expected);
}

#[test]
fn scan_on_static_set_yields_each_key_once() {
    let mut set = StringSet::new();
    for key in generate_keys(500) {
        assert!(set.insert(&key));
    }

    let mut count = 0usize;
    let mut seen = HashSet::new();
    let mut cursor = 0u32;
    loop {
        cursor = set.scan(cursor, |key| {
            count += 1;
            seen.insert(key.to_vec());
        });
        if cursor == 0 {
            break;
        }
    }

    // Without rehashes in between, a full scan is exact, not just covering.
    assert_eq!(count, set.len());
    assert_eq!(seen.len(), set.len());

    let iterated: HashSet<Vec<u8>> = set.iter().map(|k| k.to_vec()).collect();
    assert_eq!(seen, iterated);
}

#[test]
fn scan_covers_keys_across_growth() {
    let mut set = StringSet::with_capacity(16);
    let initial = generate_keys(16);
    for key in &initial {
        assert!(set.insert(key));
    }
    assert_eq!(set.bucket_count(), 16);

    // Walk the cursor over the first half of the table.
    let mut seen = HashSet::new();
    let mut cursor = 0u32;
    for _ in 0..8 {
        cursor = set.scan(cursor, |key| {
            seen.insert(key.to_vec());
        });
        assert_ne!(cursor, 0, "scan ended before the table was covered");
    }

    // Grow the table through at least two doublings mid-scan.
    let buckets = set.bucket_count();
    for key in generate_keys(512) {
        set.insert(&key);
        if set.bucket_count() >= buckets * 4 {
            break;
        }
    }
    assert!(set.bucket_count() >= buckets * 4);
    set.validate();

    // Resuming with the pre-growth cursor must still cover every key that
    // was present when the scan started.
    scan_to_end(&set, cursor, &mut seen);
    for key in &initial {
        assert!(
            seen.contains(key),
            "key present at scan start was never yielded"
        );
    }
}

#[test]
fn scan_covers_chained_keys() {
    // All keys share their first eight bytes, so under SimpleHasher they
    // collide into one bucket and pile up in its chain. The scan step for
    // that bucket must emit the whole chain.
    let hasher = BuildHasherDefault::<SimpleHasher>::default();
    let mut set = StringSet::with_hasher(hasher);

    let keys: Vec<Vec<u8>> = (0..64u64)
        .map(|i| {
            let mut key = b"headsame".to_vec();
            key.extend_from_slice(&i.to_le_bytes());
            key
        })
        .collect();
    for key in &keys {
        assert!(set.insert(key));
    }
    assert!(set.chain_count() > 0);
    set.validate();

    let mut seen = HashSet::new();
    scan_to_end(&set, 0, &mut seen);

    let expected: HashSet<Vec<u8>> = keys.into_iter().collect();
    assert_eq!(seen, expected);
}
