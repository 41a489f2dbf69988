//! Composite keys driving a real sorted KV store.
//!
//! The codec's whole contract is that a byte-ordered store needs no
//! key-aware comparator: these tests hand codec output to a temporary sled
//! tree and check that plain range scans observe the logical order and the
//! documented bounds.

use lib_state::keys;
use lib_state::{Float128, SecondaryKey, U256};
use serde::{Deserialize, Serialize};

fn temp_db() -> sled::Db {
    sled::Config::new().temporary(true).open().unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Row {
    primary: u64,
    payload: String,
}

#[test]
fn scan_order_matches_logical_order() {
    let db = temp_db();

    // insert out of order, across scopes, tables, key types and values
    let entries: Vec<Vec<u8>> = vec![
        keys::secondary_key(1, 1, SecondaryKey::F64(-1.5), 0),
        keys::primary_key(2, 1, 0).to_vec(),
        keys::secondary_key(1, 1, SecondaryKey::U64(3), 9),
        keys::primary_key(1, 1, 10).to_vec(),
        keys::secondary_key(1, 1, SecondaryKey::U64(3), 2),
        keys::primary_key(1, 2, 0).to_vec(),
        keys::secondary_key(1, 1, SecondaryKey::F64(2.5), 0),
        keys::primary_key(1, 1, 2).to_vec(),
    ];
    for key in entries.iter().rev() {
        db.insert(key, &b""[..]).unwrap();
    }

    let scanned: Vec<Vec<u8>> = db.iter().map(|kv| kv.unwrap().0.to_vec()).collect();

    // logical order: (scope, table, key type tag, key value, primary key)
    let expected: Vec<Vec<u8>> = vec![
        keys::primary_key(1, 1, 2).to_vec(),
        keys::primary_key(1, 1, 10).to_vec(),
        keys::secondary_key(1, 1, SecondaryKey::U64(3), 2),
        keys::secondary_key(1, 1, SecondaryKey::U64(3), 9),
        keys::secondary_key(1, 1, SecondaryKey::F64(-1.5), 0),
        keys::secondary_key(1, 1, SecondaryKey::F64(2.5), 0),
        keys::primary_key(1, 2, 0).to_vec(),
        keys::primary_key(2, 1, 0).to_vec(),
    ];
    assert_eq!(scanned, expected);
}

#[test]
fn prefix_and_table_key_bound_a_table_scan() {
    let db = temp_db();

    let inside: Vec<Vec<u8>> = vec![
        keys::primary_key(5, 9, 1).to_vec(),
        keys::secondary_key(5, 9, SecondaryKey::U128(u128::MAX), u64::MAX),
        keys::secondary_key(5, 9, SecondaryKey::U256(U256::new(u128::MAX, 0)), 3),
        keys::secondary_key(5, 9, SecondaryKey::F128(Float128::from_bits(1 << 120)), 3),
    ];
    let outside: Vec<Vec<u8>> = vec![
        keys::primary_key(5, 8, u64::MAX).to_vec(),
        keys::primary_key(5, 10, 0).to_vec(),
        keys::primary_key(4, 9, 1).to_vec(),
        keys::primary_key(6, 9, 1).to_vec(),
    ];
    for key in inside.iter().chain(outside.iter()) {
        db.insert(key, &b""[..]).unwrap();
    }

    let lower = keys::prefix_key(5, 9).to_vec();
    let upper = keys::table_key(5, 9).to_vec();
    let hits: Vec<Vec<u8>> = db
        .range(lower..upper)
        .map(|kv| kv.unwrap().0.to_vec())
        .collect();

    assert_eq!(hits.len(), inside.len());
    for key in &inside {
        assert!(hits.contains(key));
    }
}

#[test]
fn secondary_scan_recovers_rows_through_trailing_primary_key() {
    let db = temp_db();
    let (scope, table) = (7, 3);

    // rows live under their primary key; a secondary index entry per row
    // points back via the trailing primary key
    for (primary, balance, payload) in [(1u64, 50u64, "alice"), (2, 30, "bob"), (3, 40, "carol")] {
        let row = Row { primary, payload: payload.to_string() };
        db.insert(
            keys::primary_key(scope, table, primary).to_vec(),
            bincode::serialize(&row).unwrap(),
        )
        .unwrap();
        db.insert(
            keys::secondary_key(scope, table, SecondaryKey::U64(balance), primary),
            &b""[..],
        )
        .unwrap();
    }

    // walk the u64 secondary bucket in balance order
    let bucket_lower = keys::prefix_type_key(scope, table, lib_state::KeyType::SecU64).to_vec();
    let bucket_upper = keys::prefix_type_key(scope, table, lib_state::KeyType::SecU128).to_vec();

    let mut recovered = Vec::new();
    for kv in db.range(bucket_lower.clone()..bucket_upper) {
        let (key, _) = kv.unwrap();
        let (_, _, value, primary) = keys::parse_secondary_key(&key).unwrap();

        // the prefix-matched extraction agrees with the full parse
        let sec_prefix = &key[..key.len() - 8];
        assert_eq!(
            keys::trailing_primary_key(&key, sec_prefix).unwrap(),
            Some(primary)
        );
        // a prefix from some other table's bucket reports a miss
        let foreign = keys::prefix_type_key(scope, table + 1, lib_state::KeyType::SecU64);
        assert_eq!(keys::trailing_primary_key(&key, &foreign).unwrap(), None);

        let row_bytes = db
            .get(keys::primary_key(scope, table, primary).to_vec())
            .unwrap()
            .expect("secondary entry must point at a live row");
        let row: Row = bincode::deserialize(&row_bytes).unwrap();
        assert_eq!(row.primary, primary);
        recovered.push((value, row.payload));
    }

    let order: Vec<&str> = recovered.iter().map(|(_, p)| p.as_str()).collect();
    assert_eq!(order, vec!["bob", "carol", "alice"]);
}

#[test]
fn full_keys_partition_by_contract() {
    let db = temp_db();

    for contract in [10u64, 11, 12] {
        for primary in 0u64..3 {
            let composite = keys::primary_key(1, 1, primary);
            db.insert(keys::full_key(&composite, contract), &b""[..]).unwrap();
        }
    }

    // one contract's slice of the keyspace, bounded by header prefixes
    let lower = keys::full_key(&[], 11);
    let upper = keys::full_key(&[], 12);
    let hits: Vec<Vec<u8>> = db
        .range(lower..upper)
        .map(|kv| kv.unwrap().0.to_vec())
        .collect();

    assert_eq!(hits.len(), 3);
    for key in hits {
        let (db_type, contract, suffix) = keys::parse_full_key(&key).unwrap();
        assert_eq!(db_type, keys::DB_TYPE_STATE);
        assert_eq!(contract, 11);
        let (scope, table, _) = keys::parse_primary_key(suffix).unwrap();
        assert_eq!((scope, table), (1, 1));
    }
}
