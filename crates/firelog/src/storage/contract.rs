//! Behaviour every backend must share, run from each backend's tests.

use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use uuid::Uuid;

use super::Store;
use crate::error::Error;
use crate::model::{NewFireExtinguisher, NewMaintenanceLog};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn new_extinguisher(barcode: &str) -> NewFireExtinguisher {
    NewFireExtinguisher {
        barcode: barcode.to_string(),
        extinguisher_no: "EX-10".to_string(),
        location: "Lobby".to_string(),
        date_of_testing: date("2024-01-01"),
    }
}

pub fn new_log(day: &str, remarks: &str) -> NewMaintenanceLog {
    NewMaintenanceLog {
        date_work_done: date(day),
        remarks: remarks.to_string(),
        user: "A".to_string(),
    }
}

pub fn create_then_get(store: &dyn Store) {
    let created = store.create(new_extinguisher("FE-001")).unwrap();
    assert!(!created.id.is_nil());

    let found = store.get("FE-001").unwrap().expect("record should exist");
    assert_eq!(found.extinguisher, created);
    assert_eq!(found.extinguisher.extinguisher_no, "EX-10");
    assert_eq!(found.extinguisher.location, "Lobby");
    assert_eq!(found.extinguisher.date_of_testing, date("2024-01-01"));
    assert!(found.maintenance_logs.is_empty());
}

pub fn unknown_barcode_is_absent(store: &dyn Store) {
    assert!(store.get("FE-999").unwrap().is_none());
}

pub fn duplicate_barcode_rejected(store: &dyn Store) {
    let first = store.create(new_extinguisher("FE-001")).unwrap();

    let mut again = new_extinguisher("FE-001");
    again.location = "Basement".to_string();
    let err = store.create(again).unwrap_err();
    assert!(matches!(err, Error::DuplicateBarcode { ref barcode } if barcode == "FE-001"));

    let records = store.list().unwrap();
    assert_eq!(records, vec![first]);
}

pub fn append_then_list(store: &dyn Store) {
    let record = store.create(new_extinguisher("FE-001")).unwrap();
    let entry = store.append(record.id, new_log("2024-06-01", "refill")).unwrap();
    assert_eq!(entry.extinguisher_id, record.id);

    let logs = store.list_for(record.id).unwrap();
    assert_eq!(logs, vec![entry.clone()]);

    let found = store.get("FE-001").unwrap().unwrap();
    assert_eq!(found.maintenance_logs, vec![entry]);
}

pub fn append_unknown_id_rejected(store: &dyn Store) {
    let record = store.create(new_extinguisher("FE-001")).unwrap();
    store.append(record.id, new_log("2024-06-01", "refill")).unwrap();

    let stranger = Uuid::new_v4();
    let err = store.append(stranger, new_log("2024-06-02", "x")).unwrap_err();
    assert!(matches!(err, Error::UnknownExtinguisher { id } if id == stranger));

    assert!(store.list_for(stranger).unwrap().is_empty());
    assert_eq!(store.list_for(record.id).unwrap().len(), 1);
}

pub fn logs_ordered_by_work_date(store: &dyn Store) {
    let record = store.create(new_extinguisher("FE-001")).unwrap();
    for (day, remarks) in [
        ("2024-03-01", "march"),
        ("2024-06-01", "june"),
        ("2023-11-15", "november"),
        ("2024-04-20", "april"),
    ] {
        store.append(record.id, new_log(day, remarks)).unwrap();
    }

    let order: Vec<_> = store
        .list_for(record.id)
        .unwrap()
        .into_iter()
        .map(|l| l.remarks)
        .collect();
    assert_eq!(order, ["june", "april", "march", "november"]);

    let attached: Vec<_> = store
        .get("FE-001")
        .unwrap()
        .unwrap()
        .maintenance_logs
        .into_iter()
        .map(|l| l.remarks)
        .collect();
    assert_eq!(attached, order);
}

pub fn same_day_logs_latest_first(store: &dyn Store) {
    let record = store.create(new_extinguisher("FE-001")).unwrap();
    for remarks in ["first", "second", "third"] {
        store.append(record.id, new_log("2024-06-01", remarks)).unwrap();
    }
    store.append(record.id, new_log("2024-05-01", "earlier")).unwrap();

    let order: Vec<_> = store
        .list_for(record.id)
        .unwrap()
        .into_iter()
        .map(|l| l.remarks)
        .collect();
    assert_eq!(order, ["third", "second", "first", "earlier"]);
}

pub fn logs_are_per_record(store: &dyn Store) {
    let a = store.create(new_extinguisher("FE-001")).unwrap();
    let b = store.create(new_extinguisher("FE-002")).unwrap();
    store.append(a.id, new_log("2024-06-01", "a")).unwrap();
    store.append(b.id, new_log("2024-06-01", "b")).unwrap();
    store.append(b.id, new_log("2024-07-01", "b2")).unwrap();

    assert_eq!(store.list_for(a.id).unwrap().len(), 1);
    assert_eq!(store.list_for(b.id).unwrap().len(), 2);
}

pub fn scenario(store: &dyn Store) {
    let record = store.create(new_extinguisher("FE-001")).unwrap();
    assert!(store.get("FE-001").unwrap().unwrap().maintenance_logs.is_empty());

    store.append(record.id, new_log("2024-06-01", "refill")).unwrap();
    assert_eq!(store.list_for(record.id).unwrap().len(), 1);

    store.append(record.id, new_log("2024-03-01", "inspect")).unwrap();
    let logs = store.list_for(record.id).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].date_work_done, date("2024-06-01"));
    assert_eq!(logs[1].date_work_done, date("2024-03-01"));
}

pub fn list_returns_all(store: &dyn Store) {
    for code in ["FE-003", "FE-001", "FE-002"] {
        store.create(new_extinguisher(code)).unwrap();
    }
    let mut codes: Vec<_> = store.list().unwrap().into_iter().map(|r| r.barcode).collect();
    codes.sort();
    assert_eq!(codes, ["FE-001", "FE-002", "FE-003"]);
}

pub fn concurrent_create_single_winner(store: Arc<dyn Store>) {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.create(new_extinguisher("FE-RACE")))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(Error::DuplicateBarcode { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(store.list().unwrap().len(), 1);
}

/// Generate one `#[test]` per contract check for a backend constructor.
macro_rules! store_contract_tests {
    ($make:expr) => {
        #[test]
        fn contract_create_then_get() {
            $crate::storage::contract::create_then_get(&$make);
        }

        #[test]
        fn contract_unknown_barcode_is_absent() {
            $crate::storage::contract::unknown_barcode_is_absent(&$make);
        }

        #[test]
        fn contract_duplicate_barcode_rejected() {
            $crate::storage::contract::duplicate_barcode_rejected(&$make);
        }

        #[test]
        fn contract_append_then_list() {
            $crate::storage::contract::append_then_list(&$make);
        }

        #[test]
        fn contract_append_unknown_id_rejected() {
            $crate::storage::contract::append_unknown_id_rejected(&$make);
        }

        #[test]
        fn contract_logs_ordered_by_work_date() {
            $crate::storage::contract::logs_ordered_by_work_date(&$make);
        }

        #[test]
        fn contract_same_day_logs_latest_first() {
            $crate::storage::contract::same_day_logs_latest_first(&$make);
        }

        #[test]
        fn contract_logs_are_per_record() {
            $crate::storage::contract::logs_are_per_record(&$make);
        }

        #[test]
        fn contract_scenario() {
            $crate::storage::contract::scenario(&$make);
        }

        #[test]
        fn contract_list_returns_all() {
            $crate::storage::contract::list_returns_all(&$make);
        }

        #[test]
        fn contract_concurrent_create_single_winner() {
            $crate::storage::contract::concurrent_create_single_winner(std::sync::Arc::new($make));
        }
    };
}

pub(crate) use store_contract_tests;
