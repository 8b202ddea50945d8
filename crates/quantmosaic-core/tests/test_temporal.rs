mod common;

use std::path::PathBuf;

use chrono::{TimeZone, Utc};

use common::s1_name;
use quantmosaic_core::temporal::{order_by_acquisition, stack_positions, temporal_order};

fn at(day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, day, 5, 30, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Layout around the earliest acquisition
// ---------------------------------------------------------------------------

#[test]
fn test_earliest_lands_in_the_middle() {
    for n in 2..10 {
        let items: Vec<(usize, _)> = (0..n).map(|i| (i, at(i as u32 + 1))).collect();
        let ordered = temporal_order(items);
        assert_eq!(ordered[n / 2], 0, "n = {n}");
    }
}

#[test]
fn test_odd_count_alternates_left_first() {
    // D0..D4 sorted by time -> [D3, D1, D0, D2, D4]
    let items: Vec<(&str, _)> = vec![
        ("d2", at(3)),
        ("d0", at(1)),
        ("d4", at(5)),
        ("d1", at(2)),
        ("d3", at(4)),
    ];
    assert_eq!(temporal_order(items), vec!["d3", "d1", "d0", "d2", "d4"]);
}

#[test]
fn test_even_count_layout() {
    let items: Vec<(&str, _)> = vec![("d0", at(1)), ("d1", at(2)), ("d2", at(3)), ("d3", at(4))];
    assert_eq!(temporal_order(items), vec!["d3", "d1", "d0", "d2"]);
}

#[test]
fn test_two_items() {
    assert_eq!(stack_positions(2), vec![1, 0]);
    let items = vec![("late", at(9)), ("early", at(2))];
    assert_eq!(temporal_order(items), vec!["late", "early"]);
}

#[test]
fn test_equal_timestamps_keep_input_order() {
    let items = vec![("a", at(1)), ("b", at(1)), ("c", at(1))];
    // Sorted (a, b, c) -> positions 1, 0, 2
    assert_eq!(temporal_order(items), vec!["b", "a", "c"]);
}

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

#[test]
fn test_order_paths_by_name() {
    let paths: Vec<PathBuf> = ["20210105T053000", "20210101T053000", "20210103T053000"]
        .iter()
        .map(|s| PathBuf::from(s1_name(s)))
        .collect();
    let ordered = order_by_acquisition(&paths).unwrap();
    // Sorted: 01, 03, 05 -> [03, 01, 05]
    assert_eq!(ordered[0], paths[2]);
    assert_eq!(ordered[1], paths[1]);
    assert_eq!(ordered[2], paths[0]);
}

#[test]
fn test_unparsable_name_is_an_error() {
    let paths = vec![
        PathBuf::from(s1_name("20210101T053000")),
        PathBuf::from("S1A_IW_GRDH_1SDV_Gamma0_notadate_x.tif"),
    ];
    assert!(order_by_acquisition(&paths).is_err());
}
