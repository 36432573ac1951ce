// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for convolution-function stores.

use super::*;

/// A small, consistent store with 5 W planes.
fn test_store() -> ConvFunctionStore {
    let size = 24;
    let side = size / 2 - 1;
    let kernel = Array3::from_shape_fn((side, side, 5), |(x, y, p)| {
        let r2 = (x * x + y * y) as f64;
        c64::new((-r2 / 20.0).exp(), 0.01 * p as f64 * (x as f64 - y as f64))
    });
    ConvFunctionStore::new(kernel, vec![2, 2, 3, 3, 4], 4, size, 0.04)
}

#[test]
fn test_default_is_uninitialized() {
    let store = ConvFunctionStore::default();
    assert_eq!(store.state(), StoreState::Uninitialized);
    assert_eq!(store.w_planes(), 0);
    assert!(matches!(store.to_record(), Err(StoreError::Serialization(_))));
}

#[test]
fn test_ready_store() {
    let store = test_store();
    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(store.w_planes(), 5);
    assert_eq!(store.plane(2).dim(), (11, 11));
    assert_eq!(store.memory_bytes(), 11 * 11 * 5 * 16);
}

#[test]
fn test_record_round_trip() {
    let store = test_store();
    let record = store.to_record().unwrap();
    for field in ["convfunc", "convsupport", "convsampling", "convsize", "wscaler"] {
        assert!(record.is_defined(field), "{field} is missing");
    }
    let restored = ConvFunctionStore::from_record(&record).unwrap();
    assert_eq!(restored, store);
}

#[test]
fn test_record_round_trip_through_json() {
    let store = test_store();
    let mut buf = vec![];
    store.to_record().unwrap().to_writer(&mut buf).unwrap();
    let record = Record::from_reader(buf.as_slice()).unwrap();
    let restored = ConvFunctionStore::from_record(&record).unwrap();
    // Every bit survives.
    assert_eq!(restored, store);
}

#[test]
fn test_missing_field() {
    let record = test_store().to_record().unwrap();
    let mut partial = Record::new();
    for name in record.names().filter(|&n| n != "convsupport") {
        partial.define(name, record.get(name).unwrap().clone());
    }
    let result = ConvFunctionStore::from_record(&partial);
    assert!(matches!(
        result,
        Err(StoreError::Deserialization { field, .. }) if field == "convsupport"
    ));
}

#[test]
fn test_inconsistent_record() {
    let mut record = test_store().to_record().unwrap();
    record.define("convsupport", RecordField::IntVec(vec![2, 2]));
    assert!(matches!(
        ConvFunctionStore::from_record(&record),
        Err(StoreError::Deserialization { field, .. }) if field == "convsupport"
    ));

    let mut record = test_store().to_record().unwrap();
    record.define("convsize", RecordField::Int(30));
    assert!(matches!(
        ConvFunctionStore::from_record(&record),
        Err(StoreError::Deserialization { field, .. }) if field == "convfunc"
    ));
}

#[test]
fn test_inconsistent_store_cant_be_saved() {
    let mut store = test_store();
    store.support[1] = 0;
    assert_eq!(store.state(), StoreState::Uninitialized);
    assert!(matches!(store.to_record(), Err(StoreError::Serialization(_))));

    let mut store = test_store();
    store.kernel[[0, 0, 4]] = c64::new(f64::NAN, 0.0);
    assert!(matches!(store.to_record(), Err(StoreError::Serialization(_))));
}

#[test]
fn test_plane_for_w() {
    let store = test_store();
    // w_scale = 0.04, so plane i holds w = i^2 * 25.
    assert_eq!(store.plane_for_w(0.0), 0);
    assert_eq!(store.plane_for_w(25.0), 1);
    assert_eq!(store.plane_for_w(-25.0), 1);
    assert_eq!(store.plane_for_w(100.0), 2);
    assert_eq!(store.plane_for_w(400.0), 4);
    // Between planes 2 (100) and 3 (225); sqrt(160 * 0.04) = 2.53.
    assert_eq!(store.plane_for_w(160.0), 3);
    // Beyond the last plane.
    assert_eq!(store.plane_for_w(1e6), 4);
    assert_eq!(store.plane_for_w(f64::NAN), 0);

    assert_eq!(store.support_for_w(100.0), Some(3));
    assert_eq!(store.support_for_w(1e6), Some(4));
    assert_eq!(ConvFunctionStore::default().support_for_w(1.0), None);
}

#[test]
fn test_single_plane_lookup() {
    let kernel = Array3::from_elem((11, 11, 1), c64::new(1.0, 0.0));
    let store = ConvFunctionStore::new(kernel, vec![3], 4, 24, 0.0);
    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(store.plane_for_w(1e4), 0);
}
