//! Idempotent order store.
//!
//! One record per order reference, inserted atomically before the venue
//! ever sees the order. A reference that is already present means the
//! same decision was submitted earlier (possibly by a crashed process),
//! so the caller must reuse the record instead of resubmitting.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sentinel_core::{OrderRef, OrderRole, OrderSide, Price, SignalId, Size};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One submitted (or about-to-be-submitted) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub reference: OrderRef,
    pub signal: SignalId,
    pub role: OrderRole,
    pub side: OrderSide,
    pub qty: Size,
    pub price: Option<Price>,
    /// Venue id, filled in once the submission is acknowledged.
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(
        reference: OrderRef,
        signal: SignalId,
        role: OrderRole,
        side: OrderSide,
        qty: Size,
        price: Option<Price>,
    ) -> Self {
        Self {
            reference,
            signal,
            role,
            side,
            qty,
            price,
            order_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the venue ever acknowledged this order.
    #[must_use]
    pub fn is_acked(&self) -> bool {
        self.order_id.is_some()
    }
}

/// Result of a check-and-insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The reference was new; the caller owns the submission.
    Inserted,
    /// The reference already exists. Reuse this record, do not submit.
    Existing(OrderRecord),
}

/// Order persistence keyed by reference.
pub trait OrderStore: Send + Sync {
    /// Atomically insert `record` unless its reference already exists.
    fn try_insert(&self, record: OrderRecord) -> InsertOutcome;

    fn get(&self, reference: &OrderRef) -> Option<OrderRecord>;

    /// Attach the venue order id to an existing record.
    fn mark_acked(&self, reference: &OrderRef, order_id: &str);

    fn remove(&self, reference: &OrderRef);

    fn all(&self) -> Vec<OrderRecord>;
}

/// In-process store. A single mutex makes check-and-insert atomic with
/// respect to every other accessor.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    records: Mutex<HashMap<String, OrderRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn try_insert(&self, record: OrderRecord) -> InsertOutcome {
        let mut records = self.records.lock();
        match records.get(record.reference.as_str()) {
            Some(existing) => InsertOutcome::Existing(existing.clone()),
            None => {
                records.insert(record.reference.as_str().to_string(), record);
                InsertOutcome::Inserted
            }
        }
    }

    fn get(&self, reference: &OrderRef) -> Option<OrderRecord> {
        self.records.lock().get(reference.as_str()).cloned()
    }

    fn mark_acked(&self, reference: &OrderRef, order_id: &str) {
        if let Some(record) = self.records.lock().get_mut(reference.as_str()) {
            record.order_id = Some(order_id.to_string());
        }
    }

    fn remove(&self, reference: &OrderRef) {
        self.records.lock().remove(reference.as_str());
    }

    fn all(&self) -> Vec<OrderRecord> {
        self.records.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn record() -> OrderRecord {
        let signal = SignalId::derive(
            "grid_v2",
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
            OrderSide::Buy,
        );
        let reference = OrderRef::new(&signal, OrderRole::Entry, 36).unwrap();
        OrderRecord::new(
            reference,
            signal,
            OrderRole::Entry,
            OrderSide::Buy,
            Size::new(dec!(0.5)),
            Some(Price::new(dec!(50000))),
        )
    }

    #[test]
    fn test_second_insert_returns_existing() {
        let store = InMemoryOrderStore::new();
        assert_eq!(store.try_insert(record()), InsertOutcome::Inserted);

        match store.try_insert(record()) {
            InsertOutcome::Existing(existing) => {
                assert_eq!(existing.reference, record().reference);
            }
            InsertOutcome::Inserted => panic!("duplicate reference was inserted"),
        }
    }

    #[test]
    fn test_mark_acked_persists() {
        let store = InMemoryOrderStore::new();
        let r = record();
        store.try_insert(r.clone());
        store.mark_acked(&r.reference, "oid-1");

        let stored = store.get(&r.reference).unwrap();
        assert_eq!(stored.order_id.as_deref(), Some("oid-1"));
        assert!(stored.is_acked());
    }

    #[test]
    fn test_remove_frees_reference() {
        let store = InMemoryOrderStore::new();
        let r = record();
        store.try_insert(r.clone());
        store.remove(&r.reference);
        assert!(store.get(&r.reference).is_none());
        assert_eq!(store.try_insert(record()), InsertOutcome::Inserted);
    }
}
