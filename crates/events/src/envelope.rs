use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arledger_core::{AggregateId, TenantId};

use crate::event::Event;

/// Envelope for an event, containing tenant + stream metadata.
///
/// - `tenant_id` scopes delivery: subscribers filter on it.
/// - `sequence_number` is the aggregate version after the event was applied.
/// - `payload` is the JSON-encoded domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,

    aggregate_id: AggregateId,
    aggregate_type: String,

    event_type: String,
    sequence_number: u64,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<serde_json::Value> {
    /// Wrap a typed event, serializing its payload to JSON.
    pub fn from_typed<T>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        event: &T,
    ) -> Result<Self, serde_json::Error>
    where
        T: Event + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type,
            event.event_type(),
            sequence_number,
            event.occurred_at(),
            payload,
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Probe {
        amount: String,
        occurred_at: DateTime<Utc>,
    }

    impl Event for Probe {
        fn event_type(&self) -> &'static str {
            "allocation.probe"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.occurred_at
        }
    }

    #[test]
    fn from_typed_copies_metadata_and_serializes_payload() {
        let tenant = TenantId::new();
        let aggregate = AggregateId::new();
        let probe = Probe {
            amount: "25.00".to_string(),
            occurred_at: Utc::now(),
        };

        let envelope =
            EventEnvelope::from_typed(tenant, aggregate, "allocation.applied_credit", 2, &probe)
                .unwrap();

        assert_eq!(envelope.tenant_id(), tenant);
        assert_eq!(envelope.aggregate_id(), aggregate);
        assert_eq!(envelope.event_type(), "allocation.probe");
        assert_eq!(envelope.sequence_number(), 2);
        assert_eq!(envelope.occurred_at(), probe.occurred_at);
        assert_eq!(envelope.payload()["amount"], "25.00");
    }
}
