use bloodcore_core::HospitalId;

use crate::EventEnvelope;

/// Helper trait for hospital-scoped messages.
///
/// Marks types that carry the hospital they belong to, so infrastructure
/// components (projection loops, workers) can filter or validate messages
/// without knowing the payload type.
pub trait HospitalScoped {
    fn hospital_id(&self) -> HospitalId;
}

impl<E> HospitalScoped for EventEnvelope<E> {
    fn hospital_id(&self) -> HospitalId {
        self.hospital_id()
    }
}
