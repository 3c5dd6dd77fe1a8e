//! Request intake and fulfillment against the ledger.

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use bloodcore_core::{AggregateId, BloodType, Gender, HospitalId, Milliliters, StaffId};
use bloodcore_events::{EventBus, EventEnvelope};
use bloodcore_inventory::{IssueStock, StockCommand, StockLevel, StockLevelId};
use bloodcore_requests::{
    BloodRequest, CancelRequest, FulfillRequest, RequestCommand, RequestId, SubmitRequest, Urgency,
};

use super::BloodBank;
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

/// Input for submitting a blood request.
#[derive(Debug, Clone)]
pub struct SubmitRequestInput {
    pub hospital_id: HospitalId,
    pub staff_id: StaffId,
    pub patient_name: String,
    pub patient_age: u8,
    pub patient_gender: Gender,
    pub blood_type: BloodType,
    pub quantity: Milliliters,
    pub urgency: Urgency,
    pub facility: String,
    pub requested_on: NaiveDate,
    pub notes: Option<String>,
}

impl<S, B> BloodBank<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Submit a new request; it starts Pending and holds no stock.
    pub fn submit_request(&self, input: SubmitRequestInput) -> Result<RequestId, DispatchError> {
        let request_id = RequestId::new(AggregateId::new());

        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            input.hospital_id,
            request_id.0,
            "requests.request",
            RequestCommand::SubmitRequest(SubmitRequest {
                hospital_id: input.hospital_id,
                request_id,
                patient_name: input.patient_name,
                patient_age: input.patient_age,
                patient_gender: input.patient_gender,
                blood_type: input.blood_type,
                quantity_ml: input.quantity.0,
                urgency: input.urgency,
                facility: input.facility,
                requested_on: input.requested_on,
                notes: input.notes,
                occurred_at: Utc::now(),
            }),
            |_, id| BloodRequest::empty(RequestId::new(id)),
        )?;

        info!(
            hospital_id = %input.hospital_id,
            staff_id = %input.staff_id,
            %request_id,
            blood_type = %input.blood_type,
            quantity_ml = input.quantity.0,
            urgency = ?input.urgency,
            "request submitted"
        );
        Ok(request_id)
    }

    /// Fulfill a pending request against available stock.
    ///
    /// The status transition and the ledger debit commit together. On
    /// insufficient stock the request stays Pending and the error carries
    /// the current available count for the type, so the caller can display
    /// it. There is no partial fulfillment.
    pub fn fulfill_request(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        request_id: RequestId,
    ) -> Result<BloodRequest, DispatchError> {
        let request = self.get_request(hospital_id, request_id)?;
        let blood_type = request
            .blood_type()
            .ok_or_else(|| DispatchError::InvalidState("request has no blood type".into()))?;
        let quantity_ml = request.quantity_ml();

        let stock_id = StockLevelId::for_blood_type(blood_type);
        let occurred_at = Utc::now();

        let _gate = self.write_gate()?;
        self.dispatcher().dispatch_pair(
            hospital_id,
            (
                request_id.0,
                "requests.request",
                RequestCommand::FulfillRequest(FulfillRequest {
                    hospital_id,
                    request_id,
                    occurred_at,
                }),
            ),
            |_, id| BloodRequest::empty(RequestId::new(id)),
            (
                stock_id.0,
                "inventory.stock",
                StockCommand::IssueStock(IssueStock {
                    hospital_id,
                    stock_id,
                    blood_type,
                    quantity_ml,
                    occurred_at,
                }),
            ),
            |_, _| StockLevel::empty(stock_id),
        )?;

        info!(%hospital_id, %staff_id, %request_id, %blood_type, quantity_ml, "request fulfilled");
        self.get_request(hospital_id, request_id)
    }

    /// Cancel a pending request. No ledger effect: a Pending request never
    /// held a reservation.
    pub fn cancel_request(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        request_id: RequestId,
        reason: Option<String>,
    ) -> Result<BloodRequest, DispatchError> {
        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            hospital_id,
            request_id.0,
            "requests.request",
            RequestCommand::CancelRequest(CancelRequest {
                hospital_id,
                request_id,
                reason,
                occurred_at: Utc::now(),
            }),
            |_, id| BloodRequest::empty(RequestId::new(id)),
        )?;

        info!(%hospital_id, %staff_id, %request_id, "request cancelled");
        self.get_request(hospital_id, request_id)
    }

    /// Load a request's current state.
    pub fn get_request(
        &self,
        hospital_id: HospitalId,
        request_id: RequestId,
    ) -> Result<BloodRequest, DispatchError> {
        let request = self.rehydrate(hospital_id, request_id.0, |id| {
            BloodRequest::empty(RequestId::new(id))
        })?;
        if !request.is_submitted() {
            return Err(DispatchError::NotFound);
        }
        Ok(request)
    }
}
