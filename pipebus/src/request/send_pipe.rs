//! The per-send pipe that stamps and persists the request id.

use crate::context::Address;
use crate::errors::BusError;
use crate::message::SendContext;
use crate::pipeline::{Pipe, ProbeContext};
use crate::utils::new_correlation_id;
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

type RequestIdSetter<S> = dyn Fn(&mut S, Option<Uuid>) + Send + Sync;

/// Send pipe built for exactly one request send.
///
/// On first invocation it mints the request id; later invocations for the
/// same send (a retrying transport) reuse it. Every invocation stamps the
/// request id and response address on the send context and writes the id
/// into the caller's state.
pub struct SendRequestPipe<'a, S> {
    response_address: Address,
    request_id: Mutex<Option<Uuid>>,
    state: Mutex<&'a mut S>,
    set_request_id: &'a RequestIdSetter<S>,
}

impl<'a, S: Send> SendRequestPipe<'a, S> {
    /// Creates the pipe for one send.
    pub fn new(response_address: Address, state: &'a mut S, set_request_id: &'a RequestIdSetter<S>) -> Self {
        Self {
            response_address,
            request_id: Mutex::new(None),
            state: Mutex::new(state),
            set_request_id,
        }
    }

    /// The minted request id, if the pipe has run.
    #[must_use]
    pub fn request_id(&self) -> Option<Uuid> {
        *self.request_id.lock()
    }
}

#[async_trait]
impl<S: Send> Pipe<SendContext> for SendRequestPipe<'_, S> {
    async fn send(&self, ctx: &SendContext) -> Result<(), BusError> {
        let request_id = *self.request_id.lock().get_or_insert_with(new_correlation_id);

        ctx.set_request_id(request_id);
        ctx.set_response_address(self.response_address.clone());

        let mut state = self.state.lock();
        (self.set_request_id)(&mut **state, Some(request_id));
        Ok(())
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe
            .create_scope("sendRequest")
            .add("responseAddress", self.response_address.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Envelope;

    #[derive(Debug, Default)]
    struct State {
        pending: Option<Uuid>,
        writes: usize,
    }

    fn setter(state: &mut State, id: Option<Uuid>) {
        state.pending = id;
        state.writes += 1;
    }

    fn send_context() -> SendContext {
        SendContext::new(
            Envelope::new("billing:Charge", serde_json::json!({})),
            Address::parse("loopback://local/billing").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_stamps_and_persists() {
        let mut state = State::default();
        let response = Address::parse("loopback://local/saga").unwrap();
        let ctx = send_context();

        let request_id = {
            let pipe = SendRequestPipe::new(response.clone(), &mut state, &setter);
            pipe.send(&ctx).await.unwrap();
            pipe.request_id().unwrap()
        };

        assert_eq!(ctx.request_id(), Some(request_id));
        assert_eq!(ctx.response_address(), Some(response));
        assert_eq!(state.pending, Some(request_id));
    }

    #[tokio::test]
    async fn test_replayed_pipe_reuses_request_id() {
        let mut state = State::default();
        let first = send_context();
        let second = send_context();

        let pipe = SendRequestPipe::new(Address::parse("loopback://local/saga").unwrap(), &mut state, &setter);
        pipe.send(&first).await.unwrap();
        pipe.send(&second).await.unwrap();

        assert_eq!(first.request_id(), second.request_id());
        drop(pipe);
        assert_eq!(state.writes, 2);
    }

    #[test]
    fn test_probe_has_no_side_effects() {
        let mut state = State::default();
        let pipe = SendRequestPipe::new(Address::parse("loopback://local/saga").unwrap(), &mut state, &setter);

        let mut probe = ProbeContext::new();
        pipe.probe(&mut probe);

        assert_eq!(probe.filter_names(), vec!["sendRequest"]);
        assert_eq!(pipe.request_id(), None);
        drop(pipe);
        assert_eq!(state.writes, 0);
    }
}
