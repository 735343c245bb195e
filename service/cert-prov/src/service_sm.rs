// Licensed under the Apache-2.0 license

use log::{debug, error};
use smlang::statemachine;

use crate::config::ServiceAuthority;
use crate::protocol::StatusCode;
use crate::response::OutboundMessage;
use crate::transport::ExchangeContext;

// One state machine per inbound request. Every path ends in Responding so
// that exactly one reply goes out.
statemachine! {
    derive_states: [Debug, Clone, Copy],
    derive_events: [Clone, Debug],
    transitions: {
        *Received + Accept = Decoding,

        Decoding + Decoded = Validating,
        Decoding + DecodeFailed / on_decode_failed = Responding,
        Decoding + RotationRefused / on_rotation_refused = Responding,

        Validating + Validated = Issuing,
        Validating + ValidationFailed / on_validation_failed = Responding,

        Issuing + Issued(Vec<u8>) / on_issued = Responding,
        Issuing + IssuanceFailed / on_issuance_failed = Responding,

        Responding + Send / on_send = Done
    }
}

fn prepare_status<X: ExchangeContext>(ctx: &mut InnerContext<'_, X>, status: StatusCode) {
    debug!("Prepared status report {:?}", status);
    ctx.response = Some(OutboundMessage::status_report(status));
}

pub trait StateMachineActions {
    // Actions
    fn on_decode_failed(&self, ctx: &mut InnerContext<'_, impl ExchangeContext>) -> Result<(), ()> {
        prepare_status(ctx, StatusCode::UnauthorizedGetCertRequest);
        Ok(())
    }
    fn on_rotation_refused(
        &self,
        ctx: &mut InnerContext<'_, impl ExchangeContext>,
    ) -> Result<(), ()> {
        prepare_status(ctx, StatusCode::NoNewCertRequired);
        Ok(())
    }
    fn on_validation_failed(
        &self,
        ctx: &mut InnerContext<'_, impl ExchangeContext>,
    ) -> Result<(), ()> {
        prepare_status(ctx, StatusCode::UnauthorizedGetCertRequest);
        Ok(())
    }
    fn on_issued(
        &self,
        ctx: &mut InnerContext<'_, impl ExchangeContext>,
        cert: Vec<u8>,
    ) -> Result<(), ()> {
        let related = ctx
            .authority
            .policy()
            .include_related_certs
            .then(|| ctx.authority.ca_cert().encoded());
        let response = OutboundMessage::certificate_response(&cert, related)
            .map_err(|e| error!("Encoding certificate response: {}", e))?;
        ctx.response = Some(response);
        Ok(())
    }
    fn on_issuance_failed(
        &self,
        ctx: &mut InnerContext<'_, impl ExchangeContext>,
    ) -> Result<(), ()> {
        prepare_status(ctx, StatusCode::UnauthorizedGetCertRequest);
        Ok(())
    }
    fn on_send(&self, ctx: &mut InnerContext<'_, impl ExchangeContext>) -> Result<(), ()> {
        let response = ctx
            .response
            .take()
            .ok_or_else(|| error!("No response prepared"))?;
        if ctx.authority.policy().log_message_data {
            debug!("Outbound payload: {}", hex::encode(&response.payload));
        }
        let peer = ctx.exchange.peer_node_id();
        ctx.exchange
            .send_message(response.profile_id, response.msg_type, &response.payload)
            .map_err(|e| error!("Sending response to node {:016X}: {:?}", peer, e))
    }
}

pub struct DefaultActions;
impl StateMachineActions for DefaultActions {}

pub struct InnerContext<'x, X: ExchangeContext> {
    pub exchange: &'x mut X,
    pub authority: &'x ServiceAuthority,
    /// Reply waiting for the Send event.
    pub response: Option<OutboundMessage>,
}

pub struct Context<'x, T: StateMachineActions, X: ExchangeContext> {
    inner: T,
    inner_ctx: InnerContext<'x, X>,
}

impl<'x, T: StateMachineActions, X: ExchangeContext> Context<'x, T, X> {
    pub fn new(actions: T, exchange: &'x mut X, authority: &'x ServiceAuthority) -> Self {
        Self {
            inner: actions,
            inner_ctx: InnerContext {
                exchange,
                authority,
                response: None,
            },
        }
    }

    pub fn pending_response(&self) -> Option<&OutboundMessage> {
        self.inner_ctx.response.as_ref()
    }
}

// Forwards the generated context callbacks to the replaceable actions.
macro_rules! delegate_to_inner {
    ($($fn_name:ident ($($arg:ident : $arg_ty:ty),*) -> $ret:ty),* $(,)?) => {
        $(
            fn $fn_name(&mut self, $($arg: $arg_ty),*) -> $ret {
                debug!("Provisioning Action: {}", stringify!($fn_name));
                self.inner.$fn_name(&mut self.inner_ctx, $($arg),*)
            }
        )*
    };
}

impl<T: StateMachineActions, X: ExchangeContext> StateMachineContext for Context<'_, T, X> {
    delegate_to_inner! {
        on_decode_failed() -> Result<(), ()>,
        on_rotation_refused() -> Result<(), ()>,
        on_validation_failed() -> Result<(), ()>,
        on_issued(cert: Vec<u8>) -> Result<(), ()>,
        on_issuance_failed() -> Result<(), ()>,
        on_send() -> Result<(), ()>
    }
}
