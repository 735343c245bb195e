// Licensed under the Apache-2.0 license

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::ServiceAuthority;
use crate::error::ServiceError;
use crate::issuer::CertificateIssuer;
use crate::protocol::{RequestType, MSG_TYPE_GET_CERTIFICATE_REQUEST, SECURITY_PROFILE};
use crate::request::GetCertificateRequest;
use crate::service_sm::{
    Context, DefaultActions, Events, StateMachine, StateMachineActions, States,
};
use crate::transport::{ExchangeContext, ExchangeManager, InboundMessage};
use crate::validator::validate_request;

/// Answers GetCertificateRequests with service-signed operational
/// certificates.
///
/// The service registers itself with the exchange manager on `init` and
/// unregisters on `shutdown` or drop. Requests are handled synchronously;
/// the only state shared between them is the immutable authority.
pub struct CertProvService<M: ExchangeManager> {
    manager: M,
    authority: Arc<ServiceAuthority>,
    registered: bool,
}

impl<M: ExchangeManager> CertProvService<M> {
    pub fn init(mut manager: M, authority: Arc<ServiceAuthority>) -> Result<Self, ServiceError> {
        manager.register_unsolicited_handler(SECURITY_PROFILE, MSG_TYPE_GET_CERTIFICATE_REQUEST)?;
        info!(
            "Certificate provisioning service started, CA {}",
            authority.ca_cert().subject()
        );
        Ok(Self {
            manager,
            authority,
            registered: true,
        })
    }

    pub fn shutdown(&mut self) {
        if self.registered {
            self.manager
                .unregister_unsolicited_handler(SECURITY_PROFILE, MSG_TYPE_GET_CERTIFICATE_REQUEST);
            self.registered = false;
            info!("Certificate provisioning service stopped");
        }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn authority(&self) -> &Arc<ServiceAuthority> {
        &self.authority
    }

    /// Handles one inbound message and sends exactly one reply on `exchange`.
    ///
    /// # Returns
    ///
    /// The final state of the request. `Done` once the reply was sent.
    pub fn handle_client_request<X: ExchangeContext>(
        &self,
        exchange: &mut X,
        message: InboundMessage,
    ) -> States {
        self.handle_client_request_with(DefaultActions, exchange, message)
    }

    /// Same as `handle_client_request` with custom state machine actions.
    pub fn handle_client_request_with<T: StateMachineActions, X: ExchangeContext>(
        &self,
        actions: T,
        exchange: &mut X,
        message: InboundMessage,
    ) -> States {
        let peer = exchange.peer_node_id();
        info!("Request from node {:016X}: {}", peer, message);
        if self.authority.policy().log_message_data {
            debug!("Inbound payload: {}", hex::encode(&message.payload));
        }

        let mut sm = StateMachine::new(Context::new(actions, exchange, &self.authority));
        fire(&mut sm, Events::Accept);
        self.process(&mut sm, &message, peer);
        fire(&mut sm, Events::Send);

        let state = *sm.state();
        debug!("Request from node {:016X} finished in {:?}", peer, state);
        state
    }

    fn process<T: StateMachineActions, X: ExchangeContext>(
        &self,
        sm: &mut StateMachine<Context<'_, T, X>>,
        message: &InboundMessage,
        peer: u64,
    ) {
        let policy = self.authority.policy();

        if message.profile_id != SECURITY_PROFILE
            || message.msg_type != MSG_TYPE_GET_CERTIFICATE_REQUEST
        {
            warn!("Node {:016X}: unexpected message {}", peer, message);
            fire(sm, Events::DecodeFailed);
            return;
        }

        let request = match GetCertificateRequest::decode(&message.payload, policy.max_cert_chain_len)
        {
            Ok(request) => request,
            Err(e) => {
                warn!("Node {:016X}: undecodable request: {}", peer, e);
                fire(sm, Events::DecodeFailed);
                return;
            }
        };

        if request.request_type == RequestType::RotateOpDeviceCert && policy.refuse_rotation {
            info!(
                "Node {:016X}: rotation refused for {}",
                peer,
                request.operational_cert().subject()
            );
            fire(sm, Events::RotationRefused);
            return;
        }
        fire(sm, Events::Decoded);

        if let Err(e) = validate_request(&request, &self.authority) {
            warn!("Node {:016X}: request rejected: {}", peer, e);
            fire(sm, Events::ValidationFailed);
            return;
        }
        fire(sm, Events::Validated);

        match CertificateIssuer::new(&self.authority).issue(request.operational_cert()) {
            Ok(cert) => {
                if !fire(sm, Events::Issued(cert)) {
                    fire(sm, Events::IssuanceFailed);
                }
            }
            Err(e) => {
                error!("Node {:016X}: issuance failed: {}", peer, e);
                fire(sm, Events::IssuanceFailed);
            }
        }
    }
}

impl<M: ExchangeManager> Drop for CertProvService<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn fire<T: StateMachineActions, X: ExchangeContext>(
    sm: &mut StateMachine<Context<'_, T, X>>,
    event: Events,
) -> bool {
    let from = *sm.state();
    if sm.process_event(event).is_err() {
        error!("Provisioning state machine failed to leave {:?}", from);
        return false;
    }
    true
}
