use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::live::ClientRegistry;
use crate::scheduler::UpdateRequest;

pub type GuardedClientRegistry = Arc<ClientRegistry>;
pub type UpdateRequestSender = mpsc::Sender<UpdateRequest>;

#[derive(Clone)]
pub struct ServerState {
    /// Account assigned to connections that don't name one.
    pub default_account: String,
    pub start_time: Instant,
    pub client_registry: GuardedClientRegistry,
    pub update_requests: UpdateRequestSender,
}

impl ServerState {
    pub fn new(
        default_account: &str,
        client_registry: GuardedClientRegistry,
        update_requests: UpdateRequestSender,
    ) -> Self {
        Self {
            default_account: default_account.to_string(),
            start_time: Instant::now(),
            client_registry,
            update_requests,
        }
    }
}

impl FromRef<ServerState> for GuardedClientRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.client_registry.clone()
    }
}

impl FromRef<ServerState> for UpdateRequestSender {
    fn from_ref(input: &ServerState) -> Self {
        input.update_requests.clone()
    }
}
