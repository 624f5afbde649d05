use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use tokio::sync::oneshot;
use tracing::{Instrument, instrument};

use crate::api::interaction::{
    APPLICATION_COMMAND, Interaction, InteractionErr, InteractionResponder, InteractionResponse,
    PING,
};
use crate::api::middleware::verify::VerifiedBody;
use crate::api::server::{AppState, JsonResult};
use crate::commands;

/// Interactions endpoint. Commands run on their own task; the HTTP response carries whatever
/// the handler answers first.
#[instrument(skip(state, body))]
pub async fn interactions(
    State(state): State<Arc<AppState>>,
    body: VerifiedBody,
) -> JsonResult<InteractionResponse> {
    let interaction: Interaction = body.as_json()?;

    match interaction.kind {
        PING => {
            tracing::debug!("ping");
            Ok(Json(InteractionResponse::pong()))
        }
        APPLICATION_COMMAND => {
            let invocation = interaction.invocation()?;
            let (tx, rx) = oneshot::channel();
            let responder = InteractionResponder::new(tx, state.discord.clone(), interaction.token);

            tokio::spawn(
                async move {
                    commands::execute(&state.ledger, &state.discord, &responder, invocation).await;
                }
                .in_current_span(),
            );

            Ok(Json(rx.await?))
        }
        other => Err(InteractionErr::UnsupportedType(other).into()),
    }
}
