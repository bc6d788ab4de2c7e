//! Ticket artifact rendering.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use domain::TicketArtifact;

use crate::error::ReservationError;

const DATA_URL_PREFIX: &str = "data:application/json;base64,";

/// Turns a ticket payload into an opaque artifact.
#[async_trait]
pub trait TicketRenderer: Send + Sync {
    async fn render(&self, payload: &serde_json::Value)
    -> Result<TicketArtifact, ReservationError>;
}

#[derive(Debug, Default)]
struct RendererState {
    rendered: usize,
    fail_on_render: bool,
}

/// Renders the payload as a base64 JSON data URL, decodable with
/// [`DataUrlRenderer::decode`].
#[derive(Debug, Clone, Default)]
pub struct DataUrlRenderer {
    state: Arc<Mutex<RendererState>>,
}

impl DataUrlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the renderer to fail on the next render calls.
    pub fn set_fail_on_render(&self, fail: bool) {
        super::lock(&self.state).fail_on_render = fail;
    }

    /// Number of artifacts rendered so far.
    pub fn render_count(&self) -> usize {
        super::lock(&self.state).rendered
    }

    /// Recovers the JSON payload from an artifact produced by this renderer.
    pub fn decode(artifact: &TicketArtifact) -> Result<serde_json::Value, ReservationError> {
        let encoded = artifact
            .as_str()
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| ReservationError::Renderer("not a JSON data URL".to_string()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| ReservationError::Renderer(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ReservationError::Renderer(e.to_string()))
    }
}

#[async_trait]
impl TicketRenderer for DataUrlRenderer {
    async fn render(
        &self,
        payload: &serde_json::Value,
    ) -> Result<TicketArtifact, ReservationError> {
        let mut state = super::lock(&self.state);
        if state.fail_on_render {
            return Err(ReservationError::Renderer("Rendering failed".to_string()));
        }

        let json = serde_json::to_vec(payload)
            .map_err(|e| ReservationError::Renderer(e.to_string()))?;
        state.rendered += 1;

        Ok(TicketArtifact::new(format!(
            "{DATA_URL_PREFIX}{}",
            STANDARD.encode(json)
        )))
    }
}
