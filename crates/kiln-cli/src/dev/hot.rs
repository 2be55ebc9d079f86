//! Hot-update endpoint: a Server-Sent Events stream of [`HotEvent`]s.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::Request,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::debug;

use super::middleware::{Flow, Middleware};
use super::{HotEvent, SharedState, HOT_PATH};

pub const HEARTBEAT: Duration = Duration::from_secs(2);

pub struct HotMiddleware {
    state: SharedState,
}

impl HotMiddleware {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Middleware for HotMiddleware {
    fn name(&self) -> &'static str {
        "hot"
    }

    async fn handle(&self, request: Request) -> Flow {
        if request.uri().path() != HOT_PATH {
            return Flow::Next(request);
        }

        let (id, rx) = self.state.register_client();
        debug!(client = id, "hot-update client connected");

        // Tell the new client which bundle is current
        let initial = self
            .state
            .compilation()
            .map(|compilation| HotEvent::Sync {
                hash: compilation.hash().to_string(),
            })
            .and_then(|event| serde_json::to_string(&event).ok());

        let stream = tokio_stream::iter(initial)
            .chain(ReceiverStream::new(rx))
            .map(|data| Ok::<_, Infallible>(Event::default().data(data)));

        let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("heartbeat"));
        Flow::Respond(sse.into_response())
    }
}
