use super::{Interpretation, InterpretationRequest, InterpretError, Interpreter};
use async_trait::async_trait;

/// Leaves interpretation to the caller: the raster is kept and served,
/// the response carries a suggested prompt.
#[derive(Debug, Clone)]
pub struct DeferredInterpreter {
    message: String,
    prompt: String,
}

impl DeferredInterpreter {
    pub fn new(message: String, prompt: String) -> Self {
        Self { message, prompt }
    }
}

#[async_trait]
impl Interpreter for DeferredInterpreter {
    fn needs_raster(&self) -> bool {
        true
    }

    fn serves_raster(&self) -> bool {
        true
    }

    async fn interpret(
        &self,
        request: &InterpretationRequest,
    ) -> Result<Interpretation, InterpretError> {
        Ok(Interpretation::Deferred {
            message: request.fill(&self.message),
            prompt: request.fill(&self.prompt),
        })
    }

    fn name(&self) -> &'static str {
        "deferred"
    }
}
