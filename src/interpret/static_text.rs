use super::{Interpretation, InterpretationRequest, InterpretError, Interpreter};
use async_trait::async_trait;

/// Fixed templated text; never calls out and never fails.
#[derive(Debug, Clone)]
pub struct StaticInterpreter {
    template: String,
}

impl StaticInterpreter {
    pub fn new(template: String) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Interpreter for StaticInterpreter {
    async fn interpret(
        &self,
        request: &InterpretationRequest,
    ) -> Result<Interpretation, InterpretError> {
        Ok(Interpretation::Text(request.fill(&self.template)))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
