//! Tool-call dispatch.
//!
//! Recognizes control invocations in inbound tool-call payloads, validates
//! their argument permissively, feeds valid values to the integrator, and
//! produces the correlated acknowledgement the protocol requires for every
//! recognized invocation.

use crate::gemini::{FunctionResponse, CONTROL_ARG, CONTROL_TOOL};
use crate::integrator::ParameterIntegrator;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub struct Dispatcher {
    integrator: ParameterIntegrator,
}

impl Dispatcher {
    pub fn new(integrator: ParameterIntegrator) -> Self {
        Self { integrator }
    }

    /// Handle one inbound tool-call payload. Returns the results to
    /// submit, one per recognized invocation, in arrival order.
    ///
    /// Invocations for other tools get no result at all; recognized
    /// invocations with a missing or non-numeric argument update nothing
    /// but are still acknowledged, so the peer's turn-taking never stalls
    /// on output this pipeline could not interpret.
    pub fn handle(&mut self, payload: &Value) -> Vec<FunctionResponse> {
        let calls = match payload.get("functionCalls").and_then(Value::as_array) {
            Some(calls) => calls,
            None => {
                debug!("tool-call payload without functionCalls array");
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        for call in calls {
            let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
            if name != CONTROL_TOOL {
                debug!("ignoring unrecognized tool invocation: {:?}", name);
                continue;
            }
            let id = call.get("id").and_then(Value::as_str).unwrap_or_default();

            match call
                .get("args")
                .and_then(|args| args.get(CONTROL_ARG))
                .and_then(Value::as_f64)
            {
                Some(value) => {
                    debug!("control value {:.3} from invocation {:?}", value, id);
                    self.integrator.observe(value);
                }
                None => {
                    warn!(
                        "invocation {:?} has no numeric {:?} argument, acknowledging anyway",
                        id, CONTROL_ARG
                    );
                }
            }

            results.push(FunctionResponse {
                id: id.to_string(),
                name: name.to_string(),
                response: json!({"result": "ok"}),
            });
        }
        results
    }

    pub fn integrator(&self) -> &ParameterIntegrator {
        &self.integrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(ParameterIntegrator::default())
    }

    #[test]
    fn test_valid_invocation_updates_and_acknowledges() {
        let mut dispatcher = dispatcher();
        let payload = json!({
            "functionCalls": [
                {"id": "a1", "name": CONTROL_TOOL, "args": {"expansion": 0.1}}
            ]
        });

        let results = dispatcher.handle(&payload);

        assert_eq!(dispatcher.integrator().last_raw(), Some(0.1));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a1");
        assert_eq!(results[0].name, CONTROL_TOOL);
        assert_eq!(results[0].response, json!({"result": "ok"}));
    }

    #[test]
    fn test_missing_argument_is_acknowledged_without_update() {
        let mut dispatcher = dispatcher();
        let payload = json!({
            "functionCalls": [
                {"id": "a2", "name": CONTROL_TOOL, "args": {}}
            ]
        });

        let results = dispatcher.handle(&payload);

        assert_eq!(dispatcher.integrator().last_raw(), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a2");
    }

    #[test]
    fn test_non_numeric_argument_is_acknowledged_without_update() {
        let mut dispatcher = dispatcher();
        let payload = json!({
            "functionCalls": [
                {"id": "a3", "name": CONTROL_TOOL, "args": {"expansion": "wide"}}
            ]
        });

        let results = dispatcher.handle(&payload);

        assert_eq!(dispatcher.integrator().last_raw(), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a3");
    }

    #[test]
    fn test_unrecognized_name_gets_no_result() {
        let mut dispatcher = dispatcher();
        let payload = json!({
            "functionCalls": [
                {"id": "x1", "name": "doSomethingElse", "args": {"expansion": 0.4}}
            ]
        });

        let results = dispatcher.handle(&payload);

        assert!(results.is_empty());
        assert_eq!(dispatcher.integrator().last_raw(), None);
    }

    #[test]
    fn test_mixed_batch_is_processed_independently_in_order() {
        let mut dispatcher = dispatcher();
        let payload = json!({
            "functionCalls": [
                {"id": "b1", "name": CONTROL_TOOL, "args": {"expansion": 0.8}},
                {"id": "b2", "name": CONTROL_TOOL, "args": {}}
            ]
        });

        let results = dispatcher.handle(&payload);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "b1");
        assert_eq!(results[1].id, "b2");
        assert_eq!(dispatcher.integrator().last_raw(), Some(0.8));
    }

    #[test]
    fn test_integer_argument_counts_as_numeric() {
        let mut dispatcher = dispatcher();
        let payload = json!({
            "functionCalls": [
                {"id": "c1", "name": CONTROL_TOOL, "args": {"expansion": 1}}
            ]
        });

        let results = dispatcher.handle(&payload);

        assert_eq!(results.len(), 1);
        assert_eq!(dispatcher.integrator().last_raw(), Some(1.0));
    }

    #[test]
    fn test_malformed_payload_shapes_are_tolerated() {
        let mut dispatcher = dispatcher();
        assert!(dispatcher.handle(&json!({})).is_empty());
        assert!(dispatcher.handle(&json!({"functionCalls": 3})).is_empty());
        assert!(dispatcher
            .handle(&json!({"functionCalls": [{"args": {"expansion": 0.2}}]}))
            .is_empty());
        assert_eq!(dispatcher.integrator().last_raw(), None);
    }

    #[test]
    fn test_missing_id_still_acknowledged() {
        let mut dispatcher = dispatcher();
        let payload = json!({
            "functionCalls": [
                {"name": CONTROL_TOOL, "args": {"expansion": 0.6}}
            ]
        });

        let results = dispatcher.handle(&payload);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "");
        assert_eq!(dispatcher.integrator().last_raw(), Some(0.6));
    }
}
